// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Entities
//!
//! Plain data describing the objects of a virtual network: networks, subnets,
//! gateways, elastic IPs, route tables, network ACLs, associations and opaque
//! leaf resources. Cross-references are always by [`LogicalId`]; the graph
//! that owns these records resolves them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::ids::LogicalId;
use super::network::CidrBlock;

/// Kind of object as seen by a resource provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Subnet,
    RouteTable,
    NetworkAcl,
    ElasticIp,
    InternetGateway,
    NatGateway,
    Route,
    RouteTableAssociation,
    NetworkAclAssociation,
    /// Opaque leaf resource with a caller-defined kind name
    External(String),
}

impl ResourceKind {
    /// Coarse creation order used to break ties between ready nodes
    ///
    /// Network → Subnet → RouteTable/Acl → Gateway → Route → Association → leaf
    pub fn tier(&self) -> u8 {
        match self {
            ResourceKind::Network => 0,
            ResourceKind::Subnet => 1,
            ResourceKind::RouteTable | ResourceKind::NetworkAcl => 2,
            ResourceKind::ElasticIp
            | ResourceKind::InternetGateway
            | ResourceKind::NatGateway => 3,
            ResourceKind::Route => 4,
            ResourceKind::RouteTableAssociation | ResourceKind::NetworkAclAssociation => 5,
            ResourceKind::External(_) => 6,
        }
    }

    /// Short prefix for provider-assigned identifiers
    pub fn prefix(&self) -> &str {
        match self {
            ResourceKind::Network => "vpc",
            ResourceKind::Subnet => "subnet",
            ResourceKind::RouteTable => "rtb",
            ResourceKind::NetworkAcl => "acl",
            ResourceKind::ElasticIp => "eipalloc",
            ResourceKind::InternetGateway => "igw",
            ResourceKind::NatGateway => "nat",
            ResourceKind::Route => "r",
            ResourceKind::RouteTableAssociation => "rtbassoc",
            ResourceKind::NetworkAclAssociation => "aclassoc",
            ResourceKind::External(_) => "res",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Network => write!(f, "network"),
            ResourceKind::Subnet => write!(f, "subnet"),
            ResourceKind::RouteTable => write!(f, "route-table"),
            ResourceKind::NetworkAcl => write!(f, "network-acl"),
            ResourceKind::ElasticIp => write!(f, "elastic-ip"),
            ResourceKind::InternetGateway => write!(f, "internet-gateway"),
            ResourceKind::NatGateway => write!(f, "nat-gateway"),
            ResourceKind::Route => write!(f, "route"),
            ResourceKind::RouteTableAssociation => write!(f, "route-table-association"),
            ResourceKind::NetworkAclAssociation => write!(f, "network-acl-association"),
            ResourceKind::External(kind) => write!(f, "{}", kind),
        }
    }
}

/// Routing intent of a subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetKind {
    /// Egress through the network's internet gateway
    Public,
    /// Egress through a NAT gateway placed in a public subnet
    Private,
    /// No default egress
    Isolated,
}

impl fmt::Display for SubnetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubnetKind::Public => write!(f, "public"),
            SubnetKind::Private => write!(f, "private"),
            SubnetKind::Isolated => write!(f, "isolated"),
        }
    }
}

/// Root aggregate of a virtual network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: LogicalId,
    pub cidr: CidrBlock,
    pub availability_zones: BTreeSet<String>,
}

/// Subnet carved out of a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: LogicalId,
    pub network: LogicalId,
    pub cidr: CidrBlock,
    pub availability_zone: String,
    pub kind: SubnetKind,
    pub map_public_ip_on_launch: bool,
    /// Destinations whose target is chosen by the subnet kind
    pub egress: Vec<CidrBlock>,
    pub route_table: LogicalId,
    pub network_acl: Option<LogicalId>,
}

/// Stable public address handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticIp {
    pub id: LogicalId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternetGateway {
    pub id: LogicalId,
    pub network: LogicalId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatGateway {
    pub id: LogicalId,
    /// Public subnet the gateway lives in
    pub subnet: LogicalId,
    pub elastic_ip: LogicalId,
}

/// Egress gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Gateway {
    Internet(InternetGateway),
    Nat(NatGateway),
}

impl Gateway {
    pub fn id(&self) -> &LogicalId {
        match self {
            Gateway::Internet(igw) => &igw.id,
            Gateway::Nat(nat) => &nat.id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Gateway::Internet(_) => ResourceKind::InternetGateway,
            Gateway::Nat(_) => ResourceKind::NatGateway,
        }
    }
}

/// Next hop of a route
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    /// Traffic stays inside the network
    Local,
    Gateway(LogicalId),
    /// Traffic is dropped
    Blackhole,
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTarget::Local => write!(f, "local"),
            RouteTarget::Gateway(id) => write!(f, "{}", id),
            RouteTarget::Blackhole => write!(f, "blackhole"),
        }
    }
}

/// Route declared directly on a route table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredRoute {
    /// Optional caller-assigned ID; derived from table and destination otherwise
    pub id: Option<LogicalId>,
    pub destination: CidrBlock,
    pub target: RouteTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub id: LogicalId,
    pub network: LogicalId,
    pub routes: Vec<DeclaredRoute>,
    /// Created by the graph for a subnet that named no table
    pub implicit: bool,
}

/// Rule action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclAction {
    Allow,
    Deny,
}

impl fmt::Display for AclAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AclAction::Allow => write!(f, "allow"),
            AclAction::Deny => write!(f, "deny"),
        }
    }
}

/// Traffic direction relative to the subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ingress,
    Egress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ingress => write!(f, "ingress"),
            Direction::Egress => write!(f, "egress"),
        }
    }
}

/// Protocol of a concrete packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    /// Any other IP protocol number
    Other(u8),
}

/// Header fields of a concrete packet, as seen by an ACL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Packet {
    pub protocol: Protocol,
    /// Destination port; TCP and UDP only
    pub port: Option<u16>,
    /// ICMP type and code; ICMP only
    pub icmp: Option<(u8, u8)>,
}

impl Packet {
    pub fn tcp(port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            port: Some(port),
            icmp: None,
        }
    }

    pub fn udp(port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            port: Some(port),
            icmp: None,
        }
    }

    pub fn icmp(icmp_type: u8, code: u8) -> Self {
        Self {
            protocol: Protocol::Icmp,
            port: None,
            icmp: Some((icmp_type, code)),
        }
    }

    /// A packet known only by protocol
    pub fn protocol(protocol: Protocol) -> Self {
        Self {
            protocol,
            port: None,
            icmp: None,
        }
    }
}

/// Inclusive port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self { from: port, to: port }
    }

    pub fn all() -> Self {
        Self { from: 0, to: u16::MAX }
    }

    pub fn contains(&self, port: u16) -> bool {
        self.from <= port && port <= self.to
    }
}

/// Protocol/port selector of an ACL entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum TrafficSelector {
    /// Every protocol and port
    All,
    Tcp { ports: PortRange },
    Udp { ports: PortRange },
    /// `None` matches any ICMP type or code
    Icmp {
        icmp_type: Option<u8>,
        code: Option<u8>,
    },
    Other { number: u8 },
}

impl TrafficSelector {
    /// ICMP of every type and code
    pub fn any_icmp() -> Self {
        TrafficSelector::Icmp {
            icmp_type: None,
            code: None,
        }
    }

    /// Whether `packet` matches
    ///
    /// A selector restricted to ports, or to an ICMP type or code, never
    /// matches a packet that lacks that field.
    pub fn matches(&self, packet: &Packet) -> bool {
        match (self, packet.protocol) {
            (TrafficSelector::All, _) => true,
            (TrafficSelector::Tcp { ports }, Protocol::Tcp)
            | (TrafficSelector::Udp { ports }, Protocol::Udp) => {
                *ports == PortRange::all() || packet.port.is_some_and(|p| ports.contains(p))
            }
            (TrafficSelector::Icmp { icmp_type, code }, Protocol::Icmp) => {
                let seen = packet.icmp;
                icmp_type.map_or(true, |t| seen.is_some_and(|(st, _)| st == t))
                    && code.map_or(true, |c| seen.is_some_and(|(_, sc)| sc == c))
            }
            (TrafficSelector::Other { number }, Protocol::Other(n)) => *number == n,
            _ => false,
        }
    }
}

/// One rule of a network ACL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub rule_number: u16,
    pub cidr: CidrBlock,
    pub traffic: TrafficSelector,
    pub action: AclAction,
    pub direction: Direction,
}

/// Stateless, ordered rule list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAcl {
    pub id: LogicalId,
    pub network: LogicalId,
    pub entries: Vec<AclEntry>,
}

impl NetworkAcl {
    pub fn new(id: LogicalId, network: LogicalId) -> Self {
        Self {
            id,
            network,
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, entry: AclEntry) -> Self {
        self.entries.push(entry);
        self
    }
}

/// What a subnet association binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    RouteTable,
    NetworkAcl,
}

/// Subnet binding, materialized when the graph is sealed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub id: LogicalId,
    pub kind: AssociationKind,
    pub subnet: LogicalId,
    pub target: LogicalId,
}

/// Opaque leaf resource (instance, load balancer, policy, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: LogicalId,
    pub kind: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_follow_creation_order() {
        assert!(ResourceKind::Network.tier() < ResourceKind::Subnet.tier());
        assert!(ResourceKind::Subnet.tier() < ResourceKind::RouteTable.tier());
        assert_eq!(ResourceKind::RouteTable.tier(), ResourceKind::NetworkAcl.tier());
        assert!(ResourceKind::NetworkAcl.tier() < ResourceKind::NatGateway.tier());
        assert!(ResourceKind::NatGateway.tier() < ResourceKind::Route.tier());
        assert!(ResourceKind::Route.tier() < ResourceKind::RouteTableAssociation.tier());
    }

    #[test]
    fn test_traffic_selector_matching() {
        let ssh = TrafficSelector::Tcp {
            ports: PortRange::single(22),
        };
        assert!(ssh.matches(&Packet::tcp(22)));
        assert!(!ssh.matches(&Packet::tcp(80)));
        assert!(!ssh.matches(&Packet::udp(22)));
        assert!(!ssh.matches(&Packet::protocol(Protocol::Tcp)));

        let all_tcp = TrafficSelector::Tcp {
            ports: PortRange::all(),
        };
        assert!(all_tcp.matches(&Packet::protocol(Protocol::Tcp)));

        assert!(TrafficSelector::any_icmp().matches(&Packet::protocol(Protocol::Icmp)));
        assert!(!TrafficSelector::any_icmp().matches(&Packet::tcp(0)));

        let echo = TrafficSelector::Icmp {
            icmp_type: Some(8),
            code: None,
        };
        assert!(echo.matches(&Packet::icmp(8, 0)));
        assert!(!echo.matches(&Packet::icmp(0, 0)));
        assert!(!echo.matches(&Packet::protocol(Protocol::Icmp)));

        assert!(TrafficSelector::All.matches(&Packet::protocol(Protocol::Other(47))));
        assert!(TrafficSelector::Other { number: 47 }.matches(&Packet::protocol(Protocol::Other(47))));
    }

    #[test]
    fn test_icmp_code_narrows_selector() {
        let frag_needed = TrafficSelector::Icmp {
            icmp_type: Some(3),
            code: Some(4),
        };
        assert!(frag_needed.matches(&Packet::icmp(3, 4)));
        assert!(!frag_needed.matches(&Packet::icmp(3, 1)));
        assert!(!frag_needed.matches(&Packet::icmp(11, 4)));
        assert!(!frag_needed.matches(&Packet::protocol(Protocol::Icmp)));
    }

    #[test]
    fn test_selector_serde_shape() {
        let json = serde_json::to_value(TrafficSelector::Tcp {
            ports: PortRange::single(443),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "protocol": "tcp", "ports": { "from": 443, "to": 443 } })
        );
    }
}
