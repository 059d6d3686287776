// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Graph
//!
//! In-memory model of a declared virtual network. Nodes live in an arena in
//! declaration order; relationships are edges in a [`DependencyGraph`] that
//! is kept acyclic on every insertion.
//!
//! # Build Phase
//!
//! ```text
//! add_network → add_route_table / add_network_acl / add_elastic_ip
//!             → add_subnet → attach_gateway → add_route / add_acl_entry
//!             → associate_acl / add_resource / add_dependency
//!             → seal() → SealedTopology
//! ```
//!
//! Every operation validates before it mutates, so a failed call leaves the
//! graph exactly as it was. `seal()` consumes the graph; a
//! [`SealedTopology`] has no structural edit methods at all.

pub mod declaration;
pub mod dependency;
pub mod sealed;
pub mod specs;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::acl::AclEvaluator;
use crate::address_space::{AddressSpace, Reservation};
use crate::domain::invariants::{
    validate_availability_zone, validate_nat_placement, validate_unique_destination,
};
use crate::domain::{
    AclEntry, Association, AssociationKind, DeclaredRoute, ElasticIp, Gateway, InternetGateway,
    LogicalId, NatGateway, Network, NetworkAcl, Resource, ResourceKind, RouteTable, RouteTarget,
    Subnet, SubnetKind, ValidationError,
};
use crate::errors::{ResolutionError, TopologyResult};

pub use declaration::TopologyDeclaration;
pub use dependency::{DependencyGraph, NodeIndex};
pub use sealed::SealedTopology;
pub use specs::{
    AclAssociationSpec, AclEntrySpec, DependencySpec, ElasticIpSpec, GatewaySpec, NetworkAclSpec,
    NetworkSpec, ResourceSpec, RouteSpec, RouteTableSpec, SubnetAddressing, SubnetSpec,
};

/// Suffix of the table created for a subnet that names none
pub const IMPLICIT_ROUTE_TABLE_SUFFIX: &str = "rtb";

/// Suffix of a subnet's route table association node
pub const ROUTE_TABLE_ASSOCIATION_SUFFIX: &str = "route-table-association";

/// Suffix of a subnet's ACL association node
pub const ACL_ASSOCIATION_SUFFIX: &str = "acl-association";

/// A declared object
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Network(Network),
    Subnet(Subnet),
    RouteTable(RouteTable),
    NetworkAcl(NetworkAcl),
    ElasticIp(ElasticIp),
    Gateway(Gateway),
    Association(Association),
    Resource(Resource),
}

impl Node {
    pub fn id(&self) -> &LogicalId {
        match self {
            Node::Network(n) => &n.id,
            Node::Subnet(s) => &s.id,
            Node::RouteTable(t) => &t.id,
            Node::NetworkAcl(a) => &a.id,
            Node::ElasticIp(e) => &e.id,
            Node::Gateway(g) => g.id(),
            Node::Association(a) => &a.id,
            Node::Resource(r) => &r.id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Node::Network(_) => ResourceKind::Network,
            Node::Subnet(_) => ResourceKind::Subnet,
            Node::RouteTable(_) => ResourceKind::RouteTable,
            Node::NetworkAcl(_) => ResourceKind::NetworkAcl,
            Node::ElasticIp(_) => ResourceKind::ElasticIp,
            Node::Gateway(g) => g.kind(),
            Node::Association(a) => match a.kind {
                AssociationKind::RouteTable => ResourceKind::RouteTableAssociation,
                AssociationKind::NetworkAcl => ResourceKind::NetworkAclAssociation,
            },
            Node::Resource(r) => ResourceKind::External(r.kind.clone()),
        }
    }
}

/// Mutable topology under construction
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    nodes: Vec<Node>,
    deps: DependencyGraph,
    /// network → its address ledger
    address_spaces: HashMap<LogicalId, AddressSpace>,
    /// subnet → its reservation
    reservations: HashMap<LogicalId, Reservation>,
    /// network → attached internet gateway
    internet_gateways: HashMap<LogicalId, LogicalId>,
    /// elastic IP → NAT gateway it serves
    elastic_ip_bindings: HashMap<LogicalId, LogicalId>,
    /// Explicit IDs of declared routes; they share the node namespace
    route_ids: HashSet<LogicalId>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &LogicalId) -> bool {
        self.deps.contains(id)
    }

    pub fn node(&self, id: &LogicalId) -> Option<&Node> {
        self.deps.index_of(id).map(|i| &self.nodes[i.index()])
    }

    pub fn network(&self, id: &LogicalId) -> Option<&Network> {
        match self.node(id) {
            Some(Node::Network(n)) => Some(n),
            _ => None,
        }
    }

    pub fn subnet(&self, id: &LogicalId) -> Option<&Subnet> {
        match self.node(id) {
            Some(Node::Subnet(s)) => Some(s),
            _ => None,
        }
    }

    pub fn route_table(&self, id: &LogicalId) -> Option<&RouteTable> {
        match self.node(id) {
            Some(Node::RouteTable(t)) => Some(t),
            _ => None,
        }
    }

    pub fn address_space(&self, network: &LogicalId) -> Option<&AddressSpace> {
        self.address_spaces.get(network)
    }

    /// Declare a network and open its address space
    pub fn add_network(&mut self, spec: NetworkSpec) -> TopologyResult<NodeIndex> {
        self.ensure_free(&spec.id)?;

        let network = Network {
            id: spec.id.clone(),
            cidr: spec.cidr,
            availability_zones: spec.availability_zones,
        };
        let index = self.push(Node::Network(network))?;
        self.address_spaces
            .insert(spec.id.clone(), AddressSpace::new(spec.cidr));

        debug!("Declared network {} ({})", spec.id, spec.cidr);
        Ok(index)
    }

    pub fn add_route_table(&mut self, spec: RouteTableSpec) -> TopologyResult<NodeIndex> {
        self.ensure_free(&spec.id)?;
        let network = self.require_network(&spec.network)?;

        let table = RouteTable {
            id: spec.id,
            network: spec.network,
            routes: Vec::new(),
            implicit: false,
        };
        let index = self.push(Node::RouteTable(table))?;
        self.deps.add_edge(index, network)?;
        Ok(index)
    }

    pub fn add_network_acl(&mut self, spec: NetworkAclSpec) -> TopologyResult<NodeIndex> {
        self.ensure_free(&spec.id)?;
        let network = self.require_network(&spec.network)?;

        let acl = NetworkAcl {
            id: spec.id,
            network: spec.network,
            entries: spec.entries,
        };
        let index = self.push(Node::NetworkAcl(acl))?;
        self.deps.add_edge(index, network)?;
        Ok(index)
    }

    pub fn add_elastic_ip(&mut self, spec: ElasticIpSpec) -> TopologyResult<NodeIndex> {
        self.ensure_free(&spec.id)?;
        self.push(Node::ElasticIp(ElasticIp { id: spec.id }))
    }

    /// Declare a subnet
    ///
    /// # Validation
    /// - ID unused (including the implicit `<subnet>:rtb` when no table is named)
    /// - Network exists, zone is one of the network's
    /// - Block inside the network and clear of sibling subnets
    /// - Named route table / ACL exist in the same network
    pub fn add_subnet(&mut self, spec: SubnetSpec) -> TopologyResult<NodeIndex> {
        self.ensure_free(&spec.id)?;
        let network_index = self.require_network(&spec.network)?;
        let network = match &self.nodes[network_index.index()] {
            Node::Network(n) => n.clone(),
            _ => return Err(ResolutionError::not_found(&spec.network, "Network").into()),
        };

        validate_availability_zone(
            &spec.id,
            &network.id,
            &spec.availability_zone,
            &network.availability_zones,
        )?;

        let space = self
            .address_spaces
            .get(&network.id)
            .ok_or_else(|| ResolutionError::not_found(&network.id, "Address space"))?;
        let cidr = match spec.address {
            SubnetAddressing::Cidr(cidr) => {
                space.check(network.cidr, cidr)?;
                cidr
            }
            SubnetAddressing::CidrMask(prefix_len) => space.find_gap(network.cidr, prefix_len)?,
        };

        let (route_table, implicit_table) = match &spec.route_table {
            Some(table) => {
                self.require_in_network(&spec.id, table, &network.id, ResourceKind::RouteTable)?;
                (table.clone(), false)
            }
            None => {
                let table = spec.id.derive(IMPLICIT_ROUTE_TABLE_SUFFIX);
                self.ensure_free(&table)?;
                (table, true)
            }
        };

        if let Some(acl) = &spec.network_acl {
            self.require_in_network(&spec.id, acl, &network.id, ResourceKind::NetworkAcl)?;
        }

        // All checks passed; mutate
        let reservation = self
            .address_spaces
            .get_mut(&network.id)
            .ok_or_else(|| ResolutionError::not_found(&network.id, "Address space"))?
            .allocate_for(network.cidr, cidr, Some(&spec.id))?;
        self.reservations.insert(spec.id.clone(), reservation);

        let subnet = Subnet {
            id: spec.id.clone(),
            network: network.id.clone(),
            cidr,
            availability_zone: spec.availability_zone,
            kind: spec.kind,
            map_public_ip_on_launch: spec
                .map_public_ip_on_launch
                .unwrap_or(spec.kind == SubnetKind::Public),
            egress: spec.egress,
            route_table: route_table.clone(),
            network_acl: spec.network_acl,
        };
        let index = self.push(Node::Subnet(subnet))?;
        self.deps.add_edge(index, network_index)?;

        if implicit_table {
            let table = RouteTable {
                id: route_table.clone(),
                network: network.id.clone(),
                routes: Vec::new(),
                implicit: true,
            };
            let table_index = self.push(Node::RouteTable(table))?;
            self.deps.add_edge(table_index, network_index)?;
        }

        debug!(
            "Declared {} subnet {} ({}) in {}",
            spec.kind, spec.id, cidr, network.id
        );
        Ok(index)
    }

    /// Attach an internet gateway to a network or place a NAT gateway in a subnet
    pub fn attach_gateway(&mut self, spec: GatewaySpec) -> TopologyResult<NodeIndex> {
        self.ensure_free(spec.id())?;

        match spec {
            GatewaySpec::Internet { id, network } => {
                let network_index = self.require_network(&network)?;
                if let Some(existing) = self.internet_gateways.get(&network) {
                    return Err(ValidationError::InvalidPlacement {
                        gateway: id,
                        reason: format!(
                            "network {} already has internet gateway {}",
                            network, existing
                        ),
                    }
                    .into());
                }

                let gateway = Gateway::Internet(InternetGateway {
                    id: id.clone(),
                    network: network.clone(),
                });
                let index = self.push(Node::Gateway(gateway))?;
                self.deps.add_edge(index, network_index)?;
                self.internet_gateways.insert(network.clone(), id.clone());

                debug!("Attached internet gateway {} to {}", id, network);
                Ok(index)
            }
            GatewaySpec::Nat {
                id,
                subnet,
                elastic_ip,
            } => {
                let subnet_index = self
                    .deps
                    .index_of(&subnet)
                    .ok_or_else(|| ResolutionError::not_found(&subnet, "Subnet"))?;
                let subnet_kind = match &self.nodes[subnet_index.index()] {
                    Node::Subnet(s) => s.kind,
                    _ => return Err(ResolutionError::not_found(&subnet, "Subnet").into()),
                };

                let eip_index = match &elastic_ip {
                    Some(eip) => match self.deps.index_of(eip) {
                        Some(i) if matches!(self.nodes[i.index()], Node::ElasticIp(_)) => Some(i),
                        _ => return Err(ResolutionError::not_found(eip, "Elastic IP").into()),
                    },
                    None => None,
                };

                validate_nat_placement(
                    &id,
                    &subnet,
                    subnet_kind,
                    elastic_ip.as_ref(),
                    elastic_ip
                        .as_ref()
                        .and_then(|eip| self.elastic_ip_bindings.get(eip)),
                )?;

                let (Some(eip), Some(eip_index)) = (elastic_ip, eip_index) else {
                    return Err(ValidationError::InvalidPlacement {
                        gateway: id,
                        reason: "no elastic IP bound".to_string(),
                    }
                    .into());
                };

                let gateway = Gateway::Nat(NatGateway {
                    id: id.clone(),
                    subnet: subnet.clone(),
                    elastic_ip: eip.clone(),
                });
                let index = self.push(Node::Gateway(gateway))?;
                self.deps.add_edge(index, subnet_index)?;
                self.deps.add_edge(index, eip_index)?;
                self.elastic_ip_bindings.insert(eip, id.clone());

                debug!("Placed NAT gateway {} in {}", id, subnet);
                Ok(index)
            }
        }
    }

    /// Declare an explicit route on a table
    ///
    /// The target is checked when the graph is sealed, so routes may name
    /// gateways declared later.
    pub fn add_route(&mut self, spec: RouteSpec) -> TopologyResult<()> {
        let table_index = self
            .deps
            .index_of(&spec.route_table)
            .ok_or_else(|| ResolutionError::not_found(&spec.route_table, "Route table"))?;

        let network_cidr = {
            let Node::RouteTable(table) = &self.nodes[table_index.index()] else {
                return Err(ResolutionError::not_found(&spec.route_table, "Route table").into());
            };
            self.network(&table.network)
                .map(|n| n.cidr)
                .ok_or_else(|| ResolutionError::not_found(&table.network, "Network"))?
        };

        if let Some(route_id) = &spec.id {
            self.ensure_free(route_id)?;
        }

        let Node::RouteTable(table) = &mut self.nodes[table_index.index()] else {
            return Err(ResolutionError::not_found(&spec.route_table, "Route table").into());
        };

        // The implicit local route already covers the network block
        validate_unique_destination(
            &table.id,
            &spec.destination,
            std::iter::once(&network_cidr).chain(table.routes.iter().map(|r| &r.destination)),
        )?;

        table.routes.push(DeclaredRoute {
            id: spec.id.clone(),
            destination: spec.destination,
            target: spec.target,
        });
        if let Some(route_id) = spec.id {
            self.route_ids.insert(route_id);
        }
        Ok(())
    }

    pub fn add_acl_entry(&mut self, acl: &LogicalId, entry: AclEntry) -> TopologyResult<()> {
        match self.node_mut(acl) {
            Some(Node::NetworkAcl(a)) => {
                a.entries.push(entry);
                Ok(())
            }
            _ => Err(ResolutionError::not_found(acl, "Network ACL").into()),
        }
    }

    /// Bind a subnet to an ACL, replacing any previous binding
    pub fn associate_acl(&mut self, subnet: &LogicalId, acl: &LogicalId) -> TopologyResult<()> {
        let network = self
            .subnet(subnet)
            .map(|s| s.network.clone())
            .ok_or_else(|| ResolutionError::not_found(subnet, "Subnet"))?;
        self.require_in_network(subnet, acl, &network, ResourceKind::NetworkAcl)?;

        if let Some(Node::Subnet(s)) = self.node_mut(subnet) {
            if let Some(previous) = s.network_acl.replace(acl.clone()) {
                debug!("Subnet {} moved from ACL {} to {}", subnet, previous, acl);
            }
        }
        Ok(())
    }

    /// Declare an opaque leaf resource
    pub fn add_resource(&mut self, spec: ResourceSpec) -> TopologyResult<NodeIndex> {
        self.ensure_free(&spec.id)?;
        let mut targets = Vec::with_capacity(spec.depends_on.len());
        for dependency in &spec.depends_on {
            let target = self
                .deps
                .index_of(dependency)
                .ok_or_else(|| ResolutionError::not_found(dependency, "Dependency"))?;
            targets.push(target);
        }

        let resource = Resource {
            id: spec.id,
            kind: spec.kind,
            properties: spec.properties,
        };
        let index = self.push(Node::Resource(resource))?;
        for target in targets {
            // A brand new node has no dependents, so this cannot cycle
            self.deps.add_edge(index, target)?;
        }
        Ok(index)
    }

    /// Record that `from` must be created after `to`
    ///
    /// # Errors
    /// - `NotFound` for unknown IDs
    /// - `Cycle` if the edge would close a loop
    pub fn add_dependency(&mut self, from: &LogicalId, to: &LogicalId) -> TopologyResult<()> {
        let from_index = self
            .deps
            .index_of(from)
            .ok_or_else(|| ResolutionError::not_found(from, "Node"))?;
        let to_index = self
            .deps
            .index_of(to)
            .ok_or_else(|| ResolutionError::not_found(to, "Node"))?;

        self.deps.add_edge(from_index, to_index)?;
        Ok(())
    }

    /// Finish the build phase
    ///
    /// Validates every ACL and every route target, then materializes the
    /// subnet associations as nodes of their own.
    pub fn seal(mut self) -> TopologyResult<SealedTopology> {
        for node in &self.nodes {
            match node {
                Node::NetworkAcl(acl) => AclEvaluator::validate(acl)?,
                Node::RouteTable(table) => self.validate_route_targets(table)?,
                _ => {}
            }
        }

        let subnets: Vec<Subnet> = self
            .nodes
            .iter()
            .filter_map(|n| match n {
                Node::Subnet(s) => Some(s.clone()),
                _ => None,
            })
            .collect();

        for subnet in subnets {
            self.materialize_association(
                &subnet,
                AssociationKind::RouteTable,
                &subnet.route_table,
                ROUTE_TABLE_ASSOCIATION_SUFFIX,
            )?;
            if let Some(acl) = &subnet.network_acl {
                self.materialize_association(
                    &subnet,
                    AssociationKind::NetworkAcl,
                    acl,
                    ACL_ASSOCIATION_SUFFIX,
                )?;
            }
        }

        debug!("Sealed topology with {} nodes", self.nodes.len());
        Ok(SealedTopology::new(
            self.nodes,
            self.deps,
            self.address_spaces,
            self.internet_gateways,
        ))
    }

    fn validate_route_targets(&self, table: &RouteTable) -> TopologyResult<()> {
        for route in &table.routes {
            let RouteTarget::Gateway(gateway) = &route.target else {
                continue;
            };

            let network = match self.node(gateway) {
                Some(Node::Gateway(Gateway::Internet(igw))) => igw.network.clone(),
                Some(Node::Gateway(Gateway::Nat(nat))) => self
                    .subnet(&nat.subnet)
                    .map(|s| s.network.clone())
                    .ok_or_else(|| ResolutionError::not_found(&nat.subnet, "Subnet"))?,
                _ => return Err(ResolutionError::not_found(gateway, "Gateway").into()),
            };

            if network != table.network {
                return Err(ValidationError::ForeignReference {
                    id: table.id.clone(),
                    reference: gateway.clone(),
                    network: table.network.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn materialize_association(
        &mut self,
        subnet: &Subnet,
        kind: AssociationKind,
        target: &LogicalId,
        suffix: &str,
    ) -> TopologyResult<()> {
        let id = subnet.id.derive(suffix);
        let subnet_index = self
            .deps
            .index_of(&subnet.id)
            .ok_or_else(|| ResolutionError::not_found(&subnet.id, "Subnet"))?;
        let target_index = self
            .deps
            .index_of(target)
            .ok_or_else(|| ResolutionError::not_found(target, "Association target"))?;

        let association = Association {
            id,
            kind,
            subnet: subnet.id.clone(),
            target: target.clone(),
        };
        let index = self.push(Node::Association(association))?;
        self.deps.add_edge(index, subnet_index)?;
        self.deps.add_edge(index, target_index)?;
        Ok(())
    }

    fn push(&mut self, node: Node) -> TopologyResult<NodeIndex> {
        self.ensure_free(node.id())?;
        let index = self.deps.add_node(node.id().clone())?;
        self.nodes.push(node);
        Ok(index)
    }

    fn node_mut(&mut self, id: &LogicalId) -> Option<&mut Node> {
        let index = self.deps.index_of(id)?;
        self.nodes.get_mut(index.index())
    }

    fn ensure_free(&self, id: &LogicalId) -> TopologyResult<()> {
        if self.deps.contains(id) || self.route_ids.contains(id) {
            return Err(ValidationError::DuplicateId(id.clone()).into());
        }
        Ok(())
    }

    fn require_network(&self, id: &LogicalId) -> TopologyResult<NodeIndex> {
        match self.deps.index_of(id) {
            Some(index) if matches!(self.nodes[index.index()], Node::Network(_)) => Ok(index),
            _ => Err(ResolutionError::not_found(id, "Network").into()),
        }
    }

    /// Check `reference` exists, has `kind` and belongs to `network`
    fn require_in_network(
        &self,
        owner: &LogicalId,
        reference: &LogicalId,
        network: &LogicalId,
        kind: ResourceKind,
    ) -> TopologyResult<()> {
        let actual = match (self.node(reference), &kind) {
            (Some(Node::RouteTable(t)), ResourceKind::RouteTable) => &t.network,
            (Some(Node::NetworkAcl(a)), ResourceKind::NetworkAcl) => &a.network,
            _ => return Err(ResolutionError::not_found(reference, kind.to_string()).into()),
        };

        if actual != network {
            return Err(ValidationError::ForeignReference {
                id: owner.clone(),
                reference: reference.clone(),
                network: network.clone(),
            }
            .into());
        }
        Ok(())
    }
}
