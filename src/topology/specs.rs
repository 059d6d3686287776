// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declaration records accepted by [`TopologyGraph`](super::TopologyGraph)
//!
//! Each record carries its own logical ID and refers to other objects by
//! logical ID only. Records deserialize directly from declaration documents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::{AclEntry, CidrBlock, LogicalId, RouteTarget, SubnetKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub id: LogicalId,
    pub cidr: CidrBlock,
    #[serde(default)]
    pub availability_zones: BTreeSet<String>,
}

impl NetworkSpec {
    pub fn new(id: LogicalId, cidr: CidrBlock) -> Self {
        Self {
            id,
            cidr,
            availability_zones: BTreeSet::new(),
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zones.insert(zone.into());
        self
    }
}

/// How a subnet obtains its block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetAddressing {
    /// Exactly this block
    Cidr(CidrBlock),
    /// Lowest free block of this prefix length
    CidrMask(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSpec {
    pub id: LogicalId,
    pub network: LogicalId,
    #[serde(flatten)]
    pub address: SubnetAddressing,
    pub availability_zone: String,
    pub kind: SubnetKind,
    /// Defaults to true for public subnets
    #[serde(default)]
    pub map_public_ip_on_launch: Option<bool>,
    #[serde(default)]
    pub egress: Vec<CidrBlock>,
    /// A dedicated `<subnet>:rtb` table is created when absent
    #[serde(default)]
    pub route_table: Option<LogicalId>,
    #[serde(default)]
    pub network_acl: Option<LogicalId>,
}

impl SubnetSpec {
    pub fn new(
        id: LogicalId,
        network: LogicalId,
        cidr: CidrBlock,
        availability_zone: impl Into<String>,
        kind: SubnetKind,
    ) -> Self {
        Self {
            id,
            network,
            address: SubnetAddressing::Cidr(cidr),
            availability_zone: availability_zone.into(),
            kind,
            map_public_ip_on_launch: None,
            egress: Vec::new(),
            route_table: None,
            network_acl: None,
        }
    }

    pub fn with_egress(mut self, destination: CidrBlock) -> Self {
        self.egress.push(destination);
        self
    }

    pub fn with_route_table(mut self, route_table: LogicalId) -> Self {
        self.route_table = Some(route_table);
        self
    }

    pub fn with_network_acl(mut self, network_acl: LogicalId) -> Self {
        self.network_acl = Some(network_acl);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableSpec {
    pub id: LogicalId,
    pub network: LogicalId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAclSpec {
    pub id: LogicalId,
    pub network: LogicalId,
    #[serde(default)]
    pub entries: Vec<AclEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticIpSpec {
    pub id: LogicalId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewaySpec {
    Internet {
        id: LogicalId,
        network: LogicalId,
    },
    Nat {
        id: LogicalId,
        subnet: LogicalId,
        #[serde(default)]
        elastic_ip: Option<LogicalId>,
    },
}

impl GatewaySpec {
    pub fn id(&self) -> &LogicalId {
        match self {
            GatewaySpec::Internet { id, .. } | GatewaySpec::Nat { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    #[serde(default)]
    pub id: Option<LogicalId>,
    pub route_table: LogicalId,
    pub destination: CidrBlock,
    pub target: RouteTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntrySpec {
    pub network_acl: LogicalId,
    #[serde(flatten)]
    pub entry: AclEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclAssociationSpec {
    pub subnet: LogicalId,
    pub network_acl: LogicalId,
}

/// Opaque leaf resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub id: LogicalId,
    pub kind: String,
    #[serde(default)]
    pub depends_on: Vec<LogicalId>,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Explicit happens-before edge: `from` is created after `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub from: LogicalId,
    pub to: LogicalId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_spec_accepts_mask_or_cidr() {
        let explicit: SubnetSpec = serde_json::from_value(serde_json::json!({
            "id": "public_subnet_1",
            "network": "vpc",
            "cidr": "10.0.0.0/24",
            "availability_zone": "az-1",
            "kind": "public"
        }))
        .unwrap();
        assert_eq!(
            explicit.address,
            SubnetAddressing::Cidr(CidrBlock::new("10.0.0.0/24").unwrap())
        );
        assert!(explicit.route_table.is_none());

        let carved: SubnetSpec = serde_json::from_value(serde_json::json!({
            "id": "private_subnet_1",
            "network": "vpc",
            "cidr_mask": 24,
            "availability_zone": "az-1",
            "kind": "private"
        }))
        .unwrap();
        assert_eq!(carved.address, SubnetAddressing::CidrMask(24));
    }

    #[test]
    fn test_gateway_spec_tagged() {
        let nat: GatewaySpec = serde_json::from_value(serde_json::json!({
            "type": "nat",
            "id": "nat",
            "subnet": "public_subnet_1",
            "elastic_ip": "eip_nat"
        }))
        .unwrap();
        assert_eq!(nat.id().as_str(), "nat");
        assert!(matches!(nat, GatewaySpec::Nat { elastic_ip: Some(_), .. }));
    }
}
