// Copyright (c) 2025 - Cowboy AI, Inc.
//! Shared topology fixtures for integration tests
#![allow(dead_code)]

use vpc_topology::topology::{ElasticIpSpec, GatewaySpec, NetworkSpec, SubnetSpec};
use vpc_topology::{CidrBlock, LogicalId, SealedTopology, SubnetKind, TopologyGraph};

pub fn id(s: &str) -> LogicalId {
    LogicalId::new(s).unwrap()
}

pub fn cidr(s: &str) -> CidrBlock {
    CidrBlock::new(s).unwrap()
}

/// One network 10.0.0.0/16 across az-1 and az-2, nothing else
pub fn network_only() -> TopologyGraph {
    let mut graph = TopologyGraph::new();
    graph
        .add_network(
            NetworkSpec::new(id("vpc"), cidr("10.0.0.0/16"))
                .with_zone("az-1")
                .with_zone("az-2"),
        )
        .unwrap();
    graph
}

/// Public subnet with an internet gateway and a NAT gateway, plus a
/// private subnet egressing through the NAT
///
/// ```text
/// vpc 10.0.0.0/16
/// ├── public_a  10.0.0.0/24  az-1 ─ 0.0.0.0/0 → igw
/// │   └── nat_a (eip nat_eip)
/// └── private_b 10.0.10.0/24 az-1 ─ 0.0.0.0/0 → nat_a
/// ```
pub fn two_tier() -> TopologyGraph {
    let mut graph = network_only();
    graph
        .add_subnet(
            SubnetSpec::new(
                id("public_a"),
                id("vpc"),
                cidr("10.0.0.0/24"),
                "az-1",
                SubnetKind::Public,
            )
            .with_egress(CidrBlock::any()),
        )
        .unwrap();
    graph
        .add_subnet(
            SubnetSpec::new(
                id("private_b"),
                id("vpc"),
                cidr("10.0.10.0/24"),
                "az-1",
                SubnetKind::Private,
            )
            .with_egress(CidrBlock::any()),
        )
        .unwrap();
    graph
        .attach_gateway(GatewaySpec::Internet {
            id: id("igw"),
            network: id("vpc"),
        })
        .unwrap();
    graph
        .add_elastic_ip(ElasticIpSpec { id: id("nat_eip") })
        .unwrap();
    graph
        .attach_gateway(GatewaySpec::Nat {
            id: id("nat_a"),
            subnet: id("public_a"),
            elastic_ip: Some(id("nat_eip")),
        })
        .unwrap();
    graph
}

pub fn sealed_two_tier() -> SealedTopology {
    two_tier().seal().unwrap()
}

/// YAML form of [`two_tier`]
pub const TWO_TIER_YAML: &str = r#"
networks:
  - id: vpc
    cidr: 10.0.0.0/16
    availability_zones: [az-1, az-2]
elastic_ips:
  - id: nat_eip
subnets:
  - id: public_a
    network: vpc
    cidr: 10.0.0.0/24
    availability_zone: az-1
    kind: public
    egress: [0.0.0.0/0]
  - id: private_b
    network: vpc
    cidr: 10.0.10.0/24
    availability_zone: az-1
    kind: private
    egress: [0.0.0.0/0]
gateways:
  - type: nat
    id: nat_a
    subnet: public_a
    elastic_ip: nat_eip
  - type: internet
    id: igw
    network: vpc
"#;
