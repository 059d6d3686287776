// Copyright (c) 2025 - Cowboy AI, Inc.
//! Sealed Topology
//!
//! Immutable result of the build phase. Only query methods exist; the
//! planner and resolvers read from it, and it can be shared freely across
//! threads.

use std::collections::HashMap;

use crate::address_space::AddressSpace;
use crate::domain::{
    Association, ElasticIp, Gateway, LogicalId, NatGateway, Network, NetworkAcl, Resource,
    RouteTable, Subnet,
};

use super::dependency::{DependencyGraph, NodeIndex};
use super::Node;

#[derive(Debug, Clone)]
pub struct SealedTopology {
    nodes: Vec<Node>,
    deps: DependencyGraph,
    address_spaces: HashMap<LogicalId, AddressSpace>,
    internet_gateways: HashMap<LogicalId, LogicalId>,
}

impl SealedTopology {
    pub(super) fn new(
        nodes: Vec<Node>,
        deps: DependencyGraph,
        address_spaces: HashMap<LogicalId, AddressSpace>,
        internet_gateways: HashMap<LogicalId, LogicalId>,
    ) -> Self {
        Self {
            nodes,
            deps,
            address_spaces,
            internet_gateways,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.deps.indices().zip(self.nodes.iter())
    }

    pub fn node(&self, id: &LogicalId) -> Option<&Node> {
        self.index_of(id).map(|i| &self.nodes[i.index()])
    }

    pub fn node_at(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.index()]
    }

    pub fn index_of(&self, id: &LogicalId) -> Option<NodeIndex> {
        self.deps.index_of(id)
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.deps
    }

    /// IDs `id` depends on
    pub fn dependencies_of(&self, id: &LogicalId) -> Vec<&LogicalId> {
        self.index_of(id)
            .map(|i| self.deps.dependencies(i).map(|d| self.deps.id(d)).collect())
            .unwrap_or_default()
    }

    /// IDs depending on `id`
    pub fn dependents_of(&self, id: &LogicalId) -> Vec<&LogicalId> {
        self.index_of(id)
            .map(|i| self.deps.dependents(i).map(|d| self.deps.id(d)).collect())
            .unwrap_or_default()
    }

    pub fn address_space(&self, network: &LogicalId) -> Option<&AddressSpace> {
        self.address_spaces.get(network)
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Network(network) => Some(network),
            _ => None,
        })
    }

    pub fn network(&self, id: &LogicalId) -> Option<&Network> {
        match self.node(id) {
            Some(Node::Network(n)) => Some(n),
            _ => None,
        }
    }

    pub fn subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Subnet(subnet) => Some(subnet),
            _ => None,
        })
    }

    pub fn subnet(&self, id: &LogicalId) -> Option<&Subnet> {
        match self.node(id) {
            Some(Node::Subnet(s)) => Some(s),
            _ => None,
        }
    }

    pub fn subnets_in<'a>(&'a self, network: &'a LogicalId) -> impl Iterator<Item = &'a Subnet> {
        self.subnets().filter(move |s| &s.network == network)
    }

    pub fn route_tables(&self) -> impl Iterator<Item = &RouteTable> {
        self.nodes.iter().filter_map(|n| match n {
            Node::RouteTable(table) => Some(table),
            _ => None,
        })
    }

    pub fn route_table(&self, id: &LogicalId) -> Option<&RouteTable> {
        match self.node(id) {
            Some(Node::RouteTable(t)) => Some(t),
            _ => None,
        }
    }

    pub fn network_acl(&self, id: &LogicalId) -> Option<&NetworkAcl> {
        match self.node(id) {
            Some(Node::NetworkAcl(a)) => Some(a),
            _ => None,
        }
    }

    pub fn elastic_ips(&self) -> impl Iterator<Item = &ElasticIp> {
        self.nodes.iter().filter_map(|n| match n {
            Node::ElasticIp(eip) => Some(eip),
            _ => None,
        })
    }

    pub fn gateways(&self) -> impl Iterator<Item = &Gateway> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Gateway(gateway) => Some(gateway),
            _ => None,
        })
    }

    pub fn gateway(&self, id: &LogicalId) -> Option<&Gateway> {
        match self.node(id) {
            Some(Node::Gateway(g)) => Some(g),
            _ => None,
        }
    }

    /// Internet gateway attached to `network`, if any
    pub fn internet_gateway(&self, network: &LogicalId) -> Option<&LogicalId> {
        self.internet_gateways.get(network)
    }

    /// NAT gateways placed in subnets of `network`, in declaration order
    pub fn nat_gateways<'a>(
        &'a self,
        network: &'a LogicalId,
    ) -> impl Iterator<Item = (&'a NatGateway, &'a Subnet)> {
        self.gateways().filter_map(move |g| match g {
            Gateway::Nat(nat) => self
                .subnet(&nat.subnet)
                .filter(|s| &s.network == network)
                .map(|s| (nat, s)),
            Gateway::Internet(_) => None,
        })
    }

    pub fn associations(&self) -> impl Iterator<Item = &Association> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Association(association) => Some(association),
            _ => None,
        })
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Resource(resource) => Some(resource),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CidrBlock, SubnetKind};
    use crate::topology::{ElasticIpSpec, GatewaySpec, NetworkSpec, SubnetSpec, TopologyGraph};

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn sealed() -> SealedTopology {
        let mut graph = TopologyGraph::new();
        graph
            .add_network(
                NetworkSpec::new(id("vpc"), CidrBlock::new("10.0.0.0/16").unwrap())
                    .with_zone("az-1"),
            )
            .unwrap();
        graph
            .add_subnet(SubnetSpec::new(
                id("public_a"),
                id("vpc"),
                CidrBlock::new("10.0.0.0/24").unwrap(),
                "az-1",
                SubnetKind::Public,
            ))
            .unwrap();
        graph.add_elastic_ip(ElasticIpSpec { id: id("eip") }).unwrap();
        graph
            .attach_gateway(GatewaySpec::Nat {
                id: id("nat"),
                subnet: id("public_a"),
                elastic_ip: Some(id("eip")),
            })
            .unwrap();
        graph.seal().unwrap()
    }

    #[test]
    fn test_sealed_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SealedTopology>();
    }

    #[test]
    fn test_queries() {
        let topology = sealed();

        assert_eq!(topology.networks().count(), 1);
        assert_eq!(topology.subnets_in(&id("vpc")).count(), 1);
        assert!(topology.internet_gateway(&id("vpc")).is_none());

        let vpc = id("vpc");
        let nats: Vec<_> = topology.nat_gateways(&vpc).collect();
        assert_eq!(nats.len(), 1);
        assert_eq!(nats[0].0.id, id("nat"));

        let mut deps = topology.dependencies_of(&id("nat"));
        deps.sort();
        assert_eq!(deps, vec![&id("eip"), &id("public_a")]);

        let association = id("public_a:route-table-association");
        assert!(topology.associations().any(|a| a.id == association));
        assert!(topology.dependents_of(&id("public_a")).contains(&&association));
    }
}
