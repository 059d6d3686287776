// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Plan Execution
//!
//! Generates topologies of varying shape and checks that apply creates
//! everything within the concurrency limit and destroy removes it all.

use std::sync::Arc;

use proptest::prelude::*;

use vpc_topology::topology::{
    ElasticIpSpec, GatewaySpec, NetworkSpec, SubnetAddressing, SubnetSpec,
};
use vpc_topology::{
    CancellationFlag, CidrBlock, InMemoryProvider, LogicalId, PlannerConfig, ProvisioningPlanner,
    RoutingResolver, SealedTopology, SubnetKind, TopologyGraph,
};

fn id(s: &str) -> LogicalId {
    LogicalId::new(s).unwrap()
}

fn kind() -> impl Strategy<Value = SubnetKind> {
    prop_oneof![
        Just(SubnetKind::Public),
        Just(SubnetKind::Private),
        Just(SubnetKind::Isolated),
    ]
}

/// Edge subnet with IGW and NAT, plus generated subnets carved by mask
fn topology(kinds: &[SubnetKind]) -> SealedTopology {
    let mut graph = TopologyGraph::new();
    graph
        .add_network(NetworkSpec::new(id("vpc"), CidrBlock::new("10.0.0.0/16").unwrap()).with_zone("az-1"))
        .unwrap();
    graph
        .add_subnet(
            SubnetSpec::new(
                id("edge"),
                id("vpc"),
                CidrBlock::new("10.0.0.0/24").unwrap(),
                "az-1",
                SubnetKind::Public,
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
    graph.add_elastic_ip(ElasticIpSpec { id: id("eip") }).unwrap();
    graph
        .attach_gateway(GatewaySpec::Nat {
            id: id("nat"),
            subnet: id("edge"),
            elastic_ip: Some(id("eip")),
        })
        .unwrap();

    for (i, kind) in kinds.iter().enumerate() {
        let mut spec = SubnetSpec::new(
            id(&format!("subnet_{}", i)),
            id("vpc"),
            CidrBlock::any(),
            "az-1",
            *kind,
        )
        .with_egress(CidrBlock::any());
        spec.address = SubnetAddressing::CidrMask(24);
        graph.add_subnet(spec).unwrap();
    }

    graph.seal().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_apply_then_destroy_is_clean(
        kinds in prop::collection::vec(kind(), 0..8),
        concurrency in 1usize..6,
    ) {
        let topology = topology(&kinds);
        let routes = RoutingResolver::resolve(&topology);
        prop_assert!(routes.failures().is_empty());

        let provider = Arc::new(InMemoryProvider::new());
        let planner = ProvisioningPlanner::new(
            provider.clone(),
            PlannerConfig::new(concurrency).unwrap(),
        );
        let mut plan = planner.plan(&topology, &routes).unwrap();
        let cancel = CancellationFlag::new();

        let (created, remaining) = tokio_test::block_on(async {
            let report = planner.apply(&mut plan, &cancel).await.unwrap();
            assert!(report.is_success());
            let created = provider.resource_count().await;

            planner.destroy(&mut plan, &cancel).await.unwrap();
            (created, provider.resource_count().await)
        });

        prop_assert_eq!(created, plan.len());
        prop_assert_eq!(remaining, 0);
        prop_assert!(provider.max_in_flight() <= concurrency);
    }

    /// Generated subnets get distinct, non-overlapping /24 blocks.
    #[test]
    fn prop_masked_subnets_do_not_overlap(kinds in prop::collection::vec(kind(), 1..16)) {
        let topology = topology(&kinds);
        let blocks: Vec<CidrBlock> = topology.subnets().map(|s| s.cidr).collect();

        prop_assert_eq!(blocks.len(), kinds.len() + 1);
        for (i, a) in blocks.iter().enumerate() {
            prop_assert_eq!(a.prefix_len(), 24);
            for b in &blocks[i + 1..] {
                prop_assert!(!a.overlaps(b));
            }
        }
    }
}
