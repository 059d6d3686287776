// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for ACL Evaluation

use std::net::Ipv4Addr;

use proptest::prelude::*;

use vpc_topology::domain::{NetworkAcl, PortRange, TrafficSelector};
use vpc_topology::{AclAction, AclEntry, AclEvaluator, CidrBlock, Direction, LogicalId, Packet};

fn action() -> impl Strategy<Value = AclAction> {
    prop_oneof![Just(AclAction::Allow), Just(AclAction::Deny)]
}

fn traffic() -> impl Strategy<Value = TrafficSelector> {
    prop_oneof![
        Just(TrafficSelector::All),
        (0u16..1024, 0u16..1024).prop_map(|(a, b)| TrafficSelector::Tcp {
            ports: PortRange {
                from: a.min(b),
                to: a.max(b),
            },
        }),
        Just(TrafficSelector::any_icmp()),
    ]
}

fn block() -> impl Strategy<Value = CidrBlock> {
    (any::<u32>(), 0u8..=32).prop_map(|(raw, prefix_len)| {
        let host_bits = 32 - u32::from(prefix_len);
        let network = if host_bits == 32 { 0 } else { raw >> host_bits << host_bits };
        CidrBlock::from_parts(Ipv4Addr::from(network), prefix_len).unwrap()
    })
}

/// Entries with distinct rule numbers, in arbitrary insertion order
fn entries() -> impl Strategy<Value = Vec<AclEntry>> {
    prop::collection::btree_set(1u16..=32766, 0..12)
        .prop_flat_map(|numbers| {
            let numbers: Vec<u16> = numbers.into_iter().collect();
            let len = numbers.len();
            (
                Just(numbers),
                prop::collection::vec((action(), block(), traffic()), len),
            )
        })
        .prop_map(|(numbers, rules)| {
            numbers
                .into_iter()
                .zip(rules)
                .map(|(rule_number, (action, cidr, traffic))| AclEntry {
                    rule_number,
                    cidr,
                    traffic,
                    action,
                    direction: Direction::Ingress,
                })
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

fn acl(entries: Vec<AclEntry>) -> NetworkAcl {
    NetworkAcl {
        id: LogicalId::new("acl").unwrap(),
        network: LogicalId::new("vpc").unwrap(),
        entries,
    }
}

proptest! {
    /// The verdict depends on rule numbers, never on insertion order.
    #[test]
    fn prop_verdict_independent_of_insertion_order(
        entries in entries(),
        peer in any::<u32>(),
        port in 0u16..1024,
    ) {
        let peer = CidrBlock::host(Ipv4Addr::from(peer));
        let mut sorted = entries.clone();
        sorted.sort_by_key(|e| e.rule_number);

        let shuffled = acl(entries);
        prop_assert!(AclEvaluator::validate(&shuffled).is_ok());

        let sorted = acl(sorted);
        for packet in [Packet::tcp(port), Packet::icmp((port % 256) as u8, 0)] {
            prop_assert_eq!(
                AclEvaluator::evaluate_with_rule(&shuffled, Direction::Ingress, &peer, &packet),
                AclEvaluator::evaluate_with_rule(&sorted, Direction::Ingress, &peer, &packet)
            );
        }
    }

    /// The deciding rule is the lowest-numbered matching entry; with no
    /// match the verdict is the implicit deny.
    #[test]
    fn prop_lowest_matching_rule_decides(
        entries in entries(),
        peer in any::<u32>(),
        port in 0u16..1024,
    ) {
        let peer = CidrBlock::host(Ipv4Addr::from(peer));
        let packet = Packet::tcp(port);
        let expected = entries
            .iter()
            .filter(|e| e.cidr.contains(&peer) && e.traffic.matches(&packet))
            .min_by_key(|e| e.rule_number);

        let verdict = AclEvaluator::evaluate_with_rule(
            &acl(entries.clone()),
            Direction::Ingress,
            &peer,
            &packet,
        );

        match expected {
            Some(entry) => {
                prop_assert_eq!(verdict.rule_number, Some(entry.rule_number));
                prop_assert_eq!(verdict.action, entry.action);
            }
            None => {
                prop_assert_eq!(verdict.rule_number, None);
                prop_assert_eq!(verdict.action, AclAction::Deny);
            }
        }
    }
}
