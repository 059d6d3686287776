// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for CIDR Allocation

use std::net::Ipv4Addr;

use proptest::prelude::*;

use vpc_topology::{AddressSpace, CidrBlock, ValidationError};

const ROOT: &str = "10.0.0.0/16";

fn root() -> CidrBlock {
    CidrBlock::new(ROOT).unwrap()
}

/// Canonical block of `prefix_len` somewhere inside 10.0.0.0/16
fn block_in_root() -> impl Strategy<Value = CidrBlock> {
    (0u32..=0xFFFF, 17u8..=28).prop_map(|(offset, prefix_len)| {
        let host_bits = 32 - u32::from(prefix_len);
        let raw = u32::from(Ipv4Addr::new(10, 0, 0, 0)) | offset;
        let address = Ipv4Addr::from(raw >> host_bits << host_bits);
        CidrBlock::from_parts(address, prefix_len).unwrap()
    })
}

// ============================================================================
// Property: Granted reservations never overlap
// ============================================================================

proptest! {
    /// Whatever sequence of requests arrives, the granted set is pairwise
    /// disjoint and every grant lies inside the root.
    #[test]
    fn prop_reservations_are_disjoint(requests in prop::collection::vec(block_in_root(), 1..40)) {
        let mut space = AddressSpace::new(root());
        let mut granted: Vec<CidrBlock> = Vec::new();

        for requested in requests {
            let overlaps_granted = granted.iter().any(|g| g.overlaps(&requested));
            match space.allocate(root(), requested) {
                Ok(reservation) => {
                    prop_assert!(!overlaps_granted);
                    prop_assert_eq!(reservation.cidr, requested);
                    granted.push(requested);
                }
                Err(ValidationError::Overlap { existing, .. }) => {
                    prop_assert!(overlaps_granted);
                    prop_assert!(existing.overlaps(&requested));
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }

        let held = space.reservations(&root());
        prop_assert_eq!(held.len(), granted.len());
        for (i, a) in held.iter().enumerate() {
            prop_assert!(root().contains(&a.cidr));
            for b in &held[i + 1..] {
                prop_assert!(!a.cidr.overlaps(&b.cidr));
            }
        }
    }

    /// First-fit allocation fills the root without gaps or overlap until it
    /// reports exhaustion.
    #[test]
    fn prop_allocate_next_until_exhausted(prefix_len in 20u8..=24) {
        let mut space = AddressSpace::new(root());
        let capacity = 1usize << (prefix_len - 16);
        let mut blocks = Vec::new();

        loop {
            match space.allocate_next(root(), prefix_len, None) {
                Ok(reservation) => blocks.push(reservation.cidr),
                Err(ValidationError::AddressSpaceExhausted { .. }) => break,
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
            prop_assert!(blocks.len() <= capacity);
        }

        prop_assert_eq!(blocks.len(), capacity);
        let total: u64 = blocks.iter().map(CidrBlock::size).sum();
        prop_assert_eq!(total, root().size());
    }

    /// Releasing a reservation makes exactly that block available again.
    #[test]
    fn prop_release_frees_block(requests in prop::collection::vec(block_in_root(), 1..20)) {
        let mut space = AddressSpace::new(root());
        let mut reservations = Vec::new();
        for requested in requests {
            if let Ok(reservation) = space.allocate(root(), requested) {
                reservations.push(reservation);
            }
        }

        let released = reservations.remove(0);
        space.release(&released);

        prop_assert!(!space.is_allocated(&released.cidr));
        prop_assert!(space.check(root(), released.cidr).is_ok());
        for kept in &reservations {
            prop_assert!(space.is_allocated(&kept.cidr));
        }
    }

    /// A block reaching outside the root is always out of bounds.
    #[test]
    fn prop_outside_root_is_out_of_bounds(third in 1u8..=255, prefix_len in 16u8..=28) {
        let mut space = AddressSpace::new(root());
        let outside = CidrBlock::from_parts(Ipv4Addr::new(10, third, 0, 0), prefix_len).unwrap();

        let is_out_of_bounds = matches!(
            space.allocate(root(), outside),
            Err(ValidationError::OutOfBounds { .. })
        );
        prop_assert!(is_out_of_bounds);
    }
}
