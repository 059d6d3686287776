// Copyright (c) 2025 - Cowboy AI, Inc.
//! CIDR Reservation Ledger
//!
//! Validates and allocates CIDR blocks under a parent block. One
//! [`AddressSpace`] exists per network, rooted at the network's primary CIDR,
//! so independent networks may reuse the same ranges.
//!
//! Reservations under the same parent never overlap. Reservations are kept in
//! a `BTreeMap` keyed by network address, which makes first-fit gap search a
//! single ordered walk.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::invariants::{validate_no_overlap, validate_within};
use crate::domain::{CidrBlock, LogicalId, NetworkError, ValidationError};

/// A granted block under a parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub parent: CidrBlock,
    pub cidr: CidrBlock,
    /// Logical ID the block was reserved for, if any
    pub owner: Option<LogicalId>,
}

/// Per-network CIDR allocation ledger
#[derive(Debug, Clone)]
pub struct AddressSpace {
    root: CidrBlock,
    /// parent block → (network address → reservation)
    allocated: HashMap<CidrBlock, BTreeMap<u32, Reservation>>,
}

impl AddressSpace {
    /// Create a ledger rooted at `root`
    pub fn new(root: CidrBlock) -> Self {
        Self {
            root,
            allocated: HashMap::new(),
        }
    }

    pub fn root(&self) -> CidrBlock {
        self.root
    }

    /// Reserve `requested` under `parent`
    ///
    /// # Errors
    /// - `OutOfBounds` if `requested ⊄ parent` or `parent ⊄ root`
    /// - `Overlap` if `requested` intersects a sibling reservation
    pub fn allocate(
        &mut self,
        parent: CidrBlock,
        requested: CidrBlock,
    ) -> Result<Reservation, ValidationError> {
        self.allocate_for(parent, requested, None)
    }

    /// Reserve `requested` under `parent` on behalf of `owner`
    pub fn allocate_for(
        &mut self,
        parent: CidrBlock,
        requested: CidrBlock,
        owner: Option<&LogicalId>,
    ) -> Result<Reservation, ValidationError> {
        self.check(parent, requested)?;
        Ok(self.insert(parent, requested, owner))
    }

    /// Check a reservation would succeed without recording it
    pub fn check(&self, parent: CidrBlock, requested: CidrBlock) -> Result<(), ValidationError> {
        validate_within(&self.root, &parent)?;
        validate_within(&parent, &requested)?;

        if let Some(siblings) = self.allocated.get(&parent) {
            validate_no_overlap(
                &requested,
                siblings.values().map(|r| (&r.cidr, r.owner.as_ref())),
            )?;
        }
        Ok(())
    }

    /// Reserve the lowest free aligned block of `prefix_len` under `parent`
    ///
    /// # Errors
    /// - `OutOfBounds` if the block would be larger than `parent`
    /// - `AddressSpaceExhausted` if no gap fits
    pub fn allocate_next(
        &mut self,
        parent: CidrBlock,
        prefix_len: u8,
        owner: Option<&LogicalId>,
    ) -> Result<Reservation, ValidationError> {
        let cidr = self.find_gap(parent, prefix_len)?;
        Ok(self.insert(parent, cidr, owner))
    }

    /// Find the first free aligned block without reserving it
    pub fn find_gap(&self, parent: CidrBlock, prefix_len: u8) -> Result<CidrBlock, ValidationError> {
        validate_within(&self.root, &parent)?;

        if prefix_len > 32 {
            return Err(NetworkError::InvalidPrefixLength(prefix_len).into());
        }
        if prefix_len < parent.prefix_len() {
            let requested = Ipv4Net::new(parent.network(), prefix_len)
                .map(CidrBlock::from)
                .unwrap_or(parent);
            return Err(ValidationError::OutOfBounds { requested, parent });
        }

        let block_size = 1u64 << (32 - u32::from(prefix_len));
        let space_start = u64::from(u32::from(parent.network()));
        let space_end = u64::from(u32::from(parent.broadcast()));

        let mut current = space_start;
        if let Some(siblings) = self.allocated.get(&parent) {
            for reservation in siblings.values() {
                let block_start = u64::from(u32::from(reservation.cidr.network()));
                let block_end = u64::from(u32::from(reservation.cidr.broadcast()));

                let aligned = align_up(current, block_size);
                if aligned + block_size - 1 < block_start {
                    return block_at(aligned, prefix_len);
                }
                current = current.max(block_end + 1);
            }
        }

        let aligned = align_up(current, block_size);
        if aligned + block_size - 1 <= space_end {
            return block_at(aligned, prefix_len);
        }

        Err(ValidationError::AddressSpaceExhausted { parent, prefix_len })
    }

    /// Release a reservation; no-op if it is not held
    pub fn release(&mut self, reservation: &Reservation) {
        let key = u32::from(reservation.cidr.network());
        if let Some(siblings) = self.allocated.get_mut(&reservation.parent) {
            let held = siblings
                .get(&key)
                .is_some_and(|r| r.cidr == reservation.cidr);
            if held {
                siblings.remove(&key);
                debug!("Released {} under {}", reservation.cidr, reservation.parent);
            }
        }
    }

    /// Reservations under `parent` in address order
    pub fn reservations(&self, parent: &CidrBlock) -> Vec<&Reservation> {
        self.allocated
            .get(parent)
            .map(|siblings| siblings.values().collect())
            .unwrap_or_default()
    }

    /// Whether exactly this block is reserved under any parent
    pub fn is_allocated(&self, cidr: &CidrBlock) -> bool {
        let key = u32::from(cidr.network());
        self.allocated
            .values()
            .any(|siblings| siblings.get(&key).is_some_and(|r| r.cidr == *cidr))
    }

    fn insert(&mut self, parent: CidrBlock, cidr: CidrBlock, owner: Option<&LogicalId>) -> Reservation {
        let reservation = Reservation {
            parent,
            cidr,
            owner: owner.cloned(),
        };
        self.allocated
            .entry(parent)
            .or_default()
            .insert(u32::from(cidr.network()), reservation.clone());
        debug!("Reserved {} under {}", cidr, parent);
        reservation
    }
}

fn align_up(addr: u64, block_size: u64) -> u64 {
    addr.div_ceil(block_size) * block_size
}

fn block_at(start: u64, prefix_len: u8) -> Result<CidrBlock, ValidationError> {
    // start < 2^32 because it never exceeds the parent's broadcast address
    let address = Ipv4Addr::from(start as u32);
    Ok(CidrBlock::from_parts(address, prefix_len)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> CidrBlock {
        CidrBlock::new(s).unwrap()
    }

    fn vpc() -> AddressSpace {
        AddressSpace::new(cidr("10.0.0.0/16"))
    }

    #[test]
    fn test_allocate_within_parent() {
        let mut space = vpc();
        let root = space.root();

        let r = space.allocate(root, cidr("10.0.0.0/24")).unwrap();
        assert_eq!(r.cidr, cidr("10.0.0.0/24"));
        assert!(space.is_allocated(&cidr("10.0.0.0/24")));
        assert_eq!(space.reservations(&root).len(), 1);
    }

    #[test]
    fn test_allocate_out_of_bounds() {
        let mut space = vpc();
        let root = space.root();

        let result = space.allocate(root, cidr("10.1.0.0/24"));
        assert_eq!(
            result,
            Err(ValidationError::OutOfBounds {
                requested: cidr("10.1.0.0/24"),
                parent: root,
            })
        );
        assert!(space.reservations(&root).is_empty());
    }

    #[test]
    fn test_allocate_overlap() {
        let mut space = vpc();
        let root = space.root();
        let owner = LogicalId::new("subnet_a").unwrap();

        space
            .allocate_for(root, cidr("10.0.0.0/24"), Some(&owner))
            .unwrap();

        let result = space.allocate(root, cidr("10.0.0.128/25"));
        assert_eq!(
            result,
            Err(ValidationError::Overlap {
                requested: cidr("10.0.0.128/25"),
                existing: cidr("10.0.0.0/24"),
                owner: Some(owner),
            })
        );

        // Supernet of an existing block also overlaps
        assert!(space.allocate(root, cidr("10.0.0.0/20")).is_err());
    }

    #[test]
    fn test_siblings_are_scoped_to_parent() {
        let mut space = vpc();
        let root = space.root();
        let tier = cidr("10.0.0.0/20");

        space.allocate(root, tier).unwrap();
        // Nested reservation under a different parent does not clash with the tier itself
        space.allocate(tier, cidr("10.0.1.0/24")).unwrap();
        assert!(space.allocate(tier, cidr("10.0.1.0/25")).is_err());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut space = vpc();
        let root = space.root();

        let r = space.allocate(root, cidr("10.0.0.0/24")).unwrap();
        space.release(&r);
        space.release(&r);
        assert!(!space.is_allocated(&r.cidr));

        // Block can be reserved again after release
        assert!(space.allocate(root, cidr("10.0.0.0/24")).is_ok());
    }

    #[test]
    fn test_allocate_next_first_fit() {
        let mut space = vpc();
        let root = space.root();

        space.allocate(root, cidr("10.0.0.0/24")).unwrap();
        space.allocate(root, cidr("10.0.2.0/24")).unwrap();

        let next = space.allocate_next(root, 24, None).unwrap();
        assert_eq!(next.cidr, cidr("10.0.1.0/24"));

        let next = space.allocate_next(root, 24, None).unwrap();
        assert_eq!(next.cidr, cidr("10.0.3.0/24"));

        // Larger block skips to the next aligned boundary
        let next = space.allocate_next(root, 22, None).unwrap();
        assert_eq!(next.cidr, cidr("10.0.4.0/22"));
    }

    #[test]
    fn test_allocate_next_exhausted() {
        let mut space = AddressSpace::new(cidr("10.0.0.0/24"));
        let root = space.root();

        space.allocate_next(root, 25, None).unwrap();
        space.allocate_next(root, 25, None).unwrap();

        assert_eq!(
            space.allocate_next(root, 25, None),
            Err(ValidationError::AddressSpaceExhausted {
                parent: root,
                prefix_len: 25,
            })
        );
        assert!(matches!(
            space.allocate_next(root, 16, None),
            Err(ValidationError::OutOfBounds { .. })
        ));
    }
}
