// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Topology Invariants
//!
//! This module contains the structural rules every declared topology must
//! satisfy. All functions are pure (no side effects) and return detailed
//! validation results naming the offending logical IDs.
//!
//! # Invariant Categories
//!
//! 1. **Address Invariants**: containment and non-overlap of CIDR blocks
//! 2. **Identity Invariants**: logical IDs are unique
//! 3. **Placement Invariants**: gateways live where they can work
//! 4. **Rule Invariants**: ACL rule numbers and route destinations are unique

use std::collections::{BTreeSet, HashSet};

use super::ids::LogicalId;
use super::model::{AclEntry, Direction, SubnetKind};
use super::network::{CidrBlock, NetworkError};

/// Validation result with detailed error information
pub type ValidationResult = Result<(), ValidationError>;

/// Lowest rule number a provider accepts
pub const MIN_RULE_NUMBER: u16 = 1;

/// Highest rule number a provider accepts
pub const MAX_RULE_NUMBER: u16 = 32766;

/// Structural violation detected before any provider call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Requested block intersects a sibling reservation
    #[error("CIDR {requested} overlaps {existing}{}", owner_suffix(.owner))]
    Overlap {
        requested: CidrBlock,
        existing: CidrBlock,
        owner: Option<LogicalId>,
    },

    /// Requested block is not inside its parent
    #[error("CIDR {requested} is outside parent block {parent}")]
    OutOfBounds {
        requested: CidrBlock,
        parent: CidrBlock,
    },

    /// No free block of the requested size remains
    #[error("No free /{prefix_len} block left in {parent}")]
    AddressSpaceExhausted { parent: CidrBlock, prefix_len: u8 },

    /// Logical ID declared twice
    #[error("Logical ID already declared: {0}")]
    DuplicateId(LogicalId),

    /// Edge would close a dependency cycle
    #[error("Dependency cycle: {}", format_path(.path))]
    Cycle { path: Vec<LogicalId> },

    /// Two entries share (direction, rule number)
    #[error("ACL {acl} has duplicate {direction} rule number {rule_number}")]
    DuplicateRuleNumber {
        acl: LogicalId,
        direction: Direction,
        rule_number: u16,
    },

    /// Rule number outside the accepted range
    #[error("ACL {acl} rule number {rule_number} outside 1-32766")]
    InvalidRuleNumber { acl: LogicalId, rule_number: u16 },

    /// Gateway cannot be placed as requested
    #[error("Invalid placement of {gateway}: {reason}")]
    InvalidPlacement { gateway: LogicalId, reason: String },

    /// Route table already routes this destination
    #[error("Route table {route_table} already has a route for {destination}")]
    DuplicateRoute {
        route_table: LogicalId,
        destination: CidrBlock,
    },

    /// Subnet availability zone is not one of its network's
    #[error("Subnet {subnet} uses availability zone {zone:?} not offered by network {network}")]
    InvalidAvailabilityZone {
        subnet: LogicalId,
        network: LogicalId,
        zone: String,
    },

    /// Malformed address data
    #[error("Invalid address: {0}")]
    InvalidCidr(#[from] NetworkError),

    /// Object references something that belongs to another network
    #[error("{id} references {reference} outside network {network}")]
    ForeignReference {
        id: LogicalId,
        reference: LogicalId,
        network: LogicalId,
    },
}

fn owner_suffix(owner: &Option<LogicalId>) -> String {
    match owner {
        Some(id) => format!(" (reserved by {})", id),
        None => String::new(),
    }
}

fn format_path(path: &[LogicalId]) -> String {
    path.iter()
        .map(LogicalId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Validate a block lies inside its parent
pub fn validate_within(parent: &CidrBlock, requested: &CidrBlock) -> ValidationResult {
    if !parent.contains(requested) {
        return Err(ValidationError::OutOfBounds {
            requested: *requested,
            parent: *parent,
        });
    }
    Ok(())
}

/// Validate a block does not intersect any sibling
///
/// # Parameters
/// - `siblings`: existing blocks with their owning logical ID, if any
pub fn validate_no_overlap<'a>(
    requested: &CidrBlock,
    siblings: impl IntoIterator<Item = (&'a CidrBlock, Option<&'a LogicalId>)>,
) -> ValidationResult {
    for (existing, owner) in siblings {
        if existing.overlaps(requested) {
            return Err(ValidationError::Overlap {
                requested: *requested,
                existing: *existing,
                owner: owner.cloned(),
            });
        }
    }
    Ok(())
}

/// Validate a logical ID is not already taken
pub fn validate_unique_id(id: &LogicalId, taken: impl Fn(&LogicalId) -> bool) -> ValidationResult {
    if taken(id) {
        return Err(ValidationError::DuplicateId(id.clone()));
    }
    Ok(())
}

/// Validate the subnet's zone is offered by its network
pub fn validate_availability_zone(
    subnet: &LogicalId,
    network: &LogicalId,
    zone: &str,
    zones: &BTreeSet<String>,
) -> ValidationResult {
    if !zones.contains(zone) {
        return Err(ValidationError::InvalidAvailabilityZone {
            subnet: subnet.clone(),
            network: network.clone(),
            zone: zone.to_string(),
        });
    }
    Ok(())
}

/// Validate a NAT gateway placement
///
/// # Rules
/// - Placement subnet must be Public
/// - An elastic IP must be bound
/// - The elastic IP must not already serve another NAT gateway
pub fn validate_nat_placement(
    gateway: &LogicalId,
    subnet: &LogicalId,
    subnet_kind: SubnetKind,
    elastic_ip: Option<&LogicalId>,
    elastic_ip_bound_to: Option<&LogicalId>,
) -> ValidationResult {
    if subnet_kind != SubnetKind::Public {
        return Err(ValidationError::InvalidPlacement {
            gateway: gateway.clone(),
            reason: format!("subnet {} is {}, NAT gateways need a public subnet", subnet, subnet_kind),
        });
    }

    let Some(eip) = elastic_ip else {
        return Err(ValidationError::InvalidPlacement {
            gateway: gateway.clone(),
            reason: "no elastic IP bound".to_string(),
        });
    };

    if let Some(other) = elastic_ip_bound_to {
        return Err(ValidationError::InvalidPlacement {
            gateway: gateway.clone(),
            reason: format!("elastic IP {} is already bound to {}", eip, other),
        });
    }

    Ok(())
}

/// Validate rule numbers of one ACL
///
/// # Rules
/// - Every rule number is within 1-32766
/// - (direction, rule number) is unique
pub fn validate_rule_numbers(acl: &LogicalId, entries: &[AclEntry]) -> ValidationResult {
    let mut seen = HashSet::new();
    for entry in entries {
        if !(MIN_RULE_NUMBER..=MAX_RULE_NUMBER).contains(&entry.rule_number) {
            return Err(ValidationError::InvalidRuleNumber {
                acl: acl.clone(),
                rule_number: entry.rule_number,
            });
        }
        if !seen.insert((entry.direction, entry.rule_number)) {
            return Err(ValidationError::DuplicateRuleNumber {
                acl: acl.clone(),
                direction: entry.direction,
                rule_number: entry.rule_number,
            });
        }
    }
    Ok(())
}

/// Validate a destination is not yet routed by a table
pub fn validate_unique_destination<'a>(
    route_table: &LogicalId,
    destination: &CidrBlock,
    existing: impl IntoIterator<Item = &'a CidrBlock>,
) -> ValidationResult {
    if existing.into_iter().any(|d| d == destination) {
        return Err(ValidationError::DuplicateRoute {
            route_table: route_table.clone(),
            destination: *destination,
        });
    }
    Ok(())
}
