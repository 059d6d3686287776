// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network ACL Evaluation
//!
//! Stateless, first-match-wins filtering. Entries of one direction are
//! scanned in ascending rule number; the first entry whose block contains
//! the peer and whose selector matches the packet decides. When nothing
//! matches, the implicit trailing rule denies.
//!
//! Declaration order of entries never affects the outcome.

use serde::{Deserialize, Serialize};

use crate::domain::invariants::{validate_rule_numbers, ValidationResult};
use crate::domain::{AclAction, AclEntry, CidrBlock, Direction, LogicalId, NetworkAcl, Packet};
use crate::errors::{ResolutionError, TopologyResult};
use crate::topology::SealedTopology;

/// Outcome of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub action: AclAction,
    /// Matching rule; `None` for the implicit deny or a subnet without an ACL
    pub rule_number: Option<u16>,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        self.action == AclAction::Allow
    }
}

/// NACL evaluator
pub struct AclEvaluator;

impl AclEvaluator {
    /// Check rule numbers are in range and unique per direction
    pub fn validate(acl: &NetworkAcl) -> ValidationResult {
        validate_rule_numbers(&acl.id, &acl.entries)
    }

    /// Entries of `direction` in evaluation order
    pub fn ordered_entries(acl: &NetworkAcl, direction: Direction) -> Vec<&AclEntry> {
        let mut entries: Vec<&AclEntry> = acl
            .entries
            .iter()
            .filter(|e| e.direction == direction)
            .collect();
        entries.sort_by_key(|e| e.rule_number);
        entries
    }

    /// Decide a packet from/to `peer`
    pub fn evaluate(
        acl: &NetworkAcl,
        direction: Direction,
        peer: &CidrBlock,
        packet: &Packet,
    ) -> AclAction {
        Self::evaluate_with_rule(acl, direction, peer, packet).action
    }

    /// Like [`evaluate`](Self::evaluate), also naming the deciding rule
    pub fn evaluate_with_rule(
        acl: &NetworkAcl,
        direction: Direction,
        peer: &CidrBlock,
        packet: &Packet,
    ) -> Verdict {
        Self::ordered_entries(acl, direction)
            .into_iter()
            .find(|e| e.cidr.contains(peer) && e.traffic.matches(packet))
            .map(|e| Verdict {
                action: e.action,
                rule_number: Some(e.rule_number),
            })
            .unwrap_or(Verdict {
                action: AclAction::Deny,
                rule_number: None,
            })
    }

    /// Evaluate against whatever ACL is bound to `subnet`
    ///
    /// A subnet without an ACL falls back to the provider default, which
    /// allows everything.
    pub fn evaluate_for_subnet(
        topology: &SealedTopology,
        subnet: &LogicalId,
        direction: Direction,
        peer: &CidrBlock,
        packet: &Packet,
    ) -> TopologyResult<Verdict> {
        let subnet = topology
            .subnet(subnet)
            .ok_or_else(|| ResolutionError::not_found(subnet, "Subnet"))?;

        let Some(acl_id) = &subnet.network_acl else {
            return Ok(Verdict {
                action: AclAction::Allow,
                rule_number: None,
            });
        };

        let acl = topology
            .network_acl(acl_id)
            .ok_or_else(|| ResolutionError::not_found(acl_id, "Network ACL"))?;
        Ok(Self::evaluate_with_rule(acl, direction, peer, packet))
    }
}
