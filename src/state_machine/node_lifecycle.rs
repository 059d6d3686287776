// Copyright (c) 2025 - Cowboy AI, Inc.
//! Node Provisioning Lifecycle State Machine
//!
//! Formal FSM for the status of one planned node across apply and destroy.
//!
//! # States
//!
//! - Pending: not yet dispatched
//! - InProgress: create/update call issued
//! - Done: exists at the provider
//! - Failed: create/update call failed
//! - Deleting: delete call issued
//! - Deleted: removed from the provider
//! - DeleteFailed: delete call failed, resource still exists
//!
//! # Inputs
//!
//! - Dispatch: Pending → InProgress
//! - Succeed: InProgress → Done, Deleting → Deleted
//! - Fail: InProgress → Failed, Deleting → DeleteFailed
//! - Reset: Failed | Deleted | DeleteFailed → Pending
//! - BeginTeardown: Done | DeleteFailed → Deleting

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};

/// Per-node provisioning status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    InProgress,
    Done,
    Failed,
    Deleting,
    Deleted,
    DeleteFailed,
}

impl NodeStatus {
    /// Whether the resource may exist at the provider
    pub fn exists(&self) -> bool {
        matches!(
            self,
            NodeStatus::InProgress | NodeStatus::Done | NodeStatus::Deleting | NodeStatus::DeleteFailed
        )
    }

    /// Whether a provider call is outstanding
    pub fn is_in_flight(&self) -> bool {
        matches!(self, NodeStatus::InProgress | NodeStatus::Deleting)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Pending => write!(f, "pending"),
            NodeStatus::InProgress => write!(f, "in-progress"),
            NodeStatus::Done => write!(f, "done"),
            NodeStatus::Failed => write!(f, "failed"),
            NodeStatus::Deleting => write!(f, "deleting"),
            NodeStatus::Deleted => write!(f, "deleted"),
            NodeStatus::DeleteFailed => write!(f, "delete-failed"),
        }
    }
}

/// Lifecycle command (FSM input)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    /// Issue the create/update call
    Dispatch,

    /// Outstanding call returned successfully
    Succeed,

    /// Outstanding call returned an error
    Fail,

    /// Make a failed, deleted or half-deleted node eligible for apply again
    Reset,

    /// Issue the delete call
    BeginTeardown,
}

impl fmt::Display for NodeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl StateMachine for NodeStatus {
    type Input = NodeCommand;
    type Output = ();

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use NodeCommand::*;
        use NodeStatus::*;

        let next = match (self, input) {
            (Pending, Dispatch) => InProgress,
            (InProgress, Succeed) => Done,
            (InProgress, Fail) => Failed,
            (Failed, Reset) | (Deleted, Reset) | (DeleteFailed, Reset) => Pending,
            (Done, BeginTeardown) | (DeleteFailed, BeginTeardown) => Deleting,
            (Deleting, Succeed) => Deleted,
            (Deleting, Fail) => DeleteFailed,
            _ => {
                return Err(TransitionError::InvalidTransition {
                    from: self.to_string(),
                    input: input.to_string(),
                })
            }
        };

        Ok((next, ()))
    }

    fn valid_inputs(&self) -> Vec<Self::Input> {
        use NodeCommand::*;
        use NodeStatus::*;

        match self {
            Pending => vec![Dispatch],
            InProgress | Deleting => vec![Succeed, Fail],
            Done => vec![BeginTeardown],
            DeleteFailed => vec![BeginTeardown, Reset],
            Failed | Deleted => vec![Reset],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_path() {
        let (state, _) = NodeStatus::Pending
            .transition(&NodeCommand::Dispatch)
            .expect("Transition should succeed");
        assert_eq!(state, NodeStatus::InProgress);

        let (state, _) = state.transition(&NodeCommand::Succeed).unwrap();
        assert_eq!(state, NodeStatus::Done);
        assert!(state.exists());
    }

    #[test]
    fn test_failed_create_can_be_reset() {
        let (state, _) = NodeStatus::InProgress.transition(&NodeCommand::Fail).unwrap();
        assert_eq!(state, NodeStatus::Failed);
        assert!(!state.exists());

        let (state, _) = state.transition(&NodeCommand::Reset).unwrap();
        assert_eq!(state, NodeStatus::Pending);
    }

    #[test]
    fn test_teardown_path() {
        let (state, _) = NodeStatus::Done.transition(&NodeCommand::BeginTeardown).unwrap();
        assert_eq!(state, NodeStatus::Deleting);

        let (failed, _) = state.transition(&NodeCommand::Fail).unwrap();
        assert_eq!(failed, NodeStatus::DeleteFailed);
        assert!(failed.exists());

        // Teardown can be retried after a failed delete, or apply can take it back
        assert!(failed.can_transition(&NodeCommand::BeginTeardown));
        let (state_after_reset, _) = failed.transition(&NodeCommand::Reset).unwrap();
        assert_eq!(state_after_reset, NodeStatus::Pending);

        let (deleted, _) = state.transition(&NodeCommand::Succeed).unwrap();
        assert_eq!(deleted, NodeStatus::Deleted);
    }

    #[test]
    fn test_invalid_transitions() {
        let result = NodeStatus::Pending.transition(&NodeCommand::Succeed);
        assert!(matches!(
            result.unwrap_err(),
            TransitionError::InvalidTransition { .. }
        ));

        assert!(!NodeStatus::Pending.can_transition(&NodeCommand::BeginTeardown));
        assert!(!NodeStatus::Done.can_transition(&NodeCommand::Dispatch));
        assert!(!NodeStatus::Deleted.can_transition(&NodeCommand::BeginTeardown));
    }

    #[test]
    fn test_valid_inputs_agree_with_transition() {
        let states = [
            NodeStatus::Pending,
            NodeStatus::InProgress,
            NodeStatus::Done,
            NodeStatus::Failed,
            NodeStatus::Deleting,
            NodeStatus::Deleted,
            NodeStatus::DeleteFailed,
        ];

        for state in states {
            for input in state.valid_inputs() {
                assert!(state.can_transition(&input), "{state} should accept {input}");
            }
        }
    }
}
