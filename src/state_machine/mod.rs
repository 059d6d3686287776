// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! States are plain values; a transition is a pure function of the current
//! state and an input. [`Lifecycle`] owns a state and records every
//! transition it takes, which is what a planned node carries through apply
//! and destroy.
//!
//! ```text
//! (State, Input) → (State, Output)
//! ```
//!
//! # Example
//!
//! ```rust
//! use vpc_topology::state_machine::{NodeCommand, NodeStatus, StateMachine};
//!
//! let (next, _) = NodeStatus::Pending.transition(&NodeCommand::Dispatch).unwrap();
//! assert_eq!(next, NodeStatus::InProgress);
//! assert!(!NodeStatus::Pending.can_transition(&NodeCommand::Succeed));
//! ```

pub mod node_lifecycle;

use chrono::{DateTime, Utc};

pub use node_lifecycle::{NodeCommand, NodeStatus};

pub type TransitionResult<S> = Result<S, TransitionError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The state does not accept this input
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },
}

/// Typed finite state machine
pub trait StateMachine: Sized + Clone {
    type Input;

    /// Produced alongside the new state; `()` if none
    type Output;

    /// Next state for `input`, or an error if the input is not accepted
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Inputs accepted in this state; empty unless the machine enumerates them
    fn valid_inputs(&self) -> Vec<Self::Input>
    where
        Self::Input: Clone,
    {
        Vec::new()
    }
}

/// One recorded step of a [`Lifecycle`]
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord<S, I> {
    pub from: S,
    pub to: S,
    pub input: I,
    pub at: DateTime<Utc>,
}

/// A state plus the transitions that led to it
#[derive(Debug, Clone)]
pub struct Lifecycle<FSM: StateMachine> {
    state: FSM,
    records: Vec<TransitionRecord<FSM, FSM::Input>>,
}

impl<FSM: StateMachine> Lifecycle<FSM> {
    pub fn new(initial: FSM) -> Self {
        Self {
            state: initial,
            records: Vec::new(),
        }
    }

    pub fn state(&self) -> &FSM {
        &self.state
    }

    /// Apply `input`, recording the step; the state is untouched on error
    pub fn apply(&mut self, input: FSM::Input, at: DateTime<Utc>) -> TransitionResult<FSM::Output> {
        let (to, output) = self.state.transition(&input)?;
        let from = std::mem::replace(&mut self.state, to.clone());
        self.records.push(TransitionRecord { from, to, input, at });
        Ok(output)
    }

    /// Recorded steps, oldest first
    pub fn records(&self) -> &[TransitionRecord<FSM, FSM::Input>] {
        &self.records
    }

    /// Time of the first and last recorded step
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.records.first()?.at, self.records.last()?.at))
    }
}
