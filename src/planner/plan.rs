// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Plan
//!
//! An ordered list of actions, one per node, in an order where every node
//! comes after everything it depends on. The plan also carries the live
//! status of each node, so the same plan is used to apply and later to
//! destroy.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::domain::{LogicalId, ResourceKind};
use crate::errors::TopologyResult;
use crate::state_machine::{Lifecycle, NodeCommand, NodeStatus, StateMachine};

use super::provider::ProviderRef;

/// What apply does with a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Reconcile an existing resource
    Update,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// One node of the plan
#[derive(Debug, Clone, Serialize)]
pub struct PlannedAction {
    pub logical_id: LogicalId,
    pub kind: ResourceKind,
    pub action: ActionType,
    pub depends_on: Vec<LogicalId>,
    pub properties: serde_json::Value,
    pub provider_ref: Option<ProviderRef>,
    #[serde(rename = "status", serialize_with = "serialize_status")]
    lifecycle: Lifecycle<NodeStatus>,
    pub error: Option<String>,
}

fn serialize_status<S: Serializer>(
    lifecycle: &Lifecycle<NodeStatus>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    lifecycle.state().serialize(serializer)
}

impl PlannedAction {
    pub fn new(
        logical_id: LogicalId,
        kind: ResourceKind,
        depends_on: Vec<LogicalId>,
        properties: serde_json::Value,
    ) -> Self {
        Self {
            logical_id,
            kind,
            action: ActionType::Create,
            depends_on,
            properties,
            provider_ref: None,
            lifecycle: Lifecycle::new(NodeStatus::Pending),
            error: None,
        }
    }

    pub fn status(&self) -> NodeStatus {
        *self.lifecycle.state()
    }

    /// Status changes recorded so far, oldest first
    pub fn history(&self) -> Vec<(NodeStatus, NodeStatus, DateTime<Utc>)> {
        self.lifecycle
            .records()
            .iter()
            .map(|t| (t.from, t.to, t.at))
            .collect()
    }

    /// Advance the node's lifecycle
    pub(crate) fn advance(&mut self, command: NodeCommand) -> TopologyResult<()> {
        self.lifecycle.apply(command, Utc::now())?;
        Ok(())
    }

    pub(crate) fn can_advance(&self, command: NodeCommand) -> bool {
        self.status().can_transition(&command)
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}

/// Ordered plan with per-node status
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub actions: Vec<PlannedAction>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    positions: HashMap<LogicalId, usize>,
}

impl Plan {
    /// Build from actions already in dependency order
    pub fn new(actions: Vec<PlannedAction>) -> Self {
        let positions = actions
            .iter()
            .enumerate()
            .map(|(i, a)| (a.logical_id.clone(), i))
            .collect();
        Self {
            actions,
            created_at: Utc::now(),
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, logical_id: &LogicalId) -> Option<&PlannedAction> {
        self.position(logical_id).map(|i| &self.actions[i])
    }

    pub fn position(&self, logical_id: &LogicalId) -> Option<usize> {
        self.positions.get(logical_id).copied()
    }

    pub fn status(&self, logical_id: &LogicalId) -> Option<NodeStatus> {
        self.get(logical_id).map(PlannedAction::status)
    }

    /// Logical IDs in creation order
    pub fn order(&self) -> Vec<&LogicalId> {
        self.actions.iter().map(|a| &a.logical_id).collect()
    }

    pub fn has_changes(&self) -> bool {
        self.actions.iter().any(|a| a.action != ActionType::NoOp)
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&PlannedAction> {
        self.actions
            .iter()
            .filter(|a| a.action == action_type)
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }

    /// Position lists: for each action, the positions it depends on
    pub(crate) fn dependency_positions(&self) -> Vec<Vec<usize>> {
        self.actions
            .iter()
            .map(|a| {
                a.depends_on
                    .iter()
                    .filter_map(|d| self.position(d))
                    .collect()
            })
            .collect()
    }

    /// Position lists: for each action, the positions depending on it
    pub(crate) fn dependent_positions(&self) -> Vec<Vec<usize>> {
        let mut dependents = vec![Vec::new(); self.actions.len()];
        for (i, deps) in self.dependency_positions().into_iter().enumerate() {
            for d in deps {
                dependents[d].push(i);
            }
        }
        dependents
    }

    /// Carry provider state over from a previously applied plan
    ///
    /// Nodes that exist at the provider keep their reference. Unchanged ones
    /// become `NoOp` and count as done; changed ones become `Update`. Nodes
    /// new to this plan stay `Create`.
    pub fn adopt(&mut self, previous: &Plan) -> TopologyResult<()> {
        for action in &mut self.actions {
            let Some(old) = previous.get(&action.logical_id) else {
                continue;
            };
            let Some(provider_ref) = old.provider_ref.as_ref() else {
                continue;
            };
            if !old.status().exists() || old.kind != action.kind {
                continue;
            }

            action.provider_ref = Some(provider_ref.clone());
            if old.properties == action.properties && old.depends_on == action.depends_on {
                action.action = ActionType::NoOp;
                action.advance(NodeCommand::Dispatch)?;
                action.advance(NodeCommand::Succeed)?;
            } else {
                action.action = ActionType::Update;
            }
        }
        Ok(())
    }
}
