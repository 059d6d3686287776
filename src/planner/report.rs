// Copyright (c) 2025 - Cowboy AI, Inc.
//! Execution reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{LogicalId, ResourceKind};
use crate::errors::{ProviderError, TopologyResult};
use crate::state_machine::NodeStatus;

use super::plan::{ActionType, Plan};
use super::provider::ProviderRef;

/// Which run produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Apply,
    Destroy,
}

/// Final state of one node after a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub logical_id: LogicalId,
    pub kind: ResourceKind,
    pub action: ActionType,
    pub status: NodeStatus,
    pub provider_ref: Option<ProviderRef>,
    pub error: Option<String>,
}

/// Result of an apply or destroy run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run: RunKind,
    pub provider: String,
    /// One entry per plan node, in plan order
    pub entries: Vec<ReportEntry>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    /// Snapshot `plan` at the end of a run
    pub(crate) fn snapshot(
        run: RunKind,
        provider: &str,
        plan: &Plan,
        cancelled: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        let entries = plan
            .actions
            .iter()
            .map(|a| ReportEntry {
                logical_id: a.logical_id.clone(),
                kind: a.kind.clone(),
                action: match run {
                    RunKind::Apply => a.action,
                    RunKind::Destroy => ActionType::Delete,
                },
                status: a.status(),
                provider_ref: a.provider_ref.clone(),
                error: a.error.clone(),
            })
            .collect();

        Self {
            run,
            provider: provider.to_string(),
            entries,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn entry(&self, logical_id: &LogicalId) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| &e.logical_id == logical_id)
    }

    pub fn with_status(&self, status: NodeStatus) -> Vec<&ReportEntry> {
        self.entries.iter().filter(|e| e.status == status).collect()
    }

    pub fn is_success(&self) -> bool {
        !self.cancelled
            && self
                .entries
                .iter()
                .all(|e| !matches!(e.status, NodeStatus::Failed | NodeStatus::DeleteFailed))
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn to_json(&self) -> TopologyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A node whose provider call failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedNode {
    pub logical_id: LogicalId,
    pub kind: ResourceKind,
    pub error: ProviderError,
}

/// Outcome of a run that stopped on a provider error, or that could not
/// reach every node
///
/// Nothing is rolled back: `succeeded` nodes exist at the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{} failed ({} succeeded, {} not attempted): {}", .failed.len(), .succeeded.len(), .not_attempted.len(), first_error(.failed))]
pub struct PartialFailure {
    /// Nodes completed by this run
    pub succeeded: Vec<LogicalId>,
    pub failed: Vec<FailedNode>,
    /// Nodes that still needed work when the run stopped
    pub not_attempted: Vec<LogicalId>,
    pub report: ExecutionReport,
}

fn first_error(failed: &[FailedNode]) -> String {
    failed
        .first()
        .map(|f| format!("{}: {}", f.logical_id, f.error.message))
        .unwrap_or_else(|| "dependencies never became ready".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_message() {
        let now = Utc::now();
        let failure = PartialFailure {
            succeeded: vec![LogicalId::new("vpc").unwrap()],
            failed: vec![FailedNode {
                logical_id: LogicalId::new("subnet").unwrap(),
                kind: ResourceKind::Subnet,
                error: ProviderError::new("quota exceeded"),
            }],
            not_attempted: vec![],
            report: ExecutionReport {
                run: RunKind::Apply,
                provider: "test".to_string(),
                entries: vec![],
                cancelled: false,
                started_at: now,
                finished_at: now,
            },
        };

        assert_eq!(
            failure.to_string(),
            "1 failed (1 succeeded, 0 not attempted): subnet: quota exceeded"
        );
    }
}
