// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Planner
//!
//! Orders a sealed topology plus its resolved routes into a [`Plan`] and
//! executes it against a [`ResourceProvider`].
//!
//! # Execution Model
//!
//! ```text
//! Plan ──dispatch ready nodes──▶ FuturesUnordered (≤ concurrency limit)
//!   ▲                                   │
//!   └────── status update ◀─── completion
//! ```
//!
//! A single coordinator owns the plan. Provider calls run concurrently, but
//! only the coordinator touches node status, so no locking is needed.
//!
//! - Apply dispatches a node once every dependency is `Done`.
//! - Destroy deletes a node once every dependent is gone.
//! - After a provider error no new node is dispatched; calls in flight are
//!   allowed to finish and the run ends with [`PartialFailure`].
//! - Nothing is rolled back and nothing is retried.

pub mod plan;
pub mod provider;
pub mod report;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::config::PlannerConfig;
use crate::domain::{LogicalId, ResourceKind, RouteTarget};
use crate::errors::{ProviderError, ResolutionError, TopologyResult};
use crate::routing::RoutingResolver;
use crate::state_machine::{NodeCommand, NodeStatus};
use crate::topology::{Node, SealedTopology};

pub use plan::{ActionType, Plan, PlanSummary, PlannedAction};
pub use provider::{InMemoryProvider, NodeSpec, Operation, ProviderRef, ResourceProvider};
pub use report::{ExecutionReport, FailedNode, PartialFailure, ReportEntry, RunKind};

type Completion<T> = BoxFuture<'static, (usize, Result<T, ProviderError>)>;

/// Cooperative stop signal for apply and destroy
///
/// Once set, no new provider call is dispatched; calls already in flight
/// finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct ProvisioningPlanner {
    provider: Arc<dyn ResourceProvider>,
    config: PlannerConfig,
}

impl ProvisioningPlanner {
    pub fn new(provider: Arc<dyn ResourceProvider>, config: PlannerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Order every node and provisioned route
    ///
    /// Ready nodes are taken by tier (network, subnet, tables, gateways,
    /// routes, associations, leaf resources), then by declaration order.
    ///
    /// # Errors
    /// - The first resolution failure recorded on `routes`
    pub fn plan(&self, topology: &SealedTopology, routes: &RoutingResolver) -> TopologyResult<Plan> {
        if let Some(failure) = routes.failures().first() {
            return Err(failure.clone().into());
        }

        let mut deps = topology.dependency_graph().clone();
        let mut kinds = Vec::with_capacity(deps.len());
        let mut properties = Vec::with_capacity(deps.len());

        for (_, node) in topology.nodes() {
            kinds.push(node.kind());
            properties.push(node_properties(node)?);
        }

        for route in routes.provisioned_routes() {
            let index = deps.add_node(route.id.clone())?;
            let table = deps
                .index_of(&route.route_table)
                .ok_or_else(|| ResolutionError::not_found(&route.route_table, "Route table"))?;
            deps.add_edge(index, table)?;

            if let RouteTarget::Gateway(gateway) = &route.target {
                let target = deps
                    .index_of(gateway)
                    .ok_or_else(|| ResolutionError::not_found(gateway, "Gateway"))?;
                deps.add_edge(index, target)?;
            }

            kinds.push(ResourceKind::Route);
            properties.push(serde_json::to_value(route)?);
        }

        let order = deps.topological_order(|i| (kinds[i.index()].tier(), i.index()));
        let actions: Vec<PlannedAction> = order
            .into_iter()
            .map(|i| {
                PlannedAction::new(
                    deps.id(i).clone(),
                    kinds[i.index()].clone(),
                    deps.dependencies(i).map(|d| deps.id(d).clone()).collect(),
                    properties[i.index()].clone(),
                )
            })
            .collect();

        let plan = Plan::new(actions);
        info!("Planned {} actions: {}", plan.len(), plan.summary());
        Ok(plan)
    }

    /// Create or update every pending node
    ///
    /// Failed and deleted nodes from earlier runs become pending again, so
    /// calling `apply` after fixing a failure resumes where it stopped. A node
    /// whose delete failed is reconciled: updated if it still exists,
    /// re-created otherwise.
    pub async fn apply(
        &self,
        plan: &mut Plan,
        cancel: &CancellationFlag,
    ) -> TopologyResult<ExecutionReport> {
        let started_at = Utc::now();
        info!(
            "Applying {} actions via {} (concurrency {})",
            plan.len(),
            self.provider.name(),
            self.config.concurrency_limit()
        );

        for action in &mut plan.actions {
            if action.can_advance(NodeCommand::Reset) {
                match action.status() {
                    NodeStatus::Deleted => {
                        action.provider_ref = None;
                        action.action = ActionType::Create;
                    }
                    NodeStatus::DeleteFailed => action.action = ActionType::Update,
                    _ => {}
                }
                action.advance(NodeCommand::Reset)?;
                action.error = None;
            }
        }

        let dependencies = plan.dependency_positions();
        let mut in_flight: FuturesUnordered<Completion<ProviderRef>> = FuturesUnordered::new();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut halted = false;
        let mut cancelled = false;

        loop {
            if !halted && cancel.is_cancelled() {
                warn!("Apply cancelled; waiting for {} calls in flight", in_flight.len());
                halted = true;
                cancelled = true;
            }

            if !halted {
                for pos in 0..plan.len() {
                    if in_flight.len() >= self.config.concurrency_limit() {
                        break;
                    }

                    let action = &plan.actions[pos];
                    let ready = action.status() == NodeStatus::Pending
                        && dependencies[pos]
                            .iter()
                            .all(|&d| plan.actions[d].status() == NodeStatus::Done);
                    if !ready {
                        continue;
                    }

                    let spec = NodeSpec {
                        properties: action.properties.clone(),
                        dependencies: dependencies[pos]
                            .iter()
                            .filter_map(|&d| plan.actions[d].provider_ref.clone())
                            .collect(),
                    };
                    let call = apply_one(
                        Arc::clone(&self.provider),
                        action.action,
                        action.kind.clone(),
                        action.logical_id.clone(),
                        action.provider_ref.clone(),
                        spec,
                    );

                    debug!("Dispatching {} {}", action.action, action.logical_id);
                    plan.actions[pos].advance(NodeCommand::Dispatch)?;
                    in_flight.push(call.map(move |result| (pos, result)).boxed());
                }
            }

            let Some((pos, result)) = in_flight.next().await else {
                break;
            };

            let action = &mut plan.actions[pos];
            match result {
                Ok(provider_ref) => {
                    info!("{} {} ({})", action.kind, action.logical_id, provider_ref.physical_id);
                    action.provider_ref = Some(provider_ref);
                    action.advance(NodeCommand::Succeed)?;
                    succeeded.push(action.logical_id.clone());
                }
                Err(e) => {
                    error!("Failed to {} {}: {}", action.action, action.logical_id, e.message);
                    action.error = Some(e.message.clone());
                    action.advance(NodeCommand::Fail)?;
                    failed.push(FailedNode {
                        logical_id: action.logical_id.clone(),
                        kind: action.kind.clone(),
                        error: e,
                    });
                    halted = true;
                }
            }
        }

        let report = ExecutionReport::snapshot(
            RunKind::Apply,
            self.provider.name(),
            plan,
            cancelled,
            started_at,
        );
        self.finish(report, succeeded, failed, plan, NodeStatus::Pending)
    }

    /// Delete every node that exists, dependents first
    ///
    /// Nodes never created are skipped. Running it again after success
    /// does nothing.
    pub async fn destroy(
        &self,
        plan: &mut Plan,
        cancel: &CancellationFlag,
    ) -> TopologyResult<ExecutionReport> {
        let started_at = Utc::now();
        info!(
            "Destroying {} actions via {}",
            plan.len(),
            self.provider.name()
        );

        let dependents = plan.dependent_positions();
        let mut in_flight: FuturesUnordered<Completion<()>> = FuturesUnordered::new();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut halted = false;
        let mut cancelled = false;

        loop {
            if !halted && cancel.is_cancelled() {
                warn!("Destroy cancelled; waiting for {} calls in flight", in_flight.len());
                halted = true;
                cancelled = true;
            }

            if !halted {
                for pos in (0..plan.len()).rev() {
                    if in_flight.len() >= self.config.concurrency_limit() {
                        break;
                    }

                    let action = &plan.actions[pos];
                    if !action.can_advance(NodeCommand::BeginTeardown) {
                        continue;
                    }
                    if dependents[pos]
                        .iter()
                        .any(|&d| plan.actions[d].status().exists())
                    {
                        continue;
                    }
                    let Some(provider_ref) = action.provider_ref.clone() else {
                        continue;
                    };

                    debug!("Deleting {}", action.logical_id);
                    plan.actions[pos].advance(NodeCommand::BeginTeardown)?;

                    let provider = Arc::clone(&self.provider);
                    let call = async move { provider.delete(&provider_ref).await };
                    in_flight.push(call.map(move |result| (pos, result)).boxed());
                }
            }

            let Some((pos, result)) = in_flight.next().await else {
                break;
            };

            let action = &mut plan.actions[pos];
            match result {
                Ok(()) => {
                    info!("Deleted {} {}", action.kind, action.logical_id);
                    action.advance(NodeCommand::Succeed)?;
                    action.error = None;
                    succeeded.push(action.logical_id.clone());
                }
                Err(e) => {
                    error!("Failed to delete {}: {}", action.logical_id, e.message);
                    action.error = Some(e.message.clone());
                    action.advance(NodeCommand::Fail)?;
                    failed.push(FailedNode {
                        logical_id: action.logical_id.clone(),
                        kind: action.kind.clone(),
                        error: e,
                    });
                    halted = true;
                }
            }
        }

        let report = ExecutionReport::snapshot(
            RunKind::Destroy,
            self.provider.name(),
            plan,
            cancelled,
            started_at,
        );
        self.finish(report, succeeded, failed, plan, NodeStatus::Done)
    }

    /// Turn a finished run into its result
    ///
    /// `outstanding` is the status of nodes the run still had to process.
    /// A run that neither failed nor was cancelled but left such nodes
    /// behind was blocked, and is reported as a partial failure too.
    fn finish(
        &self,
        report: ExecutionReport,
        succeeded: Vec<LogicalId>,
        failed: Vec<FailedNode>,
        plan: &Plan,
        outstanding: NodeStatus,
    ) -> TopologyResult<ExecutionReport> {
        let not_attempted: Vec<LogicalId> = plan
            .actions
            .iter()
            .filter(|a| a.status() == outstanding)
            .map(|a| a.logical_id.clone())
            .collect();

        if failed.is_empty() && (report.cancelled || not_attempted.is_empty()) {
            info!(
                "{:?} finished: {} succeeded in {} ms{}",
                report.run,
                succeeded.len(),
                report.duration_ms(),
                if report.cancelled { " (cancelled)" } else { "" }
            );
            return Ok(report);
        }

        if failed.is_empty() {
            error!(
                "{:?} stopped with {} nodes blocked",
                report.run,
                not_attempted.len()
            );
        }

        Err(PartialFailure {
            succeeded,
            failed,
            not_attempted,
            report,
        }
        .into())
    }
}

/// One create/update call; updates re-create resources that vanished
async fn apply_one(
    provider: Arc<dyn ResourceProvider>,
    action: ActionType,
    kind: ResourceKind,
    logical_id: LogicalId,
    existing: Option<ProviderRef>,
    spec: NodeSpec,
) -> Result<ProviderRef, ProviderError> {
    if let (ActionType::Update, Some(existing)) = (action, existing.as_ref()) {
        if provider.describe(existing).await?.is_some() {
            return provider.update(existing, &spec).await;
        }
        warn!("{} no longer exists at {}; re-creating", logical_id, provider.name());
    }
    provider.create(&kind, &logical_id, &spec).await
}

fn node_properties(node: &Node) -> TopologyResult<serde_json::Value> {
    let value = match node {
        Node::Network(n) => serde_json::to_value(n)?,
        Node::Subnet(s) => serde_json::to_value(s)?,
        Node::RouteTable(t) => serde_json::to_value(t)?,
        Node::NetworkAcl(a) => serde_json::to_value(a)?,
        Node::ElasticIp(e) => serde_json::to_value(e)?,
        Node::Gateway(g) => serde_json::to_value(g)?,
        Node::Association(a) => serde_json::to_value(a)?,
        Node::Resource(r) => serde_json::to_value(r)?,
    };
    Ok(value)
}
