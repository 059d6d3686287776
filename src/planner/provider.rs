// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Provider Port
//!
//! The planner talks to the outside world only through [`ResourceProvider`].
//! Every call is keyed by logical ID and must be idempotent: creating an
//! existing logical ID returns the existing reference, deleting a missing
//! resource succeeds.
//!
//! [`InMemoryProvider`] is a reference implementation that enforces the
//! same referential rules a real cloud would: a resource cannot be created
//! before its dependencies, nor deleted while something still depends on it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{LogicalId, ResourceKind};
use crate::errors::ProviderError;

/// Handle to a provisioned resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderRef {
    pub kind: ResourceKind,
    pub logical_id: LogicalId,
    /// Identifier assigned by the provider
    pub physical_id: String,
}

/// Desired state handed to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Kind-specific attributes
    pub properties: serde_json::Value,
    /// References of every dependency, resolved at dispatch time
    #[serde(default)]
    pub dependencies: Vec<ProviderRef>,
}

/// Provider abstraction
///
/// Implementations wrap a concrete cloud API. They report failures as
/// [`ProviderError`]; the planner never retries.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Provider name for logs and reports
    fn name(&self) -> &str;

    async fn create(
        &self,
        kind: &ResourceKind,
        logical_id: &LogicalId,
        spec: &NodeSpec,
    ) -> Result<ProviderRef, ProviderError>;

    async fn update(
        &self,
        provider_ref: &ProviderRef,
        spec: &NodeSpec,
    ) -> Result<ProviderRef, ProviderError>;

    async fn delete(&self, provider_ref: &ProviderRef) -> Result<(), ProviderError>;

    /// Current state, or `None` if the resource no longer exists
    async fn describe(&self, provider_ref: &ProviderRef) -> Result<Option<NodeSpec>, ProviderError>;
}

/// Provider operation, used for call logs and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Describe,
}

#[derive(Debug, Clone)]
struct StoredResource {
    provider_ref: ProviderRef,
    spec: NodeSpec,
}

#[derive(Debug, Default)]
struct InMemoryState {
    resources: HashMap<LogicalId, StoredResource>,
    failures: HashSet<(LogicalId, Operation)>,
    calls: Vec<(Operation, LogicalId)>,
}

/// Provider backed by a map, for dry runs and tests
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    state: Mutex<InMemoryState>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, so concurrent dispatch becomes observable
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make `operation` on `logical_id` fail from now on
    pub async fn fail_on(&self, logical_id: &LogicalId, operation: Operation) {
        self.state
            .lock()
            .await
            .failures
            .insert((logical_id.clone(), operation));
    }

    /// Stop injecting failures for `logical_id`
    pub async fn clear_failures(&self, logical_id: &LogicalId) {
        self.state
            .lock()
            .await
            .failures
            .retain(|(id, _)| id != logical_id);
    }

    /// Drop a resource behind the planner's back
    pub async fn forget(&self, logical_id: &LogicalId) -> bool {
        self.state.lock().await.resources.remove(logical_id).is_some()
    }

    pub async fn resource_count(&self) -> usize {
        self.state.lock().await.resources.len()
    }

    pub async fn contains(&self, logical_id: &LogicalId) -> bool {
        self.state.lock().await.resources.contains_key(logical_id)
    }

    /// Every call received, in arrival order
    pub async fn calls(&self) -> Vec<(Operation, LogicalId)> {
        self.state.lock().await.calls.clone()
    }

    /// Highest number of calls that were in progress at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, operation: Operation, logical_id: &LogicalId) -> Result<(), ProviderError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let injected = {
            let mut state = self.state.lock().await;
            state.calls.push((operation, logical_id.clone()));
            state.failures.contains(&(logical_id.clone(), operation))
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if injected {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(ProviderError::new(format!(
                "injected {:?} failure for {}",
                operation, logical_id
            )));
        }
        Ok(())
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn check_dependencies(state: &InMemoryState, spec: &NodeSpec) -> Result<(), ProviderError> {
        for dependency in &spec.dependencies {
            let exists = state
                .resources
                .get(&dependency.logical_id)
                .is_some_and(|r| r.provider_ref.physical_id == dependency.physical_id);
            if !exists {
                return Err(ProviderError::new(format!(
                    "dependency {} ({}) does not exist",
                    dependency.logical_id, dependency.physical_id
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn create(
        &self,
        kind: &ResourceKind,
        logical_id: &LogicalId,
        spec: &NodeSpec,
    ) -> Result<ProviderRef, ProviderError> {
        self.enter(Operation::Create, logical_id).await?;

        let result = {
            let mut state = self.state.lock().await;
            if let Some(existing) = state.resources.get(logical_id) {
                Ok(existing.provider_ref.clone())
            } else {
                Self::check_dependencies(&state, spec).map(|_| {
                    let provider_ref = ProviderRef {
                        kind: kind.clone(),
                        logical_id: logical_id.clone(),
                        physical_id: format!("{}-{}", kind.prefix(), Uuid::now_v7().simple()),
                    };
                    state.resources.insert(
                        logical_id.clone(),
                        StoredResource {
                            provider_ref: provider_ref.clone(),
                            spec: spec.clone(),
                        },
                    );
                    debug!("Created {} {} as {}", kind, logical_id, provider_ref.physical_id);
                    provider_ref
                })
            }
        };

        self.leave();
        result
    }

    async fn update(
        &self,
        provider_ref: &ProviderRef,
        spec: &NodeSpec,
    ) -> Result<ProviderRef, ProviderError> {
        self.enter(Operation::Update, &provider_ref.logical_id).await?;

        let result = {
            let mut state = self.state.lock().await;
            match Self::check_dependencies(&state, spec) {
                Err(e) => Err(e),
                Ok(()) => match state.resources.get_mut(&provider_ref.logical_id) {
                    Some(stored) => {
                        stored.spec = spec.clone();
                        Ok(stored.provider_ref.clone())
                    }
                    None => Err(ProviderError::new(format!(
                        "{} does not exist",
                        provider_ref.logical_id
                    ))),
                },
            }
        };

        self.leave();
        result
    }

    async fn delete(&self, provider_ref: &ProviderRef) -> Result<(), ProviderError> {
        self.enter(Operation::Delete, &provider_ref.logical_id).await?;

        let result = {
            let mut state = self.state.lock().await;
            let in_use = state.resources.values().find(|r| {
                r.spec
                    .dependencies
                    .iter()
                    .any(|d| d.logical_id == provider_ref.logical_id)
            });

            match in_use {
                Some(dependent) => Err(ProviderError::new(format!(
                    "{} is still in use by {}",
                    provider_ref.logical_id, dependent.provider_ref.logical_id
                ))),
                None => {
                    if state.resources.remove(&provider_ref.logical_id).is_some() {
                        debug!("Deleted {}", provider_ref.logical_id);
                    }
                    Ok(())
                }
            }
        };

        self.leave();
        result
    }

    async fn describe(&self, provider_ref: &ProviderRef) -> Result<Option<NodeSpec>, ProviderError> {
        self.enter(Operation::Describe, &provider_ref.logical_id).await?;

        let spec = self
            .state
            .lock()
            .await
            .resources
            .get(&provider_ref.logical_id)
            .map(|r| r.spec.clone());

        self.leave();
        Ok(spec)
    }
}
