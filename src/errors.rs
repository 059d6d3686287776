// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for topology operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    CidrBlock, LogicalId, LogicalIdError, ResourceKind, RouteTarget, ValidationError,
};
use crate::planner::PartialFailure;
use crate::state_machine::TransitionError;

/// Errors detected while resolving references and routes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// A subnet needs a gateway its network does not have
    #[error("Subnet {subnet} needs a {needed} but network {network} has none")]
    UnreachableGateway {
        subnet: LogicalId,
        network: LogicalId,
        needed: ResourceKind,
    },

    /// Referenced logical ID is unknown
    #[error("{expected} not found: {id}")]
    NotFound { id: LogicalId, expected: String },

    /// Two subnets sharing a table want different next hops for one destination
    #[error("Route table {route_table} already sends {destination} to {existing}, subnet {subnet} wants {requested}")]
    ConflictingRoute {
        route_table: LogicalId,
        subnet: LogicalId,
        destination: CidrBlock,
        existing: RouteTarget,
        requested: RouteTarget,
    },
}

impl ResolutionError {
    pub fn not_found(id: &LogicalId, expected: impl Into<String>) -> Self {
        ResolutionError::NotFound {
            id: id.clone(),
            expected: expected.into(),
        }
    }
}

/// Failure returned by a resource provider
///
/// Carried verbatim; the engine never retries it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Provider error: {message}")]
pub struct ProviderError {
    pub message: String,
    /// Hint from the provider that the call may succeed if repeated
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }
}

/// Errors that can occur in topology operations
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Structural invariant violated
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Reference or route could not be resolved
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Provider call failed outside of plan execution
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Plan execution stopped after a provider failure
    #[error(transparent)]
    PartialFailure(Box<PartialFailure>),

    /// Node lifecycle bookkeeping went wrong
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] TransitionError),

    /// Invalid logical ID in input
    #[error("Invalid logical ID: {0}")]
    LogicalId(#[from] LogicalIdError),

    /// Declaration document could not be read
    #[error("Declaration error: {0}")]
    Declaration(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for topology operations
pub type TopologyResult<T> = Result<T, TopologyError>;

impl From<PartialFailure> for TopologyError {
    fn from(failure: PartialFailure) -> Self {
        TopologyError::PartialFailure(Box::new(failure))
    }
}

impl From<serde_json::Error> for TopologyError {
    fn from(err: serde_json::Error) -> Self {
        TopologyError::Declaration(err.to_string())
    }
}

impl From<serde_yaml::Error> for TopologyError {
    fn from(err: serde_yaml::Error) -> Self {
        TopologyError::Declaration(err.to_string())
    }
}

impl TopologyError {
    /// Whether the error was raised before any provider call
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            TopologyError::Validation(_)
                | TopologyError::Resolution(_)
                | TopologyError::LogicalId(_)
                | TopologyError::Declaration(_)
                | TopologyError::Configuration(_)
        )
    }
}
