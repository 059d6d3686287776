// Copyright (c) 2025 - Cowboy AI, Inc.
//! Planner configuration

use serde::{Deserialize, Serialize};

use crate::errors::{TopologyError, TopologyResult};

/// Environment variable overriding the concurrency limit
pub const CONCURRENCY_ENV: &str = "TOPOLOGY_CONCURRENCY";

const DEFAULT_CONCURRENCY: usize = 4;

/// Execution settings for apply and destroy
///
/// The limit is always at least 1, whether built with [`PlannerConfig::new`]
/// or deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPlannerConfig")]
pub struct PlannerConfig {
    concurrency_limit: usize,
}

/// Unvalidated form read from config files
#[derive(Deserialize)]
struct RawPlannerConfig {
    #[serde(default = "default_concurrency")]
    concurrency_limit: usize,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl TryFrom<RawPlannerConfig> for PlannerConfig {
    type Error = TopologyError;

    fn try_from(raw: RawPlannerConfig) -> TopologyResult<Self> {
        Self::new(raw.concurrency_limit)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY,
        }
    }
}

impl PlannerConfig {
    /// Create a config with the given limit
    ///
    /// # Errors
    /// - `Configuration` if the limit is zero
    pub fn new(concurrency_limit: usize) -> TopologyResult<Self> {
        if concurrency_limit == 0 {
            return Err(TopologyError::Configuration(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        Ok(Self { concurrency_limit })
    }

    /// Maximum number of provider calls in flight at once
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to the defaults.
    pub fn from_env() -> TopologyResult<Self> {
        match std::env::var(CONCURRENCY_ENV) {
            Ok(raw) => Self::parse_limit(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    fn parse_limit(raw: &str) -> TopologyResult<Self> {
        let limit = raw.trim().parse::<usize>().map_err(|_| {
            TopologyError::Configuration(format!("{} must be a positive integer, got {:?}", CONCURRENCY_ENV, raw))
        })?;
        Self::new(limit)
    }
}
