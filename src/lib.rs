// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declarative virtual network topology provisioning
//!
//! A topology is declared as networks, subnets, gateways, route tables and
//! network ACLs. The crate validates it against the addressing and
//! placement rules of a cloud VPC, resolves egress intents into concrete
//! routes, and provisions the result through a pluggable provider in
//! dependency order.
//!
//! ```text
//! TopologyDeclaration ─build─▶ TopologyGraph ─seal─▶ SealedTopology
//!                                                        │
//!                                RoutingResolver ◀───────┤
//!                                       │                │
//!                                       ▼                ▼
//!                              ProvisioningPlanner::plan ─▶ Plan ─apply/destroy─▶ ResourceProvider
//! ```

pub mod acl;
pub mod address_space;
pub mod config;
pub mod domain;
pub mod errors;
pub mod planner;
pub mod routing;
pub mod state_machine;
pub mod topology;

// Re-export commonly used types
pub use acl::{AclEvaluator, Verdict};
pub use address_space::{AddressSpace, Reservation};
pub use config::PlannerConfig;
pub use domain::{
    AclAction, AclEntry, CidrBlock, Direction, LogicalId, Packet, Protocol, ResourceKind, RouteTarget,
    SubnetKind, ValidationError,
};
pub use errors::{ProviderError, ResolutionError, TopologyError, TopologyResult};
pub use planner::{
    ActionType, CancellationFlag, ExecutionReport, InMemoryProvider, PartialFailure, Plan,
    ProvisioningPlanner, ResourceProvider,
};
pub use routing::{ResolvedRoute, RouteOrigin, RoutingResolver};
pub use topology::{SealedTopology, TopologyDeclaration, TopologyGraph};
