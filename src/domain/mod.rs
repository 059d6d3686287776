// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Domain Models
//!
//! Core value objects and entities of a virtual network: CIDR blocks, logical
//! identifiers, subnets, gateways, route tables and network ACLs, together
//! with the pure validation functions that guard their invariants.
//!
//! # Value Objects with Invariants
//!
//! - [`CidrBlock`] - canonical IPv4 CIDR block
//! - [`LogicalId`] - stable caller-assigned resource name
//!
//! # Entities
//!
//! - [`Network`], [`Subnet`], [`Gateway`], [`ElasticIp`]
//! - [`RouteTable`], [`NetworkAcl`], [`Association`], [`Resource`]

pub mod ids;
pub mod invariants;
pub mod model;
pub mod network;

pub use ids::{LogicalId, LogicalIdError};
pub use invariants::{ValidationError, ValidationResult};
pub use model::{
    AclAction, AclEntry, Association, AssociationKind, DeclaredRoute, Direction, ElasticIp,
    Gateway, InternetGateway, NatGateway, Network, NetworkAcl, Packet, PortRange, Protocol, Resource,
    ResourceKind, RouteTable, RouteTarget, Subnet, SubnetKind, TrafficSelector,
};
pub use network::{CidrBlock, NetworkError};
