// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Properties that must hold for every generated topology: reservations
//! never overlap, ACL verdicts do not depend on entry insertion order, and
//! apply/destroy leave the provider consistent.

mod acl_ordering;
mod address_space;
mod provisioning;
