// Copyright (c) 2025 - Cowboy AI, Inc.
//! Route Resolution
//!
//! Turns each subnet's egress intent into concrete routes on its route
//! table, using the gateways its network actually has:
//!
//! | Subnet kind | Egress target                                        |
//! |-------------|------------------------------------------------------|
//! | Public      | the network's internet gateway                       |
//! | Private     | a NAT gateway in a public subnet (same AZ preferred) |
//! | Isolated    | none; intents are dropped                            |
//!
//! A Private subnet always needs a NAT: with no egress listed it gets a
//! default `0.0.0.0/0` intent. A Public subnet with no egress gets no routes
//! and does not need the internet gateway.
//!
//! Routes declared directly on a table always keep their target. Each
//! subnet is resolved atomically: if it fails, nothing it would have added
//! is kept, and routes of other subnets are unaffected.

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{CidrBlock, LogicalId, ResourceKind, RouteTarget, SubnetKind};
use crate::errors::ResolutionError;
use crate::topology::SealedTopology;

/// Where a resolved route came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOrigin {
    /// Implicit route for the network block; never provisioned
    Local,
    /// Declared directly on the table
    Declared,
    /// Derived from a subnet's egress intent
    Intent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRoute {
    pub id: LogicalId,
    pub route_table: LogicalId,
    pub destination: CidrBlock,
    pub target: RouteTarget,
    pub origin: RouteOrigin,
}

impl ResolvedRoute {
    /// Whether the route becomes a provider object
    pub fn is_provisioned(&self) -> bool {
        self.origin != RouteOrigin::Local
    }
}

/// Default ID of a route: `<table>:route:<destination>`
pub fn route_id(route_table: &LogicalId, destination: &CidrBlock) -> LogicalId {
    route_table.derive(&format!("route:{}", destination))
}

#[derive(Debug, Clone, Default)]
pub struct RoutingResolver {
    /// Tables in declaration order
    table_order: Vec<LogicalId>,
    tables: HashMap<LogicalId, Vec<ResolvedRoute>>,
    /// Resolved subnet → its table
    subnet_tables: HashMap<LogicalId, LogicalId>,
    failures: Vec<ResolutionError>,
}

impl RoutingResolver {
    /// Seed every table with its local and declared routes
    pub fn new(topology: &SealedTopology) -> Self {
        let mut resolver = Self::default();

        for table in topology.route_tables() {
            let mut routes = Vec::with_capacity(table.routes.len() + 1);

            if let Some(network) = topology.network(&table.network) {
                routes.push(ResolvedRoute {
                    id: table.id.derive("route:local"),
                    route_table: table.id.clone(),
                    destination: network.cidr,
                    target: RouteTarget::Local,
                    origin: RouteOrigin::Local,
                });
            }

            for declared in &table.routes {
                routes.push(ResolvedRoute {
                    id: declared
                        .id
                        .clone()
                        .unwrap_or_else(|| route_id(&table.id, &declared.destination)),
                    route_table: table.id.clone(),
                    destination: declared.destination,
                    target: declared.target.clone(),
                    origin: RouteOrigin::Declared,
                });
            }

            resolver.table_order.push(table.id.clone());
            resolver.tables.insert(table.id.clone(), routes);
        }

        resolver
    }

    /// Seed and resolve every subnet
    pub fn resolve(topology: &SealedTopology) -> Self {
        let mut resolver = Self::new(topology);
        if let Err(e) = resolver.resolve_all(topology) {
            debug!(
                "{} subnets failed to resolve, first: {}",
                resolver.failures.len(),
                e
            );
        }
        resolver
    }

    /// Resolve every subnet in declaration order
    ///
    /// Keeps going after a failure so every broken subnet is reported.
    ///
    /// # Returns
    /// - Err with the first failure, if any subnet failed
    pub fn resolve_all(&mut self, topology: &SealedTopology) -> Result<(), ResolutionError> {
        let subnets: Vec<LogicalId> = topology.subnets().map(|s| s.id.clone()).collect();

        for subnet in subnets {
            if let Err(e) = self.resolve_subnet(topology, &subnet) {
                warn!("Route resolution failed for {}: {}", subnet, e);
                self.failures.push(e);
            }
        }

        match self.failures.first() {
            Some(first) => Err(first.clone()),
            None => Ok(()),
        }
    }

    /// Resolve one subnet's egress intent onto its table
    ///
    /// # Returns
    /// - The routes this call added (empty if already resolved)
    pub fn resolve_subnet(
        &mut self,
        topology: &SealedTopology,
        subnet_id: &LogicalId,
    ) -> Result<Vec<ResolvedRoute>, ResolutionError> {
        if self.subnet_tables.contains_key(subnet_id) {
            return Ok(Vec::new());
        }

        let subnet = topology
            .subnet(subnet_id)
            .ok_or_else(|| ResolutionError::not_found(subnet_id, "Subnet"))?;
        let table = &subnet.route_table;
        let existing = self
            .tables
            .get(table)
            .ok_or_else(|| ResolutionError::not_found(table, "Route table"))?;

        let default_egress = [CidrBlock::any()];
        let egress: &[CidrBlock] = match subnet.kind {
            SubnetKind::Private if subnet.egress.is_empty() => &default_egress,
            _ => &subnet.egress,
        };

        let target = match subnet.kind {
            SubnetKind::Isolated => {
                if !subnet.egress.is_empty() {
                    warn!(
                        "Isolated subnet {} declares {} egress destinations; ignoring",
                        subnet.id,
                        subnet.egress.len()
                    );
                }
                None
            }
            _ if egress.is_empty() => None,
            SubnetKind::Public => {
                let igw = topology.internet_gateway(&subnet.network).ok_or_else(|| {
                    ResolutionError::UnreachableGateway {
                        subnet: subnet.id.clone(),
                        network: subnet.network.clone(),
                        needed: ResourceKind::InternetGateway,
                    }
                })?;
                Some(RouteTarget::Gateway(igw.clone()))
            }
            SubnetKind::Private => {
                let nats: Vec<_> = topology.nat_gateways(&subnet.network).collect();
                let chosen = nats
                    .iter()
                    .find(|(_, placed)| placed.availability_zone == subnet.availability_zone)
                    .or_else(|| nats.first())
                    .ok_or_else(|| ResolutionError::UnreachableGateway {
                        subnet: subnet.id.clone(),
                        network: subnet.network.clone(),
                        needed: ResourceKind::NatGateway,
                    })?;
                Some(RouteTarget::Gateway(chosen.0.id.clone()))
            }
        };

        let mut staged: Vec<ResolvedRoute> = Vec::new();
        if let Some(target) = target {
            let mut seen = BTreeSet::new();
            for destination in egress {
                if !seen.insert(*destination) {
                    continue;
                }

                if let Some(current) = existing.iter().find(|r| r.destination == *destination) {
                    match current.origin {
                        RouteOrigin::Local | RouteOrigin::Declared => {
                            debug!(
                                "Table {} already routes {} explicitly; keeping it",
                                table, destination
                            );
                            continue;
                        }
                        RouteOrigin::Intent if current.target == target => continue,
                        RouteOrigin::Intent => {
                            return Err(ResolutionError::ConflictingRoute {
                                route_table: table.clone(),
                                subnet: subnet.id.clone(),
                                destination: *destination,
                                existing: current.target.clone(),
                                requested: target,
                            })
                        }
                    }
                }

                staged.push(ResolvedRoute {
                    id: route_id(table, destination),
                    route_table: table.clone(),
                    destination: *destination,
                    target: target.clone(),
                    origin: RouteOrigin::Intent,
                });
            }
        }

        // Commit
        if let Some(routes) = self.tables.get_mut(table) {
            routes.extend(staged.iter().cloned());
        }
        self.subnet_tables.insert(subnet.id.clone(), table.clone());

        debug!("Resolved {} routes for subnet {}", staged.len(), subnet.id);
        Ok(staged)
    }

    /// All routes of a table, local route first
    pub fn routes(&self, route_table: &LogicalId) -> &[ResolvedRoute] {
        self.tables
            .get(route_table)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Routes seen by a resolved subnet
    pub fn routes_for_subnet(&self, subnet: &LogicalId) -> Option<&[ResolvedRoute]> {
        self.subnet_tables
            .get(subnet)
            .map(|table| self.routes(table))
    }

    /// Longest-prefix match for `destination` as seen from `subnet`
    pub fn next_hop(&self, subnet: &LogicalId, destination: Ipv4Addr) -> Option<&ResolvedRoute> {
        self.routes_for_subnet(subnet)?
            .iter()
            .filter(|r| r.destination.contains_addr(destination))
            .max_by_key(|r| r.destination.prefix_len())
    }

    /// Routes that become provider objects, table by table
    pub fn provisioned_routes(&self) -> impl Iterator<Item = &ResolvedRoute> {
        self.table_order
            .iter()
            .flat_map(|table| self.routes(table))
            .filter(|r| r.is_provisioned())
    }

    pub fn is_resolved(&self, subnet: &LogicalId) -> bool {
        self.subnet_tables.contains_key(subnet)
    }

    pub fn failures(&self) -> &[ResolutionError] {
        &self.failures
    }
}
