// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Declaration Documents
//!
//! A declaration is a JSON or YAML document with one list per object kind.
//! Loading runs in two passes: first every node is declared, then every
//! edge (gateways, routes, ACL entries, associations, explicit dependencies)
//! is resolved, so references may point forward in the document.
//!
//! ```yaml
//! networks:
//!   - id: vpc
//!     cidr: 10.0.0.0/16
//!     availability_zones: [az-1]
//! subnets:
//!   - id: public_subnet_1
//!     network: vpc
//!     cidr: 10.0.0.0/24
//!     availability_zone: az-1
//!     kind: public
//!     egress: [10.1.0.0/16]
//! gateways:
//!   - type: internet
//!     id: igw
//!     network: vpc
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{TopologyError, TopologyResult};

use super::specs::{
    AclAssociationSpec, AclEntrySpec, DependencySpec, ElasticIpSpec, GatewaySpec, NetworkAclSpec,
    NetworkSpec, ResourceSpec, RouteSpec, RouteTableSpec, SubnetSpec,
};
use super::{SealedTopology, TopologyGraph};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyDeclaration {
    pub networks: Vec<NetworkSpec>,
    pub route_tables: Vec<RouteTableSpec>,
    pub network_acls: Vec<NetworkAclSpec>,
    pub elastic_ips: Vec<ElasticIpSpec>,
    pub subnets: Vec<SubnetSpec>,
    pub gateways: Vec<GatewaySpec>,
    pub routes: Vec<RouteSpec>,
    pub acl_entries: Vec<AclEntrySpec>,
    pub acl_associations: Vec<AclAssociationSpec>,
    pub resources: Vec<ResourceSpec>,
    pub dependencies: Vec<DependencySpec>,
}

impl TopologyDeclaration {
    pub fn from_json(input: &str) -> TopologyResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_yaml(input: &str) -> TopologyResult<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Read a declaration file; `.json` is parsed as JSON, anything else as YAML
    pub fn from_path(path: impl AsRef<Path>) -> TopologyResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TopologyError::Declaration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        debug!("Loading declaration from {}", path.display());
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    pub fn to_json(&self) -> TopologyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Assemble a graph from the declaration
    pub fn build(&self) -> TopologyResult<TopologyGraph> {
        let mut graph = TopologyGraph::new();

        // Pass 1: nodes
        for network in &self.networks {
            graph.add_network(network.clone())?;
        }
        for table in &self.route_tables {
            graph.add_route_table(table.clone())?;
        }
        for acl in &self.network_acls {
            graph.add_network_acl(acl.clone())?;
        }
        for eip in &self.elastic_ips {
            graph.add_elastic_ip(eip.clone())?;
        }
        for subnet in &self.subnets {
            graph.add_subnet(subnet.clone())?;
        }
        for resource in &self.resources {
            let mut resource = resource.clone();
            resource.depends_on.clear();
            graph.add_resource(resource)?;
        }

        // Pass 2: edges
        for gateway in &self.gateways {
            graph.attach_gateway(gateway.clone())?;
        }
        for route in &self.routes {
            graph.add_route(route.clone())?;
        }
        for entry in &self.acl_entries {
            graph.add_acl_entry(&entry.network_acl, entry.entry)?;
        }
        for association in &self.acl_associations {
            graph.associate_acl(&association.subnet, &association.network_acl)?;
        }
        for resource in &self.resources {
            for dependency in &resource.depends_on {
                graph.add_dependency(&resource.id, dependency)?;
            }
        }
        for dependency in &self.dependencies {
            graph.add_dependency(&dependency.from, &dependency.to)?;
        }

        info!(
            "Built topology: {} networks, {} subnets, {} nodes",
            self.networks.len(),
            self.subnets.len(),
            graph.len()
        );
        Ok(graph)
    }

    /// Build and seal in one step
    pub fn seal(&self) -> TopologyResult<SealedTopology> {
        self.build()?.seal()
    }
}
