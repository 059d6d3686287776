// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Planner CLI
//!
//! Loads a topology declaration, validates it, resolves routes and prints
//! the provisioning plan. With `--apply` the plan is executed against the
//! in-memory provider, which exercises ordering and referential checks
//! without touching a real cloud.
//!
//! Run with: cargo run --bin topology-plan -- topology.yaml --apply
//!
//! Environment:
//! - `TOPOLOGY_CONCURRENCY` - default for `--concurrency`
//! - `RUST_LOG` - log filter

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use vpc_topology::config::CONCURRENCY_ENV;
use vpc_topology::{
    CancellationFlag, ExecutionReport, InMemoryProvider, PlannerConfig, ProvisioningPlanner,
    RoutingResolver, TopologyDeclaration, TopologyError,
};

#[derive(Debug, Parser)]
#[command(name = "topology-plan", version, about = "Plan and dry-run a VPC topology")]
struct Cli {
    /// Declaration file (.json, otherwise YAML)
    file: PathBuf,

    /// Execute the plan against the in-memory provider
    #[arg(long)]
    apply: bool,

    /// Tear everything down again after applying
    #[arg(long, requires = "apply")]
    destroy: bool,

    /// Maximum provider calls in flight [default: $TOPOLOGY_CONCURRENCY or 4]
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print plan and reports as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match cli.concurrency {
        Some(limit) => PlannerConfig::new(limit)?,
        None => PlannerConfig::from_env()
            .with_context(|| format!("Invalid {}", CONCURRENCY_ENV))?,
    };

    let declaration = TopologyDeclaration::from_path(&cli.file)
        .with_context(|| format!("Failed to load {}", cli.file.display()))?;
    let topology = declaration
        .seal()
        .with_context(|| format!("Invalid topology in {}", cli.file.display()))?;
    info!("Loaded {} nodes from {}", topology.len(), cli.file.display());

    let routes = RoutingResolver::resolve(&topology);
    for failure in routes.failures() {
        warn!("{}", failure);
    }

    let planner = ProvisioningPlanner::new(Arc::new(InMemoryProvider::new()), config);
    let mut plan = planner
        .plan(&topology, &routes)
        .context("Failed to build provisioning plan")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("Plan: {}", plan.summary());
        for (position, action) in plan.actions.iter().enumerate() {
            println!(
                "  {:>3}. {:<8} {:<24} {}",
                position + 1,
                action.action.to_string(),
                action.kind.to_string(),
                action.logical_id
            );
        }
    }

    if !cli.apply {
        return Ok(());
    }

    let cancel = CancellationFlag::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing calls in flight");
            signal.cancel();
        }
    });

    let report = run(planner.apply(&mut plan, &cancel).await)?;
    print_report(&report, cli.json)?;

    if cli.destroy && !report.cancelled {
        let report = run(planner.destroy(&mut plan, &cancel).await)?;
        print_report(&report, cli.json)?;
    }

    Ok(())
}

fn run(result: Result<ExecutionReport, TopologyError>) -> Result<ExecutionReport> {
    match result {
        Ok(report) => Ok(report),
        Err(TopologyError::PartialFailure(failure)) => {
            for node in &failure.failed {
                warn!("{} {} failed: {}", node.kind, node.logical_id, node.error);
            }
            Err(TopologyError::PartialFailure(failure).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(report: &ExecutionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    println!(
        "{:?} via {}: {} nodes in {} ms{}",
        report.run,
        report.provider,
        report.entries.len(),
        report.duration_ms(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    for entry in &report.entries {
        let physical = entry
            .provider_ref
            .as_ref()
            .map(|r| r.physical_id.as_str())
            .unwrap_or("-");
        println!("  {:<12} {:<32} {}", entry.status.to_string(), entry.logical_id.to_string(), physical);
    }
    Ok(())
}
