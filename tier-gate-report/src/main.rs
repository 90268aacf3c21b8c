//! Tier Gate Report - prints catalog health and per-organization gating.
//!
//! Loads a gate configuration and a backend seed, then writes one JSON
//! document to stdout: a health report followed by what each organization
//! can do on its current plan and what the next tier up would change.
//!
//! # Environment Variables
//!
//! - `TIER_GATE_CONFIG`: path to a TOML [`GateConfig`] (default: built-in defaults)
//! - `TIER_GATE_SEED`: path to a JSON backend seed (default: bundled demo seed)
//! - `LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `RUST_LOG`: log filter (default: `info`)

mod observability;
mod report;

use std::{path::Path, process::ExitCode};

use chrono::Utc;
use tier_gate::{
    GateError,
    backend::{InMemoryBackend, Seed},
    config::GateConfig,
};
use tracing::{error, info, warn};

use crate::{
    observability::{HealthReport, LogFormat, check_backend, check_catalog, init_observability},
    report::Reporter,
};

const DEMO_SEED: &str = include_str!("../demo/seed.json");

fn load_config() -> tier_gate::Result<GateConfig> {
    match std::env::var("TIER_GATE_CONFIG") {
        Ok(path) => {
            info!(%path, "loading gate configuration");
            GateConfig::from_file(path)
        }
        Err(_) => Ok(GateConfig::default()),
    }
}

fn load_seed() -> tier_gate::Result<Seed> {
    let content = match std::env::var("TIER_GATE_SEED") {
        Ok(path) => {
            info!(%path, "loading backend seed");
            std::fs::read_to_string(Path::new(&path))
                .map_err(|e| GateError::Config(format!("cannot read seed file: {e}")))?
        }
        Err(_) => DEMO_SEED.to_owned(),
    };
    serde_json::from_str(&content).map_err(|e| GateError::Config(format!("invalid seed: {e}")))
}

async fn run() -> tier_gate::Result<serde_json::Value> {
    let config = load_config()?;
    let catalog = config.catalog()?;
    let timeout = config.executor.backend_timeout();
    let seed = load_seed()?;
    let organizations: Vec<_> =
        seed.organizations.iter().map(|entry| entry.organization.id.clone()).collect();

    let now = Utc::now();
    let backend = InMemoryBackend::from_seed(seed, now);

    let mut checks = vec![check_catalog(&catalog, !config.tiers.is_empty())];
    checks.extend(check_backend(&backend, timeout).await);
    let health = HealthReport::new(checks);

    let reporter = Reporter::new(&backend, &catalog, config.executor.downgrade_policy, timeout);
    let mut reports = Vec::with_capacity(organizations.len());
    for org in &organizations {
        match reporter.organization(org, now).await {
            Ok(report) => reports.push(report),
            Err(err) => warn!(organization_id = %org, error = %err, "skipping organization"),
        }
    }
    info!(organizations = reports.len(), status = health.status.as_str(), "report built");

    let organizations = serde_json::to_value(&reports)
        .map_err(|e| GateError::Config(format!("cannot serialize report: {e}")))?;
    Ok(serde_json::json!({
        "health": health.to_json(),
        "organizations": organizations,
    }))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_observability(LogFormat::from_env());

    match run().await {
        Ok(document) => match serde_json::to_string_pretty(&document) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!(error = %err, "failed to render report");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            error!(error = %err, "report failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use tier_gate::{TierCatalog, transition::DowngradePolicy};

    use super::*;

    #[tokio::test]
    async fn test_demo_seed_reports_every_organization() {
        let seed: Seed = serde_json::from_str(DEMO_SEED).unwrap();
        let ids: Vec<_> = seed.organizations.iter().map(|o| o.organization.id.clone()).collect();
        let backend = InMemoryBackend::from_seed(seed, Utc::now());
        let catalog = TierCatalog::reference();
        let reporter = Reporter::new(
            &backend,
            &catalog,
            DowngradePolicy::Block,
            std::time::Duration::from_secs(5),
        );

        assert_eq!(ids.len(), 3);
        for id in &ids {
            reporter.organization(id, Utc::now()).await.unwrap();
        }
    }

    #[test]
    fn test_demo_config_is_valid() {
        let config = GateConfig::from_toml(include_str!("../demo/tier-gate.toml")).unwrap();
        assert_eq!(config.catalog().unwrap(), TierCatalog::reference());
    }
}
