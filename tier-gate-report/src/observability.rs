//! Logging setup and health checks for the report tool.
//!
//! Logs go to stderr so stdout carries only the JSON report.

use std::io;

use tier_gate::{
    SubscriptionTier, TierCatalog,
    backend::Backend,
    gate::with_timeout,
    models::cheapest_active_plan,
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log format configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for local runs.
    Pretty,
    /// One JSON object per line for log aggregation.
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`: `json` selects JSON, anything else pretty.
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_FORMAT").unwrap_or_default())
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` controls filtering (default `info`). Audit events use the
/// `audit` target, so `RUST_LOG=warn,audit=info` keeps only the audit trail.
pub fn init_observability(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Json => {
            subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_writer(io::stderr),
                )
                .init();
        }
    }
}

/// Overall health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Every check passed.
    Healthy,
    /// Some check warned.
    Degraded,
    /// Some check failed.
    Unhealthy,
}

impl HealthStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// Status of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheckStatus {
    /// Check passed.
    Pass,
    /// Check failed.
    Fail,
    /// Operational, but something needs attention.
    Warn,
}

impl HealthCheckStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warn => "warn",
        }
    }
}

/// One named check.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Check name.
    pub name: String,
    /// Check status.
    pub status: HealthCheckStatus,
    /// Details.
    pub message: Option<String>,
}

impl HealthCheck {
    /// A passing check with details.
    #[must_use]
    pub fn pass<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Self { name: name.into(), status: HealthCheckStatus::Pass, message: Some(message.into()) }
    }

    /// A warning.
    #[must_use]
    pub fn warn<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Self { name: name.into(), status: HealthCheckStatus::Warn, message: Some(message.into()) }
    }

    /// A failure.
    #[must_use]
    pub fn fail<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Self { name: name.into(), status: HealthCheckStatus::Fail, message: Some(message.into()) }
    }
}

/// Health of the catalog and the backend.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// Tool version.
    pub version: String,
    /// Individual checks.
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    /// Builds a report, deriving the overall status from `checks`.
    #[must_use]
    pub fn new(checks: Vec<HealthCheck>) -> Self {
        Self {
            status: Self::compute_status(&checks),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            checks,
        }
    }

    /// JSON form of the report.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status.as_str(),
            "version": self.version,
            "checks": self.checks.iter().map(|c| {
                let mut obj = serde_json::json!({
                    "name": c.name,
                    "status": c.status.as_str(),
                });
                if let Some(msg) = &c.message {
                    obj["message"] = serde_json::Value::String(msg.clone());
                }
                obj
            }).collect::<Vec<_>>(),
        })
    }

    /// Any failure is unhealthy; otherwise any warning is degraded.
    #[must_use]
    pub fn compute_status(checks: &[HealthCheck]) -> HealthStatus {
        if checks.iter().any(|c| c.status == HealthCheckStatus::Fail) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthCheckStatus::Warn) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Describes the catalog in use.
#[must_use]
pub fn check_catalog(catalog: &TierCatalog, custom: bool) -> HealthCheck {
    let names =
        catalog.iter().map(|config| config.display_name.as_str()).collect::<Vec<_>>().join(", ");
    let source = if custom { "configured" } else { "reference" };
    HealthCheck::pass("catalog", format!("{source} catalog: {names}"))
}

/// Reads the plan list and checks that every tier can be assigned.
pub async fn check_backend<B: Backend>(
    backend: &B,
    timeout: std::time::Duration,
) -> Vec<HealthCheck> {
    let plans = match with_timeout(timeout, backend.list_plans()).await {
        Ok(plans) => plans,
        Err(err) => {
            tracing::error!(error = %err, "backend health check failed");
            return vec![HealthCheck::fail("backend", err.to_string())];
        }
    };

    let backend_check = HealthCheck::pass("backend", format!("{} plan records", plans.len()));
    let missing: Vec<&str> = SubscriptionTier::all()
        .into_iter()
        .filter(|tier| cheapest_active_plan(&plans, *tier).is_none())
        .map(SubscriptionTier::as_str)
        .collect();
    let coverage = if missing.is_empty() {
        HealthCheck::pass("plan_coverage", "every tier has an active plan")
    } else {
        HealthCheck::warn(
            "plan_coverage",
            format!("no active plan for: {}; transitions there will fail", missing.join(", ")),
        )
    };

    vec![backend_check, coverage]
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tier_gate::backend::InMemoryBackend;

    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(""), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
    }

    #[test]
    fn test_compute_status() {
        let pass = HealthCheck::pass("a", "ok");
        let warn = HealthCheck::warn("b", "hmm");
        let fail = HealthCheck::fail("c", "no");

        assert_eq!(HealthReport::compute_status(&[]), HealthStatus::Healthy);
        assert_eq!(HealthReport::compute_status(&[pass.clone()]), HealthStatus::Healthy);
        assert_eq!(
            HealthReport::compute_status(&[pass.clone(), warn.clone()]),
            HealthStatus::Degraded
        );
        assert_eq!(HealthReport::compute_status(&[pass, warn, fail]), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_report_json() {
        let report = HealthReport::new(vec![
            HealthCheck::pass("catalog", "reference catalog"),
            HealthCheck::fail("backend", "unreachable"),
        ]);
        let json = report.to_json();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["checks"][0]["name"], "catalog");
        assert_eq!(json["checks"][1]["status"], "fail");
        assert_eq!(json["checks"][1]["message"], "unreachable");
    }

    #[test]
    fn test_catalog_check_lists_tiers() {
        let check = check_catalog(&TierCatalog::reference(), false);
        assert_eq!(check.status, HealthCheckStatus::Pass);
        assert_eq!(
            check.message.as_deref(),
            Some("reference catalog: Personal, Professional, Enterprise")
        );
    }

    #[tokio::test]
    async fn test_backend_check_warns_on_missing_plans() {
        let backend = InMemoryBackend::new();
        let checks = check_backend(&backend, Duration::from_secs(1)).await;
        assert_eq!(checks[0].status, HealthCheckStatus::Pass);
        assert_eq!(checks[1].status, HealthCheckStatus::Warn);
    }

    #[tokio::test]
    async fn test_backend_check_fails_on_backend_error() {
        let backend = InMemoryBackend::new();
        backend.set_fail_reads(true);
        let checks = check_backend(&backend, Duration::from_secs(1)).await;
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].status, HealthCheckStatus::Fail);
    }
}
