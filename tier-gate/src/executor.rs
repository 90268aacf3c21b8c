//! Tier transition execution.
//!
//! The executor never trusts an analysis computed earlier for a
//! confirmation screen. It re-reads the organization, its plan, and its usage,
//! picks the target plan record, re-runs the analyzer on the two records'
//! configurations, and only then issues one write of the organization's
//! plan reference. There is no compensation step because nothing else is
//! written.
//!
//! Two concurrent transitions for the same organization both re-validate and
//! both write; the last write wins.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    SubscriptionTier,
    audit::AuditEventType,
    backend::Backend,
    catalog::TierCatalog,
    error::{GateError, Result},
    gate::with_timeout,
    models::{OrganizationId, PlanId, cheapest_active_plan},
    transition::{DowngradePolicy, TransitionAnalyzer},
    usage::fetch_usage,
};

/// Message shown when the backend fails or times out.
pub const RETRY_MESSAGE: &str =
    "We couldn't update your subscription right now. Please try again in a moment.";

/// Result of [`TransitionExecutor::execute_transition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct TransitionOutcome {
    /// Whether the plan reference was written.
    pub success: bool,
    /// User-facing message.
    pub message: String,
}

impl TransitionOutcome {
    fn succeeded(message: String) -> Self {
        Self { success: true, message }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

enum Decision {
    Applied { from: SubscriptionTier, plan_id: PlanId },
    Rejected { from: SubscriptionTier, reason: String },
}

/// Applies tier changes against a [`Backend`].
#[derive(Debug)]
pub struct TransitionExecutor<'a, B> {
    backend: &'a B,
    catalog: &'a TierCatalog,
    policy: DowngradePolicy,
    timeout: Duration,
}

impl<'a, B: Backend> TransitionExecutor<'a, B> {
    /// Creates an executor. Each backend call is bounded by `timeout`.
    #[must_use]
    pub const fn new(
        backend: &'a B,
        catalog: &'a TierCatalog,
        policy: DowngradePolicy,
        timeout: Duration,
    ) -> Self {
        Self { backend, catalog, policy, timeout }
    }

    /// Moves `org` to the cheapest active plan of `target`.
    ///
    /// Never returns an error: validation and lookup failures come back as
    /// `success: false` with the reason, backend failures with
    /// [`RETRY_MESSAGE`].
    ///
    /// The target record is chosen before validation, so limits and features
    /// are compared against the plan that will actually be assigned.
    #[instrument(skip(self), fields(organization_id = %org))]
    pub async fn execute_transition(
        &self,
        org: &OrganizationId,
        target: SubscriptionTier,
    ) -> TransitionOutcome {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let display_name = &self.catalog.get(target).display_name;

        crate::audit!(
            AuditEventType::TransitionRequested,
            org.as_str(),
            request_id,
            with_target(target)
        );

        match self.apply(org, target).await {
            Ok(Decision::Applied { from, plan_id }) => {
                info!(%from, plan_id = %plan_id, "subscription tier changed");
                crate::audit!(
                    AuditEventType::TransitionSucceeded,
                    org.as_str(),
                    request_id,
                    with_tiers(from, target),
                    with_plan_id(plan_id.as_str()),
                    with_duration(started.elapsed()),
                );
                TransitionOutcome::succeeded(format!("Your plan is now {display_name}"))
            }
            Ok(Decision::Rejected { from, reason }) => {
                info!(%from, %reason, "tier transition rejected");
                crate::audit!(
                    AuditEventType::TransitionRejected,
                    org.as_str(),
                    request_id,
                    with_tiers(from, target),
                    with_reason(reason.as_str()),
                    with_duration(started.elapsed()),
                );
                TransitionOutcome::failed(reason)
            }
            Err(err) => {
                error!(error = %err, "tier transition failed");
                crate::audit!(
                    AuditEventType::TransitionFailed,
                    org.as_str(),
                    request_id,
                    with_target(target),
                    with_error(err.to_string()),
                    with_duration(started.elapsed()),
                );
                TransitionOutcome::failed(failure_message(&err))
            }
        }
    }

    async fn apply(&self, org: &OrganizationId, target: SubscriptionTier) -> Result<Decision> {
        let organization = with_timeout(self.timeout, self.backend.get_organization(org)).await?;
        let current =
            with_timeout(self.timeout, self.backend.get_plan(&organization.subscription_plan_id))
                .await?;
        let from = current.tier;
        let target_config = self.catalog.get(target);

        if from == target {
            return Ok(Decision::Rejected {
                from,
                reason: format!("You are already on the {} plan", target_config.display_name),
            });
        }

        let plans = with_timeout(self.timeout, self.backend.list_plans()).await?;
        let Some(plan) = cheapest_active_plan(&plans, target) else {
            return Ok(Decision::Rejected {
                from,
                reason: format!("No {} plan is currently available", target_config.display_name),
            });
        };

        let now = Utc::now();
        let usage = with_timeout(self.timeout, fetch_usage(self.backend, org, now)).await?;
        let analysis = TransitionAnalyzer::new(self.catalog, self.policy).analyze_configurations(
            &current.to_configuration(self.catalog),
            &plan.to_configuration(self.catalog),
            &usage,
            now,
        )?;
        if !analysis.can_transition {
            let reason = analysis.warnings.into_iter().next().unwrap_or_else(|| {
                format!("Cannot change to the {} plan", target_config.display_name)
            });
            return Ok(Decision::Rejected { from, reason });
        }

        with_timeout(self.timeout, self.backend.update_organization_plan(org, &plan.id)).await?;
        Ok(Decision::Applied { from, plan_id: plan.id.clone() })
    }
}

/// User-facing text for a failed transition. Only backend failures get the
/// retry message.
fn failure_message(err: &GateError) -> &'static str {
    match err {
        GateError::OrganizationNotFound(_) => "Organization not found",
        GateError::PlanNotFound(_) => "Your current plan could not be found",
        GateError::InvalidTransition(_) => "This plan change is not allowed",
        GateError::Proration(_) => "The price of this plan change could not be calculated",
        _ if err.is_backend_failure() => RETRY_MESSAGE,
        _ => "Your subscription could not be changed",
    }
}
