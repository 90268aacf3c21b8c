//! Per-organization gating report.

use std::{collections::BTreeMap, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tier_gate::{
    Feature, LimitType, Result, SubscriptionTier, TierCatalog, TierTransitionAnalysis,
    backend::Backend,
    gate::{UsageGate, can_access_feature},
    models::OrganizationId,
    presentation::{GateView, TierBadge, UsageMeter},
    transition::{DowngradePolicy, TransitionAnalyzer},
    usage::fetch_usage,
};
use tracing::instrument;

/// What one organization can do on its current plan.
#[derive(Debug, Serialize)]
pub struct OrganizationReport {
    /// Organization identifier.
    pub id: OrganizationId,
    /// Display name.
    pub name: String,
    /// Current tier.
    pub badge: TierBadge,
    /// One meter per limit.
    pub meters: Vec<UsageMeter>,
    /// How each feature would render.
    pub features: BTreeMap<Feature, GateView>,
    /// What moving one tier up would change, if there is a higher tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_tier: Option<TierTransitionAnalysis>,
}

/// Builds reports with fresh backend reads.
#[derive(Debug)]
pub struct Reporter<'a, B> {
    backend: &'a B,
    catalog: &'a TierCatalog,
    policy: DowngradePolicy,
    timeout: Duration,
}

impl<'a, B: Backend> Reporter<'a, B> {
    /// Creates a reporter.
    #[must_use]
    pub const fn new(
        backend: &'a B,
        catalog: &'a TierCatalog,
        policy: DowngradePolicy,
        timeout: Duration,
    ) -> Self {
        Self { backend, catalog, policy, timeout }
    }

    /// Reports on `org` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns the first backend error.
    #[instrument(skip(self, now), fields(organization_id = %org))]
    pub async fn organization(
        &self,
        org: &OrganizationId,
        now: DateTime<Utc>,
    ) -> Result<OrganizationReport> {
        let organization =
            tier_gate::gate::with_timeout(self.timeout, self.backend.get_organization(org)).await?;
        let plan = UsageGate::new(self.backend, self.catalog, self.timeout).plan_for(org).await?;
        let usage =
            tier_gate::gate::with_timeout(self.timeout, fetch_usage(self.backend, org, now))
                .await?;
        let tier: SubscriptionTier = plan.tier;

        let meters = LimitType::ALL
            .into_iter()
            .map(|limit_type| {
                UsageMeter::new(limit_type.label(), usage.get(limit_type), plan.limit(limit_type))
            })
            .collect();
        let features = Feature::ALL
            .into_iter()
            .map(|feature| {
                let view =
                    GateView::from_result(&can_access_feature(self.catalog, Some(&plan), feature));
                (feature, view)
            })
            .collect();
        let next_tier = match tier.next() {
            Some(next) => Some(
                TransitionAnalyzer::new(self.catalog, self.policy).analyze_configurations(
                    &plan,
                    self.catalog.get(next),
                    &usage,
                    now,
                )?,
            ),
            None => None,
        };

        Ok(OrganizationReport {
            id: organization.id,
            name: organization.name,
            badge: TierBadge::for_configuration(&plan),
            meters,
            features,
            next_tier,
        })
    }
}
