//! Feature and usage gate evaluation.
//!
//! Every function here takes the plan configuration explicitly. A `None`
//! plan means the plan has not been loaded yet; the result is a transient
//! "loading" state, not a denial.
//!
//! Expected denials are returned as a [`FeatureGateResult`]; only backend
//! failures produce an `Err`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    SubscriptionTier,
    backend::Backend,
    catalog::{Feature, LimitType, TierCatalog, TierConfiguration, is_unlimited},
    error::{GateError, Result},
    models::{AvatarId, OrganizationId},
};

/// Reason reported while the plan is not loaded.
pub const LOADING_REASON: &str = "loading";

/// Outcome of a single gate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct FeatureGateResult {
    /// Whether the action is permitted.
    pub allowed: bool,
    /// Human-readable explanation of a denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The ceiling that applies, for limit checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Lowest tier that would permit the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_required: Option<SubscriptionTier>,
}

impl FeatureGateResult {
    /// An unconditional allow.
    pub const fn allow() -> Self {
        Self { allowed: true, reason: None, limit: None, upgrade_required: None }
    }

    /// The transient state while the plan is still loading.
    pub fn loading() -> Self {
        Self {
            allowed: false,
            reason: Some(LOADING_REASON.to_owned()),
            limit: None,
            upgrade_required: None,
        }
    }

    /// A denial with a reason and an optional upgrade hint.
    pub fn deny(reason: impl Into<String>, upgrade_required: Option<SubscriptionTier>) -> Self {
        Self { allowed: false, reason: Some(reason.into()), limit: None, upgrade_required }
    }

    /// Attaches the applicable limit.
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True while the plan is not loaded. Callers must not treat this as a
    /// final denial.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        !self.allowed && self.reason.as_deref() == Some(LOADING_REASON)
    }
}

/// Checks whether `plan` includes `feature`.
///
/// # Examples
///
/// ```
/// use tier_gate::{Feature, SubscriptionTier, TierCatalog, gate::can_access_feature};
///
/// let catalog = TierCatalog::reference();
/// let personal = catalog.get(SubscriptionTier::Personal);
///
/// let result = can_access_feature(&catalog, Some(personal), Feature::Analytics);
/// assert!(!result.allowed);
/// assert_eq!(result.upgrade_required, Some(SubscriptionTier::Professional));
///
/// assert!(can_access_feature(&catalog, None, Feature::Analytics).is_loading());
/// ```
pub fn can_access_feature(
    catalog: &TierCatalog,
    plan: Option<&TierConfiguration>,
    feature: Feature,
) -> FeatureGateResult {
    let Some(plan) = plan else {
        return FeatureGateResult::loading();
    };

    if plan.has_feature(feature) {
        return FeatureGateResult::allow();
    }

    FeatureGateResult::deny(
        format!("{feature} requires upgrade"),
        catalog.upgrade_for_feature(plan.tier, feature),
    )
}

/// Checks `current_usage` against the plan's `limit_type` ceiling.
///
/// Usage equal to the limit is denied: the limit is a ceiling on the total,
/// not a count of remaining slots. The unlimited sentinel always allows.
pub fn check_usage_limit(
    catalog: &TierCatalog,
    plan: Option<&TierConfiguration>,
    limit_type: LimitType,
    current_usage: u64,
) -> FeatureGateResult {
    let Some(plan) = plan else {
        return FeatureGateResult::loading();
    };

    let limit = plan.limit(limit_type);
    if is_unlimited(limit) || current_usage < limit {
        return FeatureGateResult::allow().with_limit(limit);
    }

    FeatureGateResult::deny(
        format!("{} limit reached ({current_usage}/{limit})", limit_type.label()),
        catalog.upgrade_for_limit(plan.tier, limit_type, current_usage),
    )
    .with_limit(limit)
}

/// Gates that read fresh counts from the backend on every call.
///
/// Two clients can both pass a check before either creates the resource;
/// the backend has no conditional write to close that window.
#[derive(Debug)]
pub struct UsageGate<'a, B> {
    backend: &'a B,
    catalog: &'a TierCatalog,
    timeout: Duration,
}

impl<'a, B: Backend> UsageGate<'a, B> {
    /// Creates a gate over `backend`. Each backend call is bounded by `timeout`.
    #[must_use]
    pub const fn new(backend: &'a B, catalog: &'a TierCatalog, timeout: Duration) -> Self {
        Self { backend, catalog, timeout }
    }

    /// Loads the organization's live plan configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the organization or its plan cannot be read.
    pub async fn plan_for(&self, org: &OrganizationId) -> Result<TierConfiguration> {
        let organization = with_timeout(self.timeout, self.backend.get_organization(org)).await?;
        let record =
            with_timeout(self.timeout, self.backend.get_plan(&organization.subscription_plan_id))
                .await?;
        Ok(record.to_configuration(self.catalog))
    }

    /// Checks whether the organization may create another avatar.
    ///
    /// # Errors
    ///
    /// Returns error only for backend failures.
    #[instrument(skip(self), fields(organization_id = %org))]
    pub async fn can_create_avatar(&self, org: &OrganizationId) -> Result<FeatureGateResult> {
        let plan = self.plan_for(org).await?;
        let count = with_timeout(self.timeout, self.backend.count_avatars(org)).await?;
        let result = check_usage_limit(self.catalog, Some(&plan), LimitType::Avatars, count);
        debug!(count, allowed = result.allowed, "avatar gate evaluated");
        Ok(result)
    }

    /// Checks whether `avatar` may create another collection.
    ///
    /// # Errors
    ///
    /// Returns error only for backend failures.
    #[instrument(skip(self), fields(organization_id = %org, avatar_id = %avatar))]
    pub async fn can_create_collection(
        &self,
        org: &OrganizationId,
        avatar: &AvatarId,
    ) -> Result<FeatureGateResult> {
        let plan = self.plan_for(org).await?;
        if !plan.has_feature(Feature::CustomCollections) {
            return Ok(can_access_feature(self.catalog, Some(&plan), Feature::CustomCollections));
        }
        let count =
            with_timeout(self.timeout, self.backend.count_collections_for_avatar(org, avatar))
                .await?;
        let result =
            check_usage_limit(self.catalog, Some(&plan), LimitType::CollectionsPerAvatar, count);
        debug!(count, allowed = result.allowed, "collection gate evaluated");
        Ok(result)
    }
}

/// Bounds a backend call by `timeout`.
///
/// # Errors
///
/// Returns [`GateError::Timeout`] when the call does not finish in time, or
/// the call's own error.
pub async fn with_timeout<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, call).await.map_err(|_| GateError::Timeout(timeout))?
}
