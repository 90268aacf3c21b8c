//! Tier transition analysis.
//!
//! Compares two tier configurations under a usage snapshot: which features
//! are gained or lost, which usage would exceed the new limits, and what the
//! change costs. The analysis is ephemeral and is recomputed for every
//! confirmation screen and again by the executor before writing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    SubscriptionTier,
    catalog::{Feature, LimitType, TierCatalog, TierConfiguration, is_unlimited},
    error::{GateError, Result},
    proration::{ProrationEstimate, estimate_proration},
    usage::UsageData,
};

/// What to do with a downgrade that leaves usage over the new limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DowngradePolicy {
    /// Reject the downgrade until usage fits the new tier.
    #[default]
    Block,
    /// Allow it; existing data stays in place but is over the limit and new
    /// items cannot be created until usage drops.
    AllowOverLimit,
}

/// Features that differ between the two tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureChanges {
    /// Enabled on the target tier but not the current one.
    pub gained: Vec<Feature>,
    /// Enabled on the current tier but not the target one.
    pub lost: Vec<Feature>,
}

/// A usage value that would exceed the target tier's limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverLimitItem {
    /// Which limit.
    #[serde(rename = "type")]
    pub limit_type: LimitType,
    /// Current usage.
    pub current: u64,
    /// Limit on the target tier.
    pub new_limit: u64,
    /// Human-readable consequence.
    pub impact: String,
}

/// Usage consequences of the transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageImpact {
    /// Items over the target tier's limits.
    pub over_limit_items: Vec<OverLimitItem>,
}

/// Price consequences of the transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostImpact {
    /// Monthly price of the current tier.
    pub current_cost: Decimal,
    /// Monthly price of the target tier.
    pub new_cost: Decimal,
    /// `new_cost - current_cost`.
    pub difference: Decimal,
    /// Estimated charge or credit for the rest of the billing period.
    pub proration: ProrationEstimate,
}

/// Result of comparing two tiers under a usage snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTransitionAnalysis {
    /// Current tier.
    pub from: SubscriptionTier,
    /// Target tier.
    pub to: SubscriptionTier,
    /// Target ranks above current.
    pub is_upgrade: bool,
    /// Target ranks below current.
    pub is_downgrade: bool,
    /// Feature differences.
    pub feature_changes: FeatureChanges,
    /// Usage over the target limits.
    pub usage_impact: UsageImpact,
    /// Price differences.
    pub cost_impact: CostImpact,
    /// Messages the user should confirm before proceeding.
    pub warnings: Vec<String>,
    /// Whether the transition may be executed.
    pub can_transition: bool,
}

/// Analyzes transitions against a catalog with a fixed downgrade policy.
#[derive(Debug, Clone, Copy)]
pub struct TransitionAnalyzer<'a> {
    catalog: &'a TierCatalog,
    policy: DowngradePolicy,
}

impl<'a> TransitionAnalyzer<'a> {
    /// Creates an analyzer.
    #[must_use]
    pub const fn new(catalog: &'a TierCatalog, policy: DowngradePolicy) -> Self {
        Self { catalog, policy }
    }

    /// Compares the catalog configurations of `from` and `to` under `usage`,
    /// with proration as of `as_of`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidTransition`] when `from == to`, or a
    /// proration error on arithmetic overflow.
    pub fn analyze(
        &self,
        from: SubscriptionTier,
        to: SubscriptionTier,
        usage: &UsageData,
        as_of: DateTime<Utc>,
    ) -> Result<TierTransitionAnalysis> {
        self.analyze_configurations(self.catalog.get(from), self.catalog.get(to), usage, as_of)
    }

    /// Compares two resolved configurations, such as the overlays of the
    /// organization's current plan record and of the record about to be
    /// assigned.
    ///
    /// Prices, limits, and feature flags all come from `current` and
    /// `target`; the catalog is not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidTransition`] when both configurations
    /// belong to the same tier, or a proration error on arithmetic overflow.
    pub fn analyze_configurations(
        &self,
        current: &TierConfiguration,
        target: &TierConfiguration,
        usage: &UsageData,
        as_of: DateTime<Utc>,
    ) -> Result<TierTransitionAnalysis> {
        let (from, to) = (current.tier, target.tier);
        if from == to {
            return Err(GateError::InvalidTransition(format!("already on the {to} tier")));
        }

        let is_upgrade = !from.is_at_least(to);
        let is_downgrade = !to.is_at_least(from);
        let feature_changes = feature_changes(current, target);
        let usage_impact = usage_impact(target, usage);

        let current_cost = current.monthly_price;
        let new_cost = target.monthly_price;
        let cost_impact = CostImpact {
            current_cost,
            new_cost,
            difference: new_cost - current_cost,
            proration: estimate_proration(current_cost, new_cost, as_of)?,
        };

        let mut warnings = Vec::new();
        let mut can_transition = true;

        if !usage_impact.over_limit_items.is_empty() {
            warnings.push(format!(
                "Current usage exceeds the {} limits: {}",
                target.display_name,
                usage_impact
                    .over_limit_items
                    .iter()
                    .map(|item| item.limit_type.label())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            if is_downgrade {
                match self.policy {
                    DowngradePolicy::Block => {
                        can_transition = false;
                        warnings.push(
                            "Reduce usage to fit the new limits before downgrading".to_owned(),
                        );
                    }
                    DowngradePolicy::AllowOverLimit => warnings.push(
                        "Existing data is kept, but new items cannot be created until usage \
                         is below the new limits"
                            .to_owned(),
                    ),
                }
            }
        }

        if is_downgrade && !feature_changes.lost.is_empty() {
            warnings.push(format!(
                "You will lose access to: {}",
                feature_changes.lost.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
            ));
        }

        debug!(
            %from,
            %to,
            over_limit = usage_impact.over_limit_items.len(),
            can_transition,
            "tier transition analyzed"
        );

        Ok(TierTransitionAnalysis {
            from,
            to,
            is_upgrade,
            is_downgrade,
            feature_changes,
            usage_impact,
            cost_impact,
            warnings,
            can_transition,
        })
    }
}

fn feature_changes(current: &TierConfiguration, target: &TierConfiguration) -> FeatureChanges {
    FeatureChanges {
        gained: Feature::ALL
            .into_iter()
            .filter(|f| target.has_feature(*f) && !current.has_feature(*f))
            .collect(),
        lost: Feature::ALL
            .into_iter()
            .filter(|f| current.has_feature(*f) && !target.has_feature(*f))
            .collect(),
    }
}

fn usage_impact(target: &TierConfiguration, usage: &UsageData) -> UsageImpact {
    let over_limit_items = usage
        .iter()
        .filter_map(|(limit_type, current)| {
            let new_limit = target.limit(limit_type);
            (!is_unlimited(new_limit) && current > new_limit).then(|| OverLimitItem {
                limit_type,
                current,
                new_limit,
                impact: impact_text(limit_type, current, new_limit),
            })
        })
        .collect();
    UsageImpact { over_limit_items }
}

fn impact_text(limit_type: LimitType, current: u64, new_limit: u64) -> String {
    let excess = current - new_limit;
    match limit_type {
        LimitType::Avatars => format!(
            "{current} avatars exceed the limit of {new_limit}; {excess} must be removed before \
             new avatars can be added"
        ),
        LimitType::CollectionsPerAvatar => format!(
            "An avatar has {current} collections, above the limit of {new_limit}; new collections \
             will be blocked"
        ),
        LimitType::SessionsPerMonth => format!(
            "{current} sessions this month exceed the limit of {new_limit}; new sessions will be \
             blocked until next month"
        ),
        LimitType::DataRetentionMonths => format!(
            "{current} months of history exceed the retention of {new_limit} months; {excess} \
             months of older history will no longer be available"
        ),
    }
}

/// Analyzes a transition with the default [`DowngradePolicy`] and proration
/// as of now.
///
/// # Errors
///
/// Returns [`GateError::InvalidTransition`] when `from == to`.
///
/// # Examples
///
/// ```
/// use tier_gate::{Feature, SubscriptionTier, TierCatalog, UsageData, analyze_tier_transition};
///
/// let catalog = TierCatalog::reference();
/// let analysis = analyze_tier_transition(
///     &catalog,
///     SubscriptionTier::Personal,
///     SubscriptionTier::Professional,
///     &UsageData::default(),
/// )
/// .unwrap();
///
/// assert!(analysis.is_upgrade);
/// assert!(analysis.feature_changes.gained.contains(&Feature::Analytics));
/// ```
pub fn analyze_tier_transition(
    catalog: &TierCatalog,
    from: SubscriptionTier,
    to: SubscriptionTier,
    usage: &UsageData,
) -> Result<TierTransitionAnalysis> {
    TransitionAnalyzer::new(catalog, DowngradePolicy::default()).analyze(from, to, usage, Utc::now())
}
