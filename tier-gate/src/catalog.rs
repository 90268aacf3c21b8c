//! Static tier catalog: prices, usage limits, and feature flags per tier.
//!
//! The catalog is loaded once per process and never mutated. Feature and
//! limit keys are closed enums, so a typo in a key is a compile error in code
//! and a parse error in configuration rather than a silent `false`.

use std::{collections::BTreeMap, fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    SubscriptionTier,
    error::{GateError, Result},
};

/// Limit value at or above which a limit is treated as unlimited.
pub const UNLIMITED: u64 = 10_000;

/// Returns true if `limit` is the "effectively unlimited" sentinel.
#[must_use]
pub const fn is_unlimited(limit: u64) -> bool {
    limit >= UNLIMITED
}

/// Capabilities that a tier may or may not include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// The core game library.
    BasicGames,
    /// Per-avatar progress history.
    ProgressTracking,
    /// User-curated game collections.
    CustomCollections,
    /// The analytics dashboard.
    Analytics,
    /// CSV/JSON export of progress data.
    DataExport,
    /// Priority support queue.
    PrioritySupport,
    /// Organization user management.
    MultiUserManagement,
    /// Programmatic API access.
    ApiAccess,
    /// Organization branding.
    CustomBranding,
}

impl Feature {
    /// All features in declaration order.
    pub const ALL: [Self; 9] = [
        Self::BasicGames,
        Self::ProgressTracking,
        Self::CustomCollections,
        Self::Analytics,
        Self::DataExport,
        Self::PrioritySupport,
        Self::MultiUserManagement,
        Self::ApiAccess,
        Self::CustomBranding,
    ];

    /// Wire name of the feature.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BasicGames => "basic_games",
            Self::ProgressTracking => "progress_tracking",
            Self::CustomCollections => "custom_collections",
            Self::Analytics => "analytics",
            Self::DataExport => "data_export",
            Self::PrioritySupport => "priority_support",
            Self::MultiUserManagement => "multi_user_management",
            Self::ApiAccess => "api_access",
            Self::CustomBranding => "custom_branding",
        }
    }
}

impl FromStr for Feature {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|feature| feature.as_str() == s)
            .ok_or_else(|| GateError::Config(format!("unknown feature '{s}'")))
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resources whose usage is capped per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    /// Child profiles in the organization.
    Avatars,
    /// Game collections owned by a single avatar.
    CollectionsPerAvatar,
    /// Game sessions started in the current calendar month.
    SessionsPerMonth,
    /// Months of session history kept.
    DataRetentionMonths,
}

impl LimitType {
    /// All limit types in declaration order.
    pub const ALL: [Self; 4] =
        [Self::Avatars, Self::CollectionsPerAvatar, Self::SessionsPerMonth, Self::DataRetentionMonths];

    /// Wire name of the limit.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Avatars => "avatars",
            Self::CollectionsPerAvatar => "collections_per_avatar",
            Self::SessionsPerMonth => "sessions_per_month",
            Self::DataRetentionMonths => "data_retention_months",
        }
    }

    /// Human-readable label used in reasons and meters.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Avatars => "Avatars",
            Self::CollectionsPerAvatar => "Collections per avatar",
            Self::SessionsPerMonth => "Sessions this month",
            Self::DataRetentionMonths => "Data retention (months)",
        }
    }
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable configuration of one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfiguration {
    /// Tier this configuration describes.
    pub tier: SubscriptionTier,
    /// Display name (e.g. "Professional").
    pub display_name: String,
    /// Marketing description.
    #[serde(default)]
    pub description: String,
    /// Base price per month.
    pub monthly_price: Decimal,
    /// Usage ceilings. Missing entries mean zero.
    #[serde(default)]
    pub limits: BTreeMap<LimitType, u64>,
    /// Feature flags. Missing entries mean disabled.
    #[serde(default)]
    pub features: BTreeMap<Feature, bool>,
}

impl TierConfiguration {
    /// Returns the ceiling for `limit_type`.
    #[must_use]
    pub fn limit(&self, limit_type: LimitType) -> u64 {
        self.limits.get(&limit_type).copied().unwrap_or(0)
    }

    /// Returns true if the feature is enabled for this tier.
    #[must_use]
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.get(&feature).copied().unwrap_or(false)
    }

    /// Enabled features in declaration order.
    pub fn enabled_features(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.into_iter().filter(|feature| self.has_feature(*feature))
    }

    fn validate(&self) -> Result<()> {
        if self.display_name.trim().is_empty() {
            return Err(GateError::Catalog(format!("tier '{}' has an empty display name", self.tier)));
        }
        if self.monthly_price.is_sign_negative() {
            return Err(GateError::Catalog(format!("tier '{}' has a negative price", self.tier)));
        }
        if let Some(missing) = LimitType::ALL.into_iter().find(|l| !self.limits.contains_key(l)) {
            return Err(GateError::Catalog(format!(
                "tier '{}' does not define the '{missing}' limit",
                self.tier
            )));
        }
        Ok(())
    }
}

/// One configuration per tier.
///
/// The three slots are separate fields, so a catalog cannot be missing a
/// tier once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCatalog {
    personal: TierConfiguration,
    professional: TierConfiguration,
    enterprise: TierConfiguration,
}

impl TierCatalog {
    /// Builds a catalog from a list of configurations.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Catalog`] if a tier is missing or duplicated, a tier
    /// is missing a limit, or a feature enabled on a lower tier is disabled on a
    /// higher one.
    pub fn from_configurations(configs: Vec<TierConfiguration>) -> Result<Self> {
        let mut slots: [Option<TierConfiguration>; 3] = [None, None, None];

        for config in configs {
            config.validate()?;
            let slot = &mut slots[usize::from(config.tier.rank() - 1)];
            if slot.is_some() {
                return Err(GateError::Catalog(format!(
                    "tier '{}' is configured more than once",
                    config.tier
                )));
            }
            *slot = Some(config);
        }

        let [personal, professional, enterprise] = slots;
        let take = |slot: Option<TierConfiguration>, tier: SubscriptionTier| {
            slot.ok_or_else(|| GateError::Catalog(format!("tier '{tier}' is not configured")))
        };

        let catalog = Self {
            personal: take(personal, SubscriptionTier::Personal)?,
            professional: take(professional, SubscriptionTier::Professional)?,
            enterprise: take(enterprise, SubscriptionTier::Enterprise)?,
        };
        catalog.check_feature_monotonicity()?;
        Ok(catalog)
    }

    /// The catalog shipped with the application.
    #[must_use]
    pub fn reference() -> Self {
        use Feature::{
            Analytics, ApiAccess, BasicGames, CustomBranding, CustomCollections, DataExport,
            MultiUserManagement, PrioritySupport, ProgressTracking,
        };

        let personal_features = [BasicGames, ProgressTracking, CustomCollections];
        let professional_features = [Analytics, DataExport, PrioritySupport];
        let enterprise_features = [MultiUserManagement, ApiAccess, CustomBranding];

        let features = |enabled: &[&[Feature]]| -> BTreeMap<Feature, bool> {
            Feature::ALL
                .into_iter()
                .map(|f| (f, enabled.iter().any(|group| group.contains(&f))))
                .collect()
        };
        let limits = |values: [u64; 4]| -> BTreeMap<LimitType, u64> {
            LimitType::ALL.into_iter().zip(values).collect()
        };

        Self {
            personal: TierConfiguration {
                tier: SubscriptionTier::Personal,
                display_name: "Personal".to_owned(),
                description: "Learning games for a single family".to_owned(),
                monthly_price: Decimal::new(999, 2),
                limits: limits([5, 10, 500, 3]),
                features: features(&[&personal_features]),
            },
            professional: TierConfiguration {
                tier: SubscriptionTier::Professional,
                display_name: "Professional".to_owned(),
                description: "Progress analytics for educators and tutors".to_owned(),
                monthly_price: Decimal::new(2999, 2),
                limits: limits([25, 50, 5000, 12]),
                features: features(&[&personal_features, &professional_features]),
            },
            enterprise: TierConfiguration {
                tier: SubscriptionTier::Enterprise,
                display_name: "Enterprise".to_owned(),
                description: "Schools and organizations with many learners".to_owned(),
                monthly_price: Decimal::new(9999, 2),
                limits: limits([UNLIMITED; 4]),
                features: features(&[
                    &personal_features,
                    &professional_features,
                    &enterprise_features,
                ]),
            },
        }
    }

    /// Returns the configuration of `tier`.
    #[must_use]
    pub const fn get(&self, tier: SubscriptionTier) -> &TierConfiguration {
        match tier {
            SubscriptionTier::Personal => &self.personal,
            SubscriptionTier::Professional => &self.professional,
            SubscriptionTier::Enterprise => &self.enterprise,
        }
    }

    /// Configurations in ascending rank order.
    pub fn iter(&self) -> impl Iterator<Item = &TierConfiguration> {
        [&self.personal, &self.professional, &self.enterprise].into_iter()
    }

    /// Monthly price of `tier`.
    #[must_use]
    pub const fn price(&self, tier: SubscriptionTier) -> Decimal {
        self.get(tier).monthly_price
    }

    /// Lowest tier ranked above `current` that enables `feature`.
    #[must_use]
    pub fn upgrade_for_feature(
        &self,
        current: SubscriptionTier,
        feature: Feature,
    ) -> Option<SubscriptionTier> {
        current.higher().find(|tier| self.get(*tier).has_feature(feature))
    }

    /// Lowest tier ranked above `current` whose `limit_type` ceiling exceeds
    /// `usage`.
    #[must_use]
    pub fn upgrade_for_limit(
        &self,
        current: SubscriptionTier,
        limit_type: LimitType,
        usage: u64,
    ) -> Option<SubscriptionTier> {
        current.higher().find(|tier| {
            let limit = self.get(*tier).limit(limit_type);
            is_unlimited(limit) || usage < limit
        })
    }

    fn check_feature_monotonicity(&self) -> Result<()> {
        let tiers: Vec<_> = self.iter().collect();
        for pair in tiers.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            if let Some(feature) = lower.enabled_features().find(|f| !higher.has_feature(*f)) {
                return Err(GateError::Catalog(format!(
                    "feature '{feature}' is enabled on '{}' but disabled on higher tier '{}'",
                    lower.tier, higher.tier
                )));
            }
        }
        Ok(())
    }
}

impl Default for TierCatalog {
    fn default() -> Self {
        Self::reference()
    }
}
