//! Records read from and written to the backend.
//!
//! These mirror the `organizations` and `subscription_plans` rows. The
//! backend owns their lifecycle; this crate only reads them and updates an
//! organization's plan reference.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    SubscriptionTier,
    catalog::{Feature, LimitType, TierCatalog, TierConfiguration},
    error::{GateError, Result},
};

/// Maximum identifier length accepted by [`validate_identifier`].
const MAX_IDENTIFIER_LEN: usize = 64;

fn validate_identifier(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(GateError::InvalidIdentifier(format!("{kind} cannot be empty")));
    }
    if id.len() > MAX_IDENTIFIER_LEN {
        return Err(GateError::InvalidIdentifier(format!(
            "{kind} must be {MAX_IDENTIFIER_LEN} characters or less"
        )));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(GateError::InvalidIdentifier(format!(
            "{kind} can only contain alphanumeric characters, hyphens, and underscores"
        )));
    }
    Ok(())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier after validation.
            ///
            /// # Errors
            ///
            /// Returns error if the ID is empty, longer than 64 characters, or
            /// contains characters other than ASCII alphanumerics, `-` and `_`.
            pub fn new<S: Into<String>>(id: S) -> Result<Self> {
                let id = id.into();
                validate_identifier($kind, &id)?;
                Ok(Self(id))
            }

            /// Returns the inner string reference.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = GateError;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Unique identifier of an organization.
    OrganizationId,
    "organization id"
);
identifier!(
    /// Unique identifier of a subscription plan record.
    PlanId,
    "plan id"
);
identifier!(
    /// Unique identifier of an avatar (child profile).
    AvatarId,
    "avatar id"
);

/// An organization and its active plan reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization identifier.
    pub id: OrganizationId,
    /// Display name.
    pub name: String,
    /// Reference to the active [`SubscriptionPlanRecord`].
    pub subscription_plan_id: PlanId,
}

/// A row of the `subscription_plans` table.
///
/// Several records may exist for one tier (regional pricing, legacy
/// prices). The executor picks the cheapest active record of a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlanRecord {
    /// Plan identifier.
    pub id: PlanId,
    /// Tier this plan belongs to.
    pub tier: SubscriptionTier,
    /// Price per month.
    pub base_price: Decimal,
    /// Avatar limit for this plan.
    pub avatar_limit: u64,
    /// Feature flags keyed by wire name.
    #[serde(default)]
    pub features_included: BTreeMap<String, bool>,
    /// Whether the plan can be assigned to organizations.
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl SubscriptionPlanRecord {
    /// Resolves the live configuration for this plan.
    ///
    /// Starts from the catalog configuration of the plan's tier and overlays
    /// the record's price, avatar limit, and feature flags. Unknown feature keys
    /// are skipped.
    #[must_use]
    pub fn to_configuration(&self, catalog: &TierCatalog) -> TierConfiguration {
        let mut config = catalog.get(self.tier).clone();
        config.monthly_price = self.base_price;
        config.limits.insert(LimitType::Avatars, self.avatar_limit);

        for (key, enabled) in &self.features_included {
            match key.parse::<Feature>() {
                Ok(feature) => {
                    config.features.insert(feature, *enabled);
                }
                Err(_) => warn!(plan_id = %self.id, feature = %key, "skipping unknown feature key"),
            }
        }
        config
    }
}

/// Returns the lowest-priced active record of `tier`.
///
/// Ties on price resolve to the smallest plan id so the choice is stable.
#[must_use]
pub fn cheapest_active_plan(
    plans: &[SubscriptionPlanRecord],
    tier: SubscriptionTier,
) -> Option<&SubscriptionPlanRecord> {
    plans
        .iter()
        .filter(|plan| plan.active && plan.tier == tier)
        .min_by(|a, b| a.base_price.cmp(&b.base_price).then_with(|| a.id.cmp(&b.id)))
}
