//! View models for gated UI elements.
//!
//! These turn gate results into what a screen renders: hide, show, or
//! overlay an upsell. Each helper is a pure function of its inputs, so a
//! caller that re-evaluates the gate after a tier change gets a fresh view;
//! nothing is remembered between calls.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    SubscriptionTier,
    catalog::{LimitType, TierCatalog, TierConfiguration, is_unlimited},
    gate::FeatureGateResult,
};

/// Usage ratio at which a meter is flagged as nearly full.
pub const NEAR_LIMIT_PERCENT: u8 = 80;

/// What a gated element should render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateView {
    /// Plan not loaded yet; render a placeholder, not a denial.
    Loading,
    /// Render the gated content.
    Render,
    /// Render the fallback with an upgrade prompt.
    Upsell {
        /// Lowest tier that unlocks the content.
        tier: SubscriptionTier,
        /// Why the content is locked.
        reason: String,
    },
    /// Render the fallback; no tier unlocks it.
    Denied {
        /// Why the content is locked.
        reason: String,
    },
}

impl GateView {
    /// Maps a gate result to a view.
    ///
    /// # Examples
    ///
    /// ```
    /// use tier_gate::{
    ///     Feature, SubscriptionTier, TierCatalog,
    ///     gate::can_access_feature,
    ///     presentation::GateView,
    /// };
    ///
    /// let catalog = TierCatalog::reference();
    /// let result =
    ///     can_access_feature(&catalog, Some(catalog.get(SubscriptionTier::Personal)), Feature::Analytics);
    ///
    /// assert!(matches!(
    ///     GateView::from_result(&result),
    ///     GateView::Upsell { tier: SubscriptionTier::Professional, .. }
    /// ));
    /// ```
    #[must_use]
    pub fn from_result(result: &FeatureGateResult) -> Self {
        if result.allowed {
            return Self::Render;
        }
        if result.is_loading() {
            return Self::Loading;
        }
        let reason = result.reason.clone().unwrap_or_else(|| "Not available".to_owned());
        match result.upgrade_required {
            Some(tier) => Self::Upsell { tier, reason },
            None => Self::Denied { reason },
        }
    }

    /// Whether the gated content itself should be shown.
    #[must_use]
    pub const fn shows_content(&self) -> bool {
        matches!(self, Self::Render)
    }

    /// Whether an action button guarded by this gate should be disabled.
    #[must_use]
    pub const fn disables_action(&self) -> bool {
        !self.shows_content()
    }
}

/// A usage bar for one limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMeter {
    /// Limit label, e.g. "Avatars".
    pub label: String,
    /// Current usage.
    pub current: u64,
    /// Ceiling, or `None` when unlimited.
    pub limit: Option<u64>,
    /// Percentage used, capped at 100. Zero when unlimited.
    pub percent: u8,
    /// Usage is at least [`NEAR_LIMIT_PERCENT`] of the limit.
    pub near_limit: bool,
    /// Usage has reached the limit; creation is blocked.
    pub at_limit: bool,
}

impl UsageMeter {
    /// Builds a meter from raw numbers.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "percentage is clamped to 100 before narrowing"
    )]
    pub fn new(label: impl Into<String>, current: u64, limit: u64) -> Self {
        if is_unlimited(limit) {
            return Self {
                label: label.into(),
                current,
                limit: None,
                percent: 0,
                near_limit: false,
                at_limit: false,
            };
        }

        let percent = if limit == 0 {
            100
        } else {
            (u128::from(current) * 100 / u128::from(limit)).min(100) as u8
        };

        Self {
            label: label.into(),
            current,
            limit: Some(limit),
            percent,
            near_limit: percent >= NEAR_LIMIT_PERCENT,
            at_limit: current >= limit,
        }
    }

    /// Builds the meter for `limit_type` on `tier`.
    #[must_use]
    pub fn for_limit(
        catalog: &TierCatalog,
        tier: SubscriptionTier,
        limit_type: LimitType,
        current: u64,
    ) -> Self {
        Self::new(limit_type.label(), current, catalog.get(tier).limit(limit_type))
    }
}

/// Label for a tier in navigation and pricing tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBadge {
    /// The tier.
    pub tier: SubscriptionTier,
    /// Display name from the catalog.
    pub display_name: String,
    /// Position in the tier ordering.
    pub rank: u8,
    /// Formatted price, e.g. "$29.99/month".
    pub price_label: String,
}

impl TierBadge {
    /// Builds the badge for `tier` at its catalog price.
    #[must_use]
    pub fn for_tier(catalog: &TierCatalog, tier: SubscriptionTier) -> Self {
        Self::for_configuration(catalog.get(tier))
    }

    /// Builds the badge for a resolved configuration, such as a plan
    /// record's overlay, so the label shows the price actually charged.
    #[must_use]
    pub fn for_configuration(config: &TierConfiguration) -> Self {
        Self {
            tier: config.tier,
            display_name: config.display_name.clone(),
            rank: config.tier.rank(),
            price_label: price_label(config.monthly_price),
        }
    }
}

fn price_label(price: Decimal) -> String {
    if price.is_zero() {
        "Free".to_owned()
    } else {
        format!("${price:.2}/month")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Feature, gate::check_usage_limit};

    #[test]
    fn test_view_from_loading() {
        assert_eq!(GateView::from_result(&FeatureGateResult::loading()), GateView::Loading);
    }

    #[test]
    fn test_view_from_allow() {
        let view = GateView::from_result(&FeatureGateResult::allow());
        assert_eq!(view, GateView::Render);
        assert!(view.shows_content());
        assert!(!view.disables_action());
    }

    #[test]
    fn test_view_upsell_and_denied() {
        let upsell = GateView::from_result(&FeatureGateResult::deny(
            "analytics requires upgrade",
            Some(SubscriptionTier::Professional),
        ));
        assert_eq!(upsell, GateView::Upsell {
            tier: SubscriptionTier::Professional,
            reason: "analytics requires upgrade".to_owned(),
        });
        assert!(upsell.disables_action());

        let denied = GateView::from_result(&FeatureGateResult::deny("Avatars limit reached", None));
        assert!(matches!(denied, GateView::Denied { .. }));
    }

    #[test]
    fn test_view_follows_tier_change() {
        let catalog = TierCatalog::reference();
        let before = crate::gate::can_access_feature(
            &catalog,
            Some(catalog.get(SubscriptionTier::Personal)),
            Feature::DataExport,
        );
        let after = crate::gate::can_access_feature(
            &catalog,
            Some(catalog.get(SubscriptionTier::Professional)),
            Feature::DataExport,
        );
        assert!(!GateView::from_result(&before).shows_content());
        assert!(GateView::from_result(&after).shows_content());
    }

    #[test]
    fn test_view_serialization() {
        let json = serde_json::to_value(GateView::Upsell {
            tier: SubscriptionTier::Enterprise,
            reason: "api_access requires upgrade".to_owned(),
        })
        .unwrap();
        assert_eq!(json["state"], "upsell");
        assert_eq!(json["tier"], "enterprise");
    }

    #[test]
    fn test_meter_thresholds() {
        let meter = UsageMeter::new("Avatars", 3, 5);
        assert_eq!(meter.percent, 60);
        assert!(!meter.near_limit);
        assert!(!meter.at_limit);

        let meter = UsageMeter::new("Avatars", 4, 5);
        assert_eq!(meter.percent, 80);
        assert!(meter.near_limit);
        assert!(!meter.at_limit);

        let meter = UsageMeter::new("Avatars", 7, 5);
        assert_eq!(meter.percent, 100);
        assert!(meter.at_limit);
    }

    #[test]
    fn test_meter_unlimited() {
        let meter = UsageMeter::new("Avatars", 50_000, 10_000);
        assert_eq!(meter.limit, None);
        assert_eq!(meter.percent, 0);
        assert!(!meter.at_limit);
    }

    #[test]
    fn test_meter_zero_limit_is_full() {
        let meter = UsageMeter::new("Sessions", 0, 0);
        assert_eq!(meter.percent, 100);
        assert!(meter.at_limit);
    }

    #[test]
    fn test_meter_agrees_with_gate() {
        let catalog = TierCatalog::reference();
        let plan = catalog.get(SubscriptionTier::Personal);
        for usage in 0..8 {
            let meter = UsageMeter::for_limit(
                &catalog,
                SubscriptionTier::Personal,
                LimitType::Avatars,
                usage,
            );
            let gate = check_usage_limit(&catalog, Some(plan), LimitType::Avatars, usage);
            assert_eq!(meter.at_limit, !gate.allowed, "usage {usage}");
        }
    }

    #[test]
    fn test_badges() {
        let catalog = TierCatalog::reference();
        let badge = TierBadge::for_tier(&catalog, SubscriptionTier::Professional);
        assert_eq!(badge.display_name, "Professional");
        assert_eq!(badge.price_label, "$29.99/month");
        assert!(TierBadge::for_tier(&catalog, SubscriptionTier::Enterprise).rank > badge.rank);
    }

    #[test]
    fn test_badge_uses_configured_price() {
        let catalog = TierCatalog::reference();
        let mut config = catalog.get(SubscriptionTier::Personal).clone();
        config.monthly_price = Decimal::new(799, 2);

        let badge = TierBadge::for_configuration(&config);
        assert_eq!(badge.tier, SubscriptionTier::Personal);
        assert_eq!(badge.price_label, "$7.99/month");
    }
}
