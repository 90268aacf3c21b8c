//! Property tests for gate evaluation and transition analysis.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use tier_gate::{
    Feature, LimitType, SubscriptionTier, TierCatalog, UNLIMITED, UsageData,
    gate::{can_access_feature, check_usage_limit},
    transition::{DowngradePolicy, TransitionAnalyzer},
};

fn tier() -> impl Strategy<Value = SubscriptionTier> {
    prop::sample::select(SubscriptionTier::all().to_vec())
}

fn feature() -> impl Strategy<Value = Feature> {
    prop::sample::select(Feature::ALL.to_vec())
}

fn limit_type() -> impl Strategy<Value = LimitType> {
    prop::sample::select(LimitType::ALL.to_vec())
}

fn usage() -> impl Strategy<Value = UsageData> {
    (0..20_000u64, 0..20_000u64, 0..20_000u64, 0..20_000u64).prop_map(|(a, c, s, r)| UsageData {
        avatars: a,
        collections_per_avatar: c,
        sessions_this_month: s,
        data_retention_months: r,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn test_feature_gate_matches_catalog_flag(tier in tier(), feature in feature()) {
        let catalog = TierCatalog::reference();
        let plan = catalog.get(tier);
        let result = can_access_feature(&catalog, Some(plan), feature);

        prop_assert_eq!(result.allowed, plan.has_feature(feature));
        if !result.allowed {
            let upgrade = result.upgrade_required.expect("a higher tier has every feature");
            prop_assert!(upgrade.rank() > tier.rank());
            prop_assert!(catalog.get(upgrade).has_feature(feature));
        }
    }

    #[test]
    fn test_limit_denies_iff_usage_reaches_finite_limit(
        tier in tier(),
        limit_type in limit_type(),
        current in 0..20_000u64,
    ) {
        let catalog = TierCatalog::reference();
        let plan = catalog.get(tier);
        let limit = plan.limit(limit_type);
        let result = check_usage_limit(&catalog, Some(plan), limit_type, current);

        let expected_denial = limit < UNLIMITED && current >= limit;
        prop_assert_eq!(result.allowed, !expected_denial);
        prop_assert_eq!(result.limit, Some(limit));
    }

    #[test]
    fn test_same_tier_transition_always_rejected(tier in tier(), usage in usage()) {
        let catalog = TierCatalog::reference();
        let analyzer = TransitionAnalyzer::new(&catalog, DowngradePolicy::Block);
        prop_assert!(analyzer.analyze(tier, tier, &usage, Utc::now()).is_err());
    }

    #[test]
    fn test_feature_changes_are_mirrored(from in tier(), to in tier(), usage in usage()) {
        prop_assume!(from != to);
        let catalog = TierCatalog::reference();
        let analyzer = TransitionAnalyzer::new(&catalog, DowngradePolicy::Block);
        let as_of = Utc.with_ymd_and_hms(2026, 6, 10, 0, 0, 0).unwrap();

        let forward = analyzer.analyze(from, to, &usage, as_of).unwrap();
        let back = analyzer.analyze(to, from, &usage, as_of).unwrap();

        prop_assert_eq!(&forward.feature_changes.gained, &back.feature_changes.lost);
        prop_assert_eq!(&forward.feature_changes.lost, &back.feature_changes.gained);
        prop_assert_eq!(forward.is_upgrade, back.is_downgrade);
        prop_assert_eq!(forward.cost_impact.difference, -back.cost_impact.difference);
    }

    #[test]
    fn test_upgrades_never_lose_features_or_block(from in tier(), to in tier(), usage in usage()) {
        prop_assume!(to.rank() > from.rank());
        let catalog = TierCatalog::reference();
        let analysis = TransitionAnalyzer::new(&catalog, DowngradePolicy::Block)
            .analyze(from, to, &usage, Utc::now())
            .unwrap();

        prop_assert!(analysis.feature_changes.lost.is_empty());
        prop_assert!(analysis.can_transition);
    }

    #[test]
    fn test_over_limit_items_match_gate(from in tier(), to in tier(), usage in usage()) {
        prop_assume!(from != to);
        let catalog = TierCatalog::reference();
        let analysis = TransitionAnalyzer::new(&catalog, DowngradePolicy::AllowOverLimit)
            .analyze(from, to, &usage, Utc::now())
            .unwrap();

        for limit_type in LimitType::ALL {
            let limit = catalog.get(to).limit(limit_type);
            let over = limit < UNLIMITED && usage.get(limit_type) > limit;
            let listed = analysis
                .usage_impact
                .over_limit_items
                .iter()
                .any(|item| item.limit_type == limit_type);
            prop_assert_eq!(over, listed, "{}", limit_type);
        }
        prop_assert!(analysis.can_transition);
    }
}

#[test]
fn test_reference_catalog_is_monotonic() {
    let catalog = TierCatalog::reference();
    for feature in Feature::ALL {
        for tier in SubscriptionTier::all() {
            if catalog.get(tier).has_feature(feature) {
                for higher in tier.higher() {
                    assert!(catalog.get(higher).has_feature(feature), "{feature} on {higher}");
                }
            }
        }
    }
}
