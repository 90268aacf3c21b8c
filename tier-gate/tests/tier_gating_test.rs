//! Integration tests for tier gating.
//!
//! Drives the public API end to end against a seeded in-memory backend.

use std::time::Duration;

use chrono::Utc;
use tier_gate::{
    Feature, LimitType, SubscriptionTier, TierCatalog,
    backend::{Backend, InMemoryBackend, Seed},
    config::GateConfig,
    executor::TransitionExecutor,
    gate::{UsageGate, can_access_feature, check_usage_limit},
    models::{AvatarId, OrganizationId},
    presentation::{GateView, UsageMeter},
    transition::{DowngradePolicy, TransitionAnalyzer},
    usage::fetch_usage,
};

const SEED: &str = r#"{
    "plans": [
        {"id": "personal", "tier": "personal", "base_price": "9.99", "avatar_limit": 5,
         "features_included": {"basic_games": true, "progress_tracking": true, "custom_collections": true}},
        {"id": "professional", "tier": "professional", "base_price": "29.99", "avatar_limit": 25,
         "features_included": {"basic_games": true, "progress_tracking": true, "custom_collections": true,
                               "analytics": true, "data_export": true, "priority_support": true}},
        {"id": "enterprise", "tier": "enterprise", "base_price": "99.99", "avatar_limit": 10000},
        {"id": "enterprise-2019", "tier": "enterprise", "base_price": "49.99", "avatar_limit": 10000,
         "active": false}
    ],
    "organizations": [
        {"id": "smiths", "name": "The Smiths", "subscription_plan_id": "personal",
         "avatars": [{"id": "a1"}, {"id": "a2"}, {"id": "a3"}, {"id": "a4"}, {"id": "a5"}]},
        {"id": "acme-school", "name": "Acme School", "subscription_plan_id": "enterprise",
         "avatars": [{"id": "s1"}, {"id": "s2"}, {"id": "s3"}, {"id": "s4"},
                     {"id": "s5"}, {"id": "s6"}, {"id": "s7"}, {"id": "s8", "collections": 4}],
         "sessions_this_month": 120, "data_retention_months": 6}
    ]
}"#;

fn seeded() -> InMemoryBackend {
    let seed: Seed = serde_json::from_str(SEED).expect("seed should parse");
    InMemoryBackend::from_seed(seed, Utc::now())
}

fn org(id: &str) -> OrganizationId {
    OrganizationId::new(id).expect("valid id")
}

const TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::test]
async fn test_personal_tier_at_avatar_limit_is_denied() {
    let backend = seeded();
    let catalog = TierCatalog::reference();
    let gate = UsageGate::new(&backend, &catalog, TIMEOUT);

    let result = gate.can_create_avatar(&org("smiths")).await.expect("backend is healthy");

    assert!(!result.allowed);
    assert_eq!(result.limit, Some(5));
    assert_eq!(result.upgrade_required, Some(SubscriptionTier::Professional));
    assert!(matches!(GateView::from_result(&result), GateView::Upsell { .. }));
}

#[test]
fn test_upgrade_to_professional_gains_analytics() {
    let catalog = TierCatalog::reference();
    let analysis = tier_gate::analyze_tier_transition(
        &catalog,
        SubscriptionTier::Personal,
        SubscriptionTier::Professional,
        &tier_gate::UsageData::default(),
    )
    .expect("different tiers");

    assert!(analysis.feature_changes.gained.contains(&Feature::Analytics));
    assert!(analysis.can_transition);
}

#[tokio::test]
async fn test_enterprise_to_personal_with_eight_avatars_is_blocked() {
    let backend = seeded();
    let catalog = TierCatalog::reference();
    let usage = fetch_usage(&backend, &org("acme-school"), Utc::now()).await.expect("usage");
    assert_eq!(usage.avatars, 8);

    let analysis = TransitionAnalyzer::new(&catalog, DowngradePolicy::Block)
        .analyze(SubscriptionTier::Enterprise, SubscriptionTier::Personal, &usage, Utc::now())
        .expect("different tiers");

    let avatars = analysis
        .usage_impact
        .over_limit_items
        .iter()
        .find(|item| item.limit_type == LimitType::Avatars)
        .expect("avatars are over the personal limit");
    assert_eq!((avatars.current, avatars.new_limit), (8, 5));
    assert!(!analysis.can_transition);
    assert!(analysis.feature_changes.lost.contains(&Feature::ApiAccess));
}

#[tokio::test]
async fn test_same_tier_transition_never_writes() {
    let backend = seeded();
    let catalog = TierCatalog::reference();
    let executor = TransitionExecutor::new(&backend, &catalog, DowngradePolicy::Block, TIMEOUT);

    let outcome = executor.execute_transition(&org("smiths"), SubscriptionTier::Personal).await;

    assert!(!outcome.success);
    assert_eq!(backend.plan_writes(), 0);
}

#[tokio::test]
async fn test_upgrade_then_gate_reflects_new_tier() {
    let backend = seeded();
    let catalog = TierCatalog::reference();
    let smiths = org("smiths");
    let gate = UsageGate::new(&backend, &catalog, TIMEOUT);

    let before = gate.plan_for(&smiths).await.expect("plan");
    assert!(!can_access_feature(&catalog, Some(&before), Feature::Analytics).allowed);

    let executor = TransitionExecutor::new(&backend, &catalog, DowngradePolicy::Block, TIMEOUT);
    let outcome = executor.execute_transition(&smiths, SubscriptionTier::Professional).await;
    assert!(outcome.success, "{}", outcome.message);

    let after = gate.plan_for(&smiths).await.expect("plan");
    assert!(can_access_feature(&catalog, Some(&after), Feature::Analytics).allowed);
    assert!(gate.can_create_avatar(&smiths).await.expect("gate").allowed);
}

#[tokio::test]
async fn test_executor_skips_inactive_cheaper_plan() {
    let backend = seeded();
    let catalog = TierCatalog::reference();
    let smiths = org("smiths");
    let executor = TransitionExecutor::new(&backend, &catalog, DowngradePolicy::Block, TIMEOUT);

    assert!(executor.execute_transition(&smiths, SubscriptionTier::Enterprise).await.success);

    let organization = backend.get_organization(&smiths).await.expect("org");
    assert_eq!(organization.subscription_plan_id.as_str(), "enterprise");
}

#[tokio::test]
async fn test_configured_policy_allows_over_limit_downgrade() {
    let config = GateConfig::from_toml(
        r#"
        [executor]
        backend_timeout_secs = 10
        downgrade_policy = "allow_over_limit"
        "#,
    )
    .expect("valid config");
    let catalog = config.catalog().expect("reference catalog");
    let backend = seeded();
    let school = org("acme-school");
    let executor = TransitionExecutor::new(
        &backend,
        &catalog,
        config.executor.downgrade_policy,
        config.executor.backend_timeout(),
    );

    let outcome = executor.execute_transition(&school, SubscriptionTier::Personal).await;
    assert!(outcome.success, "{}", outcome.message);

    let gate = UsageGate::new(&backend, &catalog, config.executor.backend_timeout());
    let result = gate.can_create_avatar(&school).await.expect("gate");
    assert!(!result.allowed, "over-limit data stays, new avatars are blocked");
}

#[tokio::test]
async fn test_collection_gate_and_meter_agree() {
    let backend = seeded();
    let catalog = TierCatalog::reference();
    let school = org("acme-school");
    let gate = UsageGate::new(&backend, &catalog, TIMEOUT);

    let busy = AvatarId::new("s8").expect("id");
    assert!(gate.can_create_collection(&school, &busy).await.expect("gate").allowed);

    let personal = catalog.get(SubscriptionTier::Personal);
    let limit = check_usage_limit(&catalog, Some(personal), LimitType::CollectionsPerAvatar, 4);
    let meter = UsageMeter::for_limit(
        &catalog,
        SubscriptionTier::Personal,
        LimitType::CollectionsPerAvatar,
        4,
    );
    assert!(limit.allowed);
    assert!(!meter.at_limit);
    assert_eq!(meter.percent, 40);
}
