//! Backend data store boundary.
//!
//! Persistence, authentication, and row-level access control live in an
//! external managed backend. [`Backend`] is the seam: the gates and the
//! executor only see this trait. [`InMemoryBackend`] implements it for tests
//! and for the report tool.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::{GateError, Result},
    models::{AvatarId, Organization, OrganizationId, PlanId, SubscriptionPlanRecord},
};

/// Operations this crate needs from the external backend.
///
/// Every method is one request to the backend. Implementations must make
/// [`update_organization_plan`](Self::update_organization_plan) a single
/// atomic write; callers never attempt compensation.
pub trait Backend: Send + Sync {
    /// Reads an organization row.
    fn get_organization(
        &self,
        id: &OrganizationId,
    ) -> impl Future<Output = Result<Organization>> + Send;

    /// Reads all subscription plan rows, active or not.
    fn list_plans(&self) -> impl Future<Output = Result<Vec<SubscriptionPlanRecord>>> + Send;

    /// Reads one subscription plan row.
    fn get_plan(&self, id: &PlanId) -> impl Future<Output = Result<SubscriptionPlanRecord>> + Send;

    /// Counts the organization's avatars.
    fn count_avatars(&self, org: &OrganizationId) -> impl Future<Output = Result<u64>> + Send;

    /// Counts the collections owned by one avatar.
    fn count_collections_for_avatar(
        &self,
        org: &OrganizationId,
        avatar: &AvatarId,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Largest collection count over the organization's avatars.
    fn max_collections_per_avatar(
        &self,
        org: &OrganizationId,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Counts sessions with `created_at >= since`.
    fn count_sessions_since(
        &self,
        org: &OrganizationId,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Reads the organization's configured data retention in months.
    fn get_data_retention_months(
        &self,
        org: &OrganizationId,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Points the organization at a new plan record.
    fn update_organization_plan(
        &self,
        org: &OrganizationId,
        plan: &PlanId,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Default)]
struct State {
    organizations: BTreeMap<OrganizationId, Organization>,
    plans: BTreeMap<PlanId, SubscriptionPlanRecord>,
    collections: BTreeMap<OrganizationId, BTreeMap<AvatarId, u64>>,
    /// Session counts keyed by start time.
    sessions: BTreeMap<OrganizationId, BTreeMap<DateTime<Utc>, u64>>,
    retention: BTreeMap<OrganizationId, u64>,
}

/// Seed data for [`InMemoryBackend::from_seed`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    /// Plan rows.
    #[serde(default)]
    pub plans: Vec<SubscriptionPlanRecord>,
    /// Organizations and their current usage.
    #[serde(default)]
    pub organizations: Vec<SeedOrganization>,
}

/// One organization in a [`Seed`].
#[derive(Debug, Clone, Deserialize)]
pub struct SeedOrganization {
    /// The organization row.
    #[serde(flatten)]
    pub organization: Organization,
    /// Avatars and their collection counts.
    #[serde(default)]
    pub avatars: Vec<SeedAvatar>,
    /// Sessions started this month.
    #[serde(default)]
    pub sessions_this_month: u64,
    /// Configured data retention.
    #[serde(default)]
    pub data_retention_months: u64,
}

/// One avatar in a [`SeedOrganization`].
#[derive(Debug, Clone, Deserialize)]
pub struct SeedAvatar {
    /// Avatar identifier.
    pub id: AvatarId,
    /// Number of collections the avatar owns.
    #[serde(default)]
    pub collections: u64,
}

/// In-process [`Backend`] over a `tokio` `RwLock`.
///
/// Supports failure and latency injection so callers can exercise the error
/// and timeout paths.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: RwLock<State>,
    plan_writes: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    latency_ms: AtomicU64,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a backend from seed data. Seeded sessions are stamped `now`.
    #[must_use]
    pub fn from_seed(seed: Seed, now: DateTime<Utc>) -> Self {
        let mut state = State::default();
        for plan in seed.plans {
            state.plans.insert(plan.id.clone(), plan);
        }
        for entry in seed.organizations {
            let id = entry.organization.id.clone();
            let avatars = entry.avatars.into_iter().map(|a| (a.id, a.collections)).collect();
            state.collections.insert(id.clone(), avatars);
            state.sessions.insert(id.clone(), BTreeMap::from([(now, entry.sessions_this_month)]));
            state.retention.insert(id.clone(), entry.data_retention_months);
            state.organizations.insert(id, entry.organization);
        }
        Self { state: RwLock::new(state), ..Self::default() }
    }

    /// Inserts or replaces a plan row.
    pub async fn insert_plan(&self, plan: SubscriptionPlanRecord) {
        self.state.write().await.plans.insert(plan.id.clone(), plan);
    }

    /// Inserts or replaces an organization row.
    pub async fn insert_organization(&self, organization: Organization) {
        self.state.write().await.organizations.insert(organization.id.clone(), organization);
    }

    /// Adds an avatar with no collections.
    pub async fn add_avatar(&self, org: &OrganizationId, avatar: AvatarId) {
        self.state.write().await.collections.entry(org.clone()).or_default().insert(avatar, 0);
    }

    /// Adds one collection to an avatar, creating the avatar if needed.
    pub async fn add_collection(&self, org: &OrganizationId, avatar: &AvatarId) {
        let mut state = self.state.write().await;
        *state.collections.entry(org.clone()).or_default().entry(avatar.clone()).or_default() += 1;
    }

    /// Records a session started at `at`.
    pub async fn record_session(&self, org: &OrganizationId, at: DateTime<Utc>) {
        let mut state = self.state.write().await;
        let count = state.sessions.entry(org.clone()).or_default().entry(at).or_default();
        *count = count.saturating_add(1);
    }

    /// Sets the organization's data retention.
    pub async fn set_data_retention(&self, org: &OrganizationId, months: u64) {
        self.state.write().await.retention.insert(org.clone(), months);
    }

    /// Number of successful plan writes so far.
    #[must_use]
    pub fn plan_writes(&self) -> u64 {
        self.plan_writes.load(Ordering::Relaxed)
    }

    /// Makes every read fail with [`GateError::Backend`].
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Makes every write fail with [`GateError::Backend`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::Relaxed);
    }

    async fn before_read(&self) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(GateError::Backend("simulated read failure".to_owned()));
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        let millis = self.latency_ms.load(Ordering::Relaxed);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}

impl Backend for InMemoryBackend {
    async fn get_organization(&self, id: &OrganizationId) -> Result<Organization> {
        self.before_read().await?;
        self.state
            .read()
            .await
            .organizations
            .get(id)
            .cloned()
            .ok_or_else(|| GateError::OrganizationNotFound(id.to_string()))
    }

    async fn list_plans(&self) -> Result<Vec<SubscriptionPlanRecord>> {
        self.before_read().await?;
        Ok(self.state.read().await.plans.values().cloned().collect())
    }

    async fn get_plan(&self, id: &PlanId) -> Result<SubscriptionPlanRecord> {
        self.before_read().await?;
        self.state
            .read()
            .await
            .plans
            .get(id)
            .cloned()
            .ok_or_else(|| GateError::PlanNotFound(id.to_string()))
    }

    async fn count_avatars(&self, org: &OrganizationId) -> Result<u64> {
        self.before_read().await?;
        let state = self.state.read().await;
        Ok(state.collections.get(org).map_or(0, |avatars| avatars.len() as u64))
    }

    async fn count_collections_for_avatar(
        &self,
        org: &OrganizationId,
        avatar: &AvatarId,
    ) -> Result<u64> {
        self.before_read().await?;
        let state = self.state.read().await;
        Ok(state.collections.get(org).and_then(|avatars| avatars.get(avatar)).copied().unwrap_or(0))
    }

    async fn max_collections_per_avatar(&self, org: &OrganizationId) -> Result<u64> {
        self.before_read().await?;
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(org)
            .and_then(|avatars| avatars.values().copied().max())
            .unwrap_or(0))
    }

    async fn count_sessions_since(
        &self,
        org: &OrganizationId,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        self.before_read().await?;
        let state = self.state.read().await;
        Ok(state
            .sessions
            .get(org)
            .map_or(0, |sessions| {
                sessions.range(since..).fold(0_u64, |total, (_, n)| total.saturating_add(*n))
            }))
    }

    async fn get_data_retention_months(&self, org: &OrganizationId) -> Result<u64> {
        self.before_read().await?;
        Ok(self.state.read().await.retention.get(org).copied().unwrap_or(0))
    }

    async fn update_organization_plan(&self, org: &OrganizationId, plan: &PlanId) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(GateError::Backend("simulated write failure".to_owned()));
        }

        let mut state = self.state.write().await;
        if !state.plans.contains_key(plan) {
            return Err(GateError::PlanNotFound(plan.to_string()));
        }
        let organization = state
            .organizations
            .get_mut(org)
            .ok_or_else(|| GateError::OrganizationNotFound(org.to_string()))?;
        organization.subscription_plan_id = plan.clone();
        self.plan_writes.fetch_add(1, Ordering::Relaxed);
        debug!(organization_id = %org, plan_id = %plan, "organization plan updated");
        Ok(())
    }
}
