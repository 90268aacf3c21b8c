//! Usage snapshots.
//!
//! A [`UsageData`] is read fresh from the backend for each analysis and
//! dropped afterwards. Nothing in this crate caches usage.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{backend::Backend, catalog::LimitType, error::Result, models::OrganizationId};

/// Current consumption of an organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageData {
    /// Number of avatars.
    pub avatars: u64,
    /// Collections held by the avatar with the most collections.
    pub collections_per_avatar: u64,
    /// Sessions started since the start of the calendar month.
    pub sessions_this_month: u64,
    /// Configured data retention in months.
    pub data_retention_months: u64,
}

impl UsageData {
    /// Returns the usage value tracked against `limit_type`.
    #[must_use]
    pub const fn get(&self, limit_type: LimitType) -> u64 {
        match limit_type {
            LimitType::Avatars => self.avatars,
            LimitType::CollectionsPerAvatar => self.collections_per_avatar,
            LimitType::SessionsPerMonth => self.sessions_this_month,
            LimitType::DataRetentionMonths => self.data_retention_months,
        }
    }

    /// Iterates `(limit type, usage)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (LimitType, u64)> + '_ {
        LimitType::ALL.into_iter().map(|limit_type| (limit_type, self.get(limit_type)))
    }
}

/// Midnight UTC on the first day of the month containing `now`.
#[must_use]
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0).single().unwrap_or(now)
}

/// Reads a fresh usage snapshot for `org`.
///
/// The four counts are requested concurrently. Sessions are counted from
/// [`start_of_month`] of `now`.
///
/// # Errors
///
/// Returns the first backend error encountered.
#[instrument(skip(backend), fields(organization_id = %org))]
pub async fn fetch_usage<B: Backend>(
    backend: &B,
    org: &OrganizationId,
    now: DateTime<Utc>,
) -> Result<UsageData> {
    let month_start = start_of_month(now);
    let (avatars, collections_per_avatar, sessions_this_month, data_retention_months) = tokio::try_join!(
        backend.count_avatars(org),
        backend.max_collections_per_avatar(org),
        backend.count_sessions_since(org, month_start),
        backend.get_data_retention_months(org),
    )?;

    Ok(UsageData { avatars, collections_per_avatar, sessions_this_month, data_retention_months })
}
