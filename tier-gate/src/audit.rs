//! Audit logging for subscription changes.
//!
//! Every tier transition request produces a `transition_requested` event and
//! exactly one terminal event (succeeded, rejected, or failed) sharing the same
//! request id, so one change can be followed across log lines.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SubscriptionTier;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A transition was requested.
    TransitionRequested,
    /// The plan reference was updated.
    TransitionSucceeded,
    /// The transition was refused before any write (same tier, over limit,
    /// no plan available).
    TransitionRejected,
    /// A backend error or timeout aborted the transition.
    TransitionFailed,
}

/// Contextual fields of an [`AuditEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDetails {
    /// Tier before the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_tier: Option<SubscriptionTier>,
    /// Requested tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_tier: Option<SubscriptionTier>,
    /// Plan record written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    /// Why the transition was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Internal error text. Never shown to the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time spent in the executor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Audit log entry.
///
/// # Examples
///
/// ```
/// use tier_gate::{
///     SubscriptionTier,
///     audit::{AuditEvent, AuditEventType, audit_log},
/// };
/// use uuid::Uuid;
///
/// let event = AuditEvent::new(AuditEventType::TransitionRequested, "org-1", Uuid::new_v4())
///     .with_tiers(SubscriptionTier::Personal, SubscriptionTier::Professional);
///
/// audit_log(&event);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred.
    pub timestamp: SystemTime,
    /// What happened.
    pub event_type: AuditEventType,
    /// Organization the change applies to.
    pub organization_id: String,
    /// Correlation id shared by all events of one request.
    pub request_id: Uuid,
    /// Event details.
    pub details: AuditDetails,
}

impl AuditEvent {
    /// Creates a new audit event with empty details.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn new(
        event_type: AuditEventType,
        organization_id: impl Into<String>,
        request_id: Uuid,
    ) -> Self {
        Self {
            timestamp: SystemTime::now(),
            event_type,
            organization_id: organization_id.into(),
            request_id,
            details: AuditDetails::default(),
        }
    }

    /// Records the source tier and the requested tier.
    #[must_use]
    pub const fn with_tiers(mut self, from: SubscriptionTier, to: SubscriptionTier) -> Self {
        self.details.from_tier = Some(from);
        self.details.to_tier = Some(to);
        self
    }

    /// Records only the requested tier, for when the current one is unknown.
    #[must_use]
    pub const fn with_target(mut self, to: SubscriptionTier) -> Self {
        self.details.to_tier = Some(to);
        self
    }

    /// Records the plan record that was written.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_plan_id(mut self, plan_id: impl Into<String>) -> Self {
        self.details.plan_id = Some(plan_id.into());
        self
    }

    /// Records a rejection reason.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.details.reason = Some(reason.into());
        self
    }

    /// Records an internal error.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.details.error = Some(error.into());
        self
    }

    /// Records how long the operation took.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "duration in ms fits u64 for practical values"
    )]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.details.duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

/// Logs the event to tracing with target `"audit"`.
///
/// Subscribers can route this target to a separate sink with an
/// `EnvFilter` directive such as `audit=info`.
pub fn audit_log(event: &AuditEvent) {
    tracing::info!(
        target: "audit",
        timestamp = ?event.timestamp,
        event_type = ?event.event_type,
        organization_id = %event.organization_id,
        request_id = %event.request_id,
        details = ?event.details,
        "AUDIT"
    );
}

/// Creates and logs an audit event in one expression.
///
/// # Examples
///
/// ```
/// use tier_gate::{SubscriptionTier, audit, audit::AuditEventType};
/// use uuid::Uuid;
///
/// audit!(AuditEventType::TransitionRequested, "org-1", Uuid::new_v4());
///
/// audit!(
///     AuditEventType::TransitionRejected,
///     "org-1",
///     Uuid::new_v4(),
///     with_target(SubscriptionTier::Personal),
///     with_reason("already on the personal tier"),
/// );
/// ```
#[macro_export]
macro_rules! audit {
    ($event_type:expr, $org:expr, $request_id:expr) => {
        $crate::audit::audit_log(
            &$crate::audit::AuditEvent::new($event_type, $org, $request_id)
        )
    };
    ($event_type:expr, $org:expr, $request_id:expr, $($method:ident($($arg:expr),*)),+ $(,)?) => {
        $crate::audit::audit_log(
            &$crate::audit::AuditEvent::new($event_type, $org, $request_id)
                $(.$method($($arg),*))+
        )
    };
}
