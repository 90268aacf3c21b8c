//! Error types for tier gating operations.
//!
//! Expected outcomes of a gate check (a feature that the plan does not
//! include, a usage limit that has been reached) are **not** errors: they are
//! reported through [`FeatureGateResult`](crate::gate::FeatureGateResult).
//! The variants here cover invalid requests, configuration problems, and
//! failures of the external backend.
//!
//! # Error Categories
//!
//! - **Request errors** ([`GateError::InvalidTransition`],
//!   [`GateError::InvalidIdentifier`]): rejected before any backend write
//! - **Lookup errors** ([`GateError::OrganizationNotFound`], [`GateError::PlanNotFound`])
//! - **Backend errors** ([`GateError::Backend`], [`GateError::Timeout`]): unexpected,
//!   logged and surfaced as a generic message
//! - **Configuration errors** ([`GateError::Config`], [`GateError::Catalog`])
//!
//! # Examples
//!
//! ```
//! use tier_gate::error::{GateError, Result};
//!
//! fn require_change(from: &str, to: &str) -> Result<()> {
//!     if from == to {
//!         return Err(GateError::InvalidTransition(format!("already on the {to} tier")));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_change("personal", "personal").is_err());
//! ```

use std::time::Duration;

use thiserror::Error;

/// Result type alias for tier gating operations.
pub type Result<T> = std::result::Result<T, GateError>;

/// Errors that can occur while evaluating or changing an organization's tier.
///
/// # Error Recovery
///
/// - **Transient errors** ([`Backend`](Self::Backend), [`Timeout`](Self::Timeout)): the
///   caller may retry; nothing was written
/// - **Request errors** ([`InvalidTransition`](Self::InvalidTransition)): fix the request
/// - **Configuration errors** ([`Config`](Self::Config), [`Catalog`](Self::Catalog)): fix the
///   configuration file and restart
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum GateError {
    /// The requested tier transition is not allowed.
    ///
    /// Raised for same-tier transitions, before any write is attempted.
    /// Over-limit downgrades are not errors; the analysis reports them.
    #[error("Invalid tier transition: {0}")]
    InvalidTransition(String),

    /// The organization does not exist in the backend.
    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),

    /// No subscription plan record matches the request.
    #[error("Subscription plan not found: {0}")]
    PlanNotFound(String),

    /// An identifier failed validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use tier_gate::error::GateError;
    ///
    /// let err = GateError::InvalidIdentifier("organization id cannot be empty".to_owned());
    /// assert!(err.to_string().contains("Invalid identifier"));
    /// ```
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A backend read or write failed.
    #[error("Backend request failed: {0}")]
    Backend(String),

    /// A backend call did not complete within the configured timeout.
    #[error("Backend request timed out after {0:?}")]
    Timeout(Duration),

    /// Proration inputs were inconsistent.
    #[error("Proration calculation failed: {0}")]
    Proration(String),

    /// Configuration could not be read or parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The tier catalog violates one of its invariants.
    #[error("Invalid tier catalog: {0}")]
    Catalog(String),
}

impl GateError {
    /// Returns true for failures of the external backend.
    ///
    /// These are the only errors that are unexpected at runtime; callers should
    /// log them and show a generic retry message.
    #[must_use]
    pub const fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Timeout(_))
    }
}
