//! Tier Gate: subscription tier gating for the family games platform.
//!
//! Organizations subscribe to one of three ordered tiers. Each tier unlocks a
//! set of features and caps how much an organization may create. This crate
//! decides whether an action is allowed, explains what a tier change would do,
//! and applies tier changes against the backend data store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌────────────────────┐     ┌──────────────────┐
//! │  Gate evaluator  │     │ Transition analyzer│     │   Presentation   │
//! │ (features,       │     │ (features, usage,  │     │ (views, meters,  │
//! │  usage limits)   │     │  cost, warnings)   │     │  badges)         │
//! └────────┬─────────┘     └─────────┬──────────┘     └──────────────────┘
//!          │                         │
//!          │                ┌────────▼──────────┐
//!          │                │Transition executor│  re-validates, one write
//!          │                └────────┬──────────┘
//!          │                         │
//! ┌────────▼─────────────────────────▼──────────┐
//! │           Backend trait (external store)    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## 1. Gate a feature
//!
//! ```rust
//! use tier_gate::{Feature, SubscriptionTier, TierCatalog, gate::can_access_feature};
//!
//! let catalog = TierCatalog::reference();
//! let plan = catalog.get(SubscriptionTier::Personal);
//!
//! let result = can_access_feature(&catalog, Some(plan), Feature::DataExport);
//! assert!(!result.allowed);
//! assert_eq!(result.upgrade_required, Some(SubscriptionTier::Professional));
//! ```
//!
//! ## 2. Check a usage limit
//!
//! ```rust
//! use tier_gate::{LimitType, SubscriptionTier, TierCatalog, gate::check_usage_limit};
//!
//! let catalog = TierCatalog::reference();
//! let plan = catalog.get(SubscriptionTier::Personal);
//!
//! let result = check_usage_limit(&catalog, Some(plan), LimitType::Avatars, 5);
//! assert!(!result.allowed);
//! assert_eq!(result.limit, Some(5));
//! ```
//!
//! ## 3. Change tiers
//!
//! ```rust
//! use std::time::Duration;
//!
//! use tier_gate::{
//!     SubscriptionTier, TierCatalog,
//!     backend::InMemoryBackend,
//!     executor::TransitionExecutor,
//!     models::OrganizationId,
//!     transition::DowngradePolicy,
//! };
//!
//! # async fn example() -> tier_gate::Result<()> {
//! let backend = InMemoryBackend::new();
//! let catalog = TierCatalog::reference();
//! let executor = TransitionExecutor::new(
//!     &backend,
//!     &catalog,
//!     DowngradePolicy::Block,
//!     Duration::from_secs(15),
//! );
//!
//! let org = OrganizationId::new("org-1")?;
//! let outcome = executor.execute_transition(&org, SubscriptionTier::Professional).await;
//! println!("{}", outcome.message);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`tier`] and [`catalog`]: the tier ordering and per-tier configuration
//! - [`gate`]: feature and usage checks
//! - [`transition`]: transition analysis; [`proration`]: cost estimates
//! - [`executor`]: applies a tier change
//! - [`presentation`]: view models for gated UI
//! - [`backend`], [`models`], [`usage`]: the data store seam and its records
//! - [`config`], [`audit`], [`error`]: configuration, audit events, errors
//!
//! # Error Handling
//!
//! Expected denials are values, never errors: gates return a
//! [`FeatureGateResult`](gate::FeatureGateResult) and the executor returns a
//! [`TransitionOutcome`](executor::TransitionOutcome). Only backend failures
//! and invalid input produce [`GateError`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod audit;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod gate;
pub mod models;
pub mod presentation;
pub mod proration;
pub mod tier;
pub mod transition;
pub mod usage;

pub use catalog::{Feature, LimitType, TierCatalog, TierConfiguration, UNLIMITED};
pub use error::{GateError, Result};
pub use tier::SubscriptionTier;
pub use transition::{TierTransitionAnalysis, analyze_tier_transition};
pub use usage::UsageData;
