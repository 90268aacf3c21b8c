//! Subscription tiers and their capability ordering.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// A named subscription level.
///
/// Tiers are ordered by capability through [`rank`](Self::rank), not by
/// price. The derived `Ord` follows declaration order, which matches rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// Single family plan.
    Personal,
    /// Educators and small groups.
    Professional,
    /// Schools and organizations.
    Enterprise,
}

impl SubscriptionTier {
    /// Returns all tiers in ascending rank order.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Personal, Self::Professional, Self::Enterprise]
    }

    /// Capability rank; higher means more capable.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Personal => 1,
            Self::Professional => 2,
            Self::Enterprise => 3,
        }
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        }
    }

    /// Returns the next more capable tier, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use tier_gate::SubscriptionTier;
    ///
    /// assert_eq!(SubscriptionTier::Personal.next(), Some(SubscriptionTier::Professional));
    /// assert_eq!(SubscriptionTier::Enterprise.next(), None);
    /// ```
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Personal => Some(Self::Professional),
            Self::Professional => Some(Self::Enterprise),
            Self::Enterprise => None,
        }
    }

    /// Returns true if this tier ranks at or above `other`.
    #[must_use]
    pub const fn is_at_least(self, other: Self) -> bool {
        self.rank() >= other.rank()
    }

    /// Tiers ranked strictly above this one, in ascending order.
    pub fn higher(self) -> impl Iterator<Item = Self> {
        Self::all().into_iter().filter(move |tier| !self.is_at_least(*tier))
    }
}

impl FromStr for SubscriptionTier {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "personal" => Ok(Self::Personal),
            "professional" => Ok(Self::Professional),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(GateError::Config(format!("unknown subscription tier '{other}'"))),
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
