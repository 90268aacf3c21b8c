//! Display-only proration estimates.
//!
//! No payment processor is involved. The estimate credits the unused share
//! of the current tier's price and charges the remaining share of the new
//! tier's price for the calendar month in which the change happens.

use chrono::{DateTime, Datelike, Months, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{
    error::{GateError, Result},
    usage::start_of_month,
};

/// A billing period `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    /// First instant of the period.
    pub start: DateTime<Utc>,
    /// First instant after the period.
    pub end: DateTime<Utc>,
}

impl BillingPeriod {
    /// The calendar month (UTC) containing `at`.
    #[must_use]
    pub fn containing(at: DateTime<Utc>) -> Self {
        let start = start_of_month(at);
        let end = start.checked_add_months(Months::new(1)).unwrap_or(start);
        Self { start, end }
    }

    /// Whole days from `at` to the end of the period, rounded up.
    #[must_use]
    pub fn remaining_days(&self, at: DateTime<Utc>) -> i64 {
        let seconds = (self.end - at).num_seconds().max(0);
        (seconds + 86_399) / 86_400
    }
}

/// Calculates prorated credit for unused time in the current period.
///
/// # Errors
///
/// Returns error if `change_date` falls outside the period or the
/// multiplication overflows.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use rust_decimal::Decimal;
/// use tier_gate::proration::calculate_credit;
///
/// # fn example() -> tier_gate::error::Result<()> {
/// let start = Utc::now();
/// let end = start + Duration::days(30);
/// let credit = calculate_credit(start, end, start + Duration::days(15), Decimal::new(3000, 2))?;
/// assert_eq!(credit, Decimal::new(1500, 2));
/// # Ok(())
/// # }
/// ```
pub fn calculate_credit(
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    change_date: DateTime<Utc>,
    current_amount: Decimal,
) -> Result<Decimal> {
    remaining_share(period_start, period_end, change_date, current_amount, "credit")
}

/// Calculates the prorated charge for a new price starting mid-period.
///
/// # Errors
///
/// Returns error if `change_date` falls outside the period or the
/// multiplication overflows.
pub fn calculate_charge(
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    change_date: DateTime<Utc>,
    new_amount: Decimal,
) -> Result<Decimal> {
    remaining_share(period_start, period_end, change_date, new_amount, "charge")
}

fn remaining_share(
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    change_date: DateTime<Utc>,
    amount: Decimal,
    what: &str,
) -> Result<Decimal> {
    if change_date < period_start || change_date > period_end {
        return Err(GateError::Proration(
            "change_date must be within current billing period".to_owned(),
        ));
    }

    let total = (period_end - period_start).num_seconds();
    if total == 0 {
        return Ok(Decimal::ZERO);
    }
    let remaining = (period_end - change_date).num_seconds();
    let factor = Decimal::from(remaining) / Decimal::from(total);

    amount
        .checked_mul(factor)
        .ok_or_else(|| GateError::Proration(format!("overflow in {what} calculation")))
}

/// Estimated cost adjustment for a mid-period tier change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProrationEstimate {
    /// Credit for the unused part of the current tier, in currency units.
    pub credit: Decimal,
    /// Charge for the remaining part of the new tier.
    pub charge: Decimal,
    /// `charge - credit`; negative means the customer is owed money.
    pub net: Decimal,
    /// Whole days left in the billing period.
    pub remaining_days: i64,
    /// Human-readable summary.
    pub description: String,
}

/// Estimates proration for moving from `current_price` to `new_price` at `as_of`.
///
/// Amounts are rounded to cents, half away from zero.
///
/// # Errors
///
/// Returns error on arithmetic overflow.
pub fn estimate_proration(
    current_price: Decimal,
    new_price: Decimal,
    as_of: DateTime<Utc>,
) -> Result<ProrationEstimate> {
    let period = BillingPeriod::containing(as_of);
    let credit = round_cents(calculate_credit(period.start, period.end, as_of, current_price)?);
    let charge = round_cents(calculate_charge(period.start, period.end, as_of, new_price)?);
    let net = charge - credit;
    let remaining_days = period.remaining_days(as_of);
    let period_label = format!("{} {}", month_name(period.start.month()), period.start.year());

    let description = if net.is_zero() {
        format!("No price change for the rest of {period_label}")
    } else if net.is_sign_positive() {
        format!(
            "Prorated charge of ${net} for the remaining {remaining_days} days of {period_label}"
        )
    } else {
        format!(
            "Prorated credit of ${} for the remaining {remaining_days} days of {period_label}",
            net.abs()
        )
    };

    Ok(ProrationEstimate { credit, charge, net, remaining_days, description })
}

fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

const fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    // ========================================================================
    // Credit / charge
    // ========================================================================

    #[test]
    fn test_calculate_credit_half_period() {
        let start = at(2026, 4, 1);
        let end = start + Duration::days(30);
        let credit =
            calculate_credit(start, end, start + Duration::days(15), Decimal::new(3000, 2)).unwrap();
        assert_eq!(credit, Decimal::new(1500, 2));
    }

    #[test]
    fn test_calculate_credit_bounds() {
        let start = at(2026, 4, 1);
        let end = start + Duration::days(30);
        let amount = Decimal::new(3000, 2);
        assert_eq!(calculate_credit(start, end, start, amount).unwrap(), amount);
        assert_eq!(calculate_credit(start, end, end, amount).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_change_date_outside_period_rejected() {
        let start = at(2026, 4, 1);
        let end = start + Duration::days(30);
        let amount = Decimal::new(3000, 2);
        assert!(matches!(
            calculate_charge(start, end, start - Duration::days(1), amount),
            Err(GateError::Proration(_))
        ));
        assert!(calculate_credit(start, end, end + Duration::days(1), amount).is_err());
    }

    #[test]
    fn test_zero_length_period() {
        let now = at(2026, 4, 1);
        assert_eq!(calculate_charge(now, now, now, Decimal::new(5000, 2)).unwrap(), Decimal::ZERO);
    }

    // ========================================================================
    // Billing period
    // ========================================================================

    #[test]
    fn test_billing_period_containing() {
        let period = BillingPeriod::containing(Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).unwrap());
        assert_eq!(period.start, at(2026, 2, 1));
        assert_eq!(period.end, at(2026, 3, 1));
    }

    #[test]
    fn test_billing_period_december_rolls_over() {
        let period = BillingPeriod::containing(at(2026, 12, 31));
        assert_eq!(period.end, at(2027, 1, 1));
    }

    #[test]
    fn test_remaining_days_rounds_up() {
        let period = BillingPeriod::containing(at(2026, 4, 1));
        assert_eq!(period.remaining_days(at(2026, 4, 1)), 30);
        assert_eq!(period.remaining_days(Utc.with_ymd_and_hms(2026, 4, 30, 23, 0, 0).unwrap()), 1);
    }

    // ========================================================================
    // Estimates
    // ========================================================================

    #[test]
    fn test_estimate_upgrade_mid_month() {
        let estimate =
            estimate_proration(Decimal::new(999, 2), Decimal::new(2999, 2), at(2026, 4, 16))
                .unwrap();
        assert_eq!(estimate.credit, Decimal::new(500, 2));
        assert_eq!(estimate.charge, Decimal::new(1500, 2));
        assert_eq!(estimate.net, Decimal::new(1000, 2));
        assert_eq!(estimate.remaining_days, 15);
        assert_eq!(
            estimate.description,
            "Prorated charge of $10.00 for the remaining 15 days of April 2026"
        );
    }

    #[test]
    fn test_estimate_downgrade_is_credit() {
        let estimate =
            estimate_proration(Decimal::new(2999, 2), Decimal::new(999, 2), at(2026, 4, 16))
                .unwrap();
        assert!(estimate.net.is_sign_negative());
        assert!(estimate.description.starts_with("Prorated credit of $10.00"));
    }

    #[test]
    fn test_estimate_same_price() {
        let price = Decimal::new(999, 2);
        let estimate = estimate_proration(price, price, at(2026, 4, 16)).unwrap();
        assert!(estimate.net.is_zero());
        assert_eq!(estimate.description, "No price change for the rest of April 2026");
    }
}
