//! Rental billing math.
//!
//! Converts a billable duration plus a rate into a charge. Billing rounds
//! **up** to whole days or hours: any day or hour touched is chargeable,
//! which is the convention the rental ledger settles against.

use serde::{Deserialize, Serialize};

use crate::{EngineError, Money};

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateUnit {
    PerDay,
    PerHour,
}

impl RateUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerDay => "per_day",
            Self::PerHour => "per_hour",
        }
    }

    pub const fn seconds_per_unit(self) -> i64 {
        match self {
            Self::PerDay => SECONDS_PER_DAY,
            Self::PerHour => SECONDS_PER_HOUR,
        }
    }
}

impl TryFrom<&str> for RateUnit {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "per_day" => Ok(Self::PerDay),
            "per_hour" => Ok(Self::PerHour),
            other => Err(EngineError::Validation(format!(
                "invalid rate unit: {other}"
            ))),
        }
    }
}

/// Result of a charge computation, returned to callers for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub total: Money,
    pub billable_seconds: i64,
    /// Whole days or hours billed, after rounding up.
    pub billed_units: i64,
    pub unit: RateUnit,
    /// Set when a negative duration was clamped to zero. A warning for the
    /// caller, never an error: a return must not be blocked over a clock
    /// anomaly.
    pub clock_skew: bool,
}

/// Computes the charge for `billable_seconds` at `rate` per `unit`.
///
/// Partial units round up (`ceil`). Zero or negative durations clamp to a
/// zero charge with `clock_skew` set.
pub fn compute_charge(
    billable_seconds: i64,
    rate: Money,
    unit: RateUnit,
) -> Result<Charge, EngineError> {
    if rate.is_negative() {
        return Err(EngineError::Validation(
            "rate must not be negative".to_string(),
        ));
    }

    let clock_skew = billable_seconds < 0;
    if clock_skew {
        tracing::warn!(billable_seconds, "negative billable duration clamped to zero");
    }
    let seconds = billable_seconds.max(0);

    let per_unit = unit.seconds_per_unit();
    // Ceiling division; `seconds` is non-negative here.
    let billed_units = (seconds + per_unit - 1) / per_unit;
    let total = rate
        .checked_mul(billed_units)
        .ok_or_else(|| EngineError::Validation("charge overflows".to_string()))?;

    Ok(Charge {
        total,
        billable_seconds: seconds,
        billed_units,
        unit,
        clock_skew,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_day_rounds_up() {
        // 46 active hours at ₹500/day bills 2 days.
        let charge = compute_charge(46 * 3_600, Money::new(500_00), RateUnit::PerDay).unwrap();

        assert_eq!(charge.billed_units, 2);
        assert_eq!(charge.total, Money::new(1_000_00));
        assert!(!charge.clock_skew);
    }

    #[test]
    fn partial_hour_rounds_up() {
        // 90 minutes at ₹50/hour bills 2 hours.
        let charge = compute_charge(90 * 60, Money::new(50_00), RateUnit::PerHour).unwrap();

        assert_eq!(charge.billed_units, 2);
        assert_eq!(charge.total, Money::new(100_00));
    }

    #[test]
    fn exact_boundary_is_not_rounded() {
        let charge = compute_charge(2 * 86_400, Money::new(500_00), RateUnit::PerDay).unwrap();
        assert_eq!(charge.billed_units, 2);
    }

    #[test]
    fn negative_duration_clamps_with_warning_flag() {
        let charge = compute_charge(-30, Money::new(500_00), RateUnit::PerDay).unwrap();

        assert!(charge.clock_skew);
        assert_eq!(charge.billable_seconds, 0);
        assert_eq!(charge.billed_units, 0);
        assert_eq!(charge.total, Money::ZERO);
    }

    #[test]
    fn zero_duration_bills_nothing() {
        let charge = compute_charge(0, Money::new(50_00), RateUnit::PerHour).unwrap();
        assert_eq!(charge.total, Money::ZERO);
        assert!(!charge.clock_skew);
    }

    #[test]
    fn charge_is_monotonic_in_duration() {
        let rate = Money::new(75_00);
        let mut last = Money::ZERO;
        for hours in 0..96 {
            let charge = compute_charge(hours * 3_600 + 17, rate, RateUnit::PerHour).unwrap();
            assert!(charge.total >= last);
            last = charge.total;
        }
    }

    #[test]
    fn negative_rate_is_rejected() {
        let err = compute_charge(100, Money::new(-1), RateUnit::PerHour).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
