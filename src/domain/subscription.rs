//! Subscription periods
//!
//! Duration units, periods and the pure half of the duration resolver:
//! picking the effective (base, bonus) pair and turning it into an end date.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::catalog::Bundle;
use super::DomainError;

/// Calendar unit for a period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Days,
    Months,
    Years,
}

impl DurationUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Days => "days",
            DurationUnit::Months => "months",
            DurationUnit::Years => "years",
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DurationUnit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "days" => Ok(DurationUnit::Days),
            "months" => Ok(DurationUnit::Months),
            "years" => Ok(DurationUnit::Years),
            other => Err(DomainError::InvalidDuration(format!(
                "unknown unit '{}'",
                other
            ))),
        }
    }
}

/// A concrete length of time in calendar units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub value: u32,
    pub unit: DurationUnit,
}

impl Period {
    pub fn new(value: u32, unit: DurationUnit) -> Self {
        Self { value, unit }
    }

    pub fn days(value: u32) -> Self {
        Self::new(value, DurationUnit::Days)
    }

    pub fn months(value: u32) -> Self {
        Self::new(value, DurationUnit::Months)
    }

    pub fn years(value: u32) -> Self {
        Self::new(value, DurationUnit::Years)
    }

    /// Add this period to `start`.
    ///
    /// Month and year arithmetic is calendar aware and clamps to the last
    /// valid day (Jan 31 + 1 month = Feb 28/29).
    pub fn add_to(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>, DomainError> {
        let shifted = match self.unit {
            DurationUnit::Days => start.checked_add_signed(Duration::days(i64::from(self.value))),
            DurationUnit::Months => start.checked_add_months(Months::new(self.value)),
            DurationUnit::Years => self
                .value
                .checked_mul(12)
                .and_then(|months| start.checked_add_months(Months::new(months))),
        };

        shifted.ok_or_else(|| {
            DomainError::InvalidDuration(format!(
                "{} {} overflows the calendar",
                self.value, self.unit
            ))
        })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// A period whose value may be left unset (bonus periods, custom overrides)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSpec {
    #[serde(default)]
    pub value: Option<u32>,
    pub unit: DurationUnit,
}

impl PeriodSpec {
    pub fn new(value: Option<u32>, unit: DurationUnit) -> Self {
        Self { value, unit }
    }

    /// The concrete period, if a value is set
    pub fn period(&self) -> Option<Period> {
        self.value.map(|value| Period::new(value, self.unit))
    }
}

impl From<Period> for PeriodSpec {
    fn from(period: Period) -> Self {
        Self::new(Some(period.value), period.unit)
    }
}

/// Admin override of a vendor's subscription length
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDuration {
    #[serde(default)]
    pub value: Option<u32>,
    pub unit: DurationUnit,
    #[serde(default)]
    pub bonus_period: Option<PeriodSpec>,
}

impl CustomDuration {
    pub fn new(value: u32, unit: DurationUnit) -> Self {
        Self {
            value: Some(value),
            unit,
            bonus_period: None,
        }
    }

    pub fn with_bonus(mut self, bonus: Period) -> Self {
        self.bonus_period = Some(bonus.into());
        self
    }

    /// Whether the override carries a base value
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

/// Effective (base, bonus) pair for a vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedDuration {
    pub base: Period,
    pub bonus: Option<Period>,
}

impl ResolvedDuration {
    /// End date for a subscription starting at `start`
    pub fn end_date_from(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>, DomainError> {
        compute_end_date(start, &self.base, self.bonus.as_ref())
    }
}

/// Pick the effective duration.
///
/// A custom override with a value wins over the bundle; its bonus applies
/// only when the bonus value is set. Without an override the bundle's
/// duration and bonus are used. `None` when neither source exists.
pub fn resolve_duration(
    custom: Option<&CustomDuration>,
    bundle: Option<&Bundle>,
) -> Option<ResolvedDuration> {
    if let Some(custom) = custom {
        if let Some(value) = custom.value {
            return Some(ResolvedDuration {
                base: Period::new(value, custom.unit),
                bonus: custom.bonus_period.as_ref().and_then(PeriodSpec::period),
            });
        }
    }

    bundle.map(|bundle| ResolvedDuration {
        base: bundle.duration,
        bonus: bundle.bonus_period.as_ref().and_then(PeriodSpec::period),
    })
}

/// Add `base` to `start`, then `bonus` on top when it has a positive value.
pub fn compute_end_date(
    start: DateTime<Utc>,
    base: &Period,
    bonus: Option<&Period>,
) -> Result<DateTime<Utc>, DomainError> {
    let intermediate = base.add_to(start)?;

    match bonus {
        Some(bonus) if bonus.value > 0 => bonus.add_to(intermediate),
        _ => Ok(intermediate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn bundle(duration: Period, bonus: Option<PeriodSpec>) -> Bundle {
        Bundle {
            id: Uuid::new_v4(),
            name: "Gold".to_string(),
            description: None,
            price: Decimal::new(99900, 2),
            duration,
            bonus_period: bonus,
            features: vec![],
            subscribers_count: 0,
            max_vendors: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_month_plus_bonus_days() {
        let end = compute_end_date(
            date(2024, 1, 15),
            &Period::months(1),
            Some(&Period::days(10)),
        )
        .unwrap();

        assert_eq!(end, date(2024, 2, 25));
    }

    #[test]
    fn test_zero_bonus_is_ignored() {
        let end =
            compute_end_date(date(2024, 1, 15), &Period::days(30), Some(&Period::days(0))).unwrap();
        assert_eq!(end, date(2024, 2, 14));
    }

    #[test]
    fn test_years_and_month_end_clamping() {
        assert_eq!(Period::years(1).add_to(date(2024, 2, 29)).unwrap(), date(2025, 2, 28));
        assert_eq!(Period::months(1).add_to(date(2024, 1, 31)).unwrap(), date(2024, 2, 29));
    }

    #[test]
    fn test_custom_duration_takes_precedence() {
        let custom = CustomDuration::new(3, DurationUnit::Months);
        let bundle = bundle(Period::years(1), None);

        let resolved = resolve_duration(Some(&custom), Some(&bundle)).unwrap();
        assert_eq!(resolved.base, Period::months(3));
        assert_eq!(resolved.bonus, None);
    }

    #[test]
    fn test_custom_without_value_falls_back_to_bundle() {
        let custom = CustomDuration {
            value: None,
            unit: DurationUnit::Days,
            bonus_period: Some(PeriodSpec::new(Some(5), DurationUnit::Days)),
        };
        let bundle = bundle(
            Period::years(1),
            Some(PeriodSpec::new(Some(2), DurationUnit::Months)),
        );

        let resolved = resolve_duration(Some(&custom), Some(&bundle)).unwrap();
        assert_eq!(resolved.base, Period::years(1));
        assert_eq!(resolved.bonus, Some(Period::months(2)));
    }

    #[test]
    fn test_custom_bonus_without_value_is_dropped() {
        let custom = CustomDuration {
            value: Some(6),
            unit: DurationUnit::Months,
            bonus_period: Some(PeriodSpec::new(None, DurationUnit::Days)),
        };

        let resolved = resolve_duration(Some(&custom), None).unwrap();
        assert_eq!(resolved.bonus, None);
    }

    #[test]
    fn test_nothing_to_resolve() {
        assert!(resolve_duration(None, None).is_none());
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("months".parse::<DurationUnit>().unwrap(), DurationUnit::Months);
        assert!("weeks".parse::<DurationUnit>().is_err());
    }
}
