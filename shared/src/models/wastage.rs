//! Wastage records and the wastage calculation

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cause category of a wastage record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WastageType {
    Production,
    Cutting,
    Quality,
    Handling,
}

impl WastageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WastageType::Production => "production",
            WastageType::Cutting => "cutting",
            WastageType::Quality => "quality",
            WastageType::Handling => "handling",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "production" => Some(WastageType::Production),
            "cutting" => Some(WastageType::Cutting),
            "quality" => Some(WastageType::Quality),
            "handling" => Some(WastageType::Handling),
            _ => None,
        }
    }
}

/// Append-only note of fabric lost in a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WastageRecord {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub wastage_type: WastageType,
    pub quantity: Decimal,
    pub reason: Option<String>,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
}

/// Result of the wastage calculation, both values rounded to 2 places
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WastageSummary {
    pub wastage_quantity: Decimal,
    pub wastage_percentage: Decimal,
}

/// Round half-up (away from zero) to 2 decimal places
pub fn round_quantity(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Calculate wastage from planned and accepted-grade quantity
///
/// `wastage = max(0, planned - accepted)` and
/// `percentage = wastage / planned * 100`, or 0 when nothing was planned.
pub fn calculate_wastage(planned: Decimal, accepted: Decimal) -> WastageSummary {
    let wastage = (planned - accepted).max(Decimal::ZERO);
    let percentage = if planned > Decimal::ZERO {
        wastage / planned * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    WastageSummary {
        wastage_quantity: round_quantity(wastage),
        wastage_percentage: round_quantity(percentage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_wastage_typical_batch() {
        let summary = calculate_wastage(dec("200"), dec("180"));
        assert_eq!(summary.wastage_quantity, dec("20"));
        assert_eq!(summary.wastage_percentage, dec("10.00"));
    }

    #[test]
    fn test_wastage_zero_planned() {
        let summary = calculate_wastage(Decimal::ZERO, dec("5"));
        assert_eq!(summary.wastage_quantity, Decimal::ZERO);
        assert_eq!(summary.wastage_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_wastage_overproduction_is_zero() {
        let summary = calculate_wastage(dec("100"), dec("104.5"));
        assert_eq!(summary.wastage_quantity, Decimal::ZERO);
        assert_eq!(summary.wastage_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_wastage_rounds_half_up() {
        // 1/3 of 3 meters lost out of 9: 11.111...%
        let summary = calculate_wastage(dec("9"), dec("8"));
        assert_eq!(summary.wastage_percentage, dec("11.11"));

        // 0.125 / 1 * 100 = 12.5 exactly, quantity 0.125 rounds to 0.13
        let summary = calculate_wastage(dec("1"), dec("0.875"));
        assert_eq!(summary.wastage_quantity, dec("0.13"));
        assert_eq!(summary.wastage_percentage, dec("12.50"));
    }

    #[test]
    fn test_wastage_type_roundtrip_names() {
        for t in [
            WastageType::Production,
            WastageType::Cutting,
            WastageType::Quality,
            WastageType::Handling,
        ] {
            assert_eq!(WastageType::parse(t.as_str()), Some(t));
        }
        assert_eq!(WastageType::parse("spillage"), None);
    }
}
