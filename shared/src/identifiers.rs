//! Identifier formats for batches, rolls and shipments

use chrono::NaiveDate;

use crate::models::ProductionType;

/// Prefix of shipment numbers
pub const SHIPMENT_PREFIX: &str = "SHP";

/// Category of document number to allocate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierCategory {
    Batch(ProductionType),
    Shipment,
}

impl IdentifierCategory {
    pub fn prefix(&self) -> &'static str {
        match self {
            IdentifierCategory::Batch(production_type) => production_type.batch_prefix(),
            IdentifierCategory::Shipment => SHIPMENT_PREFIX,
        }
    }
}

/// Format `{PREFIX}-{YYYYMMDD}-{SEQ}` with SEQ zero-padded to 3 digits
pub fn format_document_number(prefix: &str, day: NaiveDate, sequence: i64) -> String {
    format!("{}-{}-{:03}", prefix, day.format("%Y%m%d"), sequence)
}

/// Derive a roll number from its batch number and 1-based ordinal
pub fn format_roll_number(batch_number: &str, ordinal: u32) -> String {
    format!("{}-R{:03}", batch_number, ordinal)
}

/// Split a roll number into its batch number and ordinal
pub fn parse_roll_number(roll_number: &str) -> Option<(&str, u32)> {
    let (batch_number, ordinal) = roll_number.rsplit_once("-R")?;
    if batch_number.is_empty() || ordinal.is_empty() || !ordinal.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    Some((batch_number, ordinal.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_document_number_format() {
        assert_eq!(
            format_document_number("WV", day(), 7),
            "WV-20240315-007"
        );
        assert_eq!(
            format_document_number(SHIPMENT_PREFIX, day(), 1234),
            "SHP-20240315-1234"
        );
    }

    #[test]
    fn test_category_prefixes() {
        assert_eq!(IdentifierCategory::Batch(ProductionType::Weaving).prefix(), "WV");
        assert_eq!(IdentifierCategory::Batch(ProductionType::Coating).prefix(), "CT");
        assert_eq!(IdentifierCategory::Shipment.prefix(), "SHP");
    }

    #[test]
    fn test_roll_numbers_unique_within_batch() {
        let numbers: HashSet<String> = (1..=250)
            .map(|n| format_roll_number("WV-20240315-007", n))
            .collect();
        assert_eq!(numbers.len(), 250);
        assert!(numbers.contains("WV-20240315-007-R001"));
        assert!(numbers.contains("WV-20240315-007-R250"));
    }

    #[test]
    fn test_parse_roll_number() {
        assert_eq!(
            parse_roll_number("CT-20240315-002-R014"),
            Some(("CT-20240315-002", 14))
        );
        assert_eq!(parse_roll_number("CT-20240315-002"), None);
        assert_eq!(parse_roll_number("CT-20240315-002-Rx1"), None);
        assert_eq!(parse_roll_number("-R001"), None);
    }
}
