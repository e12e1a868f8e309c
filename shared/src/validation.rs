//! Validation utilities for the Mill Roll Tracking Platform
//!
//! Every check here runs before a store mutation; services turn the returned
//! message into a field-level validation error.

use rust_decimal::Decimal;

use crate::models::FabricRoll;
use crate::types::QUANTITY_SCALE;

/// More decimal places than the store keeps; `50.500` is fine, `50.005` is not
pub fn exceeds_quantity_scale(quantity: Decimal) -> bool {
    quantity.normalize().scale() > QUANTITY_SCALE
}

/// Validate a planned, produced or allocated quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    if exceeds_quantity_scale(quantity) {
        return Err("Quantity allows at most 2 decimal places");
    }
    Ok(())
}

/// Validate an accepted-grade quantity (zero is a legitimate total loss)
pub fn validate_accepted_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Accepted quantity cannot be negative");
    }
    if exceeds_quantity_scale(quantity) {
        return Err("Quantity allows at most 2 decimal places");
    }
    Ok(())
}

/// Validate a standard roll length
pub fn validate_roll_length(length: Decimal) -> Result<(), &'static str> {
    if length <= Decimal::ZERO {
        return Err("Standard roll length must be greater than zero");
    }
    if exceeds_quantity_scale(length) {
        return Err("Roll length allows at most 2 decimal places");
    }
    Ok(())
}

/// Validate a required free-text field is not blank
pub fn validate_required(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("Value is required");
    }
    Ok(())
}

/// Validate a length can be reserved from a roll
pub fn validate_reservable_length(roll: &FabricRoll, length: Decimal) -> Result<(), &'static str> {
    validate_positive_quantity(length)?;
    if length > roll.remaining_length {
        return Err("Requested length exceeds the roll's remaining length");
    }
    Ok(())
}
