//! Fabric roll models and roll partitioning

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FabricKind, TraceabilityPayload};
use crate::validation::exceeds_quantity_scale;

/// Upper bound on the number of rolls a single generation run may create
pub const MAX_ROLLS_PER_RUN: u32 = 9_999;

/// Status of a fabric roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollStatus {
    Available,
    Allocated,
    PartiallyAllocated,
    Used,
    Shipped,
    Delivered,
    Damaged,
}

impl RollStatus {
    pub const ALL: [RollStatus; 7] = [
        RollStatus::Available,
        RollStatus::Allocated,
        RollStatus::PartiallyAllocated,
        RollStatus::Used,
        RollStatus::Shipped,
        RollStatus::Delivered,
        RollStatus::Damaged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RollStatus::Available => "available",
            RollStatus::Allocated => "allocated",
            RollStatus::PartiallyAllocated => "partially_allocated",
            RollStatus::Used => "used",
            RollStatus::Shipped => "shipped",
            RollStatus::Delivered => "delivered",
            RollStatus::Damaged => "damaged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(RollStatus::Available),
            "allocated" => Some(RollStatus::Allocated),
            "partially_allocated" => Some(RollStatus::PartiallyAllocated),
            "used" => Some(RollStatus::Used),
            "shipped" => Some(RollStatus::Shipped),
            "delivered" => Some(RollStatus::Delivered),
            "damaged" => Some(RollStatus::Damaged),
            _ => None,
        }
    }

    /// No lifecycle event moves a roll out of a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RollStatus::Used | RollStatus::Delivered | RollStatus::Damaged
        )
    }

    /// Statuses whose remaining length still counts as stock on hand
    pub fn counts_as_stock(&self) -> bool {
        matches!(
            self,
            RollStatus::Available | RollStatus::Allocated | RollStatus::PartiallyAllocated
        )
    }
}

impl std::fmt::Display for RollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An individually identified roll of fabric cut from a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricRoll {
    pub id: Uuid,
    /// Human-readable roll number, e.g. `WV-20240315-007-R003`
    pub roll_number: String,
    pub batch_id: Uuid,
    pub fabric_kind: FabricKind,
    pub fabric_id: Uuid,
    pub roll_length: Decimal,
    pub remaining_length: Decimal,
    pub status: RollStatus,
    pub quality_grade: String,
    pub customer_order_id: Option<Uuid>,
    /// Colour snapshot taken from the customer order at production time
    pub color: Option<String>,
    /// Excluded from active-inventory views, still retrievable by number
    pub archived: bool,
    pub location: Option<String>,
    pub payload: TraceabilityPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FabricRoll {
    /// Check `0 <= remaining_length <= roll_length`
    pub fn lengths_are_consistent(&self) -> bool {
        self.remaining_length >= Decimal::ZERO && self.remaining_length <= self.roll_length
    }
}

/// Field changes applied to a roll by a lifecycle transition
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollUpdate {
    pub status: Option<RollStatus>,
    pub remaining_length: Option<Decimal>,
    pub archived: Option<bool>,
    pub location: Option<String>,
    pub customer_order_id: Option<Uuid>,
    pub color: Option<String>,
}

impl RollUpdate {
    pub fn status(status: RollStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn archived(mut self) -> Self {
        self.archived = Some(true);
        self
    }

    pub fn at_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Apply the changes to an in-memory roll
    pub fn apply_to(&self, roll: &mut FabricRoll, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            roll.status = status;
        }
        if let Some(remaining) = self.remaining_length {
            roll.remaining_length = remaining;
        }
        if let Some(archived) = self.archived {
            roll.archived = archived;
        }
        if let Some(location) = &self.location {
            roll.location = Some(location.clone());
        }
        if let Some(order_id) = self.customer_order_id {
            roll.customer_order_id = Some(order_id);
        }
        // The colour snapshot is immutable once taken
        if roll.color.is_none() {
            if let Some(color) = &self.color {
                roll.color = Some(color.clone());
            }
        }
        roll.updated_at = now;
    }
}

/// Split a produced quantity into roll lengths
///
/// Yields `ceil(total / unit)` rolls; every roll but the last has length
/// `unit` and the last one carries the remainder, or a full `unit` when the
/// total is an exact multiple.
pub fn plan_roll_lengths(total: Decimal, unit: Decimal) -> Result<Vec<Decimal>, &'static str> {
    if total <= Decimal::ZERO {
        return Err("Produced quantity must be positive");
    }
    if unit <= Decimal::ZERO {
        return Err("Standard roll length must be positive");
    }
    if exceeds_quantity_scale(total) || exceeds_quantity_scale(unit) {
        return Err("Lengths allow at most 2 decimal places");
    }

    let count = (total / unit)
        .ceil()
        .to_u32()
        .filter(|c| *c <= MAX_ROLLS_PER_RUN)
        .ok_or("Produced quantity yields too many rolls")?;

    let mut lengths = vec![unit; count as usize];
    let full = unit * Decimal::from(count - 1);
    if let Some(last) = lengths.last_mut() {
        *last = total - full;
    }

    Ok(lengths)
}
