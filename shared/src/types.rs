//! Common types used across the platform

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{FabricKind, RollStatus};

/// Default standard roll length in meters
pub const DEFAULT_ROLL_LENGTH: u32 = 50;

/// Decimal places kept for every length and quantity column
pub const QUANTITY_SCALE: u32 = 2;

/// Location marker written on rolls once their shipment is delivered
pub const DELIVERED_LOCATION: &str = "DELIVERED";

/// Quantity change for one fabric stock counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub fabric_kind: FabricKind,
    pub fabric_id: Uuid,
    pub quantity: Decimal,
}

/// Filter for the active-inventory view (archived rolls never match)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveRollFilter {
    pub fabric_kind: Option<FabricKind>,
    pub fabric_id: Option<Uuid>,
    pub status: Option<RollStatus>,
    pub location: Option<String>,
}
