//! Fabric master data and aggregate stock counters

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of fabric a roll or stock counter refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FabricKind {
    /// Woven, uncoated fabric
    BaseFabric,
    /// Coated fabric ready for sale
    FinishedFabric,
}

impl FabricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FabricKind::BaseFabric => "base_fabric",
            FabricKind::FinishedFabric => "finished_fabric",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "base_fabric" => Some(FabricKind::BaseFabric),
            "finished_fabric" => Some(FabricKind::FinishedFabric),
            _ => None,
        }
    }
}

impl std::fmt::Display for FabricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FabricKind::BaseFabric => write!(f, "Base Fabric"),
            FabricKind::FinishedFabric => write!(f, "Finished Fabric"),
        }
    }
}

/// A fabric article with its aggregate stock quantity (meters)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fabric {
    pub id: Uuid,
    pub kind: FabricKind,
    pub code: String,
    pub name: String,
    pub stock_quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}
