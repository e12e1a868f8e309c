//! Production batch models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FabricKind;

/// Kind of production run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionType {
    Weaving,
    Coating,
}

impl ProductionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionType::Weaving => "weaving",
            ProductionType::Coating => "coating",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weaving" => Some(ProductionType::Weaving),
            "coating" => Some(ProductionType::Coating),
            _ => None,
        }
    }

    /// Prefix used in batch numbers, e.g. `WV-20240315-007`
    pub fn batch_prefix(&self) -> &'static str {
        match self {
            ProductionType::Weaving => "WV",
            ProductionType::Coating => "CT",
        }
    }

    /// Kind of fabric this production type yields
    pub fn output_kind(&self) -> FabricKind {
        match self {
            ProductionType::Weaving => FabricKind::BaseFabric,
            ProductionType::Coating => FabricKind::FinishedFabric,
        }
    }
}

impl std::fmt::Display for ProductionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductionType::Weaving => write!(f, "Weaving"),
            ProductionType::Coating => write!(f, "Coating"),
        }
    }
}

/// Status of a production batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Completed,
    QualityCheck,
    Approved,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::QualityCheck => "quality_check",
            BatchStatus::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(BatchStatus::InProgress),
            "completed" => Some(BatchStatus::Completed),
            "quality_check" => Some(BatchStatus::QualityCheck),
            "approved" => Some(BatchStatus::Approved),
            _ => None,
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One production run yielding a planned quantity of fabric (meters)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionBatch {
    pub id: Uuid,
    /// Unique batch number, e.g. `WV-20240315-007`
    pub batch_number: String,
    pub production_order_id: Uuid,
    pub production_type: ProductionType,
    /// Fabric produced by the batch
    pub fabric_id: Uuid,
    pub planned_quantity: Decimal,
    /// Null until the batch is completed
    pub accepted_quantity: Option<Decimal>,
    pub wastage_quantity: Decimal,
    pub wastage_percentage: Decimal,
    pub status: BatchStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProductionBatch {
    /// Kind of fabric the batch's rolls and stock belong to
    pub fn output_kind(&self) -> FabricKind {
        self.production_type.output_kind()
    }
}

/// Values written to a batch when it is completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCompletion {
    pub accepted_quantity: Decimal,
    pub wastage_quantity: Decimal,
    pub wastage_percentage: Decimal,
    pub completed_at: DateTime<Utc>,
}
