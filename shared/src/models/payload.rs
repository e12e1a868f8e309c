//! Traceability payload embedded in every fabric roll

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FabricKind, ProductionPurpose};

/// Roll identity and production context carried by a roll's tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadData {
    pub roll_number: String,
    pub batch_id: Uuid,
    pub batch_number: String,
    pub fabric_kind: FabricKind,
    pub fabric_id: Uuid,
    pub fabric_name: Option<String>,
    pub length: Decimal,
    pub generated_at: DateTime<Utc>,
    pub purpose: ProductionPurpose,
    pub customer_order: Option<OrderContext>,
    pub production_order: Option<ProductionOrderContext>,
    pub color: Option<String>,
    /// Human-readable allocation label, e.g. "Reserved for SO-1042"
    pub allocation_status: String,
}

/// Customer order a roll was produced for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderContext {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOrderContext {
    pub order_id: Uuid,
    pub order_number: String,
}

/// How the tag printed on a roll identifies it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum PayloadEncoding {
    /// Opaque signed reference resolved through the lookup endpoint
    Direct {
        reference: String,
        lookup_url: String,
    },
    /// Self-describing copy of the payload fields
    Legacy { data: String },
}

/// Payload stored on the roll row as structured data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceabilityPayload {
    #[serde(flatten)]
    pub data: PayloadData,
    pub encoding: PayloadEncoding,
}

impl TraceabilityPayload {
    /// String to render into the roll's scannable tag
    pub fn tag(&self) -> &str {
        match &self.encoding {
            PayloadEncoding::Direct { lookup_url, .. } => lookup_url,
            PayloadEncoding::Legacy { data } => data,
        }
    }
}

/// Allocation label shown on a freshly produced roll
pub fn allocation_label(purpose: ProductionPurpose, order: Option<&OrderContext>) -> String {
    match (purpose, order) {
        (ProductionPurpose::CustomerOrder, Some(order)) => {
            format!("Reserved for {}", order.order_number)
        }
        _ => "Available stock".to_string(),
    }
}
