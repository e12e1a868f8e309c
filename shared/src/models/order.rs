//! Production orders, customer orders and customers
//!
//! These are owned by the order-entry side of the mill; the lifecycle engine
//! only reads them and moves a customer order's status on dispatch and
//! delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FabricKind;

/// Why a production run is happening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionPurpose {
    StockBuilding,
    CustomerOrder,
}

impl ProductionPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionPurpose::StockBuilding => "stock_building",
            ProductionPurpose::CustomerOrder => "customer_order",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stock_building" => Some(ProductionPurpose::StockBuilding),
            "customer_order" => Some(ProductionPurpose::CustomerOrder),
            _ => None,
        }
    }
}

/// An instruction to weave or coat a given fabric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub id: Uuid,
    pub order_number: String,
    /// Fabric produced by this order
    pub fabric_id: Uuid,
    pub fabric_kind: FabricKind,
    pub purpose: ProductionPurpose,
    /// Set when `purpose` is `CustomerOrder`
    pub customer_order_id: Option<Uuid>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Status of a customer order as seen by fulfillment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProduction,
    Ready,
    Dispatched,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProduction => "in_production",
            OrderStatus::Ready => "ready",
            OrderStatus::Dispatched => "dispatched",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "in_production" => Some(OrderStatus::InProduction),
            "ready" => Some(OrderStatus::Ready),
            "dispatched" => Some(OrderStatus::Dispatched),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// A customer's order for finished fabric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerOrder {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub color: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
}
