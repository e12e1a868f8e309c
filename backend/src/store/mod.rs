//! Persistence seam for the lifecycle engine
//!
//! The engine only needs point lookups, filtered lists, single-row writes,
//! multi-row inserts and conditional updates. [`FabricStore`] names exactly
//! those primitives; [`PgStore`] backs them with PostgreSQL and
//! [`MemoryStore`] keeps everything in process.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    ActiveRollFilter, BatchCompletion, BatchStatus, Customer, CustomerOrder, Fabric, FabricKind,
    FabricRoll, OrderStatus, ProductionBatch, ProductionOrder, RollStatus, RollUpdate, ScanRecord,
    Shipment, ShipmentItem, StockDelta, WastageRecord,
};

use crate::error::AppResult;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of [`FabricStore::ship_rolls`]
#[derive(Debug, Clone)]
pub enum ShipOutcome {
    /// Shipment, items and roll transitions were committed
    Shipped(Vec<FabricRoll>),
    /// Nothing was written because this roll could not be moved
    Rejected { roll_number: String, reason: String },
}

#[async_trait]
pub trait FabricStore: Send + Sync {
    // Sequences

    /// Next value of the per-prefix, per-day sequence, serialised by the store
    async fn next_sequence(&self, prefix: &str, day: NaiveDate) -> AppResult<i64>;

    // Orders and master data

    async fn get_production_order(&self, id: Uuid) -> AppResult<Option<ProductionOrder>>;

    async fn get_customer_order(&self, id: Uuid) -> AppResult<Option<CustomerOrder>>;

    async fn get_customer(&self, id: Uuid) -> AppResult<Option<Customer>>;

    /// Returns `false` when the order does not exist
    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<bool>;

    async fn get_fabric(&self, kind: FabricKind, id: Uuid) -> AppResult<Option<Fabric>>;

    // Batches

    async fn insert_batch(&self, batch: &ProductionBatch) -> AppResult<()>;

    async fn get_batch(&self, id: Uuid) -> AppResult<Option<ProductionBatch>>;

    /// Complete a batch still `in_progress` and apply the stock delta in the
    /// same unit of work. Returns `None` when the batch is no longer in progress.
    async fn complete_batch(
        &self,
        id: Uuid,
        completion: &BatchCompletion,
        stock: Option<StockDelta>,
    ) -> AppResult<Option<ProductionBatch>>;

    /// Move a batch to `next` only if its status is still `expected`
    async fn update_batch_status(
        &self,
        id: Uuid,
        expected: BatchStatus,
        next: BatchStatus,
    ) -> AppResult<Option<ProductionBatch>>;

    // Wastage

    async fn insert_wastage_record(&self, record: &WastageRecord) -> AppResult<()>;

    async fn list_wastage_records(&self, batch_id: Uuid) -> AppResult<Vec<WastageRecord>>;

    // Rolls

    /// Insert every roll or none of them
    async fn insert_rolls(&self, rolls: &[FabricRoll]) -> AppResult<()>;

    async fn get_roll(&self, roll_number: &str) -> AppResult<Option<FabricRoll>>;

    async fn list_rolls_for_batch(&self, batch_id: Uuid) -> AppResult<Vec<FabricRoll>>;

    async fn list_rolls_for_order(
        &self,
        order_id: Uuid,
        status: RollStatus,
        kind: FabricKind,
    ) -> AppResult<Vec<FabricRoll>>;

    /// Non-archived rolls matching the filter
    async fn list_active_rolls(&self, filter: &ActiveRollFilter) -> AppResult<Vec<FabricRoll>>;

    /// Apply `update` only if the roll's status is still `expected`.
    /// Returns `None` when the roll is missing or its status has moved on.
    async fn update_roll_if_status(
        &self,
        roll_number: &str,
        expected: RollStatus,
        update: &RollUpdate,
    ) -> AppResult<Option<FabricRoll>>;

    /// Archive every non-archived roll of `kind` in a batch, returning the count
    async fn archive_batch_rolls(&self, batch_id: Uuid, kind: FabricKind) -> AppResult<u64>;

    // Scans

    async fn insert_scan_record(&self, record: &ScanRecord) -> AppResult<()>;

    async fn list_scan_records(&self, roll_id: Uuid) -> AppResult<Vec<ScanRecord>>;

    // Shipments

    /// Insert a shipment with its items and apply `update` to the roll of
    /// every item, each only if still `expected`, as one unit of work.
    /// When any roll cannot be moved nothing is written.
    async fn ship_rolls(
        &self,
        shipment: &Shipment,
        items: &[ShipmentItem],
        expected: RollStatus,
        update: &RollUpdate,
    ) -> AppResult<ShipOutcome>;

    /// Every shipment of an order, oldest first
    async fn list_shipments_for_order(&self, order_id: Uuid) -> AppResult<Vec<Shipment>>;

    async fn list_shipment_items(&self, shipment_id: Uuid) -> AppResult<Vec<ShipmentItem>>;

    /// Mark a `shipped` shipment delivered, appending notes.
    /// Returns `None` when it is no longer `shipped`.
    async fn mark_shipment_delivered(
        &self,
        shipment_id: Uuid,
        delivered_at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> AppResult<Option<Shipment>>;

    // Stock

    /// Atomically add `delta.quantity` to the counter, returning the new value
    async fn increment_fabric_stock(&self, delta: StockDelta) -> AppResult<Decimal>;

    /// Sum of remaining length over active stock rolls of a fabric
    async fn sum_active_roll_length(&self, kind: FabricKind, fabric_id: Uuid) -> AppResult<Decimal>;

    async fn set_fabric_stock(
        &self,
        kind: FabricKind,
        fabric_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<Decimal>;
}

/// Join delivery notes onto existing shipment notes
pub(crate) fn append_notes(existing: Option<&str>, extra: Option<&str>) -> Option<String> {
    match (existing, extra.map(str::trim).filter(|s| !s.is_empty())) {
        (Some(old), Some(new)) => Some(format!("{}\n{}", old, new)),
        (None, Some(new)) => Some(new.to_string()),
        (old, None) => old.map(str::to_string),
    }
}
