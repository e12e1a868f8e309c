//! In-process store
//!
//! All tables live behind a single mutex, so each trait call observes and
//! mutates a consistent snapshot, which gives the same per-call atomicity the
//! PostgreSQL store gets from transactions and conditional updates.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use shared::{
    ActiveRollFilter, BatchCompletion, BatchStatus, Customer, CustomerOrder, Fabric, FabricKind,
    FabricRoll, OrderStatus, ProductionBatch, ProductionOrder, RollStatus, RollUpdate, ScanRecord,
    Shipment, ShipmentItem, ShipmentStatus, StockDelta, WastageRecord,
};

use super::{append_notes, FabricStore, ShipOutcome};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    sequences: HashMap<(String, NaiveDate), i64>,
    production_orders: HashMap<Uuid, ProductionOrder>,
    customer_orders: HashMap<Uuid, CustomerOrder>,
    customers: HashMap<Uuid, Customer>,
    fabrics: HashMap<(FabricKind, Uuid), Fabric>,
    batches: HashMap<Uuid, ProductionBatch>,
    wastage: Vec<WastageRecord>,
    // Insertion order is the roll order
    rolls: Vec<FabricRoll>,
    scans: Vec<ScanRecord>,
    shipments: Vec<Shipment>,
    shipment_items: Vec<ShipmentItem>,
    // Fault injection for callers' partial-failure paths
    failing_rolls: HashSet<String>,
    failing_wastage: bool,
    sequences_offline: bool,
}

/// Store keeping every table in memory
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_fabric(&self, fabric: Fabric) {
        let mut t = self.tables.lock().await;
        t.fabrics.insert((fabric.kind, fabric.id), fabric);
    }

    pub async fn insert_customer(&self, customer: Customer) {
        let mut t = self.tables.lock().await;
        t.customers.insert(customer.id, customer);
    }

    pub async fn insert_customer_order(&self, order: CustomerOrder) {
        let mut t = self.tables.lock().await;
        t.customer_orders.insert(order.id, order);
    }

    pub async fn insert_production_order(&self, order: ProductionOrder) {
        let mut t = self.tables.lock().await;
        t.production_orders.insert(order.id, order);
    }

    /// Make every later update of this roll fail with a database-style error
    pub async fn fail_updates_for_roll(&self, roll_number: &str) {
        let mut t = self.tables.lock().await;
        t.failing_rolls.insert(roll_number.to_string());
    }

    pub async fn clear_roll_failures(&self) {
        self.tables.lock().await.failing_rolls.clear();
    }

    /// Make every later wastage-record insert fail
    pub async fn fail_wastage_inserts(&self, fail: bool) {
        self.tables.lock().await.failing_wastage = fail;
    }

    /// Simulate the sequence source being unreachable
    pub async fn set_sequences_offline(&self, offline: bool) {
        let mut t = self.tables.lock().await;
        t.sequences_offline = offline;
    }

    pub async fn shipment_count(&self) -> usize {
        self.tables.lock().await.shipments.len()
    }

    pub async fn roll_count(&self) -> usize {
        self.tables.lock().await.rolls.len()
    }
}

#[async_trait]
impl FabricStore for MemoryStore {
    async fn next_sequence(&self, prefix: &str, day: NaiveDate) -> AppResult<i64> {
        let mut t = self.tables.lock().await;
        if t.sequences_offline {
            return Err(AppError::Internal("sequence source offline".to_string()));
        }
        let value = t.sequences.entry((prefix.to_string(), day)).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn get_production_order(&self, id: Uuid) -> AppResult<Option<ProductionOrder>> {
        Ok(self.tables.lock().await.production_orders.get(&id).cloned())
    }

    async fn get_customer_order(&self, id: Uuid) -> AppResult<Option<CustomerOrder>> {
        Ok(self.tables.lock().await.customer_orders.get(&id).cloned())
    }

    async fn get_customer(&self, id: Uuid) -> AppResult<Option<Customer>> {
        Ok(self.tables.lock().await.customers.get(&id).cloned())
    }

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<bool> {
        let mut t = self.tables.lock().await;
        match t.customer_orders.get_mut(&id) {
            Some(order) => {
                order.status = status;
                order.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_fabric(&self, kind: FabricKind, id: Uuid) -> AppResult<Option<Fabric>> {
        Ok(self.tables.lock().await.fabrics.get(&(kind, id)).cloned())
    }

    async fn insert_batch(&self, batch: &ProductionBatch) -> AppResult<()> {
        let mut t = self.tables.lock().await;
        if t
            .batches
            .values()
            .any(|b| b.batch_number == batch.batch_number)
        {
            return Err(AppError::DuplicateEntry("batch_number".to_string()));
        }
        t.batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn get_batch(&self, id: Uuid) -> AppResult<Option<ProductionBatch>> {
        Ok(self.tables.lock().await.batches.get(&id).cloned())
    }

    async fn complete_batch(
        &self,
        id: Uuid,
        completion: &BatchCompletion,
        stock: Option<StockDelta>,
    ) -> AppResult<Option<ProductionBatch>> {
        let mut t = self.tables.lock().await;

        match t.batches.get(&id) {
            Some(batch) if batch.status == BatchStatus::InProgress => {}
            _ => return Ok(None),
        }
        if let Some(delta) = stock {
            let fabric = t
                .fabrics
                .get_mut(&(delta.fabric_kind, delta.fabric_id))
                .ok_or_else(|| AppError::NotFound("Fabric".to_string()))?;
            fabric.stock_quantity += delta.quantity;
            fabric.updated_at = completion.completed_at;
        }

        let batch = t
            .batches
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;
        batch.accepted_quantity = Some(completion.accepted_quantity);
        batch.wastage_quantity = completion.wastage_quantity;
        batch.wastage_percentage = completion.wastage_percentage;
        batch.completed_at = Some(completion.completed_at);
        batch.status = BatchStatus::Completed;
        Ok(Some(batch.clone()))
    }

    async fn update_batch_status(
        &self,
        id: Uuid,
        expected: BatchStatus,
        next: BatchStatus,
    ) -> AppResult<Option<ProductionBatch>> {
        let mut t = self.tables.lock().await;
        match t.batches.get_mut(&id) {
            Some(batch) if batch.status == expected => {
                batch.status = next;
                Ok(Some(batch.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn insert_wastage_record(&self, record: &WastageRecord) -> AppResult<()> {
        let mut t = self.tables.lock().await;
        if t.failing_wastage {
            return Err(AppError::Internal("wastage insert rejected by store".to_string()));
        }
        t.wastage.push(record.clone());
        Ok(())
    }

    async fn list_wastage_records(&self, batch_id: Uuid) -> AppResult<Vec<WastageRecord>> {
        let t = self.tables.lock().await;
        Ok(t.wastage
            .iter()
            .filter(|w| w.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn insert_rolls(&self, rolls: &[FabricRoll]) -> AppResult<()> {
        let mut t = self.tables.lock().await;

        {
            let mut seen: HashSet<&str> =
                t.rolls.iter().map(|r| r.roll_number.as_str()).collect();
            for roll in rolls {
                if !seen.insert(roll.roll_number.as_str()) {
                    return Err(AppError::DuplicateEntry(format!(
                        "roll_number {}",
                        roll.roll_number
                    )));
                }
            }
        }

        t.rolls.extend(rolls.iter().cloned());
        Ok(())
    }

    async fn get_roll(&self, roll_number: &str) -> AppResult<Option<FabricRoll>> {
        let t = self.tables.lock().await;
        Ok(t.rolls.iter().find(|r| r.roll_number == roll_number).cloned())
    }

    async fn list_rolls_for_batch(&self, batch_id: Uuid) -> AppResult<Vec<FabricRoll>> {
        let t = self.tables.lock().await;
        Ok(t.rolls
            .iter()
            .filter(|r| r.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn list_rolls_for_order(
        &self,
        order_id: Uuid,
        status: RollStatus,
        kind: FabricKind,
    ) -> AppResult<Vec<FabricRoll>> {
        let t = self.tables.lock().await;
        Ok(t.rolls
            .iter()
            .filter(|r| {
                r.customer_order_id == Some(order_id) && r.status == status && r.fabric_kind == kind
            })
            .cloned()
            .collect())
    }

    async fn list_active_rolls(&self, filter: &ActiveRollFilter) -> AppResult<Vec<FabricRoll>> {
        let t = self.tables.lock().await;
        Ok(t.rolls
            .iter()
            .filter(|r| !r.archived)
            .filter(|r| filter.fabric_kind.map_or(true, |k| r.fabric_kind == k))
            .filter(|r| filter.fabric_id.map_or(true, |id| r.fabric_id == id))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| {
                filter
                    .location
                    .as_deref()
                    .map_or(true, |l| r.location.as_deref() == Some(l))
            })
            .cloned()
            .collect())
    }

    async fn update_roll_if_status(
        &self,
        roll_number: &str,
        expected: RollStatus,
        update: &RollUpdate,
    ) -> AppResult<Option<FabricRoll>> {
        let mut t = self.tables.lock().await;
        if t.failing_rolls.contains(roll_number) {
            return Err(AppError::Internal(format!(
                "write to roll {} rejected by store",
                roll_number
            )));
        }

        match t.rolls.iter_mut().find(|r| r.roll_number == roll_number) {
            Some(roll) if roll.status == expected => {
                update.apply_to(roll, Utc::now());
                Ok(Some(roll.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn archive_batch_rolls(&self, batch_id: Uuid, kind: FabricKind) -> AppResult<u64> {
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        let mut count = 0;
        for roll in t
            .rolls
            .iter_mut()
            .filter(|r| r.batch_id == batch_id && r.fabric_kind == kind && !r.archived)
        {
            roll.archived = true;
            roll.updated_at = now;
            count += 1;
        }
        Ok(count)
    }

    async fn insert_scan_record(&self, record: &ScanRecord) -> AppResult<()> {
        self.tables.lock().await.scans.push(record.clone());
        Ok(())
    }

    async fn list_scan_records(&self, roll_id: Uuid) -> AppResult<Vec<ScanRecord>> {
        let t = self.tables.lock().await;
        Ok(t.scans
            .iter()
            .filter(|s| s.roll_id == roll_id)
            .cloned()
            .collect())
    }

    async fn ship_rolls(
        &self,
        shipment: &Shipment,
        items: &[ShipmentItem],
        expected: RollStatus,
        update: &RollUpdate,
    ) -> AppResult<ShipOutcome> {
        let mut t = self.tables.lock().await;
        if t
            .shipments
            .iter()
            .any(|s| s.shipment_number == shipment.shipment_number)
        {
            return Err(AppError::DuplicateEntry("shipment_number".to_string()));
        }

        // Check every roll before touching any of them
        let mut positions = Vec::with_capacity(items.len());
        for item in items {
            let rejected = |reason: String| ShipOutcome::Rejected {
                roll_number: item.roll_number.clone(),
                reason,
            };
            if t.failing_rolls.contains(&item.roll_number) {
                return Ok(rejected(format!(
                    "write to roll {} rejected by store",
                    item.roll_number
                )));
            }
            match t.rolls.iter().position(|r| r.roll_number == item.roll_number) {
                Some(pos) if t.rolls[pos].status == expected => positions.push(pos),
                Some(pos) => {
                    return Ok(rejected(format!(
                        "roll is {}, expected {}",
                        t.rolls[pos].status, expected
                    )))
                }
                None => return Ok(rejected("roll not found".to_string())),
            }
        }

        let now = Utc::now();
        let mut shipped = Vec::with_capacity(positions.len());
        for pos in positions {
            let roll = &mut t.rolls[pos];
            update.apply_to(roll, now);
            shipped.push(roll.clone());
        }
        t.shipments.push(shipment.clone());
        t.shipment_items.extend(items.iter().cloned());
        Ok(ShipOutcome::Shipped(shipped))
    }

    async fn list_shipments_for_order(&self, order_id: Uuid) -> AppResult<Vec<Shipment>> {
        let t = self.tables.lock().await;
        let mut shipments: Vec<Shipment> = t
            .shipments
            .iter()
            .filter(|s| s.customer_order_id == order_id)
            .cloned()
            .collect();
        shipments.sort_by_key(|s| s.created_at);
        Ok(shipments)
    }

    async fn list_shipment_items(&self, shipment_id: Uuid) -> AppResult<Vec<ShipmentItem>> {
        let t = self.tables.lock().await;
        Ok(t.shipment_items
            .iter()
            .filter(|i| i.shipment_id == shipment_id)
            .cloned()
            .collect())
    }

    async fn mark_shipment_delivered(
        &self,
        shipment_id: Uuid,
        delivered_at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> AppResult<Option<Shipment>> {
        let mut t = self.tables.lock().await;
        match t.shipments.iter_mut().find(|s| s.id == shipment_id) {
            Some(shipment) if shipment.status == ShipmentStatus::Shipped => {
                shipment.status = ShipmentStatus::Delivered;
                shipment.delivered_at = Some(delivered_at);
                shipment.notes = append_notes(shipment.notes.as_deref(), notes);
                Ok(Some(shipment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn increment_fabric_stock(&self, delta: StockDelta) -> AppResult<Decimal> {
        let mut t = self.tables.lock().await;
        let fabric = t
            .fabrics
            .get_mut(&(delta.fabric_kind, delta.fabric_id))
            .ok_or_else(|| AppError::NotFound("Fabric".to_string()))?;
        fabric.stock_quantity += delta.quantity;
        fabric.updated_at = Utc::now();
        Ok(fabric.stock_quantity)
    }

    async fn sum_active_roll_length(&self, kind: FabricKind, fabric_id: Uuid) -> AppResult<Decimal> {
        let t = self.tables.lock().await;
        Ok(t.rolls
            .iter()
            .filter(|r| {
                r.fabric_kind == kind
                    && r.fabric_id == fabric_id
                    && !r.archived
                    && r.status.counts_as_stock()
            })
            .map(|r| r.remaining_length)
            .sum())
    }

    async fn set_fabric_stock(
        &self,
        kind: FabricKind,
        fabric_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<Decimal> {
        let mut t = self.tables.lock().await;
        let fabric = t
            .fabrics
            .get_mut(&(kind, fabric_id))
            .ok_or_else(|| AppError::NotFound("Fabric".to_string()))?;
        fabric.stock_quantity = quantity;
        fabric.updated_at = Utc::now();
        Ok(fabric.stock_quantity)
    }
}
