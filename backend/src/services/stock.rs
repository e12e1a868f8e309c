//! Aggregate fabric stock counters
//!
//! Counters only move through atomic store primitives: an increment applied
//! with batch completion, or a full recomputation from the active rolls.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::FabricStore;
use shared::{FabricKind, ProductionBatch, StockDelta};

#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn FabricStore>,
}

impl StockService {
    pub fn new(store: Arc<dyn FabricStore>) -> Self {
        Self { store }
    }

    /// Counter change caused by completing `batch` with `accepted` meters.
    ///
    /// Weaving adds to the base fabric, coating to the finished fabric.
    /// A zero yield moves nothing.
    pub fn delta_for(batch: &ProductionBatch, accepted: Decimal) -> Option<StockDelta> {
        if accepted <= Decimal::ZERO {
            return None;
        }
        Some(StockDelta {
            fabric_kind: batch.output_kind(),
            fabric_id: batch.fabric_id,
            quantity: accepted,
        })
    }

    /// Manual stock adjustment: apply a delta atomically, returning the new
    /// counter value. Batch completion does not come through here; it hands
    /// its delta to the store together with the completion.
    pub async fn apply(&self, delta: StockDelta) -> AppResult<Decimal> {
        let total = self.store.increment_fabric_stock(delta).await?;
        tracing::debug!(
            "Stock of {} {} changed by {} to {}",
            delta.fabric_kind,
            delta.fabric_id,
            delta.quantity,
            total
        );
        Ok(total)
    }

    /// Reset a fabric's counter to the remaining length of its active rolls
    pub async fn recompute_stock(&self, kind: FabricKind, fabric_id: Uuid) -> AppResult<Decimal> {
        let previous = self
            .store
            .get_fabric(kind, fabric_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fabric {}", fabric_id)))?
            .stock_quantity;

        let total = self.store.sum_active_roll_length(kind, fabric_id).await?;
        let total = self.store.set_fabric_stock(kind, fabric_id, total).await?;

        if total != previous {
            tracing::info!(
                "Recomputed stock of {} {}: {} -> {}",
                kind,
                fabric_id,
                previous,
                total
            );
        }

        Ok(total)
    }
}
