//! Roll state machine service
//!
//! Every roll status change is looked up in [`next_roll_status`] and written
//! with a conditional update on the status the decision was based on. If
//! another caller moved the roll first, the write matches nothing and the
//! operation fails with a conflict instead of overwriting their change.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::traceability::TraceabilityService;
use crate::store::FabricStore;
use shared::{
    next_roll_status, validate_required, validate_reservable_length, ActiveRollFilter,
    FabricRoll, RollEvent, RollStatus, RollUpdate, ScanRecord, ScanType,
};

#[derive(Clone)]
pub struct RollLifecycleService {
    store: Arc<dyn FabricStore>,
    traceability: TraceabilityService,
}

/// A scan captured on the shop floor
#[derive(Debug, Clone, Deserialize)]
pub struct ScanInput {
    /// Tag as read from the roll label
    pub tag: String,
    /// Raw scan type; unknown values are rejected before anything changes
    pub scan_type: String,
    pub scanned_by: String,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub roll: FabricRoll,
    pub record: ScanRecord,
}

impl RollLifecycleService {
    pub fn new(store: Arc<dyn FabricStore>, traceability: TraceabilityService) -> Self {
        Self {
            store,
            traceability,
        }
    }

    /// Apply a scan to the roll its tag names and append it to the history
    pub async fn scan(&self, input: ScanInput) -> AppResult<ScanOutcome> {
        let scan_type: ScanType = input
            .scan_type
            .parse()
            .map_err(|e: String| AppError::validation("scan_type", e))?;
        validate_required(&input.scanned_by).map_err(|e| AppError::validation("scanned_by", e))?;
        let decoded = self.traceability.decode_tag(&input.tag)?;

        let location = input.location.clone();
        let (previous, roll) = self
            .apply_event(decoded.roll_number(), scan_type.into(), move |_| {
                Ok(RollUpdate {
                    location,
                    ..RollUpdate::default()
                })
            })
            .await?;

        let record = ScanRecord {
            id: Uuid::new_v4(),
            roll_id: roll.id,
            roll_number: roll.roll_number.clone(),
            scan_type,
            previous_status: previous,
            new_status: roll.status,
            location: input.location,
            scanned_by: input.scanned_by,
            notes: input.notes,
            scanned_at: Utc::now(),
        };
        self.store.insert_scan_record(&record).await?;

        tracing::info!(
            "{} scan of roll {} by {}: {} -> {}",
            scan_type.as_str(),
            roll.roll_number,
            record.scanned_by,
            previous,
            roll.status
        );

        Ok(ScanOutcome { roll, record })
    }

    /// Reserve a whole roll for a customer order
    pub async fn allocate_roll(&self, roll_number: &str, order_id: Uuid) -> AppResult<FabricRoll> {
        let order = self
            .store
            .get_customer_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Customer order {}", order_id)))?;

        let (_, roll) = self
            .apply_event(roll_number, RollEvent::Allocate, |roll| {
                ensure_order_binding(roll, order_id)?;
                Ok(RollUpdate {
                    customer_order_id: Some(order_id),
                    color: order.color.clone(),
                    ..RollUpdate::default()
                })
            })
            .await?;

        tracing::info!("Allocated roll {} to order {}", roll.roll_number, order.order_number);
        Ok(roll)
    }

    /// Reserve part of a roll. The roll becomes fully allocated once nothing
    /// remains.
    pub async fn allocate_length(
        &self,
        roll_number: &str,
        length: Decimal,
        order_id: Option<Uuid>,
    ) -> AppResult<FabricRoll> {
        let roll = self.get_roll(roll_number).await?;
        validate_reservable_length(&roll, length).map_err(|e| AppError::validation("length", e))?;
        if let Some(order_id) = order_id {
            ensure_order_binding(&roll, order_id)?;
        }

        let remaining = roll.remaining_length - length;
        let event = if remaining == Decimal::ZERO {
            RollEvent::Allocate
        } else {
            RollEvent::PartiallyAllocate
        };

        let update = RollUpdate {
            remaining_length: Some(remaining),
            customer_order_id: order_id,
            ..RollUpdate::default()
        };
        let updated = self.apply_event_to(&roll, event, update).await?;

        tracing::info!(
            "Reserved {} m of roll {}, {} m left",
            length,
            updated.roll_number,
            updated.remaining_length
        );
        Ok(updated)
    }

    /// Mark an allocated roll as consumed in-house
    pub async fn consume_roll(&self, roll_number: &str) -> AppResult<FabricRoll> {
        let (_, roll) = self
            .apply_event(roll_number, RollEvent::Consume, |_| {
                Ok(RollUpdate {
                    remaining_length: Some(Decimal::ZERO),
                    ..RollUpdate::default()
                })
            })
            .await?;

        tracing::info!("Roll {} consumed", roll.roll_number);
        Ok(roll)
    }

    /// Report a roll damaged. Terminal.
    pub async fn mark_damaged(
        &self,
        roll_number: &str,
        reason: &str,
        reported_by: &str,
    ) -> AppResult<FabricRoll> {
        validate_required(reason).map_err(|e| AppError::validation("reason", e))?;
        validate_required(reported_by).map_err(|e| AppError::validation("reported_by", e))?;

        let (previous, roll) = self
            .apply_event(roll_number, RollEvent::MarkDamaged, |_| Ok(RollUpdate::default()))
            .await?;

        tracing::warn!(
            "Roll {} marked damaged by {} (was {}): {}",
            roll.roll_number,
            reported_by,
            previous,
            reason
        );
        Ok(roll)
    }

    /// Confirm dispatch of a roll found through its lookup reference.
    /// Moves it to shipped and out of active stock.
    pub async fn confirm_dispatch(&self, roll_number: &str) -> AppResult<FabricRoll> {
        let (_, roll) = self
            .apply_event(roll_number, RollEvent::ConfirmDispatch, |_| {
                Ok(RollUpdate::default().archived())
            })
            .await?;

        tracing::info!("Dispatch confirmed for roll {}", roll.roll_number);
        Ok(roll)
    }

    /// Look a roll up by number, archived or not
    pub async fn get_roll(&self, roll_number: &str) -> AppResult<FabricRoll> {
        self.store
            .get_roll(roll_number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Roll {}", roll_number)))
    }

    /// Non-archived rolls matching `filter`
    pub async fn list_active_rolls(&self, filter: &ActiveRollFilter) -> AppResult<Vec<FabricRoll>> {
        self.store.list_active_rolls(filter).await
    }

    pub async fn scan_history(&self, roll_number: &str) -> AppResult<Vec<ScanRecord>> {
        let roll = self.get_roll(roll_number).await?;
        self.store.list_scan_records(roll.id).await
    }

    /// Load a roll, decide its next status for `event` and write it.
    ///
    /// `extra` supplies the non-status fields of the update. Returns the
    /// status before the change and the updated roll.
    pub(crate) async fn apply_event<F>(
        &self,
        roll_number: &str,
        event: RollEvent,
        extra: F,
    ) -> AppResult<(RollStatus, FabricRoll)>
    where
        F: FnOnce(&FabricRoll) -> AppResult<RollUpdate> + Send,
    {
        let roll = self.get_roll(roll_number).await?;
        let updated = self.apply_event_to(&roll, event, extra(&roll)?).await?;
        Ok((roll.status, updated))
    }

    /// Apply `event` to a roll already in hand
    pub(crate) async fn apply_event_to(
        &self,
        roll: &FabricRoll,
        event: RollEvent,
        mut update: RollUpdate,
    ) -> AppResult<FabricRoll> {
        let next = next_roll_status(roll.status, event)
            .map_err(|e| AppError::InvalidStateTransition(format!("{}: {}", roll.roll_number, e)))?;
        update.status = Some(next);
        self.write(roll, &update).await
    }

    async fn write(&self, roll: &FabricRoll, update: &RollUpdate) -> AppResult<FabricRoll> {
        self.store
            .update_roll_if_status(&roll.roll_number, roll.status, update)
            .await?
            .ok_or_else(|| AppError::Conflict {
                resource: "roll".to_string(),
                message: format!(
                    "roll {} is no longer {}",
                    roll.roll_number, roll.status
                ),
            })
    }
}

fn ensure_order_binding(roll: &FabricRoll, order_id: Uuid) -> AppResult<()> {
    match roll.customer_order_id {
        Some(bound) if bound != order_id => Err(AppError::Conflict {
            resource: "roll".to_string(),
            message: format!("roll {} is bound to another order", roll.roll_number),
        }),
        _ => Ok(()),
    }
}
