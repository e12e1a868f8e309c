//! Batch manager: creation, completion with wastage, quality workflow and
//! the hand-over of woven rolls to coating

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::identifier::IdentifierService;
use crate::services::roll::RollService;
use crate::services::stock::StockService;
use crate::store::FabricStore;
use shared::{
    calculate_wastage, next_batch_status, validate_accepted_quantity, validate_positive_quantity,
    validate_required, BatchCompletion, BatchEvent, BatchStatus, FabricKind, FabricRoll,
    ProductionBatch, ProductionType, WastageRecord, WastageType,
};

#[derive(Clone)]
pub struct BatchService {
    store: Arc<dyn FabricStore>,
    identifiers: IdentifierService,
    rolls: RollService,
}

/// Input for creating a batch
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBatchInput {
    pub production_order_id: Uuid,
    pub production_type: ProductionType,
    pub planned_quantity: Decimal,
    /// Fabric produced; defaults to the production order's fabric when its
    /// kind matches the production type's output
    pub fabric_id: Option<Uuid>,
    /// Supplied when the run is recorded after the fact
    pub accepted_quantity: Option<Decimal>,
    pub notes: Option<String>,
}

/// One reported cause of loss
#[derive(Debug, Clone, Deserialize)]
pub struct WastageReason {
    pub wastage_type: WastageType,
    pub quantity: Decimal,
    pub reason: Option<String>,
}

/// Input for completing a batch
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteBatchInput {
    pub accepted_quantity: Decimal,
    #[serde(default)]
    pub wastage_reasons: Vec<WastageReason>,
    pub recorded_by: String,
}

/// Input for starting a coating run on a woven batch
#[derive(Debug, Clone, Deserialize)]
pub struct StartCoatingInput {
    pub production_order_id: Uuid,
    pub planned_quantity: Decimal,
    pub fabric_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Batch with its rolls and wastage records
#[derive(Debug, Clone, Serialize)]
pub struct BatchDetails {
    pub batch: ProductionBatch,
    pub rolls: Vec<FabricRoll>,
    pub wastage_records: Vec<WastageRecord>,
}

/// A started coating batch and the count of base rolls it took out of stock
#[derive(Debug, Clone, Serialize)]
pub struct CoatingStart {
    pub batch: ProductionBatch,
    pub archived_rolls: u64,
}

impl BatchService {
    pub fn new(store: Arc<dyn FabricStore>, identifiers: IdentifierService, rolls: RollService) -> Self {
        Self {
            store,
            identifiers,
            rolls,
        }
    }

    /// Create a batch for a production order
    pub async fn create_batch(&self, input: CreateBatchInput) -> AppResult<ProductionBatch> {
        validate_positive_quantity(input.planned_quantity)
            .map_err(|e| AppError::validation("planned_quantity", e))?;
        if let Some(accepted) = input.accepted_quantity {
            validate_accepted_quantity(accepted)
                .map_err(|e| AppError::validation("accepted_quantity", e))?;
        }

        let order = self
            .store
            .get_production_order(input.production_order_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Production order {}", input.production_order_id))
            })?;

        let output_kind = input.production_type.output_kind();
        let fabric_id = match input.fabric_id {
            Some(id) => id,
            None if order.fabric_kind == output_kind => order.fabric_id,
            None => {
                return Err(AppError::validation(
                    "fabric_id",
                    format!(
                        "Order {} is for {}; name the {} this batch produces",
                        order.order_number, order.fabric_kind, output_kind
                    ),
                ))
            }
        };

        if self.store.get_fabric(output_kind, fabric_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Fabric {}", fabric_id)));
        }

        let batch_number = self
            .identifiers
            .next_batch_number(input.production_type)
            .await?;

        let batch = ProductionBatch {
            id: Uuid::new_v4(),
            batch_number,
            production_order_id: order.id,
            production_type: input.production_type,
            fabric_id,
            planned_quantity: input.planned_quantity,
            accepted_quantity: None,
            wastage_quantity: Decimal::ZERO,
            wastage_percentage: Decimal::ZERO,
            status: BatchStatus::InProgress,
            notes: input.notes,
            created_at: Utc::now(),
            completed_at: None,
        };

        self.store.insert_batch(&batch).await?;

        tracing::info!(
            "Created {} batch {} for order {} ({} m planned)",
            batch.production_type,
            batch.batch_number,
            order.order_number,
            batch.planned_quantity
        );

        match input.accepted_quantity {
            Some(accepted) => self.finish(batch, accepted).await,
            None => Ok(batch),
        }
    }

    /// Complete an in-progress batch, record its wastage and add the
    /// accepted quantity to stock
    pub async fn complete_batch(
        &self,
        batch_id: Uuid,
        input: CompleteBatchInput,
    ) -> AppResult<ProductionBatch> {
        validate_accepted_quantity(input.accepted_quantity)
            .map_err(|e| AppError::validation("accepted_quantity", e))?;
        validate_required(&input.recorded_by).map_err(|e| AppError::validation("recorded_by", e))?;
        for reason in &input.wastage_reasons {
            validate_positive_quantity(reason.quantity)
                .map_err(|e| AppError::validation("wastage_reasons.quantity", e))?;
        }

        let batch = self.load(batch_id).await?;
        let batch = self.finish(batch, input.accepted_quantity).await?;

        // Wastage notes are supplementary: a failed insert is logged, the
        // completion stands
        for reason in input.wastage_reasons {
            let record = WastageRecord {
                id: Uuid::new_v4(),
                batch_id: batch.id,
                wastage_type: reason.wastage_type,
                quantity: reason.quantity,
                reason: reason.reason,
                recorded_by: input.recorded_by.clone(),
                recorded_at: Utc::now(),
            };
            if let Err(e) = self.store.insert_wastage_record(&record).await {
                tracing::warn!(
                    "Failed to record {} wastage for batch {}: {}",
                    record.wastage_type.as_str(),
                    batch.batch_number,
                    e
                );
            }
        }

        Ok(batch)
    }

    /// Batch with its rolls and wastage records. Read-only.
    pub async fn get_batch_details(&self, batch_id: Uuid) -> AppResult<BatchDetails> {
        let batch = self.load(batch_id).await?;
        let rolls = self.store.list_rolls_for_batch(batch_id).await?;
        let wastage_records = self.store.list_wastage_records(batch_id).await?;

        Ok(BatchDetails {
            batch,
            rolls,
            wastage_records,
        })
    }

    /// Split a completed batch's output into rolls.
    ///
    /// `quantity` defaults to the accepted quantity.
    pub async fn generate_rolls(
        &self,
        batch_id: Uuid,
        quantity: Option<Decimal>,
        unit_length: Option<Decimal>,
    ) -> AppResult<Vec<FabricRoll>> {
        let batch = self.load(batch_id).await?;
        if batch.status == BatchStatus::InProgress {
            return Err(AppError::InvalidStateTransition(format!(
                "batch {} is still in progress",
                batch.batch_number
            )));
        }

        let quantity = quantity
            .or(batch.accepted_quantity)
            .ok_or_else(|| AppError::validation("quantity", "No produced quantity to split"))?;

        self.rolls.generate_rolls(&batch, quantity, unit_length).await
    }

    pub async fn submit_for_quality_check(&self, batch_id: Uuid) -> AppResult<ProductionBatch> {
        self.advance(batch_id, BatchEvent::SubmitForQualityCheck).await
    }

    pub async fn approve_batch(&self, batch_id: Uuid) -> AppResult<ProductionBatch> {
        self.advance(batch_id, BatchEvent::Approve).await
    }

    /// Start a coating batch on a finished weaving batch, taking the woven
    /// rolls out of active stock
    pub async fn start_coating(
        &self,
        source_batch_id: Uuid,
        input: StartCoatingInput,
    ) -> AppResult<CoatingStart> {
        let source = self.load(source_batch_id).await?;
        if source.production_type != ProductionType::Weaving {
            return Err(AppError::validation(
                "source_batch_id",
                format!("{} is not a weaving batch", source.batch_number),
            ));
        }
        if source.status == BatchStatus::InProgress {
            return Err(AppError::InvalidStateTransition(format!(
                "weaving batch {} is still in progress",
                source.batch_number
            )));
        }

        let notes = input
            .notes
            .or_else(|| Some(format!("Coating of {}", source.batch_number)));

        let batch = self
            .create_batch(CreateBatchInput {
                production_order_id: input.production_order_id,
                production_type: ProductionType::Coating,
                planned_quantity: input.planned_quantity,
                fabric_id: input.fabric_id,
                accepted_quantity: None,
                notes,
            })
            .await?;

        let archived_rolls = self
            .store
            .archive_batch_rolls(source.id, FabricKind::BaseFabric)
            .await?;

        tracing::info!(
            "Coating batch {} started from {}; archived {} base rolls",
            batch.batch_number,
            source.batch_number,
            archived_rolls
        );

        Ok(CoatingStart {
            batch,
            archived_rolls,
        })
    }

    async fn load(&self, batch_id: Uuid) -> AppResult<ProductionBatch> {
        self.store
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch_id)))
    }

    /// Move an in-progress batch to completed together with its stock delta
    async fn finish(&self, batch: ProductionBatch, accepted: Decimal) -> AppResult<ProductionBatch> {
        next_batch_status(batch.status, BatchEvent::Complete)
            .map_err(|e| AppError::InvalidStateTransition(e.to_string()))?;

        let wastage = calculate_wastage(batch.planned_quantity, accepted);
        let completion = BatchCompletion {
            accepted_quantity: accepted,
            wastage_quantity: wastage.wastage_quantity,
            wastage_percentage: wastage.wastage_percentage,
            completed_at: Utc::now(),
        };
        let delta = StockService::delta_for(&batch, accepted);

        let completed = self
            .store
            .complete_batch(batch.id, &completion, delta)
            .await?
            .ok_or_else(|| AppError::Conflict {
                resource: "batch".to_string(),
                message: format!("batch {} was completed concurrently", batch.batch_number),
            })?;

        tracing::info!(
            "Completed batch {}: accepted {} m, wastage {} m ({}%)",
            completed.batch_number,
            accepted,
            completion.wastage_quantity,
            completion.wastage_percentage
        );

        Ok(completed)
    }

    async fn advance(&self, batch_id: Uuid, event: BatchEvent) -> AppResult<ProductionBatch> {
        let batch = self.load(batch_id).await?;
        let next = next_batch_status(batch.status, event)
            .map_err(|e| AppError::InvalidStateTransition(e.to_string()))?;

        let updated = self
            .store
            .update_batch_status(batch_id, batch.status, next)
            .await?
            .ok_or_else(|| AppError::Conflict {
                resource: "batch".to_string(),
                message: format!("batch {} changed status concurrently", batch.batch_number),
            })?;

        tracing::info!(
            "Batch {} moved from {} to {}",
            updated.batch_number,
            batch.status,
            updated.status
        );

        Ok(updated)
    }
}
