//! Roll generation: split a produced quantity into traceable rolls

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::traceability::TraceabilityService;
use crate::store::FabricStore;
use shared::{
    allocation_label, format_roll_number, parse_roll_number, plan_roll_lengths,
    validate_positive_quantity, validate_roll_length, FabricKind, FabricRoll, OrderContext,
    PayloadData, ProductionBatch, ProductionOrder, ProductionOrderContext, ProductionPurpose,
    RollStatus,
};

const DEFAULT_QUALITY_GRADE: &str = "A";

/// Everything about a generation run that does not depend on numbering
struct RollPlan<'a> {
    batch: &'a ProductionBatch,
    order: &'a ProductionOrder,
    order_context: Option<OrderContext>,
    color: Option<String>,
    fabric_kind: FabricKind,
    fabric_name: Option<String>,
    lengths: Vec<Decimal>,
}

#[derive(Clone)]
pub struct RollService {
    store: Arc<dyn FabricStore>,
    traceability: TraceabilityService,
    standard_length: Decimal,
}

impl RollService {
    pub fn new(
        store: Arc<dyn FabricStore>,
        traceability: TraceabilityService,
        standard_length: Decimal,
    ) -> Self {
        Self {
            store,
            traceability,
            standard_length,
        }
    }

    /// Partition `quantity` into rolls of the standard length (or `unit_length`)
    /// and persist them with their payloads in one insert.
    ///
    /// Ordinals continue after any rolls the batch already has, so a second
    /// run never reuses a roll number.
    pub async fn generate_rolls(
        &self,
        batch: &ProductionBatch,
        quantity: Decimal,
        unit_length: Option<Decimal>,
    ) -> AppResult<Vec<FabricRoll>> {
        validate_positive_quantity(quantity).map_err(|e| AppError::validation("quantity", e))?;
        let unit = unit_length.unwrap_or(self.standard_length);
        validate_roll_length(unit).map_err(|e| AppError::validation("unit_length", e))?;
        let lengths =
            plan_roll_lengths(quantity, unit).map_err(|e| AppError::validation("unit_length", e))?;

        let order = self
            .store
            .get_production_order(batch.production_order_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Production order {}", batch.production_order_id))
            })?;
        let order_context = self.order_context(&order).await?;
        let color = self.color_snapshot(&order).await?;

        let fabric_kind = batch.output_kind();
        let fabric_name = self
            .store
            .get_fabric(fabric_kind, batch.fabric_id)
            .await?
            .map(|f| f.name);

        let plan = RollPlan {
            batch,
            order: &order,
            order_context,
            color,
            fabric_kind,
            fabric_name,
            lengths,
        };

        // A concurrent run on the same batch can claim the ordinals between
        // the read and the insert; renumber once from the new maximum
        let mut retried = false;
        let rolls = loop {
            let first_ordinal = self.next_ordinal(batch).await?;
            let rolls = self.build_rolls(&plan, first_ordinal)?;
            match self.store.insert_rolls(&rolls).await {
                Ok(()) => break rolls,
                Err(AppError::DuplicateEntry(what)) if !retried => {
                    tracing::warn!(
                        "Roll numbers for batch {} taken concurrently ({}), renumbering",
                        batch.batch_number,
                        what
                    );
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        };

        tracing::info!(
            "Generated {} rolls ({} m) for batch {}",
            rolls.len(),
            quantity,
            batch.batch_number
        );

        Ok(rolls)
    }

    fn build_rolls(&self, plan: &RollPlan<'_>, first_ordinal: u32) -> AppResult<Vec<FabricRoll>> {
        let batch = plan.batch;
        let order = plan.order;
        let now = Utc::now();

        let mut rolls = Vec::with_capacity(plan.lengths.len());
        for (offset, length) in (0u32..).zip(plan.lengths.iter().copied()) {
            let roll_number = format_roll_number(&batch.batch_number, first_ordinal + offset);

            let data = PayloadData {
                roll_number: roll_number.clone(),
                batch_id: batch.id,
                batch_number: batch.batch_number.clone(),
                fabric_kind: plan.fabric_kind,
                fabric_id: batch.fabric_id,
                fabric_name: plan.fabric_name.clone(),
                length,
                generated_at: now,
                purpose: order.purpose,
                customer_order: plan.order_context.clone(),
                production_order: Some(ProductionOrderContext {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                }),
                color: plan.color.clone(),
                allocation_status: allocation_label(order.purpose, plan.order_context.as_ref()),
            };

            rolls.push(FabricRoll {
                id: Uuid::new_v4(),
                roll_number,
                batch_id: batch.id,
                fabric_kind: plan.fabric_kind,
                fabric_id: batch.fabric_id,
                roll_length: length,
                remaining_length: length,
                status: RollStatus::Available,
                quality_grade: DEFAULT_QUALITY_GRADE.to_string(),
                customer_order_id: plan.order_context.as_ref().map(|o| o.order_id),
                color: plan.color.clone(),
                archived: false,
                location: None,
                payload: self.traceability.encode(data)?,
                created_at: now,
                updated_at: now,
            });
        }

        Ok(rolls)
    }

    async fn next_ordinal(&self, batch: &ProductionBatch) -> AppResult<u32> {
        let existing = self.store.list_rolls_for_batch(batch.id).await?;
        let last = existing
            .iter()
            .filter_map(|r| parse_roll_number(&r.roll_number).map(|(_, ordinal)| ordinal))
            .max()
            .unwrap_or(0);
        Ok(last + 1)
    }

    async fn order_context(&self, order: &ProductionOrder) -> AppResult<Option<OrderContext>> {
        if order.purpose != ProductionPurpose::CustomerOrder {
            return Ok(None);
        }
        let Some(order_id) = order.customer_order_id else {
            return Ok(None);
        };

        let customer_order = self
            .store
            .get_customer_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Customer order {}", order_id)))?;
        let customer = self.store.get_customer(customer_order.customer_id).await?;

        Ok(Some(OrderContext {
            order_id,
            order_number: customer_order.order_number,
            customer_name: customer.map(|c| c.name),
        }))
    }

    /// Colour fixed on the rolls at production time
    async fn color_snapshot(&self, order: &ProductionOrder) -> AppResult<Option<String>> {
        if order.color.is_some() {
            return Ok(order.color.clone());
        }
        match (order.purpose, order.customer_order_id) {
            (ProductionPurpose::CustomerOrder, Some(id)) => Ok(self
                .store
                .get_customer_order(id)
                .await?
                .and_then(|o| o.color)),
            _ => Ok(None),
        }
    }
}
