//! Shipment orchestration: dispatch of allocated rolls and delivery
//! confirmation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::identifier::IdentifierService;
use crate::services::lifecycle::RollLifecycleService;
use crate::store::{FabricStore, ShipOutcome};
use shared::{
    next_roll_status, FabricKind, OrderStatus, RollEvent, RollStatus, RollUpdate, Shipment,
    ShipmentItem, ShipmentStatus,
};

#[derive(Clone)]
pub struct ShipmentService {
    store: Arc<dyn FabricStore>,
    identifiers: IdentifierService,
    lifecycle: RollLifecycleService,
    delivered_location: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchInfo {
    pub tracking_reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryInfo {
    pub notes: Option<String>,
    /// Defaults to now
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentResult {
    pub shipment: Shipment,
    pub items: Vec<ShipmentItem>,
    pub rolls_shipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    /// Latest shipment closed by the call
    pub shipment: Shipment,
    /// Zero when every shipment had already been delivered
    pub rolls_updated: usize,
}

impl ShipmentService {
    pub fn new(
        store: Arc<dyn FabricStore>,
        identifiers: IdentifierService,
        lifecycle: RollLifecycleService,
        delivered_location: String,
    ) -> Self {
        Self {
            store,
            identifiers,
            lifecycle,
            delivered_location,
        }
    }

    /// Ship every allocated finished-fabric roll of an order
    pub async fn create_shipment(
        &self,
        order_id: Uuid,
        dispatch: DispatchInfo,
    ) -> AppResult<ShipmentResult> {
        let order = self
            .store
            .get_customer_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Customer order {}", order_id)))?;

        let rolls = self
            .store
            .list_rolls_for_order(order_id, RollStatus::Allocated, FabricKind::FinishedFabric)
            .await?;
        if rolls.is_empty() {
            return Err(AppError::NoShippableInventory(format!(
                "order {} has no allocated finished-fabric rolls",
                order.order_number
            )));
        }

        let shipment = Shipment {
            id: Uuid::new_v4(),
            shipment_number: self.identifiers.next_shipment_number().await,
            customer_order_id: order_id,
            status: ShipmentStatus::Shipped,
            tracking_reference: dispatch.tracking_reference,
            notes: dispatch.notes,
            created_at: Utc::now(),
            delivered_at: None,
        };
        let items: Vec<ShipmentItem> = rolls
            .iter()
            .map(|roll| ShipmentItem {
                id: Uuid::new_v4(),
                shipment_id: shipment.id,
                roll_id: roll.id,
                roll_number: roll.roll_number.clone(),
                quantity: roll.roll_length,
            })
            .collect();

        let next = next_roll_status(RollStatus::Allocated, RollEvent::Ship)
            .map_err(|e| AppError::InvalidStateTransition(e.to_string()))?;
        let update = RollUpdate::status(next).archived();

        let outcome = self
            .store
            .ship_rolls(&shipment, &items, RollStatus::Allocated, &update)
            .await?;
        if let ShipOutcome::Rejected {
            roll_number,
            reason,
        } = outcome
        {
            tracing::error!(
                "Shipment {} rolled back at roll {} of {} rolls: {}",
                shipment.shipment_number,
                roll_number,
                rolls.len(),
                reason
            );
            return Err(AppError::PartialFailure {
                operation: format!("shipment {}", shipment.shipment_number),
                failed_item: roll_number,
                applied: 0,
                reason,
            });
        }

        if !self
            .store
            .update_order_status(order_id, OrderStatus::Dispatched)
            .await?
        {
            return Err(AppError::NotFound(format!("Customer order {}", order_id)));
        }

        tracing::info!(
            "Created shipment {} for order {} with {} rolls",
            shipment.shipment_number,
            order.order_number,
            rolls.len()
        );

        Ok(ShipmentResult {
            shipment,
            rolls_shipped: items.len(),
            items,
        })
    }

    /// Confirm an order's shipments arrived.
    ///
    /// Every open shipment of the order is delivered, oldest first. Rolls are
    /// moved before their shipment is closed, so a call that stops partway
    /// can be repeated: rolls already delivered are skipped. When nothing is
    /// open the latest shipment is returned with zero updates.
    pub async fn confirm_delivery(
        &self,
        order_id: Uuid,
        delivery: DeliveryInfo,
    ) -> AppResult<DeliveryResult> {
        let shipments = self.store.list_shipments_for_order(order_id).await?;
        let Some(latest) = shipments.last().cloned() else {
            return Err(AppError::NotFound(format!("Shipment for order {}", order_id)));
        };

        let open: Vec<Shipment> = shipments
            .into_iter()
            .filter(|s| s.status == ShipmentStatus::Shipped)
            .collect();
        if open.is_empty() {
            tracing::info!(
                "Shipment {} already delivered, nothing to update",
                latest.shipment_number
            );
            return Ok(DeliveryResult {
                shipment: latest,
                rolls_updated: 0,
            });
        }

        let delivered_at = delivery.delivered_at.unwrap_or_else(Utc::now);
        let mut rolls_updated = 0;
        let mut closed = latest;

        for shipment in open {
            rolls_updated += self.deliver_rolls(&shipment, rolls_updated).await?;

            closed = match self
                .store
                .mark_shipment_delivered(shipment.id, delivered_at, delivery.notes.as_deref())
                .await?
            {
                Some(updated) => updated,
                None => {
                    // Closed by a concurrent confirmation
                    tracing::info!(
                        "Shipment {} was delivered concurrently",
                        shipment.shipment_number
                    );
                    self.store
                        .list_shipments_for_order(order_id)
                        .await?
                        .into_iter()
                        .find(|s| s.id == shipment.id)
                        .unwrap_or(shipment)
                }
            };
        }

        if !self
            .store
            .update_order_status(order_id, OrderStatus::Delivered)
            .await?
        {
            tracing::warn!(
                "Order {} not found while closing shipment {}",
                order_id,
                closed.shipment_number
            );
        }

        tracing::info!(
            "Delivered shipment {}: {} rolls updated",
            closed.shipment_number,
            rolls_updated
        );

        Ok(DeliveryResult {
            shipment: closed,
            rolls_updated,
        })
    }

    /// Move the shipped rolls of one shipment to delivered, returning how
    /// many changed. Rolls already delivered, or damaged in transit, are
    /// left alone.
    async fn deliver_rolls(&self, shipment: &Shipment, applied_before: usize) -> AppResult<usize> {
        let items = self.store.list_shipment_items(shipment.id).await?;
        let mut delivered = 0;

        for item in &items {
            let result = match self.store.get_roll(&item.roll_number).await? {
                Some(roll) if roll.status == RollStatus::Delivered => continue,
                Some(roll) if roll.status.is_terminal() => {
                    tracing::warn!(
                        "Skipping roll {} of shipment {}: roll is {}",
                        roll.roll_number,
                        shipment.shipment_number,
                        roll.status
                    );
                    continue;
                }
                Some(roll) => {
                    let update = RollUpdate::default().at_location(self.delivered_location.as_str());
                    self.lifecycle
                        .apply_event_to(&roll, RollEvent::Deliver, update)
                        .await
                        .map(|_| ())
                }
                None => Err(AppError::NotFound(format!("Roll {}", item.roll_number))),
            };

            if let Err(e) = result {
                let applied = applied_before + delivered;
                tracing::error!(
                    "Delivery of shipment {} stopped at roll {} after {} rolls: {}",
                    shipment.shipment_number,
                    item.roll_number,
                    applied,
                    e
                );
                return Err(AppError::PartialFailure {
                    operation: format!("delivery of shipment {}", shipment.shipment_number),
                    failed_item: item.roll_number.clone(),
                    applied,
                    reason: e.to_string(),
                });
            }
            delivered += 1;
        }

        Ok(delivered)
    }
}
