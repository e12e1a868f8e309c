//! Document number allocation for batches and shipments

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rand::Rng;

use crate::error::{AppError, AppResult};
use crate::store::FabricStore;
use shared::{format_document_number, IdentifierCategory, ProductionType};

/// Allocates `{PREFIX}-{YYYYMMDD}-{SEQ}` numbers from the store's sequences
#[derive(Clone)]
pub struct IdentifierService {
    store: Arc<dyn FabricStore>,
}

impl IdentifierService {
    pub fn new(store: Arc<dyn FabricStore>) -> Self {
        Self { store }
    }

    /// Allocate a batch number for today
    pub async fn next_batch_number(&self, production_type: ProductionType) -> AppResult<String> {
        self.next_batch_number_on(production_type, Utc::now().date_naive())
            .await
    }

    /// Allocate a batch number for a given production day.
    ///
    /// Batch numbers seed roll numbers, so there is no random fallback: if the
    /// sequence cannot be read the caller's operation fails.
    pub async fn next_batch_number_on(
        &self,
        production_type: ProductionType,
        day: NaiveDate,
    ) -> AppResult<String> {
        let prefix = IdentifierCategory::Batch(production_type).prefix();
        let sequence = self
            .store
            .next_sequence(prefix, day)
            .await
            .map_err(|e| {
                AppError::SequenceUnavailable(format!("{} sequence for {}: {}", prefix, day, e))
            })?;

        Ok(format_document_number(prefix, day, sequence))
    }

    /// Allocate a shipment number for today, falling back to a random suffix
    pub async fn next_shipment_number(&self) -> String {
        let prefix = IdentifierCategory::Shipment.prefix();
        let day = Utc::now().date_naive();

        match self.store.next_sequence(prefix, day).await {
            Ok(sequence) => format_document_number(prefix, day, sequence),
            Err(e) => {
                let fallback = rand::thread_rng().gen_range(0..1000);
                tracing::warn!(
                    "Shipment sequence unavailable ({}), using random suffix {:03}",
                    e,
                    fallback
                );
                format_document_number(prefix, day, fallback)
            }
        }
    }
}
