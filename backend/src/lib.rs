//! Mill Roll Tracking Platform - production batch and fabric roll lifecycle
//! engine
//!
//! [`Engine`] wires the services over one [`FabricStore`]. Use [`PgStore`]
//! for a PostgreSQL deployment or [`MemoryStore`] in process.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod services;
pub mod store;

pub use crate::config::Config;
pub use error::{AppError, AppResult};
pub use store::{FabricStore, MemoryStore, PgStore, ShipOutcome};

use services::{
    BatchService, IdentifierService, RollLifecycleService, RollService, ShipmentService,
    StockService, TraceabilityService,
};

/// All engine services sharing one store
#[derive(Clone)]
pub struct Engine {
    pub identifiers: IdentifierService,
    pub traceability: TraceabilityService,
    pub rolls: RollService,
    pub batches: BatchService,
    pub lifecycle: RollLifecycleService,
    pub shipments: ShipmentService,
    pub stock: StockService,
}

impl Engine {
    pub fn new(store: Arc<dyn FabricStore>, config: &Config) -> Self {
        let identifiers = IdentifierService::new(store.clone());
        let traceability = TraceabilityService::new(store.clone(), config.traceability.clone());
        let rolls = RollService::new(
            store.clone(),
            traceability.clone(),
            config.production.standard_roll_length,
        );
        let batches = BatchService::new(store.clone(), identifiers.clone(), rolls.clone());
        let lifecycle = RollLifecycleService::new(store.clone(), traceability.clone());
        let shipments = ShipmentService::new(
            store.clone(),
            identifiers.clone(),
            lifecycle.clone(),
            config.production.delivered_location.clone(),
        );
        let stock = StockService::new(store);

        Self {
            identifiers,
            traceability,
            rolls,
            batches,
            lifecycle,
            shipments,
            stock,
        }
    }
}
