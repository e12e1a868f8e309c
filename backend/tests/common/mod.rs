//! Fixtures shared by the integration tests: an in-memory mill with fabrics,
//! a customer order and production orders for both production types.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use mill_roll_backend::config::{
    Config, DatabaseConfig, LoggingConfig, PayloadFormat, ProductionConfig, TraceabilityConfig,
};
use mill_roll_backend::services::batch::{CompleteBatchInput, CreateBatchInput};
use mill_roll_backend::{Engine, FabricStore, MemoryStore};
use shared::{
    Customer, CustomerOrder, Fabric, FabricKind, FabricRoll, OrderStatus, ProductionBatch,
    ProductionOrder, ProductionPurpose, ProductionType,
};

pub const LOOKUP_BASE_URL: &str = "https://trace.mill.test";
pub const SIGNING_SECRET: &str = "test-signing-secret";
pub const CUSTOMER_ORDER_NUMBER: &str = "SO-1042";
pub const CUSTOMER_NAME: &str = "Harbor Awnings";
pub const ORDER_COLOR: &str = "Navy";

/// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn test_config(payload_format: PayloadFormat) -> Config {
    Config {
        environment: "test".to_string(),
        database: DatabaseConfig {
            url: "postgres://localhost/mill_test".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        production: ProductionConfig::default(),
        traceability: TraceabilityConfig {
            lookup_base_url: LOOKUP_BASE_URL.to_string(),
            signing_secret: SIGNING_SECRET.to_string(),
            payload_format,
        },
        logging: LoggingConfig::default(),
    }
}

pub struct Mill {
    pub store: Arc<MemoryStore>,
    pub engine: Engine,
    pub config: Config,
    pub base_fabric: Uuid,
    pub finished_fabric: Uuid,
    pub customer_order: Uuid,
    /// Weaving for stock, base fabric
    pub weaving_order: Uuid,
    /// Coating for the customer order, finished fabric
    pub coating_order: Uuid,
}

pub async fn mill() -> Mill {
    mill_with(PayloadFormat::Direct).await
}

pub async fn mill_with(payload_format: PayloadFormat) -> Mill {
    let store = Arc::new(MemoryStore::new());
    let config = test_config(payload_format);
    let now = Utc::now();

    let base_fabric = Uuid::new_v4();
    store
        .insert_fabric(Fabric {
            id: base_fabric,
            kind: FabricKind::BaseFabric,
            code: "GREIGE-280".to_string(),
            name: "Greige Polyester 280".to_string(),
            stock_quantity: Decimal::ZERO,
            updated_at: now,
        })
        .await;

    let finished_fabric = Uuid::new_v4();
    store
        .insert_fabric(Fabric {
            id: finished_fabric,
            kind: FabricKind::FinishedFabric,
            code: "PVC-650".to_string(),
            name: "PVC Coated Canvas 650".to_string(),
            stock_quantity: Decimal::ZERO,
            updated_at: now,
        })
        .await;

    let customer = Uuid::new_v4();
    store
        .insert_customer(Customer {
            id: customer,
            name: CUSTOMER_NAME.to_string(),
        })
        .await;

    let customer_order = Uuid::new_v4();
    store
        .insert_customer_order(CustomerOrder {
            id: customer_order,
            order_number: CUSTOMER_ORDER_NUMBER.to_string(),
            customer_id: customer,
            color: Some(ORDER_COLOR.to_string()),
            status: OrderStatus::InProduction,
            created_at: now,
            updated_at: now,
        })
        .await;

    let weaving_order = Uuid::new_v4();
    store
        .insert_production_order(ProductionOrder {
            id: weaving_order,
            order_number: "PO-STOCK-01".to_string(),
            fabric_id: base_fabric,
            fabric_kind: FabricKind::BaseFabric,
            purpose: ProductionPurpose::StockBuilding,
            customer_order_id: None,
            color: None,
            created_at: now,
        })
        .await;

    let coating_order = Uuid::new_v4();
    store
        .insert_production_order(ProductionOrder {
            id: coating_order,
            order_number: "PO-SO-1042".to_string(),
            fabric_id: finished_fabric,
            fabric_kind: FabricKind::FinishedFabric,
            purpose: ProductionPurpose::CustomerOrder,
            customer_order_id: Some(customer_order),
            color: None,
            created_at: now,
        })
        .await;

    let engine = Engine::new(store.clone() as Arc<dyn FabricStore>, &config);

    Mill {
        store,
        engine,
        config,
        base_fabric,
        finished_fabric,
        customer_order,
        weaving_order,
        coating_order,
    }
}

impl Mill {
    pub async fn create_batch(
        &self,
        production_type: ProductionType,
        planned: Decimal,
    ) -> ProductionBatch {
        let production_order_id = match production_type {
            ProductionType::Weaving => self.weaving_order,
            ProductionType::Coating => self.coating_order,
        };
        self.engine
            .batches
            .create_batch(CreateBatchInput {
                production_order_id,
                production_type,
                planned_quantity: planned,
                fabric_id: None,
                accepted_quantity: None,
                notes: None,
            })
            .await
            .unwrap()
    }

    pub async fn completed_batch(
        &self,
        production_type: ProductionType,
        planned: Decimal,
        accepted: Decimal,
    ) -> ProductionBatch {
        let batch = self.create_batch(production_type, planned).await;
        self.engine
            .batches
            .complete_batch(
                batch.id,
                CompleteBatchInput {
                    accepted_quantity: accepted,
                    wastage_reasons: Vec::new(),
                    recorded_by: "line-supervisor".to_string(),
                },
            )
            .await
            .unwrap()
    }

    /// Rolls of a completed batch, `quantity` meters in standard lengths
    pub async fn rolls(&self, production_type: ProductionType, quantity: Decimal) -> Vec<FabricRoll> {
        let batch = self
            .completed_batch(production_type, quantity, quantity)
            .await;
        self.engine
            .batches
            .generate_rolls(batch.id, None, None)
            .await
            .unwrap()
    }

    /// Finished rolls allocated to the customer order
    pub async fn allocated_rolls(&self, quantity: Decimal) -> Vec<FabricRoll> {
        let rolls = self.rolls(ProductionType::Coating, quantity).await;
        let mut allocated = Vec::with_capacity(rolls.len());
        for roll in rolls {
            allocated.push(
                self.engine
                    .lifecycle
                    .allocate_roll(&roll.roll_number, self.customer_order)
                    .await
                    .unwrap(),
            );
        }
        allocated
    }

    pub async fn customer_order_status(&self) -> OrderStatus {
        self.store
            .get_customer_order(self.customer_order)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    pub async fn stock(&self, kind: FabricKind) -> Decimal {
        let id = match kind {
            FabricKind::BaseFabric => self.base_fabric,
            FabricKind::FinishedFabric => self.finished_fabric,
        };
        self.store
            .get_fabric(kind, id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }
}
