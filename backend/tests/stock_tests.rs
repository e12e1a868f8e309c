//! Stock reconciler tests: atomic increments and recomputation from rolls

mod common;

use rust_decimal::Decimal;
use uuid::Uuid;

use common::{dec, mill};
use mill_roll_backend::services::batch::CompleteBatchInput;
use mill_roll_backend::services::lifecycle::ScanInput;
use mill_roll_backend::services::StockService;
use mill_roll_backend::AppError;
use shared::{FabricKind, ProductionType, StockDelta};

#[tokio::test]
async fn test_delta_follows_production_type() {
    let mill = mill().await;
    let weaving = mill.create_batch(ProductionType::Weaving, dec("100")).await;
    let coating = mill.create_batch(ProductionType::Coating, dec("100")).await;

    let delta = StockService::delta_for(&weaving, dec("95")).unwrap();
    assert_eq!(delta.fabric_kind, FabricKind::BaseFabric);
    assert_eq!(delta.fabric_id, mill.base_fabric);
    assert_eq!(delta.quantity, dec("95"));

    let delta = StockService::delta_for(&coating, dec("40")).unwrap();
    assert_eq!(delta.fabric_kind, FabricKind::FinishedFabric);
    assert_eq!(delta.fabric_id, mill.finished_fabric);

    assert!(StockService::delta_for(&weaving, Decimal::ZERO).is_none());
}

#[tokio::test]
async fn test_concurrent_completions_lose_no_stock() {
    let mill = mill().await;

    let mut batches = Vec::new();
    for _ in 0..12 {
        batches.push(mill.create_batch(ProductionType::Weaving, dec("100")).await);
    }

    let mut handles = Vec::new();
    for (i, batch) in batches.into_iter().enumerate() {
        let service = mill.engine.batches.clone();
        handles.push(tokio::spawn(async move {
            service
                .complete_batch(
                    batch.id,
                    CompleteBatchInput {
                        accepted_quantity: Decimal::from(80 + i as i64),
                        wastage_reasons: Vec::new(),
                        recorded_by: "line-supervisor".to_string(),
                    },
                )
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // 80 + 81 + ... + 91
    assert_eq!(mill.stock(FabricKind::BaseFabric).await, dec("1026"));
}

#[tokio::test]
async fn test_apply_to_unknown_fabric() {
    let mill = mill().await;

    let err = mill
        .engine
        .stock
        .apply(StockDelta {
            fabric_kind: FabricKind::BaseFabric,
            fabric_id: Uuid::new_v4(),
            quantity: dec("10"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_apply_returns_new_total() {
    let mill = mill().await;
    let delta = StockDelta {
        fabric_kind: FabricKind::FinishedFabric,
        fabric_id: mill.finished_fabric,
        quantity: dec("12.5"),
    };

    assert_eq!(mill.engine.stock.apply(delta).await.unwrap(), dec("12.5"));
    assert_eq!(mill.engine.stock.apply(delta).await.unwrap(), dec("25"));
}

#[tokio::test]
async fn test_recompute_from_active_rolls() {
    let mill = mill().await;
    let rolls = mill.allocated_rolls(dec("130")).await;
    assert_eq!(mill.stock(FabricKind::FinishedFabric).await, dec("130"));

    // Partially reserve one roll and damage another; neither path touches
    // the counter directly
    mill.engine
        .lifecycle
        .scan(ScanInput {
            tag: rolls[0].payload.tag().to_string(),
            scan_type: "receive".to_string(),
            scanned_by: "store-keeper".to_string(),
            location: None,
            notes: None,
        })
        .await
        .unwrap();
    mill.engine
        .lifecycle
        .allocate_length(&rolls[0].roll_number, dec("20"), None)
        .await
        .unwrap();
    mill.engine
        .lifecycle
        .mark_damaged(&rolls[2].roll_number, "crushed core", "qc-inspector")
        .await
        .unwrap();

    let total = mill
        .engine
        .stock
        .recompute_stock(FabricKind::FinishedFabric, mill.finished_fabric)
        .await
        .unwrap();

    // Roll 1: 50 - 20 reserved, roll 2: 50, roll 3 damaged
    assert_eq!(total, dec("80"));
    assert_eq!(mill.stock(FabricKind::FinishedFabric).await, dec("80"));
}

#[tokio::test]
async fn test_recompute_excludes_archived_rolls() {
    let mill = mill().await;
    mill.allocated_rolls(dec("100")).await;
    mill.engine
        .shipments
        .create_shipment(mill.customer_order, Default::default())
        .await
        .unwrap();

    let total = mill
        .engine
        .stock
        .recompute_stock(FabricKind::FinishedFabric, mill.finished_fabric)
        .await
        .unwrap();
    assert_eq!(total, Decimal::ZERO);
}

#[tokio::test]
async fn test_recompute_unknown_fabric() {
    let mill = mill().await;

    let err = mill
        .engine
        .stock
        .recompute_stock(FabricKind::BaseFabric, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
