//! Roll state machine tests: scans, allocation, consumption, damage and
//! dispatch confirmation

mod common;

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use common::{dec, mill, Mill};
use mill_roll_backend::services::lifecycle::ScanInput;
use mill_roll_backend::AppError;
use shared::{ActiveRollFilter, FabricRoll, ProductionType, RollStatus, ScanType};

fn scan(roll: &FabricRoll, scan_type: &str) -> ScanInput {
    ScanInput {
        tag: roll.payload.tag().to_string(),
        scan_type: scan_type.to_string(),
        scanned_by: "store-keeper".to_string(),
        location: None,
        notes: None,
    }
}

async fn one_roll(mill: &Mill) -> FabricRoll {
    mill.rolls(ProductionType::Weaving, dec("50"))
        .await
        .remove(0)
}

// ============================================================================
// Scans
// ============================================================================

#[tokio::test]
async fn test_issue_then_history_scans() {
    let mill = mill().await;
    let roll = one_roll(&mill).await;
    let lifecycle = &mill.engine.lifecycle;

    let issued = lifecycle.scan(scan(&roll, "issue")).await.unwrap();
    assert_eq!(issued.roll.status, RollStatus::Allocated);
    assert_eq!(issued.record.previous_status, RollStatus::Available);

    let mut moved = scan(&roll, "move");
    moved.location = Some("RACK-B4".to_string());
    let moved = lifecycle.scan(moved).await.unwrap();
    assert_eq!(moved.roll.status, RollStatus::Allocated);
    assert_eq!(moved.roll.location.as_deref(), Some("RACK-B4"));

    let audited = lifecycle.scan(scan(&roll, "audit")).await.unwrap();
    assert_eq!(audited.roll.status, RollStatus::Allocated);

    let history = lifecycle.scan_history(&roll.roll_number).await.unwrap();
    let types: Vec<_> = history.iter().map(|h| h.scan_type).collect();
    assert_eq!(types, vec![ScanType::Issue, ScanType::Move, ScanType::Audit]);
    assert!(history[1..]
        .iter()
        .all(|h| h.previous_status == h.new_status));
}

#[tokio::test]
async fn test_receive_returns_roll_to_stock() {
    let mill = mill().await;
    let roll = one_roll(&mill).await;
    let lifecycle = &mill.engine.lifecycle;

    lifecycle.scan(scan(&roll, "issue")).await.unwrap();
    let received = lifecycle.scan(scan(&roll, "receive")).await.unwrap();
    assert_eq!(received.roll.status, RollStatus::Available);
}

#[tokio::test]
async fn test_unknown_scan_type_rejected_before_mutation() {
    let mill = mill().await;
    let roll = one_roll(&mill).await;
    let lifecycle = &mill.engine.lifecycle;

    let err = lifecycle.scan(scan(&roll, "teleport")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "scan_type"));

    let unchanged = lifecycle.get_roll(&roll.roll_number).await.unwrap();
    assert_eq!(unchanged.status, RollStatus::Available);
    assert_eq!(unchanged.updated_at, roll.updated_at);
    assert!(lifecycle
        .scan_history(&roll.roll_number)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_repeated_issue_is_rejected() {
    let mill = mill().await;
    let roll = one_roll(&mill).await;
    let lifecycle = &mill.engine.lifecycle;

    lifecycle.scan(scan(&roll, "issue")).await.unwrap();
    let err = lifecycle.scan(scan(&roll, "issue")).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidStateTransition(_)));
    assert_eq!(
        lifecycle.scan_history(&roll.roll_number).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_scan_with_unreadable_tag() {
    let mill = mill().await;
    let roll = one_roll(&mill).await;

    let mut input = scan(&roll, "issue");
    input.tag = "https://trace.mill.test/r/garbage".to_string();
    let err = mill.engine.lifecycle.scan(input).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidPayload(_)));
}

#[tokio::test]
async fn test_unknown_roll_is_not_found() {
    let mill = mill().await;

    let err = mill
        .engine
        .lifecycle
        .consume_roll("WV-20240101-001-R001")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============================================================================
// Allocation and consumption
// ============================================================================

#[tokio::test]
async fn test_allocate_roll_binds_order() {
    let mill = mill().await;
    let roll = one_roll(&mill).await;

    let allocated = mill
        .engine
        .lifecycle
        .allocate_roll(&roll.roll_number, mill.customer_order)
        .await
        .unwrap();

    assert_eq!(allocated.status, RollStatus::Allocated);
    assert_eq!(allocated.customer_order_id, Some(mill.customer_order));
    assert_eq!(allocated.color.as_deref(), Some(common::ORDER_COLOR));

    let consumed = mill
        .engine
        .lifecycle
        .consume_roll(&roll.roll_number)
        .await
        .unwrap();
    assert_eq!(consumed.status, RollStatus::Used);
    assert_eq!(consumed.remaining_length, Decimal::ZERO);
}

#[tokio::test]
async fn test_allocate_to_unknown_order() {
    let mill = mill().await;
    let roll = one_roll(&mill).await;

    let err = mill
        .engine
        .lifecycle
        .allocate_roll(&roll.roll_number, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_partial_allocation_until_exhausted() {
    let mill = mill().await;
    let roll = one_roll(&mill).await;
    let lifecycle = &mill.engine.lifecycle;

    let partial = lifecycle
        .allocate_length(&roll.roll_number, dec("20"), None)
        .await
        .unwrap();
    assert_eq!(partial.status, RollStatus::PartiallyAllocated);
    assert_eq!(partial.remaining_length, dec("30"));

    let err = lifecycle
        .allocate_length(&roll.roll_number, dec("31"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "length"));

    let full = lifecycle
        .allocate_length(&roll.roll_number, dec("30"), Some(mill.customer_order))
        .await
        .unwrap();
    assert_eq!(full.status, RollStatus::Allocated);
    assert_eq!(full.remaining_length, Decimal::ZERO);
    assert_eq!(full.customer_order_id, Some(mill.customer_order));
}

#[tokio::test]
async fn test_roll_bound_to_order_cannot_be_taken_by_another() {
    let mill = mill().await;
    let rolls = mill.rolls(ProductionType::Coating, dec("50")).await;

    // Coating rolls for the fixture order are already bound to it
    let other = Uuid::new_v4();
    mill.store
        .insert_customer_order(shared::CustomerOrder {
            id: other,
            order_number: "SO-2001".to_string(),
            customer_id: Uuid::new_v4(),
            color: None,
            status: shared::OrderStatus::Pending,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
        .await;

    let err = mill
        .engine
        .lifecycle
        .allocate_roll(&rolls[0].roll_number, other)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
}

// ============================================================================
// Damage and dispatch
// ============================================================================

#[tokio::test]
async fn test_damaged_roll_is_terminal() {
    let mill = mill().await;
    let roll = one_roll(&mill).await;
    let lifecycle = &mill.engine.lifecycle;

    let damaged = lifecycle
        .mark_damaged(&roll.roll_number, "water damage", "qc-inspector")
        .await
        .unwrap();
    assert_eq!(damaged.status, RollStatus::Damaged);

    let err = lifecycle.scan(scan(&roll, "issue")).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    let err = lifecycle
        .mark_damaged(&roll.roll_number, "again", "qc-inspector")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn test_damage_requires_reason() {
    let mill = mill().await;
    let roll = one_roll(&mill).await;

    let err = mill
        .engine
        .lifecycle
        .mark_damaged(&roll.roll_number, " ", "qc-inspector")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "reason"));
}

#[tokio::test]
async fn test_dispatch_is_lookup_then_confirm() {
    let mill = mill().await;
    let roll = one_roll(&mill).await;

    let found = mill
        .engine
        .traceability
        .lookup_by_reference(roll.payload.tag())
        .await
        .unwrap();
    assert_eq!(found.status, RollStatus::Available);
    assert!(!found.archived);

    let dispatched = mill
        .engine
        .lifecycle
        .confirm_dispatch(&found.roll_number)
        .await
        .unwrap();
    assert_eq!(dispatched.status, RollStatus::Shipped);
    assert!(dispatched.archived);

    let err = mill
        .engine
        .lifecycle
        .confirm_dispatch(&found.roll_number)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn test_active_view_hides_archived_rolls() {
    let mill = mill().await;
    let rolls = mill.rolls(ProductionType::Weaving, dec("150")).await;

    mill.engine
        .lifecycle
        .confirm_dispatch(&rolls[1].roll_number)
        .await
        .unwrap();

    let active = mill
        .engine
        .lifecycle
        .list_active_rolls(&ActiveRollFilter::default())
        .await
        .unwrap();
    let numbers: Vec<_> = active.iter().map(|r| r.roll_number.as_str()).collect();
    assert_eq!(
        numbers,
        vec![rolls[0].roll_number.as_str(), rolls[2].roll_number.as_str()]
    );

    let archived = mill
        .engine
        .lifecycle
        .get_roll(&rolls[1].roll_number)
        .await
        .unwrap();
    assert!(archived.archived);
}

// ============================================================================
// Property: lengths stay within bounds under any sequence of operations
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Reserve(i64),
    Issue,
    Receive,
    Audit,
    Consume,
    Damage,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..6_000).prop_map(Op::Reserve),
        Just(Op::Issue),
        Just(Op::Receive),
        Just(Op::Audit),
        Just(Op::Consume),
        Just(Op::Damage),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn prop_remaining_length_stays_in_bounds(ops in prop::collection::vec(op_strategy(), 1..12)) {
        let rolls = tokio_test::block_on(async {
            let mill = mill().await;
            let roll = one_roll(&mill).await;
            let lifecycle = &mill.engine.lifecycle;
            let mut seen = Vec::new();

            for op in ops {
                let result = match op {
                    Op::Reserve(cm) => lifecycle
                        .allocate_length(&roll.roll_number, Decimal::new(cm, 2), None)
                        .await,
                    Op::Issue => lifecycle.scan(scan(&roll, "issue")).await.map(|o| o.roll),
                    Op::Receive => lifecycle.scan(scan(&roll, "receive")).await.map(|o| o.roll),
                    Op::Audit => lifecycle.scan(scan(&roll, "audit")).await.map(|o| o.roll),
                    Op::Consume => lifecycle.consume_roll(&roll.roll_number).await,
                    Op::Damage => lifecycle
                        .mark_damaged(&roll.roll_number, "torn", "qc-inspector")
                        .await,
                };
                // Rejected operations are fine; the stored roll must still be sound
                let _ = result;
                seen.push(lifecycle.get_roll(&roll.roll_number).await.unwrap());
            }
            seen
        });

        for roll in &rolls {
            prop_assert!(roll.lengths_are_consistent(), "{:?}", roll);
        }
    }
}
