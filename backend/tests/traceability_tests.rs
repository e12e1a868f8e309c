//! Traceability codec tests: direct and legacy tags, tamper detection and
//! read-only lookups

mod common;

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use common::{dec, mill, mill_with, CUSTOMER_NAME, CUSTOMER_ORDER_NUMBER, LOOKUP_BASE_URL};
use mill_roll_backend::config::{PayloadFormat, TraceabilityConfig};
use mill_roll_backend::services::traceability::{DecodedTag, LEGACY_TAG_PREFIX};
use mill_roll_backend::services::TraceabilityService;
use mill_roll_backend::{AppError, FabricStore};
use shared::{PayloadEncoding, ProductionType, RollStatus};

// ============================================================================
// Direct form
// ============================================================================

#[tokio::test]
async fn test_direct_tag_is_lookup_url() {
    let mill = mill().await;
    let roll = mill.rolls(ProductionType::Weaving, dec("50")).await.remove(0);

    let PayloadEncoding::Direct {
        reference,
        lookup_url,
    } = &roll.payload.encoding
    else {
        panic!("expected a direct payload");
    };
    assert_eq!(lookup_url, &format!("{}/r/{}", LOOKUP_BASE_URL, reference));
    assert_eq!(roll.payload.tag(), lookup_url);

    let traceability = &mill.engine.traceability;
    let expected = DecodedTag::Direct {
        roll_number: roll.roll_number.clone(),
    };
    assert_eq!(traceability.decode_tag(lookup_url).unwrap(), expected);
    assert_eq!(traceability.decode_tag(reference).unwrap(), expected);
    assert_eq!(
        traceability
            .decode_tag(&format!("  {}\n", reference))
            .unwrap(),
        expected
    );
}

#[tokio::test]
async fn test_tampered_reference_is_rejected() {
    let mill = mill().await;
    let roll = mill.rolls(ProductionType::Weaving, dec("100")).await.remove(0);
    let PayloadEncoding::Direct { reference, .. } = &roll.payload.encoding else {
        panic!("expected a direct payload");
    };
    let (_, signature) = reference.split_once('.').unwrap();

    // Point the signed reference at another roll number
    let forged = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(format!("{}X", roll.roll_number)),
        signature
    );
    let err = mill.engine.traceability.decode_tag(&forged).unwrap_err();
    assert!(matches!(err, AppError::InvalidPayload(_)));

    for garbage in ["", "   ", "no-separator", "abc.!!!", "abc.c2ln"] {
        let err = mill.engine.traceability.decode_tag(garbage).unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)), "{:?}", garbage);
    }
}

#[tokio::test]
async fn test_reference_signed_with_another_secret_is_rejected() {
    let mill = mill().await;
    let roll = mill.rolls(ProductionType::Weaving, dec("50")).await.remove(0);

    let other = TraceabilityService::new(
        mill.store.clone() as Arc<dyn FabricStore>,
        TraceabilityConfig {
            lookup_base_url: LOOKUP_BASE_URL.to_string(),
            signing_secret: "another-secret".to_string(),
            payload_format: PayloadFormat::Direct,
        },
    );

    let err = other.decode_tag(roll.payload.tag()).unwrap_err();
    assert!(matches!(err, AppError::InvalidPayload(_)));
}

// ============================================================================
// Legacy form
// ============================================================================

#[tokio::test]
async fn test_legacy_tag_carries_payload_fields() {
    let mill = mill_with(PayloadFormat::Legacy).await;
    let roll = mill.rolls(ProductionType::Coating, dec("50")).await.remove(0);

    let tag = roll.payload.tag();
    assert!(tag.starts_with(LEGACY_TAG_PREFIX));

    match mill.engine.traceability.decode_tag(tag).unwrap() {
        DecodedTag::Legacy(data) => {
            assert_eq!(data, roll.payload.data);
            let order = data.customer_order.unwrap();
            assert_eq!(order.order_number, CUSTOMER_ORDER_NUMBER);
        }
        other => panic!("expected legacy tag, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_legacy_tag() {
    let mill = mill_with(PayloadFormat::Legacy).await;

    for tag in ["MRT0:", "MRT0:***", "MRT0:e30"] {
        let err = mill.engine.traceability.decode_tag(tag).unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)), "{:?}", tag);
    }
}

#[tokio::test]
async fn test_legacy_tags_scan_like_direct_ones() {
    let mill = mill_with(PayloadFormat::Legacy).await;
    let roll = mill.rolls(ProductionType::Weaving, dec("50")).await.remove(0);

    let found = mill
        .engine
        .traceability
        .lookup_by_reference(roll.payload.tag())
        .await
        .unwrap();
    assert_eq!(found.id, roll.id);
}

// ============================================================================
// Lookups
// ============================================================================

#[tokio::test]
async fn test_lookup_by_reference_is_read_only() {
    let mill = mill().await;
    let roll = mill.rolls(ProductionType::Weaving, dec("50")).await.remove(0);

    for _ in 0..3 {
        let found = mill
            .engine
            .traceability
            .lookup_by_reference(roll.payload.tag())
            .await
            .unwrap();
        assert_eq!(found.roll_number, roll.roll_number);
    }

    let stored = mill.engine.lifecycle.get_roll(&roll.roll_number).await.unwrap();
    assert_eq!(stored.status, RollStatus::Available);
    assert!(!stored.archived);
    assert_eq!(stored.updated_at, roll.updated_at);
}

#[tokio::test]
async fn test_lookup_of_missing_roll() {
    let mill = mill().await;
    let roll = mill.rolls(ProductionType::Weaving, dec("50")).await.remove(0);

    // A validly signed reference from another mill's database
    let elsewhere = mill_with(PayloadFormat::Direct).await;
    let err = elsewhere
        .engine
        .traceability
        .lookup_by_reference(roll.payload.tag())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_roll_details_resolve_names() {
    let mill = mill().await;
    let roll = mill.rolls(ProductionType::Coating, dec("50")).await.remove(0);

    let details = mill
        .engine
        .traceability
        .get_roll_details(&roll.roll_number)
        .await
        .unwrap();

    assert_eq!(details.roll.id, roll.id);
    assert_eq!(details.batch_number, roll.payload.data.batch_number);
    assert_eq!(details.production_type, ProductionType::Coating);
    assert_eq!(details.fabric_name.as_deref(), Some("PVC Coated Canvas 650"));
    assert_eq!(details.order_number.as_deref(), Some(CUSTOMER_ORDER_NUMBER));
    assert_eq!(details.customer_name.as_deref(), Some(CUSTOMER_NAME));
}

#[tokio::test]
async fn test_stock_roll_details_have_no_order() {
    let mill = mill().await;
    let roll = mill.rolls(ProductionType::Weaving, dec("50")).await.remove(0);

    let details = mill
        .engine
        .traceability
        .get_roll_details(&roll.roll_number)
        .await
        .unwrap();
    assert_eq!(details.fabric_name.as_deref(), Some("Greige Polyester 280"));
    assert_eq!(details.order_number, None);
    assert_eq!(details.customer_name, None);
}
