//! Traceability tag codec and roll lookups
//!
//! A roll's tag takes one of two forms:
//!
//! - direct: `{lookup_base_url}/r/{reference}` where the reference is
//!   `base64url(roll_number) "." base64url(hmac)`; the HMAC-SHA256 signature
//!   is truncated to [`SIGNATURE_BYTES`]
//! - legacy: `MRT0:` followed by base64url JSON of the payload fields
//!
//! Decoding never touches the store. [`TraceabilityService::lookup_by_reference`]
//! resolves a tag to its roll without changing it; dispatch is a separate
//! command on the lifecycle service.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine as _};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::config::{PayloadFormat, TraceabilityConfig};
use crate::error::{AppError, AppResult};
use crate::store::FabricStore;
use shared::{FabricRoll, PayloadData, PayloadEncoding, ProductionType, TraceabilityPayload};

type HmacSha256 = Hmac<Sha256>;

/// Prefix identifying the self-describing tag form
pub const LEGACY_TAG_PREFIX: &str = "MRT0:";

/// Bytes of the HMAC kept in a direct reference
pub const SIGNATURE_BYTES: usize = 12;

const LOOKUP_PATH: &str = "/r/";

/// Result of decoding a tag
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedTag {
    /// Signed reference; the roll must be fetched from the store
    Direct { roll_number: String },
    /// Self-describing copy of the payload fields
    Legacy(PayloadData),
}

impl DecodedTag {
    pub fn roll_number(&self) -> &str {
        match self {
            DecodedTag::Direct { roll_number } => roll_number,
            DecodedTag::Legacy(data) => &data.roll_number,
        }
    }
}

/// Roll with its related names resolved through the store
#[derive(Debug, Clone, Serialize)]
pub struct RollDetails {
    pub roll: FabricRoll,
    pub batch_number: String,
    pub production_type: ProductionType,
    pub fabric_name: Option<String>,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
}

#[derive(Clone)]
pub struct TraceabilityService {
    store: Arc<dyn FabricStore>,
    config: TraceabilityConfig,
}

impl TraceabilityService {
    pub fn new(store: Arc<dyn FabricStore>, config: TraceabilityConfig) -> Self {
        Self { store, config }
    }

    /// Build the payload embedded on a roll, in the configured tag form
    pub fn encode(&self, data: PayloadData) -> AppResult<TraceabilityPayload> {
        let encoding = match self.config.payload_format {
            PayloadFormat::Direct => {
                let reference = self.sign_reference(&data.roll_number)?;
                let lookup_url = format!(
                    "{}{}{}",
                    self.config.lookup_base_url.trim_end_matches('/'),
                    LOOKUP_PATH,
                    reference
                );
                PayloadEncoding::Direct {
                    reference,
                    lookup_url,
                }
            }
            PayloadFormat::Legacy => PayloadEncoding::Legacy {
                data: encode_legacy(&data)?,
            },
        };

        Ok(TraceabilityPayload { data, encoding })
    }

    /// Decode a scanned tag: a full lookup URL, a bare direct reference or a
    /// legacy string
    pub fn decode_tag(&self, tag: &str) -> AppResult<DecodedTag> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(AppError::InvalidPayload("tag is empty".to_string()));
        }

        if let Some(encoded) = tag.strip_prefix(LEGACY_TAG_PREFIX) {
            return decode_legacy(encoded).map(DecodedTag::Legacy);
        }

        let reference = match tag.rsplit_once(LOOKUP_PATH) {
            Some((_, reference)) => reference,
            None => tag,
        };

        let roll_number = self.verify_reference(reference)?;
        Ok(DecodedTag::Direct { roll_number })
    }

    /// Resolve a tag to its roll. Read-only.
    pub async fn lookup_by_reference(&self, tag: &str) -> AppResult<FabricRoll> {
        let decoded = self.decode_tag(tag)?;
        let roll_number = decoded.roll_number();

        self.store
            .get_roll(roll_number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Roll {}", roll_number)))
    }

    /// Roll plus batch, fabric, order and customer names
    pub async fn get_roll_details(&self, roll_number: &str) -> AppResult<RollDetails> {
        let roll = self
            .store
            .get_roll(roll_number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Roll {}", roll_number)))?;

        let batch = self
            .store
            .get_batch(roll.batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", roll.batch_id)))?;

        let fabric_name = self
            .store
            .get_fabric(roll.fabric_kind, roll.fabric_id)
            .await?
            .map(|f| f.name);

        let (order_number, customer_name) = match roll.customer_order_id {
            Some(order_id) => match self.store.get_customer_order(order_id).await? {
                Some(order) => {
                    let customer = self.store.get_customer(order.customer_id).await?;
                    (Some(order.order_number), customer.map(|c| c.name))
                }
                None => (None, None),
            },
            None => (None, None),
        };

        Ok(RollDetails {
            batch_number: batch.batch_number,
            production_type: batch.production_type,
            roll,
            fabric_name,
            order_number,
            customer_name,
        })
    }

    fn mac(&self) -> AppResult<HmacSha256> {
        HmacSha256::new_from_slice(self.config.signing_secret.as_bytes())
            .map_err(|_| AppError::Configuration("invalid traceability signing secret".to_string()))
    }

    fn sign_reference(&self, roll_number: &str) -> AppResult<String> {
        let mut mac = self.mac()?;
        mac.update(roll_number.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            BASE64URL.encode(roll_number.as_bytes()),
            BASE64URL.encode(&signature[..SIGNATURE_BYTES])
        ))
    }

    fn verify_reference(&self, reference: &str) -> AppResult<String> {
        let (id_part, sig_part) = reference
            .split_once('.')
            .ok_or_else(|| AppError::InvalidPayload("malformed lookup reference".to_string()))?;

        let roll_bytes = BASE64URL
            .decode(id_part)
            .map_err(|_| AppError::InvalidPayload("malformed lookup reference".to_string()))?;
        let signature = BASE64URL
            .decode(sig_part)
            .map_err(|_| AppError::InvalidPayload("malformed reference signature".to_string()))?;

        if signature.len() != SIGNATURE_BYTES {
            return Err(AppError::InvalidPayload(
                "malformed reference signature".to_string(),
            ));
        }

        let mut mac = self.mac()?;
        mac.update(&roll_bytes);
        mac.verify_truncated_left(&signature)
            .map_err(|_| AppError::InvalidPayload("reference signature mismatch".to_string()))?;

        String::from_utf8(roll_bytes)
            .map_err(|_| AppError::InvalidPayload("roll number is not UTF-8".to_string()))
    }
}

fn encode_legacy(data: &PayloadData) -> AppResult<String> {
    let json = serde_json::to_vec(data)
        .map_err(|e| AppError::Internal(format!("failed to serialise payload: {}", e)))?;
    Ok(format!("{}{}", LEGACY_TAG_PREFIX, BASE64URL.encode(json)))
}

fn decode_legacy(encoded: &str) -> AppResult<PayloadData> {
    let json = BASE64URL
        .decode(encoded)
        .map_err(|_| AppError::InvalidPayload("legacy tag is not base64url".to_string()))?;
    serde_json::from_slice(&json)
        .map_err(|e| AppError::InvalidPayload(format!("legacy tag content: {}", e)))
}
