use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Item, ItemId, OwnerId, normalize_sku};

const DATA_URL_PREFIX: &str = "data:application/json;base64,";

/// What a printed QR label carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrData {
    pub id: ItemId,
    pub sku: String,
    pub name: String,
    #[serde(rename = "userId")]
    pub owner: OwnerId,
}

impl QrData {
    pub fn for_item(item: &Item) -> Self {
        Self {
            id: item.id,
            sku: item.sku.clone(),
            name: item.name.clone(),
            owner: item.owner,
        }
    }
}

#[derive(Error, Debug)]
pub enum QrError {
    #[error("Failed to encode QR payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("QR payload is empty")]
    Empty,

    #[error("Malformed QR payload: {0}")]
    Malformed(String),
}

/// Turns label data into an opaque payload and scanned payloads back into a
/// SKU. Rendering the payload as an image is left to the caller.
pub trait QrCodec: Send + Sync {
    fn encode(&self, data: &QrData) -> Result<String, QrError>;

    fn decode(&self, payload: &str) -> Result<String, QrError>;
}

/// Default codec: JSON wrapped in a base64 data URL.
///
/// Decoding also takes the bare JSON a camera scanner reads off a label, and
/// falls back to treating anything else as a typed-in SKU.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonQrCodec;

#[derive(Deserialize)]
struct ScannedLabel {
    sku: String,
}

impl JsonQrCodec {
    fn sku_from_json(json: &[u8]) -> Result<String, QrError> {
        let label: ScannedLabel =
            serde_json::from_slice(json).map_err(|e| QrError::Malformed(e.to_string()))?;
        let sku = normalize_sku(&label.sku);
        if sku.is_empty() {
            return Err(QrError::Malformed("label has an empty SKU".to_string()));
        }
        Ok(sku)
    }
}

impl QrCodec for JsonQrCodec {
    fn encode(&self, data: &QrData) -> Result<String, QrError> {
        let json = serde_json::to_vec(data).map_err(QrError::Encode)?;
        Ok(format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(json)))
    }

    fn decode(&self, payload: &str) -> Result<String, QrError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(QrError::Empty);
        }

        if let Some(encoded) = payload.strip_prefix(DATA_URL_PREFIX) {
            let json = STANDARD
                .decode(encoded)
                .map_err(|e| QrError::Malformed(e.to_string()))?;
            return Self::sku_from_json(&json);
        }

        if payload.starts_with('{') {
            return Self::sku_from_json(payload.as_bytes());
        }

        Ok(normalize_sku(payload))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::NewItem;

    #[test]
    fn test_encoded_payload_decodes_to_sku() {
        let item = Item::new(Uuid::new_v4(), NewItem::new("a-1", "Widget", 3, "Shelf"));
        let codec = JsonQrCodec;

        let payload = codec.encode(&QrData::for_item(&item)).unwrap();
        assert!(payload.starts_with("data:application/json;base64,"));
        assert_eq!(codec.decode(&payload).unwrap(), "A-1");
    }

    #[test]
    fn test_payload_uses_label_field_names() {
        let data = QrData {
            id: Uuid::new_v4(),
            sku: "A-1".into(),
            name: "Widget".into(),
            owner: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("owner").is_none());
    }

    #[test]
    fn test_decodes_raw_json_and_plain_sku() {
        let codec = JsonQrCodec;
        assert_eq!(
            codec.decode(r#"{"sku":"b-2","name":"Bolt"}"#).unwrap(),
            "B-2"
        );
        assert_eq!(codec.decode("  c-3 ").unwrap(), "C-3");
    }

    #[test]
    fn test_rejects_garbage() {
        let codec = JsonQrCodec;
        assert!(matches!(codec.decode("   "), Err(QrError::Empty)));
        assert!(matches!(
            codec.decode("data:application/json;base64,***"),
            Err(QrError::Malformed(_))
        ));
        assert!(matches!(
            codec.decode(r#"{"name":"no sku"}"#),
            Err(QrError::Malformed(_))
        ));
    }
}
