//! API request and response types.
//!
//! Request fields are optional at the serde level so that a missing field is
//! reported as a validation error rather than a body rejection.

use crate::error::ExchangeError;
use crate::secrets::SharedSecretRecord;
use axum::extract::FromRequest;
use serde::{Deserialize, Serialize};

/// JSON body extractor whose rejections use the service error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ExchangeError))]
pub struct ValidatedJson<T>(pub T);

/// Request to register or update a device.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    pub identifier: Option<String>,
    pub registration_code: Option<String>,
    pub phone_number: Option<String>,
}

/// Request to look up a device by phone number.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindDeviceRequest {
    /// Phone number, with or without the leading `+`
    pub search_value: Option<String>,
}

/// Response carrying the identifier of a found device.
#[derive(Debug, Serialize)]
pub struct FindDeviceResponse {
    pub identifier: String,
}

/// Request to start a key exchange.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeKeysRequest {
    pub sender_identifier: Option<String>,

    /// Accepted for client compatibility; the target is resolved by phone.
    pub receiver_identifier: Option<String>,

    /// Sender's uncompressed secp256k1 public key as hex
    pub sender_public_key: Option<String>,

    pub target_phone_number: Option<String>,
}

/// Response after a successful key exchange.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeKeysResponse {
    pub success: bool,
    pub target_identifier: String,
    pub target_public_key: String,
    pub target_phone: String,
}

/// Request to store an agreed secret.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSecretRequest {
    pub sender_identifier: Option<String>,
    pub sender_phone: Option<String>,
    pub receiver_identifier: Option<String>,
    pub receiver_phone: Option<String>,
    pub shared_secret: Option<String>,
}

/// Request to fetch a secret by ordered identifier pair.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretByIdentifiersRequest {
    pub sender_identifier: Option<String>,
    pub receiver_identifier: Option<String>,
}

/// Request to fetch a secret by ordered phone pair.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretByPhonesRequest {
    pub sender_phone: Option<String>,
    pub receiver_phone: Option<String>,
}

/// Request to check for a secret between two phones in either direction.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSecretRequest {
    pub phone_a: Option<String>,
    pub phone_b: Option<String>,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// A single shared-secret record.
#[derive(Debug, Serialize)]
pub struct SecretResponse {
    pub success: bool,
    pub data: SharedSecretRecord,
}

/// Result of an order-independent existence check.
#[derive(Debug, Serialize)]
pub struct CheckSecretResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SharedSecretRecord>,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub device_count: usize,
    pub secret_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_request_field_names() {
        let json = r#"{
            "senderIdentifier": "dev-1",
            "receiverIdentifier": "ignored",
            "senderPublicKey": "04ab",
            "targetPhoneNumber": "+2000"
        }"#;

        let request: ExchangeKeysRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.sender_identifier.as_deref(), Some("dev-1"));
        assert_eq!(request.sender_public_key.as_deref(), Some("04ab"));
        assert_eq!(request.target_phone_number.as_deref(), Some("+2000"));
    }

    #[test]
    fn test_missing_fields_deserialize_as_none() {
        let request: RegisterDeviceRequest = serde_json::from_str("{}").unwrap();
        assert!(request.identifier.is_none());
        assert!(request.registration_code.is_none());
        assert!(request.phone_number.is_none());
    }

    #[test]
    fn test_check_response_omits_missing_record() {
        let json = serde_json::to_value(CheckSecretResponse {
            exists: false,
            data: None,
        })
        .unwrap();

        assert_eq!(json, serde_json::json!({ "exists": false }));
    }
}
