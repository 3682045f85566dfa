//! HTTP request handlers.

use super::types::{
    AckResponse, CheckSecretRequest, CheckSecretResponse, ExchangeKeysRequest,
    ExchangeKeysResponse, FindDeviceRequest, FindDeviceResponse, HealthResponse,
    RegisterDeviceRequest, SecretByIdentifiersRequest, SecretByPhonesRequest, SecretResponse,
    StoreSecretRequest, ValidatedJson,
};
use super::AppState;
use crate::error::ExchangeError;
use crate::secrets::NewSharedSecret;
use axum::{extract::State, Json};
use tracing::{debug, info};

/// Borrow an optional request field, treating absence as empty.
fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ExchangeError> {
    let device_count = state.registry.count().await?;
    let secret_count = state.secrets.count().await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        device_count,
        secret_count,
    }))
}

/// Register or update a device.
pub async fn register_device(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterDeviceRequest>,
) -> Result<Json<AckResponse>, ExchangeError> {
    info!(identifier = ?request.identifier, "Device registration request received");

    state
        .registry
        .register_device(
            field(&request.identifier),
            field(&request.registration_code),
            field(&request.phone_number),
        )
        .await?;

    Ok(Json(AckResponse::ok()))
}

/// Look up a device identifier by phone number.
pub async fn find_device(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<FindDeviceRequest>,
) -> Result<Json<FindDeviceResponse>, ExchangeError> {
    let identifier = state
        .registry
        .find_by_phone(field(&request.search_value))
        .await?;

    Ok(Json(FindDeviceResponse { identifier }))
}

/// Start a key exchange with the device behind a phone number.
pub async fn exchange_keys(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ExchangeKeysRequest>,
) -> Result<Json<ExchangeKeysResponse>, ExchangeError> {
    if request.receiver_identifier.is_some() {
        debug!("Ignoring receiverIdentifier; target is resolved by phone number");
    }

    let result = state
        .coordinator
        .initiate_exchange(
            field(&request.sender_identifier),
            field(&request.sender_public_key),
            field(&request.target_phone_number),
        )
        .await?;

    Ok(Json(ExchangeKeysResponse {
        success: true,
        target_identifier: result.target_identifier,
        target_public_key: result.target_public_key,
        target_phone: result.target_phone,
    }))
}

/// Store a secret agreed out of band.
pub async fn store_secret(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<StoreSecretRequest>,
) -> Result<Json<AckResponse>, ExchangeError> {
    state
        .secrets
        .store_secret(NewSharedSecret {
            sender_identifier: field(&request.sender_identifier),
            sender_phone: request.sender_phone.as_deref(),
            receiver_identifier: field(&request.receiver_identifier),
            receiver_phone: request.receiver_phone.as_deref(),
            shared_secret: field(&request.shared_secret),
        })
        .await?;

    Ok(Json(AckResponse::ok()))
}

/// Fetch a secret by ordered identifier pair.
pub async fn secret_by_identifiers(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SecretByIdentifiersRequest>,
) -> Result<Json<SecretResponse>, ExchangeError> {
    let data = state
        .secrets
        .get_by_identifiers(
            field(&request.sender_identifier),
            field(&request.receiver_identifier),
        )
        .await?;

    Ok(Json(SecretResponse {
        success: true,
        data,
    }))
}

/// Fetch a secret by ordered phone pair.
pub async fn secret_by_phones(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SecretByPhonesRequest>,
) -> Result<Json<SecretResponse>, ExchangeError> {
    let data = state
        .secrets
        .get_by_phones(field(&request.sender_phone), field(&request.receiver_phone))
        .await?;

    Ok(Json(SecretResponse {
        success: true,
        data,
    }))
}

/// Check whether two phones share a secret in either direction.
pub async fn check_secret(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CheckSecretRequest>,
) -> Result<Json<CheckSecretResponse>, ExchangeError> {
    let data = state
        .secrets
        .exists_for_pair(field(&request.phone_a), field(&request.phone_b))
        .await?;

    Ok(Json(CheckSecretResponse {
        exists: data.is_some(),
        data,
    }))
}
