//! HTTP handler for tank sensor readings

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, AppResult};
use crate::models::{IotReading, NewReading};
use crate::services::ReadingService;
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "x-iot-signature";

type HmacSha256 = Hmac<Sha256>;

/// Ingest a sensor temperature reading
/// POST /iot/readings
///
/// Sensors sign the raw body with the shared secret instead of sending a JWT.
pub async fn ingest_iot_reading(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    if let Err(e) = verify_signature(&headers, &body, &state.config.iot.shared_secret) {
        tracing::warn!("IoT signature verification failed: {}", e);
        return Err(AppError::Unauthorized("Invalid signature".to_string()));
    }

    let payload: IotReading = serde_json::from_slice(&body).map_err(|e| AppError::Validation {
        field: "body".to_string(),
        message: format!("Invalid IoT payload: {}", e),
    })?;

    let reading = ReadingService::new(state.db.clone())
        .append_reading(
            payload.batch_id,
            NewReading::iot_temperature(payload.temperature, payload.recorded_at),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(reading)))
}

/// Check the base64 HMAC-SHA256 of `body` in the signature header
fn verify_signature(headers: &HeaderMap, body: &[u8], secret: &str) -> Result<(), String> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or("Missing x-iot-signature header")?;

    let provided = BASE64
        .decode(signature)
        .map_err(|_| "Signature is not valid base64")?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "Failed to create HMAC")?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| "Signature mismatch".to_string())
}
