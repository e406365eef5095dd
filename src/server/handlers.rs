//! HTTP request handlers.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /config` - Defaults, engine capabilities and script metadata
//! - `POST /txt2img` - Text-to-image generation
//! - `POST /img2img` - Image-to-image generation and inpainting
//! - `POST /upscale` - Upscale an image back to its original size
//!
//! Generation endpoints read the raw body and parse it themselves so that
//! malformed JSON produces the same structured error body as every other
//! failure.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::engine::GenerationEngine;
use crate::error::{GenerationError, ScriptError};
use crate::generate::{GenerationService, ImageResponse, UpscaleResponse};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the generation service.
pub struct AppState<E: GenerationEngine> {
    pub service: Arc<GenerationService<E>>,
}

impl<E: GenerationEngine> AppState<E> {
    pub fn new(service: GenerationService<E>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl<E: GenerationEngine> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "script_not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

fn error_response(status: StatusCode, error_type: &'static str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let error_response = ErrorResponse::with_status(error_type, message, status);
    (status, Json(error_response)).into_response()
}

/// Convert ScriptError to HTTP response.
///
/// An unknown script is a 404; arguments that do not fit the script are a 400.
impl IntoResponse for ScriptError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ScriptError::NotFound { .. } => (StatusCode::NOT_FOUND, "script_not_found"),
            ScriptError::ArityMismatch { .. } | ScriptError::UnknownArgument { .. } => {
                (StatusCode::BAD_REQUEST, "argument_arity_mismatch")
            }
        };
        error_response(status, error_type, self.to_string())
    }
}

/// Convert GenerationError to HTTP response.
///
/// - 4xx errors are logged at WARN level (client errors)
/// - 5xx errors are logged at ERROR level (engine and encoding failures)
impl IntoResponse for GenerationError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            GenerationError::Script(err) => return err.clone().into_response(),
            GenerationError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
            GenerationError::InvalidImage { .. } => (StatusCode::BAD_REQUEST, "invalid_image"),
            GenerationError::Engine(_) => (StatusCode::INTERNAL_SERVER_ERROR, "engine_error"),
            GenerationError::Encode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
        };
        error_response(status, error_type, self.to_string())
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Parse a request body as a JSON value. An empty body is an empty object.
fn parse_payload(body: &Bytes) -> Result<Value, GenerationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body)
        .map_err(|e| GenerationError::invalid_request(format!("Invalid JSON body: {}", e)))
}

/// Handle capability document requests.
///
/// # Endpoint
///
/// `GET /config`
pub async fn config_handler<E: GenerationEngine>(
    State(state): State<AppState<E>>,
) -> Result<Json<Map<String, Value>>, GenerationError> {
    Ok(Json(state.service.config_document().await?))
}

/// Handle text-to-image requests.
///
/// # Endpoint
///
/// `POST /txt2img`
///
/// # Response
///
/// `200 OK` with `{"outputs": ["<base64 png>", ...], "info": "..."}`
pub async fn txt2img_handler<E: GenerationEngine>(
    State(state): State<AppState<E>>,
    body: Bytes,
) -> Result<Json<ImageResponse>, GenerationError> {
    let payload = parse_payload(&body)?;
    Ok(Json(state.service.txt2img(&payload).await?))
}

/// Handle image-to-image requests.
///
/// # Endpoint
///
/// `POST /img2img`
pub async fn img2img_handler<E: GenerationEngine>(
    State(state): State<AppState<E>>,
    body: Bytes,
) -> Result<Json<ImageResponse>, GenerationError> {
    let payload = parse_payload(&body)?;
    Ok(Json(state.service.img2img(&payload).await?))
}

/// Handle upscale requests.
///
/// # Endpoint
///
/// `POST /upscale`
///
/// # Response
///
/// `200 OK` with `{"output": "<base64 png>"}`
pub async fn upscale_handler<E: GenerationEngine>(
    State(state): State<AppState<E>>,
    body: Bytes,
) -> Result<Json<UpscaleResponse>, GenerationError> {
    let payload = parse_payload(&body)?;
    Ok(Json(state.service.upscale(&payload).await?))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
