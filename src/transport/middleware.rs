//! Encrypted-body middleware.
//!
//! When a request carries `X-Encrypted-Body: XOR`, its body is decrypted before
//! the handler sees it, and the response body is re-encrypted chunk by chunk on
//! the way out, with the same header attached.
//!
//! ```text
//! client ──XOR(body)──▶ middleware ──body──▶ handler
//! client ◀─XOR(resp)─── middleware ◀─resp─── handler
//! ```
//!
//! Requests without the header pass through untouched.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use http_body_util::LengthLimitError;
use tracing::{debug, warn};

use super::cipher::{transcode, EncryptionKey, XorStream};
use crate::error::TransportError;
use crate::server::ErrorResponse;

/// Header that marks an encrypted body.
pub const ENCRYPTED_BODY_HEADER: &str = "x-encrypted-body";

/// Default maximum size of an encrypted request body (100MB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

// =============================================================================
// Cipher Tag
// =============================================================================

/// Transcoding scheme named by the `X-Encrypted-Body` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherTag {
    /// Repeating-key XOR
    Xor,
}

impl CipherTag {
    /// Header value for this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherTag::Xor => "XOR",
        }
    }

    /// Parse a header value. Matching is exact.
    pub fn from_header(value: &HeaderValue) -> Result<Self, TransportError> {
        match value.to_str() {
            Ok("XOR") => Ok(CipherTag::Xor),
            Ok(other) => Err(TransportError::UnsupportedCipher {
                tag: other.to_string(),
            }),
            Err(_) => Err(TransportError::UnsupportedCipher {
                tag: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            }),
        }
    }
}

// =============================================================================
// Middleware State
// =============================================================================

/// State for [`encryption_middleware`].
#[derive(Debug, Clone)]
pub struct TransportState {
    /// Key used for both directions; `None` rejects encrypted requests
    pub key: Option<EncryptionKey>,

    /// Maximum encrypted request body size in bytes
    pub max_body_bytes: usize,
}

impl TransportState {
    pub fn new(key: Option<EncryptionKey>) -> Self {
        Self {
            key,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Axum middleware that decrypts request bodies and encrypts response bodies.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware};
/// use sd_bridge::transport::{encryption_middleware, TransportState};
///
/// let state = TransportState::new(EncryptionKey::new("secret"));
/// let app = Router::new()
///     .route("/txt2img", post(txt2img_handler))
///     .layer(middleware::from_fn_with_state(state, encryption_middleware));
/// ```
pub async fn encryption_middleware(
    State(state): State<TransportState>,
    request: Request,
    next: Next,
) -> Result<Response, TransportError> {
    let Some(value) = request.headers().get(ENCRYPTED_BODY_HEADER) else {
        return Ok(next.run(request).await);
    };

    let tag = CipherTag::from_header(value)?;
    let key = state.key.clone().ok_or(TransportError::MissingKey)?;

    let (parts, body) = request.into_parts();
    let ciphertext = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| {
            if is_length_limit(&e) {
                TransportError::PayloadTooLarge {
                    limit: state.max_body_bytes,
                }
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

    debug!(
        method = %parts.method,
        path = %parts.uri.path(),
        bytes = ciphertext.len(),
        "Decrypting request body"
    );

    let plaintext = transcode(&ciphertext, key.as_bytes());
    let request = Request::from_parts(parts, Body::from(plaintext));

    let response = next.run(request).await;
    Ok(encrypt_response(response, tag, key))
}

/// Whether a body read failed on the size limit rather than on I/O.
fn is_length_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Re-encrypt a response body stream and tag it with the cipher header.
///
/// The body is never collected; each data frame is transcoded as it passes,
/// continuing the keystream from the previous frame.
pub fn encrypt_response(response: Response, tag: CipherTag, key: EncryptionKey) -> Response {
    let (mut parts, body) = response.into_parts();
    parts
        .headers
        .insert(ENCRYPTED_BODY_HEADER, HeaderValue::from_static(tag.as_str()));

    let mut cipher = XorStream::new(key);
    let stream = body
        .into_data_stream()
        .map(move |chunk| chunk.map(|bytes| cipher.apply(&bytes)));

    Response::from_parts(parts, Body::from_stream(stream))
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            TransportError::UnsupportedCipher { .. } => {
                (StatusCode::BAD_REQUEST, "unsupported_cipher")
            }
            TransportError::MissingKey => (StatusCode::BAD_REQUEST, "missing_key"),
            TransportError::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large")
            }
            TransportError::Body(_) => (StatusCode::BAD_REQUEST, "invalid_body"),
        };
        let message = self.to_string();

        // A missing key is a server misconfiguration the operator should see
        match &self {
            TransportError::MissingKey => warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Encrypted request rejected: {}",
                message
            ),
            _ => debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Encrypted request rejected: {}",
                message
            ),
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Tests
// =============================================================================
