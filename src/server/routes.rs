//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /health      - Health check
//! /config      - Capability document
//! /txt2img     - Text-to-image
//! /img2img     - Image-to-image / inpaint
//! /upscale     - Upscale
//! ```
//!
//! Every route sits behind the encrypted-body middleware, so clients may
//! encrypt any request, including health checks.
//!
//! # Example
//!
//! ```ignore
//! use sd_bridge::engine::RemoteEngine;
//! use sd_bridge::generate::GenerationService;
//! use sd_bridge::server::{create_router, RouterConfig};
//!
//! let service = GenerationService::new(engine, defaults, registries, "outputs/samples");
//! let config = RouterConfig::new().with_encryption_key(key);
//!
//! let router = create_router(service, config);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7861").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{HeaderName, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    config_handler, health_handler, img2img_handler, txt2img_handler, upscale_handler, AppState,
};
use crate::engine::GenerationEngine;
use crate::generate::GenerationService;
use crate::transport::{
    encryption_middleware, EncryptionKey, TransportState, DEFAULT_MAX_BODY_BYTES,
    ENCRYPTED_BODY_HEADER,
};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Shared key for encrypted bodies (None = encrypted requests rejected)
    pub encryption_key: Option<EncryptionKey>,

    /// Maximum request body size in bytes
    pub max_body_bytes: usize,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - No encryption key
    /// - 100MB body limit
    /// - CORS allows any origin
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            encryption_key: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Set the shared key for encrypted bodies.
    pub fn with_encryption_key(mut self, key: EncryptionKey) -> Self {
        self.encryption_key = Some(key);
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Health, config and generation routes
/// - Encrypted-body middleware
/// - Body size limit
/// - CORS configuration
/// - Request tracing (optional)
pub fn create_router<E>(service: GenerationService<E>, config: RouterConfig) -> Router
where
    E: GenerationEngine + 'static,
{
    let app_state = AppState::new(service);
    let transport = TransportState::new(config.encryption_key.clone())
        .with_max_body_bytes(config.max_body_bytes);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/config", get(config_handler::<E>))
        .route("/txt2img", post(txt2img_handler::<E>))
        .route("/img2img", post(img2img_handler::<E>))
        .route("/upscale", post(upscale_handler::<E>))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(middleware::from_fn_with_state(
            transport,
            encryption_middleware,
        ))
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(ENCRYPTED_BODY_HEADER)])
        .expose_headers([HeaderName::from_static(ENCRYPTED_BODY_HEADER)])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
