//! # sd-bridge
//!
//! An HTTP adaptation layer between a stable, versioned image-generation API
//! and a diffusion engine that is driven by flat positional argument lists and
//! pluggable scripts.
//!
//! ## Features
//!
//! - **Encrypted bodies**: Optional repeating-key XOR envelope on requests and
//!   streamed responses, selected per request with `X-Encrypted-Body: XOR`
//! - **Script marshalling**: Named request fields and script arguments become
//!   the engine's positional frame, with every script's defaults in place
//! - **Layered defaults**: Persisted per-endpoint defaults under request fields
//! - **Highres geometry**: Aspect-preserving working size within a maximum
//! - **Output pipeline**: Grid stripping, Lanczos resize, inpaint mask
//!   recomposition and optional sample persistence
//!
//! ## Architecture
//!
//! - [`transport`] - XOR cipher and encrypted-body middleware
//! - [`params`] - Request schemas, persisted defaults and their merge
//! - [`scripts`] - Script registry and positional argument frames
//! - [`geometry`] - Working-size resolution
//! - [`engine`] - Generation engine trait and HTTP adapter
//! - [`output`] - Post-processing, persistence and base64 image codec
//! - [`generate`] - Per-endpoint orchestration
//! - [`server`] - Axum handlers and router
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use sd_bridge::{
//!     create_router, GenerationService, PersistedConfig, RemoteEngine, RouterConfig,
//!     ScriptRegistries,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = RemoteEngine::new("http://127.0.0.1:7860");
//!     let service = GenerationService::new(
//!         engine,
//!         PersistedConfig::default(),
//!         ScriptRegistries::empty(),
//!         "outputs/samples",
//!     );
//!     let router = create_router(service, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:7861").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod geometry;
pub mod output;
pub mod params;
pub mod scripts;
pub mod server;
pub mod transport;

pub use config::Config;
pub use engine::{EngineCapabilities, EngineOutput, GenerationEngine, RemoteEngine};
pub use error::{
    CodecError, DefaultsError, EngineError, GenerationError, PersistError, ScriptError,
    TransportError,
};
pub use generate::{GenerationService, ImageResponse, UpscaleResponse};
pub use geometry::GenerationGeometry;
pub use params::{ConfigResolver, Endpoint, PersistedConfig};
pub use scripts::{ArgumentFrame, ScriptArgs, ScriptKind, ScriptRegistries, ScriptRegistry};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use transport::{encryption_middleware, transcode, EncryptionKey, XorStream};
