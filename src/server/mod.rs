//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        POST /txt2img · /img2img · /upscale    GET /config       │
//! │                                                                 │
//! │  ┌─────────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   transport     │  │  handlers   │  │       routes        │  │
//! │  │ (XOR envelope)  │  │ (requests)  │  │  (router config)    │  │
//! │  └─────────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    config_handler, health_handler, img2img_handler, txt2img_handler, upscale_handler, AppState,
    ErrorResponse, HealthResponse,
};
pub use routes::{create_router, RouterConfig};
