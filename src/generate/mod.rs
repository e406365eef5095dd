//! Generation entry points.
//!
//! [`GenerationService`] ties the pieces together for each endpoint: defaults
//! resolution, script marshalling, geometry, the engine call and the output
//! pipeline.

mod service;

pub use service::{
    GenerationService, ImageResponse, UpscaleResponse, DEFAULT_MAX_TARGET_PIXELS, SD_UPSCALE_SCRIPT,
};
