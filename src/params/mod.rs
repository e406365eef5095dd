//! Request parameters and their defaults.
//!
//! ```text
//! built-in defaults  ◀──  persisted defaults  ◀──  request fields
//!   (serde default)        (PersistedConfig)        (non-null only)
//! ```
//!
//! - [`PersistedConfig`]: read-only defaults document loaded at startup
//! - [`ConfigResolver`]: merges a request into its endpoint's defaults
//! - [`Txt2ImgParams`], [`Img2ImgParams`], [`UpscaleParams`]: typed results

mod defaults;
mod resolve;
mod schema;

pub use defaults::{Endpoint, PersistedConfig, SAMPLE_PATH_KEY};
pub use resolve::{merge_defaults, ConfigResolver};
pub use schema::{
    Img2ImgParams, SamplingParams, Txt2ImgParams, UpscaleParams, IMG2IMG_MODE_INPAINT,
    IMG2IMG_MODE_NORMAL, NO_UPSCALER,
};
