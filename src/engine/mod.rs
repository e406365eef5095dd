//! Generation engine seam.
//!
//! The engine that actually runs diffusion lives outside this crate. It is
//! reached through the [`GenerationEngine`] trait, which takes fully marshalled
//! calls: a sampler index instead of a name, resolved geometry, and the
//! positional script [`ArgumentFrame`].
//!
//! [`RemoteEngine`] forwards calls to an upstream worker over HTTP. Tests plug
//! in an in-memory engine instead.

mod remote;

use async_trait::async_trait;
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::geometry::GenerationGeometry;
use crate::params::SamplingParams;
use crate::scripts::{ArgumentFrame, ScriptKind, ScriptSpec};

pub use remote::RemoteEngine;

/// Mask mode passed with every img2img call: uploaded mask, alpha removes.
pub const UPLOADED_MASK_MODE: u32 = 1;

/// What the engine can currently do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineCapabilities {
    pub samplers: Vec<String>,
    pub samplers_img2img: Vec<String>,
    pub upscalers: Vec<String>,
    pub face_restorers: Vec<String>,
    pub sd_models: Vec<String>,
}

impl EngineCapabilities {
    /// Position of `name` in the sampler list for `kind`.
    pub fn sampler_index(&self, name: &str, kind: ScriptKind) -> Option<usize> {
        let samplers = match kind {
            ScriptKind::Img2Img if !self.samplers_img2img.is_empty() => &self.samplers_img2img,
            _ => &self.samplers,
        };
        samplers.iter().position(|s| s == name)
    }
}

/// Sampling arguments common to both generation calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingArgs {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub sampler_index: usize,
    pub restore_faces: bool,
    pub tiling: bool,
    pub n_iter: u32,
    pub batch_size: u32,
    pub cfg_scale: f64,
    pub seed: i64,
    pub subseed: i64,
    pub subseed_strength: f64,
    pub seed_resize_from_h: i64,
    pub seed_resize_from_w: i64,
    pub seed_enable_extras: bool,
    pub height: u32,
    pub width: u32,
}

impl SamplingArgs {
    pub fn new(params: &SamplingParams, sampler_index: usize, geometry: GenerationGeometry) -> Self {
        Self {
            prompt: params.prompt.clone(),
            negative_prompt: params.negative_prompt.clone(),
            steps: params.steps,
            sampler_index,
            restore_faces: params.restore_faces,
            tiling: params.tiling,
            n_iter: params.batch_count,
            batch_size: params.batch_size,
            cfg_scale: params.cfg_scale,
            seed: params.seed,
            subseed: params.subseed,
            subseed_strength: params.subseed_strength,
            seed_resize_from_h: params.seed_resize_from_h,
            seed_resize_from_w: params.seed_resize_from_w,
            seed_enable_extras: params.seed_enable_extras,
            height: geometry.height,
            width: geometry.width,
        }
    }
}

/// A marshalled text-to-image call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Txt2ImgCall {
    #[serde(flatten)]
    pub sampling: SamplingArgs,
    pub enable_hr: bool,
    pub denoising_strength: f64,
    pub firstphase_width: u32,
    pub firstphase_height: u32,
    /// Positional script frame
    pub args: ArgumentFrame,
}

/// A marshalled image-to-image call.
///
/// Images are carried decoded; adapters choose their own wire form.
#[derive(Debug, Clone, Serialize)]
pub struct Img2ImgCall {
    #[serde(skip)]
    pub init_image: DynamicImage,
    #[serde(skip)]
    pub mask: Option<GrayImage>,

    pub mode: u32,
    #[serde(flatten)]
    pub sampling: SamplingArgs,
    pub mask_mode: u32,
    pub mask_blur: u32,
    pub inpainting_fill: u32,
    pub denoising_strength: f64,
    pub resize_mode: u32,
    pub inpaint_full_res: bool,
    pub inpaint_full_res_padding: u32,
    pub inpainting_mask_invert: bool,
    pub args: ArgumentFrame,
}

/// Images and the info string produced by one generation call.
///
/// For multi-image batches without a script, the first image is a grid.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub images: Vec<DynamicImage>,
    pub info: String,
}

/// The external generation engine.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// Samplers, upscalers, face restorers and models currently available.
    async fn capabilities(&self) -> Result<EngineCapabilities, EngineError>;

    /// Scripts for `kind`, in the order their arguments appear in the frame.
    async fn scripts(&self, kind: ScriptKind) -> Result<Vec<ScriptSpec>, EngineError>;

    async fn txt2img(&self, call: Txt2ImgCall) -> Result<EngineOutput, EngineError>;

    async fn img2img(&self, call: Img2ImgCall) -> Result<EngineOutput, EngineError>;

    /// Upscale `image` with the named upscaler.
    async fn upscale(&self, image: DynamicImage, upscaler: &str) -> Result<DynamicImage, EngineError>;
}
