//! Request schemas for the generation endpoints.
//!
//! Every field is optional on the wire. Missing fields come from the persisted
//! defaults first and the built-in defaults below second.

use serde::{Deserialize, Serialize};

use crate::scripts::ScriptArgs;

/// Sampling fields shared by txt2img and img2img.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub sampler_name: String,
    pub steps: u32,
    pub cfg_scale: f64,
    pub seed: i64,
    pub subseed: i64,
    pub subseed_strength: f64,
    pub seed_resize_from_h: i64,
    pub seed_resize_from_w: i64,
    pub seed_enable_extras: bool,
    pub batch_count: u32,
    pub batch_size: u32,
    pub restore_faces: bool,
    pub tiling: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            sampler_name: "Euler a".to_string(),
            steps: 20,
            cfg_scale: 7.0,
            seed: -1,
            subseed: -1,
            subseed_strength: 0.0,
            seed_resize_from_h: 0,
            seed_resize_from_w: 0,
            seed_enable_extras: false,
            batch_count: 1,
            batch_size: 1,
            restore_faces: false,
            tiling: false,
        }
    }
}

/// `POST /txt2img` parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Txt2ImgParams {
    #[serde(flatten)]
    pub sampling: SamplingParams,

    /// Two-phase generation: render small, then upscale
    pub highres_fix: bool,
    pub denoising_strength: f64,
    pub firstphase_width: u32,
    pub firstphase_height: u32,

    pub base_size: u32,
    pub max_size: u32,

    /// Dimensions the caller wants back
    pub orig_width: u32,
    pub orig_height: u32,

    pub include_grid: bool,
    pub save_samples: bool,

    /// Script name; empty for none
    pub script: String,
    pub script_args: ScriptArgs,
}

impl Default for Txt2ImgParams {
    fn default() -> Self {
        Self {
            sampling: SamplingParams::default(),
            highres_fix: false,
            denoising_strength: 0.7,
            firstphase_width: 0,
            firstphase_height: 0,
            base_size: 512,
            max_size: 768,
            orig_width: 512,
            orig_height: 512,
            include_grid: false,
            save_samples: false,
            script: String::new(),
            script_args: ScriptArgs::default(),
        }
    }
}

/// img2img sub-mode.
pub const IMG2IMG_MODE_NORMAL: u32 = 0;

/// Inpainting sub-mode; enables mask recomposition.
pub const IMG2IMG_MODE_INPAINT: u32 = 1;

/// `POST /img2img` parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Img2ImgParams {
    #[serde(flatten)]
    pub sampling: SamplingParams,

    pub mode: u32,

    /// Base64-encoded source image (required)
    pub src_img: String,

    /// Base64-encoded mask, used in inpaint mode
    pub mask_img: Option<String>,

    pub denoising_strength: f64,
    pub inpainting_fill: u32,
    pub resize_mode: u32,
    pub invert_mask: bool,

    pub base_size: u32,
    pub max_size: u32,

    pub include_grid: bool,
    pub save_samples: bool,

    pub script: String,
    pub script_args: ScriptArgs,
}

impl Default for Img2ImgParams {
    fn default() -> Self {
        Self {
            sampling: SamplingParams::default(),
            mode: IMG2IMG_MODE_NORMAL,
            src_img: String::new(),
            mask_img: None,
            denoising_strength: 0.4,
            inpainting_fill: 0,
            resize_mode: 0,
            invert_mask: false,
            base_size: 512,
            max_size: 768,
            include_grid: false,
            save_samples: false,
            script: String::new(),
            script_args: ScriptArgs::default(),
        }
    }
}

impl Img2ImgParams {
    pub fn is_inpaint(&self) -> bool {
        self.mode == IMG2IMG_MODE_INPAINT
    }
}

/// Upscaler name meaning "do not upscale".
pub const NO_UPSCALER: &str = "None";

/// `POST /upscale` parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpscaleParams {
    /// Base64-encoded source image (required)
    pub src_img: String,
    pub upscaler_name: String,
    /// Halve the image before upscaling
    pub downscale_first: bool,
    pub save_samples: bool,
}

impl Default for UpscaleParams {
    fn default() -> Self {
        Self {
            src_img: String::new(),
            upscaler_name: NO_UPSCALER.to_string(),
            downscale_first: false,
            save_samples: false,
        }
    }
}
