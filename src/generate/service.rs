//! Generation orchestration.
//!
//! ```text
//! payload ─▶ resolve ─▶ script lookup ─▶ marshal ─▶ geometry ─▶ engine
//!                                                                  │
//!  response ◀── encode ◀── persist ◀── mask ◀── resize ◀── grid ◀──┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::engine::{
    EngineOutput, GenerationEngine, Img2ImgCall, SamplingArgs, Txt2ImgCall, UPLOADED_MASK_MODE,
};
use crate::error::{EngineError, GenerationError};
use crate::geometry::{self, GenerationGeometry};
use crate::output::{
    decode_base64_image, encode_png_base64, post_process, prepare_mask, resize_to, MaskComposite,
    PostProcessOptions, PostProcessResult, SampleNaming, SampleWriter,
};
use crate::params::{
    ConfigResolver, Endpoint, Img2ImgParams, PersistedConfig, Txt2ImgParams, UpscaleParams,
    NO_UPSCALER, SAMPLE_PATH_KEY,
};
use crate::scripts::{ScriptKind, ScriptRegistries};

/// img2img script whose base size is a tile size rather than a working size.
pub const SD_UPSCALE_SCRIPT: &str = "SD upscale";

/// Default upper bound on output pixels per image.
pub const DEFAULT_MAX_TARGET_PIXELS: u64 = 8192 * 8192;

/// Body of a successful txt2img or img2img call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    /// Base64 PNG images
    pub outputs: Vec<String>,
    pub info: String,
}

/// Body of a successful upscale call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpscaleResponse {
    /// Base64 PNG image
    pub output: String,
}

/// Serves the three generation entry points against one engine.
pub struct GenerationService<E: GenerationEngine> {
    engine: Arc<E>,
    resolver: ConfigResolver,
    registries: Arc<ScriptRegistries>,
    /// Sample directory used when the defaults name none
    sample_dir: PathBuf,
    max_target_pixels: u64,
}

impl<E: GenerationEngine> GenerationService<E> {
    pub fn new(
        engine: E,
        defaults: PersistedConfig,
        registries: ScriptRegistries,
        sample_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            resolver: ConfigResolver::new(Arc::new(defaults)),
            registries: Arc::new(registries),
            sample_dir: sample_dir.into(),
            max_target_pixels: DEFAULT_MAX_TARGET_PIXELS,
        }
    }

    /// Set the largest output size, in pixels, a request may ask for.
    pub fn with_max_target_pixels(mut self, max_target_pixels: u64) -> Self {
        self.max_target_pixels = max_target_pixels;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn registries(&self) -> &ScriptRegistries {
        &self.registries
    }

    pub fn defaults(&self) -> &PersistedConfig {
        self.resolver.defaults()
    }

    /// Text-to-image generation.
    pub async fn txt2img(&self, payload: &Value) -> Result<ImageResponse, GenerationError> {
        let params: Txt2ImgParams = self.resolver.resolve(Endpoint::Txt2Img, payload)?;
        info!(
            endpoint = "txt2img",
            script = %params.script,
            batch_count = params.sampling.batch_count,
            batch_size = params.sampling.batch_size,
            "Generating"
        );

        self.check_target(params.orig_width, params.orig_height)?;

        let registry = self.registries.get(ScriptKind::Txt2Img);
        let selection = registry.lookup(&params.script)?;
        let frame = registry.marshal(&selection, &params.script_args)?;

        let geometry = geometry::resolve(
            params.base_size,
            params.max_size,
            params.orig_width,
            params.orig_height,
        );
        let sampler_index = self
            .sampler_index(&params.sampling.sampler_name, ScriptKind::Txt2Img)
            .await?;

        let call = Txt2ImgCall {
            sampling: SamplingArgs::new(&params.sampling, sampler_index, geometry),
            enable_hr: params.highres_fix,
            denoising_strength: params.denoising_strength,
            firstphase_width: params.firstphase_width,
            firstphase_height: params.firstphase_height,
            args: frame,
        };
        let output = non_empty(self.engine.txt2img(call).await?)?;

        let options = PostProcessOptions::new(params.orig_width, params.orig_height)
            .with_grid(params.include_grid, selection.index)
            .with_samples(
                self.samples(Endpoint::Txt2Img, params.save_samples),
                SampleNaming::Indexed,
            );
        let result = post_process(output.images, output.info, &options);

        encode_result(result, "txt2img")
    }

    /// Image-to-image generation, including inpainting.
    pub async fn img2img(&self, payload: &Value) -> Result<ImageResponse, GenerationError> {
        let params: Img2ImgParams = self.resolver.resolve(Endpoint::Img2Img, payload)?;
        info!(
            endpoint = "img2img",
            mode = params.mode,
            script = %params.script,
            "Generating"
        );

        let registry = self.registries.get(ScriptKind::Img2Img);
        let selection = registry.lookup(&params.script)?;
        let frame = registry.marshal(&selection, &params.script_args)?;

        let image = decode_required(&params.src_img, "src_img")?;
        let mask = match (&params.mask_img, params.is_inpaint()) {
            (Some(data), true) => Some(prepare_mask(&decode_image(data, "mask_img")?)),
            _ => None,
        };

        let (orig_width, orig_height) = image.dimensions();
        self.check_target(orig_width, orig_height)?;
        let geometry = if selection.name() == SD_UPSCALE_SCRIPT {
            GenerationGeometry::square(params.base_size)
        } else {
            geometry::resolve(params.base_size, params.max_size, orig_width, orig_height)
        };
        let sampler_index = self
            .sampler_index(&params.sampling.sampler_name, ScriptKind::Img2Img)
            .await?;

        let call = Img2ImgCall {
            init_image: image,
            mask: mask.clone(),
            mode: params.mode,
            sampling: SamplingArgs::new(&params.sampling, sampler_index, geometry),
            mask_mode: UPLOADED_MASK_MODE,
            mask_blur: 0,
            inpainting_fill: params.inpainting_fill,
            denoising_strength: params.denoising_strength,
            resize_mode: params.resize_mode,
            inpaint_full_res: false,
            inpaint_full_res_padding: 0,
            inpainting_mask_invert: params.invert_mask,
            args: frame,
        };
        let output = non_empty(self.engine.img2img(call).await?)?;

        let composite = mask.map(|mask| MaskComposite {
            mask,
            invert: params.invert_mask,
        });
        let options = PostProcessOptions::new(orig_width, orig_height)
            .with_grid(params.include_grid, selection.index)
            .with_mask(composite)
            .with_samples(
                self.samples(Endpoint::Img2Img, params.save_samples),
                SampleNaming::Indexed,
            );
        let result = post_process(output.images, output.info, &options);

        encode_result(result, "img2img")
    }

    /// Upscale a single image back to its original size.
    pub async fn upscale(&self, payload: &Value) -> Result<UpscaleResponse, GenerationError> {
        let params: UpscaleParams = self.resolver.resolve(Endpoint::Upscale, payload)?;
        info!(
            endpoint = "upscale",
            upscaler = %params.upscaler_name,
            downscale_first = params.downscale_first,
            "Upscaling"
        );

        let image = DynamicImage::ImageRgb8(decode_required(&params.src_img, "src_img")?.to_rgb8());
        let (orig_width, orig_height) = image.dimensions();
        self.check_target(orig_width, orig_height)?;

        let image = if params.downscale_first {
            resize_to(&image, (orig_width / 2).max(1), (orig_height / 2).max(1))
        } else {
            image
        };

        let upscaled = if params.upscaler_name == NO_UPSCALER {
            info!("No upscaler selected, returning source at original size");
            image
        } else {
            self.engine.upscale(image, &params.upscaler_name).await?
        };

        let options = PostProcessOptions::new(orig_width, orig_height).with_samples(
            self.samples(Endpoint::Upscale, params.save_samples),
            SampleNaming::Single,
        );
        let result = post_process(vec![upscaled], String::new(), &options);

        let output = result
            .images
            .first()
            .map(encode_output)
            .transpose()?
            .ok_or(EngineError::EmptyResult)?;
        info!(endpoint = "upscale", output_bytes = output.len(), "Finished");
        Ok(UpscaleResponse { output })
    }

    /// Capability document for `GET /config`.
    ///
    /// The `plugin` section of the defaults, overlaid with the absolute sample
    /// path, the engine's live capabilities and both scripts' metadata.
    pub async fn config_document(&self) -> Result<Map<String, Value>, GenerationError> {
        let capabilities = self.engine.capabilities().await?;

        let mut document = self.defaults().plugin.clone();
        let sample_path = self
            .defaults()
            .plugin
            .get(SAMPLE_PATH_KEY)
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.sample_dir.clone());
        document.insert(
            SAMPLE_PATH_KEY.to_string(),
            Value::String(absolute_path(&sample_path).display().to_string()),
        );

        if let Value::Object(caps) = to_value(&capabilities)? {
            document.extend(caps);
        }
        document.insert(
            "scripts_txt2img".to_string(),
            to_value(&self.registries.txt2img.metadata())?,
        );
        document.insert(
            "scripts_img2img".to_string(),
            to_value(&self.registries.img2img.metadata())?,
        );

        Ok(document)
    }

    /// Engine sampler index for `name`, or 0 if the engine does not know it.
    async fn sampler_index(&self, name: &str, kind: ScriptKind) -> Result<usize, GenerationError> {
        let capabilities = self.engine.capabilities().await?;
        Ok(capabilities.sampler_index(name, kind).unwrap_or_else(|| {
            warn!(sampler = %name, kind = kind.name(), "Unknown sampler, using index 0");
            0
        }))
    }

    /// Reject output sizes that are empty or over the pixel budget.
    fn check_target(&self, width: u32, height: u32) -> Result<(), GenerationError> {
        if width == 0 || height == 0 {
            return Err(GenerationError::invalid_request(format!(
                "Target size must be non-zero, got {}x{}",
                width, height
            )));
        }
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_target_pixels {
            return Err(GenerationError::invalid_request(format!(
                "Target size {}x{} exceeds the limit of {} pixels",
                width, height, self.max_target_pixels
            )));
        }
        Ok(())
    }

    fn samples(&self, endpoint: Endpoint, save: bool) -> Option<SampleWriter> {
        save.then(|| SampleWriter::new(self.defaults().sample_path(endpoint, &self.sample_dir)))
    }
}

fn non_empty(output: EngineOutput) -> Result<EngineOutput, EngineError> {
    if output.images.is_empty() {
        return Err(EngineError::EmptyResult);
    }
    Ok(output)
}

fn decode_image(data: &str, field: &'static str) -> Result<DynamicImage, GenerationError> {
    decode_base64_image(data).map_err(|e| GenerationError::InvalidImage {
        field,
        message: e.to_string(),
    })
}

fn decode_required(data: &str, field: &'static str) -> Result<DynamicImage, GenerationError> {
    if data.is_empty() {
        return Err(GenerationError::invalid_request(format!("{} is required", field)));
    }
    decode_image(data, field)
}

fn encode_output(image: &DynamicImage) -> Result<String, GenerationError> {
    encode_png_base64(image).map_err(|e| GenerationError::Encode {
        message: e.to_string(),
    })
}

fn encode_result(result: PostProcessResult, endpoint: &str) -> Result<ImageResponse, GenerationError> {
    let outputs = result
        .images
        .iter()
        .map(encode_output)
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        endpoint,
        count = outputs.len(),
        output_bytes = outputs.iter().map(String::len).sum::<usize>(),
        "Finished"
    );
    Ok(ImageResponse {
        outputs,
        info: result.info,
    })
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, GenerationError> {
    serde_json::to_value(value).map_err(|e| GenerationError::Encode {
        message: e.to_string(),
    })
}

fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
