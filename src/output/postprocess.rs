//! Output post-processing pipeline.
//!
//! Stages run in a fixed order on every engine result:
//!
//! 1. grid filter: drop the leading grid image of a plain batch
//! 2. resize: Lanczos3 to the caller's target dimensions
//! 3. mask recomposition: RGB from the engine, alpha from the inpaint mask
//! 4. persistence: optional, detached from the response

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, RgbaImage};
use tracing::debug;

use super::persist::{SampleNaming, SampleWriter};
use crate::scripts::NO_SCRIPT_INDEX;

/// Filter used for every resize the pipeline performs.
pub const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Drop the grid image the engine prepends to multi-image batches.
///
/// Only applies when no script ran; scripts own their output layout.
pub fn filter_grid<T>(mut images: Vec<T>, include_grid: bool, script_index: usize) -> Vec<T> {
    if !include_grid && images.len() > 1 && script_index == NO_SCRIPT_INDEX {
        images.remove(0);
    }
    images
}

/// Resize to exactly `width` x `height`.
pub fn resize_to(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    image.resize_exact(width, height, RESIZE_FILTER)
}

/// Single-channel mask from a decoded mask image.
///
/// Uses the alpha channel when present, luminance otherwise.
pub fn prepare_mask(mask: &DynamicImage) -> GrayImage {
    if mask.color().has_alpha() {
        let rgba = mask.to_rgba8();
        GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            image::Luma([rgba.get_pixel(x, y)[3]])
        })
    } else {
        mask.to_luma8()
    }
}

/// Combine an image's RGB channels with `mask` as alpha.
pub fn apply_mask(image: &DynamicImage, mask: &GrayImage, invert: bool) -> DynamicImage {
    let (width, height) = image.dimensions();
    let resized;
    let mask = if mask.dimensions() == (width, height) {
        mask
    } else {
        resized = imageops::resize(mask, width, height, RESIZE_FILTER);
        &resized
    };

    let rgb = image.to_rgb8();
    let out = RgbaImage::from_fn(width, height, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let a = mask.get_pixel(x, y)[0];
        image::Rgba([r, g, b, if invert { 255 - a } else { a }])
    });
    DynamicImage::ImageRgba8(out)
}

/// Inpaint mask to recompose onto the outputs.
#[derive(Debug, Clone)]
pub struct MaskComposite {
    pub mask: GrayImage,
    pub invert: bool,
}

/// Per-request pipeline settings.
#[derive(Debug, Clone)]
pub struct PostProcessOptions {
    pub include_grid: bool,
    pub script_index: usize,
    pub target_width: u32,
    pub target_height: u32,
    pub mask: Option<MaskComposite>,
    /// Where to save samples, if anywhere
    pub samples: Option<SampleWriter>,
    pub naming: SampleNaming,
}

impl PostProcessOptions {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            include_grid: false,
            script_index: NO_SCRIPT_INDEX,
            target_width,
            target_height,
            mask: None,
            samples: None,
            naming: SampleNaming::Indexed,
        }
    }

    pub fn with_grid(mut self, include_grid: bool, script_index: usize) -> Self {
        self.include_grid = include_grid;
        self.script_index = script_index;
        self
    }

    pub fn with_mask(mut self, mask: Option<MaskComposite>) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_samples(mut self, samples: Option<SampleWriter>, naming: SampleNaming) -> Self {
        self.samples = samples;
        self.naming = naming;
        self
    }
}

/// Images ready for encoding plus the engine's info string.
#[derive(Debug, Clone)]
pub struct PostProcessResult {
    pub images: Vec<DynamicImage>,
    pub info: String,
}

/// Run the pipeline over an engine result.
pub fn post_process(
    images: Vec<DynamicImage>,
    info: String,
    options: &PostProcessOptions,
) -> PostProcessResult {
    let images = filter_grid(images, options.include_grid, options.script_index);

    if let Some(first) = images.first() {
        debug!(
            width = first.width(),
            height = first.height(),
            target_width = options.target_width,
            target_height = options.target_height,
            count = images.len(),
            "Post-processing engine output"
        );
    }

    let images: Vec<DynamicImage> = images
        .iter()
        .map(|image| resize_to(image, options.target_width, options.target_height))
        .map(|image| match &options.mask {
            Some(composite) => apply_mask(&image, &composite.mask, composite.invert),
            None => image,
        })
        .collect();

    if let Some(writer) = &options.samples {
        writer.save_in_background(images.clone(), options.naming);
    }

    PostProcessResult { images, info }
}
