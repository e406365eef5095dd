//! Engine output handling: post-processing, persistence and base64 encoding.

mod codec;
mod persist;
mod postprocess;

pub use codec::{decode_base64_image, encode_png_base64};
pub use persist::{sample_filename, SampleNaming, SampleWriter};
pub use postprocess::{
    apply_mask, filter_grid, post_process, prepare_mask, resize_to, MaskComposite,
    PostProcessOptions, PostProcessResult, RESIZE_FILTER,
};
