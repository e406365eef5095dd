//! Persisted per-endpoint defaults.
//!
//! The defaults document is a JSON object with one section per endpoint plus a
//! `plugin` section for metadata shared with clients:
//!
//! ```json
//! {
//!   "plugin":  { "sample_path": "outputs/krita" },
//!   "txt2img": { "steps": 20, "cfg_scale": 7, "sampler_name": "Euler a" },
//!   "img2img": { "denoising_strength": 0.4 },
//!   "upscale": { "upscaler_name": "Lanczos" }
//! }
//! ```
//!
//! It is loaded once at startup and never mutated.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DefaultsError;

/// Key naming the sample output directory, looked up per endpoint then in `plugin`.
pub const SAMPLE_PATH_KEY: &str = "sample_path";

/// API endpoint whose defaults are being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Txt2Img,
    Img2Img,
    Upscale,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Txt2Img => "txt2img",
            Endpoint::Img2Img => "img2img",
            Endpoint::Upscale => "upscale",
        }
    }
}

/// Read-only defaults document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedConfig {
    #[serde(default)]
    pub plugin: Map<String, Value>,

    #[serde(default)]
    pub txt2img: Map<String, Value>,

    #[serde(default)]
    pub img2img: Map<String, Value>,

    #[serde(default)]
    pub upscale: Map<String, Value>,
}

impl PersistedConfig {
    /// Load the document from a JSON file.
    pub fn load(path: &Path) -> Result<Self, DefaultsError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| DefaultsError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| DefaultsError::Parse {
            path: display,
            source,
        })
    }

    /// Defaults for one endpoint.
    pub fn section(&self, endpoint: Endpoint) -> &Map<String, Value> {
        match endpoint {
            Endpoint::Txt2Img => &self.txt2img,
            Endpoint::Img2Img => &self.img2img,
            Endpoint::Upscale => &self.upscale,
        }
    }

    /// Directory where an endpoint saves samples.
    ///
    /// The endpoint section wins over `plugin`; `fallback` is used when neither
    /// names one.
    pub fn sample_path(&self, endpoint: Endpoint, fallback: &Path) -> PathBuf {
        self.section(endpoint)
            .get(SAMPLE_PATH_KEY)
            .or_else(|| self.plugin.get(SAMPLE_PATH_KEY))
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| fallback.to_path_buf())
    }
}
