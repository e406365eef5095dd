//! Configuration management for sd-bridge.
//!
//! Settings come from command-line arguments or environment variables with the
//! `SDB_` prefix, with defaults for everything but the engine URL.
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use sd_bridge::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `SDB_HOST` - Server bind address (default: 127.0.0.1)
//! - `SDB_PORT` - Server port (default: 7861)
//! - `SDB_ENGINE_URL` - Base URL of the generation engine (required)
//! - `SDB_ENCRYPT_KEY` - Shared key for `X-Encrypted-Body: XOR` requests
//! - `SDB_DEFAULTS_FILE` - JSON document with per-endpoint defaults
//! - `SDB_SAMPLE_DIR` - Fallback directory for saved samples
//! - `SDB_MAX_BODY_BYTES` - Maximum request body size
//! - `SDB_MAX_TARGET_PIXELS` - Maximum output pixels per image
//! - `SDB_CORS_ORIGINS` - Allowed CORS origins (comma-separated)

use std::path::PathBuf;

use clap::Parser;

use crate::generate::DEFAULT_MAX_TARGET_PIXELS;
use crate::transport::{EncryptionKey, DEFAULT_MAX_BODY_BYTES};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_PORT: u16 = 7861;

/// Default sample directory when the defaults file names none.
pub const DEFAULT_SAMPLE_DIR: &str = "outputs/samples";

// =============================================================================
// CLI Arguments
// =============================================================================

/// sd-bridge - HTTP bridge to a script-driven diffusion engine.
///
/// Accepts versioned txt2img, img2img and upscale requests, marshals them into
/// the engine's positional calling convention and post-processes the results.
#[derive(Parser, Debug, Clone)]
#[command(name = "sd-bridge")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "SDB_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "SDB_PORT")]
    pub port: u16,

    /// Maximum request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES, env = "SDB_MAX_BODY_BYTES")]
    pub max_body_bytes: usize,

    /// Maximum output size per image, in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_TARGET_PIXELS, env = "SDB_MAX_TARGET_PIXELS")]
    pub max_target_pixels: u64,

    // =========================================================================
    // Engine Configuration
    // =========================================================================
    /// Base URL of the generation engine worker.
    #[arg(long, env = "SDB_ENGINE_URL")]
    pub engine_url: String,

    // =========================================================================
    // Transport Configuration
    // =========================================================================
    /// Shared key for encrypted request and response bodies.
    ///
    /// Without a key, requests marked `X-Encrypted-Body` are rejected.
    #[arg(long, env = "SDB_ENCRYPT_KEY", hide_env_values = true)]
    pub encrypt_key: Option<String>,

    // =========================================================================
    // Defaults Configuration
    // =========================================================================
    /// JSON file with `plugin`, `txt2img`, `img2img` and `upscale` defaults.
    #[arg(long, env = "SDB_DEFAULTS_FILE")]
    pub defaults_file: Option<PathBuf>,

    /// Directory for saved samples when the defaults name none.
    #[arg(long, default_value = DEFAULT_SAMPLE_DIR, env = "SDB_SAMPLE_DIR")]
    pub sample_dir: PathBuf,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "SDB_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.engine_url.is_empty() {
            return Err("Engine URL is required. Set --engine-url or SDB_ENGINE_URL".to_string());
        }

        if !self.engine_url.starts_with("http://") && !self.engine_url.starts_with("https://") {
            return Err(format!(
                "Engine URL must start with http:// or https://, got '{}'",
                self.engine_url
            ));
        }

        if matches!(self.encrypt_key.as_deref(), Some("")) {
            return Err(
                "Encryption key must not be empty. Unset SDB_ENCRYPT_KEY to disable encryption"
                    .to_string(),
            );
        }

        if self.max_body_bytes == 0 {
            return Err("max_body_bytes must be greater than 0".to_string());
        }

        if self.max_target_pixels == 0 {
            return Err("max_target_pixels must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured encryption key, if any.
    pub fn encryption_key(&self) -> Option<EncryptionKey> {
        self.encrypt_key.as_deref().and_then(EncryptionKey::new)
    }
}

// =============================================================================
// Tests
// =============================================================================
