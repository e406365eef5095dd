//! sd-bridge - HTTP bridge to a script-driven diffusion engine.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sd_bridge::{
    config::Config,
    engine::{GenerationEngine, RemoteEngine},
    generate::GenerationService,
    params::PersistedConfig,
    scripts::{ScriptKind, ScriptRegistries, ScriptRegistry},
    server::{create_router, RouterConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let defaults = match &config.defaults_file {
        Some(path) => match PersistedConfig::load(path) {
            Ok(defaults) => defaults,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => PersistedConfig::default(),
    };

    info!("sd-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Engine: {}", config.engine_url);
    match &config.defaults_file {
        Some(path) => info!("  Defaults: {}", path.display()),
        None => info!("  Defaults: built-in"),
    }
    info!("  Sample dir: {}", config.sample_dir.display());
    if config.encryption_key().is_some() {
        info!("  Encrypted bodies: enabled");
    } else {
        warn!("  Encrypted bodies: no key, requests with X-Encrypted-Body will be rejected");
    }

    let engine = RemoteEngine::new(config.engine_url.as_str());

    info!("");
    info!("Discovering engine scripts...");
    let registries = match load_registries(&engine).await {
        Ok(registries) => registries,
        Err(e) => {
            error!("  Failed to query engine: {}", e);
            error!("  Check that the engine is running at {}", config.engine_url);
            return ExitCode::FAILURE;
        }
    };
    for kind in [ScriptKind::Txt2Img, ScriptKind::Img2Img] {
        let registry = registries.get(kind);
        info!(
            "  {}: {} script(s), frame length {}",
            kind.name(),
            registry.descriptors().len(),
            registry.frame_len()
        );
    }

    let service = GenerationService::new(engine, defaults, registries, config.sample_dir.clone())
        .with_max_target_pixels(config.max_target_pixels);
    let router = create_router(service, build_router_config(&config));

    let addr = config.bind_address();
    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/config", addr);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Build both script registries from the engine's script lists.
async fn load_registries<E: GenerationEngine>(
    engine: &E,
) -> Result<ScriptRegistries, sd_bridge::error::EngineError> {
    let txt2img = engine.scripts(ScriptKind::Txt2Img).await?;
    let img2img = engine.scripts(ScriptKind::Img2Img).await?;
    Ok(ScriptRegistries::new(
        ScriptRegistry::build(ScriptKind::Txt2Img, txt2img),
        ScriptRegistry::build(ScriptKind::Img2Img, img2img),
    ))
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "sd_bridge=debug,tower_http=debug"
    } else {
        "sd_bridge=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_max_body_bytes(config.max_body_bytes);

    if let Some(key) = config.encryption_key() {
        router_config = router_config.with_encryption_key(key);
    }

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}
