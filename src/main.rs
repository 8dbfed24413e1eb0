use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import modules from the library crate
use track_metadata_sync::config::{self, AppConfig, FileConfig, GenerationProvider};
use track_metadata_sync::generation::{
    CompletionOptions, GenerationService, OllamaProvider, OpenAIProvider,
};
use track_metadata_sync::server::{metrics, run_server, RequestsLoggingLevel};
use track_metadata_sync::sync::{spawn_controller, GenerationPipeline, SimulatedLinkResolver};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3002)]
    pub port: u16,

    /// Generation backend.
    #[clap(long, value_enum, default_value_t = GenerationProvider::Openai)]
    pub provider: GenerationProvider,

    /// Base URL of the generation API. Defaults depend on the provider.
    #[clap(long)]
    pub base_url: Option<String>,

    /// Text model used for metadata generation.
    #[clap(long)]
    pub model: Option<String>,

    /// Image model used for cover generation (OpenAI-compatible providers only).
    #[clap(long)]
    pub image_model: Option<String>,

    /// Static API key for the generation service.
    #[clap(long, env = "GENERATION_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Shell command printing the API key. Takes precedence over --api-key.
    #[clap(long)]
    pub api_key_command: Option<String>,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Quiet period in milliseconds before title and detail edits settle.
    #[clap(long, default_value_t = 700)]
    pub debounce_ms: u64,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            port: args.port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            provider: args.provider,
            base_url: args.base_url.clone(),
            model: args.model.clone(),
            image_model: args.image_model.clone(),
            api_key: args.api_key.clone(),
            api_key_command: args.api_key_command.clone(),
            debounce_ms: args.debounce_ms,
        }
    }
}

fn build_service(settings: &config::GenerationSettings) -> Arc<dyn GenerationService> {
    match settings.provider {
        GenerationProvider::Openai => Arc::new(OpenAIProvider::new(
            settings.base_url.clone(),
            settings.model.clone(),
            settings.image_model.clone(),
            settings.api_key.clone(),
        )),
        GenerationProvider::Ollama => Arc::new(OllamaProvider::new(
            settings.base_url.clone(),
            settings.model.clone(),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = config::CliConfig::from(&cli_args);
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  port: {}", app_config.port);
    info!("  logging_level: {}", app_config.logging_level);
    info!(
        "  generation: {} at {} (model {}, timeout {}s)",
        app_config.generation.provider,
        app_config.generation.base_url,
        app_config.generation.model,
        app_config.generation.timeout_secs
    );
    info!(
        "  sync: debounce {}ms, link resolution {}ms",
        app_config.sync.debounce_ms, app_config.sync.link_resolution_delay_ms
    );

    metrics::init_metrics();

    let service = build_service(&app_config.generation);
    match service.health_check().await {
        Ok(()) => info!("Generation service {} is reachable", service.name()),
        Err(e) => warn!(
            "Generation service {} health check failed: {}. Continuing anyway.",
            service.name(),
            e
        ),
    }

    let pipeline = GenerationPipeline::new(
        service,
        CompletionOptions {
            temperature: app_config.generation.temperature,
            max_tokens: None,
            timeout: app_config.generation.timeout(),
        },
        app_config.generation.timeout(),
    );
    let link_resolver = Arc::new(SimulatedLinkResolver::new(
        app_config.sync.link_resolution_delay(),
    ));

    let shutdown_token = CancellationToken::new();
    let (sync_handle, controller_task) = spawn_controller(
        pipeline,
        link_resolver,
        app_config.sync.controller_settings(),
        shutdown_token.clone(),
    );

    info!("Ready to serve at port {}!", app_config.port);

    let result = tokio::select! {
        result = run_server(
            app_config.server_config(),
            sync_handle,
            app_config.generation.provider.to_string(),
            app_config.generation.model.clone(),
            shutdown_token.clone(),
        ) => {
            info!("HTTP server stopped: {:?}", result);
            shutdown_token.cancel();
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            Ok(())
        }
    };

    // Give the controller a moment to abort in-flight work
    if tokio::time::timeout(Duration::from_secs(1), controller_task)
        .await
        .is_err()
    {
        warn!("Sync controller did not stop in time");
    }

    result
}
