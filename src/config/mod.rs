mod file_config;

pub use file_config::{FileConfig, GenerationConfig, SyncConfig};

use crate::generation::ApiKeySource;
use crate::server::{RequestsLoggingLevel, ServerConfig};
use crate::sync::SyncSettings;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::time::Duration;

/// Generation backend selectable from the command line or the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GenerationProvider {
    #[default]
    Openai,
    Ollama,
}

impl std::fmt::Display for GenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationProvider::Openai => write!(f, "openai"),
            GenerationProvider::Ollama => write!(f, "ollama"),
        }
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub provider: GenerationProvider,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub image_model: Option<String>,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
    pub debounce_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Feature configs (with defaults)
    pub generation: GenerationSettings,
    pub sync: SyncTimingSettings,
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub provider: GenerationProvider,
    pub base_url: String,
    pub model: String,
    pub image_model: String,
    pub api_key: ApiKeySource,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncTimingSettings {
    pub debounce_ms: u64,
    pub link_resolution_delay_ms: u64,
    pub upload_step_ms: u64,
    pub upload_step_percent: u8,
}

impl SyncTimingSettings {
    pub fn link_resolution_delay(&self) -> Duration {
        Duration::from_millis(self.link_resolution_delay_ms)
    }

    pub fn controller_settings(&self) -> SyncSettings {
        SyncSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            upload_step_interval: Duration::from_millis(self.upload_step_ms),
            upload_step_percent: self.upload_step_percent,
        }
    }
}

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const OPENAI_DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434";
const OLLAMA_DEFAULT_MODEL: &str = "llama3.1:8b";

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        // Generation settings - merge file config with CLI and provider defaults
        let gen_file = file.generation.unwrap_or_default();
        let provider = match gen_file.provider.as_deref() {
            Some(s) => parse_provider(s)?,
            None => cli.provider,
        };
        let (default_base_url, default_model) = match provider {
            GenerationProvider::Openai => (OPENAI_DEFAULT_BASE_URL, OPENAI_DEFAULT_MODEL),
            GenerationProvider::Ollama => (OLLAMA_DEFAULT_BASE_URL, OLLAMA_DEFAULT_MODEL),
        };

        let api_key_command = gen_file
            .api_key_command
            .or_else(|| cli.api_key_command.clone());
        let api_key = gen_file.api_key.or_else(|| cli.api_key.clone());
        let api_key = match (api_key_command, api_key) {
            (Some(command), _) => ApiKeySource::Command(command),
            (None, Some(key)) => ApiKeySource::Static(key),
            (None, None) => ApiKeySource::None,
        };

        let temperature = gen_file.temperature.unwrap_or(0.7);
        if !(0.0..=2.0).contains(&temperature) {
            bail!("generation.temperature must be between 0.0 and 2.0, got {temperature}");
        }
        let timeout_secs = gen_file.timeout_secs.unwrap_or(60);
        if timeout_secs == 0 {
            bail!("generation.timeout_secs must be greater than zero");
        }

        let generation = GenerationSettings {
            provider,
            base_url: gen_file
                .base_url
                .or_else(|| cli.base_url.clone())
                .unwrap_or_else(|| default_base_url.to_string()),
            model: gen_file
                .model
                .or_else(|| cli.model.clone())
                .unwrap_or_else(|| default_model.to_string()),
            image_model: gen_file
                .image_model
                .or_else(|| cli.image_model.clone())
                .unwrap_or_else(|| OPENAI_DEFAULT_IMAGE_MODEL.to_string()),
            api_key,
            temperature,
            timeout_secs,
        };

        // Sync timing - merge file config with defaults
        let sync_file = file.sync.unwrap_or_default();
        let sync = SyncTimingSettings {
            debounce_ms: sync_file.debounce_ms.unwrap_or(cli.debounce_ms),
            link_resolution_delay_ms: sync_file.link_resolution_delay_ms.unwrap_or(1500),
            upload_step_ms: sync_file.upload_step_ms.unwrap_or(100),
            upload_step_percent: sync_file.upload_step_percent.unwrap_or(10),
        };
        if sync.upload_step_percent == 0 || sync.upload_step_percent > 100 {
            bail!(
                "sync.upload_step_percent must be between 1 and 100, got {}",
                sync.upload_step_percent
            );
        }

        Ok(AppConfig {
            port,
            logging_level,
            frontend_dir_path,
            generation,
            sync,
        })
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            port: self.port,
            frontend_dir_path: self.frontend_dir_path.clone(),
            ..ServerConfig::default()
        }
    }
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

fn parse_provider(s: &str) -> Result<GenerationProvider> {
    match GenerationProvider::from_str(s, true) {
        Ok(provider) => Ok(provider),
        Err(_) => bail!("Unknown generation provider: {s:?} (expected \"openai\" or \"ollama\")"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> CliConfig {
        CliConfig {
            port: 3002,
            logging_level: RequestsLoggingLevel::Path,
            frontend_dir_path: None,
            provider: GenerationProvider::Openai,
            base_url: None,
            model: None,
            image_model: None,
            api_key: None,
            api_key_command: None,
            debounce_ms: 700,
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("headers"),
            Some(RequestsLoggingLevel::Headers)
        ));
        // Case insensitive
        assert!(matches!(
            parse_logging_level("PATH"),
            Some(RequestsLoggingLevel::Path)
        ));
        // Invalid
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let cli = CliConfig {
            port: 4100,
            logging_level: RequestsLoggingLevel::Headers,
            frontend_dir_path: Some("/frontend".to_string()),
            model: Some("gpt-4o".to_string()),
            api_key: Some("sk-test".to_string()),
            debounce_ms: 500,
            ..cli()
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.port, 4100);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert_eq!(config.frontend_dir_path, Some("/frontend".to_string()));
        assert_eq!(config.generation.provider, GenerationProvider::Openai);
        assert_eq!(config.generation.base_url, OPENAI_DEFAULT_BASE_URL);
        assert_eq!(config.generation.model, "gpt-4o");
        assert_eq!(config.generation.image_model, OPENAI_DEFAULT_IMAGE_MODEL);
        assert_eq!(
            config.generation.api_key,
            ApiKeySource::Static("sk-test".to_string())
        );
        assert_eq!(config.sync.debounce_ms, 500);
        assert_eq!(config.sync.link_resolution_delay_ms, 1500);
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let cli = CliConfig {
            port: 3002,
            model: Some("cli-model".to_string()),
            api_key: Some("cli-key".to_string()),
            ..cli()
        };
        let file = FileConfig {
            port: Some(5000),
            logging_level: Some("none".to_string()),
            frontend_dir_path: Some("/toml/frontend".to_string()),
            generation: Some(GenerationConfig {
                provider: Some("ollama".to_string()),
                model: Some("qwen2.5:7b".to_string()),
                api_key_command: Some("cat /run/secrets/key".to_string()),
                temperature: Some(0.3),
                timeout_secs: Some(120),
                ..Default::default()
            }),
            sync: Some(SyncConfig {
                debounce_ms: Some(300),
                upload_step_ms: Some(20),
                ..Default::default()
            }),
        };

        let config = AppConfig::resolve(&cli, Some(file)).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::None);
        assert_eq!(config.frontend_dir_path, Some("/toml/frontend".to_string()));
        assert_eq!(config.generation.provider, GenerationProvider::Ollama);
        assert_eq!(config.generation.base_url, OLLAMA_DEFAULT_BASE_URL);
        assert_eq!(config.generation.model, "qwen2.5:7b");
        assert_eq!(
            config.generation.api_key,
            ApiKeySource::Command("cat /run/secrets/key".to_string())
        );
        assert_eq!(config.generation.temperature, 0.3);
        assert_eq!(config.generation.timeout(), Duration::from_secs(120));
        assert_eq!(config.sync.debounce_ms, 300);
        assert_eq!(config.sync.upload_step_ms, 20);
        assert_eq!(config.sync.upload_step_percent, 10);
    }

    #[test]
    fn test_resolve_unknown_provider_error() {
        let file = FileConfig {
            generation: Some(GenerationConfig {
                provider: Some("bard".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = AppConfig::resolve(&cli(), Some(file));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown generation provider"));
    }

    #[test]
    fn test_resolve_invalid_values_error() {
        let file = FileConfig {
            generation: Some(GenerationConfig {
                temperature: Some(3.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli(), Some(file)).is_err());

        let file = FileConfig {
            sync: Some(SyncConfig {
                upload_step_percent: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli(), Some(file)).is_err());
    }

    #[test]
    fn test_no_api_key_configured() {
        let config = AppConfig::resolve(&cli(), None).unwrap();
        assert_eq!(config.generation.api_key, ApiKeySource::None);
    }

    #[test]
    fn test_controller_settings_conversion() {
        let config = AppConfig::resolve(&cli(), None).unwrap();
        let settings = config.sync.controller_settings();

        assert_eq!(settings.debounce, Duration::from_millis(700));
        assert_eq!(settings.upload_step_interval, Duration::from_millis(100));
        assert_eq!(settings.upload_step_percent, 10);
        assert_eq!(
            config.sync.link_resolution_delay(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_server_config_carries_resolved_values() {
        let cli = CliConfig {
            port: 4444,
            logging_level: RequestsLoggingLevel::Body,
            ..cli()
        };
        let config = AppConfig::resolve(&cli, None).unwrap();
        let server = config.server_config();

        assert_eq!(server.port, 4444);
        assert_eq!(server.requests_logging_level, RequestsLoggingLevel::Body);
        assert_eq!(server.max_upload_bytes, ServerConfig::default().max_upload_bytes);
    }
}
