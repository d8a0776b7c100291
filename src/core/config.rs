//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.rill/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::Provider;
use crate::inference::GenerationParams;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RillConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
    #[serde(default)]
    pub lmstudio: LmStudioConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub enable_tools: Option<bool>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DisplayConfig {
    pub target_fps: Option<u32>,
    pub show_sidebar: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LmStudioConfig {
    pub base_url: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_MODEL: &str = "local-model";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TARGET_FPS: u32 = 60;
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_LMSTUDIO_BASE_URL: &str = "http://localhost:1234/v1";

pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;
pub const MAX_TOKENS_RANGE: std::ops::RangeInclusive<u32> = 1..=65536;
const FPS_RANGE: std::ops::RangeInclusive<u32> = 1..=240;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. \
    When a registered tool can answer part of a question (the current time, arithmetic), call it \
    instead of guessing. Be direct, be honest about uncertainty, and prefer clarity over hedging.";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider: Provider,
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub enable_tools: bool,
    pub system_prompt: String,
    pub target_fps: u32,
    pub show_sidebar: bool,
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub lmstudio_base_url: String,
}

impl ResolvedConfig {
    /// Per-request parameters a session starts with (and `/new` restores).
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model_name.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools_enabled: self.enable_tools,
            schema: None,
        }
    }
}

/// Values given on the command line. `None` means "not specified".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub fps: Option<u32>,
    pub no_tools: bool,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.rill/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".rill").join("config.toml"))
}

/// Load config from `~/.rill/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `RillConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<RillConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(RillConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(RillConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: RillConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

fn generate_default_config(path: &Path) {
    let default_content = r#"# rill configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# default_provider = "lmstudio"      # "openrouter", "lmstudio" or "offline"
# default_model = "local-model"
# temperature = 0.7                  # 0.0 - 2.0
# max_tokens = 2048                  # 1 - 65536
# enable_tools = true
# system_prompt = "You are a helpful assistant."

# [display]
# target_fps = 60
# show_sidebar = true

# [openrouter]
# api_key = "sk-or-..."              # Or set OPENROUTER_API_KEY env var
# base_url = "https://openrouter.ai/api/v1"

# [lmstudio]
# base_url = "http://localhost:1234/v1"
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &RillConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

/// Same as [`resolve`], reading environment variables through `env`.
pub fn resolve_with_env(
    config: &RillConfig,
    cli: &CliOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Provider: CLI → env → config → default
    let provider = cli
        .provider
        .or_else(|| env("RILL_PROVIDER").and_then(|s| parse_provider(&s)))
        .or_else(|| {
            config
                .general
                .default_provider
                .as_deref()
                .and_then(parse_provider)
        })
        .unwrap_or_default();

    // Model: CLI → env → config → default
    let model_name = cli
        .model
        .clone()
        .or_else(|| env("RILL_MODEL"))
        .or_else(|| config.general.default_model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let temperature = cli
        .temperature
        .or(config.general.temperature)
        .filter(|t| TEMPERATURE_RANGE.contains(t))
        .unwrap_or(DEFAULT_TEMPERATURE);

    let max_tokens = cli
        .max_tokens
        .or(config.general.max_tokens)
        .filter(|n| MAX_TOKENS_RANGE.contains(n))
        .unwrap_or(DEFAULT_MAX_TOKENS);

    let target_fps = cli
        .fps
        .or(config.display.target_fps)
        .filter(|fps| FPS_RANGE.contains(fps))
        .unwrap_or(DEFAULT_TARGET_FPS);

    let enable_tools = !cli.no_tools && config.general.enable_tools.unwrap_or(true);

    // OpenRouter API key: env → config
    let openrouter_api_key =
        env("OPENROUTER_API_KEY").or_else(|| config.openrouter.api_key.clone());

    // OpenRouter base URL: env → config → default
    let openrouter_base_url = env("OPENROUTER_BASE_URL")
        .or_else(|| config.openrouter.base_url.clone())
        .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string());

    // LM Studio base URL: env → config → default
    let lmstudio_base_url = env("LM_STUDIO_BASE_URL")
        .or_else(|| config.lmstudio.base_url.clone())
        .unwrap_or_else(|| DEFAULT_LMSTUDIO_BASE_URL.to_string());

    ResolvedConfig {
        provider,
        model_name,
        temperature,
        max_tokens,
        enable_tools,
        system_prompt: config
            .general
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        target_fps,
        show_sidebar: config.display.show_sidebar.unwrap_or(true),
        openrouter_api_key,
        openrouter_base_url,
        lmstudio_base_url,
    }
}

fn parse_provider(name: &str) -> Option<Provider> {
    match Provider::from_str(name, true) {
        Ok(provider) => Some(provider),
        Err(e) => {
            warn!("Ignoring unknown provider {:?}: {}", name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let resolved = resolve_with_env(&RillConfig::default(), &CliOverrides::default(), no_env);
        assert_eq!(resolved.provider, Provider::default());
        assert_eq!(resolved.model_name, DEFAULT_MODEL);
        assert_eq!(resolved.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(resolved.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(resolved.target_fps, DEFAULT_TARGET_FPS);
        assert!(resolved.enable_tools);
        assert!(resolved.show_sidebar);
        assert!(resolved.system_prompt.starts_with("You are a helpful assistant"));
    }

    #[test]
    fn test_config_values_override_defaults() {
        let config: RillConfig = toml::from_str(
            r#"
[general]
default_provider = "openrouter"
default_model = "my-model"
temperature = 1.2
max_tokens = 512
enable_tools = false
system_prompt = "Custom prompt."

[display]
target_fps = 30
show_sidebar = false
"#,
        )
        .unwrap();
        let resolved = resolve_with_env(&config, &CliOverrides::default(), no_env);
        assert_eq!(resolved.provider, Provider::OpenRouter);
        assert_eq!(resolved.model_name, "my-model");
        assert_eq!(resolved.temperature, 1.2);
        assert_eq!(resolved.max_tokens, 512);
        assert!(!resolved.enable_tools);
        assert_eq!(resolved.system_prompt, "Custom prompt.");
        assert_eq!(resolved.target_fps, 30);
        assert!(!resolved.show_sidebar);
    }

    #[test]
    fn test_env_beats_config_and_cli_beats_env() {
        let config: RillConfig = toml::from_str(
            r#"
[general]
default_provider = "lmstudio"
default_model = "from-file"
"#,
        )
        .unwrap();
        let env = |key: &str| match key {
            "RILL_PROVIDER" => Some("offline".to_string()),
            "RILL_MODEL" => Some("from-env".to_string()),
            _ => None,
        };

        let resolved = resolve_with_env(&config, &CliOverrides::default(), env);
        assert_eq!(resolved.provider, Provider::Offline);
        assert_eq!(resolved.model_name, "from-env");

        let cli = CliOverrides {
            provider: Some(Provider::OpenRouter),
            model: Some("from-cli".to_string()),
            ..Default::default()
        };
        let resolved = resolve_with_env(&config, &cli, env);
        assert_eq!(resolved.provider, Provider::OpenRouter);
        assert_eq!(resolved.model_name, "from-cli");
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let config: RillConfig = toml::from_str(
            r#"
[general]
temperature = 9.0
max_tokens = 0
"#,
        )
        .unwrap();
        let resolved = resolve_with_env(&config, &CliOverrides::default(), no_env);
        assert_eq!(resolved.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(resolved.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_unknown_provider_is_ignored() {
        let config: RillConfig = toml::from_str(
            r#"
[general]
default_provider = "carrier-pigeon"
"#,
        )
        .unwrap();
        let resolved = resolve_with_env(&config, &CliOverrides::default(), no_env);
        assert_eq!(resolved.provider, Provider::default());
    }

    #[test]
    fn test_generation_params_follow_config() {
        let cli = CliOverrides {
            model: Some("m".into()),
            temperature: Some(1.5),
            no_tools: true,
            ..Default::default()
        };
        let params = resolve_with_env(&RillConfig::default(), &cli, no_env).generation_params();
        assert_eq!(params.model, "m");
        assert_eq!(params.temperature, 1.5);
        assert_eq!(params.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(!params.tools_enabled);
        assert!(params.schema.is_none());
    }

    #[test]
    fn test_no_tools_flag_wins() {
        let cli = CliOverrides {
            no_tools: true,
            ..Default::default()
        };
        let resolved = resolve_with_env(&RillConfig::default(), &cli, no_env);
        assert!(!resolved.enable_tools);
    }

    #[test]
    fn test_sparse_toml_parses() {
        let config: RillConfig =
            toml::from_str("[lmstudio]\nbase_url = \"http://10.0.0.2:1234/v1\"\n").unwrap();
        assert_eq!(
            config.lmstudio.base_url.as_deref(),
            Some("http://10.0.0.2:1234/v1")
        );
        assert!(config.general.default_model.is_none());
        assert!(config.display.target_fps.is_none());
    }

    #[test]
    fn test_api_key_from_env() {
        let env = |key: &str| (key == "OPENROUTER_API_KEY").then(|| "sk-env".to_string());
        let resolved = resolve_with_env(&RillConfig::default(), &CliOverrides::default(), env);
        assert_eq!(resolved.openrouter_api_key.as_deref(), Some("sk-env"));
        assert_eq!(resolved.openrouter_base_url, DEFAULT_OPENROUTER_BASE_URL);
    }
}
