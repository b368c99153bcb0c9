//! TOML configuration file loading
//!
//! Supports `~/.config/command/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CommandConfigFile {
    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramFileConfig,

    /// LLM provider settings
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Assistant behaviour
    #[serde(default)]
    pub assistant: AssistantFileConfig,
}

/// Telegram configuration
#[derive(Debug, Default, Deserialize)]
pub struct TelegramFileConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<i64>,
    pub webhook_secret: Option<String>,
    pub webhook_url: Option<String>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Gemini API key
    pub gemini_api_key: Option<String>,

    /// Generation model (e.g. "gemini-1.5-flash")
    pub model: Option<String>,

    /// Embedding model (e.g. "text-embedding-004")
    pub embedding_model: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// SQLite database path
    pub db_path: Option<String>,

    /// Bearer key for admin routes
    pub admin_api_key: Option<String>,

    /// Webhook requests per minute
    pub rate_limit_rpm: Option<u32>,

    /// Run scheduled jobs
    pub scheduler_enabled: Option<bool>,
}

/// Assistant behaviour configuration
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// Fixed UTC offset such as "-06:00"
    pub tz_offset: Option<String>,

    /// Cosine similarity above which two tasks count as duplicates
    pub duplicate_threshold: Option<f32>,

    /// Query cache time-to-live
    pub cache_ttl_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `CommandConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> CommandConfigFile {
    let Some(path) = config_file_path() else {
        return CommandConfigFile::default();
    };

    if !path.exists() {
        return CommandConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                CommandConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CommandConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is invalid
pub fn parse(content: &str) -> crate::Result<CommandConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/command/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("command").join("config.toml"))
}
