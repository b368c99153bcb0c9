//! Configuration management for the command gateway

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use secrecy::SecretString;
use url::Url;

use crate::{Error, Result};

/// Default fixed offset (America/Mexico_City has no DST since 2022)
pub const DEFAULT_TZ_OFFSET: &str = "-06:00";

/// Default cosine similarity threshold for duplicate tasks
pub const DEFAULT_DUPLICATE_THRESHOLD: f32 = 0.75;

/// Gateway configuration
#[derive(Debug)]
pub struct Config {
    /// Telegram bot configuration
    pub telegram: TelegramConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// HTTP server and storage configuration
    pub server: ServerConfig,

    /// Assistant behaviour
    pub assistant: AssistantConfig,
}

/// Telegram bot configuration
#[derive(Debug, Default)]
pub struct TelegramConfig {
    /// Bot API token; outbound messages are disabled without it
    pub bot_token: Option<SecretString>,

    /// Owner chat that receives scheduled messages
    pub chat_id: Option<i64>,

    /// Expected `x-telegram-bot-api-secret-token` header value
    pub webhook_secret: Option<String>,

    /// Public webhook URL registered at startup
    pub webhook_url: Option<Url>,
}

/// LLM provider configuration
#[derive(Debug)]
pub struct LlmConfig {
    /// Gemini API key; classification falls back to rules without it
    pub api_key: Option<SecretString>,

    /// Generation model
    pub model: String,

    /// Embedding model
    pub embedding_model: String,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// SQLite database file
    pub db_path: PathBuf,

    /// Bearer key for admin endpoints
    pub admin_api_key: Option<String>,

    /// Webhook requests allowed per minute
    pub rate_limit_rpm: u32,

    /// Run the cron scheduler
    pub scheduler_enabled: bool,
}

/// Assistant behaviour configuration
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Local timezone used for parsing times and evaluating schedules
    pub tz: FixedOffset,

    /// Duplicate-task similarity threshold
    pub duplicate_threshold: f32,

    /// Repository query cache TTL
    pub cache_ttl: Duration,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            tz: FixedOffset::west_opt(6 * 3600).unwrap_or_else(|| Utc.fix()),
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl AssistantConfig {
    /// Current time in the configured timezone
    #[must_use]
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz)
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();

        let telegram = TelegramConfig {
            bot_token: env("TELEGRAM_BOT_TOKEN")
                .or(fc.telegram.bot_token)
                .map(SecretString::from),
            chat_id: match env("TELEGRAM_CHAT_ID") {
                Some(raw) => Some(raw.trim().parse().map_err(|e| {
                    Error::Config(format!("invalid TELEGRAM_CHAT_ID {raw:?}: {e}"))
                })?),
                None => fc.telegram.chat_id,
            },
            webhook_secret: env("TELEGRAM_WEBHOOK_SECRET").or(fc.telegram.webhook_secret),
            webhook_url: env("TELEGRAM_WEBHOOK_URL")
                .or(fc.telegram.webhook_url)
                .map(|raw| {
                    Url::parse(&raw)
                        .map_err(|e| Error::Config(format!("invalid webhook URL {raw:?}: {e}")))
                })
                .transpose()?,
        };

        let llm = LlmConfig {
            api_key: env("GEMINI_API_KEY")
                .or(fc.llm.gemini_api_key)
                .map(SecretString::from),
            model: env("GEMINI_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            embedding_model: env("GEMINI_EMBEDDING_MODEL")
                .or(fc.llm.embedding_model)
                .unwrap_or_else(|| "text-embedding-004".to_string()),
        };

        // Determine data directory (~/.local/share/command on Linux)
        let data_dir = directories::BaseDirs::new()
            .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("command"));

        let db_path = env("COMMAND_DB_PATH")
            .or(fc.server.db_path)
            .map_or_else(|| data_dir.join("command.db"), PathBuf::from);

        let server = ServerConfig {
            port: env("COMMAND_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(8000),
            db_path,
            admin_api_key: env("COMMAND_ADMIN_API_KEY").or(fc.server.admin_api_key),
            rate_limit_rpm: env("COMMAND_RATE_LIMIT_RPM")
                .and_then(|s| s.parse().ok())
                .or(fc.server.rate_limit_rpm)
                .unwrap_or(120),
            scheduler_enabled: env("COMMAND_SCHEDULER_ENABLED")
                .map(|v| parse_bool(&v))
                .or(fc.server.scheduler_enabled)
                .unwrap_or(true),
        };

        let tz_raw = env("COMMAND_TZ_OFFSET")
            .or(fc.assistant.tz_offset)
            .unwrap_or_else(|| DEFAULT_TZ_OFFSET.to_string());

        let duplicate_threshold = env("COMMAND_DUPLICATE_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .or(fc.assistant.duplicate_threshold)
            .unwrap_or(DEFAULT_DUPLICATE_THRESHOLD);
        if !(0.0..=1.0).contains(&duplicate_threshold) {
            return Err(Error::Config(format!(
                "duplicate threshold must be within [0, 1], got {duplicate_threshold}"
            )));
        }

        let assistant = AssistantConfig {
            tz: parse_utc_offset(&tz_raw)?,
            duplicate_threshold,
            cache_ttl: Duration::from_secs(
                env("COMMAND_CACHE_TTL_SECS")
                    .and_then(|s| s.parse().ok())
                    .or(fc.assistant.cache_ttl_secs)
                    .unwrap_or(300),
            ),
        };

        Ok(Self {
            telegram,
            llm,
            server,
            assistant,
        })
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Parse a fixed UTC offset such as `-06:00`, `+0530` or `Z`
///
/// # Errors
///
/// Returns error if the offset is malformed or out of range
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    let invalid = || Error::Config(format!("invalid UTC offset {raw:?}, expected e.g. -06:00"));

    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_negative_offset() {
        let tz = parse_utc_offset("-06:00").unwrap();
        assert_eq!(tz.local_minus_utc(), -6 * 3600);
    }

    #[test]
    fn parses_compact_positive_offset() {
        let tz = parse_utc_offset("+0530").unwrap();
        assert_eq!(tz.local_minus_utc(), 5 * 3600 + 30 * 60);
    }

    #[test]
    fn parses_utc_aliases() {
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("utc").unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn rejects_garbage_offsets() {
        assert!(parse_utc_offset("America/Mexico_City").is_err());
        assert!(parse_utc_offset("-6").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
    }

    #[test]
    fn default_assistant_config_is_mexico_city() {
        let cfg = AssistantConfig::default();
        assert_eq!(cfg.tz.local_minus_utc(), -6 * 3600);
        assert!((cfg.duplicate_threshold - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn bool_values() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("no"));
    }
}
