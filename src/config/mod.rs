//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "albumsync";
const ENV_PREFIX: &str = "ALBUMSYNC";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_LIST_PATH: &str = "/api/albums/list";
const DEFAULT_CREATE_PATH: &str = "/api/albums/create";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_LRU_MAX_ENTRIES: u64 = 64;
const DEFAULT_NOTIFICATION_DURATION_MS: u64 = 3_000;
const DEFAULT_NOTIFICATION_CHANNEL_CAPACITY: u64 = 32;

/// Command-line arguments for the albumsync binary.
#[derive(Debug, Parser)]
#[command(name = "albumsync", version, about = "Album list client")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "ALBUMSYNC_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the signed-in user's albums.
    List,
    /// Create an album, then print the refreshed list.
    Create(CreateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CreateArgs {
    /// Title of the new album.
    #[arg(long, value_name = "TITLE")]
    pub title: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the albums service base URL.
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// Override the per-request timeout in milliseconds.
    #[arg(long = "request-timeout-ms", value_name = "MILLIS", global = true)]
    pub request_timeout_ms: Option<u64>,

    /// Act as this user.
    #[arg(long = "user-id", value_name = "ID", global = true)]
    pub user_id: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the cache eviction policy (session|lru).
    #[arg(long = "cache-eviction", value_name = "POLICY", global = true)]
    pub cache_eviction: Option<String>,

    /// Override the LRU cache ceiling.
    #[arg(long = "cache-max-entries", value_name = "COUNT", global = true)]
    pub cache_max_entries: Option<u64>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub session: SessionSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub list_url: Url,
    pub create_url: Url,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionMode {
    #[default]
    Session,
    Lru,
}

impl FromStr for EvictionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "lru" => Ok(Self::Lru),
            other => Err(format!("unknown eviction policy `{other}` (expected session|lru)")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheSettings {
    pub eviction: EvictionMode,
    pub max_entries: Option<NonZeroUsize>,
}

#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub duration: Duration,
    pub channel_capacity: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    api: RawApiSettings,
    session: RawSessionSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    notifications: RawNotificationSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(timeout) = overrides.request_timeout_ms {
            self.api.request_timeout_ms = Some(timeout);
        }
        if let Some(user_id) = overrides.user_id.as_ref() {
            self.session.user_id = Some(user_id.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(eviction) = overrides.cache_eviction.as_ref() {
            self.cache.eviction = Some(eviction.clone());
        }
        if let Some(max) = overrides.cache_max_entries {
            self.cache.max_entries = Some(max);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            api,
            session,
            logging,
            cache,
            notifications,
        } = raw;

        Ok(Self {
            api: build_api_settings(api)?,
            session: build_session_settings(session),
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            notifications: build_notification_settings(notifications)?,
        })
    }
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let base = api.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = Url::parse(base.trim())
        .map_err(|err| LoadError::invalid("api.base_url", format!("failed to parse: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "api.base_url",
            format!("unsupported scheme `{}`", base_url.scheme()),
        ));
    }

    let list_path = api.list_path.unwrap_or_else(|| DEFAULT_LIST_PATH.to_string());
    let list_url = join_path(&base_url, &list_path, "api.list_path")?;
    let create_path = api
        .create_path
        .unwrap_or_else(|| DEFAULT_CREATE_PATH.to_string());
    let create_url = join_path(&base_url, &create_path, "api.create_path")?;

    let timeout_ms = api.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "api.request_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(ApiSettings {
        base_url,
        list_url,
        create_url,
        request_timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_session_settings(session: RawSessionSettings) -> SessionSettings {
    let user_id = session.user_id.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    SessionSettings { user_id }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };
    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let eviction = match cache.eviction {
        Some(value) => EvictionMode::from_str(&value)
            .map_err(|reason| LoadError::invalid("cache.eviction", reason))?,
        None => EvictionMode::Session,
    };
    let max_entries = match (eviction, cache.max_entries) {
        (_, Some(value)) => Some(non_zero_usize(value, "cache.max_entries")?),
        (EvictionMode::Lru, None) => Some(non_zero_usize(
            DEFAULT_LRU_MAX_ENTRIES,
            "cache.max_entries",
        )?),
        (EvictionMode::Session, None) => None,
    };
    Ok(CacheSettings {
        eviction,
        max_entries,
    })
}

fn build_notification_settings(
    notifications: RawNotificationSettings,
) -> Result<NotificationSettings, LoadError> {
    let duration_ms = notifications
        .duration_ms
        .unwrap_or(DEFAULT_NOTIFICATION_DURATION_MS);
    if duration_ms == 0 {
        return Err(LoadError::invalid(
            "notifications.duration_ms",
            "must be greater than zero",
        ));
    }
    let capacity = notifications
        .channel_capacity
        .unwrap_or(DEFAULT_NOTIFICATION_CHANNEL_CAPACITY);
    Ok(NotificationSettings {
        duration: Duration::from_millis(duration_ms),
        channel_capacity: non_zero_usize(capacity, "notifications.channel_capacity")?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    list_path: Option<String>,
    create_path: Option<String>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    eviction: Option<String>,
    max_entries: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNotificationSettings {
    duration_ms: Option<u64>,
    channel_capacity: Option<u64>,
}

fn join_path(base: &Url, path: &str, key: &'static str) -> Result<Url, LoadError> {
    let path = path.trim();
    if !path.starts_with('/') {
        return Err(LoadError::invalid(key, "path must start with `/`"));
    }
    base.join(path)
        .map_err(|err| LoadError::invalid(key, format!("invalid path `{path}`: {err}")))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
