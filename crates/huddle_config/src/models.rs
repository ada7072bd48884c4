use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8086,
        }
    }
}

// --- Database Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. sqlite:data/huddle.db, loaded via HUDDLE__DATABASE__URL
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

// --- Google OAuth2 Config ---
// client_secret and state_secret are usually "secret_from_env" in the config files.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    pub state_secret: String,
}

impl GoogleOAuthConfig {
    /// Secret fields that are empty or still carry the `secret_from_env` marker
    /// because their environment variable was not set.
    pub fn unresolved_secrets(&self) -> Vec<&'static str> {
        [
            ("client_secret", &self.client_secret),
            ("state_secret", &self.state_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty() || value.as_str() == crate::SECRET_MARKER)
        .map(|(name, _)| name)
        .collect()
    }
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/calendar".to_string()]
}

// --- Google Calendar Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GcalConfig {
    #[serde(default = "default_time_zone")]
    pub default_time_zone: String,
    #[serde(default = "default_share_role")]
    pub share_role: String, // ACL role granted by share_calendar: reader | writer
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_share_role() -> String {
    "reader".to_string()
}

impl Default for GcalConfig {
    fn default() -> Self {
        Self {
            default_time_zone: default_time_zone(),
            share_role: default_share_role(),
        }
    }
}

// --- Token lifecycle ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenConfig {
    /// Tokens expiring within this many seconds are refreshed before use.
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_seconds: i64,
}

fn default_refresh_margin() -> i64 {
    60
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_margin_seconds: default_refresh_margin(),
        }
    }
}

// --- Event publisher ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PublisherConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    // Only read when use_sqs is set
    #[serde(default)]
    pub queue_url: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_concurrency() -> usize {
    8
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    200
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            queue_url: None,
            region: None,
        }
    }
}

// --- Logging ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enables a daily rolling file log in this directory.
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

// --- Main Application Config ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    // Server config is mandatory in the files, defaulted for tests
    #[serde(default)]
    pub server: ServerConfig,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_gcal: bool,
    #[serde(default)]
    pub use_sqs: bool,

    // --- Optional Feature Configurations ---
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub google: Option<GoogleOAuthConfig>,
    #[serde(default)]
    pub gcal: Option<GcalConfig>,

    // --- Sections with usable defaults ---
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
