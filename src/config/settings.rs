//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// JWT authentication settings
    pub jwt: JwtSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// Rate limiting configuration
    pub rate_limit: RateLimitSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket configuration
    pub websocket: WebSocketSettings,

    /// Pending image claim lifetimes
    pub attachments: AttachmentSettings,

    /// Blob storage location
    pub blob: BlobSettings,

    /// Fire-and-forget task pool
    pub background: BackgroundSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,

    /// Try `CONFIG SET notify-keyspace-events Ex` on startup.
    /// Managed Redis offerings often reject CONFIG; set this to false there
    /// and configure the server out of band.
    pub keyspace_notifications: bool,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key used to verify HS256 tokens
    pub secret: String,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-1023)
    pub machine_id: u16,
}

/// Token bucket parameters for the HTTP and socket limiters.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Tokens added per second for HTTP requests (per client address)
    pub http_refill_per_sec: f64,

    /// Bucket capacity for HTTP requests
    pub http_burst: u32,

    /// Tokens added per second for inbound socket frames
    pub socket_refill_per_sec: f64,

    /// Bucket capacity for inbound socket frames
    pub socket_burst: u32,

    /// How often the sweeper drops keys whose bucket has refilled
    pub idle_bucket_secs: u64,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum inbound message size in bytes
    pub max_message_size: usize,

    /// Deadline for a single outbound write in milliseconds
    pub write_timeout_ms: u64,

    /// Interval between liveness pings in milliseconds
    pub ping_interval_ms: u64,

    /// Read deadline in milliseconds; any inbound frame (pong included) resets it
    pub pong_wait_ms: u64,
}

/// Attachment claim TTLs.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentSettings {
    /// Lifetime of the "active" key; its expiry drives cleanup
    pub active_ttl_secs: u64,

    /// Lifetime of the "data" key holding the path; must outlive the active key
    pub data_ttl_secs: u64,

    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

/// Blob store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BlobSettings {
    /// Root directory for stored blobs
    pub root: String,

    /// Prefix prepended to every generated blob path
    pub key_prefix: String,
}

/// Background task pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundSettings {
    /// Maximum number of background tasks running at once
    pub max_in_flight: usize,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// if the JWT secret is too short, or if the claim TTLs are inverted.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("redis.keyspace_notifications", true)?
            .set_default("snowflake.machine_id", 1)?
            // One request every 750ms with a burst of 5
            .set_default("rate_limit.http_refill_per_sec", 1.0 / 0.75)?
            .set_default("rate_limit.http_burst", 5)?
            .set_default("rate_limit.socket_refill_per_sec", 2.0)?
            .set_default("rate_limit.socket_burst", 3)?
            .set_default("rate_limit.idle_bucket_secs", 600)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("websocket.max_message_size", 2048_i64)?
            .set_default("websocket.write_timeout_ms", 8000_i64)?
            .set_default("websocket.ping_interval_ms", 54000_i64)?
            .set_default("websocket.pong_wait_ms", 60000_i64)?
            .set_default("attachments.active_ttl_secs", 600_i64)?
            .set_default("attachments.data_ttl_secs", 720_i64)?
            .set_default("attachments.max_upload_bytes", 5_242_880_i64)?
            .set_default("blob.root", "./data/blobs")?
            .set_default("blob.key_prefix", "chat-images")?
            .set_default("background.max_in_flight", 256_i64)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=8080 -> server.port = 8080
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("blob.root", std::env::var("BLOB_ROOT").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate())
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.attachments.data_ttl_secs <= self.attachments.active_ttl_secs {
            return Err(ConfigError::Message(format!(
                "attachments.data_ttl_secs ({}) must exceed attachments.active_ttl_secs ({})",
                self.attachments.data_ttl_secs, self.attachments.active_ttl_secs
            )));
        }
        if self.websocket.ping_interval_ms >= self.websocket.pong_wait_ms {
            return Err(ConfigError::Message(
                "websocket.ping_interval_ms must be shorter than websocket.pong_wait_ms".into(),
            ));
        }
        Ok(self)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl WebSocketSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }
}
