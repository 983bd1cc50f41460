//! Server configuration, loaded from environment variables at startup.

/// Runtime configuration for modshelf-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5000"`).
    pub bind_address: String,

    /// SQLite (or other) database URL (default: `"sqlite://modshelf.db"`).
    /// Any sqlx-compatible connection string works – swap the scheme to
    /// migrate to Postgres (`postgres://…`) or MySQL (`mysql://…`).
    pub database_url: String,

    /// Root directory for uploaded blobs.  Images land under
    /// `<upload_dir>/images`, content archives under `<upload_dir>/files`.
    pub upload_dir: String,

    /// Maximum accepted size per uploaded file in bytes (default: 500 MiB).
    pub max_file_size: u64,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins.  Unset means wildcard
    /// (development mode).
    pub cors_allowed_origins: Option<String>,

    /// Bearer token protecting the admin routes.  Unset disables the guard
    /// (development mode); production deployments sit behind the real
    /// authorization service and set this as a second fence.
    pub admin_token: Option<String>,

    /// Serve Swagger UI at `/swagger-ui` (default: `true`).
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("MODSHELF_BIND", "0.0.0.0:5000"),
            database_url: env_or("MODSHELF_DATABASE_URL", "sqlite://modshelf.db"),
            upload_dir: env_or("MODSHELF_UPLOAD_DIR", "uploads"),
            max_file_size: parse_env("MODSHELF_MAX_FILE_SIZE", 500 * 1024 * 1024),
            log_level: env_or("MODSHELF_LOG", "info"),
            log_json: std::env::var("MODSHELF_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cors_allowed_origins: std::env::var("MODSHELF_CORS_ORIGINS").ok(),
            admin_token: std::env::var("MODSHELF_ADMIN_TOKEN").ok(),
            enable_swagger: std::env::var("MODSHELF_ENABLE_SWAGGER")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
