use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // "DEBUG", "INFO", "WARN", "ERROR"
    #[serde(default = "default_log_to_console")]
    pub log_to_console: bool,
}

fn default_log_to_console() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            log_to_console: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
        }
    }
}

/// Get the config directory path
pub fn get_config_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "ehstash", "sync") {
        let config_dir = proj_dirs.config_dir().to_path_buf();
        fs::create_dir_all(&config_dir).ok();
        config_dir
    } else {
        PathBuf::from(".")
    }
}

/// Get the config file path
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

/// Get the logs directory path
pub fn get_logs_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "ehstash", "sync") {
        let logs_dir = proj_dirs.data_dir().join("logs");
        fs::create_dir_all(&logs_dir).ok();
        logs_dir
    } else {
        let logs_dir = std::env::temp_dir().join("eh_stash_sync_logs");
        fs::create_dir_all(&logs_dir).ok();
        logs_dir
    }
}

/// Generate a timestamped log file path for this session
pub fn get_log_file_path() -> PathBuf {
    let logs_dir = get_logs_dir();
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    logs_dir.join(format!("eh_stash_sync_{}.log", timestamp))
}

/// Load logging configuration from file, or create default if not exists
pub fn load_config() -> AppConfig {
    let config_path = get_config_path();

    if config_path.exists() {
        if let Ok(content) = fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<AppConfig>(&content) {
                return config;
            }
        }
    }

    let default_config = AppConfig::default();
    let toml_content = r#"# eh-stash-sync configuration

[logging]
# Log level: "DEBUG", "INFO", "WARN", "ERROR"
level = "INFO"

# Whether to also log to console (useful for development)
log_to_console = true
"#;

    fs::write(&config_path, toml_content).ok();
    default_config
}

/// Engine configuration sourced from the environment (§6 of the spec).
///
/// Unlike `AppConfig`, this is read once at startup and never reloaded;
/// there is no admin endpoint to change it live.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub base_url: String,
    pub cookies: String,
    pub thumb_dir: PathBuf,
    pub rate_interval: Duration,
    pub thumb_rate_interval: Duration,
    pub proxy_url: Option<String>,
    pub warmup_delay: Duration,
    pub scheduler_poll_interval: Duration,
    pub thumb_idle_interval: Duration,
    pub admin_bind_host: String,
    pub admin_bind_port: u16,
}

fn env_duration_secs(key: &str, default_secs: f64) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .map(Duration::from_secs_f64)
        .unwrap_or_else(|| Duration::from_secs_f64(default_secs))
}

impl EngineConfig {
    /// Load from environment variables, applying the defaults the spec names.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?;
        let base_url = std::env::var("EX_BASE_URL")
            .map_err(|_| anyhow::anyhow!("EX_BASE_URL is required"))?;
        let cookies = std::env::var("EX_COOKIES").unwrap_or_default();
        let thumb_dir = std::env::var("THUMB_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./thumbs"));
        let proxy_url = std::env::var("PROXY_URL").ok();

        // Admin bind defaults to loopback; matches the teacher's
        // "always bind to 127.0.0.1" posture, but configurable here since
        // this is a headless service rather than a desktop app.
        let admin_bind_host =
            std::env::var("ADMIN_BIND_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let admin_bind_port = std::env::var("ADMIN_BIND_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        Ok(Self {
            database_url,
            base_url,
            cookies,
            thumb_dir,
            rate_interval: env_duration_secs("RATE_INTERVAL", 2.0),
            thumb_rate_interval: env_duration_secs("THUMB_RATE_INTERVAL", 0.5),
            proxy_url,
            warmup_delay: env_duration_secs("WARMUP_DELAY", 30.0),
            scheduler_poll_interval: env_duration_secs("SCHEDULER_POLL_INTERVAL", 3.0),
            thumb_idle_interval: env_duration_secs("THUMB_IDLE_INTERVAL", 5.0),
            admin_bind_host,
            admin_bind_port,
        })
    }

    /// Parsed `k=v;k2=v2` cookie string as a `Cookie:` header value.
    pub fn cookie_header(&self) -> String {
        self.cookies.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_duration_secs_falls_back_to_default() {
        std::env::remove_var("EH_TEST_DURATION_DOES_NOT_EXIST");
        let d = env_duration_secs("EH_TEST_DURATION_DOES_NOT_EXIST", 2.5);
        assert_eq!(d, Duration::from_secs_f64(2.5));
    }
}
