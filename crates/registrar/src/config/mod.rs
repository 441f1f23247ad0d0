use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

const ENV_STAGE: &str = "APP_ENV";
const ENV_HOST: &str = "APP_HOST";
const ENV_PORT: &str = "APP_PORT";
const ENV_LOG_LEVEL: &str = "APP_LOG_LEVEL";
const ENV_DATABASE_PATH: &str = "APP_DATABASE_PATH";
const ENV_QUEUE_ENABLED: &str = "APP_TASK_QUEUE_ENABLED";
const ENV_QUEUE_CAPACITY: &str = "APP_TASK_QUEUE_CAPACITY";
const ENV_MAX_RETRIES: &str = "APP_TASK_MAX_RETRIES";
const ENV_RETRY_DELAY_SECS: &str = "APP_TASK_RETRY_DELAY_SECS";

/// Deployment stage; only affects logging context today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Everything the service reads from the process environment (and `.env`, when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub database: DatabaseConfig,
    pub task_queue: TaskQueueConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            environment: AppEnvironment::parse(&var_or(ENV_STAGE, "development")),
            server: ServerConfig::from_env()?,
            telemetry: TelemetryConfig {
                log_level: var_or(ENV_LOG_LEVEL, "info"),
            },
            database: DatabaseConfig::from_env()?,
            task_queue: TaskQueueConfig::from_env()?,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { key }),
    }
}

fn parse_number<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidNumber { key })
}

/// HTTP listener binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let port = var_or(ENV_PORT, "3000")
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        Ok(Self {
            host: var_or(ENV_HOST, "127.0.0.1"),
            port,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::from([127, 0, 0, 1])
        } else {
            self.host
                .parse()
                .map_err(|source| ConfigError::InvalidHost { source })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location of the SQLite database; `:memory:` keeps everything in-process.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let path = var_or(ENV_DATABASE_PATH, "registrar.db");
        if path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        Ok(Self { path })
    }
}

/// Background auto-load queue tuning.
#[derive(Debug, Clone)]
pub struct TaskQueueConfig {
    pub enabled: bool,
    pub capacity: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl TaskQueueConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let capacity = parse_number(ENV_QUEUE_CAPACITY, 64)?;
        if capacity == 0 {
            return Err(ConfigError::InvalidNumber {
                key: ENV_QUEUE_CAPACITY,
            });
        }
        Ok(Self {
            enabled: parse_flag(ENV_QUEUE_ENABLED, true)?,
            capacity,
            max_retries: parse_number(ENV_MAX_RETRIES, 3)?,
            retry_delay: Duration::from_secs(parse_number(ENV_RETRY_DELAY_SECS, 10)?),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("APP_DATABASE_PATH must not be empty")]
    EmptyDatabasePath,
    #[error("{key} must be one of true/false/1/0/yes/no/on/off")]
    InvalidFlag { key: &'static str },
    #[error("{key} must be a positive integer")]
    InvalidNumber { key: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    const ALL_KEYS: [&str; 9] = [
        ENV_STAGE,
        ENV_HOST,
        ENV_PORT,
        ENV_LOG_LEVEL,
        ENV_DATABASE_PATH,
        ENV_QUEUE_ENABLED,
        ENV_QUEUE_CAPACITY,
        ENV_MAX_RETRIES,
        ENV_RETRY_DELAY_SECS,
    ];

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn with_env<T>(vars: &[(&str, &str)], check: impl FnOnce() -> T) -> T {
        let _lock = env_guard()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for key in ALL_KEYS {
            env::remove_var(key);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let result = check();
        for key in ALL_KEYS {
            env::remove_var(key);
        }
        result
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = with_env(&[], || AppConfig::load().expect("defaults load"));
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.database.path, "registrar.db");
        assert!(config.task_queue.enabled);
        assert_eq!(config.task_queue.capacity, 64);
        assert_eq!(config.task_queue.max_retries, 3);
        assert_eq!(config.task_queue.retry_delay, Duration::from_secs(10));
    }

    #[test]
    fn localhost_binds_to_loopback() {
        let config = with_env(&[(ENV_HOST, "localhost"), (ENV_PORT, "8081")], || {
            AppConfig::load().expect("config loads")
        });
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8081));
    }

    #[test]
    fn queue_settings_are_read_from_env() {
        let config = with_env(
            &[
                (ENV_STAGE, "production"),
                (ENV_QUEUE_ENABLED, "off"),
                (ENV_RETRY_DELAY_SECS, "2"),
            ],
            || AppConfig::load().expect("config loads"),
        );
        assert_eq!(config.environment, AppEnvironment::Production);
        assert!(!config.task_queue.enabled);
        assert_eq!(config.task_queue.retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn malformed_settings_are_rejected() {
        let zero_capacity = with_env(&[(ENV_QUEUE_CAPACITY, "0")], AppConfig::load);
        assert!(matches!(
            zero_capacity,
            Err(ConfigError::InvalidNumber {
                key: ENV_QUEUE_CAPACITY
            })
        ));

        let bad_flag = with_env(&[(ENV_QUEUE_ENABLED, "maybe")], AppConfig::load);
        assert!(matches!(
            bad_flag,
            Err(ConfigError::InvalidFlag {
                key: ENV_QUEUE_ENABLED
            })
        ));

        let blank_path = with_env(&[(ENV_DATABASE_PATH, "  ")], AppConfig::load);
        assert!(matches!(blank_path, Err(ConfigError::EmptyDatabasePath)));
    }
}
