use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::EngineSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Zero disables expiry; entries then live until an explicit clear.
    pub cache_ttl_secs: u64,
    pub max_escenarios: usize,
    pub audit_limite_default: u32,
    pub audit_limite_max: u32,
}

/// Bearer tokens for the HTTP surface. Both optional: an unset api_token
/// leaves the API open (local development), an unset admin_token restricts
/// nobody further than api_token does.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub api_token: Option<SecretString>,
    pub admin_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub port: Option<u16>,
    pub api_token: Option<String>,
    pub admin_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://tarifario.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                health_check_port: 8081,
                graceful_shutdown_secs: 15,
            },
            engine: EngineConfig {
                cache_ttl_secs: 0,
                max_escenarios: 20,
                audit_limite_default: 100,
                audit_limite_max: 1_000,
            },
            auth: AuthConfig { api_token: None, admin_token: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("tarifario.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Engine knobs in the shape the engine constructor expects.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_scenarios: self.engine.max_escenarios,
            audit_default_limit: self.engine.audit_limite_default,
            audit_max_limit: self.engine.audit_limite_max,
            cache_ttl: (self.engine.cache_ttl_secs > 0)
                .then(|| Duration::from_secs(self.engine.cache_ttl_secs)),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(cache_ttl_secs) = engine.cache_ttl_secs {
                self.engine.cache_ttl_secs = cache_ttl_secs;
            }
            if let Some(max_escenarios) = engine.max_escenarios {
                self.engine.max_escenarios = max_escenarios;
            }
            if let Some(audit_limite_default) = engine.audit_limite_default {
                self.engine.audit_limite_default = audit_limite_default;
            }
            if let Some(audit_limite_max) = engine.audit_limite_max {
                self.engine.audit_limite_max = audit_limite_max;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(api_token_value) = auth.api_token {
                self.auth.api_token = Some(secret_value(api_token_value));
            }
            if let Some(admin_token_value) = auth.admin_token {
                self.auth.admin_token = Some(secret_value(admin_token_value));
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TARIFARIO_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TARIFARIO_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("TARIFARIO_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TARIFARIO_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TARIFARIO_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TARIFARIO_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TARIFARIO_SERVER_PORT") {
            self.server.port = parse_u16("TARIFARIO_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TARIFARIO_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("TARIFARIO_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("TARIFARIO_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TARIFARIO_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("TARIFARIO_ENGINE_CACHE_TTL_SECS") {
            self.engine.cache_ttl_secs = parse_u64("TARIFARIO_ENGINE_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("TARIFARIO_ENGINE_MAX_ESCENARIOS") {
            self.engine.max_escenarios =
                parse_u32("TARIFARIO_ENGINE_MAX_ESCENARIOS", &value)? as usize;
        }
        if let Some(value) = read_env("TARIFARIO_ENGINE_AUDIT_LIMITE_DEFAULT") {
            self.engine.audit_limite_default =
                parse_u32("TARIFARIO_ENGINE_AUDIT_LIMITE_DEFAULT", &value)?;
        }
        if let Some(value) = read_env("TARIFARIO_ENGINE_AUDIT_LIMITE_MAX") {
            self.engine.audit_limite_max =
                parse_u32("TARIFARIO_ENGINE_AUDIT_LIMITE_MAX", &value)?;
        }

        if let Some(value) = read_env("TARIFARIO_AUTH_API_TOKEN") {
            self.auth.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("TARIFARIO_AUTH_ADMIN_TOKEN") {
            self.auth.admin_token = Some(secret_value(value));
        }

        let log_level =
            read_env("TARIFARIO_LOGGING_LEVEL").or_else(|| read_env("TARIFARIO_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TARIFARIO_LOGGING_FORMAT").or_else(|| read_env("TARIFARIO_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(api_token) = overrides.api_token {
            self.auth.api_token = Some(secret_value(api_token));
        }
        if let Some(admin_token) = overrides.admin_token {
            self.auth.admin_token = Some(secret_value(admin_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_engine(&self.engine)?;
        validate_auth(&self.auth)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tarifario.toml"), PathBuf::from("config/tarifario.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.port and server.health_check_port must differ".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.max_escenarios == 0 || engine.max_escenarios > 100 {
        return Err(ConfigError::Validation(
            "engine.max_escenarios must be in range 1..=100".to_string(),
        ));
    }

    if engine.audit_limite_default == 0 {
        return Err(ConfigError::Validation(
            "engine.audit_limite_default must be greater than zero".to_string(),
        ));
    }

    if engine.audit_limite_max < engine.audit_limite_default {
        return Err(ConfigError::Validation(
            "engine.audit_limite_max must be at least engine.audit_limite_default".to_string(),
        ));
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    if let Some(token) = &auth.api_token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.api_token must not be blank when set".to_string(),
            ));
        }
    }

    if let Some(token) = &auth.admin_token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.admin_token must not be blank when set".to_string(),
            ));
        }
        if auth.api_token.is_none() {
            return Err(ConfigError::Validation(
                "auth.admin_token requires auth.api_token to be set as well".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    engine: Option<EnginePatch>,
    auth: Option<AuthPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    cache_ttl_secs: Option<u64>,
    max_escenarios: Option<usize>,
    audit_limite_default: Option<u32>,
    audit_limite_max: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    api_token: Option<String>,
    admin_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
