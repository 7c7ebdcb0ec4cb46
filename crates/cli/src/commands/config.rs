use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tarifario_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "TARIFARIO_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "TARIFARIO_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "TARIFARIO_DATABASE_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "TARIFARIO_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "TARIFARIO_SERVER_PORT"),
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        source("server.health_check_port", "TARIFARIO_SERVER_HEALTH_CHECK_PORT"),
    ));

    lines.push(render_line(
        "engine.cache_ttl_secs",
        &config.engine.cache_ttl_secs.to_string(),
        source("engine.cache_ttl_secs", "TARIFARIO_ENGINE_CACHE_TTL_SECS"),
    ));
    lines.push(render_line(
        "engine.max_escenarios",
        &config.engine.max_escenarios.to_string(),
        source("engine.max_escenarios", "TARIFARIO_ENGINE_MAX_ESCENARIOS"),
    ));
    lines.push(render_line(
        "engine.audit_limite_default",
        &config.engine.audit_limite_default.to_string(),
        source("engine.audit_limite_default", "TARIFARIO_ENGINE_AUDIT_LIMITE_DEFAULT"),
    ));
    lines.push(render_line(
        "engine.audit_limite_max",
        &config.engine.audit_limite_max.to_string(),
        source("engine.audit_limite_max", "TARIFARIO_ENGINE_AUDIT_LIMITE_MAX"),
    ));

    lines.push(render_line(
        "auth.api_token",
        redact_token(config.auth.api_token.as_ref()),
        source("auth.api_token", "TARIFARIO_AUTH_API_TOKEN"),
    ));
    lines.push(render_line(
        "auth.admin_token",
        redact_token(config.auth.admin_token.as_ref()),
        source("auth.admin_token", "TARIFARIO_AUTH_ADMIN_TOKEN"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "TARIFARIO_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "TARIFARIO_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("tarifario.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/tarifario.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: Option<&SecretString>) -> &'static str {
    if token.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}
