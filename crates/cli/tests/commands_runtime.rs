use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use tarifario_cli::commands::{doctor, migrate, seed, smoke};

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[
            ("TARIFARIO_DATABASE_URL", "sqlite::memory:"),
            ("TARIFARIO_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
        },
    );
}

#[test]
fn migrate_returns_config_failure_for_unsupported_database() {
    with_env(&[("TARIFARIO_DATABASE_URL", "postgres://elsewhere/tarifario")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_loads_and_verifies_the_dataset() {
    with_env(
        &[
            ("TARIFARIO_DATABASE_URL", "sqlite::memory:"),
            ("TARIFARIO_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = seed::run();
            assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "seed");
            assert_eq!(payload["status"], "ok");
            let message = payload["message"].as_str().unwrap_or("");
            assert!(message.contains("2 clientes"));
            assert!(message.contains("6 tramos"));
        },
    );
}

#[test]
fn seed_is_idempotent_on_a_file_database() {
    let dir = std::env::temp_dir().join(format!("tarifario-seed-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    let db_path = dir.join("seed.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    with_env(&[("TARIFARIO_DATABASE_URL", &url)], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "first seed run should succeed: {}", first.output);

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "reseeding should be idempotent: {}", second.output);
    });

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn smoke_passes_with_valid_env() {
    with_env(
        &[
            ("TARIFARIO_DATABASE_URL", "sqlite::memory:"),
            ("TARIFARIO_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = smoke::run();
            assert_eq!(result.exit_code, 0, "expected successful smoke report: {}", result.output);

            let payload = parse_payload(last_line(&result.output));
            assert_eq!(payload["command"], "smoke");
            assert_eq!(payload["status"], "pass");

            let checks = payload["checks"].as_array().expect("checks array");
            assert!(checks
                .iter()
                .any(|check| check["name"] == "engine_calculation" && check["status"] == "pass"));
        },
    );
}

#[test]
fn smoke_returns_failure_when_config_invalid() {
    with_env(&[("TARIFARIO_DATABASE_URL", "postgres://elsewhere/tarifario")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "fail");
    });
}

#[test]
fn doctor_json_reports_open_auth_mode() {
    with_env(
        &[
            ("TARIFARIO_DATABASE_URL", "sqlite::memory:"),
            ("TARIFARIO_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let output = doctor::run(true);
            let payload: Value = serde_json::from_str(&output).expect("doctor JSON output");

            assert_eq!(payload["overall_status"], "pass");
            let checks = payload["checks"].as_array().expect("checks array");
            let auth = checks
                .iter()
                .find(|check| check["name"] == "auth_token_readiness")
                .expect("auth check");
            assert!(auth["details"].as_str().unwrap_or("").contains("development mode"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "TARIFARIO_DATABASE_URL",
        "TARIFARIO_DATABASE_MAX_CONNECTIONS",
        "TARIFARIO_DATABASE_TIMEOUT_SECS",
        "TARIFARIO_SERVER_BIND_ADDRESS",
        "TARIFARIO_SERVER_PORT",
        "TARIFARIO_SERVER_HEALTH_CHECK_PORT",
        "TARIFARIO_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "TARIFARIO_ENGINE_CACHE_TTL_SECS",
        "TARIFARIO_ENGINE_MAX_ESCENARIOS",
        "TARIFARIO_ENGINE_AUDIT_LIMITE_DEFAULT",
        "TARIFARIO_ENGINE_AUDIT_LIMITE_MAX",
        "TARIFARIO_AUTH_API_TOKEN",
        "TARIFARIO_AUTH_ADMIN_TOKEN",
        "TARIFARIO_LOGGING_LEVEL",
        "TARIFARIO_LOGGING_FORMAT",
        "TARIFARIO_LOG_LEVEL",
        "TARIFARIO_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
