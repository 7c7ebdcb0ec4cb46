pub mod calculate;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;
pub mod smoke;

use serde::Serialize;

use tarifario_core::config::{AppConfig, LoadOptions};

/// Exit codes shared by every subcommand: 0 success, 2 configuration,
/// 3 runtime, 4 database connectivity, 5 migration or seed execution,
/// 6 verification or calculation failure.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: &'static str,
    status: &'static str,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &'static str, message: impl Into<String>) -> Self {
        let outcome = CommandOutcome {
            command,
            status: "ok",
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: outcome.render() }
    }

    pub fn failure(
        command: &'static str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let outcome = CommandOutcome {
            command,
            status: "error",
            error_class: Some(error_class.to_owned()),
            message: message.into(),
        };
        Self { exit_code, output: outcome.render() }
    }
}

impl CommandOutcome {
    fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                self.command,
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
    }
}

/// Loads the effective configuration, mapping failures onto the shared
/// config exit code so every subcommand reports them identically.
pub(crate) fn load_config(command: &'static str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn build_runtime(
    command: &'static str,
) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}
