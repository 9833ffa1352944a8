pub mod config;
pub mod doctor;
pub mod migrate;
pub mod smoke;

use serde_json::json;

/// Outcome of one operator command: a machine-parseable output line plus the
/// process exit code. Non-zero codes identify the failing layer so wrapper
/// scripts can branch without parsing the message text.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            output: json!({
                "command": command,
                "status": "ok",
                "message": message.into(),
            })
            .to_string(),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self {
            exit_code,
            output: json!({
                "command": command,
                "status": "error",
                "error_class": error_class,
                "message": message.into(),
            })
            .to_string(),
        }
    }

    /// Pre-rendered output (human-readable or JSON) with an explicit code.
    pub fn rendered(exit_code: u8, output: String) -> Self {
        Self { exit_code, output }
    }
}
