use secrecy::ExposeSecret;

use crate::commands::CommandResult;
use venta_core::config::{AppConfig, LoadOptions, LogFormat};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::rendered(2, format!("config validation failed: {error}"))
        }
    };

    let mut lines =
        vec!["effective config (source precedence: overrides > env > file > default):".to_string()];

    lines.push(render("database.url", &config.database.url));
    lines.push(render(
        "database.max_connections",
        &config.database.max_connections.to_string(),
    ));
    lines.push(render("database.timeout_secs", &config.database.timeout_secs.to_string()));

    lines.push(render(
        "whatsapp.access_token",
        &redact(config.whatsapp.access_token.expose_secret()),
    ));
    lines.push(render(
        "whatsapp.verify_token",
        &redact(config.whatsapp.verify_token.expose_secret()),
    ));
    lines.push(render(
        "whatsapp.app_secret",
        &config
            .whatsapp
            .app_secret
            .as_ref()
            .map(|secret| redact(secret.expose_secret()))
            .unwrap_or_else(|| "(unset: signature verification disabled)".to_string()),
    ));
    lines.push(render("whatsapp.phone_number_id", &config.whatsapp.phone_number_id));
    lines.push(render("whatsapp.api_base_url", &config.whatsapp.api_base_url));

    lines.push(render("llm.api_key", &redact(config.llm.api_key.expose_secret())));
    lines.push(render("llm.base_url", &config.llm.base_url));
    lines.push(render("llm.model", &config.llm.model));
    lines.push(render("llm.mini_model", &config.llm.mini_model));
    lines.push(render("llm.timeout_secs", &config.llm.timeout_secs.to_string()));

    lines.push(render("server.bind_address", &config.server.bind_address));
    lines.push(render("server.webhook_port", &config.server.webhook_port.to_string()));
    lines.push(render(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
    ));

    lines.push(render("crm.enabled", &config.crm.enabled.to_string()));
    lines.push(render(
        "crm.access_token",
        &config
            .crm
            .access_token
            .as_ref()
            .map(|secret| redact(secret.expose_secret()))
            .unwrap_or_else(|| "(unset)".to_string()),
    ));
    lines.push(render("crm.base_url", &config.crm.base_url));

    lines.push(render(
        "scheduler.poll_interval_secs",
        &config.scheduler.poll_interval_secs.to_string(),
    ));
    lines.push(render("scheduler.history_limit", &config.scheduler.history_limit.to_string()));

    lines.push(render("logging.level", &config.logging.level));
    let format = match config.logging.format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    };
    lines.push(render("logging.format", format));

    CommandResult::rendered(0, lines.join("\n"))
}

fn render(key: &str, value: &str) -> String {
    format!("  {key} = {value}")
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return "(empty)".to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}…(redacted, {} chars)", secret.chars().count())
}
