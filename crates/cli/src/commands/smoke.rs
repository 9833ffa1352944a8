use std::time::Instant;

use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::CommandResult;
use venta_core::config::{AppConfig, LoadOptions};
use venta_db::{connect_with_settings, migrations, SettingsRepository};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config_check_started = Instant::now();
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms: config_check_started.elapsed().as_millis() as u64,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err(error) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms: config_check_started.elapsed().as_millis() as u64,
                message: error.to_string(),
            });
            checks.push(skipped("whatsapp_credential_sanity"));
            checks.push(skipped("db_connectivity"));
            checks.push(skipped("profile_visibility"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let credential_check_started = Instant::now();
    let access_ok = !config.whatsapp.access_token.expose_secret().trim().is_empty();
    let phone_ok = !config.whatsapp.phone_number_id.trim().is_empty();
    checks.push(SmokeCheck {
        name: "whatsapp_credential_sanity",
        status: if access_ok && phone_ok { SmokeStatus::Pass } else { SmokeStatus::Fail },
        elapsed_ms: credential_check_started.elapsed().as_millis() as u64,
        message: if access_ok && phone_ok {
            "access token and phone number id are present".to_string()
        } else {
            "whatsapp credentials are incomplete".to_string()
        },
    });

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(skipped("profile_visibility"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    runtime.block_on(async {
        let db_check_started = Instant::now();
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => {
                match migrations::run_pending(&pool).await {
                    Ok(()) => checks.push(SmokeCheck {
                        name: "db_connectivity",
                        status: SmokeStatus::Pass,
                        elapsed_ms: db_check_started.elapsed().as_millis() as u64,
                        message: "connected and migrations applied".to_string(),
                    }),
                    Err(error) => {
                        checks.push(SmokeCheck {
                            name: "db_connectivity",
                            status: SmokeStatus::Fail,
                            elapsed_ms: db_check_started.elapsed().as_millis() as u64,
                            message: format!("migration failure: {error}"),
                        });
                        checks.push(skipped("profile_visibility"));
                        return;
                    }
                }
                pool
            }
            Err(error) => {
                checks.push(SmokeCheck {
                    name: "db_connectivity",
                    status: SmokeStatus::Fail,
                    elapsed_ms: db_check_started.elapsed().as_millis() as u64,
                    message: error.to_string(),
                });
                checks.push(skipped("profile_visibility"));
                return;
            }
        };

        let profile_check_started = Instant::now();
        match SettingsRepository::new(pool.clone()).load_profile().await {
            Ok(profile) => checks.push(SmokeCheck {
                name: "profile_visibility",
                status: SmokeStatus::Pass,
                elapsed_ms: profile_check_started.elapsed().as_millis() as u64,
                message: if profile.system_prompt.trim().is_empty() {
                    "profile loads (system prompt not configured yet)".to_string()
                } else {
                    "profile loads with a configured system prompt".to_string()
                },
            }),
            Err(error) => checks.push(SmokeCheck {
                name: "profile_visibility",
                status: SmokeStatus::Fail,
                elapsed_ms: profile_check_started.elapsed().as_millis() as u64,
                message: error.to_string(),
            }),
        }

        pool.close().await;
    });

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped because an earlier check failed".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let all_pass = checks.iter().all(|check| check.status == SmokeStatus::Pass);
    let status = if all_pass { SmokeStatus::Pass } else { SmokeStatus::Fail };
    let summary = if all_pass {
        "smoke: all readiness checks passed".to_string()
    } else {
        "smoke: one or more readiness checks failed".to_string()
    };

    let report = SmokeReport { command: "smoke", status, summary, total_elapsed_ms, checks };
    let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed: {}\"}}",
            error.to_string().replace('"', "\\\"")
        )
    });

    CommandResult::rendered(if all_pass { 0 } else { 1 }, output)
}
