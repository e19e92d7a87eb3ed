use std::env;
use std::sync::{Mutex, OnceLock};

use marketer_cli::commands::{doctor, grant, migrate, status};
use serde_json::Value;

const BOT_TOKEN: (&str, &str) = ("MARKETER_TELEGRAM_BOT_TOKEN", "123456:test-token");

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[BOT_TOKEN, ("MARKETER_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_bot_token() {
    with_env(&[("MARKETER_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn grant_then_status_reports_the_active_tariff() {
    let directory = tempfile::tempdir().expect("temp dir");
    let database_url = format!("sqlite://{}", directory.path().join("marketer.db").display());

    with_env(&[BOT_TOKEN, ("MARKETER_DATABASE_URL", database_url.as_str())], || {
        let granted = grant::run("4242", "content_studio");
        assert_eq!(granted.exit_code, 0, "grant failed: {}", granted.output);
        let payload = parse_payload(&granted.output);
        assert_eq!(payload["data"]["tariff"], "content_studio");
        assert!(payload["data"]["expires_at"].is_string());

        let reported = status::run("4242");
        assert_eq!(reported.exit_code, 0, "status failed: {}", reported.output);
        let payload = parse_payload(&reported.output);
        assert_eq!(payload["data"]["known"], true);
        assert_eq!(payload["data"]["status_label"], "Content Studio (days left: 30)");
        assert_eq!(payload["data"]["usage"]["images"], 0);
    });
}

#[test]
fn status_for_unknown_user_is_free_mode() {
    let directory = tempfile::tempdir().expect("temp dir");
    let database_url = format!("sqlite://{}", directory.path().join("marketer.db").display());

    with_env(&[BOT_TOKEN, ("MARKETER_DATABASE_URL", database_url.as_str())], || {
        let result = status::run("777");
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["message"], "Free mode");
        assert_eq!(payload["data"]["known"], false);
    });
}

#[test]
fn grant_rejects_codes_outside_the_catalog() {
    with_env(&[BOT_TOKEN, ("MARKETER_DATABASE_URL", "sqlite::memory:")], || {
        let result = grant::run("4242", "pro");
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_argument");
        assert!(payload["message"].as_str().unwrap_or_default().contains("marketing_pro"));
    });
}

#[test]
fn doctor_reports_every_check_as_json() {
    with_env(&[BOT_TOKEN, ("MARKETER_DATABASE_URL", "sqlite::memory:")], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(
            names,
            vec!["config_validation", "bot_token_readiness", "database_connectivity", "migrations"]
        );
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][3]["status"], "skipped");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "MARKETER_DATABASE_URL",
        "MARKETER_DATABASE_MAX_CONNECTIONS",
        "MARKETER_DATABASE_TIMEOUT_SECS",
        "MARKETER_TELEGRAM_BOT_TOKEN",
        "MARKETER_TELEGRAM_API_BASE_URL",
        "MARKETER_LLM_PROVIDER",
        "MARKETER_LLM_API_KEY",
        "MARKETER_LLM_BASE_URL",
        "MARKETER_LLM_MODEL",
        "MARKETER_LLM_TIMEOUT_SECS",
        "MARKETER_LLM_MAX_RETRIES",
        "MARKETER_PAYMENTS_ENABLED",
        "MARKETER_PAYMENTS_SHOP_ID",
        "MARKETER_PAYMENTS_API_KEY",
        "MARKETER_PAYMENTS_WEBHOOK_SECRET",
        "MARKETER_SUBSCRIPTION_DURATION_DAYS",
        "MARKETER_SERVER_BIND_ADDRESS",
        "MARKETER_SERVER_HEALTH_CHECK_PORT",
        "MARKETER_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "MARKETER_LOGGING_LEVEL",
        "MARKETER_LOGGING_FORMAT",
        "MARKETER_LOG_LEVEL",
        "MARKETER_LOG_FORMAT",
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
