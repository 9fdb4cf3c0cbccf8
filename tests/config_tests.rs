use coursehub::{AppConfig, config::Env};
use serial_test::serial;
use std::{env, panic};

const VARS: &[&str] = &[
    "APP_ENV",
    "DATABASE_URL",
    "JWT_SECRET",
    "JWT_TTL_HOURS",
    "BIND_ADDR",
    "S3_ENDPOINT",
    "S3_ACCESS_KEY",
    "S3_SECRET_KEY",
    "PAYOS_CLIENT_ID",
    "PAYOS_API_KEY",
    "PAYOS_CHECKSUM_KEY",
    "PAYMENT_RETURN_URL",
    "PAYMENT_CANCEL_URL",
    "REMINDER_HOUR_UTC",
    "ATTEMPT_SWEEP_SECONDS",
    "REQUIRE_TEACHER_SUBSCRIPTION",
];

/// Runs `test` with only `vars` set (among `VARS`), then restores the environment.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> =
        VARS.iter().map(|&var| (var, env::var(var).ok())).collect();

    unsafe {
        for var in VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    unsafe {
        for (key, original) in originals {
            match original {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

#[test]
#[serial]
fn test_local_defaults() {
    let config = run_with_env(&[("DATABASE_URL", "postgres://u:p@localhost/db")], AppConfig::load);

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert_eq!(config.jwt_ttl_hours, 24);
    assert_eq!(config.reminder_hour_utc, 1);
    assert_eq!(config.attempt_sweep_seconds, 60);
    assert!(config.require_teacher_subscription);
    assert_eq!(config.payos.base_url, "https://api-merchant.payos.vn");
    assert_eq!(config.s3_endpoint, "http://localhost:9000");
    assert!(!config.jwt_secret.is_empty());
}

#[test]
#[serial]
fn test_overrides_are_parsed_and_clamped() {
    let config = run_with_env(
        &[
            ("DATABASE_URL", "postgres://u:p@localhost/db"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("REMINDER_HOUR_UTC", "30"),
            ("ATTEMPT_SWEEP_SECONDS", "0"),
            ("REQUIRE_TEACHER_SUBSCRIPTION", "false"),
            ("JWT_TTL_HOURS", "not-a-number"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.bind_addr, "127.0.0.1:8080");
    assert_eq!(config.reminder_hour_utc, 23);
    assert_eq!(config.attempt_sweep_seconds, 1);
    assert!(!config.require_teacher_subscription);
    assert_eq!(config.jwt_ttl_hours, 24);
}

#[test]
#[serial]
fn test_production_fails_fast_without_secrets() {
    let result = run_with_env(
        &[("APP_ENV", "production"), ("DATABASE_URL", "postgres://u:p@host/db"), ("JWT_SECRET", "s")],
        || panic::catch_unwind(AppConfig::load),
    );
    assert!(result.is_err(), "production config must panic without PayOS/S3 secrets");
}

#[test]
#[serial]
fn test_production_loads_with_all_secrets() {
    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://u:p@host/db"),
            ("JWT_SECRET", "prod-secret"),
            ("S3_ENDPOINT", "https://s3.example.com"),
            ("S3_ACCESS_KEY", "key"),
            ("S3_SECRET_KEY", "secret"),
            ("PAYOS_CLIENT_ID", "client"),
            ("PAYOS_API_KEY", "api"),
            ("PAYOS_CHECKSUM_KEY", "checksum"),
            ("PAYMENT_RETURN_URL", "https://app.example.com/ok"),
            ("PAYMENT_CANCEL_URL", "https://app.example.com/cancel"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "prod-secret");
    assert_eq!(config.s3_endpoint, "https://s3.example.com");
    assert_eq!(config.payos.checksum_key, "checksum");
}
