use rask_log_batcher::app::{Config, ConfigError, LogLevel, ShipperConfig};
use serial_test::serial;
use std::{env, time::Duration};
use tempfile::TempDir;

fn clean_all_env_vars() {
    let env_vars = [
        "AWS_REGION",
        "AWS_DEFAULT_REGION",
        "CREATE_LOG_GROUP",
        "LOG_GROUP_NAME",
        "LOG_STREAM_NAME",
        "MAX_BATCH_SIZE",
        "POLL_INTERVAL_MS",
        "LOGS_ENDPOINT",
        "REQUEST_TIMEOUT_SECS",
        "LOGGER_NAME",
        "LOG_LEVEL",
        "LOG_DIRECTIVES",
        "CONFIG_FILE",
    ];

    unsafe {
        for var in &env_vars {
            env::remove_var(var);
        }
    }
}

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("batcher.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_config_defaults_from_empty_environment() {
    clean_all_env_vars();

    let config = Config::from_env().unwrap();

    assert_eq!(config.region(), "us-east-1");
    assert!(!config.create_log_group);
    assert_eq!(config.log_group_name, "test-log-group");
    assert_eq!(config.log_stream_name, None);
    assert_eq!(config.max_batch_size, 1024);
    assert_eq!(config.poll_interval, Duration::from_millis(3000));
    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert_eq!(config.logger_name, "stdin");
    assert_eq!(config.log_level, LogLevel::Info);
}

#[test]
#[serial]
fn test_config_from_environment() {
    clean_all_env_vars();
    unsafe {
        env::set_var("AWS_REGION", "eu-west-1");
        env::set_var("CREATE_LOG_GROUP", "yes");
        env::set_var("LOG_GROUP_NAME", "/app/payments");
        env::set_var("LOG_STREAM_NAME", "node-1");
        env::set_var("MAX_BATCH_SIZE", "250");
        env::set_var("POLL_INTERVAL_MS", "500");
        env::set_var("LOGS_ENDPOINT", "http://localhost:4566");
        env::set_var("LOG_LEVEL", "debug");
    }

    let config = Config::from_env().unwrap();

    assert_eq!(config.region(), "eu-west-1");
    assert!(config.create_log_group);
    assert_eq!(config.log_group_name, "/app/payments");
    assert_eq!(config.log_stream_name.as_deref(), Some("node-1"));
    assert_eq!(config.max_batch_size, 250);
    assert_eq!(config.poll_interval, Duration::from_millis(500));
    assert_eq!(config.endpoint.as_deref(), Some("http://localhost:4566"));
    assert_eq!(config.log_level, LogLevel::Debug);

    clean_all_env_vars();
}

#[test]
#[serial]
fn test_invalid_environment_value() {
    clean_all_env_vars();
    unsafe {
        env::set_var("MAX_BATCH_SIZE", "lots");
    }

    let result = Config::from_env();
    assert!(matches!(result, Err(ConfigError::EnvError(_))));

    clean_all_env_vars();
}

#[test]
#[serial]
fn test_batch_size_over_service_limit_rejected() {
    clean_all_env_vars();
    unsafe {
        env::set_var("MAX_BATCH_SIZE", "10001");
    }

    let result = Config::from_env();
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));

    clean_all_env_vars();
}

#[test]
#[serial]
fn test_default_region_fallback() {
    clean_all_env_vars();
    unsafe {
        env::set_var("AWS_DEFAULT_REGION", "ap-northeast-1");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.region(), "ap-northeast-1");

    unsafe {
        env::set_var("AWS_REGION", "us-west-2");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.region(), "us-west-2");

    clean_all_env_vars();
}

#[test]
#[serial]
fn test_config_from_args() {
    clean_all_env_vars();
    let args = vec![
        "rask-log-batcher",
        "--region",
        "eu-central-1",
        "--log-group-name",
        "cli-group",
        "--log-stream-name",
        "cli-stream",
        "--max-batch-size",
        "64",
        "--poll-interval-ms",
        "750",
        "--create-log-group",
        "--log-level",
        "warn",
    ];

    let config = Config::from_args(args).unwrap();

    assert_eq!(config.region(), "eu-central-1");
    assert_eq!(config.log_group_name, "cli-group");
    assert_eq!(config.log_stream_name.as_deref(), Some("cli-stream"));
    assert_eq!(config.max_batch_size, 64);
    assert_eq!(config.poll_interval, Duration::from_millis(750));
    assert!(config.create_log_group);
    assert_eq!(config.log_level, LogLevel::Warn);
}

#[test]
#[serial]
fn test_config_from_args_rejects_illegal_stream_name() {
    clean_all_env_vars();
    let args = vec!["rask-log-batcher", "--log-stream-name", "bad:name"];

    let result = Config::from_args(args);
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
#[serial]
fn test_log_directives_from_args_and_environment() {
    clean_all_env_vars();
    let config = Config::from_args([
        "rask-log-batcher",
        "--log-directive",
        "hyper=debug",
        "--log-directive",
        "rask_log_batcher::sender=trace",
    ])
    .unwrap();
    assert_eq!(
        config.log_directives,
        vec!["hyper=debug", "rask_log_batcher::sender=trace"]
    );

    unsafe {
        env::set_var("LOG_DIRECTIVES", "h2=error, reqwest=info,");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.log_directives, vec!["h2=error", "reqwest=info"]);

    clean_all_env_vars();
}

#[test]
#[serial]
fn test_command_line_errors_are_returned() {
    clean_all_env_vars();

    let unknown = Config::from_args_and_env(["rask-log-batcher", "--no-such-flag"]);
    assert!(matches!(unknown, Err(ConfigError::InvalidConfig(_))));

    let bad_number = Config::from_args_and_env(["rask-log-batcher", "--max-batch-size", "x"]);
    assert!(matches!(bad_number, Err(ConfigError::InvalidConfig(_))));

    match Config::from_args_and_env(["rask-log-batcher", "--help"]) {
        Err(ConfigError::DisplayRequested(text)) => assert!(text.contains("--log-directive")),
        other => panic!("expected help output, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_config_from_file() {
    clean_all_env_vars();
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        &temp_dir,
        r#"
region = "sa-east-1"
log_group_name = "file-group"
max_batch_size = 500
poll_interval_ms = 1500
log_level = "error"
log_directives = ["hyper=info"]
"#,
    );

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.region(), "sa-east-1");
    assert_eq!(config.log_group_name, "file-group");
    assert_eq!(config.max_batch_size, 500);
    assert_eq!(config.poll_interval, Duration::from_millis(1500));
    assert_eq!(config.log_level, LogLevel::Error);
    assert_eq!(config.log_directives, vec!["hyper=info"]);
    // unset keys keep their defaults
    assert_eq!(config.logger_name, "stdin");
    assert_eq!(config.request_timeout, Duration::from_secs(30));
}

#[test]
#[serial]
fn test_config_from_missing_or_broken_file() {
    clean_all_env_vars();
    let temp_dir = TempDir::new().unwrap();

    let missing = Config::from_file(temp_dir.path().join("absent.toml"));
    assert!(matches!(missing, Err(ConfigError::FileError(_))));

    let path = write_config(&temp_dir, "max_batch_size = \"many\"");
    let broken = Config::from_file(&path);
    assert!(matches!(broken, Err(ConfigError::ParseError(_))));
}

#[test]
#[serial]
fn test_command_line_overrides_file() {
    clean_all_env_vars();
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        &temp_dir,
        r#"
log_group_name = "file-group"
max_batch_size = 500
poll_interval_ms = 1500
"#,
    );

    let config = Config::from_args_and_env([
        "rask-log-batcher",
        "--config-file",
        path.to_str().unwrap(),
        "--max-batch-size",
        "20",
    ])
    .unwrap();

    assert_eq!(config.max_batch_size, 20);
    assert_eq!(config.log_group_name, "file-group");
    assert_eq!(config.poll_interval, Duration::from_millis(1500));
}

#[test]
#[serial]
fn test_shipper_config_from_config() {
    clean_all_env_vars();
    let config = Config::from_args([
        "rask-log-batcher",
        "--region",
        "eu-north-1",
        "--log-group-name",
        "g",
        "--max-batch-size",
        "10",
        "--poll-interval-ms",
        "100",
    ])
    .unwrap();

    let shipper_config = ShipperConfig::from(&config);

    assert_eq!(shipper_config.region, "eu-north-1");
    assert_eq!(shipper_config.log_group_name, "g");
    assert_eq!(shipper_config.log_stream_name, None);
    assert_eq!(shipper_config.max_batch_size, 10);
    assert_eq!(shipper_config.poll_interval, Duration::from_millis(100));
    assert!(shipper_config.validate().is_ok());
}
