//! logwatch.toml 통합 테스트
//!
//! - logwatch.toml.example 파싱/검증 및 코드 기본값과의 일치
//! - 부분 설정 시 기본값 사용
//! - 환경변수가 파일보다 우선
//! - 빈 파일 / 잘못된 파일

use logwatch_core::config::{LogwatchConfig, PluginSpec, WatcherConfig};
use logwatch_core::error::{ConfigError, LogwatchError};
use serial_test::serial;

const EXAMPLE: &str = include_str!("../../../logwatch.toml.example");

// =============================================================================
// logwatch.toml.example
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = LogwatchConfig::parse(EXAMPLE).expect("example config should parse");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert!(config.general.pid_file.is_empty());
}

#[test]
fn example_config_passes_validation() {
    let config = LogwatchConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
    for watcher in &config.watchers {
        watcher
            .validate()
            .unwrap_or_else(|e| panic!("watcher {} should validate: {e}", watcher.name));
    }
}

#[test]
fn example_config_matches_code_defaults() {
    let from_file = LogwatchConfig::parse(EXAMPLE).expect("should parse");
    let from_code = LogwatchConfig::default();

    assert_eq!(from_file.general.log_level, from_code.general.log_level);
    assert_eq!(from_file.general.log_format, from_code.general.log_format);
    assert_eq!(from_file.general.log_file, from_code.general.log_file);
    assert_eq!(from_file.general.debug, from_code.general.debug);

    assert_eq!(
        from_file.supervisor.monitor_interval_ms,
        from_code.supervisor.monitor_interval_ms
    );
    assert_eq!(
        from_file.supervisor.stop_poll_interval_ms,
        from_code.supervisor.stop_poll_interval_ms
    );
    assert_eq!(
        from_file.supervisor.stop_attempts,
        from_code.supervisor.stop_attempts
    );

    assert_eq!(from_file.metrics.enabled, from_code.metrics.enabled);
    assert_eq!(from_file.metrics.listen_addr, from_code.metrics.listen_addr);
    assert_eq!(from_file.metrics.port, from_code.metrics.port);
    assert_eq!(from_file.metrics.endpoint, from_code.metrics.endpoint);
}

#[test]
fn example_config_watchers() {
    let config = LogwatchConfig::parse(EXAMPLE).expect("should parse");
    assert_eq!(config.watchers.len(), 2);

    let ssh = &config.watchers[0];
    assert_eq!(ssh.name, "ssh-failures");
    assert!(ssh.respawn);
    assert_eq!(ssh.producer.kind, "tail");
    assert_eq!(ssh.filters[0].kind, "grep");
    assert_eq!(ssh.consumers[0].kind, "syslog");

    let kernel = &config.watchers[1];
    assert!(!kernel.enabled);
    assert!(!kernel.synchronous);
    assert_eq!(kernel.conditioners.len(), 1);
    assert_eq!(
        kernel.conditioners[0]
            .params
            .get("replace")
            .and_then(|v| v.as_str()),
        Some("<\\1>")
    );
}

// =============================================================================
// 부분 설정
// =============================================================================

#[test]
fn partial_config_general_only() {
    let toml = r#"
[general]
log_level = "debug"
log_format = "json"
"#;
    let config = LogwatchConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.supervisor.stop_attempts, 12);
    assert!(!config.metrics.enabled);
    assert!(config.watchers.is_empty());
}

#[test]
fn partial_config_watcher_defaults() {
    let toml = r#"
[[watchers]]
name = "minimal"
producer = { kind = "read", file = "/dev/null" }
consumers = [{ kind = "write", file = "/dev/null" }]
"#;
    let config = LogwatchConfig::parse(toml).expect("should parse");
    let w = &config.watchers[0];
    assert!(w.enabled);
    assert!(!w.verbose);
    assert!(!w.respawn);
    assert!(w.synchronous);
    assert!(w.blocking);
    assert_eq!(w.timeout_secs, 5.0);
    assert_eq!(w.respawn_delay_secs, 0.0);
    assert!(w.filters.is_empty());
    assert!(w.conditioners.is_empty());
}

#[test]
fn watcher_built_in_code_equals_parsed_watcher_params() {
    let toml = r#"
[[watchers]]
name = "w"
producer = { kind = "tail", file = "/var/log/syslog" }
consumers = [{ kind = "write", file = "/tmp/out" }]
"#;
    let parsed = LogwatchConfig::parse(toml).expect("should parse");

    let mut producer_params = toml::Table::new();
    producer_params.insert("file".into(), "/var/log/syslog".into());
    let built = WatcherConfig::new("w", PluginSpec::new("tail", producer_params));

    assert_eq!(parsed.watchers[0].producer, built.producer);
}

// =============================================================================
// 환경변수 우선순위
// =============================================================================

#[tokio::test]
#[serial]
async fn env_overrides_file_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logwatch.toml");
    std::fs::write(&path, "[general]\nlog_level = \"info\"\n").expect("write");

    // SAFETY: 환경변수 테스트는 직렬 실행됨
    unsafe { std::env::set_var("LOGWATCH_GENERAL_LOG_LEVEL", "error") };
    let result = LogwatchConfig::load(&path).await;
    unsafe { std::env::remove_var("LOGWATCH_GENERAL_LOG_LEVEL") };

    let config = result.expect("should load");
    assert_eq!(config.general.log_level, "error");
}

#[tokio::test]
#[serial]
async fn invalid_env_override_fails_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logwatch.toml");
    std::fs::write(&path, "").expect("write");

    // SAFETY: 환경변수 테스트는 직렬 실행됨
    unsafe { std::env::set_var("LOGWATCH_GENERAL_LOG_FORMAT", "xml") };
    let result = LogwatchConfig::load(&path).await;
    unsafe { std::env::remove_var("LOGWATCH_GENERAL_LOG_FORMAT") };

    assert!(matches!(
        result,
        Err(LogwatchError::Config(ConfigError::InvalidValue { .. }))
    ));
}

// =============================================================================
// 에러
// =============================================================================

#[test]
fn empty_file_is_default_config() {
    let config = LogwatchConfig::parse("").expect("empty is valid");
    config.validate().expect("defaults validate");
}

#[test]
fn wrong_type_is_parse_error() {
    let toml = "[supervisor]\nstop_attempts = \"many\"\n";
    let err = LogwatchConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        LogwatchError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[tokio::test]
async fn load_missing_file_is_not_found() {
    let err = LogwatchConfig::load("/nonexistent/logwatch.toml")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
}
