//! 설정 관리 -- logwatch.toml 파싱 및 런타임 설정
//!
//! [`LogwatchConfig`]는 최상위 구조체입니다. 전역 섹션(`general`, `supervisor`,
//! `metrics`)은 로드 시 검증하고, 각 `[[watchers]]` 항목은 supervisor가 spawn할 때
//! 개별적으로 검증합니다. 잘못된 watcher 하나가 나머지의 시작을 막지 않습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGWATCH_GENERAL_LOG_LEVEL=debug` 형식)
//! 3. 설정 파일
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logwatch_core::error::LogwatchError> {
//! use logwatch_core::config::LogwatchConfig;
//!
//! let config = LogwatchConfig::load("/etc/logwatch/logwatch.toml").await?;
//! for watcher in &config.watchers {
//!     println!("{} <- {}", watcher.name, watcher.producer.kind);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogwatchError};
use crate::plugin::PluginParams;

/// `logwatch.toml`의 최상위 구조
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogwatchConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// watcher 정의 (파일 순서대로)
    #[serde(default)]
    pub watchers: Vec<WatcherConfig>,
}

impl LogwatchConfig {
    /// 파일을 읽고 환경변수 오버라이드를 적용한 뒤 전역 섹션을 검증합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 환경변수 오버라이드나 검증 없이 파일을 읽어 파싱만 합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogwatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            LogwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// `LOGWATCH_{SECTION}_{FIELD}` 환경변수를 적용합니다.
    ///
    /// watcher는 환경변수로 오버라이드할 수 없습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGWATCH_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.log_file, "LOGWATCH_GENERAL_LOG_FILE");
        override_string(&mut self.general.pid_file, "LOGWATCH_GENERAL_PID_FILE");
        override_bool(&mut self.general.debug, "LOGWATCH_GENERAL_DEBUG");

        // Supervisor
        override_u64(
            &mut self.supervisor.monitor_interval_ms,
            "LOGWATCH_SUPERVISOR_MONITOR_INTERVAL_MS",
        );
        override_u64(
            &mut self.supervisor.stop_poll_interval_ms,
            "LOGWATCH_SUPERVISOR_STOP_POLL_INTERVAL_MS",
        );
        override_u32(
            &mut self.supervisor.stop_attempts,
            "LOGWATCH_SUPERVISOR_STOP_ATTEMPTS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGWATCH_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGWATCH_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "LOGWATCH_METRICS_ENDPOINT");
    }

    /// 전역 섹션을 검증합니다.
    pub fn validate(&self) -> Result<(), LogwatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.supervisor.monitor_interval_ms == 0 {
            return Err(invalid("supervisor.monitor_interval_ms", "must be > 0"));
        }
        if self.supervisor.stop_poll_interval_ms == 0 {
            return Err(invalid("supervisor.stop_poll_interval_ms", "must be > 0"));
        }
        if self.supervisor.stop_attempts == 0 {
            return Err(invalid("supervisor.stop_attempts", "must be > 0"));
        }

        if self.metrics.enabled {
            if !self.metrics.endpoint.starts_with('/') {
                return Err(invalid("metrics.endpoint", "must start with '/'"));
            }
            if self.metrics.listen_addr.is_empty() {
                return Err(invalid("metrics.listen_addr", "must not be empty"));
            }
        }

        Ok(())
    }

    /// 플래그 또는 로그 레벨 기준으로 디버그 출력이 켜져 있는지 여부
    pub fn debug_enabled(&self) -> bool {
        self.general.debug || self.general.log_level == "debug" || self.general.log_level == "trace"
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> LogwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// `[general]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// trace, debug, info, warn, error
    pub log_level: String,
    /// json, pretty
    pub log_format: String,
    /// 로그 출력 경로. 비어 있으면 stderr
    pub log_file: String,
    /// PID 파일 경로. 비어 있으면 작성하지 않음
    pub pid_file: String,
    /// 디버그 모드 (debug 레벨 강제 + 플러그인 디버그 출력)
    pub debug: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            log_file: String::new(),
            pid_file: String::new(),
            debug: false,
        }
    }
}

/// `[supervisor]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// liveness 확인 주기
    pub monitor_interval_ms: u64,
    /// drain 중 liveness 폴링 간격
    pub stop_poll_interval_ms: u64,
    /// 멈춘 watcher를 포기하기 전까지의 폴링 횟수
    pub stop_attempts: u32,
}

impl SupervisorConfig {
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            monitor_interval_ms: 5000,
            stop_poll_interval_ms: 5000,
            stop_attempts: 12,
        }
    }
}

/// `[metrics]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
    pub port: u16,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9108,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// ─── Watchers ────────────────────────────────────────────────────────

/// 플러그인 인스턴스 하나 -- 레지스트리 `kind`와 자체 파라미터
///
/// ```toml
/// producer = { kind = "tail", file = "/var/log/auth.log" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub kind: String,
    #[serde(flatten)]
    pub params: toml::Table,
}

impl PluginSpec {
    pub fn new(kind: impl Into<String>, params: toml::Table) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    /// 플러그인 팩토리에 전달되는 파라미터
    pub fn params(&self) -> PluginParams {
        PluginParams::new(self.params.clone())
    }
}

/// `timeout_secs`, `respawn_delay_secs`의 상한 (하루)
pub const MAX_WAIT_SECS: f64 = 86_400.0;

/// `[[watchers]]` 항목 하나
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatcherConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 디스패치 결과를 모두 debug 레벨로 기록
    #[serde(default)]
    pub verbose: bool,
    /// producer 실패 시 재시작하고, 처리 오류 후에도 디스패치 계속
    #[serde(default)]
    pub respawn: bool,
    #[serde(default)]
    pub respawn_delay_secs: f64,
    /// feed bridge 없이 producer 스레드에서 바로 디스패치
    #[serde(default = "default_true")]
    pub synchronous: bool,
    /// bridge가 바쁠 때 줄을 버리지 않고 대기
    #[serde(default = "default_true")]
    pub blocking: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    pub producer: PluginSpec,
    #[serde(default)]
    pub filters: Vec<PluginSpec>,
    #[serde(default)]
    pub conditioners: Vec<PluginSpec>,
    #[serde(default)]
    pub consumers: Vec<PluginSpec>,
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> f64 {
    5.0
}

impl WatcherConfig {
    /// 기본 옵션에 filter/conditioner/consumer가 없는 watcher 정의를 생성합니다.
    pub fn new(name: impl Into<String>, producer: PluginSpec) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            verbose: false,
            respawn: false,
            respawn_delay_secs: 0.0,
            synchronous: true,
            blocking: true,
            timeout_secs: default_timeout_secs(),
            producer,
            filters: Vec::new(),
            conditioners: Vec::new(),
            consumers: Vec::new(),
        }
    }

    /// watcher별 규칙을 검사합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let field = |f: &str| {
            if self.name.is_empty() {
                format!("watchers.{f}")
            } else {
                format!("watchers.{}.{f}", self.name)
            }
        };

        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field("name"),
                reason: "must not be empty".to_owned(),
            });
        }
        if !self.timeout_secs.is_finite()
            || self.timeout_secs <= 0.0
            || self.timeout_secs > MAX_WAIT_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: field("timeout_secs"),
                reason: format!(
                    "must be in (0, {MAX_WAIT_SECS}], got {}",
                    self.timeout_secs
                ),
            });
        }
        if !self.respawn_delay_secs.is_finite()
            || self.respawn_delay_secs < 0.0
            || self.respawn_delay_secs > MAX_WAIT_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: field("respawn_delay_secs"),
                reason: format!(
                    "must be in [0, {MAX_WAIT_SECS}], got {}",
                    self.respawn_delay_secs
                ),
            });
        }
        if self.producer.kind.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field("producer.kind"),
                reason: "must not be empty".to_owned(),
            });
        }
        if self.consumers.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field("consumers"),
                reason: "at least one consumer is required".to_owned(),
            });
        }
        Ok(())
    }

    /// bridge 대기 타임아웃
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::from_secs(5))
    }

    /// respawn된 producer가 다시 시작하기 전 대기 시간
    pub fn respawn_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.respawn_delay_secs).unwrap_or(Duration::ZERO)
    }
}

// ─── 환경변수 오버라이드 헬퍼 ─────────────────────────────────────────

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key);
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key);
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key);
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key);
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = std::any::type_name::<T>(),
                "failed to parse env var, ignoring"
            ),
        }
    }
}
