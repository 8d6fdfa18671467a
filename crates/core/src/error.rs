//! 에러 타입 -- 도메인별 enum
//!
//! 라이브러리 크레이트는 `Result`로 이 타입들을 반환하고, 데몬 바이너리는
//! 최상위에서 `anyhow`로 감쌉니다.

use std::fmt;

/// logwatch 최상위 에러
#[derive(Debug, thiserror::Error)]
pub enum LogwatchError {
    /// 설정 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 플러그인 생성/처리 에러
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// watcher 생명주기 에러
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// feed 핸드오프 에러
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 파일 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일이 존재하지 않음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// TOML 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 값은 있지만 허용되지 않음
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 플러그인 역할 -- 레지스트리 조회와 로그 컨텍스트에 사용됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluginRole {
    Producer,
    Filter,
    Conditioner,
    Consumer,
}

impl fmt::Display for PluginRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => write!(f, "producer"),
            Self::Filter => write!(f, "filter"),
            Self::Conditioner => write!(f, "conditioner"),
            Self::Consumer => write!(f, "consumer"),
        }
    }
}

/// 플러그인이 발생시키는 에러
///
/// `Config`, `Unknown`, `AlreadyRegistered`는 설정 오류이며 watcher 조립 중에만
/// 발생합니다. `Io`와 `Failed`는 `feed`/`run`에서 발생하는 처리 오류이며
/// watcher의 respawn 정책으로 처리됩니다.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// 잘못되었거나 누락된 플러그인 파라미터
    #[error("invalid configuration for plugin '{plugin}': {reason}")]
    Config { plugin: String, reason: String },

    /// 이 이름으로 등록된 플러그인 없음
    #[error("unknown {role} plugin '{kind}'")]
    Unknown { role: PluginRole, kind: String },

    /// 중복 등록
    #[error("{role} plugin '{kind}' already registered")]
    AlreadyRegistered { role: PluginRole, kind: String },

    /// 처리 중 I/O 실패
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 그 밖의 처리 실패
    #[error("{0}")]
    Failed(String),
}

impl PluginError {
    /// 설정 오류 생성 헬퍼
    pub fn config(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    /// 설정 오류인지 여부 (처리 오류가 아니라)
    pub fn is_config_fault(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::Unknown { .. } | Self::AlreadyRegistered { .. }
        )
    }
}

/// producer -> dispatcher 핸드오프 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// 단일 in-flight 슬롯이 아직 사용 중
    #[error("dispatcher is still processing the previous line")]
    Busy,

    /// watcher 정지 요청됨
    #[error("watcher is stopping")]
    Stopped,
}

/// watcher 조립 및 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// producer 미설정
    #[error("watcher '{name}' has no producer")]
    NoProducer { name: String },

    /// consumer 미설정
    #[error("watcher '{name}' has no consumer")]
    NoConsumer { name: String },

    /// 이미 실행 중인데 `run()` 호출
    #[error("watcher '{name}' is already running")]
    AlreadyRunning { name: String },

    /// 플러그인 생성 실패
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// watcher 정의가 잘못됨
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// OS가 워커 스레드 생성을 거부함
    #[error("failed to spawn thread for watcher '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "general.log_level".to_owned(),
            reason: "unknown level".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("general.log_level"));
        assert!(msg.contains("unknown level"));
    }

    #[test]
    fn plugin_error_unknown_mentions_role_and_kind() {
        let err = PluginError::Unknown {
            role: PluginRole::Filter,
            kind: "nope".to_owned(),
        };
        assert_eq!(err.to_string(), "unknown filter plugin 'nope'");
        assert!(err.is_config_fault());
    }

    #[test]
    fn processing_faults_are_not_config_faults() {
        assert!(!PluginError::Failed("boom".to_owned()).is_config_fault());
        let io = std::io::Error::other("disk full");
        assert!(!PluginError::from(io).is_config_fault());
    }

    #[test]
    fn converts_into_logwatch_error() {
        let err: LogwatchError = WatcherError::NoConsumer {
            name: "ssh".to_owned(),
        }
        .into();
        assert!(matches!(err, LogwatchError::Watcher(_)));
        assert!(err.to_string().contains("ssh"));
    }

    #[test]
    fn plugin_error_is_transparent_inside_watcher_error() {
        let err: WatcherError = PluginError::config("grep", "missing 'pattern'").into();
        assert_eq!(
            err.to_string(),
            "invalid configuration for plugin 'grep': missing 'pattern'"
        );
    }
}
