//! 플러그인 역할 계약
//!
//! watcher는 네 종류의 플러그인으로 조립되며, 각 역할은 별도의 trait입니다.
//!
//! ```text
//! Producer --(LineSink)--> Filter* --> Conditioner* --> Consumer+
//! ```
//!
//! 플러그인 인스턴스는 정확히 하나의 역할만 구현하고, 자신이 연 자원(파일, 소켓)을
//! 소유하며, 하나의 watcher에 속합니다. 자원은 watcher가 플러그인을 drop할 때
//! 해제됩니다.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{ConfigError, PluginError};
use crate::record::Record;

// ─── Producer side ───────────────────────────────────────────────────

/// [`LineSink`]에 넘긴 줄의 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 디스패치 체인 전체를 통과함
    Dispatched,
    /// 넘겨졌지만 non-blocking 대기 시간 안에 디스패치가 끝나지 않음.
    /// 아직 처리 중입니다.
    InFlight,
    /// 이전 줄을 처리하느라 디스패처가 바빴고 producer가 non-blocking이라
    /// 이 줄은 버려짐
    Dropped,
    /// watcher가 정지 중. 처리되지 않음
    Stopped,
}

/// [`Producer`]에게 주어지는 feed 프리미티브
///
/// 구현체는 줄을 인라인(동기 producer)으로, 또는 단일 슬롯 feed bridge(비동기
/// producer)를 통해 전달합니다.
pub trait LineSink: Send + Sync {
    /// 줄 하나를 제출합니다 (끝의 줄바꿈 제외).
    fn feed(&self, line: String) -> Delivery;

    /// 소유 watcher에 정지 요청이 있었는지 여부
    fn is_stopped(&self) -> bool;

    /// 최대 `duration` 동안 잠들며, 정지 시 일찍 깨어납니다.
    ///
    /// watcher가 정지 중이면 `false`를 반환하며, 이 경우 producer는 `run`에서
    /// 반환해야 합니다.
    fn pause(&self, duration: Duration) -> bool;
}

/// 외부 소스에서 원시 줄을 생성합니다.
///
/// `run`은 `sink.is_stopped()`가 참이 될 때까지 블로킹하며 각 줄을 `sink`에
/// 넘깁니다. watcher는 sink 뒤의 플래그를 올려 정지를 요청하므로, producer는
/// 잠들 때마다 이를 확인해야 합니다 (`thread::sleep` 대신
/// [`LineSink::pause`] 사용).
///
/// 정지 요청 없이 `run`에서 반환하거나 에러를 반환하면 watcher는 producer 오류로
/// 처리합니다.
pub trait Producer: Send {
    /// 이 producer의 레지스트리 이름 (예: `"tail"`)
    fn kind(&self) -> &str;

    /// 생성 루프를 실행합니다.
    fn run(&mut self, sink: &dyn LineSink) -> Result<(), PluginError>;
}

// ─── Dispatch side ───────────────────────────────────────────────────

/// 원시 줄을 매칭하여 [`Record`]를 추출합니다.
///
/// 필터는 순서대로 시도되며 처음 나온 `Some`이 채택됩니다.
pub trait Filter: Send {
    /// 이 필터의 레지스트리 이름
    fn kind(&self) -> &str;

    /// 줄이 매칭되지 않으면 `Ok(None)`을 반환합니다.
    fn feed(&mut self, line: &str) -> Result<Option<Record>, PluginError>;
}

/// 필터링 이후 레코드를 다시 쓰거나 거부합니다.
pub trait Conditioner: Send {
    /// 이 conditioner의 레지스트리 이름
    fn kind(&self) -> &str;

    /// (새로 만들어졌을 수 있는) 레코드를 반환하거나, `Ok(None)`으로 이 줄의
    /// 처리를 중단합니다.
    fn feed(&mut self, record: Record) -> Result<Option<Record>, PluginError>;
}

/// 최종 레코드로 부수 효과를 수행합니다.
pub trait Consumer: Send {
    /// 이 consumer의 레지스트리 이름
    fn kind(&self) -> &str;

    /// 레코드를 소비합니다. 에러는 처리 오류입니다.
    fn feed(&mut self, record: &Record) -> Result<(), PluginError>;
}

// ─── PluginParams ────────────────────────────────────────────────────

/// TOML 테이블에 적힌 플러그인 인스턴스 하나의 파라미터
///
/// 각 플러그인은 [`PluginParams::parse`]로 자신의 타입 있는 설정 구조체로
/// 역직렬화합니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginParams(toml::Table);

impl PluginParams {
    /// TOML 테이블을 감쌉니다.
    pub fn new(table: toml::Table) -> Self {
        Self(table)
    }

    /// TOML 조각(`key = value` 줄)을 파싱합니다.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        toml::from_str::<toml::Table>(source)
            .map(Self)
            .map_err(|e| ConfigError::ParseFailed {
                reason: e.to_string(),
            })
    }

    /// 파라미터를 `T`로 역직렬화합니다.
    ///
    /// 불일치(필수 키 누락, 타입 오류, `T`가 거부하는 알 수 없는 키)는 모두
    /// `plugin`의 설정 오류로 보고됩니다.
    pub fn parse<T: DeserializeOwned>(&self, plugin: &str) -> Result<T, PluginError> {
        toml::Value::Table(self.0.clone())
            .try_into()
            .map_err(|e: toml::de::Error| PluginError::config(plugin, e.message().to_owned()))
    }

    /// 파라미터 하나에 대한 원시 접근
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.0.get(key)
    }

    /// 파라미터가 하나도 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<toml::Table> for PluginParams {
    fn from(table: toml::Table) -> Self {
        Self(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct SampleConfig {
        file: String,
        #[serde(default)]
        interval_secs: Option<f64>,
    }

    #[test]
    fn params_parse_into_typed_config() {
        let params =
            PluginParams::from_toml("file = \"/var/log/auth.log\"\ninterval_secs = 0.5").unwrap();
        let config: SampleConfig = params.parse("tail").unwrap();
        assert_eq!(config.file, "/var/log/auth.log");
        assert_eq!(config.interval_secs, Some(0.5));
    }

    #[test]
    fn missing_required_param_is_config_fault() {
        let params = PluginParams::default();
        let err = params.parse::<SampleConfig>("tail").unwrap_err();
        assert!(err.is_config_fault());
        assert!(err.to_string().contains("tail"));
        assert!(err.to_string().contains("file"));
    }

    #[test]
    fn unknown_param_is_rejected() {
        let params = PluginParams::from_toml("file = \"x\"\nfiel = \"typo\"").unwrap();
        let err = params.parse::<SampleConfig>("tail").unwrap_err();
        assert!(err.to_string().contains("fiel"));
    }

    #[test]
    fn from_toml_rejects_garbage() {
        assert!(PluginParams::from_toml("this is = = not toml").is_err());
    }

    #[test]
    fn empty_params() {
        assert!(PluginParams::default().is_empty());
        let params = PluginParams::from_toml("group = 1").unwrap();
        assert_eq!(params.get("group").and_then(|v| v.as_integer()), Some(1));
    }
}
