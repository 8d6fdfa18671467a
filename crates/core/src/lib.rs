//! # logwatch-core
//!
//! logwatch 공통 타입 -- 플러그인 계약, watcher를 흐르는 [`Record`],
//! 설정, 에러, 메트릭 이름을 정의합니다.
//!
//! 파이프라인 크레이트(`logwatch-pipeline`)와 데몬(`logwatchd`)은 이 크레이트에만
//! 의존하며, 이 크레이트는 구체적인 플러그인을 알지 못합니다.

pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod metrics;
pub mod plugin;
pub mod record;
pub mod stop;

// 에러
pub use error::{
    ConfigError, FeedError, LogwatchError, PluginError, PluginRole, WatcherError,
};

// 설정
pub use config::{LogwatchConfig, PluginSpec, WatcherConfig};

// 플러그인 계약
pub use context::WatcherContext;
pub use plugin::{Conditioner, Consumer, Delivery, Filter, LineSink, PluginParams, Producer};

pub use health::HealthStatus;
pub use record::Record;
pub use stop::StopFlag;
