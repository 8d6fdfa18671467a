//! logwatch watcher 엔진
//!
//! # 모듈 구성
//!
//! - [`watcher`]: 디스패처, 설정된 watcher마다 하나
//! - [`bridge`]: 비동기 producer와 디스패치 스레드 사이의 단일 슬롯 핸드오프
//! - [`registry`]: 플러그인 이름 -> 생성자 매핑
//! - [`producers`], [`filters`], [`conditioners`], [`consumers`]: 내장 플러그인
//! - [`pattern`]: 정규식 기반 플러그인이 공유하는 스니펫
//!
//! # 내부 아키텍처
//!
//! ```text
//! Producer ──feed──▶ [FeedBridge] ──▶ Filters ──▶ Conditioners ──▶ Consumers
//!  (tail/read)        async only      (grep/awk)     (sed)         (write/syslog/mail)
//! ```

pub mod bridge;
pub mod conditioners;
pub mod consumers;
pub mod filters;
pub mod pattern;
pub mod producers;
pub mod registry;
pub mod watcher;

pub use bridge::{FeedBridge, Feeder};
pub use registry::PluginRegistry;
pub use watcher::{FeedMode, FeedOutcome, RunState, Watcher, WatcherBuilder};
