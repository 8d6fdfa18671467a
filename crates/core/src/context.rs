//! watcher가 플러그인에 제공하는 서비스

use std::sync::Arc;

use tracing::Level;

#[derive(Debug)]
struct ContextInner {
    name: String,
    pid: u32,
    debug: bool,
}

/// 플러그인 생성 시 전달되는 핸들
///
/// 복제 비용이 낮으며, 모든 복제본은 같은 watcher를 가리킵니다.
#[derive(Debug, Clone)]
pub struct WatcherContext {
    inner: Arc<ContextInner>,
}

impl WatcherContext {
    /// watcher `name`의 컨텍스트를 생성합니다.
    pub fn new(name: impl Into<String>, debug: bool) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                name: name.into(),
                pid: std::process::id(),
                debug,
            }),
        }
    }

    /// watcher 이름
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 데몬 프로세스 ID
    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    /// 이 watcher의 디버그 출력 활성화 여부
    pub fn debug_enabled(&self) -> bool {
        self.inner.debug
    }

    /// 프로세스 전역 싱크로 `message`를 기록합니다. watcher 이름이 필드로 붙습니다.
    pub fn log(&self, level: Level, message: &str) {
        let watcher = self.name();
        match level {
            Level::ERROR => tracing::error!(watcher, "{message}"),
            Level::WARN => tracing::warn!(watcher, "{message}"),
            Level::INFO => tracing::info!(watcher, "{message}"),
            Level::DEBUG => tracing::debug!(watcher, "{message}"),
            Level::TRACE => tracing::trace!(watcher, "{message}"),
        }
    }
}
