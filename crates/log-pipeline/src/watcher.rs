//! 파이프라인 디스패처
//!
//! [`Watcher`]는 producer 하나와, 그 producer가 공급하는 filter/conditioner/consumer
//! 체인을 소유합니다. [`Watcher::run`]은 producer가 동작하는 동안 호출 스레드를
//! 블로킹하며, [`Watcher::stop`]은 어느 스레드에서든 호출할 수 있습니다.
//!
//! ```text
//! line ─▶ filters (first match) ─▶ conditioners (in order) ─▶ consumers (all, in order)
//!           │ none matched            │ None                    │ first fault
//!           ▼                         ▼                         ▼
//!        NoMatch                   Aborted                   Faulted
//! ```
//!
//! 처리 오류는 일관되게 다룹니다. `respawn`이면 해당 줄만 버리고 계속 동작하고,
//! 아니면 watcher 전체가 정지합니다. 플러그인 panic도 어느 스레드에서 디스패치하든
//! 처리 오류로 취급합니다.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use logwatch_core::config::WatcherConfig;
use logwatch_core::context::WatcherContext;
use logwatch_core::error::{PluginError, PluginRole, WatcherError};
use logwatch_core::metrics as m;
use logwatch_core::plugin::{Conditioner, Consumer, Filter, Producer};
use logwatch_core::record::Record;
use logwatch_core::stop::StopFlag;
use tracing::{debug, error, info, warn};

use crate::bridge::{DispatchFn, FeedBridge, Feeder};
use crate::registry::PluginRegistry;

/// producer에서 디스패치까지 줄이 전달되는 방식
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedMode {
    /// bridge 없이 producer 스레드에서 디스패치
    pub synchronous: bool,
    /// bridge가 바쁠 때 줄을 버리지 않고 대기
    pub blocking: bool,
    /// bridge 대기 타임아웃
    pub timeout: Duration,
}

impl Default for FeedMode {
    fn default() -> Self {
        Self {
            synchronous: true,
            blocking: true,
            timeout: Duration::from_secs(5),
        }
    }
}

/// watcher 생명주기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// 줄을 받는 중
    Running,
    /// `stop()` 호출됨, producer 반환 대기 중
    Stopping,
    /// `run()`이 반환됨
    Stopped,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Running,
            1 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Stopping => 1,
            Self::Stopped => 2,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// 줄 하나의 디스패치 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// watcher가 동작 중이 아님, 아무것도 하지 않음
    Ignored,
    /// 필터가 설정되어 있으나 매칭 없음
    NoMatch,
    /// conditioner가 레코드를 거부함
    Aborted,
    /// 모든 consumer가 레코드를 받음
    Delivered,
    /// 플러그인 실패, 오류 정책 참조
    Faulted,
}

#[derive(Default)]
struct Chains {
    filters: Vec<Box<dyn Filter>>,
    conditioners: Vec<Box<dyn Conditioner>>,
    consumers: Vec<Box<dyn Consumer>>,
}

/// 파이프라인 하나 -- producer와 디스패치 체인
pub struct Watcher {
    name: String,
    verbose: bool,
    respawn: bool,
    debug: bool,
    feed_mode: FeedMode,
    respawn_delay: Duration,
    state: AtomicU8,
    active: AtomicBool,
    stop: StopFlag,
    producer: Mutex<Option<Box<dyn Producer>>>,
    chains: Mutex<Chains>,
}

impl Watcher {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn feed_mode(&self) -> FeedMode {
        self.feed_mode
    }

    pub fn respawn(&self) -> bool {
        self.respawn
    }

    /// producer의 sink 및 bridge와 공유하는 정지 플래그
    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    /// 줄 하나를 filter, conditioner, consumer 체인에 통과시킵니다.
    ///
    /// 디스패치는 직렬화되며, 두 번째 호출자는 첫 번째가 끝날 때까지 기다립니다.
    pub fn feed(&self, line: &str) -> FeedOutcome {
        if self.state() != RunState::Running {
            return FeedOutcome::Ignored;
        }
        let mut chains = self.chains();
        if self.state() != RunState::Running {
            return FeedOutcome::Ignored;
        }
        metrics::counter!(m::LINES_TOTAL, m::LABEL_WATCHER => self.name.clone()).increment(1);
        if self.debug {
            debug!(watcher = %self.name, data = line, "produced data");
        }

        // filter: 처음 매칭된 것이 채택됨
        let mut record = if chains.filters.is_empty() {
            Record::passthrough(&self.name, line)
        } else {
            let mut matched = None;
            for filter in chains.filters.iter_mut() {
                match guarded(|| filter.feed(line)) {
                    Ok(Some(record)) => {
                        matched = Some(record);
                        break;
                    }
                    Ok(None) => {}
                    Err(e) => return self.fault(PluginRole::Filter, filter.kind(), &e),
                }
            }
            match matched {
                Some(record) => record,
                None => {
                    metrics::counter!(m::RECORDS_FILTERED_OUT_TOTAL, m::LABEL_WATCHER => self.name.clone())
                        .increment(1);
                    return FeedOutcome::NoMatch;
                }
            }
        };
        if self.debug && !chains.filters.is_empty() {
            debug!(watcher = %self.name, data = record.output(), "filtered data");
        }

        // conditioner: 순차 적용, None이면 이 줄 중단
        if !chains.conditioners.is_empty() {
            for conditioner in chains.conditioners.iter_mut() {
                match guarded(|| conditioner.feed(record)) {
                    Ok(Some(next)) => record = next,
                    Ok(None) => {
                        debug!(
                            watcher = %self.name,
                            plugin = conditioner.kind(),
                            "record aborted by conditioner"
                        );
                        metrics::counter!(m::RECORDS_ABORTED_TOTAL, m::LABEL_WATCHER => self.name.clone())
                            .increment(1);
                        return FeedOutcome::Aborted;
                    }
                    Err(e) => return self.fault(PluginRole::Conditioner, conditioner.kind(), &e),
                }
            }
            if self.debug {
                debug!(watcher = %self.name, data = record.output(), "conditioned data");
            }
        }

        if self.verbose {
            info!(watcher = %self.name, data = record.output(), "data");
        }

        // consumer: 전부 순서대로, 첫 오류에서 나머지 생략
        for consumer in chains.consumers.iter_mut() {
            if let Err(e) = guarded(|| consumer.feed(&record)) {
                return self.fault(PluginRole::Consumer, consumer.kind(), &e);
            }
        }
        metrics::counter!(m::RECORDS_DISPATCHED_TOTAL, m::LABEL_WATCHER => self.name.clone())
            .increment(1);
        FeedOutcome::Delivered
    }

    fn chains(&self) -> MutexGuard<'_, Chains> {
        self.chains.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fault(&self, stage: PluginRole, plugin: &str, err: &PluginError) -> FeedOutcome {
        metrics::counter!(
            m::FAULTS_TOTAL,
            m::LABEL_WATCHER => self.name.clone(),
            m::LABEL_STAGE => stage.to_string()
        )
        .increment(1);
        if self.debug {
            error!(watcher = %self.name, %stage, plugin, error = ?err, "{stage} error");
        } else {
            error!(watcher = %self.name, %stage, plugin, error = %err, "{stage} error");
        }
        if self.respawn {
            info!(watcher = %self.name, "continuing");
        } else {
            error!(watcher = %self.name, "exiting");
            self.stop();
        }
        FeedOutcome::Faulted
    }

    /// watcher가 정지될 때까지 producer를 실행합니다.
    ///
    /// 호출 스레드를 블로킹합니다. 실패하거나 panic하거나 스스로 반환한 producer는
    /// `respawn`이 설정되어 있으면 재시작되고, 아니면 watcher가 정지합니다.
    /// bridge 워커가 있으면 스스로 종료하도록 두며 join하지 않습니다.
    pub fn run(self: &Arc<Self>) -> Result<(), WatcherError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(WatcherError::AlreadyRunning {
                name: self.name.clone(),
            });
        }
        let _active = ActiveGuard(&self.active);

        let mut producer = self
            .producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| WatcherError::NoProducer {
                name: self.name.clone(),
            })?;

        let result = self.supervise(producer.as_mut());

        *self.producer.lock().unwrap_or_else(PoisonError::into_inner) = Some(producer);
        self.state.store(RunState::Stopped.as_u8(), Ordering::SeqCst);
        info!(watcher = %self.name, "watcher stopped");
        result
    }

    fn supervise(self: &Arc<Self>, producer: &mut dyn Producer) -> Result<(), WatcherError> {
        if self.chains().consumers.is_empty() {
            return Err(WatcherError::NoConsumer {
                name: self.name.clone(),
            });
        }
        let feeder = self.feeder()?;
        info!(
            watcher = %self.name,
            producer = producer.kind(),
            synchronous = self.feed_mode.synchronous,
            blocking = self.feed_mode.blocking,
            "watcher started"
        );

        while !self.stop.is_raised() {
            let result = catch_unwind(AssertUnwindSafe(|| producer.run(&feeder)));
            if self.stop.is_raised() {
                break;
            }
            match result {
                Ok(Ok(())) => {
                    error!(watcher = %self.name, producer = producer.kind(), "producer returned without being stopped");
                }
                Ok(Err(e)) if self.debug => {
                    error!(watcher = %self.name, producer = producer.kind(), error = ?e, "producer error");
                }
                Ok(Err(e)) => {
                    error!(watcher = %self.name, producer = producer.kind(), error = %e, "producer error");
                }
                Err(panic) => {
                    error!(
                        watcher = %self.name,
                        producer = producer.kind(),
                        panic = %panic_message(panic.as_ref()),
                        "producer panicked"
                    );
                }
            }
            metrics::counter!(
                m::FAULTS_TOTAL,
                m::LABEL_WATCHER => self.name.clone(),
                m::LABEL_STAGE => PluginRole::Producer.to_string()
            )
            .increment(1);

            if !self.respawn {
                error!(watcher = %self.name, "exiting");
                break;
            }
            info!(watcher = %self.name, "respawning producer");
            metrics::counter!(m::PRODUCER_RESPAWNS_TOTAL, m::LABEL_WATCHER => self.name.clone())
                .increment(1);
            if !self.respawn_delay.is_zero() && !self.stop.sleep(self.respawn_delay) {
                break;
            }
        }

        self.stop();
        drop(feeder);
        Ok(())
    }

    fn feeder(self: &Arc<Self>) -> Result<Feeder, WatcherError> {
        let weak = Arc::downgrade(self);
        let dispatch: DispatchFn = Arc::new(move |line: String| {
            if let Some(watcher) = weak.upgrade() {
                watcher.feed(&line);
            }
        });
        if self.feed_mode.synchronous {
            return Ok(Feeder::inline(self.stop.clone(), dispatch));
        }
        let bridge = FeedBridge::spawn(
            &self.name,
            self.feed_mode.blocking,
            self.feed_mode.timeout,
            self.stop.clone(),
            dispatch,
        )
        .map_err(|source| WatcherError::Spawn {
            name: format!("{}.bridge", self.name),
            source,
        })?;
        Ok(Feeder::bridged(self.stop.clone(), bridge))
    }

    /// watcher에 정지를 요청합니다. 멱등이며 어느 스레드에서든 호출 가능합니다.
    ///
    /// producer는 sink를 통해 요청을 감지하고, 그러면 `run`이 반환합니다.
    pub fn stop(&self) {
        let _ = self.state.compare_exchange(
            RunState::Running.as_u8(),
            RunState::Stopping.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.stop.raise();
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("feed_mode", &self.feed_mode)
            .field("respawn", &self.respawn)
            .finish()
    }
}

struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 플러그인 호출 하나를 실행하고, panic은 처리 오류로 바꿉니다.
fn guarded<T>(call: impl FnOnce() -> Result<T, PluginError>) -> Result<T, PluginError> {
    catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|panic| {
        Err(PluginError::Failed(format!(
            "panicked: {}",
            panic_message(panic.as_ref())
        )))
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

// ─── WatcherBuilder ──────────────────────────────────────────────────

/// [`Watcher`] 빌더
///
/// # 사용 예시
/// ```ignore
/// let watcher = WatcherBuilder::new("ssh")
///     .respawn(true)
///     .producer(Box::new(tail))
///     .filter(Box::new(grep))
///     .consumer(Box::new(write))
///     .build()?;
/// ```
pub struct WatcherBuilder {
    name: String,
    verbose: bool,
    respawn: bool,
    debug: bool,
    feed_mode: FeedMode,
    respawn_delay: Duration,
    producer: Option<Box<dyn Producer>>,
    chains: Chains,
}

impl WatcherBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verbose: false,
            respawn: false,
            debug: false,
            feed_mode: FeedMode::default(),
            respawn_delay: Duration::ZERO,
            producer: None,
            chains: Chains::default(),
        }
    }

    /// watcher 정의로부터 watcher를 만들며, 모든 플러그인을 `registry`로 해석합니다.
    ///
    /// 잘못된 옵션이나 플러그인 파라미터는 이 watcher만 실패시킵니다.
    pub fn from_config(
        config: &WatcherConfig,
        registry: &PluginRegistry,
        debug: bool,
    ) -> Result<Self, WatcherError> {
        config.validate()?;
        let ctx = WatcherContext::new(&config.name, debug);

        let mut builder = Self::new(&config.name)
            .verbose(config.verbose)
            .respawn(config.respawn)
            .debug(debug)
            .respawn_delay(config.respawn_delay())
            .feed_mode(FeedMode {
                synchronous: config.synchronous,
                blocking: config.blocking,
                timeout: config.timeout(),
            })
            .producer(registry.producer(&config.producer.kind, &ctx, &config.producer.params())?);

        for spec in &config.filters {
            builder = builder.filter(registry.filter(&spec.kind, &ctx, &spec.params())?);
        }
        for spec in &config.conditioners {
            builder = builder.conditioner(registry.conditioner(&spec.kind, &ctx, &spec.params())?);
        }
        for spec in &config.consumers {
            builder = builder.consumer(registry.consumer(&spec.kind, &ctx, &spec.params())?);
        }
        Ok(builder)
    }

    /// 모든 레코드의 output을 info 레벨로 기록
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn respawn(mut self, respawn: bool) -> Self {
        self.respawn = respawn;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn feed_mode(mut self, feed_mode: FeedMode) -> Self {
        self.feed_mode = feed_mode;
        self
    }

    pub fn respawn_delay(mut self, delay: Duration) -> Self {
        self.respawn_delay = delay;
        self
    }

    /// producer를 설정합니다 (이전 값은 대체).
    pub fn producer(mut self, producer: Box<dyn Producer>) -> Self {
        if self.producer.is_some() {
            warn!(watcher = %self.name, "producer replaced");
        }
        self.producer = Some(producer);
        self
    }

    pub fn filter(mut self, filter: Box<dyn Filter>) -> Self {
        self.chains.filters.push(filter);
        self
    }

    pub fn conditioner(mut self, conditioner: Box<dyn Conditioner>) -> Self {
        self.chains.conditioners.push(conditioner);
        self
    }

    pub fn consumer(mut self, consumer: Box<dyn Consumer>) -> Self {
        self.chains.consumers.push(consumer);
        self
    }

    /// producer가 있고 consumer가 하나 이상인지 확인합니다.
    pub fn build(self) -> Result<Watcher, WatcherError> {
        let Some(producer) = self.producer else {
            return Err(WatcherError::NoProducer { name: self.name });
        };
        if self.chains.consumers.is_empty() {
            return Err(WatcherError::NoConsumer { name: self.name });
        }
        if self.feed_mode.timeout.is_zero() {
            return Err(logwatch_core::error::ConfigError::InvalidValue {
                field: format!("watchers.{}.timeout_secs", self.name),
                reason: "must be > 0".to_owned(),
            }
            .into());
        }
        Ok(Watcher {
            name: self.name,
            verbose: self.verbose,
            respawn: self.respawn,
            debug: self.debug,
            feed_mode: self.feed_mode,
            respawn_delay: self.respawn_delay,
            state: AtomicU8::new(RunState::Running.as_u8()),
            active: AtomicBool::new(false),
            stop: StopFlag::new(),
            producer: Mutex::new(Some(producer)),
            chains: Mutex::new(self.chains),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logwatch_core::plugin::LineSink;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Instant;

    // ─── test plugins ────────────────────────────────────────────────

    /// 정해진 줄 목록을 공급한 뒤 정지될 때까지 대기
    struct Lines(Vec<&'static str>);

    impl Producer for Lines {
        fn kind(&self) -> &str {
            "lines"
        }

        fn run(&mut self, sink: &dyn LineSink) -> Result<(), PluginError> {
            for line in &self.0 {
                sink.feed((*line).to_owned());
            }
            while sink.pause(Duration::from_millis(20)) {}
            Ok(())
        }
    }

    /// 매 실행마다 실패하며 시도 횟수를 셈
    struct Flaky(Arc<AtomicUsize>);

    impl Producer for Flaky {
        fn kind(&self) -> &str {
            "flaky"
        }

        fn run(&mut self, _sink: &dyn LineSink) -> Result<(), PluginError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(PluginError::Failed("source went away".into()))
        }
    }

    struct Contains(&'static str);

    impl Filter for Contains {
        fn kind(&self) -> &str {
            "contains"
        }

        fn feed(&mut self, line: &str) -> Result<Option<Record>, PluginError> {
            if line == "filter-error" {
                return Err(PluginError::Failed("filter broke".into()));
            }
            Ok(line
                .contains(self.0)
                .then(|| Record::new("w", line, format!("[{}] {line}", self.0))))
        }
    }

    struct DropIf(&'static str);

    impl Conditioner for DropIf {
        fn kind(&self) -> &str {
            "drop-if"
        }

        fn feed(&mut self, record: Record) -> Result<Option<Record>, PluginError> {
            if record.raw().contains(self.0) {
                Ok(None)
            } else {
                let output = record.output().to_uppercase();
                Ok(Some(record.with_output(output)))
            }
        }
    }

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<Record>>>);

    impl Collect {
        fn outputs(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.output().to_owned())
                .collect()
        }
    }

    impl Consumer for Collect {
        fn kind(&self) -> &str {
            "collect"
        }

        fn feed(&mut self, record: &Record) -> Result<(), PluginError> {
            if record.raw() == "consumer-error" {
                return Err(PluginError::Failed("disk full".into()));
            }
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    /// 모든 레코드에서 panic
    struct Explode;

    impl Consumer for Explode {
        fn kind(&self) -> &str {
            "explode"
        }

        fn feed(&mut self, _record: &Record) -> Result<(), PluginError> {
            panic!("consumer blew up");
        }
    }

    fn builder(lines: Vec<&'static str>) -> WatcherBuilder {
        WatcherBuilder::new("w").producer(Box::new(Lines(lines)))
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let started = Instant::now();
        while started.elapsed() < Duration::from_secs(5) {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    // ─── build ───────────────────────────────────────────────────────

    #[test]
    fn build_requires_producer() {
        let err = WatcherBuilder::new("w")
            .consumer(Box::new(Collect::default()))
            .build()
            .unwrap_err();
        assert!(matches!(err, WatcherError::NoProducer { .. }));
    }

    #[test]
    fn build_requires_consumer() {
        let err = builder(vec![]).build().unwrap_err();
        assert!(matches!(err, WatcherError::NoConsumer { .. }));
    }

    #[test]
    fn build_rejects_zero_timeout() {
        let err = builder(vec![])
            .consumer(Box::new(Collect::default()))
            .feed_mode(FeedMode {
                synchronous: false,
                blocking: true,
                timeout: Duration::ZERO,
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    // ─── feed ────────────────────────────────────────────────────────

    #[test]
    fn no_filters_passes_raw_line_through() {
        let out = Collect::default();
        let watcher = builder(vec![])
            .consumer(Box::new(out.clone()))
            .build()
            .unwrap();

        assert_eq!(watcher.feed("hello"), FeedOutcome::Delivered);
        let records = out.0.lock().unwrap();
        assert_eq!(records[0].raw(), "hello");
        assert_eq!(records[0].output(), "hello");
        assert_eq!(records[0].watcher(), "w");
    }

    #[test]
    fn first_matching_filter_wins() {
        let out = Collect::default();
        let watcher = builder(vec![])
            .filter(Box::new(Contains("ssh")))
            .filter(Box::new(Contains("s")))
            .consumer(Box::new(out.clone()))
            .build()
            .unwrap();

        assert_eq!(watcher.feed("sshd: login"), FeedOutcome::Delivered);
        assert_eq!(watcher.feed("sudo: session"), FeedOutcome::Delivered);
        assert_eq!(watcher.feed("cron: job"), FeedOutcome::NoMatch);
        assert_eq!(out.outputs(), vec!["[ssh] sshd: login", "[s] sudo: session"]);
    }

    #[test]
    fn conditioner_rewrites_or_aborts() {
        let out = Collect::default();
        let watcher = builder(vec![])
            .conditioner(Box::new(DropIf("debug")))
            .consumer(Box::new(out.clone()))
            .build()
            .unwrap();

        assert_eq!(watcher.feed("debug: noise"), FeedOutcome::Aborted);
        assert_eq!(watcher.feed("alert"), FeedOutcome::Delivered);
        let records = out.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].output(), "ALERT");
        assert_eq!(records[0].raw(), "alert");
    }

    #[test]
    fn every_consumer_receives_the_record_in_order() {
        let first = Collect::default();
        let second = Collect::default();
        let watcher = builder(vec![])
            .consumer(Box::new(first.clone()))
            .consumer(Box::new(second.clone()))
            .build()
            .unwrap();

        watcher.feed("a");
        watcher.feed("b");
        assert_eq!(first.outputs(), vec!["a", "b"]);
        assert_eq!(second.outputs(), vec!["a", "b"]);
    }

    #[test]
    fn consumer_fault_without_respawn_stops_watcher() {
        let out = Collect::default();
        let watcher = builder(vec![])
            .consumer(Box::new(out.clone()))
            .build()
            .unwrap();

        assert_eq!(watcher.feed("consumer-error"), FeedOutcome::Faulted);
        assert_eq!(watcher.state(), RunState::Stopping);
        assert!(watcher.stop_flag().is_raised());
        assert_eq!(watcher.feed("after"), FeedOutcome::Ignored);
        assert!(out.outputs().is_empty());
    }

    #[test]
    fn fault_with_respawn_keeps_dispatching() {
        let out = Collect::default();
        let watcher = builder(vec![])
            .respawn(true)
            .filter(Box::new(Contains("")))
            .consumer(Box::new(out.clone()))
            .build()
            .unwrap();

        assert_eq!(watcher.feed("filter-error"), FeedOutcome::Faulted);
        assert_eq!(watcher.feed("consumer-error"), FeedOutcome::Faulted);
        assert_eq!(watcher.state(), RunState::Running);
        assert_eq!(watcher.feed("ok"), FeedOutcome::Delivered);
        assert_eq!(out.outputs(), vec!["[] ok"]);
    }

    #[test]
    fn consumer_panic_is_a_fault() {
        let out = Collect::default();
        let watcher = builder(vec![])
            .respawn(true)
            .consumer(Box::new(Explode))
            .build()
            .unwrap();

        assert_eq!(watcher.feed("boom"), FeedOutcome::Faulted);
        assert_eq!(watcher.state(), RunState::Running);
        assert!(out.outputs().is_empty());
    }

    // ─── run / stop ──────────────────────────────────────────────────

    fn run_with_panicking_consumer(synchronous: bool) -> Arc<Watcher> {
        let watcher = Arc::new(
            builder(vec!["boom"])
                .feed_mode(FeedMode {
                    synchronous,
                    blocking: true,
                    timeout: Duration::from_secs(1),
                })
                .consumer(Box::new(Explode))
                .build()
                .unwrap(),
        );
        let handle = {
            let watcher = Arc::clone(&watcher);
            thread::spawn(move || watcher.run())
        };
        assert!(
            wait_until(|| watcher.state() == RunState::Stopped),
            "synchronous={synchronous}: watcher kept running after a consumer panic"
        );
        handle.join().unwrap().unwrap();
        watcher
    }

    #[test]
    fn consumer_panic_without_respawn_stops_sync_watcher() {
        let watcher = run_with_panicking_consumer(true);
        assert!(watcher.stop_flag().is_raised());
    }

    #[test]
    fn consumer_panic_without_respawn_stops_async_watcher() {
        let watcher = run_with_panicking_consumer(false);
        assert!(watcher.stop_flag().is_raised());
    }


    #[test]
    fn run_feeds_lines_until_stopped() {
        let out = Collect::default();
        let watcher = Arc::new(
            builder(vec!["one", "two", "three"])
                .consumer(Box::new(out.clone()))
                .build()
                .unwrap(),
        );

        let handle = {
            let watcher = Arc::clone(&watcher);
            thread::spawn(move || watcher.run())
        };
        assert!(wait_until(|| out.outputs().len() == 3));
        watcher.stop();
        handle.join().unwrap().unwrap();

        assert_eq!(out.outputs(), vec!["one", "two", "three"]);
        assert_eq!(watcher.state(), RunState::Stopped);
    }

    #[test]
    fn async_run_goes_through_bridge() {
        let out = Collect::default();
        let watcher = Arc::new(
            builder(vec!["a", "b"])
                .feed_mode(FeedMode {
                    synchronous: false,
                    blocking: true,
                    timeout: Duration::from_secs(1),
                })
                .consumer(Box::new(out.clone()))
                .build()
                .unwrap(),
        );

        let handle = {
            let watcher = Arc::clone(&watcher);
            thread::spawn(move || watcher.run())
        };
        assert!(wait_until(|| out.outputs().len() == 2));
        watcher.stop();
        handle.join().unwrap().unwrap();
        assert_eq!(out.outputs(), vec!["a", "b"]);
    }

    #[test]
    fn concurrent_run_is_rejected() {
        let watcher = Arc::new(
            builder(vec![])
                .consumer(Box::new(Collect::default()))
                .build()
                .unwrap(),
        );
        let handle = {
            let watcher = Arc::clone(&watcher);
            thread::spawn(move || watcher.run())
        };
        assert!(wait_until(|| watcher.active.load(Ordering::SeqCst)));
        assert!(matches!(
            watcher.run(),
            Err(WatcherError::AlreadyRunning { .. })
        ));
        watcher.stop();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn failing_producer_without_respawn_stops_after_one_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let watcher = Arc::new(
            WatcherBuilder::new("w")
                .producer(Box::new(Flaky(Arc::clone(&runs))))
                .consumer(Box::new(Collect::default()))
                .build()
                .unwrap(),
        );
        watcher.run().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(watcher.state(), RunState::Stopped);
    }

    #[test]
    fn failing_producer_with_respawn_is_restarted() {
        let runs = Arc::new(AtomicUsize::new(0));
        let watcher = Arc::new(
            WatcherBuilder::new("w")
                .respawn(true)
                .respawn_delay(Duration::from_millis(10))
                .producer(Box::new(Flaky(Arc::clone(&runs))))
                .consumer(Box::new(Collect::default()))
                .build()
                .unwrap(),
        );
        let handle = {
            let watcher = Arc::clone(&watcher);
            thread::spawn(move || watcher.run())
        };
        assert!(wait_until(|| runs.load(Ordering::SeqCst) >= 3));
        watcher.stop();
        handle.join().unwrap().unwrap();
        assert_eq!(watcher.state(), RunState::Stopped);
    }

    #[test]
    fn stop_before_run_returns_immediately() {
        let watcher = Arc::new(
            builder(vec!["never"])
                .consumer(Box::new(Collect::default()))
                .build()
                .unwrap(),
        );
        watcher.stop();
        watcher.run().unwrap();
        assert_eq!(watcher.state(), RunState::Stopped);
    }

    #[test]
    fn panic_message_extracts_payload() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
