//! producer -> dispatcher 핸드오프
//!
//! 동기 watcher는 producer 자신의 스레드에서 각 줄을 디스패치합니다.
//! 비동기 watcher는 그 사이에 [`FeedBridge`]를 둡니다. 전용 `<watcher>.bridge`
//! 스레드가 비우는 단일 슬롯이므로, producer는 멈춘 디스패치에 타임아웃을 걸고
//! 정지 요청에도 반응할 수 있습니다.
//!
//! ```text
//! producer thread                       bridge thread
//!   Feeder::feed(line)
//!     claim slot (busy = true)
//!     slot.send((seq, line))  ───────▶  recv_timeout(100ms)
//!     wait for ack(seq) ≤ timeout       dispatch(line)
//!                             ◀───────  done.send(seq); busy = false
//! ```
//!
//! in-flight 줄은 최대 하나입니다. ack에는 제출 순번이 붙어 있어, 포기한 대기에 대한
//! 늦은 ack가 새 제출을 완료시키는 일은 없습니다.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use logwatch_core::error::FeedError;
use logwatch_core::metrics as m;
use logwatch_core::plugin::{Delivery, LineSink};
use logwatch_core::stop::{STOP_POLL_SLICE, StopFlag};
use tracing::{debug, error, warn};

/// bridge 워커(또는 인라인 feeder)가 줄마다 호출하는 함수
pub type DispatchFn = Arc<dyn Fn(String) + Send + Sync>;

/// producer와 디스패치 워커 사이의 타임아웃 인지 단일 슬롯 핸드오프
pub struct FeedBridge {
    name: String,
    blocking: bool,
    timeout: Duration,
    stop: StopFlag,
    busy: Arc<AtomicBool>,
    seq: AtomicU64,
    slot: Sender<(u64, String)>,
    done: Receiver<u64>,
}

impl FeedBridge {
    /// 디스패치 워커 스레드를 시작하고 producer 측 핸들을 반환합니다.
    ///
    /// 워커는 `stop`이 올라가거나 bridge가 drop되면 종료하며, join되지 않습니다.
    pub fn spawn(
        name: &str,
        blocking: bool,
        timeout: Duration,
        stop: StopFlag,
        dispatch: DispatchFn,
    ) -> std::io::Result<Self> {
        let (slot_tx, slot_rx) = bounded::<(u64, String)>(1);
        let (done_tx, done_rx) = bounded::<u64>(1);
        let busy = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            name: name.to_owned(),
            stop: stop.clone(),
            busy: Arc::clone(&busy),
            slot: slot_rx,
            done: done_tx,
            dispatch,
        };
        thread::Builder::new()
            .name(format!("{name}.bridge"))
            .spawn(move || worker.run())?;

        Ok(Self {
            name: name.to_owned(),
            blocking,
            timeout,
            stop,
            busy,
            seq: AtomicU64::new(0),
            slot: slot_tx,
            done: done_rx,
        })
    }

    /// 현재 in-flight 줄이 있는지 여부
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// 디스패치를 기다리지 않고 `line`을 슬롯에 넣습니다.
    ///
    /// 제출 순번을 반환합니다. 줄이 아직 in-flight이면 [`FeedError::Busy`],
    /// watcher가 정지 중이면 [`FeedError::Stopped`]를 반환합니다.
    pub fn try_submit(&self, line: String) -> Result<u64, FeedError> {
        self.claim()?;
        self.place(line)
    }

    /// `line`을 제출하고 blocking 모드에 따라 디스패치를 기다립니다.
    pub fn submit(&self, line: String) -> Delivery {
        let mut busy_since: Option<Instant> = None;
        loop {
            match self.claim() {
                Ok(()) => {
                    return match self.place(line) {
                        Ok(seq) => self.wait(seq),
                        Err(_) => Delivery::Stopped,
                    };
                }
                Err(FeedError::Stopped) => return Delivery::Stopped,
                Err(FeedError::Busy) if !self.blocking => {
                    warn!(
                        watcher = %self.name,
                        "dispatcher is still processing previous line; discarding current line"
                    );
                    metrics::counter!(m::BRIDGE_DROPPED_TOTAL, m::LABEL_WATCHER => self.name.clone())
                        .increment(1);
                    return Delivery::Dropped;
                }
                Err(FeedError::Busy) => {
                    let due = busy_since.is_none_or(|t| t.elapsed() >= self.timeout);
                    if due {
                        warn!(
                            watcher = %self.name,
                            "dispatcher is still processing previous line; trying again"
                        );
                        metrics::counter!(m::BRIDGE_BUSY_TOTAL, m::LABEL_WATCHER => self.name.clone())
                            .increment(1);
                        busy_since = Some(Instant::now());
                    }
                    if !self.stop.sleep(STOP_POLL_SLICE) {
                        return Delivery::Stopped;
                    }
                }
            }
        }
    }

    fn claim(&self) -> Result<(), FeedError> {
        if self.stop.is_raised() {
            return Err(FeedError::Stopped);
        }
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| FeedError::Busy)
    }

    fn place(&self, line: String) -> Result<u64, FeedError> {
        // non-blocking 대기 타임아웃 후 남은 ack
        while self.done.try_recv().is_ok() {}

        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        match self.slot.try_send((seq, line)) {
            Ok(()) => Ok(seq),
            Err(TrySendError::Full(_)) => {
                self.busy.store(false, Ordering::SeqCst);
                Err(FeedError::Busy)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.busy.store(false, Ordering::SeqCst);
                Err(FeedError::Stopped)
            }
        }
    }

    fn wait(&self, seq: u64) -> Delivery {
        let mut deadline = self.deadline();
        loop {
            let remaining = deadline.map_or(STOP_POLL_SLICE, |d| {
                d.saturating_duration_since(Instant::now())
            });
            match self.done.recv_timeout(remaining.min(STOP_POLL_SLICE)) {
                Ok(acked) if acked == seq => {
                    // 워커는 ack 직후 busy를 해제함
                    while self.busy.load(Ordering::SeqCst) && !self.stop.is_raised() {
                        thread::yield_now();
                    }
                    return Delivery::Dispatched;
                }
                Ok(stale) => {
                    debug!(watcher = %self.name, stale, seq, "ignoring stale dispatch ack");
                }
                Err(RecvTimeoutError::Disconnected) => return Delivery::Stopped,
                Err(RecvTimeoutError::Timeout) => {
                    if self.stop.is_raised() {
                        return Delivery::Stopped;
                    }
                    if deadline.is_none_or(|d| Instant::now() < d) {
                        continue;
                    }
                    metrics::counter!(m::BRIDGE_BUSY_TOTAL, m::LABEL_WATCHER => self.name.clone())
                        .increment(1);
                    if !self.blocking {
                        warn!(
                            watcher = %self.name,
                            timeout_secs = self.timeout.as_secs_f64(),
                            "dispatch timed out; line left in flight"
                        );
                        return Delivery::InFlight;
                    }
                    warn!(
                        watcher = %self.name,
                        timeout_secs = self.timeout.as_secs_f64(),
                        "dispatch timed out; still waiting"
                    );
                    deadline = self.deadline();
                }
            }
        }
    }

    /// 현재 대기가 끝나는 시각. 타임아웃이 너무 커서 표현할 수 없으면 `None`
    fn deadline(&self) -> Option<Instant> {
        Instant::now().checked_add(self.timeout)
    }
}

impl std::fmt::Debug for FeedBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedBridge")
            .field("name", &self.name)
            .field("blocking", &self.blocking)
            .field("timeout", &self.timeout)
            .field("busy", &self.is_busy())
            .finish()
    }
}

struct Worker {
    name: String,
    stop: StopFlag,
    busy: Arc<AtomicBool>,
    slot: Receiver<(u64, String)>,
    done: Sender<u64>,
    dispatch: DispatchFn,
}

impl Worker {
    fn run(self) {
        debug!(watcher = %self.name, "bridge worker started");
        loop {
            if self.stop.is_raised() {
                break;
            }
            match self.slot.recv_timeout(STOP_POLL_SLICE) {
                Ok((seq, line)) => {
                    let dispatch = &self.dispatch;
                    if catch_unwind(AssertUnwindSafe(|| dispatch(line))).is_err() {
                        error!(watcher = %self.name, "dispatch panicked; stopping watcher");
                        self.stop.raise();
                    }
                    // 미처리 ack는 최대 하나
                    let _ = self.done.try_send(seq);
                    self.busy.store(false, Ordering::SeqCst);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!(watcher = %self.name, "bridge worker exited");
    }
}

// ─── Feeder ──────────────────────────────────────────────────────────

enum Route {
    Inline(DispatchFn),
    Bridged(FeedBridge),
}

/// watcher가 producer에게 넘기는 [`LineSink`]
pub struct Feeder {
    route: Route,
    stop: StopFlag,
}

impl Feeder {
    /// 모든 줄을 호출 스레드에서 디스패치합니다.
    pub fn inline(stop: StopFlag, dispatch: DispatchFn) -> Self {
        Self {
            route: Route::Inline(dispatch),
            stop,
        }
    }

    /// 모든 줄을 `bridge`로 전달합니다.
    pub fn bridged(stop: StopFlag, bridge: FeedBridge) -> Self {
        Self {
            route: Route::Bridged(bridge),
            stop,
        }
    }

    /// 비동기 feeder일 때의 bridge
    pub fn bridge(&self) -> Option<&FeedBridge> {
        match &self.route {
            Route::Inline(_) => None,
            Route::Bridged(bridge) => Some(bridge),
        }
    }
}

impl LineSink for Feeder {
    fn feed(&self, line: String) -> Delivery {
        if self.stop.is_raised() {
            return Delivery::Stopped;
        }
        match &self.route {
            Route::Inline(dispatch) => {
                dispatch(line);
                Delivery::Dispatched
            }
            Route::Bridged(bridge) => bridge.submit(line),
        }
    }

    fn is_stopped(&self) -> bool {
        self.stop.is_raised()
    }

    fn pause(&self, duration: Duration) -> bool {
        self.stop.sleep(duration)
    }
}
