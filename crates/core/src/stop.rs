//! 스레드 간 협력적 취소
//!
//! logwatch는 스레드를 강제로 죽이지 않습니다. 블로킹될 수 있는 모든 루프
//! (producer 폴링, bridge 워커, busy 재시도, supervisor 모니터)는 다음 폴링 경계에서
//! [`StopFlag`]를 확인하고 스스로 종료합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// [`StopFlag::sleep`] 안에서 끊김 없이 자는 최대 시간
pub const STOP_POLL_SLICE: Duration = Duration::from_millis(100);

/// 공유 정지 플래그. 복제하면 같은 플래그의 핸들이 하나 더 생깁니다.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    raised: Arc<AtomicBool>,
}

impl StopFlag {
    /// 내려간 상태의 플래그를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 플래그를 올립니다. 멱등이며 어느 스레드에서든 호출 가능합니다.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// [`raise`](Self::raise)가 호출되었는지 여부
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// 최대 [`STOP_POLL_SLICE`] 단위로 나누어 `duration` 동안 잠듭니다.
    ///
    /// 전체 시간이 지나면 `true`, 플래그가 올라간 것을 보는 즉시 `false`를
    /// 반환합니다.
    ///
    /// 현재 시각에 더할 수 없을 만큼 큰 duration은 플래그가 올라갈 때까지
    /// 잠듭니다.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_raised() {
                return false;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    (deadline - now).min(STOP_POLL_SLICE)
                }
                None => STOP_POLL_SLICE,
            };
            std::thread::sleep(slice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = StopFlag::new();
        let other = flag.clone();
        assert!(!other.is_raised());
        flag.raise();
        assert!(other.is_raised());
    }

    #[test]
    fn sleep_completes_when_not_raised() {
        let flag = StopFlag::new();
        let started = Instant::now();
        assert!(flag.sleep(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn sleep_returns_early_once_raised() {
        let flag = StopFlag::new();
        let remote = flag.clone();
        let raiser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.raise();
        });

        let started = Instant::now();
        assert!(!flag.sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(1));
        raiser.join().unwrap();
    }

    #[test]
    fn unrepresentable_sleep_still_honours_stop() {
        let flag = StopFlag::new();
        let remote = flag.clone();
        let raiser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.raise();
        });

        assert!(!flag.sleep(Duration::MAX));
        raiser.join().unwrap();
    }

    #[test]
    fn sleep_on_raised_flag_is_immediate() {
        let flag = StopFlag::new();
        flag.raise();
        assert!(!flag.sleep(Duration::from_secs(5)));
    }
}
