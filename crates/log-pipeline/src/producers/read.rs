//! 파일 읽기 producer -- 파일을 한 줄씩 공급하고 파일 끝에서 반환합니다.
//!
//! 주로 설정을 테스트할 때 로그를 watcher에 다시 흘려보내는 용도입니다.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use logwatch_core::context::WatcherContext;
use logwatch_core::error::PluginError;
use logwatch_core::plugin::{Delivery, LineSink, PluginParams, Producer};
use serde::Deserialize;
use tracing::debug;

use super::{decode_line, seconds};

const KIND: &str = "read";

/// `read` 파라미터
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadConfig {
    pub file: PathBuf,
    /// 줄 사이 대기 시간
    #[serde(default)]
    pub delay_secs: Option<f64>,
}

pub struct Read {
    ctx: WatcherContext,
    file: PathBuf,
    delay: Option<Duration>,
}

/// 레지스트리 생성자
pub fn create(
    ctx: &WatcherContext,
    params: &PluginParams,
) -> Result<Box<dyn Producer>, PluginError> {
    Ok(Box::new(Read::new(ctx.clone(), params.parse(KIND)?)?))
}

impl Read {
    pub fn new(ctx: WatcherContext, config: ReadConfig) -> Result<Self, PluginError> {
        if config.file.as_os_str().is_empty() {
            return Err(PluginError::config(KIND, "'file' must not be empty"));
        }
        let delay = config
            .delay_secs
            .map(|d| seconds(KIND, "delay_secs", d, true))
            .transpose()?;
        Ok(Self {
            ctx,
            file: config.file,
            delay,
        })
    }
}

impl Producer for Read {
    fn kind(&self) -> &str {
        KIND
    }

    fn run(&mut self, sink: &dyn LineSink) -> Result<(), PluginError> {
        let mut reader = BufReader::new(File::open(&self.file)?);
        let mut buf = Vec::new();
        let mut fed = 0usize;
        loop {
            if sink.is_stopped() {
                break;
            }
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            if sink.feed(decode_line(&buf)) == Delivery::Stopped {
                break;
            }
            fed += 1;
            if let Some(delay) = self.delay
                && !sink.pause(delay)
            {
                break;
            }
        }
        debug!(watcher = self.ctx.name(), file = %self.file.display(), lines = fed, "finished reading file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logwatch_core::stop::StopFlag;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<String>>,
        stop: StopFlag,
        stop_after: Option<usize>,
    }

    impl LineSink for Recorder {
        fn feed(&self, line: String) -> Delivery {
            let mut lines = self.lines.lock().unwrap();
            lines.push(line);
            if self.stop_after == Some(lines.len()) {
                self.stop.raise();
            }
            Delivery::Dispatched
        }

        fn is_stopped(&self) -> bool {
            self.stop.is_raised()
        }

        fn pause(&self, duration: Duration) -> bool {
            self.stop.sleep(duration)
        }
    }

    fn read(path: PathBuf, delay_secs: Option<f64>) -> Read {
        Read::new(
            WatcherContext::new("r", false),
            ReadConfig {
                file: path,
                delay_secs,
            },
        )
        .unwrap()
    }

    #[test]
    fn feeds_every_line_then_returns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.log");
        std::fs::write(&path, "one\ntwo\r\n\nlast without newline").unwrap();

        let sink = Recorder::default();
        read(path, None).run(&sink).unwrap();
        assert_eq!(
            *sink.lines.lock().unwrap(),
            vec!["one", "two", "", "last without newline"]
        );
    }

    #[test]
    fn stops_between_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.log");
        std::fs::write(&path, "a\nb\nc\n").unwrap();

        let sink = Recorder {
            stop_after: Some(2),
            ..Default::default()
        };
        read(path, Some(0.0)).run(&sink).unwrap();
        assert_eq!(*sink.lines.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn missing_file_is_processing_fault() {
        let sink = Recorder::default();
        let err = read(PathBuf::from("/nonexistent/in.log"), None)
            .run(&sink)
            .unwrap_err();
        assert!(matches!(err, PluginError::Io(_)));
        assert!(!err.is_config_fault());
    }

    #[test]
    fn negative_delay_is_rejected() {
        let params = PluginParams::from_toml("file = \"/x\"\ndelay_secs = -1.0").unwrap();
        let err = create(&WatcherContext::new("r", false), &params).err().unwrap();
        assert!(err.to_string().contains("delay_secs"));
    }
}
