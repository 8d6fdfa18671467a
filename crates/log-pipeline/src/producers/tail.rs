//! 파일 tail producer
//!
//! `tail -F`처럼 파일을 따라갑니다. `interval_secs`마다 폴링하며 새로 완성된
//! 줄을 공급합니다.
//!
//! # 로테이션 처리
//! - (dev, inode) 변경: 이전 파일을 끝까지 읽은 뒤 새 파일을 처음부터 읽음
//! - 읽은 위치보다 크기가 작음: 제자리 truncate, 처음으로 되감기
//! - 파일 없음: `retry_secs` 대기 후 재시도

use std::fs::{self, File, Metadata};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use logwatch_core::context::WatcherContext;
use logwatch_core::error::PluginError;
use logwatch_core::plugin::{Delivery, LineSink, PluginParams, Producer};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{decode_line, seconds};

const KIND: &str = "tail";

/// `tail` 파라미터
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TailConfig {
    /// 따라갈 파일
    pub file: PathBuf,
    /// 폴링 주기
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
    /// 없는 파일을 다시 열기 전 대기 시간
    #[serde(default = "default_retry_secs")]
    pub retry_secs: f64,
    /// 첫 오픈 시 기존 내용을 건너뛰지 않고 공급
    #[serde(default)]
    pub from_beginning: bool,
}

fn default_interval_secs() -> f64 {
    1.0
}

fn default_retry_secs() -> f64 {
    5.0
}

/// 현재 파일 추적이 끝난 이유
enum Follow {
    Stopped,
    Rotated,
    Vanished,
}

pub struct Tail {
    ctx: WatcherContext,
    file: PathBuf,
    interval: Duration,
    retry: Duration,
    from_beginning: bool,
}

/// 레지스트리 생성자
pub fn create(
    ctx: &WatcherContext,
    params: &PluginParams,
) -> Result<Box<dyn Producer>, PluginError> {
    Ok(Box::new(Tail::new(ctx.clone(), params.parse(KIND)?)?))
}

impl Tail {
    pub fn new(ctx: WatcherContext, config: TailConfig) -> Result<Self, PluginError> {
        if config.file.as_os_str().is_empty() {
            return Err(PluginError::config(KIND, "'file' must not be empty"));
        }
        Ok(Self {
            ctx,
            file: config.file,
            interval: seconds(KIND, "interval_secs", config.interval_secs, false)?,
            retry: seconds(KIND, "retry_secs", config.retry_secs, false)?,
            from_beginning: config.from_beginning,
        })
    }

    fn open(&self) -> std::io::Result<(BufReader<File>, FileId)> {
        let file = File::open(&self.file)?;
        let id = FileId::of(&file.metadata()?);
        Ok((BufReader::new(file), id))
    }

    /// 현재 위치 이후의 완성된 줄을 모두 공급합니다.
    ///
    /// 줄바꿈이 아직 없는 마지막 줄은 나머지가 쓰일 때까지 `pending`에 남습니다.
    fn drain(
        &self,
        reader: &mut BufReader<File>,
        pending: &mut Vec<u8>,
        pos: &mut u64,
        sink: &dyn LineSink,
    ) -> Result<bool, PluginError> {
        loop {
            let n = reader.read_until(b'\n', pending)?;
            if n == 0 {
                return Ok(true);
            }
            *pos += n as u64;
            if pending.last() != Some(&b'\n') {
                continue;
            }
            let line = decode_line(pending);
            pending.clear();
            if sink.feed(line) == Delivery::Stopped {
                return Ok(false);
            }
        }
    }

    fn follow(
        &self,
        mut reader: BufReader<File>,
        id: FileId,
        mut pos: u64,
        sink: &dyn LineSink,
    ) -> Result<Follow, PluginError> {
        let mut pending = Vec::new();
        loop {
            if !self.drain(&mut reader, &mut pending, &mut pos, sink)? {
                return Ok(Follow::Stopped);
            }
            if !sink.pause(self.interval) {
                return Ok(Follow::Stopped);
            }

            match fs::metadata(&self.file) {
                Ok(meta) if FileId::of(&meta) != id => {
                    if !self.drain(&mut reader, &mut pending, &mut pos, sink)? {
                        return Ok(Follow::Stopped);
                    }
                    info!(watcher = self.ctx.name(), file = %self.file.display(), "file has been rotated; opening new one");
                    return Ok(Follow::Rotated);
                }
                Ok(meta) if meta.len() < pos => {
                    info!(watcher = self.ctx.name(), file = %self.file.display(), "file has been truncated; rewinding");
                    reader.seek(SeekFrom::Start(0))?;
                    pos = 0;
                    pending.clear();
                }
                Ok(_) => {}
                Err(_) => {
                    info!(watcher = self.ctx.name(), file = %self.file.display(), "file has vanished; waiting for new one");
                    return Ok(Follow::Vanished);
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.file
    }
}

impl Producer for Tail {
    fn kind(&self) -> &str {
        KIND
    }

    fn run(&mut self, sink: &dyn LineSink) -> Result<(), PluginError> {
        let mut starting = true;
        while !sink.is_stopped() {
            let (mut reader, id) = match self.open() {
                Ok(opened) => opened,
                Err(e) => {
                    warn!(
                        watcher = self.ctx.name(),
                        file = %self.file.display(),
                        error = %e,
                        "failed to open file; trying again"
                    );
                    if !sink.pause(self.retry) {
                        break;
                    }
                    continue;
                }
            };

            let pos = if starting && !self.from_beginning {
                reader.seek(SeekFrom::End(0))?
            } else {
                0
            };
            starting = false;
            if self.ctx.debug_enabled() {
                debug!(watcher = self.ctx.name(), file = %self.file.display(), pos, "following file");
            }

            match self.follow(reader, id, pos, sink)? {
                Follow::Stopped => break,
                Follow::Rotated => {}
                Follow::Vanished => {
                    if !sink.pause(self.retry) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

/// 로테이션 감지에 쓰는 열린 파일의 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    #[cfg(unix)]
    fn of(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    #[cfg(not(unix))]
    fn of(_meta: &Metadata) -> Self {
        Self { dev: 0, ino: 0 }
    }
}
