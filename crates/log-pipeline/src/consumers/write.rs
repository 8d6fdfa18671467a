//! 파일 기록 consumer.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use logwatch_core::context::WatcherContext;
use logwatch_core::error::PluginError;
use logwatch_core::plugin::{Consumer, PluginParams};
use logwatch_core::record::Record;
use serde::Deserialize;
use tracing::debug;

use super::framed;

const KIND: &str = "write";

/// `write` 파라미터.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteConfig {
    pub file: PathBuf,
    /// 추가 대신 파일을 비움
    #[serde(default)]
    pub truncate: bool,
    /// 플러그인이 살아 있는 동안 파일을 열어 둠
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

/// 레코드마다 `prefix + output + suffix`를 한 줄로 기록합니다.
///
/// exclusive가 아니면 레코드마다 파일을 열기 때문에, `truncate`와 함께 쓰면
/// 파일에는 항상 마지막 라인만 남습니다.
pub struct Write {
    ctx: WatcherContext,
    path: PathBuf,
    truncate: bool,
    prefix: String,
    suffix: String,
    held: Option<File>,
}

/// 레지스트리 생성자.
pub fn create(
    ctx: &WatcherContext,
    params: &PluginParams,
) -> Result<Box<dyn Consumer>, PluginError> {
    Ok(Box::new(Write::new(ctx.clone(), params.parse(KIND)?)?))
}

fn open(path: &Path, truncate: bool) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    options.open(path)
}

impl Write {
    /// `exclusive`이면 바로 파일을 엽니다.
    pub fn new(ctx: WatcherContext, config: WriteConfig) -> Result<Self, PluginError> {
        if config.file.as_os_str().is_empty() {
            return Err(PluginError::config(KIND, "'file' must not be empty"));
        }
        let held = if config.exclusive {
            let file = open(&config.file, config.truncate).map_err(|e| {
                PluginError::config(
                    KIND,
                    format!("cannot open {}: {e}", config.file.display()),
                )
            })?;
            Some(file)
        } else {
            None
        };
        Ok(Self {
            ctx,
            path: config.file,
            truncate: config.truncate,
            prefix: config.prefix,
            suffix: config.suffix,
            held,
        })
    }
}

impl Consumer for Write {
    fn kind(&self) -> &str {
        KIND
    }

    fn feed(&mut self, record: &Record) -> Result<(), PluginError> {
        let line = framed(&self.prefix, record.output(), &self.suffix);
        if self.ctx.debug_enabled() {
            debug!(watcher = self.ctx.name(), path = %self.path.display(), data = %line.trim_end(), "write: consumed record");
        }
        match self.held.as_mut() {
            Some(file) => {
                file.write_all(line.as_bytes())?;
                file.flush()?;
            }
            None => {
                let mut file = open(&self.path, self.truncate)?;
                file.write_all(line.as_bytes())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(dir: &tempfile::TempDir, extra: &str) -> (Box<dyn Consumer>, PathBuf) {
        let path = dir.path().join("out.log");
        let toml = format!("file = {:?}\n{extra}", path.display().to_string());
        let consumer = create(
            &WatcherContext::new("w", false),
            &PluginParams::from_toml(&toml).unwrap(),
        )
        .unwrap();
        (consumer, path)
    }

    fn rec(output: &str) -> Record {
        Record::new("w", "raw line", output)
    }

    #[test]
    fn appends_framed_output() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, path) = writer(&dir, "prefix = \"<\"\nsuffix = \">\"");
        c.feed(&rec("a")).unwrap();
        c.feed(&rec("b")).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<a>\n<b>\n");
    }

    #[test]
    fn appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.log"), "old\n").unwrap();
        let (mut c, path) = writer(&dir, "");
        c.feed(&rec("new")).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "old\nnew\n");
    }

    #[test]
    fn truncate_keeps_last_record_only() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, path) = writer(&dir, "truncate = true");
        c.feed(&rec("first")).unwrap();
        c.feed(&rec("second")).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "second\n");
    }

    #[test]
    fn exclusive_truncates_once_and_keeps_writing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.log"), "stale\n").unwrap();
        let (mut c, path) = writer(&dir, "truncate = true\nexclusive = true");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        c.feed(&rec("one")).unwrap();
        c.feed(&rec("two")).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn missing_directory_is_processing_fault() {
        let mut c = create(
            &WatcherContext::new("w", false),
            &PluginParams::from_toml("file = \"/nonexistent/dir/out.log\"").unwrap(),
        )
        .unwrap();
        let err = c.feed(&rec("x")).unwrap_err();
        assert!(matches!(err, PluginError::Io(_)));
    }

    #[test]
    fn file_is_required() {
        let err = create(
            &WatcherContext::new("w", false),
            &PluginParams::from_toml("prefix = \"x\"").unwrap(),
        )
        .err()
        .unwrap();
        assert!(err.is_config_fault());
    }
}
