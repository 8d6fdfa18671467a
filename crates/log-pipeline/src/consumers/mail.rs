//! 이메일 consumer.
//!
//! 평문 메시지를 만들어 `sendmail -t`에 넘기며, 수신자는 헤더에서 읽습니다.
//! 제목과 본문에서 다음 스니펫을 쓸 수 있습니다:
//!
//! | 스니펫         | 치환 값                   |
//! |----------------|---------------------------|
//! | `%{hostname}`  | 로컬 호스트 이름          |
//! | `%{watcher}`   | watcher 이름              |
//! | `%{data}`      | 레코드 출력               |
//! | `%{data_raw}`  | producer 라인             |

use std::io::{ErrorKind, Write as _};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use logwatch_core::context::WatcherContext;
use logwatch_core::error::PluginError;
use logwatch_core::plugin::{Consumer, PluginParams};
use logwatch_core::record::Record;
use serde::Deserialize;
use tracing::debug;

const KIND: &str = "mail";

const DEFAULT_SUBJECT: &str = "logwatch/%{watcher}: %{data}";

const DEFAULT_TEMPLATE: &str = "\
This is logwatchd running on %{hostname}.

The following data matched:

  Watcher: %{watcher}
  Data:    %{data}
  Raw:     %{data_raw}
";

/// `mail` 파라미터.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailConfig {
    #[serde(default = "default_sendmail")]
    pub sendmail: PathBuf,
    /// 발신 주소; 없으면 `logwatch@<hostname>`
    #[serde(default)]
    pub from: Option<String>,
    pub to: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// 본문 템플릿 파일
    #[serde(default)]
    pub template: Option<PathBuf>,
}

fn default_sendmail() -> PathBuf {
    PathBuf::from("/usr/sbin/sendmail")
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_owned()
}

/// 커널이 알려주는 로컬 호스트 이름.
fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_owned())
}

pub struct Mail {
    ctx: WatcherContext,
    sendmail: PathBuf,
    hostname: String,
    from: String,
    to: String,
    subject: String,
    template: String,
}

/// 레지스트리 생성자.
pub fn create(
    ctx: &WatcherContext,
    params: &PluginParams,
) -> Result<Box<dyn Consumer>, PluginError> {
    Ok(Box::new(Mail::new(ctx.clone(), params.parse(KIND)?)?))
}

impl Mail {
    /// 본문 템플릿이 있으면 읽습니다.
    pub fn new(ctx: WatcherContext, config: MailConfig) -> Result<Self, PluginError> {
        if config.to.trim().is_empty() {
            return Err(PluginError::config(KIND, "'to' must not be empty"));
        }
        let template = match &config.template {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                PluginError::config(KIND, format!("cannot read template {}: {e}", path.display()))
            })?,
            None => DEFAULT_TEMPLATE.to_owned(),
        };
        let hostname = hostname();
        Ok(Self {
            ctx,
            sendmail: config.sendmail,
            from: config
                .from
                .unwrap_or_else(|| format!("logwatch@{hostname}")),
            hostname,
            to: config.to,
            subject: config.subject,
            template,
        })
    }

    fn substitute(&self, text: &str, record: &Record) -> String {
        text.replace("%{hostname}", &self.hostname)
            .replace("%{watcher}", record.watcher())
            .replace("%{data_raw}", record.raw())
            .replace("%{data}", record.output())
    }

    /// `sendmail -t`에 넘길 헤더와 본문.
    fn compose(&self, record: &Record) -> String {
        // 헤더는 한 줄을 벗어나면 안 됨
        let subject = self.substitute(&self.subject, record).replace(['\r', '\n'], " ");
        let body = self.substitute(&self.template, record);
        format!(
            "From: {}\nTo: {}\nSubject: {subject}\nMIME-Version: 1.0\n\
             Content-Type: text/plain; charset=utf-8\nContent-Transfer-Encoding: 8bit\n\n{body}",
            self.from, self.to
        )
    }
}

impl Consumer for Mail {
    fn kind(&self) -> &str {
        KIND
    }

    fn feed(&mut self, record: &Record) -> Result<(), PluginError> {
        let message = self.compose(record);
        if self.ctx.debug_enabled() {
            debug!(watcher = self.ctx.name(), to = %self.to, "mail: consumed record\n{message}");
        }

        let mut child = Command::new(&self.sendmail)
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            // 조기 종료는 아래 상태 코드로 드러남
            match stdin.write_all(message.as_bytes()) {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e.into()),
                _ => {}
            }
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(PluginError::Failed(format!(
                "mail: {} exited with {status}",
                self.sendmail.display()
            )));
        }
        Ok(())
    }
}
