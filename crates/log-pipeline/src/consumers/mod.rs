//! 내장 consumer.
//!
//! - [`write`]: 파일에 추가(또는 비우고 기록)
//! - [`syslog`]: syslog 서버 또는 로컬 소켓으로 전송
//! - [`mail`]: 로컬 `sendmail`로 이메일 전송

pub mod mail;
pub mod syslog;
pub mod write;

pub use mail::{Mail, MailConfig};
pub use syslog::{Syslog, SyslogConfig};
pub use write::{Write, WriteConfig};

/// `prefix + output + suffix + "\n"`, `write`와 `syslog`가 공유하는
/// 라인 형식.
fn framed(prefix: &str, output: &str, suffix: &str) -> String {
    let mut line = String::with_capacity(prefix.len() + output.len() + suffix.len() + 1);
    line.push_str(prefix);
    line.push_str(output);
    line.push_str(suffix);
    line.push('\n');
    line
}
