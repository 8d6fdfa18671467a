//! 내장 producer
//!
//! - [`tail`]: `tail -F`처럼 파일을 따라가며 로테이션과 truncate에도 유지됨
//! - [`read`]: 파일을 한 번 공급하고 반환

pub mod read;
pub mod tail;

use std::time::Duration;

use logwatch_core::error::PluginError;

pub use read::{Read, ReadConfig};
pub use tail::{Tail, TailConfig};

/// 원시 줄 하나를 watcher에 공급할 문자열로 변환합니다.
///
/// 줄 종결자(`\n` 또는 `\r\n`)만 제거합니다. 잘못된 UTF-8은 거부하지 않고
/// 대체 문자로 바꿉니다.
pub(crate) fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// 초 단위 파라미터를 변환합니다. 음수, 유한하지 않은 값, 표현할 수 없는 값
/// (그리고 `allow_zero`가 아니면 0)은 거부합니다.
pub(crate) fn seconds(
    plugin: &str,
    field: &str,
    value: f64,
    allow_zero: bool,
) -> Result<Duration, PluginError> {
    let valid = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
    if !valid {
        let bound = if allow_zero { ">= 0" } else { "> 0" };
        return Err(PluginError::config(
            plugin,
            format!("'{field}' must be {bound}, got {value}"),
        ));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| PluginError::config(plugin, format!("'{field}' is out of range: {e}")))
}
