//! watcher를 흐르는 이벤트 값

use std::fmt;

/// 필터 단계에서 consumer까지 이동하는 하나의 이벤트
///
/// `raw`는 producer가 내보낸 줄 그대로(줄바꿈 제외)이며 레코드 생성 후
/// 바뀌지 않습니다. `output`을 다시 쓰는 conditioner는
/// [`Record::with_output`]으로 새 `Record`를 돌려받습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    watcher: String,
    raw: String,
    output: String,
}

impl Record {
    /// raw와 output이 다른 레코드를 생성합니다.
    pub fn new(
        watcher: impl Into<String>,
        raw: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            watcher: watcher.into(),
            raw: raw.into(),
            output: output.into(),
        }
    }

    /// 필터가 없는 watcher의 기본 레코드를 생성합니다.
    /// `output`은 `raw`의 복사본입니다.
    pub fn passthrough(watcher: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            watcher: watcher.into(),
            output: raw.clone(),
            raw,
        }
    }

    /// 같은 watcher/raw에 다른 output을 가진 새 레코드를 반환합니다.
    pub fn with_output(&self, output: impl Into<String>) -> Self {
        Self {
            watcher: self.watcher.clone(),
            raw: self.raw.clone(),
            output: output.into(),
        }
    }

    /// 원본 watcher 이름
    pub fn watcher(&self) -> &str {
        &self.watcher
    }

    /// producer가 낸 줄 (변경 없음)
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// consumer에 전달되는 filter/conditioner 출력
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.output)
    }
}
