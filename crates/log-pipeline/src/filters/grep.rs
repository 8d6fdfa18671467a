//! 정규식 필터

use logwatch_core::context::WatcherContext;
use logwatch_core::error::PluginError;
use logwatch_core::plugin::{Filter, PluginParams};
use logwatch_core::record::Record;
use regex::Regex;
use serde::Deserialize;

use crate::pattern;

const KIND: &str = "grep";

/// `grep` 파라미터
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrepConfig {
    /// 정규식. `%{ip}` 같은 스니펫이 확장됨
    pub pattern: String,
    #[serde(default)]
    pub ignorecase: bool,
    /// 출력으로 쓸 캡처 그룹 (0 = 매칭 전체)
    ///
    /// 그룹 번호는 확장된 패턴 기준입니다. `%{ip}`는 그룹을 정확히 하나 추가하고,
    /// `%{ipv4}`, `%{ipv6}`, `%{email}`은 추가하지 않습니다. 이 스니펫들의 내부
    /// 그룹까지 세던 정의는 `group` 번호를 다시 매겨야 합니다.
    #[serde(default)]
    pub group: usize,
}

/// 줄을 정규식으로 매칭하고 캡처 그룹 하나를 출력합니다.
///
/// 요청한 그룹이 매칭에 참여하지 않은 줄은 매칭되지 않은 것으로 봅니다.
pub struct Grep {
    watcher: String,
    regex: Regex,
    group: usize,
}

/// 레지스트리 생성자
pub fn create(ctx: &WatcherContext, params: &PluginParams) -> Result<Box<dyn Filter>, PluginError> {
    Ok(Box::new(Grep::new(ctx, params.parse(KIND)?)?))
}

impl Grep {
    pub fn new(ctx: &WatcherContext, config: GrepConfig) -> Result<Self, PluginError> {
        let regex = pattern::compile(KIND, &config.pattern, config.ignorecase)?;
        if config.group >= regex.captures_len() {
            return Err(PluginError::config(
                KIND,
                format!(
                    "'group' {} does not exist in pattern ({} groups)",
                    config.group,
                    regex.captures_len() - 1
                ),
            ));
        }
        Ok(Self {
            watcher: ctx.name().to_owned(),
            regex,
            group: config.group,
        })
    }
}

impl Filter for Grep {
    fn kind(&self) -> &str {
        KIND
    }

    fn feed(&mut self, line: &str) -> Result<Option<Record>, PluginError> {
        let output = if self.group == 0 {
            self.regex.find(line).map(|m| m.as_str())
        } else {
            self.regex
                .captures(line)
                .and_then(|caps| caps.get(self.group))
                .map(|m| m.as_str())
        };
        Ok(output.map(|output| Record::new(&self.watcher, line, output)))
    }
}
