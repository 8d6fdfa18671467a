//! 필드 필터 -- `awk -F<sep> '$N ~ /re/ { print $M }'`과 비슷하게 동작합니다.
//!
//! 필드 번호는 1부터 시작하며 0번은 줄 전체입니다. 구분자는 정규식이 아닌
//! 리터럴 문자열입니다.

use logwatch_core::context::WatcherContext;
use logwatch_core::error::PluginError;
use logwatch_core::plugin::{Filter, PluginParams};
use logwatch_core::record::Record;
use regex::Regex;
use serde::Deserialize;

use crate::pattern;

const KIND: &str = "awk";

/// `awk` 파라미터
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwkConfig {
    #[serde(default = "default_separator")]
    pub separator: String,
    /// `pattern`으로 검사할 필드
    pub input: usize,
    pub pattern: String,
    #[serde(default)]
    pub ignorecase: bool,
    /// 출력으로 쓸 필드
    #[serde(default)]
    pub output: usize,
}

fn default_separator() -> String {
    ",".to_owned()
}

pub struct Awk {
    watcher: String,
    separator: String,
    input: usize,
    output: usize,
    regex: Regex,
}

/// 레지스트리 생성자
pub fn create(ctx: &WatcherContext, params: &PluginParams) -> Result<Box<dyn Filter>, PluginError> {
    Ok(Box::new(Awk::new(ctx, params.parse(KIND)?)?))
}

impl Awk {
    pub fn new(ctx: &WatcherContext, config: AwkConfig) -> Result<Self, PluginError> {
        if config.separator.is_empty() {
            return Err(PluginError::config(KIND, "'separator' must not be empty"));
        }
        if config.input == 0 && config.output == 0 {
            ctx.log(
                tracing::Level::WARN,
                "awk: matching and outputting the entire line would be faster with grep",
            );
        }
        Ok(Self {
            watcher: ctx.name().to_owned(),
            regex: pattern::compile(KIND, &config.pattern, config.ignorecase)?,
            separator: config.separator,
            input: config.input,
            output: config.output,
        })
    }

    fn field<'a>(&self, line: &'a str, fields: &[&'a str], n: usize) -> Result<&'a str, PluginError> {
        if n == 0 {
            return Ok(line);
        }
        fields.get(n - 1).copied().ok_or_else(|| {
            PluginError::Failed(format!(
                "awk: field {n} out of range (line has {} fields)",
                fields.len()
            ))
        })
    }
}

impl Filter for Awk {
    fn kind(&self) -> &str {
        KIND
    }

    fn feed(&mut self, line: &str) -> Result<Option<Record>, PluginError> {
        let fields: Vec<&str> = line.split(self.separator.as_str()).collect();
        if !self.regex.is_match(self.field(line, &fields, self.input)?) {
            return Ok(None);
        }
        let output = self.field(line, &fields, self.output)?;
        Ok(Some(Record::new(&self.watcher, line, output)))
    }
}
