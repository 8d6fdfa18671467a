//! sed 스타일 conditioner
//!
//! `replace`가 없으면 "if (not)"으로 동작합니다. 데이터가 매칭되지 않는
//! (`not`이면 매칭되는) 레코드는 중단됩니다.
//!
//! `replace`가 있으면 찾아 바꾸기로 동작합니다. 매칭되지 않은 레코드는 그대로
//! 통과하고, 매칭된 레코드는 `replace`를 새 output으로 받습니다. `replace`의
//! `\N`은 캡처 그룹 N을 삽입합니다 (`not`이면 그룹을 가져올 매칭이 없으므로
//! 예외).

use logwatch_core::context::WatcherContext;
use logwatch_core::error::PluginError;
use logwatch_core::plugin::{Conditioner, PluginParams};
use logwatch_core::record::Record;
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::pattern;

const KIND: &str = "sed";

/// `sed` 파라미터
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SedConfig {
    pub pattern: String,
    #[serde(default)]
    pub ignorecase: bool,
    /// 매칭 결과 반전
    #[serde(default)]
    pub not: bool,
    /// 현재 output 대신 producer의 원시 줄을 검사
    #[serde(default)]
    pub raw: bool,
    #[serde(default)]
    pub replace: Option<String>,
}

pub struct Sed {
    regex: Regex,
    not: bool,
    raw: bool,
    replace: Option<Replacement>,
}

struct Replacement {
    literal: String,
    /// `regex` 확장 템플릿, `literal`에 역참조가 있을 때만 존재
    template: Option<String>,
}

impl Replacement {
    fn new(literal: String, expand: bool) -> Self {
        let template = if expand { to_template(&literal) } else { None };
        Self { literal, template }
    }

    fn render(&self, caps: Option<&Captures<'_>>) -> String {
        match (&self.template, caps) {
            (Some(template), Some(caps)) => {
                let mut out = String::new();
                caps.expand(template, &mut out);
                out
            }
            _ => self.literal.clone(),
        }
    }
}

/// `\N` 역참조를 `${N}`으로 바꾸고 `$`를 이스케이프합니다.
///
/// 확장할 역참조가 없으면 `None`을 반환합니다.
fn to_template(replace: &str) -> Option<String> {
    let mut out = String::with_capacity(replace.len() + 8);
    let mut has_backref = false;
    let mut chars = replace.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(d) if d.is_ascii_digit() => {
                    out.push_str("${");
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        out.push(d);
                        chars.next();
                    }
                    out.push('}');
                    has_backref = true;
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push('\\'),
            },
            '$' => out.push_str("$$"),
            c => out.push(c),
        }
    }
    has_backref.then_some(out)
}

/// 레지스트리 생성자
pub fn create(
    _ctx: &WatcherContext,
    params: &PluginParams,
) -> Result<Box<dyn Conditioner>, PluginError> {
    Ok(Box::new(Sed::new(params.parse(KIND)?)?))
}

impl Sed {
    pub fn new(config: SedConfig) -> Result<Self, PluginError> {
        Ok(Self {
            regex: pattern::compile(KIND, &config.pattern, config.ignorecase)?,
            not: config.not,
            raw: config.raw,
            replace: config
                .replace
                .map(|literal| Replacement::new(literal, !config.not)),
        })
    }
}

impl Conditioner for Sed {
    fn kind(&self) -> &str {
        KIND
    }

    fn feed(&mut self, record: Record) -> Result<Option<Record>, PluginError> {
        let (matched, rendered) = {
            let subject = if self.raw {
                record.raw()
            } else {
                record.output()
            };
            let caps = self.regex.captures(subject);
            let matched = caps.is_some() != self.not;
            let rendered = match &self.replace {
                Some(replace) if matched => Some(replace.render(caps.as_ref())),
                _ => None,
            };
            (matched, rendered)
        };

        if !matched {
            // 찾아 바꾸기는 매칭되지 않은 레코드를 그대로 통과시킴
            return Ok(self.replace.is_some().then_some(record));
        }
        Ok(Some(match rendered {
            Some(output) => record.with_output(output),
            None => record,
        }))
    }
}
