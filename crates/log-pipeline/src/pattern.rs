//! `grep`, `awk`, `sed` 플러그인이 공유하는 정규식 컴파일
//!
//! 패턴에는 미리 정의된 표현식으로 확장되는 스니펫을 쓸 수 있습니다.
//!
//! | 스니펫     | 확장 결과                                            |
//! |------------|------------------------------------------------------|
//! | `%{ip}`    | IPv4 또는 IPv6 주소, 캡처 그룹 하나                  |
//! | `%{ipv4}`  | IPv4 주소 (캡처 그룹 없음)                           |
//! | `%{ipv6}`  | IPv6 주소 (캡처 그룹 없음)                           |
//! | `%{email}` | 이메일 주소 (캡처 그룹 없음)                         |
//!
//! 스니펫은 `%{ip}`의 그룹 하나 외에는 그룹을 추가하지 않으므로, 사용자가 쓴
//! 그룹 번호가 예측 가능하게 유지됩니다.

use logwatch_core::error::PluginError;
use regex::{Regex, RegexBuilder};

const IPV4: &str = r"[0-9]{1,3}(?:\.[0-9]{1,3}){3}";
const IPV6: &str = r"[0-9a-fA-F]{1,4}(?::[0-9a-fA-F]{0,4}){2,7}";
const EMAIL: &str =
    r"[-_a-zA-Z0-9]+(?:\.[-_a-zA-Z0-9]+)*@[-_a-zA-Z0-9]+(?:\.[-_a-zA-Z0-9]+)*\.[a-zA-Z]{2,}";

/// `pattern`의 모든 스니펫을 표현식으로 치환합니다.
pub fn expand_snippets(pattern: &str) -> String {
    pattern
        .replace("%{ip}", &format!("({IPV4}|{IPV6})"))
        .replace("%{ipv4}", IPV4)
        .replace("%{ipv6}", IPV6)
        .replace("%{email}", EMAIL)
}

/// 스니펫을 확장하고 `pattern`을 컴파일합니다.
///
/// 컴파일에 실패한 패턴은 `plugin`의 설정 오류입니다.
pub fn compile(plugin: &str, pattern: &str, ignorecase: bool) -> Result<Regex, PluginError> {
    RegexBuilder::new(&expand_snippets(pattern))
        .case_insensitive(ignorecase)
        .build()
        .map_err(|e| PluginError::config(plugin, format!("invalid pattern '{pattern}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_snippet_captures_v4_and_v6() {
        let re = compile("grep", "from %{ip} port", false).unwrap();
        assert_eq!(re.captures_len(), 2);

        let caps = re.captures("Failed password from 10.0.0.7 port 22").unwrap();
        assert_eq!(&caps[1], "10.0.0.7");

        let caps = re.captures("Failed password from fe80::1:2 port 22").unwrap();
        assert_eq!(&caps[1], "fe80::1:2");
    }

    #[test]
    fn ipv4_snippet_adds_no_group() {
        let re = compile("grep", "src=(%{ipv4})", false).unwrap();
        assert_eq!(re.captures_len(), 2);
        let caps = re.captures("src=192.168.1.20 dst=10.0.0.1").unwrap();
        assert_eq!(&caps[1], "192.168.1.20");
    }

    #[test]
    fn email_snippet() {
        let re = compile("grep", "to=<(%{email})>", false).unwrap();
        let caps = re.captures("status=sent to=<root@mail.example.org>").unwrap();
        assert_eq!(&caps[1], "root@mail.example.org");
        assert!(!re.is_match("to=<not-an-address>"));
    }

    #[test]
    fn plain_patterns_are_untouched() {
        assert_eq!(expand_snippets("^sshd\\[[0-9]+\\]"), "^sshd\\[[0-9]+\\]");
    }

    #[test]
    fn ignorecase_flag() {
        let re = compile("grep", "error", true).unwrap();
        assert!(re.is_match("kernel: ERROR in module"));
        let re = compile("grep", "error", false).unwrap();
        assert!(!re.is_match("kernel: ERROR in module"));
    }

    #[test]
    fn invalid_pattern_is_config_fault() {
        let err = compile("awk", "([unclosed", false).unwrap_err();
        assert!(err.is_config_fault());
        assert!(err.to_string().contains("awk"));
    }
}
