//! 내장 filter
//!
//! - [`grep`]: 정규식 매칭, 출력은 캡처 그룹
//! - [`awk`]: 구분된 필드 하나에 정규식 매칭, 출력은 다른 필드

pub mod awk;
pub mod grep;

pub use awk::{Awk, AwkConfig};
pub use grep::{Grep, GrepConfig};
