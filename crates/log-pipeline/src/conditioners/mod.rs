//! 내장 conditioner
//!
//! - [`sed`]: 조건부 통과("if (not)") 또는 찾아 바꾸기

pub mod sed;

pub use sed::{Sed, SedConfig};
