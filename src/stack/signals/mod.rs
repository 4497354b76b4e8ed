//! Signal extractors
//!
//! Pure functions over file content. None of them touch the filesystem and none of
//! them fail: malformed or absent input yields `false`/`None`. Detectors decide where
//! the content comes from and how much each signal weighs.

pub mod js;
pub mod jvm;

use regex::Regex;
use std::sync::OnceLock;

/// Accepts literal release versions like `3.2.0`, `2.7.18.RELEASE` or `18.2.0-rc.1`.
pub fn is_literal_version(value: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d+)*([.\-+][0-9A-Za-z.\-]+)?$").expect("valid regex"))
        .is_match(value)
}
