//! Firmware version rules.
//!
//! Versions are compared as plain strings, byte by byte. This matches what
//! deployed devices do, so `"9.0"` is newer than `"10.0"`. Keep version
//! strings fixed width (e.g. `05.09.24`) to get the expected ordering.

use std::cmp::Ordering;

/// How an offered version relates to the running one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    Same,
    Older,
    Newer,
}

pub fn compare_versions(running: &str, offered: &str) -> VersionCheck {
    match offered.cmp(running) {
        Ordering::Equal => VersionCheck::Same,
        Ordering::Less => VersionCheck::Older,
        Ordering::Greater => VersionCheck::Newer,
    }
}

pub fn is_same_version(running: &str, offered: &str) -> bool {
    compare_versions(running, offered) == VersionCheck::Same
}

/// Whether `offered` should replace `running`
pub fn needs_update(running: &str, offered: &str) -> bool {
    compare_versions(running, offered) == VersionCheck::Newer
}
