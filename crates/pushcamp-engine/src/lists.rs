//! Operator-supplied list files.
//!
//! Two byte-exact formats an operator round-trips by hand:
//! - ignore list: one handle per line, first comma-delimited field used,
//!   blank lines skipped;
//! - user list: `handle[,phoneNumberHint]` per line, hint reduced to digits
//!   and `+` before any comparison.

use std::collections::HashSet;
use std::path::Path;

use pushcamp_core::error::{PushCampError, Result};

/// One explicit-targeting entry. A `None` hint means "pick a device at
/// random"; a `Some` hint must match an eligible device exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserListEntry {
    pub handle: String,
    pub number_hint: Option<String>,
}

/// Reduce a phone number to digits and `+` so formatting differences
/// ("+1 (555) 000-111" vs "+1555000111") never matter.
pub fn normalize_number(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect()
}

/// Load an explicit user list. The file must exist.
pub fn load_user_list(path: &Path) -> Result<Vec<UserListEntry>> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| PushCampError::Config(format!("user list {} not found", path.display())))?;

    let mut entries = Vec::new();
    for line in content.lines() {
        let mut fields = line.split(',');
        let handle = fields.next().unwrap_or_default().trim();
        if handle.is_empty() {
            continue;
        }
        let hint = fields
            .next()
            .map(|f| normalize_number(f.trim()))
            .filter(|h| !h.is_empty());
        entries.push(UserListEntry { handle: handle.to_string(), number_hint: hint });
    }
    Ok(entries)
}

/// Load an ignore list. The file must exist.
pub fn load_ignore_list(path: &Path) -> Result<HashSet<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| PushCampError::Config(format!("ignore list {} not found", path.display())))?;

    Ok(content
        .lines()
        .filter_map(|line| {
            let handle = line.split(',').next().unwrap_or_default().trim();
            if handle.is_empty() { None } else { Some(handle.to_string()) }
        })
        .collect())
}
