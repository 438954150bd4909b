//! Store-level record types.

use serde::{Deserialize, Serialize};

/// Longest group label kept, in bytes.
pub const MAX_GROUP_BYTES: usize = 100;

/// Longest website kept, in bytes.
pub const MAX_WEBSITE_BYTES: usize = 200;

/// Partial metadata update. `None` leaves a field unchanged; an empty
/// string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub group: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub entities: usize,
    pub snapshots: usize,
    /// Distinct non-empty group labels across all entities.
    pub groups: usize,
}

/// Cut `s` to at most `max` bytes without splitting a character.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate, and treat an empty result as absent.
pub(crate) fn clean_label(value: Option<&str>, max: usize) -> Option<String> {
    value
        .map(|v| truncate_utf8(v.trim(), max))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        // 'é' is two bytes; cutting at 2 would split it.
        assert_eq!(truncate_utf8("aéb", 2), "a");
        assert_eq!(truncate_utf8("", 0), "");
    }

    #[test]
    fn blank_labels_become_none() {
        assert_eq!(clean_label(Some("  "), 10), None);
        assert_eq!(clean_label(None, 10), None);
        assert_eq!(clean_label(Some(" OpenChat "), 4).as_deref(), Some("Open"));
    }
}
