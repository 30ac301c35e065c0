//! Format allow-list derived from a toolbar declaration.
//!
//! Only formats the toolbar exposes may survive a paste. The allow list is the
//! toolbar's names intersected with [`DEFAULT_FORMATS`], plus the two reserved
//! names [`BREAK`] and [`ANCHOR`] which are always present and always first.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const BREAK: &str = "break";
pub const ANCHOR: &str = "anchor";

/// Names permitted regardless of toolbar configuration.
pub const RESERVED_FORMATS: [&str; 2] = [BREAK, ANCHOR];

/// The catalog of formats a toolbar may enable.
pub const DEFAULT_FORMATS: [&str; 21] = [
    "background",
    "bold",
    "color",
    "font",
    "code",
    "italic",
    "link",
    "size",
    "strike",
    "script",
    "underline",
    "blockquote",
    "header",
    "indent",
    "list",
    "align",
    "direction",
    "code-block",
    "formula",
    "image",
    "video",
];

pub fn is_default_format(name: &str) -> bool {
    DEFAULT_FORMATS.contains(&name)
}

// ── ToolbarEntry ──────────────────────────────────────────────────────────

/// One toolbar declaration entry.
///
/// `"bold"` is a bare name; `{"header": [1, 2, false]}` is a group whose keys
/// are format names. Any other JSON shape is accepted and contributes nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolbarEntry {
    Name(String),
    Group(Map<String, Value>),
    Other(Value),
}

impl ToolbarEntry {
    pub fn name(name: impl Into<String>) -> Self {
        ToolbarEntry::Name(name.into())
    }

    /// Group entry with a single key, e.g. `group("header", json!([1, 2]))`.
    pub fn group(key: impl Into<String>, value: Value) -> Self {
        let mut m = Map::new();
        m.insert(key.into(), value);
        ToolbarEntry::Group(m)
    }

    /// Format names this entry declares, before catalog filtering.
    fn names(&self) -> Vec<&str> {
        match self {
            ToolbarEntry::Name(n) => vec![n.as_str()],
            ToolbarEntry::Group(m) => m.keys().map(String::as_str).collect(),
            ToolbarEntry::Other(_) => Vec::new(),
        }
    }
}

// ── AllowList ─────────────────────────────────────────────────────────────

/// Ordered, read-only set of format names permitted through paste.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    names: IndexSet<String>,
}

impl AllowList {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}

impl Default for AllowList {
    /// Reserved names only.
    fn default() -> Self {
        build_allow_list(&[])
    }
}

/// Build the allow list for a toolbar declaration.
///
/// Never fails: names outside [`DEFAULT_FORMATS`] are dropped silently.
pub fn build_allow_list(toolbar: &[ToolbarEntry]) -> AllowList {
    let mut names: IndexSet<String> = RESERVED_FORMATS.iter().map(|n| n.to_string()).collect();
    for name in toolbar.iter().flat_map(ToolbarEntry::names) {
        if names.contains(name) {
            continue;
        }
        if !is_default_format(name) {
            tracing::trace!(format = name, "toolbar format not in catalog");
            continue;
        }
        names.insert(name.to_string());
    }
    AllowList { names }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_toolbar_allows_reserved_only() {
        let allow = build_allow_list(&[]);
        assert_eq!(allow.to_vec(), vec!["break", "anchor"]);
    }

    #[test]
    fn reserved_names_come_first() {
        let allow = build_allow_list(&[ToolbarEntry::name("bold"), ToolbarEntry::name("anchor")]);
        assert_eq!(allow.to_vec(), vec!["break", "anchor", "bold"]);
    }

    #[test]
    fn groups_contribute_keys() {
        let allow = build_allow_list(&[
            ToolbarEntry::group("header", json!([1, 2, 3, false])),
            ToolbarEntry::name("link"),
        ]);
        assert!(allow.contains("header"));
        assert!(allow.contains("link"));
        assert_eq!(allow.len(), 4);
    }

    #[test]
    fn unknown_names_are_dropped() {
        let allow = build_allow_list(&[
            ToolbarEntry::name("blink"),
            ToolbarEntry::name("clean"),
            ToolbarEntry::group("marquee", json!(true)),
        ]);
        assert_eq!(allow.len(), 2);
        assert!(!allow.contains("blink"));
    }

    #[test]
    fn duplicates_are_ignored() {
        let allow = build_allow_list(&[
            ToolbarEntry::name("bold"),
            ToolbarEntry::name("bold"),
            ToolbarEntry::group("bold", json!(null)),
        ]);
        assert_eq!(allow.to_vec(), vec!["break", "anchor", "bold"]);
    }

    #[test]
    fn other_shapes_contribute_nothing() {
        let allow = build_allow_list(&[ToolbarEntry::Other(json!(["bold", "italic"]))]);
        assert_eq!(allow.len(), 2);
    }

    #[test]
    fn deserializes_mixed_toolbar() {
        let toolbar: Vec<ToolbarEntry> =
            serde_json::from_value(json!(["bold", {"header": [1, 2]}, ["italic"], 7])).unwrap();
        assert_eq!(toolbar[0], ToolbarEntry::name("bold"));
        assert!(matches!(toolbar[1], ToolbarEntry::Group(_)));
        assert!(matches!(toolbar[2], ToolbarEntry::Other(_)));
        assert!(matches!(toolbar[3], ToolbarEntry::Other(_)));
    }

    #[test]
    fn default_is_reserved_only() {
        assert_eq!(AllowList::default(), build_allow_list(&[]));
    }
}
