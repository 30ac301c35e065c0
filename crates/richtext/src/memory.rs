//! In-memory engine implementing [`Editor`].
//!
//! The document is a delta of inserts that always ends with `\n`. Each `\n`
//! terminates a block; leaves are text runs between newlines and single
//! embeds, and a leaf's parent is the number of its block.

use serde_json::Value;

use crate::clipboard::{ClipboardMatcher, BREAK_MATCHER};
use crate::config::EditorConfig;
use crate::delta::{Content, Delta, Op};
use crate::editor::{Editor, Leaf, ParentId, Range, Source, TextChange};
use crate::formats::AllowList;
use crate::html::HtmlConverter;
use crate::registry::FormatTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Editor,
    PasteContainer,
    None,
}

#[derive(Debug)]
pub struct MemoryEditor {
    document: Delta,
    selection: Option<Range>,
    selection_source: Option<Source>,
    enabled: bool,
    scroll_top: u32,
    focus: Focus,
    paste_container: Option<String>,
    allow: AllowList,
    table: FormatTable,
    matchers: Vec<ClipboardMatcher>,
    history: Vec<(Delta, Source)>,
    changes: Vec<TextChange>,
}

fn ends_with_newline(delta: &Delta) -> bool {
    matches!(
        delta.ops().last(),
        Some(Op::Insert { insert: Content::Text(s), .. }) if s.ends_with('\n')
    )
}

/// Keep inserts only and make sure the last block is terminated.
fn normalize_document(delta: Delta) -> Delta {
    let doc = delta.filter(Op::is_insert);
    if ends_with_newline(&doc) {
        doc
    } else {
        doc.insert("\n")
    }
}

impl MemoryEditor {
    /// Empty document (`"\n"`) with the `<br>` matcher registered.
    pub fn new(config: &EditorConfig) -> Self {
        Self::with_contents(config, Delta::new())
    }

    pub fn with_contents(config: &EditorConfig, contents: Delta) -> Self {
        Self {
            document: normalize_document(contents),
            selection: Some(Range::caret(0)),
            selection_source: None,
            enabled: true,
            scroll_top: 0,
            focus: Focus::Editor,
            paste_container: None,
            allow: config.allow_list(),
            table: FormatTable::standard(config),
            matchers: vec![BREAK_MATCHER],
            history: Vec::new(),
            changes: Vec::new(),
        }
    }

    pub fn add_matcher(&mut self, matcher: ClipboardMatcher) {
        self.matchers.push(matcher);
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow
    }

    pub fn format_table(&self) -> &FormatTable {
        &self.table
    }

    pub fn set_selection_range(&mut self, range: Range) {
        self.selection = Some(self.clamp(range));
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection_source(&self) -> Option<Source> {
        self.selection_source
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Fill the paste container, as the host does after a paste event.
    pub fn deliver_clipboard(&mut self, html: impl Into<String>) {
        self.paste_container = Some(html.into());
    }

    pub fn focus_target(&self) -> Focus {
        self.focus
    }

    /// Every applied change with its source.
    pub fn history(&self) -> &[(Delta, Source)] {
        &self.history
    }

    /// Every emitted `text-change`.
    pub fn changes(&self) -> &[TextChange] {
        &self.changes
    }

    pub fn leaves(&self) -> Vec<Leaf> {
        let mut leaves = Vec::new();
        let mut offset = 0;
        let mut block = 0;
        for op in self.document.ops() {
            match op {
                Op::Insert {
                    insert: Content::Text(text),
                    ..
                } => {
                    let mut segments = text.split('\n').peekable();
                    while let Some(segment) = segments.next() {
                        let length = segment.chars().count();
                        if length > 0 {
                            leaves.push(Leaf {
                                offset,
                                length,
                                parent: ParentId(block),
                            });
                            offset += length;
                        }
                        if segments.peek().is_some() {
                            offset += 1;
                            block += 1;
                        }
                    }
                }
                Op::Insert { .. } => {
                    leaves.push(Leaf {
                        offset,
                        length: 1,
                        parent: ParentId(block),
                    });
                    offset += 1;
                }
                Op::Retain { .. } | Op::Delete(_) => {}
            }
        }
        leaves
    }

    fn clamp(&self, range: Range) -> Range {
        let max = self.document.length().saturating_sub(1);
        let index = range.index.min(max);
        Range::new(index, range.length.min(max - index))
    }

    fn apply(&mut self, delta: &Delta, source: Source) -> Delta {
        let old = self.document.clone();
        self.document = normalize_document(old.compose(delta));
        self.history.push((delta.clone(), source));
        if let Some(range) = self.selection {
            let start = delta.transform_position(range.index);
            let end = delta.transform_position(range.end());
            self.selection = Some(self.clamp(Range::new(start, end.saturating_sub(start))));
        }
        old
    }
}

impl Editor for MemoryEditor {
    fn selection(&self) -> Option<Range> {
        self.selection
    }

    fn contents(&self) -> Delta {
        self.document.clone()
    }

    fn length(&self) -> usize {
        self.document.length()
    }

    fn leaf(&self, offset: usize) -> Option<Leaf> {
        self.leaves()
            .into_iter()
            .find(|l| l.offset <= offset && offset < l.offset + l.length)
    }

    fn insert_embed(&mut self, offset: usize, kind: &str, value: Value, source: Source) {
        let delta = Delta::new().retain(offset).insert_embed(kind, value);
        let old_delta = self.apply(&delta, source);
        if source != Source::Silent {
            self.emit_text_change(TextChange {
                delta,
                old_delta,
                source,
            });
        }
    }

    fn update_contents(&mut self, delta: &Delta, source: Source) {
        self.apply(delta, source);
    }

    fn set_selection(&mut self, offset: usize, source: Source) {
        self.selection = Some(self.clamp(Range::caret(offset)));
        self.selection_source = Some(source);
    }

    fn convert(&mut self, html: Option<&str>) -> Delta {
        let container = match html {
            Some(html) => Some(html.to_string()),
            None => self.paste_container.take(),
        };
        match container {
            Some(html) => HtmlConverter::new(&self.table, &self.allow, &self.matchers).convert(&html),
            None => Delta::new(),
        }
    }

    fn emit_text_change(&mut self, change: TextChange) {
        tracing::trace!(source = change.source.as_str(), "text-change");
        self.changes.push(change);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn scroll_top(&self) -> u32 {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, scroll_top: u32) {
        self.scroll_top = scroll_top;
    }

    fn focus_paste_container(&mut self) {
        self.focus = Focus::PasteContainer;
    }

    fn focus(&mut self) {
        self.focus = Focus::Editor;
    }

    fn update_selection(&mut self, source: Source) {
        self.selection_source = Some(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn editor(text: &str) -> MemoryEditor {
        MemoryEditor::with_contents(&EditorConfig::default(), Delta::new().insert(text))
    }

    #[test]
    fn new_document_is_single_newline() {
        let e = MemoryEditor::new(&EditorConfig::default());
        assert_eq!(e.contents().text(), "\n");
        assert_eq!(e.length(), 1);
    }

    #[test]
    fn contents_are_terminated() {
        assert_eq!(editor("abc").contents().text(), "abc\n");
        assert_eq!(editor("abc\n").length(), 4);
    }

    #[test]
    fn leaves_follow_blocks() {
        let e = editor("ab\ncd\n");
        let leaves = e.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].parent, ParentId(0));
        assert_eq!(leaves[1].offset, 3);
        assert_eq!(leaves[1].parent, ParentId(1));
        assert_eq!(e.leaf(2), None);
        assert_eq!(e.leaf(3).map(|l| l.parent), Some(ParentId(1)));
        assert_eq!(e.leaf(6), None);
    }

    #[test]
    fn embeds_are_their_own_leaves() {
        let mut e = editor("ab\n");
        e.insert_embed(1, "break", json!(true), Source::Api);
        let leaves = e.leaves();
        assert_eq!(leaves.len(), 3);
        assert!(leaves.iter().all(|l| l.parent == ParentId(0)));
        assert_eq!(e.changes().len(), 1);
    }

    #[test]
    fn silent_insert_emits_nothing() {
        let mut e = editor("ab\n");
        e.insert_embed(0, "break", json!(true), Source::Silent);
        assert!(e.changes().is_empty());
        assert_eq!(e.history().len(), 1);
    }

    #[test]
    fn update_contents_does_not_emit() {
        let mut e = editor("ab\n");
        e.update_contents(&Delta::new().retain(2).insert("c"), Source::User);
        assert_eq!(e.contents().text(), "abc\n");
        assert!(e.changes().is_empty());
    }

    #[test]
    fn overrunning_delete_keeps_document_valid() {
        let mut e = editor("ab\n");
        e.update_contents(&Delta::new().retain(2).delete(10), Source::User);
        assert_eq!(e.contents().text(), "ab\n");
    }

    #[test]
    fn selection_follows_edits() {
        let mut e = editor("abcd\n");
        e.set_selection_range(Range::new(2, 1));
        e.update_contents(&Delta::new().insert("xy"), Source::User);
        assert_eq!(e.selection(), Some(Range::new(4, 1)));
    }

    #[test]
    fn selection_is_clamped() {
        let mut e = editor("ab\n");
        e.set_selection(99, Source::Api);
        assert_eq!(e.selection(), Some(Range::caret(2)));
    }

    #[test]
    fn convert_consumes_paste_container() {
        let mut e = editor("\n");
        e.deliver_clipboard("hello");
        assert_eq!(e.convert(None).text(), "hello");
        assert!(e.convert(None).is_empty());
    }
}
