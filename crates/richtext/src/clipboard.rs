//! Paste pipeline.
//!
//! A paste replaces the current selection with the clipboard content,
//! filtered down to the allow list, as one user change:
//!
//! 1. [`on_paste`] snapshots the document and selection before the host
//!    touches the DOM, prepares the paste container, and queues two tasks.
//! 2. [`Task::MergePaste`] converts the populated container, strips
//!    placeholder breaks, applies `retain(index) + content + delete(length)`
//!    and restores cursor, scroll and focus.
//! 3. [`Task::EmitTextChange`] emits the one `text-change` for the paste,
//!    since the merge path does not notify on its own.
//!
//! The two tasks run in submission order and nothing else is guaranteed about
//! them. Hosts that can read clipboard HTML synchronously use [`paste_html`],
//! which does snapshot and apply in one call.

use std::collections::VecDeque;

use crate::delta::clean::{placeholder_break, strip_placeholder_breaks};
use crate::delta::Delta;
use crate::editor::{Editor, Range, Source, TextChange};

/// The host's paste event, reduced to what the pipeline reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PasteEvent {
    pub default_prevented: bool,
}

// ── Matchers ──────────────────────────────────────────────────────────────

pub type MatcherFn = fn() -> Delta;

/// Conversion override for one tag name.
#[derive(Debug, Clone, Copy)]
pub struct ClipboardMatcher {
    pub tag_name: &'static str,
    pub matcher: MatcherFn,
}

/// `<br>` becomes a placeholder break; conversion promotes it when it
/// separates content within a block.
pub fn break_matcher() -> Delta {
    Delta::from_ops([placeholder_break()])
}

pub const BREAK_MATCHER: ClipboardMatcher = ClipboardMatcher {
    tag_name: "BR",
    matcher: break_matcher,
};

// ── Tasks ─────────────────────────────────────────────────────────────────

/// State captured when the paste event fires.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPaste {
    pub range: Range,
    /// `retain(range.index)` with placeholders stripped.
    pub prefix: Delta,
    pub scroll_top: u32,
    /// Document length at snapshot time.
    pub snapshot_length: usize,
}

impl PendingPaste {
    fn capture(editor: &dyn Editor, range: Range, snapshot_length: usize) -> Self {
        Self {
            range,
            prefix: strip_placeholder_breaks(&Delta::new().retain(range.index)),
            scroll_top: editor.scroll_top(),
            snapshot_length,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// The document changed length between snapshot and merge.
    pub stale: bool,
    /// Length of the content that was inserted.
    pub inserted: usize,
    /// Cursor offset after the merge.
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    MergePaste(PendingPaste),
    EmitTextChange { old_delta: Delta },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Merged(MergeReport),
    Emitted,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::MergePaste(_) => "merge-paste",
            Task::EmitTextChange { .. } => "emit-text-change",
        }
    }

    pub fn run(self, editor: &mut dyn Editor) -> TaskOutcome {
        match self {
            Task::MergePaste(pending) => {
                let pasted = convert_and_clean(editor, None);
                TaskOutcome::Merged(merge(editor, &pending, pasted))
            }
            Task::EmitTextChange { old_delta } => {
                emit_change(editor, old_delta);
                TaskOutcome::Emitted
            }
        }
    }
}

/// FIFO of deferred tasks.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) {
        tracing::trace!(task = task.name(), "queued");
        self.tasks.push_back(task);
    }

    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(Task::name).collect()
    }

    /// Run the oldest task.
    pub fn run_next(&mut self, editor: &mut dyn Editor) -> Option<TaskOutcome> {
        self.pop().map(|task| task.run(editor))
    }

    /// Run every queued task in submission order.
    pub fn run_all(&mut self, editor: &mut dyn Editor) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        while let Some(outcome) = self.run_next(editor) {
            outcomes.push(outcome);
        }
        outcomes
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────

/// Convert HTML (or the paste container) and strip placeholder breaks.
pub fn convert_and_clean(editor: &mut dyn Editor, html: Option<&str>) -> Delta {
    strip_placeholder_breaks(&editor.convert(html))
}

/// Handle a paste event. Returns `false` when the paste is ignored.
pub fn on_paste(editor: &mut dyn Editor, event: &PasteEvent, queue: &mut TaskQueue) -> bool {
    if event.default_prevented || !editor.is_enabled() {
        return false;
    }
    let old_delta = editor.contents();
    let Some(range) = editor.selection() else {
        tracing::debug!("paste without selection ignored");
        return false;
    };
    let pending = PendingPaste::capture(editor, range, old_delta.length());

    editor.focus_paste_container();
    editor.update_selection(Source::Silent);

    tracing::debug!(index = range.index, length = range.length, "paste scheduled");
    queue.push(Task::MergePaste(pending));
    queue.push(Task::EmitTextChange { old_delta });
    true
}

/// Paste `html` immediately: snapshot, merge and notify in one call.
pub fn paste_html(editor: &mut dyn Editor, html: &str) -> Option<MergeReport> {
    if !editor.is_enabled() {
        return None;
    }
    let old_delta = editor.contents();
    let range = editor.selection()?;
    let pending = PendingPaste::capture(editor, range, old_delta.length());
    let pasted = convert_and_clean(editor, Some(html));
    let report = merge(editor, &pending, pasted);
    emit_change(editor, old_delta);
    Some(report)
}

fn merge(editor: &mut dyn Editor, pending: &PendingPaste, pasted: Delta) -> MergeReport {
    let current_length = editor.length();
    let stale = current_length != pending.snapshot_length;
    if stale {
        tracing::warn!(
            target: "richtext::clipboard",
            snapshot_length = pending.snapshot_length,
            current_length,
            index = pending.range.index,
            length = pending.range.length,
            "document changed before paste merge; applying against stale selection"
        );
    }

    let inserted = pasted.length();
    let delta = pending
        .prefix
        .clone()
        .concat(pasted)
        .delete(pending.range.length);
    editor.update_contents(&delta, Source::User);

    // The trailing delete accounts for exactly range.length of delta.length().
    let cursor = delta.length() - pending.range.length;
    editor.set_selection(cursor, Source::Silent);
    editor.set_scroll_top(pending.scroll_top);
    editor.focus();

    tracing::debug!(inserted, cursor, "paste merged");
    MergeReport {
        stale,
        inserted,
        cursor,
    }
}

fn emit_change(editor: &mut dyn Editor, old_delta: Delta) {
    let delta = editor.contents();
    editor.emit_text_change(TextChange {
        delta,
        old_delta,
        source: Source::User,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::formats::ToolbarEntry;
    use crate::memory::{Focus, MemoryEditor};

    fn editor(text: &str, range: Range) -> MemoryEditor {
        let config = EditorConfig::new(vec![ToolbarEntry::name("bold")]);
        let mut e = MemoryEditor::with_contents(&config, Delta::new().insert(text));
        e.set_selection_range(range);
        e
    }

    #[test]
    fn break_matcher_yields_placeholder() {
        let delta = (BREAK_MATCHER.matcher)();
        assert_eq!(delta.ops(), &[placeholder_break()]);
        assert_eq!(BREAK_MATCHER.tag_name, "BR");
    }

    #[test]
    fn queues_merge_then_emit() {
        let mut e = editor("Hello\n", Range::caret(5));
        let mut queue = TaskQueue::new();
        assert!(on_paste(&mut e, &PasteEvent::default(), &mut queue));
        assert_eq!(queue.names(), vec!["merge-paste", "emit-text-change"]);
        assert_eq!(e.focus_target(), Focus::PasteContainer);
        assert!(e.changes().is_empty());
    }

    #[test]
    fn prevented_event_is_ignored() {
        let mut e = editor("Hello\n", Range::caret(0));
        let mut queue = TaskQueue::new();
        let event = PasteEvent {
            default_prevented: true,
        };
        assert!(!on_paste(&mut e, &event, &mut queue));
        assert!(queue.is_empty());
    }

    #[test]
    fn disabled_editor_is_ignored() {
        let mut e = editor("Hello\n", Range::caret(0));
        e.set_enabled(false);
        let mut queue = TaskQueue::new();
        assert!(!on_paste(&mut e, &PasteEvent::default(), &mut queue));
        assert_eq!(paste_html(&mut e, "x"), None);
    }

    #[test]
    fn missing_selection_is_a_noop() {
        let mut e = editor("Hello\n", Range::caret(0));
        e.clear_selection();
        let mut queue = TaskQueue::new();
        assert!(!on_paste(&mut e, &PasteEvent::default(), &mut queue));
        assert!(queue.is_empty());
        assert_eq!(e.contents().text(), "Hello\n");
    }

    #[test]
    fn deferred_paste_replaces_selection() {
        let mut e = editor("Hello world\n", Range::new(6, 5));
        e.set_scroll_top(120);
        let mut queue = TaskQueue::new();
        on_paste(&mut e, &PasteEvent::default(), &mut queue);
        e.set_scroll_top(0);
        e.deliver_clipboard("<b>there</b>");

        let outcomes = queue.run_all(&mut e);
        assert_eq!(
            outcomes[0],
            TaskOutcome::Merged(MergeReport {
                stale: false,
                inserted: 5,
                cursor: 11,
            })
        );
        assert_eq!(outcomes[1], TaskOutcome::Emitted);
        assert_eq!(e.contents().text(), "Hello there\n");
        assert_eq!(e.selection(), Some(Range::caret(11)));
        assert_eq!(e.scroll_top(), 120);
        assert_eq!(e.focus_target(), Focus::Editor);
        assert_eq!(e.changes().len(), 1);
        assert_eq!(e.changes()[0].old_delta.text(), "Hello world\n");
        assert_eq!(e.changes()[0].source, Source::User);
    }

    #[test]
    fn empty_container_deletes_selection_only() {
        let mut e = editor("abcdef\n", Range::new(1, 2));
        let mut queue = TaskQueue::new();
        on_paste(&mut e, &PasteEvent::default(), &mut queue);
        queue.run_all(&mut e);
        assert_eq!(e.contents().text(), "adef\n");
        assert_eq!(e.selection(), Some(Range::caret(1)));
    }

    #[test]
    fn edit_between_snapshot_and_merge_is_reported_stale() {
        let mut e = editor("abc\n", Range::caret(3));
        let mut queue = TaskQueue::new();
        on_paste(&mut e, &PasteEvent::default(), &mut queue);
        e.update_contents(&Delta::new().insert("zz"), Source::User);
        e.deliver_clipboard("x");
        match queue.run_next(&mut e) {
            Some(TaskOutcome::Merged(report)) => assert!(report.stale),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn synchronous_paste_emits_once() {
        let mut e = editor("Hi\n", Range::caret(2));
        let report = paste_html(&mut e, "<p>yo</p>").unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(e.contents().text(), "Hiyo\n");
        assert_eq!(e.changes().len(), 1);
    }

    #[test]
    fn convert_and_clean_strips_trailing_br() {
        let mut e = editor("\n", Range::caret(0));
        let delta = convert_and_clean(&mut e, Some("<p>a<br></p>"));
        assert_eq!(delta.count_embeds("break"), 0);
        assert_eq!(delta.text(), "a");
    }
}
