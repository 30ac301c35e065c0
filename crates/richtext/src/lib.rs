//! Rich-text editing extensions: soft line breaks, allow-list filtered paste
//! and the format registry behind HTML conversion.
//!
//! # Overview
//!
//! - [`delta`] - operation lists, composition, JSON codec and cleanup passes
//! - [`formats`] - reserved/default format names and the toolbar allow list
//! - [`registry`] - how each format is built from and read back out of HTML
//! - [`html`] - HTML fragment to delta conversion
//! - [`keyboard`] - the Shift+Enter line break handler
//! - [`clipboard`] - the paste pipeline and its task queue
//! - [`editor`] - the engine interface the handlers drive
//! - [`memory`] - an in-memory engine implementing [`Editor`]
//!
//! # Example
//!
//! ```
//! use richtext::{paste_html, Delta, Editor, EditorConfig, MemoryEditor, Range, ToolbarEntry};
//!
//! let config = EditorConfig::new(vec![ToolbarEntry::name("bold")]);
//! let mut editor = MemoryEditor::with_contents(&config, Delta::new().insert("Hi\n"));
//! editor.set_selection_range(Range::caret(2));
//!
//! let report = paste_html(&mut editor, "<b>!</b><i>?</i>").unwrap();
//! assert_eq!(report.inserted, 2);
//! assert_eq!(editor.contents().text(), "Hi!?\n");
//! ```

pub mod clipboard;
pub mod config;
pub mod delta;
pub mod editor;
pub mod formats;
pub mod html;
pub mod keyboard;
pub mod memory;
pub mod registry;

pub use clipboard::{
    convert_and_clean, on_paste, paste_html, ClipboardMatcher, MergeReport, PasteEvent, Task,
    TaskOutcome, TaskQueue, BREAK_MATCHER,
};
pub use config::{ConfigError, EditorConfig};
pub use delta::{Attributes, Content, Delta, DeltaError, Op};
pub use editor::{Editor, Leaf, ParentId, Range, Source, TextChange};
pub use formats::{build_allow_list, AllowList, ToolbarEntry, ANCHOR, BREAK, DEFAULT_FORMATS};
pub use html::HtmlConverter;
pub use keyboard::{handle_line_break, KeyBinding, LINE_BREAK_BINDING};
pub use memory::{Focus, MemoryEditor};
pub use registry::{Element, FormatDef, FormatStrategy, FormatTable, Scope};
