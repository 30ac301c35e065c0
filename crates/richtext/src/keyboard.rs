//! Shift+Enter soft line break.
//!
//! The block model collapses a single break that ends a block, so a break
//! typed at the end of a block (or of the document) is inserted twice to keep
//! the empty trailing line visible.

use serde_json::Value;

use crate::editor::{Editor, Range, Source};
use crate::formats::BREAK;

pub const ENTER_KEY: u32 = 13;

pub type KeyHandler = fn(&mut dyn Editor, Range) -> usize;

/// Entry for the host's key-dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct KeyBinding {
    pub key: u32,
    pub shift_key: bool,
    pub handler: KeyHandler,
}

impl KeyBinding {
    pub fn matches(&self, key: u32, shift_key: bool) -> bool {
        self.key == key && self.shift_key == shift_key
    }
}

pub const LINE_BREAK_BINDING: KeyBinding = KeyBinding {
    key: ENTER_KEY,
    shift_key: true,
    handler: handle_line_break,
};

/// Insert a soft break at `range.index`. Returns the number of breaks inserted.
pub fn handle_line_break(editor: &mut dyn Editor, range: Range) -> usize {
    let index = range.index;
    editor.insert_embed(index, BREAK, Value::Bool(true), Source::User);

    let current = editor.leaf(index);
    let next = editor.leaf(index + 1);
    let same_parent = matches!((&current, &next), (Some(c), Some(n)) if c.parent == n.parent);

    let mut inserted = 1;
    if !same_parent {
        editor.insert_embed(index, BREAK, Value::Bool(true), Source::User);
        inserted += 1;
    }

    editor.set_selection(index + 1, Source::Silent);
    tracing::debug!(index, inserted, "line break");
    inserted
}
