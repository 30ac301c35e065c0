//! Interface of the rich-text engine this crate drives.
//!
//! The engine owns the document buffer, the selection and change emission.
//! Everything here borrows it for one synchronous step or one queued task.

use serde_json::Value;

use crate::delta::Delta;

/// Who a mutation is attributed to; controls change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// User edit: emits a change and is tracked by history.
    User,
    /// Programmatic edit: emits a change.
    Api,
    /// Emits nothing.
    Silent,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::User => "user",
            Source::Api => "api",
            Source::Silent => "silent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub index: usize,
    pub length: usize,
}

impl Range {
    pub fn new(index: usize, length: usize) -> Self {
        Self { index, length }
    }

    pub fn caret(index: usize) -> Self {
        Self { index, length: 0 }
    }

    pub fn end(&self) -> usize {
        self.index + self.length
    }
}

/// Identifies a leaf's structural parent (the block that contains it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParentId(pub usize);

/// Smallest structural unit of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Document offset of the leaf's first item.
    pub offset: usize,
    pub length: usize,
    pub parent: ParentId,
}

/// One `text-change` notification.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChange {
    pub delta: Delta,
    pub old_delta: Delta,
    pub source: Source,
}

pub trait Editor {
    fn selection(&self) -> Option<Range>;

    fn contents(&self) -> Delta;

    fn length(&self) -> usize {
        self.contents().length()
    }

    /// Leaf holding the item at `offset`; `None` at a block end or past the document.
    fn leaf(&self, offset: usize) -> Option<Leaf>;

    fn insert_embed(&mut self, offset: usize, kind: &str, value: Value, source: Source);

    fn update_contents(&mut self, delta: &Delta, source: Source);

    fn set_selection(&mut self, offset: usize, source: Source);

    /// Convert an HTML fragment (or, with `None`, the paste container) into a
    /// delta restricted to the engine's registered allow list.
    fn convert(&mut self, html: Option<&str>) -> Delta;

    fn emit_text_change(&mut self, change: TextChange);

    fn is_enabled(&self) -> bool;

    fn scroll_top(&self) -> u32;

    fn set_scroll_top(&mut self, scroll_top: u32);

    /// Move focus to the off-screen container the host pastes into.
    fn focus_paste_container(&mut self);

    /// Return focus to the editing surface.
    fn focus(&mut self);

    /// Re-read the selection from the host.
    fn update_selection(&mut self, source: Source);
}
