//! Rich-text delta: an ordered list of insert / retain / delete operations.
//!
//! A delta describes either a whole document (inserts only, ending with a
//! newline) or a change against a document. Lengths are counted in Unicode
//! scalar values; every embed counts as one.
//!
//! # Operation format
//!
//! - `Insert { insert, attributes }` - insert text or a single embed
//! - `Retain { retain, attributes }` - keep `n` items, optionally reformatting them
//! - `Delete(n)` - remove `n` items

use serde_json::{Map, Value};

pub mod clean;
mod codec;
mod iter;

pub use codec::DeltaError;

use iter::{OpIter, OpKind};

/// Format name -> format value. `null` removes a format when composed.
pub type Attributes = Map<String, Value>;

// ── Content ───────────────────────────────────────────────────────────────

/// Payload of an insert operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    /// Single-key embed such as `{"break": true}` or `{"image": "a.png"}`.
    Embed { kind: String, value: Value },
}

impl Content {
    pub fn embed(kind: impl Into<String>, value: Value) -> Self {
        Content::Embed {
            kind: kind.into(),
            value,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Content::Text(s) => s.chars().count(),
            Content::Embed { .. } => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            Content::Embed { .. } => None,
        }
    }

    /// Returns the embed kind, or `None` for text.
    pub fn embed_kind(&self) -> Option<&str> {
        match self {
            Content::Text(_) => None,
            Content::Embed { kind, .. } => Some(kind),
        }
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

// ── Op ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Insert {
        insert: Content,
        attributes: Option<Attributes>,
    },
    Retain {
        retain: usize,
        attributes: Option<Attributes>,
    },
    Delete(usize),
}

impl Op {
    pub fn insert(content: impl Into<Content>) -> Self {
        Op::Insert {
            insert: content.into(),
            attributes: None,
        }
    }

    pub fn retain(n: usize) -> Self {
        Op::Retain {
            retain: n,
            attributes: None,
        }
    }

    /// Length of this operation in document items.
    pub fn len(&self) -> usize {
        match self {
            Op::Insert { insert, .. } => insert.len(),
            Op::Retain { retain, .. } => *retain,
            Op::Delete(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Op::Insert { attributes, .. } | Op::Retain { attributes, .. } => attributes.as_ref(),
            Op::Delete(_) => None,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Op::Insert { .. })
    }

    pub fn is_retain(&self) -> bool {
        matches!(self, Op::Retain { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Op::Delete(_))
    }

    fn kind(&self) -> OpKind {
        match self {
            Op::Insert { .. } => OpKind::Insert,
            Op::Retain { .. } => OpKind::Retain,
            Op::Delete(_) => OpKind::Delete,
        }
    }
}

fn non_empty(attributes: Option<Attributes>) -> Option<Attributes> {
    attributes.filter(|a| !a.is_empty())
}

/// Merge `b` over `a`. With `keep_null` the `null` removals in `b` survive
/// (needed when composing two changes); otherwise they are dropped.
pub fn compose_attributes(
    a: Option<&Attributes>,
    b: Option<&Attributes>,
    keep_null: bool,
) -> Option<Attributes> {
    let mut out = b.cloned().unwrap_or_default();
    if !keep_null {
        out.retain(|_, v| !v.is_null());
    }
    if let Some(a) = a {
        for (key, value) in a {
            if !b.is_some_and(|b| b.contains_key(key)) {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    non_empty(Some(out))
}

// ── Delta ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    ops: Vec<Op>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a delta from raw operations, coalescing as [`Delta::push`] does.
    pub fn from_ops(ops: impl IntoIterator<Item = Op>) -> Self {
        let mut delta = Delta::new();
        for op in ops {
            delta.push(op);
        }
        delta
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn insert(self, text: impl Into<String>) -> Self {
        self.insert_with(text, None)
    }

    pub fn insert_with(mut self, text: impl Into<String>, attributes: Option<Attributes>) -> Self {
        self.push(Op::Insert {
            insert: Content::Text(text.into()),
            attributes,
        });
        self
    }

    pub fn insert_embed(self, kind: impl Into<String>, value: Value) -> Self {
        self.insert_embed_with(kind, value, None)
    }

    pub fn insert_embed_with(
        mut self,
        kind: impl Into<String>,
        value: Value,
        attributes: Option<Attributes>,
    ) -> Self {
        self.push(Op::Insert {
            insert: Content::embed(kind, value),
            attributes,
        });
        self
    }

    pub fn retain(self, n: usize) -> Self {
        self.retain_with(n, None)
    }

    pub fn retain_with(mut self, n: usize, attributes: Option<Attributes>) -> Self {
        self.push(Op::Retain {
            retain: n,
            attributes,
        });
        self
    }

    pub fn delete(mut self, n: usize) -> Self {
        self.push(Op::Delete(n));
        self
    }

    /// Append an operation, merging it into the last one where possible.
    ///
    /// Zero-length operations are dropped. An insert that follows a delete is
    /// placed in front of it so equal edits have one canonical form.
    pub fn push(&mut self, op: Op) -> &mut Self {
        if op.is_empty() {
            return self;
        }
        let op = match op {
            Op::Insert { insert, attributes } => Op::Insert {
                insert,
                attributes: non_empty(attributes),
            },
            Op::Retain { retain, attributes } => Op::Retain {
                retain,
                attributes: non_empty(attributes),
            },
            del => del,
        };

        let mut index = self.ops.len();
        if let Some(Op::Delete(n)) = self.ops.last_mut() {
            if let Op::Delete(m) = op {
                *n += m;
                return self;
            }
            if op.is_insert() {
                index -= 1;
                if index == 0 {
                    self.ops.insert(0, op);
                    return self;
                }
            }
        }
        if index > 0 {
            if let Some(merged) = merge(&self.ops[index - 1], &op) {
                self.ops[index - 1] = merged;
                return self;
            }
        }
        if index == self.ops.len() {
            self.ops.push(op);
        } else {
            self.ops.insert(index, op);
        }
        self
    }

    /// Total length of all operations (inserts + retains + deletes).
    pub fn length(&self) -> usize {
        self.ops.iter().map(Op::len).sum()
    }

    /// Net change in document length when this delta is applied.
    pub fn change_length(&self) -> isize {
        self.ops.iter().fold(0isize, |acc, op| match op {
            Op::Insert { insert, .. } => acc + insert.len() as isize,
            Op::Delete(n) => acc - *n as isize,
            Op::Retain { .. } => acc,
        })
    }

    /// Drop a trailing attribute-less retain; it is implicit.
    pub fn chop(mut self) -> Self {
        if let Some(Op::Retain {
            attributes: None, ..
        }) = self.ops.last()
        {
            self.ops.pop();
        }
        self
    }

    /// Append `other`, merging the operations at the seam.
    pub fn concat(mut self, other: Delta) -> Self {
        let mut rest = other.ops.into_iter();
        if let Some(first) = rest.next() {
            self.push(first);
            self.ops.extend(rest);
        }
        self
    }

    /// Keep only the operations for which `keep` returns true.
    pub fn filter<F>(&self, mut keep: F) -> Delta
    where
        F: FnMut(&Op) -> bool,
    {
        Delta::from_ops(self.ops.iter().filter(|op| keep(op)).cloned())
    }

    /// Map every operation, re-coalescing the result.
    pub fn map<F>(&self, f: F) -> Delta
    where
        F: FnMut(&Op) -> Option<Op>,
    {
        Delta::from_ops(self.ops.iter().filter_map(f))
    }

    /// Compose `other` after `self`.
    ///
    /// When `self` is a document (inserts only) the result is the new document.
    pub fn compose(&self, other: &Delta) -> Delta {
        let mut this_iter = OpIter::new(&self.ops);
        let mut other_iter = OpIter::new(&other.ops);
        let mut delta = Delta::new();

        while this_iter.has_next() || other_iter.has_next() {
            if other_iter.peek_kind() == OpKind::Insert {
                delta.push(other_iter.next(usize::MAX));
            } else if this_iter.peek_kind() == OpKind::Delete {
                delta.push(this_iter.next(usize::MAX));
            } else {
                let len = this_iter.peek_len().min(other_iter.peek_len());
                let this_op = this_iter.next(len);
                let other_op = other_iter.next(len);
                match other_op {
                    Op::Retain { attributes, .. } => {
                        let attributes = compose_attributes(
                            this_op.attributes(),
                            attributes.as_ref(),
                            this_op.is_retain(),
                        );
                        match this_op {
                            Op::Insert { insert, .. } => {
                                delta.push(Op::Insert { insert, attributes })
                            }
                            _ => delta.push(Op::Retain {
                                retain: len,
                                attributes,
                            }),
                        };
                    }
                    // Deleting something inserted by `self` cancels both.
                    Op::Delete(n) if this_op.is_retain() => {
                        delta.push(Op::Delete(n));
                    }
                    _ => {}
                }
            }
        }
        delta.chop()
    }

    /// Where a cursor at `index` ends up after this change is applied.
    ///
    /// An insert exactly at the cursor pushes it forward.
    pub fn transform_position(&self, index: usize) -> usize {
        let mut index = index;
        let mut offset = 0usize;
        for op in &self.ops {
            if offset > index {
                break;
            }
            let len = op.len();
            match op {
                Op::Delete(_) => {
                    index -= len.min(index - offset);
                    continue;
                }
                Op::Insert { .. } => index += len,
                Op::Retain { .. } => {}
            }
            offset += len;
        }
        index
    }

    /// Plain text of all text inserts; embeds are skipped.
    pub fn text(&self) -> String {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Insert {
                    insert: Content::Text(s),
                    ..
                } => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of inserted embeds of the given kind.
    pub fn count_embeds(&self, kind: &str) -> usize {
        self.ops
            .iter()
            .filter(|op| match op {
                Op::Insert { insert, .. } => insert.embed_kind() == Some(kind),
                _ => false,
            })
            .count()
    }
}

fn merge(last: &Op, op: &Op) -> Option<Op> {
    if last.attributes() != op.attributes() {
        return None;
    }
    match (last, op) {
        (
            Op::Insert {
                insert: Content::Text(a),
                attributes,
            },
            Op::Insert {
                insert: Content::Text(b),
                ..
            },
        ) => Some(Op::Insert {
            insert: Content::Text(format!("{a}{b}")),
            attributes: attributes.clone(),
        }),
        (
            Op::Retain {
                retain: a,
                attributes,
            },
            Op::Retain { retain: b, .. },
        ) => Some(Op::Retain {
            retain: a + b,
            attributes: attributes.clone(),
        }),
        _ => None,
    }
}

impl From<Vec<Op>> for Delta {
    fn from(ops: Vec<Op>) -> Self {
        Delta::from_ops(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Option<Attributes> {
        value.as_object().cloned()
    }

    #[test]
    fn push_merges_adjacent_text_with_same_attributes() {
        let delta = Delta::new()
            .insert_with("a", attrs(json!({"bold": true})))
            .insert_with("b", attrs(json!({"bold": true})))
            .insert("c");
        assert_eq!(delta.ops().len(), 2);
        assert_eq!(delta.text(), "abc");
    }

    #[test]
    fn push_does_not_merge_embeds() {
        let delta = Delta::new()
            .insert_embed("break", json!(true))
            .insert_embed("break", json!(true));
        assert_eq!(delta.ops().len(), 2);
        assert_eq!(delta.length(), 2);
    }

    #[test]
    fn push_drops_zero_length() {
        let delta = Delta::new().retain(0).insert("").delete(0);
        assert!(delta.is_empty());
    }

    #[test]
    fn insert_after_delete_moves_in_front() {
        let delta = Delta::new().retain(2).delete(3).insert("x");
        assert_eq!(
            delta.ops(),
            &[Op::retain(2), Op::insert("x"), Op::Delete(3)]
        );
    }

    #[test]
    fn insert_after_leading_delete_goes_first() {
        let delta = Delta::new().delete(1).insert("x");
        assert_eq!(delta.ops(), &[Op::insert("x"), Op::Delete(1)]);
    }

    #[test]
    fn empty_attributes_normalize_to_none() {
        let delta = Delta::new().insert_with("a", Some(Attributes::new()));
        assert_eq!(delta.ops(), &[Op::insert("a")]);
    }

    #[test]
    fn length_counts_chars_and_embeds() {
        let delta = Delta::new()
            .retain(3)
            .insert("日本")
            .insert_embed("image", json!("a.png"))
            .delete(2);
        assert_eq!(delta.length(), 3 + 2 + 1 + 2);
        assert_eq!(delta.change_length(), 1);
    }

    #[test]
    fn concat_merges_seam() {
        let a = Delta::new().retain(4);
        let b = Delta::new().retain(2).insert("x");
        let c = a.concat(b);
        assert_eq!(c.ops(), &[Op::retain(6), Op::insert("x")]);
    }

    #[test]
    fn concat_with_empty_is_identity() {
        let a = Delta::new().insert("abc");
        assert_eq!(a.clone().concat(Delta::new()), a);
    }

    #[test]
    fn compose_insert_into_document() {
        let doc = Delta::new().insert("Hello\n");
        let change = Delta::new().retain(5).insert(" world");
        assert_eq!(doc.compose(&change).text(), "Hello world\n");
    }

    #[test]
    fn compose_delete_from_document() {
        let doc = Delta::new().insert("Hello world\n");
        let change = Delta::new().retain(5).delete(6);
        assert_eq!(doc.compose(&change).text(), "Hello\n");
    }

    #[test]
    fn compose_splits_text_for_embed() {
        let doc = Delta::new().insert("Hello\n");
        let change = Delta::new().retain(2).insert_embed("break", json!(true));
        let out = doc.compose(&change);
        assert_eq!(out.ops().len(), 3);
        assert_eq!(out.length(), 7);
        assert_eq!(out.count_embeds("break"), 1);
    }

    #[test]
    fn compose_retain_formats_document() {
        let doc = Delta::new().insert("Hello\n");
        let change = Delta::new().retain_with(5, attrs(json!({"bold": true})));
        let out = doc.compose(&change);
        assert_eq!(
            out.ops()[0],
            Op::Insert {
                insert: Content::Text("Hello".into()),
                attributes: attrs(json!({"bold": true})),
            }
        );
    }

    #[test]
    fn compose_null_attribute_removes_format() {
        let doc = Delta::new().insert_with("Hi", attrs(json!({"bold": true, "italic": true})));
        let change = Delta::new().retain_with(2, attrs(json!({"bold": null})));
        let out = doc.compose(&change);
        assert_eq!(out.ops()[0].attributes(), attrs(json!({"italic": true})).as_ref());
    }

    #[test]
    fn compose_insert_then_delete_cancels() {
        let a = Delta::new().insert("abc");
        let b = Delta::new().delete(3);
        assert!(a.compose(&b).is_empty());
    }

    #[test]
    fn compose_replace_selection() {
        let doc = Delta::new().insert("abcdef\n");
        let change = Delta::new().retain(1).insert("XY").delete(3);
        assert_eq!(doc.compose(&change).text(), "aXYef\n");
    }

    #[test]
    fn compose_attributes_keeps_null_for_retain() {
        let a = attrs(json!({"bold": true}));
        let b = attrs(json!({"bold": null, "italic": true}));
        let out = compose_attributes(a.as_ref(), b.as_ref(), true);
        assert_eq!(out, attrs(json!({"bold": null, "italic": true})));
        let out = compose_attributes(a.as_ref(), b.as_ref(), false);
        assert_eq!(out, attrs(json!({"italic": true})));
    }

    #[test]
    fn chop_drops_plain_trailing_retain() {
        let d = Delta::new().insert("a").retain(3).chop();
        assert_eq!(d.ops(), &[Op::insert("a")]);
        let d = Delta::new().retain_with(3, attrs(json!({"bold": true}))).chop();
        assert_eq!(d.ops().len(), 1);
    }

    #[test]
    fn transform_position_shifts_over_edits() {
        let change = Delta::new().retain(2).insert("abc").delete(1);
        assert_eq!(change.transform_position(1), 1);
        assert_eq!(change.transform_position(2), 5);
        assert_eq!(change.transform_position(4), 6);
        let delete = Delta::new().retain(1).delete(3);
        assert_eq!(delete.transform_position(2), 1);
        assert_eq!(delete.transform_position(6), 3);
    }

    #[test]
    fn text_skips_embeds() {
        let d = Delta::new()
            .insert("a")
            .insert_embed("break", json!(true))
            .insert("b");
        assert_eq!(d.text(), "ab");
    }
}
