//! Cursor over a delta's operations that can hand out partial operations.

use super::{Content, Op};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpKind {
    Insert,
    Retain,
    Delete,
}

pub(crate) struct OpIter<'a> {
    ops: &'a [Op],
    index: usize,
    /// Items of `ops[index]` already consumed.
    offset: usize,
}

impl<'a> OpIter<'a> {
    pub(crate) fn new(ops: &'a [Op]) -> Self {
        Self {
            ops,
            index: 0,
            offset: 0,
        }
    }

    pub(crate) fn has_next(&self) -> bool {
        self.index < self.ops.len()
    }

    /// Remaining length of the current op; unbounded once exhausted.
    pub(crate) fn peek_len(&self) -> usize {
        match self.ops.get(self.index) {
            Some(op) => op.len() - self.offset,
            None => usize::MAX,
        }
    }

    /// Kind of the current op. An exhausted iterator behaves as an endless retain.
    pub(crate) fn peek_kind(&self) -> OpKind {
        self.ops
            .get(self.index)
            .map(Op::kind)
            .unwrap_or(OpKind::Retain)
    }

    /// Take up to `len` items from the current op.
    pub(crate) fn next(&mut self, len: usize) -> Op {
        let Some(op) = self.ops.get(self.index) else {
            return Op::retain(len);
        };
        let offset = self.offset;
        let remaining = op.len() - offset;
        let take = len.min(remaining);
        if take == remaining {
            self.index += 1;
            self.offset = 0;
        } else {
            self.offset += take;
        }
        match op {
            Op::Delete(_) => Op::Delete(take),
            Op::Retain { attributes, .. } => Op::Retain {
                retain: take,
                attributes: attributes.clone(),
            },
            Op::Insert {
                insert: Content::Text(s),
                attributes,
            } => Op::Insert {
                insert: Content::Text(s.chars().skip(offset).take(take).collect()),
                attributes: attributes.clone(),
            },
            Op::Insert {
                insert: embed @ Content::Embed { .. },
                attributes,
            } => Op::Insert {
                insert: embed.clone(),
                attributes: attributes.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_text_inserts() {
        let ops = vec![Op::insert("hello")];
        let mut it = OpIter::new(&ops);
        assert_eq!(it.next(2), Op::insert("he"));
        assert_eq!(it.peek_len(), 3);
        assert_eq!(it.next(10), Op::insert("llo"));
        assert!(!it.has_next());
    }

    #[test]
    fn embed_is_atomic() {
        let ops = vec![Op::insert(Content::embed("break", json!(true)))];
        let mut it = OpIter::new(&ops);
        assert_eq!(it.peek_len(), 1);
        assert!(it.next(1).is_insert());
        assert!(!it.has_next());
    }

    #[test]
    fn exhausted_iterator_yields_retain() {
        let ops: Vec<Op> = vec![];
        let mut it = OpIter::new(&ops);
        assert_eq!(it.peek_kind(), OpKind::Retain);
        assert_eq!(it.peek_len(), usize::MAX);
        assert_eq!(it.next(4), Op::retain(4));
    }
}
