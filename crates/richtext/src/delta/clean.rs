//! Filtering passes run over converted clipboard content before it is merged.

use serde_json::Value;

use super::{Attributes, Content, Delta, Op};
use crate::formats::{AllowList, BREAK};

/// True for the `{break: ""}` placeholder that conversion leaves behind.
///
/// Only an embed whose single key is `break` with an empty-string value
/// qualifies; a real break (`{break: true}`) does not.
pub fn is_placeholder_break(op: &Op) -> bool {
    match op {
        Op::Insert {
            insert: Content::Embed { kind, value },
            ..
        } => kind == BREAK && value.as_str() == Some(""),
        _ => false,
    }
}

/// Remove every placeholder break insert. Idempotent; order preserving.
pub fn strip_placeholder_breaks(delta: &Delta) -> Delta {
    let stripped = delta.filter(|op| !is_placeholder_break(op));
    if stripped.ops().len() != delta.ops().len() {
        tracing::trace!(
            removed = delta.ops().len() - stripped.ops().len(),
            "stripped placeholder breaks"
        );
    }
    stripped
}

fn allowed_attributes(attributes: Option<&Attributes>, allow: &AllowList) -> Option<Attributes> {
    attributes.map(|a| {
        a.iter()
            .filter(|(name, _)| {
                let keep = allow.contains(name);
                if !keep {
                    tracing::trace!(format = %name, "dropped disallowed format");
                }
                keep
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    })
}

/// Drop attributes and embeds the allow list does not permit.
///
/// Text content always survives; only its formatting is narrowed.
pub fn retain_formats(delta: &Delta, allow: &AllowList) -> Delta {
    delta.map(|op| match op {
        Op::Insert {
            insert: Content::Embed { kind, .. },
            ..
        } if !allow.contains(kind) => {
            tracing::trace!(embed = %kind, "dropped disallowed embed");
            None
        }
        Op::Insert { insert, attributes } => Some(Op::Insert {
            insert: insert.clone(),
            attributes: allowed_attributes(attributes.as_ref(), allow),
        }),
        Op::Retain { retain, attributes } => Some(Op::Retain {
            retain: *retain,
            attributes: allowed_attributes(attributes.as_ref(), allow),
        }),
        Op::Delete(n) => Some(Op::Delete(*n)),
    })
}

/// Placeholder break insert as produced by the `<br>` clipboard matcher.
pub fn placeholder_break() -> Op {
    Op::insert(Content::embed(BREAK, Value::String(String::new())))
}
