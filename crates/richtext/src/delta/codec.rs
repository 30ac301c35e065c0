//! JSON codec for deltas.
//!
//! Wire shape: `{"ops": [{"insert": "text", "attributes": {...}}, {"retain": 3}, {"delete": 1}]}`.
//! Embeds are single-key objects: `{"insert": {"break": true}}`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::{Attributes, Content, Delta, Op};

#[derive(Debug, Error, PartialEq)]
pub enum DeltaError {
    #[error("delta must be an object with an \"ops\" array")]
    MissingOps,
    #[error("invalid op at {index}: {reason}")]
    InvalidOp { index: usize, reason: String },
    #[error("embed must have exactly one key, found {0}")]
    InvalidEmbed(usize),
}

// ── Encoding ──────────────────────────────────────────────────────────────

fn encode_content(content: &Content) -> Value {
    match content {
        Content::Text(s) => Value::String(s.clone()),
        Content::Embed { kind, value } => {
            let mut m = Map::new();
            m.insert(kind.clone(), value.clone());
            Value::Object(m)
        }
    }
}

/// Serialize one operation.
fn op_to_json(op: &Op) -> Value {
    let (mut m, attributes) = match op {
        Op::Insert { insert, attributes } => {
            let mut m = Map::new();
            m.insert("insert".into(), encode_content(insert));
            (m, attributes)
        }
        Op::Retain { retain, attributes } => {
            let mut m = Map::new();
            m.insert("retain".into(), json!(retain));
            (m, attributes)
        }
        Op::Delete(n) => return json!({ "delete": n }),
    };
    if let Some(attributes) = attributes {
        m.insert("attributes".into(), Value::Object(attributes.clone()));
    }
    Value::Object(m)
}

impl Delta {
    pub fn to_json(&self) -> Value {
        json!({ "ops": self.ops.iter().map(op_to_json).collect::<Vec<_>>() })
    }

    /// Decode a delta. Accepts either `{"ops": [...]}` or a bare op array.
    pub fn from_json(value: &Value) -> Result<Delta, DeltaError> {
        let ops = match value {
            Value::Array(ops) => ops,
            Value::Object(m) => m
                .get("ops")
                .and_then(Value::as_array)
                .ok_or(DeltaError::MissingOps)?,
            _ => return Err(DeltaError::MissingOps),
        };
        let mut delta = Delta::new();
        for (index, op) in ops.iter().enumerate() {
            delta.push(op_from_json(index, op)?);
        }
        Ok(delta)
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────

fn invalid(index: usize, reason: &str) -> DeltaError {
    DeltaError::InvalidOp {
        index,
        reason: reason.to_string(),
    }
}

fn decode_len(index: usize, v: &Value) -> Result<usize, DeltaError> {
    v.as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid(index, "length must be a non-negative integer"))
}

fn decode_attributes(index: usize, m: &Map<String, Value>) -> Result<Option<Attributes>, DeltaError> {
    match m.get("attributes") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(a)) => Ok(Some(a.clone())),
        Some(_) => Err(invalid(index, "attributes must be an object")),
    }
}

fn op_from_json(index: usize, v: &Value) -> Result<Op, DeltaError> {
    let m = v
        .as_object()
        .ok_or_else(|| invalid(index, "op must be an object"))?;
    if let Some(insert) = m.get("insert") {
        let insert = match insert {
            Value::String(s) => Content::Text(s.clone()),
            Value::Object(e) => {
                if e.len() != 1 {
                    return Err(DeltaError::InvalidEmbed(e.len()));
                }
                let (kind, value) = e.iter().next().ok_or(DeltaError::InvalidEmbed(0))?;
                Content::embed(kind.clone(), value.clone())
            }
            _ => return Err(invalid(index, "insert must be a string or an object")),
        };
        return Ok(Op::Insert {
            insert,
            attributes: decode_attributes(index, m)?,
        });
    }
    if let Some(retain) = m.get("retain") {
        return Ok(Op::Retain {
            retain: decode_len(index, retain)?,
            attributes: decode_attributes(index, m)?,
        });
    }
    if let Some(delete) = m.get("delete") {
        return Ok(Op::Delete(decode_len(index, delete)?));
    }
    Err(invalid(index, "expected insert, retain or delete"))
}

impl Serialize for Delta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Delta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Delta::from_json(&value).map_err(D::Error::custom)
    }
}
