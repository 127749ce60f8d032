//! JSON-pointer addressed reads and writes into a context's field map.
//!
//! Every path here is an RFC 6901 pointer relative to the field map; `""` is
//! the field map itself and `"/items/0"` the first element of `items`.

use std::borrow::Cow;

use serde_json::{Map, Value};
use thiserror::Error;

/// Structural problems met while writing into the field map.
///
/// These are never raised to callers; the engine records them in the
/// context's error list like any other operation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("field `{field}` is not a sequence")]
    NotASequence { field: String },
    #[error("nothing at `{pointer}` to write into")]
    MissingTarget { pointer: String },
    #[error("value at `{pointer}` is neither an object nor an array")]
    NotAContainer { pointer: String },
    #[error("value at `{pointer}` is not an array")]
    NotAnArray { pointer: String },
    #[error("`{name}` is not a valid index into the array at `{pointer}`")]
    InvalidIndex { pointer: String, name: String },
}

impl ContextError {
    /// The value recorded in a context's error list.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

/// Which end of an array an insert goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Front,
    Back,
}

#[must_use]
pub fn escape_token(token: &str) -> Cow<'_, str> {
    if token.contains(['~', '/']) {
        Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(token)
    }
}

fn unescape_token(token: &str) -> Cow<'_, str> {
    if token.contains('~') {
        Cow::Owned(token.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(token)
    }
}

#[must_use]
pub fn child_pointer(parent: &str, token: &str) -> String {
    format!("{parent}/{}", escape_token(token))
}

/// Pointer to a top-level field.
#[must_use]
pub fn field_pointer(name: &str) -> String {
    child_pointer("", name)
}

enum Slot<'a> {
    Root(&'a mut Map<String, Value>),
    Value(&'a mut Value),
}

/// Split `"/head/tail..."` into the unescaped head token and the remaining pointer.
fn split_head(pointer: &str) -> Option<(Cow<'_, str>, &str)> {
    let rest = pointer.strip_prefix('/')?;
    let (head, tail) = rest.find('/').map_or((rest, ""), |i| rest.split_at(i));
    Some((unescape_token(head), tail))
}

fn slot_mut<'a>(fields: &'a mut Map<String, Value>, pointer: &str) -> Option<Slot<'a>> {
    if pointer.is_empty() {
        return Some(Slot::Root(fields));
    }
    let (head, tail) = split_head(pointer)?;
    fields
        .get_mut(head.as_ref())?
        .pointer_mut(tail)
        .map(Slot::Value)
}

/// Clone the value at `pointer`; `""` yields the whole field map.
#[must_use]
pub fn lookup(fields: &Map<String, Value>, pointer: &str) -> Option<Value> {
    if pointer.is_empty() {
        return Some(Value::Object(fields.clone()));
    }
    let (head, tail) = split_head(pointer)?;
    fields.get(head.as_ref())?.pointer(tail).cloned()
}

/// Most `null`s a single array assignment may pad with.
pub const MAX_ARRAY_PADDING: usize = 1024;

/// Assign `target[name] = value`.
///
/// Object targets insert or overwrite the key. Array targets treat `name` as
/// an index: past-the-end indices grow the array, padding with `null`, up to
/// [`MAX_ARRAY_PADDING`] slots past the end.
pub fn assign(
    fields: &mut Map<String, Value>,
    target: &str,
    name: &str,
    value: Value,
) -> Result<(), ContextError> {
    store(slot_mut(fields, target), target, name, value)
}

/// [`assign`] into an arbitrary document rather than a field map.
pub fn assign_in(root: &mut Value, target: &str, name: &str, value: Value) -> Result<(), ContextError> {
    store(root.pointer_mut(target).map(Slot::Value), target, name, value)
}

fn store(slot: Option<Slot<'_>>, target: &str, name: &str, value: Value) -> Result<(), ContextError> {
    match slot {
        Some(Slot::Root(map) | Slot::Value(Value::Object(map))) => {
            map.insert(name.to_string(), value);
            Ok(())
        }
        Some(Slot::Value(Value::Array(items))) => {
            let invalid = || ContextError::InvalidIndex {
                pointer: target.to_string(),
                name: name.to_string(),
            };
            let index: usize = name.parse().map_err(|_| invalid())?;
            if index < items.len() {
                items[index] = value;
                return Ok(());
            }
            let len = index
                .checked_add(1)
                .filter(|len| len - items.len() <= MAX_ARRAY_PADDING + 1)
                .ok_or_else(invalid)?;
            items.resize(len - 1, Value::Null);
            items.push(value);
            Ok(())
        }
        Some(Slot::Value(_)) => Err(ContextError::NotAContainer {
            pointer: target.to_string(),
        }),
        None => Err(ContextError::MissingTarget {
            pointer: target.to_string(),
        }),
    }
}

/// Push or unshift `value` into the array at `target`.
pub fn insert(
    fields: &mut Map<String, Value>,
    target: &str,
    end: End,
    value: Value,
) -> Result<(), ContextError> {
    match slot_mut(fields, target) {
        Some(Slot::Value(Value::Array(items))) => {
            match end {
                End::Front => items.insert(0, value),
                End::Back => items.push(value),
            }
            Ok(())
        }
        Some(_) => Err(ContextError::NotAnArray {
            pointer: target.to_string(),
        }),
        None => Err(ContextError::MissingTarget {
            pointer: target.to_string(),
        }),
    }
}

/// Snapshot the elements of the sequence field `field`.
pub fn sequence(fields: &Map<String, Value>, field: &str) -> Result<Vec<Value>, ContextError> {
    match fields.get(field) {
        Some(Value::Array(items)) => Ok(items.clone()),
        _ => Err(ContextError::NotASequence {
            field: field.to_string(),
        }),
    }
}
