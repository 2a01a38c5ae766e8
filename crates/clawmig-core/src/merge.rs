use serde_json::Value;

use crate::document::Document;

/// Lay a freshly converted config over whatever the target already has.
///
/// An incoming key replaces the existing value unless both sides hold an
/// object. Such objects are merged recursively: keys only the incoming side
/// defines are added, and where both sides hold a non-object leaf the
/// existing leaf is kept. An object on only one side of a key is a shape
/// mismatch and the incoming value wins. Lists are never concatenated.
pub fn merge_config(existing: Option<&Document>, incoming: Document) -> Document {
    let Some(existing) = existing else {
        return incoming;
    };

    let mut merged = existing.clone();
    for (key, value) in incoming {
        match value {
            Value::Object(overlay) => match merged.get_mut(&key) {
                Some(Value::Object(current)) => fill_missing(current, overlay),
                _ => {
                    merged.insert(key, Value::Object(overlay));
                }
            },
            value => {
                merged.insert(key, value);
            }
        }
    }
    merged
}

fn fill_missing(base: &mut Document, overlay: Document) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            None => {
                base.insert(key, value);
            }
            Some(current) => match (current, value) {
                (Value::Object(current), Value::Object(nested)) => fill_missing(current, nested),
                (current, value) if current.is_object() || value.is_object() => *current = value,
                _ => {}
            },
        }
    }
}
