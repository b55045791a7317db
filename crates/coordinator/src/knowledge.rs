use serde_json::Value;

/// Merge `incoming` into `existing`: two objects merge key-wise with the
/// incoming side winning conflicts, two arrays concatenate, anything else
/// is overwritten.
pub fn merge_knowledge(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(update)) => {
            for (key, value) in update {
                current.insert(key, value);
            }
        }
        (Value::Array(current), Value::Array(update)) => current.extend(update),
        (slot, value) => *slot = value,
    }
}
