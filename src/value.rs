//! Bound values
//!
//! Everything a scope can hold is a JSON value. Modules are JSON objects
//! keyed by item name.

use once_cell::sync::Lazy;
use serde_json::json;

pub use serde_json::Value;

/// Universal "unknown type" marker returned by type-only bindings whose
/// import failed and no fallback was configured.
static UNKNOWN_TYPE: Lazy<Value> = Lazy::new(|| json!({ "$type": "unknown" }));

/// Clone of the unknown-type marker
pub fn unknown_type() -> Value {
    UNKNOWN_TYPE.clone()
}

/// Check whether a value is the unknown-type marker
pub fn is_unknown_type(value: &Value) -> bool {
    *value == *UNKNOWN_TYPE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_stable() {
        assert_eq!(unknown_type(), unknown_type());
        assert!(is_unknown_type(&unknown_type()));
    }

    #[test]
    fn ordinary_values_are_not_unknown() {
        assert!(!is_unknown_type(&json!(1)));
        assert!(!is_unknown_type(&json!({ "$type": "known" })));
        assert!(!is_unknown_type(&Value::Null));
    }
}
