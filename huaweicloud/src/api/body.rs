//! Request body shaping helpers

use serde_json::{Map, Value};

/// Drop null members recursively, along with objects and arrays left empty
/// afterwards. Array elements are kept in place unless they become empty.
pub fn remove_nil(value: Value) -> Value {
    match value {
        Value::Object(members) => {
            let cleaned: Map<String, Value> = members
                .into_iter()
                .filter_map(|(k, v)| {
                    let v = remove_nil(v);
                    (!is_vacant(&v)).then_some((k, v))
                })
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(remove_nil)
                .filter(|v| !is_vacant(v))
                .collect(),
        ),
        other => other,
    }
}

fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Null for zero values (`""`, `0`, `false`, empty collections) so that
/// `remove_nil` drops them
pub fn value_ignore_empty(value: Value) -> Value {
    let empty = match &value {
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(b) => !b,
        other => is_vacant(other),
    };
    if empty {
        Value::Null
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remove_nil_is_recursive() {
        let body = json!({
            "name": "policy",
            "description": null,
            "spec": {"period": null, "unit": null},
            "members": [{"host": "10.0.0.1", "port": null}, {"port": null}],
            "tags": []
        });

        assert_eq!(
            remove_nil(body),
            json!({"name": "policy", "members": [{"host": "10.0.0.1"}]})
        );
    }

    #[test]
    fn remove_nil_keeps_zero_values() {
        let body = json!({"weight": 0, "enabled": false, "remark": ""});
        assert_eq!(remove_nil(body.clone()), body);
    }

    #[test]
    fn value_ignore_empty_nulls_zero_values() {
        assert_eq!(value_ignore_empty(json!("")), Value::Null);
        assert_eq!(value_ignore_empty(json!(0)), Value::Null);
        assert_eq!(value_ignore_empty(json!(false)), Value::Null);
        assert_eq!(value_ignore_empty(json!({})), Value::Null);
        assert_eq!(value_ignore_empty(json!(5)), json!(5));
        assert_eq!(value_ignore_empty(json!("x")), json!("x"));
    }
}
