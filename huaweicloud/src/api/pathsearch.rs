//! Minimal JMESPath-style lookups over `serde_json::Value`
//!
//! Supported: `a.b`, `a[0]`, `a[-1]`, `a[*].b`, `a[]`, `a[?k=='v']`,
//! `a[?k==`1`]`, `a[?k!='v']` and pipes (`a[*].b|[0]`). Anything the
//! parser does not understand evaluates to null.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Field(String),
    Index(i64),
    Wildcard,
    Flatten,
    Filter {
        field: String,
        value: Value,
        negate: bool,
    },
}

/// Evaluate `expr` against `value`; missing paths and parse failures yield null
pub fn search(expr: &str, value: &Value) -> Value {
    let mut current = value.clone();
    for segment in split_top_level(expr, '|') {
        let Some(steps) = parse_segment(segment.trim()) else {
            tracing::debug!("unsupported path expression: {}", expr);
            return Value::Null;
        };
        current = evaluate(&steps, &current);
    }
    current
}

pub fn search_string(expr: &str, value: &Value) -> Option<String> {
    match search(expr, value) {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn search_i64(expr: &str, value: &Value) -> Option<i64> {
    match search(expr, value) {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn search_bool(expr: &str, value: &Value) -> Option<bool> {
    match search(expr, value) {
        Value::Bool(b) => Some(b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Array result, or an empty vector when the path is not an array
pub fn search_array(expr: &str, value: &Value) -> Vec<Value> {
    match search(expr, value) {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

fn evaluate(steps: &[Step], value: &Value) -> Value {
    let Some((first, rest)) = steps.split_first() else {
        return value.clone();
    };

    match first {
        Step::Field(name) => match value.get(name.as_str()) {
            Some(v) => evaluate(rest, v),
            None => Value::Null,
        },
        Step::Index(idx) => {
            let Value::Array(items) = value else {
                return Value::Null;
            };
            let len = items.len() as i64;
            let idx = if *idx < 0 { len + idx } else { *idx };
            if idx < 0 || idx >= len {
                return Value::Null;
            }
            evaluate(rest, &items[idx as usize])
        }
        Step::Wildcard => match value {
            Value::Array(items) => project(rest, items.iter()),
            Value::Object(members) => project(rest, members.values()),
            _ => Value::Null,
        },
        Step::Flatten => {
            let Value::Array(items) = value else {
                return Value::Null;
            };
            let mut flat = Vec::new();
            for item in items {
                match item {
                    Value::Array(inner) => flat.extend(inner.iter().cloned()),
                    other => flat.push(other.clone()),
                }
            }
            project(rest, flat.iter())
        }
        Step::Filter {
            field,
            value: expected,
            negate,
        } => {
            let Value::Array(items) = value else {
                return Value::Null;
            };
            let matched = items.iter().filter(|item| {
                let actual = item.get(field.as_str()).unwrap_or(&Value::Null);
                (actual == expected) != *negate
            });
            project(rest, matched)
        }
    }
}

/// A projection applies the following steps to every element until the next
/// flatten, which then operates on the projected array as a whole
fn project<'a>(rest: &[Step], items: impl Iterator<Item = &'a Value>) -> Value {
    let split = rest
        .iter()
        .position(|s| *s == Step::Flatten)
        .unwrap_or(rest.len());
    let (inner, after) = rest.split_at(split);

    let projected = Value::Array(
        items
            .map(|item| evaluate(inner, item))
            .filter(|v| !v.is_null())
            .collect(),
    );
    evaluate(after, &projected)
}

fn split_top_level(expr: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in expr.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'') | (None, '`') | (None, '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, c) if c == separator && depth == 0 => {
                parts.push(&expr[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&expr[start..]);
    parts
}

fn parse_segment(segment: &str) -> Option<Vec<Step>> {
    let mut steps = Vec::new();
    let chars: Vec<char> = segment.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => i += 1,
            '[' => {
                let close = find_closing_bracket(&chars, i)?;
                let inner: String = chars[i + 1..close].iter().collect();
                steps.push(parse_bracket(inner.trim())?);
                i = close + 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                let name = name.trim().trim_matches('"');
                if name.is_empty() {
                    return None;
                }
                steps.push(Step::Field(name.to_string()));
            }
        }
    }

    Some(steps)
}

fn find_closing_bracket(chars: &[char], open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, c) in chars[open + 1..].iter().enumerate() {
        match (quote, *c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'') | (None, '`') => quote = Some(*c),
            (None, ']') => return Some(open + 1 + offset),
            _ => {}
        }
    }
    None
}

fn parse_bracket(inner: &str) -> Option<Step> {
    match inner {
        "" => Some(Step::Flatten),
        "*" => Some(Step::Wildcard),
        _ if inner.starts_with('?') => parse_filter(&inner[1..]),
        _ => inner.parse::<i64>().ok().map(Step::Index),
    }
}

fn parse_filter(expr: &str) -> Option<Step> {
    let (field, literal, negate) = if let Some((f, l)) = expr.split_once("!=") {
        (f, l, true)
    } else {
        let (f, l) = expr.split_once("==")?;
        (f, l, false)
    };

    let literal = literal.trim();
    let value = if let Some(s) = literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
    {
        Value::String(s.to_string())
    } else if let Some(json) = literal.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        serde_json::from_str(json).ok()?
    } else {
        return None;
    };

    Some(Step::Filter {
        field: field.trim().to_string(),
        value,
        negate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "id": "abc",
            "throttle": {"period": 1, "enabled": true},
            "envs": [
                {"id": "e1", "name": "RELEASE", "tags": ["a", "b"]},
                {"id": "e2", "name": "TEST", "tags": ["c"]}
            ],
            "page_info": {"next_marker": null}
        })
    }

    #[test]
    fn nested_fields() {
        assert_eq!(search("throttle.period", &sample()), json!(1));
        assert_eq!(search("throttle.missing", &sample()), Value::Null);
        assert_eq!(search_bool("throttle.enabled", &sample()), Some(true));
        assert_eq!(search_string("page_info.next_marker", &sample()), None);
    }

    #[test]
    fn indexes_and_pipes() {
        assert_eq!(search_string("envs[0].id", &sample()), Some("e1".to_string()));
        assert_eq!(search_string("envs[-1].id", &sample()), Some("e2".to_string()));
        assert_eq!(search("envs[5]", &sample()), Value::Null);
        assert_eq!(search("envs|[0].name", &sample()), json!("RELEASE"));
    }

    #[test]
    fn projections_and_flatten() {
        assert_eq!(search("envs[*].id", &sample()), json!(["e1", "e2"]));
        assert_eq!(search("envs[*].tags[]", &sample()), json!(["a", "b", "c"]));
        assert_eq!(search("envs[*].tags|[]|[0]", &sample()), json!("a"));
        assert_eq!(search("envs[*].missing", &sample()), json!([]));
    }

    #[test]
    fn filters() {
        assert_eq!(search("envs[?name=='TEST']|[0].id", &sample()), json!("e2"));
        assert_eq!(search("envs[?name!='TEST'].id", &sample()), json!(["e1"]));

        let statuses = json!({"items": [{"code": 1, "s": "x"}, {"code": 2, "s": "y"}]});
        assert_eq!(search("items[?code==`2`].s|[0]", &statuses), json!("y"));
    }

    #[test]
    fn number_helpers_accept_strings() {
        let value = json!({"count": "12", "total": 3.0});
        assert_eq!(search_i64("count", &value), Some(12));
        assert_eq!(search_i64("total", &value), Some(3));
        assert!(search_array("count", &value).is_empty());
    }

    #[test]
    fn malformed_expression_is_null() {
        assert_eq!(search("envs[abc]", &sample()), Value::Null);
        assert_eq!(search("envs[0", &sample()), Value::Null);
    }
}
