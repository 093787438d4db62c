//! Helpers shared by resources and data sources: provider data access,
//! state accessors, read-side not-found handling, timeouts and time formats.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::wait::WaitError;
use crate::api::ApiError;
use crate::HuaweiCloudProviderData;

/// Downcast the provider data handed to `configure`
pub fn provider_data_from(
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<HuaweiCloudProviderData> {
    match provider_data {
        Some(data) => match data.downcast_ref::<HuaweiCloudProviderData>() {
            Some(provider_data) => Some(provider_data.clone()),
            None => {
                diagnostics.push(Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract HuaweiCloudProviderData from provider data",
                ));
                None
            }
        },
        None => {
            diagnostics.push(Diagnostic::error(
                "No provider data",
                "No provider data was provided to the resource",
            ));
            None
        }
    }
}

pub fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

pub fn api_error(summary: impl Into<String>, e: impl std::fmt::Display) -> Diagnostic {
    Diagnostic::error(summary, format!("API error: {}", e))
}

/// Decide what a failed read means. A 404 means the object was deleted out
/// of band: log it and return `None` so the resource leaves state.
pub fn check_deleted(e: &ApiError, what: &str, id: &str) -> Option<Diagnostic> {
    if e.is_not_found() {
        tracing::warn!("{} ({}) is gone, removing it from state", what, id);
        None
    } else {
        Some(api_error(format!("Failed to read {}", what), e))
    }
}

/// Map a failed wait to a diagnostic
pub fn wait_error(what: &str, e: WaitError) -> Diagnostic {
    Diagnostic::error(format!("Error waiting for {}", what), e.to_string())
}

// state accessors; unset, unknown and mistyped values read as empty

pub fn get_str(value: &DynamicValue, name: &str) -> String {
    attr_str(&value.value, name)
}

pub fn get_i64(value: &DynamicValue, name: &str) -> i64 {
    attr_i64(&value.value, name)
}

pub fn get_list(value: &DynamicValue, name: &str) -> Vec<Dynamic> {
    attr_list(&value.value, name)
}

pub fn attr_str(value: &Dynamic, name: &str) -> String {
    value.attr(name).as_str().unwrap_or_default().to_string()
}

pub fn attr_i64(value: &Dynamic, name: &str) -> i64 {
    value.attr(name).as_i64().unwrap_or_default()
}

pub fn attr_bool(value: &Dynamic, name: &str) -> bool {
    value.attr(name).as_bool().unwrap_or_default()
}

pub fn attr_list(value: &Dynamic, name: &str) -> Vec<Dynamic> {
    value.attr(name).as_list().cloned().unwrap_or_default()
}

/// First element of a block limited to one item, null when absent
pub fn attr_single(value: &Dynamic, name: &str) -> Dynamic {
    attr_list(value, name).into_iter().next().unwrap_or(Dynamic::Null)
}

/// Configured value as JSON, with null for unset members
pub fn attr_json(value: &Dynamic, name: &str) -> Value {
    value.attr(name).to_json()
}

/// Build an object value from `(name, value)` pairs
pub fn object<'a>(fields: impl IntoIterator<Item = (&'a str, Dynamic)>) -> Dynamic {
    Dynamic::Map(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

/// Write an optional string; an empty API value leaves an unset attribute
/// unset so it does not show up as a diff
pub fn set_opt_str(state: &mut DynamicValue, name: &str, value: &str) {
    let path = AttributePath::new(name);
    if value.is_empty() && state.get(&path).is_null() {
        return;
    }
    let _ = state.set_string(&path, value.to_string());
}

/// `set_opt_str` for integers, where zero means unset
pub fn set_opt_i64(state: &mut DynamicValue, name: &str, value: i64) {
    let path = AttributePath::new(name);
    if value == 0 && state.get(&path).is_null() {
        return;
    }
    let _ = state.set(&path, value);
}

/// `set_opt_str` for lists and sets of blocks
pub fn set_opt_list(state: &mut DynamicValue, name: &str, items: Vec<Dynamic>) {
    let path = AttributePath::new(name);
    if items.is_empty() && state.get(&path).is_null() {
        return;
    }
    let _ = state.set_list(&path, items);
}

/// True when the attribute differs between two states
pub fn has_change(old: &DynamicValue, new: &DynamicValue, name: &str) -> bool {
    let path = AttributePath::new(name);
    old.get(&path) != new.get(&path)
}

/// True when any of the attributes differ
pub fn has_changes(old: &DynamicValue, new: &DynamicValue, names: &[&str]) -> bool {
    names.iter().any(|name| has_change(old, new, name))
}

/// Parse a string holding JSON; anything that is not valid JSON is kept as
/// a plain string value
pub fn parse_json_string(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Encode a JSON value back into the string form users write in config
pub fn to_json_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn timestamp_to_rfc3339(secs: i64) -> String {
    match Utc.timestamp_opt(secs, 0).single() {
        Some(t) => rfc3339(t),
        None => String::new(),
    }
}

/// Millisecond epoch timestamps as used by AOM
pub fn millis_to_rfc3339(millis: i64) -> String {
    if millis <= 0 {
        return String::new();
    }
    timestamp_to_rfc3339(millis / 1000)
}

/// Normalise an API time string to RFC3339 UTC; unparseable input is
/// returned unchanged and empty input stays empty
pub fn format_rfc3339(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return rfc3339(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, format) {
            return rfc3339(Utc.from_utc_datetime(&t));
        }
    }
    raw.to_string()
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn region_attribute() -> tfplug::schema::Attribute {
    AttributeBuilder::new("region", AttributeType::String)
        .description("The region in which to create the resource; defaults to the provider region")
        .optional()
        .computed()
        .force_new()
        .build()
}

pub fn id_attribute() -> tfplug::schema::Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description("The resource ID")
        .computed()
        .build()
}

/// `timeouts { create = "5m" ... }` block for the listed operations
pub fn timeouts_block(operations: &[&str]) -> NestedBlock {
    operations
        .iter()
        .fold(
            NestedBlockBuilder::new("timeouts")
                .description("Operation timeouts such as \"30s\", \"5m\" or \"1h\"")
                .max_items(1),
            |block, op| {
                block.attribute(
                    AttributeBuilder::new(op, AttributeType::String)
                        .optional()
                        .build(),
                )
            },
        )
        .build()
}

/// Flag timeouts that cannot be read as a duration. Unset and unknown
/// values are skipped.
pub fn validate_timeouts(config: &DynamicValue, diagnostics: &mut Vec<Diagnostic>) {
    let Dynamic::Map(configured) = attr_single(&config.value, "timeouts") else {
        return;
    };
    let mut operations: Vec<_> = configured.iter().collect();
    operations.sort_by(|a, b| a.0.cmp(b.0));
    for (operation, value) in operations {
        let Some(raw) = value.as_str() else {
            continue;
        };
        if parse_duration(raw).is_none() {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid timeout",
                    format!(
                        "{} timeout {:?} is not a duration such as \"30s\", \"5m\" or \"1h\"",
                        operation, raw
                    ),
                )
                .with_attribute(AttributePath::new("timeouts").index(0).attribute(operation)),
            );
        }
    }
}

/// Timeout configured for `operation`, or `default`. Values rejected by
/// `validate_timeouts` never reach here.
pub fn timeout(state: &DynamicValue, operation: &str, default: Duration) -> Duration {
    let configured = attr_single(&state.value, "timeouts");
    configured
        .attr(operation)
        .as_str()
        .and_then(parse_duration)
        .unwrap_or(default)
}

/// Go-style durations: a sequence of `<number><unit>` with units h, m and s
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut total = 0f64;
    let mut number = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let value: f64 = number.parse().ok()?;
        number.clear();
        let unit_secs = match c {
            'h' => 3600.0,
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                0.001
            }
            'm' => 60.0,
            's' => 1.0,
            _ => return None,
        };
        total += value * unit_secs;
    }
    if !number.is_empty() {
        return None;
    }
    Duration::try_from_secs_f64(total).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn durations_parse_like_terraform_timeouts() {
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("3d"), None);
        assert_eq!(parse_duration("5x"), None);
        assert_eq!(parse_duration("99999999999999999999h"), None);
    }

    #[test]
    fn unreadable_timeouts_are_reported_per_operation() {
        let mut config = DynamicValue::object();
        let timeouts = HashMap::from([
            ("create".to_string(), Dynamic::from("5x")),
            ("update".to_string(), Dynamic::from("10m")),
            ("delete".to_string(), Dynamic::from("99999999999999999999h")),
        ]);
        config
            .set_list(&AttributePath::new("timeouts"), vec![Dynamic::Map(timeouts)])
            .unwrap();

        let mut diagnostics = vec![];
        validate_timeouts(&config, &mut diagnostics);

        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.summary == "Invalid timeout"));
        assert!(diagnostics[0].detail.starts_with("create timeout"));
        assert_eq!(
            diagnostics[0].attribute,
            Some(AttributePath::new("timeouts").index(0).attribute("create"))
        );
        assert!(diagnostics[1].detail.starts_with("delete timeout"));
        assert_eq!(
            timeout(&config, "delete", Duration::from_secs(60)),
            Duration::from_secs(60)
        );

        let mut diagnostics = vec![];
        validate_timeouts(&DynamicValue::object(), &mut diagnostics);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn timeouts_fall_back_to_defaults() {
        let mut state = DynamicValue::object();
        let mut timeouts = HashMap::new();
        timeouts.insert("create".to_string(), Dynamic::from("2m"));
        state
            .set_list(&AttributePath::new("timeouts"), vec![Dynamic::Map(timeouts)])
            .unwrap();

        assert_eq!(
            timeout(&state, "create", Duration::from_secs(300)),
            Duration::from_secs(120)
        );
        assert_eq!(
            timeout(&state, "delete", Duration::from_secs(300)),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn api_times_normalise_to_utc() {
        assert_eq!(
            format_rfc3339("2024-03-01T08:00:00+08:00"),
            "2024-03-01T00:00:00Z"
        );
        assert_eq!(
            format_rfc3339("2024-03-01T00:00:00.123Z"),
            "2024-03-01T00:00:00Z"
        );
        assert_eq!(format_rfc3339(""), "");
        assert_eq!(millis_to_rfc3339(1_700_000_000_000), "2023-11-14T22:13:20Z");
        assert_eq!(millis_to_rfc3339(0), "");
    }

    #[test]
    fn json_strings_round_trip_loosely() {
        assert_eq!(parse_json_string(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(parse_json_string("plain"), json!("plain"));
        assert_eq!(to_json_string(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(to_json_string(&json!("plain")), "plain");
    }

    #[test]
    fn not_found_reads_drop_state() {
        assert!(check_deleted(&ApiError::not_found("gone"), "channel", "c1").is_none());
        let diag = check_deleted(&ApiError::RateLimited, "channel", "c1").unwrap();
        assert_eq!(diag.summary, "Failed to read channel");
    }
}
