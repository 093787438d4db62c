//! Schema fragments and body mapping shared by AOM alarm rules and alarm
//! rule templates

use serde_json::{json, Value};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};
use tfplug::types::Dynamic;

use crate::api::body::value_ignore_empty;
use crate::api::pathsearch;
use crate::resources::common::{attr_json, attr_single, attr_str, object, parse_json_string};

fn string(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .optional()
        .build()
}

fn string_set(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::set(AttributeType::String))
        .optional()
        .build()
}

fn number(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Number)
        .optional()
        .build()
}

fn computed_bool(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Bool)
        .optional()
        .computed()
        .build()
}

pub fn monitor_objects() -> Attribute {
    AttributeBuilder::new(
        "monitor_objects",
        AttributeType::list(AttributeType::map(AttributeType::String)),
    )
    .description("Objects the rule applies to, as label maps")
    .optional()
    .build()
}

/// `alarm_notifications` on rules, `alarm_notification` in templates
pub fn notification_block(name: &str, required: bool) -> NestedBlock {
    let block = NestedBlockBuilder::new(name)
        .description("How alarms are routed and notified")
        .max_items(1)
        .attribute(
            AttributeBuilder::new("notification_type", AttributeType::String)
                .description("direct or alarm_policy")
                .required()
                .build(),
        )
        .attribute(computed_bool("route_group_enable"))
        .attribute(string("route_group_rule"))
        .attribute(computed_bool("notification_enable"))
        .attribute(string("bind_notification_rule_id"))
        .attribute(computed_bool("notify_resolved"))
        .attribute(computed_bool("notify_triggered"))
        .attribute(
            AttributeBuilder::new("notify_frequency", AttributeType::String)
                .optional()
                .computed()
                .build(),
        );
    if required {
        block.min_items(1).build()
    } else {
        block.build()
    }
}

pub fn event_trigger_conditions_block() -> NestedBlock {
    NestedBlockBuilder::new("trigger_conditions")
        .set()
        .attribute(
            AttributeBuilder::new("trigger_type", AttributeType::String)
                .required()
                .build(),
        )
        .attribute(string("event_name"))
        .attribute(
            AttributeBuilder::new("thresholds", AttributeType::map(AttributeType::Number))
                .optional()
                .build(),
        )
        .attribute(number("aggregation_window"))
        .attribute(string("operator"))
        .attribute(
            AttributeBuilder::new("frequency", AttributeType::String)
                .optional()
                .computed()
                .build(),
        )
        .build()
}

/// Rules require the metric name and PromQL and accept `query_param`;
/// templates leave both open
pub fn metric_trigger_conditions_block(rule: bool) -> NestedBlock {
    let required_on_rule = |name: &str| {
        let attribute = AttributeBuilder::new(name, AttributeType::String);
        if rule {
            attribute.required().build()
        } else {
            attribute.optional().build()
        }
    };

    let mut block = NestedBlockBuilder::new("trigger_conditions")
        .set()
        .attribute(
            AttributeBuilder::new("metric_query_mode", AttributeType::String)
                .required()
                .build(),
        )
        .attribute(required_on_rule("metric_name"))
        .attribute(required_on_rule("promql"))
        .attribute(string("aggregation_window"))
        .attribute(string("query_match"))
        .attribute(string("aggregate_type"))
        .attribute(string_set("metric_labels"))
        .attribute(string("aggregation_type"))
        .attribute(string("operator"))
        .attribute(
            AttributeBuilder::new("thresholds", AttributeType::map(AttributeType::String))
                .optional()
                .build(),
        );
    for name in [
        "trigger_times",
        "trigger_type",
        "trigger_interval",
        "expression",
        "mix_promql",
        "metric_statistic_method",
        "metric_namespace",
        "metric_unit",
        "promql_expr",
        "aom_monitor_level",
    ] {
        block = block.attribute(string(name));
    }
    if rule {
        block = block.attribute(string("query_param")).attribute(
            AttributeBuilder::new("promql_for", AttributeType::String)
                .optional()
                .computed()
                .build(),
        );
    } else {
        block = block.attribute(string("promql_for"));
    }
    block.build()
}

pub fn no_data_block() -> NestedBlock {
    NestedBlockBuilder::new("no_data_conditions")
        .max_items(1)
        .attribute(number("no_data_timeframe"))
        .attribute(string("no_data_alert_state"))
        .attribute(computed_bool("notify_no_data"))
        .build()
}

pub fn alarm_tags_block() -> NestedBlock {
    NestedBlockBuilder::new("alarm_tags")
        .max_items(1)
        .attribute(string_set("auto_tags"))
        .attribute(string_set("custom_tags"))
        .attribute(string_set("custom_annotations"))
        .build()
}

pub fn recovery_block(required: bool) -> NestedBlock {
    let block = NestedBlockBuilder::new("recovery_conditions")
        .max_items(1)
        .attribute(number("recovery_timeframe"));
    if required {
        block.min_items(1).build()
    } else {
        block.build()
    }
}

/// Configured member as JSON, null when empty so `remove_nil` drops it
pub fn field(obj: &Dynamic, name: &str) -> Value {
    value_ignore_empty(attr_json(obj, name))
}

pub fn build_notification(notification: &Dynamic) -> Value {
    if notification.is_null() {
        return Value::Null;
    }
    json!({
        "notification_type": attr_json(notification, "notification_type"),
        "route_group_enable": field(notification, "route_group_enable"),
        "route_group_rule": field(notification, "route_group_rule"),
        "notification_enable": field(notification, "notification_enable"),
        "bind_notification_rule_id": field(notification, "bind_notification_rule_id"),
        "notify_resolved": field(notification, "notify_resolved"),
        "notify_triggered": field(notification, "notify_triggered"),
        "notify_frequency": field(notification, "notify_frequency"),
    })
}

/// Conditions without a trigger type are placeholders and are skipped
pub fn build_event_conditions(conditions: &[Dynamic]) -> Value {
    let built: Vec<Value> = conditions
        .iter()
        .filter(|c| !attr_str(c, "trigger_type").is_empty())
        .map(|c| {
            json!({
                "trigger_type": attr_json(c, "trigger_type"),
                "thresholds": field(c, "thresholds"),
                "event_name": field(c, "event_name"),
                "aggregation_window": field(c, "aggregation_window"),
                "operator": field(c, "operator"),
                "frequency": field(c, "frequency"),
            })
        })
        .collect();
    Value::Array(built)
}

/// Rules carry `query_match` and `query_param` as decoded JSON, templates
/// send `query_match` as text
pub fn build_metric_conditions(conditions: &[Dynamic], rule: bool) -> Value {
    let decoded = |c: &Dynamic, name: &str| {
        let raw = attr_str(c, name);
        if raw.is_empty() {
            Value::Null
        } else {
            value_ignore_empty(parse_json_string(&raw))
        }
    };

    let built: Vec<Value> = conditions
        .iter()
        .filter(|c| !attr_str(c, "metric_query_mode").is_empty())
        .map(|c| {
            let mut condition = json!({
                "metric_query_mode": attr_json(c, "metric_query_mode"),
                "metric_name": if rule { attr_json(c, "metric_name") } else { field(c, "metric_name") },
                "promql": if rule { attr_json(c, "promql") } else { field(c, "promql") },
                "query_match": if rule { decoded(c, "query_match") } else { field(c, "query_match") },
            });
            for name in [
                "aggregation_window",
                "aggregate_type",
                "metric_labels",
                "aggregation_type",
                "operator",
                "thresholds",
                "trigger_times",
                "trigger_type",
                "trigger_interval",
                "expression",
                "mix_promql",
                "metric_namespace",
                "metric_unit",
                "promql_expr",
                "promql_for",
                "aom_monitor_level",
                "metric_statistic_method",
            ] {
                condition[name] = field(c, name);
            }
            if rule {
                condition["query_param"] = decoded(c, "query_param");
            }
            condition
        })
        .collect();
    Value::Array(built)
}

pub fn build_no_data(spec: &Dynamic) -> Value {
    let conditions = attr_single(spec, "no_data_conditions");
    if conditions.is_null() {
        return Value::Null;
    }
    json!([{
        "notify_no_data": field(&conditions, "notify_no_data"),
        "no_data_timeframe": field(&conditions, "no_data_timeframe"),
        "no_data_alert_state": field(&conditions, "no_data_alert_state"),
    }])
}

/// The three tag lists, always present even when empty
pub fn build_alarm_tags(spec: &Dynamic) -> Value {
    let tags = attr_single(spec, "alarm_tags");
    let list = |name: &str| match attr_json(&tags, name) {
        Value::Null => json!([]),
        other => other,
    };
    json!([{
        "auto_tags": list("auto_tags"),
        "custom_annotations": list("custom_annotations"),
        "custom_tags": list("custom_tags"),
    }])
}

pub fn build_recovery(spec: &Dynamic) -> Value {
    let recovery = attr_single(spec, "recovery_conditions");
    json!({ "recovery_timeframe": field(&recovery, "recovery_timeframe") })
}

/// Member of an API object as a state value; empty strings and lists read
/// as null
pub fn flat(value: &Value, name: &str) -> Dynamic {
    match pathsearch::search(name, value) {
        Value::String(s) if s.is_empty() => Dynamic::Null,
        Value::Array(items) if items.is_empty() => Dynamic::Null,
        other => Dynamic::from(&other),
    }
}

/// Member as a string attribute, rendering numbers the way they were sent
pub fn flat_str(value: &Value, name: &str) -> Dynamic {
    match pathsearch::search(name, value) {
        Value::Null => Dynamic::Null,
        Value::String(s) if s.is_empty() => Dynamic::Null,
        Value::String(s) => Dynamic::String(s),
        other => Dynamic::String(other.to_string()),
    }
}

/// Member holding JSON, as compact text with stable key order
pub fn flat_json(value: &Value, name: &str) -> Dynamic {
    match pathsearch::search(name, value) {
        Value::Null => Dynamic::Null,
        Value::String(s) if s.is_empty() => Dynamic::Null,
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed) => Dynamic::String(parsed.to_string()),
            Err(_) => Dynamic::String(s),
        },
        other => Dynamic::String(other.to_string()),
    }
}

fn flat_string_map(value: &Value, name: &str) -> Dynamic {
    match pathsearch::search(name, value) {
        Value::Object(members) => Dynamic::Map(
            members
                .iter()
                .map(|(k, v)| {
                    let text = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), Dynamic::String(text))
                })
                .collect(),
        ),
        _ => Dynamic::Null,
    }
}

pub fn flatten_notification(notification: &Value) -> Vec<Dynamic> {
    if notification.is_null() {
        return vec![];
    }
    vec![object([
        ("notification_type", flat(notification, "notification_type")),
        ("route_group_enable", flat(notification, "route_group_enable")),
        ("route_group_rule", flat(notification, "route_group_rule")),
        ("notification_enable", flat(notification, "notification_enable")),
        ("bind_notification_rule_id", flat(notification, "bind_notification_rule_id")),
        ("notify_resolved", flat(notification, "notify_resolved")),
        ("notify_triggered", flat(notification, "notify_triggered")),
        ("notify_frequency", flat_str(notification, "notify_frequency")),
    ])]
}

pub fn flatten_event_conditions(spec: &Value) -> Vec<Dynamic> {
    pathsearch::search_array("trigger_conditions", spec)
        .iter()
        .map(|c| {
            object([
                ("trigger_type", flat(c, "trigger_type")),
                ("event_name", flat(c, "event_name")),
                ("thresholds", flat(c, "thresholds")),
                ("aggregation_window", flat(c, "aggregation_window")),
                ("operator", flat(c, "operator")),
                ("frequency", flat_str(c, "frequency")),
            ])
        })
        .collect()
}

pub fn flatten_metric_conditions(spec: &Value, rule: bool) -> Vec<Dynamic> {
    pathsearch::search_array("trigger_conditions", spec)
        .iter()
        .map(|c| {
            let mut fields = vec![
                ("metric_query_mode", flat(c, "metric_query_mode")),
                ("metric_name", flat(c, "metric_name")),
                ("promql", flat(c, "promql")),
                ("metric_labels", flat(c, "metric_labels")),
                ("thresholds", flat_string_map(c, "thresholds")),
                ("trigger_times", flat_str(c, "trigger_times")),
                ("query_match", flat_json(c, "query_match")),
            ];
            for name in [
                "aggregation_window",
                "aggregate_type",
                "aggregation_type",
                "operator",
                "trigger_type",
                "trigger_interval",
                "expression",
                "mix_promql",
                "metric_statistic_method",
                "metric_namespace",
                "metric_unit",
                "promql_expr",
                "promql_for",
                "aom_monitor_level",
            ] {
                fields.push((name, flat_str(c, name)));
            }
            if rule {
                fields.push(("query_param", flat_json(c, "query_param")));
            }
            object(fields)
        })
        .collect()
}

pub fn flatten_no_data(spec: &Value) -> Vec<Dynamic> {
    pathsearch::search_array("no_data_conditions", spec)
        .iter()
        .map(|c| {
            object([
                ("no_data_timeframe", flat(c, "no_data_timeframe")),
                ("no_data_alert_state", flat(c, "no_data_alert_state")),
                ("notify_no_data", flat(c, "notify_no_data")),
            ])
        })
        .collect()
}

/// Tag lists the service reports as all empty read back as no block
pub fn flatten_alarm_tags(spec: &Value) -> Vec<Dynamic> {
    pathsearch::search_array("alarm_tags", spec)
        .iter()
        .filter(|tags| {
            ["auto_tags", "custom_tags", "custom_annotations"]
                .iter()
                .any(|name| !pathsearch::search_array(name, tags).is_empty())
        })
        .map(|tags| {
            object([
                ("auto_tags", flat(tags, "auto_tags")),
                ("custom_tags", flat(tags, "custom_tags")),
                ("custom_annotations", flat(tags, "custom_annotations")),
            ])
        })
        .collect()
}

pub fn flatten_recovery(spec: &Value) -> Vec<Dynamic> {
    let recovery = pathsearch::search("recovery_conditions", spec);
    if recovery.is_null() {
        return vec![];
    }
    vec![object([("recovery_timeframe", flat(&recovery, "recovery_timeframe"))])]
}
