//! Framework-side planning for PlanResourceChange
//!
//! Terraform hands the provider a proposed new state: the configuration
//! merged with the prior state, where unset computed attributes carry their
//! prior value. Planning fills in schema defaults, marks values the apply
//! will compute as unknown, and reports which attribute changes force the
//! resource to be replaced.

use crate::schema::{Attribute, Block, NestedBlock, NestingMode};
use crate::types::{AttributePath, Dynamic, DynamicValue};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
}

pub fn plan_resource_change(
    block: &Block,
    prior_state: &DynamicValue,
    proposed_new_state: &DynamicValue,
    config: &DynamicValue,
) -> PlannedChange {
    // destroy
    if proposed_new_state.is_null() {
        return PlannedChange {
            planned_state: proposed_new_state.clone(),
            requires_replace: Vec::new(),
        };
    }

    let prior = (!prior_state.is_null()).then_some(&prior_state.value);
    let planned = plan_object(block, prior, &proposed_new_state.value, &config.value);

    let Some(prior) = prior else {
        return PlannedChange {
            planned_state: DynamicValue::new(planned),
            requires_replace: Vec::new(),
        };
    };

    let mut requires_replace = Vec::new();
    collect_replacements(block, prior, &planned, AttributePath::root(), &mut requires_replace);

    // a replacement starts from scratch, so everything computed is unknown again
    let planned = if requires_replace.is_empty() {
        planned
    } else {
        plan_object(block, None, &proposed_new_state.value, &config.value)
    };

    PlannedChange {
        planned_state: DynamicValue::new(planned),
        requires_replace,
    }
}

fn plan_object(block: &Block, prior: Option<&Dynamic>, proposed: &Dynamic, config: &Dynamic) -> Dynamic {
    if proposed.is_unknown() || proposed.is_null() {
        return proposed.clone();
    }

    let creating = prior.map_or(true, Dynamic::is_null);
    let mut out = HashMap::new();

    for attr in &block.attributes {
        let prior_value = prior.filter(|_| !creating).map(|p| p.attr(&attr.name));
        let value = plan_attribute(
            attr,
            prior_value,
            proposed.attr(&attr.name),
            config.attr(&attr.name),
        );
        out.insert(attr.name.clone(), value);
    }

    for nested in &block.block_types {
        let prior_items = prior.map(|p| p.attr(&nested.type_name));
        let value = plan_nested(
            nested,
            prior_items,
            proposed.attr(&nested.type_name),
            config.attr(&nested.type_name),
        );
        out.insert(nested.type_name.clone(), value);
    }

    Dynamic::Map(out)
}

/// `prior` is None while creating
fn plan_attribute(
    attr: &Attribute,
    prior: Option<&Dynamic>,
    proposed: &Dynamic,
    config: &Dynamic,
) -> Dynamic {
    if !attr.computed || !config.is_null() {
        return proposed.clone();
    }
    if let Some(default) = &attr.default {
        return default.clone();
    }
    match prior {
        None => Dynamic::Unknown,
        // matched set elements arrive without their computed members
        Some(prior) if proposed.is_null() => prior.clone(),
        Some(_) => proposed.clone(),
    }
}

fn plan_nested(
    nested: &NestedBlock,
    prior: Option<&Dynamic>,
    proposed: &Dynamic,
    config: &Dynamic,
) -> Dynamic {
    match nested.nesting {
        NestingMode::Single => plan_object(&nested.block, prior, proposed, config),
        NestingMode::List | NestingMode::Set => {
            let Some(items) = proposed.as_list() else {
                return proposed.clone();
            };
            let prior_items: &[Dynamic] = prior.and_then(Dynamic::as_list).map_or(&[], Vec::as_slice);
            let config_items: &[Dynamic] = config.as_list().map_or(&[], Vec::as_slice);

            let planned = items
                .iter()
                .enumerate()
                .map(|(idx, item)| {
                    let (prior_item, config_item) = match nested.nesting {
                        NestingMode::List => (prior_items.get(idx), config_items.get(idx)),
                        _ => (
                            find_matching(&nested.block, prior_items, item),
                            find_matching(&nested.block, config_items, item),
                        ),
                    };
                    let config_item = config_item.unwrap_or(item);
                    plan_object(&nested.block, prior_item, item, config_item)
                })
                .collect();
            Dynamic::List(planned)
        }
    }
}

/// Set elements carry no identity, so an element is matched by the
/// attributes a user can configure
fn find_matching<'a>(block: &Block, candidates: &'a [Dynamic], item: &Dynamic) -> Option<&'a Dynamic> {
    let key = configurable_projection(block, item);
    candidates
        .iter()
        .find(|candidate| configurable_projection(block, candidate) == key)
}

fn configurable_projection(block: &Block, value: &Dynamic) -> Dynamic {
    project(block, value, &|attr| attr.required || attr.optional)
}

fn force_new_projection(block: &Block, value: &Dynamic) -> Dynamic {
    project(block, value, &|attr| attr.force_new)
}

fn project(block: &Block, value: &Dynamic, keep: &dyn Fn(&Attribute) -> bool) -> Dynamic {
    let Dynamic::Map(members) = value else {
        return value.clone();
    };

    let mut out = HashMap::new();
    for attr in block.attributes.iter().filter(|a| keep(a)) {
        out.insert(
            attr.name.clone(),
            members.get(&attr.name).cloned().unwrap_or(Dynamic::Null),
        );
    }
    for nested in &block.block_types {
        let projected = match members.get(&nested.type_name) {
            Some(Dynamic::List(items)) => Dynamic::List(
                items
                    .iter()
                    .map(|item| project(&nested.block, item, keep))
                    .collect(),
            ),
            Some(other) if nested.nesting == NestingMode::Single => project(&nested.block, other, keep),
            Some(other) => other.clone(),
            None => Dynamic::Null,
        };
        out.insert(nested.type_name.clone(), projected);
    }
    Dynamic::Map(out)
}

fn block_has_force_new(block: &Block) -> bool {
    block.attributes.iter().any(|a| a.force_new)
        || block
            .block_types
            .iter()
            .any(|nested| block_has_force_new(&nested.block))
}

fn collect_replacements(
    block: &Block,
    prior: &Dynamic,
    planned: &Dynamic,
    path: AttributePath,
    out: &mut Vec<AttributePath>,
) {
    for attr in block.attributes.iter().filter(|a| a.force_new) {
        let before = prior.attr(&attr.name);
        let after = planned.attr(&attr.name);
        if before != after {
            out.push(path.clone().attribute(&attr.name));
        }
    }

    for nested in &block.block_types {
        if !block_has_force_new(&nested.block) {
            continue;
        }
        let before = prior.attr(&nested.type_name);
        let after = planned.attr(&nested.type_name);
        if !same_force_new_items(nested, before, after) {
            out.push(path.clone().attribute(&nested.type_name));
        }
    }
}

fn same_force_new_items(nested: &NestedBlock, before: &Dynamic, after: &Dynamic) -> bool {
    let before_items = items_of(before);
    let after_items = items_of(after);
    if before_items.len() != after_items.len() {
        return false;
    }

    let before: Vec<Dynamic> = before_items
        .iter()
        .map(|item| force_new_projection(&nested.block, item))
        .collect();
    let after: Vec<Dynamic> = after_items
        .iter()
        .map(|item| force_new_projection(&nested.block, item))
        .collect();

    match nested.nesting {
        NestingMode::Set => before.iter().all(|b| after.contains(b)) && after.iter().all(|a| before.contains(a)),
        _ => before == after,
    }
}

fn items_of(value: &Dynamic) -> Vec<Dynamic> {
    match value {
        Dynamic::List(items) => items.clone(),
        Dynamic::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};

    fn schema() -> Block {
        SchemaBuilder::new()
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("region", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(AttributeBuilder::new("name", AttributeType::String).required().build())
            .attribute(
                AttributeBuilder::new("period_unit", AttributeType::String)
                    .default("MINUTE")
                    .build(),
            )
            .attribute(AttributeBuilder::new("created_at", AttributeType::String).computed().build())
            .block(
                NestedBlockBuilder::new("user_throttles")
                    .set()
                    .attribute(
                        AttributeBuilder::new("max_api_requests", AttributeType::Number)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("throttling_object_id", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
                    .build(),
            )
            .build()
            .block
    }

    fn obj(pairs: Vec<(&str, Dynamic)>) -> Dynamic {
        Dynamic::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn user(limit: f64, object: &str, id: Dynamic) -> Dynamic {
        obj(vec![
            ("max_api_requests", Dynamic::Number(limit)),
            ("throttling_object_id", Dynamic::from(object)),
            ("id", id),
        ])
    }

    #[test]
    fn destroy_plan_passes_through() {
        let planned = plan_resource_change(
            &schema(),
            &DynamicValue::new(obj(vec![("name", Dynamic::from("a"))])),
            &DynamicValue::null(),
            &DynamicValue::null(),
        );
        assert!(planned.planned_state.is_null());
        assert!(planned.requires_replace.is_empty());
    }

    #[test]
    fn create_marks_computed_unknown_and_applies_defaults() {
        let config = obj(vec![
            ("name", Dynamic::from("policy")),
            ("user_throttles", Dynamic::List(vec![user(10.0, "u1", Dynamic::Null)])),
        ]);

        let planned = plan_resource_change(
            &schema(),
            &DynamicValue::null(),
            &DynamicValue::new(config.clone()),
            &DynamicValue::new(config),
        )
        .planned_state
        .value;

        assert!(planned.attr("id").is_unknown());
        assert!(planned.attr("region").is_unknown());
        assert!(planned.attr("created_at").is_unknown());
        assert_eq!(planned.attr("period_unit"), &Dynamic::from("MINUTE"));
        let items = planned.attr("user_throttles").as_list().unwrap();
        assert!(items[0].attr("id").is_unknown());
    }

    #[test]
    fn update_keeps_prior_computed_values() {
        let prior = obj(vec![
            ("id", Dynamic::from("abc")),
            ("region", Dynamic::from("cn-north-4")),
            ("name", Dynamic::from("policy")),
            ("period_unit", Dynamic::from("MINUTE")),
            ("created_at", Dynamic::from("2024-01-01T00:00:00Z")),
            ("user_throttles", Dynamic::List(vec![user(10.0, "u1", Dynamic::from("s1"))])),
        ]);
        let config = obj(vec![
            ("name", Dynamic::from("renamed")),
            (
                "user_throttles",
                Dynamic::List(vec![
                    user(10.0, "u1", Dynamic::Null),
                    user(20.0, "u2", Dynamic::Null),
                ]),
            ),
        ]);
        let proposed = obj(vec![
            ("id", Dynamic::from("abc")),
            ("region", Dynamic::from("cn-north-4")),
            ("name", Dynamic::from("renamed")),
            ("period_unit", Dynamic::Null),
            ("created_at", Dynamic::from("2024-01-01T00:00:00Z")),
            (
                "user_throttles",
                Dynamic::List(vec![
                    user(10.0, "u1", Dynamic::Null),
                    user(20.0, "u2", Dynamic::Null),
                ]),
            ),
        ]);

        let change = plan_resource_change(
            &schema(),
            &DynamicValue::new(prior),
            &DynamicValue::new(proposed),
            &DynamicValue::new(config),
        );
        let planned = change.planned_state.value;

        assert!(change.requires_replace.is_empty());
        assert_eq!(planned.attr("id"), &Dynamic::from("abc"));
        assert_eq!(planned.attr("created_at"), &Dynamic::from("2024-01-01T00:00:00Z"));
        assert_eq!(planned.attr("period_unit"), &Dynamic::from("MINUTE"));

        let items = planned.attr("user_throttles").as_list().unwrap();
        assert_eq!(items[0].attr("id"), &Dynamic::from("s1"));
        assert!(items[1].attr("id").is_unknown());
    }

    #[test]
    fn changed_force_new_attribute_requires_replace() {
        let prior = obj(vec![
            ("id", Dynamic::from("abc")),
            ("region", Dynamic::from("cn-north-4")),
            ("name", Dynamic::from("policy")),
            ("period_unit", Dynamic::from("MINUTE")),
            ("created_at", Dynamic::from("2024-01-01T00:00:00Z")),
            ("user_throttles", Dynamic::List(vec![])),
        ]);
        let config = obj(vec![
            ("region", Dynamic::from("cn-south-1")),
            ("name", Dynamic::from("policy")),
        ]);
        let mut proposed = prior.clone();
        if let Dynamic::Map(m) = &mut proposed {
            m.insert("region".to_string(), Dynamic::from("cn-south-1"));
        }

        let change = plan_resource_change(
            &schema(),
            &DynamicValue::new(prior),
            &DynamicValue::new(proposed),
            &DynamicValue::new(config),
        );

        assert_eq!(change.requires_replace, vec![AttributePath::new("region")]);
        assert!(change.planned_state.value.attr("id").is_unknown());
        assert!(change.planned_state.value.attr("created_at").is_unknown());
    }

    #[test]
    fn nested_force_new_change_reports_block_path() {
        let block = SchemaBuilder::new()
            .block(
                NestedBlockBuilder::new("custom_policy")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("function_urn", AttributeType::String)
                            .required()
                            .force_new()
                            .build(),
                    )
                    .build(),
            )
            .build()
            .block;

        let prior = obj(vec![(
            "custom_policy",
            Dynamic::List(vec![obj(vec![("function_urn", Dynamic::from("urn:a"))])]),
        )]);
        let proposed = obj(vec![(
            "custom_policy",
            Dynamic::List(vec![obj(vec![("function_urn", Dynamic::from("urn:b"))])]),
        )]);

        let change = plan_resource_change(
            &block,
            &DynamicValue::new(prior),
            &DynamicValue::new(proposed.clone()),
            &DynamicValue::new(proposed),
        );

        assert_eq!(change.requires_replace, vec![AttributePath::new("custom_policy")]);
    }
}
