//! Configuration validation against a schema block

use crate::schema::{Block, NestingMode};
use crate::types::{AttributePath, Diagnostic, Dynamic};

/// Checks required and computed-only attributes, block item counts and
/// attribute validators. Unknown values are skipped; they are validated
/// again once known.
pub fn validate_config(block: &Block, config: &Dynamic) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(block, config, &AttributePath::root(), &mut diagnostics);
    diagnostics
}

fn validate_block(block: &Block, value: &Dynamic, path: &AttributePath, diags: &mut Vec<Diagnostic>) {
    if value.is_unknown() {
        return;
    }

    for attr in &block.attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let attr_value = value.attr(&attr.name);
        if attr_value.is_unknown() {
            continue;
        }

        if attr_value.is_null() {
            if attr.required {
                diags.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!(
                            "The argument \"{}\" is required, but no definition was found.",
                            attr_path
                        ),
                    )
                    .with_attribute(attr_path),
                );
            }
            continue;
        }

        if attr.computed && !attr.optional && !attr.required {
            diags.push(
                Diagnostic::error(
                    "Invalid configuration",
                    format!("\"{}\" is computed and cannot be set in configuration", attr_path),
                )
                .with_attribute(attr_path),
            );
            continue;
        }

        for validator in &attr.validators {
            validator.validate(attr_value, &attr_path, diags);
        }
    }

    for nested in &block.block_types {
        let block_path = path.clone().attribute(&nested.type_name);
        let nested_value = value.attr(&nested.type_name);
        if nested_value.is_unknown() {
            continue;
        }

        if nested.nesting == NestingMode::Single {
            if !nested_value.is_null() {
                validate_block(&nested.block, nested_value, &block_path, diags);
            } else if nested.min_items > 0 {
                diags.push(
                    Diagnostic::error(
                        "Missing required block",
                        format!("A \"{}\" block is required.", block_path),
                    )
                    .with_attribute(block_path),
                );
            }
            continue;
        }

        let items: &[Dynamic] = nested_value.as_list().map_or(&[], Vec::as_slice);
        let count = items.len() as i64;
        if nested.min_items > 0 && count < nested.min_items {
            diags.push(
                Diagnostic::error(
                    "Insufficient blocks",
                    format!(
                        "At least {} \"{}\" blocks are required.",
                        nested.min_items, nested.type_name
                    ),
                )
                .with_attribute(block_path.clone()),
            );
        }
        if nested.max_items > 0 && count > nested.max_items {
            diags.push(
                Diagnostic::error(
                    "Too many blocks",
                    format!(
                        "No more than {} \"{}\" blocks are allowed.",
                        nested.max_items, nested.type_name
                    ),
                )
                .with_attribute(block_path.clone()),
            );
        }

        for (idx, item) in items.iter().enumerate() {
            let item_path = match nested.nesting {
                NestingMode::List => block_path.clone().index(idx as i64),
                _ => block_path.clone(),
            };
            validate_block(&nested.block, item, &item_path, diags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
    use crate::validator::{NumberBetween, StringOneOf};
    use std::collections::HashMap;

    fn block() -> Block {
        SchemaBuilder::new()
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("name", AttributeType::String).required().build())
            .attribute(
                AttributeBuilder::new("member_type", AttributeType::String)
                    .optional()
                    .validator(StringOneOf::new(["ecs", "ip"]))
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("member")
                    .max_items(2)
                    .attribute(
                        AttributeBuilder::new("weight", AttributeType::Number)
                            .optional()
                            .validator(NumberBetween { min: 0.0, max: 10000.0 })
                            .build(),
                    )
                    .build(),
            )
            .build()
            .block
    }

    fn obj(pairs: Vec<(&str, Dynamic)>) -> Dynamic {
        Dynamic::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<HashMap<_, _>>())
    }

    #[test]
    fn missing_required_attribute_is_reported() {
        let diags = validate_config(&block(), &obj(vec![]));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Missing required argument");
        assert_eq!(diags[0].attribute, Some(AttributePath::new("name")));
    }

    #[test]
    fn computed_only_attribute_cannot_be_configured() {
        let diags = validate_config(
            &block(),
            &obj(vec![("name", Dynamic::from("a")), ("id", Dynamic::from("x"))]),
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute, Some(AttributePath::new("id")));
    }

    #[test]
    fn unknown_values_are_skipped() {
        let diags = validate_config(
            &block(),
            &obj(vec![("name", Dynamic::Unknown), ("member_type", Dynamic::Unknown)]),
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn nested_validators_and_item_limits() {
        let member = |w: f64| obj(vec![("weight", Dynamic::Number(w))]);
        let diags = validate_config(
            &block(),
            &obj(vec![
                ("name", Dynamic::from("a")),
                ("member_type", Dynamic::from("subnet")),
                ("member", Dynamic::List(vec![member(1.0), member(20000.0), member(3.0)])),
            ]),
        );

        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert!(summaries.contains(&"Too many blocks"));
        assert!(summaries.contains(&"Invalid value for member_type"));
        assert!(diags
            .iter()
            .any(|d| d.attribute == Some(AttributePath::new("member").index(1).attribute("weight"))));
    }
}
