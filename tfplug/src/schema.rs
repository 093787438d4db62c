//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining provider, resource and
//! data source schemas: attribute types, nested blocks, replacement and
//! default semantics, and attribute validators.

use crate::types::Dynamic;
use crate::validator::Validator;
use std::collections::BTreeMap;
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
/// This must match Terraform's type system exactly
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),                // Ordered, allows duplicates
    Set(Box<AttributeType>),                 // Unordered, no duplicates
    Map(Box<AttributeType>),                 // String keys only
    Object(BTreeMap<String, AttributeType>), // Fixed structure
}

impl AttributeType {
    pub fn list(element: AttributeType) -> Self {
        AttributeType::List(Box::new(element))
    }

    pub fn set(element: AttributeType) -> Self {
        AttributeType::Set(Box::new(element))
    }

    pub fn map(element: AttributeType) -> Self {
        AttributeType::Map(Box::new(element))
    }

    /// cty JSON type notation: "string", ["list","string"], ["object",{...}]
    pub fn to_cty_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            AttributeType::String => json!("string"),
            AttributeType::Number => json!("number"),
            AttributeType::Bool => json!("bool"),
            AttributeType::List(inner) => json!(["list", inner.to_cty_json()]),
            AttributeType::Set(inner) => json!(["set", inner.to_cty_json()]),
            AttributeType::Map(inner) => json!(["map", inner.to_cty_json()]),
            AttributeType::Object(fields) => {
                let fields: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_cty_json()))
                    .collect();
                json!(["object", fields])
            }
        }
    }

    /// Encoded form used in the protocol's Schema.Attribute.type
    pub fn type_bytes(&self) -> Vec<u8> {
        self.to_cty_json().to_string().into_bytes()
    }
}

/// Schema is returned by providers/resources/data sources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

/// Block represents a configuration block
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

impl Block {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn nested_block(&self, name: &str) -> Option<&NestedBlock> {
        self.block_types.iter().find(|b| b.type_name == name)
    }

    /// Fill absent attributes with null and absent list/set blocks with empty
    /// lists, dropping members the schema does not declare
    pub fn conform(&self, value: Dynamic) -> Dynamic {
        let mut members = match value {
            Dynamic::Map(m) => m,
            Dynamic::Unknown => return Dynamic::Unknown,
            _ => Default::default(),
        };
        let mut out = std::collections::HashMap::new();

        for attr in &self.attributes {
            out.insert(
                attr.name.clone(),
                members.remove(&attr.name).unwrap_or(Dynamic::Null),
            );
        }

        for nested in &self.block_types {
            let raw = members.remove(&nested.type_name).unwrap_or(Dynamic::Null);
            let conformed = match (nested.nesting, raw) {
                (NestingMode::Single, Dynamic::Null) => Dynamic::Null,
                (NestingMode::Single, item) => nested.block.conform(item),
                (_, Dynamic::List(items)) => Dynamic::List(
                    items
                        .into_iter()
                        .map(|item| nested.block.conform(item))
                        .collect(),
                ),
                (_, Dynamic::Unknown) => Dynamic::Unknown,
                _ => Dynamic::List(Vec::new()),
            };
            out.insert(nested.type_name.clone(), conformed);
        }

        Dynamic::Map(out)
    }
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub deprecated: bool,
    /// Changing the value destroys and recreates the resource
    pub force_new: bool,
    /// Planned when the attribute is optional+computed and not configured
    pub default: Option<Dynamic>,
    pub validators: Vec<Arc<dyn Validator>>,
}

// Manual Debug implementation since validators don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("force_new", &self.force_new)
            .field("default", &self.default)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .finish()
    }
}

/// NestedBlock represents a nested configuration block
#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    pub max_items: i64,
}

/// NestingMode defines how nested blocks are structured
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NestingMode {
    Single,
    List,
    Set,
}

/// StringKind represents the format of string values
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum StringKind {
    #[default]
    Plain,
    Markdown,
}

/// AttributeBuilder provides fluent API for building attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                deprecated: false,
                force_new: false,
                default: None,
                validators: Vec::new(),
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.attribute.force_new = true;
        self
    }

    /// Static default; the attribute becomes optional+computed
    pub fn default(mut self, value: impl Into<Dynamic>) -> Self {
        self.attribute.default = Some(value.into());
        self.attribute.optional = true;
        self.attribute.required = false;
        self.attribute.computed = true;
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.attribute.validators.push(Arc::new(validator));
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// NestedBlockBuilder builds list, set and single nested blocks
pub struct NestedBlockBuilder {
    nested: NestedBlock,
}

impl NestedBlockBuilder {
    /// Defaults to list nesting
    pub fn new(type_name: &str) -> Self {
        Self {
            nested: NestedBlock {
                type_name: type_name.to_string(),
                block: Block::default(),
                nesting: NestingMode::List,
                min_items: 0,
                max_items: 0,
            },
        }
    }

    pub fn set(mut self) -> Self {
        self.nested.nesting = NestingMode::Set;
        self
    }

    pub fn min_items(mut self, n: i64) -> Self {
        self.nested.min_items = n;
        self
    }

    pub fn max_items(mut self, n: i64) -> Self {
        self.nested.max_items = n;
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.nested.block.description = desc.to_string();
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.nested.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.nested.block.block_types.push(block);
        self
    }

    pub fn build(self) -> NestedBlock {
        self.nested
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block::default(),
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.schema.block.block_types.push(block);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn description_kind(mut self, kind: StringKind) -> Self {
        self.schema.block.description_kind = kind;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn default_makes_attribute_optional_and_computed() {
        let attr = AttributeBuilder::new("period_unit", AttributeType::String)
            .required()
            .default("MINUTE")
            .build();

        assert!(attr.optional);
        assert!(attr.computed);
        assert!(!attr.required);
        assert_eq!(attr.default, Some(Dynamic::String("MINUTE".to_string())));
    }

    #[test]
    fn cty_type_encoding() {
        assert_eq!(AttributeType::String.type_bytes(), b"\"string\"".to_vec());
        assert_eq!(
            AttributeType::list(AttributeType::Number).to_cty_json(),
            serde_json::json!(["list", "number"])
        );

        let object = AttributeType::Object(BTreeMap::from([
            ("host".to_string(), AttributeType::String),
            ("port".to_string(), AttributeType::Number),
        ]));
        assert_eq!(
            AttributeType::set(object).to_cty_json(),
            serde_json::json!(["set", ["object", {"host": "string", "port": "number"}]])
        );
    }

    #[test]
    fn schema_builder_creates_schema_with_blocks() {
        let schema = SchemaBuilder::new()
            .version(1)
            .description("Test resource schema")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("members")
                    .set()
                    .max_items(30)
                    .attribute(
                        AttributeBuilder::new("host", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .build(),
            )
            .build();

        assert_eq!(schema.version, 1);
        assert_eq!(schema.block.attributes.len(), 1);
        let members = schema.block.nested_block("members").unwrap();
        assert_eq!(members.nesting, NestingMode::Set);
        assert_eq!(members.max_items, 30);
    }

    #[test]
    fn conform_fills_missing_members_and_drops_extras() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("remark", AttributeType::String)
                    .optional()
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("tags")
                    .attribute(
                        AttributeBuilder::new("key", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .build(),
            )
            .build();

        let value = Dynamic::Map(HashMap::from([
            ("name".to_string(), Dynamic::from("demo")),
            ("unexpected".to_string(), Dynamic::from(true)),
        ]));

        let conformed = schema.block.conform(value);
        let members = conformed.as_map().unwrap();
        assert_eq!(members.len(), 3);
        assert!(members["remark"].is_null());
        assert_eq!(members["tags"], Dynamic::List(vec![]));
        assert!(!members.contains_key("unexpected"));
    }
}
