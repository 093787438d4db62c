//! Core type system for tfplug
//!
//! This module provides the value model exchanged with Terraform, its msgpack
//! and JSON encodings, and the small utility types shared by the provider,
//! resource and data source APIs.

use crate::error::{Result, TfplugError};
use std::collections::HashMap;

/// msgpack extension codes cty uses for unknown values
const UNKNOWN_EXT: i8 = 0;
const UNKNOWN_REFINED_EXT: i8 = 12;

/// Dynamic represents Terraform values that can be of any type
/// Objects and maps share the Map variant, lists and sets share List
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    Null,
    Bool(bool),
    /// All numbers are f64 to match Terraform
    Number(f64),
    String(String),
    List(Vec<Dynamic>),
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    /// True for values carrying nothing: null, unknown, "" and empty collections
    pub fn is_empty(&self) -> bool {
        match self {
            Dynamic::Null | Dynamic::Unknown => true,
            Dynamic::String(s) => s.is_empty(),
            Dynamic::List(l) => l.is_empty(),
            Dynamic::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().map(|n| n as i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Dynamic>> {
        match self {
            Dynamic::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Dynamic>> {
        match self {
            Dynamic::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Attribute lookup on an object value; missing attributes read as null
    pub fn attr(&self, name: &str) -> &Dynamic {
        static NULL: Dynamic = Dynamic::Null;
        match self {
            Dynamic::Map(m) => m.get(name).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// Replace every unknown value, at any depth, with null
    pub fn unknown_as_null(self) -> Dynamic {
        match self {
            Dynamic::Unknown => Dynamic::Null,
            Dynamic::List(items) => {
                Dynamic::List(items.into_iter().map(Dynamic::unknown_as_null).collect())
            }
            Dynamic::Map(m) => Dynamic::Map(
                m.into_iter()
                    .map(|(k, v)| (k, v.unknown_as_null()))
                    .collect(),
            ),
            other => other,
        }
    }

    /// True when any nested value is unknown
    pub fn contains_unknown(&self) -> bool {
        match self {
            Dynamic::Unknown => true,
            Dynamic::List(items) => items.iter().any(Dynamic::contains_unknown),
            Dynamic::Map(m) => m.values().any(Dynamic::contains_unknown),
            _ => false,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }

    fn to_msgpack(&self) -> rmpv::Value {
        match self {
            Dynamic::Null => rmpv::Value::Nil,
            Dynamic::Bool(b) => rmpv::Value::Boolean(*b),
            Dynamic::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    rmpv::Value::from(*n as i64)
                } else {
                    rmpv::Value::F64(*n)
                }
            }
            Dynamic::String(s) => rmpv::Value::from(s.as_str()),
            Dynamic::List(items) => {
                rmpv::Value::Array(items.iter().map(Dynamic::to_msgpack).collect())
            }
            Dynamic::Map(m) => rmpv::Value::Map(
                m.iter()
                    .map(|(k, v)| (rmpv::Value::from(k.as_str()), v.to_msgpack()))
                    .collect(),
            ),
            Dynamic::Unknown => rmpv::Value::Ext(UNKNOWN_EXT, vec![0]),
        }
    }

    fn from_msgpack(value: rmpv::Value) -> Result<Dynamic> {
        Ok(match value {
            rmpv::Value::Nil => Dynamic::Null,
            rmpv::Value::Boolean(b) => Dynamic::Bool(b),
            rmpv::Value::Integer(i) => Dynamic::Number(
                i.as_i64()
                    .map(|v| v as f64)
                    .or_else(|| i.as_u64().map(|v| v as f64))
                    .or_else(|| i.as_f64())
                    .unwrap_or_default(),
            ),
            rmpv::Value::F32(f) => Dynamic::Number(f as f64),
            rmpv::Value::F64(f) => Dynamic::Number(f),
            rmpv::Value::String(s) => match s.into_str() {
                Some(s) => Dynamic::String(s),
                None => {
                    return Err(TfplugError::DecodingError(
                        "msgpack string is not valid UTF-8".to_string(),
                    ))
                }
            },
            rmpv::Value::Binary(b) => {
                // large numbers arrive as their decimal text
                let text = String::from_utf8_lossy(&b).to_string();
                match text.parse::<f64>() {
                    Ok(n) => Dynamic::Number(n),
                    Err(_) => Dynamic::String(text),
                }
            }
            rmpv::Value::Array(items) => Dynamic::List(
                items
                    .into_iter()
                    .map(Dynamic::from_msgpack)
                    .collect::<Result<Vec<_>>>()?,
            ),
            rmpv::Value::Map(entries) => {
                let mut map = HashMap::with_capacity(entries.len());
                for (k, v) in entries {
                    let key = match k {
                        rmpv::Value::String(s) => s.into_str().unwrap_or_default(),
                        other => other.to_string(),
                    };
                    map.insert(key, Dynamic::from_msgpack(v)?);
                }
                Dynamic::Map(map)
            }
            rmpv::Value::Ext(UNKNOWN_EXT, _) | rmpv::Value::Ext(UNKNOWN_REFINED_EXT, _) => {
                Dynamic::Unknown
            }
            rmpv::Value::Ext(code, _) => {
                return Err(TfplugError::DecodingError(format!(
                    "unsupported msgpack extension type {}",
                    code
                )))
            }
        })
    }

    /// Convert to JSON; integral numbers become JSON integers
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Dynamic::Null | Dynamic::Unknown => serde_json::Value::Null,
            Dynamic::Bool(b) => serde_json::Value::Bool(*b),
            Dynamic::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Value::from(*n)
                }
            }
            Dynamic::String(s) => serde_json::Value::String(s.clone()),
            Dynamic::List(items) => {
                serde_json::Value::Array(items.iter().map(Dynamic::to_json).collect())
            }
            Dynamic::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<&serde_json::Value> for Dynamic {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Dynamic::Null,
            serde_json::Value::Bool(b) => Dynamic::Bool(*b),
            serde_json::Value::Number(n) => Dynamic::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Dynamic::String(s.clone()),
            serde_json::Value::Array(items) => {
                Dynamic::List(items.iter().map(Dynamic::from).collect())
            }
            serde_json::Value::Object(m) => Dynamic::Map(
                m.iter()
                    .map(|(k, v)| (k.clone(), Dynamic::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<String> for Dynamic {
    fn from(value: String) -> Self {
        Dynamic::String(value)
    }
}

impl From<&str> for Dynamic {
    fn from(value: &str) -> Self {
        Dynamic::String(value.to_string())
    }
}

impl From<bool> for Dynamic {
    fn from(value: bool) -> Self {
        Dynamic::Bool(value)
    }
}

impl From<f64> for Dynamic {
    fn from(value: f64) -> Self {
        Dynamic::Number(value)
    }
}

impl From<i64> for Dynamic {
    fn from(value: i64) -> Self {
        Dynamic::Number(value as f64)
    }
}

impl<T: Into<Dynamic>> From<Option<T>> for Dynamic {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Dynamic::Null)
    }
}

impl<T: Into<Dynamic>> From<Vec<T>> for Dynamic {
    fn from(value: Vec<T>) -> Self {
        Dynamic::List(value.into_iter().map(Into::into).collect())
    }
}

/// DynamicValue wraps Dynamic and provides encoding/decoding capabilities
/// This is what gets passed between Terraform and the provider
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    pub fn unknown() -> Self {
        Self {
            value: Dynamic::Unknown,
        }
    }

    /// An empty object, the usual starting point for building state
    pub fn object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    /// Terraform uses msgpack on the wire by default
    pub fn encode_msgpack(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &self.value.to_msgpack())
            .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e)))?;
        Ok(buf)
    }

    pub fn decode_msgpack(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }

        let mut cursor = data;
        let value = rmpv::decode::read_value(&mut cursor)
            .map_err(|e| TfplugError::DecodingError(format!("msgpack decoding failed: {}", e)))?;
        Ok(Self {
            value: Dynamic::from_msgpack(value)?,
        })
    }

    pub fn encode_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.value.to_json())
            .map_err(|e| TfplugError::EncodingError(format!("json encoding failed: {}", e)))
    }

    pub fn decode_json(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }
        let json: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))?;
        Ok(Self {
            value: Dynamic::from(&json),
        })
    }

    /// Raw lookup; missing attributes read as null
    pub fn get(&self, path: &AttributePath) -> &Dynamic {
        static NULL: Dynamic = Dynamic::Null;
        self.navigate_path(path).unwrap_or(&NULL)
    }

    /// Type-safe accessors, these handle path navigation and type checking
    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::String(s) => Ok(s.clone()),
            _ => Err(TfplugError::TypeMismatch {
                expected: "string".to_string(),
                actual: value.type_name().to_string(),
            }),
        }
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Number(n) => Ok(*n),
            _ => Err(TfplugError::TypeMismatch {
                expected: "number".to_string(),
                actual: value.type_name().to_string(),
            }),
        }
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Bool(b) => Ok(*b),
            _ => Err(TfplugError::TypeMismatch {
                expected: "bool".to_string(),
                actual: value.type_name().to_string(),
            }),
        }
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::List(l) => Ok(l.clone()),
            _ => Err(TfplugError::TypeMismatch {
                expected: "list".to_string(),
                actual: value.type_name().to_string(),
            }),
        }
    }

    pub fn get_map(&self, path: &AttributePath) -> Result<HashMap<String, Dynamic>> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Map(m) => Ok(m.clone()),
            _ => Err(TfplugError::TypeMismatch {
                expected: "map".to_string(),
                actual: value.type_name().to_string(),
            }),
        }
    }

    pub fn set_string(&mut self, path: &AttributePath, value: String) -> Result<()> {
        self.set_value(path, Dynamic::String(value))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn set_bool(&mut self, path: &AttributePath, value: bool) -> Result<()> {
        self.set_value(path, Dynamic::Bool(value))
    }

    pub fn set_list(&mut self, path: &AttributePath, value: Vec<Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::List(value))
    }

    pub fn set_map(&mut self, path: &AttributePath, value: HashMap<String, Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::Map(value))
    }

    pub fn set(&mut self, path: &AttributePath, value: impl Into<Dynamic>) -> Result<()> {
        self.set_value(path, value.into())
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_unknown(&self) -> bool {
        self.value.is_unknown()
    }

    pub fn mark_unknown(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Unknown)
    }

    fn navigate_path<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    m.get(name).ok_or_else(|| {
                        TfplugError::Custom(format!("attribute '{}' not found", name))
                    })?
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    l.get(*idx as usize).ok_or_else(|| {
                        TfplugError::Custom(format!("list index {} out of bounds", idx))
                    })?
                }
                _ => return Err(TfplugError::Custom("invalid path navigation".to_string())),
            };
        }

        Ok(current)
    }

    fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = new_value;
            return Ok(());
        };

        if !matches!(self.value, Dynamic::Map(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        for (idx, step) in parents.iter().enumerate() {
            let next_is_index = matches!(
                path.steps.get(idx + 1),
                Some(AttributePathStep::ElementKeyInt(_))
            );
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    let entry = m.entry(name.clone()).or_insert(Dynamic::Null);
                    if entry.is_null() {
                        *entry = if next_is_index {
                            Dynamic::List(Vec::new())
                        } else {
                            Dynamic::Map(HashMap::new())
                        };
                    }
                    entry
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                    let len = l.len();
                    l.get_mut(*i as usize).ok_or_else(|| {
                        TfplugError::Custom(format!("list index {} out of bounds ({})", i, len))
                    })?
                }
                _ => return Err(TfplugError::Custom("invalid path navigation".to_string())),
            };
        }

        match (current, last) {
            (Dynamic::Map(m), AttributePathStep::AttributeName(name))
            | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                m.insert(name.clone(), new_value);
                Ok(())
            }
            (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                let i = *i as usize;
                if i < l.len() {
                    l[i] = new_value;
                    Ok(())
                } else if i == l.len() {
                    l.push(new_value);
                    Ok(())
                } else {
                    Err(TfplugError::Custom(format!("list index {} out of bounds", i)))
                }
            }
            _ => Err(TfplugError::Custom("invalid path navigation".to_string())),
        }
    }
}

/// AttributePath represents a path to an attribute within a DynamicValue
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

impl std::fmt::Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                AttributePathStep::AttributeName(name) if i == 0 => write!(f, "{}", name)?,
                AttributePathStep::AttributeName(name) => write!(f, ".{}", name)?,
                AttributePathStep::ElementKeyString(key) => write!(f, "[{:?}]", key)?,
                AttributePathStep::ElementKeyInt(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

/// Individual step in an AttributePath
#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    /// Access attribute by name in object/map
    AttributeName(String),
    /// Access element by string key (for maps)
    ElementKeyString(String),
    /// Access element by integer index (for lists)
    ElementKeyInt(i64),
}

/// RawState holds the stored state for a resource to be upgraded
#[derive(Debug, Clone)]
pub struct RawState {
    pub json: Option<Vec<u8>>,
    pub flatmap: Option<HashMap<String, String>>,
}

/// Diagnostic represents a warning or error from the provider
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// True when any diagnostic in the slice is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Invalid,
    Error,
    Warning,
}

/// ClientCapabilities indicates Terraform client capabilities
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    pub deferral_allowed: bool,
    pub write_only_attributes_allowed: bool,
}

/// Deferred indicates a deferred change
#[derive(Debug, Clone)]
pub struct Deferred {
    pub reason: DeferredReason,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeferredReason {
    Unknown,
    ResourceConfigUnknown,
    ProviderConfigUnknown,
    AbsentPrereq,
}

/// Config represents configuration values
pub type Config = DynamicValue;

/// State represents resource state values
pub type State = DynamicValue;
