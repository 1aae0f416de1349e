//! Declarative input contracts
//!
//! Each tool declares its fields once as an [`InputSpec`]. The same value
//! renders the JSON Schema advertised by `tools/list` and validates call
//! arguments before any handler runs.

use hf_core::{Error, Result};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    /// Array whose items are all of the given primitive type
    Array(ItemType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    String,
    Integer,
}

impl FieldType {
    fn schema_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array(_) => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array(item) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|v| item.matches(v))),
        }
    }
}

impl ItemType {
    fn schema_name(&self) -> &'static str {
        match self {
            ItemType::String => "string",
            ItemType::Integer => "integer",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ItemType::String => value.is_string(),
            ItemType::Integer => value.is_i64() || value.is_u64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub description: &'static str,
    /// Allowed values for string fields
    pub allowed: Option<&'static [&'static str]>,
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn required(name: &'static str, field_type: FieldType, description: &'static str) -> Self {
        Self {
            name,
            field_type,
            required: true,
            description,
            allowed: None,
            default: None,
        }
    }

    pub fn optional(name: &'static str, field_type: FieldType, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type, description)
        }
    }

    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.field_type.schema_name()));
        if let FieldType::Array(item) = self.field_type {
            schema.insert("items".into(), json!({ "type": item.schema_name() }));
        }
        if !self.description.is_empty() {
            schema.insert("description".into(), json!(self.description));
        }
        if let Some(allowed) = self.allowed {
            schema.insert("enum".into(), json!(allowed));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        Value::Object(schema)
    }
}

/// Ordered field list of one tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSpec {
    fields: Vec<FieldSpec>,
}

impl InputSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// JSON Schema object as advertised to clients
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.to_json_schema()))
            .collect();
        let required: Vec<&str> = self.required_fields().map(|f| f.name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    /// Check presence, type and enum membership of every declared field.
    ///
    /// `null` counts as absent. Undeclared keys are ignored.
    pub fn validate(&self, arguments: &Value) -> Result<()> {
        let args = match arguments {
            Value::Object(map) => map,
            Value::Null => {
                return match self.required_fields().next() {
                    Some(field) => Err(Error::invalid_arguments(format!(
                        "missing required field '{}'",
                        field.name
                    ))),
                    None => Ok(()),
                }
            }
            other => {
                return Err(Error::invalid_arguments(format!(
                    "arguments must be an object, got {}",
                    json_kind(other)
                )))
            }
        };

        for field in &self.fields {
            let value = match args.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(Error::invalid_arguments(format!(
                            "missing required field '{}'",
                            field.name
                        )));
                    }
                    continue;
                }
                Some(value) => value,
            };

            if !field.field_type.matches(value) {
                return Err(Error::invalid_arguments(format!(
                    "field '{}' must be {}, got {}",
                    field.name,
                    describe(field.field_type),
                    json_kind(value)
                )));
            }

            if let (Some(allowed), Some(s)) = (field.allowed, value.as_str()) {
                if !allowed.contains(&s) {
                    return Err(Error::invalid_arguments(format!(
                        "field '{}' must be one of [{}], got '{}'",
                        field.name,
                        allowed.join(", "),
                        s
                    )));
                }
            }
        }
        Ok(())
    }
}

fn describe(field_type: FieldType) -> String {
    match field_type {
        FieldType::Array(item) => format!("an array of {}s", item.schema_name()),
        FieldType::Integer => "an integer".to_string(),
        FieldType::Object => "an object".to_string(),
        other => format!("a {}", other.schema_name()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> InputSpec {
        InputSpec::new()
            .field(FieldSpec::required("query", FieldType::String, "Search query"))
            .field(
                FieldSpec::optional("type", FieldType::String, "Kind to search")
                    .one_of(&["model", "dataset", "space"])
                    .with_default(json!("model")),
            )
            .field(FieldSpec::optional("limit", FieldType::Integer, ""))
            .field(FieldSpec::optional("ids", FieldType::Array(ItemType::String), ""))
    }

    #[test]
    fn test_schema_rendering() {
        let schema = spec().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["type"]["enum"], json!(["model", "dataset", "space"]));
        assert_eq!(schema["properties"]["type"]["default"], "model");
        assert_eq!(schema["properties"]["ids"]["items"]["type"], "string");
        assert!(schema["properties"]["limit"].get("description").is_none());
    }

    #[test]
    fn test_missing_required_field() {
        let err = spec().validate(&json!({"type": "model"})).unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENTS");
        assert!(err.to_string().contains("query"));

        assert!(spec().validate(&json!({"query": null})).is_err());
        assert!(spec().validate(&Value::Null).is_err());
    }

    #[test]
    fn test_wrong_types() {
        assert!(spec().validate(&json!({"query": 5})).is_err());
        assert!(spec().validate(&json!({"query": "x", "limit": "10"})).is_err());
        assert!(spec().validate(&json!({"query": "x", "limit": 1.5})).is_err());
        assert!(spec().validate(&json!({"query": "x", "ids": ["a", 1]})).is_err());
        assert!(spec().validate(&json!(["query"])).is_err());
    }

    #[test]
    fn test_enum_membership() {
        assert!(spec().validate(&json!({"query": "x", "type": "space"})).is_ok());
        let err = spec().validate(&json!({"query": "x", "type": "paper"})).unwrap_err();
        assert!(err.to_string().contains("one of"));
    }

    #[test]
    fn test_valid_arguments_pass() {
        let args = json!({"query": "bert", "limit": 3, "ids": ["a"], "extra": true});
        assert!(spec().validate(&args).is_ok());
        assert!(InputSpec::new().validate(&Value::Null).is_ok());
    }
}
