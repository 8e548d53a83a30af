//! Translation of provider-supplied JSON schema documents into runtime
//! validated call signatures.
//!
//! The provider's schema vocabulary is open-ended and not under our
//! control, so translation is total: anything unrecognized degrades to an
//! unconstrained signature instead of blocking tool discovery.

use serde_json::{Map, Value};
use thiserror::Error;

/// Structural classification of one schema node, decided once up front so
/// the translator can dispatch on a closed set instead of shape-sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Object,
    String,
    Number,
    Boolean,
    Array,
    Null,
    Union,
    Unconstrained,
}

impl SchemaKind {
    pub fn classify(node: &Value) -> SchemaKind {
        let Some(doc) = node.as_object() else {
            return SchemaKind::Unconstrained;
        };
        if doc.contains_key("anyOf") || doc.contains_key("oneOf") {
            return SchemaKind::Union;
        }
        match doc.get("type").and_then(Value::as_str) {
            Some("object") => SchemaKind::Object,
            Some("string") => SchemaKind::String,
            Some("number") | Some("integer") => SchemaKind::Number,
            Some("boolean") => SchemaKind::Boolean,
            Some("array") => SchemaKind::Array,
            Some("null") => SchemaKind::Null,
            // No recognized tag but declared fields: treat as an object.
            None if doc.contains_key("properties") => SchemaKind::Object,
            _ => SchemaKind::Unconstrained,
        }
    }
}

/// One declared object property.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub signature: Signature,
    pub required: bool,
    pub default: Option<Value>,
}

/// The runtime-checkable counterpart of a schema document. Built once per
/// tool at discovery time, immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Signature {
    /// Accepts any value.
    Any,
    Null,
    Boolean,
    Number,
    String { literals: Option<Vec<String>> },
    Array(Box<Signature>),
    /// An empty field list accepts any object shape.
    Object { fields: Vec<Field> },
    Union(Vec<Signature>),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("at `{path}`: {message}")]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Translate a schema document into a [`Signature`]. `None` (the tool
/// declared no input schema) and unrecognized shapes yield
/// [`Signature::Any`]; this function never fails.
pub fn translate(node: Option<&Value>) -> Signature {
    let Some(node) = node else {
        return Signature::Any;
    };
    match SchemaKind::classify(node) {
        SchemaKind::Unconstrained => Signature::Any,
        SchemaKind::Null => Signature::Null,
        SchemaKind::Boolean => Signature::Boolean,
        SchemaKind::Number => Signature::Number,
        SchemaKind::String => Signature::String {
            literals: string_literals(node),
        },
        SchemaKind::Array => {
            let items = node.get("items");
            Signature::Array(Box::new(translate(items)))
        }
        SchemaKind::Object => Signature::Object {
            fields: object_fields(node),
        },
        SchemaKind::Union => {
            let mut alternatives: Vec<Signature> = node
                .get("anyOf")
                .or_else(|| node.get("oneOf"))
                .and_then(Value::as_array)
                .map(|alts| alts.iter().map(|alt| translate(Some(alt))).collect())
                .unwrap_or_default();
            match alternatives.len() {
                0 => Signature::Any,
                // A union of one is that alternative, not a wrapper.
                1 => alternatives.remove(0),
                _ => Signature::Union(alternatives),
            }
        }
    }
}

fn string_literals(node: &Value) -> Option<Vec<String>> {
    let literals: Vec<String> = node
        .get("enum")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if literals.is_empty() {
        None
    } else {
        Some(literals)
    }
}

fn object_fields(node: &Value) -> Vec<Field> {
    let Some(properties) = node.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: Vec<&str> = node
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, child)| Field {
            name: name.clone(),
            signature: translate(Some(child)),
            required: required.contains(&name.as_str()),
            default: child.get("default").cloned(),
        })
        .collect()
}

impl Signature {
    /// Validate `value` and return the effective value the tool should be
    /// called with: absent optional fields that declare a default are
    /// filled in, everything else passes through unchanged.
    pub fn check(&self, value: &Value) -> Result<Value, SchemaViolation> {
        self.check_at(value, "$")
    }

    fn check_at(&self, value: &Value, path: &str) -> Result<Value, SchemaViolation> {
        match self {
            Signature::Any => Ok(value.clone()),
            Signature::Null => {
                if value.is_null() {
                    Ok(Value::Null)
                } else {
                    Err(SchemaViolation::new(path, "expected null"))
                }
            }
            Signature::Boolean => {
                if value.is_boolean() {
                    Ok(value.clone())
                } else {
                    Err(SchemaViolation::new(path, "expected a boolean"))
                }
            }
            Signature::Number => {
                if value.is_number() {
                    Ok(value.clone())
                } else {
                    Err(SchemaViolation::new(path, "expected a number"))
                }
            }
            Signature::String { literals } => {
                let Some(text) = value.as_str() else {
                    return Err(SchemaViolation::new(path, "expected a string"));
                };
                if let Some(literals) = literals {
                    if !literals.iter().any(|lit| lit == text) {
                        return Err(SchemaViolation::new(
                            path,
                            format!("expected one of {literals:?}, got `{text}`"),
                        ));
                    }
                }
                Ok(value.clone())
            }
            Signature::Array(items) => {
                let Some(elements) = value.as_array() else {
                    return Err(SchemaViolation::new(path, "expected an array"));
                };
                let mut checked = Vec::with_capacity(elements.len());
                for (index, element) in elements.iter().enumerate() {
                    checked.push(items.check_at(element, &format!("{path}[{index}]"))?);
                }
                Ok(Value::Array(checked))
            }
            Signature::Object { fields } => {
                let Some(entries) = value.as_object() else {
                    return Err(SchemaViolation::new(path, "expected an object"));
                };
                if fields.is_empty() {
                    return Ok(value.clone());
                }
                // Undeclared keys pass through; declared ones are checked
                // or defaulted.
                let mut checked: Map<String, Value> = entries.clone();
                for field in fields {
                    let field_path = format!("{path}.{}", field.name);
                    match entries.get(&field.name) {
                        Some(present) => {
                            let value = field.signature.check_at(present, &field_path)?;
                            checked.insert(field.name.clone(), value);
                        }
                        None => {
                            if let Some(default) = &field.default {
                                checked.insert(field.name.clone(), default.clone());
                            } else if field.required {
                                return Err(SchemaViolation::new(
                                    &field_path,
                                    "missing required property",
                                ));
                            }
                        }
                    }
                }
                Ok(Value::Object(checked))
            }
            Signature::Union(alternatives) => {
                for alternative in alternatives {
                    if let Ok(value) = alternative.check_at(value, path) {
                        return Ok(value);
                    }
                }
                Err(SchemaViolation::new(
                    path,
                    format!("no matching alternative out of {}", alternatives.len()),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_schema_accepts_anything() {
        let signature = translate(None);
        assert_eq!(signature, Signature::Any);
        assert!(signature.check(&json!({"whatever": [1, 2]})).is_ok());
        assert!(signature.check(&Value::Null).is_ok());
    }

    #[test]
    fn non_object_node_degrades_to_any() {
        assert_eq!(translate(Some(&json!("string"))), Signature::Any);
        assert_eq!(translate(Some(&json!(42))), Signature::Any);
    }

    #[test]
    fn unrecognized_type_tag_degrades_to_any() {
        assert_eq!(translate(Some(&json!({"type": "tuple"}))), Signature::Any);
        assert_eq!(
            translate(Some(&json!({"type": ["string", "null"]}))),
            Signature::Any
        );
    }

    #[test]
    fn required_split_partitions_property_names() {
        let node = json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "url": {"type": "string"},
                "summary": {"type": "string"}
            },
            "required": ["title", "url"]
        });
        let Signature::Object { fields } = translate(Some(&node)) else {
            panic!("expected an object signature");
        };
        assert_eq!(fields.len(), 3);
        let required: Vec<&str> = fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        let optional: Vec<&str> = fields
            .iter()
            .filter(|f| !f.required)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(required, vec!["title", "url"]);
        assert_eq!(optional, vec!["summary"]);
    }

    #[test]
    fn object_without_properties_accepts_any_object() {
        let signature = translate(Some(&json!({"type": "object"})));
        assert!(signature.check(&json!({"anything": true})).is_ok());
        assert!(signature.check(&json!({})).is_ok());
        assert!(signature.check(&json!("not an object")).is_err());
    }

    #[test]
    fn properties_without_type_tag_infer_object() {
        let node = json!({"properties": {"q": {"type": "string"}}, "required": ["q"]});
        let signature = translate(Some(&node));
        assert!(matches!(signature, Signature::Object { .. }));
        assert!(signature.check(&json!({"q": "x"})).is_ok());
        assert!(signature.check(&json!({})).is_err());
    }

    #[test]
    fn defaults_fill_absent_fields() {
        let node = json!({
            "type": "object",
            "properties": {
                "limit": {"type": "number", "default": 10}
            }
        });
        let signature = translate(Some(&node));
        let checked = signature.check(&json!({})).unwrap();
        assert_eq!(checked, json!({"limit": 10}));
        // A present value wins over the default.
        let checked = signature.check(&json!({"limit": 3})).unwrap();
        assert_eq!(checked, json!({"limit": 3}));
    }

    #[test]
    fn string_enum_restricts_to_literals() {
        let node = json!({"type": "string", "enum": ["asc", "desc"]});
        let signature = translate(Some(&node));
        assert!(signature.check(&json!("asc")).is_ok());
        assert!(signature.check(&json!("sideways")).is_err());
        assert!(signature.check(&json!(7)).is_err());
    }

    #[test]
    fn number_covers_integer_and_float() {
        let int = translate(Some(&json!({"type": "integer"})));
        let num = translate(Some(&json!({"type": "number"})));
        assert_eq!(int, num);
        assert!(num.check(&json!(3)).is_ok());
        assert!(num.check(&json!(3.25)).is_ok());
        assert!(num.check(&json!("3")).is_err());
    }

    #[test]
    fn null_accepts_only_null() {
        let signature = translate(Some(&json!({"type": "null"})));
        assert!(signature.check(&Value::Null).is_ok());
        assert!(signature.check(&json!(0)).is_err());
    }

    #[test]
    fn array_checks_each_element() {
        let node = json!({"type": "array", "items": {"type": "string"}});
        let signature = translate(Some(&node));
        assert!(signature.check(&json!(["a", "b"])).is_ok());
        let err = signature.check(&json!(["a", 1])).unwrap_err();
        assert_eq!(err.path, "$[1]");
    }

    #[test]
    fn array_without_items_accepts_any_elements() {
        let signature = translate(Some(&json!({"type": "array"})));
        assert!(signature.check(&json!([1, "two", null])).is_ok());
    }

    #[test]
    fn single_alternative_union_collapses() {
        let wrapped = json!({"anyOf": [{"type": "string"}]});
        let direct = json!({"type": "string"});
        assert_eq!(translate(Some(&wrapped)), translate(Some(&direct)));
    }

    #[test]
    fn union_accepts_any_alternative() {
        let node = json!({"oneOf": [{"type": "string"}, {"type": "number"}]});
        let signature = translate(Some(&node));
        assert!(signature.check(&json!("x")).is_ok());
        assert!(signature.check(&json!(4)).is_ok());
        assert!(signature.check(&json!(true)).is_err());
    }

    #[test]
    fn translation_is_idempotent() {
        let node = json!({
            "type": "object",
            "properties": {
                "q": {"type": "string"},
                "limit": {"type": "integer", "default": 5}
            },
            "required": ["q"]
        });
        let first = translate(Some(&node));
        let second = translate(Some(&node));
        assert_eq!(first, second);
        for candidate in [
            json!({"q": "rust"}),
            json!({"q": "rust", "limit": 2}),
            json!({"limit": 2}),
            json!({"q": 9}),
        ] {
            assert_eq!(
                first.check(&candidate).is_ok(),
                second.check(&candidate).is_ok()
            );
        }
    }

    #[test]
    fn missing_required_property_names_its_path() {
        let node = json!({
            "type": "object",
            "properties": {"q": {"type": "string"}},
            "required": ["q"]
        });
        let signature = translate(Some(&node));
        assert!(signature.check(&json!({"q": "x"})).is_ok());
        let err = signature.check(&json!({})).unwrap_err();
        assert_eq!(err.path, "$.q");
    }

    #[test]
    fn undeclared_keys_pass_through() {
        let node = json!({
            "type": "object",
            "properties": {"q": {"type": "string"}},
            "required": ["q"]
        });
        let signature = translate(Some(&node));
        let checked = signature.check(&json!({"q": "x", "extra": 1})).unwrap();
        assert_eq!(checked, json!({"q": "x", "extra": 1}));
    }
}
