//! Schema validation.
//!
//! Checks a JSON configuration against a [`Schema`] before the provider acts
//! on it, so shape and type mistakes come back as diagnostics pointing at an
//! attribute path (`items.0.coffee.id`) instead of failing later.
//!
//! # Example
//!
//! ```
//! use hashicups_provider::schema::{Attribute, Schema};
//! use hashicups_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0().with_attribute("id", Attribute::required_int64());
//!
//! assert!(validate(&schema, &json!({"id": 3})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"id": "three"}));
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("id"));
//! ```

use serde_json::{Map, Value};

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema,
};

/// Validate a value against a schema.
///
/// - Required attributes must be present and non-null.
/// - Computed-only attributes are skipped; the provider sets them.
/// - Nested blocks are checked recursively, including their item bounds.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut validator = Validator::default();
    validator.block(&schema.block, value, "");
    validator.diagnostics
}

/// [`validate`], as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether the value passes [`validate`].
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

#[derive(Default)]
struct Validator {
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    fn block(&mut self, block: &Block, value: &Value, path: &str) {
        let empty = Map::new();
        let obj = match value {
            Value::Object(obj) => obj,
            // The configuration as a whole may be null when nothing is set.
            Value::Null if path.is_empty() => &empty,
            other => {
                self.push(
                    Diagnostic::error("Expected object").with_detail(format!("Got {}", kind(other))),
                    path,
                );
                return;
            }
        };

        for (name, attr) in &block.attributes {
            self.attribute(attr, obj.get(name), &join(path, name));
        }
        for (name, nested) in &block.blocks {
            self.nested(nested, obj.get(name), &join(path, name));
        }
    }

    fn attribute(&mut self, attr: &Attribute, value: Option<&Value>, path: &str) {
        if attr.flags.is_computed_only() {
            return;
        }
        match value {
            None | Some(Value::Null) if attr.flags.required => self.push(
                Diagnostic::error(format!("Missing required attribute '{}'", path))
                    .with_detail("This attribute is required and must be provided"),
                path,
            ),
            None | Some(Value::Null) => {}
            Some(v) => self.value(&attr.attr_type, v, path),
        }
    }

    fn value(&mut self, ty: &AttributeType, value: &Value, path: &str) {
        let ok = match ty {
            AttributeType::String => value.is_string(),
            AttributeType::Int64 => is_int64(value),
            AttributeType::Bool => value.is_boolean(),
            AttributeType::List(element) => match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.value(element, item, &join(path, &i.to_string()));
                    }
                    true
                }
                None => false,
            },
            AttributeType::Object(fields) => match value.as_object() {
                Some(obj) => {
                    for (name, field_ty) in fields {
                        if let Some(field) = obj.get(name).filter(|v| !v.is_null()) {
                            self.value(field_ty, field, &join(path, name));
                        }
                    }
                    true
                }
                None => false,
            },
        };

        if !ok {
            self.push(
                Diagnostic::error(format!("Invalid type for attribute '{}'", path))
                    .with_detail(format!("Expected {}, got {}", type_name(ty), kind(value))),
                path,
            );
        }
    }

    fn nested(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &str) {
        let items: Vec<&Value> = match (nested.nesting_mode, value) {
            (_, None | Some(Value::Null)) => Vec::new(),
            (BlockNestingMode::Single, Some(v)) => vec![v],
            (BlockNestingMode::List, Some(Value::Array(items))) => items.iter().collect(),
            (BlockNestingMode::List, Some(other)) => {
                self.push(
                    Diagnostic::error(format!("Expected list for block '{}'", path))
                        .with_detail(format!("Got {}", kind(other))),
                    path,
                );
                return;
            }
        };

        let len = items.len() as u32;
        if len < nested.min_items {
            self.push(
                Diagnostic::error(format!(
                    "Block '{}' requires at least {} item(s), got {}",
                    path, nested.min_items, len
                )),
                path,
            );
        }
        if nested.max_items > 0 && len > nested.max_items {
            self.push(
                Diagnostic::error(format!(
                    "Block '{}' allows at most {} item(s), got {}",
                    path, nested.max_items, len
                )),
                path,
            );
        }

        match nested.nesting_mode {
            BlockNestingMode::Single => {
                if let Some(item) = items.first() {
                    self.block(&nested.block, item, path);
                }
            }
            BlockNestingMode::List => {
                for (i, item) in items.iter().enumerate() {
                    self.block(&nested.block, item, &join(path, &i.to_string()));
                }
            }
        }
    }

    fn push(&mut self, diagnostic: Diagnostic, path: &str) {
        let diagnostic = if path.is_empty() {
            diagnostic
        } else {
            diagnostic.with_attribute(path)
        };
        self.diagnostics.push(diagnostic);
    }
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_name(ty: &AttributeType) -> &'static str {
    match ty {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::List(_) => "list",
        AttributeType::Object(_) => "object",
    }
}

// Same acceptance as deserializing an `i64`; `2.0` is not an integer.
fn is_int64(value: &Value) -> bool {
    value.as_i64().is_some()
}
