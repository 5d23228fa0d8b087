//! Validation of object payloads against JSON Schema.
//!
//! A schema is either a full `{"type": "object", ...}` document or a bare map
//! of property schemas. Both are normalised into one object schema that
//! rejects undeclared properties unless `additionalProperties` is `true`.
//! Every property additionally gets its own validator so that partial updates
//! can be checked field by field. Validation is independent of pipeline
//! evaluation.

use crate::datapoint::Value;
use crate::error::{PipelineError, PipelineResult};
use jsonschema::{Draft, Validator};
use std::collections::BTreeMap;
use std::fmt;

type JsonMap = serde_json::Map<String, serde_json::Value>;

fn build_validator(schema: &serde_json::Value, context: &str) -> PipelineResult<Validator> {
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(schema)
        .map_err(|e| PipelineError::schema(format!("invalid schema for {}: {}", context, e)))
}

/// Runs `validator` and reports its first error, with the failing location
/// written as a dotted path below `prefix`.
fn first_error(
    validator: &Validator,
    prefix: Option<&str>,
    instance: &serde_json::Value,
) -> PipelineResult<()> {
    let Some(error) = validator.iter_errors(instance).next() else {
        return Ok(());
    };

    let pointer = error.instance_path().to_string();
    let relative = pointer.trim_start_matches('/').replace('/', ".");
    let field = match (prefix, relative.is_empty()) {
        (Some(prefix), true) => Some(prefix.to_string()),
        (Some(prefix), false) => Some(format!("{}.{}", prefix, relative)),
        (None, true) => None,
        (None, false) => Some(relative),
    };
    Err(PipelineError::SchemaValidationError {
        message: error.to_string(),
        field,
    })
}

struct PropertySchema {
    validator: Validator,
    required: bool,
    default: Option<Value>,
}

/// Schema for object payloads.
pub struct ObjectSchema {
    validator: Validator,
    properties: BTreeMap<String, PropertySchema>,
    additional_properties: bool,
}

impl ObjectSchema {
    /// Builds a schema from either a full object schema or a bare map of
    /// property schemas. A bare map may still carry `required` and
    /// `additionalProperties`, which apply to the object itself.
    pub fn new(definition: serde_json::Value) -> PipelineResult<Self> {
        let serde_json::Value::Object(map) = definition else {
            return Err(PipelineError::schema("schema must be a JSON object"));
        };
        let object = Self::normalise(map)?;

        let additional_properties = object
            .get("additionalProperties")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| PipelineError::schema("additionalProperties must be a boolean"))?;

        let mut properties = BTreeMap::new();
        if let Some(defined) = object.get("properties") {
            let defined = defined
                .as_object()
                .ok_or_else(|| PipelineError::schema("properties must be an object"))?;
            for (name, schema) in defined {
                properties.insert(
                    name.clone(),
                    PropertySchema {
                        validator: build_validator(schema, name)?,
                        required: false,
                        default: schema.get("default").cloned().map(Value::from),
                    },
                );
            }
        }

        if let Some(required) = object.get("required") {
            let names = required
                .as_array()
                .ok_or_else(|| PipelineError::schema("required must be a list"))?;
            for name in names {
                let name = name
                    .as_str()
                    .ok_or_else(|| PipelineError::schema("required must list property names"))?;
                let property = properties.get_mut(name).ok_or_else(|| {
                    PipelineError::schema_field("required property has no schema", name)
                })?;
                property.required = true;
            }
        }

        let validator = build_validator(&serde_json::Value::Object(object), "object")?;
        Ok(Self {
            validator,
            properties,
            additional_properties,
        })
    }

    fn normalise(map: JsonMap) -> PipelineResult<JsonMap> {
        let mut object = match map.get("type") {
            Some(serde_json::Value::String(t)) if t == "object" => map,
            Some(_) => return Err(PipelineError::schema("schema must have type 'object'")),
            None => {
                let mut object = JsonMap::new();
                object.insert("type".to_string(), "object".into());
                let mut properties = JsonMap::new();
                for (key, value) in map {
                    match key.as_str() {
                        "required" | "additionalProperties" => {
                            object.insert(key, value);
                        }
                        _ => {
                            properties.insert(key, value);
                        }
                    }
                }
                object.insert("properties".to_string(), properties.into());
                object
            }
        };
        object
            .entry("additionalProperties")
            .or_insert(serde_json::Value::Bool(false));
        Ok(object)
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.properties
            .get(property)
            .map_or(false, |property| property.required)
    }

    /// Validates a complete object.
    pub fn validate(&self, value: &Value) -> PipelineResult<()> {
        first_error(&self.validator, None, &serde_json::Value::from(value.clone()))
    }

    /// Fills in declared defaults for absent top-level properties, then
    /// validates.
    pub fn validate_with_defaults(&self, value: &mut Value) -> PipelineResult<()> {
        if let Value::Object(map) = value {
            for (name, property) in &self.properties {
                if let Some(default) = &property.default {
                    map.entry(name.clone()).or_insert_with(|| default.clone());
                }
            }
        }
        self.validate(value)
    }

    /// Validates a partial update. Present properties are checked against
    /// their own schema, absent ones are ignored, and `null` marks a deletion,
    /// which required properties do not allow.
    pub fn validate_update(&self, value: &Value) -> PipelineResult<()> {
        let Value::Object(map) = value else {
            return Err(PipelineError::schema(format!(
                "expected an object, got {}",
                value.type_name()
            )));
        };

        for (name, field) in map {
            let Some(property) = self.properties.get(name) else {
                if self.additional_properties {
                    continue;
                }
                return Err(PipelineError::schema_field(
                    "property not permitted",
                    name.as_str(),
                ));
            };

            if field.is_null() {
                if property.required {
                    return Err(PipelineError::schema_field(
                        "required property cannot be deleted",
                        name.as_str(),
                    ));
                }
                continue;
            }
            first_error(
                &property.validator,
                Some(name.as_str()),
                &serde_json::Value::from(field.clone()),
            )?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectSchema")
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("additional_properties", &self.additional_properties)
            .finish_non_exhaustive()
    }
}
