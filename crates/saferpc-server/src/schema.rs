//! Parameter validation against JSON Schema
//!
//! Parameters arrive as [`RichValue`]s. Before checking, the value is
//! normalized under the schema's guidance: optional type coercion (numeric
//! strings to numbers, scalars to strings, ...) and optional removal of
//! undeclared properties. The normalized value is then checked with
//! `jsonschema` in its plain JSON form, where BigInt and Date values count as
//! strings (`"42n"`, ISO-8601).
//!
//! Coercion runs independently of the codec: a parameter declared as
//! `number` turns `"0123456"` into `123456`. Declare such fields as `string`
//! to keep leading zeros.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use saferpc_codec::RichValue;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::debug;

/// Schema compilation failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    #[error("Schema must be a JSON object or boolean")]
    NotASchema,

    #[error("Failed to compile schema: {0}")]
    Compile(String),
}

pub type FormatCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

static BIGINT_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+n$").expect("valid bigint pattern"));
static OBJECT_ID_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("valid objectid pattern"));

/// How undeclared object properties are handled before validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoveAdditional {
    /// Keep everything; `additionalProperties: false` reports an error
    #[default]
    Never,
    /// Remove properties only where the schema says `additionalProperties: false`
    Restricted,
    /// Remove every property not declared in `properties`/`patternProperties`
    All,
}

/// Validator behaviour
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorConfig {
    pub coerce_types: bool,
    pub remove_additional: RemoveAdditional,
    #[serde(skip)]
    formats: Vec<(String, FormatCheck)>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            coerce_types: true,
            remove_additional: RemoveAdditional::Never,
            formats: Vec::new(),
        }
    }
}

impl fmt::Debug for ValidatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorConfig")
            .field("coerce_types", &self.coerce_types)
            .field("remove_additional", &self.remove_additional)
            .field(
                "formats",
                &self.formats.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ValidatorConfig {
    pub fn with_coerce_types(mut self, coerce: bool) -> Self {
        self.coerce_types = coerce;
        self
    }

    pub fn with_remove_additional(mut self, mode: RemoveAdditional) -> Self {
        self.remove_additional = mode;
        self
    }

    /// Register a custom `format` keyword value
    pub fn with_format<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.formats.push((name.into(), Arc::new(check)));
        self
    }

    fn all_formats(&self) -> Vec<(String, FormatCheck)> {
        let bigint: FormatCheck = Arc::new(|s: &str| BIGINT_FORMAT.is_match(s));
        let objectid: FormatCheck = Arc::new(|s: &str| OBJECT_ID_FORMAT.is_match(s));
        let mut formats = vec![
            ("bigint".to_string(), bigint),
            ("objectid".to_string(), objectid),
        ];
        formats.extend(self.formats.iter().cloned());
        formats
    }
}

/// One constraint violation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Dotted path to the offending field; empty for the root value
    pub field: String,
    pub message: String,
    pub value: Value,
}

/// Result of [`SchemaValidator::validate`]
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Option<Vec<FieldError>>,
    /// The value after coercion and property removal
    pub data: RichValue,
}

/// Compiles schemas once and validates parameter values against them
pub struct SchemaValidator {
    config: ValidatorConfig,
    cache: Mutex<HashMap<String, Arc<jsonschema::Validator>>>,
}

impl SchemaValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Compile `schema`, reusing a cached compilation of an identical schema
    pub fn compile(&self, schema: &Value) -> Result<Arc<jsonschema::Validator>, SchemaError> {
        if !schema.is_object() && !schema.is_boolean() {
            return Err(SchemaError::NotASchema);
        }

        let key = schema.to_string();
        if let Some(compiled) = self.cache.lock().get(&key) {
            return Ok(compiled.clone());
        }

        let mut options = jsonschema::options();
        options.should_validate_formats(true);
        for (name, check) in self.config.all_formats() {
            options.with_format(name, move |s: &str| check(s));
        }
        let compiled = Arc::new(
            options
                .build(schema)
                .map_err(|e| SchemaError::Compile(e.to_string()))?,
        );

        let mut cache = self.cache.lock();
        cache.insert(key, compiled.clone());
        debug!("Compiled schema ({} cached)", cache.len());
        Ok(compiled)
    }

    pub fn validate(&self, value: &RichValue, schema: &Value) -> Result<ValidationOutcome, SchemaError> {
        let compiled = self.compile(schema)?;

        let mut data = value.clone();
        normalize(&mut data, schema, &self.config);

        let plain = data.to_plain_json();
        let errors: Vec<FieldError> = compiled
            .iter_errors(&plain)
            .map(|error| {
                let mut field = pointer_to_field(&error.instance_path.to_string());
                if let ValidationErrorKind::Required { property } = &error.kind
                    && let Some(name) = property.as_str()
                {
                    if !field.is_empty() {
                        field.push('.');
                    }
                    field.push_str(name);
                }
                FieldError {
                    field,
                    message: error.to_string(),
                    value: error.instance.clone().into_owned(),
                }
            })
            .collect();

        Ok(ValidationOutcome {
            valid: errors.is_empty(),
            errors: if errors.is_empty() { None } else { Some(errors) },
            data,
        })
    }

    pub fn cached_schemas(&self) -> usize {
        self.cache.lock().len()
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

fn pointer_to_field(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

fn schema_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn matches_type(value: &RichValue, ty: &str) -> bool {
    match (ty, value) {
        ("null", RichValue::Null) => true,
        ("boolean", RichValue::Bool(_)) => true,
        ("number", RichValue::Number(_)) => true,
        ("integer", RichValue::Number(n)) => is_integral(n),
        ("string", RichValue::String(_) | RichValue::BigInt(_) | RichValue::Date(_)) => true,
        ("array", RichValue::Array(_)) => true,
        ("object", RichValue::Object(_)) => true,
        _ => false,
    }
}

fn is_integral(n: &Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    let f = s.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(Number::from(f as i64))
    } else {
        Number::from_f64(f)
    }
}

/// Convert a scalar toward `ty`, if a lossless-enough conversion exists
fn coerce_scalar(value: &RichValue, ty: &str) -> Option<RichValue> {
    match (ty, value) {
        ("string", RichValue::Number(n)) => Some(RichValue::String(n.to_string())),
        ("string", RichValue::Bool(b)) => Some(RichValue::String(b.to_string())),
        ("string", RichValue::Null) => Some(RichValue::String(String::new())),

        ("number", RichValue::String(s)) => parse_number(s).map(RichValue::Number),
        ("integer", RichValue::String(s)) => parse_number(s)
            .filter(is_integral)
            .map(RichValue::Number),
        ("number" | "integer", RichValue::Bool(b)) => Some(RichValue::from(i64::from(*b))),
        ("number" | "integer", RichValue::Null) => Some(RichValue::from(0i64)),

        ("boolean", RichValue::String(s)) => match s.as_str() {
            "true" => Some(RichValue::Bool(true)),
            "false" => Some(RichValue::Bool(false)),
            _ => None,
        },
        ("boolean", RichValue::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(RichValue::Bool(true)),
            Some(f) if f == 0.0 => Some(RichValue::Bool(false)),
            _ => None,
        },
        ("boolean", RichValue::Null) => Some(RichValue::Bool(false)),

        ("null", RichValue::String(s)) if s.is_empty() => Some(RichValue::Null),
        ("null", RichValue::Number(n)) if n.as_f64() == Some(0.0) => Some(RichValue::Null),
        ("null", RichValue::Bool(false)) => Some(RichValue::Null),
        _ => None,
    }
}

fn normalize(value: &mut RichValue, schema: &Value, config: &ValidatorConfig) {
    if !schema.is_object() {
        return;
    }

    if config.coerce_types {
        let types = schema_types(schema);
        if !types.is_empty()
            && !types.iter().any(|ty| matches_type(value, ty))
            && let Some(coerced) = types.iter().find_map(|ty| coerce_scalar(value, ty))
        {
            *value = coerced;
        }
    }

    match value {
        RichValue::Object(map) => {
            let properties = schema.get("properties").and_then(Value::as_object);
            if let Some(properties) = properties {
                for (key, sub_schema) in properties {
                    if let Some(child) = map.get_mut(key) {
                        normalize(child, sub_schema, config);
                    }
                }
            }

            let patterns: Vec<(Regex, &Value)> = schema
                .get("patternProperties")
                .and_then(Value::as_object)
                .map(|p| {
                    p.iter()
                        .filter_map(|(pattern, s)| Regex::new(pattern).ok().map(|re| (re, s)))
                        .collect()
                })
                .unwrap_or_default();
            let is_additional = |key: &str| {
                !properties.is_some_and(|p| p.contains_key(key))
                    && !patterns.iter().any(|(re, _)| re.is_match(key))
            };

            let additional = schema.get("additionalProperties");
            let strip = match config.remove_additional {
                RemoveAdditional::Never => false,
                RemoveAdditional::Restricted => additional == Some(&Value::Bool(false)),
                RemoveAdditional::All => properties.is_some() || !patterns.is_empty(),
            };
            if strip {
                map.retain(|key, _| !is_additional(key.as_str()));
            }

            for (key, child) in map.iter_mut() {
                if let Some((_, sub_schema)) = patterns.iter().find(|(re, _)| re.is_match(key)) {
                    normalize(child, sub_schema, config);
                } else if is_additional(key.as_str())
                    && let Some(sub_schema @ Value::Object(_)) = additional
                {
                    normalize(child, sub_schema, config);
                }
            }
        }
        RichValue::Array(items) => match schema.get("items") {
            Some(item_schema @ Value::Object(_)) => {
                for item in items.iter_mut() {
                    normalize(item, item_schema, config);
                }
            }
            Some(Value::Array(tuple)) => {
                for (item, item_schema) in items.iter_mut().zip(tuple) {
                    normalize(item, item_schema, config);
                }
            }
            _ => {}
        },
        _ => {}
    }
}
