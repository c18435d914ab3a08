//! Option schemas: defaults plus declared types, checked before any I/O.
//!
//! A schema is declared with type signatures such as `"Boolean|Number"`,
//! which parse into a [`TypeSpec`] union of [`OptionType`] tags. Formats
//! layer their own schema over the base one with [`OptionSchema::extend`].
//!
//! ```
//! use folio::options::OptionSchema;
//! use serde_json::json;
//!
//! let schema = OptionSchema::new()
//!     .field("overwrite", "Boolean", json!(false))
//!     .field("unzip_path", "String|Null", json!(null));
//!
//! let options = schema.validate(json!({ "overwrite": true }).as_object()).unwrap();
//! assert!(options.bool("overwrite"));
//! assert!(options.str("unzip_path").is_none());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One declared option type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Boolean,
    Number,
    String,
    Array,
    Object,
    Null,
}

impl OptionType {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            OptionType::Boolean => value.is_boolean(),
            OptionType::Number => value.is_number(),
            OptionType::String => value.is_string(),
            OptionType::Array => value.is_array(),
            OptionType::Object => value.is_object(),
            OptionType::Null => value.is_null(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            OptionType::Boolean => "Boolean",
            OptionType::Number => "Number",
            OptionType::String => "String",
            OptionType::Array => "Array",
            OptionType::Object => "Object",
            OptionType::Null => "Null",
        }
    }
}

impl FromStr for OptionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Boolean" => Ok(OptionType::Boolean),
            "Number" => Ok(OptionType::Number),
            "String" => Ok(OptionType::String),
            "Array" => Ok(OptionType::Array),
            "Object" => Ok(OptionType::Object),
            "Null" => Ok(OptionType::Null),
            other => Err(Error::InvalidArgument(format!("unknown option type `{other}`"))),
        }
    }
}

/// A union of accepted types, e.g. `String|Null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec(Vec<OptionType>);

impl TypeSpec {
    pub fn accepts(&self, value: &Value) -> bool {
        self.0.iter().any(|t| t.accepts(value))
    }
}

impl From<OptionType> for TypeSpec {
    fn from(t: OptionType) -> Self {
        TypeSpec(vec![t])
    }
}

impl FromStr for TypeSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let types = s
            .split('|')
            .map(OptionType::from_str)
            .collect::<Result<Vec<_>>>()?;
        Ok(TypeSpec(types))
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(t.name())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct FieldSpec {
    types: TypeSpec,
    default: Value,
}

/// Declared defaults and types for one option set.
#[derive(Debug, Clone, Default)]
pub struct OptionSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl OptionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field from a type signature string.
    ///
    /// # Panics
    ///
    /// Panics if `signature` names an unknown type; schemas are static
    /// declarations, so this is a programming error.
    pub fn field(self, name: &str, signature: &str, default: Value) -> Self {
        let types = signature
            .parse::<TypeSpec>()
            .unwrap_or_else(|e| panic!("bad signature for option `{name}`: {e}"));
        self.typed_field(name, types, default)
    }

    /// Declare a field with an already-built [`TypeSpec`].
    pub fn typed_field(mut self, name: &str, types: impl Into<TypeSpec>, default: Value) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldSpec {
                types: types.into(),
                default,
            },
        );
        self
    }

    /// Layer `other` over `self`. Fields declared by both take `other`'s
    /// declaration; base-only fields are kept.
    pub fn extend(mut self, other: &OptionSchema) -> Self {
        for (name, spec) in &other.fields {
            self.fields.insert(name.clone(), spec.clone());
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Merge `supplied` over the defaults, type-checking every declared field.
    pub fn validate(&self, supplied: Option<&Map<String, Value>>) -> Result<Options> {
        let mut values = Map::new();
        for (name, spec) in &self.fields {
            values.insert(name.clone(), spec.default.clone());
        }

        if let Some(supplied) = supplied {
            for (name, value) in supplied {
                match self.fields.get(name) {
                    Some(spec) if !spec.types.accepts(value) => {
                        return Err(Error::invalid_option(name, &spec.types, value));
                    }
                    Some(_) => {}
                    None => tracing::debug!(option = %name, "keeping undeclared option"),
                }
                values.insert(name.clone(), value.clone());
            }
        }

        Ok(Options { values })
    }
}

/// Effective, validated options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    values: Map<String, Value>,
}

impl Options {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn bool(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    pub fn array(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_array).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}
