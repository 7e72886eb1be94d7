//! Tool schema types
//!
//! A [`ToolSchema`] describes the input shape a tool accepts: an `object`
//! with named, typed properties and a set of required names. Schemas are
//! built once at tool-definition time and never mutated afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Category a tool belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Filesystem,
    Network,
    System,
    Database,
    Text,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Filesystem => "filesystem",
            Category::Network => "network",
            Category::System => "system",
            Category::Database => "database",
            Category::Text => "text",
        };
        f.write_str(s)
    }
}

/// Definition of a single schema property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Type: string|number|integer|boolean|array|object
    #[serde(rename = "type")]
    pub prop_type: String,

    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Closed set of allowed string values
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    /// Default value, informational only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Minimum string length in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum string length in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Regular expression the string value must match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl PropertyDef {
    fn typed(prop_type: &str, description: impl Into<String>) -> Self {
        Self {
            prop_type: prop_type.to_string(),
            description: Some(description.into()),
            enum_values: Vec::new(),
            default: None,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::typed("string", description)
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::typed("number", description)
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::typed("integer", description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::typed("boolean", description)
    }

    pub fn array(description: impl Into<String>) -> Self {
        Self::typed("array", description)
    }

    pub fn object(description: impl Into<String>) -> Self {
        Self::typed("object", description)
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = values.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn with_max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// JSON-schema-like description of a tool's input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Always "object"
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Property definitions by field name
    #[serde(default)]
    pub properties: HashMap<String, PropertyDef>,

    /// Names of required fields
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolSchema {
    /// Start building an object schema
    pub fn builder() -> ToolSchemaBuilder {
        ToolSchemaBuilder::new()
    }

    /// An object schema with no declared properties
    pub fn empty() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: Vec::new(),
        }
    }
}

/// Builder for [`ToolSchema`]
pub struct ToolSchemaBuilder {
    properties: HashMap<String, PropertyDef>,
    required: Vec<String>,
}

impl ToolSchemaBuilder {
    pub fn new() -> Self {
        Self {
            properties: HashMap::new(),
            required: Vec::new(),
        }
    }

    /// Add a property with an explicit definition
    pub fn property(mut self, name: impl Into<String>, def: PropertyDef, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, def);
        self
    }

    /// Add a plain string parameter
    pub fn string_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.property(name, PropertyDef::string(description), required)
    }

    /// Add an integer parameter
    pub fn integer_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.property(name, PropertyDef::integer(description), required)
    }

    /// Add a boolean parameter
    pub fn boolean_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.property(name, PropertyDef::boolean(description), required)
    }

    /// Add a string parameter restricted to a closed value set
    pub fn enum_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        required: bool,
    ) -> Self {
        self.property(name, PropertyDef::string(description).with_enum(values), required)
    }

    pub fn build(self) -> ToolSchema {
        ToolSchema {
            schema_type: "object".to_string(),
            properties: self.properties,
            required: self.required,
        }
    }
}

impl Default for ToolSchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
