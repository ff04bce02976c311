use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Attribute mapping attached to a variable or to the dataset root.
pub type AttributeMap = HashMap<String, AttributeValue>;

/// Represents an attribute value in Zarr metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Array(Vec<AttributeValue>),
    Object(HashMap<String, AttributeValue>),
    Null,
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view of the value. Single-element arrays and numeric strings are
    /// accepted since model output often stores scalars that way.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(v) => Some(*v),
            AttributeValue::Integer(v) => Some(*v as f64),
            AttributeValue::String(s) => s.trim().parse().ok(),
            AttributeValue::Array(items) if items.len() == 1 => items[0].as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(v) => Some(*v),
            AttributeValue::Number(v) if v.fract() == 0.0 => Some(*v as i64),
            AttributeValue::String(s) => s.trim().parse().ok(),
            AttributeValue::Array(items) if items.len() == 1 => items[0].as_i64(),
            _ => None,
        }
    }

    /// Strings of an array attribute, skipping non-string entries.
    pub fn string_items(&self) -> Vec<String> {
        match self {
            AttributeValue::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

/// Looks up a string attribute; empty strings count as absent.
pub fn attr_str<'a>(attributes: &'a AttributeMap, key: &str) -> Option<&'a str> {
    attributes
        .get(key)
        .and_then(AttributeValue::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Represents a Zarr array with its resolved dimension names
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub path: String,
    pub dtype: String,
    pub shape: Vec<u64>,
    pub chunks: Vec<u64>,
    pub compressor: Option<String>,
    pub order: String,
    pub dimension_separator: String,
    pub attributes: AttributeMap,
    pub dimensions: Vec<String>,
}

impl Variable {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Names listed in the CF `coordinates` attribute.
    pub fn coordinates_attr(&self) -> Vec<String> {
        attr_str(&self.attributes, "coordinates")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Root metadata structure for a Zarr store
#[derive(Debug, Default)]
pub struct ZarrMetadata {
    pub global_attributes: AttributeMap,
    pub variables: BTreeMap<String, Variable>,
    pub consolidated: bool,
}

impl ZarrMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve dimension names of every variable from `_ARRAY_DIMENSIONS`
    pub fn resolve_dimensions(&mut self) {
        for variable in self.variables.values_mut() {
            variable.dimensions = Self::extract_dimension_names(variable);
        }
    }

    /// Extract dimension names from _ARRAY_DIMENSIONS attribute or generate defaults
    pub fn extract_dimension_names(variable: &Variable) -> Vec<String> {
        let named = variable
            .attributes
            .get("_ARRAY_DIMENSIONS")
            .or_else(|| variable.attributes.get("dimension_names"))
            .map(AttributeValue::string_items)
            .unwrap_or_default();

        if named.len() == variable.shape.len() {
            named
        } else {
            (0..variable.shape.len())
                .map(|i| format!("dim_{}", i))
                .collect()
        }
    }
}

/// Raw Zarr array metadata from .zarray file
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct ZArrayMetadata {
    pub zarr_format: u8,
    pub shape: Vec<u64>,
    pub chunks: Vec<u64>,
    pub dtype: String,
    pub compressor: Option<serde_json::Value>,
    pub fill_value: Option<serde_json::Value>,
    pub order: String,
    pub filters: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub dimension_separator: Option<String>,
}

/// Consolidated metadata from .zmetadata file
#[derive(Debug, Serialize, Deserialize)]
pub struct ConsolidatedMetadata {
    pub zarr_consolidated_format: u8,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}
