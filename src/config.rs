use crate::error::{GridMetaError, Result};
use crate::schema::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Descriptive fields for one variable. `None` means "not answered here".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A declared vector pair with optional descriptive fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorOverride {
    pub u: String,
    pub v: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VectorOverride {
    pub fn pair(u: impl Into<String>, v: impl Into<String>) -> Self {
        Self {
            u: u.into(),
            v: v.into(),
            name: None,
            units: None,
            long_name: None,
            standard_name: None,
            description: None,
        }
    }

    pub fn descriptors(&self) -> DescriptorOverride {
        DescriptorOverride {
            name: self.name.clone(),
            units: self.units.clone(),
            long_name: self.long_name.clone(),
            standard_name: self.standard_name.clone(),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversionConfig {
    /// Data variables to drop. Replaces the skip checklist when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<Vec<String>>,

    /// Overrides keyed by source variable name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub datavars: BTreeMap<String, DescriptorOverride>,

    /// Vector pairs. Replaces the vector checklist when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors: Option<Vec<VectorOverride>>,

    /// Answer to the regular lon/lat grid confirmation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lonlat: Option<bool>,

    /// Ask about every descriptive field even when the dataset already has it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub review: bool,
}

impl ConversionConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| GridMetaError::Config(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| GridMetaError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| GridMetaError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GridMetaError::Config(e.to_string()))
    }

    /// Answers that reproduce `dataset` without asking anything.
    /// `all_data_vars` is every data variable the dataset offered before skipping.
    pub fn from_dataset(dataset: &Dataset, all_data_vars: &[String]) -> Self {
        let kept: Vec<&str> = dataset
            .datavars()
            .values()
            .map(|d| d.source_name.as_str())
            .collect();

        let skip = all_data_vars
            .iter()
            .filter(|name| !kept.contains(&name.as_str()))
            .cloned()
            .collect();

        let datavars = dataset
            .datavars()
            .values()
            .map(|d| {
                (
                    d.source_name.clone(),
                    DescriptorOverride {
                        name: Some(d.name.clone()),
                        units: Some(d.units.clone()),
                        long_name: Some(d.long_name.clone()),
                        standard_name: Some(d.standard_name.clone()),
                        description: Some(d.description.clone()),
                    },
                )
            })
            .collect();

        let vectors = dataset
            .vectors()
            .values()
            .map(|v| VectorOverride {
                u: v.uname.clone(),
                v: v.vname.clone(),
                name: Some(v.name.clone()),
                units: Some(v.units.clone()),
                long_name: Some(v.long_name.clone()),
                standard_name: Some(v.standard_name.clone()),
                description: Some(v.description.clone()),
            })
            .collect();

        Self {
            skip: Some(skip),
            datavars,
            vectors: Some(vectors),
            lonlat: dataset.islonlat().then_some(true),
            review: false,
        }
    }
}
