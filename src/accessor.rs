use crate::cf::{self, AxisRole};
use crate::error::{GridMetaError, Result};
use crate::metadata::{AttributeMap, AttributeValue, attr_str};
use std::collections::BTreeMap;

/// A coordinate variable with its values loaded, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub name: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
    pub attributes: AttributeMap,
}

impl Coordinate {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn first(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn units(&self) -> Option<&str> {
        attr_str(&self.attributes, "units")
    }
}

/// Capability the inference core needs from a dataset container.
///
/// "Variables" covers both coordinates and data variables; the two name lists
/// partition them.
pub trait DatasetAccessor {
    /// Names of all coordinate variables.
    fn coordinate_names(&self) -> Vec<String>;

    /// Names of all data variables, in a stable order.
    fn data_variable_names(&self) -> Vec<String>;

    fn dimensions(&self, name: &str) -> Result<Vec<String>>;

    fn shape(&self, name: &str) -> Result<Vec<usize>>;

    fn attributes(&self, name: &str) -> Result<&AttributeMap>;

    /// Flattened values of a variable, row-major.
    fn values(&self, name: &str) -> Result<Vec<f64>>;

    fn global_attributes(&self) -> &AttributeMap;

    /// Coordinates playing `role` under CF conventions, sorted by name.
    fn coordinates_for_role(&self, role: AxisRole) -> Vec<String> {
        let mut names: Vec<String> = self
            .coordinate_names()
            .into_iter()
            .filter(|name| {
                self.attributes(name)
                    .is_ok_and(|attrs| cf::coordinate_role(name, attrs) == Some(role))
            })
            .collect();
        names.sort();
        names
    }

    /// Load a coordinate with its values.
    fn coordinate(&self, name: &str) -> Result<Coordinate> {
        let shape = self.shape(name)?;
        let values = self.values(name)?;
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(GridMetaError::accessor(format!(
                "'{}' has {} values but shape {:?}",
                name,
                values.len(),
                shape
            )));
        }

        Ok(Coordinate {
            name: name.to_string(),
            dimensions: self.dimensions(name)?,
            shape,
            values,
            attributes: self.attributes(name)?.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryVariable {
    dimensions: Vec<String>,
    shape: Vec<usize>,
    values: Vec<f64>,
    attributes: AttributeMap,
    is_coordinate: bool,
}

/// In-memory dataset, mostly useful for tests and for callers that already
/// hold their arrays.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    variables: BTreeMap<String, MemoryVariable>,
    global_attributes: AttributeMap,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global_attribute(
        mut self,
        key: &str,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.global_attributes.insert(key.to_string(), value.into());
        self
    }

    /// Add a coordinate. `shape` must multiply out to `values.len()`.
    pub fn with_coordinate(
        mut self,
        name: &str,
        dimensions: &[&str],
        shape: &[usize],
        values: Vec<f64>,
        attributes: &[(&str, AttributeValue)],
    ) -> Self {
        self.variables.insert(
            name.to_string(),
            MemoryVariable {
                dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
                shape: shape.to_vec(),
                values,
                attributes: to_map(attributes),
                is_coordinate: true,
            },
        );
        self
    }

    /// Convenience for the common 1-D coordinate named after its dimension.
    pub fn with_axis(self, name: &str, values: Vec<f64>, attributes: &[(&str, AttributeValue)]) -> Self {
        let len = values.len();
        self.with_coordinate(name, &[name], &[len], values, attributes)
    }

    /// Add a data variable. Values are never read by the inference core so
    /// only dimensions and attributes are kept.
    pub fn with_data_variable(
        mut self,
        name: &str,
        dimensions: &[&str],
        attributes: &[(&str, AttributeValue)],
    ) -> Self {
        self.variables.insert(
            name.to_string(),
            MemoryVariable {
                dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
                attributes: to_map(attributes),
                ..MemoryVariable::default()
            },
        );
        self
    }

    fn variable(&self, name: &str) -> Result<&MemoryVariable> {
        self.variables
            .get(name)
            .ok_or_else(|| GridMetaError::accessor(format!("variable '{}' not found", name)))
    }
}

fn to_map(attributes: &[(&str, AttributeValue)]) -> AttributeMap {
    attributes
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

impl DatasetAccessor for MemoryDataset {
    fn coordinate_names(&self) -> Vec<String> {
        self.variables
            .iter()
            .filter(|(_, v)| v.is_coordinate)
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn data_variable_names(&self) -> Vec<String> {
        self.variables
            .iter()
            .filter(|(_, v)| !v.is_coordinate)
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn dimensions(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.variable(name)?.dimensions.clone())
    }

    fn shape(&self, name: &str) -> Result<Vec<usize>> {
        Ok(self.variable(name)?.shape.clone())
    }

    fn attributes(&self, name: &str) -> Result<&AttributeMap> {
        Ok(&self.variable(name)?.attributes)
    }

    fn values(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self.variable(name)?.values.clone())
    }

    fn global_attributes(&self) -> &AttributeMap {
        &self.global_attributes
    }
}
