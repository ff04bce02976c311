use crate::accessor::DatasetAccessor;
use crate::axis::axis_name_for_variable;
use crate::cf::AxisRole;
use crate::config::{ConversionConfig, DescriptorOverride, VectorOverride};
use crate::error::{GridMetaError, Result};
use crate::metadata::{AttributeMap, attr_str};
use crate::prompt::PromptProvider;
use crate::schema::{DataVar, VectorVar};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Resolved descriptive metadata for one variable or vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptors {
    pub name: String,
    pub units: String,
    pub long_name: String,
    pub standard_name: String,
    pub description: String,
}

impl Descriptors {
    /// Merge the three sources of descriptive metadata.
    ///
    /// Each field is taken from `overrides` if set, else from `attributes`,
    /// else asked for. With `review` set, attribute values are only offered as
    /// the prompt default. The name has no attribute source and defaults to
    /// `default_name`.
    pub fn resolve(
        label: &str,
        default_name: &str,
        overrides: &DescriptorOverride,
        attributes: &AttributeMap,
        review: bool,
        prompts: &mut dyn PromptProvider,
    ) -> Result<Self> {
        let name = match &overrides.name {
            Some(name) => name.clone(),
            None => prompts.ask_text(
                default_name,
                &format!("Want to rename {}? (leave as is to keep original):", label),
            )?,
        };

        let mut field = |value: &Option<String>, key: &str, question: String| -> Result<String> {
            if let Some(value) = value {
                return Ok(value.clone());
            }
            match attr_str(attributes, key) {
                Some(existing) if !review => Ok(existing.to_string()),
                existing => prompts.ask_text(existing.unwrap_or_default(), &question),
            }
        };

        let units = field(&overrides.units, "units", format!("Units for {}:", label))?;
        let long_name = field(&overrides.long_name, "long_name", format!("Long name for {}:", label))?;
        let standard_name = field(
            &overrides.standard_name,
            "standard_name",
            format!("Standard name for {}:", label),
        )?;
        let description = field(
            &overrides.description,
            "description",
            format!("Description for {}:", label),
        )?;

        Ok(Self {
            name,
            units,
            long_name,
            standard_name,
            description,
        })
    }
}

/// Classified variables keyed by their output names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub datavars: BTreeMap<String, DataVar>,
    pub vectors: BTreeMap<String, VectorVar>,
}

fn non_empty(name: String) -> Option<String> {
    (!name.is_empty()).then_some(name)
}

fn classify_datavar(
    accessor: &dyn DatasetAccessor,
    source: &str,
    config: &ConversionConfig,
    prompts: &mut dyn PromptProvider,
) -> Result<DataVar> {
    let descriptors = Descriptors::resolve(
        source,
        source,
        config.datavars.get(source).unwrap_or(&DescriptorOverride::default()),
        accessor.attributes(source)?,
        config.review,
        prompts,
    )?;

    Ok(DataVar {
        name: descriptors.name,
        source_name: source.to_string(),
        units: descriptors.units,
        long_name: descriptors.long_name,
        standard_name: descriptors.standard_name,
        description: descriptors.description,
        level: axis_name_for_variable(accessor, source, AxisRole::Vertical)?,
        lon: non_empty(axis_name_for_variable(accessor, source, AxisRole::Longitude)?),
        lat: non_empty(axis_name_for_variable(accessor, source, AxisRole::Latitude)?),
        time: non_empty(axis_name_for_variable(accessor, source, AxisRole::Time)?),
    })
}

/// Check both components sit on the same vertical and time axes; returns the
/// shared vertical axis name.
fn check_pairing(accessor: &dyn DatasetAccessor, u: &str, v: &str) -> Result<String> {
    let mut level = String::new();
    for (role, axis) in [(AxisRole::Vertical, "vertical"), (AxisRole::Time, "time")] {
        let u_axis = axis_name_for_variable(accessor, u, role)?;
        let v_axis = axis_name_for_variable(accessor, v, role)?;
        if u_axis != v_axis {
            return Err(GridMetaError::PairingMismatch {
                u: u.to_string(),
                v: v.to_string(),
                axis,
                u_axis,
                v_axis,
            });
        }
        if role == AxisRole::Vertical {
            level = u_axis;
        }
    }
    Ok(level)
}

/// Declared vector pairs, from the answers file or the checklist. The
/// checklist is consumed two entries at a time; a trailing odd entry is dropped.
fn declared_pairs(
    retained: &[String],
    config: &ConversionConfig,
    prompts: &mut dyn PromptProvider,
) -> Result<Vec<VectorOverride>> {
    if let Some(vectors) = &config.vectors {
        return Ok(vectors.clone());
    }

    let picked = prompts.ask_checklist("Select variables to group as vectors (pairs):", retained)?;
    if picked.len() % 2 == 1 {
        if let Some(last) = picked.last() {
            warn!(variable = %last, "ignoring unpaired vector component");
        }
    }

    Ok(picked
        .chunks_exact(2)
        .map(|pair| VectorOverride::pair(&pair[0], &pair[1]))
        .collect())
}

fn classify_vector(
    accessor: &dyn DatasetAccessor,
    declared: &VectorOverride,
    config: &ConversionConfig,
    prompts: &mut dyn PromptProvider,
) -> Result<VectorVar> {
    let (u, v) = (declared.u.as_str(), declared.v.as_str());
    let level = check_pairing(accessor, u, v)?;

    let descriptors = Descriptors::resolve(
        &format!("({}, {})", u, v),
        &format!("{}_{}", u, v),
        &declared.descriptors(),
        accessor.attributes(u)?,
        config.review,
        prompts,
    )?;

    Ok(VectorVar {
        name: descriptors.name,
        uname: u.to_string(),
        vname: v.to_string(),
        units: descriptors.units,
        long_name: descriptors.long_name,
        standard_name: descriptors.standard_name,
        description: descriptors.description,
        level,
    })
}

/// Build the data variables for `retained` and the vectors declared over them.
pub fn classify(
    accessor: &dyn DatasetAccessor,
    retained: &[String],
    config: &ConversionConfig,
    prompts: &mut dyn PromptProvider,
) -> Result<Classification> {
    let mut classification = Classification::default();

    for source in retained {
        let datavar = classify_datavar(accessor, source, config, prompts)?;
        debug!(source = %source, name = %datavar.name, level = %datavar.level, "classified data variable");
        if classification.datavars.contains_key(&datavar.name) {
            return Err(GridMetaError::schema(format!(
                "two data variables would both be named '{}'",
                datavar.name
            )));
        }
        classification.datavars.insert(datavar.name.clone(), datavar);
    }

    for declared in declared_pairs(retained, config, prompts)? {
        for component in [&declared.u, &declared.v] {
            if !retained.contains(component) {
                return Err(GridMetaError::Config(format!(
                    "vector component '{}' is not a retained data variable",
                    component
                )));
            }
        }

        let vector = classify_vector(accessor, &declared, config, prompts)?;
        debug!(name = %vector.name, u = %vector.uname, v = %vector.vname, "classified vector");
        if classification.vectors.contains_key(&vector.name) {
            return Err(GridMetaError::schema(format!(
                "two vectors would both be named '{}'",
                vector.name
            )));
        }
        classification.vectors.insert(vector.name.clone(), vector);
    }

    Ok(classification)
}
