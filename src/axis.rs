use crate::accessor::{Coordinate, DatasetAccessor};
use crate::cf::{self, AxisRole};
use crate::error::{GridMetaError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Compact description of a longitude or latitude coordinate.
///
/// For 2-D (curvilinear) coordinates `start`/`end` are the `[0,0]` and
/// `[-1,-1]` corners and `count` is the column count for longitude and the
/// row count for latitude.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisDescriptor {
    pub name: String,
    pub role: AxisRole,
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

impl AxisDescriptor {
    pub fn from_coordinate(coord: &Coordinate, role: AxisRole) -> Result<Self> {
        let (start, end) = match (coord.first(), coord.last()) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(GridMetaError::accessor(format!(
                    "coordinate '{}' has no values",
                    coord.name
                )));
            }
        };

        let count = match coord.rank() {
            1 => coord.shape[0],
            2 if role == AxisRole::Longitude => coord.shape[1],
            2 => coord.shape[0],
            rank => return Err(GridMetaError::dimensionality(&coord.name, rank, "1 or 2")),
        };

        Ok(Self {
            name: coord.name.clone(),
            role,
            start,
            end,
            count,
        })
    }
}

/// Every coordinate playing `role`, keyed by name. No match is an empty map.
pub fn resolve_axes(
    accessor: &dyn DatasetAccessor,
    role: AxisRole,
) -> Result<BTreeMap<String, AxisDescriptor>> {
    let mut axes = BTreeMap::new();
    for name in accessor.coordinates_for_role(role) {
        let coord = accessor.coordinate(&name)?;
        axes.insert(name, AxisDescriptor::from_coordinate(&coord, role)?);
    }
    Ok(axes)
}

/// The one coordinate playing `role`; zero or several is an error.
pub fn single_axis(accessor: &dyn DatasetAccessor, role: AxisRole) -> Result<AxisDescriptor> {
    let mut names = accessor.coordinates_for_role(role);
    match names.len() {
        0 => Err(GridMetaError::NotFound {
            role: role.to_string(),
        }),
        1 => {
            let name = names.remove(0);
            let descriptor = AxisDescriptor::from_coordinate(&accessor.coordinate(&name)?, role)?;
            debug!(role = %role, name = %descriptor.name, count = descriptor.count, "resolved axis");
            Ok(descriptor)
        }
        _ => Err(GridMetaError::Ambiguity {
            role: role.to_string(),
            names,
        }),
    }
}

/// Sample count along `role` (nx for longitude, ny for latitude).
pub fn axis_count(accessor: &dyn DatasetAccessor, role: AxisRole) -> Result<usize> {
    single_axis(accessor, role).map(|axis| axis.count)
}

/// Render a number the way a person would type it: integral values carry no
/// decimal point.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// `"<value> <units>"`, or just the value when there are no units.
pub fn format_level(value: f64, units: Option<&str>) -> String {
    match units {
        Some(units) => format!("{} {}", format_number(value), units.trim()),
        None => format_number(value),
    }
}

fn non_scalar_coordinates(
    accessor: &dyn DatasetAccessor,
    role: AxisRole,
) -> Result<Vec<Coordinate>> {
    let mut coords = Vec::new();
    for name in accessor.coordinates_for_role(role) {
        let coord = accessor.coordinate(&name)?;
        match coord.rank() {
            0 => debug!(name = %name, role = %role, "skipping scalar coordinate"),
            1 => coords.push(coord),
            rank => return Err(GridMetaError::dimensionality(name, rank, "0 or 1")),
        }
    }
    Ok(coords)
}

/// Formatted level labels per vertical coordinate. Scalar coordinates are left out.
pub fn resolve_levels(accessor: &dyn DatasetAccessor) -> Result<BTreeMap<String, Vec<String>>> {
    Ok(non_scalar_coordinates(accessor, AxisRole::Vertical)?
        .into_iter()
        .map(|coord| {
            let units = coord.units();
            let labels = coord.values.iter().map(|&v| format_level(v, units)).collect();
            (coord.name.clone(), labels)
        })
        .collect())
}

/// ISO-8601 timestamps per time coordinate. Scalar coordinates are left out.
pub fn resolve_times(accessor: &dyn DatasetAccessor) -> Result<BTreeMap<String, Vec<String>>> {
    non_scalar_coordinates(accessor, AxisRole::Time)?
        .into_iter()
        .map(|coord| {
            let times = cf::decode_times(&coord.name, &coord.values, &coord.attributes)?;
            Ok((coord.name, times))
        })
        .collect()
}

/// Name of the `role` coordinate attached to `variable`, or `""` if none.
///
/// A non-scalar coordinate is attached when all of its dimensions are
/// dimensions of the variable, or when the variable lists it in its
/// `coordinates` attribute.
pub fn axis_name_for_variable(
    accessor: &dyn DatasetAccessor,
    variable: &str,
    role: AxisRole,
) -> Result<String> {
    let var_dims = accessor.dimensions(variable)?;
    let listed: Vec<String> = accessor
        .attributes(variable)?
        .get("coordinates")
        .and_then(|v| v.as_str())
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    for name in accessor.coordinates_for_role(role) {
        // scalar coordinates never appear in levels or times
        if accessor.shape(&name)?.is_empty() {
            continue;
        }
        if listed.contains(&name) {
            return Ok(name);
        }
        let coord_dims = accessor.dimensions(&name)?;
        if !coord_dims.is_empty() && coord_dims.iter().all(|d| var_dims.contains(d)) {
            return Ok(name);
        }
    }

    Ok(String::new())
}
