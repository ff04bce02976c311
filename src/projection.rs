use crate::accessor::DatasetAccessor;
use crate::axis::{self, AxisDescriptor};
use crate::cf::AxisRole;
use crate::error::{GridMetaError, Result};
use crate::grid::UniformGrid;
use crate::metadata::{AttributeMap, attr_str};
use crate::prompt::PromptProvider;
use crate::schema::{ConicConformal, Equirectangular, LonLat, Mercator, ProjectionSpec, Stereographic};
use tracing::{debug, info};

pub const TRUELAT1: &str = "TRUELAT1";
pub const TRUELAT2: &str = "TRUELAT2";
pub const CEN_LAT: &str = "CEN_LAT";
pub const CEN_LON: &str = "CEN_LON";
pub const STAND_LON: &str = "STAND_LON";
pub const POLE_LAT: &str = "POLE_LAT";
pub const POLE_LON: &str = "POLE_LON";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionFamily {
    LonLat,
    Mercator,
    Stereographic,
    Equirectangular,
    ConicConformal,
}

impl ProjectionFamily {
    pub fn name(self) -> &'static str {
        match self {
            ProjectionFamily::LonLat => "LonLat",
            ProjectionFamily::Mercator => "Mercator",
            ProjectionFamily::Stereographic => "Stereographic",
            ProjectionFamily::Equirectangular => "Equirectangular",
            ProjectionFamily::ConicConformal => "ConicConformal",
        }
    }

    /// Match a family name, ignoring case, spaces, `_` and `-`. WRF's
    /// `MAP_PROJ_CHAR` spellings are accepted too.
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "lonlat" | "latlon" | "regular" => Some(ProjectionFamily::LonLat),
            "mercator" => Some(ProjectionFamily::Mercator),
            "stereographic" | "polarstereographic" => Some(ProjectionFamily::Stereographic),
            "equirectangular" | "cylindricalequidistant" | "rotatedpole" => {
                Some(ProjectionFamily::Equirectangular)
            }
            "conicconformal" | "lambertconformal" | "lambertconformalconic" | "lambert" => {
                Some(ProjectionFamily::ConicConformal)
            }
            _ => None,
        }
    }

    /// WRF `MAP_PROJ` codes.
    pub fn from_legacy_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ProjectionFamily::ConicConformal),
            2 => Some(ProjectionFamily::Stereographic),
            3 => Some(ProjectionFamily::Mercator),
            6 => Some(ProjectionFamily::Equirectangular),
            _ => None,
        }
    }
}

/// Outcome of looking for a projection family in global attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyLookup {
    Resolved(ProjectionFamily),
    /// Something was declared but matches no family; carries what was tried.
    Unrecognized(String),
    Absent,
}

pub fn identify_family(attributes: &AttributeMap) -> FamilyLookup {
    let declared = attr_str(attributes, "projection").or_else(|| attr_str(attributes, "MAP_PROJ_CHAR"));

    if let Some(family) = declared.and_then(ProjectionFamily::from_name) {
        return FamilyLookup::Resolved(family);
    }

    let code = attributes.get("MAP_PROJ").and_then(|v| v.as_i64());
    if let Some(family) = code.and_then(ProjectionFamily::from_legacy_code) {
        return FamilyLookup::Resolved(family);
    }

    match (declared, code) {
        (Some(name), _) => FamilyLookup::Unrecognized(name.to_string()),
        (None, Some(code)) => FamilyLookup::Unrecognized(format!("MAP_PROJ={}", code)),
        (None, None) => FamilyLookup::Absent,
    }
}

fn require(attributes: &AttributeMap, family: ProjectionFamily, key: &'static str) -> Result<f64> {
    attributes
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or(GridMetaError::MissingAttribute {
            family: family.name(),
            attribute: key,
        })
}

fn optional(attributes: &AttributeMap, key: &str) -> Option<f64> {
    attributes.get(key).and_then(|v| v.as_f64())
}

/// Build the LonLat variant from the two regular axes.
pub fn lonlat_from_grids(lon: &UniformGrid, lat: &UniformGrid) -> ProjectionSpec {
    ProjectionSpec::LonLat(LonLat {
        start_lon: lon.origin,
        start_lat: lat.origin,
        dlon: lon.step,
        dlat: lat.step,
    })
}

/// Extract the parameters of a non-LonLat `family`. Corner bounds come from
/// the resolved axes; the first missing required attribute fails the call.
pub fn extract(
    family: ProjectionFamily,
    attributes: &AttributeMap,
    lon: &AxisDescriptor,
    lat: &AxisDescriptor,
) -> Result<ProjectionSpec> {
    let (start_lon, end_lon, start_lat, end_lat) = (lon.start, lon.end, lat.start, lat.end);

    let spec = match family {
        ProjectionFamily::LonLat => {
            return Err(GridMetaError::UnsupportedProjection {
                name: "LonLat without regular axes".to_string(),
            });
        }
        ProjectionFamily::Mercator => ProjectionSpec::Mercator(Mercator {
            cen_lon: optional(attributes, CEN_LON).unwrap_or((start_lon + end_lon) / 2.0),
            cen_lat: optional(attributes, CEN_LAT).unwrap_or((start_lat + end_lat) / 2.0),
            start_lon,
            end_lon,
            start_lat,
            end_lat,
        }),
        ProjectionFamily::Stereographic => ProjectionSpec::Stereographic(Stereographic {
            cen_lat: require(attributes, family, CEN_LAT)?,
            cen_lon: require(attributes, family, CEN_LON)?,
            stand_lon: require(attributes, family, STAND_LON)?,
            start_lon,
            end_lon,
            start_lat,
            end_lat,
        }),
        ProjectionFamily::Equirectangular => ProjectionSpec::Equirectangular(Equirectangular {
            cen_lat: require(attributes, family, CEN_LAT)?,
            cen_lon: require(attributes, family, CEN_LON)?,
            pole_lat: require(attributes, family, POLE_LAT)?,
            pole_lon: require(attributes, family, POLE_LON)?,
            start_lon,
            end_lon,
            start_lat,
            end_lat,
        }),
        ProjectionFamily::ConicConformal => ProjectionSpec::ConicConformal(ConicConformal {
            true_lat1: require(attributes, family, TRUELAT1)?,
            true_lat2: require(attributes, family, TRUELAT2)?,
            cen_lat: require(attributes, family, CEN_LAT)?,
            cen_lon: require(attributes, family, CEN_LON)?,
            stand_lon: require(attributes, family, STAND_LON)?,
            start_lon,
            end_lon,
            start_lat,
            end_lat,
        }),
    };

    Ok(spec)
}

fn regular_grid(accessor: &dyn DatasetAccessor, role: AxisRole) -> Result<UniformGrid> {
    let axis = axis::single_axis(accessor, role)?;
    let grid = UniformGrid::from_coordinate(&accessor.coordinate(&axis.name)?)?;
    debug!(role = %role, origin = grid.origin, step = grid.step, count = grid.count, "uniform grid");
    Ok(grid)
}

/// Resolve the dataset's projection.
///
/// `lonlat_answer` pre-answers the regular-grid confirmation; when it is
/// `None` and no projection is declared the user is asked.
pub fn resolve(
    accessor: &dyn DatasetAccessor,
    prompts: &mut dyn PromptProvider,
    lonlat_answer: Option<bool>,
) -> Result<ProjectionSpec> {
    let attributes = accessor.global_attributes();

    let family = match identify_family(attributes) {
        FamilyLookup::Resolved(family) => family,
        FamilyLookup::Unrecognized(name) => return Err(GridMetaError::UnsupportedProjection { name }),
        FamilyLookup::Absent => {
            let confirmed = match lonlat_answer {
                Some(answer) => answer,
                None => prompts.ask_confirm(
                    "No projection attributes found. Is this a regular longitude/latitude grid?",
                )?,
            };
            if !confirmed {
                return Err(GridMetaError::UnsupportedProjection {
                    name: "unspecified".to_string(),
                });
            }
            ProjectionFamily::LonLat
        }
    };

    info!(family = family.name(), "projection family resolved");

    if family == ProjectionFamily::LonLat {
        let lon = regular_grid(accessor, AxisRole::Longitude)?;
        let lat = regular_grid(accessor, AxisRole::Latitude)?;
        return Ok(lonlat_from_grids(&lon, &lat));
    }

    let lon = axis::single_axis(accessor, AxisRole::Longitude)?;
    let lat = axis::single_axis(accessor, AxisRole::Latitude)?;
    extract(family, attributes, &lon, &lat)
}
