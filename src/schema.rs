use crate::error::{GridMetaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One retained scalar field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataVar {
    pub name: String,
    pub source_name: String,
    pub units: String,
    pub long_name: String,
    pub standard_name: String,
    pub description: String,
    /// Vertical coordinate name, empty when the variable has none.
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// Two scalar fields rendered together as one vector field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorVar {
    pub name: String,
    pub uname: String,
    pub vname: String,
    pub units: String,
    pub long_name: String,
    pub standard_name: String,
    pub description: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct LonLat {
    pub start_lon: f64,
    pub start_lat: f64,
    pub dlon: f64,
    pub dlat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Mercator {
    pub cen_lon: f64,
    pub cen_lat: f64,
    pub start_lon: f64,
    pub end_lon: f64,
    pub start_lat: f64,
    pub end_lat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Stereographic {
    pub cen_lon: f64,
    pub cen_lat: f64,
    pub start_lon: f64,
    pub end_lon: f64,
    pub start_lat: f64,
    pub end_lat: f64,
    pub stand_lon: f64,
}

/// Rotated-pole cylindrical grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Equirectangular {
    pub cen_lon: f64,
    pub cen_lat: f64,
    pub start_lon: f64,
    pub end_lon: f64,
    pub start_lat: f64,
    pub end_lat: f64,
    pub pole_lon: f64,
    pub pole_lat: f64,
}

/// Lambert conformal conic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ConicConformal {
    pub cen_lon: f64,
    pub cen_lat: f64,
    pub start_lon: f64,
    pub end_lon: f64,
    pub start_lat: f64,
    pub end_lat: f64,
    pub stand_lon: f64,
    pub true_lat1: f64,
    pub true_lat2: f64,
}

/// Map projection, tagged by `name` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum ProjectionSpec {
    LonLat(LonLat),
    Mercator(Mercator),
    Stereographic(Stereographic),
    Equirectangular(Equirectangular),
    ConicConformal(ConicConformal),
}

impl ProjectionSpec {
    pub fn name(&self) -> &'static str {
        match self {
            ProjectionSpec::LonLat(_) => "LonLat",
            ProjectionSpec::Mercator(_) => "Mercator",
            ProjectionSpec::Stereographic(_) => "Stereographic",
            ProjectionSpec::Equirectangular(_) => "Equirectangular",
            ProjectionSpec::ConicConformal(_) => "ConicConformal",
        }
    }

    pub fn is_lonlat(&self) -> bool {
        matches!(self, ProjectionSpec::LonLat(_))
    }

    /// Check every coordinate field is finite and within range.
    pub fn validate(&self) -> Result<()> {
        match self {
            ProjectionSpec::LonLat(p) => {
                check_lon("startLon", p.start_lon)?;
                check_lat("startLat", p.start_lat)?;
                check_lon("dlon", p.dlon)?;
                check_lat("dlat", p.dlat)
            }
            ProjectionSpec::Mercator(p) => {
                check_center(p.cen_lon, p.cen_lat)?;
                check_bounds(p.start_lon, p.end_lon, p.start_lat, p.end_lat)
            }
            ProjectionSpec::Stereographic(p) => {
                check_center(p.cen_lon, p.cen_lat)?;
                check_bounds(p.start_lon, p.end_lon, p.start_lat, p.end_lat)?;
                check_lon("standLon", p.stand_lon)
            }
            ProjectionSpec::Equirectangular(p) => {
                check_center(p.cen_lon, p.cen_lat)?;
                check_bounds(p.start_lon, p.end_lon, p.start_lat, p.end_lat)?;
                check_lon("poleLon", p.pole_lon)?;
                check_lat("poleLat", p.pole_lat)
            }
            ProjectionSpec::ConicConformal(p) => {
                check_center(p.cen_lon, p.cen_lat)?;
                check_bounds(p.start_lon, p.end_lon, p.start_lat, p.end_lat)?;
                check_lon("standLon", p.stand_lon)?;
                check_lat("trueLat1", p.true_lat1)?;
                check_lat("trueLat2", p.true_lat2)
            }
        }
    }
}

fn check_finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(GridMetaError::schema(format!("{} must be finite, got {}", field, value)))
    }
}

fn check_lon(field: &str, value: f64) -> Result<()> {
    check_finite(field, value)?;
    if !(-180.0..=360.0).contains(&value) {
        return Err(GridMetaError::schema(format!(
            "{} = {} is outside the longitude range [-180, 360]",
            field, value
        )));
    }
    Ok(())
}

fn check_lat(field: &str, value: f64) -> Result<()> {
    check_finite(field, value)?;
    if !(-90.0..=90.0).contains(&value) {
        return Err(GridMetaError::schema(format!(
            "{} = {} is outside the latitude range [-90, 90]",
            field, value
        )));
    }
    Ok(())
}

fn check_center(lon: f64, lat: f64) -> Result<()> {
    check_lon("cenLon", lon)?;
    check_lat("cenLat", lat)
}

fn check_bounds(start_lon: f64, end_lon: f64, start_lat: f64, end_lat: f64) -> Result<()> {
    check_lon("startLon", start_lon)?;
    check_lon("endLon", end_lon)?;
    check_lat("startLat", start_lat)?;
    check_lat("endLat", end_lat)
}

/// Unvalidated ingredients of a [`Dataset`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetParts {
    pub nx: usize,
    pub ny: usize,
    #[serde(default)]
    pub times: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub levels: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub datavars: BTreeMap<String, DataVar>,
    #[serde(default)]
    pub vectors: BTreeMap<String, VectorVar>,
    pub xwrap: bool,
    /// Only present when parts are read back from serialized form; derived
    /// from `projection` otherwise.
    #[serde(default)]
    pub islonlat: Option<bool>,
    pub projection: ProjectionSpec,
}

/// The validated canonical metadata of one dataset. Only built through
/// [`Dataset::build`], so every field and cross-field rule has been checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetParts")]
pub struct Dataset {
    nx: usize,
    ny: usize,
    times: BTreeMap<String, Vec<String>>,
    levels: BTreeMap<String, Vec<String>>,
    datavars: BTreeMap<String, DataVar>,
    vectors: BTreeMap<String, VectorVar>,
    xwrap: bool,
    islonlat: bool,
    projection: ProjectionSpec,
}

impl TryFrom<DatasetParts> for Dataset {
    type Error = GridMetaError;

    fn try_from(parts: DatasetParts) -> Result<Self> {
        Self::build(parts)
    }
}

impl Dataset {
    /// Validate `parts` and assemble them. Fails on the first broken rule.
    pub fn build(parts: DatasetParts) -> Result<Self> {
        let islonlat = parts.projection.is_lonlat();
        if parts.islonlat.is_some_and(|flag| flag != islonlat) {
            return Err(GridMetaError::schema(format!(
                "islonlat must be {} for a {} projection",
                islonlat,
                parts.projection.name()
            )));
        }

        let dataset = Self {
            nx: parts.nx,
            ny: parts.ny,
            times: parts.times,
            levels: parts.levels,
            datavars: parts.datavars,
            vectors: parts.vectors,
            xwrap: parts.xwrap,
            islonlat,
            projection: parts.projection,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Build from a serialized attribute object. Unknown fields are rejected.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let parts: DatasetParts = serde_json::from_value(value)?;
        Self::build(parts)
    }

    fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(GridMetaError::schema(format!(
                "grid must have at least one point in each direction, got nx={} ny={}",
                self.nx, self.ny
            )));
        }

        self.projection.validate()?;

        if self.xwrap && !self.islonlat {
            return Err(GridMetaError::schema(format!(
                "xwrap is only allowed on LonLat grids, not {}",
                self.projection.name()
            )));
        }

        for (key, var) in &self.datavars {
            if key != &var.name {
                return Err(GridMetaError::schema(format!(
                    "datavar key '{}' does not match its name '{}'",
                    key, var.name
                )));
            }
            if var.name.trim().is_empty() || var.source_name.trim().is_empty() {
                return Err(GridMetaError::schema(format!(
                    "datavar '{}' needs both a name and a source_name",
                    key
                )));
            }
            self.check_level(key, &var.level)?;
            if let Some(time) = var.time.as_deref().filter(|t| !t.is_empty()) {
                if !self.times.contains_key(time) {
                    return Err(GridMetaError::schema(format!(
                        "datavar '{}' refers to unknown time axis '{}'",
                        key, time
                    )));
                }
            }
        }

        for (key, vector) in &self.vectors {
            if key != &vector.name || vector.name.trim().is_empty() {
                return Err(GridMetaError::schema(format!(
                    "vector key '{}' does not match its name '{}'",
                    key, vector.name
                )));
            }
            self.check_level(key, &vector.level)?;
            for component in [&vector.uname, &vector.vname] {
                if !self.datavars.values().any(|d| &d.source_name == component) {
                    return Err(GridMetaError::schema(format!(
                        "vector '{}' component '{}' is not a datavar",
                        key, component
                    )));
                }
            }
        }

        Ok(())
    }

    fn check_level(&self, owner: &str, level: &str) -> Result<()> {
        if level.is_empty() || self.levels.contains_key(level) {
            Ok(())
        } else {
            Err(GridMetaError::schema(format!(
                "'{}' refers to unknown level axis '{}'",
                owner, level
            )))
        }
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn times(&self) -> &BTreeMap<String, Vec<String>> {
        &self.times
    }

    pub fn levels(&self) -> &BTreeMap<String, Vec<String>> {
        &self.levels
    }

    pub fn datavars(&self) -> &BTreeMap<String, DataVar> {
        &self.datavars
    }

    pub fn vectors(&self) -> &BTreeMap<String, VectorVar> {
        &self.vectors
    }

    pub fn xwrap(&self) -> bool {
        self.xwrap
    }

    pub fn islonlat(&self) -> bool {
        self.islonlat
    }

    pub fn projection(&self) -> &ProjectionSpec {
        &self.projection
    }

    /// Plain attribute mapping handed to persistence.
    pub fn to_attributes(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(GridMetaError::schema(format!(
                "dataset serialized to {} instead of an object",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lonlat() -> ProjectionSpec {
        ProjectionSpec::LonLat(LonLat {
            start_lon: 0.0,
            start_lat: -90.0,
            dlon: 10.0,
            dlat: 10.0,
        })
    }

    fn datavar(name: &str, level: &str) -> DataVar {
        DataVar {
            name: name.to_string(),
            source_name: name.to_string(),
            units: "K".to_string(),
            long_name: String::new(),
            standard_name: String::new(),
            description: String::new(),
            level: level.to_string(),
            lon: None,
            lat: None,
            time: None,
        }
    }

    fn parts() -> DatasetParts {
        let mut levels = BTreeMap::new();
        levels.insert("level".to_string(), vec!["1000 hPa".to_string()]);
        let mut datavars = BTreeMap::new();
        datavars.insert("air".to_string(), datavar("air", "level"));

        DatasetParts {
            nx: 36,
            ny: 19,
            times: BTreeMap::new(),
            levels,
            datavars,
            vectors: BTreeMap::new(),
            xwrap: true,
            islonlat: None,
            projection: lonlat(),
        }
    }

    fn sample_json() -> serde_json::Value {
        json!({
            "nx": 36,
            "ny": 19,
            "times": {},
            "levels": {},
            "datavars": {},
            "vectors": {},
            "xwrap": false,
            "islonlat": false,
            "projection": {
                "name": "Mercator",
                "cenLon": 10.0, "cenLat": 0.0,
                "startLon": 0.0, "endLon": 20.0,
                "startLat": -10.0, "endLat": 10.0
            }
        })
    }

    #[test]
    fn test_build_valid() {
        let ds = Dataset::build(parts()).unwrap();
        assert!(ds.islonlat());
        assert!(ds.xwrap());
        assert_eq!(ds.nx(), 36);
        assert_eq!(ds.projection().name(), "LonLat");
    }

    #[test]
    fn test_serialized_shape() {
        let attrs = Dataset::build(parts()).unwrap().to_attributes().unwrap();
        assert_eq!(attrs["projection"]["name"], "LonLat");
        assert_eq!(attrs["projection"]["startLon"], 0.0);
        assert_eq!(attrs["islonlat"], true);
        assert_eq!(attrs["datavars"]["air"]["source_name"], "air");
        assert!(attrs["datavars"]["air"].get("time").is_none());
    }

    #[test]
    fn test_from_value_accepts_serialized_form() {
        let ds = Dataset::from_value(sample_json()).unwrap();
        assert!(!ds.islonlat());
        let again = Dataset::from_value(serde_json::Value::Object(ds.to_attributes().unwrap())).unwrap();
        assert_eq!(ds, again);
    }

    #[test]
    fn test_extra_field_rejected() {
        let mut value = sample_json();
        value["colormap"] = json!("viridis");
        let err = Dataset::from_value(value).unwrap_err();
        assert!(matches!(err, GridMetaError::SchemaValidation(_)));
        assert!(err.to_string().contains("colormap"));
    }

    #[test]
    fn test_extra_projection_field_rejected() {
        let mut value = sample_json();
        value["projection"]["standLon"] = json!(5.0);
        assert!(matches!(
            Dataset::from_value(value),
            Err(GridMetaError::SchemaValidation(_))
        ));
    }

    #[test]
    fn test_longitude_out_of_range() {
        let mut value = sample_json();
        value["projection"]["cenLon"] = json!(400.0);
        let err = Dataset::from_value(value).unwrap_err();
        assert!(matches!(err, GridMetaError::SchemaValidation(_)));
        assert!(err.to_string().contains("cenLon"));
    }

    #[test]
    fn test_latitude_out_of_range() {
        let mut p = parts();
        p.projection = ProjectionSpec::LonLat(LonLat {
            start_lon: 0.0,
            start_lat: -91.0,
            dlon: 1.0,
            dlat: 1.0,
        });
        assert!(Dataset::build(p).is_err());
    }

    #[test]
    fn test_lonlat_steps_out_of_range() {
        let mut p = parts();
        p.projection = ProjectionSpec::LonLat(LonLat {
            start_lon: 0.0,
            start_lat: -90.0,
            dlon: 400.0,
            dlat: 10.0,
        });
        let err = Dataset::build(p).unwrap_err();
        assert!(matches!(err, GridMetaError::SchemaValidation(_)));
        assert!(err.to_string().contains("dlon"));

        let mut value = serde_json::Value::Object(Dataset::build(parts()).unwrap().to_attributes().unwrap());
        value["projection"]["dlat"] = json!(180.0);
        let err = Dataset::from_value(value).unwrap_err();
        assert!(err.to_string().contains("dlat"));
    }

    #[test]
    fn test_unknown_projection_name_rejected() {
        let mut value = sample_json();
        value["projection"]["name"] = json!("Robinson");
        assert!(Dataset::from_value(value).is_err());
    }

    #[test]
    fn test_cross_field_rules() {
        let mut wrap_on_mercator = Dataset::from_value(sample_json()).unwrap().to_attributes().unwrap();
        wrap_on_mercator["xwrap"] = json!(true);
        assert!(Dataset::from_value(serde_json::Value::Object(wrap_on_mercator)).is_err());

        let mut lying_flag = sample_json();
        lying_flag["islonlat"] = json!(true);
        assert!(Dataset::from_value(lying_flag).is_err());

        let mut empty_grid = parts();
        empty_grid.nx = 0;
        assert!(Dataset::build(empty_grid).is_err());

        let mut bad_level = parts();
        bad_level.datavars.insert("ps".to_string(), datavar("ps", "sigma"));
        let err = Dataset::build(bad_level).unwrap_err();
        assert!(err.to_string().contains("unknown level axis 'sigma'"));

        let mut bad_key = parts();
        bad_key.datavars.insert("renamed".to_string(), datavar("ps", ""));
        assert!(Dataset::build(bad_key).is_err());
    }

    #[test]
    fn test_vector_components_must_be_datavars() {
        let mut p = parts();
        p.vectors.insert(
            "wind".to_string(),
            VectorVar {
                name: "wind".to_string(),
                uname: "air".to_string(),
                vname: "vwnd".to_string(),
                units: String::new(),
                long_name: String::new(),
                standard_name: String::new(),
                description: String::new(),
                level: "level".to_string(),
            },
        );
        let err = Dataset::build(p.clone()).unwrap_err();
        assert!(err.to_string().contains("'vwnd' is not a datavar"));

        p.datavars.insert("vwnd".to_string(), datavar("vwnd", "level"));
        assert_eq!(Dataset::build(p).unwrap().vectors().len(), 1);
    }
}
