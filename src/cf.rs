use crate::metadata::{AttributeMap, attr_str};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::fmt;

/// Geospatial role a coordinate can play under CF conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisRole {
    Longitude,
    Latitude,
    Time,
    Vertical,
}

impl AxisRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AxisRole::Longitude => "longitude",
            AxisRole::Latitude => "latitude",
            AxisRole::Time => "time",
            AxisRole::Vertical => "vertical",
        }
    }
}

impl fmt::Display for AxisRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide which role, if any, a coordinate plays.
///
/// Checks run in T, Z, Y, X order so a coordinate is assigned at most one role.
pub fn coordinate_role(name: &str, attributes: &AttributeMap) -> Option<AxisRole> {
    let axis = axis_char(attr_str(attributes, "axis"));
    let standard_name = attr_str(attributes, "standard_name");
    let units = attr_str(attributes, "units");
    let axis_type = attr_str(attributes, "_CoordinateAxisType");
    let positive = attr_str(attributes, "positive");

    if is_time_coordinate(name, axis, standard_name, units, axis_type) {
        Some(AxisRole::Time)
    } else if is_vertical_coordinate(name, axis, standard_name, positive, axis_type) {
        Some(AxisRole::Vertical)
    } else if is_latitude_coordinate(standard_name, units, axis_type) {
        Some(AxisRole::Latitude)
    } else if is_longitude_coordinate(standard_name, units, axis_type) {
        Some(AxisRole::Longitude)
    } else {
        None
    }
}

fn axis_char(axis: Option<&str>) -> Option<char> {
    axis.and_then(|s| s.trim().chars().next())
        .map(|c| c.to_ascii_uppercase())
}

fn starts_with_ignore_ascii_case(s: &str, prefix: &str) -> bool {
    s.get(0..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn is_time_coordinate(
    name: &str,
    axis: Option<char>,
    standard_name: Option<&str>,
    units: Option<&str>,
    axis_type: Option<&str>,
) -> bool {
    if axis == Some('T') || axis_type.is_some_and(|t| t.eq_ignore_ascii_case("time")) {
        return true;
    }

    if standard_name.is_some_and(|sn| sn.eq_ignore_ascii_case("time")) {
        return true;
    }

    if name.eq_ignore_ascii_case("time") || starts_with_ignore_ascii_case(name, "time") {
        return true;
    }

    units.is_some_and(|u| TimeUnits::parse(u).is_ok())
}

fn units_looks_like_latitude(units: &str) -> bool {
    let u = units.to_ascii_lowercase();
    u.contains("degrees_north") || u.contains("degree_north") || u == "degrees_n" || u == "degree_n"
}

fn units_looks_like_longitude(units: &str) -> bool {
    let u = units.to_ascii_lowercase();
    u.contains("degrees_east") || u.contains("degree_east") || u == "degrees_e" || u == "degree_e"
}

fn is_latitude_coordinate(
    standard_name: Option<&str>,
    units: Option<&str>,
    axis_type: Option<&str>,
) -> bool {
    standard_name.is_some_and(|sn| sn.eq_ignore_ascii_case("latitude"))
        || units.is_some_and(units_looks_like_latitude)
        || axis_type.is_some_and(|t| t.eq_ignore_ascii_case("lat"))
}

fn is_longitude_coordinate(
    standard_name: Option<&str>,
    units: Option<&str>,
    axis_type: Option<&str>,
) -> bool {
    standard_name.is_some_and(|sn| sn.eq_ignore_ascii_case("longitude"))
        || units.is_some_and(units_looks_like_longitude)
        || axis_type.is_some_and(|t| t.eq_ignore_ascii_case("lon"))
}

fn standard_name_suggests_vertical(sn: &str) -> bool {
    const VERTICAL: [&str; 14] = [
        "air_pressure",
        "depth",
        "altitude",
        "geopotential_height",
        "model_level_number",
        "atmosphere_hybrid_sigma_pressure_coordinate",
        "atmosphere_hybrid_height_coordinate",
        "atmosphere_sigma_coordinate",
        "ocean_sigma_coordinate",
        "ocean_sigma_z_coordinate",
        "ocean_s_coordinate",
        "ocean_s_coordinate_g1",
        "ocean_s_coordinate_g2",
        "ocean_double_sigma_coordinate",
    ];
    VERTICAL.iter().any(|v| sn.eq_ignore_ascii_case(v))
}

fn is_vertical_coordinate(
    name: &str,
    axis: Option<char>,
    standard_name: Option<&str>,
    positive: Option<&str>,
    axis_type: Option<&str>,
) -> bool {
    if axis == Some('Z') {
        return true;
    }

    if axis_type.is_some_and(|t| {
        t.eq_ignore_ascii_case("geoz")
            || t.eq_ignore_ascii_case("height")
            || t.eq_ignore_ascii_case("pressure")
    }) {
        return true;
    }

    if positive.is_some_and(|p| p.eq_ignore_ascii_case("up") || p.eq_ignore_ascii_case("down")) {
        return true;
    }

    if standard_name.is_some_and(standard_name_suggests_vertical) {
        return true;
    }

    name.eq_ignore_ascii_case("lev")
        || name.eq_ignore_ascii_case("level")
        || name.eq_ignore_ascii_case("plev")
        || name.eq_ignore_ascii_case("depth")
        || name.eq_ignore_ascii_case("altitude")
        || name.eq_ignore_ascii_case("height")
        || name.eq_ignore_ascii_case("z")
}

/// Unit of a CF `"<unit> since <reference>"` time encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn millis(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1_000.0,
            TimeUnit::Minutes => 60_000.0,
            TimeUnit::Hours => 3_600_000.0,
            TimeUnit::Days => 86_400_000.0,
        }
    }
}

/// Parsed CF time units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub reference: NaiveDateTime,
}

impl TimeUnits {
    pub fn parse(units: &str) -> Result<Self, String> {
        let u = units.trim().to_ascii_lowercase();
        let Some((prefix, rest)) = u.split_once(" since ") else {
            return Err(format!("units '{}' are not of the form '<unit> since <date>'", units));
        };

        let unit = match prefix.trim() {
            "seconds" | "second" | "secs" | "sec" | "s" => TimeUnit::Seconds,
            "minutes" | "minute" | "mins" | "min" => TimeUnit::Minutes,
            "hours" | "hour" | "hrs" | "hr" | "h" => TimeUnit::Hours,
            "days" | "day" | "d" => TimeUnit::Days,
            "months" | "month" | "years" | "year" => {
                return Err(format!(
                    "calendar-dependent unit '{}' is not supported",
                    prefix.trim()
                ));
            }
            other => return Err(format!("unknown time unit '{}'", other)),
        };

        let reference = parse_reference_date(rest.trim())
            .ok_or_else(|| format!("cannot parse reference date '{}'", rest.trim()))?;

        Ok(Self { unit, reference })
    }

    pub fn decode(&self, value: f64) -> Option<NaiveDateTime> {
        if !value.is_finite() {
            return None;
        }
        let millis = (value * self.unit.millis()).round();
        if millis.abs() > i64::MAX as f64 {
            return None;
        }
        let delta = TimeDelta::try_milliseconds(millis as i64)?;
        self.reference.checked_add_signed(delta)
    }
}

fn parse_reference_date(raw: &str) -> Option<NaiveDateTime> {
    let mut s = raw.trim();
    for suffix in [" utc", "z", "+00:00", " +0:00", " 00:00"] {
        if let Some(stripped) = s.strip_suffix(suffix) {
            s = stripped.trim_end();
            break;
        }
    }

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dt%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dt%H:%M",
    ];

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn calendar_supported(calendar: Option<&str>) -> bool {
    match calendar {
        None => true,
        Some(c) => {
            c.eq_ignore_ascii_case("standard")
                || c.eq_ignore_ascii_case("gregorian")
                || c.eq_ignore_ascii_case("proleptic_gregorian")
        }
    }
}

/// Format a timestamp the way downstream consumers expect: no zone, fractional
/// seconds only when present.
pub fn format_iso(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Decode numeric CF time values of the coordinate `name` into ISO-8601 strings.
pub fn decode_times(
    name: &str,
    values: &[f64],
    attributes: &AttributeMap,
) -> crate::Result<Vec<String>> {
    let units = attr_str(attributes, "units")
        .ok_or_else(|| crate::GridMetaError::time_decode(name, "missing 'units' attribute"))?;

    let calendar = attr_str(attributes, "calendar");
    if !calendar_supported(calendar) {
        return Err(crate::GridMetaError::time_decode(
            name,
            format!("unsupported calendar '{}'", calendar.unwrap_or_default()),
        ));
    }

    let parsed =
        TimeUnits::parse(units).map_err(|reason| crate::GridMetaError::time_decode(name, reason))?;

    values
        .iter()
        .map(|&v| {
            parsed
                .decode(v)
                .map(|dt| format_iso(&dt))
                .ok_or_else(|| {
                    crate::GridMetaError::time_decode(name, format!("value {} is out of range", v))
                })
        })
        .collect()
}
