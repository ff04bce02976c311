use crate::accessor::Coordinate;
use crate::error::{GridMetaError, Result};
use serde::Serialize;

const RTOL: f64 = 1e-5;
const ATOL: f64 = 1e-8;

/// `|a - b| <= atol + rtol * |b|`, the usual tolerant float comparison.
pub fn is_close(a: f64, b: f64, rtol: f64, atol: f64) -> bool {
    (a - b).abs() <= atol + rtol * b.abs()
}

/// A regularly spaced 1-D coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UniformGrid {
    pub origin: f64,
    pub step: f64,
    pub count: usize,
}

impl UniformGrid {
    /// Check that `values` are evenly spaced; `name` is only used in errors.
    ///
    /// A single value is a valid grid with a zero step.
    pub fn from_values(name: &str, values: &[f64]) -> Result<Self> {
        let Some(&origin) = values.first() else {
            return Err(GridMetaError::non_uniform(name));
        };

        if values.iter().any(|v| !v.is_finite()) {
            return Err(GridMetaError::non_uniform(name));
        }

        let step = if values.len() > 1 { values[1] - values[0] } else { 0.0 };
        let uniform = values
            .windows(2)
            .all(|w| is_close(w[1] - w[0], step, RTOL, ATOL));

        if !uniform {
            return Err(GridMetaError::non_uniform(name));
        }

        Ok(Self {
            origin,
            step,
            count: values.len(),
        })
    }

    /// Same as [`UniformGrid::from_values`] but rejects anything that is not 1-D.
    pub fn from_coordinate(coord: &Coordinate) -> Result<Self> {
        if coord.rank() != 1 {
            return Err(GridMetaError::dimensionality(&coord.name, coord.rank(), "1"));
        }
        Self::from_values(&coord.name, &coord.values)
    }

    pub fn end(&self) -> f64 {
        self.origin + self.step * self.count.saturating_sub(1) as f64
    }
}

/// Whether a longitude grid spans exactly one full turn.
pub fn is_periodic(origin: f64, step: f64, count: usize) -> bool {
    let wrap = origin + step * count as f64;
    is_close(wrap - origin, 360.0, RTOL, ATOL)
}
