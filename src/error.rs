use thiserror::Error;

/// Result type alias for gridmeta operations.
pub type Result<T> = std::result::Result<T, GridMetaError>;

/// Errors that can occur while inferring or validating dataset metadata.
#[derive(Debug, Error)]
pub enum GridMetaError {
    /// A coordinate has an unexpected number of dimensions.
    #[error("{name} has {rank} dimensions; expected {expected}")]
    Dimensionality {
        name: String,
        rank: usize,
        expected: &'static str,
    },

    /// More than one coordinate plays a role where exactly one is required.
    #[error("Multiple {role} coordinates found: {}", names.join(", "))]
    Ambiguity { role: String, names: Vec<String> },

    /// No coordinate plays a required role.
    #[error("No {role} coordinate found in dataset via CF conventions")]
    NotFound { role: String },

    /// A supposedly regular coordinate is not uniformly spaced.
    #[error("{name} must be uniform")]
    NonUniformGrid { name: String },

    /// A projection family parameter is absent from the dataset attributes.
    #[error("{family} projection requires attribute '{attribute}'")]
    MissingAttribute {
        family: &'static str,
        attribute: &'static str,
    },

    /// The projection family could not be resolved to a supported one.
    #[error("Unsupported projection: {name}")]
    UnsupportedProjection { name: String },

    /// The components of a declared vector pair disagree on an axis.
    #[error("Vector pair ({u}, {v}) does not share the same {axis} axis: '{u_axis}' vs '{v_axis}'")]
    PairingMismatch {
        u: String,
        v: String,
        axis: &'static str,
        u_axis: String,
        v_axis: String,
    },

    /// The assembled canonical metadata violates the schema.
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// The user aborted during an interactive prompt.
    #[error("Conversion interrupted by user")]
    Interrupted,

    /// A time coordinate could not be turned into ISO-8601 timestamps.
    #[error("Cannot decode time coordinate '{name}': {reason}")]
    TimeDecode { name: String, reason: String },

    /// The dataset accessor failed to provide requested data.
    #[error("Dataset access error: {0}")]
    Accessor(String),

    /// The answers/configuration file is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GridMetaError {
    /// Create a Dimensionality error.
    pub fn dimensionality(name: impl Into<String>, rank: usize, expected: &'static str) -> Self {
        Self::Dimensionality {
            name: name.into(),
            rank,
            expected,
        }
    }

    /// Create a NonUniformGrid error.
    pub fn non_uniform(name: impl Into<String>) -> Self {
        Self::NonUniformGrid { name: name.into() }
    }

    /// Create a SchemaValidation error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaValidation(msg.into())
    }

    /// Create a TimeDecode error.
    pub fn time_decode(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TimeDecode {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an Accessor error.
    pub fn accessor(msg: impl Into<String>) -> Self {
        Self::Accessor(msg.into())
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl From<serde_json::Error> for GridMetaError {
    fn from(err: serde_json::Error) -> Self {
        Self::SchemaValidation(err.to_string())
    }
}
