//! Metadata inference and validation for gridded geophysical datasets.
//!
//! A dataset is read through [`DatasetAccessor`]; [`convert`] resolves its
//! axes, projection and variables into a validated [`Dataset`] that can be
//! stored back as root attributes of the source store.

pub mod accessor;
pub mod axis;
pub mod cf;
pub mod classify;
pub mod config;
pub mod convert;
pub mod error;
pub mod grid;
pub mod metadata;
pub mod projection;
pub mod prompt;
pub mod schema;
pub mod store;

pub use accessor::{Coordinate, DatasetAccessor, MemoryDataset};
pub use axis::AxisDescriptor;
pub use cf::AxisRole;
pub use config::ConversionConfig;
pub use convert::convert;
pub use error::{GridMetaError, Result};
pub use metadata::{AttributeMap, AttributeValue, Variable, ZarrMetadata};
pub use prompt::{AcceptDefaults, PromptProvider, TerminalPrompt};
pub use schema::{DataVar, Dataset, ProjectionSpec, VectorVar};
pub use store::{ZarrDataset, ZarrStore};
