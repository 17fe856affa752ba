//! Criba - named particle filters and derived fields for in-memory simulation
//! datasets
//!
//! This library provides a process-wide registry of named boolean predicates
//! over particle data, datasets built from uniform grid patches, and the
//! derived fields (filtered particle types, mesh deposition) those predicates
//! unlock. Filters are registered once and attach to any number of datasets.

pub mod dataset;
pub mod deposit;
pub mod error;
pub mod fields;
pub mod filters;
pub mod grid;
pub mod selection;
pub mod stats;
pub mod summary;

pub use dataset::{Dataset, DatasetBuilder};
pub use deposit::DepositMethod;
pub use error::{CribaError, Result};
pub use fields::{FieldArray, FieldKey, FieldKind};
pub use filters::{add_particle_filter, FilterMask, ParticleFilter, ParticleFilterBuilder};
pub use grid::{Grid, GridSpec};
pub use selection::{DataObject, ParticleSource};
pub use stats::FieldStats;
pub use summary::DatasetSummary;
