//! Crate-wide error type for dataset construction and filter operations

use thiserror::Error;

use crate::fields::FieldKey;

/// Errors for dataset construction and particle-filter operations
#[derive(Error, Debug)]
pub enum CribaError {
    #[error("invalid filter name {name:?}: filter names must be identifiers")]
    InvalidFilterName { name: String },

    #[error("no particle filter named {name:?} is registered")]
    UnknownFilter { name: String },

    #[error("particle filter {filter:?} requires fields that are not defined: {}", join_fields(.missing))]
    IllDefinedFilter {
        filter: String,
        missing: Vec<FieldKey>,
    },

    #[error("particle filter dependency cycle: {}", .chain.join(" -> "))]
    FilterDependencyCycle { chain: Vec<String> },

    #[error("particle filter {name:?} shadows an existing particle type")]
    FilterShadowsParticleType { name: String },

    #[error("particle type name {ptype:?} is reserved")]
    ReservedTypeName { ptype: String },

    #[error("unknown field {field}")]
    UnknownField { field: FieldKey },

    #[error("unknown particle type {ptype:?}")]
    UnknownParticleType { ptype: String },

    #[error("filter {filter:?} produced a mask of length {actual}, expected {expected}")]
    MaskLengthMismatch {
        filter: String,
        expected: usize,
        actual: usize,
    },

    #[error("grid {grid_id}: field {field} holds {actual} values, expected {expected}")]
    FieldLengthMismatch {
        grid_id: usize,
        field: FieldKey,
        expected: usize,
        actual: usize,
    },

    #[error("grid {grid_id}: field {field} was given more than once")]
    DuplicateGridField { grid_id: usize, field: FieldKey },

    #[error("grid {grid_id}: particle type {ptype:?} does not carry the same fields as on other grids")]
    InconsistentGridFields { grid_id: usize, ptype: String },

    #[error("grid {grid_id} extends outside the domain")]
    GridOutsideDomain { grid_id: usize },

    #[error("grid {grid_id}: particle {index} of type {ptype:?} lies outside the grid bounds")]
    ParticleOutsideGrid {
        grid_id: usize,
        ptype: String,
        index: usize,
    },

    #[error("dimensions must be positive, got {dims:?}")]
    InvalidDimensions { dims: [usize; 3] },

    #[error("domain right edge {right_edge:?} must exceed left edge {left_edge:?} on every axis")]
    InvalidDomainBounds {
        left_edge: [f64; 3],
        right_edge: [f64; 3],
    },

    #[error("grid index {index} out of range for a dataset with {n_grids} grids")]
    GridIndexOutOfRange { index: usize, n_grids: usize },

    #[error("covering grids are only defined at level 0, got level {level}")]
    UnsupportedLevel { level: u32 },

    #[error("region [{left_edge:?}, {right_edge:?}) lies outside the domain")]
    RegionOutsideDomain {
        left_edge: [f64; 3],
        right_edge: [f64; 3],
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CribaError>;

fn join_fields(fields: &[FieldKey]) -> String {
    fields
        .iter()
        .map(FieldKey::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
