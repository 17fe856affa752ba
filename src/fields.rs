//! Field identities, the per-dataset field registry, and field value arrays.
//!
//! Every field is addressed by a [`FieldKey`]: a `(ftype, name)` pair such as
//! `("stars", "particle_mass")` or `("deposit", "stars_cic")`. The registry
//! records which keys a dataset can resolve and how each one is produced.

use std::fmt;

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

use crate::deposit::DepositMethod;

/// Per-axis particle position field names, in axis order. Types carrying all
/// three support region selection and deposition.
pub const POSITION_FIELDS: [&str; 3] = [
    "particle_position_x",
    "particle_position_y",
    "particle_position_z",
];

/// Identity of a field: particle type (or `"deposit"`) plus field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldKey {
    /// Field type: a particle type name, a filtered type name, or `"deposit"`.
    pub ftype: String,
    /// Field name within the type, e.g. `"particle_mass"`.
    pub name: String,
}

impl FieldKey {
    pub fn new(ftype: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ftype: ftype.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(\"{}\", \"{}\")", self.ftype, self.name)
    }
}

impl From<(&str, &str)> for FieldKey {
    fn from((ftype, name): (&str, &str)) -> Self {
        Self::new(ftype, name)
    }
}

impl From<(String, String)> for FieldKey {
    fn from((ftype, name): (String, String)) -> Self {
        Self { ftype, name }
    }
}

/// How a field's values are produced when a selection asks for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Raw particle field stored on the grids.
    Particle,
    /// Particle field of a filtered type, read through from `source_type`
    /// with the filter's mask applied.
    FilteredParticle { source_type: String },
    /// Mesh field produced by depositing particles of `source_type`.
    Deposit {
        source_type: String,
        method: DepositMethod,
    },
}

/// Registry entry: a resolvable field key and how to produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub key: FieldKey,
    pub kind: FieldKind,
}

impl FieldInfo {
    pub fn new(key: FieldKey, kind: FieldKind) -> Self {
        Self { key, kind }
    }

    /// True for raw particle fields stored directly on the grids.
    pub fn is_raw(&self) -> bool {
        self.kind == FieldKind::Particle
    }
}

/// All fields a dataset can resolve, raw and derived.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: FnvHashMap<FieldKey, FieldInfo>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning any entry it replaced.
    pub fn insert(&mut self, info: FieldInfo) -> Option<FieldInfo> {
        self.fields.insert(info.key.clone(), info)
    }

    pub fn contains(&self, key: &FieldKey) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get(&self, key: &FieldKey) -> Option<&FieldInfo> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw on-grid fields, sorted by key.
    pub fn field_list(&self) -> Vec<FieldKey> {
        let mut keys: Vec<FieldKey> = self
            .fields
            .values()
            .filter(|info| info.is_raw())
            .map(|info| info.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Every resolvable field, raw and derived, sorted by key.
    pub fn derived_field_list(&self) -> Vec<FieldKey> {
        let mut keys: Vec<FieldKey> = self.fields.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// All fields under one field type, sorted by name.
    pub fn fields_of_type(&self, ftype: &str) -> Vec<FieldKey> {
        let mut keys: Vec<FieldKey> = self
            .fields
            .keys()
            .filter(|key| key.ftype == ftype)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Drop every entry belonging to the filtered type `ptype`, including its
    /// deposition fields. Used when a filter is re-attached so stale mirrors
    /// of a previous base type do not linger.
    pub(crate) fn remove_filtered_type(&mut self, ptype: &str) {
        self.fields.retain(|key, info| {
            if key.ftype == ptype {
                return false;
            }
            !matches!(&info.kind, FieldKind::Deposit { source_type, .. } if source_type == ptype)
        });
    }
}

/// Values of one field over one selection.
///
/// Particle fields are flat (`shape == [n]`); deposited mesh fields carry the
/// grid shape (`shape == [nx, ny, nz]`) with values in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldArray {
    data: Vec<f64>,
    shape: Vec<usize>,
}

impl FieldArray {
    /// Flat per-particle array.
    pub fn particle(values: Vec<f64>) -> Self {
        let n = values.len();
        Self {
            data: values,
            shape: vec![n],
        }
    }

    /// Row-major mesh array with the given cell dimensions.
    pub(crate) fn mesh(values: Vec<f64>, dims: [usize; 3]) -> Self {
        debug_assert_eq!(values.len(), dims[0] * dims[1] * dims[2]);
        Self {
            data: values,
            shape: dims.to_vec(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of values, independent of shape.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.data.get(index).copied()
    }

    /// Mesh cell value at `(ix, iy, iz)`; `None` off the mesh or for
    /// particle-shaped arrays.
    pub fn cell(&self, ix: usize, iy: usize, iz: usize) -> Option<f64> {
        let &[nx, ny, nz] = self.shape.as_slice() else {
            return None;
        };
        if ix >= nx || iy >= ny || iz >= nz {
            return None;
        }
        self.data.get((ix * ny + iy) * nz + iz).copied()
    }

    /// Sum of all values.
    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }
}
