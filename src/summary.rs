//! JSON summary export for datasets.
//!
//! The summary is a stable, versioned snapshot of a dataset's shape: domain,
//! particle types, field lists, and the filters attached to it. Collections
//! are sorted so two identical datasets serialize identically.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::Result;
use crate::fields::FieldKey;

/// Format tag carried by every summary document.
pub const SUMMARY_FORMAT: &str = "criba-summary-v1";

/// Attached-filter metadata as it appears in a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSummary {
    pub name: String,
    pub filtered_type: String,
    pub requires: Vec<String>,
}

/// Serializable snapshot of a dataset's structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Crate version that produced the summary.
    pub version: String,
    /// Always [`SUMMARY_FORMAT`]; lets readers reject unknown layouts.
    pub format: String,
    pub name: String,
    pub domain_dimensions: [usize; 3],
    pub n_grids: usize,
    pub particle_types: Vec<String>,
    pub filtered_types: Vec<String>,
    pub particle_counts: BTreeMap<String, usize>,
    pub field_list: Vec<FieldKey>,
    pub derived_field_list: Vec<FieldKey>,
    pub filters: Vec<FilterSummary>,
}

impl DatasetSummary {
    /// Snapshot `ds`, counting the particles of every type (filtered types
    /// evaluate their filters).
    pub fn from_dataset(ds: &Dataset) -> Result<Self> {
        let mut particle_counts = BTreeMap::new();
        for ptype in ds.particle_types() {
            particle_counts.insert(ptype.clone(), ds.particle_count(ptype)?);
        }
        let filters = ds
            .filters()
            .into_iter()
            .map(|filter| FilterSummary {
                name: filter.name().to_string(),
                filtered_type: filter.filtered_type().to_string(),
                requires: filter.requires().to_vec(),
            })
            .collect();

        Ok(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: SUMMARY_FORMAT.to_string(),
            name: ds.name().to_string(),
            domain_dimensions: ds.domain_dimensions(),
            n_grids: ds.grids().len(),
            particle_types: ds.particle_types().to_vec(),
            filtered_types: ds.filtered_types().to_vec(),
            particle_counts,
            field_list: ds.field_list(),
            derived_field_list: ds.derived_field_list(),
            filters,
        })
    }

    /// Pretty-printed JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
