//! In-memory datasets: a uniform domain tiled by grid patches, plus the
//! per-dataset field registry and attached particle filters.
//!
//! Datasets are built once via [`DatasetBuilder`], which validates geometry
//! and field consistency up front so selections can assume a well-formed
//! layout. Attaching a registered filter (see [`Dataset::add_particle_filter`])
//! adds a filtered particle type and its derived fields; the stored particle
//! data is never copied or rewritten.

use std::collections::{BTreeMap, BTreeSet};

use fnv::FnvHashMap;
use tracing::{debug, info};

use crate::deposit;
use crate::error::{CribaError, Result};
use crate::fields::{FieldInfo, FieldKey, FieldKind, FieldRegistry, POSITION_FIELDS};
use crate::filters::{self, ParticleFilter};
use crate::grid::{Grid, GridSpec};
use crate::selection::DataObject;

/// Relative tolerance for edge comparisons, scaled by the domain extent.
const EDGE_TOL: f64 = 1e-9;

/// A named, immutable collection of grid patches over a uniform domain.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    domain_left_edge: [f64; 3],
    domain_right_edge: [f64; 3],
    domain_dimensions: [usize; 3],
    cell_width: [f64; 3],
    grids: Vec<Grid>,
    field_registry: FieldRegistry,
    particle_types: Vec<String>,
    filtered_types: Vec<String>,
    known_filters: FnvHashMap<String, ParticleFilter>,
}

impl Dataset {
    /// Start building a dataset over the unit cube. Callers set the domain
    /// dimensions and add grids before [`DatasetBuilder::build`].
    pub fn builder(name: &str) -> DatasetBuilder {
        DatasetBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain_left_edge(&self) -> [f64; 3] {
        self.domain_left_edge
    }

    pub fn domain_right_edge(&self) -> [f64; 3] {
        self.domain_right_edge
    }

    pub fn domain_dimensions(&self) -> [usize; 3] {
        self.domain_dimensions
    }

    pub fn grids(&self) -> &[Grid] {
        &self.grids
    }

    /// Raw on-grid fields, sorted by key.
    pub fn field_list(&self) -> Vec<FieldKey> {
        self.field_registry.field_list()
    }

    /// Every resolvable field, raw and derived, sorted by key.
    pub fn derived_field_list(&self) -> Vec<FieldKey> {
        self.field_registry.derived_field_list()
    }

    pub fn has_field(&self, field: &FieldKey) -> bool {
        self.field_registry.contains(field)
    }

    /// Particle types, raw and filtered, in attachment order after the
    /// sorted raw types.
    pub fn particle_types(&self) -> &[String] {
        &self.particle_types
    }

    /// Names of the filtered types attached to this dataset, in attachment
    /// order.
    pub fn filtered_types(&self) -> &[String] {
        &self.filtered_types
    }

    pub fn has_particle_type(&self, ptype: &str) -> bool {
        self.particle_types.iter().any(|t| t == ptype)
    }

    /// The filter behind an attached filtered type.
    pub fn known_filter(&self, name: &str) -> Option<&ParticleFilter> {
        self.known_filters.get(name)
    }

    /// All attached filters, sorted by name.
    pub fn filters(&self) -> Vec<&ParticleFilter> {
        let mut attached: Vec<&ParticleFilter> = self.known_filters.values().collect();
        attached.sort_by(|a, b| a.name().cmp(b.name()));
        attached
    }

    /// Attach a filter from the process-wide registry by name, creating a
    /// filtered particle type and its derived fields.
    ///
    /// When the filter's base type is itself a registered filter that is not
    /// yet attached, the dependency is attached first. Fails if the name is
    /// not registered, if a required field is missing
    /// ([`CribaError::IllDefinedFilter`]), or if the name would shadow a raw
    /// particle type.
    pub fn add_particle_filter(&mut self, name: &str) -> Result<()> {
        let filter = filters::get_filter(name).ok_or_else(|| CribaError::UnknownFilter {
            name: name.to_string(),
        })?;
        self.attach_filter(filter)
    }

    /// Attach a filter object directly, without consulting the process-wide
    /// registry for it. Dependencies named by `filtered_type` are still
    /// resolved through the registry.
    pub fn attach_filter(&mut self, filter: ParticleFilter) -> Result<()> {
        let mut chain = Vec::new();
        self.setup_filtered_type(filter, &mut chain)
    }

    fn setup_filtered_type(&mut self, filter: ParticleFilter, chain: &mut Vec<String>) -> Result<()> {
        let name = filter.name().to_string();
        if chain.iter().any(|seen| *seen == name) {
            chain.push(name);
            return Err(CribaError::FilterDependencyCycle {
                chain: std::mem::take(chain),
            });
        }
        chain.push(name.clone());

        if name == deposit::DEPOSIT_FTYPE {
            return Err(CribaError::ReservedTypeName { ptype: name });
        }
        let already_filtered = self.filtered_types.iter().any(|t| *t == name);
        if self.has_particle_type(&name) && !already_filtered {
            return Err(CribaError::FilterShadowsParticleType { name });
        }

        // attach the base type first when it is itself a registered filter
        if !self.has_particle_type(filter.filtered_type()) {
            if let Some(dependency) = filters::get_filter(filter.filtered_type()) {
                info!(
                    filter = %name,
                    dependency = %dependency.name(),
                    "attaching base filter for dependent filter"
                );
                self.setup_filtered_type(dependency, chain)?;
            }
        }
        if !self.has_particle_type(filter.filtered_type()) {
            return Err(CribaError::UnknownParticleType {
                ptype: filter.filtered_type().to_string(),
            });
        }

        let derived = self.derived_field_list();
        if !filter.available(&derived) {
            return Err(CribaError::IllDefinedFilter {
                filter: name,
                missing: filter.missing(&derived),
            });
        }

        // re-attachment replaces whatever the name mirrored before
        self.field_registry.remove_filtered_type(&name);
        for key in self.field_registry.fields_of_type(filter.filtered_type()) {
            self.field_registry.insert(FieldInfo::new(
                FieldKey::new(&name, &key.name),
                FieldKind::FilteredParticle {
                    source_type: filter.filtered_type().to_string(),
                },
            ));
        }
        deposit::register_deposit_fields(&mut self.field_registry, &name);

        if !self.has_particle_type(&name) {
            self.particle_types.push(name.clone());
        }
        if !already_filtered {
            self.filtered_types.push(name.clone());
        }
        info!(
            filter = %name,
            filtered_type = %filter.filtered_type(),
            "attached particle filter"
        );
        self.known_filters.insert(name, filter);
        Ok(())
    }

    /// Selection covering every particle in the dataset's grids.
    pub fn all_data(&self) -> DataObject<'_> {
        DataObject::all_data(self)
    }

    /// Selection covering the particles of one grid patch.
    pub fn grid(&self, index: usize) -> Result<DataObject<'_>> {
        if index >= self.grids.len() {
            return Err(CribaError::GridIndexOutOfRange {
                index,
                n_grids: self.grids.len(),
            });
        }
        Ok(DataObject::grid(self, index))
    }

    /// Rectangular selection aligned to the level-0 mesh: `dims` cells
    /// starting at `left_edge`. Only level 0 is supported.
    pub fn covering_grid(
        &self,
        level: u32,
        left_edge: [f64; 3],
        dims: [usize; 3],
    ) -> Result<DataObject<'_>> {
        if level != 0 {
            return Err(CribaError::UnsupportedLevel { level });
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(CribaError::InvalidDimensions { dims });
        }
        let right_edge: [f64; 3] =
            std::array::from_fn(|a| left_edge[a] + dims[a] as f64 * self.cell_width[a]);
        for axis in 0..3 {
            let tol = EDGE_TOL * (self.domain_right_edge[axis] - self.domain_left_edge[axis]);
            if left_edge[axis] < self.domain_left_edge[axis] - tol
                || right_edge[axis] > self.domain_right_edge[axis] + tol
            {
                return Err(CribaError::RegionOutsideDomain {
                    left_edge,
                    right_edge,
                });
            }
        }
        Ok(DataObject::region(self, left_edge, right_edge, dims))
    }

    /// Number of particles of `ptype` across the whole dataset.
    pub fn particle_count(&self, ptype: &str) -> Result<usize> {
        self.all_data().particle_count(ptype)
    }

    pub(crate) fn field_info(&self, field: &FieldKey) -> Option<&FieldInfo> {
        self.field_registry.get(field)
    }

    pub(crate) fn fields_of_type(&self, ftype: &str) -> Vec<FieldKey> {
        self.field_registry.fields_of_type(ftype)
    }

    pub(crate) fn cell_width(&self) -> [f64; 3] {
        self.cell_width
    }

    pub(crate) fn grid_by_id(&self, id: usize) -> Result<&Grid> {
        self.grids.get(id).ok_or(CribaError::GridIndexOutOfRange {
            index: id,
            n_grids: self.grids.len(),
        })
    }
}

/// Builder validating domain geometry, grid placement, and field consistency.
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    name: String,
    domain_left_edge: [f64; 3],
    domain_right_edge: [f64; 3],
    domain_dimensions: [usize; 3],
    grids: Vec<GridSpec>,
}

impl DatasetBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            domain_left_edge: [0.0; 3],
            domain_right_edge: [1.0; 3],
            domain_dimensions: [1; 3],
            grids: Vec::new(),
        }
    }

    /// Level-0 cell dimensions of the whole domain.
    pub fn domain_dimensions(mut self, dims: [usize; 3]) -> Self {
        self.domain_dimensions = dims;
        self
    }

    pub fn domain_edges(mut self, left: [f64; 3], right: [f64; 3]) -> Self {
        self.domain_left_edge = left;
        self.domain_right_edge = right;
        self
    }

    pub fn add_grid(mut self, spec: GridSpec) -> Self {
        self.grids.push(spec);
        self
    }

    /// Validate and assemble the dataset.
    ///
    /// Checks, in order: positive domain dimensions and ordered edges; each
    /// grid inside the domain with positive dimensions; no duplicate fields
    /// and equal array lengths per particle type on each grid; every grid
    /// carrying a type carries the same field set for it; particles inside
    /// their grid whenever the type has position fields.
    pub fn build(self) -> Result<Dataset> {
        let Self {
            name,
            domain_left_edge,
            domain_right_edge,
            domain_dimensions,
            grids: specs,
        } = self;

        if domain_dimensions.iter().any(|&d| d == 0) {
            return Err(CribaError::InvalidDimensions {
                dims: domain_dimensions,
            });
        }
        if (0..3).any(|a| domain_right_edge[a] <= domain_left_edge[a]) {
            return Err(CribaError::InvalidDomainBounds {
                left_edge: domain_left_edge,
                right_edge: domain_right_edge,
            });
        }
        let cell_width: [f64; 3] = std::array::from_fn(|a| {
            (domain_right_edge[a] - domain_left_edge[a]) / domain_dimensions[a] as f64
        });

        let mut grids = Vec::with_capacity(specs.len());
        for (id, spec) in specs.into_iter().enumerate() {
            let (left_edge, dims, fields) = spec.into_parts();
            if dims.iter().any(|&d| d == 0) {
                return Err(CribaError::InvalidDimensions { dims });
            }
            let right_edge: [f64; 3] =
                std::array::from_fn(|a| left_edge[a] + dims[a] as f64 * cell_width[a]);
            for axis in 0..3 {
                let tol = EDGE_TOL * (domain_right_edge[axis] - domain_left_edge[axis]);
                if left_edge[axis] < domain_left_edge[axis] - tol
                    || right_edge[axis] > domain_right_edge[axis] + tol
                {
                    return Err(CribaError::GridOutsideDomain { grid_id: id });
                }
            }

            let mut particles: FnvHashMap<FieldKey, Vec<f64>> = FnvHashMap::default();
            let mut type_lengths: FnvHashMap<String, usize> = FnvHashMap::default();
            for (key, values) in fields {
                if key.ftype == deposit::DEPOSIT_FTYPE {
                    return Err(CribaError::ReservedTypeName { ptype: key.ftype });
                }
                if particles.contains_key(&key) {
                    return Err(CribaError::DuplicateGridField { grid_id: id, field: key });
                }
                match type_lengths.get(&key.ftype) {
                    Some(&expected) if expected != values.len() => {
                        return Err(CribaError::FieldLengthMismatch {
                            grid_id: id,
                            field: key,
                            expected,
                            actual: values.len(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        type_lengths.insert(key.ftype.clone(), values.len());
                    }
                }
                particles.insert(key, values);
            }
            grids.push(Grid::new(id, left_edge, right_edge, dims, particles));
        }

        // union field set per particle type, and per-grid consistency
        let mut unions: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for grid in &grids {
            for key in grid.field_keys() {
                unions.entry(key.ftype).or_default().insert(key.name);
            }
        }
        for grid in &grids {
            let mut local: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for key in grid.field_keys() {
                local.entry(key.ftype).or_default().insert(key.name);
            }
            for (ptype, names) in &local {
                if names != &unions[ptype] {
                    return Err(CribaError::InconsistentGridFields {
                        grid_id: grid.id(),
                        ptype: ptype.clone(),
                    });
                }
            }
        }

        // particles must sit inside their grid when the type has positions
        for grid in &grids {
            for (ptype, names) in &unions {
                if !POSITION_FIELDS.iter().all(|p| names.contains(*p)) {
                    continue;
                }
                let (Some(px), Some(py), Some(pz)) = (
                    grid.field(&FieldKey::new(ptype, POSITION_FIELDS[0])),
                    grid.field(&FieldKey::new(ptype, POSITION_FIELDS[1])),
                    grid.field(&FieldKey::new(ptype, POSITION_FIELDS[2])),
                ) else {
                    continue;
                };
                for i in 0..px.len() {
                    if !grid.contains_point([px[i], py[i], pz[i]]) {
                        return Err(CribaError::ParticleOutsideGrid {
                            grid_id: grid.id(),
                            ptype: ptype.clone(),
                            index: i,
                        });
                    }
                }
            }
        }

        let mut field_registry = FieldRegistry::new();
        for (ptype, names) in &unions {
            for field_name in names {
                field_registry.insert(FieldInfo::new(
                    FieldKey::new(ptype, field_name),
                    FieldKind::Particle,
                ));
            }
        }
        for ptype in unions.keys() {
            deposit::register_deposit_fields(&mut field_registry, ptype);
        }

        let particle_types: Vec<String> = unions.keys().cloned().collect();
        debug!(
            dataset = %name,
            grids = grids.len(),
            types = particle_types.len(),
            fields = field_registry.len(),
            "dataset built"
        );
        Ok(Dataset {
            name,
            domain_left_edge,
            domain_right_edge,
            domain_dimensions,
            cell_width,
            grids,
            field_registry,
            particle_types,
            filtered_types: Vec::new(),
            known_filters: FnvHashMap::default(),
        })
    }
}
