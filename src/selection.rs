//! Data selections: the objects filters and deposition actually run against.
//!
//! A [`DataObject`] pairs a dataset with a selection (everything, one grid,
//! or a mesh-aligned region) and resolves field keys to values. Filtered
//! fields gather their base type through the same selection and apply the
//! filter's mask, so filters compose with any selection and with each other.

use tracing::debug;

use crate::dataset::Dataset;
use crate::deposit::{self, DepositMethod};
use crate::error::{CribaError, Result};
use crate::fields::{FieldArray, FieldKey, FieldKind, POSITION_FIELDS};
use crate::grid::Grid;
use crate::stats::{self, FieldStats};

/// Anything that can serve per-particle field values. Filter predicates take
/// their input through this trait, which keeps them reusable across whole
/// datasets, single grids, and regions.
pub trait ParticleSource {
    /// Fetch the values of `field` for every particle in this selection.
    fn field(&self, field: &FieldKey) -> Result<FieldArray>;
}

#[derive(Debug, Clone, PartialEq)]
enum Selection {
    AllData,
    Grid(usize),
    Region {
        left_edge: [f64; 3],
        right_edge: [f64; 3],
        dims: [usize; 3],
    },
}

/// One selection over one dataset. Created by [`Dataset::all_data`],
/// [`Dataset::grid`], or [`Dataset::covering_grid`].
#[derive(Debug, Clone)]
pub struct DataObject<'a> {
    ds: &'a Dataset,
    selection: Selection,
}

impl<'a> DataObject<'a> {
    pub(crate) fn all_data(ds: &'a Dataset) -> Self {
        Self {
            ds,
            selection: Selection::AllData,
        }
    }

    pub(crate) fn grid(ds: &'a Dataset, id: usize) -> Self {
        Self {
            ds,
            selection: Selection::Grid(id),
        }
    }

    pub(crate) fn region(
        ds: &'a Dataset,
        left_edge: [f64; 3],
        right_edge: [f64; 3],
        dims: [usize; 3],
    ) -> Self {
        Self {
            ds,
            selection: Selection::Region {
                left_edge,
                right_edge,
                dims,
            },
        }
    }

    pub fn dataset(&self) -> &Dataset {
        self.ds
    }

    /// Resolve `field` for this selection.
    ///
    /// Raw particle fields are gathered from the selected grids in grid
    /// order. Filtered fields gather the base type and keep the particles
    /// the filter's mask admits. Deposition fields scatter the source type
    /// onto the selection's mesh and come back mesh-shaped.
    pub fn field(&self, field: &FieldKey) -> Result<FieldArray> {
        let info = self
            .ds
            .field_info(field)
            .ok_or_else(|| CribaError::UnknownField {
                field: field.clone(),
            })?;
        match info.kind.clone() {
            FieldKind::Particle => self.raw_field(field),
            FieldKind::FilteredParticle { source_type } => {
                self.filtered_field(field, &source_type)
            }
            FieldKind::Deposit {
                source_type,
                method,
            } => self.deposited_field(&source_type, method),
        }
    }

    /// Number of particles of `ptype` in this selection. For filtered types
    /// this evaluates the filter.
    pub fn particle_count(&self, ptype: &str) -> Result<usize> {
        let fields = self.ds.fields_of_type(ptype);
        let probe = fields
            .first()
            .ok_or_else(|| CribaError::UnknownParticleType {
                ptype: ptype.to_string(),
            })?;
        Ok(self.field(probe)?.len())
    }

    /// Summary statistics of `field` over this selection.
    pub fn field_stats(&self, field: &FieldKey) -> Result<FieldStats> {
        Ok(stats::field_stats(self.field(field)?.as_slice()))
    }

    fn raw_field(&self, field: &FieldKey) -> Result<FieldArray> {
        let mut values = Vec::new();
        match &self.selection {
            Selection::AllData => {
                for grid in self.ds.grids() {
                    if let Some(stored) = grid.field(field) {
                        values.extend_from_slice(stored);
                    }
                }
            }
            Selection::Grid(id) => {
                let grid = self.ds.grid_by_id(*id)?;
                if let Some(stored) = grid.field(field) {
                    values.extend_from_slice(stored);
                }
            }
            Selection::Region {
                left_edge,
                right_edge,
                ..
            } => {
                for grid in self.ds.grids() {
                    if !grid.overlaps(left_edge, right_edge) {
                        continue;
                    }
                    let Some(stored) = grid.field(field) else {
                        continue;
                    };
                    for index in region_indices(grid, &field.ftype, left_edge, right_edge)? {
                        values.push(stored[index]);
                    }
                }
            }
        }
        Ok(FieldArray::particle(values))
    }

    fn filtered_field(&self, field: &FieldKey, source_type: &str) -> Result<FieldArray> {
        let filter =
            self.ds
                .known_filter(&field.ftype)
                .ok_or_else(|| CribaError::UnknownFilter {
                    name: field.ftype.clone(),
                })?;
        let mask = filter.mask(self)?;
        let base = self.field(&FieldKey::new(source_type, &field.name))?;
        if mask.len() != base.len() {
            return Err(CribaError::MaskLengthMismatch {
                filter: filter.name().to_string(),
                expected: base.len(),
                actual: mask.len(),
            });
        }
        let selected = mask.iter().filter(|&&keep| keep).count();
        debug!(
            filter = %filter.name(),
            selected,
            total = mask.len(),
            "applied particle filter"
        );
        let values = base
            .as_slice()
            .iter()
            .zip(&mask)
            .filter_map(|(&value, &keep)| keep.then_some(value))
            .collect();
        Ok(FieldArray::particle(values))
    }

    fn deposited_field(&self, source_type: &str, method: DepositMethod) -> Result<FieldArray> {
        let (left_edge, dims) = self.mesh_geometry()?;
        let px = self.field(&FieldKey::new(source_type, POSITION_FIELDS[0]))?;
        let py = self.field(&FieldKey::new(source_type, POSITION_FIELDS[1]))?;
        let pz = self.field(&FieldKey::new(source_type, POSITION_FIELDS[2]))?;
        let masses = if method.requires_mass() {
            Some(self.field(&FieldKey::new(source_type, "particle_mass"))?)
        } else {
            None
        };
        let mesh = deposit::deposit(
            method,
            px.as_slice(),
            py.as_slice(),
            pz.as_slice(),
            masses.as_ref().map(FieldArray::as_slice),
            left_edge,
            dims,
            self.ds.cell_width(),
        );
        debug!(
            source = %source_type,
            method = ?method,
            particles = px.len(),
            cells = mesh.len(),
            "deposited particles onto mesh"
        );
        Ok(FieldArray::mesh(mesh, dims))
    }

    /// Mesh anchor and cell dimensions for deposition onto this selection.
    fn mesh_geometry(&self) -> Result<([f64; 3], [usize; 3])> {
        match &self.selection {
            Selection::AllData => Ok((self.ds.domain_left_edge(), self.ds.domain_dimensions())),
            Selection::Grid(id) => {
                let grid = self.ds.grid_by_id(*id)?;
                Ok((grid.left_edge(), grid.dims()))
            }
            Selection::Region {
                left_edge, dims, ..
            } => Ok((*left_edge, *dims)),
        }
    }
}

impl ParticleSource for DataObject<'_> {
    fn field(&self, field: &FieldKey) -> Result<FieldArray> {
        DataObject::field(self, field)
    }
}

/// Indices of the particles of `ptype` on `grid` that fall inside the
/// half-open box `[left, right)`. Requires the type's position fields.
fn region_indices(
    grid: &Grid,
    ptype: &str,
    left: &[f64; 3],
    right: &[f64; 3],
) -> Result<Vec<usize>> {
    let mut positions = Vec::with_capacity(3);
    for axis_field in POSITION_FIELDS {
        let key = FieldKey::new(ptype, axis_field);
        match grid.field(&key) {
            Some(stored) => positions.push(stored),
            None => return Err(CribaError::UnknownField { field: key }),
        }
    }
    Ok((0..positions[0].len())
        .filter(|&i| {
            (0..3).all(|axis| positions[axis][i] >= left[axis] && positions[axis][i] < right[axis])
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridSpec;

    fn corner_dataset() -> Dataset {
        // four particles along x in a 4x4x4 unit domain, two grids
        Dataset::builder("selection_unit")
            .domain_dimensions([4, 4, 4])
            .add_grid(
                GridSpec::new([0.0, 0.0, 0.0], [2, 4, 4])
                    .with_field(("all", "particle_mass"), vec![1.0, 2.0])
                    .with_field(("all", "particle_position_x"), vec![0.1, 0.4])
                    .with_field(("all", "particle_position_y"), vec![0.1, 0.1])
                    .with_field(("all", "particle_position_z"), vec![0.1, 0.1]),
            )
            .add_grid(
                GridSpec::new([0.5, 0.0, 0.0], [2, 4, 4])
                    .with_field(("all", "particle_mass"), vec![4.0, 8.0])
                    .with_field(("all", "particle_position_x"), vec![0.6, 0.9])
                    .with_field(("all", "particle_position_y"), vec![0.1, 0.1])
                    .with_field(("all", "particle_position_z"), vec![0.1, 0.1]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_all_data_concatenates_in_grid_order() {
        let ds = corner_dataset();
        let mass = ds
            .all_data()
            .field(&FieldKey::new("all", "particle_mass"))
            .unwrap();
        assert_eq!(mass.as_slice(), [1.0, 2.0, 4.0, 8.0]);
        assert_eq!(mass.shape(), &[4]);
    }

    #[test]
    fn test_grid_selection_sees_own_particles_only() {
        let ds = corner_dataset();
        let mass = ds
            .grid(1)
            .unwrap()
            .field(&FieldKey::new("all", "particle_mass"))
            .unwrap();
        assert_eq!(mass.as_slice(), [4.0, 8.0]);
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let ds = corner_dataset();
        assert!(matches!(
            ds.all_data().field(&FieldKey::new("all", "velocity")),
            Err(CribaError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_region_selects_half_open_box() {
        let ds = corner_dataset();
        // left half of the domain along x
        let region = ds.covering_grid(0, [0.0, 0.0, 0.0], [2, 4, 4]).unwrap();
        let mass = region.field(&FieldKey::new("all", "particle_mass")).unwrap();
        assert_eq!(mass.as_slice(), [1.0, 2.0]);
    }

    #[test]
    fn test_region_spanning_grids_gathers_both() {
        let ds = corner_dataset();
        // middle half: [0.25, 0.75) along x
        let region = ds.covering_grid(0, [0.25, 0.0, 0.0], [2, 4, 4]).unwrap();
        let mass = region.field(&FieldKey::new("all", "particle_mass")).unwrap();
        assert_eq!(mass.as_slice(), [2.0, 4.0]);
    }

    #[test]
    fn test_particle_count_per_selection() {
        let ds = corner_dataset();
        assert_eq!(ds.all_data().particle_count("all").unwrap(), 4);
        assert_eq!(ds.grid(0).unwrap().particle_count("all").unwrap(), 2);
        assert!(matches!(
            ds.all_data().particle_count("ghosts"),
            Err(CribaError::UnknownParticleType { .. })
        ));
    }

    #[test]
    fn test_count_deposition_shape_matches_selection() {
        let ds = corner_dataset();
        let counts = ds
            .all_data()
            .field(&FieldKey::new("deposit", "all_count"))
            .unwrap();
        assert_eq!(counts.shape(), &[4, 4, 4]);
        assert_eq!(counts.total(), 4.0);

        let grid_counts = ds
            .grid(0)
            .unwrap()
            .field(&FieldKey::new("deposit", "all_count"))
            .unwrap();
        assert_eq!(grid_counts.shape(), &[2, 4, 4]);
        assert_eq!(grid_counts.total(), 2.0);
    }

    #[test]
    fn test_ngp_deposition_places_mass_by_position() {
        let ds = corner_dataset();
        let mesh = ds
            .all_data()
            .field(&FieldKey::new("deposit", "all_mass"))
            .unwrap();
        // particles at x = 0.1 and 0.4 land in cells 0 and 1
        assert_eq!(mesh.cell(0, 0, 0), Some(1.0));
        assert_eq!(mesh.cell(1, 0, 0), Some(2.0));
        assert_eq!(mesh.cell(2, 0, 0), Some(4.0));
        assert_eq!(mesh.cell(3, 0, 0), Some(8.0));
        assert!((mesh.total() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_length_mask_is_rejected() {
        use crate::filters::ParticleFilter;

        let mut ds = corner_dataset();
        let bogus = ParticleFilter::builder("bogus")
            .build(|_, _| Ok(vec![true]))
            .unwrap();
        ds.attach_filter(bogus).unwrap();

        let result = ds
            .all_data()
            .field(&FieldKey::new("bogus", "particle_mass"));
        assert!(matches!(
            result,
            Err(CribaError::MaskLengthMismatch {
                expected: 4,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_field_stats_over_selection() {
        let ds = corner_dataset();
        let stats = ds
            .all_data()
            .field_stats(&FieldKey::new("all", "particle_mass"))
            .unwrap();
        assert_eq!(stats.count, 4);
        assert!((stats.mean - 3.75).abs() < 1e-5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 8.0);
    }
}
