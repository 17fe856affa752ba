//! Rectangular grid patches and their raw particle storage.
//!
//! A dataset's domain is tiled by non-overlapping level-0 patches. Each patch
//! stores the raw particle fields of the particles it contains; everything
//! derived (filtered types, deposition) is computed on demand by selections.

use fnv::FnvHashMap;

use crate::fields::FieldKey;

/// Input description of one grid patch for
/// [`crate::dataset::DatasetBuilder::add_grid`].
///
/// The right edge is not given; it follows from the cell dimensions and the
/// domain's cell width, which keeps patches aligned to the domain mesh.
#[derive(Debug, Clone)]
pub struct GridSpec {
    left_edge: [f64; 3],
    dims: [usize; 3],
    fields: Vec<(FieldKey, Vec<f64>)>,
}

impl GridSpec {
    pub fn new(left_edge: [f64; 3], dims: [usize; 3]) -> Self {
        Self {
            left_edge,
            dims,
            fields: Vec::new(),
        }
    }

    /// Attach a raw particle field, builder style.
    pub fn with_field(mut self, field: impl Into<FieldKey>, values: Vec<f64>) -> Self {
        self.add_field(field, values);
        self
    }

    /// Attach a raw particle field.
    pub fn add_field(&mut self, field: impl Into<FieldKey>, values: Vec<f64>) {
        self.fields.push((field.into(), values));
    }

    pub fn left_edge(&self) -> [f64; 3] {
        self.left_edge
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub(crate) fn into_parts(self) -> ([f64; 3], [usize; 3], Vec<(FieldKey, Vec<f64>)>) {
        (self.left_edge, self.dims, self.fields)
    }
}

/// One level-0 patch of the domain, holding raw particle fields.
#[derive(Debug, Clone)]
pub struct Grid {
    id: usize,
    level: u32,
    left_edge: [f64; 3],
    right_edge: [f64; 3],
    dims: [usize; 3],
    particles: FnvHashMap<FieldKey, Vec<f64>>,
}

impl Grid {
    pub(crate) fn new(
        id: usize,
        left_edge: [f64; 3],
        right_edge: [f64; 3],
        dims: [usize; 3],
        particles: FnvHashMap<FieldKey, Vec<f64>>,
    ) -> Self {
        Self {
            id,
            level: 0,
            left_edge,
            right_edge,
            dims,
            particles,
        }
    }

    /// Position of the grid in the dataset's grid list.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Refinement level; always 0 for now.
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn left_edge(&self) -> [f64; 3] {
        self.left_edge
    }

    pub fn right_edge(&self) -> [f64; 3] {
        self.right_edge
    }

    /// Cell dimensions of the patch.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Raw values of `field` for the particles stored on this patch, if the
    /// patch carries the field's type.
    pub fn field(&self, field: &FieldKey) -> Option<&[f64]> {
        self.particles.get(field).map(Vec::as_slice)
    }

    pub fn has_field(&self, field: &FieldKey) -> bool {
        self.particles.contains_key(field)
    }

    /// Keys of all stored fields, sorted.
    pub fn field_keys(&self) -> Vec<FieldKey> {
        let mut keys: Vec<FieldKey> = self.particles.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Particle types stored on this patch, sorted and deduplicated.
    pub fn particle_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.particles.keys().map(|k| k.ftype.clone()).collect();
        types.sort();
        types.dedup();
        types
    }

    /// Number of stored particles of `ptype`; zero when the patch does not
    /// carry the type.
    pub fn particle_count(&self, ptype: &str) -> usize {
        self.particles
            .iter()
            .find(|(key, _)| key.ftype == ptype)
            .map_or(0, |(_, values)| values.len())
    }

    /// Whether `point` lies inside the patch. Edges are half-open: the left
    /// face belongs to the patch, the right face does not.
    pub fn contains_point(&self, point: [f64; 3]) -> bool {
        (0..3).all(|axis| point[axis] >= self.left_edge[axis] && point[axis] < self.right_edge[axis])
    }

    /// Whether the patch intersects the half-open box `[left, right)`.
    pub(crate) fn overlaps(&self, left: &[f64; 3], right: &[f64; 3]) -> bool {
        (0..3).all(|axis| self.left_edge[axis] < right[axis] && self.right_edge[axis] > left[axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slab() -> Grid {
        let mut particles = FnvHashMap::default();
        particles.insert(
            FieldKey::new("io", "particle_mass"),
            vec![1.0, 2.0, 3.0],
        );
        particles.insert(
            FieldKey::new("io", "particle_position_x"),
            vec![0.1, 0.2, 0.3],
        );
        particles.insert(FieldKey::new("tracers", "particle_index"), vec![7.0]);
        Grid::new(
            2,
            [0.0, 0.0, 0.0],
            [0.5, 1.0, 1.0],
            [8, 16, 16],
            particles,
        )
    }

    #[test]
    fn test_field_lookup() {
        let grid = slab();
        let mass = grid.field(&FieldKey::new("io", "particle_mass")).unwrap();
        assert_eq!(mass, [1.0, 2.0, 3.0]);
        assert!(grid.field(&FieldKey::new("io", "creation_time")).is_none());
    }

    #[test]
    fn test_particle_types_sorted_unique() {
        assert_eq!(slab().particle_types(), ["io", "tracers"]);
    }

    #[test]
    fn test_particle_count_per_type() {
        let grid = slab();
        assert_eq!(grid.particle_count("io"), 3);
        assert_eq!(grid.particle_count("tracers"), 1);
        assert_eq!(grid.particle_count("stars"), 0);
    }

    #[test]
    fn test_contains_point_half_open() {
        let grid = slab();
        assert!(grid.contains_point([0.0, 0.0, 0.0]));
        assert!(grid.contains_point([0.499, 0.999, 0.999]));
        // right face belongs to the next patch
        assert!(!grid.contains_point([0.5, 0.5, 0.5]));
        assert!(!grid.contains_point([0.25, 1.0, 0.5]));
    }

    #[test]
    fn test_overlaps_excludes_touching_faces() {
        let grid = slab();
        assert!(grid.overlaps(&[0.25, 0.0, 0.0], &[0.75, 1.0, 1.0]));
        // region starting exactly at the right edge shares no volume
        assert!(!grid.overlaps(&[0.5, 0.0, 0.0], &[1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_spec_collects_fields() {
        let spec = GridSpec::new([0.0, 0.0, 0.0], [4, 4, 4])
            .with_field(("io", "particle_mass"), vec![1.0])
            .with_field(("io", "particle_position_x"), vec![0.5]);
        let (left, dims, fields) = spec.into_parts();
        assert_eq!(left, [0.0, 0.0, 0.0]);
        assert_eq!(dims, [4, 4, 4]);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, FieldKey::new("io", "particle_mass"));
    }
}
