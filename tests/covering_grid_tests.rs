//! Integration tests for covering-grid selections, including their
//! interaction with filtered particle types.

mod utils;

use criba::filters;
use criba::{FieldKey, FilterMask, ParticleFilter, ParticleSource, Result};
use serial_test::serial;
use utils::random_dataset;

fn heavy(filter: &ParticleFilter, data: &dyn ParticleSource) -> Result<FilterMask> {
    let mass = data.field(&(filter.filtered_type(), "particle_mass").into())?;
    Ok(mass.as_slice().iter().map(|&m| m > 0.5).collect())
}

#[test]
#[serial]
fn test_covering_grid_matches_each_grid_for_filtered_types() {
    filters::add_particle_filter("heavy_stars", heavy, &["particle_mass"], "all").unwrap();
    let mut ds = random_dataset("cover_per_grid", 16, 8, 64, 19);
    ds.add_particle_filter("heavy_stars").unwrap();

    let field = FieldKey::new("heavy_stars", "particle_mass");
    for index in 0..ds.grids().len() {
        let (level, left_edge, dims) = {
            let grid = &ds.grids()[index];
            (grid.level(), grid.left_edge(), grid.dims())
        };
        let covering = ds.covering_grid(level, left_edge, dims).unwrap();
        let from_region = covering.field(&field).unwrap();
        let from_grid = ds.grid(index).unwrap().field(&field).unwrap();

        assert_eq!(
            from_region.as_slice(),
            from_grid.as_slice(),
            "grid {index} selects different particles than its covering grid"
        );
    }
}

#[test]
#[serial]
fn test_whole_domain_covering_grid_equals_all_data() {
    filters::add_particle_filter("cover_stars", heavy, &["particle_mass"], "all").unwrap();
    let mut ds = random_dataset("cover_all", 16, 8, 32, 31);
    ds.add_particle_filter("cover_stars").unwrap();

    let covering = ds
        .covering_grid(0, ds.domain_left_edge(), ds.domain_dimensions())
        .unwrap();
    for field in [
        FieldKey::new("all", "particle_mass"),
        FieldKey::new("all", "particle_position_x"),
        FieldKey::new("cover_stars", "particle_mass"),
    ] {
        let whole = covering.field(&field).unwrap();
        let all = ds.all_data().field(&field).unwrap();
        assert_eq!(whole.as_slice(), all.as_slice(), "field {field} differs");
    }
}

#[test]
fn test_half_domains_partition_the_particles() {
    let ds = random_dataset("cover_halves", 16, 8, 48, 37);
    let field = FieldKey::new("all", "particle_mass");

    let left = ds.covering_grid(0, [0.0, 0.0, 0.0], [8, 16, 16]).unwrap();
    let right = ds.covering_grid(0, [0.5, 0.0, 0.0], [8, 16, 16]).unwrap();

    let n_left = left.field(&field).unwrap().len();
    let n_right = right.field(&field).unwrap().len();
    let total = ds.all_data().field(&field).unwrap().len();
    assert_eq!(n_left + n_right, total);
}

#[test]
#[serial]
fn test_covering_grid_deposition_shape_and_total() {
    filters::add_particle_filter("cover_dep", heavy, &["particle_mass"], "all").unwrap();
    let mut ds = random_dataset("cover_dep_ds", 16, 8, 64, 41);
    ds.add_particle_filter("cover_dep").unwrap();

    let covering = ds.covering_grid(0, [0.0, 0.0, 0.0], [8, 16, 16]).unwrap();
    let counts = covering
        .field(&FieldKey::new("deposit", "cover_dep_count"))
        .unwrap();
    assert_eq!(counts.shape(), &[8, 16, 16]);

    let in_region = covering
        .field(&FieldKey::new("cover_dep", "particle_mass"))
        .unwrap()
        .len();
    assert!((counts.total() - in_region as f64).abs() < 1e-9);
}

#[test]
fn test_region_counts_respect_selection() {
    let ds = random_dataset("cover_counts", 16, 4, 40, 43);
    // first slab only
    let slab = ds.covering_grid(0, [0.0, 0.0, 0.0], [4, 16, 16]).unwrap();
    let from_region = slab.particle_count("all").unwrap();
    let from_grid = ds.grid(0).unwrap().particle_count("all").unwrap();
    assert_eq!(from_region, from_grid);
}
