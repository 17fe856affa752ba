//! Shared fixtures for integration tests.
#![allow(dead_code)]

use criba::{Dataset, GridSpec};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Particle fields every fixture dataset carries under the `"all"` type.
pub const FIXTURE_FIELDS: [&str; 5] = [
    "creation_time",
    "particle_mass",
    "particle_position_x",
    "particle_position_y",
    "particle_position_z",
];

/// Build a small snapshot-like dataset: a unit cube with `domain_dim`^3
/// level-0 cells split into `n_slabs` x-slabs, and `n_particles` particles
/// scattered uniformly with random masses and creation times.
///
/// `domain_dim` must be divisible by `n_slabs`. The seed fixes the particle
/// layout so tests can assert exact counts.
pub fn random_dataset(
    name: &str,
    domain_dim: usize,
    n_slabs: usize,
    n_particles: usize,
    seed: u64,
) -> Dataset {
    assert_eq!(domain_dim % n_slabs, 0, "slabs must tile the domain evenly");
    let mut rng = StdRng::seed_from_u64(seed);

    struct Slab {
        px: Vec<f64>,
        py: Vec<f64>,
        pz: Vec<f64>,
        mass: Vec<f64>,
        creation_time: Vec<f64>,
    }
    let mut slabs: Vec<Slab> = (0..n_slabs)
        .map(|_| Slab {
            px: Vec::new(),
            py: Vec::new(),
            pz: Vec::new(),
            mass: Vec::new(),
            creation_time: Vec::new(),
        })
        .collect();

    for _ in 0..n_particles {
        let x: f64 = rng.gen();
        let slab = ((x * n_slabs as f64) as usize).min(n_slabs - 1);
        slabs[slab].px.push(x);
        slabs[slab].py.push(rng.gen());
        slabs[slab].pz.push(rng.gen());
        slabs[slab].mass.push(rng.gen());
        slabs[slab].creation_time.push(rng.gen());
    }

    let slab_width = 1.0 / n_slabs as f64;
    let slab_dims = [domain_dim / n_slabs, domain_dim, domain_dim];
    let mut builder = Dataset::builder(name).domain_dimensions([domain_dim; 3]);
    for (i, slab) in slabs.into_iter().enumerate() {
        builder = builder.add_grid(
            GridSpec::new([i as f64 * slab_width, 0.0, 0.0], slab_dims)
                .with_field(("all", "particle_mass"), slab.mass)
                .with_field(("all", "creation_time"), slab.creation_time)
                .with_field(("all", "particle_position_x"), slab.px)
                .with_field(("all", "particle_position_y"), slab.py)
                .with_field(("all", "particle_position_z"), slab.pz),
        );
    }
    builder.build().expect("fixture dataset is well formed")
}

/// Masses of every particle in dataset order, for computing expected filter
/// results by hand.
pub fn all_masses(ds: &Dataset) -> Vec<f64> {
    ds.all_data()
        .field(&("all", "particle_mass").into())
        .expect("fixture carries particle_mass")
        .into_vec()
}
