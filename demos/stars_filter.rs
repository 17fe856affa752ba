//! Register a mass-threshold filter, attach it to a small dataset, and walk
//! through the derived fields it unlocks.
//!
//! Run with `RUST_LOG=info` to watch the attachment happen.

use anyhow::Result;
use criba::{filters, Dataset, FieldKey, GridSpec, ParticleFilter, ParticleSource};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // "stars" selects everything above half a mass unit, process-wide
    filters::add_particle_filter(
        "stars",
        |filter: &ParticleFilter, data: &dyn ParticleSource| {
            let mass = data.field(&(filter.filtered_type(), "particle_mass").into())?;
            Ok(mass.as_slice().iter().map(|&m| m > 0.5).collect())
        },
        &["particle_mass"],
        "all",
    )?;

    let mut ds = Dataset::builder("demo")
        .domain_dimensions([8, 8, 8])
        .add_grid(
            GridSpec::new([0.0, 0.0, 0.0], [4, 8, 8])
                .with_field(("all", "particle_mass"), vec![0.1, 0.6, 0.3, 0.9])
                .with_field(("all", "particle_position_x"), vec![0.05, 0.15, 0.25, 0.45])
                .with_field(("all", "particle_position_y"), vec![0.5, 0.5, 0.5, 0.5])
                .with_field(("all", "particle_position_z"), vec![0.5, 0.5, 0.5, 0.5]),
        )
        .add_grid(
            GridSpec::new([0.5, 0.0, 0.0], [4, 8, 8])
                .with_field(("all", "particle_mass"), vec![0.7, 0.2])
                .with_field(("all", "particle_position_x"), vec![0.55, 0.95])
                .with_field(("all", "particle_position_y"), vec![0.5, 0.5])
                .with_field(("all", "particle_position_z"), vec![0.5, 0.5]),
        )
        .build()?;

    ds.add_particle_filter("stars")?;

    println!("particle types: {:?}", ds.particle_types());
    println!(
        "all: {} particles, stars: {}",
        ds.particle_count("all")?,
        ds.particle_count("stars")?
    );

    let star_masses = ds.all_data().field(&FieldKey::new("stars", "particle_mass"))?;
    println!("star masses: {:?}", star_masses.as_slice());

    let deposited = ds
        .all_data()
        .field(&FieldKey::new("deposit", "stars_cic"))?;
    println!(
        "stars_cic mesh: shape {:?}, total mass {:.3}",
        deposited.shape(),
        deposited.total()
    );

    let stats = ds
        .all_data()
        .field_stats(&FieldKey::new("stars", "particle_mass"))?;
    println!(
        "star mass stats: mean {:.3}, min {:.3}, max {:.3}",
        stats.mean, stats.min, stats.max
    );
    Ok(())
}
