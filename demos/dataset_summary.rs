//! Build a dataset with an attached filter and emit its JSON summary,
//! optionally writing it to a file given as the first argument.

use anyhow::{Context, Result};
use criba::{filters, Dataset, DatasetSummary, GridSpec, ParticleFilter, ParticleSource};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    filters::add_particle_filter(
        "young",
        |filter: &ParticleFilter, data: &dyn ParticleSource| {
            let age = data.field(&(filter.filtered_type(), "creation_time").into())?;
            Ok(age.as_slice().iter().map(|&t| t > 0.5).collect())
        },
        &["creation_time"],
        "all",
    )?;

    let mut ds = Dataset::builder("summary-demo")
        .domain_dimensions([4, 4, 4])
        .add_grid(
            GridSpec::new([0.0, 0.0, 0.0], [4, 4, 4])
                .with_field(("all", "particle_mass"), vec![1.0, 2.0, 4.0])
                .with_field(("all", "creation_time"), vec![0.2, 0.7, 0.9])
                .with_field(("all", "particle_position_x"), vec![0.25, 0.5, 0.75])
                .with_field(("all", "particle_position_y"), vec![0.25, 0.5, 0.75])
                .with_field(("all", "particle_position_z"), vec![0.25, 0.5, 0.75]),
        )
        .build()?;
    ds.add_particle_filter("young")?;

    let summary = DatasetSummary::from_dataset(&ds)?;
    match std::env::args().nth(1) {
        Some(path) => {
            summary
                .write_json(&path)
                .with_context(|| format!("writing summary to {path}"))?;
            eprintln!("summary written to {path}");
        }
        None => println!("{}", summary.to_json()?),
    }
    Ok(())
}
