use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use xfeldose::Simulation;
use xfeldose::io::{read_run_config, write_dose_profile, write_summary};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        bail!("Usage: {} <run.json>", args[0]);
    }
    let config_path = PathBuf::from(&args[1]);
    let config = read_run_config(&config_path)?;

    let geometry = config.crystal.build()?;
    let (bbox_min, bbox_max) = geometry.bbox();
    log::info!(
        "Crystal bounding box {bbox_min:.1} .. {bbox_max:.1} nm, {} triangles",
        geometry.polyhedron().triangles().len()
    );

    let every = (config.simulation.num_photons / 10).max(1);
    let simulation = Simulation::new(
        geometry,
        config.beam.clone(),
        config.simulation.clone(),
        &config.coefficients,
        config.locator(),
    )?;
    let result = simulation.run_with_progress(every, |p| {
        log::info!(
            "{}/{} photons, {} interacted, {:.1} keV in crystal",
            p.photons_done,
            p.num_photons,
            p.photons_absorbed,
            p.crystal_kev
        );
    })?;

    let report = result.report();
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;
    let summary_path = config.output_dir.join("summary.csv");
    write_summary(&summary_path, &report)?;
    write_dose_profile(&config.output_dir.join("dose_profile.csv"), &report)?;

    log::info!(
        "Dose {:.3} MGy ({:.3} MGy within the pulse), diffraction efficiency {:.3e}",
        report.total_dose_mgy,
        report.dose_within_pulse_mgy,
        report.diffraction_efficiency
    );
    log::info!("Results written to {}", config.output_dir.display());
    Ok(())
}
