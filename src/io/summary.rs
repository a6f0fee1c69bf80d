//! CSV result files.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::sim::report::DoseReport;

pub const SUMMARY_HEADER: &str = "Dose (MGy),Photons simulated,RADDOSE-style dose (MGy),\
Compton dose (MGy),Escaped energy (MGy),Surrounding electron dose (MGy),Diffraction efficiency";

pub const PROFILE_HEADER: &str = "Time (fs),Dose (MGy),Photon dose (MGy),Electron dose (MGy),\
Surrounding electron dose (MGy),Cumulative ionisations per atom";

/// Summary record matching [`SUMMARY_HEADER`].
pub fn summary_line(report: &DoseReport) -> String {
    format!(
        "{:.6e},{},{:.6e},{:.6e},{:.6e},{:.6e},{:.6e}",
        report.total_dose_mgy,
        report.photons_simulated,
        report.raddose_dose_mgy,
        report.compton_dose_mgy,
        report.escaped_mgy,
        report.surrounding_electron_mgy,
        report.diffraction_efficiency
    )
}

/// Writes the header and the summary record.
pub fn write_summary(path: &Path, report: &DoseReport) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{SUMMARY_HEADER}")?;
    writeln!(writer, "{}", summary_line(report))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write summary to: {}", path.display()))?;
    Ok(())
}

/// Writes one row per time bin.
pub fn write_dose_profile(path: &Path, report: &DoseReport) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{PROFILE_HEADER}")?;
    for i in 0..report.dose_mgy.len() {
        writeln!(
            writer,
            "{},{:.6e},{:.6e},{:.6e},{:.6e},{:.6e}",
            report.bin_start_fs(i),
            report.dose_mgy[i],
            report.photon_dose_mgy[i],
            report.electron_dose_mgy[i],
            report.surrounding_electron_dose_mgy[i],
            report.cumulative_ionisations_per_atom[i]
        )?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write dose profile to: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::coefficients::{Medium, PhotonCoefficients};
    use crate::sim::dose::DoseAccumulator;
    use crate::sim::report::Normalization;
    use tempfile::tempdir;

    fn report() -> DoseReport {
        let mut dose = DoseAccumulator::new(1.0, 0);
        dose.add_photon(0.2, 4.0);
        dose.add_electron(1.2, 8.0, Medium::Crystal, false);
        dose.add_ionisation(0.2);
        let norm = Normalization {
            beam_energy_kev: 12.0,
            physical_photons: 1.0e10,
            photons_simulated: 10,
            exposed_volume_nm3: 1.0e9,
            density: 1.2,
            atoms_per_nm3: 100.0,
            thickness_nm: 1000.0,
            coefficients: PhotonCoefficients {
                photoelectric: 1.0e-3,
                compton: 1.0e-4,
                elastic: 1.0e-4,
            },
            pulse_length_fs: 1.0,
        };
        DoseReport::new(&dose, &norm)
    }

    #[test]
    fn test_header_columns() {
        assert_eq!(SUMMARY_HEADER.split(',').count(), 7);
        assert!(SUMMARY_HEADER.starts_with("Dose (MGy),Photons simulated,"));
        assert_eq!(summary_line(&report()).split(',').count(), 7);
    }

    #[test]
    fn test_write_files() -> Result<()> {
        let dir = tempdir()?;
        let report = report();

        let summary = dir.path().join("summary.csv");
        write_summary(&summary, &report)?;
        let content = std::fs::read_to_string(&summary)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], SUMMARY_HEADER);
        assert!(lines[1].split(',').nth(1) == Some("10"));

        let profile = dir.path().join("dose_profile.csv");
        write_dose_profile(&profile, &report)?;
        let content = std::fs::read_to_string(&profile)?;
        assert_eq!(content.lines().count(), 3);
        assert!(content.lines().nth(2).unwrap_or("").starts_with("1,"));
        Ok(())
    }
}
