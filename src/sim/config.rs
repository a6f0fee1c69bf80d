use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// Treatment of inelastic electron events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InelasticModel {
    /// Inelastic events leave the direction unchanged; energy is lost only
    /// through the continuous stopping power.
    #[default]
    DirectionPreserving,
    /// Inelastic events are resolved into plasmon excitations and fast
    /// secondary electrons, which are transported as well.
    FastSecondaries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // Photons
    pub num_photons: usize,

    // Time binning
    pub pulse_length_fs: f64,
    pub pulse_bin_length_fs: f64,

    // Electrons
    /// Electrons below this energy (keV) deposit what is left and stop.
    pub energy_cutoff_kev: f64,
    pub inelastic_model: InelasticModel,
    /// Follow electrons that leave the crystal into the surrounding medium.
    pub track_surrounding_electrons: bool,

    // Dose normalization
    /// Grid resolution per axis used to estimate the exposed crystal volume.
    pub exposed_volume_samples: usize,

    /// Seed for a reproducible run. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self {
            num_photons: 100_000,
            pulse_length_fs: 30.0,
            pulse_bin_length_fs: 1.0,
            energy_cutoff_kev: 0.05,
            inelastic_model: InelasticModel::DirectionPreserving,
            track_surrounding_electrons: false,
            exposed_volume_samples: 48,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.num_photons > 0, "Number of photons must be positive");
        ensure!(
            self.pulse_length_fs > 0.0,
            "Pulse length must be positive, got {} fs",
            self.pulse_length_fs
        );
        ensure!(
            self.pulse_bin_length_fs > 0.0,
            "Pulse bin length must be positive, got {} fs",
            self.pulse_bin_length_fs
        );
        ensure!(
            self.energy_cutoff_kev >= 0.0,
            "Energy cutoff cannot be negative, got {} keV",
            self.energy_cutoff_kev
        );
        ensure!(
            self.exposed_volume_samples > 0,
            "Exposed volume sampling needs at least one sample per axis"
        );
        Ok(())
    }

    /// Number of entry-time cohorts the photons are split into.
    pub fn num_cohorts(&self) -> usize {
        ((self.pulse_length_fs / self.pulse_bin_length_fs).round() as usize).max(1)
    }

    /// Cohort of the `photon`-th history. Photons are spread evenly, so each
    /// cohort holds ⌊N/k⌋ or ⌈N/k⌉ of the N photons.
    pub fn cohort_of(&self, photon: usize) -> usize {
        if self.num_photons == 0 {
            return 0;
        }
        photon * self.num_cohorts() / self.num_photons
    }

    /// Entry time (fs) of the `photon`-th history.
    pub fn entry_time_fs(&self, photon: usize) -> f64 {
        self.cohort_of(photon) as f64 * self.pulse_bin_length_fs
    }

    /// Number of time bins spanned by the pulse itself.
    pub fn pulse_bins(&self) -> usize {
        (self.pulse_length_fs / self.pulse_bin_length_fs).ceil() as usize
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}
