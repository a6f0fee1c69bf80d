//! Time-binned energy deposition.

use anyhow::{Result, ensure};

use crate::physics::coefficients::Medium;

/// Energy (keV) deposited per time bin, split by origin.
///
/// Arrays grow on demand when a deposit lands past the last bin.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseAccumulator {
    bin_length_fs: f64,
    /// Crystal dose (photon + electron-in-crystal).
    total: Vec<f64>,
    photon: Vec<f64>,
    electron_crystal: Vec<f64>,
    electron_surrounding: Vec<f64>,
    ionisations: Vec<u64>,

    escaped_kev: f64,
    /// Crystal deposits by electrons that started in the surrounding medium.
    from_surrounding_kev: f64,
    /// Photon-phase deposits in the surrounding medium.
    surrounding_photon_kev: f64,
    photons_hitting_crystal: usize,
}

impl DoseAccumulator {
    pub fn new(bin_length_fs: f64, initial_bins: usize) -> Self {
        Self {
            bin_length_fs,
            total: Vec::with_capacity(initial_bins),
            photon: Vec::with_capacity(initial_bins),
            electron_crystal: Vec::with_capacity(initial_bins),
            electron_surrounding: Vec::with_capacity(initial_bins),
            ionisations: Vec::with_capacity(initial_bins),
            escaped_kev: 0.0,
            from_surrounding_kev: 0.0,
            surrounding_photon_kev: 0.0,
            photons_hitting_crystal: 0,
        }
    }

    /// Bin holding time `time_fs`. Negative, NaN and infinite times go to bin 0.
    pub fn bin_index(&self, time_fs: f64) -> usize {
        if !(time_fs > 0.0) || !time_fs.is_finite() {
            return 0;
        }
        (time_fs / self.bin_length_fs).floor() as usize
    }

    fn slot(&mut self, time_fs: f64) -> usize {
        let idx = self.bin_index(time_fs);
        if idx >= self.total.len() {
            self.resize(idx + 1);
        }
        idx
    }

    fn resize(&mut self, num_bins: usize) {
        self.total.resize(num_bins, 0.0);
        self.photon.resize(num_bins, 0.0);
        self.electron_crystal.resize(num_bins, 0.0);
        self.electron_surrounding.resize(num_bins, 0.0);
        self.ionisations.resize(num_bins, 0);
    }

    /// Photon-phase deposit in the crystal.
    pub fn add_photon(&mut self, time_fs: f64, energy_kev: f64) {
        let i = self.slot(time_fs);
        self.total[i] += energy_kev;
        self.photon[i] += energy_kev;
    }

    /// Photon-phase deposit outside the crystal.
    pub fn add_surrounding_photon(&mut self, energy_kev: f64) {
        self.surrounding_photon_kev += energy_kev;
    }

    /// Electron deposit in `medium`.
    pub fn add_electron(
        &mut self,
        time_fs: f64,
        energy_kev: f64,
        medium: Medium,
        from_surrounding: bool,
    ) {
        let i = self.slot(time_fs);
        match medium {
            Medium::Crystal => {
                self.total[i] += energy_kev;
                self.electron_crystal[i] += energy_kev;
                if from_surrounding {
                    self.from_surrounding_kev += energy_kev;
                }
            }
            Medium::Surrounding => self.electron_surrounding[i] += energy_kev,
        }
    }

    pub fn add_ionisation(&mut self, time_fs: f64) {
        let i = self.slot(time_fs);
        self.ionisations[i] += 1;
    }

    pub fn add_escaped(&mut self, energy_kev: f64) {
        self.escaped_kev += energy_kev;
    }

    pub fn record_crystal_hit(&mut self) {
        self.photons_hitting_crystal += 1;
    }

    /// Adds `other` bin by bin.
    pub fn merge(&mut self, other: &DoseAccumulator) -> Result<()> {
        ensure!(
            (self.bin_length_fs - other.bin_length_fs).abs() < 1e-12,
            "Cannot merge dose with bin lengths {} fs and {} fs",
            self.bin_length_fs,
            other.bin_length_fs
        );
        if other.num_bins() > self.num_bins() {
            self.resize(other.num_bins());
        }
        for i in 0..other.num_bins() {
            self.total[i] += other.total[i];
            self.photon[i] += other.photon[i];
            self.electron_crystal[i] += other.electron_crystal[i];
            self.electron_surrounding[i] += other.electron_surrounding[i];
            self.ionisations[i] += other.ionisations[i];
        }
        self.escaped_kev += other.escaped_kev;
        self.from_surrounding_kev += other.from_surrounding_kev;
        self.surrounding_photon_kev += other.surrounding_photon_kev;
        self.photons_hitting_crystal += other.photons_hitting_crystal;
        Ok(())
    }

    pub fn bin_length_fs(&self) -> f64 {
        self.bin_length_fs
    }

    pub fn num_bins(&self) -> usize {
        self.total.len()
    }

    pub fn total(&self) -> &[f64] {
        &self.total
    }

    pub fn photon(&self) -> &[f64] {
        &self.photon
    }

    pub fn electron_crystal(&self) -> &[f64] {
        &self.electron_crystal
    }

    pub fn electron_surrounding(&self) -> &[f64] {
        &self.electron_surrounding
    }

    pub fn ionisations(&self) -> &[u64] {
        &self.ionisations
    }

    pub fn escaped_kev(&self) -> f64 {
        self.escaped_kev
    }

    pub fn from_surrounding_kev(&self) -> f64 {
        self.from_surrounding_kev
    }

    pub fn surrounding_photon_kev(&self) -> f64 {
        self.surrounding_photon_kev
    }

    pub fn photons_hitting_crystal(&self) -> usize {
        self.photons_hitting_crystal
    }

    /// Energy deposited in the crystal (keV).
    pub fn crystal_kev(&self) -> f64 {
        self.total.iter().sum()
    }

    /// Energy deposited anywhere, crystal or surrounding (keV).
    pub fn deposited_kev(&self) -> f64 {
        self.crystal_kev()
            + self.electron_surrounding.iter().sum::<f64>()
            + self.surrounding_photon_kev
    }
}
