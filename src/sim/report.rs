//! Conversion of accumulated energy into dose and derived figures.

use serde::Serialize;
use std::f64::consts::PI;

use crate::geom::crystal::NM_PER_UM;
use crate::physics::coefficients::PhotonCoefficients;
use crate::physics::constants::{CM3_PER_NM3, JOULES_PER_KEV};
use crate::sim::dose::DoseAccumulator;
use crate::sim::photon::compton_electron_energy;

/// Physical quantities needed to normalize a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalization {
    pub beam_energy_kev: f64,
    /// Physical photons delivered (flux × exposure).
    pub physical_photons: f64,
    pub photons_simulated: usize,
    /// Crystal volume inside the beam footprint (nm³).
    pub exposed_volume_nm3: f64,
    /// g/cm³
    pub density: f64,
    pub atoms_per_nm3: f64,
    /// Crystal depth along the beam (nm).
    pub thickness_nm: f64,
    /// Crystal coefficients at the beam energy (1/µm).
    pub coefficients: PhotonCoefficients,
    pub pulse_length_fs: f64,
}

impl Normalization {
    /// Mass of the exposed crystal (kg).
    pub fn exposed_mass_kg(&self) -> f64 {
        self.exposed_volume_nm3 * CM3_PER_NM3 * self.density / 1000.0
    }

    /// Physical photons represented by one simulated photon.
    pub fn photons_per_history(&self) -> f64 {
        if self.photons_simulated == 0 {
            return 0.0;
        }
        self.physical_photons / self.photons_simulated as f64
    }

    /// MGy per keV of absorbed energy in the exposed crystal.
    pub fn mgy_per_kev(&self) -> f64 {
        let mass = self.exposed_mass_kg();
        if !(mass > 0.0) {
            return 0.0;
        }
        JOULES_PER_KEV / mass / 1.0e6
    }

    /// MGy per simulated keV.
    pub fn simulated_kev_to_mgy(&self) -> f64 {
        self.photons_per_history() * self.mgy_per_kev()
    }

    pub fn thickness_um(&self) -> f64 {
        self.thickness_nm / NM_PER_UM
    }
}

/// Final figures of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoseReport {
    pub bin_length_fs: f64,
    pub pulse_length_fs: f64,
    pub photons_simulated: usize,

    // Per time bin (MGy)
    pub dose_mgy: Vec<f64>,
    pub photon_dose_mgy: Vec<f64>,
    pub electron_dose_mgy: Vec<f64>,
    pub surrounding_electron_dose_mgy: Vec<f64>,
    /// Ionization events per atom, cumulative over bins.
    pub cumulative_ionisations_per_atom: Vec<f64>,

    pub total_dose_mgy: f64,
    pub dose_within_pulse_mgy: f64,
    pub escaped_mgy: f64,
    pub surrounding_electron_mgy: f64,
    pub from_surrounding_mgy: f64,

    pub raddose_dose_mgy: f64,
    pub compton_dose_mgy: f64,

    pub elastic_fraction: f64,
    pub diffraction_efficiency: f64,
    pub diffraction_efficiency_within_pulse: f64,
}

impl DoseReport {
    pub fn new(dose: &DoseAccumulator, norm: &Normalization) -> Self {
        let to_mgy = norm.simulated_kev_to_mgy();
        let scale = |values: &[f64]| values.iter().map(|v| v * to_mgy).collect::<Vec<_>>();
        let dose_mgy = scale(dose.total());
        let bin_length_fs = dose.bin_length_fs();

        let atoms = norm.atoms_per_nm3 * norm.exposed_volume_nm3;
        let per_atom = if atoms > 0.0 {
            norm.photons_per_history() / atoms
        } else {
            0.0
        };
        let cumulative_ionisations_per_atom = dose
            .ionisations()
            .iter()
            .scan(0u64, |acc, &n| {
                *acc += n;
                Some(*acc as f64 * per_atom)
            })
            .collect();

        let total_dose_mgy: f64 = dose_mgy.iter().sum();
        let dose_within_pulse_mgy: f64 = dose_mgy
            .iter()
            .enumerate()
            .filter(|(i, _)| (*i as f64) * bin_length_fs < norm.pulse_length_fs)
            .map(|(_, d)| d)
            .sum();

        let elastic_fraction = elastic_fraction(norm.coefficients.elastic, norm.thickness_um());
        let efficiency = |d: f64| if d > 0.0 { elastic_fraction / d } else { 0.0 };

        let hit_fraction = if norm.photons_simulated > 0 {
            dose.photons_hitting_crystal() as f64 / norm.photons_simulated as f64
        } else {
            0.0
        };
        let incident = norm.physical_photons * hit_fraction;
        let (raddose_kev, compton_kev) = raddose_energies(
            incident,
            norm.beam_energy_kev,
            &norm.coefficients,
            norm.thickness_um(),
        );

        Self {
            bin_length_fs,
            pulse_length_fs: norm.pulse_length_fs,
            photons_simulated: norm.photons_simulated,
            photon_dose_mgy: scale(dose.photon()),
            electron_dose_mgy: scale(dose.electron_crystal()),
            surrounding_electron_dose_mgy: scale(dose.electron_surrounding()),
            cumulative_ionisations_per_atom,
            total_dose_mgy,
            dose_within_pulse_mgy,
            escaped_mgy: dose.escaped_kev() * to_mgy,
            surrounding_electron_mgy: dose.electron_surrounding().iter().sum::<f64>() * to_mgy,
            from_surrounding_mgy: dose.from_surrounding_kev() * to_mgy,
            raddose_dose_mgy: raddose_kev * norm.mgy_per_kev(),
            compton_dose_mgy: compton_kev * norm.mgy_per_kev(),
            elastic_fraction,
            diffraction_efficiency: efficiency(total_dose_mgy),
            diffraction_efficiency_within_pulse: efficiency(dose_within_pulse_mgy),
            dose_mgy,
        }
    }

    /// Start time (fs) of bin `index`.
    pub fn bin_start_fs(&self, index: usize) -> f64 {
        index as f64 * self.bin_length_fs
    }
}

/// Fraction of photons scattered elastically over `thickness_um`.
pub fn elastic_fraction(elastic_per_um: f64, thickness_um: f64) -> f64 {
    1.0 - (-elastic_per_um * thickness_um).exp()
}

/// Energy (keV) absorbed through photoelectric absorption and through Compton
/// electrons when `incident` photons cross `thickness_um` of crystal.
pub fn raddose_energies(
    incident: f64,
    energy_kev: f64,
    coefficients: &PhotonCoefficients,
    thickness_um: f64,
) -> (f64, f64) {
    let mu_abs = coefficients.absorption();
    if !(mu_abs > 0.0) {
        return (0.0, 0.0);
    }
    let absorbed = incident * (1.0 - (-mu_abs * thickness_um).exp());
    let photoelectric = absorbed * energy_kev * coefficients.photoelectric / mu_abs;
    let compton = absorbed * mean_compton_electron_energy(energy_kev) * coefficients.compton / mu_abs;
    (photoelectric, compton)
}

/// Mean recoil electron energy (keV) for a scattering angle uniform on [0, π],
/// integrated with Simpson's rule.
pub fn mean_compton_electron_energy(energy_kev: f64) -> f64 {
    const INTERVALS: usize = 360;
    let h = PI / INTERVALS as f64;
    let sum: f64 = (0..=INTERVALS)
        .map(|i| {
            let weight = if i == 0 || i == INTERVALS {
                1.0
            } else if i % 2 == 1 {
                4.0
            } else {
                2.0
            };
            weight * compton_electron_energy(energy_kev, i as f64 * h)
        })
        .sum();
    sum * h / 3.0 / PI
}
