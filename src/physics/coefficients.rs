//! Interface to the physical coefficients consumed by the transport engine.
//!
//! Coefficients are computed elsewhere (from crystal and solvent composition);
//! the engine only queries them as pure functions of energy and medium.

use serde::{Deserialize, Serialize};

/// Medium a particle currently travels through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    Crystal,
    Surrounding,
}

/// Atomic shells considered for photoionization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shell {
    K,
    L1,
    L2,
    L3,
    M1,
    M2,
    M3,
    M4,
    M5,
}

pub const NUM_SHELLS: usize = 9;

impl Shell {
    pub const ALL: [Shell; NUM_SHELLS] = [
        Shell::K,
        Shell::L1,
        Shell::L2,
        Shell::L3,
        Shell::M1,
        Shell::M2,
        Shell::M3,
        Shell::M4,
        Shell::M5,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Smallest atomic number for which this shell is treated as a core shell.
    pub fn min_atomic_number(self) -> u32 {
        match self {
            Shell::K => 3,
            Shell::L1 | Shell::L2 | Shell::L3 => 12,
            _ => 30,
        }
    }
}

/// Linear photon interaction coefficients in 1/µm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotonCoefficients {
    pub photoelectric: f64,
    pub compton: f64,
    pub elastic: f64,
}

impl PhotonCoefficients {
    pub fn total(&self) -> f64 {
        self.photoelectric + self.compton + self.elastic
    }

    /// Coefficient of the absorbing interactions (photoelectric + Compton).
    pub fn absorption(&self) -> f64 {
        self.photoelectric + self.compton
    }

    /// Probability that an absorbing interaction is a Compton event,
    /// `1 - MFPL_absorption / MFPL_photoelectric`.
    pub fn compton_probability(&self) -> f64 {
        let absorption = self.absorption();
        if absorption <= 0.0 {
            return 0.0;
        }
        1.0 - self.photoelectric / absorption
    }
}

/// Per-element data needed to resolve an ionization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementData {
    pub atomic_number: u32,
    /// Edge (binding) energies in keV, ordered as [`Shell::ALL`].
    pub edges_kev: [f64; NUM_SHELLS],
    /// Probability that an absorption by this element ionizes each shell,
    /// ordered as [`Shell::ALL`]. What is left over goes to outer shells.
    pub shell_fractions: [f64; NUM_SHELLS],
    /// Probability that a K vacancy relaxes by fluorescence.
    pub k_fluorescence_yield: f64,
}

impl ElementData {
    pub fn edge(&self, shell: Shell) -> f64 {
        self.edges_kev[shell.index()]
    }
}

/// Source of physical coefficients for both media.
///
/// Photon coefficients are in 1/µm, lengths in nm, stopping powers in keV/nm
/// and energies in keV.
pub trait CoefficientProvider {
    fn photon_coefficients(&self, energy_kev: f64, medium: Medium) -> PhotonCoefficients;

    /// Electron stopping power (keV/nm).
    fn stopping_power(&self, energy_kev: f64, medium: Medium) -> f64;

    /// Electron elastic mean free path (nm).
    fn elastic_mfpl(&self, energy_kev: f64, medium: Medium) -> f64;

    /// Electron inelastic mean free path (nm), all channels together.
    ///
    /// Transport does not read this value. Its steps are built from
    /// [`fse_mfpl`](Self::fse_mfpl), plus [`plasma_mfpl`](Self::plasma_mfpl)
    /// when fast secondaries are enabled.
    fn inelastic_mfpl(&self, energy_kev: f64, medium: Medium) -> f64;

    /// Mean free path for producing a fast secondary electron (nm).
    fn fse_mfpl(&self, energy_kev: f64, medium: Medium) -> f64;

    /// Mean free path for plasmon excitation (nm).
    fn plasma_mfpl(&self, energy_kev: f64, medium: Medium) -> f64;

    /// Plasmon energy (keV).
    fn plasma_energy(&self, medium: Medium) -> f64;

    /// Elements making up the medium.
    fn elements(&self, medium: Medium) -> &[ElementData];

    /// Relative probability that a photoelectric absorption happens on `element`.
    fn photoelectric_probability(&self, element: &ElementData, energy_kev: f64, medium: Medium)
    -> f64;

    /// Relative elastic cross section of `element` for an electron.
    fn elastic_probability(&self, element: &ElementData, energy_kev: f64, medium: Medium) -> f64;

    /// Mass density (g/cm³).
    fn density(&self, medium: Medium) -> f64;

    /// Number of atoms per nm³.
    fn atoms_per_nm3(&self, medium: Medium) -> f64;

    /// Whether a surrounding medium is configured.
    fn has_surrounding(&self) -> bool;

    /// Probability that a photoabsorption by `element` ionizes `shell`.
    ///
    /// Zero when the photon energy is below the edge or the element is too
    /// light for the shell to be a core shell.
    fn shell_ionisation_probability(
        &self,
        element: &ElementData,
        shell: Shell,
        energy_kev: f64,
    ) -> f64 {
        let edge = element.edge(shell);
        if element.atomic_number < shell.min_atomic_number() || edge <= 0.0 || energy_kev < edge
        {
            return 0.0;
        }
        element.shell_fractions[shell.index()]
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FixedMedium, FixedProvider, element};
    use super::*;

    #[test]
    fn test_compton_probability() {
        let c = PhotonCoefficients {
            photoelectric: 3.0,
            compton: 1.0,
            elastic: 0.5,
        };
        assert!((c.absorption() - 4.0).abs() < 1e-12);
        assert!((c.total() - 4.5).abs() < 1e-12);
        assert!((c.compton_probability() - 0.25).abs() < 1e-12);
        assert_eq!(PhotonCoefficients::default().compton_probability(), 0.0);
    }

    #[test]
    fn test_shell_probability_thresholds() {
        let sulfur = element(16, 2.472, 0.9, 0.08);
        let provider = FixedProvider {
            crystal: FixedMedium::with_element(sulfur.clone()),
            surrounding: None,
        };
        // Above the edge
        assert!((provider.shell_ionisation_probability(&sulfur, Shell::K, 12.0) - 0.9).abs() < 1e-12);
        // Below the edge
        assert_eq!(provider.shell_ionisation_probability(&sulfur, Shell::K, 2.0), 0.0);
        // No L1 edge tabulated
        assert_eq!(provider.shell_ionisation_probability(&sulfur, Shell::L1, 12.0), 0.0);

        // Hydrogen-like element is too light for a K core shell
        let hydrogen = element(1, 0.0136, 1.0, 0.0);
        assert_eq!(provider.shell_ionisation_probability(&hydrogen, Shell::K, 12.0), 0.0);
    }

    #[test]
    fn test_shell_order() {
        for (i, shell) in Shell::ALL.iter().enumerate() {
            assert_eq!(shell.index(), i);
        }
        assert_eq!(Shell::M5.min_atomic_number(), 30);
    }
}
