//! Photon histories.
//!
//! Each photon enters along +z, samples exponential free paths in the media
//! it crosses and interacts at most once (photoelectric absorption or Compton
//! scattering). A photon that crosses the tracked volume without interacting
//! is dropped. The medium at an interaction point is read from the voxel
//! occupancy cache.

use anyhow::Result;
use rand::Rng;
use std::f64::consts::PI;

use crate::geom::crystal::NM_PER_UM;
use crate::physics::coefficients::{CoefficientProvider, Medium, Shell};
use crate::physics::constants::{ELECTRON_REST_ENERGY_KEV, SPEED_OF_LIGHT_NM_PER_FS};
use crate::sim::particle::{Electron, ElectronKind};
use crate::sim::transport::{Transport, choose_element};
use crate::{Point, Vector};

/// Offset (nm) in front of the tracked region where photons start.
const PHOTON_START_OFFSET_NM: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Photoelectric,
    Compton,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhotonOutcome {
    /// The photon never came close enough to the crystal to be followed.
    Missed,
    /// The photon crossed the tracked volume without interacting.
    Transmitted,
    Absorbed {
        /// Interaction point (nm).
        position: Point,
        medium: Medium,
        interaction: Interaction,
        /// Energy (keV) carried away by the scattered photon.
        scattered_kev: f64,
    },
}

/// Free path (nm) for an attenuation coefficient in 1/nm.
pub fn sample_free_path<R: Rng + ?Sized>(mu_per_nm: f64, rng: &mut R) -> f64 {
    if !(mu_per_nm > 0.0) {
        return f64::INFINITY;
    }
    -(1.0 - rng.r#gen::<f64>()).ln() / mu_per_nm
}

/// Kinetic energy (keV) of the electron recoiling from a photon of
/// `photon_kev` scattered by `theta`.
pub fn compton_electron_energy(photon_kev: f64, theta: f64) -> f64 {
    let k = photon_kev / ELECTRON_REST_ENERGY_KEV;
    let a = k * (1.0 - theta.cos());
    photon_kev * a / (1.0 + a)
}

/// Recoil electron polar angle for photon scattering angle `theta`,
/// from `cot(phi) = (1 + k) tan(theta / 2)`.
pub fn compton_electron_angle(photon_kev: f64, theta: f64) -> f64 {
    let k = photon_kev / ELECTRON_REST_ENERGY_KEV;
    1.0f64.atan2((1.0 + k) * (theta / 2.0).tan())
}

impl<P: CoefficientProvider> Transport<'_, P> {
    /// Follows one photon entering the tracked volume with the given cohort
    /// time (fs, referenced to the crystal's front plane).
    pub fn track_photon<R: Rng + ?Sized>(
        &mut self,
        entry_time_fs: f64,
        rng: &mut R,
    ) -> Result<PhotonOutcome> {
        let (x, y) = self.beam.sample_position(rng);
        let direction = Vector::new(0.0, 0.0, 1.0);
        let has_surrounding = self.provider.has_surrounding();
        let front_z = self.geometry.bbox().0.z;
        let mut pos = Point::new(x, y, self.tracked_min.z - PHOTON_START_OFFSET_NM);

        let first_hit = self.geometry.intersection_distance(pos, direction);
        if first_hit.is_some() {
            self.dose.record_crystal_hit();
        } else if !has_surrounding || self.geometry.lateral_distance(x, y) > self.photoelectron_range
        {
            return Ok(PhotonOutcome::Missed);
        }

        let mut medium = Medium::Surrounding;
        let mut boundary = first_hit;
        loop {
            let s = if medium == Medium::Crystal || has_surrounding {
                let mu = self
                    .provider
                    .photon_coefficients(self.beam.energy_kev, medium)
                    .absorption()
                    / NM_PER_UM;
                sample_free_path(mu, rng)
            } else {
                f64::INFINITY
            };

            // Surface crossed first: start a fresh path in the other medium
            if let Some(d) = boundary
                && d <= s
            {
                pos = pos + direction * d;
                medium = match medium {
                    Medium::Crystal => Medium::Surrounding,
                    Medium::Surrounding => Medium::Crystal,
                };
                boundary = self.geometry.intersection_distance(pos, direction);
                continue;
            }

            if s >= (self.tracked_max.z - pos.z).max(0.0) {
                return Ok(PhotonOutcome::Transmitted);
            }
            let at = pos + direction * s;
            let at_medium = self.medium_at(at);
            if at_medium == Medium::Surrounding && !has_surrounding {
                return Ok(PhotonOutcome::Transmitted);
            }
            let time = entry_time_fs + (at.z - front_z) / SPEED_OF_LIGHT_NM_PER_FS;
            return self.interact(at, time, at_medium, rng);
        }
    }

    fn interact<R: Rng + ?Sized>(
        &mut self,
        at: Point,
        time_fs: f64,
        medium: Medium,
        rng: &mut R,
    ) -> Result<PhotonOutcome> {
        let coefficients = self
            .provider
            .photon_coefficients(self.beam.energy_kev, medium);
        if rng.r#gen::<f64>() < coefficients.compton_probability() {
            let scattered_kev = self.compton_event(at, time_fs, medium, rng)?;
            Ok(PhotonOutcome::Absorbed {
                position: at,
                medium,
                interaction: Interaction::Compton,
                scattered_kev,
            })
        } else {
            self.photoelectric_absorption(at, time_fs, medium, rng)?;
            Ok(PhotonOutcome::Absorbed {
                position: at,
                medium,
                interaction: Interaction::Photoelectric,
                scattered_kev: 0.0,
            })
        }
    }

    fn deposit_photon(&mut self, time_fs: f64, energy_kev: f64, medium: Medium) {
        match medium {
            Medium::Crystal => self.dose.add_photon(time_fs, energy_kev),
            Medium::Surrounding => self.dose.add_surrounding_photon(energy_kev),
        }
    }

    /// Photoelectric absorption: ionizes a shell of a sampled element and
    /// transports the photoelectron and any Auger electron.
    pub fn photoelectric_absorption<R: Rng + ?Sized>(
        &mut self,
        at: Point,
        time_fs: f64,
        medium: Medium,
        rng: &mut R,
    ) -> Result<()> {
        let energy = self.beam.energy_kev;
        let provider = self.provider;
        let elements = provider.elements(medium);
        let u_element = rng.r#gen::<f64>();
        let element = choose_element(elements, u_element, |e| {
            provider.photoelectric_probability(e, energy, medium)
        });

        let mut binding = 0.0;
        let mut k_shell_of = None;
        if let Some(element) = element {
            let u_shell = rng.r#gen::<f64>();
            let mut cumulative = 0.0;
            for shell in Shell::ALL {
                cumulative += provider.shell_ionisation_probability(element, shell, energy);
                if u_shell < cumulative {
                    binding = element.edge(shell);
                    if shell == Shell::K {
                        k_shell_of = Some((element.atomic_number, element.k_fluorescence_yield));
                    }
                    break;
                }
            }
        }

        if medium == Medium::Crystal {
            self.dose.add_ionisation(time_fs);
        }

        let mut auger_electron = None;
        if let Some((z, fluorescence_yield)) = k_shell_of
            && rng.r#gen::<f64>() >= fluorescence_yield
            && let Some(table) = self.auger.get(z)
        {
            let transition = table.sample(rng.r#gen::<f64>());
            let auger_time = time_fs + transition.lifetime_fs();
            auger_electron = Some(Electron::isotropic(
                at,
                transition.energy_kev,
                auger_time,
                medium,
                ElectronKind::Auger,
                rng,
            ));
        }

        let relaxation_kev = auger_electron.as_ref().map_or(0.0, |e| e.energy_kev);
        self.deposit_photon(time_fs, (binding - relaxation_kev).max(0.0), medium);

        let photoelectron = Electron::isotropic(
            at,
            (energy - binding).max(0.0),
            time_fs,
            medium,
            ElectronKind::Photo,
            rng,
        );
        self.transport_cascade(photoelectron, rng)?;

        if let Some(auger) = auger_electron {
            if auger.medium == Medium::Crystal {
                self.dose.add_ionisation(auger.time_fs);
            }
            self.transport_cascade(auger, rng)?;
        }
        Ok(())
    }

    /// Compton scattering with a uniformly sampled photon angle. Returns the
    /// energy carried away by the scattered photon.
    pub fn compton_event<R: Rng + ?Sized>(
        &mut self,
        at: Point,
        time_fs: f64,
        medium: Medium,
        rng: &mut R,
    ) -> Result<f64> {
        let energy = self.beam.energy_kev;
        let theta = PI * rng.r#gen::<f64>();
        let electron_energy = compton_electron_energy(energy, theta);
        let electron_theta = compton_electron_angle(energy, theta);
        let electron_phi = 2.0 * PI * rng.r#gen::<f64>();

        if medium == Medium::Crystal {
            self.dose.add_ionisation(time_fs);
        }
        let electron = Electron::new(
            at,
            electron_theta,
            electron_phi,
            electron_energy,
            time_fs,
            medium,
            ElectronKind::Compton,
        );
        self.transport_cascade(electron, rng)?;
        Ok(energy - electron_energy)
    }
}
