use rand::Rng;
use std::f64::consts::PI;

use crate::physics::coefficients::Medium;
use crate::{Point, Vector};

/// How an electron was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectronKind {
    Photo,
    Compton,
    Auger,
    Secondary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Electron {
    /// nm
    pub position: Point,
    /// Polar angle from +z (rad).
    pub theta: f64,
    /// Azimuth from +x (rad).
    pub phi: f64,
    pub energy_kev: f64,
    /// Time since the pulse start (fs).
    pub time_fs: f64,
    pub medium: Medium,
    /// Set once an electron born in the surrounding medium enters the crystal.
    pub from_surrounding: bool,
    pub kind: ElectronKind,
}

impl Electron {
    pub fn new(
        position: Point,
        theta: f64,
        phi: f64,
        energy_kev: f64,
        time_fs: f64,
        medium: Medium,
        kind: ElectronKind,
    ) -> Self {
        Self {
            position,
            theta,
            phi,
            energy_kev,
            time_fs,
            medium,
            from_surrounding: false,
            kind,
        }
    }

    /// Electron emitted in a uniformly random direction.
    pub fn isotropic<R: Rng + ?Sized>(
        position: Point,
        energy_kev: f64,
        time_fs: f64,
        medium: Medium,
        kind: ElectronKind,
        rng: &mut R,
    ) -> Self {
        let theta = (1.0 - 2.0 * rng.r#gen::<f64>()).clamp(-1.0, 1.0).acos();
        let phi = 2.0 * PI * rng.r#gen::<f64>();
        Self::new(position, theta, phi, energy_kev, time_fs, medium, kind)
    }

    /// Unit vector of travel.
    pub fn direction(&self) -> Vector {
        Vector::from_angles(self.theta, self.phi)
    }
}
