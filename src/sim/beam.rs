use anyhow::{Result, ensure};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::geom::crystal::NM_PER_UM;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeamShape {
    #[default]
    Rectangular,
    Elliptical,
}

/// Top-hat X-ray beam travelling along +z, centred on the z axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    pub energy_kev: f64,
    /// Photons per second.
    pub flux: f64,
    pub exposure_s: f64,
    /// Full footprint width along x (µm).
    pub x_um: f64,
    /// Full footprint width along y (µm).
    pub y_um: f64,
    #[serde(default)]
    pub shape: BeamShape,
}

impl Beam {
    pub fn new(
        energy_kev: f64,
        flux: f64,
        exposure_s: f64,
        x_um: f64,
        y_um: f64,
        shape: BeamShape,
    ) -> Self {
        Self {
            energy_kev,
            flux,
            exposure_s,
            x_um,
            y_um,
            shape,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.energy_kev > 0.0,
            "Beam energy must be positive, got {} keV",
            self.energy_kev
        );
        ensure!(
            self.x_um > 0.0 && self.y_um > 0.0,
            "Beam footprint must be positive, got {} x {} µm",
            self.x_um,
            self.y_um
        );
        ensure!(
            self.flux >= 0.0 && self.exposure_s >= 0.0,
            "Beam flux and exposure cannot be negative"
        );
        Ok(())
    }

    /// Number of physical photons delivered during the exposure.
    pub fn photons(&self) -> f64 {
        self.flux * self.exposure_s
    }

    fn half_widths_nm(&self) -> (f64, f64) {
        (self.x_um * NM_PER_UM / 2.0, self.y_um * NM_PER_UM / 2.0)
    }

    /// Uniform random position (nm) over the footprint.
    pub fn sample_position<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let (a, b) = self.half_widths_nm();
        match self.shape {
            BeamShape::Rectangular => (
                a * (2.0 * rng.r#gen::<f64>() - 1.0),
                b * (2.0 * rng.r#gen::<f64>() - 1.0),
            ),
            BeamShape::Elliptical => {
                let r = rng.r#gen::<f64>().sqrt();
                let angle = 2.0 * PI * rng.r#gen::<f64>();
                (a * r * angle.cos(), b * r * angle.sin())
            }
        }
    }

    /// Whether the point (nm) lies inside the footprint.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (a, b) = self.half_widths_nm();
        match self.shape {
            BeamShape::Rectangular => x.abs() <= a && y.abs() <= b,
            BeamShape::Elliptical => (x / a).powi(2) + (y / b).powi(2) <= 1.0,
        }
    }
}

impl Default for Beam {
    fn default() -> Self {
        Self::new(12.4, 1.0e12, 1.0, 10.0, 10.0, BeamShape::Rectangular)
    }
}
