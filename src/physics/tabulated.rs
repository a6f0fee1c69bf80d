//! Coefficient provider backed by precomputed tables.
//!
//! Values between rows are interpolated on log-log axes. Queries outside the
//! tabulated energy range are clamped to the first or last row.

use anyhow::{Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::physics::coefficients::{CoefficientProvider, ElementData, Medium, PhotonCoefficients};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotonRow {
    pub energy_kev: f64,
    #[serde(flatten)]
    pub coefficients: PhotonCoefficients,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectronRow {
    pub energy_kev: f64,
    /// keV/nm
    pub stopping_power: f64,
    /// nm
    pub elastic_mfpl: f64,
    /// nm
    pub inelastic_mfpl: f64,
    /// nm
    pub fse_mfpl: f64,
    /// nm
    pub plasma_mfpl: f64,
}

/// Element entry with its constant relative weights within the medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedElement {
    #[serde(flatten)]
    pub data: ElementData,
    pub photoelectric_weight: f64,
    pub elastic_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediumTable {
    /// g/cm³
    pub density: f64,
    pub atoms_per_nm3: f64,
    /// keV
    pub plasma_energy_kev: f64,
    pub photon: Vec<PhotonRow>,
    pub electron: Vec<ElectronRow>,
    pub elements: Vec<WeightedElement>,
    #[serde(skip)]
    element_data: Vec<ElementData>,
}

impl MediumTable {
    pub fn new(
        density: f64,
        atoms_per_nm3: f64,
        plasma_energy_kev: f64,
        photon: Vec<PhotonRow>,
        electron: Vec<ElectronRow>,
        elements: Vec<WeightedElement>,
    ) -> Result<Self> {
        let mut table = Self {
            density,
            atoms_per_nm3,
            plasma_energy_kev,
            photon,
            electron,
            elements,
            element_data: Vec::new(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Checks the table and rebuilds derived data. Must be called after
    /// deserialization.
    pub fn validate(&mut self) -> Result<()> {
        ensure!(
            self.density > 0.0,
            "Medium density must be positive, got {}",
            self.density
        );
        ensure!(
            self.atoms_per_nm3 > 0.0,
            "Atom density must be positive, got {}",
            self.atoms_per_nm3
        );
        ensure!(!self.photon.is_empty(), "Photon coefficient table is empty");
        ensure!(!self.electron.is_empty(), "Electron coefficient table is empty");
        ensure!(!self.elements.is_empty(), "Medium has no elements");
        check_sorted(self.photon.iter().map(|r| r.energy_kev), "photon")?;
        check_sorted(self.electron.iter().map(|r| r.energy_kev), "electron")?;
        for e in &self.elements {
            if e.photoelectric_weight < 0.0 || e.elastic_weight < 0.0 {
                bail!(
                    "Element Z={} has a negative weight",
                    e.data.atomic_number
                );
            }
        }
        self.element_data = self.elements.iter().map(|e| e.data.clone()).collect();
        Ok(())
    }

    fn weight_of(&self, element: &ElementData, elastic: bool) -> f64 {
        self.elements
            .iter()
            .find(|e| e.data.atomic_number == element.atomic_number)
            .map(|e| {
                if elastic {
                    e.elastic_weight
                } else {
                    e.photoelectric_weight
                }
            })
            .unwrap_or(0.0)
    }

    fn electron_value(&self, energy_kev: f64, value: fn(&ElectronRow) -> f64) -> f64 {
        interpolate(&self.electron, energy_kev, |r| r.energy_kev, value)
    }
}

fn check_sorted(energies: impl Iterator<Item = f64>, what: &str) -> Result<()> {
    let mut prev = f64::NEG_INFINITY;
    for e in energies {
        ensure!(
            e.is_finite() && e > 0.0,
            "Invalid energy {e} keV in {what} table"
        );
        ensure!(
            e > prev,
            "Rows of the {what} table must be sorted by increasing energy ({prev} >= {e})"
        );
        prev = e;
    }
    Ok(())
}

/// Log-log interpolation with clamping. Falls back to linear interpolation
/// when either bracketing value is not positive.
fn interpolate<T>(rows: &[T], x: f64, key: impl Fn(&T) -> f64, value: impl Fn(&T) -> f64) -> f64 {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return 0.0;
    };
    if !(x > key(first)) {
        return value(first);
    }
    if x >= key(last) {
        return value(last);
    }
    let hi = rows.partition_point(|r| key(r) <= x);
    let (a, b) = (&rows[hi - 1], &rows[hi]);
    let (x0, x1, y0, y1) = (key(a), key(b), value(a), value(b));
    if y0 > 0.0 && y1 > 0.0 {
        let f = (x / x0).ln() / (x1 / x0).ln();
        (y0.ln() + f * (y1 / y0).ln()).exp()
    } else {
        y0 + (x - x0) / (x1 - x0) * (y1 - y0)
    }
}

/// Precomputed coefficients for the crystal and an optional surrounding medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabulatedCoefficients {
    pub crystal: MediumTable,
    #[serde(default)]
    pub surrounding: Option<MediumTable>,
}

impl TabulatedCoefficients {
    pub fn new(crystal: MediumTable, surrounding: Option<MediumTable>) -> Result<Self> {
        let mut coefficients = Self {
            crystal,
            surrounding,
        };
        coefficients.validate()?;
        Ok(coefficients)
    }

    pub fn validate(&mut self) -> Result<()> {
        self.crystal.validate()?;
        if let Some(s) = self.surrounding.as_mut() {
            s.validate()?;
        }
        Ok(())
    }

    /// Table for `medium`. Without a surrounding table the crystal one is used.
    pub fn table(&self, medium: Medium) -> &MediumTable {
        match (medium, &self.surrounding) {
            (Medium::Surrounding, Some(s)) => s,
            _ => &self.crystal,
        }
    }
}

impl CoefficientProvider for TabulatedCoefficients {
    fn photon_coefficients(&self, energy_kev: f64, medium: Medium) -> PhotonCoefficients {
        let rows = &self.table(medium).photon;
        let at = |f: fn(&PhotonCoefficients) -> f64| {
            interpolate(rows, energy_kev, |r| r.energy_kev, |r| f(&r.coefficients))
        };
        PhotonCoefficients {
            photoelectric: at(|c| c.photoelectric),
            compton: at(|c| c.compton),
            elastic: at(|c| c.elastic),
        }
    }

    fn stopping_power(&self, energy_kev: f64, medium: Medium) -> f64 {
        self.table(medium)
            .electron_value(energy_kev, |r| r.stopping_power)
    }

    fn elastic_mfpl(&self, energy_kev: f64, medium: Medium) -> f64 {
        self.table(medium).electron_value(energy_kev, |r| r.elastic_mfpl)
    }

    fn inelastic_mfpl(&self, energy_kev: f64, medium: Medium) -> f64 {
        self.table(medium)
            .electron_value(energy_kev, |r| r.inelastic_mfpl)
    }

    fn fse_mfpl(&self, energy_kev: f64, medium: Medium) -> f64 {
        self.table(medium).electron_value(energy_kev, |r| r.fse_mfpl)
    }

    fn plasma_mfpl(&self, energy_kev: f64, medium: Medium) -> f64 {
        self.table(medium).electron_value(energy_kev, |r| r.plasma_mfpl)
    }

    fn plasma_energy(&self, medium: Medium) -> f64 {
        self.table(medium).plasma_energy_kev
    }

    fn elements(&self, medium: Medium) -> &[ElementData] {
        &self.table(medium).element_data
    }

    fn photoelectric_probability(
        &self,
        element: &ElementData,
        _energy_kev: f64,
        medium: Medium,
    ) -> f64 {
        self.table(medium).weight_of(element, false)
    }

    fn elastic_probability(&self, element: &ElementData, _energy_kev: f64, medium: Medium) -> f64 {
        self.table(medium).weight_of(element, true)
    }

    fn density(&self, medium: Medium) -> f64 {
        self.table(medium).density
    }

    fn atoms_per_nm3(&self, medium: Medium) -> f64 {
        self.table(medium).atoms_per_nm3
    }

    fn has_surrounding(&self) -> bool {
        self.surrounding.is_some()
    }
}
