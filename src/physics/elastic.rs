//! Elastic electron scattering angle tables.
//!
//! For every element and energy regime a table of cumulative cross sections
//! over a fixed angular grid is tabulated at a set of electron energies.
//! Tables are read on first use from `elastic/<low|high>/<Z>.csv`.

use anyhow::{Context, Result, bail, ensure};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::io::resources::ResourceLocator;

/// Electron energy (keV) separating the two tabulation regimes.
pub const REGIME_THRESHOLD_KEV: f64 = 20.0;

/// Segments of the high energy angular grid: (start°, step°, count).
const HIGH_GRID: [(f64, f64, usize); 4] = [
    (0.0, 0.05, 20),
    (1.0, 0.25, 36),
    (10.0, 1.0, 20),
    (30.0, 2.5, 61),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnergyRegime {
    Low,
    High,
}

impl EnergyRegime {
    pub fn for_energy(energy_kev: f64) -> Self {
        if energy_kev > REGIME_THRESHOLD_KEV {
            EnergyRegime::High
        } else {
            EnergyRegime::Low
        }
    }

    pub fn num_angles(self) -> usize {
        match self {
            EnergyRegime::Low => 181,
            EnergyRegime::High => HIGH_GRID.iter().map(|s| s.2).sum(),
        }
    }

    fn dir_name(self) -> &'static str {
        match self {
            EnergyRegime::Low => "low",
            EnergyRegime::High => "high",
        }
    }

    /// Scattering angle (degrees) of grid point `index`. Indices past the
    /// end of the grid map to 180°.
    pub fn angle_degrees(self, index: usize) -> f64 {
        match self {
            EnergyRegime::Low => (index as f64).min(180.0),
            EnergyRegime::High => {
                let mut i = index;
                for (start, step, count) in HIGH_GRID {
                    if i < count {
                        return start + step * i as f64;
                    }
                    i -= count;
                }
                180.0
            }
        }
    }
}

/// Cumulative cross sections per tabulated electron energy, sorted by energy.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleTable {
    rows: Vec<(f64, Vec<f64>)>,
}

impl AngleTable {
    /// Parses a table with one header row followed by `energy_keV, c_0, ..., c_n` rows.
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());
        if lines.next().is_none() {
            bail!("Elastic angle table is empty");
        }
        let mut rows = Vec::new();
        for (num, line) in lines {
            let mut values = line
                .split(',')
                .map(|s| s.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Invalid elastic row on line {}", num + 1))?;
            ensure!(
                values.len() >= 2,
                "Elastic row on line {} has no cross sections",
                num + 1
            );
            let energy = values.remove(0);
            rows.push((energy, values));
        }
        ensure!(!rows.is_empty(), "Elastic angle table has no data rows");
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self { rows })
    }

    pub fn energies(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r.0)
    }

    /// Row with the tabulated energy closest to `energy_kev`.
    ///
    /// Only the floor and ceiling keys are compared; an exact tie goes to the floor.
    pub fn nearest(&self, energy_kev: f64) -> (f64, &[f64]) {
        let hi = self.rows.partition_point(|r| r.0 <= energy_kev);
        let idx = if hi == 0 {
            0
        } else if hi == self.rows.len() {
            hi - 1
        } else {
            let floor = self.rows[hi - 1].0;
            let ceil = self.rows[hi].0;
            if energy_kev - floor <= ceil - energy_kev {
                hi - 1
            } else {
                hi
            }
        };
        let (energy, values) = &self.rows[idx];
        (*energy, values.as_slice())
    }

    /// Grid index of the first cumulative value reaching `u` of the total.
    pub fn sample_index(&self, energy_kev: f64, u: f64) -> usize {
        let (_, values) = self.nearest(energy_kev);
        let Some(&last) = values.last() else {
            return 0;
        };
        if !(last > 0.0) {
            return 0;
        }
        values
            .iter()
            .position(|&c| c / last >= u)
            .unwrap_or(values.len() - 1)
    }
}

/// Lazily loaded elastic angle tables.
#[derive(Debug)]
pub struct ElasticAngleTables {
    locator: ResourceLocator,
    tables: HashMap<(u32, EnergyRegime), AngleTable>,
}

impl ElasticAngleTables {
    pub fn new(locator: ResourceLocator) -> Self {
        Self {
            locator,
            tables: HashMap::new(),
        }
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    /// Table for (`atomic_number`, `regime`), reading it on first request.
    pub fn get(&mut self, atomic_number: u32, regime: EnergyRegime) -> Result<&AngleTable> {
        match self.tables.entry((atomic_number, regime)) {
            Entry::Occupied(e) => Ok(&*e.into_mut()),
            Entry::Vacant(e) => {
                let relative = format!("elastic/{}/{atomic_number}.csv", regime.dir_name());
                let content = self.locator.read_to_string(&relative)?;
                let table = AngleTable::parse(&content)
                    .with_context(|| format!("Failed to parse {relative}"))?;
                log::debug!("Loaded elastic angle table {relative}");
                Ok(&*e.insert(table))
            }
        }
    }

    /// Samples an elastic deflection angle (radians) for an electron of
    /// `energy_kev` scattering off element `atomic_number`.
    pub fn sample_deflection(
        &mut self,
        atomic_number: u32,
        energy_kev: f64,
        u: f64,
    ) -> Result<f64> {
        let regime = EnergyRegime::for_energy(energy_kev);
        let index = self.get(atomic_number, regime)?.sample_index(energy_kev, u);
        Ok(regime.angle_degrees(index).to_radians())
    }

    pub fn num_loaded(&self) -> usize {
        self.tables.len()
    }
}
