//! Auger transition tables for light elements.
//!
//! Each supported element has a file `auger/<Z>.csv` with one transition per
//! row: `linewidth (eV), probability, energy (eV)`. There is no header row.
//! Probabilities are normalized into a cumulative distribution on load.

use anyhow::{Context, Result, bail, ensure};
use std::collections::HashMap;

use crate::io::resources::ResourceLocator;
use crate::physics::constants::HBAR_EV_FS;

/// Atomic numbers with tabulated Auger transitions (C, N, O, Na, Mg, P, S, Cl, K, Ca).
pub const AUGER_ELEMENTS: [u32; 10] = [6, 7, 8, 11, 12, 15, 16, 17, 19, 20];

#[derive(Debug, Clone, PartialEq)]
pub struct AugerTransition {
    /// Natural linewidth (eV).
    pub linewidth_ev: f64,
    /// Normalized probability.
    pub probability: f64,
    pub cumulative_probability: f64,
    /// Energy of the emitted electron (keV).
    pub energy_kev: f64,
}

impl AugerTransition {
    /// Vacancy lifetime τ = ħ/Γ (fs).
    pub fn lifetime_fs(&self) -> f64 {
        if self.linewidth_ev > 0.0 {
            HBAR_EV_FS / self.linewidth_ev
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementTransitions {
    transitions: Vec<AugerTransition>,
}

impl ElementTransitions {
    pub fn parse(content: &str) -> Result<Self> {
        let mut rows: Vec<(f64, f64, f64)> = Vec::new();
        for (num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let values: Vec<f64> = line
                .split(',')
                .map(|s| s.trim().parse::<f64>())
                .collect::<Result<_, _>>()
                .with_context(|| format!("Invalid Auger row on line {}: '{line}'", num + 1))?;
            if values.len() < 3 {
                bail!(
                    "Auger row on line {} needs 3 columns, got {}",
                    num + 1,
                    values.len()
                );
            }
            ensure!(
                values[1] >= 0.0,
                "Negative transition probability on line {}",
                num + 1
            );
            rows.push((values[0], values[1], values[2]));
        }

        let total: f64 = rows.iter().map(|r| r.1).sum();
        ensure!(total > 0.0, "Auger table has no transitions with positive probability");

        let mut cumulative = 0.0;
        let transitions = rows
            .into_iter()
            .map(|(linewidth_ev, raw, energy_ev)| {
                let probability = raw / total;
                cumulative += probability;
                AugerTransition {
                    linewidth_ev,
                    probability,
                    cumulative_probability: cumulative,
                    energy_kev: energy_ev / 1000.0,
                }
            })
            .collect();
        Ok(Self { transitions })
    }

    pub fn transitions(&self) -> &[AugerTransition] {
        &self.transitions
    }

    /// Transition selected by the uniform draw `u` in [0, 1).
    pub fn sample(&self, u: f64) -> &AugerTransition {
        let idx = self
            .transitions
            .partition_point(|t| t.cumulative_probability <= u)
            .min(self.transitions.len() - 1);
        &self.transitions[idx]
    }
}

/// Per-element Auger tables, each loaded at most once.
#[derive(Debug, Default)]
pub struct AugerData {
    elements: HashMap<u32, ElementTransitions>,
}

impl AugerData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_supported(atomic_number: u32) -> bool {
        AUGER_ELEMENTS.contains(&atomic_number)
    }

    /// Loads the table for `atomic_number` unless already present.
    /// Unsupported elements are ignored.
    pub fn load(&mut self, locator: &ResourceLocator, atomic_number: u32) -> Result<()> {
        if !Self::is_supported(atomic_number) || self.elements.contains_key(&atomic_number) {
            return Ok(());
        }
        let relative = format!("auger/{atomic_number}.csv");
        let content = locator.read_to_string(&relative)?;
        let table = ElementTransitions::parse(&content)
            .with_context(|| format!("Failed to parse {relative}"))?;
        log::debug!(
            "Loaded {} Auger transitions for Z={atomic_number}",
            table.transitions().len()
        );
        self.elements.insert(atomic_number, table);
        Ok(())
    }

    pub fn insert(&mut self, atomic_number: u32, table: ElementTransitions) {
        self.elements.insert(atomic_number, table);
    }

    pub fn get(&self, atomic_number: u32) -> Option<&ElementTransitions> {
        self.elements.get(&atomic_number)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
