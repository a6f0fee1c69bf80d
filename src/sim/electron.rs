//! Charged-particle transport.
//!
//! Electrons move in straight steps between elastic and inelastic events
//! and lose energy continuously through the stopping power. Each step's loss
//! is deposited at the step's midpoint time in the medium the step lies in.
//! Surface crossings are located exactly. The end of every other step is
//! classified with the voxel occupancy cache.

use anyhow::Result;
use rand::Rng;
use std::f64::consts::PI;

use crate::physics::coefficients::{CoefficientProvider, Medium};
use crate::physics::constants::electron_speed;
use crate::sim::config::InelasticModel;
use crate::sim::particle::{Electron, ElectronKind};
use crate::sim::photon::sample_free_path;
use crate::sim::transport::{Transport, choose_element};

/// Distance (nm) an electron is pushed past a surface it has just crossed.
const BOUNDARY_NUDGE_NM: f64 = 1e-3;

const TWO_PI: f64 = 2.0 * PI;

/// How an electron history ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectronFate {
    /// Slowed down below the cutoff, or stopped in place because it could
    /// not reach the crystal surface.
    Absorbed,
    /// Left the crystal (untracked surrounding) or the tracked region.
    Escaped,
}

/// Mean free paths (nm) of one step.
struct StepLengths {
    elastic: f64,
    /// Combined mean free path of all sampled events.
    total: f64,
    /// Probability that an event is inelastic.
    inelastic_probability: f64,
    /// Probability that an inelastic event is a plasmon excitation.
    plasmon_fraction: f64,
}

impl<P: CoefficientProvider> Transport<'_, P> {
    fn step_lengths(&self, energy_kev: f64, medium: Medium) -> StepLengths {
        let elastic = self.provider.elastic_mfpl(energy_kev, medium);
        let fse = self.provider.fse_mfpl(energy_kev, medium);
        let (inelastic_rate, plasmon_fraction) = match self.config.inelastic_model {
            InelasticModel::DirectionPreserving => (rate(fse), 0.0),
            InelasticModel::FastSecondaries => {
                let plasmon = rate(self.provider.plasma_mfpl(energy_kev, medium));
                let sum = rate(fse) + plasmon;
                (sum, if sum > 0.0 { plasmon / sum } else { 0.0 })
            }
        };
        let total_rate = rate(elastic) + inelastic_rate;
        let total = if total_rate > 0.0 {
            1.0 / total_rate
        } else {
            f64::INFINITY
        };
        let inelastic_probability = if total_rate > 0.0 {
            inelastic_rate / total_rate
        } else {
            0.0
        };
        StepLengths {
            elastic,
            total,
            inelastic_probability,
            plasmon_fraction,
        }
    }

    /// Deposits the loss of a straight segment of `length` nm and moves the
    /// electron to its end. Returns the deposited energy.
    fn advance(&mut self, e: &mut Electron, length: f64) -> f64 {
        let stopping = self.provider.stopping_power(e.energy_kev, e.medium);
        let loss = (length * stopping).clamp(0.0, e.energy_kev);
        let speed = electron_speed(e.energy_kev);
        let duration = if speed > 0.0 { length / speed } else { 0.0 };
        self.dose.add_electron(
            e.time_fs + duration / 2.0,
            loss,
            e.medium,
            e.from_surrounding,
        );
        e.position = e.position + e.direction() * length;
        e.time_fs += duration;
        e.energy_kev -= loss;
        loss
    }

    fn absorb(&mut self, e: &Electron) -> ElectronFate {
        if e.energy_kev > 0.0 {
            self.dose
                .add_electron(e.time_fs, e.energy_kev, e.medium, e.from_surrounding);
        }
        ElectronFate::Absorbed
    }

    fn escape(&mut self, e: &Electron) -> ElectronFate {
        self.dose.add_escaped(e.energy_kev);
        ElectronFate::Escaped
    }

    /// Moves the electron into the other medium. Leaving the crystal ends the
    /// history when the surrounding medium is not tracked.
    fn change_medium(
        &mut self,
        e: &mut Electron,
        tracks_surrounding: bool,
    ) -> Option<ElectronFate> {
        match e.medium {
            Medium::Crystal if !tracks_surrounding => return Some(self.escape(e)),
            Medium::Crystal => e.medium = Medium::Surrounding,
            Medium::Surrounding => {
                e.medium = Medium::Crystal;
                e.from_surrounding = true;
            }
        }
        None
    }

    /// Transports one electron until it stops or leaves the tracked geometry.
    /// Spawned electrons are pushed onto the work stack.
    pub fn transport_electron<R: Rng + ?Sized>(
        &mut self,
        mut e: Electron,
        rng: &mut R,
    ) -> Result<ElectronFate> {
        let cutoff = self.config.energy_cutoff_kev;
        let tracks_surrounding = self.tracks_surrounding();

        loop {
            if e.energy_kev < cutoff || e.energy_kev <= 0.0 {
                return Ok(self.absorb(&e));
            }
            let direction = e.direction();
            let boundary = self.geometry.intersection_distance(e.position, direction);

            // Too slow to reach the surface: everything stays here
            if e.medium == Medium::Crystal
                && !tracks_surrounding
                && let Some(distance) = boundary
                && e.energy_kev < distance * self.provider.stopping_power(e.energy_kev, e.medium)
            {
                return Ok(self.absorb(&e));
            }

            let lengths = self.step_lengths(e.energy_kev, e.medium);
            let step = sample_free_path(1.0 / lengths.total, rng);

            if let Some(distance) = boundary
                && distance < step
            {
                self.advance(&mut e, distance);
                if let Some(fate) = self.change_medium(&mut e, tracks_surrounding) {
                    return Ok(fate);
                }
                e.position = e.position + direction * BOUNDARY_NUDGE_NM;
                continue;
            }

            if !step.is_finite() {
                return Ok(match e.medium {
                    Medium::Surrounding => self.escape(&e),
                    Medium::Crystal => self.absorb(&e),
                });
            }
            let end = e.position + direction * step;
            if e.medium == Medium::Surrounding && !self.in_tracked_region(end) {
                return Ok(self.escape(&e));
            }

            // A voxel of the other medium reached without a surface crossing
            let crossed = self.medium_at(end) != e.medium;
            self.advance(&mut e, step);
            if crossed {
                if let Some(fate) = self.change_medium(&mut e, tracks_surrounding) {
                    return Ok(fate);
                }
                continue;
            }
            if e.energy_kev < cutoff || e.energy_kev <= 0.0 {
                continue;
            }

            if rng.r#gen::<f64>() < lengths.inelastic_probability {
                self.inelastic_event(&mut e, lengths.plasmon_fraction, rng);
            } else if lengths.elastic.is_finite() {
                self.elastic_event(&mut e, rng)?;
            }
        }
    }

    fn elastic_event<R: Rng + ?Sized>(&mut self, e: &mut Electron, rng: &mut R) -> Result<()> {
        let provider = self.provider;
        let (energy, medium) = (e.energy_kev, e.medium);
        let element = choose_element(provider.elements(medium), rng.r#gen::<f64>(), |el| {
            provider.elastic_probability(el, energy, medium)
        });
        let Some(element) = element else {
            return Ok(());
        };
        let deflection =
            self.elastic
                .sample_deflection(element.atomic_number, energy, rng.r#gen::<f64>())?;
        e.theta = (e.theta + deflection) % TWO_PI;
        e.phi = (e.phi + TWO_PI * rng.r#gen::<f64>()) % TWO_PI;
        Ok(())
    }

    fn inelastic_event<R: Rng + ?Sized>(
        &mut self,
        e: &mut Electron,
        plasmon_fraction: f64,
        rng: &mut R,
    ) {
        if self.config.inelastic_model == InelasticModel::DirectionPreserving {
            return;
        }
        let plasma_energy = self.provider.plasma_energy(e.medium);
        if rng.r#gen::<f64>() < plasmon_fraction {
            e.theta = (e.theta + plasma_energy / (2.0 * e.energy_kev)) % TWO_PI;
            e.phi = (e.phi + TWO_PI * rng.r#gen::<f64>()) % TWO_PI;
            return;
        }

        let min_transfer = plasma_energy.max(self.config.energy_cutoff_kev);
        let Some(fraction) = sample_moller_fraction(min_transfer / e.energy_kev, rng.r#gen())
        else {
            return;
        };
        let secondary_energy = fraction * e.energy_kev;
        let secondary = Electron {
            position: e.position,
            theta: (e.theta + fraction.sqrt().acos()) % TWO_PI,
            phi: (e.phi + PI) % TWO_PI,
            energy_kev: secondary_energy,
            time_fs: e.time_fs,
            medium: e.medium,
            from_surrounding: e.from_surrounding,
            kind: ElectronKind::Secondary,
        };
        e.energy_kev -= secondary_energy;
        e.theta = (e.theta + (1.0 - fraction).sqrt().acos()) % TWO_PI;
        if e.medium == Medium::Crystal {
            self.dose.add_ionisation(e.time_fs);
        }
        self.stack.push(secondary);
    }
}

fn rate(mfpl: f64) -> f64 {
    if mfpl > 0.0 && mfpl.is_finite() {
        1.0 / mfpl
    } else {
        0.0
    }
}

/// Samples the fractional energy transfer of a fast secondary from the
/// Møller `1/ε²` law on `[min_fraction, 1/2]`.
pub fn sample_moller_fraction(min_fraction: f64, u: f64) -> Option<f64> {
    if !(min_fraction > 0.0) || min_fraction >= 0.5 {
        return None;
    }
    let inv_min = 1.0 / min_fraction;
    Some(1.0 / (inv_min - u * (inv_min - 2.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;
    use crate::geom::crystal::CrystalGeometry;
    use crate::geom::polyhedron::Polyhedron;
    use crate::io::resources::ResourceLocator;
    use crate::physics::coefficients::testing::{FixedMedium, FixedProvider, element};
    use crate::physics::elastic::ElasticAngleTables;
    use crate::sim::beam::{Beam, BeamShape};
    use crate::sim::config::SimulationConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::{TempDir, tempdir};

    /// Low-energy oxygen table sending every electron 10 degrees off course.
    fn data_dir() -> TempDir {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("elastic/low")).unwrap();
        let mut row = String::from("energy");
        for i in 0..181 {
            row.push_str(&format!(",c{i}"));
        }
        let mut content = row + "\n";
        for energy in [1.0, 10.0, 20.0] {
            let values: Vec<String> = (0..181)
                .map(|i| if i >= 10 { "1".to_string() } else { "0".to_string() })
                .collect();
            content.push_str(&format!("{energy},{}\n", values.join(",")));
        }
        std::fs::write(dir.path().join("elastic/low/8.csv"), content).unwrap();
        dir
    }

    fn transport<'p>(
        provider: &'p FixedProvider,
        dir: &TempDir,
        config: SimulationConfig,
    ) -> Transport<'p, FixedProvider> {
        let poly = Polyhedron::from_box(2000.0, 2000.0, 2000.0, Point::new(0.0, 0.0, 0.0)).unwrap();
        let geometry = CrystalGeometry::new(poly, 1.0).unwrap();
        let beam = Beam::new(12.0, 1e12, 1.0, 1.0, 1.0, BeamShape::Rectangular);
        let elastic = ElasticAngleTables::new(ResourceLocator::new(vec![dir.path().to_path_buf()]));
        Transport::new(provider, config, beam, geometry, elastic).unwrap()
    }

    fn oxygen_provider() -> FixedProvider {
        FixedProvider {
            crystal: FixedMedium::with_element(element(8, 0.543, 0.9, 0.0)),
            surrounding: None,
        }
    }

    fn electron(energy_kev: f64, position: Point) -> Electron {
        Electron::new(position, 0.3, 1.1, energy_kev, 2.0, Medium::Crystal, ElectronKind::Photo)
    }

    #[test]
    fn test_energy_conserved() {
        let dir = data_dir();
        let provider = oxygen_provider();
        let mut t = transport(&provider, &dir, SimulationConfig::new());
        let mut rng = StdRng::seed_from_u64(5);
        let mut started = 0.0;
        for i in 0..200 {
            let e = electron(4.0 + 0.02 * i as f64, Point::new(600.0, -200.0, 900.0));
            started += e.energy_kev;
            t.transport_cascade(e, &mut rng).unwrap();
        }
        let accounted = t.dose().deposited_kev() + t.dose().escaped_kev();
        assert!((accounted - started).abs() < 1e-9 * started);
        // Electrons near the surface do escape
        assert!(t.dose().escaped_kev() > 0.0);
    }

    #[test]
    fn test_steps_fill_occupancy_cache() {
        let dir = data_dir();
        let provider = oxygen_provider();
        let mut t = transport(&provider, &dir, SimulationConfig::new());
        assert_eq!(t.geometry().occupancy().computed_count(), 0);
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..20 {
            let e = electron(6.0, Point::new(600.0, -200.0, 900.0));
            t.transport_cascade(e, &mut rng).unwrap();
        }
        let computed = t.geometry().occupancy().computed_count();
        let (ni, nj, nk) = t.geometry().occupancy().dim();
        assert!(computed > 0);
        assert!(computed <= ni * nj * nk);
    }

    #[test]
    fn test_deep_electron_absorbed_in_place() {
        let dir = data_dir();
        let provider = oxygen_provider();
        let mut t = transport(&provider, &dir, SimulationConfig::new());
        let mut rng = StdRng::seed_from_u64(9);
        // 1 keV needs 50 nm at 0.02 keV/nm, the nearest face is 1000 nm away
        let e = electron(1.0, Point::new(0.0, 0.0, 0.0));
        let fate = t.transport_electron(e, &mut rng).unwrap();
        assert_eq!(fate, ElectronFate::Absorbed);
        assert!((t.dose().crystal_kev() - 1.0).abs() < 1e-12);
        // Deposited at the electron's own time
        assert!((t.dose().total()[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_below_cutoff() {
        let dir = data_dir();
        let provider = oxygen_provider();
        let mut t = transport(&provider, &dir, SimulationConfig::new());
        let mut rng = StdRng::seed_from_u64(1);
        let e = electron(0.04, Point::new(990.0, 0.0, 0.0));
        assert_eq!(t.transport_electron(e, &mut rng).unwrap(), ElectronFate::Absorbed);
        assert!((t.dose().crystal_kev() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_fast_secondaries_conserve_energy() {
        let dir = data_dir();
        let provider = oxygen_provider();
        let mut config = SimulationConfig::new();
        config.inelastic_model = InelasticModel::FastSecondaries;
        let mut t = transport(&provider, &dir, config);
        let mut rng = StdRng::seed_from_u64(21);
        let mut started = 0.0;
        for i in 0..100 {
            let e = electron(8.0 + 0.05 * i as f64, Point::new(-500.0, 300.0, 800.0));
            started += e.energy_kev;
            t.transport_cascade(e, &mut rng).unwrap();
        }
        let accounted = t.dose().deposited_kev() + t.dose().escaped_kev();
        assert!((accounted - started).abs() < 1e-9 * started);
        // Secondaries add ionizations
        assert!(t.dose().ionisations().iter().sum::<u64>() > 0);
    }

    #[test]
    fn test_moller_fraction() {
        assert!(sample_moller_fraction(0.6, 0.5).is_none());
        assert!(sample_moller_fraction(0.0, 0.5).is_none());
        let lo = sample_moller_fraction(0.01, 0.0).unwrap();
        let hi = sample_moller_fraction(0.01, 1.0).unwrap();
        assert!((lo - 0.01).abs() < 1e-12);
        assert!((hi - 0.5).abs() < 1e-12);
        // Median of 1/eps^2 on [a, b] is 2ab / (a + b)
        let median = sample_moller_fraction(0.01, 0.5).unwrap();
        assert!((median - 2.0 * 0.01 * 0.5 / 0.51).abs() < 1e-12);
    }
}
