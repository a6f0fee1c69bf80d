use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::crystal::CrystalGeometry;
use crate::io::resources::ResourceLocator;
use crate::physics::coefficients::{CoefficientProvider, Medium};
use crate::physics::elastic::ElasticAngleTables;
use crate::sim::beam::Beam;
use crate::sim::config::SimulationConfig;
use crate::sim::dose::DoseAccumulator;
use crate::sim::photon::PhotonOutcome;
use crate::sim::report::{DoseReport, Normalization};
use crate::sim::transport::Transport;

/// Progress snapshot passed to progress callbacks.
#[derive(Debug, Clone, Copy)]
pub struct SimulationProgress {
    pub photons_done: usize,
    pub num_photons: usize,
    /// Photons that interacted somewhere in the tracked volume.
    pub photons_absorbed: usize,
    /// Energy deposited so far in the crystal (keV).
    pub crystal_kev: f64,
}

pub struct SimulationResult {
    pub dose: DoseAccumulator,
    pub normalization: Normalization,
    pub photons_absorbed: usize,
    pub photons_missed: usize,
}

impl SimulationResult {
    pub fn report(&self) -> DoseReport {
        DoseReport::new(&self.dose, &self.normalization)
    }
}

pub struct Simulation<'p, P: CoefficientProvider> {
    transport: Transport<'p, P>,
}

trait ProgressReporter {
    fn every_photons(&self) -> usize;
    fn report(&mut self, progress: &SimulationProgress);
}

struct NoProgress;
impl ProgressReporter for NoProgress {
    fn every_photons(&self) -> usize {
        0
    }
    fn report(&mut self, _progress: &SimulationProgress) {}
}

struct FnProgress<F> {
    every_photons: usize,
    f: F,
}
impl<F> ProgressReporter for FnProgress<F>
where
    F: FnMut(&SimulationProgress),
{
    fn every_photons(&self) -> usize {
        self.every_photons
    }
    fn report(&mut self, progress: &SimulationProgress) {
        (self.f)(progress);
    }
}

impl<'p, P: CoefficientProvider> Simulation<'p, P> {
    /// Prepares a run. Auger tables for the elements present are loaded here;
    /// elastic tables are loaded on first use during transport.
    pub fn new(
        geometry: CrystalGeometry,
        beam: Beam,
        config: SimulationConfig,
        provider: &'p P,
        locator: ResourceLocator,
    ) -> Result<Self> {
        config.validate()?;
        beam.validate()?;
        let elastic = ElasticAngleTables::new(locator);
        let transport = Transport::new(provider, config, beam, geometry, elastic)?;
        Ok(Self { transport })
    }

    pub fn transport(&self) -> &Transport<'p, P> {
        &self.transport
    }

    /// Runs with a generator seeded from the configuration, or from entropy
    /// when no seed is set.
    pub fn run(self) -> Result<SimulationResult> {
        let mut rng = self.make_rng();
        self.run_inner(&mut rng, NoProgress)
    }

    pub fn run_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<SimulationResult> {
        self.run_inner(rng, NoProgress)
    }

    /// Runs the simulation while periodically reporting progress.
    ///
    /// - `every_photons=0` disables progress reporting.
    /// - The reporter is called once at start and then every `every_photons`,
    ///   plus once at the end.
    pub fn run_with_progress<F>(self, every_photons: usize, report: F) -> Result<SimulationResult>
    where
        F: FnMut(&SimulationProgress),
    {
        let mut rng = self.make_rng();
        let reporter = FnProgress {
            every_photons,
            f: report,
        };
        self.run_inner(&mut rng, reporter)
    }

    fn make_rng(&self) -> StdRng {
        match self.transport.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn run_inner<R, Rep>(mut self, rng: &mut R, mut reporter: Rep) -> Result<SimulationResult>
    where
        R: Rng + ?Sized,
        Rep: ProgressReporter,
    {
        let num_photons = self.transport.config.num_photons;
        let num_cohorts = self.transport.config.num_cohorts();
        let every = reporter.every_photons();

        log::info!(
            "Simulating {num_photons} photons at {} keV in {num_cohorts} cohorts",
            self.transport.beam.energy_kev
        );

        let mut progress = SimulationProgress {
            photons_done: 0,
            num_photons,
            photons_absorbed: 0,
            crystal_kev: 0.0,
        };
        let mut photons_missed = 0;
        if every > 0 {
            reporter.report(&progress);
        }

        for photon in 0..num_photons {
            let entry_time = self.transport.config.entry_time_fs(photon);
            match self.transport.track_photon(entry_time, rng)? {
                PhotonOutcome::Absorbed { .. } => progress.photons_absorbed += 1,
                PhotonOutcome::Missed => photons_missed += 1,
                PhotonOutcome::Transmitted => {}
            }
            progress.photons_done += 1;
            if every > 0 && progress.photons_done % every == 0 {
                progress.crystal_kev = self.transport.dose.crystal_kev();
                reporter.report(&progress);
            }
        }

        if every > 0 && progress.photons_done % every != 0 {
            progress.crystal_kev = self.transport.dose.crystal_kev();
            reporter.report(&progress);
        }
        if photons_missed == num_photons {
            log::warn!("No photon reached the crystal, check the beam footprint");
        }

        let beam = self.transport.beam.clone();
        let config = self.transport.config.clone();
        let provider = self.transport.provider;
        let (dose, geometry) = self.transport.into_parts();

        let exposed_volume_nm3 =
            geometry.exposed_volume(|x, y| beam.contains(x, y), config.exposed_volume_samples);
        if !(exposed_volume_nm3 > 0.0) {
            log::warn!("Beam footprint does not cover the crystal, dose is reported as zero");
        }
        let normalization = Normalization {
            beam_energy_kev: beam.energy_kev,
            physical_photons: beam.photons(),
            photons_simulated: progress.photons_done,
            exposed_volume_nm3,
            density: provider.density(Medium::Crystal),
            atoms_per_nm3: provider.atoms_per_nm3(Medium::Crystal),
            thickness_nm: geometry.thickness(),
            coefficients: provider.photon_coefficients(beam.energy_kev, Medium::Crystal),
            pulse_length_fs: config.pulse_length_fs,
        };
        log::info!(
            "Finished: {} of {} photons interacted, {:.3} keV deposited in the crystal",
            progress.photons_absorbed,
            progress.photons_done,
            dose.crystal_kev()
        );

        Ok(SimulationResult {
            dose,
            normalization,
            photons_absorbed: progress.photons_absorbed,
            photons_missed,
        })
    }
}
