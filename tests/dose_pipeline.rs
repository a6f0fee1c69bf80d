use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use tempfile::{TempDir, tempdir};

use xfeldose::io::ResourceLocator;
use xfeldose::io::{SUMMARY_HEADER, read_run_config, write_summary};
use xfeldose::physics::coefficients::NUM_SHELLS;
use xfeldose::physics::elastic::ElasticAngleTables;
use xfeldose::physics::tabulated::{ElectronRow, MediumTable, PhotonRow, WeightedElement};
use xfeldose::sim::photon::{PhotonOutcome, sample_free_path};
use xfeldose::sim::transport::Transport;
use xfeldose::{
    Beam, BeamShape, CrystalGeometry, ElementData, Medium, PhotonCoefficients, Point, Polyhedron,
    Simulation, SimulationConfig, TabulatedCoefficients,
};

fn element(atomic_number: u32, k_edge: f64, k_fluorescence_yield: f64) -> WeightedElement {
    let mut edges_kev = [0.0; NUM_SHELLS];
    edges_kev[0] = k_edge;
    let mut shell_fractions = [0.0; NUM_SHELLS];
    shell_fractions[0] = 1.0;
    WeightedElement {
        data: ElementData {
            atomic_number,
            edges_kev,
            shell_fractions,
            k_fluorescence_yield,
        },
        photoelectric_weight: 1.0,
        elastic_weight: 1.0,
    }
}

/// Energy independent medium made of a single element.
fn medium(photoelectric: f64, compton: f64, element: WeightedElement) -> MediumTable {
    let photon = |energy_kev| PhotonRow {
        energy_kev,
        coefficients: PhotonCoefficients {
            photoelectric,
            compton,
            elastic: 1.0e-4,
        },
    };
    let electron = |energy_kev| ElectronRow {
        energy_kev,
        stopping_power: 0.02,
        elastic_mfpl: 50.0,
        inelastic_mfpl: 20.0,
        fse_mfpl: 200.0,
        plasma_mfpl: 30.0,
    };
    MediumTable::new(
        1.2,
        100.0,
        0.02,
        vec![photon(1.0), photon(100.0)],
        vec![electron(0.01), electron(100.0)],
        vec![element],
    )
    .unwrap()
}

/// Elastic and Auger tables for iron (Z=26) and sulfur (Z=16).
fn data_dir() -> TempDir {
    let dir = tempdir().unwrap();
    let low = dir.path().join("elastic/low");
    std::fs::create_dir_all(&low).unwrap();
    let header: Vec<String> = (0..181).map(|i| format!("c{i}")).collect();
    let mut content = format!("energy,{}\n", header.join(","));
    for energy in [0.1, 5.0, 20.0] {
        let values: Vec<String> = (0..181).map(|i| format!("{}", i * i)).collect();
        content.push_str(&format!("{energy},{}\n", values.join(",")));
    }
    for z in [16, 26] {
        std::fs::write(low.join(format!("{z}.csv")), &content).unwrap();
    }
    std::fs::create_dir_all(dir.path().join("auger")).unwrap();
    std::fs::write(dir.path().join("auger/16.csv"), "0.5,1.0,2100.0\n").unwrap();
    dir
}

fn locator(dir: &Path) -> ResourceLocator {
    ResourceLocator::new(vec![dir.to_path_buf()])
}

fn cube_um(side: f64) -> CrystalGeometry {
    let poly = Polyhedron::from_box(side, side, side, Point::new(0.0, 0.0, 0.0)).unwrap();
    CrystalGeometry::from_micrometres(poly, 1.0).unwrap()
}

fn beam() -> Beam {
    Beam::new(12.0, 1.0e12, 1.0, 2.0, 2.0, BeamShape::Rectangular)
}

#[test]
fn test_photoelectric_splits_binding_and_photoelectron() -> Result<()> {
    let dir = data_dir();
    let coefficients = TabulatedCoefficients::new(medium(1.0, 0.0, element(26, 4.0, 1.0)), None)?;
    let elastic = ElasticAngleTables::new(locator(dir.path()));
    let mut transport = Transport::new(
        &coefficients,
        SimulationConfig::new(),
        beam(),
        cube_um(10.0),
        elastic,
    )?;
    let mut rng = StdRng::seed_from_u64(12);

    transport.photoelectric_absorption(Point::new(0.0, 0.0, 0.0), 0.5, Medium::Crystal, &mut rng)?;

    let dose = transport.dose();
    // Binding energy in the photon bin, photoelectron stopped in place (range 400 nm)
    assert!((dose.photon()[0] - 4.0).abs() < 1e-9);
    assert!((dose.electron_crystal()[0] - 8.0).abs() < 1e-9);
    assert_eq!(dose.ionisations()[0], 1);
    assert_eq!(dose.escaped_kev(), 0.0);
    Ok(())
}

#[test]
fn test_auger_electron_follows_k_vacancy() -> Result<()> {
    let dir = data_dir();
    // Sulfur with zero fluorescence yield always relaxes by Auger emission
    let coefficients =
        TabulatedCoefficients::new(medium(1.0, 0.0, element(16, 2.472, 0.0)), None)?;
    let elastic = ElasticAngleTables::new(locator(dir.path()));
    let mut transport = Transport::new(
        &coefficients,
        SimulationConfig::new(),
        beam(),
        cube_um(10.0),
        elastic,
    )?;
    assert!(transport.auger().get(16).is_some());
    let mut rng = StdRng::seed_from_u64(3);

    transport.photoelectric_absorption(Point::new(0.0, 0.0, 0.0), 0.5, Medium::Crystal, &mut rng)?;

    let dose = transport.dose();
    // The Auger electron carries 2.1 keV of the 2.472 keV binding energy
    assert!((dose.photon()[0] - 0.372).abs() < 1e-9);
    assert!((dose.electron_crystal()[0] - 9.528).abs() < 1e-9);
    // Emitted after the 1.316 fs vacancy lifetime
    assert!((dose.electron_crystal()[1] - 2.1).abs() < 1e-9);
    assert_eq!(dose.ionisations().iter().sum::<u64>(), 2);
    assert!((dose.crystal_kev() - 12.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_energy_conservation_per_history() -> Result<()> {
    let dir = data_dir();
    let coefficients = TabulatedCoefficients::new(
        medium(0.3, 0.1, element(26, 4.0, 1.0)),
        Some(medium(0.1, 0.05, element(26, 4.0, 1.0))),
    )?;
    let mut config = SimulationConfig::new();
    config.track_surrounding_electrons = true;
    let elastic = ElasticAngleTables::new(locator(dir.path()));
    let mut transport = Transport::new(&coefficients, config, beam(), cube_um(1.0), elastic)?;
    let mut rng = StdRng::seed_from_u64(99);

    let mut absorbed = 0;
    let mut scattered = 0.0;
    for _ in 0..500 {
        if let PhotonOutcome::Absorbed { scattered_kev, .. } = transport.track_photon(0.0, &mut rng)? {
            absorbed += 1;
            scattered += scattered_kev;
        }
    }
    assert!(absorbed > 0);
    let dose = transport.dose();
    let accounted = dose.deposited_kev() + dose.escaped_kev() + scattered;
    let started = 12.0 * absorbed as f64;
    assert!((accounted - started).abs() < 1e-9 * started);
    Ok(())
}

#[test]
fn test_free_paths_are_exponential() {
    // Kolmogorov-Smirnov test at the 0.1% level
    let mut rng = StdRng::seed_from_u64(2024);
    let mu = 0.004;
    let n = 4000;
    let mut samples: Vec<f64> = (0..n).map(|_| sample_free_path(mu, &mut rng)).collect();
    samples.sort_by(f64::total_cmp);
    let statistic = samples
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let cdf = 1.0 - (-mu * x).exp();
            let lo = i as f64 / n as f64;
            let hi = (i + 1) as f64 / n as f64;
            (cdf - lo).abs().max((hi - cdf).abs())
        })
        .fold(0.0, f64::max);
    assert!(statistic < 1.95 / (n as f64).sqrt(), "KS statistic = {statistic}");
}

#[test]
fn test_interaction_depths_in_crystal() -> Result<()> {
    let dir = data_dir();
    // mu = 0.15 / µm over a 10 µm deep slab
    let coefficients = TabulatedCoefficients::new(medium(0.1, 0.05, element(26, 4.0, 1.0)), None)?;
    let poly = Polyhedron::from_box(4.0, 4.0, 10.0, Point::new(0.0, 0.0, 0.0))?;
    let geometry = CrystalGeometry::from_micrometres(poly, 1.0)?;
    let elastic = ElasticAngleTables::new(locator(dir.path()));
    let mut transport =
        Transport::new(&coefficients, SimulationConfig::new(), beam(), geometry, elastic)?;
    assert_eq!(transport.geometry().occupancy().computed_count(), 0);
    let mut rng = StdRng::seed_from_u64(314);

    let front_z = transport.geometry().bbox().0.z;
    let thickness = transport.geometry().thickness();
    let mut depths = Vec::new();
    let mut transmitted = 0;
    for _ in 0..3000 {
        match transport.track_photon(0.0, &mut rng)? {
            PhotonOutcome::Absorbed {
                position, medium, ..
            } => {
                assert_eq!(medium, Medium::Crystal);
                depths.push(position.z - front_z);
            }
            PhotonOutcome::Transmitted => transmitted += 1,
            PhotonOutcome::Missed => panic!("beam lies within the crystal footprint"),
        }
    }
    // Interaction points were classified through the voxel cache
    assert!(transport.geometry().occupancy().computed_count() > 0);
    assert!(transmitted > 0);

    // Kolmogorov-Smirnov test against the exponential truncated at the back face
    let mu = 0.15 / 1000.0;
    let norm = 1.0 - (-mu * thickness).exp();
    let n = depths.len();
    depths.sort_by(f64::total_cmp);
    let statistic = depths
        .iter()
        .enumerate()
        .map(|(i, &z)| {
            assert!((0.0..=thickness).contains(&z));
            let cdf = (1.0 - (-mu * z).exp()) / norm;
            let lo = i as f64 / n as f64;
            let hi = (i + 1) as f64 / n as f64;
            (cdf - lo).abs().max((hi - cdf).abs())
        })
        .fold(0.0, f64::max);
    assert!(statistic < 1.95 / (n as f64).sqrt(), "KS statistic = {statistic}");

    // Fraction interacting matches 1 - exp(-mu t)
    let fraction = n as f64 / 3000.0;
    assert!((fraction - norm).abs() < 0.04, "fraction = {fraction}");
    Ok(())
}

#[test]
fn test_dose_independent_of_history_count() -> Result<()> {
    let dir = data_dir();
    let coefficients = TabulatedCoefficients::new(medium(2.0, 0.0, element(26, 4.0, 1.0)), None)?;
    let run = |num_photons: usize| -> Result<f64> {
        let mut config = SimulationConfig::new();
        config.num_photons = num_photons;
        config.exposed_volume_samples = 16;
        let sim = Simulation::new(
            cube_um(4.0),
            beam(),
            config,
            &coefficients,
            locator(dir.path()),
        )?;
        let mut rng = StdRng::seed_from_u64(num_photons as u64);
        Ok(sim.run_with_rng(&mut rng)?.report().total_dose_mgy)
    };
    let single = run(1000)?;
    let double = run(2000)?;
    assert!(single > 0.0);
    assert!(
        (single - double).abs() / single < 0.05,
        "single = {single}, double = {double}"
    );
    Ok(())
}

#[test]
fn test_run_from_config_file() -> Result<()> {
    let dir = data_dir();
    let config_json = r#"{
        "crystal": { "box": [3.0, 3.0, 3.0], "voxels_per_micron": 2.0 },
        "beam": { "energy_kev": 12.0, "flux": 1e12, "exposure_s": 1e-3, "x_um": 2.0, "y_um": 2.0 },
        "simulation": { "num_photons": 300, "pulse_length_fs": 10.0, "seed": 8 },
        "coefficients": {
            "crystal": {
                "density": 1.2,
                "atoms_per_nm3": 100.0,
                "plasma_energy_kev": 0.02,
                "photon": [
                    { "energy_kev": 1.0, "photoelectric": 0.5, "compton": 0.05, "elastic": 0.001 },
                    { "energy_kev": 100.0, "photoelectric": 0.5, "compton": 0.05, "elastic": 0.001 }
                ],
                "electron": [
                    { "energy_kev": 0.01, "stopping_power": 0.02, "elastic_mfpl": 50.0, "inelastic_mfpl": 20.0, "fse_mfpl": 200.0, "plasma_mfpl": 30.0 },
                    { "energy_kev": 100.0, "stopping_power": 0.02, "elastic_mfpl": 50.0, "inelastic_mfpl": 20.0, "fse_mfpl": 200.0, "plasma_mfpl": 30.0 }
                ],
                "elements": [
                    {
                        "atomic_number": 26,
                        "edges_kev": [7.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                        "shell_fractions": [0.85, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                        "k_fluorescence_yield": 0.35,
                        "photoelectric_weight": 1.0,
                        "elastic_weight": 1.0
                    }
                ]
            }
        },
        "data_dir": "tables",
        "output_dir": "out"
    }"#;
    let work = tempdir()?;
    std::fs::write(work.path().join("run.json"), config_json)?;
    // Data files are looked up relative to the config file
    std::fs::create_dir_all(work.path().join("tables/elastic/low"))?;
    std::fs::copy(
        dir.path().join("elastic/low/26.csv"),
        work.path().join("tables/elastic/low/26.csv"),
    )?;

    let config = read_run_config(&work.path().join("run.json"))?;
    let simulation = Simulation::new(
        config.crystal.build()?,
        config.beam.clone(),
        config.simulation.clone(),
        &config.coefficients,
        config.locator(),
    )?;
    let report = simulation.run()?.report();
    assert!(report.total_dose_mgy > 0.0);
    assert!(report.dose_within_pulse_mgy <= report.total_dose_mgy);
    assert!(report.diffraction_efficiency > 0.0);
    assert!(report.raddose_dose_mgy > 0.0);

    std::fs::create_dir_all(&config.output_dir)?;
    let summary = config.output_dir.join("summary.csv");
    write_summary(&summary, &report)?;
    let content = std::fs::read_to_string(&summary)?;
    assert_eq!(content.lines().next(), Some(SUMMARY_HEADER));
    assert_eq!(content.lines().nth(1).map(|l| l.split(',').nth(1)), Some(Some("300")));
    Ok(())
}
