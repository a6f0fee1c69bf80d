//! JSON run configuration.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::Point;
use crate::geom::crystal::CrystalGeometry;
use crate::geom::polyhedron::Polyhedron;
use crate::io::obj::read_obj;
use crate::io::resources::ResourceLocator;
use crate::physics::tabulated::TabulatedCoefficients;
use crate::sim::beam::Beam;
use crate::sim::config::SimulationConfig;

fn default_voxels_per_micron() -> f64 {
    10.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Crystal shape: either a box or an OBJ mesh, both in µm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrystalSpec {
    /// Box dimensions (x, y, z) in µm, centred at the origin.
    #[serde(rename = "box", default)]
    pub box_um: Option<[f64; 3]>,
    #[serde(default)]
    pub obj: Option<PathBuf>,
    #[serde(default = "default_voxels_per_micron")]
    pub voxels_per_micron: f64,
}

impl CrystalSpec {
    pub fn build(&self) -> Result<CrystalGeometry> {
        let polyhedron = match (&self.box_um, &self.obj) {
            (Some([dx, dy, dz]), None) => {
                Polyhedron::from_box(*dx, *dy, *dz, Point::new(0.0, 0.0, 0.0))?
            }
            (None, Some(path)) => read_obj(path)?,
            (Some(_), Some(_)) => bail!("Crystal must be given either as 'box' or as 'obj', not both"),
            (None, None) => bail!("Crystal needs a 'box' or an 'obj' shape"),
        };
        CrystalGeometry::from_micrometres(polyhedron, self.voxels_per_micron)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub crystal: CrystalSpec,
    pub beam: Beam,
    #[serde(default)]
    pub simulation: SimulationConfig,
    pub coefficients: TabulatedCoefficients,
    /// Searched for data files after the bundled data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl RunConfig {
    pub fn validate(&mut self) -> Result<()> {
        self.beam.validate()?;
        self.simulation.validate()?;
        self.coefficients
            .validate()
            .context("Invalid coefficient tables")?;
        Ok(())
    }

    pub fn locator(&self) -> ResourceLocator {
        let locator = ResourceLocator::bundled();
        match &self.data_dir {
            Some(dir) => locator.with_fallback(dir),
            None => locator,
        }
    }

    /// Makes relative paths relative to `base` (the configuration file's directory).
    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(obj) = self.crystal.obj.as_mut() {
            resolve(obj);
        }
        if let Some(dir) = self.data_dir.as_mut() {
            resolve(dir);
        }
        resolve(&mut self.output_dir);
    }
}

/// Reads and validates a run configuration.
///
/// Relative paths inside the file are taken relative to the file's directory.
pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut config: RunConfig = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize run config from: {}", path.display()))?;

    let base = path.parent().unwrap_or(Path::new("."));
    config.resolve_paths(base);
    config
        .validate()
        .with_context(|| format!("Invalid run config: {}", path.display()))?;
    Ok(config)
}
