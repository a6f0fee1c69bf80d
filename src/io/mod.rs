//! File I/O: crystal shapes, run configuration, tabulated data resources and
//! result files.

pub mod config;
pub mod obj;
pub mod resources;
pub mod summary;

pub use config::{CrystalSpec, RunConfig, read_run_config};
pub use obj::{parse_obj, read_obj};
pub use resources::ResourceLocator;
pub use summary::{SUMMARY_HEADER, write_dose_profile, write_summary};
