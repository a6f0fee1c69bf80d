//! Lookup of tabulated data files.
//!
//! Data files are searched in an ordered list of root directories. The data
//! directory bundled with the crate comes first, a user-configured directory
//! second.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ResourceLocator {
    roots: Vec<PathBuf>,
}

impl ResourceLocator {
    /// Locator searching only the given roots, in order.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Locator searching the crate's bundled `data` directory.
    pub fn bundled() -> Self {
        Self::new(vec![PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data"
        ))])
    }

    /// Appends a fallback root searched after the existing ones.
    pub fn with_fallback(mut self, root: impl AsRef<Path>) -> Self {
        self.roots.push(root.as_ref().to_path_buf());
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolves `relative` against the roots and returns the first existing file.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        for root in &self.roots {
            let candidate = root.join(relative);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        let tried: Vec<String> = self
            .roots
            .iter()
            .map(|r| r.join(relative).display().to_string())
            .collect();
        bail!(
            "Data file '{relative}' not found, tried: [{}]",
            tried.join(", ")
        )
    }

    /// Reads the first existing `relative` file into a string.
    pub fn read_to_string(&self, relative: &str) -> Result<String> {
        let path = self.resolve(relative)?;
        log::debug!("Loading {}", path.display());
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {}", path.display()))
    }
}
