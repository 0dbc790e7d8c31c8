//! Per-unit scratch directories.

use std::path::{Path, PathBuf};

use map_common::{LightingVariant, MapError, MapResult, Resolution};
use tempfile::TempDir;

/// A private working directory for one (product, variant, resolution) unit.
///
/// The directory and everything in it is removed when the context is dropped,
/// whichever way the unit exits.
#[derive(Debug)]
pub struct ScratchContext {
    dir: TempDir,
}

impl ScratchContext {
    pub fn new(
        root: &Path,
        product: &str,
        variant: LightingVariant,
        resolution: Resolution,
    ) -> MapResult<Self> {
        std::fs::create_dir_all(root)
            .map_err(|e| MapError::Io(format!("scratch root {}: {}", root.display(), e)))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-{}-{}-", product, variant.tag(), resolution))
            .tempdir_in(root)
            .map_err(|e| MapError::Io(format!("scratch dir in {}: {}", root.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a named intermediate inside the scratch directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
