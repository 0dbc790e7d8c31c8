//! Atomic artifact writing.

use std::fs;
use std::path::{Path, PathBuf};

use map_common::{bitmap_name, compressed_name, LightingVariant, MapError, MapResult, Resolution};
use renderer::compress;
use tracing::debug;

/// Write `bytes` to `path` through a `.tmp` sibling and a rename, so readers
/// never see a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> MapResult<()> {
    let tmp = stage(path, bytes)?;
    commit(&tmp, path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Write `bytes` next to `path` without touching `path` itself.
fn stage(path: &Path, bytes: &[u8]) -> MapResult<PathBuf> {
    let tmp = tmp_path(path);
    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(MapError::Io(format!("writing {}: {}", path.display(), e)));
    }
    Ok(tmp)
}

fn commit(tmp: &Path, path: &Path) -> MapResult<()> {
    if let Err(e) = fs::rename(tmp, path) {
        let _ = fs::remove_file(tmp);
        return Err(MapError::Io(format!("writing {}: {}", path.display(), e)));
    }
    Ok(())
}

/// Write a unit's bitmap and its compressed sibling.
///
/// Both files are staged before either is renamed into place. If the pair
/// can't be completed, neither final name is left behind.
///
/// Returns the paths written, bitmap first.
pub fn write_artifacts(
    dir: &Path,
    variant: LightingVariant,
    resolution: Resolution,
    product: &str,
    bitmap: &[u8],
) -> MapResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .map_err(|e| MapError::Io(format!("creating {}: {}", dir.display(), e)))?;

    let packed = compress(bitmap)?;

    let bmp_path = dir.join(bitmap_name(variant, resolution, product));
    let z_path = dir.join(compressed_name(variant, resolution, product));

    let bmp_tmp = stage(&bmp_path, bitmap)?;
    let z_tmp = match stage(&z_path, &packed) {
        Ok(tmp) => tmp,
        Err(e) => {
            let _ = fs::remove_file(&bmp_tmp);
            return Err(e);
        }
    };

    commit(&bmp_tmp, &bmp_path).inspect_err(|_| {
        let _ = fs::remove_file(&z_tmp);
    })?;
    if let Err(e) = commit(&z_tmp, &z_path) {
        // Never leave half a pair
        let _ = fs::remove_file(&bmp_path);
        if z_path.is_file() {
            let _ = fs::remove_file(&z_path);
        }
        return Err(e);
    }

    debug!(
        bitmap = %bmp_path.display(),
        bytes = bitmap.len(),
        compressed = packed.len(),
        "Wrote artifacts"
    );
    Ok(vec![bmp_path, z_path])
}
