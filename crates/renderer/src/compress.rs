//! zlib transport wrapper for `.z` artifacts.

use std::io::{Read, Write};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use map_common::{MapError, MapResult};

/// File extension of compressed artifacts.
pub const COMPRESSED_EXTENSION: &str = "z";

/// zlib-wrap `bytes` at maximum compression.
pub fn compress(bytes: &[u8]) -> MapResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(bytes.len() / 4), Compression::best());
    encoder
        .write_all(bytes)
        .map_err(|e| MapError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| MapError::Compression(e.to_string()))
}

/// Inflate a zlib stream.
pub fn decompress(bytes: &[u8]) -> MapResult<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len() * 4);
    ZlibDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| MapError::Compression(e.to_string()))?;
    Ok(out)
}

/// Read an artifact, inflating it if the name ends in `.z`.
pub fn read_artifact(path: impl AsRef<Path>) -> MapResult<Vec<u8>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| MapError::Io(format!("{}: {}", path.display(), e)))?;
    if path.extension().is_some_and(|ext| ext == COMPRESSED_EXTENSION) {
        decompress(&bytes)
    } else {
        Ok(bytes)
    }
}
