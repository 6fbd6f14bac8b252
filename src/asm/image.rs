//! Flat binary program images.
//!
//! An image is a raw sequence of 32-bit little-endian words: no header,
//! no magic number, no relocation. The loader copies it into memory at the
//! load address and starts execution there.

use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Default address programs are loaded at.
pub const DEFAULT_LOAD_ADDRESS: u32 = 0x0000_1000;

/// Decode a byte buffer into instruction words.
pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u32>, ImageError> {
    if bytes.len() % 4 != 0 {
        return Err(ImageError::TrailingBytes {
            len: bytes.len(),
            trailing: bytes.len() % 4,
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Encode instruction words as image bytes.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Load an image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Vec<u32>, ImageError> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| ImageError::IoError(e.to_string()))?;
    let words = words_from_bytes(&bytes)?;
    tracing::debug!(path = %path.as_ref().display(), words = words.len(), "loaded image");
    Ok(words)
}

/// Save an image to disk.
pub fn save_image<P: AsRef<Path>>(path: P, words: &[u32]) -> Result<(), ImageError> {
    let mut file =
        std::fs::File::create(path.as_ref()).map_err(|e| ImageError::IoError(e.to_string()))?;
    file.write_all(&words_to_bytes(words))
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    Ok(())
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("image size {len} is not a whole number of words ({trailing} trailing bytes)")]
    TrailingBytes { len: usize, trailing: usize },
}
