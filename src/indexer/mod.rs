//! Building blocks for filling the vector store from a directory of files.

pub mod chunker;
pub mod extractor;
pub mod walker;

use std::path::Path;

use sha2::{Digest, Sha256};

pub const EMBED_BATCH_SIZE: usize = 32;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Stable id of a source file: first 8 bytes of the SHA-256 of its path, hex.
pub fn file_id(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    hex::encode(&digest[..8])
}

pub fn chunk_id(file_id: &str, chunk_index: usize) -> String {
    format!("{}_{}", file_id, chunk_index)
}

/// The file part of a chunk id.
pub fn file_id_of(chunk_id: &str) -> &str {
    chunk_id.split('_').next().unwrap_or(chunk_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_is_sixteen_hex_digits() {
        let id = file_id(Path::new("docs/report.pdf"));
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, file_id(Path::new("docs/report.pdf")));
        assert_ne!(id, file_id(Path::new("docs/other.pdf")));
    }

    #[test]
    fn test_chunk_id_round_trip() {
        let id = chunk_id("0123456789abcdef", 7);
        assert_eq!(id, "0123456789abcdef_7");
        assert_eq!(file_id_of(&id), "0123456789abcdef");
    }
}
