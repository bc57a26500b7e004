//! SHA-256 helpers for content addressing.
//!
//! Evidence dialects declare bare lower-case hex (no `sha256:` prefix),
//! so everything here produces exactly 64 hex chars. Declared values are
//! compared case-insensitively at the validation layer.

use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Hash a byte slice to lower-case hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash a file on disk with a bounded buffer (no whole-file allocation).
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// True if `declared` is a syntactically valid sha256 hex digest.
pub fn is_hex_digest(declared: &str) -> bool {
    declared.len() == 64 && declared.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_known_digest() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn file_hash_matches_slice_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"evidence").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), sha256_hex(b"evidence"));
    }

    #[test]
    fn digest_syntax() {
        assert!(is_hex_digest(&sha256_hex(b"x")));
        assert!(is_hex_digest(
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        ));
        assert!(!is_hex_digest("deadbeef"));
        assert!(!is_hex_digest(&format!("{}zz", &sha256_hex(b"x")[..62])));
    }
}
