// ==========================================
// Paie - file checksum
// ==========================================

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

pub const CHECKSUM_BUFFER_BYTES: usize = 64 * 1024;

/// Lowercase hex SHA-256 of the file contents, read in 64 KiB blocks
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHECKSUM_BUFFER_BYTES];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_known_digest() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"abc").unwrap();
        f.flush().unwrap();
        assert_eq!(
            file_sha256(f.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_large_file_spans_buffers() {
        let mut a = tempfile::NamedTempFile::new().unwrap();
        let mut b = tempfile::NamedTempFile::new().unwrap();
        let data = vec![7u8; CHECKSUM_BUFFER_BYTES * 2 + 11];
        a.write_all(&data).unwrap();
        b.write_all(&data).unwrap();
        b.write_all(b"x").unwrap();
        assert_eq!(file_sha256(a.path()).unwrap().len(), 64);
        assert_ne!(file_sha256(a.path()).unwrap(), file_sha256(b.path()).unwrap());
    }
}
