//! Content checksums used by the duplicate resolver.
//!
//! Files are streamed through the hasher in 8KB chunks, so memory use does
//! not depend on file size. Digests are rendered as lowercase hex.
use crate::error::Result;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use std::{fs::File, io, io::Read, path::Path};

/// Hash algorithm for content comparison, ordered weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Blake3,
}

/// Compute the checksum of a file
pub fn compute_checksum<P: AsRef<Path>>(path: P, algorithm: ChecksumAlgorithm) -> Result<String> {
    let mut file = File::open(&path)?;
    Ok(checksum_reader(&mut file, algorithm)?)
}

/// Compute the checksum of everything left in `reader`
pub fn checksum_reader<R: Read>(reader: &mut R, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    let hex = match algorithm {
        ChecksumAlgorithm::Md5 => {
            let mut hasher = Md5::new();
            feed(reader, |chunk| hasher.update(chunk))?;
            format!("{:x}", hasher.finalize())
        }
        ChecksumAlgorithm::Sha1 => {
            let mut hasher = Sha1::new();
            feed(reader, |chunk| hasher.update(chunk))?;
            format!("{:x}", hasher.finalize())
        }
        ChecksumAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            feed(reader, |chunk| {
                hasher.update(chunk);
            })?;
            hasher.finalize().to_hex().to_string()
        }
    };
    Ok(hex)
}

fn feed<R: Read>(reader: &mut R, mut update: impl FnMut(&[u8])) -> io::Result<()> {
    let mut buffer = [0; 8192]; // 8KB buffer
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        update(&buffer[..bytes_read]);
    }
}
