//! Streaming checksum verification for downloaded files.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

/// Buffer size for hashing existing files (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Checksum algorithms a descriptor may declare.
///
/// Access points commonly publish md5 and sha1 digests; sha256 is accepted
/// where deployments provide it. Ordered weakest to strongest so the
/// strongest declared algorithm can be preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl ChecksumAlgorithm {
    /// The algorithm's name as it appears in descriptor checksum maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Pick the strongest supported algorithm from a descriptor's checksum
    /// map, along with its expected hex digest.
    ///
    /// Returns `None` when every declared algorithm is unsupported; the
    /// caller must fail the file rather than skip verification.
    pub fn preferred(checksums: &BTreeMap<String, String>) -> Option<(Self, String)> {
        for algorithm in [Self::Sha256, Self::Sha1, Self::Md5] {
            for (name, digest) in checksums {
                if name.eq_ignore_ascii_case(algorithm.as_str()) {
                    return Some((algorithm, digest.to_ascii_lowercase()));
                }
            }
        }
        None
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(format!("unsupported checksum algorithm: {other}")),
        }
    }
}

/// Incremental digest over a stream of chunks.
///
/// `update` feeds bytes as they arrive; `finalize_hex` consumes the
/// verifier and yields the lowercase hex digest.
pub struct ChecksumVerifier {
    algorithm: ChecksumAlgorithm,
    state: HasherState,
}

enum HasherState {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl ChecksumVerifier {
    /// Create a verifier for the given algorithm.
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        let state = match algorithm {
            ChecksumAlgorithm::Md5 => HasherState::Md5(Md5::new()),
            ChecksumAlgorithm::Sha1 => HasherState::Sha1(Sha1::new()),
            ChecksumAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
        };
        Self { algorithm, state }
    }

    /// The algorithm this verifier computes.
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Feed a chunk of downloaded bytes.
    pub fn update(&mut self, bytes: &[u8]) {
        match &mut self.state {
            HasherState::Md5(h) => h.update(bytes),
            HasherState::Sha1(h) => h.update(bytes),
            HasherState::Sha256(h) => h.update(bytes),
        }
    }

    /// Finish the digest as lowercase hex.
    pub fn finalize_hex(self) -> String {
        match self.state {
            HasherState::Md5(h) => format!("{:x}", h.finalize()),
            HasherState::Sha1(h) => format!("{:x}", h.finalize()),
            HasherState::Sha256(h) => format!("{:x}", h.finalize()),
        }
    }
}

impl fmt::Debug for ChecksumVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChecksumVerifier")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Hash an existing file on disk.
///
/// Used to re-verify a file that is already present at its final path
/// before short-circuiting a download.
pub(crate) async fn hash_file(
    path: &Path,
    algorithm: ChecksumAlgorithm,
) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut verifier = ChecksumVerifier::new(algorithm);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        verifier.update(&buffer[..read]);
    }
    Ok(verifier.finalize_hex())
}
