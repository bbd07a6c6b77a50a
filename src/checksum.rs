// src/checksum.rs

//! Streaming checksum verification
//!
//! Files are hashed through `io::copy`, so distfiles of any size are never
//! loaded into memory at once. A missing file is a reportable outcome
//! ([`Verification::NotFound`]) rather than an error.

use crate::error::{Error, Result};
use rayon::prelude::*;
use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Digest algorithms recorded in distinfo manifests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ChecksumAlgorithm {
    #[default]
    Sha1,
    Sha512,
}

impl ChecksumAlgorithm {
    /// Tag used for this algorithm in distinfo lines
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha1 => "SHA1",
            ChecksumAlgorithm::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SHA1" | "SHA-1" => Ok(ChecksumAlgorithm::Sha1),
            "SHA512" | "SHA-512" => Ok(ChecksumAlgorithm::Sha512),
            _ => Err(format!("Unsupported checksum algorithm: {}", s)),
        }
    }
}

/// Outcome of verifying one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verification {
    /// The file was hashed; `matches` compares against the expected digest
    Checked { matches: bool, computed: String },
    /// The file does not exist
    NotFound,
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Checked { matches: true, .. })
    }
}

/// Verifies files against expected hex digests
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumVerifier {
    algorithm: ChecksumAlgorithm,
}

impl ChecksumVerifier {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Compute the lowercase hex digest of a file
    pub fn digest_file(&self, path: &Path) -> Result<String> {
        let file = File::open(path)?;
        match self.algorithm {
            ChecksumAlgorithm::Sha1 => stream_digest(file, Sha1::new()),
            ChecksumAlgorithm::Sha512 => stream_digest(file, Sha512::new()),
        }
    }

    /// Verify a file against an expected digest (compared case-insensitively)
    pub fn verify(&self, path: &Path, expected: &str) -> Result<Verification> {
        debug!("Verifying {} checksum for {}", self.algorithm, path.display());

        let computed = match self.digest_file(path) {
            Ok(digest) => digest,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} does not exist", path.display());
                return Ok(Verification::NotFound);
            }
            Err(e) => return Err(e),
        };

        let matches = computed.eq_ignore_ascii_case(expected.trim());
        Ok(Verification::Checked { matches, computed })
    }

    /// Verify several files in parallel
    ///
    /// Results are returned in input order; one failure does not affect the
    /// others.
    pub fn verify_all(&self, items: &[(PathBuf, String)]) -> Vec<Result<Verification>> {
        items
            .par_iter()
            .map(|(path, expected)| self.verify(path, expected))
            .collect()
    }
}

fn stream_digest<D: Digest + Write>(mut file: File, mut hasher: D) -> Result<String> {
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}
