// src/distinfo.rs

//! Parser for pkgsrc `distinfo` manifests
//!
//! Each line has the form `ALGORITHM (filename) = value`:
//!
//! ```text
//! $NetBSD: distinfo,v 1.5 2021/10/26 10:51:32 nia Exp $
//!
//! SHA1 (six-1.16.0.tar.gz) = 06f2e7a7f2b4e5d3...
//! SHA512 (six-1.16.0.tar.gz) = 0c9b...
//! Size (six-1.16.0.tar.gz) = 34041 bytes
//! ```

use crate::checksum::ChecksumAlgorithm;
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Expected digest of one distfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumEntry {
    pub filename: String,
    pub digest: String,
}

/// One raw `ALGORITHM (filename) = value` line
#[derive(Debug, Clone, PartialEq, Eq)]
struct DistinfoLine {
    algorithm: String,
    filename: String,
    value: String,
}

/// Parsed distinfo manifest
#[derive(Debug, Clone, Default)]
pub struct Distinfo {
    lines: Vec<DistinfoLine>,
}

impl Distinfo {
    /// Parse manifest content. Lines that do not match the format are skipped.
    pub fn parse(content: &str) -> Self {
        let lines = content
            .lines()
            .filter_map(|line| Self::parse_line(line.trim()))
            .collect();
        Self { lines }
    }

    /// Read and parse a distinfo file
    pub fn read(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound(format!(
                "distinfo file {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let distinfo = Self::parse(&content);
        debug!("Parsed {} distinfo lines from {}", distinfo.lines.len(), path.display());
        Ok(distinfo)
    }

    fn parse_line(line: &str) -> Option<DistinfoLine> {
        if line.is_empty() || line.starts_with('$') || line.starts_with('#') {
            return None;
        }
        let (algorithm, rest) = line.split_once(" (")?;
        let (filename, value) = rest.rsplit_once(") = ")?;
        if algorithm.is_empty() || filename.is_empty() || value.trim().is_empty() {
            return None;
        }
        Some(DistinfoLine {
            algorithm: algorithm.trim().to_string(),
            filename: filename.to_string(),
            value: value.trim().to_string(),
        })
    }

    /// Checksum entries for one algorithm, in manifest order
    pub fn checksums(&self, algorithm: ChecksumAlgorithm) -> Vec<ChecksumEntry> {
        self.lines
            .iter()
            .filter(|line| line.algorithm == algorithm.as_str())
            .map(|line| ChecksumEntry {
                filename: line.filename.clone(),
                digest: line.value.clone(),
            })
            .collect()
    }

    /// Recorded size in bytes of a distfile
    pub fn size(&self, filename: &str) -> Option<u64> {
        self.lines
            .iter()
            .find(|line| line.algorithm == "Size" && line.filename == filename)
            .and_then(|line| line.value.split_whitespace().next())
            .and_then(|bytes| bytes.parse().ok())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
