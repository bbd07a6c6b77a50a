// src/query/distfiles.rs

//! Distfile verification against a package's distinfo manifest

use super::patches::PATCH_PREFIX;
use super::PkgQuery;
use crate::checksum::{ChecksumAlgorithm, ChecksumVerifier, Verification};
use crate::distinfo::Distinfo;
use crate::error::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Outcome for one distfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DistfileStatus {
    Valid,
    Mismatch { expected: String, computed: String },
    NotFound,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistfileReport {
    pub file: String,
    /// Size in bytes recorded in distinfo
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub status: DistfileStatus,
}

impl PkgQuery {
    /// Verify every distfile listed in `category/package/distinfo`
    ///
    /// Files are looked up in the distfiles directory. Each file gets its own
    /// status; one failure never stops the others. Checksums of local
    /// `patch-*` files are not distfiles and are left out. A manifest with
    /// no entry for `algorithm` yields an empty list.
    pub fn verify_distfiles(
        &self,
        package: &str,
        category: &str,
        algorithm: ChecksumAlgorithm,
    ) -> Result<Vec<DistfileReport>> {
        self.operation("verify_distfiles", || {
            let location = self.locate_source(package, Some(category))?;
            let distinfo = Distinfo::read(&location.path.join("distinfo"))?;
            let (patches, entries): (Vec<_>, Vec<_>) = distinfo
                .checksums(algorithm)
                .into_iter()
                .partition(|entry| entry.filename.starts_with(PATCH_PREFIX));
            if !patches.is_empty() {
                debug!("{}/{}: skipping {} patch checksum(s)", category, package, patches.len());
            }

            let distdir = self.config.distdir();
            let items: Vec<(PathBuf, String)> = entries
                .iter()
                .map(|entry| (distdir.join(&entry.filename), entry.digest.clone()))
                .collect();

            let verifier = ChecksumVerifier::new(algorithm);
            let outcomes = verifier.verify_all(&items);

            let reports: Vec<DistfileReport> = entries
                .into_iter()
                .zip(outcomes)
                .map(|(entry, outcome)| {
                    let status = match outcome {
                        Ok(Verification::Checked { matches: true, .. }) => DistfileStatus::Valid,
                        Ok(Verification::Checked { computed, .. }) => DistfileStatus::Mismatch {
                            expected: entry.digest.to_lowercase(),
                            computed,
                        },
                        Ok(Verification::NotFound) => DistfileStatus::NotFound,
                        Err(e) => {
                            warn!("Cannot verify {}: {}", entry.filename, e);
                            DistfileStatus::Error {
                                message: e.to_string(),
                            }
                        }
                    };
                    DistfileReport {
                        size: distinfo.size(&entry.filename),
                        file: entry.filename,
                        status,
                    }
                })
                .collect();

            let valid = reports
                .iter()
                .filter(|r| r.status == DistfileStatus::Valid)
                .count();
            info!(
                "{}/{}: {} of {} distfile(s) valid",
                category,
                package,
                valid,
                reports.len()
            );
            Ok(reports)
        })
    }
}
