// src/packages/binary.rs

//! Binary package metadata
//!
//! Installed packages and package files carry the same `+` metadata files:
//! `+CONTENTS` (packing list), `+COMMENT`, `+DESC`, `+BUILD_INFO`,
//! `+SIZE_PKG` and, for installed packages, `+REQUIRED_BY`. Package files
//! are tarballs compressed with gzip, xz or zstd, with the metadata entries
//! at the front of the archive.

use crate::error::{Error, Result};
use crate::packages::record::{BinaryDetails, PackageRecord, Provenance};
use crate::packages::traits::{Dependency, DependencyType, PackageFormat};
use crate::version::{split_pkgname, UNKNOWN_VERSION};
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, warn};
use xz2::read::XzDecoder;

pub const CONTENTS_FNAME: &str = "+CONTENTS";
pub const COMMENT_FNAME: &str = "+COMMENT";
pub const DESC_FNAME: &str = "+DESC";
pub const BUILD_INFO_FNAME: &str = "+BUILD_INFO";
pub const SIZE_PKG_FNAME: &str = "+SIZE_PKG";
pub const REQUIRED_BY_FNAME: &str = "+REQUIRED_BY";

/// Metadata files read for every binary package
pub const METADATA_FILES: [&str; 6] = [
    CONTENTS_FNAME,
    COMMENT_FNAME,
    DESC_FNAME,
    BUILD_INFO_FNAME,
    SIZE_PKG_FNAME,
    REQUIRED_BY_FNAME,
];

/// Metadata assembled from a set of `+` files
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMetadata {
    /// Full `name-version` package name
    pub pkgname: String,
    pub name: String,
    pub version: String,
    pub comment: Option<String>,
    pub description: Option<String>,
    pub files: Vec<String>,
    pub dependencies: Vec<Dependency>,
    pub build_info: BTreeMap<String, String>,
    pub size: Option<u64>,
    pub required_by: Vec<String>,
}

impl BinaryMetadata {
    /// Build metadata from file name to content pairs
    ///
    /// `fallback_pkgname` is used when `+CONTENTS` has no `@name` line.
    /// A missing `+CONTENTS` is a parse failure; every other file is
    /// optional, and an unparsable `+SIZE_PKG` leaves the size unset.
    pub fn from_files(fallback_pkgname: &str, files: &BTreeMap<String, String>) -> Result<Self> {
        let contents = files.get(CONTENTS_FNAME).ok_or_else(|| {
            Error::PackageParsing(format!("{} has no {}", fallback_pkgname, CONTENTS_FNAME))
        })?;
        let packing = PackingList::parse(contents);

        let pkgname = packing
            .pkgname
            .clone()
            .unwrap_or_else(|| fallback_pkgname.to_string());
        let (name, version) = match split_pkgname(&pkgname) {
            (name, Some(version)) => (name.to_string(), version.to_string()),
            (name, None) => (name.to_string(), UNKNOWN_VERSION.to_string()),
        };

        let text = |fname: &str| {
            files
                .get(fname)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let size = text(SIZE_PKG_FNAME).and_then(|raw| match raw.parse::<u64>() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("{}: ignoring invalid {} {:?}: {}", pkgname, SIZE_PKG_FNAME, raw, e);
                None
            }
        });

        let required_by = files
            .get(REQUIRED_BY_FNAME)
            .map(|s| s.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            comment: text(COMMENT_FNAME),
            description: text(DESC_FNAME),
            build_info: files
                .get(BUILD_INFO_FNAME)
                .map(|s| parse_build_info(s))
                .unwrap_or_default(),
            files: packing.files,
            dependencies: packing.dependencies,
            size,
            required_by,
            pkgname,
            name,
            version,
        })
    }

    /// `PKGPATH` from `+BUILD_INFO`
    pub fn origin(&self) -> Option<&str> {
        self.build_info.get("PKGPATH").map(String::as_str)
    }

    pub fn to_record(&self, installed: bool, artifact: Option<PathBuf>) -> PackageRecord {
        let info = |key: &str| self.build_info.get(key).cloned().filter(|v| !v.is_empty());

        let mut record = PackageRecord::new(
            self.name.clone(),
            self.version.clone(),
            Provenance::Binary(BinaryDetails {
                origin: info("PKGPATH"),
                size: self.size,
                build_info: self.build_info.clone(),
                installed,
                installed_version: installed.then(|| self.version.clone()),
                artifact,
            }),
        );
        record.comment = self.comment.clone();
        record.description = self.description.clone();
        record.categories = info("CATEGORIES")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        record.files = self.files.clone();
        record.license = info("LICENSE");
        record.maintainer = info("MAINTAINER");
        record.homepage = info("HOMEPAGE");
        record.has_man_pages = self
            .files
            .iter()
            .any(|f| f.starts_with("man/") || f.contains("/man/"));
        record.set_dependencies(&self.dependencies);
        record
    }
}

/// `KEY=VALUE` lines; later keys win
pub fn parse_build_info(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

#[derive(Debug, Default)]
struct PackingList {
    pkgname: Option<String>,
    files: Vec<String>,
    dependencies: Vec<Dependency>,
}

impl PackingList {
    fn parse(content: &str) -> Self {
        let mut list = PackingList::default();
        let mut prefix: Option<String> = None;
        let mut skip_next = false;

        for line in content.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if skip_next {
                skip_next = false;
                continue;
            }

            let Some(directive) = line.strip_prefix('@') else {
                let file = match &prefix {
                    Some(p) => format!("{}/{}", p.trim_end_matches('/'), line),
                    None => line.to_string(),
                };
                list.files.push(file);
                continue;
            };

            let (command, arg) = directive
                .split_once(char::is_whitespace)
                .map(|(c, a)| (c, a.trim()))
                .unwrap_or((directive, ""));
            match command {
                "name" => list.pkgname = Some(arg.to_string()),
                "pkgdep" => list
                    .dependencies
                    .push(Dependency::from_pattern(arg, DependencyType::Runtime)),
                "blddep" => list
                    .dependencies
                    .push(Dependency::from_pattern(arg, DependencyType::Build)),
                "cwd" | "cd" => prefix = Some(arg.to_string()),
                "ignore" => skip_next = true,
                _ => {}
            }
        }
        list
    }
}

/// Archive compression of a package file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Xz,
    Zstd,
}

impl Compression {
    /// Detect compression from magic bytes, falling back to the extension
    pub fn detect(path: &Path) -> Result<Self> {
        let mut magic = [0u8; 6];
        let read = File::open(path)?.read(&mut magic)?;
        let magic = &magic[..read];

        if magic.starts_with(&[0x1f, 0x8b]) {
            return Ok(Compression::Gzip);
        }
        if magic.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            return Ok(Compression::Xz);
        }
        if magic.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            return Ok(Compression::Zstd);
        }

        let name = path.to_string_lossy();
        if name.ends_with(".tgz") || name.ends_with(".tar.gz") {
            Ok(Compression::Gzip)
        } else if name.ends_with(".txz") || name.ends_with(".tar.xz") {
            Ok(Compression::Xz)
        } else if name.ends_with(".tzst") || name.ends_with(".tar.zst") {
            Ok(Compression::Zstd)
        } else {
            Err(Error::PackageParsing(format!(
                "Unrecognized package format: {}",
                path.display()
            )))
        }
    }

    fn reader(self, file: File) -> Result<Box<dyn Read>> {
        Ok(match self {
            Compression::Gzip => Box::new(GzDecoder::new(file)),
            Compression::Xz => Box::new(XzDecoder::new(file)),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(file)?),
        })
    }
}

/// A binary package file
#[derive(Debug, Clone)]
pub struct BinaryPackage {
    path: PathBuf,
    metadata: BinaryMetadata,
}

impl BinaryPackage {
    pub fn metadata(&self) -> &BinaryMetadata {
        &self.metadata
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read the leading `+` entries of a package archive
fn read_metadata_entries(path: &Path, compression: Compression) -> Result<BTreeMap<String, String>> {
    let reader = compression.reader(File::open(path)?)?;
    let mut archive = Archive::new(reader);
    let mut entries = BTreeMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.to_string_lossy().into_owned();
        let entry_name = entry_path.trim_start_matches("./");

        if !entry_name.starts_with('+') || entry_name.contains('/') {
            // Metadata precedes the payload
            if entries.contains_key(CONTENTS_FNAME) {
                break;
            }
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        entries.insert(entry_name.to_string(), content);
    }

    debug!("Read {} metadata entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Package name implied by a package file name
fn pkgname_from_filename(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    for ext in [".tar.gz", ".tar.xz", ".tar.zst", ".tgz", ".txz", ".tzst"] {
        if let Some(stem) = name.strip_suffix(ext) {
            return stem.to_string();
        }
    }
    name
}

impl PackageFormat for BinaryPackage {
    fn parse(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound(format!("Package file {}", path.display())));
        }

        let compression = Compression::detect(path)?;
        debug!("Opening {} as {:?}", path.display(), compression);

        let entries = read_metadata_entries(path, compression).map_err(|e| match e {
            Error::Io(io) => Error::PackageParsing(format!("{}: {}", path.display(), io)),
            other => other,
        })?;
        let metadata = BinaryMetadata::from_files(&pkgname_from_filename(path), &entries)?;

        Ok(Self {
            path: path.to_path_buf(),
            metadata,
        })
    }

    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn version(&self) -> &str {
        &self.metadata.version
    }

    fn comment(&self) -> Option<&str> {
        self.metadata.comment.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.metadata.description.as_deref()
    }

    fn files(&self) -> &[String] {
        &self.metadata.files
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.metadata.dependencies
    }

    fn to_record(&self) -> PackageRecord {
        self.metadata.to_record(false, Some(self.path.clone()))
    }
}
