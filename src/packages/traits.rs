// src/packages/traits.rs

//! Common traits for package metadata parsers

use crate::error::Result;
use crate::packages::record::PackageRecord;
use crate::version::split_pkgname;
use serde::Serialize;
use std::path::Path;

/// Dependency information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// Bare package name
    pub name: String,
    /// Pattern as written in the recipe or `+CONTENTS`
    pub pattern: String,
    pub dep_type: DependencyType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Runtime,
    Build,
    Tool,
}

impl Dependency {
    pub fn from_pattern(pattern: &str, dep_type: DependencyType) -> Self {
        Self {
            name: dependency_name(pattern),
            pattern: pattern.to_string(),
            dep_type,
        }
    }

    pub fn is_build_time(&self) -> bool {
        matches!(self.dep_type, DependencyType::Build | DependencyType::Tool)
    }
}

/// Reduce a pkgsrc dependency pattern to the package name
///
/// Handles `name>=1.0:../../cat/name`, `name>=1.0`, `name-[0-9]*` and exact
/// `name-1.2nb1` forms.
pub fn dependency_name(pattern: &str) -> String {
    let pattern = pattern.trim();

    if let Some((_, path)) = pattern.split_once(':') {
        if let Some(last) = path.trim_end_matches('/').rsplit('/').next() {
            if !last.is_empty() && last != ".." {
                return last.to_string();
            }
        }
    }
    let pattern = pattern.split(':').next().unwrap_or(pattern);

    if let Some(pos) = pattern.find(['<', '>', '=']) {
        return pattern[..pos].to_string();
    }
    if let Some(pos) = pattern.find("-[") {
        return pattern[..pos].to_string();
    }
    match split_pkgname(pattern.trim_end_matches('*')) {
        (name, Some(version)) if version.starts_with(|c: char| c.is_ascii_digit()) => {
            name.to_string()
        }
        _ => pattern.trim_end_matches('*').to_string(),
    }
}

/// Common interface for source recipes and binary packages
pub trait PackageFormat {
    /// Parse package metadata from the given path
    fn parse(path: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Get the package name
    fn name(&self) -> &str;

    /// Get the package version (`unknown` when it cannot be determined)
    fn version(&self) -> &str;

    /// Get the one-line summary
    fn comment(&self) -> Option<&str>;

    /// Get the long description
    fn description(&self) -> Option<&str>;

    /// Get the list of files the package provides
    fn files(&self) -> &[String];

    /// Get the list of dependencies
    fn dependencies(&self) -> &[Dependency];

    /// Convert this package to the shared record shape
    fn to_record(&self) -> PackageRecord;
}
