// src/error.rs

use thiserror::Error;

/// Core error types for nbpkgquery
#[derive(Error, Debug)]
pub enum Error {
    /// A file, directory or repository root is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// No repository or database entry matches the package
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    /// A package was found but its metadata could not be recovered
    #[error("Failed to parse package: {0}")]
    PackageParsing(String),

    /// Invalid configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation argument is out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Changelog download failure
    #[error("Network error: {0}")]
    Network(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using nbpkgquery's Error type
pub type Result<T> = std::result::Result<T, Error>;
