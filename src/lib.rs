// src/lib.rs

//! nbpkgquery: pkgsrc package metadata queries
//!
//! Resolves package names against one or more pkgsrc source trees and the
//! installed-package database, normalizes what it finds into one record
//! shape, compares versions with the `nbN` revision convention and verifies
//! distfiles against their recorded checksums.
//!
//! # Architecture
//!
//! - Read-only: nothing is built, installed or modified
//! - Fresh reads: every query rereads the filesystem, there is no cache
//! - Explicit configuration: built once by [`Config::load`] and handed to
//!   [`PkgQuery::new`]
//! - One result per operation: data, or a single [`Error`]

pub mod checksum;
pub mod config;
pub mod db;
pub mod distinfo;
mod error;
pub mod packages;
pub mod query;
pub mod repository;
pub mod version;

pub use config::Config;
pub use error::{Error, Result};
pub use packages::PackageRecord;
pub use query::{LookupMode, PkgQuery};
pub use version::VersionKey;
