// src/packages/mod.rs

//! Package metadata support
//!
//! This module provides parsers for the two places package metadata comes
//! from: source recipes in a pkgsrc tree and binary packages (installed or
//! as package files). Both implement the `PackageFormat` trait and convert
//! to the same `PackageRecord`.

pub mod binary;
pub mod recipe;
pub mod record;
pub mod traits;

pub use binary::{BinaryMetadata, BinaryPackage};
pub use recipe::{MakeVars, SourceRecipe};
pub use record::{BinaryDetails, PackageRecord, Provenance, SourceDetails};
pub use traits::{Dependency, DependencyType, PackageFormat};
