//! Package model and package bookkeeping files.
//!
//! This module provides the feed-facing package model and the two files a
//! migration maintains: the per-project manifest (`packages.config`) and the
//! solution-wide registry of manifests (`repositories.config`).

mod manifest;
mod model;
mod registry;
mod version;

pub use manifest::{PACKAGES_CONFIG, PackageReference, PackageReferenceFile};
pub use model::{ASSEMBLY_EXTENSIONS, ManifestDependency, Package, is_assembly_file};
pub use registry::{REPOSITORIES_CONFIG, RepositoriesConfig, SharedPackageRegistry};
pub use version::PackageVersion;

#[cfg(test)]
pub use registry::MockSharedPackageRegistry;
