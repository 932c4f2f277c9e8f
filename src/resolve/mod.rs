//! Assembly resolution.
//!
//! Matches assembly reference names against the files of every package in a
//! feed index. All matching packages are kept; choosing one is a separate
//! step ([`ReferenceMapping::preferred`]) so every caller picks the same way.

mod report;

use log::debug;

use crate::package::Package;

pub use report::{REPORT_FILE_NAME, ResolutionReport};

/// Candidate packages for one assembly reference.
#[derive(Debug, Clone)]
pub struct ReferenceMapping<'p> {
    pub reference: String,
    /// Candidates in index order.
    pub candidates: Vec<&'p Package>,
}

impl<'p> ReferenceMapping<'p> {
    pub fn is_resolved(&self) -> bool {
        !self.candidates.is_empty()
    }

    /// The package to use for this reference and the packaged file that
    /// provides the assembly.
    ///
    /// The candidate with the fewest files wins; on a tie the earliest
    /// candidate in index order is kept.
    pub fn preferred(&self) -> Option<(&'p Package, &'p str)> {
        let package = self.candidates.iter().copied().min_by_key(|p| p.file_count())?;
        let file = package.find_assembly(&self.reference)?;
        Some((package, file))
    }
}

/// Result of a resolution pass. Holds one mapping per requested name, in
/// request order; unmatched names have an empty candidate list.
#[derive(Debug, Clone, Default)]
pub struct Resolution<'p> {
    mappings: Vec<ReferenceMapping<'p>>,
}

impl<'p> Resolution<'p> {
    pub fn mappings(&self) -> &[ReferenceMapping<'p>] {
        &self.mappings
    }

    pub fn get(&self, reference: &str) -> Option<&ReferenceMapping<'p>> {
        self.mappings
            .iter()
            .find(|m| m.reference.eq_ignore_ascii_case(reference))
    }

    pub fn resolved(&self) -> impl Iterator<Item = &ReferenceMapping<'p>> {
        self.mappings.iter().filter(|m| m.is_resolved())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ReferenceMapping<'p>> {
        self.mappings.iter().filter(|m| !m.is_resolved())
    }

    pub fn report(&self) -> ResolutionReport<'_> {
        ResolutionReport::from_resolution(self)
    }
}

/// Matches reference names against a sorted package index.
pub struct AssemblyResolver<'p> {
    packages: &'p [Package],
}

impl<'p> AssemblyResolver<'p> {
    /// `packages` is expected in index order (see [`crate::feed::sort_packages`]).
    pub fn new(packages: &'p [Package]) -> Self {
        Self { packages }
    }

    #[tracing::instrument(skip(self, references))]
    pub fn resolve_assemblies(&self, references: &[String], allow_prerelease: bool) -> Resolution<'p> {
        let mut mappings: Vec<ReferenceMapping<'p>> = Vec::with_capacity(references.len());
        for reference in references {
            if mappings
                .iter()
                .any(|m| m.reference.eq_ignore_ascii_case(reference))
            {
                continue;
            }
            let candidates: Vec<&'p Package> = self
                .packages
                .iter()
                .filter(|p| allow_prerelease || !p.version.is_prerelease())
                .filter(|p| p.contains_assembly(reference))
                .collect();
            debug!("{} matched {} package(s)", reference, candidates.len());
            mappings.push(ReferenceMapping {
                reference: reference.clone(),
                candidates,
            });
        }
        Resolution { mappings }
    }
}
