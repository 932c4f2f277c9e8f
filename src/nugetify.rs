//! Reference migration for a single project.
//!
//! [`ReferenceNugetifier`] resolves a project's binary references against the
//! feed, points them at the package layout, records the chosen packages in
//! the project's manifest and registers that manifest with the solution.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::debug;

use crate::console::Console;
use crate::feed::FeedIndex;
use crate::package::{
    ManifestDependency, PACKAGES_CONFIG, Package, PackageReferenceFile, PackageVersion,
    SharedPackageRegistry,
};
use crate::project::{BinaryReference, ProjectAdapter, distinct_assembly_names};
use crate::resolve::{AssemblyResolver, REPORT_FILE_NAME};
use crate::runtime::{PathStyle, Runtime, relative_path_from_dir};

#[derive(Debug, Clone)]
pub struct NugetifyOptions {
    /// File name of the per-project manifest.
    pub packages_config: String,
    /// Collect manifest dependencies for a package specification.
    pub nuspec: bool,
    pub path_style: PathStyle,
    /// Write a resolution report next to each project.
    pub write_report: bool,
}

impl Default for NugetifyOptions {
    fn default() -> Self {
        Self {
            packages_config: PACKAGES_CONFIG.to_string(),
            nuspec: false,
            path_style: PathStyle::default(),
            write_report: false,
        }
    }
}

/// One decision per resolved reference, shared by the hint path rewrite
/// and the manifest update.
struct Decision<'p> {
    reference: &'p str,
    package: &'p Package,
    file: &'p str,
}

pub struct ReferenceNugetifier<'a, R: Runtime> {
    runtime: &'a R,
    console: &'a dyn Console,
    feed: &'a FeedIndex<'a>,
    packages_dir: PathBuf,
    options: &'a NugetifyOptions,
}

impl<'a, R: Runtime> ReferenceNugetifier<'a, R> {
    pub fn new(
        runtime: &'a R,
        console: &'a dyn Console,
        feed: &'a FeedIndex<'a>,
        solution_root: &Path,
        options: &'a NugetifyOptions,
    ) -> Self {
        Self {
            runtime,
            console,
            feed,
            packages_dir: solution_root.join("packages"),
            options,
        }
    }

    /// Migrate one project. Returns the dependencies to merge into the
    /// project's package specification (empty unless nuspec mode is on).
    #[tracing::instrument(skip_all)]
    pub fn nugetify(
        &self,
        project: &mut dyn ProjectAdapter,
        registry: &mut dyn SharedPackageRegistry,
        project_dependencies: &[String],
    ) -> Result<Vec<ManifestDependency>> {
        let references = project.binary_references();
        if references.is_empty() {
            self.console
                .write_line("No references found to resolve (all GAC?)");
            return Ok(Vec::new());
        }

        let names = distinct_assembly_names(&references);
        self.console.write_line(&format!(
            "Checking feed {} for {} reference(s)...",
            self.feed.source(),
            names.len()
        ));
        let packages = self.feed.packages()?;
        let resolution = AssemblyResolver::new(&packages).resolve_assemblies(&names, false);

        let project_path = project.path();
        let project_dir = project_path.parent().unwrap_or_else(|| Path::new(""));
        // Everything that can fail on this project's own files is read
        // before the project is touched.
        let manifest_path = project_dir.join(&self.options.packages_config);
        let mut manifest = PackageReferenceFile::load(self.runtime, &manifest_path)?;
        if self.options.write_report {
            resolution
                .report()
                .write(self.runtime, &project_dir.join(REPORT_FILE_NAME))?;
        }

        let decisions: Vec<Decision<'_>> = resolution
            .resolved()
            .filter_map(|mapping| {
                let (package, file) = mapping.preferred()?;
                Some(Decision {
                    reference: &mapping.reference,
                    package,
                    file,
                })
            })
            .collect();
        self.console.write_line(&format!(
            "Found {} package to assembly mapping(s) on feed",
            decisions.len()
        ));
        for failed in resolution.failed() {
            self.console
                .write_warning(&format!("Could not match: {}", failed.reference));
        }

        for decision in &decisions {
            if let Some(reference) = references
                .iter()
                .find(|r| r.is_for_assembly(decision.reference))
            {
                self.report_mapping(reference, decision.package);
            }
            let hint_path = self.hint_path(project_dir, decision.package, decision.file);
            project.set_hint_path(decision.reference, &hint_path)?;
        }
        project.save()?;

        let mut dependencies = Vec::new();
        for decision in &decisions {
            let package = decision.package;
            if !manifest.entry_exists(&package.id, &package.version)
                && !manifest.add_entry(&package.id, &package.version)
                && let Some(existing) = manifest.entry(&package.id)
            {
                self.console.write_warning(&format!(
                    "{} already lists {} {}, keeping it instead of {}",
                    manifest_path.display(),
                    existing.id,
                    existing.version,
                    package.version
                ));
            }
            if self.options.nuspec {
                add_dependency(&mut dependencies, &package.id);
            }
        }
        if manifest.save(self.runtime)? {
            self.console
                .write_line(&format!("Updated {}", manifest_path.display()));
        }

        if self.options.nuspec {
            for id in project_dependencies {
                add_dependency(&mut dependencies, id);
            }
        }

        if manifest.entries().is_empty() {
            debug!("No manifest for {:?}, nothing to register", project_path);
        } else {
            registry.register_repository(manifest.path());
            if project.add_packages_config(&self.options.packages_config) {
                project.save()?;
            }
        }

        Ok(dependencies)
    }

    /// `<solutionRoot>/packages/<id>/<file>`, relative to the project directory.
    fn hint_path(&self, project_dir: &Path, package: &Package, file: &str) -> String {
        let mut target = self.packages_dir.join(&package.id);
        target.extend(file.split(['/', '\\']).filter(|part| !part.is_empty()));
        match relative_path_from_dir(project_dir, &target) {
            Some(relative) => self.options.path_style.render(&relative),
            None => target.display().to_string(),
        }
    }

    fn report_mapping(&self, reference: &BinaryReference, package: &Package) {
        let version = reference
            .include_version
            .as_deref()
            .map(|v| format!("version \"{}\" ", v))
            .unwrap_or_default();
        let message = format!(
            "Attempting to update hint paths for \"{}\" {}using package \"{}\" version \"{}\"",
            reference.include_name, version, package.id, package.version
        );
        if package.id_matches(&reference.include_name) && !version_disagrees(reference, package) {
            self.console.write_line(&message);
        } else {
            self.console.write_warning(&message);
        }
    }
}

/// Whether the reference pins a version other than the package's.
/// Assembly versions have four parts, so `6.0.0.0` agrees with `6.0.0`.
fn version_disagrees(reference: &BinaryReference, package: &Package) -> bool {
    match &reference.include_version {
        None => false,
        Some(pinned) => pinned
            .parse::<PackageVersion>()
            .map(|pinned| !pinned.numeric_eq(&package.version))
            .unwrap_or(true),
    }
}

fn add_dependency(dependencies: &mut Vec<ManifestDependency>, id: &str) {
    if !dependencies.iter().any(|d| d.id.eq_ignore_ascii_case(id)) {
        dependencies.push(ManifestDependency::new(id));
    }
}
