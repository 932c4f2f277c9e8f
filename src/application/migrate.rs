//! Migrate use case - moves every project of a solution onto packages.
//!
//! For each project in solution order:
//! - load it once through the shared loader (unloadable projects are skipped)
//! - collect the assembly names of the projects it references
//! - run the nugetifier against the shared feed index and registry
//!
//! A project that fails is reported and skipped; only a feed failure ends the
//! run. The registry is saved once at the end of the run.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;
use log::{debug, info};

use crate::console::Console;
use crate::feed::{FeedError, FeedIndex, PackageFeed};
use crate::nugetify::{NugetifyOptions, ReferenceNugetifier};
use crate::package::{ManifestDependency, RepositoriesConfig};
use crate::project::{
    ConflictPolicy, ProjectAdapter, ProjectHandle, ProjectLoader, ProjectReference, SharedProject,
    Solution,
};
use crate::runtime::Runtime;

/// Options for the migrate use case
#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    pub nugetify: NugetifyOptions,
    /// How to treat one project identity reached through two paths
    pub conflict_policy: ConflictPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectStatus {
    Migrated { dependencies: Vec<ManifestDependency> },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectOutcome {
    pub name: String,
    pub path: PathBuf,
    pub status: ProjectStatus,
}

#[derive(Debug, Default)]
pub struct MigrationSummary {
    pub projects: Vec<ProjectOutcome>,
    /// Whether `repositories.config` was written.
    pub registry_updated: bool,
}

impl MigrationSummary {
    pub fn migrated(&self) -> usize {
        self.projects
            .iter()
            .filter(|p| matches!(p.status, ProjectStatus::Migrated { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.projects.len() - self.migrated()
    }
}

pub struct MigrateUseCase<'a, R: Runtime> {
    runtime: &'a R,
    console: &'a dyn Console,
    feed: &'a dyn PackageFeed,
    options: &'a MigrateOptions,
}

impl<'a, R: Runtime> MigrateUseCase<'a, R> {
    pub fn new(
        runtime: &'a R,
        console: &'a dyn Console,
        feed: &'a dyn PackageFeed,
        options: &'a MigrateOptions,
    ) -> Self {
        Self {
            runtime,
            console,
            feed,
            options,
        }
    }

    #[tracing::instrument(skip(self, solution))]
    pub fn execute(&self, solution: &Solution, solution_root: &Path) -> Result<MigrationSummary> {
        let index = FeedIndex::new(self.feed);
        let mut loader =
            ProjectLoader::new(self.runtime, self.console, self.options.conflict_policy);
        let mut registry = RepositoriesConfig::load(
            self.runtime,
            &solution_root.join("packages"),
            self.options.nugetify.path_style,
        )?;
        let nugetifier = ReferenceNugetifier::new(
            self.runtime,
            self.console,
            &index,
            solution_root,
            &self.options.nugetify,
        );

        let mut summary = MigrationSummary::default();
        let mut processed: Vec<SharedProject<'a, R>> = Vec::new();

        for entry in &solution.projects {
            self.console
                .write_line(&format!("Processing project {}", entry.name));

            let project = match loader.get_project(&entry.id, &entry.path)? {
                ProjectHandle::Loaded(project) => project,
                ProjectHandle::Unloadable { path, reason } => {
                    info!("Skipping unloadable project {:?}", path);
                    summary.projects.push(ProjectOutcome {
                        name: entry.name.clone(),
                        path,
                        status: ProjectStatus::Skipped { reason },
                    });
                    continue;
                }
            };
            if processed.iter().any(|seen| Rc::ptr_eq(seen, &project)) {
                debug!("{} was already processed under another entry", entry.name);
                continue;
            }
            processed.push(Rc::clone(&project));

            let references = project.borrow().project_references();
            let dependency_ids = project_dependency_ids(&mut loader, &references)?;
            let result =
                nugetifier.nugetify(&mut *project.borrow_mut(), &mut registry, &dependency_ids);
            let status = match result {
                Ok(dependencies) => ProjectStatus::Migrated { dependencies },
                Err(e) if e.downcast_ref::<FeedError>().is_some() => return Err(e),
                Err(e) => {
                    let reason = format!("{:#}", e);
                    self.console.write_warning(&format!(
                        "Skipping project {}: {}",
                        entry.name, reason
                    ));
                    ProjectStatus::Skipped { reason }
                }
            };

            summary.projects.push(ProjectOutcome {
                name: entry.name.clone(),
                path: entry.path.clone(),
                status,
            });
        }

        summary.registry_updated = registry.save(self.runtime)?;
        if summary.registry_updated {
            self.console
                .write_line(&format!("Updated {}", registry.path().display()));
        }
        Ok(summary)
    }
}

/// Assembly names of the referenced projects. Unloadable references fall
/// back to the name recorded on the reference, then to the file name.
fn project_dependency_ids<'a, R: Runtime>(
    loader: &mut ProjectLoader<'a, R>,
    references: &[ProjectReference],
) -> Result<Vec<String>> {
    references
        .iter()
        .map(|reference| {
            Ok(match loader.get_project(&reference.id(), &reference.path)? {
                ProjectHandle::Loaded(project) => project.borrow().assembly_name(),
                ProjectHandle::Unloadable { .. } => reference.fallback_name(),
            })
        })
        .collect()
}
