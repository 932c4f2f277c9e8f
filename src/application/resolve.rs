//! Resolve use case - dry run of the reference-to-package mapping.
//!
//! Nothing is written: every project is loaded, its binary references are
//! matched against the feed and the package that a migration would choose is
//! printed.

use anyhow::Result;

use crate::console::Console;
use crate::feed::{FeedIndex, PackageFeed};
use crate::project::{
    ConflictPolicy, ProjectAdapter, ProjectHandle, ProjectLoader, Solution, distinct_assembly_names,
};
use crate::resolve::AssemblyResolver;
use crate::runtime::Runtime;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveSummary {
    pub projects: usize,
    pub resolved: usize,
    pub failed: usize,
}

pub struct ResolveUseCase<'a, R: Runtime> {
    runtime: &'a R,
    console: &'a dyn Console,
    feed: &'a dyn PackageFeed,
    allow_prerelease: bool,
}

impl<'a, R: Runtime> ResolveUseCase<'a, R> {
    pub fn new(
        runtime: &'a R,
        console: &'a dyn Console,
        feed: &'a dyn PackageFeed,
        allow_prerelease: bool,
    ) -> Self {
        Self {
            runtime,
            console,
            feed,
            allow_prerelease,
        }
    }

    #[tracing::instrument(skip(self, solution))]
    pub fn execute(&self, solution: &Solution) -> Result<ResolveSummary> {
        let index = FeedIndex::new(self.feed);
        let mut loader = ProjectLoader::new(self.runtime, self.console, ConflictPolicy::KeepFirst);
        let mut summary = ResolveSummary::default();

        for entry in &solution.projects {
            let ProjectHandle::Loaded(project) = loader.get_project(&entry.id, &entry.path)? else {
                continue;
            };
            summary.projects += 1;
            self.console.write_line(&format!("{}:", entry.name));

            let references = project.borrow().binary_references();
            if references.is_empty() {
                self.console.write_line("  no binary references");
                continue;
            }

            let packages = index.packages()?;
            let names = distinct_assembly_names(&references);
            let resolution =
                AssemblyResolver::new(&packages).resolve_assemblies(&names, self.allow_prerelease);

            for mapping in resolution.mappings() {
                match mapping.preferred() {
                    Some((package, file)) => {
                        summary.resolved += 1;
                        self.console.write_line(&format!(
                            "  {} -> {} {} ({})",
                            mapping.reference, package.id, package.version, file
                        ));
                        let others = mapping
                            .candidates
                            .iter()
                            .copied()
                            .filter(|c| !std::ptr::eq(*c, package));
                        for other in others {
                            self.console.write_line(&format!(
                                "      also in {} {} ({} files)",
                                other.id,
                                other.version,
                                other.file_count()
                            ));
                        }
                    }
                    None => {
                        summary.failed += 1;
                        self.console
                            .write_warning(&format!("Could not match: {}", mapping.reference));
                    }
                }
            }
        }
        Ok(summary)
    }
}
