use anyhow::Result;
use std::path::PathBuf;

use crate::{
    application::{MigrateOptions, MigrateUseCase, MigrationSummary, ProjectStatus, ResolveUseCase},
    console::{Console, TerminalConsole},
    feed::LocalFeed,
    project::Solution,
    runtime::Runtime,
};

pub mod config;

use config::Config;

/// Migrate a solution (or a single project) onto packages from a local feed.
#[tracing::instrument(skip(runtime, options))]
pub fn migrate<R: Runtime>(
    runtime: R,
    input: PathBuf,
    feed_root: PathBuf,
    solution_root: Option<PathBuf>,
    options: MigrateOptions,
    strict: bool,
) -> Result<()> {
    let config = Config::new(runtime, input, feed_root, solution_root)?;
    let console = TerminalConsole::new();

    let summary = run_migrate(&config, &console, &options)?;

    println!(
        "{} project(s) processed, {} warning(s)",
        summary.migrated(),
        console.warning_count()
    );
    if strict && console.warning_count() > 0 {
        anyhow::bail!(
            "Migration reported {} warning(s) in strict mode",
            console.warning_count()
        );
    }
    Ok(())
}

pub fn run_migrate<R: Runtime>(
    config: &Config<R>,
    console: &dyn Console,
    options: &MigrateOptions,
) -> Result<MigrationSummary> {
    let solution = Solution::open(&config.runtime, &config.input)?;
    let feed = LocalFeed::new(&config.runtime, console, config.feed_root.clone());
    let summary = MigrateUseCase::new(&config.runtime, console, &feed, options)
        .execute(&solution, &config.solution_root)?;
    print_summary(console, &summary, options.nugetify.nuspec);
    Ok(summary)
}

/// Show which package each binary reference would be moved to.
#[tracing::instrument(skip(runtime))]
pub fn resolve<R: Runtime>(
    runtime: R,
    input: PathBuf,
    feed_root: PathBuf,
    allow_prerelease: bool,
) -> Result<()> {
    let config = Config::new(runtime, input, feed_root, None)?;
    let console = TerminalConsole::new();

    let solution = Solution::open(&config.runtime, &config.input)?;
    let feed = LocalFeed::new(&config.runtime, &console, config.feed_root.clone());
    let summary =
        ResolveUseCase::new(&config.runtime, &console, &feed, allow_prerelease).execute(&solution)?;

    println!(
        "{} project(s), {} resolved, {} unmatched",
        summary.projects, summary.resolved, summary.failed
    );
    Ok(())
}

pub(crate) fn print_summary(console: &dyn Console, summary: &MigrationSummary, nuspec: bool) {
    for outcome in &summary.projects {
        match &outcome.status {
            ProjectStatus::Skipped { .. } => {
                console.write_line(&format!("Skipped {}", outcome.name));
            }
            ProjectStatus::Migrated { dependencies } if nuspec && !dependencies.is_empty() => {
                console.write_line(&format!("Dependencies of {}:", outcome.name));
                for dependency in dependencies {
                    console.write_line(&format!("  {}", dependency.id));
                }
            }
            ProjectStatus::Migrated { .. } => {}
        }
    }
}
