//! Application layer - Use cases that coordinate the migration.
//!
//! This layer walks the projects of a solution and drives the domain pieces
//! (loader, feed index, resolver, nugetifier, registry) for each of them.

mod migrate;
mod resolve;

pub use migrate::{MigrateOptions, MigrateUseCase, MigrationSummary, ProjectOutcome, ProjectStatus};
pub use resolve::{ResolveSummary, ResolveUseCase};
