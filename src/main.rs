use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use nugetify::application::MigrateOptions;
use nugetify::commands;
use nugetify::nugetify::NugetifyOptions;
use nugetify::package::PACKAGES_CONFIG;
use nugetify::project::ConflictPolicy;
use nugetify::runtime::PathStyle;
use std::path::PathBuf;

/// nugetify - move assembly references onto NuGet packages
///
/// Resolves the hint-path references of every project in a solution against a
/// folder of .nupkg files, points them at the packages directory and records
/// the chosen packages in each project's packages.config.
///
/// Examples:
///   nugetify migrate All.sln --feed ./feed     # Migrate every project
///   nugetify resolve App/App.csproj --feed ./feed  # Show what would change
#[derive(Parser, Debug)]
#[command(author, version = env!("NUGETIFY_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Folder of .nupkg files to resolve against (also via NUGETIFY_FEED)
    #[arg(long, env = "NUGETIFY_FEED", value_name = "DIR", global = true)]
    pub feed: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Rewrite hint paths and write packages.config for each project
    Migrate(MigrateArgs),

    /// Print the package each reference resolves to, without writing anything
    Resolve(ResolveArgs),
}

#[derive(clap::Args, Debug)]
pub struct MigrateArgs {
    /// Solution (.sln) or project file
    #[arg(value_name = "SOLUTION_OR_PROJECT")]
    pub input: PathBuf,

    /// Directory holding the shared packages folder (defaults to the input's directory)
    #[arg(long, value_name = "DIR")]
    pub solution_root: Option<PathBuf>,

    /// File name of the per-project manifest
    #[arg(long, value_name = "NAME", default_value = PACKAGES_CONFIG)]
    pub packages_config: String,

    /// Print the dependencies to put in each project's nuspec
    #[arg(long)]
    pub nuspec: bool,

    /// Write nugetify-report.json next to each project
    #[arg(long)]
    pub report: bool,

    /// Write hint paths with forward slashes
    #[arg(long)]
    pub unix_paths: bool,

    /// What to do when one project is reached through two different paths
    #[arg(long, value_enum, default_value_t = OnConflict::Warn)]
    pub on_conflict: OnConflict,

    /// Fail when any warning was reported
    #[arg(long)]
    pub strict: bool,
}

impl MigrateArgs {
    fn options(&self) -> MigrateOptions {
        MigrateOptions {
            nugetify: NugetifyOptions {
                packages_config: self.packages_config.clone(),
                nuspec: self.nuspec,
                path_style: if self.unix_paths {
                    PathStyle::Unix
                } else {
                    PathStyle::Windows
                },
                write_report: self.report,
            },
            conflict_policy: self.on_conflict.into(),
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    /// Solution (.sln) or project file
    #[arg(value_name = "SOLUTION_OR_PROJECT")]
    pub input: PathBuf,

    /// Consider prerelease packages
    #[arg(long)]
    pub prerelease: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnConflict {
    KeepFirst,
    Warn,
    Reject,
}

impl From<OnConflict> for ConflictPolicy {
    fn from(value: OnConflict) -> Self {
        match value {
            OnConflict::KeepFirst => ConflictPolicy::KeepFirst,
            OnConflict::Warn => ConflictPolicy::Warn,
            OnConflict::Reject => ConflictPolicy::Reject,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = nugetify::runtime::RealRuntime;
    let feed = cli
        .feed
        .context("No feed given; pass --feed <DIR> or set NUGETIFY_FEED")?;

    match cli.command {
        Commands::Migrate(args) => {
            let options = args.options();
            commands::migrate(
                runtime,
                args.input,
                feed,
                args.solution_root,
                options,
                args.strict,
            )?
        }
        Commands::Resolve(args) => commands::resolve(runtime, args.input, feed, args.prerelease)?,
    }
    Ok(())
}
