use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;
use crate::runtime::path::resolve_relative_path;

/// Locations a command works with, resolved against the current directory.
pub struct Config<R: Runtime> {
    pub runtime: R,
    /// The `.sln` or project file given on the command line.
    pub input: PathBuf,
    pub feed_root: PathBuf,
    /// Directory that holds the shared `packages` folder.
    pub solution_root: PathBuf,
}

impl<R: Runtime> Config<R> {
    pub fn new(
        runtime: R,
        input: PathBuf,
        feed_root: PathBuf,
        solution_root: Option<PathBuf>,
    ) -> Result<Self> {
        let cwd = runtime.current_dir()?;
        let input = resolve_relative_path(&cwd, &input);
        let feed_root = resolve_relative_path(&cwd, &feed_root);
        let solution_root = match solution_root {
            Some(root) => resolve_relative_path(&cwd, &root),
            None => input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.clone()),
        };
        debug!(
            "Input {:?}, feed {:?}, solution root {:?}",
            input, feed_root, solution_root
        );

        Ok(Self {
            runtime,
            input,
            feed_root,
            solution_root,
        })
    }
}
