//! Feed backed by a directory of `.nupkg` files.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use percent_encoding::percent_decode_str;
use zip::ZipArchive;

use super::{PackageFeed, parse_nuspec};
use crate::console::Console;
use crate::package::Package;
use crate::runtime::Runtime;

const NUPKG_EXTENSION: &str = ".nupkg";

/// Local folder feed. Packages may sit at any depth below the root
/// (flat folders and `<id>/<version>/` hierarchies both work).
/// Archives that cannot be read are skipped with a console warning.
pub struct LocalFeed<'a, R: Runtime> {
    runtime: &'a R,
    console: &'a dyn Console,
    root: PathBuf,
}

impl<'a, R: Runtime> LocalFeed<'a, R> {
    pub fn new(runtime: &'a R, console: &'a dyn Console, root: PathBuf) -> Self {
        Self {
            runtime,
            console,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find_package_files(&self, dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
        for entry in self.runtime.read_dir(dir)? {
            if self.runtime.is_dir(&entry) {
                self.find_package_files(&entry, found)?;
            } else if entry
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_lowercase().ends_with(NUPKG_EXTENSION))
            {
                found.push(entry);
            }
        }
        Ok(())
    }

    /// Read id, version and file listing from one `.nupkg` archive.
    #[tracing::instrument(skip(self))]
    pub fn read_package(&self, path: &Path) -> Result<Package> {
        let mut buffer = Vec::new();
        self.runtime
            .open(path)?
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read package {:?}", path))?;

        let mut archive =
            ZipArchive::new(Cursor::new(buffer)).context("Failed to parse package archive")?;

        let mut nuspec = None;
        let mut files = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("Failed to read archive entry {}", i))?;
            if entry.is_dir() {
                continue;
            }
            let name = percent_decode_str(entry.name())
                .decode_utf8_lossy()
                .into_owned();

            if is_root_nuspec(&name) {
                let mut content = String::new();
                entry
                    .read_to_string(&mut content)
                    .with_context(|| format!("Failed to read {}", name))?;
                nuspec = Some(content);
            } else if !is_packaging_metadata(&name) {
                files.push(name);
            }
        }

        let nuspec = nuspec.ok_or_else(|| anyhow::anyhow!("No .nuspec found in {:?}", path))?;
        let metadata = parse_nuspec(&nuspec)?;
        debug!(
            "Read {} {} ({} files) from {:?}",
            metadata.id,
            metadata.version,
            files.len(),
            path
        );
        Ok(Package::new(metadata.id, metadata.version, files))
    }
}

impl<R: Runtime> PackageFeed for LocalFeed<'_, R> {
    fn source(&self) -> String {
        self.root.display().to_string()
    }

    fn packages(&self) -> Result<Vec<Package>> {
        if !self.runtime.is_dir(&self.root) {
            anyhow::bail!("Feed directory {:?} does not exist", self.root);
        }

        let mut package_files = Vec::new();
        self.find_package_files(&self.root, &mut package_files)?;
        package_files.sort();
        debug!("Found {} package file(s) under {:?}", package_files.len(), self.root);

        let mut packages = Vec::with_capacity(package_files.len());
        for path in package_files {
            match self.read_package(&path) {
                Ok(package) => packages.push(package),
                Err(e) => self.console.write_warning(&format!(
                    "Skipping unreadable package {}: {:#}",
                    path.display(),
                    e
                )),
            }
        }
        Ok(packages)
    }
}

fn is_root_nuspec(name: &str) -> bool {
    !name.contains('/') && name.to_lowercase().ends_with(".nuspec")
}

/// Entries written by the packaging format itself rather than the package author.
fn is_packaging_metadata(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.starts_with("_rels/")
        || lower.starts_with("package/")
        || lower == "[content_types].xml"
}
