//! Solution-wide registry of per-project manifests (`repositories.config`).
//!
//! Layout: `<solution_root>/packages/repositories.config`, one
//! `<repository path="..."/>` per manifest, paths relative to the packages
//! directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::runtime::{PathStyle, Runtime, relative_path_from_dir};
use crate::xml::{attribute_value, strip_bom};

pub const REPOSITORIES_CONFIG: &str = "repositories.config";

/// Table of all manifest files known for the current solution.
#[cfg_attr(test, mockall::automock)]
pub trait SharedPackageRegistry {
    /// Register a manifest file. Registering a known path is a no-op.
    ///
    /// Returns whether the path was newly added.
    fn register_repository(&mut self, manifest_path: &Path) -> bool;
}

/// `repositories.config` backed registry.
#[derive(Debug, Clone)]
pub struct RepositoriesConfig {
    packages_dir: PathBuf,
    style: PathStyle,
    repositories: Vec<String>,
    dirty: bool,
}

impl RepositoriesConfig {
    pub fn new(packages_dir: PathBuf, style: PathStyle) -> Self {
        Self {
            packages_dir,
            style,
            repositories: Vec::new(),
            dirty: false,
        }
    }

    /// Load the registry of a packages directory; empty if the file does not exist.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, packages_dir: &Path, style: PathStyle) -> Result<Self> {
        let mut registry = Self::new(packages_dir.to_path_buf(), style);
        let path = registry.path();
        if !runtime.exists(&path) {
            debug!("No registry at {:?}, starting empty", path);
            return Ok(registry);
        }

        let content = runtime.read_to_string(&path)?;
        let mut reader = Reader::from_str(strip_bom(&content));
        reader.config_mut().trim_text(true);
        loop {
            match reader
                .read_event()
                .with_context(|| format!("Failed to parse {:?}", path))?
            {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"repository" => {
                    if let Some(repo_path) = attribute_value(&e, "path")?
                        && !registry.contains_entry(&repo_path)
                    {
                        registry.repositories.push(repo_path);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(registry)
    }

    pub fn path(&self) -> PathBuf {
        self.packages_dir.join(REPOSITORIES_CONFIG)
    }

    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    /// Registered manifest paths, as stored (relative to the packages directory).
    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }

    pub fn contains(&self, manifest_path: &Path) -> bool {
        self.contains_entry(&self.entry_for(manifest_path))
    }

    fn contains_entry(&self, entry: &str) -> bool {
        let key = comparable(entry);
        self.repositories.iter().any(|r| comparable(r) == key)
    }

    fn entry_for(&self, manifest_path: &Path) -> String {
        match relative_path_from_dir(&self.packages_dir, manifest_path) {
            Some(relative) => self.style.render(&relative),
            None => manifest_path.display().to_string(),
        }
    }

    /// Write the registry if membership changed. Returns whether a write happened.
    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&mut self, runtime: &R) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        if !runtime.exists(&self.packages_dir) {
            runtime.create_dir_all(&self.packages_dir)?;
        }

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("repositories")))?;
        for repository in &self.repositories {
            let mut element = BytesStart::new("repository");
            element.push_attribute(("path", repository.as_str()));
            writer.write_event(Event::Empty(element))?;
        }
        writer.write_event(Event::End(BytesEnd::new("repositories")))?;
        let mut xml = String::from_utf8(writer.into_inner())?;
        xml.push('\n');

        let path = self.path();
        runtime
            .write(&path, xml.as_bytes())
            .with_context(|| format!("Failed to save registry to {:?}", path))?;
        self.dirty = false;
        Ok(true)
    }
}

impl SharedPackageRegistry for RepositoriesConfig {
    fn register_repository(&mut self, manifest_path: &Path) -> bool {
        let entry = self.entry_for(manifest_path);
        if self.contains_entry(&entry) {
            return false;
        }
        debug!("Registering manifest {}", entry);
        self.repositories.push(entry);
        self.repositories.sort_by_cached_key(|r| comparable(r));
        self.dirty = true;
        true
    }
}

fn comparable(entry: &str) -> String {
    entry.replace('\\', "/").to_lowercase()
}
