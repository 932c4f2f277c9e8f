//! Project model.
//!
//! This module provides the view of a project the migration works against
//! ([`ProjectAdapter`]), its MSBuild implementation, the solution file reader
//! and the identity-keyed project loader.

mod loader;
mod msbuild;
mod solution;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use uuid::Uuid;

pub use loader::{ConflictPolicy, ProjectHandle, ProjectLoader, SharedProject};
pub use msbuild::MsBuildProject;
pub use solution::{Solution, SolutionProject};

/// Stable identity of a project within a solution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectId {
    /// The project's `ProjectGuid`.
    Guid(Uuid),
    /// Projects without a guid are identified by their file.
    Path(PathBuf),
}

impl ProjectId {
    /// Parse a guid in any of the usual spellings (`{...}`, bare, any case).
    pub fn parse_guid(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(ProjectId::Guid)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectId::Guid(guid) => write!(f, "{{{}}}", guid.to_string().to_uppercase()),
            ProjectId::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A dependency on a compiled assembly declared in a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryReference {
    pub include_name: String,
    pub include_version: Option<String>,
    pub hint_path: Option<String>,
}

impl BinaryReference {
    /// Build a reference from an `Include` value such as
    /// `Newtonsoft.Json, Version=6.0.0.0, Culture=neutral, PublicKeyToken=...`.
    pub fn from_include(include: &str, hint_path: Option<String>) -> Self {
        let mut fields = include.split(',').map(str::trim);
        let include_name = fields.next().unwrap_or_default().to_string();
        let include_version = fields
            .filter_map(|field| field.split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("Version"))
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self {
            include_name,
            include_version,
            hint_path,
        }
    }

    pub fn is_for_assembly(&self, assembly_name: &str) -> bool {
        self.include_name.eq_ignore_ascii_case(assembly_name)
    }
}

/// A project-to-project reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectReference {
    /// The `Include` value as written in the project file.
    pub include: String,
    /// Absolute path of the referenced project file.
    pub path: PathBuf,
    pub project_id: Option<ProjectId>,
    pub name: Option<String>,
}

impl ProjectReference {
    /// Identity used to look the referenced project up in a loader.
    pub fn id(&self) -> ProjectId {
        self.project_id
            .clone()
            .unwrap_or_else(|| ProjectId::Path(self.path.clone()))
    }

    /// Best-effort name when the referenced project cannot be loaded.
    pub fn fallback_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| file_stem(&self.path))
    }
}

/// The operations a migration needs from a loaded project.
#[cfg_attr(test, mockall::automock)]
pub trait ProjectAdapter {
    /// Absolute path of the project file.
    fn path(&self) -> PathBuf;

    fn assembly_name(&self) -> String;

    /// References to assemblies located through a hint path.
    fn binary_references(&self) -> Vec<BinaryReference>;

    fn project_references(&self) -> Vec<ProjectReference>;

    /// Point every binary reference for `include_name` at `hint_path`.
    /// Returns whether anything changed.
    fn set_hint_path(&mut self, include_name: &str, hint_path: &str) -> Result<bool>;

    /// Track a manifest file as an item of the project.
    /// Returns whether the item was added.
    fn add_packages_config(&mut self, file_name: &str) -> bool;

    /// Persist pending changes. Returns whether the file was written.
    fn save(&mut self) -> Result<bool>;
}

/// Distinct assembly names of a set of references, in declaration order.
pub fn distinct_assembly_names(references: &[BinaryReference]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for reference in references {
        if !names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(&reference.include_name))
        {
            names.push(reference.include_name.clone());
        }
    }
    names
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
