use serde::Serialize;

use super::PackageVersion;

/// File extensions that identify an assembly inside a package.
pub const ASSEMBLY_EXTENSIONS: &[&str] = &[".dll", ".exe"];

/// A versioned package published on a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub id: String,
    pub version: PackageVersion,
    /// Packaged file paths, `/`-separated, relative to the package root.
    pub files: Vec<String>,
}

impl Package {
    pub fn new(id: impl Into<String>, version: PackageVersion, files: Vec<String>) -> Self {
        Self {
            id: id.into(),
            version,
            files,
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Case-insensitive comparison of the package id with a name.
    pub fn id_matches(&self, name: &str) -> bool {
        self.id.eq_ignore_ascii_case(name)
    }

    /// The first packaged file that provides the given assembly.
    pub fn find_assembly(&self, assembly_name: &str) -> Option<&str> {
        self.files
            .iter()
            .map(String::as_str)
            .find(|path| is_assembly_file(path, assembly_name))
    }

    pub fn contains_assembly(&self, assembly_name: &str) -> bool {
        self.find_assembly(assembly_name).is_some()
    }
}

/// Check whether a packaged path is the file for an assembly name.
///
/// The file name component must equal the assembly name plus one of
/// [`ASSEMBLY_EXTENSIONS`], ignoring case.
pub fn is_assembly_file(path: &str, assembly_name: &str) -> bool {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    ASSEMBLY_EXTENSIONS.iter().any(|ext| {
        file_name.len() == assembly_name.len() + ext.len()
            && file_name.is_char_boundary(assembly_name.len())
            && file_name[..assembly_name.len()].eq_ignore_ascii_case(assembly_name)
            && file_name[assembly_name.len()..].eq_ignore_ascii_case(ext)
    })
}

/// A dependency to merge into a package specification under construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestDependency {
    pub id: String,
}

impl ManifestDependency {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}
