//! Path utility functions for normalization and MSBuild path rendering.

use std::path::{Component, Path, PathBuf};

/// Separator convention used when writing paths into project files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathStyle {
    /// Backslash separators, the MSBuild convention.
    #[default]
    Windows,
    /// Forward slash separators.
    Unix,
}

impl PathStyle {
    pub fn separator(self) -> char {
        match self {
            PathStyle::Windows => '\\',
            PathStyle::Unix => '/',
        }
    }

    /// Render a relative path with this style's separator.
    ///
    /// Only normal and `..` components are emitted, so the result never depends
    /// on the host platform's separator.
    pub fn render(self, path: &Path) -> String {
        let parts: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::ParentDir => Some("..".to_string()),
                _ => None,
            })
            .collect();
        parts.join(&self.separator().to_string())
    }
}

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {
                // Skip `.` components
            }
            Component::ParentDir => {
                // Pop the last component if possible
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => {
                result.push(component);
            }
        }
    }
    result
}

/// Calculate the relative path from a directory to a target path.
///
/// For example, if from_dir is `/src/App` and to_path is
/// `/src/packages/Foo/lib/Foo.dll`, this returns `../packages/Foo/lib/Foo.dll`.
///
/// Returns `None` if a relative path cannot be computed (e.g., different drive letters on Windows).
pub fn relative_path_from_dir(from_dir: &Path, to_path: &Path) -> Option<PathBuf> {
    let result = pathdiff::diff_paths(normalize_path(to_path), normalize_path(from_dir))?;

    // An absolute result means no relative path exists
    if result.is_absolute() {
        return None;
    }

    Some(result)
}

/// Resolve a relative path against a base directory to get an absolute path.
pub fn resolve_relative_path(base_dir: &Path, relative_path: &Path) -> PathBuf {
    if relative_path.is_absolute() {
        relative_path.to_path_buf()
    } else {
        normalize_path(&base_dir.join(relative_path))
    }
}

/// Convert a path as written in a solution or project file into a host path.
///
/// MSBuild files use backslashes regardless of the platform they are built on.
pub fn from_msbuild_path(value: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(value)
    } else {
        PathBuf::from(value.replace('\\', "/"))
    }
}
