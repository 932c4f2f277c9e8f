use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use super::{MsBuildProject, ProjectId, file_stem};
use crate::runtime::Runtime;
use crate::runtime::path::{from_msbuild_path, resolve_relative_path};

/// Project type used by Visual Studio for solution folders.
const SOLUTION_FOLDER_TYPE: &str = "2150E333-8FDC-42A3-9474-1A3956D46DE8";
const PROJECT_EXTENSIONS: [&str; 3] = ["csproj", "vbproj", "fsproj"];

/// One project entry of a solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionProject {
    pub name: String,
    /// Absolute path of the project file.
    pub path: PathBuf,
    pub id: ProjectId,
}

/// The set of projects a migration run walks over.
#[derive(Debug, Clone)]
pub struct Solution {
    pub path: PathBuf,
    pub projects: Vec<SolutionProject>,
}

impl Solution {
    /// Read a `.sln` file.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read solution {:?}", path))?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let projects = parse_solution(&content, dir);
        debug!("Solution {:?} lists {} project(s)", path, projects.len());
        Ok(Self {
            path: path.to_path_buf(),
            projects,
        })
    }

    /// Treat a single project file as a solution of one.
    pub fn from_project_file<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            anyhow::bail!("Project file {:?} does not exist", path);
        }
        let id = MsBuildProject::load(runtime, path)
            .ok()
            .and_then(|project| project.project_id())
            .unwrap_or_else(|| ProjectId::Path(path.to_path_buf()));
        Ok(Self {
            path: path.to_path_buf(),
            projects: vec![SolutionProject {
                name: file_stem(path),
                path: path.to_path_buf(),
                id,
            }],
        })
    }

    /// Load a `.sln`, or wrap any other file as a single-project solution.
    pub fn open<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let is_sln = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sln"));
        if is_sln {
            Self::load(runtime, path)
        } else {
            Self::from_project_file(runtime, path)
        }
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// Extract project entries from solution text.
///
/// Entries look like
/// `Project("{type}") = "Name", "relative\path.csproj", "{guid}"`.
pub fn parse_solution(content: &str, solution_dir: &Path) -> Vec<SolutionProject> {
    content
        .lines()
        .filter_map(|line| parse_project_line(line.trim(), solution_dir))
        .collect()
}

fn parse_project_line(line: &str, solution_dir: &Path) -> Option<SolutionProject> {
    if !line.starts_with("Project(\"") {
        return None;
    }
    let quoted: Vec<&str> = line.split('"').collect();
    let (project_type, name, relative, guid) = match quoted.as_slice() {
        [_, project_type, _, name, _, relative, _, guid, ..] => (*project_type, *name, *relative, *guid),
        _ => return None,
    };

    if project_type
        .trim_matches(['{', '}'])
        .eq_ignore_ascii_case(SOLUTION_FOLDER_TYPE)
    {
        return None;
    }
    let is_project_file = Path::new(relative)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PROJECT_EXTENSIONS.iter().any(|p| ext.eq_ignore_ascii_case(p)));
    if !is_project_file {
        debug!("Skipping non-MSBuild solution entry {}", name);
        return None;
    }

    let path = resolve_relative_path(solution_dir, &from_msbuild_path(relative));
    let id = ProjectId::parse_guid(guid).unwrap_or_else(|| ProjectId::Path(path.clone()));
    Some(SolutionProject {
        name: name.to_string(),
        path,
        id,
    })
}
