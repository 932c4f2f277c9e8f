use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;
use log::debug;

use super::{MsBuildProject, ProjectId};
use crate::console::Console;
use crate::runtime::{Runtime, normalize_path};

pub type SharedProject<'a, R> = Rc<RefCell<MsBuildProject<'a, R>>>;

/// Result of asking the loader for a project.
pub enum ProjectHandle<'a, R: Runtime> {
    Loaded(SharedProject<'a, R>),
    /// The file could not be read or parsed. Callers skip the project.
    Unloadable { path: PathBuf, reason: String },
}

impl<R: Runtime> Clone for ProjectHandle<'_, R> {
    fn clone(&self) -> Self {
        match self {
            ProjectHandle::Loaded(project) => ProjectHandle::Loaded(Rc::clone(project)),
            ProjectHandle::Unloadable { path, reason } => ProjectHandle::Unloadable {
                path: path.clone(),
                reason: reason.clone(),
            },
        }
    }
}

impl<'a, R: Runtime> ProjectHandle<'a, R> {
    pub fn loaded(&self) -> Option<&SharedProject<'a, R>> {
        match self {
            ProjectHandle::Loaded(project) => Some(project),
            ProjectHandle::Unloadable { .. } => None,
        }
    }
}

/// What to do when one identity is requested with two different paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Keep the first project silently.
    KeepFirst,
    /// Keep the first project and report the conflict.
    #[default]
    Warn,
    /// Fail the run.
    Reject,
}

/// Loads each project file at most once per run.
///
/// Projects are indexed both by identity and by canonical path, so the same
/// file reached through different identities (or different spellings of its
/// path) yields the same shared instance.
pub struct ProjectLoader<'a, R: Runtime> {
    runtime: &'a R,
    console: &'a dyn Console,
    policy: ConflictPolicy,
    by_id: HashMap<ProjectId, (String, ProjectHandle<'a, R>)>,
    by_path: HashMap<String, ProjectHandle<'a, R>>,
}

impl<'a, R: Runtime> ProjectLoader<'a, R> {
    pub fn new(runtime: &'a R, console: &'a dyn Console, policy: ConflictPolicy) -> Self {
        Self {
            runtime,
            console,
            policy,
            by_id: HashMap::new(),
            by_path: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Get the project known as `id` located at `path`, loading it on first use.
    #[tracing::instrument(skip(self))]
    pub fn get_project(&mut self, id: &ProjectId, path: &Path) -> Result<ProjectHandle<'a, R>> {
        let key = self.path_key(path);

        if let Some((known_key, handle)) = self.by_id.get(id) {
            if *known_key != key {
                self.report_conflict(id, known_key, path)?;
            }
            return Ok(handle.clone());
        }

        let handle = match self.by_path.get(&key) {
            Some(handle) => handle.clone(),
            None => {
                let handle = self.load(id, path, &key);
                self.by_path.insert(key.clone(), handle.clone());
                handle
            }
        };
        self.by_id.insert(id.clone(), (key, handle.clone()));
        Ok(handle)
    }

    fn load(&mut self, id: &ProjectId, path: &Path, key: &str) -> ProjectHandle<'a, R> {
        let project = match MsBuildProject::load(self.runtime, path) {
            Ok(project) => project,
            Err(e) => {
                self.console.write_warning(&format!(
                    "Problem loading {}, any future messages about modifications to it are speculative only: {:#}",
                    path.display(),
                    e
                ));
                return ProjectHandle::Unloadable {
                    path: path.to_path_buf(),
                    reason: format!("{:#}", e),
                };
            }
        };

        let own_id = project.project_id();
        if let Some(own_id) = &own_id
            && let ProjectId::Guid(_) = id
            && own_id != id
        {
            self.console.write_warning(&format!(
                "Potential authoring issue: {} declares project guid {} but is referenced as {}",
                path.display(),
                own_id,
                id
            ));
            if let Some((_, existing)) = self.by_id.get(own_id) {
                debug!("{} already loaded under its own guid", own_id);
                return existing.clone();
            }
        }

        let handle = ProjectHandle::Loaded(Rc::new(RefCell::new(project)));
        if let Some(own_id) = own_id
            && own_id != *id
        {
            self.by_id
                .entry(own_id)
                .or_insert_with(|| (key.to_string(), handle.clone()));
        }
        handle
    }

    fn report_conflict(&self, id: &ProjectId, known_key: &str, requested: &Path) -> Result<()> {
        let message = format!(
            "Project {} was already loaded from {}, ignoring {}",
            id,
            known_key,
            requested.display()
        );
        match self.policy {
            ConflictPolicy::KeepFirst => debug!("{}", message),
            ConflictPolicy::Warn => self.console.write_warning(&message),
            ConflictPolicy::Reject => anyhow::bail!("{}", message),
        }
        Ok(())
    }

    /// Canonical, case-folded spelling of a project path.
    fn path_key(&self, path: &Path) -> String {
        let canonical = self
            .runtime
            .canonicalize(path)
            .unwrap_or_else(|_| normalize_path(path));
        canonical.to_string_lossy().to_lowercase()
    }
}
