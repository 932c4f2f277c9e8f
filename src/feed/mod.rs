//! Package feed abstraction.
//!
//! A feed enumerates every package it holds (id, version, file listing). The
//! index is materialized once per pass by [`FeedIndex`] and is read-only for
//! the rest of the pass.

mod local;
mod nuspec;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use anyhow::{Context, Result};
use log::info;

use crate::package::Package;

pub use local::LocalFeed;
pub use nuspec::{NuspecMetadata, parse_nuspec};

/// Source of available packages.
#[cfg_attr(test, mockall::automock)]
pub trait PackageFeed {
    /// Human readable location of the feed (used in messages).
    fn source(&self) -> String;

    /// Enumerate all packages on the feed.
    fn packages(&self) -> Result<Vec<Package>>;
}

/// Context attached when the feed itself cannot be listed.
///
/// Callers that carry on past per-project failures look for it with
/// `anyhow::Error::downcast_ref` and stop the run instead.
#[derive(Debug)]
pub struct FeedError {
    source: String,
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to list packages from feed {}", self.source)
    }
}

/// Lazily fetched, sorted snapshot of a feed.
///
/// The feed is only queried the first time the index is needed, so a run in
/// which no project has binary references never touches the feed.
pub struct FeedIndex<'a> {
    feed: &'a dyn PackageFeed,
    packages: RefCell<Option<Rc<[Package]>>>,
}

impl<'a> FeedIndex<'a> {
    pub fn new(feed: &'a dyn PackageFeed) -> Self {
        Self {
            feed,
            packages: RefCell::new(None),
        }
    }

    pub fn source(&self) -> String {
        self.feed.source()
    }

    pub fn is_loaded(&self) -> bool {
        self.packages.borrow().is_some()
    }

    /// All packages, ordered by id (case-insensitive) then newest version first.
    #[tracing::instrument(skip(self))]
    pub fn packages(&self) -> Result<Rc<[Package]>> {
        if let Some(packages) = self.packages.borrow().as_ref() {
            return Ok(Rc::clone(packages));
        }

        let source = self.feed.source();
        info!("Fetching package index from {}", source);
        let mut packages = self
            .feed
            .packages()
            .with_context(|| FeedError {
                source: source.clone(),
            })?;
        sort_packages(&mut packages);
        info!("Feed {} holds {} package(s)", source, packages.len());

        let shared: Rc<[Package]> = packages.into();
        *self.packages.borrow_mut() = Some(Rc::clone(&shared));
        Ok(shared)
    }
}

/// Order packages by id (case-insensitive), newest version first within an id.
pub fn sort_packages(packages: &mut [Package]) {
    packages.sort_by(|a, b| {
        a.id.to_lowercase()
            .cmp(&b.id.to_lowercase())
            .then_with(|| b.version.cmp(&a.version))
    });
}
