//! NuGet-style package versions.
//!
//! A version has up to four numeric parts (`major.minor.build.revision`) and an
//! optional prerelease label (`1.2.3-beta1`). Missing numeric parts are zero,
//! so `6.0.0` and `6.0.0.0` compare equal.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone)]
pub struct PackageVersion {
    parts: [u64; 4],
    special: Option<String>,
    original: String,
}

impl PackageVersion {
    /// Numeric parts, normalized to four components.
    pub fn parts(&self) -> [u64; 4] {
        self.parts
    }

    /// Prerelease label, if any (the part after `-`).
    pub fn special(&self) -> Option<&str> {
        self.special.as_deref()
    }

    pub fn is_prerelease(&self) -> bool {
        self.special.is_some()
    }

    /// Compare only the numeric parts, ignoring any prerelease label.
    ///
    /// This is how an assembly version (always four numeric parts) is
    /// compared with a package version.
    pub fn numeric_eq(&self, other: &PackageVersion) -> bool {
        self.parts == other.parts
    }
}

impl FromStr for PackageVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Build metadata never takes part in comparisons
        let without_metadata = trimmed.split('+').next().unwrap_or_default();
        let (numeric, special) = match without_metadata.split_once('-') {
            Some((numeric, label)) if !label.is_empty() => (numeric, Some(label.to_string())),
            Some(_) => anyhow::bail!("Invalid version '{}': empty prerelease label", s),
            None => (without_metadata, None),
        };

        let fields: Vec<&str> = numeric.split('.').collect();
        if numeric.is_empty() || fields.len() > 4 {
            anyhow::bail!("Invalid version '{}': expected 1 to 4 numeric parts", s);
        }

        let mut parts = [0u64; 4];
        for (slot, field) in parts.iter_mut().zip(&fields) {
            *slot = field
                .parse()
                .with_context(|| format!("Invalid version '{}': '{}' is not a number", s, field))?;
        }

        Ok(PackageVersion {
            parts,
            special,
            original: trimmed.to_string(),
        })
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts).then_with(|| {
            match (&self.special, &other.special) {
                (None, None) => Ordering::Equal,
                // A release sorts above any of its prereleases
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            }
        })
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Serialize for PackageVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
