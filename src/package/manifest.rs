//! Per-project manifest of chosen packages (`packages.config`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use super::PackageVersion;
use crate::runtime::Runtime;
use crate::xml::{attribute_value, strip_bom};

/// Default manifest file name.
pub const PACKAGES_CONFIG: &str = "packages.config";

/// One `<package>` entry of a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageReference {
    pub id: String,
    pub version: PackageVersion,
    pub target_framework: Option<String>,
}

/// The `packages.config` of one project.
///
/// Entries are keyed by package id: adding a second entry for an id that is
/// already present is a no-op. Nothing is ever removed.
#[derive(Debug, Clone)]
pub struct PackageReferenceFile {
    path: PathBuf,
    entries: Vec<PackageReference>,
    dirty: bool,
}

impl PackageReferenceFile {
    /// An empty manifest that will be written to `path`.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: Vec::new(),
            dirty: false,
        }
    }

    /// Load the manifest at `path`, or start an empty one if it does not exist.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("No manifest at {:?}, starting empty", path);
            return Ok(Self::new(path.to_path_buf()));
        }
        let content = runtime.read_to_string(path)?;
        let entries =
            parse_entries(&content).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[PackageReference] {
        &self.entries
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The entry recorded for a package id, if any.
    pub fn entry(&self, id: &str) -> Option<&PackageReference> {
        self.entries.iter().find(|e| e.id.eq_ignore_ascii_case(id))
    }

    pub fn entry_exists(&self, id: &str, version: &PackageVersion) -> bool {
        self.entry(id).is_some_and(|e| e.version == *version)
    }

    /// Add an entry. Returns `false` when the id is already recorded.
    pub fn add_entry(&mut self, id: &str, version: &PackageVersion) -> bool {
        if self.entry(id).is_some() {
            return false;
        }
        self.entries.push(PackageReference {
            id: id.to_string(),
            version: version.clone(),
            target_framework: None,
        });
        self.dirty = true;
        true
    }

    /// Write the manifest if it changed. Returns whether a write happened.
    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&mut self, runtime: &R) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.entries
            .sort_by(|a, b| a.id.to_lowercase().cmp(&b.id.to_lowercase()));
        let xml = self.to_xml()?;
        runtime
            .write(&self.path, xml.as_bytes())
            .with_context(|| format!("Failed to save manifest to {:?}", self.path))?;
        self.dirty = false;
        Ok(true)
    }

    fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("packages")))?;
        for entry in &self.entries {
            let version = entry.version.to_string();
            let mut element = BytesStart::new("package");
            element.push_attribute(("id", entry.id.as_str()));
            element.push_attribute(("version", version.as_str()));
            if let Some(framework) = &entry.target_framework {
                element.push_attribute(("targetFramework", framework.as_str()));
            }
            writer.write_event(Event::Empty(element))?;
        }
        writer.write_event(Event::End(BytesEnd::new("packages")))?;

        let mut xml = String::from_utf8(writer.into_inner())?;
        xml.push('\n');
        Ok(xml)
    }
}

fn parse_entries(content: &str) -> Result<Vec<PackageReference>> {
    let mut reader = Reader::from_str(strip_bom(content));
    reader.config_mut().trim_text(true);

    let mut entries: Vec<PackageReference> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"package" => {
                let id = attribute_value(&e, "id")?
                    .ok_or_else(|| anyhow::anyhow!("<package> element without an id"))?;
                let version = attribute_value(&e, "version")?
                    .ok_or_else(|| anyhow::anyhow!("Package '{}' has no version", id))?
                    .parse()
                    .with_context(|| format!("Package '{}' has an invalid version", id))?;
                let target_framework = attribute_value(&e, "targetFramework")?;
                if entries.iter().any(|p| p.id.eq_ignore_ascii_case(&id)) {
                    debug!("Ignoring duplicate manifest entry for {}", id);
                    continue;
                }
                entries.push(PackageReference {
                    id,
                    version,
                    target_framework,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn v(s: &str) -> PackageVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/src/App/packages.config");

        runtime
            .expect_exists()
            .with(eq(path.clone()))
            .returning(|_| false);

        let manifest = PackageReferenceFile::load(&runtime, &path).unwrap();
        assert!(manifest.entries().is_empty());
        assert!(!manifest.is_dirty());
        assert_eq!(manifest.path(), path.as_path());
    }

    #[test]
    fn test_load_existing_entries() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/src/App/packages.config");

        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(path.clone()))
            .returning(|_| {
                Ok(r#"<?xml version="1.0" encoding="utf-8"?>
<packages>
  <package id="Newtonsoft.Json" version="6.0.0" targetFramework="net45" />
  <package id="log4net" version="2.0.3" />
</packages>"#
                    .into())
            });

        let manifest = PackageReferenceFile::load(&runtime, &path).unwrap();
        assert_eq!(manifest.entries().len(), 2);
        assert!(manifest.entry_exists("newtonsoft.json", &v("6.0.0.0")));
        assert!(!manifest.entry_exists("Newtonsoft.Json", &v("5.0.8")));
        assert_eq!(
            manifest.entry("Newtonsoft.Json").unwrap().target_framework.as_deref(),
            Some("net45")
        );
    }

    #[test]
    fn test_load_invalid_version_fails() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Ok(r#"<packages><package id="A" version="one" /></packages>"#.into()));

        let result = PackageReferenceFile::load(&runtime, Path::new("/p/packages.config"));
        assert!(result.is_err());
    }

    #[test]
    fn test_add_entry_is_keyed_by_id() {
        let mut manifest = PackageReferenceFile::new(PathBuf::from("/p/packages.config"));

        assert!(manifest.add_entry("Foo", &v("1.0.0")));
        assert!(!manifest.add_entry("Foo", &v("1.0.0")));
        assert!(!manifest.add_entry("FOO", &v("2.0.0")));

        assert_eq!(manifest.entries().len(), 1);
        assert!(manifest.entry_exists("Foo", &v("1.0.0")));
        assert!(manifest.is_dirty());
    }

    #[test]
    fn test_save_skips_clean_manifest() {
        let runtime = MockRuntime::new();
        let mut manifest = PackageReferenceFile::new(PathBuf::from("/p/packages.config"));

        // No expectations on runtime: a write would panic
        assert!(!manifest.save(&runtime).unwrap());
    }

    #[test]
    fn test_save_writes_sorted_entries() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/p/packages.config");

        runtime
            .expect_write()
            .with(eq(path.clone()), mockall::predicate::always())
            .times(1)
            .returning(|_, contents| {
                let xml = std::str::from_utf8(contents).unwrap();
                let entries = parse_entries(xml).unwrap();
                let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
                assert_eq!(ids, vec!["alpha", "Beta", "Zeta"]);
                assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
                Ok(())
            });

        let mut manifest = PackageReferenceFile::new(path);
        manifest.add_entry("Zeta", &v("1.0.0"));
        manifest.add_entry("alpha", &v("2.0.0-beta"));
        manifest.add_entry("Beta", &v("3.0.0"));

        assert!(manifest.save(&runtime).unwrap());
        assert!(!manifest.is_dirty());
        // Second save is a no-op
        assert!(!manifest.save(&runtime).unwrap());
    }
}
