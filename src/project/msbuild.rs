use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use super::{BinaryReference, ProjectAdapter, ProjectId, ProjectReference, file_stem};
use crate::runtime::Runtime;
use crate::runtime::path::{from_msbuild_path, resolve_relative_path};
use crate::xml::{Document, Element, Node};

const ITEM_GROUP: &str = "ItemGroup";
const PROPERTY_GROUP: &str = "PropertyGroup";

/// An MSBuild project file (`.csproj`, `.vbproj`, `.fsproj`) held in memory.
///
/// Edits are applied to the parsed document and only written back by
/// [`ProjectAdapter::save`] when something actually changed.
pub struct MsBuildProject<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
    document: Document,
    dirty: bool,
}

impl<'a, R: Runtime> MsBuildProject<'a, R> {
    #[tracing::instrument(skip(runtime))]
    pub fn load(runtime: &'a R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        Self::parse(runtime, path, &content)
    }

    pub fn parse(runtime: &'a R, path: &Path, content: &str) -> Result<Self> {
        let document = Document::parse(content)
            .with_context(|| format!("Failed to parse project file {:?}", path))?;
        if !document.root().is_named("Project") {
            anyhow::bail!(
                "{:?} is not an MSBuild project (root element is <{}>)",
                path,
                document.root().name
            );
        }
        debug!("Loaded project {:?}", path);
        Ok(Self {
            runtime,
            path: path.to_path_buf(),
            document,
            dirty: false,
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn to_xml_string(&self) -> Result<String> {
        self.document.to_xml_string()
    }

    /// The project's own identity, taken from its `ProjectGuid` property.
    pub fn project_id(&self) -> Option<ProjectId> {
        self.property("ProjectGuid")
            .and_then(|guid| ProjectId::parse_guid(&guid))
    }

    /// First non-empty value of a property across all property groups.
    pub fn property(&self, name: &str) -> Option<String> {
        self.document
            .root()
            .elements_named(PROPERTY_GROUP)
            .flat_map(|group| group.elements_named(name))
            .filter_map(|el| el.text().ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    fn items<'s>(&'s self, item_type: &'s str) -> impl Iterator<Item = &'s Element> {
        self.document
            .root()
            .elements_named(ITEM_GROUP)
            .flat_map(move |group| group.elements_named(item_type))
    }

    fn project_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

fn child_text(element: &Element, name: &str) -> Option<String> {
    element
        .child(name)
        .and_then(|child| child.text().ok())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

impl<R: Runtime> ProjectAdapter for MsBuildProject<'_, R> {
    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn assembly_name(&self) -> String {
        self.property("AssemblyName")
            .unwrap_or_else(|| file_stem(&self.path))
    }

    fn binary_references(&self) -> Vec<BinaryReference> {
        self.items("Reference")
            .filter_map(|item| {
                let hint_path = child_text(item, "HintPath")?;
                let include = item.attribute("Include")?;
                Some(BinaryReference::from_include(include, Some(hint_path)))
            })
            .collect()
    }

    fn project_references(&self) -> Vec<ProjectReference> {
        let project_dir = self.project_dir();
        self.items("ProjectReference")
            .filter_map(|item| {
                let include = item.attribute("Include")?.to_string();
                let path = resolve_relative_path(project_dir, &from_msbuild_path(&include));
                Some(ProjectReference {
                    path,
                    project_id: child_text(item, "Project")
                        .and_then(|guid| ProjectId::parse_guid(&guid)),
                    name: child_text(item, "Name"),
                    include,
                })
            })
            .collect()
    }

    fn set_hint_path(&mut self, include_name: &str, hint_path: &str) -> Result<bool> {
        let mut changed = false;
        for group in self.document.root_mut().elements_mut() {
            if !group.is_named(ITEM_GROUP) {
                continue;
            }
            for item in group.elements_mut() {
                if !item.is_named("Reference") {
                    continue;
                }
                let matches = item.attribute("Include").is_some_and(|include| {
                    BinaryReference::from_include(include, None).is_for_assembly(include_name)
                });
                if !matches {
                    continue;
                }
                if let Some(hint) = item.child_mut("HintPath")
                    && hint.text()?.trim() != hint_path
                {
                    hint.set_text(hint_path);
                    changed = true;
                }
            }
        }
        if changed {
            debug!("Hint path for {} set to {}", include_name, hint_path);
            self.dirty = true;
        }
        Ok(changed)
    }

    fn add_packages_config(&mut self, file_name: &str) -> bool {
        let already_tracked = self
            .document
            .root()
            .elements_named(ITEM_GROUP)
            .flat_map(|group| group.elements())
            .any(|item| {
                item.attribute("Include")
                    .is_some_and(|include| include.eq_ignore_ascii_case(file_name))
            });
        if already_tracked {
            return false;
        }

        let item = Element::new("None").with_attribute("Include", file_name);
        let root = self.document.root_mut();
        let existing = root
            .elements_mut()
            .find(|group| group.is_named(ITEM_GROUP) && group.child("None").is_some());
        match existing {
            Some(group) => group.append_element(item),
            None => {
                let indent = root.child_indent().unwrap_or("\n  ").to_string();
                let mut group = Element::new(ITEM_GROUP);
                group.children = vec![
                    Node::Text(format!("{indent}  ")),
                    Node::Element(item),
                    Node::Text(indent),
                ];
                root.append_element(group);
            }
        }
        self.dirty = true;
        true
    }

    fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let content = self.document.to_xml_string()?;
        self.runtime
            .write(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to save project {:?}", self.path))?;
        info!("Saved {:?}", self.path);
        self.dirty = false;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::*;

    const APP: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\r\n\
<Project ToolsVersion=\"12.0\" xmlns=\"http://schemas.microsoft.com/developer/msbuild/2003\">\r\n\
  <PropertyGroup>\r\n\
    <ProjectGuid>{9A19103F-16F7-4668-BE54-9A1E7A4F7556}</ProjectGuid>\r\n\
    <AssemblyName>Contoso.App</AssemblyName>\r\n\
  </PropertyGroup>\r\n\
  <ItemGroup>\r\n\
    <Reference Include=\"System\" />\r\n\
    <Reference Include=\"Newtonsoft.Json, Version=6.0.0.0, Culture=neutral, PublicKeyToken=30ad4fe6b2a6aeed\">\r\n\
      <HintPath>..\\lib\\Newtonsoft.Json.dll</HintPath>\r\n\
    </Reference>\r\n\
    <Reference Include=\"log4net\">\r\n\
      <HintPath>..\\lib\\log4net.dll</HintPath>\r\n\
    </Reference>\r\n\
  </ItemGroup>\r\n\
  <ItemGroup>\r\n\
    <ProjectReference Include=\"..\\Lib\\Lib.csproj\">\r\n\
      <Project>{11111111-2222-3333-4444-555555555555}</Project>\r\n\
      <Name>Lib</Name>\r\n\
    </ProjectReference>\r\n\
  </ItemGroup>\r\n\
  <ItemGroup>\r\n\
    <None Include=\"App.config\" />\r\n\
  </ItemGroup>\r\n\
</Project>\r\n";

    fn project<'a>(runtime: &'a MockRuntime, content: &str) -> MsBuildProject<'a, MockRuntime> {
        MsBuildProject::parse(runtime, Path::new("/src/App/App.csproj"), content).unwrap()
    }

    #[test]
    fn test_reads_identity() {
        let runtime = MockRuntime::new();
        let project = project(&runtime, APP);
        assert_eq!(project.assembly_name(), "Contoso.App");
        assert_eq!(
            project.project_id(),
            ProjectId::parse_guid("9a19103f-16f7-4668-be54-9a1e7a4f7556")
        );
    }

    #[test]
    fn test_assembly_name_falls_back_to_file_stem() {
        let runtime = MockRuntime::new();
        let project = project(&runtime, "<Project><PropertyGroup /></Project>");
        assert_eq!(project.assembly_name(), "App");
        assert_eq!(project.project_id(), None);
    }

    #[test]
    fn test_binary_references_require_hint_path() {
        let runtime = MockRuntime::new();
        let references = project(&runtime, APP).binary_references();
        let names: Vec<&str> = references.iter().map(|r| r.include_name.as_str()).collect();
        assert_eq!(names, vec!["Newtonsoft.Json", "log4net"]);
        assert_eq!(references[0].include_version.as_deref(), Some("6.0.0.0"));
        assert_eq!(references[1].hint_path.as_deref(), Some(r"..\lib\log4net.dll"));
    }

    #[test]
    fn test_project_references() {
        let runtime = MockRuntime::new();
        let references = project(&runtime, APP).project_references();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].path, PathBuf::from("/src/Lib/Lib.csproj"));
        assert_eq!(references[0].name.as_deref(), Some("Lib"));
        assert_eq!(
            references[0].project_id,
            ProjectId::parse_guid("11111111-2222-3333-4444-555555555555")
        );
    }

    #[test]
    fn test_set_hint_path_only_touches_text() {
        let runtime = MockRuntime::new();
        let mut project = project(&runtime, APP);
        let changed = project
            .set_hint_path("newtonsoft.json", r"..\packages\Newtonsoft.Json\lib\net45\Newtonsoft.Json.dll")
            .unwrap();
        assert!(changed);
        assert!(project.is_dirty());

        let expected = APP.replace(
            r"..\lib\Newtonsoft.Json.dll",
            r"..\packages\Newtonsoft.Json\lib\net45\Newtonsoft.Json.dll",
        );
        assert_eq!(project.to_xml_string().unwrap(), expected);
    }

    #[test]
    fn test_set_hint_path_same_value_is_noop() {
        let runtime = MockRuntime::new();
        let mut project = project(&runtime, APP);
        assert!(!project.set_hint_path("log4net", r"..\lib\log4net.dll").unwrap());
        assert!(!project.set_hint_path("Missing", r"x.dll").unwrap());
        assert!(!project.is_dirty());
    }

    #[test]
    fn test_add_packages_config_joins_none_group() {
        let runtime = MockRuntime::new();
        let mut project = project(&runtime, APP);
        assert!(project.add_packages_config("packages.config"));
        assert!(!project.add_packages_config("Packages.Config"));

        let xml = project.to_xml_string().unwrap();
        assert!(xml.contains(
            "<None Include=\"App.config\" />\r\n    <None Include=\"packages.config\"/>\r\n  </ItemGroup>"
        ));
    }

    #[test]
    fn test_add_packages_config_creates_item_group() {
        let runtime = MockRuntime::new();
        let mut project = project(
            &runtime,
            "<Project>\n  <PropertyGroup>\n  </PropertyGroup>\n</Project>",
        );
        assert!(project.add_packages_config("packages.config"));
        assert_eq!(
            project.to_xml_string().unwrap(),
            "<Project>\n  <PropertyGroup>\n  </PropertyGroup>\n  <ItemGroup>\n    <None Include=\"packages.config\"/>\n  </ItemGroup>\n</Project>"
        );
    }

    #[test]
    fn test_save_writes_only_when_dirty() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_write()
            .with(eq(PathBuf::from("/src/App/App.csproj")), always())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut project = project(&runtime, APP);
        assert!(!project.save().unwrap());
        project.set_hint_path("log4net", r"..\packages\log4net\lib\log4net.dll").unwrap();
        assert!(project.save().unwrap());
        assert!(!project.save().unwrap());
    }

    #[test]
    fn test_rejects_non_project_root() {
        let runtime = MockRuntime::new();
        let result = MsBuildProject::parse(&runtime, Path::new("/x.csproj"), "<packages />");
        assert!(result.is_err());
    }
}
