use anyhow::{Context, Result, anyhow};
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::Event;

use crate::package::PackageVersion;
use crate::xml::strip_bom;

/// Identity of a package as declared in its `.nuspec`.
#[derive(Debug, Clone, PartialEq)]
pub struct NuspecMetadata {
    pub id: String,
    pub version: PackageVersion,
}

/// Read `package/metadata/id` and `package/metadata/version` from a nuspec.
pub fn parse_nuspec(content: &str) -> Result<NuspecMetadata> {
    let mut reader = Reader::from_str(strip_bom(content));
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut id = None;
    let mut version = None;

    loop {
        match reader.read_event().context("Malformed nuspec")? {
            Event::Start(e) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text)
                if stack.len() == 3 && stack[0] == "package" && stack[1] == "metadata" =>
            {
                let raw = std::str::from_utf8(&text).context("nuspec text is not UTF-8")?;
                let value = unescape(raw)?.trim().to_string();
                match stack[2].as_str() {
                    "id" => id = Some(value),
                    "version" => version = Some(value),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let id = id.ok_or_else(|| anyhow!("nuspec has no metadata/id"))?;
    let version = version
        .ok_or_else(|| anyhow!("nuspec for {} has no metadata/version", id))?
        .parse()
        .with_context(|| format!("nuspec for {} has an invalid version", id))?;
    Ok(NuspecMetadata { id, version })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nuspec() {
        let meta = parse_nuspec(
            r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>Newtonsoft.Json</id>
    <version>6.0.0</version>
    <dependencies>
      <dependency id="Other" version="1.0.0" />
    </dependencies>
  </metadata>
</package>"#,
        )
        .unwrap();
        assert_eq!(meta.id, "Newtonsoft.Json");
        assert_eq!(meta.version.to_string(), "6.0.0");
    }

    #[test]
    fn test_parse_nuspec_ignores_nested_ids() {
        let meta = parse_nuspec(
            "<package><metadata><version>1.0</version><group><id>Nested</id></group><id>Real</id></metadata></package>",
        )
        .unwrap();
        assert_eq!(meta.id, "Real");
    }

    #[test]
    fn test_parse_nuspec_requires_package_root() {
        let err = parse_nuspec(
            "<manifest><metadata><id>Foo</id><version>1.0.0</version></metadata></manifest>",
        )
        .unwrap_err();
        assert!(err.to_string().contains("no metadata/id"));
    }

    #[test]
    fn test_parse_nuspec_missing_version() {
        let err = parse_nuspec("<package><metadata><id>Foo</id></metadata></package>").unwrap_err();
        assert!(err.to_string().contains("no metadata/version"));
    }
}
