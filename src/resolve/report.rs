use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use super::Resolution;
use crate::package::PackageVersion;
use crate::runtime::Runtime;

pub const REPORT_FILE_NAME: &str = "nugetify-report.json";

/// Diagnostic summary of a resolution pass.
#[derive(Debug, Serialize)]
pub struct ResolutionReport<'a> {
    pub resolved: Vec<ResolvedEntry<'a>>,
    pub failed: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct ResolvedEntry<'a> {
    pub reference: &'a str,
    pub candidates: Vec<Candidate<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Candidate<'a> {
    pub id: &'a str,
    pub version: &'a PackageVersion,
    pub file_count: usize,
}

impl<'a> ResolutionReport<'a> {
    pub fn from_resolution(resolution: &'a Resolution<'_>) -> Self {
        let resolved = resolution
            .resolved()
            .map(|mapping| ResolvedEntry {
                reference: &mapping.reference,
                candidates: mapping
                    .candidates
                    .iter()
                    .map(|p| Candidate {
                        id: &p.id,
                        version: &p.version,
                        file_count: p.file_count(),
                    })
                    .collect(),
            })
            .collect();
        let failed = resolution.failed().map(|m| m.reference.as_str()).collect();
        Self { resolved, failed }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize resolution report")
    }

    pub fn write<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        runtime.write(path, self.to_json()?.as_bytes())?;
        info!("Wrote resolution report to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;
    use crate::resolve::AssemblyResolver;
    use crate::runtime::MockRuntime;
    use mockall::predicate::*;
    use std::path::PathBuf;

    #[test]
    fn test_report_lists_candidates_and_failures() {
        let packages = vec![Package::new(
            "Newtonsoft.Json",
            "6.0.0".parse().unwrap(),
            vec!["lib/net45/Newtonsoft.Json.dll".into()],
        )];
        let resolution = AssemblyResolver::new(&packages)
            .resolve_assemblies(&["Newtonsoft.Json".to_string(), "Missing".to_string()], false);

        let json: serde_json::Value =
            serde_json::from_str(&resolution.report().to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "resolved": [{
                    "reference": "Newtonsoft.Json",
                    "candidates": [{"id": "Newtonsoft.Json", "version": "6.0.0", "file_count": 1}]
                }],
                "failed": ["Missing"]
            })
        );
    }

    #[test]
    fn test_write_report() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_write()
            .with(eq(PathBuf::from("/src/App/nugetify-report.json")), always())
            .times(1)
            .returning(|_, _| Ok(()));

        let resolution = Resolution::default();
        resolution
            .report()
            .write(&runtime, Path::new("/src/App/nugetify-report.json"))
            .unwrap();
    }
}
