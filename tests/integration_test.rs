use assert_cmd::Command;
use assert_cmd::cargo;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::tempdir;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::FileOptions;

fn create_nupkg(id: &str, version: &str, files: &[&str]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(format!("{}.nuspec", id), options).unwrap();
    write!(
        zip,
        "<?xml version=\"1.0\"?><package><metadata><id>{id}</id><version>{version}</version></metadata></package>"
    )
    .unwrap();
    for file in files {
        zip.start_file(*file, options).unwrap();
        zip.write_all(b"MZ").unwrap();
    }
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(b"<Types />").unwrap();
    zip.finish().unwrap().into_inner()
}

fn write(path: &Path, content: impl AsRef<[u8]>) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

const APP_CSPROJ: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\r
<Project ToolsVersion=\"12.0\" xmlns=\"http://schemas.microsoft.com/developer/msbuild/2003\">\r
  <PropertyGroup>\r
    <ProjectGuid>{9A19103F-16F7-4668-BE54-9A1E7A4F7556}</ProjectGuid>\r
    <AssemblyName>Contoso.App</AssemblyName>\r
  </PropertyGroup>\r
  <ItemGroup>\r
    <Reference Include=\"System\" />\r
    <Reference Include=\"Newtonsoft.Json, Version=6.0.0.0, Culture=neutral, PublicKeyToken=30ad4fe6b2a6aeed\">\r
      <HintPath>..\\lib\\Newtonsoft.Json.dll</HintPath>\r
    </Reference>\r
    <Reference Include=\"Foo.Bar\">\r
      <HintPath>..\\lib\\Foo.Bar.dll</HintPath>\r
    </Reference>\r
    <Reference Include=\"Missing\">\r
      <HintPath>..\\lib\\Missing.dll</HintPath>\r
    </Reference>\r
  </ItemGroup>\r
  <ItemGroup>\r
    <ProjectReference Include=\"..\\Lib\\Lib.csproj\">\r
      <Project>{11111111-2222-3333-4444-555555555555}</Project>\r
      <Name>Lib</Name>\r
    </ProjectReference>\r
  </ItemGroup>\r
</Project>\r
";

const LIB_CSPROJ: &str = "<Project>
  <PropertyGroup>
    <ProjectGuid>{11111111-2222-3333-4444-555555555555}</ProjectGuid>
    <AssemblyName>Contoso.Lib</AssemblyName>
  </PropertyGroup>
</Project>
";

const SOLUTION: &str = "Microsoft Visual Studio Solution File, Format Version 12.00
Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"App\", \"App\\App.csproj\", \"{9A19103F-16F7-4668-BE54-9A1E7A4F7556}\"
EndProject
Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Lib\", \"Lib\\Lib.csproj\", \"{11111111-2222-3333-4444-555555555555}\"
EndProject
Global
EndGlobal
";

/// Lay out `src/` (solution, two projects) and `feed/` (two packages).
fn setup(root: &Path) {
    write(&root.join("src/All.sln"), SOLUTION);
    write(&root.join("src/App/App.csproj"), APP_CSPROJ);
    write(&root.join("src/Lib/Lib.csproj"), LIB_CSPROJ);
    write(
        &root.join("feed/Newtonsoft.Json.6.0.0.nupkg"),
        create_nupkg(
            "Newtonsoft.Json",
            "6.0.0",
            &["lib/net45/Newtonsoft.Json.dll", "lib/net45/Newtonsoft.Json.xml"],
        ),
    );
    write(
        &root.join("feed/nested/Foo.Bar.AllInOne.1.0.0.nupkg"),
        create_nupkg("Foo.Bar.AllInOne", "1.0.0", &["lib/Foo.Bar.dll"]),
    );
}

fn nugetify() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("nugetify"));
    cmd.env_remove("NUGETIFY_FEED");
    cmd
}

#[test]
fn test_end_to_end_migrate() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    setup(root);

    nugetify()
        .arg("migrate")
        .arg(root.join("src/All.sln"))
        .arg("--feed")
        .arg(root.join("feed"))
        .assert()
        .success()
        .stdout(predicates::str::contains("Processing project App"))
        .stdout(predicates::str::contains("2 project(s) processed, 2 warning(s)"))
        .stderr(predicates::str::contains("warning: Could not match: Missing"))
        .stderr(predicates::str::contains("\"Foo.Bar.AllInOne\""));

    let app = fs::read_to_string(root.join("src/App/App.csproj")).unwrap();
    assert!(app.contains(
        "<HintPath>..\\packages\\Newtonsoft.Json\\lib\\net45\\Newtonsoft.Json.dll</HintPath>\r\n"
    ));
    assert!(app.contains("<HintPath>..\\packages\\Foo.Bar.AllInOne\\lib\\Foo.Bar.dll</HintPath>"));
    assert!(app.contains("<HintPath>..\\lib\\Missing.dll</HintPath>"));
    assert!(app.contains("<None Include=\"packages.config\"/>"));
    assert!(app.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\r\n<Project ToolsVersion"));

    let manifest = fs::read_to_string(root.join("src/App/packages.config")).unwrap();
    assert!(manifest.contains("<package id=\"Foo.Bar.AllInOne\" version=\"1.0.0\"/>"));
    assert!(manifest.contains("<package id=\"Newtonsoft.Json\" version=\"6.0.0\"/>"));

    let registry = fs::read_to_string(root.join("src/packages/repositories.config")).unwrap();
    assert!(registry.contains("<repository path=\"..\\App\\packages.config\"/>"));

    assert_eq!(
        fs::read_to_string(root.join("src/Lib/Lib.csproj")).unwrap(),
        LIB_CSPROJ
    );
    assert!(!root.join("src/Lib/packages.config").exists());
}

#[test]
fn test_second_migrate_is_idempotent() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    setup(root);

    let run = || {
        nugetify()
            .arg("migrate")
            .arg(root.join("src/All.sln"))
            .env("NUGETIFY_FEED", root.join("feed"))
            .assert()
            .success();
    };

    run();
    let files = [
        "src/App/App.csproj",
        "src/App/packages.config",
        "src/packages/repositories.config",
    ];
    let first: Vec<String> = files
        .iter()
        .map(|f| fs::read_to_string(root.join(f)).unwrap())
        .collect();

    run();
    let second: Vec<String> = files
        .iter()
        .map(|f| fs::read_to_string(root.join(f)).unwrap())
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_migrate_single_project_with_nuspec_and_unix_paths() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    setup(root);

    nugetify()
        .arg("migrate")
        .arg(root.join("src/App/App.csproj"))
        .arg("--feed")
        .arg(root.join("feed"))
        .arg("--solution-root")
        .arg(root.join("src"))
        .arg("--nuspec")
        .arg("--unix-paths")
        .arg("--report")
        .assert()
        .success()
        .stdout(predicates::str::contains("Dependencies of App:"))
        .stdout(predicates::str::contains("  Newtonsoft.Json"))
        .stdout(predicates::str::contains("  Contoso.Lib"))
        .stdout(predicates::str::contains("1 project(s) processed"));

    let app = fs::read_to_string(root.join("src/App/App.csproj")).unwrap();
    assert!(app.contains("<HintPath>../packages/Newtonsoft.Json/lib/net45/Newtonsoft.Json.dll</HintPath>"));

    let report: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(root.join("src/App/nugetify-report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["failed"], serde_json::json!(["Missing"]));
    assert_eq!(report["resolved"].as_array().unwrap().len(), 2);
}

#[test]
fn test_strict_fails_on_warnings() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    setup(root);

    nugetify()
        .arg("migrate")
        .arg(root.join("src/All.sln"))
        .arg("--feed")
        .arg(root.join("feed"))
        .arg("--strict")
        .assert()
        .failure()
        .stderr(predicates::str::contains("strict mode"));
}

#[test]
fn test_resolve_writes_nothing() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    setup(root);

    nugetify()
        .arg("resolve")
        .arg(root.join("src/All.sln"))
        .arg("--feed")
        .arg(root.join("feed"))
        .assert()
        .success()
        .stdout(predicates::str::contains(
            "  Newtonsoft.Json -> Newtonsoft.Json 6.0.0 (lib/net45/Newtonsoft.Json.dll)",
        ))
        .stdout(predicates::str::contains("  no binary references"))
        .stdout(predicates::str::contains("2 project(s), 2 resolved, 1 unmatched"))
        .stderr(predicates::str::contains("warning: Could not match: Missing"));

    assert_eq!(
        fs::read_to_string(root.join("src/App/App.csproj")).unwrap(),
        APP_CSPROJ
    );
    assert!(!root.join("src/App/packages.config").exists());
    assert!(!root.join("src/packages").exists());
}

#[test]
fn test_missing_feed_argument() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    setup(root);

    nugetify()
        .arg("migrate")
        .arg(root.join("src/All.sln"))
        .assert()
        .failure()
        .stderr(predicates::str::contains("NUGETIFY_FEED"));
}

#[test]
fn test_feed_directory_must_exist() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    setup(root);

    nugetify()
        .arg("migrate")
        .arg(root.join("src/All.sln"))
        .arg("--feed")
        .arg(root.join("no-such-feed"))
        .assert()
        .failure()
        .stderr(predicates::str::contains("does not exist"));

    assert_eq!(
        fs::read_to_string(root.join("src/App/App.csproj")).unwrap(),
        APP_CSPROJ
    );
}
