// tests/manifest.rs

use datamill_test_utils::builders::ProjectBuilder;
use datamill_test_utils::init_tracing;

use std::error::Error;

use serde_json::json;

use datamill::config::{load_and_validate, load_from_path};
use datamill::errors::DatamillError;
use datamill::types::{Category, DataType};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn default_directories_are_picked_up_when_present() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .manifest("compiles:\n  - name: app\n")
        .file("configs/app.yaml", "name: demo\n")
        .file("templates/page.j2", "hi\n")
        .build()?;

    let manifest = load_and_validate(project.manifest_path())?;

    assert_eq!(manifest.dir, project.path());
    assert_eq!(manifest.files, vec![project.manifest_path()]);
    assert_eq!(
        manifest.dirs,
        vec![
            (DataType::Config, project.join("configs")),
            (DataType::Template, project.join("templates")),
        ]
    );
    assert_eq!(manifest.output_dir(), project.join("datamill-out"));
    assert_eq!(manifest.cache_dir(), project.join(".manifest_cache"));
    assert_eq!(manifest.default_target().as_deref(), Some("app"));
    Ok(())
}

#[test]
fn default_directories_can_be_disabled() -> TestResult {
    let project = ProjectBuilder::new()
        .manifest("default_dirs: false\ncompiles:\n  - name: app\n")
        .file("configs/app.yaml", "name: demo\n")
        .build()?;

    let manifest = load_and_validate(project.manifest_path())?;
    assert!(manifest.dirs.is_empty());
    Ok(())
}

#[test]
fn explicit_directory_lists_replace_defaults() -> TestResult {
    let project = ProjectBuilder::new()
        .manifest("configs: [data/one, data/two]\noutput_dir: build\ncache_dir: .state\n")
        .file("configs/ignored.yaml", "x: 1\n")
        .file("data/one/a.yaml", "a: 1\n")
        .file("data/two/b.yaml", "b: 1\n")
        .build()?;

    let manifest = load_and_validate(project.manifest_path())?;
    assert_eq!(
        manifest.dirs,
        vec![
            (DataType::Config, project.join("data/one")),
            (DataType::Config, project.join("data/two")),
        ]
    );
    assert_eq!(manifest.output_dir(), project.join("build"));
    assert_eq!(manifest.cache_dir(), project.join(".state"));
    Ok(())
}

#[test]
fn includes_merge_targets_and_resolve_their_own_paths() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .manifest(
            r#"
includes: [sub/more.yaml]
default_target: groups-all
compiles:
  - name: app
groups:
  - name: all
    dependencies: [compiles-app, compiles-extra]
"#,
        )
        .file(
            "sub/more.yaml",
            r#"
configs: [data]
compiles:
  - name: extra
    configs: [local]
"#,
        )
        .file("sub/data/x.yaml", "x: 1\n")
        .file("sub/local/y.yaml", "y: 1\n")
        .build()?;

    let manifest = load_and_validate(project.manifest_path())?;

    assert_eq!(manifest.files, vec![project.manifest_path(), project.join("sub/more.yaml")]);
    let names: Vec<_> = manifest
        .data
        .targets(Category::Compiles)
        .iter()
        .filter_map(|t| t.get("name"))
        .cloned()
        .collect();
    assert_eq!(names, vec![json!("app"), json!("extra")]);

    assert!(manifest.dirs.contains(&(DataType::Config, project.join("sub/data"))));

    let extra = &manifest.data.targets(Category::Compiles)[1];
    let local = project.join("sub/local").to_string_lossy().into_owned();
    assert_eq!(extra.get("configs"), Some(&json!([local])));

    assert_eq!(manifest.default_target().as_deref(), Some("groups-all"));
    Ok(())
}

#[test]
fn params_render_into_the_manifest() -> TestResult {
    let project = ProjectBuilder::new()
        .manifest(
            r#"
params:
  project: demo
compiles:
  - name: "{{ project }}-app"
    output_type: json
"#,
        )
        .build()?;

    let manifest = load_and_validate(project.manifest_path())?;
    assert_eq!(
        manifest.data.targets(Category::Compiles)[0].get("name"),
        Some(&json!("demo-app"))
    );
    assert_eq!(manifest.data.params.get("project"), Some(&json!("demo")));
    Ok(())
}

#[test]
fn json_and_toml_manifests_are_supported() -> TestResult {
    let json_project = ProjectBuilder::new()
        .manifest_named("build.json", r#"{ "compiles": [{ "name": "app" }] }"#)
        .build()?;
    let manifest = load_and_validate(json_project.manifest_path())?;
    assert_eq!(manifest.default_target().as_deref(), Some("app"));
    assert_eq!(manifest.cache_dir(), json_project.join(".build_cache"));

    let toml_project = ProjectBuilder::new()
        .manifest_named("build.toml", "[[compiles]]\nname = \"app\"\n")
        .build()?;
    let manifest = load_and_validate(toml_project.manifest_path())?;
    assert_eq!(manifest.default_target().as_deref(), Some("app"));
    Ok(())
}

#[test]
fn including_a_manifest_twice_is_an_error() -> TestResult {
    let project = ProjectBuilder::new()
        .manifest("includes: [a.yaml, a.yaml]\n")
        .file("a.yaml", "compiles: []\n")
        .build()?;

    match load_from_path(project.manifest_path()) {
        Err(DatamillError::ManifestError(msg)) => assert!(msg.contains("more than once"), "{msg}"),
        Err(e) => panic!("Expected ManifestError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
    Ok(())
}

#[test]
fn static_dependency_cycles_are_rejected() -> TestResult {
    let project = ProjectBuilder::new()
        .manifest(
            r#"
compiles:
  - name: a
    dependencies: [compiles-b]
  - name: b
    dependencies: [a]
"#,
        )
        .build()?;

    match load_and_validate(project.manifest_path()) {
        Err(DatamillError::CyclicDependency(msg)) => {
            assert!(msg.contains("compiles-a") || msg.contains("compiles-b"), "{msg}");
        }
        Err(e) => panic!("Expected CyclicDependency, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }

    // Loading without validation still works.
    assert!(load_from_path(project.manifest_path()).is_ok());
    Ok(())
}

#[test]
fn malformed_targets_are_rejected() -> TestResult {
    let no_name = ProjectBuilder::new()
        .manifest("renders:\n  - key: page\n")
        .build()?;
    assert!(matches!(
        load_and_validate(no_name.manifest_path()),
        Err(DatamillError::ManifestError(_))
    ));

    let bad_deps = ProjectBuilder::new()
        .manifest("compiles:\n  - name: a\n    dependencies: compiles-b\n")
        .build()?;
    match load_and_validate(bad_deps.manifest_path()) {
        Err(DatamillError::ManifestError(msg)) => assert!(msg.contains("dependencies"), "{msg}"),
        Err(e) => panic!("Expected ManifestError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
    Ok(())
}

#[test]
fn missing_manifest_is_an_error() {
    let result = load_and_validate("/definitely/not/here/manifest.yaml");
    assert!(result.is_err());
}
