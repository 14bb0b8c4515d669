// tests/scenarios.rs

//! End-to-end runs with the built-in handlers. Each "run" builds a fresh
//! environment from the same project directory, the way separate process
//! invocations would.

use datamill_test_utils::builders::{ProjectBuilder, TestProject};
use datamill_test_utils::init_tracing;

use std::error::Error;

use serde_json::{Value, json};

use datamill::cache::{compute_file_hash, path_key};
use datamill::types::{Category, DataType, PKG_NAME, TaskSlug};

type TestResult = Result<(), Box<dyn Error>>;

fn compile_render_project() -> Result<TestProject, Box<dyn Error>> {
    init_tracing();
    let project = ProjectBuilder::new()
        .manifest(
            r#"
compiles:
  - name: app
    output_type: json
renders:
  - name: README.md
    dependencies: [compiles-app]
"#,
        )
        .file("configs/app.yaml", "name: demo\nport: 8080\n")
        .file("templates/README.md.j2", "# {{ app.name }}\n\nport={{ app.port }}\n")
        .build()?;
    Ok(project)
}

#[test]
fn compile_feeds_render() -> TestResult {
    let project = compile_render_project()?;
    let mut env = project.environment()?;

    assert!(env.execute_targets(&["renders-README.md".to_string()])?);

    let compiled: Value = serde_json::from_str(&project.read("datamill-out/app.json")?)?;
    assert_eq!(compiled, json!({ "app": { "name": "demo", "port": 8080 } }));

    let readme = project.read("datamill-out/README.md")?;
    assert!(readme.starts_with("<!--\n"), "{readme}");
    assert!(readme.contains(&format!("    generator={PKG_NAME}")));
    assert!(readme.ends_with("-->\n\n# demo\n\nport=8080\n"), "{readme}");

    assert_eq!(
        env.task_data().get(Category::Renders, "README.md"),
        Some(&json!({ "README_md": "# demo\n\nport=8080" }))
    );
    Ok(())
}

#[test]
fn second_run_is_satisfied() -> TestResult {
    let project = compile_render_project()?;

    let mut first = project.environment()?;
    assert!(first.manifest_changed());
    assert_eq!(first.execute("renders-README.md", true)?.outcome(), (true, true));
    drop(first);

    let mut second = project.environment()?;
    assert!(!second.manifest_changed());
    assert_eq!(second.execute("renders-README.md", true)?.outcome(), (true, false));
    assert_eq!(second.resolution(&TaskSlug::new(Category::Compiles, "app")), Some(false));
    Ok(())
}

#[test]
fn config_change_propagates_to_dependents() -> TestResult {
    let project = compile_render_project()?;
    project.environment()?.execute("renders-README.md", true)?;

    project.write("configs/app.yaml", "name: changed\nport: 8080\n")?;

    let mut env = project.environment()?;
    assert_eq!(env.execute("renders-README.md", true)?.outcome(), (true, true));
    assert!(project.read("datamill-out/README.md")?.contains("# changed"));
    Ok(())
}

#[test]
fn template_change_reruns_only_the_render() -> TestResult {
    let project = compile_render_project()?;
    project.environment()?.execute("renders-README.md", true)?;

    project.write("templates/README.md.j2", "# {{ app.name }}!\n")?;

    let mut env = project.environment()?;
    assert_eq!(env.execute("renders-README.md", true)?.outcome(), (true, true));
    assert_eq!(env.resolution(&TaskSlug::new(Category::Compiles, "app")), Some(false));
    assert!(project.read("datamill-out/README.md")?.ends_with("# demo!\n"));
    Ok(())
}

#[test]
fn deleted_output_is_regenerated() -> TestResult {
    let project = compile_render_project()?;
    project.environment()?.execute("renders-README.md", true)?;

    project.remove("datamill-out/README.md")?;

    let mut env = project.environment()?;
    assert_eq!(env.execute("renders-README.md", true)?.outcome(), (true, true));
    assert!(project.output("README.md").is_file());
    Ok(())
}

#[test]
fn manifest_change_reruns_everything() -> TestResult {
    let project = compile_render_project()?;
    project.environment()?.execute("renders-README.md", true)?;

    let manifest = project.read("manifest.yaml")?;
    project.write("manifest.yaml", &format!("{manifest}\n# touched\n"))?;

    let mut env = project.environment()?;
    assert!(env.manifest_changed());
    assert_eq!(env.execute("compiles-app", true)?.outcome(), (true, true));
    Ok(())
}

#[test]
fn clean_forgets_previous_runs() -> TestResult {
    let project = compile_render_project()?;
    project.environment()?.execute("renders-README.md", true)?;

    let mut env = project.environment()?;
    env.clean()?;
    assert!(env.task_data().get(Category::Compiles, "app").is_none());
    assert!(!project.join(".manifest_cache/hashes.json").exists());
    assert!(!project.join(".manifest_cache/task_data").exists());

    assert_eq!(env.execute("renders-README.md", true)?.outcome(), (true, true));
    Ok(())
}

#[test]
fn restore_keeps_observations_in_the_aggregate() -> TestResult {
    let project = compile_render_project()?;
    let mut env = project.environment()?;
    assert!(env.execute("compiles-app", false)?.success);

    let key = path_key(&project.join("configs/app.yaml"));
    assert!(env.cache().data().hashes["configs"].contains_key(&key));

    env.restore_cache();
    assert!(!env.cache().data().hashes.contains_key("configs"));
    assert!(env.aggregate_cache().data().hashes["configs"].contains_key(&key));
    Ok(())
}

#[test]
fn render_without_dependencies_uses_config_data() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .manifest(
            r#"
renders:
  - name: page.txt
  - name: greet-{who}
    key: greet
"#,
        )
        .file("configs/app.yaml", "name: demo\n")
        .file("templates/page.j2", "{{ app.name }} / {{ global.app.name }}\n")
        .file("templates/greet.j2", "Hello {{ who }} from {{ app.name }}\n")
        .build()?;

    let mut env = project.environment()?;
    assert!(env.execute("renders-page.txt", true)?.success);
    // No header for unknown extensions.
    assert_eq!(project.read("datamill-out/page.txt")?, "demo / demo\n");

    assert!(env.execute("renders-greet-bob", true)?.success);
    assert_eq!(project.read("datamill-out/greet-bob")?, "Hello bob from demo\n");
    Ok(())
}

#[test]
fn render_children_are_joined() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .manifest(
            r#"
renders:
  - name: item_a
    no_file: true
  - name: item_b
    no_file: true
    indent: 2
  - name: list.yaml
    children: [renders-item_a, renders-item_b]
    child_delimiter: "\n"
"#,
        )
        .file("templates/item_a.j2", "- a\n")
        .file("templates/item_b.j2", "- b\n")
        .file("templates/list.yaml.j2", "items:\n{{ __children }}\n")
        .build()?;

    let mut env = project.environment()?;
    assert!(env.execute("renders-list.yaml", true)?.success);

    assert!(!project.output("item_a").exists());
    let list = project.read("datamill-out/list.yaml")?;
    assert!(list.starts_with("# ="), "{list}");
    assert!(list.ends_with("items:\n- a\n  - b\n"), "{list}");
    Ok(())
}

#[test]
fn render_with_missing_template_fails() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .manifest("renders:\n  - name: nothing.md\n")
        .file("templates/other.j2", "x\n")
        .build()?;

    let mut env = project.environment()?;
    assert!(!env.execute("renders-nothing.md", true)?.success);
    Ok(())
}

#[test]
fn compile_options_select_and_write_data() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .manifest(
            r#"
compiles:
  - name: port
    output_type: json
    index_path: app.server
  - name: only
    key: app
    output_path: picked.toml
    output_type: toml
  - name: extra
    dependencies: [port]
    overrides:
      app: { name: overridden }
"#,
        )
        .file("configs/app.yaml", "name: demo\nserver:\n  port: 8080\n")
        .build()?;

    let mut env = project.environment()?;
    let targets: Vec<String> = ["port", "only", "extra"].iter().map(|s| s.to_string()).collect();
    assert!(env.execute_targets(&targets)?);

    let port: Value = serde_json::from_str(&project.read("datamill-out/port.json")?)?;
    assert_eq!(port, json!({ "port": 8080 }));

    let only = project.read("datamill-out/picked.toml")?;
    assert!(only.contains("name = \"demo\""), "{only}");
    assert!(!only.contains("[app]"), "{only}");

    // Dependency data is layered over the configs, then overrides on top.
    assert_eq!(
        env.task_data().get(Category::Compiles, "extra"),
        Some(&json!({ "app": { "name": "overridden", "server": { "port": 8080 } }, "port": 8080 }))
    );
    Ok(())
}

#[test]
fn variables_render_into_configs() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .manifest("compiles:\n  - name: app\n")
        .file("variables/app.yaml", "who: world\n")
        .file("configs/app.yaml", "greeting: \"hello {{ who }}\"\n")
        .build()?;

    let mut env = project.environment()?;
    assert!(env.execute("app", true)?.success);
    assert_eq!(project.read("datamill-out/app.yaml")?, "app:\n  greeting: hello world\n");
    Ok(())
}

#[test]
fn schema_violations_fail_and_invalidate_the_namespace() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .manifest("compiles:\n  - name: app\n")
        .file("configs/app.yaml", "name: 3\n")
        .file("schemas/app.yaml", "app:\n  name: { type: string }\n")
        .build()?;

    let mut env = project.environment()?;
    assert!(!env.execute("app", true)?.success);
    assert!(!env.is_valid());
    assert!(!project.output("app.yaml").exists());
    Ok(())
}

#[test]
fn extra_directories_get_a_private_namespace() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .manifest(
            r#"
compiles:
  - name: base
  - name: extended
    configs: [extra]
"#,
        )
        .file("configs/app.yaml", "name: demo\n")
        .file("extra/more.yaml", "x: 1\n")
        .build()?;

    let mut env = project.environment()?;
    assert!(env.execute_targets(&["base".to_string(), "extended".to_string()])?);

    assert_eq!(env.namespace_names(), vec!["__root__", "compiles-extended"]);
    let root = env.namespace("__root__").ok_or("no root")?;
    assert!(root.data(DataType::Config).is_some_and(|d| !d.contains_key("more")));
    let private = env.namespace("compiles-extended").ok_or("no private namespace")?;
    assert_eq!(private.dirs(DataType::Config).len(), 2);

    assert_eq!(project.read("datamill-out/base.yaml")?, "app:\n  name: demo\n");
    assert_eq!(
        project.read("datamill-out/extended.yaml")?,
        "app:\n  name: demo\nmore:\n  x: 1\n"
    );

    let mut again = project.environment()?;
    assert_eq!(again.execute("extended", true)?.outcome(), (true, false));
    Ok(())
}

fn private_namespace_project() -> Result<TestProject, Box<dyn Error>> {
    init_tracing();
    let project = ProjectBuilder::new()
        .manifest(
            r#"
compiles:
  - name: base
  - name: extended
    configs: [extra]
  - name: other
"#,
        )
        .file("configs/app.yaml", "name: demo\n")
        .file("extra/more.yaml", "x: 1\n")
        .build()?;

    let targets: Vec<String> = ["base", "extended", "other"].map(String::from).to_vec();
    assert!(project.environment()?.execute_targets(&targets)?);
    Ok(project)
}

#[test]
fn private_loads_do_not_make_root_siblings_stale() -> TestResult {
    let project = private_namespace_project()?;
    project.write("extra/more.yaml", "x: 2\n")?;

    let mut env = project.environment()?;
    assert_eq!(env.execute("extended", true)?.outcome(), (true, true));
    assert_eq!(env.execute("base", true)?.outcome(), (true, false));
    assert_eq!(env.execute("other", true)?.outcome(), (true, false));

    // The new hash of the private file still reaches the aggregate.
    let extra = project.join("extra/more.yaml");
    let record = env.aggregate_cache().data().hashes["configs"]
        .get(&path_key(&extra))
        .ok_or("no record for the private file")?;
    assert_eq!(record.hash, compute_file_hash(&extra)?);

    let mut next = project.environment()?;
    assert_eq!(next.execute("extended", true)?.outcome(), (true, false));
    assert_eq!(next.execute("base", true)?.outcome(), (true, false));
    Ok(())
}

#[test]
fn root_changes_still_reach_tasks_after_a_private_one() -> TestResult {
    let project = private_namespace_project()?;
    project.write("configs/app.yaml", "name: changed\n")?;

    let mut env = project.environment()?;
    assert_eq!(env.execute("base", true)?.outcome(), (true, true));
    assert_eq!(env.execute("extended", true)?.outcome(), (true, true));
    assert_eq!(env.execute("other", true)?.outcome(), (true, true));
    assert!(project.read("datamill-out/other.yaml")?.contains("name: changed"));
    Ok(())
}

#[test]
fn pattern_commands_run_once_and_store_output() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .manifest(
            r#"
commands:
  - name: echo-{word}
    command: echo
    arguments: ["{word}", 42]
  - name: always
    command: echo
    force: true
  - name: broken
    command: "false"
"#,
        )
        .build()?;

    let mut env = project.environment()?;
    assert_eq!(env.execute("commands-echo-hello", true)?.outcome(), (true, true));
    assert_eq!(
        env.task_data().get(Category::Commands, "echo-hello"),
        Some(&json!({
            "echo-hello": {
                "args": ["echo", "hello", "42"],
                "stdout": "hello 42\n",
                "stderr": "",
                "returncode": 0,
            }
        }))
    );

    assert!(!env.execute("commands-broken", true)?.success);
    assert!(env.task_data().get(Category::Commands, "broken").is_none());

    let mut again = project.environment()?;
    assert_eq!(again.execute("commands-echo-hello", true)?.outcome(), (true, false));
    assert_eq!(again.execute("commands-echo-world", true)?.outcome(), (true, true));
    assert_eq!(again.execute("commands-always", true)?.outcome(), (true, true));
    Ok(())
}

#[test]
fn command_output_file_must_exist() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .manifest(
            "commands:\n  - name: touch\n    command: touch\n    arguments: [datamill-out/stamp]\n    file: stamp\n",
        )
        .build()?;

    assert_eq!(project.environment()?.execute("commands-touch", true)?.outcome(), (true, true));
    assert!(project.output("stamp").is_file());
    assert_eq!(project.environment()?.execute("commands-touch", true)?.outcome(), (true, false));

    project.remove("datamill-out/stamp")?;
    assert_eq!(project.environment()?.execute("commands-touch", true)?.outcome(), (true, true));
    Ok(())
}
