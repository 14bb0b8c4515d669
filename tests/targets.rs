// tests/targets.rs

use datamill_test_utils::init_tracing;

use std::error::Error;

use serde_json::{Value, json};

use datamill::errors::DatamillError;
use datamill::targets::{TargetPattern, TargetResolver, is_literal, resolve_dep_data, substitute};
use datamill::types::Category;
use datamill::value::Data;

type TestResult = Result<(), Box<dyn Error>>;

fn as_map(value: Value) -> Data {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a map, got {other}"),
    }
}

fn resolver_with(category: Category, targets: Value) -> Result<TargetResolver, DatamillError> {
    let mut resolver = TargetResolver::new();
    let list = match targets {
        Value::Array(items) => items,
        other => vec![other],
    };
    resolver.register_group(category, &list)?;
    Ok(resolver)
}

#[test]
fn literal_names_are_detected() {
    assert!(is_literal("app"));
    assert!(is_literal("index.md"));
    assert!(!is_literal("echo-{word}"));
    assert!(!is_literal("build-{board.name}"));
    // Braces around something that is not a key stay literal.
    assert!(is_literal("weird-{not a key}"));
    assert!(is_literal("{}"));
}

#[test]
fn literal_target_is_returned_directly() -> TestResult {
    init_tracing();

    let mut resolver = resolver_with(
        Category::Compiles,
        json!([{ "name": "app", "output_type": "json" }]),
    )?;

    let target = resolver.resolve(Category::Compiles, "app")?.ok_or("missing")?;
    assert_eq!(target.get("output_type"), Some(&json!("json")));
    assert!(target.get("overrides").is_none());

    // Other categories are separate tables.
    assert!(resolver.resolve(Category::Renders, "app")?.is_none());
    Ok(())
}

#[test]
fn pattern_match_materializes_and_memoizes() -> TestResult {
    init_tracing();

    let mut resolver = resolver_with(
        Category::Commands,
        json!([{
            "name": "echo-{word}",
            "command": "echo",
            "arguments": ["{word}", "literal"],
        }]),
    )?;
    assert!(resolver.literal_names(Category::Commands).is_empty());

    let target = resolver.resolve(Category::Commands, "echo-hello")?.ok_or("missing")?;
    assert_eq!(target.get("name"), Some(&json!("echo-hello")));
    assert_eq!(target.get("arguments"), Some(&json!(["hello", "literal"])));
    assert_eq!(target.get("overrides"), Some(&json!({ "word": "hello" })));

    assert_eq!(resolver.literal_names(Category::Commands), vec!["echo-hello".to_string()]);

    // Second lookup hits the literal table and returns the same thing.
    let again = resolver.resolve(Category::Commands, "echo-hello")?.ok_or("missing")?;
    assert_eq!(again, target);
    Ok(())
}

#[test]
fn dotted_keys_unflatten_into_overrides() -> TestResult {
    let mut resolver = resolver_with(
        Category::Compiles,
        json!({ "name": "board-{board.name}-{board.rev}", "title": "{board.name} rev {board.rev}" }),
    )?;

    let target = resolver.resolve(Category::Compiles, "board-alpha-3")?.ok_or("missing")?;
    assert_eq!(target.get("title"), Some(&json!("alpha rev 3")));
    assert_eq!(
        target.get("overrides"),
        Some(&json!({ "board": { "name": "alpha", "rev": "3" } }))
    );
    Ok(())
}

#[test]
fn existing_overrides_are_kept_and_extended() -> TestResult {
    let mut resolver = resolver_with(
        Category::Renders,
        json!({ "name": "page-{id}", "overrides": { "theme": "dark", "id": "default" } }),
    )?;

    let target = resolver.resolve(Category::Renders, "page-7")?.ok_or("missing")?;
    assert_eq!(target.get("overrides"), Some(&json!({ "theme": "dark", "id": "7" })));
    Ok(())
}

#[test]
fn no_matching_pattern_is_not_found() -> TestResult {
    let mut resolver = resolver_with(Category::Commands, json!({ "name": "echo-{word}" }))?;

    assert!(resolver.resolve(Category::Commands, "print-hello")?.is_none());
    // The placeholder must capture at least one character.
    assert!(resolver.resolve(Category::Commands, "echo-")?.is_none());
    Ok(())
}

#[test]
fn required_targets_report_what_is_missing() -> TestResult {
    let mut resolver = resolver_with(Category::Commands, json!({ "name": "echo-{word}" }))?;

    assert!(resolver.require(Category::Commands, "echo-hi").is_ok());
    match resolver.require(Category::Commands, "print-hello") {
        Err(DatamillError::TargetNotFound(slug)) => assert_eq!(slug, "commands-print-hello"),
        other => panic!("expected TargetNotFound, got {other:?}"),
    }
    Ok(())
}

#[test]
fn ambiguous_patterns_are_an_error() -> TestResult {
    init_tracing();

    let mut resolver = resolver_with(
        Category::Compiles,
        json!([{ "name": "a-{x}" }, { "name": "{y}-b" }]),
    )?;

    match resolver.resolve(Category::Compiles, "a-b") {
        Err(DatamillError::AmbiguousTarget { name, patterns }) => {
            assert_eq!(name, "a-b");
            assert_eq!(patterns.len(), 2);
        }
        other => panic!("expected AmbiguousTarget, got {other:?}"),
    }

    // The lenient lookup logs and reports not found.
    assert!(resolver.get_target(Category::Compiles, "a-b").is_none());

    // Unambiguous names still resolve.
    assert!(resolver.get_target(Category::Compiles, "a-c").is_some());
    Ok(())
}

#[test]
fn literal_wins_over_patterns() -> TestResult {
    let mut resolver = resolver_with(
        Category::Compiles,
        json!([{ "name": "a-{x}" }, { "name": "{y}-b" }, { "name": "a-b", "literal": true }]),
    )?;

    let target = resolver.resolve(Category::Compiles, "a-b")?.ok_or("missing")?;
    assert_eq!(target.get("literal"), Some(&json!(true)));
    Ok(())
}

#[test]
fn targets_without_name_are_rejected() {
    let mut resolver = TargetResolver::new();
    let result = resolver.register_group(Category::Compiles, &[json!({ "output_type": "json" })]);

    assert!(matches!(result, Err(DatamillError::ManifestError(_))));
}

#[test]
fn repeated_key_must_capture_the_same_text() -> TestResult {
    let pattern = TargetPattern::compile("{x}-to-{x}")?;
    assert_eq!(pattern.keys(), ["x".to_string(), "x".to_string()]);

    assert!(pattern.matches("a-to-a").is_some());
    assert!(pattern.matches("a-to-b").is_none());
    Ok(())
}

#[test]
fn literal_names_do_not_compile_as_patterns() {
    assert!(TargetPattern::compile("plain").is_err());
}

#[test]
fn substitution_recurses_and_leaves_unknown_keys() {
    let subs = as_map(json!({ "word": "hi", "a.b": "deep" }));
    let value = json!({
        "list": ["{word}", { "nested": "{a.b}!" }],
        "unknown": "{missing} {word}",
        "number": 3,
    });

    let out = substitute(&value, &subs);
    assert_eq!(
        out,
        json!({
            "list": ["hi", { "nested": "deep!" }],
            "unknown": "{missing} hi",
            "number": 3,
        })
    );
}

#[test]
fn overrides_are_applied_on_top_of_dependency_data() -> TestResult {
    let target = as_map(json!({ "name": "x", "overrides": { "app": { "port": 9 } } }));
    let data = as_map(json!({ "app": { "port": 1, "host": "h" } }));

    let out = resolve_dep_data(&target, data)?;
    assert_eq!(Value::Object(out), json!({ "app": { "port": 9, "host": "h" } }));

    let plain = as_map(json!({ "name": "y" }));
    let untouched = resolve_dep_data(&plain, as_map(json!({ "k": 1 })))?;
    assert_eq!(Value::Object(untouched), json!({ "k": 1 }));
    Ok(())
}
