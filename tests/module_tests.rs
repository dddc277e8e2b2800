//! Multi-module programs: import resolution, ordering and link errors.

mod test_harness;

use abra::{MapResolver, RunResult, Toolchain, TypecheckResult, Value};
use test_harness::TestHarness;

#[test]
fn test_imports_run_dependencies_first() {
    let harness = TestHarness::new();
    harness.assert_typechecks("imports.abra");

    let run = harness.run("imports.abra");
    assert_eq!(run.value(), &Value::Int(30));
    assert_eq!(run.output, vec!["shapes loaded", "main running"]);
}

#[test]
fn test_missing_export_is_an_unresolved_import() {
    let harness = TestHarness::new();
    let result = harness.typecheck("errors/missing_export.abra");
    let TypecheckResult::Failure { error_message, error } = &result else {
        panic!("expected a failure, got {result:?}");
    };
    assert!(error_message.contains("cube"), "{error_message}");
    assert_eq!(error.range.map(|r| r.start.0), Some(1));
}

#[test]
fn test_cyclic_imports_are_rejected() {
    let result = TestHarness::new().typecheck("cyclic.abra");
    let TypecheckResult::Failure { error_message, .. } = &result else {
        panic!("expected a failure, got {result:?}");
    };
    assert!(error_message.contains("Cyclic import"), "{error_message}");
}

#[test]
fn test_unknown_module_without_resolver() {
    let result = abra::typecheck("import x from \"./nowhere\"\nx", None);
    let TypecheckResult::Failure { error_message, error } = &result else {
        panic!("expected a failure, got {result:?}");
    };
    assert!(error_message.contains("./nowhere"), "{error_message}");
    assert!(error.range.is_some());
}

#[test]
fn test_errors_in_imported_modules_name_the_module() {
    let resolver = MapResolver::new().with_module("./broken", "export val x: Int = \"text\"");
    let result = Toolchain::global().typecheck("import x from \"./broken\"\nx", Some(&resolver));
    let TypecheckResult::Failure { error_message, .. } = &result else {
        panic!("expected a failure, got {result:?}");
    };
    assert!(error_message.contains("./broken"), "{error_message}");
}

#[test]
fn test_shared_dependency_initializes_once() {
    let resolver: MapResolver = [
        ("./log", "println(\"log\")\nexport val level = 1"),
        ("./a", "import level from \"./log\"\nexport val a = level + 1"),
        ("./b", "import level from \"./log\"\nexport val b = level + 2"),
    ]
    .into_iter()
    .collect();

    let mut output = Vec::new();
    let result = Toolchain::global().run_with_output(
        "import a from \"./a\"\nimport b from \"./b\"\na * b",
        Some(&resolver),
        &mut |line| output.push(line.to_string()),
    );
    assert_eq!(result, RunResult::Success { data: Value::Int(6) });
    assert_eq!(output, vec!["log"]);
}

#[test]
fn test_exported_functions_keep_their_defaults() {
    let resolver = MapResolver::new().with_module(
        "./greet",
        "export func greet(name: String, punct = \"!\"): String = \"hi \" + name + punct",
    );
    let result = Toolchain::global().run_with_output(
        "import greet from \"./greet\"\ngreet(\"a\") + greet(\"b\", \"?\")",
        Some(&resolver),
        &mut |_| {},
    );
    assert_eq!(result, RunResult::Success { data: Value::string("hi a!hi b?") });
}
