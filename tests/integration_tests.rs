//! Integration tests running complete Abra programs through the toolchain.

mod test_harness;

use abra::{DisassembleResult, RunResult, TypecheckResult, Value, disassemble, typecheck};
use test_harness::TestHarness;

// =============================================================================
// Programs
// =============================================================================

#[test]
fn test_fibonacci() {
    let harness = TestHarness::new();
    harness.assert_typechecks("fibonacci.abra");

    let run = harness.run("fibonacci.abra");
    assert_eq!(run.value(), &Value::Int(832_040));
    assert_eq!(run.output, vec!["fib(12) = 144"]);
}

#[test]
fn test_fizzbuzz() {
    let run = TestHarness::new().run("fizzbuzz.abra");
    assert_eq!(run.value(), &Value::Int(15));
    assert_eq!(run.output.len(), 15);
    assert_eq!(run.output[2], "Fizz");
    assert_eq!(run.output[4], "Buzz");
    assert_eq!(run.output[14], "FizzBuzz");
    assert_eq!(run.output[6], "7");
}

#[test]
fn test_types_and_methods() {
    let run = TestHarness::new().run("greeting.abra");
    assert_eq!(run.value(), &Value::Int(1));
    assert_eq!(
        run.output,
        vec!["Hello, Ann!", "Hello, Bo!", "Hi, Ann!", "nobody"]
    );
}

#[test]
fn test_enums() {
    let run = TestHarness::new().run("enums.abra");
    assert_eq!(run.value(), &Value::Int(3));
    assert_eq!(
        run.output,
        vec![
            "0: Shape.Dot",
            "1: Shape.Circle(radius: 1.5)",
            "2: Shape.Rect(width: 2.0, height: 3.0)",
        ]
    );
}

#[test]
fn test_closures() {
    let run = TestHarness::new().run("closures.abra");
    assert_eq!(run.value(), &Value::Int(55));
    assert_eq!(run.output, vec!["a = 3, b = 102"]);
}

#[test]
fn test_optionals() {
    let run = TestHarness::new().run("optionals.abra");
    assert_eq!(run.value().to_string(), "[247, -1, 90]");
}

// =============================================================================
// Diagnostics
// =============================================================================

fn failure_line(result: TypecheckResult) -> u32 {
    match result {
        TypecheckResult::Failure { error, .. } => {
            error.range.expect("typecheck failures carry a range").start.0
        }
        TypecheckResult::Success => panic!("expected a typecheck failure"),
    }
}

#[test]
fn test_reassigning_a_val_fails_on_its_line() {
    let harness = TestHarness::new();
    assert_eq!(failure_line(harness.typecheck("errors/mutability.abra")), 2);

    // The same program never reaches the VM.
    let run = harness.run("errors/mutability.abra");
    assert!(!run.result.is_success());
    assert!(run.output.is_empty());
}

#[test]
fn test_type_mismatch_is_reported() {
    let result = TestHarness::new().typecheck("errors/type_mismatch.abra");
    let TypecheckResult::Failure { error_message, error } = &result else {
        panic!("expected a failure, got {result:?}");
    };
    assert!(!error_message.is_empty());
    assert_eq!(error.range.map(|r| r.start.0), Some(2));
}

#[test]
fn test_syntax_errors_have_a_range() {
    let result = typecheck("val = 3", None);
    let TypecheckResult::Failure { error, .. } = result else {
        panic!("expected a failure");
    };
    assert_eq!(error.range.map(|r| r.start.0), Some(1));
}

#[test]
fn test_typecheck_is_deterministic() {
    let harness = TestHarness::new();
    for script in ["greeting.abra", "errors/type_mismatch.abra"] {
        assert_eq!(harness.typecheck(script), harness.typecheck(script));
    }
}

#[test]
fn test_runtime_errors_surface_as_failures() {
    let run = TestHarness::new().run("errors/division.abra");
    assert!(run.error_message().contains("division by zero"));
}

#[test]
fn test_stack_overflow_is_reported() {
    let run = TestHarness::new().run_source("func forever(n: Int): Int = forever(n + 1)\nforever(0)");
    assert!(run.error_message().contains("stack overflow"));
}

// =============================================================================
// Disassembly
// =============================================================================

#[test]
fn test_disassemble_lists_functions() {
    let source = TestHarness::new().load("fibonacci.abra");
    let DisassembleResult::Success { disassembled } = disassemble(&source) else {
        panic!("fibonacci.abra should compile");
    };
    assert!(disassembled.starts_with("== module ./main =="));
    assert!(disassembled.contains("fib"));
    assert!(disassembled.contains("fibIter"));
}

#[test]
fn test_disassemble_rejects_invalid_programs() {
    assert_eq!(disassemble("1 +"), DisassembleResult::Failure);
    assert_eq!(disassemble("val a = 1\na = 2"), DisassembleResult::Failure);
}

#[test]
fn test_global_run_entry_point() {
    assert_eq!(
        abra::run("[1, 2, 3][10] ?: -1", None),
        RunResult::Success { data: Value::Int(-1) }
    );
}
