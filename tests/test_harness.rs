//! Shared helpers for the script-driven integration tests.
//!
//! Scripts live in `test_scripts/`. Imports such as `"./math"` resolve to
//! `test_scripts/modules/math.abra`.
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use abra::{ModuleResolver, RunResult, Toolchain, TypecheckResult, Value};

/// Resolves imports from `test_scripts/modules`.
pub struct ScriptResolver {
    dir: PathBuf,
}

impl ModuleResolver for ScriptResolver {
    fn read_module(&self, name: &str) -> Option<String> {
        let file = name.strip_prefix("./").unwrap_or(name);
        fs::read_to_string(self.dir.join(format!("{file}.abra"))).ok()
    }
}

/// The outcome of running a script: its result plus everything it printed.
pub struct ScriptRun {
    pub result: RunResult,
    pub output: Vec<String>,
}

impl ScriptRun {
    /// The final value, panicking with the error message on failure.
    pub fn value(&self) -> &Value {
        match &self.result {
            RunResult::Success { data } => data,
            RunResult::Failure { error_message } => {
                panic!("script failed: {error_message}\noutput: {:?}", self.output)
            }
        }
    }

    pub fn error_message(&self) -> &str {
        match &self.result {
            RunResult::Failure { error_message } => error_message,
            RunResult::Success { data } => panic!("expected a failure, got {data}"),
        }
    }
}

pub struct TestHarness {
    scripts_dir: PathBuf,
    resolver: ScriptResolver,
}

impl TestHarness {
    pub fn new() -> Self {
        let scripts_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_scripts");
        let resolver = ScriptResolver {
            dir: scripts_dir.join("modules"),
        };
        Self {
            scripts_dir,
            resolver,
        }
    }

    pub fn resolver(&self) -> &dyn ModuleResolver {
        &self.resolver
    }

    pub fn load(&self, filename: &str) -> String {
        let path = self.scripts_dir.join(filename);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
    }

    pub fn typecheck(&self, filename: &str) -> TypecheckResult {
        Toolchain::global().typecheck(&self.load(filename), Some(self.resolver()))
    }

    /// Type check a script that must be well formed.
    pub fn assert_typechecks(&self, filename: &str) {
        if let TypecheckResult::Failure {
            error_message,
            error,
        } = self.typecheck(filename)
        {
            panic!("{filename} should typecheck: {error_message} at {:?}", error.range);
        }
    }

    pub fn run(&self, filename: &str) -> ScriptRun {
        self.run_source(&self.load(filename))
    }

    pub fn run_source(&self, source: &str) -> ScriptRun {
        let mut output = Vec::new();
        let result = Toolchain::global().run_with_output(source, Some(self.resolver()), &mut |line| {
            output.push(line.to_string())
        });
        ScriptRun { result, output }
    }
}
