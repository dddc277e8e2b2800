//! Abra
//!
//! A small statically typed scripting language: source goes through the
//! lexer and parser (`abra-parser`), the type checker and bytecode compiler
//! (`abra-compiler`) and runs on a stack virtual machine (`abra-vm`).
//!
//! Every entry point returns a tagged result instead of panicking or
//! surfacing a stage-specific error type:
//!
//! ```
//! use abra::{RunResult, Value};
//!
//! let result = abra::run("val x = [1, 2, 3]\nx[1] ?: 0", None);
//! assert_eq!(result, RunResult::Success { data: Value::Int(2) });
//! ```
//!
//! Imported modules are supplied by a [`ModuleResolver`]; [`MapResolver`]
//! serves them from memory and any `Fn(&str) -> Option<String>` works too.

use std::sync::OnceLock;

use abra_compiler::{Prelude, check_program, compile_program, disassemble_program};
use abra_core::{AbraError, Span};
use abra_vm::Vm;
use rustc_hash::FxHashMap;

pub use abra_compiler::{ENTRY_MODULE, ModuleResolver};
pub use abra_core::RuntimeError;
pub use abra_vm::{Value, VmConfig};

/// Settings for a [`Toolchain`].
#[derive(Debug, Clone, Default)]
pub struct ToolchainConfig {
    pub vm: VmConfig,
}

/// A line/column range in the checked source, both ends 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRange {
    pub start: (u32, u32),
    pub end: (u32, u32),
}

impl From<Span> for SourceRange {
    fn from(span: Span) -> Self {
        Self {
            start: span.start(),
            end: span.end(),
        }
    }
}

/// Location details of a failed check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorInfo {
    pub range: Option<SourceRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypecheckResult {
    Success,
    Failure {
        error_message: String,
        error: ErrorInfo,
    },
}

impl TypecheckResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TypecheckResult::Success)
    }

    fn failure(error: &AbraError) -> Self {
        TypecheckResult::Failure {
            error_message: error.message(),
            error: ErrorInfo {
                range: error.span().map(SourceRange::from),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    Success { data: Value },
    Failure { error_message: String },
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisassembleResult {
    Success { disassembled: String },
    Failure,
}

/// A resolver backed by an in-memory map from module name to source.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    modules: FxHashMap<String, String>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under `name`, e.g. `"./util"`.
    pub fn with_module(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.modules.insert(name.into(), source.into());
    }
}

impl ModuleResolver for MapResolver {
    fn read_module(&self, name: &str) -> Option<String> {
        self.modules.get(name).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for MapResolver
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            modules: iter
                .into_iter()
                .map(|(name, source)| (name.into(), source.into()))
                .collect(),
        }
    }
}

/// The configured pipeline: builtin signatures plus VM settings.
#[derive(Debug)]
pub struct Toolchain {
    prelude: Prelude,
    config: ToolchainConfig,
}

static GLOBAL: OnceLock<Toolchain> = OnceLock::new();

impl Toolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        log::debug!("toolchain created (max call depth {})", config.vm.max_call_depth);
        Self {
            prelude: Prelude::standard(),
            config,
        }
    }

    /// The process-wide toolchain with default settings, built on first use.
    pub fn global() -> &'static Toolchain {
        GLOBAL.get_or_init(|| Toolchain::new(ToolchainConfig::default()))
    }

    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }

    /// Parse and type check `source` and every module it imports.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn typecheck(&self, source: &str, resolver: Option<&dyn ModuleResolver>) -> TypecheckResult {
        match check_program(source, resolver, &self.prelude) {
            Ok(program) => {
                log::debug!("typecheck succeeded for {} module(s)", program.modules.len());
                TypecheckResult::Success
            }
            Err(error) => {
                log::debug!("typecheck failed: {error}");
                TypecheckResult::failure(&error)
            }
        }
    }

    /// Run `source`, printing `println` output to stdout.
    pub fn run(&self, source: &str, resolver: Option<&dyn ModuleResolver>) -> RunResult {
        self.run_with_output(source, resolver, &mut |line| println!("{line}"))
    }

    /// Run `source`, sending each `println` line to `output`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run_with_output(
        &self,
        source: &str,
        resolver: Option<&dyn ModuleResolver>,
        output: &mut dyn FnMut(&str),
    ) -> RunResult {
        match self.execute(source, resolver, output) {
            Ok(data) => RunResult::Success { data },
            Err(error) => {
                log::debug!("run failed: {error}");
                RunResult::Failure {
                    error_message: error.message(),
                }
            }
        }
    }

    /// Compile `source` and render its bytecode. Imports are not resolved.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn disassemble(&self, source: &str) -> DisassembleResult {
        let checked = match check_program(source, None, &self.prelude) {
            Ok(checked) => checked,
            Err(error) => {
                log::debug!("disassemble failed: {error}");
                return DisassembleResult::Failure;
            }
        };
        match compile_program(&checked) {
            Ok(program) => DisassembleResult::Success {
                disassembled: disassemble_program(&program),
            },
            Err(error) => {
                log::debug!("disassemble failed: {error}");
                DisassembleResult::Failure
            }
        }
    }

    fn execute(
        &self,
        source: &str,
        resolver: Option<&dyn ModuleResolver>,
        output: &mut dyn FnMut(&str),
    ) -> Result<Value, AbraError> {
        let checked = check_program(source, resolver, &self.prelude)?;
        let program = compile_program(&checked)?;
        let mut vm = Vm::new(&program, self.config.vm, output);
        Ok(vm.run()?)
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::new(ToolchainConfig::default())
    }
}

/// Type check `source` with the global toolchain.
pub fn typecheck(source: &str, resolver: Option<&dyn ModuleResolver>) -> TypecheckResult {
    Toolchain::global().typecheck(source, resolver)
}

/// Run `source` with the global toolchain.
pub fn run(source: &str, resolver: Option<&dyn ModuleResolver>) -> RunResult {
    Toolchain::global().run(source, resolver)
}

/// Disassemble `source` with the global toolchain.
pub fn disassemble(source: &str) -> DisassembleResult {
    Toolchain::global().disassemble(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_run(source: &str, resolver: Option<&dyn ModuleResolver>) -> RunResult {
        Toolchain::global().run_with_output(source, resolver, &mut |_| {})
    }

    #[test]
    fn typecheck_reports_the_offending_range() {
        let result = typecheck("val a = 1\na = 2", None);
        let TypecheckResult::Failure { error, .. } = result else {
            panic!("expected a failure, got {result:?}");
        };
        let range = error.range.expect("typecheck errors have a range");
        assert_eq!(range.start.0, 2);
    }

    #[test]
    fn typecheck_is_repeatable() {
        let source = "val a: Int = \"no\"";
        assert_eq!(typecheck(source, None), typecheck(source, None));
        assert!(typecheck("val a = 1", None).is_success());
    }

    #[test]
    fn deep_nesting_fails_without_crashing() {
        let parens = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        assert!(!typecheck(&parens, None).is_success());
        assert!(!quiet_run(&parens, None).is_success());

        let chain = format!("val x = 1\nx{}", " + 1".repeat(200));
        let TypecheckResult::Failure { error_message, .. } = typecheck(&chain, None) else {
            panic!("a 200-term chain should be rejected");
        };
        assert!(error_message.contains("nesting"), "{error_message}");

        let modest = format!("val x = 1\nx{}", " + 1".repeat(30));
        assert_eq!(quiet_run(&modest, None), RunResult::Success { data: Value::Int(31) });
    }

    #[test]
    fn run_returns_the_last_expression() {
        assert_eq!(
            quiet_run("[1, 2, 3][10] ?: -1", None),
            RunResult::Success { data: Value::Int(-1) }
        );
    }

    #[test]
    fn run_reports_runtime_errors() {
        let result = quiet_run("val zero = 0\n1 / zero", None);
        assert!(matches!(result, RunResult::Failure { .. }), "{result:?}");
    }

    #[test]
    fn output_goes_through_the_callback() {
        let mut lines = Vec::new();
        let result = Toolchain::global().run_with_output(
            "println(\"a\")\nprintln(1 + 1)",
            None,
            &mut |line| lines.push(line.to_string()),
        );
        assert!(result.is_success());
        assert_eq!(lines, vec!["a", "2"]);
    }

    #[test]
    fn map_resolver_serves_modules() {
        let resolver = MapResolver::new().with_module("./util", "export val answer = 42");
        let result = quiet_run("import answer from \"./util\"\nanswer", Some(&resolver));
        assert_eq!(result, RunResult::Success { data: Value::Int(42) });
    }

    #[test]
    fn closures_resolve_modules() {
        let resolver = |name: &str| (name == "./two").then(|| "export val two = 2".to_string());
        let result = quiet_run("import two from \"./two\"\ntwo * 3", Some(&resolver));
        assert_eq!(result, RunResult::Success { data: Value::Int(6) });
    }

    #[test]
    fn configured_call_depth_applies() {
        let toolchain = Toolchain::new(ToolchainConfig {
            vm: VmConfig::default().with_max_call_depth(20),
        });
        let source = "func down(n: Int): Int = if n == 0 { 0 } else { down(n - 1) }\ndown(100)";
        let result = toolchain.run_with_output(source, None, &mut |_| {});
        assert!(matches!(result, RunResult::Failure { .. }), "{result:?}");
        assert!(Toolchain::global().run_with_output(source, None, &mut |_| {}).is_success());
    }

    #[test]
    fn disassemble_renders_bytecode() {
        let DisassembleResult::Success { disassembled } = disassemble("val x = 1 + 2") else {
            panic!("expected bytecode");
        };
        assert!(disassembled.contains("== module ./main =="));
        assert_eq!(disassemble("val x: Int = true"), DisassembleResult::Failure);
    }
}
