//! Multi-module compilation.
//!
//! A program starts at its entry module. Imports are loaded breadth-first
//! through a [`ModuleResolver`], the import graph is kept in a `petgraph`
//! `DiGraph` (an edge points from a dependency to its importer), and a
//! topological order of that graph is the order modules are type checked,
//! compiled and initialized in. The entry module always comes last.

use std::collections::VecDeque;

use abra_core::{AbraError, CompileError, Span, TypecheckError, TypecheckErrorKind};
use abra_parser::ast::Stmt;
use abra_parser::{Parser, Script};
use bumpalo::Bump;
use petgraph::Direction;
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;

use crate::codegen::compile_module;
use crate::link::{Program, link};
use crate::typeck::{ModuleInterface, Prelude, TypeRegistry, TypedModule, check_module};

/// Name under which the entry source is compiled.
pub const ENTRY_MODULE: &str = "./main";

/// Supplies the source of imported modules.
pub trait ModuleResolver {
    /// The source of module `name`, as written in the import, if it exists.
    fn read_module(&self, name: &str) -> Option<String>;
}

impl<F> ModuleResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn read_module(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Typed modules of a program, in dependency order.
#[derive(Debug)]
pub struct CheckedProgram {
    pub modules: Vec<TypedModule>,
    pub registry: TypeRegistry,
}

impl CheckedProgram {
    pub fn entry(&self) -> Option<&TypedModule> {
        self.modules.last()
    }
}

struct Loaded<'ast> {
    name: String,
    script: Script<'ast>,
}

/// Load, order and type check the program rooted at `source`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn check_program(
    source: &str,
    resolver: Option<&dyn ModuleResolver>,
    prelude: &Prelude,
) -> Result<CheckedProgram, AbraError> {
    let arena = Bump::new();
    let mut graph: DiGraph<Loaded<'_>, Span> = DiGraph::new();
    let mut nodes: FxHashMap<String, NodeIndex> = FxHashMap::default();

    let entry = graph.add_node(Loaded {
        name: ENTRY_MODULE.to_string(),
        script: Parser::parse(source, &arena)?,
    });
    nodes.insert(ENTRY_MODULE.to_string(), entry);

    let mut queue = VecDeque::from([entry]);
    while let Some(importer) = queue.pop_front() {
        let items = graph[importer].script.items();
        for stmt in items {
            let Stmt::Import(import) = stmt else {
                continue;
            };
            let dependency = match nodes.get(import.path) {
                Some(&node) => node,
                None => {
                    let Some(text) = resolver.and_then(|r| r.read_module(import.path)) else {
                        let error = TypecheckError::new(
                            TypecheckErrorKind::ModuleNotFound,
                            import.path_span,
                            format!("Module '{}' could not be found", import.path),
                        );
                        return Err(in_module(error, &graph[importer].name).into());
                    };
                    log::debug!("loaded module '{}' ({} bytes)", import.path, text.len());
                    let node = graph.add_node(Loaded {
                        name: import.path.to_string(),
                        script: Parser::parse(&text, &arena)?,
                    });
                    nodes.insert(import.path.to_string(), node);
                    queue.push_back(node);
                    node
                }
            };
            graph.add_edge(dependency, importer, import.path_span);
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| cyclic_import(&graph, cycle.node_id()))?;

    let mut registry = TypeRegistry::new();
    let mut interfaces: FxHashMap<String, ModuleInterface> = FxHashMap::default();
    let mut modules = Vec::with_capacity(order.len());
    for node in order {
        let Loaded { name, script } = &graph[node];
        let (typed, interface) = check_module(name, script, prelude, &mut registry, &interfaces)
            .map_err(|error| in_module(error, name))?;
        interfaces.insert(name.clone(), interface);
        modules.push(typed);
    }

    Ok(CheckedProgram { modules, registry })
}

/// Compile and link a checked program.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn compile_program(program: &CheckedProgram) -> Result<Program, CompileError> {
    let chunks = program
        .modules
        .iter()
        .map(compile_module)
        .collect::<Result<Vec<_>, _>>()?;
    link(chunks, &program.registry)
}

/// Errors are attributed to the module they occur in, except the entry.
fn in_module(error: TypecheckError, module: &str) -> TypecheckError {
    if module == ENTRY_MODULE || error.module.is_some() {
        error
    } else {
        error.in_module(module)
    }
}

/// Build the error for a cycle through `node`, reported at one of its
/// imports that leads back to it.
fn cyclic_import(graph: &DiGraph<Loaded<'_>, Span>, node: NodeIndex) -> AbraError {
    let importer = &graph[node].name;
    let edge = graph
        .edges_directed(node, Direction::Incoming)
        .find(|edge| has_path_connecting(graph, node, edge.source(), None));
    let (span, message) = match edge {
        Some(edge) => (
            *edge.weight(),
            format!(
                "Cyclic import: module '{}' imports '{}', which depends on '{}'",
                importer,
                graph[edge.source()].name,
                importer
            ),
        ),
        None => (
            Span::default(),
            format!("Cyclic import involving module '{importer}'"),
        ),
    };
    in_module(
        TypecheckError::new(TypecheckErrorKind::CyclicImport, span, message),
        importer,
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modules(files: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            files
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, source)| source.to_string())
        }
    }

    fn check(source: &str, files: &'static [(&'static str, &'static str)]) -> Result<CheckedProgram, AbraError> {
        let resolver = modules(files);
        check_program(source, Some(&resolver), &Prelude::standard())
    }

    fn typecheck_error(result: Result<CheckedProgram, AbraError>) -> TypecheckError {
        match result {
            Err(AbraError::Typecheck(error)) => error,
            other => panic!("expected a typecheck error, got {other:?}"),
        }
    }

    #[test]
    fn dependencies_come_first() {
        let program = check(
            "import double from \"./math\"\nimport greet from \"./text\"\ngreet(\"x\") + double(2)",
            &[
                ("./math", "export func double(n: Int): Int = n * 2"),
                (
                    "./text",
                    "import double from \"./math\"\nexport func greet(s: String): String = s + double(1)",
                ),
            ],
        )
        .expect("program checks");

        let names: Vec<&str> = program.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["./math", "./text", "./main"]);
        assert_eq!(program.entry().map(|m| m.name.as_str()), Some(ENTRY_MODULE));
    }

    #[test]
    fn missing_module_is_reported_at_the_import() {
        let error = typecheck_error(check("import x from \"./nowhere\"\nx", &[]));
        assert_eq!(error.kind, TypecheckErrorKind::ModuleNotFound);
        assert_eq!(error.span.line, 1);
        assert_eq!(error.module, None);

        let error = typecheck_error(check_program(
            "import x from \"./lib\"\nx",
            None,
            &Prelude::standard(),
        ));
        assert_eq!(error.kind, TypecheckErrorKind::ModuleNotFound);
    }

    #[test]
    fn cycles_are_rejected() {
        let error = typecheck_error(check(
            "import a from \"./a\"\na",
            &[
                ("./a", "import b from \"./b\"\nexport val a = b"),
                ("./b", "import a from \"./a\"\nexport val b = 1"),
            ],
        ));
        assert_eq!(error.kind, TypecheckErrorKind::CyclicImport);
        assert!(error.module.is_some());
    }

    #[test]
    fn errors_in_dependencies_name_the_module() {
        let error = typecheck_error(check(
            "import a from \"./a\"\na",
            &[("./a", "export val a: Int = \"nope\"")],
        ));
        assert_eq!(error.kind, TypecheckErrorKind::TypeMismatch);
        assert_eq!(error.module.as_deref(), Some("./a"));
    }

    #[test]
    fn compiles_and_links_every_module() {
        let checked = check(
            "import double from \"./math\"\ndouble(21)",
            &[("./math", "export func double(n: Int): Int = n * 2")],
        )
        .expect("program checks");
        let program = compile_program(&checked).expect("program links");
        assert_eq!(program.modules.len(), 2);
        assert_eq!(program.entry, 1);
        assert_eq!(program.links[1].len(), 1);
    }
}
