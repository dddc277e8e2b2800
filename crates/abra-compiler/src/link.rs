//! Module linking.
//!
//! Every module is compiled on its own, so a reference to another module's
//! symbol is only recorded as an extern. [`link`] resolves each extern
//! against the export table of the module it names and bundles the chunks,
//! their link tables and the runtime type metadata into a [`Program`].

use abra_core::{CompileError, TypeId};
use rustc_hash::FxHashMap;

use crate::module::ModuleChunk;
use crate::typeck::{ExportTarget, TypeKind, TypeRegistry};

/// A resolved extern: the module index and what the symbol refers to there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTarget {
    pub module: usize,
    pub target: ExportTarget,
}

/// Runtime description of a declared type, used for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMeta {
    pub name: String,
    /// Field names of a struct type.
    pub fields: Vec<String>,
    pub variants: Vec<VariantMeta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantMeta {
    pub name: String,
    /// Payload field names; `None` for unit variants.
    pub fields: Option<Vec<String>>,
}

/// A linked program.
#[derive(Debug, Clone)]
pub struct Program {
    /// Modules in dependency order.
    pub modules: Vec<ModuleChunk>,
    /// For each module, the resolution of each of its externs.
    pub links: Vec<Vec<LinkTarget>>,
    pub types: FxHashMap<TypeId, TypeMeta>,
    /// Index of the entry module.
    pub entry: usize,
}

impl Program {
    pub fn module(&self, name: &str) -> Option<(usize, &ModuleChunk)> {
        self.modules.iter().enumerate().find(|(_, m)| m.name == name)
    }

    pub fn type_meta(&self, id: TypeId) -> Option<&TypeMeta> {
        self.types.get(&id)
    }
}

/// Link compiled modules given in dependency order; the last one is the
/// entry module.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn link(modules: Vec<ModuleChunk>, registry: &TypeRegistry) -> Result<Program, CompileError> {
    let Some(entry) = modules.len().checked_sub(1) else {
        return Err(CompileError::Internal("nothing to link".to_string()));
    };

    let index: FxHashMap<&str, usize> = modules
        .iter()
        .enumerate()
        .map(|(i, m)| (m.name.as_str(), i))
        .collect();

    let mut links = Vec::with_capacity(modules.len());
    for module in &modules {
        let mut table = Vec::with_capacity(module.externs.len());
        for reference in &module.externs {
            let resolved = index.get(reference.module.as_str()).and_then(|&target| {
                modules[target]
                    .export(&reference.symbol)
                    .map(|export| LinkTarget {
                        module: target,
                        target: export,
                    })
            });
            let Some(resolved) = resolved else {
                return Err(CompileError::UnresolvedSymbol {
                    module: reference.module.clone(),
                    symbol: reference.symbol.clone(),
                });
            };
            table.push(resolved);
        }
        links.push(table);
    }

    let types = registry
        .iter()
        .map(|info| {
            let meta = match &info.kind {
                TypeKind::Struct { fields, .. } => TypeMeta {
                    name: info.name.clone(),
                    fields: fields.iter().map(|f| f.name.clone()).collect(),
                    variants: Vec::new(),
                },
                TypeKind::Enum { variants } => TypeMeta {
                    name: info.name.clone(),
                    fields: Vec::new(),
                    variants: variants
                        .iter()
                        .map(|v| VariantMeta {
                            name: v.name.clone(),
                            fields: v
                                .fields
                                .as_ref()
                                .map(|fields| fields.iter().map(|f| f.name.clone()).collect()),
                        })
                        .collect(),
                },
            };
            (info.id, meta)
        })
        .collect();

    log::debug!(
        "linked {} modules, entry '{}'",
        modules.len(),
        modules[entry].name
    );

    Ok(Program {
        modules,
        links,
        types,
        entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeck::ExternRef;

    fn chunk(name: &str) -> ModuleChunk {
        ModuleChunk {
            name: name.to_string(),
            ..ModuleChunk::default()
        }
    }

    #[test]
    fn resolves_externs_against_exports() {
        let mut lib = chunk("./lib");
        lib.exports.insert("answer".to_string(), ExportTarget::Global(0));
        lib.exports.insert("double".to_string(), ExportTarget::Function(1));

        let mut main = chunk("./main");
        main.externs = vec![
            ExternRef {
                module: "./lib".to_string(),
                symbol: "double".to_string(),
            },
            ExternRef {
                module: "./lib".to_string(),
                symbol: "answer".to_string(),
            },
        ];

        let program = link(vec![lib, main], &TypeRegistry::new()).expect("links");
        assert_eq!(program.entry, 1);
        assert!(program.links[0].is_empty());
        assert_eq!(
            program.links[1],
            vec![
                LinkTarget {
                    module: 0,
                    target: ExportTarget::Function(1)
                },
                LinkTarget {
                    module: 0,
                    target: ExportTarget::Global(0)
                },
            ]
        );
        assert_eq!(program.module("./lib").map(|(i, _)| i), Some(0));
    }

    #[test]
    fn missing_export_is_unresolved() {
        let mut main = chunk("./main");
        main.externs = vec![ExternRef {
            module: "./lib".to_string(),
            symbol: "secret".to_string(),
        }];

        let error = link(vec![chunk("./lib"), main], &TypeRegistry::new()).unwrap_err();
        assert_eq!(
            error,
            CompileError::UnresolvedSymbol {
                module: "./lib".to_string(),
                symbol: "secret".to_string(),
            }
        );
    }

    #[test]
    fn empty_program_is_an_error() {
        assert!(matches!(
            link(Vec::new(), &TypeRegistry::new()),
            Err(CompileError::Internal(_))
        ));
    }
}
