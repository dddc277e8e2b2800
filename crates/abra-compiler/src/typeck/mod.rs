//! Static type checking.
//!
//! The [`TypeChecker`] checks one module at a time in two passes:
//!
//! - **Hoisting**: imports are bound, then type and enum names are declared,
//!   then their fields and method signatures, then top-level function
//!   signatures. Forward references resolve against this table.
//! - **Checking**: statements and function bodies are checked in source
//!   order, producing the [`typed`] tree that code generation walks.
//!
//! Types declared by a module go into the session-wide [`TypeRegistry`];
//! the names a module exports are returned as its [`ModuleInterface`].
//! Checking stops at the first error.

mod call;
mod expr;
pub mod generics;
pub mod info;
pub mod prelude;
pub mod scope;
mod stmt;
pub mod typed;

pub use info::{
    ExportedSymbol, FieldInfo, FunctionSig, MethodInfo, ModuleInterface, ParamSig, TypeInfo,
    TypeKind, TypeRegistry, VariantInfo,
};
pub use prelude::{Builtin, BuiltinMember, Prelude};
pub use scope::{LocalKind, LocalScope, LocalVar, VarLookup};
pub use typed::*;

use abra_core::{Span, Type, TypeId, TypecheckError, TypecheckErrorKind};
use abra_parser::Script;
use abra_parser::ast::{
    EnumDecl, FieldDecl, FuncDecl, Ident, ImportDecl, Param, Stmt, TypeDecl, TypeExpr,
    TypeExprKind,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

type Result<T> = std::result::Result<T, TypecheckError>;

/// Check a parsed module.
///
/// `interfaces` holds the interfaces of every module this one may import;
/// the session checks modules in dependency order so they are complete.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn check_module(
    name: &str,
    script: &Script<'_>,
    prelude: &Prelude,
    registry: &mut TypeRegistry,
    interfaces: &FxHashMap<String, ModuleInterface>,
) -> Result<(TypedModule, ModuleInterface)> {
    let checker = TypeChecker::new(name, prelude, registry, interfaces);
    let result = checker.check(script);
    match &result {
        Ok((module, _)) => log::debug!(
            "checked module '{}': {} functions, {} globals",
            name,
            module.functions.len(),
            module.globals.len()
        ),
        Err(error) => log::debug!("module '{}' failed to typecheck: {}", name, error),
    }
    result
}

/// A module-level name.
#[derive(Debug, Clone)]
enum GlobalSymbol {
    Var { slot: u16, ty: Type, mutable: bool },
    Function(u32),
    Type(TypeId),
    ExternValue { index: u32, ty: Type },
    ExternFunction { index: u32, sig: FunctionSig },
}

/// What a name refers to at a use site.
#[derive(Debug, Clone)]
enum Resolved {
    Var {
        var: VarRef,
        ty: Type,
        kind: LocalKind,
    },
    /// A function of this module; `local` is set for nested functions,
    /// which are stored as closures.
    Function {
        fid: u32,
        local: Option<VarRef>,
    },
    ExternFunction {
        index: u32,
        sig: FunctionSig,
    },
    Type(TypeId),
    Builtin(Builtin, FunctionSig),
}

/// Whether the value of an `if` or block is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Value,
    Statement,
}

#[derive(Debug)]
struct FunctionEntry {
    sig: FunctionSig,
    function: TypedFunction,
    /// The return type comes from the body rather than an annotation
    inferred: bool,
}

/// A hoisted function or method whose body can be checked out of order.
#[derive(Debug, Clone, Copy)]
struct DeferredBody<'a> {
    decl: &'a FuncDecl<'a>,
    /// Declaring type of a method
    owner: Option<TypeId>,
}

/// A use of function `callee` inside the body of `caller`.
#[derive(Debug, Clone, Copy)]
struct Reference {
    caller: u32,
    callee: u32,
    span: Span,
}

/// Type checker for a single module.
pub struct TypeChecker<'a> {
    module: String,
    prelude: &'a Prelude,
    registry: &'a mut TypeRegistry,
    interfaces: &'a FxHashMap<String, ModuleInterface>,

    globals: FxHashMap<String, GlobalSymbol>,
    global_names: Vec<String>,
    /// Type parameters in scope, innermost last
    type_params: Vec<String>,
    scope: LocalScope,
    /// Nesting of `check_expr` calls
    expr_depth: u32,
    functions: Vec<FunctionEntry>,
    /// Function ids of hoisted declarations, keyed by declaration span
    hoisted: FxHashMap<Span, u32>,
    /// Module-level functions and methods, by function id
    bodies: FxHashMap<u32, DeferredBody<'a>>,
    /// Functions whose bodies are being checked, innermost last
    checking: Vec<u32>,
    references: Vec<Reference>,

    externs: Vec<ExternRef>,
    extern_index: FxHashMap<ExternRef, u32>,
    exports: Vec<(String, ExportTarget)>,
    exported_functions: Vec<(String, u32)>,
    interface: ModuleInterface,
    declared_types: Vec<TypeId>,
    dependencies: Vec<String>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(
        module: &str,
        prelude: &'a Prelude,
        registry: &'a mut TypeRegistry,
        interfaces: &'a FxHashMap<String, ModuleInterface>,
    ) -> Self {
        Self {
            module: module.to_string(),
            prelude,
            registry,
            interfaces,
            globals: FxHashMap::default(),
            global_names: Vec::new(),
            type_params: Vec::new(),
            scope: LocalScope::new(),
            expr_depth: 0,
            functions: Vec::new(),
            hoisted: FxHashMap::default(),
            bodies: FxHashMap::default(),
            checking: Vec::new(),
            references: Vec::new(),
            externs: Vec::new(),
            extern_index: FxHashMap::default(),
            exports: Vec::new(),
            exported_functions: Vec::new(),
            interface: ModuleInterface::new(module),
            declared_types: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Check the whole module.
    pub fn check(mut self, script: &Script<'a>) -> Result<(TypedModule, ModuleInterface)> {
        let items = script.items();
        let main = self.alloc_function(
            "<main>",
            FunctionSig::new(Vec::new(), Type::Unit),
            FunctionFlags::MAIN,
            script.span(),
        );

        for (stmt, _) in declarations(items) {
            if let Stmt::Import(import) = stmt {
                self.bind_import(import)?;
            }
        }
        self.hoist_type_names(items)?;
        self.hoist_type_members(items)?;
        self.hoist_functions(items)?;
        self.defer_bodies(items);

        let body = self.check_top_level(items)?;
        self.check_inferred_recursion()?;
        let entry = &mut self.functions[main as usize];
        entry.sig.ret = Some(body.ty.clone());
        entry.function.local_count = self.scope.frame_size();
        entry.function.body = FunctionBody::Expr(body);

        Ok(self.finish())
    }

    // ==========================================================================
    // Hoisting
    // ==========================================================================

    fn bind_import(&mut self, import: &ImportDecl<'_>) -> Result<()> {
        let interfaces = self.interfaces;
        let interface = interfaces.get(import.path).ok_or_else(|| {
            TypecheckError::new(
                TypecheckErrorKind::ModuleNotFound,
                import.path_span,
                format!("Module '{}' could not be found", import.path),
            )
        })?;
        if !self.dependencies.iter().any(|d| d == import.path) {
            self.dependencies.push(import.path.to_string());
        }

        for name in import.names {
            let symbol = interface.get(name.name).ok_or_else(|| {
                TypecheckError::new(
                    TypecheckErrorKind::UnresolvedImport,
                    name.span,
                    format!("Module '{}' does not export '{}'", import.path, name.name),
                )
            })?;
            let global = match symbol {
                ExportedSymbol::Value(ty) => GlobalSymbol::ExternValue {
                    index: self.extern_ref(import.path, name.name),
                    ty: ty.clone(),
                },
                ExportedSymbol::Function(sig) => GlobalSymbol::ExternFunction {
                    index: self.extern_ref(import.path, name.name),
                    sig: sig.clone(),
                },
                ExportedSymbol::Type(id) => GlobalSymbol::Type(*id),
            };
            self.declare_global(name, global)?;
        }
        Ok(())
    }

    fn hoist_type_names(&mut self, items: &[Stmt<'_>]) -> Result<()> {
        for (stmt, exported) in declarations(items) {
            let (name, type_params, kind) = match stmt {
                Stmt::Type(decl) => (
                    decl.name,
                    decl.type_params,
                    TypeKind::Struct {
                        fields: Vec::new(),
                        ctor: 0,
                    },
                ),
                Stmt::Enum(decl) => (
                    decl.name,
                    &[][..],
                    TypeKind::Enum {
                        variants: Vec::new(),
                    },
                ),
                _ => continue,
            };
            let id = TypeId::of(&self.module, name.name);
            self.declare_global(&name, GlobalSymbol::Type(id))?;
            self.registry.insert(TypeInfo {
                id,
                name: name.name.to_string(),
                module: self.module.clone(),
                type_params: type_params.iter().map(|p| p.name.to_string()).collect(),
                kind,
                methods: Vec::new(),
            });
            self.declared_types.push(id);
            if exported {
                self.interface
                    .exports
                    .insert(name.name.to_string(), ExportedSymbol::Type(id));
            }
        }
        Ok(())
    }

    fn hoist_type_members(&mut self, items: &[Stmt<'_>]) -> Result<()> {
        for (stmt, _) in declarations(items) {
            match stmt {
                Stmt::Type(decl) => self.hoist_struct(decl)?,
                Stmt::Enum(decl) => self.hoist_enum(decl)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn hoist_struct(&mut self, decl: &TypeDecl<'_>) -> Result<()> {
        let id = TypeId::of(&self.module, decl.name.name);
        let (fields, methods) = self.with_type_params(decl.type_params, |this| {
            let fields = this.hoist_fields(decl.fields)?;
            let methods = this.hoist_methods(decl.name.name, decl.methods, &fields)?;
            Ok((fields, methods))
        })?;

        let ctor = self.alloc_function(
            decl.name.name,
            FunctionSig::new(Vec::new(), Type::Unit),
            FunctionFlags::CONSTRUCTOR,
            decl.span,
        );
        let info = self.type_info_mut(id, decl.name.span)?;
        info.kind = TypeKind::Struct { fields, ctor };
        info.methods = methods;
        let sig = info.ctor_sig();
        self.functions[ctor as usize].sig = sig;
        Ok(())
    }

    fn hoist_enum(&mut self, decl: &EnumDecl<'_>) -> Result<()> {
        let id = TypeId::of(&self.module, decl.name.name);
        let mut variants: Vec<VariantInfo> = Vec::with_capacity(decl.variants.len());
        for variant in decl.variants {
            if variants.iter().any(|v| v.name == variant.name.name) {
                return Err(duplicate(&variant.name));
            }
            let (fields, ctor) = match variant.fields {
                Some(fields) => {
                    let fields = self.hoist_fields(fields)?;
                    let ctor = self.alloc_function(
                        &format!("{}.{}", decl.name.name, variant.name.name),
                        FunctionSig::new(Vec::new(), Type::Unit),
                        FunctionFlags::CONSTRUCTOR,
                        variant.span,
                    );
                    (Some(fields), Some(ctor))
                }
                None => (None, None),
            };
            variants.push(VariantInfo {
                name: variant.name.name.to_string(),
                fields,
                ctor,
            });
        }
        let methods = self.hoist_methods(decl.name.name, decl.methods, &[])?;
        if let Some(method) = methods
            .iter()
            .find(|m| variants.iter().any(|v| v.name == m.name))
        {
            let span = decl
                .methods
                .iter()
                .find(|m| m.name.name == method.name)
                .map_or(decl.span, |m| m.name.span);
            return Err(TypecheckError::new(
                TypecheckErrorKind::DuplicateDeclaration,
                span,
                format!("Duplicate declaration of '{}'", method.name),
            ));
        }

        let info = self.type_info_mut(id, decl.name.span)?;
        info.kind = TypeKind::Enum { variants };
        info.methods = methods;
        let info = info.clone();
        if let TypeKind::Enum { variants } = &info.kind {
            for variant in variants {
                if let Some(ctor) = variant.ctor {
                    self.functions[ctor as usize].sig = info.variant_sig(variant);
                }
            }
        }
        Ok(())
    }

    fn hoist_fields(&mut self, decls: &[FieldDecl<'_>]) -> Result<Vec<FieldInfo>> {
        let mut fields: Vec<FieldInfo> = Vec::with_capacity(decls.len());
        for field in decls {
            if fields.iter().any(|f| f.name == field.name.name) {
                return Err(duplicate(&field.name));
            }
            fields.push(FieldInfo {
                name: field.name.name.to_string(),
                ty: self.resolve_type(&field.ty)?,
                has_default: field.default.is_some(),
            });
        }
        Ok(fields)
    }

    fn hoist_methods(
        &mut self,
        owner: &str,
        decls: &[FuncDecl<'_>],
        fields: &[FieldInfo],
    ) -> Result<Vec<MethodInfo>> {
        let mut methods: Vec<MethodInfo> = Vec::with_capacity(decls.len());
        for decl in decls {
            let name = decl.name.name;
            if methods.iter().any(|m| m.name == name) || fields.iter().any(|f| f.name == name) {
                return Err(duplicate(&decl.name));
            }
            let sig = self.hoist_signature(decl, true)?;
            let mut flags = FunctionFlags::empty();
            if decl.has_self() {
                flags |= FunctionFlags::METHOD;
            }
            let fid = self.alloc_function(&format!("{owner}.{name}"), sig.clone(), flags, decl.span);
            self.hoisted.insert(decl.span, fid);
            methods.push(MethodInfo {
                name: name.to_string(),
                has_self: decl.has_self(),
                sig,
                fid,
            });
        }
        Ok(methods)
    }

    fn hoist_functions(&mut self, items: &[Stmt<'_>]) -> Result<()> {
        for (stmt, exported) in declarations(items) {
            let Stmt::Func(decl) = stmt else { continue };
            let sig = self.hoist_signature(decl, false)?;
            let fid = self.alloc_function(decl.name.name, sig, FunctionFlags::empty(), decl.span);
            self.declare_global(&decl.name, GlobalSymbol::Function(fid))?;
            self.hoisted.insert(decl.span, fid);
            if exported {
                self.exported_functions.push((decl.name.name.to_string(), fid));
                self.exports
                    .push((decl.name.name.to_string(), ExportTarget::Function(fid)));
            }
        }
        Ok(())
    }

    /// Remember where module-level functions and methods are declared so a
    /// forward reference can check an inferred body before its turn.
    fn defer_bodies(&mut self, items: &'a [Stmt<'a>]) {
        for (stmt, _) in declarations(items) {
            let (decls, owner) = match stmt {
                Stmt::Func(decl) => (std::slice::from_ref(*decl), None),
                Stmt::Type(decl) => (decl.methods, Some(TypeId::of(&self.module, decl.name.name))),
                Stmt::Enum(decl) => (decl.methods, Some(TypeId::of(&self.module, decl.name.name))),
                _ => continue,
            };
            for decl in decls {
                if let Some(&fid) = self.hoisted.get(&decl.span) {
                    self.bodies.insert(fid, DeferredBody { decl, owner });
                }
            }
        }
    }

    /// Resolve the declared signature of a function.
    ///
    /// Parameter types come from annotations, or from the type of the default
    /// value. The return type stays `None` until the body is checked when it
    /// is not annotated.
    fn hoist_signature(&mut self, decl: &FuncDecl<'_>, allow_self: bool) -> Result<FunctionSig> {
        for (i, param) in decl.params.iter().enumerate() {
            if param.is_self && (!allow_self || i > 0) {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::InvalidDeclaration,
                    param.span,
                    "'self' is only allowed as the first parameter of a method",
                ));
            }
        }

        self.with_type_params(decl.type_params, |this| {
            let params = this.param_sigs(decl.params.iter().filter(|p| !p.is_self), |_, _| None)?;
            let ret = decl
                .return_type
                .as_ref()
                .map(|ty| this.resolve_type(ty))
                .transpose()?;
            Ok(FunctionSig {
                type_params: decl.type_params.iter().map(|p| p.name.to_string()).collect(),
                params,
                ret,
            })
        })
    }

    /// Resolve parameter types and check that defaulted parameters trail.
    ///
    /// `fallback` supplies a type for an unannotated parameter (lambdas take
    /// it from the expected function type) before the default is consulted.
    fn param_sigs<'p, 'ast: 'p>(
        &mut self,
        params: impl Iterator<Item = &'p Param<'ast>>,
        fallback: impl Fn(&Self, usize) -> Option<Type>,
    ) -> Result<Vec<ParamSig>> {
        let mut sigs: Vec<ParamSig> = Vec::new();
        let mut seen_default = false;
        for (i, param) in params.enumerate() {
            if sigs.iter().any(|p| p.name == param.name.name) {
                return Err(duplicate(&param.name));
            }
            let ty = match (&param.ty, fallback(self, i), param.default) {
                (Some(ty), _, _) => self.resolve_type(ty)?,
                (None, Some(ty), _) => ty,
                (None, None, Some(default)) => self.infer_default(default)?,
                (None, None, None) => {
                    return Err(TypecheckError::new(
                        TypecheckErrorKind::CannotInfer,
                        param.span,
                        format!(
                            "Parameter '{}' needs a type annotation or a default value",
                            param.name.name
                        ),
                    ));
                }
            };
            if param.default.is_some() {
                seen_default = true;
            } else if seen_default {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::InvalidParameterOrder,
                    param.span,
                    format!(
                        "Required parameter '{}' follows a parameter with a default value",
                        param.name.name
                    ),
                ));
            }
            sigs.push(ParamSig {
                name: param.name.name.to_string(),
                ty,
                has_default: param.default.is_some(),
            });
        }
        Ok(sigs)
    }

    /// Type of an unannotated default, checked in a throwaway context.
    fn infer_default(&mut self, default: &abra_parser::ast::Expr<'_>) -> Result<Type> {
        let saved_scope = std::mem::take(&mut self.scope);
        let function_mark = self.functions.len();
        let result = self.check_expr(default, None);
        self.functions.truncate(function_mark);
        self.scope = saved_scope;

        let ty = result?.ty;
        if ty.has_unknown() {
            return Err(TypecheckError::new(
                TypecheckErrorKind::CannotInfer,
                default.span(),
                format!("Cannot infer a parameter type from a default of type {ty}; add a type annotation"),
            ));
        }
        Ok(ty)
    }

    // ==========================================================================
    // Types
    // ==========================================================================

    /// Resolve a type annotation.
    fn resolve_type(&self, ty: &TypeExpr<'_>) -> Result<Type> {
        match &ty.kind {
            TypeExprKind::Named { name, args } => {
                let builtin = match name.name {
                    "Int" => Some(Type::Int),
                    "Float" => Some(Type::Float),
                    "Bool" => Some(Type::Bool),
                    "String" => Some(Type::String),
                    "Unit" => Some(Type::Unit),
                    _ => None,
                };
                let plain = builtin.or_else(|| {
                    self.type_params
                        .iter()
                        .any(|p| p == name.name)
                        .then(|| Type::Generic(name.name.to_string()))
                });
                if let Some(plain) = plain {
                    if !args.is_empty() {
                        return Err(TypecheckError::new(
                            TypecheckErrorKind::TypeMismatch,
                            ty.span,
                            format!("Type '{}' does not take type arguments", name.name),
                        ));
                    }
                    return Ok(plain);
                }

                let Some(GlobalSymbol::Type(id)) = self.globals.get(name.name) else {
                    return Err(TypecheckError::new(
                        TypecheckErrorKind::UnknownType,
                        name.span,
                        format!("Unknown type '{}'", name.name),
                    ));
                };
                let info = self.type_info(*id, name.span)?;
                if args.len() != info.type_params.len() {
                    return Err(TypecheckError::new(
                        TypecheckErrorKind::TypeMismatch,
                        ty.span,
                        format!(
                            "Type '{}' expects {} type arguments, found {}",
                            info.name,
                            info.type_params.len(),
                            args.len()
                        ),
                    ));
                }
                let args = args
                    .iter()
                    .map(|arg| self.resolve_type(arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Type::named(info.id, info.name.clone(), args))
            }
            TypeExprKind::Array(inner) => Ok(Type::array(self.resolve_type(inner)?)),
            TypeExprKind::Option(inner) => Ok(Type::option(self.resolve_type(inner)?)),
            TypeExprKind::Function { params, ret } => {
                let params = params
                    .iter()
                    .map(|p| self.resolve_type(p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Type::function(params, self.resolve_type(ret)?))
            }
        }
    }

    fn type_info(&self, id: TypeId, span: Span) -> Result<&TypeInfo> {
        self.registry.get(id).ok_or_else(|| {
            TypecheckError::new(
                TypecheckErrorKind::UnknownType,
                span,
                format!("Unknown type {id}"),
            )
        })
    }

    fn type_info_mut(&mut self, id: TypeId, span: Span) -> Result<&mut TypeInfo> {
        self.registry.get_mut(id).ok_or_else(|| {
            TypecheckError::new(
                TypecheckErrorKind::UnknownType,
                span,
                format!("Unknown type {id}"),
            )
        })
    }

    /// Whether every type parameter in `ty` is in scope here.
    ///
    /// Unbound parameters of a generic callee are not, and must not be used
    /// as an expected type.
    fn is_resolved(&self, ty: &Type) -> bool {
        let mut names = Vec::new();
        generics::generic_names(ty, &mut names);
        names.iter().all(|n| self.type_params.contains(n))
    }

    fn with_type_params<T>(
        &mut self,
        params: &[Ident<'_>],
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let mark = self.type_params.len();
        self.type_params
            .extend(params.iter().map(|p| p.name.to_string()));
        let result = f(self);
        self.type_params.truncate(mark);
        result
    }

    // ==========================================================================
    // Names
    // ==========================================================================

    fn declare_global(&mut self, name: &Ident<'_>, symbol: GlobalSymbol) -> Result<()> {
        if self.globals.contains_key(name.name) {
            return Err(duplicate(name));
        }
        self.globals.insert(name.name.to_string(), symbol);
        Ok(())
    }

    /// Resolve a name: locals (including captures), then module names, then
    /// the prelude.
    fn resolve_name(&self, ident: &Ident<'_>) -> Result<Resolved> {
        if let Some(found) = self.scope.lookup(ident.name) {
            let (depth, var) = match found {
                VarLookup::Local(var) => (0, var),
                VarLookup::Captured { depth, var } => (depth, var),
            };
            let local = VarRef::Local {
                depth,
                slot: var.slot,
            };
            return Ok(match var.kind {
                LocalKind::Function(fid) => Resolved::Function {
                    fid,
                    local: Some(local),
                },
                kind => Resolved::Var {
                    var: local,
                    ty: var.ty,
                    kind,
                },
            });
        }

        if let Some(symbol) = self.globals.get(ident.name) {
            return Ok(match symbol {
                GlobalSymbol::Var { slot, ty, mutable } => Resolved::Var {
                    var: VarRef::Global(*slot),
                    ty: ty.clone(),
                    kind: if *mutable { LocalKind::Var } else { LocalKind::Val },
                },
                GlobalSymbol::Function(fid) => Resolved::Function {
                    fid: *fid,
                    local: None,
                },
                GlobalSymbol::Type(id) => Resolved::Type(*id),
                GlobalSymbol::ExternValue { index, ty } => Resolved::Var {
                    var: VarRef::External(*index),
                    ty: ty.clone(),
                    kind: LocalKind::Val,
                },
                GlobalSymbol::ExternFunction { index, sig } => Resolved::ExternFunction {
                    index: *index,
                    sig: sig.clone(),
                },
            });
        }

        if let Some((builtin, sig)) = self.prelude.function(ident.name) {
            return Ok(Resolved::Builtin(builtin, sig.clone()));
        }

        Err(TypecheckError::new(
            TypecheckErrorKind::UnknownIdentifier,
            ident.span,
            format!("Unknown identifier '{}'", ident.name),
        ))
    }

    /// The declared type a bare name refers to, unless a value shadows it.
    fn type_named(&self, name: &str) -> Option<TypeId> {
        if self.scope.lookup(name).is_some() {
            return None;
        }
        match self.globals.get(name) {
            Some(GlobalSymbol::Type(id)) => Some(*id),
            _ => None,
        }
    }

    // ==========================================================================
    // Tables
    // ==========================================================================

    fn alloc_function(
        &mut self,
        name: &str,
        sig: FunctionSig,
        flags: FunctionFlags,
        span: Span,
    ) -> u32 {
        let fid = self.functions.len() as u32;
        self.functions.push(FunctionEntry {
            inferred: sig.ret.is_none(),
            sig,
            function: TypedFunction {
                name: name.to_string(),
                params: Vec::new(),
                body: FunctionBody::Pending,
                local_count: 0,
                flags,
                span,
            },
        });
        fid
    }

    /// Note that the body being checked uses function `fid`.
    ///
    /// A module-level function or method whose return type is inferred and
    /// whose body has not been checked yet is checked now, so using a
    /// function before its declaration does not depend on source order.
    fn reference_function(&mut self, fid: u32, span: Span) -> Result<()> {
        if let Some(&caller) = self.checking.last() {
            self.references.push(Reference {
                caller,
                callee: fid,
                span,
            });
        }
        let entry = &self.functions[fid as usize];
        if entry.sig.ret.is_some()
            || !matches!(entry.function.body, FunctionBody::Pending)
            || self.checking.contains(&fid)
        {
            return Ok(());
        }
        let Some(body) = self.bodies.get(&fid).copied() else {
            return Ok(());
        };
        log::trace!("checking '{}' ahead of its declaration", entry.function.name);
        self.check_deferred(fid, body)
    }

    /// The signature of method `method` of `info`, with its return type
    /// inferred first when it is declared in this module.
    fn method_sig(
        &mut self,
        info: &TypeInfo,
        method: &MethodInfo,
        span: Span,
    ) -> Result<FunctionSig> {
        if info.module != self.module {
            return Ok(method.sig.clone());
        }
        self.reference_function(method.fid, span)?;
        Ok(self.functions[method.fid as usize].sig.clone())
    }

    /// Reject cycles of calls or references that pass through a function
    /// whose return type is inferred, wherever the cycle was entered.
    fn check_inferred_recursion(&self) -> Result<()> {
        let mut graph = DiGraph::<u32, ()>::new();
        let mut nodes: FxHashMap<u32, NodeIndex> = FxHashMap::default();
        for reference in &self.references {
            let caller = *nodes
                .entry(reference.caller)
                .or_insert_with(|| graph.add_node(reference.caller));
            let callee = *nodes
                .entry(reference.callee)
                .or_insert_with(|| graph.add_node(reference.callee));
            graph.add_edge(caller, callee, ());
        }

        let mut component = FxHashMap::default();
        for (index, scc) in tarjan_scc(&graph).into_iter().enumerate() {
            let cyclic = scc.len() > 1;
            for node in scc {
                component.insert(graph[node], (index, cyclic));
            }
        }

        for reference in &self.references {
            let callee = &self.functions[reference.callee as usize];
            if !callee.inferred {
                continue;
            }
            let caller = component.get(&reference.caller);
            let same_cycle = match (caller, component.get(&reference.callee)) {
                (Some(&(a, cyclic)), Some(&(b, _))) => cyclic && a == b,
                _ => false,
            };
            if same_cycle || reference.caller == reference.callee {
                return Err(TypecheckError::new(
                    TypecheckErrorKind::MissingReturnType,
                    reference.span,
                    format!(
                        "Function '{}' is recursive and needs a return type annotation",
                        callee.function.name
                    ),
                ));
            }
        }
        Ok(())
    }

    /// The signature of a function as a value type.
    fn function_type(&self, fid: u32, span: Span) -> Result<Type> {
        let entry = &self.functions[fid as usize];
        entry
            .sig
            .to_type()
            .ok_or_else(|| missing_return_type(&entry.function.name, span))
    }

    fn extern_ref(&mut self, module: &str, symbol: &str) -> u32 {
        let key = ExternRef {
            module: module.to_string(),
            symbol: symbol.to_string(),
        };
        if let Some(index) = self.extern_index.get(&key) {
            return *index;
        }
        let index = self.externs.len() as u32;
        self.externs.push(key.clone());
        self.extern_index.insert(key, index);
        index
    }

    /// How to call function `fid` of the module declaring `info`.
    fn member_callee(&mut self, info_module: &str, fid: u32, symbol: &str) -> Callee {
        if info_module == self.module {
            Callee::Direct(fid)
        } else {
            Callee::Extern(self.extern_ref(info_module, symbol))
        }
    }

    fn finish(mut self) -> (TypedModule, ModuleInterface) {
        for id in &self.declared_types {
            let Some(info) = self.registry.get(*id) else { continue };
            match &info.kind {
                TypeKind::Struct { ctor, .. } => {
                    self.exports
                        .push((info.name.clone(), ExportTarget::Function(*ctor)));
                }
                TypeKind::Enum { variants } => {
                    for variant in variants {
                        if let Some(ctor) = variant.ctor {
                            self.exports.push((
                                format!("{}.{}", info.name, variant.name),
                                ExportTarget::Function(ctor),
                            ));
                        }
                    }
                }
            }
            for method in &info.methods {
                self.exports.push((
                    format!("{}.{}", info.name, method.name),
                    ExportTarget::Function(method.fid),
                ));
            }
        }
        for (name, fid) in &self.exported_functions {
            self.interface.exports.insert(
                name.clone(),
                ExportedSymbol::Function(self.functions[*fid as usize].sig.clone()),
            );
        }

        let module = TypedModule {
            name: self.module,
            functions: self.functions.into_iter().map(|e| e.function).collect(),
            globals: self.global_names,
            exports: self.exports,
            externs: self.externs,
            types: self.declared_types,
            dependencies: self.dependencies,
        };
        (module, self.interface)
    }
}

/// Top-level statements with `export` unwrapped.
fn declarations<'s, 'ast>(
    items: &'s [Stmt<'ast>],
) -> impl Iterator<Item = (&'s Stmt<'ast>, bool)> {
    items.iter().map(|stmt| match stmt {
        Stmt::Export(export) => (&export.decl, true),
        other => (other, false),
    })
}

fn duplicate(name: &Ident<'_>) -> TypecheckError {
    TypecheckError::new(
        TypecheckErrorKind::DuplicateDeclaration,
        name.span,
        format!("Duplicate declaration of '{}'", name.name),
    )
}

fn missing_return_type(name: &str, span: Span) -> TypecheckError {
    TypecheckError::new(
        TypecheckErrorKind::MissingReturnType,
        span,
        format!(
            "Function '{name}' is used before its return type is known; add a return type annotation"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use abra_parser::Parser;
    use abra_parser::ast::{Expr, LiteralExpr, LiteralKind, ParenExpr};
    use bumpalo::Bump;

    fn check_in(
        name: &str,
        source: &str,
        registry: &mut TypeRegistry,
        interfaces: &FxHashMap<String, ModuleInterface>,
    ) -> Result<(TypedModule, ModuleInterface)> {
        let arena = Bump::new();
        let script = Parser::parse(source, &arena).expect("source should parse");
        check_module(name, &script, &Prelude::standard(), registry, interfaces)
    }

    fn check(source: &str) -> Result<TypedModule> {
        check_in("main", source, &mut TypeRegistry::new(), &FxHashMap::default()).map(|(m, _)| m)
    }

    /// Type of the module's final expression.
    fn value_type(source: &str) -> String {
        let module = check(source).unwrap_or_else(|e| panic!("unexpected error: {e}"));
        match &module.functions[0].body {
            FunctionBody::Expr(body) => body.ty.to_string(),
            other => panic!("main has no body: {other:?}"),
        }
    }

    fn error_kind(source: &str) -> TypecheckErrorKind {
        check(source).expect_err("expected a type error").kind
    }

    #[test]
    fn infers_literals_and_operators() {
        assert_eq!(value_type("val x = 1\nx + 2"), "Int");
        assert_eq!(value_type("1.5 * 2.0"), "Float");
        assert_eq!(value_type("\"n = \" + 1"), "String");
        assert_eq!(value_type("val name = \"abra\"\n\"hi $name\""), "String");
        assert_eq!(value_type("[1, 2, 3]"), "Int[]");
        assert_eq!(error_kind("1 + 1.5"), TypecheckErrorKind::InvalidOperator);
        assert_eq!(error_kind("!1"), TypecheckErrorKind::InvalidOperator);
    }

    #[test]
    fn indexing_and_coalescing() {
        assert_eq!(value_type("[1, 2, 3][10]"), "Int?");
        assert_eq!(value_type("[1, 2, 3][10] ?: -1"), "Int");
        assert_eq!(error_kind("1 ?: 2"), TypecheckErrorKind::NotOptional);
        assert_eq!(error_kind("[1][0] ?: \"a\""), TypecheckErrorKind::TypeMismatch);
    }

    #[test]
    fn reassigning_a_val_reports_the_assignment() {
        let error = check("val a = 1\na = 2").expect_err("val is immutable");
        assert_eq!(error.kind, TypecheckErrorKind::ImmutableAssignment);
        assert_eq!(error.span.line, 2);

        assert!(check("var a = 1\na = 2").is_ok());
        assert_eq!(
            error_kind("func f(x: Int) {\n  x = 2\n}"),
            TypecheckErrorKind::ImmutableAssignment
        );
        assert_eq!(error_kind("func f() {}\nf = f"), TypecheckErrorKind::ImmutableAssignment);
    }

    #[test]
    fn bindings_need_a_known_type() {
        assert_eq!(error_kind("val x"), TypecheckErrorKind::InvalidDeclaration);
        assert_eq!(error_kind("var x"), TypecheckErrorKind::InvalidDeclaration);
        assert!(check("var x: Int? \nx = 3").is_ok());
        assert_eq!(error_kind("val xs = []"), TypecheckErrorKind::CannotInfer);
        assert_eq!(error_kind("val n = None"), TypecheckErrorKind::CannotInfer);
        assert_eq!(value_type("val xs: Int[] = []\nxs"), "Int[]");
        assert_eq!(error_kind("val s: String = 1"), TypecheckErrorKind::TypeMismatch);
        assert_eq!(error_kind("val a = 1\nval a = 2"), TypecheckErrorKind::DuplicateDeclaration);
    }

    #[test]
    fn unused_values_must_be_discarded() {
        assert_eq!(error_kind("1 + 2\nprintln(1)"), TypecheckErrorKind::UnusedValue);
        assert!(check("_ = 1 + 2\nprintln(1)").is_ok());
        assert!(check("val xs = [1]\nxs.push(2)\nxs.length").is_ok());
    }

    #[test]
    fn if_expressions() {
        assert_eq!(value_type("val c = true\nif c 1 else 2"), "Int");
        assert_eq!(value_type("val c = true\nif c 1"), "Int?");
        assert_eq!(value_type("val x: Int? = 3\nif x |v| v + 1 else 0"), "Int");
        assert_eq!(value_type("val x: Int? = None\nif x |v| v else None"), "Int?");
        assert_eq!(error_kind("if 1 2 else 3"), TypecheckErrorKind::TypeMismatch);
        assert_eq!(error_kind("if true |v| 1 else 2"), TypecheckErrorKind::NotOptional);
        assert_eq!(error_kind("val c = true\nif c 1 else \"a\""), TypecheckErrorKind::TypeMismatch);
    }

    #[test]
    fn loops() {
        assert!(check("var i = 0\nwhile i < 3 {\n  i += 1\n}").is_ok());
        assert!(check("for x, i in [1, 2] {\n  println(x + i)\n}").is_ok());
        assert!(check("for x in range(0, 3) {\n  if x == 1 { break } else { continue }\n}").is_ok());
        assert_eq!(error_kind("break"), TypecheckErrorKind::InvalidLoopControl);
        assert_eq!(error_kind("for x in 3 {}"), TypecheckErrorKind::TypeMismatch);
    }

    #[test]
    fn recursion_needs_a_return_type() {
        let fib = "func fib(n: Int): Int {\n  if (n == 0) 0 else if (n == 1) 1 else fib(n - 2) + fib(n - 1)\n}\nfib(12)";
        assert_eq!(value_type(fib), "Int");
        assert_eq!(
            error_kind("func f(n: Int) = f(n - 1)"),
            TypecheckErrorKind::MissingReturnType
        );
        assert_eq!(
            error_kind("func odd(n: Int): Bool = even(n)\nfunc even(n: Int) = odd(n)"),
            TypecheckErrorKind::MissingReturnType
        );
        assert_eq!(
            error_kind("func even(n: Int) = odd(n)\nfunc odd(n: Int): Bool = even(n)"),
            TypecheckErrorKind::MissingReturnType
        );
        assert_eq!(
            error_kind("func a(n: Int) = if n == 0 0 else b(n - 1)\nfunc b(n: Int): Int = a(n)"),
            TypecheckErrorKind::MissingReturnType
        );
        assert_eq!(
            error_kind("func b(n: Int): Int = a(n)\nfunc a(n: Int) = if n == 0 0 else b(n - 1)"),
            TypecheckErrorKind::MissingReturnType
        );
    }

    #[test]
    fn inferred_functions_can_be_used_before_their_declaration() {
        assert_eq!(value_type("func b(): Int = a()\nfunc a() = 1\nb()"), "Int");
        assert_eq!(value_type("func b() = a() + 1\nfunc a() = 1\nb()"), "Int");
        assert_eq!(value_type("val f = later\nfunc later() = \"x\"\nf()"), "String");
        assert_eq!(
            value_type("func first() = twice(1)\nfunc twice<T>(x: T): T[] = [x, x]\nfirst()"),
            "Int[]"
        );
    }

    #[test]
    fn inferred_methods_can_be_called() {
        let source = "type P {\n  x: Int\n  func doubled(self) = self.x * 2\n  func quad(self) = self.doubled() * 2\n}\nP(x: 1).quad()";
        assert_eq!(value_type(source), "Int");
        let reversed = "type P {\n  x: Int\n  func quad(self) = self.doubled() * 2\n  func doubled(self) = self.x * 2\n}\nP(x: 1).quad()";
        assert_eq!(value_type(reversed), "Int");
        let looping = "type P {\n  x: Int\n  func a(self) = self.b()\n  func b(self): Int = self.a()\n}";
        assert_eq!(error_kind(looping), TypecheckErrorKind::MissingReturnType);
    }

    #[test]
    fn deeply_nested_expressions_are_rejected() {
        let arena = Bump::new();
        let span = Span::default();
        let mut expr: &Expr<'_> = arena.alloc(Expr::Literal(LiteralExpr {
            kind: LiteralKind::Int(1),
            span,
        }));
        for _ in 0..1_000 {
            expr = arena.alloc(Expr::Paren(arena.alloc(ParenExpr { expr, span })));
        }

        let prelude = Prelude::standard();
        let mut registry = TypeRegistry::new();
        let interfaces = FxHashMap::default();
        let mut checker = TypeChecker::new("main", &prelude, &mut registry, &interfaces);
        let error = checker.check_expr(expr, None).expect_err("nesting is bounded");
        assert_eq!(error.kind, TypecheckErrorKind::NestingTooDeep);

        let shallow = format!("val x = 1\n{}x{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(value_type(&shallow), "Int");
    }

    #[test]
    fn parameters_and_arguments() {
        let f = "func f(a: Int, b = 2): Int = a + b\n";
        assert_eq!(value_type(&format!("{f}f(1)")), "Int");
        assert_eq!(value_type(&format!("{f}f(b: 3, a: 1)")), "Int");
        assert_eq!(
            error_kind(&format!("{f}f(1, b: 3)")),
            TypecheckErrorKind::MixedArguments
        );
        assert_eq!(error_kind(&format!("{f}f(c: 1)")), TypecheckErrorKind::InvalidArgument);
        assert_eq!(error_kind(&format!("{f}f()")), TypecheckErrorKind::ArgumentCount);
        assert_eq!(error_kind(&format!("{f}f(1, 2, 3)")), TypecheckErrorKind::ArgumentCount);
        assert_eq!(error_kind(&format!("{f}f(\"a\")")), TypecheckErrorKind::TypeMismatch);
        assert_eq!(
            error_kind("func g(a = 1, b: Int): Int = b"),
            TypecheckErrorKind::InvalidParameterOrder
        );
    }

    #[test]
    fn generics_and_lambdas() {
        let id = "func id<T>(x: T): T = x\n";
        assert_eq!(value_type(&format!("{id}id(\"s\")")), "String");
        assert_eq!(value_type(&format!("{id}id<Int>(1)")), "Int");

        let apply = "func apply(f: (Int) => Int, x: Int): Int = f(x)\n";
        assert_eq!(value_type(&format!("{apply}apply(n => n * 2, 3)")), "Int");

        let map = "func map<T, U>(xs: T[], f: (T) => U): U[] {\n  val out: U[] = []\n  for x in xs {\n    out.push(f(x))\n  }\n  out\n}\n";
        assert_eq!(value_type(&format!("{map}map([1, 2], x => \"$x\")")), "String[]");

        assert_eq!(value_type("val add = (a: Int, b = 1) => a + b\nadd(2)"), "Int");
        assert_eq!(error_kind("val f = x => x"), TypecheckErrorKind::CannotInfer);
        assert_eq!(error_kind("val p = println"), TypecheckErrorKind::NotAValue);
    }

    #[test]
    fn function_values_ignore_extra_defaults() {
        let source = "func twice(f: (Int) => Int): Int = f(f(1))\nfunc inc(n: Int, by = 1): Int = n + by\ntwice(inc)";
        assert_eq!(value_type(source), "Int");
    }

    #[test]
    fn types_and_methods() {
        let person = "type Person {\n  name: String\n  age: Int = 0\n  func greet(self): String = \"Hi \" + self.name\n  func make(): Person = Person(name: \"x\")\n}\n";
        assert_eq!(value_type(&format!("{person}Person(name: \"a\").greet()")), "String");
        assert_eq!(value_type(&format!("{person}Person.make().age")), "Int");
        assert_eq!(
            value_type(&format!("{person}val p: Person? = None\np?.name")),
            "String?"
        );
        assert_eq!(
            error_kind(&format!("{person}val p: Person? = None\np.name")),
            TypecheckErrorKind::OptionalAccess
        );
        assert_eq!(
            error_kind(&format!("{person}Person(name: \"a\").height")),
            TypecheckErrorKind::UnknownMember
        );
        assert!(check(&format!("{person}val p = Person(name: \"a\")\np.age = 3")).is_ok());
        assert_eq!(
            error_kind("type Bad {\n  func m(x: Int, self) = x\n}"),
            TypecheckErrorKind::InvalidDeclaration
        );
    }

    #[test]
    fn generic_types() {
        let node = "type Node<T> {\n  value: T\n  next: Node<T>? = None\n}\n";
        assert_eq!(value_type(&format!("{node}Node(value: 1)")), "Node<Int>");
        assert_eq!(value_type(&format!("{node}Node(value: 1).next?.value")), "Int?");
        assert_eq!(
            error_kind(&format!("{node}val n: Node = Node(value: 1)")),
            TypecheckErrorKind::TypeMismatch
        );
    }

    #[test]
    fn enums() {
        let color = "enum Color {\n  Red\n  Green\n  RGB(r: Int, g: Int, b: Int)\n  func isRed(self): Bool = self == Color.Red\n}\n";
        assert_eq!(value_type(&format!("{color}Color.Red")), "Color");
        assert_eq!(
            value_type(&format!("{color}Color.RGB(r: 1, g: 2, b: 3) == Color.Red")),
            "Bool"
        );
        assert_eq!(value_type(&format!("{color}Color.Green.isRed()")), "Bool");
        assert_eq!(error_kind(&format!("{color}Color.Red()")), TypecheckErrorKind::NotCallable);
        assert_eq!(error_kind(&format!("{color}Color()")), TypecheckErrorKind::NotCallable);
    }

    #[test]
    fn nested_functions_capture_locals() {
        let source = "func outer(): Int {\n  val a = 1\n  func inner(): Int = a + 1\n  inner()\n}\nouter()";
        let module = check(source).expect("nested functions check");
        let inner = module
            .functions
            .iter()
            .find(|f| f.name == "inner")
            .expect("inner is compiled");
        assert!(inner.flags.contains(FunctionFlags::NESTED));
        assert_eq!(
            error_kind("func f() {\n  type T {}\n}"),
            TypecheckErrorKind::InvalidDeclaration
        );
    }

    #[test]
    fn unknown_names() {
        assert_eq!(error_kind("x + 1"), TypecheckErrorKind::UnknownIdentifier);
        assert_eq!(error_kind("val x: Nope = 1"), TypecheckErrorKind::UnknownType);
        assert_eq!(error_kind("\"a\".size"), TypecheckErrorKind::UnknownMember);
    }

    #[test]
    fn imports_use_exported_interfaces() {
        let mut registry = TypeRegistry::new();
        let mut interfaces = FxHashMap::default();
        let (util, interface) = check_in(
            "util",
            "export func double(x: Int): Int = x * 2\nexport val answer = 42\nexport type Point {\n  x: Int\n  func sum(self): Int = self.x\n}",
            &mut registry,
            &interfaces,
        )
        .expect("util checks");
        assert!(util.exports.iter().any(|(name, _)| name == "Point.sum"));
        assert!(matches!(interface.get("double"), Some(ExportedSymbol::Function(_))));
        interfaces.insert("util".to_string(), interface);

        let (main, _) = check_in(
            "main",
            "import double, answer, Point from \"util\"\ndouble(answer) + Point(x: 1).sum()",
            &mut registry,
            &interfaces,
        )
        .expect("main checks");
        assert_eq!(main.dependencies, vec!["util".to_string()]);
        assert!(main.externs.iter().any(|e| e.symbol == "Point.sum"));

        let missing = check_in("main", "import triple from \"util\"", &mut registry, &interfaces)
            .expect_err("triple is not exported");
        assert_eq!(missing.kind, TypecheckErrorKind::UnresolvedImport);

        let missing = check_in("main", "import x from \"nope\"", &mut registry, &interfaces)
            .expect_err("module does not exist");
        assert_eq!(missing.kind, TypecheckErrorKind::ModuleNotFound);

        let imported = check_in(
            "main",
            "import answer from \"util\"\nanswer = 1",
            &mut registry,
            &interfaces,
        )
        .expect_err("imports are read-only");
        assert_eq!(imported.kind, TypecheckErrorKind::ImmutableAssignment);
    }
}
