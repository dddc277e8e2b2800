//! Declaration metadata produced by signature hoisting.
//!
//! [`TypeInfo`] records describe user-declared types and enums. They are
//! kept in a session-wide [`TypeRegistry`] so that modules checked later can
//! use the types of the modules they import. [`ModuleInterface`] lists what a
//! module exports to its importers.

use abra_core::{FunctionType, ParamType, Type, TypeId};
use rustc_hash::FxHashMap;

/// One declared parameter of a function signature.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSig {
    pub name: String,
    pub ty: Type,
    pub has_default: bool,
}

impl ParamSig {
    /// A parameter every call must supply.
    pub fn required(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            has_default: false,
        }
    }

    /// A parameter with a default value.
    pub fn optional(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            has_default: true,
        }
    }
}

/// The signature of a declared function, method or constructor.
///
/// `ret` is `None` while the body of a function without a return annotation
/// has not been checked yet.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    pub type_params: Vec<String>,
    pub params: Vec<ParamSig>,
    pub ret: Option<Type>,
}

impl FunctionSig {
    /// A non-generic signature with a known return type.
    pub fn new(params: Vec<ParamSig>, ret: Type) -> Self {
        Self {
            type_params: Vec::new(),
            params,
            ret: Some(ret),
        }
    }

    /// The function type of a value referring to this function.
    pub fn to_type(&self) -> Option<Type> {
        let ret = self.ret.clone()?;
        Some(Type::Function(FunctionType {
            params: self
                .params
                .iter()
                .map(|p| ParamType {
                    ty: p.ty.clone(),
                    optional: p.has_default,
                })
                .collect(),
            ret: Box::new(ret),
        }))
    }

    /// Find a parameter by name.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

/// A field of a declared type or data variant.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub ty: Type,
    pub has_default: bool,
}

/// A variant of a declared enum.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantInfo {
    pub name: String,
    /// `None` for unit variants.
    pub fields: Option<Vec<FieldInfo>>,
    /// Function id of the constructor, for data variants.
    pub ctor: Option<u32>,
}

/// A method of a declared type or enum.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: String,
    /// Instance method (`self` first) rather than static.
    pub has_self: bool,
    /// Signature without the receiver.
    pub sig: FunctionSig,
    /// Function id in the declaring module.
    pub fid: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Struct { fields: Vec<FieldInfo>, ctor: u32 },
    Enum { variants: Vec<VariantInfo> },
}

/// A user-declared type or enum.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: String,
    /// Name of the declaring module.
    pub module: String,
    pub type_params: Vec<String>,
    pub kind: TypeKind,
    pub methods: Vec<MethodInfo>,
}

impl TypeInfo {
    /// The type of `self` inside the declaration: `Name<T, ...>`.
    pub fn self_type(&self) -> Type {
        Type::named(
            self.id,
            self.name.clone(),
            self.type_params
                .iter()
                .map(|p| Type::Generic(p.clone()))
                .collect(),
        )
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum { .. })
    }

    /// Fields of a struct type, empty for enums.
    pub fn fields(&self) -> &[FieldInfo] {
        match &self.kind {
            TypeKind::Struct { fields, .. } => fields,
            TypeKind::Enum { .. } => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<(usize, &FieldInfo)> {
        self.fields().iter().enumerate().find(|(_, f)| f.name == name)
    }

    pub fn variant(&self, name: &str) -> Option<(usize, &VariantInfo)> {
        match &self.kind {
            TypeKind::Enum { variants } => variants.iter().enumerate().find(|(_, v)| v.name == name),
            TypeKind::Struct { .. } => None,
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Bind the declaration's type parameters to `args`.
    pub fn bindings(&self, args: &[Type]) -> FxHashMap<String, Type> {
        self.type_params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect()
    }

    /// Signature of the constructor of a struct type.
    pub fn ctor_sig(&self) -> FunctionSig {
        FunctionSig {
            type_params: self.type_params.clone(),
            params: fields_as_params(self.fields()),
            ret: Some(self.self_type()),
        }
    }

    /// Signature of the constructor of a data variant.
    pub fn variant_sig(&self, variant: &VariantInfo) -> FunctionSig {
        FunctionSig {
            type_params: self.type_params.clone(),
            params: fields_as_params(variant.fields.as_deref().unwrap_or_default()),
            ret: Some(self.self_type()),
        }
    }
}

fn fields_as_params(fields: &[FieldInfo]) -> Vec<ParamSig> {
    fields
        .iter()
        .map(|f| ParamSig {
            name: f.name.clone(),
            ty: f.ty.clone(),
            has_default: f.has_default,
        })
        .collect()
}

/// All declared types of a compilation session.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: FxHashMap<TypeId, TypeInfo>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, info: TypeInfo) {
        self.types.insert(info.id, info);
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeInfo> {
        self.types.get(&id)
    }

    pub fn get_mut(&mut self, id: TypeId) -> Option<&mut TypeInfo> {
        self.types.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// A name a module makes available to importers.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportedSymbol {
    /// A `val` or `var`.
    Value(Type),
    /// A function.
    Function(FunctionSig),
    /// A type or enum.
    Type(TypeId),
}

/// The user-visible exports of a module.
#[derive(Debug, Clone, Default)]
pub struct ModuleInterface {
    pub name: String,
    pub exports: FxHashMap<String, ExportedSymbol>,
}

impl ModuleInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exports: FxHashMap::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ExportedSymbol> {
        self.exports.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_info() -> TypeInfo {
        TypeInfo {
            id: TypeId::of("main", "Node"),
            name: "Node".into(),
            module: "main".into(),
            type_params: vec!["T".into()],
            kind: TypeKind::Struct {
                fields: vec![
                    FieldInfo {
                        name: "value".into(),
                        ty: Type::Generic("T".into()),
                        has_default: false,
                    },
                    FieldInfo {
                        name: "next".into(),
                        ty: Type::option(Type::named(
                            TypeId::of("main", "Node"),
                            "Node",
                            vec![Type::Generic("T".into())],
                        )),
                        has_default: true,
                    },
                ],
                ctor: 1,
            },
            methods: vec![],
        }
    }

    #[test]
    fn ctor_signature_mirrors_fields() {
        let info = node_info();
        let sig = info.ctor_sig();
        assert_eq!(sig.type_params, vec!["T".to_string()]);
        assert_eq!(sig.params.len(), 2);
        assert!(!sig.params[0].has_default);
        assert!(sig.params[1].has_default);
        assert_eq!(sig.ret.map(|t| t.to_string()), Some("Node<T>".into()));
    }

    #[test]
    fn bindings_substitute_fields() {
        let info = node_info();
        let bindings = info.bindings(&[Type::Int]);
        let (index, field) = info.field("next").unwrap();
        assert_eq!(index, 1);
        assert_eq!(field.ty.substitute(&bindings).to_string(), "Node<Int>?");
    }

    #[test]
    fn signature_type_marks_defaults() {
        let sig = FunctionSig::new(
            vec![
                ParamSig::required("a", Type::Int),
                ParamSig::optional("b", Type::String),
            ],
            Type::Bool,
        );
        assert_eq!(sig.to_type().unwrap().to_string(), "(Int, String = _) => Bool");
        assert_eq!(sig.param_index("b"), Some(1));

        let pending = FunctionSig { ret: None, ..sig };
        assert!(pending.to_type().is_none());
    }
}
