//! The Abra type model shared by the type checker and the compiler.

use std::fmt;

use rustc_hash::FxHashMap;
use xxhash_rust::xxh64::xxh64;

/// Identity of a user-declared type or enum.
///
/// Derived from the declaring module and the type name, so the same
/// declaration always gets the same id and two modules declaring `Node`
/// get different ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u64);

impl TypeId {
    /// Compute the id of `name` declared in `module`.
    pub fn of(module: &str, name: &str) -> Self {
        let qualified = format!("{module}::{name}");
        TypeId(xxh64(qualified.as_bytes(), 0))
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:016x}", self.0)
    }
}

/// A static type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    Unit,
    /// Accepts any value. Only builtin parameters use it.
    Any,
    /// The element type of a bare `None` before context fixes it.
    Unknown,
    Array(Box<Type>),
    /// Always construct through [`Type::option`], which flattens nesting.
    Option(Box<Type>),
    Function(FunctionType),
    Named(NamedType),
    /// A type parameter, e.g. the `T` in `func id<T>(x: T): T`.
    Generic(String),
}

/// Signature of a function value.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub params: Vec<ParamType>,
    pub ret: Box<Type>,
}

/// One parameter of a [`FunctionType`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParamType {
    pub ty: Type,
    /// The parameter has a default and may be omitted.
    pub optional: bool,
}

/// A reference to a declared type or enum, with its type arguments.
#[derive(Debug, Clone)]
pub struct NamedType {
    pub id: TypeId,
    pub name: String,
    pub args: Vec<Type>,
}

impl PartialEq for NamedType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.args == other.args
    }
}

impl Type {
    /// Build `inner?`, normalizing `Option(Option(T))` to `Option(T)`.
    pub fn option(inner: Type) -> Type {
        match inner {
            Type::Option(_) => inner,
            other => Type::Option(Box::new(other)),
        }
    }

    /// Build `inner[]`.
    pub fn array(inner: Type) -> Type {
        Type::Array(Box::new(inner))
    }

    /// Build a function type from required parameter types.
    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function(FunctionType {
            params: params
                .into_iter()
                .map(|ty| ParamType { ty, optional: false })
                .collect(),
            ret: Box::new(ret),
        })
    }

    /// Build a reference to a declared type.
    pub fn named(id: TypeId, name: impl Into<String>, args: Vec<Type>) -> Type {
        Type::Named(NamedType {
            id,
            name: name.into(),
            args,
        })
    }

    pub fn is_option(&self) -> bool {
        matches!(self, Type::Option(_))
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Unit)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// The `T` of `T?`, if this is an Option.
    pub fn option_inner(&self) -> Option<&Type> {
        match self {
            Type::Option(inner) => Some(inner),
            _ => None,
        }
    }

    /// The element type of an array.
    pub fn array_element(&self) -> Option<&Type> {
        match self {
            Type::Array(inner) => Some(inner),
            _ => None,
        }
    }

    /// Whether any type parameter occurs in this type.
    pub fn has_generics(&self) -> bool {
        match self {
            Type::Generic(_) => true,
            Type::Array(inner) | Type::Option(inner) => inner.has_generics(),
            Type::Function(f) => f.params.iter().any(|p| p.ty.has_generics()) || f.ret.has_generics(),
            Type::Named(n) => n.args.iter().any(Type::has_generics),
            _ => false,
        }
    }

    /// Whether an unresolved `Unknown` occurs in this type.
    pub fn has_unknown(&self) -> bool {
        match self {
            Type::Unknown => true,
            Type::Array(inner) | Type::Option(inner) => inner.has_unknown(),
            Type::Function(f) => f.params.iter().any(|p| p.ty.has_unknown()) || f.ret.has_unknown(),
            Type::Named(n) => n.args.iter().any(Type::has_unknown),
            _ => false,
        }
    }

    /// Replace type parameters with their bindings. Unbound parameters stay.
    pub fn substitute(&self, bindings: &FxHashMap<String, Type>) -> Type {
        if bindings.is_empty() {
            return self.clone();
        }
        match self {
            Type::Generic(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::Array(inner) => Type::array(inner.substitute(bindings)),
            Type::Option(inner) => Type::option(inner.substitute(bindings)),
            Type::Function(f) => Type::Function(FunctionType {
                params: f
                    .params
                    .iter()
                    .map(|p| ParamType {
                        ty: p.ty.substitute(bindings),
                        optional: p.optional,
                    })
                    .collect(),
                ret: Box::new(f.ret.substitute(bindings)),
            }),
            Type::Named(n) => Type::Named(NamedType {
                id: n.id,
                name: n.name.clone(),
                args: n.args.iter().map(|a| a.substitute(bindings)).collect(),
            }),
            other => other.clone(),
        }
    }

    /// Whether a value of type `value` may be stored where `self` is expected.
    pub fn accepts(&self, value: &Type) -> bool {
        match (self, value) {
            (Type::Any, _) => true,
            (Type::Option(_), Type::Option(v)) if **v == Type::Unknown => true,
            (Type::Option(t), Type::Option(v)) => t.accepts(v),
            (Type::Option(t), v) => t.accepts(v),
            (Type::Array(t), Type::Array(v)) => **v == Type::Unknown || t.equivalent(v),
            (Type::Function(expected), Type::Function(actual)) => expected.accepts(actual),
            (Type::Named(t), Type::Named(v)) => {
                t.id == v.id
                    && t.args.len() == v.args.len()
                    && t.args.iter().zip(&v.args).all(|(a, b)| a.equivalent(b))
            }
            (t, v) => t == v,
        }
    }

    /// Mutual acceptance, used where variance would be unsound (array
    /// elements, type arguments).
    pub fn equivalent(&self, other: &Type) -> bool {
        self.accepts(other) && other.accepts(self)
    }

    /// The common type of two branches, if they unify.
    ///
    /// `T` and `T?` unify to `T?`; a bare `None` adopts the other side.
    pub fn unify(&self, other: &Type) -> Option<Type> {
        if self.accepts(other) && !self.has_unknown() {
            return Some(self.clone());
        }
        if other.accepts(self) && !other.has_unknown() {
            return Some(other.clone());
        }
        let left = Type::option(self.clone());
        if left.accepts(other) && !left.has_unknown() {
            return Some(left);
        }
        let right = Type::option(other.clone());
        if right.accepts(self) && !right.has_unknown() {
            return Some(right);
        }
        if self == other {
            return Some(self.clone());
        }
        None
    }
}

impl FunctionType {
    /// Number of parameters without defaults.
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| !p.optional).count()
    }

    /// Whether a function of type `actual` can be used where `self` is
    /// expected.
    ///
    /// Every parameter of the expected signature must line up with one of
    /// the actual function's parameters, and every required parameter of the
    /// actual function must be supplied. Trailing defaulted parameters are
    /// ignored.
    pub fn accepts(&self, actual: &FunctionType) -> bool {
        if self.params.len() < actual.required_params() || self.params.len() > actual.params.len() {
            return false;
        }
        let params_match = self
            .params
            .iter()
            .zip(&actual.params)
            .all(|(expected, actual)| actual.ty.accepts(&expected.ty));
        params_match && (self.ret.is_unit() || self.ret.accepts(&actual.ret))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Bool => write!(f, "Bool"),
            Type::String => write!(f, "String"),
            Type::Unit => write!(f, "Unit"),
            Type::Any => write!(f, "Any"),
            Type::Unknown => write!(f, "_"),
            Type::Array(inner) => match **inner {
                Type::Function(_) => write!(f, "({inner})[]"),
                _ => write!(f, "{inner}[]"),
            },
            Type::Option(inner) => match **inner {
                Type::Function(_) => write!(f, "({inner})?"),
                _ => write!(f, "{inner}?"),
            },
            Type::Function(func) => write!(f, "{func}"),
            Type::Named(named) => {
                write!(f, "{}", named.name)?;
                if !named.args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in named.args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Generic(name) => write!(f, "{name}"),
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param.ty)?;
            if param.optional {
                write!(f, " = _")?;
            }
        }
        write!(f, ") => {}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_normalizes() {
        let nested = Type::option(Type::option(Type::Int));
        assert_eq!(nested, Type::option(Type::Int));
        assert_eq!(nested.to_string(), "Int?");
    }

    #[test]
    fn display_forms() {
        assert_eq!(Type::array(Type::option(Type::String)).to_string(), "String?[]");
        assert_eq!(
            Type::function(vec![Type::Int, Type::Int], Type::Bool).to_string(),
            "(Int, Int) => Bool"
        );
        let list = Type::named(TypeId::of("main", "List"), "List", vec![Type::Int]);
        assert_eq!(list.to_string(), "List<Int>");
    }

    #[test]
    fn named_types_compare_by_identity() {
        let a = Type::named(TypeId::of("a", "Node"), "Node", vec![]);
        let b = Type::named(TypeId::of("b", "Node"), "Node", vec![]);
        assert_ne!(a, b);
        assert!(!a.accepts(&b));
        assert_eq!(a, Type::named(TypeId::of("a", "Node"), "Node", vec![]));
    }

    #[test]
    fn option_accepts_inner_and_none() {
        let opt = Type::option(Type::Int);
        assert!(opt.accepts(&Type::Int));
        assert!(opt.accepts(&Type::option(Type::Unknown)));
        assert!(!Type::Int.accepts(&opt));
        assert!(!opt.accepts(&Type::String));
    }

    #[test]
    fn arrays_are_invariant() {
        let ints = Type::array(Type::Int);
        let opt_ints = Type::array(Type::option(Type::Int));
        assert!(!opt_ints.accepts(&ints));
        assert!(ints.accepts(&Type::array(Type::Unknown)));
    }

    #[test]
    fn function_with_defaults_satisfies_shorter_signature() {
        let expected = Type::function(vec![Type::Int], Type::Int);
        let actual = Type::Function(FunctionType {
            params: vec![
                ParamType { ty: Type::Int, optional: false },
                ParamType { ty: Type::Int, optional: true },
            ],
            ret: Box::new(Type::Int),
        });
        assert!(expected.accepts(&actual));

        let too_few = Type::function(vec![], Type::Int);
        assert!(!too_few.accepts(&actual));
    }

    #[test]
    fn unit_returning_signature_accepts_any_return() {
        let expected = Type::function(vec![Type::String], Type::Unit);
        let actual = Type::function(vec![Type::String], Type::Int);
        assert!(expected.accepts(&actual));
    }

    #[test]
    fn unify_branches() {
        assert_eq!(Type::Int.unify(&Type::Int), Some(Type::Int));
        assert_eq!(
            Type::Int.unify(&Type::option(Type::Unknown)),
            Some(Type::option(Type::Int))
        );
        assert_eq!(
            Type::option(Type::Int).unify(&Type::Int),
            Some(Type::option(Type::Int))
        );
        assert_eq!(Type::Int.unify(&Type::String), None);
    }

    #[test]
    fn substitute_generics() {
        let mut bindings = FxHashMap::default();
        bindings.insert("T".to_string(), Type::String);
        let ty = Type::function(vec![Type::Generic("T".into())], Type::array(Type::Generic("T".into())));
        assert_eq!(
            ty.substitute(&bindings),
            Type::function(vec![Type::String], Type::array(Type::String))
        );
        assert!(ty.has_generics());
        assert!(!ty.substitute(&bindings).has_generics());
    }

    #[test]
    fn type_ids_are_stable_and_distinct() {
        assert_eq!(TypeId::of("main", "Person"), TypeId::of("main", "Person"));
        assert_ne!(TypeId::of("main", "Person"), TypeId::of("main", "Color"));
    }
}
