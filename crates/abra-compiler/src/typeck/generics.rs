//! Type parameter inference.
//!
//! Calls to generic functions bind type parameters by walking a parameter
//! type (the pattern) alongside the argument type (the actual). The first
//! binding found for a parameter wins; later mismatches are reported when the
//! substituted parameter types are checked against the arguments.

use abra_core::Type;
use rustc_hash::FxHashMap;

/// Bind the type parameters `params` occurring in `pattern` to the
/// corresponding parts of `actual`.
pub fn bind(
    pattern: &Type,
    actual: &Type,
    params: &[String],
    bindings: &mut FxHashMap<String, Type>,
) {
    match (pattern, actual) {
        (Type::Generic(name), _) => {
            if params.contains(name) && !bindings.contains_key(name) && !actual.has_unknown() {
                bindings.insert(name.clone(), actual.clone());
            }
        }
        (Type::Array(p), Type::Array(a)) => bind(p, a, params, bindings),
        (Type::Option(p), Type::Option(a)) => bind(p, a, params, bindings),
        (Type::Option(p), a) => bind(p, a, params, bindings),
        (p, Type::Option(a)) => bind(p, a, params, bindings),
        (Type::Function(p), Type::Function(a)) => {
            for (pp, ap) in p.params.iter().zip(&a.params) {
                bind(&pp.ty, &ap.ty, params, bindings);
            }
            bind(&p.ret, &a.ret, params, bindings);
        }
        (Type::Named(p), Type::Named(a)) if p.id == a.id => {
            for (pa, aa) in p.args.iter().zip(&a.args) {
                bind(pa, aa, params, bindings);
            }
        }
        _ => {}
    }
}

/// Collect the names of type parameters occurring in `ty`.
pub fn generic_names(ty: &Type, out: &mut Vec<String>) {
    match ty {
        Type::Generic(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Type::Array(inner) | Type::Option(inner) => generic_names(inner, out),
        Type::Function(f) => {
            for p in &f.params {
                generic_names(&p.ty, out);
            }
            generic_names(&f.ret, out);
        }
        Type::Named(n) => {
            for arg in &n.args {
                generic_names(arg, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abra_core::TypeId;

    fn t(name: &str) -> Type {
        Type::Generic(name.into())
    }

    #[test]
    fn binds_through_structure() {
        let params = vec!["T".to_string(), "U".to_string()];
        let mut bindings = FxHashMap::default();
        let pattern = Type::function(vec![t("T")], Type::array(t("U")));
        let actual = Type::function(vec![Type::String], Type::array(Type::Int));
        bind(&pattern, &actual, &params, &mut bindings);
        assert_eq!(bindings.get("T"), Some(&Type::String));
        assert_eq!(bindings.get("U"), Some(&Type::Int));
    }

    #[test]
    fn first_binding_wins_and_unknown_is_skipped() {
        let params = vec!["T".to_string()];
        let mut bindings = FxHashMap::default();
        bind(&Type::array(t("T")), &Type::array(Type::Unknown), &params, &mut bindings);
        assert!(bindings.is_empty());
        bind(&t("T"), &Type::Int, &params, &mut bindings);
        bind(&t("T"), &Type::String, &params, &mut bindings);
        assert_eq!(bindings.get("T"), Some(&Type::Int));
    }

    #[test]
    fn option_pattern_unwraps_plain_values() {
        let params = vec!["T".to_string()];
        let mut bindings = FxHashMap::default();
        bind(&Type::option(t("T")), &Type::Float, &params, &mut bindings);
        assert_eq!(bindings.get("T"), Some(&Type::Float));
    }

    #[test]
    fn foreign_generics_are_not_bound() {
        let mut bindings = FxHashMap::default();
        bind(&t("X"), &Type::Int, &["T".to_string()], &mut bindings);
        assert!(bindings.is_empty());
    }

    #[test]
    fn named_args_and_collection() {
        let id = TypeId::of("main", "Box");
        let pattern = Type::named(id, "Box", vec![t("T")]);
        let actual = Type::named(id, "Box", vec![Type::Bool]);
        let mut bindings = FxHashMap::default();
        bind(&pattern, &actual, &["T".to_string()], &mut bindings);
        assert_eq!(bindings.get("T"), Some(&Type::Bool));

        let mut names = Vec::new();
        generic_names(&Type::function(vec![t("A"), t("B")], t("A")), &mut names);
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }
}
