//! Builtin functions and members available to every module.

use abra_core::Type;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use rustc_hash::FxHashMap;

use super::info::{FunctionSig, ParamSig};

/// A function implemented by the VM.
///
/// The discriminant is the operand of `CALL_BUILTIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Builtin {
    /// `println(value: Any): Unit`
    Println = 0,
    /// `range(from: Int, to: Int): Int[]`, end exclusive.
    Range,
    /// `array.length`
    ArrayLength,
    /// `array.push(item)`
    ArrayPush,
    /// `string.length`
    StringLength,
    /// `string.toUpper()`
    StringToUpper,
    /// `string.toLower()`
    StringToLower,
}

impl Builtin {
    /// Convert from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// The name as written in source.
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Println => "println",
            Builtin::Range => "range",
            Builtin::ArrayLength | Builtin::StringLength => "length",
            Builtin::ArrayPush => "push",
            Builtin::StringToUpper => "toUpper",
            Builtin::StringToLower => "toLower",
        }
    }
}

/// How a builtin member of a receiver type is accessed.
#[derive(Debug, Clone)]
pub enum BuiltinMember {
    /// Read like a field (`arr.length`).
    Property { builtin: Builtin, ty: Type },
    /// Called like a method (`arr.push(x)`); the signature excludes the receiver.
    Method { builtin: Builtin, sig: FunctionSig },
}

/// The builtin signatures, built once per toolchain.
#[derive(Debug, Clone)]
pub struct Prelude {
    functions: FxHashMap<&'static str, (Builtin, FunctionSig)>,
}

impl Prelude {
    /// Build the standard prelude.
    pub fn standard() -> Self {
        let mut functions = FxHashMap::default();
        functions.insert(
            "println",
            (
                Builtin::Println,
                FunctionSig::new(vec![ParamSig::required("value", Type::Any)], Type::Unit),
            ),
        );
        functions.insert(
            "range",
            (
                Builtin::Range,
                FunctionSig::new(
                    vec![
                        ParamSig::required("from", Type::Int),
                        ParamSig::required("to", Type::Int),
                    ],
                    Type::array(Type::Int),
                ),
            ),
        );
        log::debug!("built prelude with {} functions", functions.len());
        Self { functions }
    }

    /// Look up a free builtin function.
    pub fn function(&self, name: &str) -> Option<(Builtin, &FunctionSig)> {
        self.functions.get(name).map(|(builtin, sig)| (*builtin, sig))
    }

    /// Look up a builtin member of `receiver`.
    pub fn member(&self, receiver: &Type, name: &str) -> Option<BuiltinMember> {
        match (receiver, name) {
            (Type::Array(_), "length") => Some(BuiltinMember::Property {
                builtin: Builtin::ArrayLength,
                ty: Type::Int,
            }),
            (Type::Array(element), "push") => Some(BuiltinMember::Method {
                builtin: Builtin::ArrayPush,
                sig: FunctionSig::new(
                    vec![ParamSig::required("item", (**element).clone())],
                    Type::Unit,
                ),
            }),
            (Type::String, "length") => Some(BuiltinMember::Property {
                builtin: Builtin::StringLength,
                ty: Type::Int,
            }),
            (Type::String, "toUpper") => Some(BuiltinMember::Method {
                builtin: Builtin::StringToUpper,
                sig: FunctionSig::new(vec![], Type::String),
            }),
            (Type::String, "toLower") => Some(BuiltinMember::Method {
                builtin: Builtin::StringToLower,
                sig: FunctionSig::new(vec![], Type::String),
            }),
            _ => None,
        }
    }
}

impl Default for Prelude {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_round_trips_through_u8() {
        for builtin in [Builtin::Println, Builtin::Range, Builtin::StringToLower] {
            assert_eq!(Builtin::from_u8(builtin.into()), Some(builtin));
        }
        assert_eq!(Builtin::from_u8(200), None);
    }

    #[test]
    fn free_functions() {
        let prelude = Prelude::standard();
        let (builtin, sig) = prelude.function("range").unwrap();
        assert_eq!(builtin, Builtin::Range);
        assert_eq!(sig.params.len(), 2);
        assert_eq!(sig.ret, Some(Type::array(Type::Int)));
        assert!(prelude.function("print").is_none());
    }

    #[test]
    fn members_depend_on_receiver() {
        let prelude = Prelude::standard();
        let push = prelude.member(&Type::array(Type::String), "push");
        match push {
            Some(BuiltinMember::Method { builtin, sig }) => {
                assert_eq!(builtin, Builtin::ArrayPush);
                assert_eq!(sig.params[0].ty, Type::String);
            }
            other => panic!("expected push method, got {other:?}"),
        }
        assert!(prelude.member(&Type::String, "push").is_none());
        assert!(matches!(
            prelude.member(&Type::String, "length"),
            Some(BuiltinMember::Property { builtin: Builtin::StringLength, .. })
        ));
    }
}
