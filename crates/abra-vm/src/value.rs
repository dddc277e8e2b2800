//! Runtime values.
//!
//! Options are flattened: a present `T?` is the `T` value itself and an
//! absent one is [`Value::None`]. Arrays and instances are shared and
//! mutable through `RefCell`, so aliases observe each other's writes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use abra_compiler::TypeMeta;
use abra_core::TypeId;

use crate::env::Env;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Rc<str>),
    Unit,
    None,
    Array(Rc<RefCell<Vec<Value>>>),
    Closure(Rc<Closure>),
    Instance(Rc<Instance>),
    Variant(Rc<Variant>),
    /// An omitted argument whose default has not been evaluated yet.
    #[doc(hidden)]
    Unset,
}

/// A function value.
#[derive(Debug)]
pub struct Closure {
    /// Index of the defining module in the program.
    pub module: usize,
    pub function: u32,
    pub name: Rc<str>,
    /// The defining frame's environment, for nested functions and lambdas.
    pub env: Option<Rc<Env>>,
}

/// An instance of a declared type.
#[derive(Debug)]
pub struct Instance {
    pub type_id: TypeId,
    pub meta: Rc<TypeMeta>,
    pub fields: RefCell<Vec<Value>>,
}

/// A value of a declared enum.
#[derive(Debug)]
pub struct Variant {
    pub type_id: TypeId,
    pub meta: Rc<TypeMeta>,
    pub variant: u16,
    /// Empty for unit variants.
    pub payload: RefCell<Vec<Value>>,
}

impl Value {
    pub fn string(text: impl Into<Rc<str>>) -> Self {
        Value::Str(text.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Truthiness of a `Bool`; anything else is a type error the checker
    /// rules out, reported as `None`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "String",
            Value::Unit => "Unit",
            Value::None => "None",
            Value::Array(_) => "Array",
            Value::Closure(_) => "Function",
            Value::Instance(_) => "Instance",
            Value::Variant(_) => "Enum",
            Value::Unset => "Unset",
        }
    }

    /// Write the value as it appears inside an array or instance, where
    /// strings are quoted.
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{s}\""),
            other => fmt::Display::fmt(other, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
            Value::Unit => f.write_str("()"),
            Value::None => f.write_str("None"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                f.write_str("]")
            }
            Value::Closure(closure) => write!(f, "<func {}>", closure.name),
            Value::Instance(instance) => {
                f.write_str(&instance.meta.name)?;
                fmt_fields(f, &instance.meta.fields, &instance.fields.borrow())
            }
            Value::Variant(value) => {
                let variant = value.meta.variants.get(value.variant as usize);
                let name = variant.map_or("?", |v| v.name.as_str());
                write!(f, "{}.{}", value.meta.name, name)?;
                match variant.and_then(|v| v.fields.as_ref()) {
                    Some(fields) => fmt_fields(f, fields, &value.payload.borrow()),
                    None => Ok(()),
                }
            }
            Value::Unset => f.write_str("<unset>"),
        }
    }
}

fn fmt_fields(f: &mut fmt::Formatter<'_>, names: &[String], values: &[Value]) -> fmt::Result {
    f.write_str("(")?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match names.get(i) {
            Some(name) => write!(f, "{name}: ")?,
            None => write!(f, "{i}: ")?,
        }
        value.fmt_nested(f)?;
    }
    f.write_str(")")
}

/// Structural equality; functions are equal only to themselves.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Unit, Value::Unit) | (Value::None, Value::None) | (Value::Unset, Value::Unset) => {
                true
            }
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => {
                Rc::ptr_eq(a, b) || (a.type_id == b.type_id && *a.fields.borrow() == *b.fields.borrow())
            }
            (Value::Variant(a), Value::Variant(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.type_id == b.type_id
                        && a.variant == b.variant
                        && *a.payload.borrow() == *b.payload.borrow())
            }
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abra_compiler::VariantMeta;

    fn person() -> Rc<TypeMeta> {
        Rc::new(TypeMeta {
            name: "Person".to_string(),
            fields: vec!["name".to_string(), "age".to_string()],
            variants: Vec::new(),
        })
    }

    fn color() -> Rc<TypeMeta> {
        Rc::new(TypeMeta {
            name: "Color".to_string(),
            fields: Vec::new(),
            variants: vec![
                VariantMeta {
                    name: "Red".to_string(),
                    fields: None,
                },
                VariantMeta {
                    name: "RGB".to_string(),
                    fields: Some(vec!["r".to_string(), "g".to_string(), "b".to_string()]),
                },
            ],
        })
    }

    #[test]
    fn scalars_display_plainly() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::string("hi").to_string(), "hi");
        assert_eq!(Value::Unit.to_string(), "()");
        assert_eq!(Value::None.to_string(), "None");
    }

    #[test]
    fn nested_strings_are_quoted() {
        let value = Value::array(vec![Value::string("a"), Value::Int(1), Value::None]);
        assert_eq!(value.to_string(), "[\"a\", 1, None]");

        let instance = Value::Instance(Rc::new(Instance {
            type_id: TypeId(1),
            meta: person(),
            fields: RefCell::new(vec![Value::string("Ann"), Value::Int(30)]),
        }));
        assert_eq!(instance.to_string(), "Person(name: \"Ann\", age: 30)");
    }

    #[test]
    fn variants_show_their_enum() {
        let red = Value::Variant(Rc::new(Variant {
            type_id: TypeId(2),
            meta: color(),
            variant: 0,
            payload: RefCell::new(Vec::new()),
        }));
        assert_eq!(red.to_string(), "Color.Red");

        let rgb = Value::Variant(Rc::new(Variant {
            type_id: TypeId(2),
            meta: color(),
            variant: 1,
            payload: RefCell::new(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        }));
        assert_eq!(rgb.to_string(), "Color.RGB(r: 1, g: 2, b: 3)");
        assert_ne!(red, rgb);
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(
            Value::array(vec![Value::Int(1), Value::string("x")]),
            Value::array(vec![Value::Int(1), Value::string("x")])
        );
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::None, Value::Unit);

        let closure = Rc::new(Closure {
            module: 0,
            function: 1,
            name: "f".into(),
            env: None,
        });
        let same = Value::Closure(closure.clone());
        assert_eq!(same, Value::Closure(closure));
        let other = Value::Closure(Rc::new(Closure {
            module: 0,
            function: 1,
            name: "f".into(),
            env: None,
        }));
        assert_ne!(same, other);
        assert_eq!(same.to_string(), "<func f>");
    }
}
