//! Constant pool for compiled modules.
//!
//! The constant pool stores values that are referenced by bytecode instructions:
//! numeric literals, string data, and declared-type identities.

use std::fmt;

use abra_core::TypeId;
use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

/// Values stored in the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    /// String literal text.
    Str(String),
    /// Identity of a declared type or enum (for instance construction).
    Type(TypeId),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{v:?}"),
            Constant::Str(s) => write!(f, "{s:?}"),
            Constant::Type(id) => write!(f, "type {id}"),
        }
    }
}

/// Module-level constant pool with deduplication.
///
/// Shared across all functions in a module to avoid duplicate strings/values.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// The actual constants.
    constants: Vec<Constant>,
    /// Deduplication index: maps constant to its index.
    index: FxHashMap<ConstantKey, u32>,
}

/// Key for constant deduplication (hashable version of Constant).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Type(TypeId),
}

impl ConstantPool {
    /// Create a new empty constant pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or get existing constant, returns index.
    ///
    /// Deduplicates identical constants.
    pub fn add(&mut self, constant: Constant) -> u32 {
        let key = Self::to_key(&constant);

        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }

        let idx = self.constants.len() as u32;
        self.constants.push(constant);
        self.index.insert(key, idx);
        idx
    }

    /// Add an integer constant.
    pub fn add_int(&mut self, value: i64) -> u32 {
        self.add(Constant::Int(value))
    }

    /// Add a float constant.
    pub fn add_float(&mut self, value: f64) -> u32 {
        self.add(Constant::Float(value))
    }

    /// Add string data.
    pub fn add_string(&mut self, value: &str) -> u32 {
        self.add(Constant::Str(value.to_string()))
    }

    /// Add a type identity.
    pub fn add_type(&mut self, id: TypeId) -> u32 {
        self.add(Constant::Type(id))
    }

    /// Get constant by index.
    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    /// Get all constants.
    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    /// Number of constants.
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Convert a Constant to its hashable key representation.
    ///
    /// Float literals are never negative (negation is an instruction), so
    /// `OrderedFloat` folding `-0.0` into `0.0` cannot merge distinct literals.
    fn to_key(constant: &Constant) -> ConstantKey {
        match constant {
            Constant::Int(v) => ConstantKey::Int(*v),
            Constant::Float(v) => ConstantKey::Float(OrderedFloat(*v)),
            Constant::Str(s) => ConstantKey::Str(s.clone()),
            Constant::Type(id) => ConstantKey::Type(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pool_is_empty() {
        let pool = ConstantPool::new();
        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn add_each_kind() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.add_int(42), 0);
        assert_eq!(pool.add_float(2.5), 1);
        assert_eq!(pool.add_string("hello"), 2);
        let id = TypeId::of("main", "Person");
        assert_eq!(pool.add_type(id), 3);

        assert_eq!(pool.get(0), Some(&Constant::Int(42)));
        assert_eq!(pool.get(2), Some(&Constant::Str("hello".into())));
        assert_eq!(pool.get(3), Some(&Constant::Type(id)));
    }

    #[test]
    fn deduplication() {
        let mut pool = ConstantPool::new();

        let idx1 = pool.add_int(100);
        let idx2 = pool.add_int(200);
        let idx3 = pool.add_int(100); // Duplicate

        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(idx3, 0);
        assert_eq!(pool.len(), 2);

        assert_eq!(pool.add_string("a"), pool.add_string("a"));
        assert_eq!(pool.add_float(1.0), pool.add_float(1.0));
    }

    #[test]
    fn int_and_float_with_same_value_are_distinct() {
        let mut pool = ConstantPool::new();
        let int = pool.add_int(1);
        let float = pool.add_float(1.0);
        assert_ne!(int, float);
    }

    #[test]
    fn display() {
        assert_eq!(Constant::Int(3).to_string(), "3");
        assert_eq!(Constant::Float(1.0).to_string(), "1.0");
        assert_eq!(Constant::Str("a\"b".into()).to_string(), "\"a\\\"b\"");
    }

    #[test]
    fn get_out_of_bounds() {
        let pool = ConstantPool::new();
        assert_eq!(pool.get(0), None);
    }
}
