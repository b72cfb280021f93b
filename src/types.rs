//! The type system: a scalar kind plus an ordered list of array dimensions.
//!
//! Two types are equal iff their kind and dims match element-wise. `Error`
//! is a sentinel used to suppress cascading diagnostics after a first
//! failure; it compares equal only to itself, which is exactly the
//! behavior needed to make error-silencing checks ("operand type is
//! Error, short circuit") fall out of ordinary `==`.

use serde::{Deserialize, Serialize};

/// Base kind of a type, independent of array dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Bool,
    Char,
    Int,
    Float,
    Double,
    String,
    Void,
    /// Sentinel for a node whose type could not be determined because an
    /// earlier diagnostic was already reported for it (or an operand of
    /// it). Never produced by user-visible success paths.
    Error,
}

impl Kind {
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Char | Kind::Int | Kind::Float | Kind::Double)
    }
}

/// A resolved type: `kind` plus zero or more array dimensions. An empty
/// `dims` means a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    pub kind: Kind,
    pub dims: Vec<usize>,
}

impl Type {
    pub fn new(kind: Kind) -> Self {
        Type { kind, dims: Vec::new() }
    }

    pub fn array(kind: Kind, dims: Vec<usize>) -> Self {
        Type { kind, dims }
    }

    pub fn error() -> Self {
        Type::new(Kind::Error)
    }

    pub fn is_error(&self) -> bool {
        self.kind == Kind::Error
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Number of elements implied by the dims (1 for a scalar).
    pub fn element_count(&self) -> usize {
        self.dims.iter().product::<usize>().max(if self.dims.is_empty() { 1 } else { 0 })
    }

    /// True if `other` may initialize a value of this type: either the
    /// types are equal, or this type is `Double` and `other` is `Float`
    /// (the one widening allowance, initialization-only — see the
    /// semantic analyzer).
    pub fn accepts_initializer(&self, other: &Type) -> bool {
        self == other || (self.kind == Kind::Double && other.kind == Kind::Float && self.dims == other.dims)
    }

    pub fn display(&self) -> String {
        let base = match self.kind {
            Kind::Bool => "bool",
            Kind::Char => "char",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Double => "double",
            Kind::String => "string",
            Kind::Void => "void",
            Kind::Error => "error",
        };
        let mut s = base.to_string();
        for d in &self.dims {
            s.push('[');
            s.push_str(&d.to_string());
            s.push(']');
        }
        s
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_types_equal_by_kind() {
        assert_eq!(Type::new(Kind::Int), Type::new(Kind::Int));
        assert_ne!(Type::new(Kind::Int), Type::new(Kind::Float));
    }

    #[test]
    fn array_types_compare_dims() {
        let a = Type::array(Kind::Int, vec![3, 4]);
        let b = Type::array(Kind::Int, vec![3, 4]);
        let c = Type::array(Kind::Int, vec![4, 3]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn error_equals_only_itself() {
        assert_eq!(Type::error(), Type::error());
        assert_ne!(Type::error(), Type::new(Kind::Int));
    }

    #[test]
    fn double_accepts_float_initializer_only() {
        let double_ty = Type::new(Kind::Double);
        let float_ty = Type::new(Kind::Float);
        assert!(double_ty.accepts_initializer(&float_ty));
        assert!(!float_ty.accepts_initializer(&double_ty));
    }

    #[test]
    fn element_count_of_array() {
        let t = Type::array(Kind::Int, vec![2, 3]);
        assert_eq!(t.element_count(), 6);
        assert_eq!(Type::new(Kind::Int).element_count(), 1);
    }
}
