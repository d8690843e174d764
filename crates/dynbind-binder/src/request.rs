//! Conversion requests.

use std::fmt;
use std::sync::Arc;

use dynbind_core::{TypeHash, TypeShape, well_known};

/// How a conversion reports failure, and whether explicit operators may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResultKind {
    /// Implicit conversions only; failure raises a conversion error.
    ImplicitCast = 0,
    /// Implicit conversions only; failure yields the try sentinel.
    ImplicitTry = 1,
    /// Explicit conversions allowed; failure raises a conversion error.
    ExplicitCast = 2,
    /// Explicit conversions allowed; failure yields the try sentinel.
    ExplicitTry = 3,
}

impl ResultKind {
    pub const ALL: [ResultKind; 4] = [
        ResultKind::ImplicitCast,
        ResultKind::ImplicitTry,
        ResultKind::ExplicitCast,
        ResultKind::ExplicitTry,
    ];

    /// True for the kinds that return a sentinel instead of failing.
    pub const fn is_try(self) -> bool {
        matches!(self, ResultKind::ImplicitTry | ResultKind::ExplicitTry)
    }

    /// True for the kinds that may use explicit conversion operators.
    pub const fn is_explicit(self) -> bool {
        matches!(self, ResultKind::ExplicitCast | ResultKind::ExplicitTry)
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultKind::ImplicitCast => "implicit cast",
            ResultKind::ImplicitTry => "implicit try",
            ResultKind::ExplicitCast => "explicit cast",
            ResultKind::ExplicitTry => "explicit try",
        };
        f.write_str(name)
    }
}

/// A request to convert a value of some static shape to a target type.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Statically known shape of the expression being converted.
    pub static_shape: Arc<TypeShape>,
    /// Requested target type.
    pub target: Arc<TypeShape>,
    pub kind: ResultKind,
    /// Type the conversion expression produces, which decides the try sentinel.
    ///
    /// Equal to the target except for nested conversions, which produce `object`.
    pub result_type: TypeHash,
}

impl ConversionRequest {
    pub fn new(static_shape: Arc<TypeShape>, target: Arc<TypeShape>, kind: ResultKind) -> Self {
        let result_type = target.hash;
        Self {
            static_shape,
            target,
            kind,
            result_type,
        }
    }

    /// Make the conversion produce `object`, so a failed try yields null.
    pub fn returning_object(mut self) -> Self {
        self.result_type = well_known::OBJECT;
        self
    }

    /// The identity of the site a rule of this request converts through when it
    /// needs a nested conversion to `target`.
    pub fn nested_site_hash(&self, target: TypeHash) -> TypeHash {
        TypeHash::from_nested_site(self.static_shape.hash, target, self.kind.as_u8())
    }
}

impl PartialEq for ConversionRequest {
    fn eq(&self, other: &Self) -> bool {
        self.static_shape.hash == other.static_shape.hash
            && self.target.hash == other.target.hash
            && self.kind == other.kind
            && self.result_type == other.result_type
    }
}

impl Eq for ConversionRequest {}

impl fmt::Display for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.static_shape, self.target, self.kind
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynbind_registry::TypeRegistry;

    #[test]
    fn kind_predicates() {
        assert!(ResultKind::ImplicitTry.is_try());
        assert!(ResultKind::ExplicitTry.is_try());
        assert!(!ResultKind::ExplicitCast.is_try());
        assert!(ResultKind::ExplicitCast.is_explicit());
        assert!(!ResultKind::ImplicitCast.is_explicit());
    }

    #[test]
    fn nested_result_type() {
        let registry = TypeRegistry::with_builtins();
        let object = registry.get(well_known::OBJECT).unwrap();
        let int32 = registry.get(well_known::INT32).unwrap();
        let request = ConversionRequest::new(object, int32, ResultKind::ExplicitTry);
        assert_eq!(request.result_type, well_known::INT32);
        assert_eq!(
            request.clone().returning_object().result_type,
            well_known::OBJECT
        );
        assert_ne!(request, request.clone().returning_object());
    }

    #[test]
    fn display() {
        let registry = TypeRegistry::with_builtins();
        let request = ConversionRequest::new(
            registry.get(well_known::INT32).unwrap(),
            registry.get(well_known::INT64).unwrap(),
            ResultKind::ImplicitCast,
        );
        assert_eq!(request.to_string(), "int32 -> int64 (implicit cast)");
    }
}
