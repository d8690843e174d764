//! Stateless classification queries over type shapes.
//!
//! Everything here is a pure function of interned [`TypeShape`]s: the supertype
//! closure and extensible payload are computed once at registration, so each query
//! is a flag test or a set lookup.

use dynbind_core::{NumericKind, ShapeFlags, TypeHash, TypeShape, well_known};

/// True if a value of `from` can be used as `to` without conversion.
///
/// `to` is a supertype or interface of `from`, or `from` is the null sentinel and
/// `to` is a reference type.
pub fn is_assignable_to(from: &TypeShape, to: &TypeShape) -> bool {
    from.derives_from(to.hash) || (from.is_null() && !to.is_value_type())
}

/// True for the primitive numeric kinds.
pub fn is_numeric(shape: &TypeShape) -> bool {
    shape.numeric.is_some()
}

/// True if every value of `from` is representable by `to`.
pub fn is_implicitly_widenable(from: NumericKind, to: NumericKind) -> bool {
    from.rank().widens_to(to.rank())
}

/// The underlying payload type of an `Extensible<T>` or any subclass of one.
pub fn unwrap_extensible(shape: &TypeShape) -> Option<TypeHash> {
    shape.extensible_payload
}

/// The payload type of a direct `Extensible<T>` instance (subclasses excluded).
pub fn unwrap_direct_extensible(shape: &TypeShape) -> Option<TypeHash> {
    shape.single_generic_arg(well_known::EXTENSIBLE)
}

/// The `T` of a `Nullable<T>`.
pub fn unwrap_nullable(shape: &TypeShape) -> Option<TypeHash> {
    shape.single_generic_arg(well_known::NULLABLE)
}

/// True for COM interop objects.
pub fn is_com_interop_object(shape: &TypeShape) -> bool {
    shape.flags.contains(ShapeFlags::COM_OBJECT) || shape.derives_from(well_known::COM_OBJECT)
}

/// True if the type has a get-enumerator capability.
pub fn is_enumerable_like(shape: &TypeShape) -> bool {
    shape.derives_from(well_known::ENUMERABLE)
}

/// True if the type implements `IEnumerable<item>`.
pub fn is_enumerable_of(shape: &TypeShape, item: TypeHash) -> bool {
    shape.derives_from(TypeHash::from_generic_instance(well_known::ENUMERABLE_OF, &[item]))
}

/// True for concrete delegate types; the root delegate type itself is excluded.
pub fn is_delegate_like(shape: &TypeShape) -> bool {
    shape.hash != well_known::DELEGATE && shape.derives_from(well_known::DELEGATE)
}
