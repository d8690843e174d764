//! Core types for dynamic conversion binding.
//!
//! ## Modules
//!
//! - [`type_hash`]: Deterministic type, operator and call-site identities
//! - [`numeric`]: Primitive numeric kinds and their widening order
//! - [`shape`]: Runtime type descriptors and conversion operators
//! - [`value`]: Runtime values
//! - [`error`]: Error hierarchy

pub mod error;
pub mod numeric;
pub mod shape;
pub mod type_hash;
pub mod value;

pub use error::{BindingError, ConfigError, ConversionError, OverloadError, RegistrationError};
pub use numeric::{ConversionRank, NumericKind};
pub use shape::{
    ConversionFn, ConversionOperator, GenericInstance, ShapeFlags, TypeShape, operator_names,
};
pub use type_hash::{TypeHash, hash_constants, well_known};
pub use value::{
    DelegateValue, EnumeratorValue, ExtensibleValue, NullableValue, ObjectValue, Value,
};
