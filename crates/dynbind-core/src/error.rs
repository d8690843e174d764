//! Unified error types for dynamic conversion binding.
//!
//! ## Error Hierarchy
//!
//! ```text
//! BindingError (top-level wrapper)
//! ├── ConversionError   - Failures while executing a conversion rule
//! ├── RegistrationError - Type registration and generic instantiation errors
//! ├── OverloadError     - Overload selection failures
//! └── ConfigError       - Invalid binder configuration
//! ```
//!
//! Resolution itself never fails: an inconvertible request still produces a rule,
//! whose error computation raises [`ConversionError::NoConversion`] when executed
//! (or returns a sentinel for the try kinds).

use thiserror::Error;

use crate::TypeHash;

// ============================================================================
// Conversion Errors
// ============================================================================

/// Errors raised while executing a conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// No stage of the conversion cascade applies.
    ///
    /// Carries both the source runtime type and the requested target so host
    /// error messages can name them.
    #[error("cannot convert from '{from_name}' to '{to_name}'")]
    NoConversion {
        from: TypeHash,
        from_name: String,
        to: TypeHash,
        to_name: String,
    },

    /// A computation received a value of the wrong shape.
    #[error("invalid cast: {0}")]
    InvalidCast(String),

    /// A conversion operator reported failure.
    #[error("conversion operator '{method}' failed: {message}")]
    OperatorFailed { method: String, message: String },

    /// A type referenced at execution time is not registered.
    #[error("unknown type: {0}")]
    UnknownType(TypeHash),

    /// A get-enumerator call on a value that cannot be enumerated.
    #[error("value of type '{0}' is not enumerable")]
    NotEnumerable(String),
}

impl ConversionError {
    /// Create a no-conversion error.
    pub fn no_conversion(
        from: TypeHash,
        from_name: impl Into<String>,
        to: TypeHash,
        to_name: impl Into<String>,
    ) -> Self {
        ConversionError::NoConversion {
            from,
            from_name: from_name.into(),
            to,
            to_name: to_name.into(),
        }
    }

    /// Create an operator failure.
    pub fn operator_failed(method: impl Into<String>, message: impl Into<String>) -> Self {
        ConversionError::OperatorFailed {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Check if this is a no-conversion error.
    pub fn is_no_conversion(&self) -> bool {
        matches!(self, ConversionError::NoConversion { .. })
    }
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors that occur while registering types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// A different type with this identity already exists.
    #[error("duplicate type: {0}")]
    DuplicateType(String),

    /// A referenced type was not found.
    #[error("type not found: {0}")]
    UnknownType(TypeHash),

    /// A conversion was requested at a call site that was never allocated.
    #[error("call site not registered: {0:#x}")]
    UnknownSite(u64),

    /// A generic definition was instantiated with the wrong number of arguments.
    #[error("generic '{definition}' expects {expected} type argument(s), got {actual}")]
    InvalidGenericArity {
        definition: String,
        expected: usize,
        actual: usize,
    },
}

// ============================================================================
// Overload Errors
// ============================================================================

/// Errors from selecting among overloaded candidates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverloadError {
    #[error("no candidates for overload resolution")]
    NoCandidates,

    /// No candidate accepts the argument types.
    #[error("no overload of '{name}' accepts ({args})")]
    NoMatch { name: String, args: String },

    /// Two or more candidates are equally good.
    #[error("ambiguous call to '{name}': {candidates}")]
    Ambiguous { name: String, candidates: String },
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Invalid binder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("call-site cache capacity must be at least 1")]
    ZeroCacheCapacity,
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Top-level error type for the binder.
///
/// Each variant uses `#[from]` to enable automatic conversion with the `?` operator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// Conversion execution error.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Type registration error.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Overload selection error.
    #[error(transparent)]
    Overload(#[from] OverloadError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BindingError {
    /// Check if this is a conversion error.
    pub fn is_conversion(&self) -> bool {
        matches!(self, BindingError::Conversion(_))
    }

    /// Check if this is a registration error.
    pub fn is_registration(&self) -> bool {
        matches!(self, BindingError::Registration(_))
    }

    /// Check if this is an overload selection error.
    pub fn is_overload(&self) -> bool {
        matches!(self, BindingError::Overload(_))
    }

    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, BindingError::Config(_))
    }
}
