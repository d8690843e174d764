//! Dynamic conversion binding for dynamically typed language runtimes.
//!
//! `dynbind` decides, at each call site of a dynamic language, how a runtime value
//! converts to a statically requested type: boxing, reference assignment, numeric
//! widening, `Nullable<T>` construction, user-defined conversion operators,
//! enumerator adaptation and delegate synthesis. Each decision is a guarded [`Rule`]
//! cached per call site, so later values of the same runtime type skip resolution.
//!
//! # Example
//!
//! ```
//! use dynbind::prelude::*;
//!
//! let binder = Binder::with_defaults();
//! let nullable = binder.registry().nullable_of(well_known::INT32).unwrap();
//!
//! let request = binder
//!     .request(well_known::INT32, nullable.hash, ResultKind::ImplicitCast)
//!     .unwrap();
//! let site = binder.call_site(request);
//!
//! let wrapped = binder.convert(site, Value::Int32(5)).unwrap();
//! assert_eq!(wrapped, Value::nullable(well_known::INT32, Value::Int32(5)));
//! ```

pub use dynbind_binder::{
    ArgConversion, Binder, BinderConfig, CallSiteCache, CatalogVersion, Computation,
    ConversionCatalog, ConversionRequest, ConversionResolver, Guard, Interpreter,
    NestedConversion, NestedConverter, NoNesting, OperatorSearch, OverloadCandidate,
    OverloadMatch, ResultKind, Rule, RuleBuilder, SiteId, SiteStats, Strategy, TempId,
    Temporary, UserConversion, classify, global_catalog, select_overload,
};
pub use dynbind_core::{
    BindingError, ConfigError, ConversionError, ConversionOperator, ConversionRank,
    DelegateValue, EnumeratorValue, ExtensibleValue, GenericInstance, NullableValue,
    NumericKind, ObjectValue, OverloadError, RegistrationError, ShapeFlags, TypeHash,
    TypeShape, Value, operator_names, well_known,
};
pub use dynbind_registry::{TypeRegistry, global as global_registry};

/// The types most hosts need.
pub mod prelude {
    pub use crate::{
        Binder, BinderConfig, BindingError, ConversionError, ConversionOperator,
        ConversionRequest, ObjectValue, OverloadCandidate, ResultKind, SiteId, TypeHash,
        TypeRegistry, TypeShape, Value, well_known,
    };
}
