//! Dynamic conversion binder.
//!
//! Given the statically known shape of an expression, a target type and a
//! [`ResultKind`], the binder decides how a runtime value converts and caches that
//! decision per call site as a guarded [`Rule`].
//!
//! # Architecture
//!
//! ```text
//! Binder (host surface)
//!   ├── CallSiteCache      per-site MRU rule lists, version-stamped
//!   ├── ConversionResolver the ordered conversion cascade
//!   │     ├── classify     pure type predicates
//!   │     ├── ConversionCatalog  user-defined and extension operators
//!   │     └── RuleBuilder  guard + computation accumulation
//!   └── Interpreter        executes rule computations
//! ```
//!
//! Resolution never fails: an inconvertible request yields a rule that raises a
//! conversion error (cast kinds) or returns the target's default value (try kinds)
//! when executed.

mod cache;
mod catalog;
pub mod classify;
mod config;
mod exec;
mod host;
mod overload;
mod request;
mod resolver;
mod rule;

pub use cache::{CallSiteCache, SiteId, SiteStats};
pub use catalog::{CatalogVersion, ConversionCatalog, OperatorSearch, UserConversion};
pub use config::BinderConfig;
pub use exec::{Interpreter, NestedConverter, NoNesting};
pub use host::Binder;
pub use overload::{ArgConversion, OverloadCandidate, OverloadMatch, select_overload};
pub use request::{ConversionRequest, ResultKind};
pub use resolver::ConversionResolver;
pub use rule::{
    Computation, Guard, NestedConversion, Rule, RuleBuilder, Strategy, TempId, Temporary,
};

use std::sync::Arc;

use lazy_static::lazy_static;

lazy_static! {
    static ref GLOBAL_CATALOG: Arc<ConversionCatalog> =
        Arc::new(ConversionCatalog::new(dynbind_registry::global()));
}

/// The process-wide default catalog over the global registry.
pub fn global_catalog() -> Arc<ConversionCatalog> {
    Arc::clone(&GLOBAL_CATALOG)
}
