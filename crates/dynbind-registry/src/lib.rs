//! Type registry for dynamic conversion binding.
//!
//! Interns the [`TypeShape`](dynbind_core::TypeShape) of every runtime type the binder
//! encounters and instantiates the generic wrappers it reasons about.

mod registry;

pub use registry::TypeRegistry;

use std::sync::Arc;

use lazy_static::lazy_static;

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<TypeRegistry> = Arc::new(TypeRegistry::with_builtins());
}

/// The process-wide default registry, built with the built-in types on first use.
pub fn global() -> Arc<TypeRegistry> {
    Arc::clone(&GLOBAL_REGISTRY)
}
