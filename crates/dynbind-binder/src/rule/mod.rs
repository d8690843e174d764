//! Guarded, cacheable conversion rules.
//!
//! A [`Rule`] pairs a guard over the runtime type of the converted value with the
//! [`Computation`] to run when the guard passes. Rules are immutable once built and
//! are shared between threads through the call-site cache.

mod builder;
mod computation;

pub use builder::RuleBuilder;
pub use computation::{Computation, NestedConversion, TempId, Temporary};

use std::fmt;

use dynbind_core::TypeHash;

use crate::request::ResultKind;

/// The cascade stage that produced a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Conversion to `object`: box a value type or pass a reference through.
    ToObject,
    /// The source is already assignable to the target.
    Assignable,
    /// Read the payload of an `Extensible<T>`.
    ExtensibleUnwrap,
    /// Call a user-defined conversion operator.
    UserDefined,
    /// Implicit numeric widening.
    NumericWidening,
    /// Construct a `Nullable<T>`.
    Nullable,
    /// Call get-enumerator on an enumerable.
    Enumerable,
    /// The null sentinel converted to a reference type.
    NullToReference,
    /// COM object to interface; checked by the object at runtime.
    ComInterface,
    /// Delegate synthesized around a callable value.
    Delegate,
    /// No conversion applies.
    NoConversion,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::ToObject => "to-object",
            Strategy::Assignable => "assignable",
            Strategy::ExtensibleUnwrap => "extensible-unwrap",
            Strategy::UserDefined => "user-defined",
            Strategy::NumericWidening => "numeric-widening",
            Strategy::Nullable => "nullable",
            Strategy::Enumerable => "enumerable",
            Strategy::NullToReference => "null-to-reference",
            Strategy::ComInterface => "com-interface",
            Strategy::Delegate => "delegate",
            Strategy::NoConversion => "no-conversion",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conjunction of exact runtime-type tests.
///
/// An empty guard accepts every runtime type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Guard {
    exact_types: Vec<TypeHash>,
}

impl Guard {
    /// A guard that always passes.
    pub fn always() -> Self {
        Self::default()
    }

    pub fn exact(runtime_type: TypeHash) -> Self {
        Self {
            exact_types: vec![runtime_type],
        }
    }

    pub(crate) fn push(&mut self, runtime_type: TypeHash) {
        if !self.exact_types.contains(&runtime_type) {
            self.exact_types.push(runtime_type);
        }
    }

    pub fn is_unconditional(&self) -> bool {
        self.exact_types.is_empty()
    }

    pub fn accepts(&self, runtime_type: TypeHash) -> bool {
        self.exact_types.iter().all(|&t| t == runtime_type)
    }

    /// The runtime types tested, in the order they were added.
    pub fn exact_types(&self) -> &[TypeHash] {
        &self.exact_types
    }
}

/// A resolved conversion: a guard plus the computation it protects.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    guard: Guard,
    target: Computation,
    temporaries: Vec<Temporary>,
    strategy: Strategy,
    kind: ResultKind,
    catalog_version: u64,
}

impl Rule {
    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    /// True if this rule may be reused for a value of `runtime_type`.
    pub fn guard_accepts(&self, runtime_type: TypeHash) -> bool {
        self.guard.accepts(runtime_type)
    }

    /// The computation run when the guard passes.
    pub fn target(&self) -> &Computation {
        &self.target
    }

    pub fn temporaries(&self) -> &[Temporary] {
        &self.temporaries
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    /// True if this rule reports that no conversion exists.
    pub fn is_error(&self) -> bool {
        self.strategy == Strategy::NoConversion
    }

    /// Catalog version the rule was resolved under.
    pub fn catalog_version(&self) -> u64 {
        self.catalog_version
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.guard.is_unconditional() {
            write!(f, "[{}] {}", self.strategy, self.target)
        } else {
            let tests: Vec<String> = self
                .guard
                .exact_types
                .iter()
                .map(|t| format!("type == {t}"))
                .collect();
            write!(
                f,
                "[{}] if {} => {}",
                self.strategy,
                tests.join(" && "),
                self.target
            )
        }
    }
}
