//! User-defined conversion operator lookup.
//!
//! The [`ConversionCatalog`] finds conversion operators by member lookup: operators
//! declared on a type and its base chain, then extension operators registered
//! against any of those types after the fact. Registering an extension operator bumps
//! the catalog version, which invalidates every cached rule resolved before it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use dynbind_core::{ConversionOperator, RegistrationError, TypeHash, TypeShape, operator_names};
use dynbind_registry::TypeRegistry;

use crate::classify;
use crate::request::ResultKind;

/// Shared, monotonically increasing catalog version.
#[derive(Debug, Clone, Default)]
pub struct CatalogVersion(Arc<AtomicU64>);

impl CatalogVersion {
    /// The current version.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// One step of a user-defined operator search: a member name and whether the search
/// is for implicit operators (which skips explicit-only ones).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorSearch {
    pub name: String,
    pub implicit: bool,
}

impl OperatorSearch {
    pub fn implicit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implicit: true,
        }
    }

    pub fn explicit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implicit: false,
        }
    }

    /// Member names tried for a conversion to `target_name`, in preference order.
    ///
    /// `op_Implicit`, then `ConvertTo<Target>`; explicit kinds go on to
    /// `op_Explicit` and `ConvertTo<Target>` with explicit-only operators allowed.
    pub fn preference_order(target_name: &str, kind: ResultKind) -> Vec<OperatorSearch> {
        let convert_to = operator_names::convert_to(target_name);
        let mut order = vec![
            OperatorSearch::implicit(operator_names::IMPLICIT),
            OperatorSearch::implicit(convert_to.clone()),
        ];
        if kind.is_explicit() {
            order.push(OperatorSearch::explicit(operator_names::EXPLICIT));
            order.push(OperatorSearch::explicit(convert_to));
        }
        order
    }
}

/// A matched user-defined conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct UserConversion {
    pub operator: ConversionOperator,
    /// Found by an implicit search step.
    pub implicit: bool,
}

/// Conversion operator lookup over a type registry.
pub struct ConversionCatalog {
    registry: Arc<TypeRegistry>,
    extensions: RwLock<FxHashMap<TypeHash, Vec<ConversionOperator>>>,
    version: CatalogVersion,
}

impl ConversionCatalog {
    /// Create a catalog with no extension operators.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            extensions: RwLock::new(FxHashMap::default()),
            version: CatalogVersion::default(),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The current catalog version.
    pub fn version(&self) -> u64 {
        self.version.current()
    }

    /// A handle that observes this catalog's version.
    pub fn version_handle(&self) -> CatalogVersion {
        self.version.clone()
    }

    /// Register a conversion operator against an existing type.
    ///
    /// The operator becomes visible to member lookup on its declaring type and every
    /// type derived from it. Returns the new catalog version.
    pub fn register_extension(
        &self,
        operator: ConversionOperator,
    ) -> Result<u64, RegistrationError> {
        self.registry.require(operator.declaring_type)?;
        let declaring = operator.declaring_type;
        let name = operator.name.clone();
        self.extensions
            .write()
            .entry(declaring)
            .or_default()
            .push(operator);
        let version = self.version.bump();
        debug!(
            operator = %name,
            declaring_type = %self.registry.name_of(declaring),
            version,
            "registered extension conversion operator"
        );
        Ok(version)
    }

    /// Number of registered extension operators.
    pub fn extension_count(&self) -> usize {
        self.extensions.read().values().map(Vec::len).sum()
    }

    /// Operators named `name` visible on `owner`, in lookup order.
    ///
    /// Declared operators of the type and then of each base, followed by extension
    /// operators in the same order.
    pub fn members(&self, owner: TypeHash, name: &str) -> Vec<ConversionOperator> {
        let mut chain = Vec::new();
        let mut current = Some(owner);
        while let Some(hash) = current
            && let Some(shape) = self.registry.get(hash)
        {
            current = shape.base;
            chain.push(shape);
        }

        let mut found: Vec<ConversionOperator> = chain
            .iter()
            .flat_map(|shape| shape.operators.iter())
            .filter(|op| op.name == name)
            .cloned()
            .collect();

        let extensions = self.extensions.read();
        for shape in &chain {
            if let Some(ops) = extensions.get(&shape.hash) {
                found.extend(ops.iter().filter(|op| op.name == name).cloned());
            }
        }
        found
    }

    /// Find a user-defined conversion from `check` to `to`.
    ///
    /// For each search step, operators on the source type are tried before those on
    /// the target type. An operator matches when it returns exactly `to` and its
    /// single parameter is assignable from `check`. The first match wins.
    pub fn find_user_defined_conversion(
        &self,
        check: &TypeShape,
        to: &TypeShape,
        order: &[OperatorSearch],
    ) -> Option<UserConversion> {
        order.iter().find_map(|search| {
            [check.hash, to.hash].into_iter().find_map(|owner| {
                self.members(owner, &search.name)
                    .into_iter()
                    .find(|op| self.is_applicable(op, search.implicit, check, to))
                    .map(|operator| UserConversion {
                        operator,
                        implicit: search.implicit,
                    })
            })
        })
    }

    fn is_applicable(
        &self,
        op: &ConversionOperator,
        implicit: bool,
        check: &TypeShape,
        to: &TypeShape,
    ) -> bool {
        if implicit && op.explicit_only {
            return false;
        }
        if op.ret != to.hash {
            return false;
        }
        match self.registry.get(op.param) {
            Some(param) => classify::is_assignable_to(check, &param),
            None => false,
        }
    }
}
