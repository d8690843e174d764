//! TypeRegistry - process-wide interning of runtime type shapes.
//!
//! This module provides [`TypeRegistry`], the central store of every [`TypeShape`]
//! the binder has seen. Shapes are keyed by [`TypeHash`] and live for the life of
//! the registry; they are never evicted.
//!
//! # Storage Model
//!
//! - **Shapes**: `Arc<TypeShape>` in a sharded concurrent map. A shape is complete
//!   (supertype closure and extensible payload filled in) before it is published, so
//!   no reader can observe a half-built shape.
//! - **Generic instances**: `Nullable<T>`, `Extensible<T>`, `IEnumerable<T>` and
//!   `IEnumerator<T>` are built on first use through [`TypeRegistry::instantiate`].
//!
//! # Thread Safety
//!
//! `TypeRegistry` is `Sync`. Registration is construct-or-fetch: two threads racing to
//! intern value-equal shapes both receive the same published `Arc`; a racing shape
//! that differs from the published one is rejected as a duplicate.
//!
//! # Example
//!
//! ```
//! use dynbind_registry::TypeRegistry;
//! use dynbind_core::{TypeShape, well_known};
//!
//! let registry = TypeRegistry::with_builtins();
//! let foo = registry.register(TypeShape::class("Foo")).unwrap();
//! assert!(foo.derives_from(well_known::OBJECT));
//!
//! let nullable = registry.nullable_of(well_known::INT32).unwrap();
//! assert_eq!(nullable.name, "Nullable<int32>");
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rustc_hash::{FxBuildHasher, FxHashSet};
use tracing::debug;

use dynbind_core::{
    NumericKind, RegistrationError, ShapeFlags, TypeHash, TypeShape, Value, well_known,
};

/// Concurrent, append-only store of runtime type shapes.
#[derive(Default)]
pub struct TypeRegistry {
    shapes: DashMap<TypeHash, Arc<TypeShape>, FxBuildHasher>,
}

impl TypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in types pre-registered.
    ///
    /// Built-ins are `object`, `null`, `bool`, every numeric kind, `string`, the
    /// enumerable/enumerator capabilities, the generic definitions the binder
    /// recognizes, the root delegate type and the COM object root.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_builtins();
        registry
    }

    fn register_builtins(&self) {
        let none = ShapeFlags::empty();
        self.insert_root(TypeShape::builtin("object", well_known::OBJECT, none));
        self.insert_root(TypeShape::builtin("null", well_known::NULL, none));
        self.insert_root(TypeShape::builtin("bool", well_known::BOOL, ShapeFlags::VALUE_TYPE));
        for kind in NumericKind::ALL {
            self.insert_root(TypeShape::numeric(kind));
        }
        self.insert_root(TypeShape::builtin("string", well_known::STRING, none));
        self.insert_root(TypeShape::builtin(
            "IEnumerable",
            well_known::ENUMERABLE,
            ShapeFlags::INTERFACE,
        ));
        self.insert_root(TypeShape::builtin(
            "IEnumerator",
            well_known::ENUMERATOR,
            ShapeFlags::INTERFACE,
        ));
        for (name, hash) in [
            ("IEnumerable`1", well_known::ENUMERABLE_OF),
            ("IEnumerator`1", well_known::ENUMERATOR_OF),
            ("Nullable`1", well_known::NULLABLE),
            ("Extensible`1", well_known::EXTENSIBLE),
        ] {
            self.insert_root(TypeShape::builtin(name, hash, ShapeFlags::GENERIC_DEFINITION));
        }
        self.insert_root(TypeShape::builtin(
            "Delegate",
            well_known::DELEGATE,
            ShapeFlags::DELEGATE,
        ));
        self.insert_root(TypeShape::builtin(
            "__ComObject",
            well_known::COM_OBJECT,
            ShapeFlags::COM_OBJECT,
        ));
    }

    /// Insert a shape with no base and no interfaces.
    fn insert_root(&self, mut shape: TypeShape) {
        shape.supertypes = [shape.hash, well_known::OBJECT].into_iter().collect();
        self.shapes.insert(shape.hash, Arc::new(shape));
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Get a shape by hash.
    pub fn get(&self, hash: TypeHash) -> Option<Arc<TypeShape>> {
        self.shapes
            .get(&hash)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Get a shape by hash, failing if it is not registered.
    pub fn require(&self, hash: TypeHash) -> Result<Arc<TypeShape>, RegistrationError> {
        self.get(hash).ok_or(RegistrationError::UnknownType(hash))
    }

    /// Check if a type is registered.
    pub fn contains(&self, hash: TypeHash) -> bool {
        self.shapes.contains_key(&hash)
    }

    /// Display name of a type, or its hash if unregistered.
    pub fn name_of(&self, hash: TypeHash) -> String {
        match self.shapes.get(&hash) {
            Some(entry) => entry.name.clone(),
            None => hash.to_string(),
        }
    }

    /// Number of registered shapes.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// The exact runtime shape of a value.
    ///
    /// `Nullable<T>` values instantiate their shape on demand; every other runtime
    /// type must already be registered.
    pub fn shape_of(&self, value: &Value) -> Result<Arc<TypeShape>, RegistrationError> {
        match value {
            Value::Nullable(n) => self.nullable_of(n.payload),
            other => self.require(other.type_hash()),
        }
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a type shape.
    ///
    /// The base type and every interface must already be registered. Registering a
    /// shape equal to the one already published returns the published `Arc`; a
    /// different shape with the same identity is a [`RegistrationError::DuplicateType`].
    pub fn register(&self, shape: TypeShape) -> Result<Arc<TypeShape>, RegistrationError> {
        let shape = self.complete(shape)?;

        // Closure is computed before the entry lock is taken: it reads other shards.
        match self.shapes.entry(shape.hash) {
            Entry::Occupied(existing) => {
                if **existing.get() == shape {
                    Ok(Arc::clone(existing.get()))
                } else {
                    Err(RegistrationError::DuplicateType(shape.name))
                }
            }
            Entry::Vacant(slot) => {
                debug!(type_name = %shape.name, hash = %shape.hash, "registered type");
                let shape = Arc::new(shape);
                slot.insert(Arc::clone(&shape));
                Ok(shape)
            }
        }
    }

    /// Fill in the supertype closure and extensible payload of a shape.
    fn complete(&self, mut shape: TypeShape) -> Result<TypeShape, RegistrationError> {
        let mut supertypes = FxHashSet::default();
        supertypes.insert(shape.hash);
        supertypes.insert(well_known::OBJECT);

        let mut extensible_payload = shape.single_generic_arg(well_known::EXTENSIBLE);

        if let Some(base) = shape.base {
            let base_shape = self.require(base)?;
            supertypes.extend(base_shape.supertypes.iter().copied());
            // The base-most `Extensible<T>` in the chain is the underlying type
            extensible_payload = base_shape.extensible_payload.or(extensible_payload);
        }
        for &interface in &shape.interfaces {
            let interface_shape = self.require(interface)?;
            supertypes.extend(interface_shape.supertypes.iter().copied());
        }

        shape.supertypes = supertypes;
        shape.extensible_payload = extensible_payload;
        Ok(shape)
    }

    // ==========================================================================
    // Generic Instantiation
    // ==========================================================================

    /// Get or create an instance of a generic definition.
    pub fn instantiate(
        &self,
        definition: TypeHash,
        args: &[TypeHash],
    ) -> Result<Arc<TypeShape>, RegistrationError> {
        let hash = TypeHash::from_generic_instance(definition, args);
        if let Some(existing) = self.get(hash) {
            return Ok(existing);
        }

        let def = self.require(definition)?;
        let expected = generic_arity(&def.name);
        if !def.flags.contains(ShapeFlags::GENERIC_DEFINITION) || expected != args.len() {
            return Err(RegistrationError::InvalidGenericArity {
                definition: def.name.clone(),
                expected,
                actual: args.len(),
            });
        }

        let arg_shapes = args
            .iter()
            .map(|&arg| self.require(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let named_args: Vec<(TypeHash, &str)> = arg_shapes
            .iter()
            .map(|shape| (shape.hash, shape.name.as_str()))
            .collect();

        let flags = match definition {
            well_known::NULLABLE => ShapeFlags::VALUE_TYPE,
            well_known::ENUMERABLE_OF | well_known::ENUMERATOR_OF => ShapeFlags::INTERFACE,
            _ => def.flags - ShapeFlags::GENERIC_DEFINITION,
        };
        let mut shape = TypeShape::generic_instance(&def.name, definition, &named_args, flags);
        match definition {
            well_known::ENUMERABLE_OF => shape = shape.with_interface(well_known::ENUMERABLE),
            well_known::ENUMERATOR_OF => shape = shape.with_interface(well_known::ENUMERATOR),
            _ => {}
        }

        self.register(shape)
    }

    /// `Nullable<payload>`.
    pub fn nullable_of(&self, payload: TypeHash) -> Result<Arc<TypeShape>, RegistrationError> {
        self.instantiate(well_known::NULLABLE, &[payload])
    }

    /// `Extensible<payload>`.
    pub fn extensible_of(&self, payload: TypeHash) -> Result<Arc<TypeShape>, RegistrationError> {
        self.instantiate(well_known::EXTENSIBLE, &[payload])
    }

    /// `IEnumerable<item>`.
    pub fn enumerable_of(&self, item: TypeHash) -> Result<Arc<TypeShape>, RegistrationError> {
        self.instantiate(well_known::ENUMERABLE_OF, &[item])
    }

    /// `IEnumerator<item>`.
    pub fn enumerator_of(&self, item: TypeHash) -> Result<Arc<TypeShape>, RegistrationError> {
        self.instantiate(well_known::ENUMERATOR_OF, &[item])
    }

    /// Iterate over a snapshot of every registered shape.
    pub fn shapes(&self) -> Vec<Arc<TypeShape>> {
        self.shapes
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

/// Arity encoded in a generic definition name (`Nullable`1` has arity 1).
fn generic_arity(name: &str) -> usize {
    name.rsplit_once('`')
        .and_then(|(_, arity)| arity.parse().ok())
        .unwrap_or(0)
}
