//! Runtime type descriptors.
//!
//! A [`TypeShape`] describes everything the binder needs to know about a runtime type:
//! its identity, whether it is a value type, its base and interfaces, the generic
//! definition it instantiates (used to recognize `Nullable<T>` and `Extensible<T>`),
//! and the conversion operators it declares.
//!
//! Shapes are built with the `with_*` builder methods and then interned by the type
//! registry, which fills in the supertype closure. An interned shape is immutable.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashSet;

use crate::{ConversionError, NumericKind, TypeHash, Value, well_known};

bitflags! {
    /// Classification flags computed once per type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShapeFlags: u32 {
        /// Instances are copied by value; converting to `object` boxes them.
        const VALUE_TYPE = 1 << 0;
        /// Interface type.
        const INTERFACE = 1 << 1;
        /// COM interop object; interface casts are deferred to a runtime QueryInterface.
        const COM_OBJECT = 1 << 2;
        /// Callable-adapter (delegate) type.
        const DELEGATE = 1 << 3;
        /// Generic definition (never the runtime type of a value).
        const GENERIC_DEFINITION = 1 << 4;
    }
}

/// Well-known conversion operator names.
pub mod operator_names {
    /// Implicit conversion operator.
    pub const IMPLICIT: &str = "op_Implicit";
    /// Explicit conversion operator.
    pub const EXPLICIT: &str = "op_Explicit";
    /// Prefix of type-specific conversion methods (`ConvertToBar`).
    pub const CONVERT_TO_PREFIX: &str = "ConvertTo";

    /// Name of the type-specific conversion method for a target type name.
    pub fn convert_to(target_name: &str) -> String {
        format!("{CONVERT_TO_PREFIX}{target_name}")
    }
}

/// Native implementation of a conversion operator.
pub type ConversionFn = Arc<dyn Fn(Value) -> Result<Value, ConversionError> + Send + Sync>;

/// A conversion operator declared by a type (or registered against it later).
#[derive(Clone)]
pub struct ConversionOperator {
    /// Identity of the operator (owner + name + signature).
    pub hash: TypeHash,
    /// Operator name, e.g. `op_Implicit` or `ConvertToBar`.
    pub name: String,
    /// Type the operator is declared on.
    pub declaring_type: TypeHash,
    /// Single parameter type.
    pub param: TypeHash,
    /// Return type.
    pub ret: TypeHash,
    /// Marked as usable only for explicit conversions.
    pub explicit_only: bool,
    func: ConversionFn,
}

impl ConversionOperator {
    /// Create a conversion operator.
    pub fn new<F>(
        declaring_type: TypeHash,
        name: impl Into<String>,
        param: TypeHash,
        ret: TypeHash,
        func: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            hash: TypeHash::from_operator(declaring_type, &name, param, ret),
            name,
            declaring_type,
            param,
            ret,
            explicit_only: false,
            func: Arc::new(func),
        }
    }

    /// Create an `op_Implicit` operator.
    pub fn implicit<F>(declaring_type: TypeHash, param: TypeHash, ret: TypeHash, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        Self::new(declaring_type, operator_names::IMPLICIT, param, ret, func)
    }

    /// Create an `op_Explicit` operator.
    pub fn explicit<F>(declaring_type: TypeHash, param: TypeHash, ret: TypeHash, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        Self::new(declaring_type, operator_names::EXPLICIT, param, ret, func)
    }

    /// Mark the operator as explicit-only.
    pub fn explicit_only(mut self) -> Self {
        self.explicit_only = true;
        self
    }

    /// Run the operator.
    pub fn invoke(&self, arg: Value) -> Result<Value, ConversionError> {
        (self.func)(arg)
    }
}

impl PartialEq for ConversionOperator {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.explicit_only == other.explicit_only
    }
}

impl Eq for ConversionOperator {}

impl fmt::Debug for ConversionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionOperator")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("param", &self.param)
            .field("ret", &self.ret)
            .field("explicit_only", &self.explicit_only)
            .finish()
    }
}

/// Generic instantiation info.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericInstance {
    /// The generic definition, e.g. `well_known::NULLABLE`.
    pub definition: TypeHash,
    /// Type arguments in declaration order.
    pub args: Vec<TypeHash>,
}

/// Descriptor of a runtime type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeShape {
    /// Type identity.
    pub hash: TypeHash,
    /// Display name.
    pub name: String,
    /// Classification flags.
    pub flags: ShapeFlags,
    /// Numeric kind for primitive numeric types.
    pub numeric: Option<NumericKind>,
    /// Base type (single inheritance).
    pub base: Option<TypeHash>,
    /// Directly implemented interfaces.
    pub interfaces: Vec<TypeHash>,
    /// Generic instantiation info, for instances of generic definitions.
    pub generic: Option<GenericInstance>,
    /// Conversion operators declared on this type, in declaration order.
    pub operators: Vec<ConversionOperator>,
    /// Supertype/interface closure, including the type itself and `object`.
    ///
    /// Filled in by the registry when the shape is interned.
    pub supertypes: FxHashSet<TypeHash>,
    /// Payload type of the base-most `Extensible<T>` in the inheritance chain.
    ///
    /// Filled in by the registry when the shape is interned.
    pub extensible_payload: Option<TypeHash>,
}

impl TypeShape {
    fn with_identity(name: impl Into<String>, hash: TypeHash, flags: ShapeFlags) -> Self {
        Self {
            hash,
            name: name.into(),
            flags,
            numeric: None,
            base: None,
            interfaces: Vec::new(),
            generic: None,
            operators: Vec::new(),
            supertypes: FxHashSet::default(),
            extensible_payload: None,
        }
    }

    /// A reference (class) type.
    pub fn class(name: impl Into<String>) -> Self {
        let name = name.into();
        let hash = TypeHash::from_name(&name);
        Self::with_identity(name, hash, ShapeFlags::empty())
    }

    /// A user-defined value type.
    pub fn value_type(name: impl Into<String>) -> Self {
        let name = name.into();
        let hash = TypeHash::from_name(&name);
        Self::with_identity(name, hash, ShapeFlags::VALUE_TYPE)
    }

    /// An interface type.
    pub fn interface(name: impl Into<String>) -> Self {
        let name = name.into();
        let hash = TypeHash::from_name(&name);
        Self::with_identity(name, hash, ShapeFlags::INTERFACE)
    }

    /// A delegate type deriving from the root delegate.
    pub fn delegate(name: impl Into<String>) -> Self {
        Self::class(name)
            .with_flags(ShapeFlags::DELEGATE)
            .with_base(well_known::DELEGATE)
    }

    /// A COM interop class.
    pub fn com_object(name: impl Into<String>) -> Self {
        Self::class(name)
            .with_flags(ShapeFlags::COM_OBJECT)
            .with_base(well_known::COM_OBJECT)
    }

    /// A primitive numeric type.
    pub fn numeric(kind: NumericKind) -> Self {
        let mut shape = Self::with_identity(kind.name(), kind.type_hash(), ShapeFlags::VALUE_TYPE);
        shape.numeric = Some(kind);
        shape
    }

    /// A type with an explicit identity, used for the built-in types.
    pub fn builtin(name: impl Into<String>, hash: TypeHash, flags: ShapeFlags) -> Self {
        Self::with_identity(name, hash, flags)
    }

    /// An instance of a generic definition.
    pub fn generic_instance(
        definition_name: &str,
        definition: TypeHash,
        args: &[(TypeHash, &str)],
        flags: ShapeFlags,
    ) -> Self {
        let arg_hashes: Vec<TypeHash> = args.iter().map(|(hash, _)| *hash).collect();
        let arg_names: Vec<&str> = args.iter().map(|(_, name)| *name).collect();
        let base_name = definition_name.split('`').next().unwrap_or(definition_name);
        let name = format!("{}<{}>", base_name, arg_names.join(", "));
        let hash = TypeHash::from_generic_instance(definition, &arg_hashes);
        let mut shape = Self::with_identity(name, hash, flags);
        shape.generic = Some(GenericInstance {
            definition,
            args: arg_hashes,
        });
        shape
    }

    // === Builder Methods ===

    /// Set the base type.
    pub fn with_base(mut self, base: TypeHash) -> Self {
        self.base = Some(base);
        self
    }

    /// Add an implemented interface.
    pub fn with_interface(mut self, interface: TypeHash) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Add a declared conversion operator.
    pub fn with_operator(mut self, operator: ConversionOperator) -> Self {
        self.operators.push(operator);
        self
    }

    /// Add classification flags.
    pub fn with_flags(mut self, flags: ShapeFlags) -> Self {
        self.flags |= flags;
        self
    }

    // === Queries ===

    #[inline]
    pub fn is_value_type(&self) -> bool {
        self.flags.contains(ShapeFlags::VALUE_TYPE)
    }

    #[inline]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(ShapeFlags::INTERFACE)
    }

    #[inline]
    pub fn is_com_object(&self) -> bool {
        self.flags.contains(ShapeFlags::COM_OBJECT)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.hash == well_known::NULL
    }

    /// True if `hash` is in this type's supertype/interface closure.
    #[inline]
    pub fn derives_from(&self, hash: TypeHash) -> bool {
        self.supertypes.contains(&hash)
    }

    /// The generic definition this shape instantiates, if any.
    pub fn generic_definition(&self) -> Option<TypeHash> {
        self.generic.as_ref().map(|g| g.definition)
    }

    /// The single type argument of a one-parameter generic instance of `definition`.
    pub fn single_generic_arg(&self, definition: TypeHash) -> Option<TypeHash> {
        match &self.generic {
            Some(g) if g.definition == definition && g.args.len() == 1 => Some(g.args[0]),
            _ => None,
        }
    }

    /// The value a failed try-conversion to this type yields.
    pub fn default_value(&self) -> Value {
        if let Some(kind) = self.numeric {
            return Value::zero(kind);
        }
        if self.hash == well_known::BOOL {
            return Value::Bool(false);
        }
        if let Some(payload) = self.single_generic_arg(well_known::NULLABLE) {
            return Value::empty_nullable(payload);
        }
        if self.is_value_type() {
            return Value::object(crate::ObjectValue::new(self.hash));
        }
        Value::Null
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
