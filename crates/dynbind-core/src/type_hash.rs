//! Deterministic hash-based type identity.
//!
//! This module provides [`TypeHash`], a 64-bit hash that uniquely identifies runtime
//! types, generic instantiations and conversion operators. Hashes are computed
//! deterministically from names and signatures, enabling:
//!
//! - Identity before registration (a target type can be named before it is interned)
//! - Process-wide agreement (the same name always yields the same identity)
//! - Cheap runtime-type guards (a guard is a single `u64` comparison)
//!
//! # Hash Computation
//!
//! Uses XXHash64 with domain-specific mixing constants to prevent collisions
//! between different entity kinds (types vs generic instances vs operators).
//!
//! # Examples
//!
//! ```
//! use dynbind_core::{TypeHash, well_known};
//!
//! let int_hash = TypeHash::from_name("int32");
//! assert_eq!(int_hash, well_known::INT32);
//!
//! let nullable_int = TypeHash::from_generic_instance(well_known::NULLABLE, &[well_known::INT32]);
//! let nullable_float = TypeHash::from_generic_instance(well_known::NULLABLE, &[well_known::FLOAT64]);
//! assert_ne!(nullable_int, nullable_float);
//! ```

use std::fmt;
use xxhash_rust::const_xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Separator constant for argument components.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for conversion operator hashes
    pub const OPERATOR: u64 = 0x3e9f5d2a8c7b1403;

    /// Domain marker for nested call-site hashes
    pub const SITE: u64 = 0x9a7f3d5e2b8c4601;

    /// Argument position mixing constants.
    /// Each position gets a unique constant so that argument order matters.
    pub const PARAM_MARKERS: [u64; 8] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
    ];
}

/// A deterministic 64-bit hash identifying a type or a conversion operator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a qualified type name.
    ///
    /// This is a `const fn`, so well-known identities are computed at compile time.
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create the hash of a generic instantiation from its definition and arguments.
    ///
    /// Argument order matters: `Pair<int32, string>` differs from `Pair<string, int32>`.
    #[inline]
    pub fn from_generic_instance(definition: TypeHash, args: &[TypeHash]) -> Self {
        let mut hash = definition.0;
        for (i, arg) in args.iter().enumerate() {
            hash = hash
                .wrapping_mul(hash_constants::SEP)
                .wrapping_add(Self::marker(i) ^ arg.0);
        }
        TypeHash(hash)
    }

    /// Create a conversion operator hash from its declaring type, name and signature.
    #[inline]
    pub fn from_operator(owner: TypeHash, name: &str, param: TypeHash, ret: TypeHash) -> Self {
        let mut hash = hash_constants::OPERATOR ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        hash = hash
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(Self::marker(0) ^ param.0);
        hash = hash
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(Self::marker(1) ^ ret.0);
        TypeHash(hash)
    }

    /// Create the identity of a nested conversion site.
    ///
    /// Nested sites are created by rules that convert through an intermediate type;
    /// the same (source, target, kind) triple always maps to the same site.
    #[inline]
    pub fn from_nested_site(source: TypeHash, target: TypeHash, kind: u8) -> Self {
        let mut hash = hash_constants::SITE ^ u64::from(kind);
        hash = hash
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(Self::marker(0) ^ source.0);
        hash = hash
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(Self::marker(1) ^ target.0);
        TypeHash(hash)
    }

    #[inline]
    fn marker(i: usize) -> u64 {
        hash_constants::PARAM_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Identities of the types the binder itself knows about.
///
/// Generic definitions (`NULLABLE`, `EXTENSIBLE`, `ENUMERABLE_OF`, `ENUMERATOR_OF`) are
/// never the runtime type of a value; their instances are hashed with
/// [`TypeHash::from_generic_instance`].
pub mod well_known {
    use super::TypeHash;

    /// The universal "any" type every value converts to.
    pub const OBJECT: TypeHash = TypeHash::from_name("object");
    /// The untyped null sentinel.
    pub const NULL: TypeHash = TypeHash::from_name("null");
    pub const BOOL: TypeHash = TypeHash::from_name("bool");
    pub const INT8: TypeHash = TypeHash::from_name("int8");
    pub const INT16: TypeHash = TypeHash::from_name("int16");
    pub const INT32: TypeHash = TypeHash::from_name("int32");
    pub const INT64: TypeHash = TypeHash::from_name("int64");
    pub const UINT8: TypeHash = TypeHash::from_name("uint8");
    pub const UINT16: TypeHash = TypeHash::from_name("uint16");
    pub const UINT32: TypeHash = TypeHash::from_name("uint32");
    pub const UINT64: TypeHash = TypeHash::from_name("uint64");
    pub const FLOAT32: TypeHash = TypeHash::from_name("float32");
    pub const FLOAT64: TypeHash = TypeHash::from_name("float64");
    pub const STRING: TypeHash = TypeHash::from_name("string");

    /// Non-generic enumerable capability (has a get-enumerator operation).
    pub const ENUMERABLE: TypeHash = TypeHash::from_name("IEnumerable");
    /// Non-generic enumerator capability.
    pub const ENUMERATOR: TypeHash = TypeHash::from_name("IEnumerator");
    /// Generic definition `IEnumerable<T>`.
    pub const ENUMERABLE_OF: TypeHash = TypeHash::from_name("IEnumerable`1");
    /// Generic definition `IEnumerator<T>`.
    pub const ENUMERATOR_OF: TypeHash = TypeHash::from_name("IEnumerator`1");
    /// Generic definition `Nullable<T>`.
    pub const NULLABLE: TypeHash = TypeHash::from_name("Nullable`1");
    /// Generic definition `Extensible<T>`.
    pub const EXTENSIBLE: TypeHash = TypeHash::from_name("Extensible`1");
    /// The unparameterized root delegate type.
    pub const DELEGATE: TypeHash = TypeHash::from_name("Delegate");
    /// Root of COM interop objects.
    pub const COM_OBJECT: TypeHash = TypeHash::from_name("__ComObject");
}
