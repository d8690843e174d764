//! Primitive numeric kinds and their implicit widening order.

use std::fmt;

use crate::{TypeHash, well_known};

/// Primitive numeric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

/// Position of a numeric kind in the widening lattice.
///
/// ```text
///        0     1     2     3     4
/// 0:          U8 -> U16 -> U32 -> U64
///             |     |      |
///             v     v      v
/// 1:   I8 -> I16 -> I32 -> I64
///             |     |
///             v     v
/// 2:         F32 -> F64
/// ```
///
/// `width` is the column, `group` is the row. A kind widens to another iff neither
/// coordinate decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversionRank {
    pub width: u8,
    pub group: u8,
}

impl ConversionRank {
    /// True if every value of `self` is representable by `to` without loss.
    #[inline]
    pub const fn widens_to(self, to: ConversionRank) -> bool {
        self.width <= to.width && self.group <= to.group
    }
}

impl NumericKind {
    /// All numeric kinds, in declaration order.
    pub const ALL: [NumericKind; 10] = [
        NumericKind::Int8,
        NumericKind::Int16,
        NumericKind::Int32,
        NumericKind::Int64,
        NumericKind::UInt8,
        NumericKind::UInt16,
        NumericKind::UInt32,
        NumericKind::UInt64,
        NumericKind::Float32,
        NumericKind::Float64,
    ];

    /// Get the TypeHash for this numeric kind.
    pub const fn type_hash(self) -> TypeHash {
        match self {
            NumericKind::Int8 => well_known::INT8,
            NumericKind::Int16 => well_known::INT16,
            NumericKind::Int32 => well_known::INT32,
            NumericKind::Int64 => well_known::INT64,
            NumericKind::UInt8 => well_known::UINT8,
            NumericKind::UInt16 => well_known::UINT16,
            NumericKind::UInt32 => well_known::UINT32,
            NumericKind::UInt64 => well_known::UINT64,
            NumericKind::Float32 => well_known::FLOAT32,
            NumericKind::Float64 => well_known::FLOAT64,
        }
    }

    /// Look up the numeric kind of a type hash.
    pub fn from_type_hash(hash: TypeHash) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_hash() == hash)
    }

    /// Get the name of this numeric type.
    pub const fn name(self) -> &'static str {
        match self {
            NumericKind::Int8 => "int8",
            NumericKind::Int16 => "int16",
            NumericKind::Int32 => "int32",
            NumericKind::Int64 => "int64",
            NumericKind::UInt8 => "uint8",
            NumericKind::UInt16 => "uint16",
            NumericKind::UInt32 => "uint32",
            NumericKind::UInt64 => "uint64",
            NumericKind::Float32 => "float32",
            NumericKind::Float64 => "float64",
        }
    }

    /// The kind's coordinates in the widening lattice.
    pub const fn rank(self) -> ConversionRank {
        let (width, group) = match self {
            NumericKind::UInt8 => (1, 0),
            NumericKind::UInt16 => (2, 0),
            NumericKind::UInt32 => (3, 0),
            NumericKind::UInt64 => (4, 0),
            NumericKind::Int8 => (0, 1),
            NumericKind::Int16 => (1, 1),
            NumericKind::Int32 => (2, 1),
            NumericKind::Int64 => (3, 1),
            NumericKind::Float32 => (1, 2),
            NumericKind::Float64 => (2, 2),
        };
        ConversionRank { width, group }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, NumericKind::Float32 | NumericKind::Float64)
    }

    pub const fn is_signed(self) -> bool {
        !matches!(
            self,
            NumericKind::UInt8 | NumericKind::UInt16 | NumericKind::UInt32 | NumericKind::UInt64
        )
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
