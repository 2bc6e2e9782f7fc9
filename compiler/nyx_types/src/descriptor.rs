//! Structural type descriptors.
//!
//! `TypeDesc` is deliberately a closed tagged variant: the built-in
//! categories the code generator knows how to lower are enumerated here, and
//! user-defined types enter through interned extension ids rather than an
//! open trait hierarchy. Descriptors are plain values; they are constructed
//! on demand during inference, compared structurally, and never mutated.

use std::fmt;

/// Bit width of a fixed-width integer type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    /// Width in bits.
    pub const fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }

    /// All-ones mask for this width, in a 64-bit carrier.
    pub const fn mask(self) -> u64 {
        match self {
            IntWidth::W64 => u64::MAX,
            _ => (1u64 << self.bits()) - 1,
        }
    }
}

/// Whether an integer type is signed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Signedness {
    Signed,
    Unsigned,
}

/// Bit width of a floating-point type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum FloatWidth {
    W32,
    W64,
}

/// Identity of an opaque handle type (pointers, tokens; layout unknown to
/// the specializer).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct OpaqueId(pub u32);

/// Identity of a user-registered extension type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ExtensionId(pub u32);

impl ExtensionId {
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Structural descriptor for a type in the compiler's type system.
///
/// Equality and hashing are structural and stable for the process lifetime,
/// so descriptors can be used directly as table keys.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeDesc {
    /// Fixed-width integer.
    Int(IntWidth, Signedness),
    /// IEEE 754 floating point.
    Float(FloatWidth),
    /// Boolean.
    Bool,
    /// Opaque handle; only identity matters.
    Opaque(OpaqueId),
    /// Range value `{start, stop, step}` over integers of the given width.
    Range(IntWidth),
    /// Iterator state derived from a `Range` of the given width.
    RangeIter(IntWidth),
    /// User-registered extension type, interned by the operation registry.
    Extension(ExtensionId),
}

impl TypeDesc {
    pub const I8: TypeDesc = TypeDesc::Int(IntWidth::W8, Signedness::Signed);
    pub const I16: TypeDesc = TypeDesc::Int(IntWidth::W16, Signedness::Signed);
    pub const I32: TypeDesc = TypeDesc::Int(IntWidth::W32, Signedness::Signed);
    pub const I64: TypeDesc = TypeDesc::Int(IntWidth::W64, Signedness::Signed);
    pub const U8: TypeDesc = TypeDesc::Int(IntWidth::W8, Signedness::Unsigned);
    pub const U16: TypeDesc = TypeDesc::Int(IntWidth::W16, Signedness::Unsigned);
    pub const U32: TypeDesc = TypeDesc::Int(IntWidth::W32, Signedness::Unsigned);
    pub const U64: TypeDesc = TypeDesc::Int(IntWidth::W64, Signedness::Unsigned);
    pub const F32: TypeDesc = TypeDesc::Float(FloatWidth::W32);
    pub const F64: TypeDesc = TypeDesc::Float(FloatWidth::W64);

    /// Is this any fixed-width integer type?
    pub const fn is_integer(self) -> bool {
        matches!(self, TypeDesc::Int(..))
    }

    /// Is this a signed integer type?
    pub const fn is_signed_integer(self) -> bool {
        matches!(self, TypeDesc::Int(_, Signedness::Signed))
    }

    /// Is this an unsigned integer type?
    pub const fn is_unsigned_integer(self) -> bool {
        matches!(self, TypeDesc::Int(_, Signedness::Unsigned))
    }

    /// Is this a floating-point type?
    pub const fn is_float(self) -> bool {
        matches!(self, TypeDesc::Float(_))
    }

    /// Is this an arithmetic type (integer or float)?
    pub const fn is_number(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Integer width, for integer, range, and range-iterator types.
    pub const fn int_width(self) -> Option<IntWidth> {
        match self {
            TypeDesc::Int(w, _) | TypeDesc::Range(w) | TypeDesc::RangeIter(w) => Some(w),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Int(w, Signedness::Signed) => write!(f, "i{}", w.bits()),
            TypeDesc::Int(w, Signedness::Unsigned) => write!(f, "u{}", w.bits()),
            TypeDesc::Float(FloatWidth::W32) => f.write_str("f32"),
            TypeDesc::Float(FloatWidth::W64) => f.write_str("f64"),
            TypeDesc::Bool => f.write_str("bool"),
            TypeDesc::Opaque(OpaqueId(id)) => write!(f, "opaque#{id}"),
            TypeDesc::Range(w) => write!(f, "range<i{}>", w.bits()),
            TypeDesc::RangeIter(w) => write!(f, "range_iter<i{}>", w.bits()),
            TypeDesc::Extension(id) => write!(f, "ext#{}", id.index()),
        }
    }
}
