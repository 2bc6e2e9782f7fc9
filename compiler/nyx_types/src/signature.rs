//! Call signatures.

use std::fmt;

use smallvec::SmallVec;

use crate::TypeDesc;

/// Ordered argument-type tuple for a call site. Inlined up to four
/// arguments; registry lookups never allocate for the common arities.
pub type ArgTypes = SmallVec<[TypeDesc; 4]>;

/// A concrete call signature: parameter types plus result type.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Signature {
    pub params: ArgTypes,
    pub result: TypeDesc,
}

impl Signature {
    /// Do the given argument types match this signature's parameters
    /// exactly (same arity, same descriptors)?
    pub fn matches_exact(&self, args: &[TypeDesc]) -> bool {
        self.params.as_slice() == args
    }
}

/// Construct a signature from a result type and parameter types.
pub fn signature(result: TypeDesc, params: &[TypeDesc]) -> Signature {
    Signature {
        params: SmallVec::from_slice(params),
        result,
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fn(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.result)
    }
}
