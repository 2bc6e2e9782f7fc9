//! The operation registry.
//!
//! Maps an operation identity to one typing rule (single assignment) and
//! any number of lowering implementations selected by argument-type
//! signature. Registration happens through [`RegistryBuilder`] during
//! single-threaded module initialization; [`RegistryBuilder::seal`]
//! consumes the builder and produces the read-only [`OperationRegistry`]
//! served to concurrent compilation requests. The type system enforces the
//! phase transition: there is no way to register into a sealed registry.
//!
//! Re-registration semantics: a second typing rule for the same operation
//! is a [`RegistryError::DuplicateTyping`]; lowering registration is
//! append-only and always succeeds, with duplicates shadowed by the
//! first-registered-wins tie-break in [`OperationRegistry::resolve_lowering`].

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use nyx_types::{
    CategoryId, CategoryPredicate, CategoryTable, ExtensionId, Signature, TypeCategory, TypeDesc,
};

use crate::builder::{NativeBuilder, ValueId};

/// Stable handle identifying a logical operation across all of its
/// registered typing and lowering variants.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct OpId(u32);

impl OpId {
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Token returned by a lowering registration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct LoweringId {
    op: OpId,
    index: u32,
}

impl LoweringId {
    pub const fn op(self) -> OpId {
        self.op
    }
}

/// A rejection produced by a typing rule for argument types it does not
/// accept.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Rejection {
    reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Rejection {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A typing rule: pure function from argument types to a result type or a
/// rejection. Registered once per operation; queried many times.
pub struct TypingRule {
    rule: Box<dyn Fn(&[TypeDesc]) -> Result<TypeDesc, Rejection> + Send + Sync>,
}

impl TypingRule {
    pub fn new(
        rule: impl Fn(&[TypeDesc]) -> Result<TypeDesc, Rejection> + Send + Sync + 'static,
    ) -> Self {
        TypingRule {
            rule: Box::new(rule),
        }
    }

    /// A rule backed by an ordered table of concrete signatures: the first
    /// case whose parameters match the argument types exactly decides the
    /// result type.
    pub fn from_signatures(cases: Vec<Signature>) -> Self {
        let table = SignatureTable::new(cases);
        TypingRule::new(move |args| match table.resolve(args) {
            Some(sig) => Ok(sig.result),
            None => Err(Rejection::new("no matching signature")),
        })
    }

    fn apply(&self, args: &[TypeDesc]) -> Result<TypeDesc, Rejection> {
        (self.rule)(args)
    }
}

/// Ordered list of concrete signatures, resolved first-match-wins.
pub struct SignatureTable {
    cases: Vec<Signature>,
}

impl SignatureTable {
    pub fn new(cases: Vec<Signature>) -> Self {
        SignatureTable { cases }
    }

    /// First case whose parameter tuple matches `args` exactly.
    pub fn resolve(&self, args: &[TypeDesc]) -> Option<&Signature> {
        self.cases.iter().find(|sig| sig.matches_exact(args))
    }
}

/// A lowering implementation: emits native code for one operation under a
/// matched signature, returning the produced value.
pub type LoweringFn =
    Arc<dyn Fn(&mut dyn NativeBuilder, &Signature, &[ValueId]) -> ValueId + Send + Sync>;

/// One element of a lowering's argument-type pattern.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PatternElem {
    /// Matches exactly one descriptor.
    Exact(TypeDesc),
    /// Matches every member of a category.
    Category(TypeCategory),
}

impl PatternElem {
    fn matches(&self, arg: &TypeDesc, categories: &CategoryTable) -> bool {
        match self {
            PatternElem::Exact(desc) => desc == arg,
            PatternElem::Category(cat) => cat.matches(arg, categories),
        }
    }
}

/// Argument-type pattern a lowering is registered under.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct TypePattern {
    elems: SmallVec<[PatternElem; 4]>,
}

impl TypePattern {
    pub fn new(elems: impl IntoIterator<Item = PatternElem>) -> Self {
        TypePattern {
            elems: elems.into_iter().collect(),
        }
    }

    /// A pattern matching exactly the given descriptor tuple.
    pub fn exact(types: &[TypeDesc]) -> Self {
        TypePattern {
            elems: types.iter().copied().map(PatternElem::Exact).collect(),
        }
    }

    /// A pattern of category wildcards.
    pub fn categories(cats: &[TypeCategory]) -> Self {
        TypePattern {
            elems: cats.iter().copied().map(PatternElem::Category).collect(),
        }
    }

    fn is_exact(&self) -> bool {
        self.elems
            .iter()
            .all(|e| matches!(e, PatternElem::Exact(_)))
    }

    fn matches(&self, args: &[TypeDesc], categories: &CategoryTable) -> bool {
        self.elems.len() == args.len()
            && self
                .elems
                .iter()
                .zip(args)
                .all(|(elem, arg)| elem.matches(arg, categories))
    }

    /// Number of exact elements; higher is more specific.
    fn specificity(&self) -> usize {
        self.elems
            .iter()
            .filter(|e| matches!(e, PatternElem::Exact(_)))
            .count()
    }

    fn describe(&self, categories: &CategoryTable) -> String {
        let parts: Vec<String> = self
            .elems
            .iter()
            .map(|e| match e {
                PatternElem::Exact(desc) => desc.to_string(),
                PatternElem::Category(cat) => cat.describe(categories),
            })
            .collect();
        format!("({})", parts.join(", "))
    }
}

struct LoweringEntry {
    pattern: TypePattern,
    imp: LoweringFn,
}

/// Registration-time failure.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum RegistryError {
    /// A typing rule was already registered for this operation. Typing
    /// rules are single-assignment; the registering module must not repeat
    /// the registration.
    DuplicateTyping { op: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateTyping { op } => {
                write!(f, "typing rule already registered for operation `{op}`")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Resolution-time failure, surfaced to the compiler driver as a
/// compilation diagnostic for the offending call site.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ResolveError {
    /// No typing rule is registered for the operation.
    UnresolvedOperation { op: String },
    /// The typing rule rejected the argument types.
    TypeRejected {
        op: String,
        args: Vec<TypeDesc>,
        reason: String,
    },
    /// No registered lowering pattern matches the argument types.
    NoMatchingLowering { op: String, args: Vec<TypeDesc> },
}

fn join_types(args: &[TypeDesc]) -> String {
    let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
    parts.join(", ")
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::UnresolvedOperation { op } => {
                write!(f, "no typing rule registered for operation `{op}`")
            }
            ResolveError::TypeRejected { op, args, reason } => write!(
                f,
                "operation `{op}` rejected argument types ({}): {reason}",
                join_types(args)
            ),
            ResolveError::NoMatchingLowering { op, args } => write!(
                f,
                "no lowering for operation `{op}` matches argument types ({})",
                join_types(args)
            ),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Open registration phase of the operation registry.
///
/// Append-only and single-threaded; consumed by [`RegistryBuilder::seal`].
#[derive(Default)]
pub struct RegistryBuilder {
    op_names: Vec<String>,
    op_ids: FxHashMap<String, OpId>,
    typing: FxHashMap<OpId, TypingRule>,
    lowering: FxHashMap<OpId, Vec<LoweringEntry>>,
    categories: CategoryTable,
    extensions: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    /// Intern an operation name, returning its stable identity. Repeated
    /// calls with the same name return the same id.
    pub fn operation(&mut self, name: &str) -> OpId {
        if let Some(id) = self.op_ids.get(name) {
            return *id;
        }
        let id = OpId(u32::try_from(self.op_names.len()).unwrap_or(u32::MAX));
        self.op_names.push(name.to_owned());
        self.op_ids.insert(name.to_owned(), id);
        id
    }

    /// Register the typing rule for an operation. Single assignment.
    pub fn register_typing(&mut self, op: OpId, rule: TypingRule) -> Result<(), RegistryError> {
        if self.typing.contains_key(&op) {
            return Err(RegistryError::DuplicateTyping {
                op: self.op_names[op.0 as usize].clone(),
            });
        }
        self.typing.insert(op, rule);
        Ok(())
    }

    /// Register a lowering implementation for an operation under an
    /// argument-type pattern. Append-only; returns a token identifying the
    /// registration.
    pub fn register_lowering(
        &mut self,
        op: OpId,
        pattern: TypePattern,
        imp: LoweringFn,
    ) -> LoweringId {
        let entries = self.lowering.entry(op).or_default();
        let index = u32::try_from(entries.len()).unwrap_or(u32::MAX);
        entries.push(LoweringEntry { pattern, imp });
        LoweringId { op, index }
    }

    /// Register a category membership predicate usable in lowering
    /// patterns via [`TypeCategory::Registered`].
    pub fn register_category(
        &mut self,
        name: impl Into<String>,
        predicate: CategoryPredicate,
    ) -> CategoryId {
        self.categories.define(name, predicate)
    }

    /// Intern a user extension type, returning the id to embed in
    /// [`TypeDesc::Extension`].
    pub fn register_extension(&mut self, name: impl Into<String>) -> ExtensionId {
        let id = ExtensionId(u32::try_from(self.extensions.len()).unwrap_or(u32::MAX));
        self.extensions.push(name.into());
        id
    }

    /// Close the registration phase. The sealed registry is read-only and
    /// safe for concurrent lookups.
    pub fn seal(self) -> OperationRegistry {
        tracing::debug!(
            ops = self.op_names.len(),
            categories = self.categories.len(),
            "sealing operation registry"
        );
        OperationRegistry {
            op_names: self.op_names,
            op_ids: self.op_ids,
            typing: self.typing,
            lowering: self.lowering,
            categories: self.categories,
            extensions: self.extensions,
        }
    }
}

/// Sealed, read-only operation registry.
pub struct OperationRegistry {
    op_names: Vec<String>,
    op_ids: FxHashMap<String, OpId>,
    typing: FxHashMap<OpId, TypingRule>,
    lowering: FxHashMap<OpId, Vec<LoweringEntry>>,
    categories: CategoryTable,
    extensions: Vec<String>,
}

impl OperationRegistry {
    /// Look up an operation id by name.
    pub fn op(&self, name: &str) -> Option<OpId> {
        self.op_ids.get(name).copied()
    }

    /// Name of an operation.
    pub fn op_name(&self, op: OpId) -> &str {
        &self.op_names[op.0 as usize]
    }

    /// The registered category predicates.
    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    /// Name of a registered extension type, if the id is valid.
    pub fn extension_name(&self, id: ExtensionId) -> Option<&str> {
        self.extensions.get(id.index() as usize).map(String::as_str)
    }

    /// Resolve the result type for a call to `op` with the given argument
    /// types.
    #[tracing::instrument(level = "trace", skip(self), fields(op = self.op_name(op)))]
    pub fn resolve_typing(&self, op: OpId, args: &[TypeDesc]) -> Result<TypeDesc, ResolveError> {
        let rule = self
            .typing
            .get(&op)
            .ok_or_else(|| ResolveError::UnresolvedOperation {
                op: self.op_name(op).to_owned(),
            })?;
        rule.apply(args).map_err(|rej| ResolveError::TypeRejected {
            op: self.op_name(op).to_owned(),
            args: args.to_vec(),
            reason: rej.reason().to_owned(),
        })
    }

    /// Select the lowering implementation for a call to `op` with the
    /// given argument types.
    ///
    /// Selection order: exact descriptor-tuple match first; otherwise the
    /// matching pattern with the most exact elements; first-registered
    /// wins among equally specific matches. Deterministic for a sealed
    /// registry.
    #[tracing::instrument(level = "trace", skip(self), fields(op = self.op_name(op)))]
    pub fn resolve_lowering(&self, op: OpId, args: &[TypeDesc]) -> Result<LoweringFn, ResolveError> {
        let entries = self.lowering.get(&op).map(Vec::as_slice).unwrap_or(&[]);

        if let Some(entry) = entries
            .iter()
            .find(|e| e.pattern.is_exact() && e.pattern.matches(args, &self.categories))
        {
            tracing::trace!(pattern = %entry.pattern.describe(&self.categories), "exact match");
            return Ok(Arc::clone(&entry.imp));
        }

        // Most-specific pattern; iteration order is registration order, so
        // a strict `>` keeps the first-registered among ties.
        let mut best: Option<(&LoweringEntry, usize)> = None;
        for entry in entries {
            if !entry.pattern.matches(args, &self.categories) {
                continue;
            }
            let spec = entry.pattern.specificity();
            if best.is_none_or(|(_, best_spec)| spec > best_spec) {
                best = Some((entry, spec));
            }
        }

        match best {
            Some((entry, _)) => {
                tracing::trace!(
                    pattern = %entry.pattern.describe(&self.categories),
                    "pattern match"
                );
                Ok(Arc::clone(&entry.imp))
            }
            None => Err(ResolveError::NoMatchingLowering {
                op: self.op_name(op).to_owned(),
                args: args.to_vec(),
            }),
        }
    }
}
