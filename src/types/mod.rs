//! Type expressions observed at runtime and the signatures built from them.
//!
//! A [`TypeExpression`] is a small algebraic value: an atomic name, a
//! parameterized generic, a flattened union, or `Unknown` (rendered as
//! `Any`). A [`Signature`] pairs one expression per argument slot with its
//! [`ArgKind`] plus a return expression.

use std::collections::BTreeSet;
use std::fmt;

pub mod merge;
pub mod parse;

pub use merge::{SignatureAccumulator, combine, finalize, infer_signature, merge};
pub use parse::{ParsedComment, parse_type, parse_type_comment};

/// Marker name of the optional wrapper (`Optional[T]`).
pub const OPTIONAL: &str = "Optional";
/// Name of the none type as it appears in type comments.
pub const NONE: &str = "None";
/// Rendering of [`TypeExpression::Unknown`].
pub const ANY: &str = "Any";
/// Second parameter of a variable-length tuple, `Tuple[X, ...]`.
pub const ELLIPSIS: &str = "...";
/// Generic names (and `Text`) that live in the `typing` module.
pub const TYPING_NAMES: &[&str] = &[
    "Callable",
    "Dict",
    "FrozenSet",
    "Generator",
    "Iterable",
    "Iterator",
    "List",
    "Mapping",
    "Optional",
    "Sequence",
    "Set",
    "Text",
    "Tuple",
    "Type",
    "Union",
];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeExpression {
    Atomic(String),
    Parameterized(String, Vec<TypeExpression>),
    /// Never contains another `UnionOf`; see [`TypeExpression::union_of`].
    UnionOf(BTreeSet<TypeExpression>),
    Unknown,
}

impl TypeExpression {
    pub fn atomic(name: impl Into<String>) -> Self {
        TypeExpression::Atomic(name.into())
    }

    pub fn none() -> Self {
        TypeExpression::Atomic(NONE.to_string())
    }

    pub fn generic(name: impl Into<String>, params: Vec<TypeExpression>) -> Self {
        TypeExpression::Parameterized(name.into(), params)
    }

    pub fn optional(inner: TypeExpression) -> Self {
        TypeExpression::Parameterized(OPTIONAL.to_string(), vec![inner])
    }

    /// Builds a flattened union. Nested unions are spliced in, a single
    /// member collapses to itself and an empty input yields `Unknown`.
    pub fn union_of(items: impl IntoIterator<Item = TypeExpression>) -> Self {
        let mut members = BTreeSet::new();
        for item in items {
            match item {
                TypeExpression::UnionOf(inner) => members.extend(inner),
                other => {
                    members.insert(other);
                }
            }
        }
        if members.len() > 1 {
            return TypeExpression::UnionOf(members);
        }
        members.pop_first().unwrap_or(TypeExpression::Unknown)
    }

    /// `Tuple[X, ...]`
    pub fn variadic_tuple_item(&self) -> Option<&TypeExpression> {
        match self {
            TypeExpression::Parameterized(name, params)
                if name == "Tuple"
                    && params.len() == 2
                    && matches!(&params[1], TypeExpression::Atomic(marker) if marker == ELLIPSIS) =>
            {
                Some(&params[0])
            }
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeExpression::Unknown)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, TypeExpression::Atomic(name) if name == NONE)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeExpression::Parameterized(name, params) if name == OPTIONAL && params.len() == 1)
    }

    pub fn is_union(&self) -> bool {
        matches!(self, TypeExpression::UnionOf(_))
    }

    pub fn contains_unknown(&self) -> bool {
        match self {
            TypeExpression::Unknown => true,
            TypeExpression::Atomic(_) => false,
            TypeExpression::Parameterized(_, params) => params.iter().any(Self::contains_unknown),
            TypeExpression::UnionOf(members) => members.iter().any(Self::contains_unknown),
        }
    }

    /// Collects the `typing` names this expression needs in scope when rendered.
    pub fn collect_typing_names(&self, out: &mut BTreeSet<String>) {
        match self {
            TypeExpression::Unknown => {
                out.insert(ANY.to_string());
            }
            TypeExpression::Atomic(name) => {
                if TYPING_NAMES.contains(&name.as_str()) {
                    out.insert(name.clone());
                }
            }
            TypeExpression::Parameterized(name, params) => {
                if TYPING_NAMES.contains(&name.as_str()) {
                    out.insert(name.clone());
                }
                for param in params {
                    param.collect_typing_names(out);
                }
            }
            TypeExpression::UnionOf(members) => {
                out.insert("Union".to_string());
                for member in members {
                    member.collect_typing_names(out);
                }
            }
        }
    }
}

impl fmt::Display for TypeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpression::Atomic(name) => f.write_str(name),
            TypeExpression::Unknown => f.write_str(ANY),
            TypeExpression::Parameterized(name, params) if params.is_empty() && name == "Tuple" => {
                f.write_str("Tuple[()]")
            }
            TypeExpression::Parameterized(name, params) => {
                write!(f, "{name}[")?;
                write_joined(f, params.iter())?;
                f.write_str("]")
            }
            TypeExpression::UnionOf(members) => {
                f.write_str("Union[")?;
                write_joined(f, members.iter())?;
                f.write_str("]")
            }
        }
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a TypeExpression>,
) -> fmt::Result {
    for (idx, item) in items.enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Positional,
    Star,
    DoubleStar,
}

impl ArgKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ArgKind::Positional => "",
            ArgKind::Star => "*",
            ArgKind::DoubleStar => "**",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub ty: TypeExpression,
    pub kind: ArgKind,
}

impl Argument {
    pub fn new(ty: TypeExpression, kind: ArgKind) -> Self {
        Self { ty, kind }
    }

    pub fn positional(ty: TypeExpression) -> Self {
        Self::new(ty, ArgKind::Positional)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.ty)
    }
}

/// Canonical merged signature of one function. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub args: Vec<Argument>,
    pub return_type: TypeExpression,
}

impl Signature {
    /// Argument strings with their `*`/`**` prefixes, as stored in JSON.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args.iter().map(|arg| arg.to_string()).collect()
    }

    /// The combined `(a, *b) -> r` form.
    pub fn type_comment(&self) -> String {
        format!("({}) -> {}", self.arg_strings().join(", "), self.return_type)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_comment())
    }
}
