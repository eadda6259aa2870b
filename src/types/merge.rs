//! Signature merge engine.
//!
//! Merging works on member sets: both operands are flattened (unions
//! spliced, `Optional` split into its inner type plus a none flag, `Unknown`
//! dropped), the member set is canonicalised and the result rebuilt. Working
//! on sets rather than pairs keeps the fold associative and commutative, so
//! the order in which samples arrive never changes the outcome.
//!
//! Size limits are applied once, by [`finalize`], when a [`Signature`] is
//! produced.

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::InferError;
use crate::types::parse::{ParsedComment, parse_type_comment};
use crate::types::{ArgKind, Argument, ELLIPSIS, OPTIONAL, Signature, TypeExpression};

/// Unions with more non-None alternatives than this collapse to `Unknown`.
pub const MAX_UNION_MEMBERS: usize = 3;
/// `*args`/`**kwargs` types rendering wider than this collapse to `Unknown`.
pub const MAX_STAR_ARG_WIDTH: usize = 120;

const NUMERIC_TOWER: [&str; 4] = ["bool", "int", "float", "complex"];
const TUPLE: &str = "Tuple";

pub fn merge(a: &TypeExpression, b: &TypeExpression) -> TypeExpression {
    combine([a.clone(), b.clone()])
}

/// Joins any number of observations of one slot into a single expression.
pub fn combine(items: impl IntoIterator<Item = TypeExpression>) -> TypeExpression {
    let mut members = Members::default();
    for item in items {
        members.absorb(item);
    }
    members.build()
}

#[derive(Default)]
struct Members {
    items: Vec<TypeExpression>,
    saw_none: bool,
    saw_unknown: bool,
}

impl Members {
    fn absorb(&mut self, item: TypeExpression) {
        match item {
            TypeExpression::Unknown => self.saw_unknown = true,
            TypeExpression::UnionOf(inner) => {
                for member in inner {
                    self.absorb(member);
                }
            }
            TypeExpression::Parameterized(name, mut params)
                if name == OPTIONAL && params.len() == 1 =>
            {
                self.saw_none = true;
                if let Some(inner) = params.pop() {
                    self.absorb(inner);
                }
            }
            ty if ty.is_none() => self.saw_none = true,
            other => self.items.push(other),
        }
    }

    fn build(self) -> TypeExpression {
        let widest = self.items.iter().filter_map(numeric_rank).max();
        let mut generics: BTreeMap<(String, usize), Vec<Vec<TypeExpression>>> = BTreeMap::new();
        let mut variadic = Vec::new();
        let mut atoms = BTreeSet::new();
        for item in self.items {
            if let Some(element) = item.variadic_tuple_item() {
                variadic.push(element.clone());
                continue;
            }
            match item {
                TypeExpression::Parameterized(name, params) => {
                    generics.entry((name, params.len())).or_default().push(params);
                }
                other if numeric_rank(&other).is_some() => {}
                other => {
                    atoms.insert(other);
                }
            }
        }
        if let Some(rank) = widest {
            atoms.insert(TypeExpression::atomic(NUMERIC_TOWER[rank]));
        }

        let mut result = BTreeSet::new();
        // Once any sample is `Tuple[X, ...]`, fixed-length tuples only add
        // element types to `X`.
        if !variadic.is_empty() {
            let fixed: Vec<_> = generics
                .keys()
                .filter(|(name, _)| name == TUPLE)
                .cloned()
                .collect();
            for key in fixed {
                for params in generics.remove(&key).unwrap_or_default() {
                    variadic.extend(params);
                }
            }
            atoms.remove(&TypeExpression::atomic(TUPLE));
            result.insert(TypeExpression::generic(
                TUPLE,
                vec![combine(variadic), TypeExpression::atomic(ELLIPSIS)],
            ));
        }
        for ((name, arity), observations) in generics {
            // A bare `List` adds nothing next to `List[int]`.
            atoms.remove(&TypeExpression::Atomic(name.clone()));
            let params = (0..arity)
                .map(|idx| combine(observations.iter().map(|params| params[idx].clone())))
                .collect();
            result.insert(TypeExpression::Parameterized(name, params));
        }
        result.extend(atoms);

        if result.is_empty() {
            return match (self.saw_none, self.saw_unknown) {
                (true, true) => TypeExpression::optional(TypeExpression::Unknown),
                (true, false) => TypeExpression::none(),
                _ => TypeExpression::Unknown,
            };
        }
        let merged = TypeExpression::union_of(result);
        if self.saw_none {
            TypeExpression::optional(merged)
        } else {
            merged
        }
    }
}

fn numeric_rank(ty: &TypeExpression) -> Option<usize> {
    match ty {
        TypeExpression::Atomic(name) => NUMERIC_TOWER.iter().position(|numeric| numeric == name),
        _ => None,
    }
}

/// Applies the size budget and the simplifications that only make sense on
/// a final result.
pub fn finalize(ty: &TypeExpression) -> TypeExpression {
    match ty {
        TypeExpression::Atomic(_) | TypeExpression::Unknown => ty.clone(),
        TypeExpression::Parameterized(name, params) => {
            let params: Vec<_> = params.iter().map(finalize).collect();
            // String-keyed dicts with mixed values are usually records; the
            // union adds noise without helping a reader.
            if name == "Dict" && params.len() == 2 && is_str_like(&params[0]) && params[1].is_union() {
                return TypeExpression::generic("Dict", vec![params[0].clone(), TypeExpression::Unknown]);
            }
            TypeExpression::Parameterized(name.clone(), params)
        }
        TypeExpression::UnionOf(members) => {
            if members.len() > MAX_UNION_MEMBERS {
                return TypeExpression::Unknown;
            }
            TypeExpression::union_of(members.iter().map(finalize))
        }
    }
}

fn is_str_like(ty: &TypeExpression) -> bool {
    matches!(ty, TypeExpression::Atomic(name) if name == "str" || name == "Text")
}

fn finalize_argument(ty: &TypeExpression, kind: ArgKind) -> Argument {
    let mut ty = finalize(ty);
    if ty.is_none() {
        ty = TypeExpression::optional(TypeExpression::Unknown);
    }
    if kind != ArgKind::Positional
        && (ty.is_union() || ty.is_optional() || ty.to_string().len() > MAX_STAR_ARG_WIDTH)
    {
        ty = TypeExpression::Unknown;
    }
    Argument::new(ty, kind)
}

#[derive(Debug, Clone)]
struct SlotObservations {
    merged: TypeExpression,
    kind: ArgKind,
    count: usize,
}

/// Folds observed calls one at a time. Two accumulators can be joined with
/// [`SignatureAccumulator::absorb`]; the result equals folding all of their
/// observations into one.
#[derive(Debug, Clone, Default)]
pub struct SignatureAccumulator {
    slots: Vec<SlotObservations>,
    returns: Option<TypeExpression>,
    samples: usize,
}

impl SignatureAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn add_comment(&mut self, comment: &str) -> Result<(), InferError> {
        let parsed = parse_type_comment(comment)?;
        self.add_parsed(parsed)
    }

    pub fn add_parsed(&mut self, parsed: ParsedComment) -> Result<(), InferError> {
        let observed: Vec<_> = parsed
            .args
            .into_iter()
            .map(|arg| SlotObservations {
                merged: arg.ty,
                kind: arg.kind,
                count: 1,
            })
            .collect();
        self.join(observed, Some(parsed.return_type), 1)
    }

    pub fn absorb(&mut self, other: SignatureAccumulator) -> Result<(), InferError> {
        self.join(other.slots, other.returns, other.samples)
    }

    fn join(
        &mut self,
        observed: Vec<SlotObservations>,
        returns: Option<TypeExpression>,
        samples: usize,
    ) -> Result<(), InferError> {
        for (slot, (mine, theirs)) in self.slots.iter().zip(&observed).enumerate() {
            if mine.kind != theirs.kind {
                return Err(InferError::AmbiguousArgKind { slot });
            }
        }
        for (idx, incoming) in observed.into_iter().enumerate() {
            match self.slots.get_mut(idx) {
                Some(existing) => {
                    existing.merged = merge(&existing.merged, &incoming.merged);
                    existing.count += incoming.count;
                }
                None => self.slots.push(incoming),
            }
        }
        // A return observed as `Any` carries no information, not even
        // against `None`.
        if let Some(ret) = returns {
            self.returns = Some(match self.returns.take() {
                Some(existing) if ret.is_unknown() => existing,
                Some(existing) if existing.is_unknown() => combine([ret]),
                Some(existing) => merge(&existing, &ret),
                None => combine([ret]),
            });
        }
        self.samples += samples;
        Ok(())
    }

    pub fn finish(self) -> Result<Signature, InferError> {
        let Some(returns) = self.returns else {
            return Err(InferError::NoSamples);
        };
        let mut args = Vec::with_capacity(self.slots.len());
        for (slot, observed) in self.slots.iter().enumerate() {
            if observed.count == 0 {
                return Err(InferError::EmptySlot { slot });
            }
            args.push(finalize_argument(&combine([observed.merged.clone()]), observed.kind));
        }
        Ok(Signature {
            args,
            return_type: finalize(&returns),
        })
    }
}

/// Merges the raw `(t1, t2) -> tr` strings of one function into its
/// canonical signature.
pub fn infer_signature<S: AsRef<str>>(comments: &[S]) -> Result<Signature, InferError> {
    let mut accumulator = SignatureAccumulator::new();
    for comment in comments {
        accumulator.add_comment(comment.as_ref())?;
    }
    accumulator.finish()
}
