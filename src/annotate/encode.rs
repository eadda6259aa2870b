use std::collections::BTreeSet;

use crate::types::{Argument, TypeExpression};

/// Compact comments wider than this are candidates for long form.
pub const MAX_COMPACT_WIDTH: usize = 64;
/// Compact comments with more arguments than this are candidates for long form.
pub const MAX_COMPACT_ARGS: usize = 5;

/// Everything decided about one function before its edits are built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationPlan {
    /// One entry per live parameter, in source order.
    pub arg_types: Vec<Argument>,
    pub return_type: TypeExpression,
    pub skip_first: bool,
    pub long_form: bool,
}

impl AnnotationPlan {
    pub fn new(arg_types: Vec<Argument>, return_type: TypeExpression, skip_first: bool) -> Self {
        let mut plan = Self {
            arg_types,
            return_type,
            skip_first,
            long_form: false,
        };
        let compact = plan.compact_comment();
        plan.long_form = (compact.len() > MAX_COMPACT_WIDTH || plan.arg_types.len() > MAX_COMPACT_ARGS)
            && compact.len() > plan.degenerate_comment().len();
        plan
    }

    /// `(T1, *T2) -> R`
    pub fn compact_comment(&self) -> String {
        let args: Vec<_> = self.arg_types.iter().map(Argument::to_string).collect();
        format!("({}) -> {}", args.join(", "), self.return_type)
    }

    /// `(...) -> R`, used when each parameter carries its own comment.
    pub fn degenerate_comment(&self) -> String {
        format!("(...) -> {}", self.return_type)
    }

    /// Text following `# type: ` on the line before the body.
    pub fn function_comment(&self) -> String {
        if self.long_form {
            self.degenerate_comment()
        } else {
            self.compact_comment()
        }
    }

    /// `typing` names referenced by the rendered annotation.
    pub fn required_imports(&self, include_return: bool) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for arg in &self.arg_types {
            arg.ty.collect_typing_names(&mut names);
        }
        if include_return {
            self.return_type.collect_typing_names(&mut names);
        }
        names
    }
}

pub fn type_comment_line(indent: &str, text: &str, newline: &str) -> String {
    format!("{indent}# type: {text}{newline}")
}

/// Trailing per-parameter comment for long form. Star prefixes are implied
/// by the parameter itself.
pub fn parameter_comment(arg: &Argument) -> String {
    format!("  # type: {}", arg.ty)
}

pub fn inline_parameter(name: &str, ty: &TypeExpression) -> String {
    format!("{name}: {ty}")
}

/// Replacement for the `:` that ends a `def` line.
pub fn inline_return(ty: &TypeExpression) -> String {
    format!(" -> {ty}:")
}
