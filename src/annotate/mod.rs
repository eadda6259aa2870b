//! Rewrites Python source so that function definitions carry signatures.
//!
//! Functions are visited in source order, one at a time. For each one the
//! annotator decides whether to touch it, builds an [`AnnotationPlan`],
//! turns the plan into token edits and commits them all at once. Anything
//! unexpected about a single function becomes a [`Diagnostic`] and the pass
//! moves on to the next function.

pub mod encode;
pub mod heuristics;
pub mod imports;
pub mod params;
pub mod tree;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use tracing::{debug, warn};

use crate::errors::AnnotateError;
use crate::types::{Argument, Signature, TypeExpression};

pub use encode::AnnotationPlan;
use params::ParameterSlot;
pub use tree::{Edit, NodeId, PythonParser, SyntaxTree};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotateConfig {
    /// PEP 484 inline annotations instead of `# type:` comments.
    pub inline_style: bool,
    /// Run-wide limit on annotated functions.
    pub max_edits: Option<usize>,
    /// Also annotate functions that have no recorded signature.
    pub annotate_unrecorded: bool,
}

/// Remaining number of functions that may still be annotated in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditBudget {
    remaining: Option<usize>,
}

impl EditBudget {
    pub fn new(limit: Option<usize>) -> Self {
        Self { remaining: limit }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    fn consume(&mut self) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }
}

/// Signatures of one file keyed by the line and name they were recorded at.
#[derive(Debug, Clone, Default)]
pub struct SignatureIndex {
    by_location: HashMap<(usize, String), Signature>,
}

impl SignatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded names may be qualified (`Class.method`); only the last
    /// component is compared with the `def` name.
    pub fn insert(&mut self, line: usize, func_name: &str, signature: Signature) {
        let name = func_name.rsplit('.').next().unwrap_or(func_name);
        self.by_location.insert((line, name.to_string()), signature);
    }

    pub fn get(&self, line: usize, name: &str) -> Option<&Signature> {
        self.by_location.get(&(line, name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_location.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_location.is_empty()
    }

    fn locations(&self) -> impl Iterator<Item = &(usize, String)> {
        self.by_location.keys()
    }
}

#[derive(Debug)]
pub enum SkipReason {
    AlreadyAnnotated,
    BudgetExhausted,
    OneLineFunction,
    InlineAnnotations,
    NoMatchingFunction,
    Failed(AnnotateError),
}

impl SkipReason {
    /// Skips that point at something the user may want to look at.
    pub fn is_problem(&self) -> bool {
        !matches!(self, SkipReason::AlreadyAnnotated | SkipReason::BudgetExhausted)
    }
}

impl From<AnnotateError> for SkipReason {
    fn from(err: AnnotateError) -> Self {
        SkipReason::Failed(err)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyAnnotated => f.write_str("already annotated"),
            SkipReason::BudgetExhausted => f.write_str("edit budget exhausted"),
            SkipReason::OneLineFunction => f.write_str("cannot insert annotation for one-line function"),
            SkipReason::InlineAnnotations => {
                f.write_str("parameters already carry inline annotations; a type comment would conflict")
            }
            SkipReason::NoMatchingFunction => f.write_str("no function definition matches this record"),
            SkipReason::Failed(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug)]
pub struct Diagnostic {
    pub path: String,
    pub line: usize,
    pub function: String,
    pub reason: SkipReason,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}: {}", self.path, self.line, self.function, self.reason)
    }
}

#[derive(Debug)]
pub struct FileOutcome {
    pub source: String,
    /// Number of functions that received annotations.
    pub annotated: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub imports_added: Vec<String>,
}

impl FileOutcome {
    pub fn changed(&self) -> bool {
        self.annotated > 0 || !self.imports_added.is_empty()
    }
}

pub struct Annotator {
    parser: PythonParser,
    config: AnnotateConfig,
}

impl Annotator {
    pub fn new(config: AnnotateConfig) -> Result<Self, AnnotateError> {
        Ok(Self {
            parser: PythonParser::new()?,
            config,
        })
    }

    /// Annotates one file. Only an unparsable file is an error; problems
    /// with individual functions are reported in the outcome.
    pub fn annotate(
        &mut self,
        path: &str,
        source: &str,
        index: &SignatureIndex,
        budget: &mut EditBudget,
    ) -> Result<FileOutcome, AnnotateError> {
        let tree = self.parser.parse(source)?;
        let functions = tree.descendants_of_kind(tree.root(), "function_definition");
        let mut pass = FilePass {
            tree,
            path,
            config: &self.config,
            index,
            budget,
            diagnostics: Vec::new(),
            needed_imports: BTreeSet::new(),
            annotated: 0,
            matched: HashSet::new(),
        };
        for func in functions {
            pass.visit(func);
        }
        Ok(pass.finish())
    }
}

/// Annotates a single source text with a fresh budget taken from `config`.
pub fn annotate_source(
    source: &str,
    index: &SignatureIndex,
    config: &AnnotateConfig,
) -> Result<FileOutcome, AnnotateError> {
    let mut annotator = Annotator::new(config.clone())?;
    let mut budget = EditBudget::new(config.max_edits);
    annotator.annotate("<source>", source, index, &mut budget)
}

struct FilePass<'a> {
    tree: SyntaxTree,
    path: &'a str,
    config: &'a AnnotateConfig,
    index: &'a SignatureIndex,
    budget: &'a mut EditBudget,
    diagnostics: Vec<Diagnostic>,
    needed_imports: BTreeSet<String>,
    annotated: usize,
    matched: HashSet<(usize, String)>,
}

impl<'a> FilePass<'a> {
    fn visit(&mut self, func: NodeId) {
        let Some(name_node) = self.tree.child_by_field(func, "name") else {
            return;
        };
        let name = self.tree.value(name_node).to_string();
        let line = self.tree.node(func).line;
        let signature = self.lookup(func, &name);
        if signature.is_none() && !self.config.annotate_unrecorded {
            return;
        }

        if self.is_annotated(func) {
            self.skip(line, &name, SkipReason::AlreadyAnnotated);
            return;
        }
        if self.budget.is_exhausted() {
            self.skip(line, &name, SkipReason::BudgetExhausted);
            return;
        }

        match self.annotate_function(func, &name, signature) {
            Ok(imports) => {
                debug!(path = self.path, line, function = %name, "annotated");
                self.budget.consume();
                self.annotated += 1;
                self.needed_imports.extend(imports);
            }
            Err(reason) => self.skip(line, &name, reason),
        }
    }

    fn lookup(&mut self, func: NodeId, name: &str) -> Option<&'a Signature> {
        let index = self.index;
        let def_line = self.tree.node(func).line;
        let lines = [Some(def_line), heuristics::decorated_line(&self.tree, func)];
        for line in lines.into_iter().flatten() {
            if let Some(signature) = index.get(line, name) {
                self.matched.insert((line, name.to_string()));
                return Some(signature);
            }
        }
        None
    }

    /// A `->` annotation, or a `# type:` comment between the `def` line and
    /// the first statement of the body.
    fn is_annotated(&self, func: NodeId) -> bool {
        if self.tree.child_by_field(func, "return_type").is_some() {
            return true;
        }
        self.tree
            .child_by_field(func, "body")
            .and_then(|body| self.tree.first_leaf(body))
            .is_some_and(|leaf| has_type_comment(self.tree.prefix(leaf)))
    }

    fn skip(&mut self, line: usize, function: &str, reason: SkipReason) {
        if reason.is_problem() {
            warn!(path = self.path, line, function, "skipping: {reason}");
        } else {
            debug!(path = self.path, line, function, "skipping: {reason}");
        }
        self.diagnostics.push(Diagnostic {
            path: self.path.to_string(),
            line,
            function: function.to_string(),
            reason,
        });
    }

    fn annotate_function(
        &mut self,
        func: NodeId,
        name: &str,
        signature: Option<&Signature>,
    ) -> Result<BTreeSet<String>, SkipReason> {
        let parameters = self
            .tree
            .child_by_field(func, "parameters")
            .ok_or_else(|| AnnotateError::Structural("function has no parameter list".to_string()))?;
        let slots = params::extract_parameters(&self.tree, parameters)?;
        if !self.config.inline_style && slots.iter().any(ParameterSlot::is_annotated) {
            return Err(SkipReason::InlineAnnotations);
        }
        let plan = self.plan(func, name, &slots, signature)?;

        let (edits, imports) = if self.config.inline_style {
            let live = &slots[usize::from(plan.skip_first)..];
            self.inline_edits(func, name, &plan, live)?
        } else {
            (self.comment_edits(func, &plan, &slots)?, plan.required_imports(true))
        };
        if edits.is_empty() {
            return Err(SkipReason::AlreadyAnnotated);
        }
        self.tree.apply(edits)?;
        Ok(imports)
    }

    fn plan(
        &self,
        func: NodeId,
        name: &str,
        slots: &[ParameterSlot],
        signature: Option<&Signature>,
    ) -> Result<AnnotationPlan, AnnotateError> {
        let decorators = heuristics::plain_decorators(&self.tree, func);
        let skip_first = heuristics::skips_first_parameter(&self.tree, func, &decorators, slots);
        let live = &slots[usize::from(skip_first)..];

        let observed = signature.map(|sig| sig.args.as_slice()).unwrap_or_default();
        if signature.is_some() {
            let (expected, found) = (observed.len(), live.len());
            // Comment style pads missing trailing types with `Any`; inline
            // style has nowhere to put a type it cannot pair with a name.
            if expected > found || (self.config.inline_style && expected != found) {
                return Err(AnnotateError::ArityMismatch { expected, found });
            }
        }

        let arg_types = live
            .iter()
            .enumerate()
            .map(|(idx, slot)| {
                let ty = match (&slot.annotation, observed.get(idx)) {
                    (Some(existing), _) => TypeExpression::Atomic(existing.clone()),
                    (None, Some(arg)) if !arg.ty.is_unknown() => arg.ty.clone(),
                    (None, _) => slot.default_type(&self.tree).unwrap_or(TypeExpression::Unknown),
                };
                Argument::new(ty, slot.kind)
            })
            .collect();

        let returns_value = heuristics::has_value_return(&self.tree, func);
        if heuristics::is_generator(&self.tree, func) {
            debug!(path = self.path, function = name, "generator body; return type not adjusted");
        }
        let return_type = if name == heuristics::CONSTRUCTOR || !returns_value {
            TypeExpression::none()
        } else {
            signature.map_or(TypeExpression::Unknown, |sig| sig.return_type.clone())
        };

        Ok(AnnotationPlan::new(arg_types, return_type, skip_first))
    }

    fn inline_edits(
        &self,
        func: NodeId,
        name: &str,
        plan: &AnnotationPlan,
        live: &[ParameterSlot],
    ) -> Result<(Vec<Edit>, BTreeSet<String>), AnnotateError> {
        let mut edits = Vec::new();
        let mut imports = BTreeSet::new();
        for (slot, arg) in live.iter().zip(&plan.arg_types) {
            if slot.is_annotated() {
                continue;
            }
            edits.push(Edit::Value(
                slot.name_leaf,
                encode::inline_parameter(&slot.name, &arg.ty),
            ));
            arg.ty.collect_typing_names(&mut imports);
        }
        if !heuristics::is_dunder(name) {
            let colon = self.colon_after_parameters(func)?;
            edits.push(Edit::Value(colon, encode::inline_return(&plan.return_type)));
            plan.return_type.collect_typing_names(&mut imports);
        }
        Ok((edits, imports))
    }

    fn colon_after_parameters(&self, func: NodeId) -> Result<NodeId, AnnotateError> {
        let colon = self
            .tree
            .child_by_field(func, "parameters")
            .and_then(|params| self.tree.last_leaf(params))
            .and_then(|close| self.tree.next_leaf(close))
            .filter(|&leaf| self.tree.value(leaf) == ":");
        colon.ok_or_else(|| AnnotateError::Structural("expected `:` after the parameter list".to_string()))
    }

    fn comment_edits(
        &self,
        func: NodeId,
        plan: &AnnotationPlan,
        slots: &[ParameterSlot],
    ) -> Result<Vec<Edit>, SkipReason> {
        let first = self
            .tree
            .child_by_field(func, "body")
            .and_then(|body| self.tree.first_leaf(body))
            .ok_or_else(|| AnnotateError::Structural("function has no body".to_string()))?;
        let prefix = self.tree.prefix(first);
        let (Some(first_newline), Some(last_newline)) = (prefix.find('\n'), prefix.rfind('\n')) else {
            return Err(SkipReason::OneLineFunction);
        };
        let indent = &prefix[last_newline + 1..];
        let comment = encode::type_comment_line(indent, &plan.function_comment(), self.tree.line_ending());
        let patched = format!(
            "{}{comment}{}",
            &prefix[..=first_newline],
            &prefix[first_newline + 1..]
        );

        let mut edits = Vec::new();
        if plan.long_form {
            edits.extend(self.long_form_edits(func, plan, slots)?);
        }
        edits.push(Edit::Prefix(first, patched));
        Ok(edits)
    }

    /// One `# type:` comment per parameter line; `)` moves to its own line
    /// aligned with the first parameter.
    fn long_form_edits(
        &self,
        func: NodeId,
        plan: &AnnotationPlan,
        slots: &[ParameterSlot],
    ) -> Result<Vec<Edit>, AnnotateError> {
        let parameters = self
            .tree
            .child_by_field(func, "parameters")
            .ok_or_else(|| AnnotateError::Structural("function has no parameter list".to_string()))?;
        let children = self.tree.children(parameters);
        let (Some(&close), Some(&first_item)) = (children.last(), children.get(1)) else {
            return Err(AnnotateError::Structural("parameter list has no items".to_string()));
        };
        if slots.is_empty() {
            return Ok(Vec::new());
        }
        let indent = " ".repeat(self.tree.node(first_item).column);
        let newline = self.tree.line_ending();

        let mut types = plan.arg_types.iter();
        let mut edits = Vec::with_capacity(slots.len());
        for (idx, slot) in slots.iter().enumerate() {
            let target = match self.tree.next_sibling(slot.node) {
                Some(comma) if self.tree.value(comma) == "," => self
                    .tree
                    .next_leaf(comma)
                    .ok_or_else(|| AnnotateError::Structural("nothing after `,`".to_string()))?,
                _ => close,
            };
            let old = self.tree.prefix(target);
            let comment = if plan.skip_first && idx == 0 {
                old.trim_end().to_string()
            } else {
                let arg = types.next().ok_or_else(|| {
                    AnnotateError::Structural(format!("no type left for parameter `{}`", slot.name))
                })?;
                let mut comment = encode::parameter_comment(arg);
                let existing = old.trim();
                if !existing.is_empty() {
                    if !existing.starts_with('#') {
                        return Err(AnnotateError::Structural(format!(
                            "unexpected `{existing}` after parameter `{}`",
                            slot.name
                        )));
                    }
                    comment.push_str("  ");
                    comment.push_str(existing);
                }
                comment
            };
            edits.push(Edit::Prefix(target, format!("{comment}{newline}{indent}")));
        }
        if types.next().is_some() {
            return Err(AnnotateError::ArityMismatch {
                expected: plan.arg_types.len(),
                found: slots.len() - usize::from(plan.skip_first),
            });
        }
        Ok(edits)
    }

    fn finish(mut self) -> FileOutcome {
        let mut imports_added = Vec::new();
        if !self.needed_imports.is_empty() {
            match imports::patch_imports(&mut self.tree, &self.needed_imports) {
                Ok(added) => imports_added = added,
                Err(err) => self.skip(1, "<module>", SkipReason::Failed(err)),
            }
        }

        let mut unmatched: Vec<_> = self
            .index
            .locations()
            .filter(|location| !self.matched.contains(*location))
            .cloned()
            .collect();
        unmatched.sort();
        for (line, name) in unmatched {
            self.skip(line, &name, SkipReason::NoMatchingFunction);
        }

        FileOutcome {
            source: self.tree.render(),
            annotated: self.annotated,
            diagnostics: self.diagnostics,
            imports_added,
        }
    }
}

fn has_type_comment(prefix: &str) -> bool {
    prefix.lines().any(|line| {
        line.trim_start()
            .strip_prefix('#')
            .and_then(|comment| comment.trim_start().strip_prefix("type:"))
            .is_some_and(|rest| !rest.trim_start().starts_with("ignore"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unrecorded(inline_style: bool) -> AnnotateConfig {
        AnnotateConfig {
            inline_style,
            max_edits: None,
            annotate_unrecorded: true,
        }
    }

    #[test]
    fn type_comment_detection() {
        assert!(has_type_comment("\n    # type: (int) -> None\n    "));
        assert!(has_type_comment("  #type: () -> None\n    "));
        assert!(!has_type_comment("  # type: ignore\n    "));
        assert!(!has_type_comment("\n    # a typed comment\n    "));
    }

    #[test]
    fn budget_counts_down_and_stops() {
        let source = "def a(x):\n    return x\ndef b(x):\n    return x\ndef c(x):\n    return x\n";
        let config = AnnotateConfig {
            max_edits: Some(2),
            ..unrecorded(true)
        };
        let outcome = annotate_source(source, &SignatureIndex::new(), &config).unwrap();
        assert_eq!(outcome.annotated, 2);
        assert!(outcome.source.contains("def c(x):"));
        let exhausted: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter(|diag| matches!(diag.reason, SkipReason::BudgetExhausted))
            .collect();
        assert_eq!(exhausted.len(), 1);
        assert_eq!(exhausted[0].function, "c");
    }

    #[test]
    fn budget_is_shared_across_files() {
        let mut annotator = Annotator::new(unrecorded(false)).unwrap();
        let mut budget = EditBudget::new(Some(1));
        let index = SignatureIndex::new();
        let first = annotator
            .annotate("a.py", "def f():\n    pass\n", &index, &mut budget)
            .unwrap();
        let second = annotator
            .annotate("b.py", "def g():\n    pass\n", &index, &mut budget)
            .unwrap();
        assert!(first.changed());
        assert!(!second.changed());
        assert!(budget.is_exhausted());
    }

    #[test]
    fn records_match_on_decorator_line_and_qualified_name() {
        let source = "class C:\n    @property\n    def size(self):\n        return 1\n";
        let mut index = SignatureIndex::new();
        index.insert(
            2,
            "C.size",
            Signature {
                args: Vec::new(),
                return_type: TypeExpression::atomic("int"),
            },
        );
        let config = AnnotateConfig::default();
        let outcome = annotate_source(source, &index, &config).unwrap();
        assert_eq!(
            outcome.source,
            "class C:\n    @property\n    def size(self):\n        # type: () -> int\n        return 1\n"
        );
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn records_without_a_function_are_reported() {
        let mut index = SignatureIndex::new();
        index.insert(
            7,
            "missing",
            Signature {
                args: Vec::new(),
                return_type: TypeExpression::none(),
            },
        );
        let outcome = annotate_source("x = 1\n", &index, &AnnotateConfig::default()).unwrap();
        assert!(!outcome.changed());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(matches!(outcome.diagnostics[0].reason, SkipReason::NoMatchingFunction));
        assert_eq!(outcome.diagnostics[0].to_string(), "<source>:7: missing: no function definition matches this record");
    }

    #[test]
    fn unrecorded_functions_are_ignored_by_default() {
        let source = "def f(x):\n    return x\n";
        let outcome = annotate_source(source, &SignatureIndex::new(), &AnnotateConfig::default()).unwrap();
        assert_eq!(outcome.source, source);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn syntax_errors_fail_the_file() {
        let err = annotate_source("def f(:\n", &SignatureIndex::new(), &unrecorded(true)).unwrap_err();
        assert!(matches!(err, AnnotateError::Syntax { .. }));
    }
}
