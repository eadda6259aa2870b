use typesmith::annotate::{AnnotateConfig, FileOutcome, SignatureIndex, SkipReason, annotate_source};
use typesmith::errors::AnnotateError;
use typesmith::types::infer_signature;

fn config() -> AnnotateConfig {
    AnnotateConfig {
        inline_style: false,
        max_edits: None,
        annotate_unrecorded: true,
    }
}

fn run(source: &str, index: &SignatureIndex) -> FileOutcome {
    annotate_source(source, index, &config()).unwrap()
}

fn check(before: &str, after: &str) {
    let outcome = run(before, &SignatureIndex::new());
    assert_eq!(outcome.source, after);
    let again = run(&outcome.source, &SignatureIndex::new());
    assert_eq!(again.source, after, "second pass must not change anything");
}

fn record(index: &mut SignatureIndex, line: usize, name: &str, comments: &[&str]) {
    index.insert(line, name, infer_signature(comments).unwrap());
}

#[test]
fn one_arg() {
    check(
        "def incr(arg):\n    return arg+1\n",
        "from typing import Any\ndef incr(arg):\n    # type: (Any) -> Any\n    return arg+1\n",
    );
}

#[test]
fn method_skips_self() {
    check(
        r#"class C:
    def incr(self, arg):
        return 42
"#,
        r#"from typing import Any
class C:
    def incr(self, arg):
        # type: (Any) -> Any
        return 42
"#,
    );
}

#[test]
fn stars() {
    check(
        "def stuff(*a, **kw):\n    return 4, 2\n",
        "from typing import Any\ndef stuff(*a, **kw):\n    # type: (*Any, **Any) -> Any\n    return 4, 2\n",
    );
}

#[test]
fn constructor_returns_none() {
    check(
        r#"class C:
    def __init__(self, x):
        self.x = x
"#,
        r#"from typing import Any
class C:
    def __init__(self, x):
        # type: (Any) -> None
        self.x = x
"#,
    );
}

#[test]
fn comment_goes_before_docstring() {
    check(
        r#"def f(x):
    """Doc."""
    return x
"#,
        r#"from typing import Any
def f(x):
    # type: (Any) -> Any
    """Doc."""
    return x
"#,
    );
}

#[test]
fn existing_type_comment_counts_as_annotated() {
    let source = "def f(x):\n    # type: (int) -> int\n    return x\n";
    let outcome = run(source, &SignatureIndex::new());
    assert_eq!(outcome.source, source);
    assert!(matches!(outcome.diagnostics[0].reason, SkipReason::AlreadyAnnotated));
}

#[test]
fn type_ignore_is_not_an_annotation() {
    check(
        "def f(x):\n    # type: ignore\n    return x\n",
        "from typing import Any\ndef f(x):\n    # type: (Any) -> Any\n    # type: ignore\n    return x\n",
    );
}

#[test]
fn one_line_function_is_refused() {
    let source = "def f(x): return x\n";
    let outcome = run(source, &SignatureIndex::new());
    assert_eq!(outcome.source, source);
    assert_eq!(outcome.annotated, 0);
    assert!(outcome.imports_added.is_empty());
    assert!(matches!(outcome.diagnostics[0].reason, SkipReason::OneLineFunction));
    assert!(outcome.diagnostics[0].reason.is_problem());
}

#[test]
fn nested_functions() {
    check(
        r#"def outer(a):
    def inner(b):
        return b
    return inner
"#,
        r#"from typing import Any
def outer(a):
    # type: (Any) -> Any
    def inner(b):
        # type: (Any) -> Any
        return b
    return inner
"#,
    );
}

#[test]
fn long_form() {
    check(
        r#"def nop(arg0, arg1, arg2, arg3, arg4,
        arg5, arg6, arg7, arg8=0, arg9='',
        *args, **kwds):
    return
"#,
        r#"from typing import Any
def nop(arg0,  # type: Any
        arg1,  # type: Any
        arg2,  # type: Any
        arg3,  # type: Any
        arg4,  # type: Any
        arg5,  # type: Any
        arg6,  # type: Any
        arg7,  # type: Any
        arg8=0,  # type: int
        arg9='',  # type: str
        *args,  # type: Any
        **kwds  # type: Any
        ):
    # type: (...) -> None
    return
"#,
    );
}

#[test]
fn long_form_keeps_trailing_comments() {
    check(
        r#"def f(a,  # first
      b, c, d, e, g):
    pass
"#,
        r#"from typing import Any
def f(a,  # type: Any  # first
      b,  # type: Any
      c,  # type: Any
      d,  # type: Any
      e,  # type: Any
      g  # type: Any
      ):
    # type: (...) -> None
    pass
"#,
    );
}

#[test]
fn long_form_method_leaves_self_bare() {
    check(
        r#"class C:
    def method(self, a, b, c, d, e, f):
        return 1
"#,
        r#"from typing import Any
class C:
    def method(self,
               a,  # type: Any
               b,  # type: Any
               c,  # type: Any
               d,  # type: Any
               e,  # type: Any
               f  # type: Any
               ):
        # type: (...) -> Any
        return 1
"#,
    );
}

#[test]
fn recorded_types_need_imports() {
    let source = "def f(a, b, c):\n    pass\n";
    let mut index = SignatureIndex::new();
    record(
        &mut index,
        1,
        "f",
        &["(Dict[str, int], List[int], Optional[str]) -> None"],
    );
    let outcome = run(source, &index);
    assert_eq!(
        outcome.source,
        r#"from typing import Dict
from typing import List
from typing import Optional
def f(a, b, c):
    # type: (Dict[str, int], List[int], Optional[str]) -> None
    pass
"#
    );
    assert_eq!(outcome.imports_added, vec!["Dict", "List", "Optional"]);
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn missing_trailing_types_are_padded() {
    let source = "def f(a, b):\n    pass\n";
    let mut index = SignatureIndex::new();
    record(&mut index, 1, "f", &["(int) -> None"]);
    let outcome = run(source, &index);
    assert_eq!(
        outcome.source,
        "from typing import Any\ndef f(a, b):\n    # type: (int, Any) -> None\n    pass\n"
    );
}

#[test]
fn extra_types_are_an_error() {
    let source = "def f(a):\n    pass\n";
    let mut index = SignatureIndex::new();
    record(&mut index, 1, "f", &["(int, str) -> None"]);
    let outcome = run(source, &index);
    assert_eq!(outcome.source, source);
    assert!(matches!(
        outcome.diagnostics[0].reason,
        SkipReason::Failed(AnnotateError::ArityMismatch { expected: 2, found: 1 })
    ));
}

#[test]
fn literal_default_fills_unknown_sample() {
    let source = "def f(a, b=''):\n    pass\n";
    let mut index = SignatureIndex::new();
    record(&mut index, 1, "f", &["(int, Any) -> None"]);
    let outcome = run(source, &index);
    assert_eq!(
        outcome.source,
        "def f(a, b=''):\n    # type: (int, str) -> None\n    pass\n"
    );
    assert!(outcome.imports_added.is_empty());
}

#[test]
fn unrecorded_functions_are_left_alone_by_default() {
    let source = "def f(a):\n    pass\ndef g(b):\n    pass\n";
    let mut index = SignatureIndex::new();
    record(&mut index, 3, "g", &["(int) -> None"]);
    let config = AnnotateConfig {
        annotate_unrecorded: false,
        ..config()
    };
    let outcome = annotate_source(source, &index, &config).unwrap();
    assert_eq!(
        outcome.source,
        "def f(a):\n    pass\ndef g(b):\n    # type: (int) -> None\n    pass\n"
    );
    assert_eq!(outcome.annotated, 1);
}

#[test]
fn edit_budget_stops_annotating() {
    let source = "def f(a):\n    pass\ndef g(b):\n    pass\n";
    let config = AnnotateConfig {
        max_edits: Some(1),
        ..config()
    };
    let outcome = annotate_source(source, &SignatureIndex::new(), &config).unwrap();
    assert_eq!(
        outcome.source,
        "from typing import Any\ndef f(a):\n    # type: (Any) -> None\n    pass\ndef g(b):\n    pass\n"
    );
    assert_eq!(outcome.annotated, 1);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].function, "g");
    assert!(matches!(outcome.diagnostics[0].reason, SkipReason::BudgetExhausted));
    assert!(!outcome.diagnostics[0].reason.is_problem());
}

#[test]
fn records_without_a_definition_are_reported() {
    let source = "def f(a):\n    pass\n";
    let mut index = SignatureIndex::new();
    record(&mut index, 1, "f", &["(int) -> None"]);
    record(&mut index, 7, "gone", &["() -> None"]);
    let outcome = run(source, &index);
    assert_eq!(outcome.annotated, 1);
    assert_eq!(outcome.diagnostics.len(), 1);
    let diagnostic = &outcome.diagnostics[0];
    assert_eq!((diagnostic.line, diagnostic.function.as_str()), (7, "gone"));
    assert!(matches!(diagnostic.reason, SkipReason::NoMatchingFunction));
    assert_eq!(
        diagnostic.to_string(),
        "<source>:7: gone: no function definition matches this record"
    );
}

#[test]
fn crlf_line_endings_are_kept() {
    check(
        "def f(a):\r\n    pass\r\n",
        "from typing import Any\r\ndef f(a):\r\n    # type: (Any) -> None\r\n    pass\r\n",
    );
}

#[test]
fn crlf_long_form() {
    let before = r#"class C:
    def m(self, a, b, c, d, e, f):
        pass
"#;
    let after = r#"from typing import Any
class C:
    def m(self,
          a,  # type: Any
          b,  # type: Any
          c,  # type: Any
          d,  # type: Any
          e,  # type: Any
          f  # type: Any
          ):
        # type: (...) -> None
        pass
"#;
    check(&before.replace('\n', "\r\n"), &after.replace('\n', "\r\n"));
}

#[test]
fn inline_parameter_annotations_block_type_comments() {
    let source = "def f(a: int, b):\n    return b\n";
    let outcome = run(source, &SignatureIndex::new());
    assert_eq!(outcome.source, source);
    assert_eq!(outcome.annotated, 0);
    assert!(matches!(outcome.diagnostics[0].reason, SkipReason::InlineAnnotations));
    assert!(outcome.diagnostics[0].reason.is_problem());
}
