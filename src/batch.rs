//! File-level glue: JSON in and out, grouping records by file and running
//! the annotator over each file in turn.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::annotate::{AnnotateConfig, Annotator, EditBudget, SignatureIndex};
use crate::errors::InferError;
use crate::model::{AnnotationInput, FunctionRecord, SignatureRecord};
use crate::types::{Signature, infer_signature, parse_type_comment};
use crate::util;

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = util::read_to_string(path)?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

/// Pretty JSON with 4-space indentation.
pub fn to_json_string<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer).context("serialize json")?;
    String::from_utf8(buf).context("json output is not UTF-8")
}

/// Writes to `path`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let json = to_json_string(value)?;
    match path {
        Some(path) => util::write_string(path, &format!("{json}\n")),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn infer_record(record: &FunctionRecord) -> Result<Signature, InferError> {
    infer_signature(&record.type_comments)
}

#[derive(Debug, Default)]
pub struct InferOutcome {
    pub signatures: Vec<SignatureRecord>,
    pub failed: usize,
}

/// Infers every record. A record that fails is logged and left out.
pub fn infer_records(records: &[FunctionRecord]) -> InferOutcome {
    let mut outcome = InferOutcome::default();
    for record in records {
        match infer_record(record) {
            Ok(signature) => outcome.signatures.push(SignatureRecord::new(record, &signature)),
            Err(err) => {
                warn!(
                    path = %record.path,
                    line = record.line,
                    function = %record.func_name,
                    "cannot infer signature: {err}"
                );
                outcome.failed += 1;
            }
        }
    }
    info!(
        inferred = outcome.signatures.len(),
        failed = outcome.failed,
        "inferred signatures"
    );
    outcome
}

pub fn revert_signatures(records: &[SignatureRecord]) -> Vec<FunctionRecord> {
    records.iter().map(SignatureRecord::revert).collect()
}

fn input_signature(input: &AnnotationInput) -> Result<Signature, InferError> {
    match input {
        // Signature records may be hand-edited; use them as written.
        AnnotationInput::Signature(record) => {
            Ok(Signature::from(parse_type_comment(&record.signature.type_comment())?))
        }
        AnnotationInput::Samples(record) => infer_record(record),
    }
}

/// Per-file signature indexes keyed by normalized path, in path order.
pub fn group_by_file(inputs: &[AnnotationInput]) -> BTreeMap<String, SignatureIndex> {
    let mut files: BTreeMap<String, SignatureIndex> = BTreeMap::new();
    for input in inputs {
        let (line, func_name) = match input {
            AnnotationInput::Signature(record) => (record.line, record.func_name.as_str()),
            AnnotationInput::Samples(record) => (record.line, record.func_name.as_str()),
        };
        match input_signature(input) {
            Ok(signature) => {
                let key = util::normalize_path(Path::new(input.path()));
                files.entry(key).or_default().insert(line, func_name, signature);
            }
            Err(err) => warn!(
                path = input.path(),
                line,
                function = func_name,
                "skipping record: {err}"
            ),
        }
    }
    files
}

#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    /// Directory recorded paths are relative to.
    pub root: PathBuf,
    /// Rewrite files in place instead of printing them.
    pub write: bool,
    /// Extra files to process even though no record mentions them.
    pub extra_files: Vec<PathBuf>,
    pub config: AnnotateConfig,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub files: usize,
    pub files_changed: usize,
    pub files_failed: usize,
    pub functions_annotated: usize,
    pub problems: usize,
}

/// Annotates every file the inputs mention, sharing one edit budget across
/// all of them. Changed files are written back or printed to `out`.
pub fn annotate_files(
    inputs: &[AnnotationInput],
    options: &AnnotateOptions,
    out: &mut dyn Write,
) -> Result<BatchSummary> {
    let mut files = group_by_file(inputs);
    for extra in &options.extra_files {
        files.entry(util::normalize_path(extra)).or_default();
    }

    let mut annotator = Annotator::new(options.config.clone())?;
    let mut budget = EditBudget::new(options.config.max_edits);
    let mut summary = BatchSummary::default();

    for (path, index) in &files {
        summary.files += 1;
        let full_path = util::resolve_path(&options.root, path);
        let source = match util::read_to_string(&full_path) {
            Ok(source) => source,
            Err(err) => {
                warn!(path = %path, "{err:#}");
                summary.files_failed += 1;
                continue;
            }
        };
        let outcome = match annotator.annotate(path, &source, index, &mut budget) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(path = %path, "cannot annotate file: {err}");
                summary.files_failed += 1;
                continue;
            }
        };
        summary.functions_annotated += outcome.annotated;
        summary.problems += outcome
            .diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.reason.is_problem())
            .count();
        if !outcome.changed() {
            debug!(path = %path, "unchanged");
            continue;
        }
        summary.files_changed += 1;
        if options.write {
            util::write_string(&full_path, &outcome.source)?;
            info!(path = %path, functions = outcome.annotated, "rewrote file");
        } else {
            writeln!(out, "==> {path} <==").context("write output")?;
            out.write_all(outcome.source.as_bytes()).context("write output")?;
        }
    }

    info!(
        files = summary.files,
        changed = summary.files_changed,
        failed = summary.files_failed,
        functions = summary.functions_annotated,
        problems = summary.problems,
        "annotation finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SignatureJson;

    fn record(path: &str, line: usize, func_name: &str, comments: &[&str]) -> FunctionRecord {
        FunctionRecord {
            path: path.to_string(),
            line,
            func_name: func_name.to_string(),
            type_comments: comments.iter().map(|comment| comment.to_string()).collect(),
            samples: comments.len() as u64,
        }
    }

    #[test]
    fn json_uses_four_space_indent() {
        let json = to_json_string(&vec![1, 2]).unwrap();
        assert_eq!(json, "[\n    1,\n    2\n]");
    }

    #[test]
    fn failed_records_are_left_out() {
        let records = vec![
            record("a.py", 1, "good", &["(int) -> None", "(bool) -> None"]),
            record("a.py", 5, "bad", &["(int -> None"]),
        ];
        let outcome = infer_records(&records);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.signatures.len(), 1);
        assert_eq!(outcome.signatures[0].signature.arg_types, vec!["int"]);
    }

    #[test]
    fn revert_then_infer_is_stable() {
        let records = vec![record(
            "a.py",
            3,
            "f",
            &["(int, *str, **bool) -> List[int]", "(None, *str, **bool) -> List[bool]"],
        )];
        let inferred = infer_records(&records).signatures;
        let reverted = revert_signatures(&inferred);
        assert_eq!(reverted[0].type_comments.len(), 1);
        let again = infer_records(&reverted).signatures;
        assert_eq!(again, inferred);
    }

    #[test]
    fn groups_records_by_normalized_path() {
        let inputs = vec![
            AnnotationInput::Samples(record("./pkg/a.py", 1, "f", &["() -> None"])),
            AnnotationInput::Samples(record("pkg/a.py", 4, "g", &["() -> None"])),
            AnnotationInput::Samples(record("pkg/b.py", 1, "h", &["(oops"])),
        ];
        let files = group_by_file(&inputs);
        assert_eq!(files.len(), 1);
        assert_eq!(files["pkg/a.py"].len(), 2);
    }

    #[test]
    fn signature_records_are_used_as_written() {
        let edited = SignatureRecord {
            func_name: "f".to_string(),
            line: 2,
            path: "a.py".to_string(),
            samples: 1,
            signature: SignatureJson {
                arg_types: vec!["Union[bytes, float, int, str]".to_string(), "None".to_string()],
                return_type: "None".to_string(),
            },
        };
        let files = group_by_file(&[AnnotationInput::Signature(edited)]);
        let signature = files["a.py"].get(2, "f").unwrap();
        assert_eq!(signature.type_comment(), "(Union[bytes, float, int, str], None) -> None");
    }
}
