use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid type comment {input:?} at offset {offset}: {message}")]
pub struct SignatureParseError {
    pub input: String,
    pub offset: usize,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum InferError {
    #[error(transparent)]
    Parse(#[from] SignatureParseError),
    #[error("no type comments recorded")]
    NoSamples,
    #[error("argument {slot} is observed both with and without a star prefix")]
    AmbiguousArgKind { slot: usize },
    #[error("argument {slot} has no observations")]
    EmptySlot { slot: usize },
}

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("failed to load python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
    #[error("python parser returned no tree")]
    ParseCancelled,
    #[error("syntax error near line {line}")]
    Syntax { line: usize },
    #[error("signature has {expected} argument(s) but function has {found}")]
    ArityMismatch { expected: usize, found: usize },
    #[error("unexpected tree shape: {0}")]
    Structural(String),
    #[error("cannot place import: {0}")]
    ImportPatch(String),
}
