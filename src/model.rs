use serde::{Deserialize, Serialize};

use crate::types::Signature;

/// Runtime samples collected for one function.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub path: String,
    pub line: usize,
    pub func_name: String,
    pub type_comments: Vec<String>,
    pub samples: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SignatureJson {
    pub arg_types: Vec<String>,
    pub return_type: String,
}

impl From<&Signature> for SignatureJson {
    fn from(signature: &Signature) -> Self {
        SignatureJson {
            arg_types: signature.arg_strings(),
            return_type: signature.return_type.to_string(),
        }
    }
}

impl SignatureJson {
    /// The combined `(a, *b) -> r` form accepted by the type comment parser.
    pub fn type_comment(&self) -> String {
        format!("({}) -> {}", self.arg_types.join(", "), self.return_type)
    }
}

/// Inferred signature for one function. Fields are declared in
/// alphabetical order so serialized keys come out sorted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    pub func_name: String,
    pub line: usize,
    pub path: String,
    pub samples: u64,
    pub signature: SignatureJson,
}

impl SignatureRecord {
    pub fn new(record: &FunctionRecord, signature: &Signature) -> Self {
        SignatureRecord {
            func_name: record.func_name.clone(),
            line: record.line,
            path: record.path.clone(),
            samples: record.samples,
            signature: SignatureJson::from(signature),
        }
    }

    /// Back to the sample format, with the signature as the only sample.
    pub fn revert(&self) -> FunctionRecord {
        FunctionRecord {
            path: self.path.clone(),
            line: self.line,
            func_name: self.func_name.clone(),
            type_comments: vec![self.signature.type_comment()],
            samples: self.samples,
        }
    }
}

/// Input accepted by `annotate`: either inferred signatures or raw samples.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum AnnotationInput {
    Signature(SignatureRecord),
    Samples(FunctionRecord),
}

impl AnnotationInput {
    pub fn path(&self) -> &str {
        match self {
            AnnotationInput::Signature(record) => &record.path,
            AnnotationInput::Samples(record) => &record.path,
        }
    }
}
