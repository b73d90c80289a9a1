#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// INVARIANT CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const INV_INVALID_DOCUMENT: &str = "UT-ERR-STRUCT-001";
pub const INV_MISSING_NAME: &str = "UT-ERR-STRUCT-002";
pub const INV_INVALID_NODE_TYPE: &str = "UT-ERR-STRUCT-003";
pub const INV_INVALID_CHILD: &str = "UT-ERR-STRUCT-004";
pub const INV_MALFORMED_PATTERN: &str = "UT-ERR-STRUCT-005";
pub const INV_UNKNOWN_FORMAT: &str = "UT-ERR-STRUCT-006";
pub const INV_INVALID_EXPRESSION: &str = "UT-ERR-STRUCT-007";
pub const INV_INVALID_STYLE: &str = "UT-ERR-STRUCT-008";
pub const INV_INVALID_IMPORT: &str = "UT-ERR-STRUCT-009";
pub const INV_UNKNOWN_ROOT: &str = "UT-ERR-STRUCT-010";
pub const INV_INVALID_FORMAT_PREDICATE: &str = "UT-ERR-STRUCT-011";
pub const INV_MISPLACED_CONTEXT: &str = "UT-ERR-STRUCT-012";
pub const INV_DUPLICATE_COMPONENT: &str = "UT-ERR-CONFLICT-001";
pub const INV_IMPORT_ALIAS_CONFLICT: &str = "UT-ERR-CONFLICT-002";
pub const INV_DUPLICATE_CONTEXT: &str = "UT-ERR-CONTEXT-001";
pub const INV_UNKNOWN_CONTEXT: &str = "UT-ERR-CONTEXT-002";

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

fn get_guarantee(code: &str) -> &'static str {
    match code {
        INV_INVALID_DOCUMENT => "The input document matches the app tree schema.",
        INV_MISSING_NAME => "Every component definition carries a non-empty name.",
        INV_INVALID_NODE_TYPE => "Every node type is a non-empty string.",
        INV_INVALID_CHILD => {
            "Children are nodes, primitives or well-formed script references."
        }
        INV_MALFORMED_PATTERN => {
            "Destructuring patterns bind at least one name and carry at most one trailing rest."
        }
        INV_UNKNOWN_FORMAT => "Every format style entry references a declared style format.",
        INV_INVALID_EXPRESSION => "Expression entries use a recognized shorthand form.",
        INV_INVALID_STYLE => "Style entries use a recognized style form.",
        INV_INVALID_IMPORT => "Import entries name a source and a recognized import shape.",
        INV_UNKNOWN_ROOT => "The root component names a declared component.",
        INV_INVALID_FORMAT_PREDICATE => "Style formats only use recognized predicate keys.",
        INV_MISPLACED_CONTEXT => "Contexts are provided and consumed by component definitions.",
        INV_DUPLICATE_COMPONENT => "Component names are unique across the app.",
        INV_IMPORT_ALIAS_CONFLICT => {
            "A local import name refers to exactly one symbol within a generated file."
        }
        INV_DUPLICATE_CONTEXT => "A context name is provided by at most one component.",
        INV_UNKNOWN_CONTEXT => "Every consumed context is provided somewhere in the app.",
        _ => "Unknown invariant.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR KINDS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "StructuralError")]
    Structural,
    #[serde(rename = "ConflictError")]
    Conflict,
    #[serde(rename = "DuplicateContextError")]
    DuplicateContext,
    #[serde(rename = "UnknownContextError")]
    UnknownContext,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Structural => "StructuralError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::DuplicateContext => "DuplicateContextError",
            ErrorKind::UnknownContext => "UnknownContextError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// One problem found in the input document.
///
/// `path` points into the input tree (`components[2].children[0].style[1]`).
/// Conflicts also carry the other offending location(s) in `related`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind} [{code}] at {path}: {message}")]
pub struct CompilerError {
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
    pub guarantee: String,
    pub path: String,
    pub related: Vec<String>,
}

impl CompilerError {
    pub fn new(kind: ErrorKind, code: &str, path: &str, message: impl Into<String>) -> Self {
        CompilerError {
            code: code.to_string(),
            kind,
            message: message.into(),
            guarantee: get_guarantee(code).to_string(),
            path: path.to_string(),
            related: vec![],
        }
    }

    pub fn structural(code: &str, path: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Structural, code, path, message)
    }

    pub fn conflict(code: &str, path: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, code, path, message)
    }

    pub fn with_related(mut self, related: impl Into<String>) -> Self {
        self.related.push(related.into());
        self
    }
}

/// The ordered error list of a failed run. No artifacts accompany it.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("compilation failed with {} error(s)", errors.len())]
pub struct CompileFailure {
    pub errors: Vec<CompilerError>,
}

impl CompileFailure {
    pub fn new(errors: Vec<CompilerError>) -> Self {
        CompileFailure { errors }
    }

    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }
}

impl From<Vec<CompilerError>> for CompileFailure {
    fn from(errors: Vec<CompilerError>) -> Self {
        CompileFailure { errors }
    }
}

/// Flattened error record handed across the Node bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub code: String,
    pub error_type: String,
    pub message: String,
    pub guarantee: String,
    pub path: String,
    pub related: Vec<String>,
}

impl From<&CompilerError> for ErrorReport {
    fn from(e: &CompilerError) -> Self {
        ErrorReport {
            code: e.code.clone(),
            error_type: e.kind.as_str().to_string(),
            message: e.message.clone(),
            guarantee: e.guarantee.clone(),
            path: e.path.clone(),
            related: e.related.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_kind_and_path() {
        let err = CompilerError::structural(INV_MISSING_NAME, "components[0]", "missing name");
        let text = err.to_string();
        assert!(text.starts_with("StructuralError"));
        assert!(text.contains("components[0]"));
        assert_eq!(
            err.guarantee,
            "Every component definition carries a non-empty name."
        );
    }

    #[test]
    fn test_kind_serializes_as_error_name() {
        let json = serde_json::to_string(&ErrorKind::DuplicateContext).unwrap();
        assert_eq!(json, "\"DuplicateContextError\"");
    }

    #[test]
    fn test_related_locations_accumulate() {
        let err = CompilerError::conflict(INV_DUPLICATE_COMPONENT, "components[1]", "dup")
            .with_related("components[0]");
        assert_eq!(err.related, vec!["components[0]".to_string()]);
        let failure = CompileFailure::new(vec![err]);
        assert!(failure.has_kind(ErrorKind::Conflict));
        assert!(!failure.has_kind(ErrorKind::Structural));
    }
}
