//! Error types for decoding documents and applying operations.
//!
//! Decoding has two fatal failures ([`DecodeError`]) and one recoverable one
//! ([`MalformedBlock`]), which is collected as a warning while the rest of
//! the document is still extracted. Applying never aborts a batch: every
//! [`ApplyError`] is attached to the operation that produced it.

use std::fmt;
use thiserror::Error;

/// Fatal errors for a whole decode call.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Neither the structural tag nor a legacy JSON document was found.
    #[error("Unrecognized format: expected an f2t2f v2 document or a v1 JSON structure")]
    FormatUnrecognized,

    /// The legacy JSON document does not match the v1 schema.
    #[error("Invalid v1 JSON structure: {reason}")]
    JsonSchemaInvalid { reason: String },
}

/// A block that could not be extracted. Reported alongside the decoded
/// document instead of failing the decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedBlock {
    /// 1-indexed line of the block opener in the source text.
    pub line: usize,
    pub path: Option<String>,
    pub reason: String,
}

impl fmt::Display for MalformedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "line {}: block for '{}' skipped: {}", self.line, path, self.reason),
            None => write!(f, "line {}: block skipped: {}", self.line, self.reason),
        }
    }
}

/// Per-operation failures. The failing operation is skipped and the batch
/// continues.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("target file does not exist")]
    TargetNotFound,

    #[error("line range {start}-{end} is out of bounds for a file with {total} lines")]
    RangeOutOfBounds {
        start: usize,
        end: usize,
        total: usize,
    },

    #[error("hunk {index} (declared at line {old_start}) does not match the file")]
    HunkMismatch { index: usize, old_start: usize },

    #[error("path escapes the destination root")]
    UnsafePath,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApplyError {
    /// Check if this error came from content not lining up with the file,
    /// as opposed to a path or I/O problem.
    pub fn is_content_mismatch(&self) -> bool {
        matches!(
            self,
            ApplyError::RangeOutOfBounds { .. } | ApplyError::HunkMismatch { .. }
        )
    }
}
