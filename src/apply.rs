use std::io::ErrorKind;
use std::path::Path;

use crate::error::ApplyError;
use crate::hunk_apply::{self, TextFile, SEARCH_WINDOW};
use crate::patch_format::{Applied, ApplyReport, Document, Failure, Operation, Outcome};
use crate::util;

/// Apply every operation of `document` under `root`, strictly in document
/// order. A failing operation is recorded and skipped; later operations
/// still run. Each file is written only once its whole operation succeeded.
pub fn apply_document(document: &Document, root: &Path) -> ApplyReport {
    let mut report = ApplyReport::default();

    for op in &document.operations {
        let path = op.path().to_string();
        let label = op.label();
        match apply_operation(op, root) {
            Ok(outcome) => {
                tracing::info!(op = label, path = %path, ?outcome, "applied");
                report.applied.push(Applied { path, label, outcome });
            }
            Err(error) => {
                tracing::warn!(op = label, path = %path, "failed: {error}");
                report.failures.push(Failure { path, label, error });
            }
        }
    }

    report
}

pub fn apply_operation(op: &Operation, root: &Path) -> Result<Outcome, ApplyError> {
    if let Operation::Ignore { .. } = op {
        return Ok(Outcome::Skipped);
    }

    let full = util::resolve_within(root, op.path())?;

    match op {
        Operation::WriteFile { content, .. } => write_file(&full, content),
        Operation::CreateDir { .. } => {
            if full.is_dir() {
                return Ok(Outcome::Unchanged);
            }
            std::fs::create_dir_all(&full)?;
            Ok(Outcome::Created)
        }
        Operation::ReplaceLines {
            start_line,
            end_line,
            new_content,
            ..
        } => {
            let mut file = read_text_file(&full)?;
            file.lines = hunk_apply::replace_lines(&file.lines, *start_line, *end_line, new_content)?;
            std::fs::write(&full, file.render())?;
            Ok(Outcome::Patched)
        }
        Operation::ApplyUnifiedDiff { hunks, .. } => {
            // A diff made only of insertions against nothing creates the file.
            let creates = hunks.iter().all(|h| h.old_count == 0 && h.old_start == 0);
            let mut file = match read_text_file(&full) {
                Err(ApplyError::TargetNotFound) if creates => TextFile::parse(""),
                other => other?,
            };
            hunk_apply::patch_file(&mut file, hunks, SEARCH_WINDOW)?;
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full, file.render())?;
            Ok(Outcome::Patched)
        }
        Operation::Ignore { .. } => Ok(Outcome::Skipped),
    }
}

fn read_text_file(full: &Path) -> Result<TextFile, ApplyError> {
    if !full.is_file() {
        return Err(ApplyError::TargetNotFound);
    }
    match std::fs::read_to_string(full) {
        Ok(text) => Ok(TextFile::parse(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ApplyError::TargetNotFound),
        Err(e) => Err(e.into()),
    }
}

/// Create or overwrite a file. Identical content is left untouched.
fn write_file(full: &Path, content: &str) -> Result<Outcome, ApplyError> {
    let outcome = match std::fs::read(full) {
        Ok(existing) => {
            if existing == content.as_bytes() {
                return Ok(Outcome::Unchanged);
            }
            Outcome::Overwritten
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Outcome::Created,
        Err(e) => return Err(e.into()),
    };

    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(full, content)?;
    Ok(outcome)
}
