use crate::error::{ApplyError, MalformedBlock};

/// Header tag of the structural (v2) text format.
pub const STRUCTURAL_TAG: &str = "f2t2f_folder_structure_v2";
/// Value of the `type` field of the legacy (v1) JSON format.
pub const LEGACY_TAG: &str = "f2t2f_folder_structure_v1";

/// Stand-in content for files that are not valid UTF-8.
pub const BINARY_PLACEHOLDER: &str = "[Binary file - content not readable as text]";

/// Closer suffix for file content that does not end in a newline.
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

pub const SECTION_SEPARATOR: &str = "---";
pub const MIN_FENCE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    StructuralV2,
    LegacyJsonV1,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub format: FormatKind,
    pub root_name: Option<String>,
    /// Paths from the tree section. Display only; reconstruction never reads it.
    pub tree_preview: Vec<String>,
    pub operations: Vec<Operation>,
}

/// Result of a decode: the document plus blocks that had to be skipped.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub document: Document,
    pub warnings: Vec<MalformedBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    WriteFile {
        path: String,
        content: String,
    },
    CreateDir {
        path: String,
    },
    ReplaceLines {
        path: String,
        start_line: usize,
        end_line: usize,
        new_content: Vec<String>,
    },
    ApplyUnifiedDiff {
        path: String,
        hunks: Vec<Hunk>,
    },
    /// A file carried only as the binary placeholder; never written.
    Ignore {
        path: String,
    },
}

impl Operation {
    pub fn path(&self) -> &str {
        match self {
            Operation::WriteFile { path, .. }
            | Operation::CreateDir { path }
            | Operation::ReplaceLines { path, .. }
            | Operation::ApplyUnifiedDiff { path, .. }
            | Operation::Ignore { path } => path,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operation::WriteFile { .. } => "write",
            Operation::CreateDir { .. } => "mkdir",
            Operation::ReplaceLines { .. } => "replace_lines",
            Operation::ApplyUnifiedDiff { .. } => "diff",
            Operation::Ignore { .. } => "ignore",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
    /// `\ No newline at end of file` followed the hunk's last old line.
    pub old_missing_newline: bool,
    /// Same, for the last new line.
    pub new_missing_newline: bool,
}

impl Hunk {
    /// Lines the hunk expects to find in the current file (context + removed).
    pub fn old_lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|l| l.kind != DiffLineKind::Add)
            .map(|l| l.text.as_str())
    }

    /// Lines the hunk leaves behind (context + added).
    pub fn new_lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|l| l.kind != DiffLineKind::Remove)
            .map(|l| l.text.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    Context,
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Overwritten,
    Unchanged,
    Patched,
    Skipped,
}

#[derive(Debug)]
pub struct Applied {
    pub path: String,
    pub label: &'static str,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub struct Failure {
    pub path: String,
    pub label: &'static str,
    pub error: ApplyError,
}

/// Everything an apply batch did, in document order.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub applied: Vec<Applied>,
    pub failures: Vec<Failure>,
}

impl ApplyReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.applied.iter().filter(|a| a.outcome == outcome).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
