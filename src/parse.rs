//! Block extraction for the structural format.
//!
//! The scanner walks the text line by line and only reacts to block
//! openers (`>>> file: path`, `>>> patch: path`, `>>> diff: path`,
//! `>>> dir: path`), their closers, and the optional `tree:` section.
//! Everything else, including chat prose and markdown fences around the
//! blocks, is skipped. A block that cannot be read is reported as a
//! [`MalformedBlock`] and scanning carries on after it.
//!
//! An opener made of `n` `>` characters is closed by a line of exactly `n`
//! `<` characters, optionally followed by `\ No newline at end of file`.
//! The closer starts at the opener's indentation (column 0 for encoder
//! output), so indented content such as a diff context line ` <<<` never
//! ends a block.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

use crate::error::{DecodeError, MalformedBlock};
use crate::legacy;
use crate::patch_format::{
    Decoded, Document, FormatKind, Operation, BINARY_PLACEHOLDER, MIN_FENCE, NO_NEWLINE_MARKER,
    SECTION_SEPARATOR,
};
use crate::unified_diff;

static OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(>{3,})\s*(file|patch|diff|dir)\s*:\s*(.+?)\s*$").expect("valid opener regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    File,
    Dir,
    Patch,
    Diff,
}

const QUOTES: [char; 3] = ['"', '\'', '`'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opener<'a> {
    pub indent: &'a str,
    pub fence: usize,
    pub kind: BlockKind,
    pub path: &'a str,
}

/// Strip one matching pair of outer quotes.
fn unquote(path: &str) -> &str {
    QUOTES
        .iter()
        .find_map(|&q| path.strip_prefix(q)?.strip_suffix(q))
        .unwrap_or(path)
}

/// Quote `path` when [`parse_opener`] would otherwise trim or unquote it.
pub fn quote_path(path: &str) -> Cow<'_, str> {
    if path.trim() != path || path.starts_with(QUOTES) || path.ends_with(QUOTES) {
        Cow::Owned(format!("\"{}\"", path))
    } else {
        Cow::Borrowed(path)
    }
}

/// Recognize a block opener line.
pub fn parse_opener(line: &str) -> Option<Opener<'_>> {
    let indent = &line[..line.len() - line.trim_start().len()];
    let caps = OPENER.captures(line.trim())?;
    let fence = caps.get(1)?.as_str().len();
    let kind = match caps.get(2)?.as_str() {
        "file" => BlockKind::File,
        "dir" => BlockKind::Dir,
        "patch" => BlockKind::Patch,
        _ => BlockKind::Diff,
    };
    // Chat output likes to quote paths.
    let path = unquote(caps.get(3)?.as_str());
    Some(Opener {
        indent,
        fence,
        kind,
        path,
    })
}

/// If `line` closes a block of the given fence and indentation, return
/// whether it carries the no-trailing-newline marker.
fn parse_closer(line: &str, fence: usize, indent: &str) -> Option<bool> {
    let trimmed = line.strip_prefix(indent)?.trim_end();
    let run = trimmed.chars().take_while(|&c| c == '<').count();
    if run != fence {
        return None;
    }
    match trimmed[run..].trim() {
        "" => Some(false),
        rest if rest == NO_NEWLINE_MARKER => Some(true),
        _ => None,
    }
}

/// Leading `<`/`>` run of a content line, if long enough to be mistaken
/// for a closer or opener.
pub fn marker_run(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let first = trimmed.chars().next()?;
    if first != '<' && first != '>' {
        return None;
    }
    let run = trimmed.chars().take_while(|&c| c == first).count();
    (run >= MIN_FENCE).then_some(run)
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Parse one line of the box-drawing tree into (depth, name).
fn parse_tree_line(line: &str) -> Option<(usize, &str)> {
    let mut rest = strip_cr(line);
    let mut depth = 0;
    while let Some(r) = rest.strip_prefix("│   ").or_else(|| rest.strip_prefix("    ")) {
        depth += 1;
        rest = r;
    }
    if let Some(r) = rest.strip_prefix("├── ").or_else(|| rest.strip_prefix("└── ")) {
        depth += 1;
        rest = r;
    } else if depth > 0 {
        return None;
    }
    let name = rest.trim();
    (!name.is_empty()).then_some((depth, name))
}

struct Scanner<'a> {
    lines: Vec<&'a str>,
    root_name: Option<String>,
    tree_preview: Vec<String>,
    operations: Vec<Operation>,
    warnings: Vec<MalformedBlock>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Scanner {
            lines: text.split('\n').collect(),
            root_name: None,
            tree_preview: Vec::new(),
            operations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn run(mut self) -> Decoded {
        let mut i = 0;
        while i < self.lines.len() {
            let line = self.lines[i];
            if let Some(opener) = parse_opener(line) {
                i = self.read_block(i, opener);
            } else if line.trim() == "tree:" && self.root_name.is_none() {
                i = self.read_tree(i + 1);
            } else {
                i += 1;
            }
        }

        Decoded {
            document: Document {
                format: FormatKind::StructuralV2,
                root_name: self.root_name,
                tree_preview: self.tree_preview,
                operations: self.operations,
            },
            warnings: self.warnings,
        }
    }

    fn read_tree(&mut self, start: usize) -> usize {
        let mut stack: Vec<&str> = Vec::new();
        let mut i = start;
        while let Some(&line) = self.lines.get(i) {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed == SECTION_SEPARATOR || parse_opener(line).is_some() {
                break;
            }
            i += 1;
            let Some((depth, name)) = parse_tree_line(line) else {
                continue;
            };
            if depth == 0 {
                self.root_name = Some(name.trim_end_matches('/').to_string());
                stack.clear();
                continue;
            }
            stack.truncate(depth - 1);
            if stack.len() != depth - 1 {
                continue;
            }
            stack.push(name.trim_end_matches('/'));
            let mut path = stack.join("/");
            if name.ends_with('/') {
                path.push('/');
            }
            self.tree_preview.push(path);
        }
        i
    }

    fn warn(&mut self, line: usize, path: Option<&str>, reason: String) {
        tracing::warn!(line = line + 1, path = path.unwrap_or(""), "skipping block: {reason}");
        self.warnings.push(MalformedBlock {
            line: line + 1,
            path: path.map(str::to_string),
            reason,
        });
    }

    /// Read the block opened at line `start`; returns where scanning resumes.
    fn read_block(&mut self, start: usize, opener: Opener<'a>) -> usize {
        let mut end = None;
        let mut resume = start + 1;
        for j in start + 1..self.lines.len() {
            let line = self.lines[j];
            if let Some(no_newline) = parse_closer(line, opener.fence, opener.indent) {
                end = Some((j, no_newline));
                break;
            }
            if parse_opener(line).is_some_and(|o| o.fence == opener.fence && o.indent == opener.indent) {
                resume = j;
                break;
            }
        }

        let Some((end, no_newline)) = end else {
            self.warn(start, Some(opener.path), "block is not terminated".to_string());
            return resume;
        };

        let body = &self.lines[start + 1..end];
        let result = match opener.kind {
            BlockKind::File => Ok(file_operation(opener.path, body, no_newline)),
            BlockKind::Dir => Ok(Operation::CreateDir {
                path: opener.path.to_string(),
            }),
            BlockKind::Patch => patch_operation(opener.path, body),
            BlockKind::Diff => diff_operation(opener.path, body),
        };

        match result {
            Ok(op) => {
                tracing::debug!(op = op.label(), path = op.path(), "extracted block");
                self.operations.push(op);
            }
            Err(reason) => self.warn(start, Some(opener.path), reason),
        }
        end + 1
    }
}

fn file_operation(path: &str, body: &[&str], no_newline: bool) -> Operation {
    let mut content = String::with_capacity(body.iter().map(|l| l.len() + 1).sum());
    for line in body {
        content.push_str(line);
        content.push('\n');
    }
    if no_newline {
        content.pop();
    }
    if content == BINARY_PLACEHOLDER {
        Operation::Ignore {
            path: path.to_string(),
        }
    } else {
        Operation::WriteFile {
            path: path.to_string(),
            content,
        }
    }
}

fn parse_range(value: &str) -> Option<(usize, usize)> {
    match value.split_once('-') {
        Some((start, end)) => Some((start.trim().parse().ok()?, end.trim().parse().ok()?)),
        None => {
            let line = value.trim().parse().ok()?;
            Some((line, line))
        }
    }
}

fn patch_operation(path: &str, body: &[&str]) -> Result<Operation, String> {
    let mut action = None;
    let mut range = None;
    let mut i = 0;
    while let Some(line) = body.get(i) {
        let trimmed = line.trim();
        if trimmed == SECTION_SEPARATOR {
            i += 1;
            break;
        }
        match trimmed.split_once(':') {
            Some(("action", value)) => action = Some(value.trim()),
            Some(("lines", value)) => {
                range = Some(parse_range(value).ok_or_else(|| format!("invalid line range '{}'", value.trim()))?)
            }
            _ if trimmed.is_empty() => {}
            _ => break,
        }
        i += 1;
    }

    if let Some(action) = action {
        if action != "replace_lines" {
            return Err(format!("unsupported patch action '{}'", action));
        }
    }
    let (start_line, end_line) = range.ok_or_else(|| "patch block has no 'lines:' range".to_string())?;

    Ok(Operation::ReplaceLines {
        path: path.to_string(),
        start_line,
        end_line,
        new_content: body[i..].iter().map(|l| strip_cr(l).to_string()).collect(),
    })
}

fn diff_operation(path: &str, body: &[&str]) -> Result<Operation, String> {
    let lines: Vec<&str> = body.iter().map(|l| strip_cr(l)).collect();
    if let Some(header) = unified_diff::header_path(&lines) {
        if header != path && header != "/dev/null" {
            tracing::debug!(block = path, header = %header, "diff header names a different path; using the block path");
        }
    }
    let hunks = unified_diff::parse_hunks(&lines)?;
    Ok(Operation::ApplyUnifiedDiff {
        path: path.to_string(),
        hunks,
    })
}

/// Extract every readable block from structural-format text.
pub fn parse_structural(text: &str) -> Decoded {
    Scanner::new(text).run()
}

/// Parse `text` as the given format.
pub fn parse(text: &str, format: FormatKind) -> Result<Decoded, DecodeError> {
    match format {
        FormatKind::StructuralV2 => Ok(parse_structural(text)),
        FormatKind::LegacyJsonV1 => Ok(Decoded {
            document: legacy::parse_legacy(text)?,
            warnings: Vec::new(),
        }),
        FormatKind::Unknown => Err(DecodeError::FormatUnrecognized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch_format::DiffLineKind;

    #[test]
    fn test_parse_opener_variants() {
        let o = parse_opener(">>> file: src/main.rs").unwrap();
        assert_eq!((o.fence, o.kind, o.path), (3, BlockKind::File, "src/main.rs"));

        let o = parse_opener("  >>>>diff:`a b.txt`  ").unwrap();
        assert_eq!((o.fence, o.kind, o.path), (4, BlockKind::Diff, "a b.txt"));

        assert!(parse_opener(">> file: x").is_none());
        assert!(parse_opener(">>> note: x").is_none());
        assert!(parse_opener("text >>> file: x").is_none());
    }

    #[test]
    fn test_parse_closer() {
        assert_eq!(parse_closer("<<<", 3, ""), Some(false));
        assert_eq!(parse_closer("<<<\r", 3, ""), Some(false));
        assert_eq!(parse_closer("<<< \\ No newline at end of file", 3, ""), Some(true));
        assert_eq!(parse_closer("<<<<", 3, ""), None);
        assert_eq!(parse_closer("<<< trailing", 3, ""), None);
        assert_eq!(parse_closer("<<<<", 4, ""), Some(false));
        assert_eq!(parse_closer(" <<<", 3, ""), None);
        assert_eq!(parse_closer("  <<<", 3, "  "), Some(false));
        assert_eq!(parse_closer("   <<<", 3, "  "), None);
    }

    #[test]
    fn test_indented_closer_lines_are_content() {
        let text = ">>> diff: m.txt\n@@ -1,3 +1,3 @@\n a\n <<<\n-b\n+B\n<<<\n";
        let decoded = parse_structural(text);
        assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
        let Operation::ApplyUnifiedDiff { hunks, .. } = &decoded.document.operations[0] else {
            panic!("expected a diff operation");
        };
        assert_eq!(hunks[0].old_lines().collect::<Vec<_>>(), vec!["a", "<<<", "b"]);

        let text = ">>> patch: p.txt\nlines: 1-1\n---\n  <<<\n<<<\n";
        let decoded = parse_structural(text);
        assert_eq!(
            decoded.document.operations,
            vec![Operation::ReplaceLines {
                path: "p.txt".into(),
                start_line: 1,
                end_line: 1,
                new_content: vec!["  <<<".into()],
            }]
        );
    }

    #[test]
    fn test_indented_block_closes_at_its_indentation() {
        let text = "1. Update the file:\n   >>> file: a.txt\n   hello\n   <<<\n";
        let decoded = parse_structural(text);
        assert!(decoded.warnings.is_empty());
        assert_eq!(decoded.document.operations[0].path(), "a.txt");
    }

    #[test]
    fn test_quoted_paths() {
        for (line, path) in [
            (">>> file: \"trail \"", "trail "),
            (">>> file: \"'notes'\"", "'notes'"),
            (">>> file: `src/a.rs`", "src/a.rs"),
            (">>> file: it's", "it's"),
            (">>> file: 'half", "'half"),
        ] {
            assert_eq!(parse_opener(line).unwrap().path, path, "{line}");
        }
        for name in ["plain.txt", "trail ", " lead", "'notes'", "\"q\"", "`tick", "it's"] {
            let line = format!(">>> file: {}", quote_path(name));
            assert_eq!(parse_opener(&line).unwrap().path, name, "{line}");
        }
        assert!(matches!(quote_path("plain.txt"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_prose_around_single_block() {
        let text = "Here's the updated file:\n\n```\n>>> file: a.txt\nhello\nworld\n<<<\n```\n\nHope this helps!\n";
        let decoded = parse_structural(text);
        assert!(decoded.warnings.is_empty());
        assert_eq!(
            decoded.document.operations,
            vec![Operation::WriteFile {
                path: "a.txt".into(),
                content: "hello\nworld\n".into()
            }]
        );
    }

    #[test]
    fn test_unterminated_patch_is_isolated() {
        let text = ">>> patch: b.txt\naction: replace_lines\nlines: 1-2\n---\nnew\n---\n>>> file: a.txt\nok\n<<<\n";
        let decoded = parse_structural(text);
        assert_eq!(decoded.document.operations.len(), 1);
        assert_eq!(decoded.document.operations[0].path(), "a.txt");
        assert_eq!(decoded.warnings.len(), 1);
        assert_eq!(decoded.warnings[0].line, 1);
        assert_eq!(decoded.warnings[0].path.as_deref(), Some("b.txt"));
    }

    #[test]
    fn test_unterminated_at_end() {
        let text = ">>> file: a.txt\nok\n<<<\n>>> diff: b.txt\n@@ -1 +1 @@\n-x\n+y\n";
        let decoded = parse_structural(text);
        assert_eq!(decoded.document.operations.len(), 1);
        assert_eq!(decoded.warnings.len(), 1);
        assert_eq!(decoded.warnings[0].line, 4);
    }

    #[test]
    fn test_patch_block() {
        let text = ">>> patch: src/lib.rs\naction: replace_lines\nlines: 2-3\n---\nX\nY\nZ\n<<<\n";
        let decoded = parse_structural(text);
        assert_eq!(
            decoded.document.operations,
            vec![Operation::ReplaceLines {
                path: "src/lib.rs".into(),
                start_line: 2,
                end_line: 3,
                new_content: vec!["X".into(), "Y".into(), "Z".into()],
            }]
        );
    }

    #[test]
    fn test_patch_block_errors() {
        let missing_range = ">>> patch: a\naction: replace_lines\n---\nx\n<<<\n";
        let bad_action = ">>> patch: a\naction: insert_after\nlines: 1\n---\nx\n<<<\n";
        let bad_range = ">>> patch: a\nlines: one-two\n---\nx\n<<<\n";
        for text in [missing_range, bad_action, bad_range] {
            let decoded = parse_structural(text);
            assert!(decoded.document.operations.is_empty(), "{text}");
            assert_eq!(decoded.warnings.len(), 1, "{text}");
        }
    }

    #[test]
    fn test_diff_block_uses_block_path() {
        let text = ">>> diff: src/real.rs\n--- a/src/wrong.rs\n+++ b/src/wrong.rs\n@@ -1,2 +1,2 @@\n keep\n-old\n+new\n<<<\n";
        let decoded = parse_structural(text);
        let Operation::ApplyUnifiedDiff { path, hunks } = &decoded.document.operations[0] else {
            panic!("expected a diff operation");
        };
        assert_eq!(path, "src/real.rs");
        assert_eq!(hunks[0].lines[1].kind, DiffLineKind::Remove);
    }

    #[test]
    fn test_diff_count_mismatch_is_warning() {
        let text = ">>> diff: a\n@@ -1,3 +1,1 @@\n-x\n+y\n<<<\n";
        let decoded = parse_structural(text);
        assert!(decoded.document.operations.is_empty());
        assert_eq!(decoded.warnings.len(), 1);
    }

    #[test]
    fn test_longer_fence_holds_marker_lines() {
        let text = ">>>> file: notes.md\n>>> file: inner\n<<<\n<<<<\n";
        let decoded = parse_structural(text);
        assert_eq!(
            decoded.document.operations,
            vec![Operation::WriteFile {
                path: "notes.md".into(),
                content: ">>> file: inner\n<<<\n".into()
            }]
        );
    }

    #[test]
    fn test_no_newline_marker_and_placeholder() {
        let text = format!(
            ">>> file: a\nabc\n<<< {m}\n>>> file: img.png\n{p}\n<<< {m}\n>>> dir: empty\n<<<\n",
            m = NO_NEWLINE_MARKER,
            p = BINARY_PLACEHOLDER
        );
        let decoded = parse_structural(&text);
        assert_eq!(
            decoded.document.operations,
            vec![
                Operation::WriteFile { path: "a".into(), content: "abc".into() },
                Operation::Ignore { path: "img.png".into() },
                Operation::CreateDir { path: "empty".into() },
            ]
        );
    }

    #[test]
    fn test_tree_preview() {
        let text = "type: f2t2f_folder_structure_v2\n---\ntree:\nproj/\n├── src/\n│   └── main.rs\n└── a.txt\n---\n";
        let decoded = parse_structural(text);
        assert_eq!(decoded.document.root_name.as_deref(), Some("proj"));
        assert_eq!(decoded.document.tree_preview, vec!["src/", "src/main.rs", "a.txt"]);
        assert!(decoded.document.operations.is_empty());
    }

    #[test]
    fn test_parse_unknown_format() {
        assert!(matches!(
            parse("hello", FormatKind::Unknown),
            Err(DecodeError::FormatUnrecognized)
        ));
    }
}
