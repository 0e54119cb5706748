use crate::error::ApplyError;
use crate::patch_format::{DiffLineKind, Hunk};

/// How far (in lines, either direction) a hunk may drift from the
/// position its header declares.
pub const SEARCH_WINDOW: usize = 100;

/// A text file split into lines, remembering how to put it back together.
///
/// When every line break is `\r\n` the lines are stored without `\r` and
/// joined with `\r\n` again on render. With mixed endings each line keeps
/// its own `\r`, so untouched lines render unchanged and new lines get `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFile {
    pub lines: Vec<String>,
    pub trailing_newline: bool,
    pub crlf: bool,
}

impl TextFile {
    pub fn parse(content: &str) -> Self {
        let breaks = content.matches('\n').count();
        let crlf = breaks > 0 && content.matches("\r\n").count() == breaks;
        let trailing_newline = content.is_empty() || content.ends_with('\n');
        if content.is_empty() {
            return TextFile {
                lines: Vec::new(),
                trailing_newline,
                crlf,
            };
        }

        let body = content.strip_suffix('\n').unwrap_or(content);
        let mut lines: Vec<String> = body.split('\n').map(str::to_string).collect();
        if crlf {
            // Only lines followed by a break lose their `\r`.
            let terminated = if trailing_newline { lines.len() } else { lines.len() - 1 };
            for line in &mut lines[..terminated] {
                if line.ends_with('\r') {
                    line.pop();
                }
            }
        }
        TextFile {
            lines,
            trailing_newline,
            crlf,
        }
    }

    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let sep = if self.crlf { "\r\n" } else { "\n" };
        let mut out = self.lines.join(sep);
        if self.trailing_newline {
            out.push_str(sep);
        }
        out
    }
}

/// Replace lines `start..=end` (1-indexed) with `new_content`.
pub fn replace_lines(
    lines: &[String],
    start: usize,
    end: usize,
    new_content: &[String],
) -> Result<Vec<String>, ApplyError> {
    let total = lines.len();
    if start == 0 || start > total || end > total || start > end {
        return Err(ApplyError::RangeOutOfBounds { start, end, total });
    }
    let mut out = Vec::with_capacity(total - (end - start + 1) + new_content.len());
    out.extend_from_slice(&lines[..start - 1]);
    out.extend_from_slice(new_content);
    out.extend_from_slice(&lines[end..]);
    Ok(out)
}

fn matches_at(lines: &[String], pos: usize, expected: &[&str]) -> bool {
    pos + expected.len() <= lines.len()
        && lines[pos..pos + expected.len()]
            .iter()
            .zip(expected)
            .all(|(have, want)| have.strip_suffix('\r').unwrap_or(have) == *want)
}

/// Find where a hunk's old lines sit, trying the declared position first
/// and then alternating outward up to `window` lines, never before `cursor`.
fn locate(lines: &[String], expected: &[&str], declared: isize, cursor: usize, window: usize) -> Option<usize> {
    let fits = |pos: Option<isize>| -> Option<usize> {
        let pos = usize::try_from(pos?).ok()?;
        (pos >= cursor && matches_at(lines, pos, expected)).then_some(pos)
    };
    let window = window.min(lines.len()) as isize;
    for distance in 0..=window {
        if let Some(pos) = fits(declared.checked_add(distance)) {
            return Some(pos);
        }
        if distance > 0 {
            if let Some(pos) = fits(declared.checked_sub(distance)) {
                return Some(pos);
            }
        }
    }
    None
}

/// Apply all hunks to `lines`, or none of them.
///
/// Hunks are applied in order; each one's declared start is shifted by the
/// drift observed on the previous hunk, and matching never reaches back
/// into a region an earlier hunk already replaced. Context lines are kept
/// as they appear in the file.
pub fn apply_hunks(lines: &[String], hunks: &[Hunk], window: usize) -> Result<Vec<String>, ApplyError> {
    let mut out = Vec::with_capacity(lines.len());
    let mut cursor = 0usize;
    let mut drift = 0isize;

    for (i, hunk) in hunks.iter().enumerate() {
        let mismatch = || ApplyError::HunkMismatch {
            index: i + 1,
            old_start: hunk.old_start,
        };
        let old: Vec<&str> = hunk.old_lines().collect();
        let old_start = isize::try_from(hunk.old_start).map_err(|_| mismatch())?;
        // A pure insertion goes after line `old_start`; anything else starts at it.
        let declared = if old.is_empty() { old_start } else { old_start - 1 };
        let expected = declared.checked_add(drift);

        let pos = if old.is_empty() {
            expected.unwrap_or(isize::MAX).clamp(cursor as isize, lines.len() as isize) as usize
        } else {
            expected
                .and_then(|start| locate(lines, &old, start, cursor, window))
                .ok_or_else(mismatch)?
        };

        if expected != Some(pos as isize) {
            tracing::debug!(
                hunk = i + 1,
                declared = hunk.old_start,
                found = pos + 1,
                "hunk applied at a shifted position"
            );
        }
        drift = pos as isize - declared;

        out.extend_from_slice(&lines[cursor..pos]);
        let mut matched = lines[pos..pos + old.len()].iter();
        for line in &hunk.lines {
            match line.kind {
                DiffLineKind::Context => out.extend(matched.next().cloned()),
                DiffLineKind::Remove => {
                    matched.next();
                }
                DiffLineKind::Add => out.push(line.text.clone()),
            }
        }
        cursor = pos + old.len();
    }

    out.extend_from_slice(&lines[cursor..]);
    Ok(out)
}

/// Apply `hunks` to `file`, including any change to its final newline.
pub fn patch_file(file: &mut TextFile, hunks: &[Hunk], window: usize) -> Result<(), ApplyError> {
    file.lines = apply_hunks(&file.lines, hunks, window)?;
    if hunks.iter().any(|h| h.new_missing_newline) {
        file.trailing_newline = false;
    } else if hunks.iter().any(|h| h.old_missing_newline) {
        file.trailing_newline = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch_format::{DiffLine, DiffLineKind};

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    fn numbered(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("L{}", i)).collect()
    }

    fn hunk(old_start: usize, body: &[(DiffLineKind, &str)]) -> Hunk {
        let old_count = body.iter().filter(|(k, _)| *k != DiffLineKind::Add).count();
        let new_count = body.iter().filter(|(k, _)| *k != DiffLineKind::Remove).count();
        Hunk {
            old_start,
            old_count,
            new_start: old_start,
            new_count,
            lines: body
                .iter()
                .map(|(kind, text)| DiffLine {
                    kind: *kind,
                    text: text.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    use DiffLineKind::{Add, Context, Remove};

    #[test]
    fn test_text_file_round_trip() {
        for content in ["", "a", "a\n", "a\nb", "a\r\nb\r\n", "a\r\nb\r", "a\r\nb\nc\r\n", "\n", "\n\n"] {
            assert_eq!(TextFile::parse(content).render(), content, "{content:?}");
        }
    }

    #[test]
    fn test_replace_lines_middle() {
        let out = replace_lines(&numbered(5), 2, 3, &lines(&["X", "Y", "Z"])).unwrap();
        assert_eq!(out, lines(&["L1", "X", "Y", "Z", "L4", "L5"]));
    }

    #[test]
    fn test_replace_lines_delete_range() {
        let out = replace_lines(&numbered(3), 1, 3, &[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_replace_lines_out_of_bounds() {
        for (start, end) in [(6, 6), (2, 6), (4, 3), (0, 1)] {
            assert!(matches!(
                replace_lines(&numbered(5), start, end, &[]),
                Err(ApplyError::RangeOutOfBounds { total: 5, .. })
            ));
        }
    }

    #[test]
    fn test_hunk_at_declared_position() {
        let h = hunk(2, &[(Context, "L2"), (Remove, "L3"), (Add, "three"), (Context, "L4")]);
        let out = apply_hunks(&numbered(5), &[h], SEARCH_WINDOW).unwrap();
        assert_eq!(out, lines(&["L1", "L2", "three", "L4", "L5"]));
    }

    #[test]
    fn test_hunk_with_drift() {
        // Declared at line 10, actually at line 12.
        let h = hunk(10, &[(Context, "L12"), (Remove, "L13"), (Add, "new"), (Context, "L14")]);
        let out = apply_hunks(&numbered(20), &[h], SEARCH_WINDOW).unwrap();
        assert_eq!(out[11], "L12");
        assert_eq!(out[12], "new");
        assert_eq!(out[13], "L14");
        assert_eq!(out.len(), 20);
    }

    #[test]
    fn test_hunk_mismatch() {
        let h = hunk(3, &[(Context, "nowhere"), (Remove, "L3")]);
        let err = apply_hunks(&numbered(20), &[h], SEARCH_WINDOW).unwrap_err();
        assert!(matches!(err, ApplyError::HunkMismatch { index: 1, old_start: 3 }));
    }

    #[test]
    fn test_hunk_outside_window_fails() {
        let h = hunk(1, &[(Remove, "L50")]);
        assert!(apply_hunks(&numbered(60), &[h.clone()], 10).is_err());
        assert!(apply_hunks(&numbered(60), &[h], 60).is_ok());
    }

    #[test]
    fn test_second_hunk_uses_first_drift() {
        // The first hunk sits two lines below its header, the second four.
        let first = hunk(1, &[(Context, "L3"), (Add, "a")]);
        let second = hunk(6, &[(Remove, "L10"), (Add, "b1"), (Add, "b2")]);
        let out = apply_hunks(&numbered(12), &[first, second], 2).unwrap();
        assert_eq!(
            out,
            lines(&["L1", "L2", "L3", "a", "L4", "L5", "L6", "L7", "L8", "L9", "b1", "b2", "L11", "L12"])
        );
    }

    #[test]
    fn test_failed_second_hunk_rejects_all() {
        let first = hunk(1, &[(Remove, "L1"), (Add, "x")]);
        let second = hunk(4, &[(Remove, "missing")]);
        assert!(apply_hunks(&numbered(5), &[first, second], SEARCH_WINDOW).is_err());
    }

    #[test]
    fn test_pure_insertion() {
        let h = hunk(0, &[(Add, "header")]);
        let out = apply_hunks(&numbered(2), &[h], SEARCH_WINDOW).unwrap();
        assert_eq!(out, lines(&["header", "L1", "L2"]));

        let h = hunk(2, &[(Add, "tail")]);
        let out = apply_hunks(&numbered(2), &[h], SEARCH_WINDOW).unwrap();
        assert_eq!(out, lines(&["L1", "L2", "tail"]));
    }

    #[test]
    fn test_new_file_from_empty() {
        let h = hunk(0, &[(Add, "one"), (Add, "two")]);
        let out = apply_hunks(&[], &[h], SEARCH_WINDOW).unwrap();
        assert_eq!(out, lines(&["one", "two"]));
    }

    #[test]
    fn test_huge_old_start_is_a_mismatch() {
        let file = numbered(3);
        for old_start in [usize::MAX, isize::MAX as usize + 1, isize::MAX as usize] {
            let h = hunk(old_start, &[(Remove, "L1"), (Add, "x")]);
            let err = apply_hunks(&file, &[h], SEARCH_WINDOW).unwrap_err();
            assert!(matches!(err, ApplyError::HunkMismatch { index: 1, .. }), "{old_start}");
        }

        // Drift from the first hunk pushes the second past isize::MAX.
        let first = hunk(1, &[(Remove, "L3")]);
        let second = hunk(isize::MAX as usize, &[(Remove, "L1")]);
        assert!(apply_hunks(&file, &[first, second], SEARCH_WINDOW).is_err());
    }

    #[test]
    fn test_huge_insertion_point_appends() {
        let h = hunk(isize::MAX as usize, &[(Add, "tail")]);
        let out = apply_hunks(&numbered(2), &[h], SEARCH_WINDOW).unwrap();
        assert_eq!(out, lines(&["L1", "L2", "tail"]));
    }

    #[test]
    fn test_mixed_line_endings_are_kept() {
        let mut file = TextFile::parse("a\r\nb\nc\r\n");
        assert!(!file.crlf);
        let h = hunk(1, &[(Context, "a"), (Remove, "b"), (Add, "B"), (Context, "c")]);
        patch_file(&mut file, &[h], SEARCH_WINDOW).unwrap();
        assert_eq!(file.render(), "a\r\nB\nc\r\n");
    }

    #[test]
    fn test_uniform_crlf_is_kept() {
        let mut file = TextFile::parse("a\r\nb\r\n");
        assert!(file.crlf);
        patch_file(&mut file, &[hunk(2, &[(Remove, "b"), (Add, "B")])], SEARCH_WINDOW).unwrap();
        assert_eq!(file.render(), "a\r\nB\r\n");
    }

    #[test]
    fn test_patch_file_updates_final_newline() {
        let mut file = TextFile::parse("a\nb\n");
        let mut h = hunk(2, &[(Remove, "b"), (Add, "b")]);
        h.new_missing_newline = true;
        patch_file(&mut file, &[h], SEARCH_WINDOW).unwrap();
        assert_eq!(file.render(), "a\nb");

        let mut h = hunk(2, &[(Remove, "b"), (Add, "c")]);
        h.old_missing_newline = true;
        patch_file(&mut file, &[h], SEARCH_WINDOW).unwrap();
        assert_eq!(file.render(), "a\nc\n");
    }
}
