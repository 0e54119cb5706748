use regex::Regex;
use std::sync::LazyLock;

use crate::patch_format::{DiffLine, DiffLineKind, Hunk};

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid hunk header regex")
});

fn parse_header(line: &str) -> Result<Option<(usize, usize, usize, usize)>, String> {
    let Some(caps) = HUNK_HEADER.captures(line.trim_end()) else {
        return Ok(None);
    };
    let num = |i: usize, default: usize| -> Result<usize, String> {
        let Some(m) = caps.get(i) else {
            return Ok(default);
        };
        // Line arithmetic happens in isize once drift is involved.
        match m.as_str().parse::<usize>() {
            Ok(n) if isize::try_from(n).is_ok() => Ok(n),
            _ => Err(format!("line number {} in '{}' is too large", m.as_str(), line.trim_end())),
        }
    };
    Ok(Some((num(1, 0)?, num(2, 1)?, num(3, 0)?, num(4, 1)?)))
}

fn mark_missing_newline(last: Option<&DiffLine>, old: &mut bool, new: &mut bool) {
    match last.map(|l| l.kind) {
        Some(DiffLineKind::Context) => {
            *old = true;
            *new = true;
        }
        Some(DiffLineKind::Remove) => *old = true,
        Some(DiffLineKind::Add) => *new = true,
        None => {}
    }
}

/// Path named by the `+++` header, with the conventional `b/` prefix removed.
pub fn header_path(lines: &[&str]) -> Option<String> {
    let line = lines.iter().take_while(|l| !l.starts_with("@@")).find(|l| l.starts_with("+++ "))?;
    let path = line[4..].split('\t').next()?.trim();
    Some(path.strip_prefix("b/").unwrap_or(path).to_string())
}

/// Parse the hunks of a single-file unified diff. Lines before the first
/// `@@` header (`diff`, `index`, `---`, `+++`) are skipped. Each hunk must
/// carry exactly as many lines as its header declares.
pub fn parse_hunks(lines: &[&str]) -> Result<Vec<Hunk>, String> {
    let mut i = lines
        .iter()
        .position(|l| l.starts_with("@@"))
        .ok_or_else(|| "diff contains no hunks".to_string())?;

    let mut hunks: Vec<Hunk> = Vec::new();
    while i < lines.len() {
        let line = lines[i].trim_end_matches('\r');
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        let (old_start, old_count, new_start, new_count) =
            parse_header(line)?.ok_or_else(|| format!("unexpected line outside a hunk: '{}'", line))?;
        let index = hunks.len() + 1;
        i += 1;

        let mut body: Vec<DiffLine> = Vec::new();
        let (mut old_seen, mut new_seen) = (0, 0);
        let (mut old_missing_newline, mut new_missing_newline) = (false, false);
        while old_seen < old_count || new_seen < new_count {
            let Some(raw) = lines.get(i) else {
                return Err(format!(
                    "hunk {} is short: header declares -{} +{}, found -{} +{}",
                    index, old_count, new_count, old_seen, new_seen
                ));
            };
            let raw = raw.trim_end_matches('\r');
            i += 1;

            let (kind, text) = match raw.chars().next() {
                Some(' ') => (DiffLineKind::Context, &raw[1..]),
                Some('+') => (DiffLineKind::Add, &raw[1..]),
                Some('-') => (DiffLineKind::Remove, &raw[1..]),
                Some('\\') => {
                    mark_missing_newline(body.last(), &mut old_missing_newline, &mut new_missing_newline);
                    continue;
                }
                // Editors and chat output often drop the space of empty context lines.
                None => (DiffLineKind::Context, ""),
                Some(_) if raw.starts_with("@@") => {
                    return Err(format!(
                        "hunk {} is short: header declares -{} +{}, found -{} +{}",
                        index, old_count, new_count, old_seen, new_seen
                    ))
                }
                Some(_) => return Err(format!("invalid line in hunk {}: '{}'", index, raw)),
            };
            match kind {
                DiffLineKind::Context => {
                    old_seen += 1;
                    new_seen += 1;
                }
                DiffLineKind::Remove => old_seen += 1,
                DiffLineKind::Add => new_seen += 1,
            }
            if old_seen > old_count || new_seen > new_count {
                return Err(format!(
                    "hunk {} has more lines than its header declares (-{} +{})",
                    index, old_count, new_count
                ));
            }
            body.push(DiffLine {
                kind,
                text: text.to_string(),
            });
        }

        while lines.get(i).is_some_and(|l| l.starts_with('\\')) {
            mark_missing_newline(body.last(), &mut old_missing_newline, &mut new_missing_newline);
            i += 1;
        }

        if let Some(prev) = hunks.last() {
            let prev_end = prev.old_start.checked_add(prev.old_count);
            if prev_end.map_or(true, |end| old_start < end) {
                return Err(format!("hunk {} overlaps or precedes the previous hunk", index));
            }
        }

        hunks.push(Hunk {
            old_start,
            old_count,
            new_start,
            new_count,
            lines: body,
            old_missing_newline,
            new_missing_newline,
        });
    }

    Ok(hunks)
}
