use crate::parse::parse_opener;
use crate::patch_format::{FormatKind, LEGACY_TAG, STRUCTURAL_TAG};

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

fn is_structural_header(line: &str) -> bool {
    match line.trim().split_once(':') {
        Some((key, value)) => key.trim() == "type" && value.trim() == STRUCTURAL_TAG,
        None => false,
    }
}

/// Classify a document without being told its format.
///
/// The first non-blank line (markdown fences skipped) decides: the v2
/// `type:` header, or a `{` opening a JSON object that carries the v1 tag.
/// Failing that, a v2 header or block opener anywhere in the text still
/// counts as structural, since documents often arrive wrapped in prose.
pub fn detect(text: &str) -> FormatKind {
    let first = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !is_fence(l));

    match first {
        Some(line) if is_structural_header(line) => return FormatKind::StructuralV2,
        Some(line) if line.starts_with('{') && text.contains(&format!("\"{}\"", LEGACY_TAG)) => {
            return FormatKind::LegacyJsonV1
        }
        _ => {}
    }

    if text
        .lines()
        .any(|l| is_structural_header(l) || parse_opener(l).is_some())
    {
        return FormatKind::StructuralV2;
    }

    FormatKind::Unknown
}
