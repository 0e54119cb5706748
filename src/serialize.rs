use std::collections::BTreeSet;

use crate::legacy;
use crate::parse::{marker_run, quote_path};
use crate::patch_format::{MIN_FENCE, NO_NEWLINE_MARKER, SECTION_SEPARATOR, STRUCTURAL_TAG};
use crate::tree::{Node, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Structural,
    LegacyJson,
}

pub fn serialize(root: &Node, format: OutputFormat) -> String {
    match format {
        OutputFormat::Structural => serialize_structural(root),
        OutputFormat::LegacyJson => legacy::serialize_legacy(root),
    }
}

/// Smallest fence length that no content line could be mistaken for.
fn fence_len(content: &str) -> usize {
    let taken: BTreeSet<usize> = content.split('\n').filter_map(marker_run).collect();
    (MIN_FENCE..).find(|n| !taken.contains(n)).unwrap_or(MIN_FENCE)
}

fn push_line(out: &mut String, parts: &[&str]) {
    for part in parts {
        out.push_str(part);
    }
    out.push('\n');
}

fn render_tree(node: &Node, prefix: &str, out: &mut String) {
    let children = node.children();
    let mut dirs: Vec<&Node> = children.iter().filter(|c| c.is_dir()).collect();
    let mut files: Vec<&Node> = children.iter().filter(|c| !c.is_dir()).collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));
    dirs.append(&mut files);

    let total = dirs.len();
    for (i, child) in dirs.into_iter().enumerate() {
        let is_last = i == total - 1;
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = if is_last { "    " } else { "│   " };
        if child.is_dir() {
            push_line(out, &[prefix, connector, child.name.as_str(), "/"]);
            render_tree(child, &format!("{}{}", prefix, child_prefix), out);
        } else {
            push_line(out, &[prefix, connector, child.name.as_str()]);
        }
    }
}

fn write_file_block(path: &str, content: &str, out: &mut String) {
    let fence = fence_len(content);
    push_line(out, &[">".repeat(fence).as_str(), " file: ", &*quote_path(path)]);
    out.push_str(content);
    let closer = "<".repeat(fence);
    if content.is_empty() || content.ends_with('\n') {
        push_line(out, &[closer.as_str()]);
    } else {
        push_line(out, &["\n", closer.as_str(), " ", NO_NEWLINE_MARKER]);
    }
}

/// Render the structural (v2) document: header, tree preview, then one
/// block per file (and per empty directory) in pre-order.
pub fn serialize_structural(root: &Node) -> String {
    let mut out = String::new();
    push_line(&mut out, &["type: ", STRUCTURAL_TAG]);
    push_line(&mut out, &[SECTION_SEPARATOR]);
    push_line(&mut out, &["tree:"]);
    push_line(&mut out, &[root.name.as_str(), "/"]);
    render_tree(root, "", &mut out);

    for (path, node) in root.descendants() {
        match &node.kind {
            NodeKind::File { content } => {
                push_line(&mut out, &[SECTION_SEPARATOR]);
                write_file_block(&path, content, &mut out);
            }
            NodeKind::Directory { children } if children.is_empty() => {
                push_line(&mut out, &[SECTION_SEPARATOR]);
                push_line(&mut out, &[">>> dir: ", &*quote_path(&path)]);
                push_line(&mut out, &["<<<"]);
            }
            NodeKind::Directory { .. } => {}
        }
    }

    out
}
