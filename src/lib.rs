//! # f2t2f
//!
//! Folder to text to folder. A directory tree is rendered as one portable
//! text document and rebuilt from it. Documents may also carry partial
//! edits, which are applied against an existing tree:
//!
//! ```text
//! type: f2t2f_folder_structure_v2
//! ---
//! tree:
//! proj/
//! └── src/
//!     └── lib.rs
//! ---
//! >>> file: src/lib.rs
//! pub fn answer() -> u32 { 42 }
//! <<<
//! ---
//! >>> patch: src/lib.rs
//! action: replace_lines
//! lines: 1-1
//! ---
//! pub fn answer() -> u32 { 41 + 1 }
//! <<<
//! ---
//! >>> diff: src/lib.rs
//! --- a/src/lib.rs
//! +++ b/src/lib.rs
//! @@ -1,1 +1,1 @@
//! -pub fn answer() -> u32 { 41 + 1 }
//! +pub fn answer() -> u32 { 40 + 2 }
//! <<<
//! ```
//!
//! The older JSON encoding (`f2t2f_folder_structure_v1`) is still read and
//! written. Blocks are found anywhere in the input, so a chat response with
//! commentary around them decodes fine.

pub mod apply;
pub mod config;
pub mod detect;
pub mod encode;
pub mod error;
pub mod filter;
pub mod hunk_apply;
pub mod legacy;
pub mod parse;
pub mod patch_format;
pub mod serialize;
pub mod tree;
pub mod unified_diff;
pub mod util;

use std::path::Path;

pub use error::{ApplyError, DecodeError, MalformedBlock};
pub use patch_format::{
    ApplyReport, Decoded, DiffLine, DiffLineKind, Document, FormatKind, Hunk, Operation, Outcome,
};
pub use serialize::OutputFormat;
pub use tree::{Node, NodeKind};

/// Render a tree in the structural (v2) format.
pub fn encode(root: &Node) -> String {
    serialize::serialize_structural(root)
}

/// Render a tree in the chosen format.
pub fn encode_as(root: &Node, format: OutputFormat) -> String {
    serialize::serialize(root, format)
}

/// Detect the format of `text` and extract its operations.
pub fn decode(text: &str) -> Result<Decoded, DecodeError> {
    let format = detect::detect(text);
    tracing::debug!(?format, "detected document format");
    parse::parse(text, format)
}

/// Apply a decoded document under `root`.
pub fn apply(document: &Document, root: &Path) -> ApplyReport {
    apply::apply_document(document, root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        Node::directory(
            "proj",
            vec![
                Node::file("README.md", "# Title\n\n```\n>>> file: fake\n<<<\n```\n"),
                Node::directory(
                    "src",
                    vec![
                        Node::file("main.rs", "fn main() {\n    println!(\"hi\");\n}\n"),
                        Node::directory("nested", vec![Node::file("data.csv", "a,b\r\n1,2")]),
                    ],
                ),
                Node::directory("empty", vec![]),
                Node::file("blank.txt", ""),
                Node::file("newlines.txt", "\n\n"),
                Node::file("tricky.txt", "---\ntype: f2t2f_folder_structure_v2\ntree:\n<<<< \\ No newline at end of file\n"),
                Node::file("logo.png", patch_format::BINARY_PLACEHOLDER),
            ],
        )
    }

    #[test]
    fn test_structural_round_trip() {
        let tree = sample();
        let decoded = decode(&encode(&tree)).unwrap();
        assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
        assert_eq!(decoded.document.format, FormatKind::StructuralV2);
        assert_eq!(Node::from_document(&decoded.document).unwrap(), tree);
    }

    #[test]
    fn test_legacy_round_trip() {
        let tree = sample();
        let decoded = decode(&encode_as(&tree, OutputFormat::LegacyJson)).unwrap();
        assert_eq!(decoded.document.format, FormatKind::LegacyJsonV1);
        assert_eq!(Node::from_document(&decoded.document).unwrap(), tree);
    }

    #[test]
    fn test_tree_preview_is_informational() {
        let decoded = decode(&encode(&sample())).unwrap();
        assert_eq!(decoded.document.root_name.as_deref(), Some("proj"));
        assert!(decoded.document.tree_preview.contains(&"src/nested/data.csv".to_string()));
        assert!(decoded.document.tree_preview.contains(&"empty/".to_string()));
    }

    #[test]
    fn test_decode_unrecognized() {
        assert!(matches!(decode("nothing to see"), Err(DecodeError::FormatUnrecognized)));
    }

    #[test]
    fn test_decode_and_apply_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let decoded = decode(&encode(&sample())).unwrap();
        let report = apply(&decoded.document, dir.path());
        assert!(report.is_clean());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/nested/data.csv")).unwrap(),
            "a,b\r\n1,2"
        );
        assert!(dir.path().join("empty").is_dir());
        assert!(!dir.path().join("logo.png").exists());
        assert_eq!(report.count(Outcome::Skipped), 1);
    }

    #[test]
    fn test_round_trip_awkward_names() {
        let tree = Node::directory(
            "p",
            vec![
                Node::directory(" spaced dir ", vec![Node::file("`tick`", "t\n")]),
                Node::directory("'quoted'", vec![]),
                Node::file("'notes'", "n\n"),
                Node::file("\"dq\"", "d"),
                Node::file("it's", "i\n"),
                Node::file("trail ", "x\n"),
            ],
        );
        for format in [OutputFormat::Structural, OutputFormat::LegacyJson] {
            let decoded = decode(&encode_as(&tree, format)).unwrap();
            assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
            assert_eq!(Node::from_document(&decoded.document).unwrap(), tree, "{format:?}");
        }
    }

    #[test]
    fn test_diff_changes_final_newline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();

        let strip = ">>> diff: a.txt\n@@ -1,2 +1,2 @@\n one\n-two\n+two\n\\ No newline at end of file\n<<<\n";
        let report = apply(&decode(strip).unwrap().document, dir.path());
        assert!(report.is_clean());
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "one\ntwo");

        let restore = ">>> diff: a.txt\n@@ -2 +2 @@\n-two\n\\ No newline at end of file\n+2\n<<<\n";
        let report = apply(&decode(restore).unwrap().document, dir.path());
        assert!(report.is_clean());
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "one\n2\n");
    }
}
