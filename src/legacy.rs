//! The v1 JSON encoding: `{"type": "f2t2f_folder_structure_v1", "data": <node>}`.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::patch_format::{Document, FormatKind, Operation, BINARY_PLACEHOLDER, LEGACY_TAG};
use crate::tree::{Node, NodeKind};

#[derive(Debug, Serialize, Deserialize)]
struct LegacyDocument {
    #[serde(rename = "type")]
    tag: String,
    data: LegacyNode,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LegacyNode {
    File {
        name: String,
        #[serde(default)]
        content: String,
    },
    Folder {
        name: String,
        #[serde(default)]
        children: Vec<LegacyNode>,
    },
}

impl From<&Node> for LegacyNode {
    fn from(node: &Node) -> Self {
        match &node.kind {
            NodeKind::File { content } => LegacyNode::File {
                name: node.name.clone(),
                content: content.clone(),
            },
            NodeKind::Directory { children } => LegacyNode::Folder {
                name: node.name.clone(),
                children: children.iter().map(LegacyNode::from).collect(),
            },
        }
    }
}

pub fn serialize_legacy(root: &Node) -> String {
    let doc = LegacyDocument {
        tag: LEGACY_TAG.to_string(),
        data: LegacyNode::from(root),
    };
    // Plain strings and vectors only; serialization cannot fail.
    serde_json::to_string_pretty(&doc).unwrap_or_default()
}

/// Cut the JSON object out of text that may be wrapped in a markdown fence.
fn json_slice(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn collect_operations(node: &LegacyNode, prefix: &str, ops: &mut Vec<Operation>) -> Result<(), DecodeError> {
    let LegacyNode::Folder { children, .. } = node else {
        return Ok(());
    };
    for child in children {
        let name = match child {
            LegacyNode::File { name, .. } | LegacyNode::Folder { name, .. } => name,
        };
        if !is_valid_name(name) {
            return Err(DecodeError::JsonSchemaInvalid {
                reason: format!("invalid entry name '{}'", name),
            });
        }
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };
        match child {
            LegacyNode::File { content, .. } if content == BINARY_PLACEHOLDER => {
                ops.push(Operation::Ignore { path })
            }
            LegacyNode::File { content, .. } => ops.push(Operation::WriteFile {
                path,
                content: content.clone(),
            }),
            LegacyNode::Folder { children, .. } if children.is_empty() => {
                ops.push(Operation::CreateDir { path })
            }
            LegacyNode::Folder { .. } => collect_operations(child, &path, ops)?,
        }
    }
    Ok(())
}

/// Decode a v1 JSON document. Any schema violation is fatal.
pub fn parse_legacy(text: &str) -> Result<Document, DecodeError> {
    let doc: LegacyDocument = serde_json::from_str(json_slice(text)).map_err(|e| DecodeError::JsonSchemaInvalid {
        reason: e.to_string(),
    })?;
    if doc.tag != LEGACY_TAG {
        return Err(DecodeError::JsonSchemaInvalid {
            reason: format!("unexpected type tag '{}'", doc.tag),
        });
    }
    let LegacyNode::Folder { name, .. } = &doc.data else {
        return Err(DecodeError::JsonSchemaInvalid {
            reason: "root node must be a folder".to_string(),
        });
    };

    let mut operations = Vec::new();
    collect_operations(&doc.data, "", &mut operations)?;

    Ok(Document {
        format: FormatKind::LegacyJsonV1,
        root_name: Some(name.clone()),
        tree_preview: Vec::new(),
        operations,
    })
}
