use thiserror::Error;

use crate::patch_format::{Document, Operation, BINARY_PLACEHOLDER};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File { content: String },
    Directory { children: Vec<Node> },
}

/// One filesystem entry. A directory exclusively owns its children, in walk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{path}' is used both as a file and as a directory")]
pub struct PathConflict {
    pub path: String,
}

impl Node {
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            kind: NodeKind::File {
                content: content.into(),
            },
        }
    }

    pub fn directory(name: impl Into<String>, children: Vec<Node>) -> Self {
        Node {
            name: name.into(),
            kind: NodeKind::Directory { children },
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    /// All descendants in pre-order with their root-relative slash paths.
    /// A directory is listed before everything beneath it.
    pub fn descendants(&self) -> Vec<(String, &Node)> {
        let mut out = Vec::new();
        collect_descendants(self, "", &mut out);
        out
    }

    /// Insert `node` at `rel_path` (slash-separated, last segment is the
    /// node's own name), creating missing parent directories. An existing
    /// file at the same path is replaced; an existing directory is kept.
    pub fn insert(&mut self, rel_path: &str, kind: NodeKind) -> Result<(), PathConflict> {
        let segments: Vec<&str> = rel_path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            return Ok(());
        };

        let mut current = self;
        for (depth, segment) in parents.iter().enumerate() {
            let conflict = || PathConflict {
                path: segments[..=depth].join("/"),
            };
            let NodeKind::Directory { children } = &mut current.kind else {
                return Err(conflict());
            };
            let idx = match children.iter().position(|c| c.name == *segment) {
                Some(idx) => idx,
                None => {
                    children.push(Node::directory(*segment, Vec::new()));
                    children.len() - 1
                }
            };
            if !children[idx].is_dir() {
                return Err(conflict());
            }
            current = &mut children[idx];
        }

        let NodeKind::Directory { children } = &mut current.kind else {
            return Err(PathConflict {
                path: parents.join("/"),
            });
        };
        match children.iter_mut().find(|c| c.name == *last) {
            Some(existing) => match (&mut existing.kind, kind) {
                (NodeKind::Directory { .. }, NodeKind::Directory { .. }) => Ok(()),
                (NodeKind::File { content }, NodeKind::File { content: new }) => {
                    *content = new;
                    Ok(())
                }
                _ => Err(PathConflict {
                    path: rel_path.to_string(),
                }),
            },
            None => {
                children.push(Node {
                    name: (*last).to_string(),
                    kind,
                });
                Ok(())
            }
        }
    }

    /// Drop directories that end up with no files anywhere beneath them.
    pub fn prune_empty_dirs(&mut self) {
        if let NodeKind::Directory { children } = &mut self.kind {
            for child in children.iter_mut() {
                child.prune_empty_dirs();
            }
            children.retain(|c| !c.is_dir() || !c.children().is_empty());
        }
    }

    /// Rebuild a tree from the whole-file operations of a decoded document.
    /// Patch operations have no tree form and are left out.
    pub fn from_document(document: &Document) -> Result<Node, PathConflict> {
        let mut root = Node::directory(document.root_name.clone().unwrap_or_default(), Vec::new());
        for op in &document.operations {
            match op {
                Operation::WriteFile { path, content } => root.insert(
                    path,
                    NodeKind::File {
                        content: content.clone(),
                    },
                )?,
                Operation::Ignore { path } => root.insert(
                    path,
                    NodeKind::File {
                        content: BINARY_PLACEHOLDER.to_string(),
                    },
                )?,
                Operation::CreateDir { path } => root.insert(
                    path,
                    NodeKind::Directory {
                        children: Vec::new(),
                    },
                )?,
                Operation::ReplaceLines { path, .. } | Operation::ApplyUnifiedDiff { path, .. } => {
                    tracing::debug!(path = %path, "patch operation has no tree form");
                }
            }
        }
        Ok(root)
    }
}

fn collect_descendants<'a>(node: &'a Node, prefix: &str, out: &mut Vec<(String, &'a Node)>) {
    for child in node.children() {
        let path = if prefix.is_empty() {
            child.name.clone()
        } else {
            format!("{}/{}", prefix, child.name)
        };
        out.push((path.clone(), child));
        collect_descendants(child, &path, out);
    }
}
