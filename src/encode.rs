use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::Path;

use crate::filter::PathFilter;
use crate::patch_format::BINARY_PLACEHOLDER;
use crate::tree::{Node, NodeKind};
use crate::util::{self, DirEntry, EntryKind};

/// Read one file as text. Empty files are not mapped (zero-length maps
/// fail on some platforms); non-UTF-8 files become the binary placeholder.
fn read_text(entry: &DirEntry) -> Result<String> {
    if entry.size == 0 {
        return Ok(String::new());
    }
    let data = util::mmap_file(&entry.full_path)?;
    match std::str::from_utf8(&data) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            tracing::debug!(path = %entry.relative_path, "binary file, storing placeholder");
            Ok(BINARY_PLACEHOLDER.to_string())
        }
    }
}

/// Build the tree for the directory at `root`.
/// The walk runs on the blocking pool; file contents are read in parallel
/// with Rayon and reassembled in walk order.
pub async fn read_tree(root: &Path, filter: PathFilter) -> Result<Node> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize path: {}", root.display()))?;
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    let whitelist = filter.is_whitelist();

    let walk_root = root.clone();
    let entries = tokio::task::spawn_blocking(move || util::walk_directory(&walk_root, &filter)).await??;

    let contents = tokio::task::spawn_blocking(move || -> Result<Vec<(DirEntry, Option<String>)>> {
        entries
            .into_par_iter()
            .map(|entry| -> Result<(DirEntry, Option<String>)> {
                let content = match entry.kind {
                    EntryKind::File => Some(read_text(&entry)?),
                    EntryKind::Dir => None,
                };
                Ok((entry, content))
            })
            .collect()
    })
    .await??;

    let mut tree = Node::directory(root_name, Vec::new());
    for (entry, content) in contents {
        let kind = match content {
            Some(content) => NodeKind::File { content },
            None => NodeKind::Directory {
                children: Vec::new(),
            },
        };
        tree.insert(&entry.relative_path, kind)?;
    }

    if whitelist {
        tree.prune_empty_dirs();
    }

    tracing::debug!(root = %root.display(), entries = tree.descendants().len(), "read directory tree");
    Ok(tree)
}
