use anyhow::{Context, Result};
use memmap2::Mmap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ApplyError;
use crate::filter::PathFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub relative_path: String,
    pub kind: EntryKind,
    pub full_path: PathBuf,
    /// File size in bytes (0 for directories). Free from the OS directory scan.
    pub size: u64,
}

fn relative_slash_path(root: &Path, full: &Path) -> Option<String> {
    let relative = full.strip_prefix(root).ok()?;
    Some(relative.to_str()?.replace('\\', "/"))
}

/// Walk a directory tree and collect the entries that pass `filter`.
/// Entries are sorted by file name within each directory, so the order is
/// the same on every platform. Paths use forward slashes.
pub fn walk_directory(root: &Path, filter: &PathFilter) -> Result<Vec<DirEntry>> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize path: {}", root.display()))?;

    let mut entries = Vec::new();

    let walker = WalkDir::new(&root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match relative_slash_path(&root, entry.path()) {
            Some(rel) => !filter.is_ignored(&rel),
            None => true,
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to read directory entry in {}", root.display()))?;

        let full_path = entry.path().to_path_buf();
        let relative_str = relative_slash_path(&root, &full_path)
            .with_context(|| format!("Non-UTF8 or foreign path: {}", full_path.display()))?;

        let kind = if entry.file_type().is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };

        if kind == EntryKind::File && !filter.includes_file(&relative_str) {
            continue;
        }

        let meta = entry
            .metadata()
            .with_context(|| format!("Failed to read metadata: {}", full_path.display()))?;
        let size = if kind == EntryKind::File { meta.len() } else { 0 };

        entries.push(DirEntry {
            relative_path: relative_str,
            kind,
            full_path,
            size,
        });
    }

    Ok(entries)
}

/// Memory-map a file for read-only access.
///
/// # Safety
/// The mapping is read-only. Callers must not concurrently truncate or replace
/// the underlying file while the `Mmap` is live.
pub fn mmap_file(path: &Path) -> Result<Mmap> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    // SAFETY: We only read from this mapping; no concurrent modification of these files.
    unsafe {
        Mmap::map(&file)
            .with_context(|| format!("Failed to memory-map file: {}", path.display()))
    }
}

/// Join a document path onto `root`, refusing anything that could land
/// outside it: absolute paths, drive prefixes, `..` segments, and symlinked
/// ancestors that resolve elsewhere.
pub fn resolve_within(root: &Path, rel_path: &str) -> Result<PathBuf, ApplyError> {
    let rel = Path::new(rel_path);
    if rel_path.trim().is_empty() || rel_path.starts_with('/') || rel_path.starts_with('\\') {
        return Err(ApplyError::UnsafePath);
    }
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ApplyError::UnsafePath)
            }
        }
    }
    if rel_path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(ApplyError::UnsafePath);
    }

    let full = root.join(rel);

    // The deepest ancestor that already exists must still be inside the root.
    let canonical_root = root.canonicalize()?;
    let mut probe = full.as_path();
    loop {
        if probe.exists() {
            let resolved = probe.canonicalize()?;
            if !resolved.starts_with(&canonical_root) {
                return Err(ApplyError::UnsafePath);
            }
            break;
        }
        match probe.parent() {
            Some(parent) => probe = parent,
            None => break,
        }
    }

    Ok(full)
}
