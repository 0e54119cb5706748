//! Ignore patterns and `.f2t2f` list files.
//!
//! A list file sits at the root of a walked folder:
//!
//! ```text
//! type: whitelist
//! ---
//! src/*.rs
//! # comments and blank lines are skipped
//! Cargo.toml
//! ```
//!
//! Blacklist patterns extend the ignore set. Whitelist patterns restrict the
//! walk to matching files; directories are still descended into.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

pub const LIST_FILE_NAME: &str = ".f2t2f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Whitelist,
    Blacklist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFile {
    pub kind: ListKind,
    pub patterns: Vec<String>,
}

impl ListFile {
    /// Parse list file text. Returns `None` when the header or the `---`
    /// separator is missing or the type is unknown.
    pub fn parse(text: &str) -> Option<ListFile> {
        let mut lines = text.lines();
        let header = lines.next()?.trim();
        let (key, value) = header.split_once(':')?;
        if !key.trim().eq_ignore_ascii_case("type") {
            return None;
        }
        let kind = match value.trim().to_ascii_lowercase().as_str() {
            "whitelist" => ListKind::Whitelist,
            "blacklist" => ListKind::Blacklist,
            _ => return None,
        };

        let mut lines = lines.skip_while(|l| l.trim() != "---");
        lines.next()?;

        let patterns = lines
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect();

        Some(ListFile { kind, patterns })
    }

    /// Load `<root>/.f2t2f` if present. A malformed file is ignored with a warning.
    pub fn load(root: &Path) -> Result<Option<ListFile>> {
        let path = root.join(LIST_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read list file: {}", path.display()))?;
        let parsed = ListFile::parse(&text);
        if parsed.is_none() {
            tracing::warn!(path = %path.display(), "ignoring malformed list file");
        }
        Ok(parsed)
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let normalized = pattern.replace('\\', "/");
        let glob = Glob::new(&normalized).with_context(|| format!("Invalid pattern: {}", pattern))?;
        builder.add(glob);
    }
    builder.build().context("Failed to build pattern set")
}

fn file_name(rel_path: &str) -> &str {
    rel_path.rsplit('/').next().unwrap_or(rel_path)
}

/// Decides which walked entries make it into a serialized tree.
#[derive(Debug, Clone)]
pub struct PathFilter {
    ignore: GlobSet,
    whitelist: Option<GlobSet>,
}

impl PathFilter {
    pub fn new(ignore_patterns: &[String], list: Option<&ListFile>) -> Result<Self> {
        let mut ignore = ignore_patterns.to_vec();
        let mut whitelist = None;
        match list {
            Some(ListFile {
                kind: ListKind::Blacklist,
                patterns,
            }) => ignore.extend(patterns.iter().cloned()),
            Some(ListFile {
                kind: ListKind::Whitelist,
                patterns,
            }) => whitelist = Some(build_set(patterns)?),
            None => {}
        }
        Ok(PathFilter {
            ignore: build_set(&ignore)?,
            whitelist,
        })
    }

    pub fn is_whitelist(&self) -> bool {
        self.whitelist.is_some()
    }

    /// True if the entry (and, for directories, everything beneath it) is skipped.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        if rel_path == LIST_FILE_NAME {
            return true;
        }
        self.ignore.is_match(file_name(rel_path)) || self.ignore.is_match(rel_path)
    }

    /// Whitelist check for files that survived [`PathFilter::is_ignored`].
    pub fn includes_file(&self, rel_path: &str) -> bool {
        match &self.whitelist {
            Some(set) => set.is_match(file_name(rel_path)) || set.is_match(rel_path),
            None => true,
        }
    }
}
