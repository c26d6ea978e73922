//! Vault scanning and link indexing.
//!
//! Walks the source folder once, producing the ordered list of exportable
//! [`SourceDocument`]s and a [`VaultIndex`] that answers reference lookups for
//! the link resolver, the media pipeline and the graph.
//!
//! ## Directory Structure
//!
//! ```text
//! vault/                       # Source root
//! ├── export.toml              # Export configuration (optional, not exported)
//! ├── .obsidian/               # Hidden folders are skipped
//! ├── Home.md                  # Document
//! ├── Board.canvas             # Canvas document
//! ├── attachments/
//! │   └── cat.png              # Media, exported only when referenced
//! └── notes/
//!     └── Daily Log.md
//! ```
//!
//! ## Reference Resolution
//!
//! A reference such as `Daily Log`, `notes/Daily Log.md` or `../cat.png` is
//! resolved in this order, first match wins:
//!
//! 1. relative to the referring document's folder (with and without `.md`);
//! 2. relative to the vault root (with and without `.md`);
//! 3. any file whose name (or name without `.md`) matches, in path order.

use crate::config::CONFIG_FILE_NAME;
use crate::index::LinkIndex;
use crate::markdown;
use crate::naming::{self, unix_address};
use crate::unit::SourceDocument;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Source folder not found: {0}")]
    NotADirectory(PathBuf),
}

/// Result of scanning a vault.
#[derive(Debug)]
pub struct Vault {
    pub root: PathBuf,
    /// Exportable documents, sorted by path.
    pub documents: Vec<SourceDocument>,
    pub index: VaultIndex,
}

/// A reference that did not resolve to any file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenReference {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Default, Clone)]
pub struct VaultIndex {
    /// Every file in the vault, vault-relative, sorted.
    files: Vec<String>,
    file_set: BTreeSet<String>,
    links: Vec<(String, String)>,
    broken: Vec<BrokenReference>,
}

impl VaultIndex {
    pub fn new(files: Vec<String>) -> Self {
        let mut files = files;
        files.sort();
        files.dedup();
        let file_set = files.iter().cloned().collect();
        Self {
            files,
            file_set,
            links: Vec::new(),
            broken: Vec::new(),
        }
    }

    /// Resolve every reference of every document and record the links.
    pub fn index_references(&mut self, references: &[(String, Vec<String>)]) {
        for (source, targets) in references {
            for target in targets {
                let clean = target.split('#').next().unwrap_or_default();
                if clean.is_empty() {
                    continue;
                }
                match self.resolve_reference(clean, source) {
                    Some(resolved) => self.links.push((source.clone(), resolved)),
                    None => self.broken.push(BrokenReference {
                        source: source.clone(),
                        target: target.clone(),
                    }),
                }
            }
        }
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn contains(&self, path: &str) -> bool {
        self.file_set.contains(path)
    }

    pub fn broken_references(&self) -> &[BrokenReference] {
        &self.broken
    }

    fn lookup(&self, candidate: &str) -> Option<String> {
        let normalized = unix_address(candidate);
        let path = normalized.as_str();
        if path.starts_with("..") {
            return None;
        }
        if self.file_set.contains(path) {
            return Some(path.to_string());
        }
        let with_md = format!("{path}.md");
        self.file_set.contains(&with_md).then_some(with_md)
    }
}

impl LinkIndex for VaultIndex {
    fn resolve_reference(&self, raw_target: &str, from_path: &str) -> Option<String> {
        let target = raw_target.trim().trim_start_matches("./");
        if target.is_empty() || !markdown::is_internal_reference(target) {
            return None;
        }

        let from_dir = unix_address(from_path).directory();
        if let Some(found) = self.lookup(from_dir.join_str(target).as_str()) {
            return Some(found);
        }
        if let Some(found) = self.lookup(target.trim_start_matches('/')) {
            return Some(found);
        }

        let wanted = unix_address(target);
        let wanted_name = wanted.full_name();
        self.files
            .iter()
            .find(|file| {
                let candidate = unix_address(file);
                candidate.full_name() == wanted_name
                    || (candidate.extension_name() == "md"
                        && wanted.is_directory()
                        && candidate.base_name() == wanted_name)
            })
            .cloned()
    }

    fn all_internal_links(&self) -> Vec<(String, String)> {
        self.links.clone()
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// True for the output folder when it lives inside the vault.
fn is_excluded(entry: &walkdir::DirEntry, excluded: Option<&Path>) -> bool {
    let Some(excluded) = excluded else {
        return false;
    };
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .path()
            .canonicalize()
            .is_ok_and(|path| path == excluded)
}

fn modified_ms(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Scan `root`, optionally excluding everything under `exclude` (the output folder).
pub fn scan_vault(root: &Path, exclude: Option<&Path>) -> Result<Vault, VaultError> {
    if !root.is_dir() {
        return Err(VaultError::NotADirectory(root.to_path_buf()));
    }

    let excluded = exclude.and_then(|ex| ex.canonicalize().ok());
    let mut files = Vec::new();
    let mut documents = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e) && !is_excluded(e, excluded.as_deref()));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let relative = relative.to_string_lossy().replace('\\', "/");
        if relative == CONFIG_FILE_NAME {
            continue;
        }
        let metadata = entry.metadata()?;
        let document = SourceDocument::new(&relative, metadata.len(), modified_ms(&metadata));
        if naming::is_convertible(&document.path) {
            documents.push(document);
        }
        files.push(relative);
    }
    documents.sort_by(|a, b| a.key().cmp(b.key()));

    let mut references = Vec::new();
    for document in &documents {
        let text = std::fs::read_to_string(root.join(document.key()))?;
        let targets = if document.path.extension_name().eq_ignore_ascii_case("canvas") {
            markdown::extract_canvas_links(&text)
        } else {
            markdown::extract_links(&text)
        };
        references.push((document.key().to_string(), targets));
    }

    let mut index = VaultIndex::new(files);
    index.index_references(&references);
    tracing::info!(
        documents = documents.len(),
        files = index.files().len(),
        links = index.links.len(),
        broken = index.broken.len(),
        "scanned vault"
    );

    Ok(Vault {
        root: root.to_path_buf(),
        documents,
        index,
    })
}
