//! Export manifest for incremental builds.
//!
//! Records, for every exported source, what the last run saw and produced:
//! the source's modification time and size, the page it was written to, and
//! every other file the page owns (outlined media). The manifest lives at
//! `lib/metadata.json` under the export root.
//!
//! # Skip rule
//!
//! A source is left alone when its modification time is not newer than the
//! recorded one **and** its size is unchanged **and** its page still exists
//! **and** what it shows from other pages (its backlinks) is the same.
//! A skipped source keeps its recorded outputs alive, so the stale-file pass
//! does not delete them.
//!
//! Entries only hold while the export root and the output key match. The
//! output key fingerprints every setting that shapes page bytes (path rules,
//! inline policies, head assets, graph and sidebar options), so switching
//! any of them re-renders the whole site once.
//!
//! # Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "export_root": "notes",
//!   "output_key": "9f86d081884c7d65...",
//!   "sources": {
//!     "notes/Home.md": {
//!       "modified_ms": 1700000000000,
//!       "size": 1234,
//!       "output_path": "Home.html",
//!       "artifacts": ["attachments/cat.png"],
//!       "context_key": ""
//!     }
//!   }
//! }
//! ```
//!
//! A missing, unreadable or different-version manifest loads as empty, which
//! simply makes the next run a full build.

use crate::fs::FileSystem;
use crate::unit::{ExportUnit, SourceDocument, UnitStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Export-root-relative location of the manifest.
pub const MANIFEST_PATH: &str = "lib/metadata.json";

/// Bump when the format changes to invalidate old manifests.
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What the previous run recorded for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub modified_ms: u64,
    pub size: u64,
    pub output_path: String,
    /// Other files owned by the page, export-root-relative.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Fingerprint of the page's backlinks when it was rendered.
    #[serde(default)]
    pub context_key: String,
}

impl SourceEntry {
    /// Page path followed by owned artifacts.
    pub fn outputs(&self) -> Vec<String> {
        let mut outputs = vec![self.output_path.clone()];
        outputs.extend(self.artifacts.iter().cloned());
        outputs
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub version: u32,
    /// Export root the outputs were computed with. A change invalidates every entry.
    #[serde(default)]
    pub export_root: String,
    /// Fingerprint of the page-shaping settings. A change invalidates every entry.
    #[serde(default)]
    pub output_key: String,
    pub sources: BTreeMap<String, SourceEntry>,
}

impl ExportManifest {
    /// Create an empty manifest (used for `--no-incremental` or first build).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            export_root: String::new(),
            output_key: String::new(),
            sources: BTreeMap::new(),
        }
    }

    pub fn path(output_dir: &Path) -> PathBuf {
        output_dir.join(MANIFEST_PATH)
    }

    /// Load from the output directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(output_dir: &Path, fs: &dyn FileSystem) -> Self {
        let bytes = match fs.read(&Self::path(output_dir)) {
            Ok(b) => b,
            Err(_) => return Self::empty(),
        };
        let manifest: Self = match serde_json::from_slice(&bytes) {
            Ok(m) => m,
            Err(e) => {
                tracing::info!("ignoring unreadable export manifest: {e}");
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            tracing::info!(
                found = manifest.version,
                expected = MANIFEST_VERSION,
                "ignoring export manifest from another version"
            );
            return Self::empty();
        }
        manifest
    }

    /// Save to the output directory.
    pub fn save(&self, output_dir: &Path, fs: &dyn FileSystem) -> Result<(), ManifestError> {
        let json = serde_json::to_string_pretty(self)?;
        let path = Self::path(output_dir);
        if let Some(dir) = path.parent() {
            fs.create_dir_all(dir)?;
        }
        fs.write(&path, json.as_bytes())?;
        Ok(())
    }

    /// Forget everything when the outputs were computed under another export root.
    pub fn reset_if_root_changed(&mut self, export_root: &str) {
        if self.export_root != export_root {
            if !self.sources.is_empty() {
                tracing::info!(
                    old = %self.export_root,
                    new = export_root,
                    "export root changed, rebuilding everything"
                );
            }
            self.sources.clear();
            self.export_root = export_root.to_string();
        }
    }

    /// Forget everything when the outputs were produced with other settings.
    pub fn reset_if_key_changed(&mut self, output_key: &str) {
        if self.output_key != output_key {
            if !self.sources.is_empty() {
                tracing::info!("export settings changed, rebuilding everything");
            }
            self.sources.clear();
            self.output_key = output_key.to_string();
        }
    }

    /// The recorded entry if `source` is unchanged and its page is still on disk.
    pub fn unchanged_entry(
        &self,
        source: &SourceDocument,
        expected_output: &str,
        output_dir: &Path,
        fs: &dyn FileSystem,
    ) -> Option<&SourceEntry> {
        let entry = self.sources.get(source.key())?;
        let unchanged = source.modified_ms <= entry.modified_ms
            && source.size == entry.size
            && entry.output_path == expected_output
            && fs.exists(&output_dir.join(&entry.output_path));
        unchanged.then_some(entry)
    }

    /// Record the outputs of a unit that was rendered or kept this run.
    pub fn record(&mut self, unit: &ExportUnit) {
        let source = unit.source();
        let artifacts = match unit.status() {
            UnitStatus::Unchanged => unit
                .previous_outputs()
                .iter()
                .skip(1)
                .cloned()
                .collect(),
            _ => unit.owned_paths().into_iter().skip(1).collect(),
        };
        self.sources.insert(
            source.key().to_string(),
            SourceEntry {
                modified_ms: source.modified_ms,
                size: source.size,
                output_path: unit.output_path(),
                artifacts,
                context_key: unit.context_key().to_string(),
            },
        );
    }

    /// Drop entries for sources that are no longer exported.
    pub fn retain_sources<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        let keep: std::collections::BTreeSet<&str> = keys.into_iter().collect();
        self.sources.retain(|key, _| keep.contains(key.as_str()));
    }
}

/// Counts for one incremental build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalStats {
    pub rendered: u32,
    pub skipped: u32,
}

impl IncrementalStats {
    pub fn render(&mut self) {
        self.rendered += 1;
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn total(&self) -> u32 {
        self.rendered + self.skipped
    }
}

impl fmt::Display for IncrementalStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped > 0 {
            write!(
                f,
                "{} rendered, {} unchanged ({} total)",
                self.rendered,
                self.skipped,
                self.total()
            )
        } else {
            write!(f, "{} rendered", self.rendered)
        }
    }
}
