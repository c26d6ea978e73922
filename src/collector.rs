//! Stale-file collection.
//!
//! After every artifact of a build has been written, anything left under the
//! export root that no current unit or artifact accounts for is a leftover
//! from an earlier export (a renamed note, a deleted attachment) and is
//! removed. Directories that held a removed file are then pruned if that
//! left them empty. Empty directories the pass did not touch are left alone.
//!
//! Paths are compared by [`normalized_key`], so `Notes/My Page.html` and
//! `notes/my-page.html` count as the same file whether or not web-style
//! paths were on when either was written.
//!
//! The shared media folder is never swept: files there may be referenced by
//! units that were skipped this run.

use crate::address::normalized_key;
use crate::assets::MEDIA_DIR;
use crate::fs::FileSystem;
use crate::log::ExportLog;
use crate::manifest::MANIFEST_PATH;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a collection pass removed, export-root-relative.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectorReport {
    pub deleted_files: Vec<String>,
    pub removed_dirs: Vec<String>,
}

pub struct StaleFileCollector<'a> {
    root: &'a Path,
    fs: &'a dyn FileSystem,
    keep: HashSet<String>,
}

impl<'a> StaleFileCollector<'a> {
    pub fn new(root: &'a Path, fs: &'a dyn FileSystem) -> Self {
        let mut keep = HashSet::new();
        keep.insert(normalized_key(MANIFEST_PATH));
        Self { root, fs, keep }
    }

    /// Mark an export-root-relative path as current.
    pub fn keep(&mut self, relative: &str) {
        self.keep.insert(normalized_key(relative));
    }

    pub fn keep_all<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            self.keep(path.as_ref());
        }
    }

    pub fn is_current(&self, relative: &str) -> bool {
        self.keep.contains(&normalized_key(relative))
    }

    /// Delete stale files, then the directories they emptied, innermost first.
    ///
    /// A file that cannot be removed is logged and skipped.
    pub fn collect(&self, log: &mut ExportLog) -> Result<CollectorReport, CollectorError> {
        let mut report = CollectorReport::default();

        for relative in self.fs.list_files(self.root)? {
            let relative = unix_string(&relative);
            if in_media_dir(&relative) || self.is_current(&relative) {
                continue;
            }
            match self.fs.remove_file(&self.root.join(&relative)) {
                Ok(()) => {
                    tracing::debug!(path = %relative, "deleted stale file");
                    report.deleted_files.push(relative);
                }
                Err(e) => log.warning("Could not delete old file", format!("{relative}: {e}")),
            }
        }

        let touched = touched_dirs(&report.deleted_files);
        if touched.is_empty() {
            return Ok(report);
        }
        for relative in self.fs.list_dirs(self.root)? {
            if !touched.contains(&relative) {
                continue;
            }
            let relative_str = unix_string(&relative);
            if relative_str == MEDIA_DIR || in_media_dir(&relative_str) {
                continue;
            }
            let dir = self.root.join(&relative);
            if !self.fs.list_files(&dir)?.is_empty() {
                continue;
            }
            match self.fs.remove_dir(&dir) {
                Ok(()) => report.removed_dirs.push(relative_str),
                Err(e) => tracing::debug!(path = %relative_str, "kept directory: {e}"),
            }
        }

        if !report.deleted_files.is_empty() {
            tracing::info!(
                files = report.deleted_files.len(),
                dirs = report.removed_dirs.len(),
                "removed stale outputs"
            );
        }
        Ok(report)
    }
}

/// Every folder above a deleted file, up to (not including) the root.
fn touched_dirs(deleted: &[String]) -> HashSet<PathBuf> {
    let mut dirs = HashSet::new();
    for file in deleted {
        let mut current = Path::new(file).parent();
        while let Some(dir) = current.filter(|d| !d.as_os_str().is_empty()) {
            if !dirs.insert(dir.to_path_buf()) {
                break;
            }
            current = dir.parent();
        }
    }
    dirs
}

fn unix_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn in_media_dir(relative: &str) -> bool {
    relative
        .strip_prefix(MEDIA_DIR)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::tests::{FsOp, RecordingFs};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(tmp: &TempDir, relative: &str) {
        let path = tmp.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    // =========================================================================
    // Files
    // =========================================================================

    #[test]
    fn stale_files_are_deleted() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "A.html");
        touch(&tmp, "Old.html");
        let fs_ = RecordingFs::new();
        let mut collector = StaleFileCollector::new(tmp.path(), &fs_);
        collector.keep("A.html");

        let report = collector.collect(&mut ExportLog::new()).unwrap();
        assert_eq!(report.deleted_files, vec!["Old.html".to_string()]);
        assert!(tmp.path().join("A.html").exists());
        assert!(!tmp.path().join("Old.html").exists());
    }

    #[test]
    fn comparison_ignores_case_and_spaces() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "Notes/My Page.html");
        let fs_ = RecordingFs::new();
        let mut collector = StaleFileCollector::new(tmp.path(), &fs_);
        collector.keep("notes/my-page.html");

        let report = collector.collect(&mut ExportLog::new()).unwrap();
        assert!(report.deleted_files.is_empty());
    }

    #[test]
    fn manifest_and_media_are_kept() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, MANIFEST_PATH);
        touch(&tmp, "lib/media/cat.png");
        touch(&tmp, "lib/styles/old-theme.css");
        let fs_ = RecordingFs::new();
        let collector = StaleFileCollector::new(tmp.path(), &fs_);

        let report = collector.collect(&mut ExportLog::new()).unwrap();
        assert_eq!(report.deleted_files, vec!["lib/styles/old-theme.css".to_string()]);
        assert!(tmp.path().join("lib/media/cat.png").exists());
        assert!(tmp.path().join(MANIFEST_PATH).exists());
    }

    #[test]
    fn nothing_stale_means_no_deletes() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "A.html");
        touch(&tmp, "sub/B.html");
        let fs_ = RecordingFs::new();
        let mut collector = StaleFileCollector::new(tmp.path(), &fs_);
        collector.keep_all(["A.html", "sub/B.html"]);

        collector.collect(&mut ExportLog::new()).unwrap();
        assert!(fs_.get_operations().is_empty());
    }

    // =========================================================================
    // Directories
    // =========================================================================

    #[test]
    fn empty_directories_removed_innermost_first() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "old/deeper/Gone.html");
        touch(&tmp, "A.html");
        let fs_ = RecordingFs::new();
        let mut collector = StaleFileCollector::new(tmp.path(), &fs_);
        collector.keep("A.html");

        let report = collector.collect(&mut ExportLog::new()).unwrap();
        assert_eq!(
            report.removed_dirs,
            vec!["old/deeper".to_string(), "old".to_string()]
        );
        let ops = fs_.get_operations();
        assert_eq!(
            ops,
            vec![
                FsOp::RemoveFile(tmp.path().join("old/deeper/Gone.html")),
                FsOp::RemoveDir(tmp.path().join("old/deeper")),
                FsOp::RemoveDir(tmp.path().join("old")),
            ]
        );
    }

    #[test]
    fn untouched_empty_directories_survive() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("downloads/empty")).unwrap();
        fs::create_dir_all(tmp.path().join("drafts")).unwrap();
        touch(&tmp, "old/Gone.html");
        touch(&tmp, "A.html");
        let fs_ = RecordingFs::new();
        let mut collector = StaleFileCollector::new(tmp.path(), &fs_);
        collector.keep("A.html");

        let report = collector.collect(&mut ExportLog::new()).unwrap();
        assert_eq!(report.removed_dirs, vec!["old".to_string()]);
        assert!(tmp.path().join("downloads/empty").is_dir());
        assert!(tmp.path().join("drafts").is_dir());
    }

    #[test]
    fn nothing_deleted_removes_no_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("empty")).unwrap();
        touch(&tmp, "A.html");
        let fs_ = RecordingFs::new();
        let mut collector = StaleFileCollector::new(tmp.path(), &fs_);
        collector.keep("A.html");

        let report = collector.collect(&mut ExportLog::new()).unwrap();
        assert!(report.removed_dirs.is_empty());
        assert!(tmp.path().join("empty").is_dir());
    }

    #[test]
    fn directories_with_current_files_stay() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "notes/A.html");
        touch(&tmp, "notes/Old.html");
        let fs_ = RecordingFs::new();
        let mut collector = StaleFileCollector::new(tmp.path(), &fs_);
        collector.keep("notes/A.html");

        let report = collector.collect(&mut ExportLog::new()).unwrap();
        assert!(report.removed_dirs.is_empty());
        assert!(tmp.path().join("notes").is_dir());
    }

    #[test]
    fn missing_root_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("never-built");
        let fs_ = RecordingFs::new();
        let report = StaleFileCollector::new(&root, &fs_)
            .collect(&mut ExportLog::new())
            .unwrap();
        assert_eq!(report, CollectorReport::default());
    }
}
