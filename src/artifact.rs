//! Pending output files.
//!
//! An [`Artifact`] is one file the build wants on disk: a name, its content,
//! and a destination directory relative to the export root. Documents,
//! outlined media, shared styles and scripts, graph data and the export
//! manifest all travel through the same type.
//!
//! ## Write-if-changed
//!
//! [`Artifact::write`] only touches the disk when the bytes differ from what
//! is already there. An existing file is compared by length first and then
//! byte for byte; identical content is reported as
//! [`WriteOutcome::Unchanged`] and no write happens. Running a build twice
//! over the same sources therefore performs no writes the second time.

use crate::address::Address;
use crate::fs::FileSystem;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Artifact destination must be a directory: {0}")]
    DestinationNotDirectory(String),
    #[error("Artifact destination must be relative to the export root: {0}")]
    AbsoluteDestination(String),
    #[error("Artifact name must not be empty")]
    EmptyName,
    #[error("Could not create directory {0}")]
    DirectoryMissing(PathBuf),
}

/// What an artifact is, used for reporting and the stale-file pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Document,
    Media,
    Style,
    Script,
    Data,
    Manifest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Binary(Vec<u8>),
}

impl Content {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(s) => s.as_bytes(),
            Content::Binary(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Content {
    fn from(b: Vec<u8>) -> Self {
        Content::Binary(b)
    }
}

/// Result of a write-if-changed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Identity used to de-duplicate artifacts: name plus relative destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    name: String,
    content: Content,
    destination: Address,
    encoding: Encoding,
    kind: ArtifactKind,
    modified_ms: Option<u64>,
}

impl Artifact {
    /// Create an artifact. `destination` is a directory relative to the export root.
    pub fn new(
        name: impl Into<String>,
        content: impl Into<Content>,
        destination: Address,
        kind: ArtifactKind,
    ) -> Result<Self, ArtifactError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ArtifactError::EmptyName);
        }
        if destination.is_file() {
            return Err(ArtifactError::DestinationNotDirectory(
                destination.as_str().to_string(),
            ));
        }
        if destination.is_absolute() {
            return Err(ArtifactError::AbsoluteDestination(
                destination.as_str().to_string(),
            ));
        }
        let content = content.into();
        let encoding = match content {
            Content::Text(_) => Encoding::Utf8,
            Content::Binary(_) => Encoding::Binary,
        };
        Ok(Self {
            name,
            content,
            destination,
            encoding,
            kind,
            modified_ms: None,
        })
    }

    /// Record the modification time of the source this artifact came from.
    pub fn with_modified_time(mut self, modified_ms: u64) -> Self {
        self.modified_ms = Some(modified_ms);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn modified_ms(&self) -> Option<u64> {
        self.modified_ms
    }

    /// Destination directory joined with the name.
    pub fn relative_path(&self) -> Address {
        self.destination.join_str(&self.name)
    }

    /// Relative path rendered with `/` separators.
    pub fn relative_path_string(&self) -> String {
        let mut path = self.relative_path();
        path.make_unix_style();
        path.as_str().to_string()
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            name: self.name.clone(),
            path: self.relative_path_string(),
        }
    }

    /// Apply web-style naming to both the name and the destination.
    pub fn make_web_style(&mut self) {
        self.name = crate::address::to_web_style(&self.name);
        self.destination.make_web_style(true);
    }

    /// Write under `root` unless the file already holds identical bytes.
    pub fn write(&self, root: &Address, fs: &dyn FileSystem) -> Result<WriteOutcome, ArtifactError> {
        let target = root.join(&self.relative_path()).to_path_buf();
        let bytes = self.content.as_bytes();

        if fs.exists(&target) {
            let stat = fs.stat(&target)?;
            if !stat.is_dir && stat.size == bytes.len() as u64 && fs.read(&target)? == bytes {
                return Ok(WriteOutcome::Unchanged);
            }
        }

        if let Some(dir) = target.parent() {
            fs.create_dir_all(dir)?;
            if !fs.exists(dir) {
                return Err(ArtifactError::DirectoryMissing(dir.to_path_buf()));
            }
        }
        fs.write(&target, bytes)?;
        tracing::debug!(path = %target.display(), bytes = bytes.len(), "wrote artifact");
        Ok(WriteOutcome::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Platform;
    use crate::fs::tests::{FsOp, RecordingFs};
    use tempfile::TempDir;

    fn dir(raw: &str) -> Address {
        Address::with_platform(raw, "", Platform::Unix)
    }

    fn root(tmp: &TempDir) -> Address {
        Address::with_platform(&tmp.path().to_string_lossy(), "", Platform::Unix)
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn file_like_destination_is_rejected() {
        let err = Artifact::new("a.html", "x", dir("notes/a.html"), ArtifactKind::Document)
            .unwrap_err();
        assert!(matches!(err, ArtifactError::DestinationNotDirectory(p) if p == "notes/a.html"));
    }

    #[test]
    fn absolute_destination_is_rejected() {
        let err = Artifact::new("a.html", "x", dir("/var/www"), ArtifactKind::Document)
            .unwrap_err();
        assert!(matches!(err, ArtifactError::AbsoluteDestination(_)));
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Artifact::new("", "x", dir("notes"), ArtifactKind::Document).unwrap_err();
        assert!(matches!(err, ArtifactError::EmptyName));
    }

    #[test]
    fn encoding_follows_content() {
        let text = Artifact::new("a.css", "body{}", dir("lib/styles"), ArtifactKind::Style).unwrap();
        assert_eq!(text.encoding(), Encoding::Utf8);
        let bin = Artifact::new("a.png", vec![0u8, 1, 2], dir("lib/media"), ArtifactKind::Media)
            .unwrap();
        assert_eq!(bin.encoding(), Encoding::Binary);
    }

    #[test]
    fn relative_path_joins_name() {
        let a = Artifact::new("a.html", "x", dir("notes/sub"), ArtifactKind::Document).unwrap();
        assert_eq!(a.relative_path_string(), "notes/sub/a.html");

        let root_level = Artifact::new("index.html", "x", Address::empty(), ArtifactKind::Document)
            .unwrap();
        assert_eq!(root_level.relative_path_string(), "index.html");
    }

    #[test]
    fn key_is_name_and_path() {
        let a = Artifact::new("x.png", vec![1u8], dir("lib/media"), ArtifactKind::Media).unwrap();
        assert_eq!(
            a.key(),
            ArtifactKey {
                name: "x.png".into(),
                path: "lib/media/x.png".into()
            }
        );
    }

    #[test]
    fn web_style_renames_name_and_destination() {
        let mut a = Artifact::new("My Page.html", "x", dir("Some Dir"), ArtifactKind::Document)
            .unwrap();
        a.make_web_style();
        assert_eq!(a.relative_path_string(), "some-dir/my-page.html");
    }

    // =========================================================================
    // Write-if-changed
    // =========================================================================

    #[test]
    fn writes_new_file_and_creates_directories() {
        let tmp = TempDir::new().unwrap();
        let fs = RecordingFs::new();
        let a = Artifact::new("a.html", "<p>hi</p>", dir("deep/er"), ArtifactKind::Document)
            .unwrap();

        assert_eq!(a.write(&root(&tmp), &fs).unwrap(), WriteOutcome::Written);
        let written = tmp.path().join("deep/er/a.html");
        assert_eq!(std::fs::read_to_string(&written).unwrap(), "<p>hi</p>");
        assert!(fs
            .get_operations()
            .contains(&FsOp::CreateDir(tmp.path().join("deep/er"))));
    }

    #[test]
    fn identical_content_is_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let fs = RecordingFs::new();
        let a = Artifact::new("a.html", "same", dir("."), ArtifactKind::Document).unwrap();

        a.write(&root(&tmp), &fs).unwrap();
        fs.clear();

        assert_eq!(a.write(&root(&tmp), &fs).unwrap(), WriteOutcome::Unchanged);
        assert!(fs.get_operations().is_empty());
    }

    #[test]
    fn same_length_different_bytes_is_rewritten() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "aaaa").unwrap();
        let fs = RecordingFs::new();
        let a = Artifact::new("a.txt", "bbbb", dir("."), ArtifactKind::Data).unwrap();

        assert_eq!(a.write(&root(&tmp), &fs).unwrap(), WriteOutcome::Written);
        assert_eq!(std::fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "bbbb");
    }

    #[test]
    fn different_length_is_rewritten() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "short").unwrap();
        let a = Artifact::new("a.txt", "much longer", dir("."), ArtifactKind::Data).unwrap();

        assert_eq!(a.write(&root(&tmp), &RecordingFs::new()).unwrap(), WriteOutcome::Written);
    }

    #[test]
    fn binary_content_round_trips() {
        let tmp = TempDir::new().unwrap();
        let bytes = vec![0u8, 159, 146, 150, 255];
        let a = Artifact::new("b.bin", bytes.clone(), dir("lib/media"), ArtifactKind::Media)
            .unwrap();
        a.write(&root(&tmp), &RecordingFs::new()).unwrap();
        assert_eq!(std::fs::read(tmp.path().join("lib/media/b.bin")).unwrap(), bytes);
    }

    #[test]
    fn write_error_surfaces() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("locked.html");
        let fs = RecordingFs::failing_on(vec![target]);
        let a = Artifact::new("locked.html", "x", dir("."), ArtifactKind::Document).unwrap();

        assert!(matches!(a.write(&root(&tmp), &fs), Err(ArtifactError::Io(_))));
    }
}
