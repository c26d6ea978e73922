//! Platform-aware path model.
//!
//! Every source and destination location in the exporter is an [`Address`]:
//! a raw path string decomposed into root, directory, parent, name and
//! extension, plus an optional working directory that relative addresses are
//! resolved against.
//!
//! # Re-parse discipline
//!
//! An `Address` is never patched field by field. Every operation that changes
//! it (`join`, `set_extension`, `make_absolute`, `make_web_style`, ...) builds
//! the new path string and runs the full parser over it again, so the
//! decomposition is always self-consistent:
//!
//! - exactly one of [`is_directory`](Address::is_directory) /
//!   [`is_file`](Address::is_file) holds (a path is a directory iff it has no
//!   extension);
//! - the full path is the directory joined with the full name (for
//!   directories, the directory *is* the full path);
//! - an absolute address carries no working directory.
//!
//! # Parsing
//!
//! ```text
//! "notes/My Note.md?x=1"
//!   root: ""   directory: "notes"   full_name: "My Note.md"
//!   base_name: "My Note"   extension: ".md"   full_path: "notes/My Note.md?x=1"
//! ```
//!
//! Paths are percent-decoded first. An undecodable path is logged and used
//! verbatim: a malformed path must never stop a batch.
//!
//! Backslashes are accepted as separators on input. Windows-style addresses
//! render with `\`, Unix-style ones with `/`; URLs always keep `/`.

use crate::fs::{FileStat, FileSystem};
use percent_encoding::percent_decode_str;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressError {
    #[error("working directory must be absolute: {0}")]
    RelativeWorkingDirectory(String),
}

/// Separator and absolute-path rules to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

#[derive(Debug, Clone)]
pub struct Address {
    root: String,
    dir: String,
    parent: String,
    base: String,
    ext: String,
    name: String,
    full_path: String,
    working_dir: String,
    raw: String,
    platform: Platform,
    exists: OnceLock<bool>,
}

/// Result of running the parser over one raw string, in `/` form.
struct Parsed {
    root: String,
    dir: String,
    parent: String,
    base: String,
    ext: String,
    name: String,
    full_path: String,
}

impl Address {
    pub fn new(raw: &str) -> Self {
        Self::with_working_dir(raw, "")
    }

    pub fn with_working_dir(raw: &str, working_dir: &str) -> Self {
        Self::with_platform(raw, working_dir, Platform::current())
    }

    pub fn with_platform(raw: &str, working_dir: &str, platform: Platform) -> Self {
        let working_dir = if working_dir.is_empty() {
            String::new()
        } else {
            parse(working_dir).full_path
        };
        let mut address = Self {
            root: String::new(),
            dir: String::new(),
            parent: String::new(),
            base: String::new(),
            ext: String::new(),
            name: String::new(),
            full_path: String::new(),
            working_dir,
            raw: String::new(),
            platform,
            exists: OnceLock::new(),
        };
        address.reparse(raw);
        address
    }

    /// The empty address (`.`), used as "the export root itself".
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Replace this address with a fresh parse of `raw`, keeping the working
    /// directory and platform.
    pub fn reparse(&mut self, raw: &str) -> &mut Self {
        let parsed = parse(raw);
        self.root = parsed.root;
        self.dir = parsed.dir;
        self.parent = parsed.parent;
        self.base = parsed.base;
        self.ext = parsed.ext;
        self.name = parsed.name;
        self.full_path = parsed.full_path;
        self.raw = raw.to_string();
        self.exists = OnceLock::new();

        if self.platform == Platform::Windows {
            if is_web_url(&self.root) {
                self.platform = Platform::Unix;
            } else {
                for field in [
                    &mut self.root,
                    &mut self.dir,
                    &mut self.parent,
                    &mut self.full_path,
                    &mut self.working_dir,
                ] {
                    *field = field.replace('/', "\\");
                }
            }
        }

        if self.is_absolute() {
            self.working_dir.clear();
        }
        self
    }

    /// Join path segments onto this address. The working directory carries over.
    pub fn join(&self, other: &Address) -> Address {
        self.join_str(&other.folder_form(&other.full_path))
    }

    pub fn join_str(&self, other: &str) -> Address {
        let mut joined = join_strings(&[&self.full_path, other]);
        if ends_with_separator(other) && !ends_with_separator(&joined) {
            joined.push('/');
        }
        Self::with_platform(&joined, &self.working_dir, self.platform)
    }

    /// Resolve against the address's own working directory.
    ///
    /// A relative address with no working directory stays relative.
    pub fn make_absolute(&mut self) -> &mut Self {
        if !self.is_absolute() && !self.working_dir.is_empty() {
            let joined = join_strings(&[&self.working_dir, &self.full_path]);
            let joined = self.folder_form(&joined);
            self.working_dir.clear();
            self.reparse(&joined);
        }
        self
    }

    /// Resolve against an explicit working directory, which must be absolute.
    pub fn make_absolute_in(&mut self, working_dir: &Address) -> Result<&mut Self, AddressError> {
        if !working_dir.is_absolute() {
            return Err(AddressError::RelativeWorkingDirectory(
                working_dir.full_path.clone(),
            ));
        }
        if !self.is_absolute() {
            let joined = join_strings(&[&working_dir.full_path, &self.full_path]);
            let joined = self.folder_form(&joined);
            self.working_dir.clear();
            self.reparse(&joined);
        }
        Ok(self)
    }

    /// A copy resolved against the working directory.
    pub fn absolute(&self) -> Address {
        let mut copy = self.clone();
        copy.make_absolute();
        copy
    }

    /// Prefix the path with the filesystem root.
    pub fn make_root_absolute(&mut self) -> &mut Self {
        if !self.is_absolute() {
            let rooted = match self.platform {
                Platform::Windows => match drive_start(&self.full_path) {
                    Some(start) => self.full_path[start..].to_string(),
                    None => format!("\\{}", self.full_path),
                },
                Platform::Unix => format!("/{}", self.full_path),
            };
            let rooted = self.folder_form(&rooted);
            self.reparse(&rooted);
        }
        self
    }

    /// Strip the filesystem root (leading `/`, or a drive on Windows).
    pub fn make_root_relative(&mut self) -> &mut Self {
        if self.is_absolute() && !is_web_url(&self.root) {
            let stripped = match self.platform {
                Platform::Windows => strip_drive(&self.full_path)
                    .trim_start_matches(['\\', '/'])
                    .to_string(),
                Platform::Unix => self.full_path.trim_start_matches('/').to_string(),
            };
            let stripped = self.folder_form(&stripped);
            self.reparse(&stripped);
        }
        self
    }

    /// Lower-case and replace spaces with dashes. No-op when `enabled` is false.
    pub fn make_web_style(&mut self, enabled: bool) -> &mut Self {
        if enabled {
            let web = to_web_style(&self.folder_form(&self.full_path));
            self.reparse(&web);
        }
        self
    }

    /// Use `/` separators; a leading drive becomes the root.
    pub fn make_unix_style(&mut self) -> &mut Self {
        self.platform = Platform::Unix;
        self.working_dir = self.working_dir.replace('\\', "/");
        let unix = self.full_path.replace('\\', "/");
        let rest = strip_drive(&unix);
        let unix = if rest.len() != unix.len() && rest.starts_with('/') {
            format!("/{}", rest.trim_start_matches('/'))
        } else {
            unix.clone()
        };
        let unix = self.folder_form(&unix);
        self.reparse(&unix);
        self
    }

    pub fn make_windows_style(&mut self) -> &mut Self {
        self.platform = Platform::Windows;
        let windows = self.folder_form(&self.full_path.replace('/', "\\"));
        self.reparse(&windows);
        self
    }

    /// Treat the address as a directory even if its last segment has a dot.
    pub fn make_force_folder(&mut self) -> &mut Self {
        if !self.is_directory() {
            let forced = format!("{}/", self.full_path);
            self.reparse(&forced);
        }
        self
    }

    /// Replace (or add) the extension. A leading `.` is added when missing.
    pub fn set_extension(&mut self, extension: &str) -> &mut Self {
        let extension = if extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{extension}")
        };
        let dir = if self.is_directory() {
            &self.parent
        } else {
            &self.dir
        };
        let rebuilt = join_strings(&[dir, &format!("{}{}", self.name, extension)]);
        self.reparse(&rebuilt);
        self
    }

    /// Swap `search` for `replace` if the address currently has extension `search`.
    pub fn replace_extension(&mut self, search: &str, replace: &str) -> &mut Self {
        if self.extension_name().eq_ignore_ascii_case(search.trim_start_matches('.')) {
            self.set_extension(replace);
        }
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// The containing directory of a file, or the address itself for a directory.
    ///
    /// Always a directory address, even when the last segment has a dot.
    pub fn directory(&self) -> Address {
        Self::with_platform(&as_folder(&self.dir), &self.working_dir, self.platform)
    }

    /// Like [`directory`](Self::directory), but a directory's parent is one level up.
    pub fn parent(&self) -> Address {
        Self::with_platform(&as_folder(&self.parent), &self.working_dir, self.platform)
    }

    /// `path` marked with a trailing separator when this address is a
    /// directory, so the next parse keeps it one.
    fn folder_form(&self, path: &str) -> String {
        if self.is_directory() {
            as_folder(path)
        } else {
            path.to_string()
        }
    }

    /// Name including the extension.
    pub fn full_name(&self) -> &str {
        &self.base
    }

    /// Extension with its leading dot, or `""`.
    pub fn extension(&self) -> &str {
        &self.ext
    }

    /// Extension without the dot.
    pub fn extension_name(&self) -> &str {
        self.ext.trim_start_matches('.')
    }

    /// Name without the extension.
    pub fn base_name(&self) -> &str {
        &self.name
    }

    pub fn as_str(&self) -> &str {
        &self.full_path
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn working_directory(&self) -> &str {
        &self.working_dir
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn is_directory(&self) -> bool {
        self.ext.is_empty()
    }

    pub fn is_file(&self) -> bool {
        !self.ext.is_empty()
    }

    /// True for the address that only references its working directory.
    pub fn is_empty(&self) -> bool {
        self.full_path == "."
    }

    pub fn is_absolute(&self) -> bool {
        let path = self.full_path.as_str();
        if path.starts_with("http:") || path.starts_with("https:") {
            return true;
        }
        match self.platform {
            Platform::Windows => has_drive(path) || (path.starts_with('\\') && !path.contains(':')),
            Platform::Unix => path.starts_with('/'),
        }
    }

    pub fn is_relative(&self) -> bool {
        !self.is_absolute()
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.full_path)
    }

    /// Whether the absolute form exists. Memoized until the next re-parse.
    pub fn exists(&self, fs: &dyn FileSystem) -> bool {
        *self
            .exists
            .get_or_init(|| fs.exists(&self.absolute().to_path_buf()))
    }

    /// Drop the memoized existence answer.
    pub fn invalidate_exists(&mut self) {
        self.exists = OnceLock::new();
    }

    pub fn stat(&self, fs: &dyn FileSystem) -> Option<FileStat> {
        if !self.exists(fs) {
            return None;
        }
        match fs.stat(&self.absolute().to_path_buf()) {
            Ok(stat) => Some(stat),
            Err(e) => {
                tracing::warn!(path = %self.full_path, "could not stat: {e}");
                None
            }
        }
    }

    /// Relative address leading from `from`'s directory to `to`.
    ///
    /// Both sides are made absolute against their working directories first.
    /// The result's working directory is `from`'s absolute directory, so
    /// resolving it gives back `to`.
    pub fn relative_path(from: &Address, to: &Address) -> Address {
        let from_dir = from.absolute().directory();
        let to_abs = to.absolute();
        let relative = relative_between(
            &from_dir.full_path.replace('\\', "/"),
            &to_abs.full_path.replace('\\', "/"),
        );
        Self::with_platform(&relative, &from_dir.full_path, from.platform)
    }

    /// Compare two paths ignoring separator style, case and spaces-vs-dashes.
    pub fn equal(a: &str, b: &str) -> bool {
        normalized_key(a) == normalized_key(b)
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.full_path == other.full_path
            && self.working_dir == other.working_dir
            && self.platform == other.platform
    }
}

impl Eq for Address {}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path)
    }
}

/// Unix-style, web-style form used for path comparisons.
pub fn normalized_key(path: &str) -> String {
    let mut address = Address::with_platform(path, "", Platform::Unix);
    address.make_web_style(true);
    address.full_path
}

/// Spaces become `-`, runs of `-` collapse to one, everything lower-cases.
pub fn to_web_style(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        let c = if c == ' ' { '-' } else { c };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.to_lowercase()
}

/// Join path strings with `/` and normalize the result.
pub fn join_strings(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .map(|p| p.replace('\\', "/"))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    repair_protocol(&normalize(&joined))
}

fn parse(raw: &str) -> Parsed {
    let (path, args) = match raw.split_once('?') {
        Some((path, args)) => (path, args),
        None => (raw, ""),
    };
    let path = decode(path).replace('\\', "/");

    let root = if path.starts_with('/') {
        "/".to_string()
    } else if has_drive(&path) {
        path[..3].to_string()
    } else {
        String::new()
    };

    let trailing_separator = path.ends_with('/') && path.len() > 1;
    let body = if path == "/" {
        path.as_str()
    } else {
        path.trim_end_matches('/')
    };
    let (raw_dir, raw_base) = match body.rfind('/') {
        Some(0) => ("/", &body[1..]),
        Some(idx) => (&body[..idx], &body[idx + 1..]),
        None => ("", body),
    };
    let raw_base = if raw_base == "/" { "" } else { raw_base };

    let (mut name, mut ext) = match raw_base.rfind('.') {
        Some(idx) if idx > 0 => (raw_base[..idx].to_string(), raw_base[idx..].to_string()),
        _ => (raw_base.to_string(), String::new()),
    };
    if ext.contains(' ') {
        ext.clear();
    }
    if name.ends_with(' ') {
        name.push_str(&ext);
        ext.clear();
    }

    let parent = repair_protocol(&normalize(raw_dir));
    let (mut dir, name, base, mut full_path) = if trailing_separator || ext.is_empty() {
        let dir = repair_protocol(&normalize(body));
        let last = dir
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(dir.as_str())
            .to_string();
        (dir.clone(), last.clone(), last, dir)
    } else {
        let base = format!("{name}{ext}");
        let full = join_strings(&[&parent, &base]);
        (parent.clone(), name, base, full)
    };
    if trailing_separator || ext.is_empty() {
        ext.clear();
    }
    if dir.is_empty() {
        dir = ".".to_string();
    }

    if !args.trim().is_empty() {
        full_path = format!("{full_path}?{args}");
    }

    let root = if full_path.starts_with("https:") {
        "https://".to_string()
    } else if full_path.starts_with("http:") {
        "http://".to_string()
    } else {
        root
    };

    Parsed {
        root,
        dir,
        parent,
        base,
        ext,
        name,
        full_path,
    }
}

/// Percent-decode, retrying without `%` on failure, falling back to the raw string.
fn decode(path: &str) -> String {
    if let Ok(decoded) = percent_decode_str(path).decode_utf8() {
        return decoded.into_owned();
    }
    let stripped = path.replace('%', "");
    match percent_decode_str(&stripped).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            tracing::info!(path, "could not decode path: {e}");
            path.to_string()
        }
    }
}

/// Collapse `.`, `..` and repeated separators. Works on `/`-separated input.
fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                let can_pop = parts
                    .last()
                    .is_some_and(|p| *p != ".." && !(parts.len() == 1 && p.ends_with(':')));
                if can_pop {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            segment => parts.push(segment),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Normalizing `https://host` yields `https:/host`; put the second slash back.
fn repair_protocol(path: &str) -> String {
    if let Some(idx) = path.find(":/") {
        let scheme = &path[..idx];
        let rest = &path[idx + 2..];
        if scheme.len() >= 2
            && scheme.chars().all(|c| c.is_ascii_alphabetic())
            && !rest.starts_with('/')
        {
            return format!("{scheme}://{rest}");
        }
    }
    path.to_string()
}

fn relative_between(from: &str, to: &str) -> String {
    let from = normalize(from);
    let to = normalize(to);
    let from_parts: Vec<&str> = from.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let to_parts: Vec<&str> = to.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = vec![".."; from_parts.len() - common];
    parts.extend(&to_parts[common..]);
    parts.join("/")
}

/// Append a separator (ahead of any `?args`) unless one is already there.
fn as_folder(path: &str) -> String {
    let (body, args) = match path.split_once('?') {
        Some((body, args)) => (body, Some(args)),
        None => (path, None),
    };
    if body.is_empty() || body == "." || ends_with_separator(body) {
        return path.to_string();
    }
    match args {
        Some(args) => format!("{body}/?{args}"),
        None => format!("{body}/"),
    }
}

fn ends_with_separator(path: &str) -> bool {
    path.ends_with('/') || path.ends_with('\\')
}

/// Byte offset of a `X:` drive prefix found somewhere in `path`.
fn drive_start(path: &str) -> Option<usize> {
    let colon = path.find(':')?;
    let (start, letter) = path[..colon].char_indices().next_back()?;
    letter.is_ascii_alphabetic().then_some(start)
}

fn has_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

fn strip_drive(path: &str) -> &str {
    if has_drive(path) { &path[2..] } else { path }
}

fn is_web_url(root: &str) -> bool {
    root.starts_with("http:") || root.starts_with("https:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::DiskFs;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn unix(raw: &str) -> Address {
        Address::with_platform(raw, "", Platform::Unix)
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn parses_relative_file() {
        let a = unix("notes/My Note.md");
        assert_eq!(a.root(), "");
        assert_eq!(a.directory().as_str(), "notes");
        assert_eq!(a.full_name(), "My Note.md");
        assert_eq!(a.base_name(), "My Note");
        assert_eq!(a.extension(), ".md");
        assert_eq!(a.extension_name(), "md");
        assert_eq!(a.as_str(), "notes/My Note.md");
        assert!(a.is_file());
        assert!(!a.is_directory());
        assert!(a.is_relative());
    }

    #[test]
    fn parses_absolute_file() {
        let a = unix("/home/me/vault/a.md");
        assert_eq!(a.root(), "/");
        assert_eq!(a.directory().as_str(), "/home/me/vault");
        assert!(a.is_absolute());
    }

    #[test]
    fn no_extension_is_directory() {
        let a = unix("notes/daily");
        assert!(a.is_directory());
        assert_eq!(a.directory().as_str(), "notes/daily");
        assert_eq!(a.parent().as_str(), "notes");
        assert_eq!(a.full_name(), "daily");
        assert_eq!(a.as_str(), "notes/daily");
    }

    #[test]
    fn trailing_separator_is_directory() {
        let a = unix("lib/v1.2/");
        assert!(a.is_directory());
        assert_eq!(a.as_str(), "lib/v1.2");
        assert_eq!(a.full_name(), "v1.2");
        assert_eq!(a.extension(), "");
    }

    #[test]
    fn extension_with_space_is_dropped() {
        let a = unix("notes/Chapter 1. The start");
        assert!(a.is_directory());
        assert_eq!(a.full_name(), "Chapter 1. The start");
    }

    #[test]
    fn name_ending_in_space_absorbs_extension() {
        let a = unix("notes/draft .md");
        assert!(a.is_directory());
        assert_eq!(a.full_name(), "draft .md");
    }

    #[test]
    fn dotfile_has_no_extension() {
        let a = unix("config/.hidden");
        assert!(a.is_directory());
        assert_eq!(a.full_name(), ".hidden");
    }

    #[test]
    fn empty_path_is_dot() {
        let a = Address::empty();
        assert!(a.is_empty());
        assert!(a.is_directory());
        assert_eq!(a.as_str(), ".");
    }

    #[test]
    fn normalizes_dots_and_repeated_separators() {
        let a = unix("a//b/./c/../d.md");
        assert_eq!(a.as_str(), "a/b/d.md");
    }

    #[test]
    fn query_args_are_preserved() {
        let a = unix("lib/styles/app.css?v=3");
        assert_eq!(a.as_str(), "lib/styles/app.css?v=3");
        assert_eq!(a.full_name(), "app.css");
        assert_eq!(a.extension(), ".css");
    }

    #[test]
    fn percent_encoding_is_decoded() {
        let a = unix("notes/My%20Note.md");
        assert_eq!(a.full_name(), "My Note.md");
    }

    #[test]
    fn undecodable_percent_falls_back_without_percent() {
        let a = unix("notes/%FFbad.md");
        assert_eq!(a.full_name(), "FFbad.md");
    }

    #[test]
    fn backslashes_are_separators() {
        let a = unix("notes\\sub\\a.md");
        assert_eq!(a.as_str(), "notes/sub/a.md");
        assert_eq!(a.directory().as_str(), "notes/sub");
    }

    #[test]
    fn urls_keep_double_slash() {
        let a = unix("https://example.com/docs/page.html");
        assert_eq!(a.root(), "https://");
        assert_eq!(a.as_str(), "https://example.com/docs/page.html");
        assert_eq!(a.directory().as_str(), "https://example.com/docs");
        assert!(a.is_absolute());
    }

    #[test]
    fn windows_drive_path() {
        let a = Address::with_platform("C:\\Users\\me\\note.md", "", Platform::Windows);
        assert!(a.is_absolute());
        assert_eq!(a.as_str(), "C:\\Users\\me\\note.md");
        assert_eq!(a.directory().as_str(), "C:\\Users\\me");
        assert_eq!(a.root(), "C:\\");
    }

    #[test]
    fn windows_leading_backslash_is_absolute() {
        let a = Address::with_platform("\\share\\a.md", "", Platform::Windows);
        assert!(a.is_absolute());
        let b = Address::with_platform("share\\a.md", "", Platform::Windows);
        assert!(b.is_relative());
    }

    #[test]
    fn windows_url_stays_unix_style() {
        let a = Address::with_platform("https://example.com/a.html", "", Platform::Windows);
        assert_eq!(a.platform(), Platform::Unix);
        assert_eq!(a.as_str(), "https://example.com/a.html");
    }

    #[test]
    fn absolute_address_drops_working_dir() {
        let a = Address::with_platform("/abs/a.md", "/vault", Platform::Unix);
        assert_eq!(a.working_directory(), "");
        let b = Address::with_platform("rel/a.md", "/vault", Platform::Unix);
        assert_eq!(b.working_directory(), "/vault");
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    #[test]
    fn join_normalizes() {
        let a = unix("notes/sub");
        assert_eq!(a.join_str("../other/b.md").as_str(), "notes/other/b.md");
        assert_eq!(a.join(&unix("c.md")).as_str(), "notes/sub/c.md");
    }

    #[test]
    fn join_keeps_working_dir() {
        let a = Address::with_platform("notes", "/vault", Platform::Unix);
        let joined = a.join_str("a.md");
        assert_eq!(joined.working_directory(), "/vault");
        assert_eq!(joined.absolute().as_str(), "/vault/notes/a.md");
    }

    #[test]
    fn make_absolute_uses_working_dir() {
        let mut a = Address::with_platform("notes/a.md", "/vault", Platform::Unix);
        a.make_absolute();
        assert_eq!(a.as_str(), "/vault/notes/a.md");
        assert_eq!(a.working_directory(), "");
    }

    #[test]
    fn make_absolute_without_working_dir_stays_relative() {
        let mut a = unix("notes/a.md");
        a.make_absolute();
        assert_eq!(a.as_str(), "notes/a.md");
    }

    #[test]
    fn make_absolute_in_rejects_relative_working_dir() {
        let mut a = unix("a.md");
        let err = a.make_absolute_in(&unix("relative")).unwrap_err();
        assert_eq!(err, AddressError::RelativeWorkingDirectory("relative".into()));

        a.make_absolute_in(&unix("/out")).unwrap();
        assert_eq!(a.as_str(), "/out/a.md");
    }

    #[test]
    fn root_absolute_and_relative() {
        let mut a = unix("notes/a.md");
        a.make_root_absolute();
        assert_eq!(a.as_str(), "/notes/a.md");
        a.make_root_relative();
        assert_eq!(a.as_str(), "notes/a.md");
    }

    #[test]
    fn windows_root_relative_strips_drive() {
        let mut a = Address::with_platform("C:\\vault\\a.md", "", Platform::Windows);
        a.make_root_relative();
        assert_eq!(a.as_str(), "vault\\a.md");
        assert!(a.is_relative());
    }

    #[test]
    fn set_extension_adds_dot() {
        let mut a = unix("notes/a.md");
        a.set_extension("html");
        assert_eq!(a.as_str(), "notes/a.html");
        a.set_extension(".txt");
        assert_eq!(a.as_str(), "notes/a.txt");
    }

    #[test]
    fn set_extension_on_directory_names_sibling_file() {
        let mut a = unix("notes/readme");
        a.set_extension("html");
        assert_eq!(a.as_str(), "notes/readme.html");
        assert!(a.is_file());
    }

    #[test]
    fn replace_extension_only_when_matching() {
        let mut a = unix("a.canvas");
        a.replace_extension("md", "html");
        assert_eq!(a.as_str(), "a.canvas");
        a.replace_extension("canvas", "html");
        assert_eq!(a.as_str(), "a.html");
    }

    #[test]
    fn web_style_lowercases_and_dashes() {
        let mut a = unix("My Notes/Big  Idea - Draft.md");
        a.make_web_style(true);
        assert_eq!(a.as_str(), "my-notes/big-idea-draft.md");

        let mut b = unix("Keep Me.md");
        b.make_web_style(false);
        assert_eq!(b.as_str(), "Keep Me.md");
    }

    #[test]
    fn unix_and_windows_style_conversions() {
        let mut a = Address::with_platform("notes/sub/a.md", "", Platform::Unix);
        a.make_windows_style();
        assert_eq!(a.as_str(), "notes\\sub\\a.md");
        a.make_unix_style();
        assert_eq!(a.as_str(), "notes/sub/a.md");
    }

    #[test]
    fn unix_style_turns_drive_into_root() {
        let mut a = Address::with_platform("C:\\vault\\a.md", "", Platform::Windows);
        a.make_unix_style();
        assert_eq!(a.as_str(), "/vault/a.md");
        assert!(a.is_absolute());
    }

    #[test]
    fn force_folder() {
        let mut a = unix("lib/v1.2");
        assert!(a.is_file());
        a.make_force_folder();
        assert!(a.is_directory());
        assert_eq!(a.as_str(), "lib/v1.2");
    }

    #[test]
    fn directory_of_file_in_dotted_folder_is_a_folder() {
        let a = unix("v1.2/Note.html");
        let dir = a.directory();
        assert!(dir.is_directory());
        assert_eq!(dir.as_str(), "v1.2");
        assert_eq!(dir.full_name(), "v1.2");
        assert_eq!(dir.extension(), "");
        assert!(unix("docs/v1.2/sub/a.md").parent().is_directory());
    }

    #[test]
    fn dotted_folder_survives_reparsing_operations() {
        let mut a = unix("Release v1.2/");
        a.make_web_style(true);
        assert!(a.is_directory());
        assert_eq!(a.as_str(), "release-v1.2");

        a.make_windows_style();
        assert!(a.is_directory());
        a.make_unix_style();
        assert!(a.is_directory());
        assert_eq!(a.as_str(), "release-v1.2");

        a.make_root_absolute();
        assert!(a.is_directory());
        assert_eq!(a.as_str(), "/release-v1.2");
        a.make_root_relative();
        assert!(a.is_directory());

        let mut b = Address::with_platform("lib/v1.2/", "/out", Platform::Unix);
        b.make_absolute();
        assert!(b.is_directory());
        assert_eq!(b.as_str(), "/out/lib/v1.2");
    }

    #[test]
    fn join_keeps_dotted_folder() {
        let base = unix("site");
        let joined = base.join(&unix("v1.2/"));
        assert!(joined.is_directory());
        assert_eq!(joined.as_str(), "site/v1.2");
        assert!(base.join_str("v2.0/").is_directory());
        assert!(base.join_str("v2.0").is_file());
    }

    #[test]
    fn windows_root_absolute_handles_multibyte_before_colon() {
        let mut a = Address::with_platform("é:x\\a.md", "", Platform::Windows);
        a.make_root_absolute();
        assert!(a.as_str().starts_with('\\'));
        assert!(a.as_str().ends_with("a.md"));

        let mut b = Address::with_platform("notes\\C:a.md", "", Platform::Windows);
        b.make_root_absolute();
        assert_eq!(b.as_str(), "C:a.md");
    }

    // =========================================================================
    // Relative paths
    // =========================================================================

    #[test]
    fn relative_path_same_directory() {
        let from = unix("/out/notes/a.html");
        let to = unix("/out/notes/b.html");
        let rel = Address::relative_path(&from, &to);
        assert_eq!(rel.as_str(), "b.html");
        assert_eq!(rel.working_directory(), "/out/notes");
    }

    #[test]
    fn relative_path_climbs_and_descends() {
        let from = unix("/out/notes/deep/a.html");
        let to = unix("/out/media/img.png");
        let rel = Address::relative_path(&from, &to);
        assert_eq!(rel.as_str(), "../../media/img.png");
    }

    #[test]
    fn relative_path_between_relative_addresses() {
        let from = unix("notes/a.html");
        let to = unix("index.html");
        assert_eq!(Address::relative_path(&from, &to).as_str(), "../index.html");
    }

    #[test]
    fn relative_path_resolves_back_to_target() {
        let pairs = [
            ("/site/a/b/c.html", "/site/x/y.html"),
            ("/site/a.html", "/site/a/b/c/d.html"),
            ("/site/a/b.html", "/site/a/b.html"),
            ("/site/q/r/s.html", "/site/lib/media/p.png"),
        ];
        for (x, y) in pairs {
            let from = unix(x);
            let to = unix(y);
            let rel = Address::relative_path(&from, &to);
            let resolved = from.directory().join(&rel);
            assert_eq!(resolved.absolute().as_str(), to.absolute().as_str(), "{x} -> {y}");
        }
    }

    // =========================================================================
    // Laws and comparison
    // =========================================================================

    #[test]
    fn reparse_round_trip() {
        let samples = [
            "notes/a.md",
            "/abs/dir/",
            "My Folder/Some File.md",
            "https://example.com/a/b.html",
            "lib/styles/app.css?v=2",
            "",
            "../up/x.png",
        ];
        for raw in samples {
            let a = Address::with_platform(raw, "/work", Platform::Unix);
            let again = Address::with_platform(a.as_str(), a.working_directory(), Platform::Unix);
            assert_eq!(again.as_str(), a.as_str(), "round trip of {raw:?}");
        }
    }

    #[test]
    fn exactly_one_of_file_or_directory() {
        for raw in ["a", "a.md", "a/", "a b.c d", ".x", "x.y/z"] {
            let a = unix(raw);
            assert!(a.is_file() != a.is_directory(), "{raw}");
        }
    }

    #[test]
    fn equal_ignores_style() {
        assert!(Address::equal("Notes\\My File.md", "notes/my-file.md"));
        assert!(!Address::equal("notes/a.md", "notes/b.md"));
    }

    #[test]
    fn web_style_collapses_dash_runs() {
        assert_eq!(to_web_style("A -- B"), "a-b");
    }

    // =========================================================================
    // Existence
    // =========================================================================

    #[test]
    fn exists_is_memoized_until_reparse() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_string_lossy().to_string();
        let mut a = Address::with_platform("late.txt", &root, Platform::Unix);

        assert!(!a.exists(&DiskFs));
        std::fs::write(tmp.path().join("late.txt"), "x").unwrap();
        assert!(!a.exists(&DiskFs), "answer is cached");

        a.invalidate_exists();
        assert!(a.exists(&DiskFs));

        let raw = a.as_str().to_string();
        a.reparse(&raw);
        assert!(a.exists(&DiskFs));
    }

    #[test]
    fn stat_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_string_lossy().to_string();
        let a = Address::with_platform("missing.txt", &root, Platform::Unix);
        assert!(a.stat(&DiskFs).is_none());
    }
}
