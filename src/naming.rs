//! Destination naming rules.
//!
//! Every output location is derived from a source's vault-relative path by
//! the same [`PathRules`], so document pages, graph node paths, link hrefs
//! and outlined media always agree on where a file lives:
//!
//! - `notes/Daily Log.md` → `notes/Daily Log.html` (convertible extensions
//!   become `.html`)
//! - with export root `notes`: → `Daily Log.html`
//! - with `flatten`: → `Daily Log.html` regardless of folder
//! - with `web_style`: → `notes/daily-log.html`
//!
//! Media that lives outside the export root cannot be mirrored without
//! climbing above the site, so it is mirrored under the shared
//! [`MEDIA_DIR`](crate::assets::MEDIA_DIR) instead, keeping its vault path:
//! `x/cat.png` and `y/cat.png` stay two files.

use crate::address::{Address, Platform};
use crate::assets::MEDIA_DIR;

/// Source extensions that are rendered into pages.
pub const CONVERTIBLE_EXTENSIONS: &[&str] = &["md", "canvas"];

pub const OUTPUT_EXTENSION: &str = "html";

pub fn is_convertible(path: &Address) -> bool {
    CONVERTIBLE_EXTENSIONS
        .iter()
        .any(|ext| path.extension_name().eq_ignore_ascii_case(ext))
}

/// Unix-style relative address, the form all destinations use.
pub fn unix_address(raw: &str) -> Address {
    Address::with_platform(raw, "", Platform::Unix)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRules {
    /// Vault-relative folder that maps to the site root. Empty for the vault root.
    pub export_root: String,
    pub flatten: bool,
    pub web_style: bool,
}

impl PathRules {
    pub fn new(export_root: &str, flatten: bool, web_style: bool) -> Self {
        let root = unix_address(export_root);
        let export_root = if root.is_empty() {
            String::new()
        } else {
            root.as_str().trim_end_matches('/').to_string()
        };
        Self {
            export_root,
            flatten,
            web_style,
        }
    }

    /// Path of `source` relative to the export root, or `None` when it lies outside.
    pub fn strip_export_root(&self, source: &Address) -> Option<String> {
        let mut unix = source.clone();
        unix.make_unix_style();
        let path = unix.as_str();
        if self.export_root.is_empty() {
            return Some(path.to_string());
        }
        path.strip_prefix(&self.export_root)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }

    /// Output address for a vault-relative source path.
    pub fn destination_for(&self, source: &Address) -> Address {
        let relative = self
            .strip_export_root(source)
            .unwrap_or_else(|| source.full_name().to_string());
        let mut destination = unix_address(&relative);
        if is_convertible(&destination) {
            destination.set_extension(OUTPUT_EXTENSION);
        }
        if self.flatten {
            let name = destination.full_name().to_string();
            destination.reparse(&name);
        }
        destination.make_web_style(self.web_style);
        destination
    }

    /// Output address for a referenced media file.
    ///
    /// Media under the export root keeps its location. Anything else keeps
    /// its vault-relative path under the shared media directory.
    pub fn media_destination(&self, media: &Address) -> Address {
        let mut destination = match self.strip_export_root(media) {
            Some(relative) if !relative.starts_with("..") => unix_address(&relative),
            _ => {
                let mut vault_path = media.clone();
                vault_path.make_unix_style().make_root_relative();
                let vault_path = vault_path.as_str().trim_start_matches("../").to_string();
                unix_address(MEDIA_DIR).join_str(&vault_path)
            }
        };
        destination.make_web_style(self.web_style);
        destination
    }
}

/// Href for the export-root-relative `path` from a page `path_to_root` away from the root.
pub fn href_from_root(path_to_root: &str, path: &str) -> String {
    if path_to_root.is_empty() || path_to_root == "." {
        path.to_string()
    } else {
        format!("{path_to_root}/{path}")
    }
}

/// Relative path from a destination file back to the export root (`.` at the root).
pub fn path_to_root(destination: &Address) -> String {
    Address::relative_path(destination, &Address::empty())
        .as_str()
        .to_string()
}

/// Longest common folder of all sources, used when no export root is configured.
///
/// A single source exports relative to its own folder.
pub fn detect_export_root(sources: &[Address]) -> String {
    let mut common: Option<Vec<String>> = None;
    for source in sources {
        let mut dir = source.directory();
        dir.make_unix_style();
        let segments: Vec<String> = dir
            .as_str()
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(str::to_string)
            .collect();
        common = Some(match common {
            None => segments,
            Some(prefix) => prefix
                .into_iter()
                .zip(segments)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    common.unwrap_or_default().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dest(rules: &PathRules, source: &str) -> String {
        rules.destination_for(&unix_address(source)).as_str().to_string()
    }

    // =========================================================================
    // Destinations
    // =========================================================================

    #[test]
    fn markdown_becomes_html_in_place() {
        let rules = PathRules::default();
        assert_eq!(dest(&rules, "notes/Daily Log.md"), "notes/Daily Log.html");
        assert_eq!(dest(&rules, "Board.canvas"), "Board.html");
    }

    #[test]
    fn non_convertible_keeps_extension() {
        let rules = PathRules::default();
        assert_eq!(dest(&rules, "files/paper.pdf"), "files/paper.pdf");
    }

    #[test]
    fn export_root_is_stripped() {
        let rules = PathRules::new("notes", false, false);
        assert_eq!(dest(&rules, "notes/sub/A.md"), "sub/A.html");
        assert_eq!(dest(&rules, "notes/A.md"), "A.html");
    }

    #[test]
    fn export_root_prefix_must_be_whole_segment() {
        let rules = PathRules::new("notes", false, false);
        assert_eq!(rules.strip_export_root(&unix_address("notes2/A.md")), None);
    }

    #[test]
    fn flatten_drops_folders() {
        let rules = PathRules::new("", true, false);
        assert_eq!(dest(&rules, "a/b/c/Deep.md"), "Deep.html");
    }

    #[test]
    fn web_style_applies_to_whole_path() {
        let rules = PathRules::new("", false, true);
        assert_eq!(dest(&rules, "My Notes/Daily  Log.md"), "my-notes/daily-log.html");
    }

    #[test]
    fn is_convertible_ignores_case() {
        assert!(is_convertible(&unix_address("A.MD")));
        assert!(is_convertible(&unix_address("b.canvas")));
        assert!(!is_convertible(&unix_address("c.png")));
    }

    // =========================================================================
    // Media
    // =========================================================================

    #[test]
    fn media_inside_root_is_mirrored() {
        let rules = PathRules::new("notes", false, false);
        let d = rules.media_destination(&unix_address("notes/img/cat.png"));
        assert_eq!(d.as_str(), "img/cat.png");
    }

    #[test]
    fn media_outside_root_is_collected() {
        let rules = PathRules::new("notes", false, false);
        let d = rules.media_destination(&unix_address("attachments/cat.png"));
        assert_eq!(d.as_str(), "lib/media/attachments/cat.png");
    }

    #[test]
    fn same_name_media_outside_root_stay_apart() {
        let rules = PathRules::new("notes", false, true);
        let x = rules.media_destination(&unix_address("x/Cat Pic.png"));
        let y = rules.media_destination(&unix_address("y/Cat Pic.png"));
        assert_eq!(x.as_str(), "lib/media/x/cat-pic.png");
        assert_eq!(y.as_str(), "lib/media/y/cat-pic.png");
    }

    #[test]
    fn media_in_dotted_folder_keeps_its_folder() {
        let rules = PathRules::default();
        let d = rules.media_destination(&unix_address("assets/v1.2/cat.png"));
        assert_eq!(d.as_str(), "assets/v1.2/cat.png");
        assert!(d.directory().is_directory());
    }

    // =========================================================================
    // Roots
    // =========================================================================

    #[test]
    fn path_to_root_counts_levels() {
        assert_eq!(path_to_root(&unix_address("A.html")), ".");
        assert_eq!(path_to_root(&unix_address("a/b/C.html")), "../..");
    }

    #[test]
    fn href_from_root_prefixes_only_below_root() {
        assert_eq!(href_from_root(".", "lib/a.css"), "lib/a.css");
        assert_eq!(href_from_root("", "lib/a.css"), "lib/a.css");
        assert_eq!(href_from_root("../..", "lib/a.css"), "../../lib/a.css");
    }

    #[test]
    fn detect_common_folder() {
        let sources = vec![
            unix_address("vault/notes/a/A.md"),
            unix_address("vault/notes/b/B.md"),
            unix_address("vault/notes/C.md"),
        ];
        assert_eq!(detect_export_root(&sources), "vault/notes");
    }

    #[test]
    fn detect_single_source_uses_its_folder() {
        assert_eq!(detect_export_root(&[unix_address("x/y/A.md")]), "x/y");
    }

    #[test]
    fn detect_disjoint_sources_is_vault_root() {
        let sources = vec![unix_address("a/A.md"), unix_address("b/B.md")];
        assert_eq!(detect_export_root(&sources), "");
        assert_eq!(detect_export_root(&[]), "");
    }
}
