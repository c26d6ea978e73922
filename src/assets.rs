//! Site assets: shared stylesheets and scripts, plus per-page media.
//!
//! ## Global assets
//!
//! Every export carries the same small set of files under the export root:
//!
//! ```text
//! site/
//! └── lib/
//!     ├── styles/
//!     │   ├── webpage.css     # Built-in page styles
//!     │   ├── theme.css       # Theme stylesheet from [assets].theme
//!     │   └── snippets.css    # Enabled CSS snippets, concatenated
//!     ├── scripts/
//!     │   ├── webpage.js      # Built-in page behaviour
//!     │   ├── graph-data.js   # Precomputed link graph
//!     │   └── search-index.js # Search index, always linked
//!     └── media/              # Media referenced from outside the export root,
//!                             # under its vault path
//! ```
//!
//! Each asset class follows the inline policy from `[assets]`. An inlined
//! asset is embedded in every page head and produces no file; an outlined one
//! becomes an [`Artifact`] and the page head links to it relative to the page.
//!
//! ## Media
//!
//! `img`, `audio`, `video` and `source` elements whose `src` is a vault
//! reference are resolved through the [`LinkIndex`]. The file is then either
//! embedded as a base64 `data:` URI or copied next to the site (see
//! [`PathRules::media_destination`]) and the `src` rewritten relative to the
//! page. Missing media is reported and left as it was.

use crate::address::Address;
use crate::artifact::{Artifact, ArtifactError, ArtifactKind};
use crate::config::AssetsConfig;
use crate::fs::FileSystem;
use crate::index::LinkIndex;
use crate::log::ExportLog;
use crate::markdown;
use crate::naming::{self, PathRules, unix_address};
use crate::unit::ExportUnit;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

pub const STYLES_DIR: &str = "lib/styles";
pub const SCRIPTS_DIR: &str = "lib/scripts";
pub const MEDIA_DIR: &str = "lib/media";

/// Snippet folder used when `[assets].snippets_dir` is not set.
pub const DEFAULT_SNIPPETS_DIR: &str = ".obsidian/snippets";

const WEBPAGE_CSS: &str = include_str!("../static/webpage.css");
const WEBPAGE_JS: &str = include_str!("../static/webpage.js");
const DEFAULT_THEME_CSS: &str = "/* Using default theme. */";

/// Elements whose `src` may point at vault media.
const MEDIA_TAGS: &[&str] = &["img", "audio", "video", "source"];

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

// ============================================================================
// Theme and snippet cache
// ============================================================================

/// Theme and snippet stylesheets, kept across builds.
///
/// Loading reads user files from the vault, so the result is reused until the
/// theme or snippet selection changes.
#[derive(Debug, Default)]
pub struct AssetCache {
    key: Option<String>,
    theme: Option<String>,
    snippets: Option<String>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// SHA-256 over the theme path, the snippet folder and the sorted snippet set.
    pub fn cache_key(config: &AssetsConfig) -> String {
        let mut snippets = config.enabled_snippets.clone();
        snippets.sort();
        snippets.dedup();

        let mut hasher = Sha256::new();
        hasher.update(b"theme\0");
        hasher.update(config.theme.as_deref().unwrap_or_default().as_bytes());
        hasher.update(b"\0snippets_dir\0");
        hasher.update(config.snippets_dir.as_deref().unwrap_or_default().as_bytes());
        for snippet in &snippets {
            hasher.update(b"\0");
            hasher.update(snippet.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Drop cached stylesheets when `key` differs from the one they were loaded
    /// under. Returns whether anything was dropped.
    pub fn invalidate_if_changed(&mut self, key: &str) -> bool {
        if self.key.as_deref() == Some(key) {
            return false;
        }
        let had_content = self.theme.is_some() || self.snippets.is_some();
        self.key = Some(key.to_string());
        self.theme = None;
        self.snippets = None;
        if had_content {
            tracing::debug!("asset cache invalidated");
        }
        had_content
    }

    pub fn is_loaded(&self) -> bool {
        self.theme.is_some() && self.snippets.is_some()
    }

    /// Load the theme and snippets from `source_root` unless already cached.
    pub fn load(
        &mut self,
        source_root: &Path,
        config: &AssetsConfig,
        fs: &dyn FileSystem,
        log: &mut ExportLog,
    ) {
        self.invalidate_if_changed(&Self::cache_key(config));
        if self.theme.is_none() {
            self.theme = Some(load_theme(source_root, config, fs, log));
        }
        if self.snippets.is_none() {
            self.snippets = Some(load_snippets(source_root, config, fs, log));
        }
    }

    pub fn theme_css(&self) -> &str {
        self.theme.as_deref().unwrap_or(DEFAULT_THEME_CSS)
    }

    pub fn snippets_css(&self) -> &str {
        self.snippets.as_deref().unwrap_or_default()
    }
}

fn load_theme(
    source_root: &Path,
    config: &AssetsConfig,
    fs: &dyn FileSystem,
    log: &mut ExportLog,
) -> String {
    let Some(theme) = config.theme.as_deref().filter(|t| !t.is_empty()) else {
        return DEFAULT_THEME_CSS.to_string();
    };
    let path = source_root.join(theme);
    match fs.read(&path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            log.warning(
                "Missing theme",
                format!("Cannot find theme at {}: {e}", path.display()),
            );
            String::new()
        }
    }
}

fn load_snippets(
    source_root: &Path,
    config: &AssetsConfig,
    fs: &dyn FileSystem,
    log: &mut ExportLog,
) -> String {
    let dir = source_root.join(
        config
            .snippets_dir
            .as_deref()
            .unwrap_or(DEFAULT_SNIPPETS_DIR),
    );
    let mut css = String::new();
    for name in &config.enabled_snippets {
        let path = dir.join(format!("{name}.css"));
        match fs.read(&path) {
            Ok(bytes) => {
                css.push_str(&String::from_utf8_lossy(&bytes));
                css.push('\n');
            }
            Err(_) => log.warning(
                "Missing snippet",
                format!("Snippet {name} not found at {}", path.display()),
            ),
        }
    }
    // Publish-only selectors need enough specificity to win over the theme.
    css.lines()
        .map(|line| match line.strip_prefix("publish ") {
            Some(rest) => format!("html body[class].publish {rest}"),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Global assets
// ============================================================================

/// A stylesheet or script referenced from the page head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadAsset {
    /// Embedded verbatim.
    Inline(String),
    /// Export-root-relative path of an outlined file.
    Linked(String),
}

impl HeadAsset {
    /// The href/src for a page `path_to_root` away from the export root.
    pub fn href(&self, path_to_root: &str) -> Option<String> {
        match self {
            Self::Inline(_) => None,
            Self::Linked(path) => Some(naming::href_from_root(path_to_root, path)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadAssets {
    pub styles: Vec<HeadAsset>,
    pub scripts: Vec<HeadAsset>,
}

/// Global assets for one build: the files to write and what each page links.
#[derive(Debug, Default)]
pub struct GlobalAssets {
    pub artifacts: Vec<Artifact>,
    pub head: HeadAssets,
}

impl GlobalAssets {
    /// Assemble the global assets. `graph_script` is the `graph-data.js`
    /// body, when the graph is enabled.
    pub fn build(
        cache: &AssetCache,
        config: &AssetsConfig,
        graph_script: Option<String>,
    ) -> Result<Self, AssetError> {
        let mut assets = Self::default();
        assets.add_style("webpage.css", WEBPAGE_CSS.to_string(), config.inline_styles)?;
        assets.add_style("theme.css", cache.theme_css().to_string(), config.inline_styles)?;
        if !cache.snippets_css().trim().is_empty() {
            assets.add_style(
                "snippets.css",
                cache.snippets_css().to_string(),
                config.inline_styles,
            )?;
        }
        if let Some(script) = graph_script {
            assets.add_script("graph-data.js", script, config.inline_scripts)?;
        }
        assets.add_script("webpage.js", WEBPAGE_JS.to_string(), config.inline_scripts)?;
        Ok(assets)
    }

    /// Link a script whose file is produced later in the build. It loads
    /// ahead of the other scripts.
    pub fn link_script(&mut self, path: &str) {
        self.head.scripts.insert(0, HeadAsset::Linked(path.to_string()));
    }

    fn add_style(&mut self, name: &str, css: String, inline: bool) -> Result<(), AssetError> {
        let head = self.add(name, css, STYLES_DIR, ArtifactKind::Style, inline)?;
        self.head.styles.push(head);
        Ok(())
    }

    fn add_script(&mut self, name: &str, js: String, inline: bool) -> Result<(), AssetError> {
        let head = self.add(name, js, SCRIPTS_DIR, ArtifactKind::Script, inline)?;
        self.head.scripts.push(head);
        Ok(())
    }

    fn add(
        &mut self,
        name: &str,
        content: String,
        dir: &str,
        kind: ArtifactKind,
        inline: bool,
    ) -> Result<HeadAsset, AssetError> {
        if inline {
            return Ok(HeadAsset::Inline(content));
        }
        let artifact = Artifact::new(name, content, unix_address(dir), kind)?;
        let path = artifact.relative_path_string();
        self.artifacts.push(artifact);
        Ok(HeadAsset::Linked(path))
    }
}

// ============================================================================
// Media
// ============================================================================

/// Counts from one page's media pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MediaStats {
    pub inlined: usize,
    pub outlined: usize,
    pub missing: usize,
}

/// `data:` URI for media bytes, typed from the extension (falling back to the tag).
pub fn data_uri(bytes: &[u8], extension: &str, tag: &str) -> String {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    let family = match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "bmp" | "avif" | "ico" => "image",
        "mp3" | "wav" | "m4a" | "flac" | "oga" | "opus" => "audio",
        "mp4" | "webm" | "mov" | "ogv" | "mkv" => "video",
        _ => match tag {
            "audio" => "audio",
            "video" => "video",
            _ => "image",
        },
    };
    let subtype = match ext.as_str() {
        "svg" => "svg+xml",
        "jpg" => "jpeg",
        other => other,
    };
    format!(
        "data:{family}/{subtype};base64,{}",
        BASE64_STANDARD.encode(bytes)
    )
}

pub struct MediaPipeline<'a> {
    index: &'a dyn LinkIndex,
    rules: &'a PathRules,
    source_root: &'a Path,
    fs: &'a dyn FileSystem,
    inline: bool,
}

impl<'a> MediaPipeline<'a> {
    pub fn new(
        index: &'a dyn LinkIndex,
        rules: &'a PathRules,
        source_root: &'a Path,
        fs: &'a dyn FileSystem,
        inline: bool,
    ) -> Self {
        Self {
            index,
            rules,
            source_root,
            fs,
            inline,
        }
    }

    /// Inline or outline every media reference in the unit's content.
    ///
    /// Outlined files are attached to the unit as [`ArtifactKind::Media`].
    pub fn process(&self, unit: &mut ExportUnit, log: &mut ExportLog) -> MediaStats {
        let source = unit.source().key().to_string();
        let destination = unit.destination().clone();
        let mut stats = MediaStats::default();
        let mut outlined = Vec::new();

        let Some(tree) = unit.content_mut() else {
            return stats;
        };
        tree.root.walk_mut(&mut |element| {
            if !MEDIA_TAGS.contains(&element.tag.as_str()) {
                return;
            }
            let Some(src) = element.attr("src").map(str::to_string) else {
                return;
            };
            if src.starts_with("data:") || !markdown::is_internal_reference(&src) {
                return;
            }
            let reference = percent_decode_str(&src).decode_utf8_lossy().into_owned();
            let Some(resolved) = self.index.resolve_reference(&reference, &source) else {
                log.warning(
                    "Missing media",
                    format!("{source}: no file matches \"{reference}\""),
                );
                stats.missing += 1;
                return;
            };
            let bytes = match self.fs.read(&self.source_root.join(&resolved)) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log.warning("Missing media", format!("{source}: cannot read {resolved}: {e}"));
                    stats.missing += 1;
                    return;
                }
            };

            let media = unix_address(&resolved);
            if self.inline {
                let uri = data_uri(&bytes, media.extension(), &element.tag);
                element.set_attr("src", uri);
                stats.inlined += 1;
                return;
            }

            let target = self.rules.media_destination(&media);
            match Artifact::new(
                target.full_name(),
                bytes,
                target.directory(),
                ArtifactKind::Media,
            ) {
                Ok(artifact) => {
                    let mut href = Address::relative_path(&destination, &target);
                    href.make_unix_style();
                    element.set_attr("src", href.as_str());
                    outlined.push(artifact);
                    stats.outlined += 1;
                }
                Err(e) => {
                    log.error("Media error", format!("{source}: {resolved}: {e}"));
                    stats.missing += 1;
                }
            }
        });

        for artifact in outlined {
            unit.add_artifact(artifact);
        }
        tracing::debug!(
            unit = %source,
            inlined = stats.inlined,
            outlined = stats.outlined,
            missing = stats.missing,
            "media processed"
        );
        stats
    }
}
