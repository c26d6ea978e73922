//! Export configuration module.
//!
//! Handles loading, validating, and merging `export.toml`. The stock defaults
//! form the base layer; a user file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! `export.toml` is read from the source (vault) directory, or from the path
//! given with `--config`:
//!
//! ```text
//! vault/
//! ├── export.toml
//! ├── Home.md
//! └── notes/
//!     └── ...
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! export_root = ""          # Vault folder that becomes the site root ("" = detect)
//! flatten_paths = false     # Put every page in the site root
//! web_style_paths = false   # Lower-case paths, spaces become dashes
//! incremental = true        # Skip sources unchanged since the last export
//! delete_old_files = true   # Remove outputs whose source disappeared
//! log_level = "warning"     # Lowest severity shown in the build summary
//!
//! [assets]
//! inline_styles = false     # Embed CSS in every page instead of lib/styles
//! inline_scripts = false    # Embed JS in every page instead of lib/scripts
//! inline_media = false      # Embed images as data: URIs instead of copying
//! # theme = "themes/minimal.css"
//! # snippets_dir = ".snippets"
//! enabled_snippets = []
//!
//! [render]
//! timeout_ms = 5000         # Per-document render timeout
//! poll_interval_ms = 10     # How often render completion is polled
//!
//! [features]
//! file_tree = true          # Sidebar listing every exported page
//! backlinks = true          # Footer listing the pages that link here
//! search = true             # Search box backed by lib/scripts/search-index.js
//!
//! [graph]
//! enabled = true
//! min_node_size = 3.0
//! max_node_size = 7.0
//! edge_pruning = 100.0
//! attraction_force = 1.0
//! link_length = 10.0
//! repulsion_force = 150.0
//! central_force = 3.0
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::log::Severity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Name of the config file looked up in the source directory.
pub const CONFIG_FILE_NAME: &str = "export.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Export configuration loaded from `export.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Vault-relative folder mapped to the site root. Empty means "detect".
    pub export_root: String,
    /// Write every page directly into the site root.
    pub flatten_paths: bool,
    /// Lower-case output paths and replace spaces with dashes.
    pub web_style_paths: bool,
    /// Skip rendering sources that have not changed since the last export.
    pub incremental: bool,
    /// Delete outputs that no longer belong to any source.
    pub delete_old_files: bool,
    /// Lowest log severity included in the summary.
    pub log_level: Severity,
    pub assets: AssetsConfig,
    pub render: RenderConfig,
    pub features: FeaturesConfig,
    pub graph: GraphConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            export_root: String::new(),
            flatten_paths: false,
            web_style_paths: false,
            incremental: true,
            delete_old_files: true,
            log_level: Severity::Warning,
            assets: AssetsConfig::default(),
            render: RenderConfig::default(),
            features: FeaturesConfig::default(),
            graph: GraphConfig::default(),
        }
    }
}

impl ExportConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.graph.min_node_size <= 0.0 {
            return Err(ConfigError::Validation(
                "graph.min_node_size must be positive".into(),
            ));
        }
        if self.graph.max_node_size < self.graph.min_node_size {
            return Err(ConfigError::Validation(
                "graph.max_node_size must not be smaller than graph.min_node_size".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.graph.edge_pruning) {
            return Err(ConfigError::Validation(
                "graph.edge_pruning must be 0-100".into(),
            ));
        }
        if self.render.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "render.poll_interval_ms must be non-zero".into(),
            ));
        }
        if self.render.timeout_ms < self.render.poll_interval_ms {
            return Err(ConfigError::Validation(
                "render.timeout_ms must be at least render.poll_interval_ms".into(),
            ));
        }
        if self.export_root.starts_with('/') || self.export_root.contains("..") {
            return Err(ConfigError::Validation(
                "export_root must be a folder inside the vault".into(),
            ));
        }
        Ok(())
    }
}

/// Inline-vs-outline policy per asset class, plus theme sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    pub inline_styles: bool,
    pub inline_scripts: bool,
    pub inline_media: bool,
    /// Theme stylesheet, relative to the vault.
    pub theme: Option<String>,
    /// Folder holding CSS snippets, relative to the vault.
    pub snippets_dir: Option<String>,
    /// Snippet names (without `.css`) to include.
    pub enabled_snippets: Vec<String>,
}

/// Renderer polling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            poll_interval_ms: 10,
        }
    }
}

impl RenderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Page navigation extras.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeaturesConfig {
    pub file_tree: bool,
    pub backlinks: bool,
    pub search: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            file_tree: true,
            backlinks: true,
            search: true,
        }
    }
}

/// Graph view tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    pub enabled: bool,
    pub min_node_size: f64,
    pub max_node_size: f64,
    /// 0-100; passed through to the graph view.
    pub edge_pruning: f64,
    pub attraction_force: f64,
    pub link_length: f64,
    pub repulsion_force: f64,
    pub central_force: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_node_size: 3.0,
            max_node_size: 7.0,
            edge_pruning: 100.0,
            attraction_force: 1.0,
            link_length: 10.0,
            repulsion_force: 150.0,
            central_force: 3.0,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ExportConfig::default()).expect("default config must serialize")
}

/// Deep-merge two TOML values. Tables merge key by key; anything else is
/// replaced by the overlay.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as raw TOML. A missing file is `None`.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto `base`, deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ExportConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ExportConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `export.toml` from the source directory, falling back to defaults.
pub fn load_config(source_root: &Path) -> Result<ExportConfig, ConfigError> {
    load_config_file(&source_root.join(CONFIG_FILE_NAME))
}

/// Load an explicit config file path, falling back to defaults when absent.
pub fn load_config_file(config_path: &Path) -> Result<ExportConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(config_path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `export.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Vault Export Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as export.toml in the vault root, or pass --config.
# Unknown keys will cause an error.

# Vault folder that becomes the root of the site.
# Leave empty to use the deepest folder shared by every exported file.
export_root = ""

# Write every page directly into the site root instead of mirroring folders.
flatten_paths = false

# Lower-case every output path and replace spaces with dashes.
web_style_paths = false

# Skip rendering sources whose size and modification time are unchanged
# since the last export (tracked in lib/metadata.json).
incremental = true

# Delete previously exported files that no longer belong to any source.
# Files under lib/media are never deleted.
delete_old_files = true

# Lowest severity shown in the build summary: info, warning, error, fatal.
log_level = "warning"

# ---------------------------------------------------------------------------
# Assets
# ---------------------------------------------------------------------------
[assets]
# Embed stylesheets in every page instead of writing lib/styles/*.css.
inline_styles = false

# Embed scripts in every page instead of writing lib/scripts/*.js.
inline_scripts = false

# Embed images, audio and video as data: URIs instead of copying them.
inline_media = false

# Theme stylesheet, relative to the vault.
# theme = "themes/minimal.css"

# Folder of CSS snippets, relative to the vault, and which ones to include.
# snippets_dir = ".snippets"
enabled_snippets = []

# ---------------------------------------------------------------------------
# Rendering
# ---------------------------------------------------------------------------
[render]
# A document that has not finished rendering after this long is replaced
# by an error page; the export continues.
timeout_ms = 5000

# How often render completion is checked.
poll_interval_ms = 10

# ---------------------------------------------------------------------------
# Navigation
# ---------------------------------------------------------------------------
[features]
# Sidebar listing every exported page, folders first.
file_tree = true

# Footer listing the pages that link to the current one.
backlinks = true

# Search box over page titles, headings and text.
# The index is written to lib/scripts/search-index.js.
search = true

# ---------------------------------------------------------------------------
# Graph view
# ---------------------------------------------------------------------------
[graph]
enabled = true

# Node radius range. Nodes grow with their number of links.
min_node_size = 3.0
max_node_size = 7.0

# Passed through to the graph view (0-100).
edge_pruning = 100.0

# Force layout parameters.
attraction_force = 1.0
link_length = 10.0
repulsion_force = 150.0
central_force = 3.0
"##
}
