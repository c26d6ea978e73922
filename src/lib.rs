//! # Vault Export
//!
//! Exports a folder of markdown notes (a "vault") as a self-contained static
//! website. Every document becomes one standalone HTML page; internal links
//! are rewritten to point at the exported pages; referenced media is copied
//! or inlined; shared styles, scripts, a search index and an optional link
//! graph are written once for the whole site. Every page carries a file-tree
//! sidebar and lists the pages linking to it.
//!
//! # Architecture: One Batch, Many Units
//!
//! A build turns a batch of source documents into a set of files on disk:
//!
//! ```text
//! 1. Plan      documents  →  export units      (paths, incremental skip)
//! 2. Render    each unit  →  content tree      (renderer surface, timeout)
//! 3. Rewrite   tree       →  tree              (links, media)
//! 4. Collect   tree       →  page artifact     (HTML template)
//! 5. Write     artifacts  →  output/           (write-if-changed)
//! 6. Sweep     output/    →  output/           (stale files, manifest)
//! ```
//!
//! Everything a build produces is an [`artifact::Artifact`]: a page, a copied
//! media file, a stylesheet. Artifacts carry their own destination and are
//! written only when their bytes differ from what is already on disk, so a
//! rebuild of an unchanged vault touches nothing.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`address`] | Normalized relative paths: joining, web-style slugs, comparison keys |
//! | [`artifact`] | Output files with write-if-changed semantics |
//! | [`assets`] | Theme and snippet cache, global styles and scripts, media pipeline |
//! | [`collector`] | Removes files left over from earlier exports |
//! | [`config`] | `export.toml` loading, validation, merging with stock defaults |
//! | [`content`] | The rendered content tree pages are built from |
//! | [`fs`] | Filesystem seam used by every write and delete |
//! | [`graph`] | Link graph precomputation for the graph view |
//! | [`index`] | Link index seam: reference resolution and the vault-wide link list |
//! | [`links`] | Rewrites internal links and anchors to exported pages |
//! | [`log`] | Severity-tagged export log returned with every build |
//! | [`manifest`] | Incremental-export manifest kept in the output folder |
//! | [`markdown`] | pulldown-cmark based renderer for `.md` and `.canvas` files |
//! | [`naming`] | Source-to-destination path rules |
//! | [`navigation`] | File-tree sidebar and backlinks |
//! | [`output`] | CLI output formatting |
//! | [`renderer`] | Renderer seam: acquire, render with timeout, release |
//! | [`search`] | Full-text search index written as a page script |
//! | [`template`] | Page HTML via Maud |
//! | [`unit`] | One document's journey through the pipeline |
//! | [`vault`] | Walks the source folder and indexes references |
//! | [`website`] | The orchestrator tying the stages together |
//!
//! # Design Decisions
//!
//! ## Recoverable Problems Never Abort
//!
//! A broken link, a missing image or a document that fails to render is
//! logged to the build's [`log::ExportLog`] and the export carries on. A
//! failed render still produces a page: an error placeholder that a later
//! build retries. Asset, graph and stale-file problems skip their step.
//! Only an unavailable renderer stops a build outright, and even then the
//! error hands back everything logged so far.
//!
//! ## Seams for Everything External
//!
//! The renderer ([`renderer::DocumentRenderer`]), the link index
//! ([`index::LinkIndex`]) and the filesystem ([`fs::FileSystem`]) are traits.
//! The orchestrator never touches disk or parses markup directly, so its
//! tests run against recording mocks.
//!
//! ## Page-Relative Everything
//!
//! Links, media and shared assets are all addressed relative to the page
//! that uses them. An exported site works from any subfolder of a web server
//! and straight from `file://`.

pub mod address;
pub mod artifact;
pub mod assets;
pub mod collector;
pub mod config;
pub mod content;
pub mod fs;
pub mod graph;
pub mod index;
pub mod links;
pub mod log;
pub mod manifest;
pub mod markdown;
pub mod naming;
pub mod navigation;
pub mod output;
pub mod renderer;
pub mod search;
pub mod template;
pub mod unit;
pub mod vault;
pub mod website;
