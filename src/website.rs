//! Export orchestration.
//!
//! A [`Website`] turns a list of source documents into a site on disk. One
//! call to [`Website::build`] runs the whole pipeline:
//!
//! ```text
//! assets     theme/snippet cache, graph data, global styles and scripts
//! plan       export root, path rules, file tree, backlinks, output key,
//!            manifest, incremental skips
//! render     acquire renderer ─► per unit: open ─► poll ─► extract
//!                                 ─► links ─► media ─► page ─► artifacts
//!            release renderer (always, including on cancel or error)
//! search     merge this run's pages into the search index
//! write      de-duplicate by (name, path), write-if-changed
//! collect    delete stale outputs, prune emptied folders
//! manifest   record what was produced for the next incremental run
//! ```
//!
//! Problems with one document, one asset or one file never stop a build:
//! the page gets an error placeholder or is left out, the step is skipped,
//! and the problem lands in the [`ExportLog`]. Only a renderer that cannot
//! be started ends a build with [`ExportError`], which still carries the
//! report logged so far.
//!
//! ## Incremental keys
//!
//! The manifest stores an output key: a hash of everything that shapes
//! every page (path rules, asset and feature settings, page head, file
//! tree). A different key re-renders everything. Each source entry also
//! stores a context key over the page's backlinks, so a page is rendered
//! again when the set of pages linking to it changes.
//!
//! Cancellation is cooperative. The [`CancelToken`] is checked before each
//! unit is opened; a cancelled build releases the renderer, writes nothing,
//! and returns [`BuildOutcome::Cancelled`].

use crate::address::Address;
use crate::artifact::{Artifact, ArtifactKey, WriteOutcome};
use crate::assets::{AssetCache, GlobalAssets, HeadAssets, MediaPipeline, MediaStats};
use crate::collector::StaleFileCollector;
use crate::config::ExportConfig;
use crate::content::ContentTree;
use crate::fs::FileSystem;
use crate::graph::{self, GraphOptions};
use crate::index::LinkIndex;
use crate::links::{LinkResolver, LinkStats};
use crate::log::ExportLog;
use crate::manifest::{ExportManifest, IncrementalStats};
use crate::naming::{self, PathRules};
use crate::navigation::{self, Backlink, TreeFolder};
use crate::renderer::{DocumentRenderer, RenderError, RendererSurface};
use crate::search::{SEARCH_INDEX_PATH, SearchEntry, SearchIndex};
use crate::template::{self, PageContext};
use crate::unit::{ExportUnit, SourceDocument, UnitPhase, UnitStatus};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Could not start renderer: {error}")]
    RendererUnavailable {
        #[source]
        error: RenderError,
        /// Everything logged before the build stopped, the fatal entry last.
        report: Box<BuildReport>,
    },
}

impl ExportError {
    /// The report of the aborted build.
    pub fn report(&self) -> Option<&BuildReport> {
        match self {
            Self::RendererUnavailable { report, .. } => Some(report),
        }
    }
}

/// Shared flag a caller can flip to stop a running build between units.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Counts and log of one build.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub documents: usize,
    pub incremental: IncrementalStats,
    /// Units whose page is an error placeholder.
    pub placeholders: usize,
    /// Units whose page could not be assembled at all.
    pub failed: usize,
    pub written: usize,
    /// Artifacts skipped because the file already held identical bytes.
    pub unchanged: usize,
    pub write_failures: usize,
    /// Stale files removed, export-root-relative.
    pub deleted: Vec<String>,
    pub links: LinkStats,
    pub media: MediaStats,
    pub log: ExportLog,
}

#[derive(Debug)]
pub enum BuildOutcome {
    Completed(BuildReport),
    /// Stopped by the cancel token. Nothing was written.
    Cancelled(BuildReport),
}

impl BuildOutcome {
    pub fn report(&self) -> &BuildReport {
        match self {
            Self::Completed(report) | Self::Cancelled(report) => report,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Long-lived exporter for one source folder and one output folder.
///
/// Keeps the theme/snippet cache between builds.
pub struct Website {
    source_root: PathBuf,
    output_root: PathBuf,
    config: ExportConfig,
    asset_cache: AssetCache,
    cancel: CancelToken,
}

impl Website {
    pub fn new(
        source_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        config: ExportConfig,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
            config,
            asset_cache: AssetCache::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ExportConfig {
        &mut self.config
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Token that cancels this website's builds.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Path rules for `documents`: the configured export root, or the
    /// longest common folder of the documents when none is configured.
    pub fn path_rules(&self, documents: &[SourceDocument]) -> PathRules {
        let export_root = if self.config.export_root.is_empty() {
            let paths: Vec<Address> = documents.iter().map(|d| d.path.clone()).collect();
            naming::detect_export_root(&paths)
        } else {
            self.config.export_root.clone()
        };
        PathRules::new(
            &export_root,
            self.config.flatten_paths,
            self.config.web_style_paths,
        )
    }

    /// Graph over `documents` from the index's resolved links.
    pub fn graph(&self, documents: &[SourceDocument], index: &dyn LinkIndex) -> graph::Graph {
        graph::build_graph(
            documents,
            &index.all_internal_links(),
            &self.path_rules(documents),
            GraphOptions::from(&self.config.graph),
        )
    }

    /// Export `documents`, in order, rendering them with `renderer`.
    pub async fn build<R>(
        &mut self,
        renderer: &mut R,
        index: &dyn LinkIndex,
        documents: &[SourceDocument],
        fs: &dyn FileSystem,
    ) -> Result<BuildOutcome, ExportError>
    where
        R: DocumentRenderer + ?Sized,
    {
        let result = self.run(renderer, index, documents, fs).await;
        self.cancel.reset();
        result
    }

    async fn run<R>(
        &mut self,
        renderer: &mut R,
        index: &dyn LinkIndex,
        documents: &[SourceDocument],
        fs: &dyn FileSystem,
    ) -> Result<BuildOutcome, ExportError>
    where
        R: DocumentRenderer + ?Sized,
    {
        let mut report = BuildReport {
            documents: documents.len(),
            ..BuildReport::default()
        };
        let rules = self.path_rules(documents);
        let features = self.config.features.clone();
        tracing::info!(
            documents = documents.len(),
            export_root = %rules.export_root,
            output = %self.output_root.display(),
            "starting export"
        );

        // Assets
        self.asset_cache
            .load(&self.source_root, &self.config.assets, fs, &mut report.log);
        let graph_script = self.graph_script(documents, index, &mut report.log);
        let mut globals =
            match GlobalAssets::build(&self.asset_cache, &self.config.assets, graph_script) {
                Ok(globals) => globals,
                Err(e) => {
                    report.log.error("Assets not built", e.to_string());
                    GlobalAssets::default()
                }
            };
        if features.search {
            globals.link_script(SEARCH_INDEX_PATH);
        }

        // Plan
        let file_tree = features
            .file_tree
            .then(|| navigation::build_file_tree(documents, &rules));
        let backlinks = if features.backlinks {
            navigation::build_backlinks(documents, &index.all_internal_links(), &rules)
        } else {
            BTreeMap::new()
        };
        let mut manifest = if self.config.incremental {
            ExportManifest::load(&self.output_root, fs)
        } else {
            ExportManifest::empty()
        };
        manifest.reset_if_root_changed(&rules.export_root);
        let output_key = self.output_key(&rules, &globals.head, file_tree.as_ref());
        manifest.reset_if_key_changed(&output_key);
        let mut search = if features.search && self.config.incremental {
            SearchIndex::load(&self.output_root, fs)
        } else {
            SearchIndex::new()
        };
        if features.search && search.is_empty() && !manifest.sources.is_empty() {
            tracing::info!("search index missing, rebuilding everything");
            manifest.sources.clear();
        }
        let mut units = self.plan_units(documents, &rules, &manifest, &backlinks, fs, &mut report);

        // Render
        let mut surface = match RendererSurface::acquire(renderer).await {
            Ok(surface) => surface,
            Err(e) => {
                report.log.fatal("Renderer unavailable", e.to_string());
                return Err(ExportError::RendererUnavailable {
                    error: e,
                    report: Box::new(report),
                });
            }
        };
        let resolver = LinkResolver::new(index, &rules);
        let media = MediaPipeline::new(
            index,
            &rules,
            &self.source_root,
            fs,
            self.config.assets.inline_media,
        );
        for unit in units.iter_mut().filter(|u| u.part_of_batch()) {
            if self.cancel.is_cancelled() {
                surface.release();
                report.log.info("Export cancelled", "stopped before all documents were rendered");
                tracing::info!("export cancelled");
                return Ok(BuildOutcome::Cancelled(report));
            }

            unit.advance(UnitPhase::Opened);
            let tree = match surface
                .render(
                    unit.source(),
                    self.config.render.timeout(),
                    self.config.render.poll_interval(),
                )
                .await
            {
                Ok(tree) => tree,
                Err(e) => {
                    report
                        .log
                        .error("Render failed", format!("{}: {e}", unit.source().key()));
                    ContentTree::error_placeholder(unit.source().title(), &e.to_string())
                }
            };
            unit.set_content(tree);
            unit.advance(UnitPhase::Rendered);

            if unit.status() == UnitStatus::Placeholder {
                report.placeholders += 1;
            } else {
                let source = unit.source().path.clone();
                let destination = unit.destination().clone();
                if let Some(tree) = unit.content_mut() {
                    let stats = resolver.rewrite_tree(tree, &source, &destination, &mut report.log);
                    report.links.resolved += stats.resolved;
                    report.links.unresolved += stats.unresolved;
                }
                let stats = media.process(unit, &mut report.log);
                report.media.inlined += stats.inlined;
                report.media.outlined += stats.outlined;
                report.media.missing += stats.missing;
            }
            unit.advance(UnitPhase::Postprocessed);

            let page = unit.content().map(|tree| {
                let page_path = unit.output_path();
                let html = template::render_page(
                    tree,
                    PageContext {
                        head: &globals.head,
                        path_to_root: unit.path_to_root(),
                        page_path: &page_path,
                        graph: self.config.graph.enabled,
                        search: features.search,
                        file_tree: file_tree.as_ref(),
                        backlinks: backlinks
                            .get(unit.source().key())
                            .map(Vec::as_slice)
                            .unwrap_or(&[]),
                    },
                );
                let entry = (features.search && !tree.is_placeholder())
                    .then(|| SearchEntry::from_tree(&page_path, tree));
                (html, entry)
            });
            if let Some((html, entry)) = page {
                match unit.set_document(html) {
                    Ok(()) => {
                        if let Some(entry) = entry {
                            search.insert(entry);
                        }
                    }
                    Err(e) => {
                        report
                            .log
                            .error("Page error", format!("{}: {e}", unit.source().key()));
                        unit.mark_failed();
                        report.failed += 1;
                    }
                }
            }
            unit.advance(UnitPhase::Collected);
            report.incremental.render();
        }
        surface.release();

        // Search
        if features.search {
            let listed: Vec<String> = units
                .iter()
                .filter(|u| matches!(u.status(), UnitStatus::Rendered | UnitStatus::Unchanged))
                .map(ExportUnit::output_path)
                .collect();
            search.retain_paths(listed.iter().map(String::as_str));
            match search.to_artifact() {
                Ok(artifact) => globals.artifacts.push(artifact),
                Err(e) => report.log.error("Search index not built", e.to_string()),
            }
            tracing::debug!(entries = search.len(), "search index assembled");
        }

        // Write
        let artifacts = dedup_artifacts(&mut units, globals.artifacts, &mut report.log);
        self.write_artifacts(&artifacts, fs, &mut report);

        // Collect
        if self.config.delete_old_files {
            let mut collector = StaleFileCollector::new(&self.output_root, fs);
            for unit in &units {
                collector.keep_all(unit.owned_paths());
            }
            collector.keep_all(artifacts.iter().map(Artifact::relative_path_string));
            match collector.collect(&mut report.log) {
                Ok(collected) => report.deleted = collected.deleted_files,
                Err(e) => report.log.error("Old files not removed", e.to_string()),
            }
        }

        // Manifest
        manifest.retain_sources(documents.iter().map(SourceDocument::key));
        for unit in &units {
            match unit.status() {
                UnitStatus::Rendered | UnitStatus::Unchanged => manifest.record(unit),
                UnitStatus::Placeholder | UnitStatus::Failed | UnitStatus::Pending => {
                    manifest.sources.remove(unit.source().key());
                }
            }
        }
        if let Err(e) = manifest.save(&self.output_root, fs) {
            report.log.error("Manifest not saved", e.to_string());
        }

        tracing::info!(
            written = report.written,
            unchanged = report.unchanged,
            deleted = report.deleted.len(),
            failed = report.failed,
            "export finished"
        );
        Ok(BuildOutcome::Completed(report))
    }

    /// The `graph-data.js` body, or `None` when disabled or unserializable.
    fn graph_script(
        &self,
        documents: &[SourceDocument],
        index: &dyn LinkIndex,
        log: &mut ExportLog,
    ) -> Option<String> {
        if !self.config.graph.enabled {
            return None;
        }
        match self.graph(documents, index).to_data().to_script() {
            Ok(script) => Some(script),
            Err(e) => {
                log.error("Graph not exported", e.to_string());
                None
            }
        }
    }

    /// Hex SHA-256 over everything every page depends on besides its source.
    fn output_key(
        &self,
        rules: &PathRules,
        head: &HeadAssets,
        file_tree: Option<&TreeFolder>,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
        let settings = format!(
            "{rules:?}\n{:?}\n{:?}\n{:?}\n{head:?}\n",
            self.config.assets, self.config.graph, self.config.features
        );
        hasher.update(settings.as_bytes());
        if let Some(tree) = file_tree {
            hasher.update(tree.fingerprint().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Create one unit per document, marking incrementally skipped ones.
    fn plan_units(
        &self,
        documents: &[SourceDocument],
        rules: &PathRules,
        manifest: &ExportManifest,
        backlinks: &BTreeMap<String, Vec<Backlink>>,
        fs: &dyn FileSystem,
        report: &mut BuildReport,
    ) -> Vec<ExportUnit> {
        documents
            .iter()
            .map(|document| {
                let destination = rules.destination_for(&document.path);
                let context_key = backlinks
                    .get(document.key())
                    .map(|links| navigation::backlinks_key(links))
                    .unwrap_or_default();
                let previous = manifest
                    .unchanged_entry(document, destination.as_str(), &self.output_root, fs)
                    .filter(|entry| entry.context_key == context_key);
                let mut unit = ExportUnit::new(document.clone(), rules, previous.is_none());
                unit.set_context_key(context_key);
                if let Some(entry) = previous {
                    tracing::debug!(unit = %document.path, "unchanged since last export");
                    unit.mark_unchanged(entry.outputs());
                    report.incremental.skip();
                }
                unit
            })
            .collect()
    }

    fn write_artifacts(&self, artifacts: &[Artifact], fs: &dyn FileSystem, report: &mut BuildReport) {
        let mut root = Address::new(&self.output_root.to_string_lossy());
        root.make_force_folder();
        for artifact in artifacts {
            match artifact.write(&root, fs) {
                Ok(WriteOutcome::Written) => report.written += 1,
                Ok(WriteOutcome::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    report.write_failures += 1;
                    report.log.error(
                        "Write failed",
                        format!("{}: {e}", artifact.relative_path_string()),
                    );
                }
            }
        }
    }
}

/// Unit artifacts in unit order followed by global assets, first occurrence
/// of each `(name, path)` winning. A later copy with different content is
/// reported.
fn dedup_artifacts(
    units: &mut [ExportUnit],
    globals: Vec<Artifact>,
    log: &mut ExportLog,
) -> Vec<Artifact> {
    let mut seen: HashMap<ArtifactKey, usize> = HashMap::new();
    let mut artifacts: Vec<Artifact> = Vec::new();
    let unit_artifacts = units.iter_mut().flat_map(|u| u.take_artifacts());
    for artifact in unit_artifacts.chain(globals) {
        let key = artifact.key();
        match seen.get(&key).copied() {
            None => {
                seen.insert(key, artifacts.len());
                artifacts.push(artifact);
            }
            Some(first) if artifacts[first].content() != artifact.content() => {
                log.warning(
                    "Duplicate output",
                    format!(
                        "{} is produced twice with different content, keeping the first",
                        artifact.relative_path_string()
                    ),
                );
            }
            Some(_) => {
                tracing::trace!(path = %artifact.relative_path_string(), "duplicate artifact dropped");
            }
        }
    }
    artifacts
}
