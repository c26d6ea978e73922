//! Per-document export state.
//!
//! An [`ExportUnit`] is created for each source at the start of a build. Its
//! destination is computed once from the source path and the [`PathRules`];
//! the orchestrator then fills in the rendered content and the artifacts the
//! unit owns (its own page first, followed by any media it outlined).

use crate::address::Address;
use crate::artifact::{Artifact, ArtifactError, ArtifactKind};
use crate::content::ContentTree;
use crate::naming::{self, PathRules};

/// A source file as the exporter sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Vault-relative, `/`-separated.
    pub path: Address,
    pub size: u64,
    pub modified_ms: u64,
}

impl SourceDocument {
    pub fn new(path: &str, size: u64, modified_ms: u64) -> Self {
        Self {
            path: naming::unix_address(path),
            size,
            modified_ms,
        }
    }

    pub fn title(&self) -> &str {
        self.path.base_name()
    }

    pub fn key(&self) -> &str {
        self.path.as_str()
    }
}

/// How the unit's page was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Pending,
    Rendered,
    /// Rendering failed; the page explains why.
    Placeholder,
    /// Skipped by incremental mode; previous output is kept.
    Unchanged,
    /// The page could not be assembled; nothing new was produced.
    Failed,
}

/// Where the unit is in the per-document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitPhase {
    Pending,
    Opened,
    Rendered,
    Postprocessed,
    Collected,
}

#[derive(Debug)]
pub struct ExportUnit {
    source: SourceDocument,
    destination: Address,
    path_to_root: String,
    content: Option<ContentTree>,
    artifacts: Vec<Artifact>,
    previous_outputs: Vec<String>,
    context_key: String,
    status: UnitStatus,
    phase: UnitPhase,
    part_of_batch: bool,
}

impl ExportUnit {
    pub fn new(source: SourceDocument, rules: &PathRules, part_of_batch: bool) -> Self {
        let destination = rules.destination_for(&source.path);
        let path_to_root = naming::path_to_root(&destination);
        Self {
            source,
            destination,
            path_to_root,
            content: None,
            artifacts: Vec::new(),
            previous_outputs: Vec::new(),
            context_key: String::new(),
            status: UnitStatus::Pending,
            phase: UnitPhase::Pending,
            part_of_batch,
        }
    }

    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    /// `/`-separated output path relative to the export root.
    pub fn output_path(&self) -> String {
        self.destination.as_str().to_string()
    }

    pub fn path_to_root(&self) -> &str {
        &self.path_to_root
    }

    /// Fingerprint of what the page shows from other documents (backlinks).
    pub fn context_key(&self) -> &str {
        &self.context_key
    }

    pub fn set_context_key(&mut self, key: String) {
        self.context_key = key;
    }

    pub fn part_of_batch(&self) -> bool {
        self.part_of_batch
    }

    pub fn status(&self) -> UnitStatus {
        self.status
    }

    pub fn phase(&self) -> UnitPhase {
        self.phase
    }

    /// Move forward in the pipeline. Phases never go backwards.
    pub fn advance(&mut self, phase: UnitPhase) {
        debug_assert!(phase >= self.phase, "{:?} after {:?}", phase, self.phase);
        tracing::trace!(unit = %self.source.path, ?phase, "unit phase");
        self.phase = phase;
    }

    pub fn content(&self) -> Option<&ContentTree> {
        self.content.as_ref()
    }

    pub fn content_mut(&mut self) -> Option<&mut ContentTree> {
        self.content.as_mut()
    }

    pub fn set_content(&mut self, tree: ContentTree) {
        self.status = if tree.is_placeholder() {
            UnitStatus::Placeholder
        } else {
            UnitStatus::Rendered
        };
        self.content = Some(tree);
    }

    /// Give up on this unit's page. Its artifacts are dropped.
    pub fn mark_failed(&mut self) {
        self.status = UnitStatus::Failed;
        self.artifacts.clear();
    }

    /// Keep the previous run's outputs instead of rendering.
    pub fn mark_unchanged(&mut self, previous_outputs: Vec<String>) {
        self.status = UnitStatus::Unchanged;
        self.previous_outputs = previous_outputs;
    }

    /// Outputs that must survive the stale-file pass without being rewritten.
    pub fn previous_outputs(&self) -> &[String] {
        &self.previous_outputs
    }

    /// Attach an owned artifact such as outlined media.
    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    /// Install the rendered page as the first owned artifact.
    pub fn set_document(&mut self, html: String) -> Result<(), ArtifactError> {
        let document = Artifact::new(
            self.destination.full_name(),
            html,
            self.destination.directory(),
            ArtifactKind::Document,
        )?
        .with_modified_time(self.source.modified_ms);
        self.artifacts
            .retain(|a| a.kind() != ArtifactKind::Document);
        self.artifacts.insert(0, document);
        Ok(())
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn take_artifacts(&mut self) -> Vec<Artifact> {
        std::mem::take(&mut self.artifacts)
    }

    /// Every relative path this unit is responsible for.
    pub fn owned_paths(&self) -> Vec<String> {
        if self.status == UnitStatus::Unchanged {
            return self.previous_outputs.clone();
        }
        let mut paths = vec![self.output_path()];
        paths.extend(
            self.artifacts
                .iter()
                .filter(|a| a.kind() != ArtifactKind::Document)
                .map(Artifact::relative_path_string),
        );
        paths
    }
}
