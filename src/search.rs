//! Full-text search index.
//!
//! Every rendered page contributes one [`SearchEntry`]: its path, title,
//! headings and the distinct terms of its text. Terms are lower-cased words
//! with common English stop words removed. The index is written as
//! `lib/scripts/search-index.js`, a script assigning a global `searchIndex`
//! that the page script queries, so search works from `file://` too.
//!
//! The index is always linked, never inlined: its content depends on this
//! build's rendering, while page heads are fixed before rendering starts.
//!
//! Incremental builds load the previous index and replace only the entries
//! of pages rendered this run; entries of skipped pages carry over.

use crate::artifact::{Artifact, ArtifactError, ArtifactKind};
use crate::assets::SCRIPTS_DIR;
use crate::content::{ContentTree, Element, Node};
use crate::fs::FileSystem;
use crate::naming::unix_address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Export-root-relative location of the index script.
pub const SEARCH_INDEX_PATH: &str = "lib/scripts/search-index.js";

pub const SEARCH_INDEX_NAME: &str = "search-index.js";

const SCRIPT_PREFIX: &str = "let searchIndex=\n";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

/// Words too common to be worth indexing.
const STOP_WORDS: &[&str] = &[
    "a", "about", "actually", "almost", "also", "although", "always", "am", "an", "and", "any",
    "are", "as", "at", "be", "became", "become", "but", "by", "can", "could", "did", "do",
    "does", "each", "either", "else", "for", "from", "had", "has", "have", "hence", "how", "i",
    "if", "in", "is", "it", "its", "just", "may", "maybe", "me", "might", "mine", "must", "my",
    "neither", "nor", "not", "of", "oh", "ok", "the", "when", "where", "whereas", "wherever",
    "whenever", "whether", "which", "while", "who", "whom", "whoever", "whose", "why", "will",
    "with", "within", "without", "would", "yes", "yet", "you", "your",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    /// Export-root-relative page path.
    pub path: String,
    pub title: String,
    pub headers: Vec<String>,
    /// Distinct indexed terms, in order of first appearance.
    pub terms: Vec<String>,
}

impl SearchEntry {
    /// Entry for the page at `path` rendered from `tree`.
    pub fn from_tree(path: &str, tree: &ContentTree) -> Self {
        let headers: Vec<String> = tree.headings().into_iter().map(|h| h.text).collect();
        let mut words = vec![tree.title.as_str()];
        words.extend(headers.iter().map(String::as_str));
        collect_text(&tree.root, &mut words);
        let text = words.join(" ");
        Self {
            path: path.to_string(),
            title: tree.title.clone(),
            headers,
            terms: index_terms(&text),
        }
    }
}

/// Text nodes in document order, kept apart so adjacent blocks don't merge.
fn collect_text<'a>(element: &'a Element, out: &mut Vec<&'a str>) {
    for child in &element.children {
        match child {
            Node::Text(text) => out.push(text),
            Node::Element(e) => collect_text(e, out),
            Node::Raw(_) => {}
        }
    }
}

/// Lower-cased words of `text` minus stop words, each kept once.
pub fn index_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .filter(|word| seen.insert(word.clone()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub documents: BTreeMap<String, SearchEntry>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the index a previous build wrote. Missing or unreadable is empty.
    pub fn load(output_dir: &Path, fs: &dyn FileSystem) -> Self {
        let Ok(bytes) = fs.read(&output_dir.join(SEARCH_INDEX_PATH)) else {
            return Self::new();
        };
        match Self::from_script(&String::from_utf8_lossy(&bytes)) {
            Some(index) => index,
            None => {
                tracing::info!("ignoring unreadable search index");
                Self::new()
            }
        }
    }

    pub fn insert(&mut self, entry: SearchEntry) {
        self.documents.insert(entry.path.clone(), entry);
    }

    pub fn remove(&mut self, path: &str) {
        self.documents.remove(path);
    }

    /// Drop entries whose page is not in `paths`.
    pub fn retain_paths<'a>(&mut self, paths: impl IntoIterator<Item = &'a str>) {
        let keep: HashSet<&str> = paths.into_iter().collect();
        self.documents.retain(|path, _| keep.contains(path.as_str()));
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Script body assigning the index to a global `searchIndex`.
    pub fn to_script(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{SCRIPT_PREFIX}{};", serde_json::to_string(self)?))
    }

    /// The index script as a build artifact under `lib/scripts`.
    pub fn to_artifact(&self) -> Result<Artifact, SearchError> {
        let script = self.to_script()?;
        Ok(Artifact::new(
            SEARCH_INDEX_NAME,
            script,
            unix_address(SCRIPTS_DIR),
            ArtifactKind::Script,
        )?)
    }

    /// Parse a script produced by [`to_script`](Self::to_script).
    pub fn from_script(script: &str) -> Option<Self> {
        let json = script.strip_prefix(SCRIPT_PREFIX)?.strip_suffix(';')?;
        serde_json::from_str(json).ok()
    }
}
