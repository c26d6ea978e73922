//! Site navigation: the file-tree sidebar and per-page backlinks.
//!
//! Both are computed once per build from the full document list, before any
//! page is rendered, so every page (rendered or skipped) agrees on them.
//!
//! ## File tree
//!
//! One folder per destination folder, one entry per exported page. Folders
//! come before pages; both sort case-insensitively. With `flatten_paths`
//! every page sits at the top level.
//!
//! ## Backlinks
//!
//! For each page, the other pages whose resolved links point at it, ordered
//! by title. Self links and links to or from non-page files are ignored.

use crate::naming::{self, PathRules};
use crate::unit::SourceDocument;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// A folder in the file tree. The root folder has an empty name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeFolder {
    pub name: String,
    pub folders: Vec<TreeFolder>,
    pub pages: Vec<TreePage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePage {
    pub title: String,
    /// Export-root-relative page path.
    pub path: String,
}

impl TreeFolder {
    fn child_mut(&mut self, name: &str) -> &mut TreeFolder {
        let idx = match self.folders.iter().position(|f| f.name == name) {
            Some(idx) => idx,
            None => {
                self.folders.push(TreeFolder {
                    name: name.to_string(),
                    ..TreeFolder::default()
                });
                self.folders.len() - 1
            }
        };
        &mut self.folders[idx]
    }

    fn sort(&mut self) {
        self.folders
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        self.pages.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.path.cmp(&b.path))
        });
        for folder in &mut self.folders {
            folder.sort();
        }
    }

    /// Pages in this folder and every folder below it.
    pub fn page_count(&self) -> usize {
        self.pages.len() + self.folders.iter().map(TreeFolder::page_count).sum::<usize>()
    }

    /// Hex SHA-256 over the tree's shape, titles and paths.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        self.hash_into(&mut hasher);
        format!("{:x}", hasher.finalize())
    }

    fn hash_into(&self, hasher: &mut Sha256) {
        hasher.update(b"d");
        hasher.update(self.name.as_bytes());
        hasher.update([0]);
        for folder in &self.folders {
            folder.hash_into(hasher);
        }
        for page in &self.pages {
            hasher.update(b"p");
            hasher.update(page.title.as_bytes());
            hasher.update([0]);
            hasher.update(page.path.as_bytes());
            hasher.update([0]);
        }
        hasher.update(b"u");
    }
}

/// Build the file tree over the convertible `documents`.
pub fn build_file_tree(documents: &[SourceDocument], rules: &PathRules) -> TreeFolder {
    let mut root = TreeFolder::default();
    let mut seen = BTreeSet::new();
    for document in documents.iter().filter(|d| naming::is_convertible(&d.path)) {
        let path = rules.destination_for(&document.path).as_str().to_string();
        if !seen.insert(path.clone()) {
            continue;
        }
        let mut segments: Vec<&str> = path.split('/').collect();
        segments.pop();
        let mut folder = &mut root;
        for segment in segments {
            folder = folder.child_mut(segment);
        }
        folder.pages.push(TreePage {
            title: document.title().to_string(),
            path: path.clone(),
        });
    }
    root.sort();
    tracing::debug!(pages = root.page_count(), "built file tree");
    root
}

/// A page linking to the current one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Backlink {
    pub title: String,
    /// Export-root-relative path of the linking page.
    pub path: String,
}

/// Backlinks per target source key, from resolved `(source, target)` links.
pub fn build_backlinks(
    documents: &[SourceDocument],
    links: &[(String, String)],
    rules: &PathRules,
) -> BTreeMap<String, Vec<Backlink>> {
    let pages: BTreeMap<&str, &SourceDocument> = documents
        .iter()
        .filter(|d| naming::is_convertible(&d.path))
        .map(|d| (d.key(), d))
        .collect();

    let mut collected: BTreeMap<String, BTreeSet<Backlink>> = BTreeMap::new();
    for (source, target) in links {
        if source == target || !pages.contains_key(target.as_str()) {
            continue;
        }
        let Some(linking) = pages.get(source.as_str()) else {
            continue;
        };
        collected.entry(target.clone()).or_default().insert(Backlink {
            title: linking.title().to_string(),
            path: rules.destination_for(&linking.path).as_str().to_string(),
        });
    }
    collected
        .into_iter()
        .map(|(target, set)| (target, set.into_iter().collect()))
        .collect()
}

/// Hex SHA-256 identifying a page's backlinks, `""` when there are none.
pub fn backlinks_key(backlinks: &[Backlink]) -> String {
    if backlinks.is_empty() {
        return String::new();
    }
    let mut hasher = Sha256::new();
    for link in backlinks {
        hasher.update(link.title.as_bytes());
        hasher.update([0]);
        hasher.update(link.path.as_bytes());
        hasher.update([b'\n']);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn docs(paths: &[&str]) -> Vec<SourceDocument> {
        paths.iter().map(|p| SourceDocument::new(p, 1, 1)).collect()
    }

    fn links(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    fn page(title: &str, path: &str) -> TreePage {
        TreePage {
            title: title.into(),
            path: path.into(),
        }
    }

    // =========================================================================
    // File tree
    // =========================================================================

    #[test]
    fn tree_mirrors_destination_folders() {
        let tree = build_file_tree(
            &docs(&["notes/b/Beta.md", "Home.md", "notes/Alpha.md", "img/cat.png"]),
            &PathRules::default(),
        );

        assert_eq!(tree.name, "");
        assert_eq!(tree.pages, vec![page("Home", "Home.html")]);
        assert_eq!(tree.folders.len(), 1);
        let notes = &tree.folders[0];
        assert_eq!(notes.name, "notes");
        assert_eq!(notes.pages, vec![page("Alpha", "notes/Alpha.html")]);
        assert_eq!(notes.folders[0].name, "b");
        assert_eq!(notes.folders[0].pages, vec![page("Beta", "notes/b/Beta.html")]);
        assert_eq!(tree.page_count(), 3);
    }

    #[test]
    fn tree_sorts_case_insensitively() {
        let tree = build_file_tree(
            &docs(&["zeta.md", "Alpha.md", "beta.md", "Zoo/x.md", "apps/y.md"]),
            &PathRules::default(),
        );
        let titles: Vec<&str> = tree.pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "beta", "zeta"]);
        let folders: Vec<&str> = tree.folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(folders, vec!["apps", "Zoo"]);
    }

    #[test]
    fn flattened_tree_has_no_folders() {
        let tree = build_file_tree(
            &docs(&["a/b/Deep.md", "c/Other.md"]),
            &PathRules::new("", true, false),
        );
        assert!(tree.folders.is_empty());
        assert_eq!(tree.pages.len(), 2);
    }

    #[test]
    fn tree_uses_export_root_and_web_style() {
        let tree = build_file_tree(
            &docs(&["vault/My Notes/Some Page.md"]),
            &PathRules::new("vault", false, true),
        );
        assert_eq!(tree.folders[0].name, "my-notes");
        assert_eq!(
            tree.folders[0].pages,
            vec![page("Some Page", "my-notes/some-page.html")]
        );
    }

    #[test]
    fn fingerprint_changes_with_pages() {
        let rules = PathRules::default();
        let before = build_file_tree(&docs(&["A.md", "B.md"]), &rules).fingerprint();
        let same = build_file_tree(&docs(&["B.md", "A.md"]), &rules).fingerprint();
        let after = build_file_tree(&docs(&["A.md", "B.md", "C.md"]), &rules).fingerprint();
        assert_eq!(before, same);
        assert_ne!(before, after);
        assert_eq!(before.len(), 64);
    }

    // =========================================================================
    // Backlinks
    // =========================================================================

    #[test]
    fn backlinks_collect_linking_pages() {
        let documents = docs(&["Home.md", "notes/A.md", "notes/B.md"]);
        let map = build_backlinks(
            &documents,
            &links(&[
                ("notes/B.md", "Home.md"),
                ("notes/A.md", "Home.md"),
                ("notes/A.md", "Home.md"),
                ("Home.md", "notes/A.md"),
            ]),
            &PathRules::default(),
        );

        assert_eq!(
            map["Home.md"],
            vec![
                Backlink {
                    title: "A".into(),
                    path: "notes/A.html".into()
                },
                Backlink {
                    title: "B".into(),
                    path: "notes/B.html".into()
                },
            ]
        );
        assert_eq!(map["notes/A.md"].len(), 1);
        assert!(!map.contains_key("notes/B.md"));
    }

    #[test]
    fn backlinks_ignore_self_and_non_page_links() {
        let documents = docs(&["A.md", "B.md", "pic.png"]);
        let map = build_backlinks(
            &documents,
            &links(&[("A.md", "A.md"), ("A.md", "pic.png"), ("Gone.md", "B.md")]),
            &PathRules::default(),
        );
        assert!(map.is_empty());
    }

    #[test]
    fn backlinks_key_tracks_content() {
        let one = vec![Backlink {
            title: "A".into(),
            path: "A.html".into(),
        }];
        let mut two = one.clone();
        two.push(Backlink {
            title: "B".into(),
            path: "B.html".into(),
        });
        assert_eq!(backlinks_key(&[]), "");
        assert_eq!(backlinks_key(&one), backlinks_key(&one.clone()));
        assert_ne!(backlinks_key(&one), backlinks_key(&two));
    }
}
