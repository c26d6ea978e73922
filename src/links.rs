//! Link and anchor resolution.
//!
//! Internal references arrive as `target[#header]` on `a.internal-link`
//! elements. Each one is resolved through the [`LinkIndex`], mapped to its
//! destination with the shared [`PathRules`], and rewritten as an href
//! relative to the page that contains it.
//!
//! Heading ids and fragment hrefs are both produced by [`anchor_slug`]; the
//! two must never drift apart or in-page links silently break.

use crate::address::Address;
use crate::content::ContentTree;
use crate::index::LinkIndex;
use crate::log::ExportLog;
use crate::naming::{PathRules, unix_address};
use percent_encoding::percent_decode_str;

/// Class marking anchors whose href is a vault reference.
pub const INTERNAL_LINK_CLASS: &str = "internal-link";

/// Normalize heading text into an anchor id: trimmed, whitespace becomes `_`.
pub fn anchor_slug(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// `#header` pointing into the current page.
    SameDocument(String),
    /// Relative href to another page.
    Resolved(String),
    Unresolved,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    pub resolved: usize,
    pub unresolved: usize,
}

pub struct LinkResolver<'a> {
    index: &'a dyn LinkIndex,
    rules: &'a PathRules,
}

impl<'a> LinkResolver<'a> {
    pub fn new(index: &'a dyn LinkIndex, rules: &'a PathRules) -> Self {
        Self { index, rules }
    }

    /// Resolve one reference found in `source` (vault-relative) whose page
    /// is written to `destination`.
    pub fn resolve(&self, reference: &str, source: &Address, destination: &Address) -> Resolution {
        if let Some(fragment) = reference.strip_prefix('#') {
            return Resolution::SameDocument(format!("#{}", anchor_slug(&decode(fragment))));
        }

        let (target, header) = match reference.split_once('#') {
            Some((target, header)) => (target, Some(header)),
            None => (reference, None),
        };
        let mut from = source.clone();
        from.make_unix_style();

        let Some(resolved) = self.index.resolve_reference(&decode(target), from.as_str()) else {
            return Resolution::Unresolved;
        };
        let target_destination = self.rules.destination_for(&unix_address(&resolved));
        let mut href = Address::relative_path(destination, &target_destination);
        href.make_unix_style();

        let mut href = href.as_str().to_string();
        if let Some(header) = header.filter(|h| !h.is_empty()) {
            href.push('#');
            href.push_str(&anchor_slug(&decode(header)));
        }
        Resolution::Resolved(href)
    }

    /// Rewrite every internal link and heading id in `tree`.
    ///
    /// Unresolvable references stay exactly as they were and produce one
    /// warning each.
    pub fn rewrite_tree(
        &self,
        tree: &mut ContentTree,
        source: &Address,
        destination: &Address,
        log: &mut ExportLog,
    ) -> LinkStats {
        let mut stats = LinkStats::default();
        tree.root.walk_mut(&mut |element| {
            if element.heading_level().is_some() {
                let text = element
                    .attr("data-heading")
                    .map(str::to_string)
                    .unwrap_or_else(|| element.text_content());
                element.set_attr("id", anchor_slug(&text));
                return;
            }
            if element.tag != "a" || !element.has_class(INTERNAL_LINK_CLASS) {
                return;
            }
            let Some(reference) = element
                .attr("data-href")
                .or_else(|| element.attr("href"))
                .map(str::to_string)
            else {
                return;
            };
            match self.resolve(&reference, source, destination) {
                Resolution::SameDocument(href) | Resolution::Resolved(href) => {
                    element.set_attr("href", href);
                    element.set_attr("target", "_self");
                    stats.resolved += 1;
                }
                Resolution::Unresolved => {
                    log.warning(
                        "Unresolved link",
                        format!("{}: no document matches \"{}\"", source, reference),
                    );
                    stats.unresolved += 1;
                }
            }
        });
        stats
    }
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Element, ViewKind};
    use crate::index::tests::MockIndex;
    use crate::log::Severity;
    use pretty_assertions::assert_eq;

    fn index() -> MockIndex {
        MockIndex::new()
            .with_target("B", "notes/B.md")
            .with_target("Deep Note", "notes/sub/Deep Note.md")
            .with_target("Top", "Top.md")
    }

    fn link(href: &str) -> Element {
        Element::new("a")
            .with_attr("href", href)
            .with_attr("class", INTERNAL_LINK_CLASS)
            .with_text(href)
    }

    // =========================================================================
    // anchor_slug
    // =========================================================================

    #[test]
    fn slug_replaces_whitespace() {
        assert_eq!(anchor_slug("  My Big\tHeading "), "My_Big_Heading");
        assert_eq!(anchor_slug("plain"), "plain");
    }

    // =========================================================================
    // resolve
    // =========================================================================

    #[test]
    fn fragment_only_is_same_document() {
        let idx = index();
        let rules = PathRules::default();
        let r = LinkResolver::new(&idx, &rules);
        let src = unix_address("notes/A.md");
        let dest = rules.destination_for(&src);
        assert_eq!(
            r.resolve("#Some Heading", &src, &dest),
            Resolution::SameDocument("#Some_Heading".into())
        );
        assert!(idx.get_lookups().is_empty());
    }

    #[test]
    fn sibling_document() {
        let idx = index();
        let rules = PathRules::default();
        let r = LinkResolver::new(&idx, &rules);
        let src = unix_address("notes/A.md");
        let dest = rules.destination_for(&src);
        assert_eq!(r.resolve("B", &src, &dest), Resolution::Resolved("B.html".into()));
        assert_eq!(idx.get_lookups(), vec![("B".to_string(), "notes/A.md".to_string())]);
    }

    #[test]
    fn nested_and_parent_documents() {
        let idx = index();
        let rules = PathRules::default();
        let r = LinkResolver::new(&idx, &rules);
        let src = unix_address("notes/A.md");
        let dest = rules.destination_for(&src);
        assert_eq!(
            r.resolve("Deep%20Note#Part Two", &src, &dest),
            Resolution::Resolved("sub/Deep Note.html#Part_Two".into())
        );
        assert_eq!(
            r.resolve("Top", &src, &dest),
            Resolution::Resolved("../Top.html".into())
        );
    }

    #[test]
    fn web_style_href() {
        let idx = index();
        let rules = PathRules::new("", false, true);
        let r = LinkResolver::new(&idx, &rules);
        let src = unix_address("notes/A.md");
        let dest = rules.destination_for(&src);
        assert_eq!(
            r.resolve("Deep Note", &src, &dest),
            Resolution::Resolved("sub/deep-note.html".into())
        );
    }

    #[test]
    fn resolved_href_ends_in_output_extension() {
        let idx = index();
        let rules = PathRules::new("notes", true, false);
        let r = LinkResolver::new(&idx, &rules);
        let src = unix_address("notes/A.md");
        let dest = rules.destination_for(&src);
        for target in ["B", "Deep Note", "Top"] {
            match r.resolve(target, &src, &dest) {
                Resolution::Resolved(href) => assert!(href.ends_with(".html"), "{href}"),
                other => panic!("{target} did not resolve: {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_target_is_unresolved() {
        let idx = index();
        let rules = PathRules::default();
        let r = LinkResolver::new(&idx, &rules);
        let src = unix_address("A.md");
        assert_eq!(r.resolve("Missing", &src, &src), Resolution::Unresolved);
    }

    // =========================================================================
    // rewrite_tree
    // =========================================================================

    #[test]
    fn rewrites_links_and_heading_ids() {
        let idx = index();
        let rules = PathRules::default();
        let r = LinkResolver::new(&idx, &rules);
        let src = unix_address("notes/A.md");
        let dest = rules.destination_for(&src);
        let root = Element::new("div")
            .with_child(Element::new("h2").with_text("Part Two"))
            .with_child(link("B#Part Two"))
            .with_child(Element::new("a").with_attr("href", "https://example.com"));
        let mut tree = ContentTree::new("A", ViewKind::Markdown, root);
        let mut log = ExportLog::new();

        let stats = r.rewrite_tree(&mut tree, &src, &dest, &mut log);
        assert_eq!(stats, LinkStats { resolved: 1, unresolved: 0 });
        assert!(log.is_empty());
        assert_eq!(
            tree.to_html(),
            "<div><h2 id=\"Part_Two\">Part Two</h2>\
             <a href=\"B.html#Part_Two\" class=\"internal-link\" target=\"_self\">B#Part Two</a>\
             <a href=\"https://example.com\"></a></div>"
        );
    }

    #[test]
    fn broken_link_is_untouched_with_one_warning() {
        let idx = index();
        let rules = PathRules::default();
        let r = LinkResolver::new(&idx, &rules);
        let src = unix_address("A.md");
        let dest = rules.destination_for(&src);
        let mut tree = ContentTree::new("A", ViewKind::Markdown, Element::new("p").with_child(link("Nowhere")));
        let before = tree.to_html();
        let mut log = ExportLog::new();

        let stats = r.rewrite_tree(&mut tree, &src, &dest, &mut log);
        assert_eq!(stats.unresolved, 1);
        assert_eq!(tree.to_html(), before);
        assert_eq!(log.count(Severity::Warning), 1);
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn data_heading_wins_over_text() {
        let idx = index();
        let rules = PathRules::default();
        let r = LinkResolver::new(&idx, &rules);
        let src = unix_address("A.md");
        let root = Element::new("div").with_child(
            Element::new("h1")
                .with_attr("data-heading", "Real Name")
                .with_text("Decorated ¶"),
        );
        let mut tree = ContentTree::new("A", ViewKind::Markdown, root);
        r.rewrite_tree(&mut tree, &src, &src, &mut ExportLog::new());
        assert_eq!(tree.headings()[0].id.as_deref(), Some("Real_Name"));
    }
}
