//! Rendered document content.
//!
//! The renderer hands back a [`ContentTree`]: a small owned element tree that
//! the link resolver and the media pipeline rewrite in place before it is
//! serialized into the page template. Only what the exporter needs is
//! modelled: elements with ordered attributes, text, and raw HTML passed
//! through untouched.

use maud::Render;
use std::fmt::Write;

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Trusted HTML emitted verbatim.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Heading level for `h1`..`h6`.
    pub fn heading_level(&self) -> Option<u8> {
        match self.tag.as_str() {
            "h1" => Some(1),
            "h2" => Some(2),
            "h3" => Some(3),
            "h4" => Some(4),
            "h5" => Some(5),
            "h6" => Some(6),
            _ => None,
        }
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Visit this element and every descendant element, parents first.
    pub fn walk<F: FnMut(&Element)>(&self, f: &mut F) {
        f(self);
        for child in &self.children {
            if let Node::Element(e) = child {
                e.walk(f);
            }
        }
    }

    pub fn walk_mut<F: FnMut(&mut Element)>(&mut self, f: &mut F) {
        f(self);
        for child in &mut self.children {
            if let Node::Element(e) = child {
                e.walk_mut(f);
            }
        }
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            let _ = write!(out, " {name}=\"");
            value.as_str().render_to(out);
            out.push('"');
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&self.tag.as_str()) {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }
}

impl Node {
    fn write_html(&self, out: &mut String) {
        match self {
            Node::Element(e) => e.write_html(out),
            Node::Text(t) => t.as_str().render_to(out),
            Node::Raw(html) => out.push_str(html),
        }
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(&e.children, out),
            Node::Raw(_) => {}
        }
    }
}

/// A heading found in a content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub text: String,
    pub level: u8,
    pub id: Option<String>,
}

/// What kind of view produced the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Markdown,
    Canvas,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTree {
    pub title: String,
    pub kind: ViewKind,
    pub root: Element,
}

impl ContentTree {
    pub fn new(title: impl Into<String>, kind: ViewKind, root: Element) -> Self {
        Self {
            title: title.into(),
            kind,
            root,
        }
    }

    /// Minimal document explaining why a unit could not be rendered.
    pub fn error_placeholder(title: &str, reason: &str) -> Self {
        let root = Element::new("div")
            .with_attr("class", "export-error")
            .with_child(Element::new("h1").with_text(title))
            .with_child(
                Element::new("p").with_text("This document could not be exported."),
            )
            .with_child(Element::new("pre").with_text(reason));
        Self::new(title, ViewKind::Other, root)
    }

    pub fn is_placeholder(&self) -> bool {
        self.root.has_class("export-error")
    }

    pub fn headings(&self) -> Vec<Heading> {
        let mut headings = Vec::new();
        self.root.walk(&mut |e| {
            if let Some(level) = e.heading_level() {
                let text = e
                    .attr("data-heading")
                    .map(str::to_string)
                    .unwrap_or_else(|| e.text_content());
                headings.push(Heading {
                    text,
                    level,
                    id: e.attr("id").map(str::to_string),
                });
            }
        });
        headings
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.root.write_html(&mut out);
        out
    }
}
