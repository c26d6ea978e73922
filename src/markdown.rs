//! Markdown and canvas rendering.
//!
//! [`MarkdownRenderer`] is the production [`DocumentRenderer`]: it reads a
//! source file from the vault, converts it with pulldown-cmark, and builds the
//! [`ContentTree`] the exporter post-processes. Rendering is synchronous, so a
//! render is complete as soon as `open` returns.
//!
//! ## Conversion
//!
//! | Markdown | Output |
//! |----------|--------|
//! | `[text](Other Note.md)`, `[[Other Note]]` | `<a class="internal-link" href="Other Note.md">` |
//! | `[text](https://...)` | `<a class="external-link" href="https://...">` |
//! | `# Heading` | `<h1 data-heading="Heading">` |
//! | `![alt](img.png)`, `![[img.png]]` | `<img src="img.png" alt="alt">` |
//! | YAML front matter | dropped |
//!
//! Canvas files are JSON; text cards are rendered as markdown and file cards
//! become internal links.

use crate::content::{ContentTree, Element, Node, ViewKind};
use crate::links::INTERNAL_LINK_CLASS;
use crate::renderer::{DocumentRenderer, RenderError, RenderHandle};
use crate::unit::SourceDocument;
use async_trait::async_trait;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd};
use std::path::PathBuf;

fn parser_options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    opts.insert(Options::ENABLE_WIKILINKS);
    opts
}

/// Whether a link destination points into the vault rather than the web.
pub fn is_internal_reference(dest: &str) -> bool {
    let dest = dest.trim();
    !dest.is_empty()
        && !dest.contains("://")
        && !dest.starts_with("mailto:")
        && !dest.starts_with("tel:")
        && !dest.starts_with("data:")
}

/// Internal link and embed destinations in a markdown document, in order.
pub fn extract_links(markdown: &str) -> Vec<String> {
    Parser::new_ext(markdown, parser_options())
        .filter_map(|event| match event {
            Event::Start(Tag::Link { dest_url, .. }) | Event::Start(Tag::Image { dest_url, .. })
                if is_internal_reference(&dest_url) && !dest_url.starts_with('#') =>
            {
                Some(dest_url.to_string())
            }
            _ => None,
        })
        .collect()
}

/// Internal references in a canvas file: file cards plus links inside text cards.
pub fn extract_canvas_links(json: &str) -> Vec<String> {
    let Ok(canvas) = serde_json::from_str::<serde_json::Value>(json) else {
        return Vec::new();
    };
    let mut links = Vec::new();
    for node in canvas["nodes"].as_array().into_iter().flatten() {
        match node["type"].as_str() {
            Some("file") => {
                if let Some(file) = node["file"].as_str() {
                    links.push(file.to_string());
                }
            }
            Some("text") => {
                links.extend(extract_links(node["text"].as_str().unwrap_or_default()));
            }
            _ => {}
        }
    }
    links
}

/// Render markdown into an element tree rooted at a `div`.
pub fn markdown_to_element(markdown: &str) -> Element {
    let mut converter = Converter::default();
    for event in Parser::new_ext(markdown, parser_options()) {
        converter.handle_event(event);
    }
    converter.finish()
}

/// Render canvas JSON into a grid of cards.
pub fn canvas_to_element(json: &str) -> Result<Element, serde_json::Error> {
    let canvas: serde_json::Value = serde_json::from_str(json)?;
    let mut root = Element::new("div").with_attr("class", "canvas");
    for node in canvas["nodes"].as_array().into_iter().flatten() {
        let mut card = Element::new("div").with_attr("class", "canvas-node");
        if let Some(id) = node["id"].as_str() {
            card.set_attr("data-node-id", id);
        }
        match node["type"].as_str() {
            Some("text") => {
                card.children
                    .push(Node::Element(markdown_to_element(node["text"].as_str().unwrap_or_default())));
            }
            Some("file") => {
                let file = node["file"].as_str().unwrap_or_default();
                card.children.push(Node::Element(
                    Element::new("a")
                        .with_attr("href", file)
                        .with_attr("class", INTERNAL_LINK_CLASS)
                        .with_text(file),
                ));
            }
            Some("link") => {
                let url = node["url"].as_str().unwrap_or_default();
                card.children.push(Node::Element(
                    Element::new("a")
                        .with_attr("href", url)
                        .with_attr("class", "external-link")
                        .with_text(url),
                ));
            }
            _ => continue,
        }
        root.children.push(Node::Element(card));
    }
    Ok(root)
}

enum Frame {
    Element(Element),
    /// Children are spliced into the parent.
    Transparent(Vec<Node>),
    /// Content is dropped (front matter).
    Skip,
}

#[derive(Default)]
struct Converter {
    stack: Vec<Frame>,
    root_children: Vec<Node>,
    in_table_head: bool,
}

impl Converter {
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.add_node(Node::Text(text.to_string())),
            Event::Code(code) => {
                self.add_node(Node::Element(Element::new("code").with_text(code.to_string())))
            }
            Event::Html(html) | Event::InlineHtml(html) => self.add_node(Node::Raw(html.to_string())),
            Event::SoftBreak => self.add_node(Node::Text("\n".into())),
            Event::HardBreak => self.add_node(Node::Element(Element::new("br"))),
            Event::Rule => self.add_node(Node::Element(Element::new("hr"))),
            Event::FootnoteReference(name) => {
                let link = Element::new("a")
                    .with_attr("href", format!("#fn-{name}"))
                    .with_text(format!("[{name}]"));
                self.add_node(Node::Element(
                    Element::new("sup").with_attr("class", "footnote-ref").with_child(link),
                ));
            }
            Event::TaskListMarker(checked) => {
                let mut input = Element::new("input")
                    .with_attr("type", "checkbox")
                    .with_attr("disabled", "");
                if checked {
                    input.set_attr("checked", "");
                }
                self.add_node(Node::Element(input));
            }
            Event::InlineMath(math) => self.add_node(Node::Element(
                Element::new("span").with_attr("class", "math").with_text(math.to_string()),
            )),
            Event::DisplayMath(math) => self.add_node(Node::Element(
                Element::new("div").with_attr("class", "math").with_text(math.to_string()),
            )),
        }
    }

    fn start_tag(&mut self, tag: Tag) {
        let frame = match tag {
            Tag::Paragraph => Frame::Element(Element::new("p")),
            Tag::Heading { level, .. } => Frame::Element(Element::new(heading_tag(level))),
            Tag::BlockQuote(_) => Frame::Element(Element::new("blockquote")),
            Tag::CodeBlock(kind) => {
                let mut code = Element::new("code");
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        code.set_attr("class", format!("language-{lang}"));
                    }
                }
                Frame::Element(code)
            }
            Tag::HtmlBlock => Frame::Transparent(Vec::new()),
            Tag::List(Some(start)) => {
                let mut ol = Element::new("ol");
                if start != 1 {
                    ol.set_attr("start", start.to_string());
                }
                Frame::Element(ol)
            }
            Tag::List(None) => Frame::Element(Element::new("ul")),
            Tag::Item => Frame::Element(Element::new("li")),
            Tag::FootnoteDefinition(name) => Frame::Element(
                Element::new("div")
                    .with_attr("class", "footnote")
                    .with_attr("id", format!("fn-{name}")),
            ),
            Tag::DefinitionList => Frame::Element(Element::new("dl")),
            Tag::DefinitionListTitle => Frame::Element(Element::new("dt")),
            Tag::DefinitionListDefinition => Frame::Element(Element::new("dd")),
            Tag::Table(_) => Frame::Element(Element::new("table")),
            Tag::TableHead => {
                self.in_table_head = true;
                self.stack.push(Frame::Element(Element::new("thead")));
                Frame::Element(Element::new("tr"))
            }
            Tag::TableRow => Frame::Element(Element::new("tr")),
            Tag::TableCell => {
                Frame::Element(Element::new(if self.in_table_head { "th" } else { "td" }))
            }
            Tag::Emphasis => Frame::Element(Element::new("em")),
            Tag::Strong => Frame::Element(Element::new("strong")),
            Tag::Strikethrough => Frame::Element(Element::new("del")),
            Tag::Superscript => Frame::Element(Element::new("sup")),
            Tag::Subscript => Frame::Element(Element::new("sub")),
            Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            } => {
                let mut a = Element::new("a").with_attr("href", dest_url.to_string());
                if is_internal_reference(&dest_url) || matches!(link_type, LinkType::WikiLink { .. })
                {
                    a.set_attr("class", INTERNAL_LINK_CLASS);
                } else {
                    a.set_attr("class", "external-link");
                }
                if !title.is_empty() {
                    a.set_attr("title", title.to_string());
                }
                Frame::Element(a)
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                let mut img = Element::new("img").with_attr("src", dest_url.to_string());
                if !title.is_empty() {
                    img.set_attr("title", title.to_string());
                }
                Frame::Element(img)
            }
            Tag::MetadataBlock(_) => Frame::Skip,
        };
        self.stack.push(frame);
    }

    fn end_tag(&mut self, tag: TagEnd) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame {
            Frame::Element(mut element) => {
                match element.tag.as_str() {
                    "img" => {
                        let alt = element.text_content();
                        element.children.clear();
                        element.set_attr("alt", alt);
                    }
                    "code" if matches!(tag, TagEnd::CodeBlock) => {
                        element = Element::new("pre").with_child(element);
                    }
                    _ if element.heading_level().is_some() => {
                        let text = element.text_content();
                        element.set_attr("data-heading", text.trim());
                    }
                    _ => {}
                }
                self.add_node(Node::Element(element));
                if matches!(tag, TagEnd::TableHead) {
                    self.in_table_head = false;
                    if let Some(Frame::Element(thead)) = self.stack.pop() {
                        self.add_node(Node::Element(thead));
                    }
                }
            }
            Frame::Transparent(children) => {
                for child in children {
                    self.add_node(child);
                }
            }
            Frame::Skip => {}
        }
    }

    fn add_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(Frame::Element(parent)) => parent.children.push(node),
            Some(Frame::Skip) => {}
            Some(Frame::Transparent(buffer)) => buffer.push(node),
            None => self.root_children.push(node),
        }
    }

    fn finish(self) -> Element {
        let mut root = Element::new("div").with_attr("class", "markdown-preview-view");
        root.children = self.root_children;
        root
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

/// Renders vault files with pulldown-cmark.
pub struct MarkdownRenderer {
    vault_root: PathBuf,
    next_handle: u64,
    open: Option<(RenderHandle, ContentTree)>,
}

impl MarkdownRenderer {
    pub fn new(vault_root: impl Into<PathBuf>) -> Self {
        Self {
            vault_root: vault_root.into(),
            next_handle: 0,
            open: None,
        }
    }

    fn render_source(&self, document: &SourceDocument) -> Result<ContentTree, RenderError> {
        let path = self.vault_root.join(document.path.as_str());
        let text = std::fs::read_to_string(&path).map_err(|e| RenderError::Open {
            path: document.key().to_string(),
            reason: e.to_string(),
        })?;
        match document.path.extension_name().to_ascii_lowercase().as_str() {
            "md" => Ok(ContentTree::new(
                document.title(),
                ViewKind::Markdown,
                markdown_to_element(&text),
            )),
            "canvas" => {
                let root = canvas_to_element(&text).map_err(|e| RenderError::Open {
                    path: document.key().to_string(),
                    reason: e.to_string(),
                })?;
                Ok(ContentTree::new(document.title(), ViewKind::Canvas, root))
            }
            other => Err(RenderError::UnsupportedKind(other.to_string())),
        }
    }
}

#[async_trait]
impl DocumentRenderer for MarkdownRenderer {
    async fn begin_batch(&mut self) -> Result<(), RenderError> {
        if !self.vault_root.is_dir() {
            return Err(RenderError::Unavailable(format!(
                "source folder {} does not exist",
                self.vault_root.display()
            )));
        }
        Ok(())
    }

    async fn open(&mut self, document: &SourceDocument) -> Result<RenderHandle, RenderError> {
        self.open = None;
        let tree = self.render_source(document)?;
        self.next_handle += 1;
        let handle = RenderHandle(self.next_handle);
        self.open = Some((handle, tree));
        Ok(handle)
    }

    fn poll_render_complete(&self, handle: RenderHandle) -> bool {
        self.open.as_ref().is_some_and(|(open, _)| *open == handle)
    }

    fn extract_content(&mut self, handle: RenderHandle) -> Result<ContentTree, RenderError> {
        match self.open.take() {
            Some((open, tree)) if open == handle => Ok(tree),
            _ => Err(RenderError::MissingContent(format!("handle {}", handle.0))),
        }
    }

    fn close(&mut self) {
        self.open = None;
    }
}
