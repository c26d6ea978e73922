//! Page templates.
//!
//! Every exported document becomes one standalone HTML page:
//!
//! ```text
//! <head>   title, styles (inline or linked), scripts (inline or linked)
//! <body>   sidebar: search box and file tree (each when enabled)
//!          header with title and theme toggle
//!          outline of the page's headings
//!          the rendered content tree
//!          footer with backlinks (when any page links here)
//!          graph canvas (when the graph is enabled)
//! ```
//!
//! Linked assets are addressed relative to the page through its path to the
//! export root, and every link inside the content is already page-relative,
//! so pages carry no `<base>` element and work from any folder or `file://`.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.

use crate::assets::{HeadAsset, HeadAssets};
use crate::content::{ContentTree, Heading, ViewKind};
use crate::naming::href_from_root;
use crate::navigation::{Backlink, TreeFolder};
use maud::{DOCTYPE, Markup, PreEscaped, html};

/// Everything a page needs besides its content.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub head: &'a HeadAssets,
    /// From the page back to the export root, `.` at the root.
    pub path_to_root: &'a str,
    /// Export-root-relative path of the page itself.
    pub page_path: &'a str,
    pub graph: bool,
    pub search: bool,
    pub file_tree: Option<&'a TreeFolder>,
    /// Pages linking here. Empty hides the footer.
    pub backlinks: &'a [Backlink],
}

/// Render a full HTML document for `tree`.
pub fn render_page(tree: &ContentTree, ctx: PageContext<'_>) -> String {
    let content = html! {
        @if ctx.search || ctx.file_tree.is_some() {
            (render_sidebar(ctx))
        }
        div.page {
            header.page-header {
                h1.page-title { (tree.title) }
                button.theme-toggle type="button" aria-label="Toggle theme" { "◐" }
            }
            (render_outline(&tree.headings()))
            article class=(view_class(tree)) {
                (PreEscaped(tree.to_html()))
            }
            @if !ctx.backlinks.is_empty() {
                (render_backlinks(ctx))
            }
            @if ctx.graph {
                div.graph-view-container {
                    canvas id="graph-canvas" {}
                }
            }
        }
    };
    base_document(&tree.title, ctx, content).into_string()
}

fn view_class(tree: &ContentTree) -> &'static str {
    if tree.is_placeholder() {
        return "view-content error-view";
    }
    match tree.kind {
        ViewKind::Markdown => "view-content markdown-view",
        ViewKind::Canvas => "view-content canvas-view",
        ViewKind::Other => "view-content",
    }
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(title: &str, ctx: PageContext<'_>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                @for asset in &ctx.head.styles {
                    @match asset {
                        HeadAsset::Inline(css) => style { (PreEscaped(css)) },
                        HeadAsset::Linked(_) => {
                            link rel="stylesheet" href=[asset.href(ctx.path_to_root)];
                        }
                    }
                }
                @for asset in &ctx.head.scripts {
                    @match asset {
                        HeadAsset::Inline(js) => script { (PreEscaped(js)) },
                        HeadAsset::Linked(_) => {
                            script src=[asset.href(ctx.path_to_root)] {}
                        }
                    }
                }
            }
            body.publish data-path-to-root=(ctx.path_to_root) data-page-path=(ctx.page_path) {
                (content)
            }
        }
    }
}

/// Table of contents built from the page's headings.
fn render_outline(headings: &[Heading]) -> Markup {
    html! {
        @if !headings.is_empty() {
            nav.outline {
                ul {
                    @for heading in headings {
                        li class={ "outline-item level-" (heading.level) } {
                            @match &heading.id {
                                Some(id) => a href={ "#" (id) } { (heading.text) },
                                None => span { (heading.text) },
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Search box and file tree.
fn render_sidebar(ctx: PageContext<'_>) -> Markup {
    html! {
        aside.sidebar {
            @if ctx.search {
                div.search-container {
                    input.search-input type="search" placeholder="Search..." aria-label="Search";
                    ul.search-results {}
                }
            }
            @if let Some(tree) = ctx.file_tree {
                nav.file-tree {
                    (render_tree_folder(tree, "", ctx))
                }
            }
        }
    }
}

/// One level of the file tree. Folders holding the current page start open.
fn render_tree_folder(folder: &TreeFolder, prefix: &str, ctx: PageContext<'_>) -> Markup {
    html! {
        ul.tree-list {
            @for child in &folder.folders {
                @let path = format!("{prefix}{}/", child.name);
                li.tree-folder {
                    details open[ctx.page_path.starts_with(&path)] {
                        summary.tree-folder-title { (child.name) }
                        (render_tree_folder(child, &path, ctx))
                    }
                }
            }
            @for page in &folder.pages {
                li.tree-page {
                    a.tree-link.is-active[page.path == ctx.page_path]
                        href=(href_from_root(ctx.path_to_root, &page.path)) {
                        (page.title)
                    }
                }
            }
        }
    }
}

fn render_backlinks(ctx: PageContext<'_>) -> Markup {
    html! {
        footer.page-footer {
            div.backlinks {
                h2.backlinks-title { "Backlinks" }
                ul.backlinks-list {
                    @for link in ctx.backlinks {
                        li {
                            a.internal-link href=(href_from_root(ctx.path_to_root, &link.path)) {
                                (link.title)
                            }
                        }
                    }
                }
            }
        }
    }
}
