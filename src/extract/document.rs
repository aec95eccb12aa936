use crate::config::SiteConfig;
use crate::error::{Result, ScraperError};
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Which part of the page a link search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkScope {
    /// Only the encapsulated article region.
    Isolated,
    /// The whole document.
    Document,
}

/// Read-only view over a rendered page.
///
/// Extraction only talks to pages through this trait, so it can run against parsed
/// HTML, a browser bridge, or a test double.
pub trait DocumentView {
    /// Text of the first `h1`, else the first `h2`.
    fn heading_text(&self) -> Option<String>;

    /// The page's `<title>` metadata.
    fn document_title(&self) -> Option<String>;

    /// Rendered text of the encapsulated region, or `None` when the page has no such region.
    fn isolated_content_text(&self) -> Option<String>;

    /// Rendered text of the first conventional content container, else the body.
    fn fallback_content_text(&self) -> String;

    /// Destination of the first link in `scope` whose lowercased text satisfies `predicate`.
    fn find_link_by_text(&self, scope: LinkScope, predicate: &dyn Fn(&str) -> bool)
        -> Option<String>;

    /// Destinations of every link containing `pattern`, in document order.
    fn find_links_by_url_pattern(&self, pattern: &str) -> Vec<String>;
}

/// Selectors from [`SiteConfig`], parsed once.
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    host: Selector,
    content: Selector,
    fallbacks: Vec<Selector>,
    body: Selector,
    title: Selector,
    h1: Selector,
    h2: Selector,
    anchor: Selector,
}

impl SiteSelectors {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        Ok(Self {
            host: parse_selector(&site.host_selector)?,
            content: parse_selector(&site.content_selector)?,
            fallbacks: site
                .fallback_selectors
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<Vec<_>>>()?,
            body: parse_selector("body")?,
            title: parse_selector("title")?,
            h1: parse_selector("h1")?,
            h2: parse_selector("h2")?,
            anchor: parse_selector("a[href]")?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| ScraperError::SelectorError(format!("{}: {}", selector, e)).into())
}

/// [`DocumentView`] over a fetched HTML page.
///
/// The encapsulated region hangs off the configured host element. html5ever parses a
/// declarative `<template shadowrootmode>` straight into the host, so the host itself is the
/// region unless it still carries a legacy `<template shadowroot>`, whose content sits in a
/// template fragment. Document-scope searches never see inside the host.
pub struct HtmlDocument<'s> {
    document: Html,
    base_url: Option<Url>,
    selectors: &'s SiteSelectors,
}

impl<'s> HtmlDocument<'s> {
    pub fn parse(html: &str, url: &str, selectors: &'s SiteSelectors) -> Self {
        Self {
            document: Html::parse_document(html),
            base_url: Url::parse(url).ok(),
            selectors,
        }
    }

    fn host(&self) -> Option<ElementRef<'_>> {
        self.document.select(&self.selectors.host).next()
    }

    fn region(&self) -> Option<ElementRef<'_>> {
        let host = self.host()?;
        let template = host.children().filter_map(ElementRef::wrap).find(|el| {
            let value = el.value();
            value.name() == "template"
                && (value.attr("shadowroot").is_some() || value.attr("shadowrootmode").is_some())
        });
        Some(template.unwrap_or(host))
    }

    /// Text of the first element matching `selector`, even when it is blank.
    fn first_text(&self, selector: &Selector) -> Option<String> {
        self.document
            .select(selector)
            .next()
            .map(|el| collapse_whitespace(&render_text(el)))
    }

    fn resolve(&self, href: &str) -> String {
        self.base_url
            .as_ref()
            .and_then(|base| base.join(href).ok())
            .map(String::from)
            .unwrap_or_else(|| href.to_string())
    }

    fn link(&self, anchor: ElementRef<'_>) -> Option<(String, String)> {
        let href = anchor.value().attr("href")?;
        Some((render_text(anchor).to_lowercase(), self.resolve(href)))
    }

    /// `(lowercased text, resolved href)` for every link in the region.
    fn region_links(&self) -> Vec<(String, String)> {
        let Some(region) = self.region() else {
            return Vec::new();
        };
        region
            .select(&self.selectors.anchor)
            .filter_map(|a| self.link(a))
            .collect()
    }

    /// `(lowercased text, resolved href)` for every link outside the host.
    fn document_links(&self) -> Vec<(String, String)> {
        let host = self.host().map(|h| h.id());
        self.document
            .select(&self.selectors.anchor)
            .filter(|a| !host.is_some_and(|id| a.ancestors().any(|n| n.id() == id)))
            .filter_map(|a| self.link(a))
            .collect()
    }
}

impl DocumentView for HtmlDocument<'_> {
    fn heading_text(&self) -> Option<String> {
        self.first_text(&self.selectors.h1)
            .or_else(|| self.first_text(&self.selectors.h2))
    }

    fn document_title(&self) -> Option<String> {
        self.first_text(&self.selectors.title)
    }

    fn isolated_content_text(&self) -> Option<String> {
        let region = self.region()?;
        let text = match region.select(&self.selectors.content).next() {
            Some(content) => render_text(content),
            None => render_text(region),
        };
        Some(text)
    }

    fn fallback_content_text(&self) -> String {
        self.selectors
            .fallbacks
            .iter()
            .chain(std::iter::once(&self.selectors.body))
            .find_map(|selector| self.document.select(selector).next())
            .map(render_text)
            .unwrap_or_else(|| render_text(self.document.root_element()))
    }

    fn find_link_by_text(
        &self,
        scope: LinkScope,
        predicate: &dyn Fn(&str) -> bool,
    ) -> Option<String> {
        let links = match scope {
            LinkScope::Isolated => self.region_links(),
            LinkScope::Document => self.document_links(),
        };
        links
            .into_iter()
            .find(|(text, _)| predicate(text))
            .map(|(_, href)| href)
    }

    fn find_links_by_url_pattern(&self, pattern: &str) -> Vec<String> {
        self.document_links()
            .into_iter()
            .map(|(_, href)| href)
            .filter(|href| href.contains(pattern))
            .collect()
    }
}

const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "head"];

const BLOCKS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "blockquote", "pre",
    "section", "article", "header", "footer", "nav", "tr", "hr", "figure", "figcaption",
    "table", "main", "aside",
];

/// Approximates `innerText`: block elements and `<br>` break lines, inline whitespace collapses.
pub fn render_text(element: ElementRef) -> String {
    let mut out = String::new();
    push_children(element, &mut out, element.value().name() == "pre");
    out.trim().to_string()
}

fn push_children(element: ElementRef, out: &mut String, preformatted: bool) {
    for child in element.children() {
        if child.value().is_fragment() {
            // Template content lives under a fragment node.
            for inner in child.children() {
                push_node(inner.value(), ElementRef::wrap(inner), out, preformatted);
            }
        } else {
            push_node(child.value(), ElementRef::wrap(child), out, preformatted);
        }
    }
}

fn push_node(node: &Node, element: Option<ElementRef>, out: &mut String, preformatted: bool) {
    match node {
        Node::Text(text) => {
            if preformatted {
                out.push_str(text);
            } else {
                push_collapsed(text, out);
            }
        }
        Node::Element(el) => {
            let name = el.name();
            if SKIPPED.contains(&name) {
                return;
            }
            if name == "br" {
                out.push('\n');
                return;
            }
            let Some(element) = element else {
                return;
            };
            let block = BLOCKS.contains(&name);
            if block {
                break_line(out);
            }
            push_children(element, out, preformatted || name == "pre");
            if block {
                break_line(out);
            }
        }
        _ => {}
    }
}

fn push_collapsed(text: &str, out: &mut String) {
    let mut words = text.split_whitespace().peekable();
    if words.peek().is_none() {
        if !text.is_empty() && !out.ends_with([' ', '\n']) && !out.is_empty() {
            out.push(' ');
        }
        return;
    }
    if text.starts_with(char::is_whitespace) && !out.ends_with([' ', '\n']) && !out.is_empty() {
        out.push(' ');
    }
    let joined = words.collect::<Vec<_>>().join(" ");
    out.push_str(&joined);
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

fn break_line(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://ko-fi.com/post/Chapter-137-A1B2C3";

    fn selectors() -> SiteSelectors {
        SiteSelectors::new(&SiteConfig::default()).unwrap()
    }

    #[test]
    fn reads_designated_node_inside_shadow_root() {
        let selectors = selectors();
        let html = r#"<html><body>
            <h1> [Vol. 9] Chapter 137 </h1>
            <div class="article-host"><template shadowrootmode="open">
                <div class="fr-view"><p>First line.</p><p>Second <b>bold</b> line.</p></div>
                <p>outside content node</p>
            </template></div>
        </body></html>"#;
        let doc = HtmlDocument::parse(html, PAGE_URL, &selectors);

        assert_eq!(doc.heading_text().as_deref(), Some("[Vol. 9] Chapter 137"));
        assert_eq!(
            doc.isolated_content_text().as_deref(),
            Some("First line.\nSecond bold line.")
        );
    }

    #[test]
    fn shadow_root_without_content_node_uses_whole_region() {
        let selectors = selectors();
        let html = r#"<div class="article-host"><template shadowroot="open">
            <p>Alpha</p><p>Beta</p></template></div>"#;
        let doc = HtmlDocument::parse(html, PAGE_URL, &selectors);
        assert_eq!(doc.isolated_content_text().as_deref(), Some("Alpha\nBeta"));
    }

    #[test]
    fn page_without_host_is_not_isolated() {
        let selectors = selectors();
        let html = r#"<div class="post-body"><p>Plain</p></div>"#;
        let doc = HtmlDocument::parse(html, PAGE_URL, &selectors);
        assert_eq!(doc.isolated_content_text(), None);
        assert_eq!(doc.find_link_by_text(LinkScope::Isolated, &|_| true), None);
    }

    #[test]
    fn region_text_wins_over_outside_containers() {
        let selectors = selectors();
        let html = r#"<body>
            <div class="article-host"><template shadowrootmode="open">
                <div class="fr-view"><p>Inside shadow text.</p></div>
            </template></div>
            <div class="post-body">Outside text.</div>
        </body>"#;
        let doc = HtmlDocument::parse(html, PAGE_URL, &selectors);
        assert_eq!(doc.isolated_content_text().as_deref(), Some("Inside shadow text."));
        assert_eq!(doc.fallback_content_text(), "Outside text.");
    }

    #[test]
    fn document_scope_skips_links_inside_region() {
        let selectors = selectors();
        let html = r#"<body>
            <div class="article-host"><template shadowrootmode="open">
                <div class="fr-view"><p>Final chapter.</p>
                <a href="https://ko-fi.com/post/Chapter-199">&lt;&lt; Previous Chapter</a>
                <a href="/post/Chapter-201">Next Chapter</a></div>
            </template></div>
            <footer><a href="/about">About</a></footer>
        </body>"#;
        let doc = HtmlDocument::parse(html, PAGE_URL, &selectors);

        assert!(doc.find_links_by_url_pattern("ko-fi.com/post").is_empty());
        assert_eq!(
            doc.find_link_by_text(LinkScope::Document, &|t| t.contains("next chapter")),
            None
        );
        assert_eq!(
            doc.find_link_by_text(LinkScope::Isolated, &|t| t.contains("next chapter"))
                .as_deref(),
            Some("https://ko-fi.com/post/Chapter-201")
        );
    }

    #[test]
    fn blank_h1_still_wins_over_h2() {
        let selectors = selectors();
        let doc = HtmlDocument::parse("<body><h1> </h1><h2>Second</h2></body>", PAGE_URL, &selectors);
        assert_eq!(doc.heading_text().as_deref(), Some(""));
    }

    #[test]
    fn fallback_prefers_configured_containers_then_body() {
        let selectors = selectors();
        let html = r#"<body><nav>Menu</nav><div class="post-body">Story<br>More</div></body>"#;
        let doc = HtmlDocument::parse(html, PAGE_URL, &selectors);
        assert_eq!(doc.fallback_content_text(), "Story\nMore");

        let bare = HtmlDocument::parse("<body><p>Only body</p><script>x()</script></body>", PAGE_URL, &selectors);
        assert_eq!(bare.fallback_content_text(), "Only body");
    }

    #[test]
    fn heading_falls_back_to_h2_and_title() {
        let selectors = selectors();
        let doc = HtmlDocument::parse(
            "<html><head><title>Meta title</title></head><body><h2>Second</h2></body></html>",
            PAGE_URL,
            &selectors,
        );
        assert_eq!(doc.heading_text().as_deref(), Some("Second"));
        assert_eq!(doc.document_title().as_deref(), Some("Meta title"));
    }

    #[test]
    fn links_are_resolved_against_page_url() {
        let selectors = selectors();
        let html = r#"<body><a href="/post/Next-Z9">&gt;&gt; Next Chapter</a>
            <a href="https://ko-fi.com/post/Other">other</a></body>"#;
        let doc = HtmlDocument::parse(html, PAGE_URL, &selectors);

        let next = doc.find_link_by_text(LinkScope::Document, &|t| t.contains("next chapter"));
        assert_eq!(next.as_deref(), Some("https://ko-fi.com/post/Next-Z9"));
        assert_eq!(
            doc.find_links_by_url_pattern("ko-fi.com/post"),
            vec![
                "https://ko-fi.com/post/Next-Z9".to_string(),
                "https://ko-fi.com/post/Other".to_string(),
            ]
        );
        assert_eq!(
            doc.find_link_by_text(LinkScope::Isolated, &|_| true),
            None
        );
    }

    #[test]
    fn render_text_skips_scripts_and_keeps_pre() {
        let selectors = selectors();
        let html = "<body><p>a  b\n  c</p><style>p{}</style><pre>x\n  y</pre></body>";
        let doc = HtmlDocument::parse(html, PAGE_URL, &selectors);
        assert_eq!(doc.fallback_content_text(), "a b c\nx\n  y");
    }
}
