use super::document::{DocumentView, LinkScope};
use crate::config::SiteConfig;
pub use crate::log_debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedContent {
    pub title: String,
    pub raw_text: String,
    pub next_chapter_url: Option<String>,
}

/// Finds the chapter title, body text and "next chapter" link on a page.
pub fn locate<D: DocumentView + ?Sized>(view: &D, site: &SiteConfig) -> LocatedContent {
    let title = view
        .heading_text()
        .or_else(|| view.document_title())
        .unwrap_or_default();

    let raw_text = match view.isolated_content_text() {
        Some(text) => text,
        None => {
            log_debug!("[locate] No isolated region, using fallback containers");
            view.fallback_content_text()
        }
    };

    let next_chapter_url = find_next_link(view, site);

    LocatedContent {
        title,
        raw_text,
        next_chapter_url,
    }
}

fn find_next_link<D: DocumentView + ?Sized>(view: &D, site: &SiteConfig) -> Option<String> {
    let labels: Vec<String> = site
        .next_link_labels
        .iter()
        .map(|l| l.to_lowercase())
        .collect();
    let is_next = |text: &str| labels.iter().any(|l| text.contains(l.as_str()));

    view.find_link_by_text(LinkScope::Isolated, &is_next)
        .or_else(|| view.find_link_by_text(LinkScope::Document, &is_next))
        .or_else(|| {
            // Last post link on the page is usually the next chapter.
            view.find_links_by_url_pattern(&site.post_url_pattern)
                .pop()
        })
}
