mod clean;
mod document;
mod locate;
mod split;
mod title;

pub use clean::clean;
pub use document::{DocumentView, HtmlDocument, LinkScope, SiteSelectors};
pub use locate::{locate, LocatedContent};
pub use split::split;
pub use title::{parse_chapter_info, ChapterInfo};

use crate::config::SiteConfig;
use crate::error::Result;
pub use crate::log_info;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: u32,
    pub volume: u32,
    pub title: String,
    pub content: String,
}

/// What one page visit produced. `raw_text` is already cleaned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub title: String,
    pub url: String,
    pub raw_text: String,
    pub next_chapter_url: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedPage {
    pub snapshot: PageSnapshot,
    pub chapters: Vec<Chapter>,
}

/// Locates, cleans and splits a single page.
pub struct Extractor {
    site: SiteConfig,
    selectors: SiteSelectors,
}

impl Extractor {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        Ok(Self {
            site: site.clone(),
            selectors: SiteSelectors::new(site)?,
        })
    }

    pub fn extract_html(&self, html: &str, url: &str) -> ExtractedPage {
        let document = HtmlDocument::parse(html, url, &self.selectors);
        self.extract(&document, url)
    }

    pub fn extract<D: DocumentView + ?Sized>(&self, view: &D, url: &str) -> ExtractedPage {
        let located = locate(view, &self.site);
        let cleaned = clean(&located.raw_text);
        let chapters = split(&cleaned, &located.title);

        log_info!(
            "[extract] {} -> {} chapter(s), next: {}",
            located.title,
            chapters.len(),
            located.next_chapter_url.as_deref().unwrap_or("None")
        );

        ExtractedPage {
            snapshot: PageSnapshot {
                title: located.title,
                url: url.to_string(),
                raw_text: cleaned,
                next_chapter_url: located.next_chapter_url,
                extracted_at: Utc::now(),
            },
            chapters,
        }
    }
}
