use crate::client::PageSource;
use crate::error::Result;
use crate::extract::{parse_chapter_info, Chapter, Extractor};
use crate::storage::{load_json, save_json, KeyValueStore};
pub use crate::{log_error, log_info, log_warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Store key holding an unfinished walk.
pub const WALK_STATE_KEY: &str = "kofi_scraper_progress";

pub const DEFAULT_DELAY: Duration = Duration::from_millis(2000);

/// Progress of a walk, persisted after every page that has a successor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkState {
    /// Pages completed so far.
    pub current_index: usize,
    /// Page budget for the whole walk.
    pub total_count: usize,
    /// Page to process next; `None` once the chain ends.
    #[serde(default)]
    pub next_url: Option<String>,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    /// The page budget was used up.
    Completed,
    /// A page had no "next chapter" link.
    NoNextLink,
    /// The walk suspended with pages left; `resume` continues it.
    NavigatedAway,
}

#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub chapters: Vec<Chapter>,
    pub termination: TerminationReason,
    pub pages_processed: usize,
    pub next_url: Option<String>,
}

pub struct Walker<P, S> {
    source: P,
    store: S,
    extractor: Extractor,
    delay: Duration,
    stop_after: Option<usize>,
}

impl<P: PageSource, S: KeyValueStore> Walker<P, S> {
    pub fn new(source: P, store: S, extractor: Extractor) -> Self {
        Self {
            source,
            store,
            extractor,
            delay: DEFAULT_DELAY,
            stop_after: None,
        }
    }

    /// Pause between finishing one page and requesting the next.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Suspend after this many pages per invocation, leaving the rest to [`Walker::resume`].
    pub fn stop_after(mut self, pages: Option<usize>) -> Self {
        self.stop_after = pages;
        self
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Walks up to `max_pages` pages from `start_url`, discarding any unfinished walk.
    pub async fn walk(&self, start_url: &str, max_pages: usize) -> Result<WalkOutcome> {
        self.store.remove(WALK_STATE_KEY)?;
        log_info!("[walker] Starting walk of {} page(s) at {}", max_pages, start_url);

        let state = WalkState {
            current_index: 0,
            total_count: max_pages,
            next_url: Some(start_url.to_string()),
            chapters: Vec::new(),
        };
        self.run(state).await
    }

    /// Continues the persisted walk. `None` when nothing is pending.
    ///
    /// `max_pages` replaces the stored page budget when given.
    pub async fn resume(&self, max_pages: Option<usize>) -> Result<Option<WalkOutcome>> {
        let mut state: WalkState = load_json(&self.store, WALK_STATE_KEY);
        if let Some(max_pages) = max_pages {
            state.total_count = max_pages;
        }

        if state.next_url.is_none() || state.current_index >= state.total_count {
            log_info!("[walker] No pending walk to resume");
            return Ok(None);
        }

        log_info!(
            "[walker] Resuming at page {}/{} with {} chapter(s) collected",
            state.current_index + 1,
            state.total_count,
            state.chapters.len()
        );
        self.run(state).await.map(Some)
    }

    async fn run(&self, mut state: WalkState) -> Result<WalkOutcome> {
        let mut processed = 0;

        let termination = loop {
            if state.current_index >= state.total_count {
                break TerminationReason::Completed;
            }
            let Some(url) = state.next_url.take() else {
                break TerminationReason::NoNextLink;
            };

            log_info!(
                "[walker] [{}/{}] Processing {}",
                state.current_index + 1,
                state.total_count,
                url
            );
            let (chapters, next_url) = self.process_page(&url).await;
            state.chapters.extend(chapters);
            state.current_index += 1;
            state.next_url = next_url;
            processed += 1;

            if state.next_url.is_none() {
                log_warn!("[walker] No next chapter link on {}, stopping", url);
                break TerminationReason::NoNextLink;
            }
            if state.current_index >= state.total_count {
                break TerminationReason::Completed;
            }

            save_json(&self.store, WALK_STATE_KEY, &state)?;

            if self.stop_after.is_some_and(|limit| processed >= limit) {
                log_info!(
                    "[walker] Suspending after {} page(s); resume to continue",
                    processed
                );
                return Ok(WalkOutcome {
                    chapters: state.chapters,
                    termination: TerminationReason::NavigatedAway,
                    pages_processed: processed,
                    next_url: state.next_url,
                });
            }

            log_info!(
                "[walker] Waiting {}ms before the next chapter...",
                self.delay.as_millis()
            );
            tokio::time::sleep(self.delay).await;
        };

        self.store.remove(WALK_STATE_KEY)?;
        log_info!(
            "[walker] Finished ({:?}): {} page(s), {} chapter(s)",
            termination,
            processed,
            state.chapters.len()
        );

        Ok(WalkOutcome {
            chapters: state.chapters,
            termination,
            pages_processed: processed,
            next_url: state.next_url,
        })
    }

    /// Chapters and next link of one page. A failed fetch yields one empty chapter.
    async fn process_page(&self, url: &str) -> (Vec<Chapter>, Option<String>) {
        match self.source.fetch(url).await {
            Ok(html) => {
                let page = self.extractor.extract_html(&html, url);
                for chapter in &page.chapters {
                    log_info!(
                        "[walker]   Chapter {}: {} ({} chars)",
                        chapter.id,
                        chapter.title,
                        chapter.content.chars().count()
                    );
                }
                (page.chapters, page.snapshot.next_chapter_url)
            }
            Err(e) => {
                log_error!(e => "[walker] Failed to fetch {}", url);
                let info = parse_chapter_info(url);
                let placeholder = Chapter {
                    id: info.chapter_start.unwrap_or(1),
                    volume: info.volume,
                    title: url.to_string(),
                    content: String::new(),
                };
                (vec![placeholder], None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::error::{AppError, ClientError};
    use crate::storage::MemoryStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned pages and records every fetch.
    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, String>,
        fetched: Mutex<Vec<String>>,
    }

    impl FakeSite {
        fn page(mut self, url: &str, chapter: u32, next: Option<&str>) -> Self {
            let link = next
                .map(|n| format!(r#"<p><a href="{}">&gt;&gt; Next Chapter</a></p>"#, n))
                .unwrap_or_default();
            let html = format!(
                r#"<html><body><h1>[Vol. 2] Chapter {chapter}</h1>
                <div class="article-host"><template shadowrootmode="open">
                <div class="fr-view"><p>Body of chapter {chapter}.</p>{link}</div>
                </template></div></body></html>"#
            );
            self.pages.insert(url.to_string(), html);
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    impl PageSource for &FakeSite {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.fetched.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| {
                AppError::Client(ClientError::ResponseError {
                    status_code: 404,
                    url: url.to_string(),
                })
            })
        }
    }

    fn walker<'a>(site: &'a FakeSite) -> Walker<&'a FakeSite, MemoryStore> {
        let extractor = Extractor::new(&SiteConfig::default()).unwrap();
        Walker::new(site, MemoryStore::new(), extractor).with_delay(Duration::ZERO)
    }

    fn chain(len: u32) -> FakeSite {
        (1..=len).fold(FakeSite::default(), |site, n| {
            let next = (n < len).then(|| format!("https://ko-fi.com/post/{}", n + 1));
            site.page(&format!("https://ko-fi.com/post/{}", n), n, next.as_deref())
        })
    }

    fn ids(chapters: &[Chapter]) -> Vec<u32> {
        chapters.iter().map(|c| c.id).collect()
    }

    #[tokio::test]
    async fn stops_when_chain_runs_out_of_links() {
        let site = chain(2);
        let outcome = walker(&site)
            .walk("https://ko-fi.com/post/1", 3)
            .await
            .unwrap();

        assert_eq!(outcome.termination, TerminationReason::NoNextLink);
        assert_eq!(outcome.pages_processed, 2);
        assert_eq!(ids(&outcome.chapters), vec![1, 2]);
        assert_eq!(site.fetched().len(), 2);
    }

    #[tokio::test]
    async fn completes_when_page_budget_is_reached() {
        let site = chain(5);
        let walker = walker(&site);
        let outcome = walker.walk("https://ko-fi.com/post/1", 3).await.unwrap();

        assert_eq!(outcome.termination, TerminationReason::Completed);
        assert_eq!(ids(&outcome.chapters), vec![1, 2, 3]);
        assert_eq!(outcome.next_url.as_deref(), Some("https://ko-fi.com/post/4"));
        assert_eq!(walker.store().get(WALK_STATE_KEY), None);
    }

    #[tokio::test]
    async fn zero_page_budget_fetches_nothing() {
        let site = chain(3);
        let outcome = walker(&site)
            .walk("https://ko-fi.com/post/1", 0)
            .await
            .unwrap();

        assert_eq!(outcome.termination, TerminationReason::Completed);
        assert_eq!(outcome.pages_processed, 0);
        assert!(outcome.chapters.is_empty());
        assert_eq!(outcome.next_url.as_deref(), Some("https://ko-fi.com/post/1"));
        assert!(site.fetched().is_empty());
    }

    #[tokio::test]
    async fn suspends_and_resumes_from_persisted_state() {
        let site = chain(4);
        let walker = walker(&site).stop_after(Some(2));

        let first = walker.walk("https://ko-fi.com/post/1", 4).await.unwrap();
        assert_eq!(first.termination, TerminationReason::NavigatedAway);
        assert_eq!(ids(&first.chapters), vec![1, 2]);

        let state: WalkState = load_json(walker.store(), WALK_STATE_KEY);
        assert_eq!(state.current_index, 2);
        assert_eq!(state.total_count, 4);
        assert_eq!(state.next_url.as_deref(), Some("https://ko-fi.com/post/3"));

        let second = walker.resume(None).await.unwrap().unwrap();
        assert_eq!(second.termination, TerminationReason::NoNextLink);
        assert_eq!(ids(&second.chapters), vec![1, 2, 3, 4]);
        assert!(walker.resume(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_page_yields_empty_chapter() {
        let site = FakeSite::default().page(
            "https://ko-fi.com/post/1",
            1,
            Some("https://ko-fi.com/post/missing"),
        );
        let outcome = walker(&site)
            .walk("https://ko-fi.com/post/1", 5)
            .await
            .unwrap();

        assert_eq!(outcome.termination, TerminationReason::NoNextLink);
        assert_eq!(outcome.chapters.len(), 2);
        assert_eq!(outcome.chapters[1].content, "");
        assert_eq!(outcome.chapters[1].title, "https://ko-fi.com/post/missing");
    }

    #[tokio::test]
    async fn corrupt_state_has_nothing_to_resume() {
        let site = chain(1);
        let walker = walker(&site);
        walker.store().set(WALK_STATE_KEY, "{\"currentIndex\": ").unwrap();

        assert!(walker.resume(Some(3)).await.unwrap().is_none());
        assert!(site.fetched().is_empty());
    }

    #[tokio::test]
    async fn walk_discards_stale_state() {
        let site = chain(1);
        let walker = walker(&site);
        let stale = WalkState {
            current_index: 1,
            total_count: 9,
            next_url: Some("https://ko-fi.com/post/old".to_string()),
            chapters: vec![Chapter {
                id: 99,
                volume: 1,
                title: "old".to_string(),
                content: "old".to_string(),
            }],
        };
        save_json(walker.store(), WALK_STATE_KEY, &stale).unwrap();

        let outcome = walker.walk("https://ko-fi.com/post/1", 2).await.unwrap();
        assert_eq!(ids(&outcome.chapters), vec![1]);
    }
}
