use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static VOLUME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Vol\.?\s*(\d+)").expect("valid regex"));

static CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Chapter\s*(\d+)(?:\s*[-–]\s*(\d+))?").expect("valid regex")
});

/// Volume and chapter range parsed from a page title such as `[Vol. 9] Chapter 137-138`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterInfo {
    pub volume: u32,
    pub chapter_start: Option<u32>,
    pub chapter_end: Option<u32>,
}

pub fn parse_chapter_info(title: &str) -> ChapterInfo {
    let volume = VOLUME_RE
        .captures(title)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(1);

    let (chapter_start, chapter_end) = match CHAPTER_RE.captures(title) {
        Some(caps) => (
            caps[1].parse().ok(),
            caps.get(2).and_then(|m| m.as_str().parse().ok()),
        ),
        None => (None, None),
    };

    ChapterInfo {
        volume,
        chapter_start,
        chapter_end,
    }
}
