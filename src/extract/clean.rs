use regex::RegexSet;
use std::sync::LazyLock;

/// Lines shorter than this (in characters, after trimming) are noise.
const MIN_LINE_CHARS: usize = 3;

static BOILERPLATE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^>> Next Chapter",
        r"(?i)^<< Previous Chapter",
        r"(?i)^Support me",
        r"(?i)^Buy me a coffee",
        r"(?i)^Ko-fi",
        r"(?i)^See all$",
        r"(?i)^Terms$",
        r"(?i)^Privacy$",
        r"(?i)^\d+ comments?$",
        r"(?i)^Share$",
        r"(?i)^Like$",
        r"(?i)^Your page$",
        r"(?i)^Explore$",
        r"(?i)^Notifications$",
        r"(?i)^Chương tiếp",
        r"(?i)^Chương trước",
        r"(?i)^Chia sẻ$",
        r"(?i)^Thích$",
        r"(?i)^\d+ bình luận$",
    ])
    .expect("valid boilerplate patterns")
});

/// Drops blank, short and boilerplate lines, keeping paragraphs separated by a blank line.
pub fn clean(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() >= MIN_LINE_CHARS)
        .filter(|line| !is_boilerplate(line))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn is_boilerplate(line: &str) -> bool {
    BOILERPLATE.is_match(line.trim())
}
