use super::title::parse_chapter_info;
use super::Chapter;
use regex::Regex;
use std::sync::LazyLock;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[Vol\.\s*\d+\]\s*Chapter\s*(\d+):\s*([^\n]+)").expect("valid regex")
});

/// Splits page content into chapters at `[Vol. n] Chapter m: title` headings.
///
/// Chapters come out in text order. Content without any heading becomes a single
/// chapter numbered from the page title.
pub fn split(content: &str, title: &str) -> Vec<Chapter> {
    let info = parse_chapter_info(title);
    let fallback_id = info.chapter_start.unwrap_or(1);

    let headings: Vec<_> = HEADING_RE.captures_iter(content).collect();
    if headings.is_empty() {
        return vec![Chapter {
            id: fallback_id,
            volume: info.volume,
            title: title.to_string(),
            content: content.to_string(),
        }];
    }

    headings
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let end = headings
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(content.len(), |m| m.start());

            Chapter {
                id: caps[1].parse().unwrap_or(fallback_id),
                volume: info.volume,
                title: caps[2].trim().to_string(),
                content: content[whole.end..end].trim().to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: u32, volume: u32, title: &str, content: &str) -> Chapter {
        Chapter {
            id,
            volume,
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn splits_multi_chapter_page() {
        let content = "[Vol. 9] Chapter 137: Title A\nbody1\n[Vol. 9] Chapter 138: Title B\nbody2";
        let chapters = split(content, "[Vol. 9] Chapter 137-138");
        assert_eq!(
            chapters,
            vec![
                chapter(137, 9, "Title A", "body1"),
                chapter(138, 9, "Title B", "body2"),
            ]
        );
    }

    #[test]
    fn page_without_headings_is_one_chapter() {
        let chapters = split("no markers here", "Chapter 5");
        assert_eq!(chapters, vec![chapter(5, 1, "Chapter 5", "no markers here")]);
    }

    #[test]
    fn untitled_page_without_headings_defaults_to_one() {
        let chapters = split("just text", "Announcement");
        assert_eq!(chapters, vec![chapter(1, 1, "Announcement", "just text")]);
    }

    #[test]
    fn headings_are_case_insensitive() {
        let content = "[vol.2] CHAPTER 14:  Lowered \nText of fourteen.";
        let chapters = split(content, "Vol. 2 Chapter 14");
        assert_eq!(chapters, vec![chapter(14, 2, "Lowered", "Text of fourteen.")]);
    }

    #[test]
    fn out_of_order_headings_keep_text_order() {
        let content = "[Vol. 1] Chapter 9: Later\nnine\n\n[Vol. 1] Chapter 8: Earlier\neight";
        let ids: Vec<u32> = split(content, "Chapter 8-9").iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![9, 8]);
    }

    #[test]
    fn text_before_first_heading_is_dropped() {
        let content = "Translator note\n\n[Vol. 4] Chapter 40: Start\n\nBody text.";
        let chapters = split(content, "Chapter 40");
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].content, "Body text.");
    }

    #[test]
    fn heading_at_end_yields_empty_body() {
        let chapters = split("[Vol. 1] Chapter 3: Cliffhanger", "Chapter 3");
        assert_eq!(chapters, vec![chapter(3, 1, "Cliffhanger", "")]);
    }
}
