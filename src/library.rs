use crate::error::{ExportError, Result};
use crate::export::{import_xml, EXPORT_EXTENSION};
use crate::extract::Chapter;
use crate::storage::{load_json, save_json, KeyValueStore};
pub use crate::{log_error, log_info};
use chrono::Utc;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static EXPORT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ch(\d+)(?:_(\d+))?\.(?:vn\.)?txt$").expect("valid regex"));

/// Chapter data served to the reader, sorted by chapter id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookIndex {
    pub book_title: String,
    pub total_chapters: usize,
    pub chapters: Vec<Chapter>,
}

impl BookIndex {
    pub fn new(book_title: impl Into<String>, mut chapters: Vec<Chapter>) -> Self {
        chapters.sort_by_key(|c| c.id);
        Self {
            book_title: book_title.into(),
            total_chapters: chapters.len(),
            chapters,
        }
    }
}

/// Imports every `*.vn.txt` export in `dir`. Unreadable files are logged and skipped.
pub fn build_index<P: AsRef<Path>>(dir: P, book_title: &str) -> Result<BookIndex> {
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&dir.as_ref().to_string_lossy()),
        EXPORT_EXTENSION
    );
    let files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| ExportError::Malformed(format!("bad index pattern {}: {}", pattern, e)))?
        .filter_map(|entry| entry.ok())
        .collect();

    log_info!("[library] Found {} chapter file(s) in {}", files.len(), dir.as_ref().display());

    let parsed: Vec<(PathBuf, Result<Vec<Chapter>>)> = files
        .into_par_iter()
        .map(|path| {
            let chapters = fs::read_to_string(&path)
                .map_err(Into::into)
                .and_then(|xml| import_xml(&xml));
            (path, chapters)
        })
        .collect();

    let mut chapters = Vec::new();
    for (path, result) in parsed {
        match result {
            Ok(found) => {
                log_info!("[library] {} -> {} chapter(s)", path.display(), found.len());
                chapters.extend(found.into_iter().map(normalize_chapter));
            }
            Err(e) => log_error!(e => "[library] Skipping {}", path.display()),
        }
    }

    let index = BookIndex::new(book_title, chapters);
    if let (Some(first), Some(last)) = (index.chapters.first(), index.chapters.last()) {
        log_info!(
            "[library] Indexed {} chapter(s), range {} - {}",
            index.total_chapters,
            first.id,
            last.id
        );
    }
    Ok(index)
}

/// Reads a previously written index; `None` when the file does not exist yet.
pub fn read_index<P: AsRef<Path>>(path: P) -> Result<Option<BookIndex>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Adds `scanned` chapters to `index`. Ids already present are skipped unless `force`.
pub fn merge_index(index: &mut BookIndex, scanned: Vec<Chapter>, force: bool) -> MergeSummary {
    let mut by_id: BTreeMap<u32, Chapter> =
        index.chapters.drain(..).map(|c| (c.id, c)).collect();
    let mut summary = MergeSummary::default();

    for chapter in scanned {
        match by_id.entry(chapter.id) {
            Entry::Vacant(slot) => {
                slot.insert(chapter);
                summary.added += 1;
            }
            Entry::Occupied(mut slot) if force => {
                slot.insert(chapter);
                summary.updated += 1;
            }
            Entry::Occupied(_) => summary.skipped += 1,
        }
    }

    index.chapters = by_id.into_values().collect();
    index.total_chapters = index.chapters.len();
    log_info!(
        "[library] Merged: {} added, {} updated, {} skipped, {} total",
        summary.added,
        summary.updated,
        summary.skipped,
        index.total_chapters
    );
    summary
}

pub fn write_index<P: AsRef<Path>>(index: &BookIndex, path: P) -> Result<()> {
    if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(index)?;
    fs::write(path, json)?;
    Ok(())
}

/// Non-empty trimmed lines, separated by blank lines.
fn normalize_chapter(chapter: Chapter) -> Chapter {
    let content = chapter
        .content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    Chapter {
        title: chapter.title.trim().to_string(),
        content,
        ..chapter
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFile {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub size: u64,
}

/// Which chapters the export directory covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStatus {
    pub files: Vec<ExportFile>,
    pub total_chapters: usize,
    /// Highest chapter number on disk, 0 when there is none.
    pub latest: u32,
    /// Chapter numbers missing between the lowest and the highest.
    pub gaps: Vec<u32>,
}

/// Summarises the `ch<start>[_<end>]` files in `dir` by their names alone.
pub fn library_status<P: AsRef<Path>>(dir: P) -> Result<LibraryStatus> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(LibraryStatus::default());
    }

    let pattern = format!("{}/ch*.txt", glob::Pattern::escape(&dir.to_string_lossy()));
    let paths = glob::glob(&pattern)
        .map_err(|e| ExportError::Malformed(format!("bad status pattern {}: {}", pattern, e)))?
        .filter_map(|entry| entry.ok());

    let mut files = Vec::new();
    let mut covered = BTreeSet::new();
    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(caps) = EXPORT_NAME.captures(name) else {
            continue;
        };
        let Ok(start) = caps[1].parse::<u32>() else {
            continue;
        };
        let end = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(start);

        covered.extend(start..=end);
        files.push(ExportFile {
            name: name.to_string(),
            start,
            end,
            size: fs::metadata(&path)?.len(),
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));

    let gaps = match (covered.first(), covered.last()) {
        (Some(&low), Some(&high)) => (low..=high).filter(|ch| !covered.contains(ch)).collect(),
        _ => Vec::new(),
    };

    Ok(LibraryStatus {
        files,
        total_chapters: covered.len(),
        latest: covered.last().copied().unwrap_or(0),
        gaps,
    })
}

/// Renders sorted chapter numbers as runs, e.g. `3, 5-7`.
pub fn format_runs(ids: &[u32]) -> String {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for &id in ids {
        match runs.last_mut() {
            Some((_, end)) if id == *end + 1 => *end = id,
            _ => runs.push((id, id)),
        }
    }
    runs.iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{}-{}", start, end)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgress {
    #[serde(default)]
    pub last_chapter: Option<u32>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_read: i64,
    #[serde(default)]
    pub scroll_percent: f64,
}

/// Per-book reading progress kept in a [`KeyValueStore`].
pub struct ProgressTracker<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> ProgressTracker<S> {
    pub fn new(store: S, book_id: &str) -> Self {
        Self {
            store,
            key: format!("{}_progress", book_id),
        }
    }

    pub fn progress(&self) -> ReadingProgress {
        load_json(&self.store, &self.key)
    }

    /// Records that `chapter_id` was opened, scrolled to `scroll_percent`.
    pub fn save(&self, chapter_id: u32, scroll_percent: f64) -> Result<()> {
        let progress = ReadingProgress {
            last_chapter: Some(chapter_id),
            last_read: Utc::now().timestamp_millis(),
            scroll_percent: clamp_percent(scroll_percent),
        };
        save_json(&self.store, &self.key, &progress)
    }

    /// Updates only the scroll position of the current chapter.
    pub fn save_scroll(&self, scroll_percent: f64) -> Result<()> {
        let mut progress = self.progress();
        progress.scroll_percent = clamp_percent(scroll_percent);
        save_json(&self.store, &self.key, &progress)
    }
}

fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

/// Chapter lookup and prev/next navigation over an index.
pub struct Navigator<'a> {
    index: &'a BookIndex,
}

impl<'a> Navigator<'a> {
    pub fn new(index: &'a BookIndex) -> Self {
        Self { index }
    }

    pub fn chapter(&self, id: u32) -> Option<&'a Chapter> {
        self.index.chapters.iter().find(|c| c.id == id)
    }

    fn position(&self, id: u32) -> Option<usize> {
        self.index.chapters.iter().position(|c| c.id == id)
    }

    pub fn previous(&self, id: u32) -> Option<&'a Chapter> {
        let pos = self.position(id)?;
        pos.checked_sub(1).and_then(|p| self.index.chapters.get(p))
    }

    pub fn next(&self, id: u32) -> Option<&'a Chapter> {
        let pos = self.position(id)?;
        self.index.chapters.get(pos + 1)
    }

    /// Where "continue reading" leads: the last chapter read, else the first chapter.
    pub fn continue_target(&self, last_chapter: Option<u32>) -> Option<&'a Chapter> {
        last_chapter
            .and_then(|id| self.chapter(id))
            .or_else(|| self.index.chapters.first())
    }

    /// Chapters whose title or number contains `query`, case-insensitively.
    pub fn search(&self, query: &str) -> Vec<&'a Chapter> {
        let query = query.trim().to_lowercase();
        self.index
            .chapters
            .iter()
            .filter(|c| c.title.to_lowercase().contains(&query) || c.id.to_string().contains(&query))
            .collect()
    }
}
