mod client;
mod config;
mod error;
mod export;
mod extract;
mod library;
mod logging;
mod storage;
mod walker;

use crate::client::{Client, FileSource, PageSource};
use crate::config::Config;
use crate::error::Result;
use crate::extract::{ExtractedPage, Extractor};
use crate::library::{
    build_index, format_runs, library_status, merge_index, read_index, write_index, BookIndex,
    Navigator, ProgressTracker,
};
use crate::logging::{init_logging, LoggerConfig};
use crate::storage::FileStore;
use crate::walker::{TerminationReason, WalkOutcome, Walker};
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "novel-scraper", about = "Scrape web-novel chapters into a reading library")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract the chapters of a single page
    Extract {
        #[command(flatten)]
        page: PageArgs,
        /// Print the page snapshot and chapters as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract a single page and write it as a chapter file
    Export {
        #[command(flatten)]
        page: PageArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Follow "next chapter" links and export everything collected
    Walk {
        url: String,
        #[arg(short, long, value_parser = page_budget())]
        pages: Option<usize>,
        #[arg(long)]
        delay_ms: Option<u64>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Continue a walk that was suspended
    Resume {
        #[arg(short, long, value_parser = page_budget())]
        pages: Option<usize>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Merge a directory of chapter files into chapters.json
    Index {
        dir: PathBuf,
        #[arg(long, default_value = "Max Level Priest")]
        title: String,
        #[arg(long, default_value = "website/data/chapters.json")]
        out: PathBuf,
        /// Replace chapters that are already indexed
        #[arg(long)]
        force: bool,
        /// Ignore the existing index and start from scratch
        #[arg(long)]
        rebuild: bool,
    },
    /// Report the latest exported chapter and gaps in the numbering
    Status {
        /// Export directory (defaults to output_dir)
        dir: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Find chapters by title or number
    Search {
        query: String,
        #[arg(long, default_value = "website/data/chapters.json")]
        index: PathBuf,
    },
    /// Show or record reading progress for a book
    Progress {
        book: String,
        /// Record this chapter as the one being read
        #[arg(long)]
        chapter: Option<u32>,
        /// Scroll position in percent, for the recorded or current chapter
        #[arg(long)]
        scroll: Option<f64>,
        /// Index used to resolve the "continue reading" chapter
        #[arg(long, default_value = "website/data/chapters.json")]
        index: PathBuf,
    },
}

#[derive(Args)]
struct PageArgs {
    /// Page URL (also used to resolve relative links when reading from --file)
    #[arg(required_unless_present = "file")]
    url: Option<String>,
    /// Read a saved HTML page instead of fetching
    #[arg(long)]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config)?;
    init_logging(LoggerConfig::from_log_config(&config.logging)?)?;

    let extractor = Extractor::new(&config.site)?;

    match cli.command {
        Command::Extract { page, json } => {
            let page = extract_page(&config, &extractor, page).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                print_page(&page);
            }
        }
        Command::Export { page, out } => {
            let page = extract_page(&config, &extractor, page).await?;
            print_page(&page);
            let dir = out.unwrap_or_else(|| PathBuf::from(&config.output_dir));
            let path = export::write_export(&dir, &page.chapters)?;
            println!("Saved {}", path.display());
        }
        Command::Walk {
            url,
            pages,
            delay_ms,
            out,
        } => {
            let walker = build_walker(&config, extractor, delay_ms)?;
            let outcome = walker
                .walk(&url, pages.unwrap_or(config.max_pages))
                .await?;
            finish_walk(&config, outcome, out)?;
        }
        Command::Resume { pages, out } => {
            let walker = build_walker(&config, extractor, None)?;
            match walker.resume(pages).await? {
                Some(outcome) => finish_walk(&config, outcome, out)?,
                None => println!("No suspended walk in {}", config.state_file),
            }
        }
        Command::Index {
            dir,
            title,
            out,
            force,
            rebuild,
        } => {
            let scanned = build_index(&dir, &title)?;
            let existing = if rebuild { None } else { read_index(&out)? };
            let mut index = existing.unwrap_or_else(|| BookIndex::new(&title, Vec::new()));
            let summary = merge_index(&mut index, scanned.chapters, force);
            write_index(&index, &out)?;
            println!(
                "Added {}, updated {}, skipped {}; {} chapter(s) in {}",
                summary.added,
                summary.updated,
                summary.skipped,
                index.total_chapters,
                out.display()
            );
        }
        Command::Status { dir, json } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from(&config.output_dir));
            let status = library_status(&dir)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else if status.files.is_empty() {
                println!("No chapter files in {}", dir.display());
            } else {
                println!(
                    "{} file(s), {} chapter(s), latest chapter {}",
                    status.files.len(),
                    status.total_chapters,
                    status.latest
                );
                if !status.gaps.is_empty() {
                    println!("Missing: {}", format_runs(&status.gaps));
                }
            }
        }
        Command::Search { query, index } => match read_index(&index)? {
            Some(index) => {
                let nav = Navigator::new(&index);
                for chapter in nav.search(&query) {
                    println!("  Chapter {}: {}", chapter.id, chapter.title);
                }
            }
            None => println!("No index at {}", index.display()),
        },
        Command::Progress {
            book,
            chapter,
            scroll,
            index,
        } => show_progress(&config, &book, chapter, scroll, &index)?,
    }

    Ok(())
}

fn page_budget() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::new().range(1..)
}

fn http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .header("user-agent", &config.user_agent)?
        .header("accept-language", &config.accept_language)?
        .chrome_impersonation(true)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

async fn extract_page(config: &Config, extractor: &Extractor, args: PageArgs) -> Result<ExtractedPage> {
    let html = match &args.file {
        Some(path) => {
            let url = args.url.clone().unwrap_or_else(|| path.display().to_string());
            FileSource::new().with_page(&url, path).fetch(&url).await?
        }
        None => {
            let url = args.url.as_deref().unwrap_or_default();
            http_client(config)?.fetch(url).await?
        }
    };
    let url = args
        .url
        .or_else(|| args.file.map(|p| p.display().to_string()))
        .unwrap_or_default();
    Ok(extractor.extract_html(&html, &url))
}

fn build_walker(
    config: &Config,
    extractor: Extractor,
    delay_ms: Option<u64>,
) -> Result<Walker<Client, FileStore>> {
    let delay = Duration::from_millis(delay_ms.unwrap_or(config.delay_ms));
    Ok(
        Walker::new(http_client(config)?, FileStore::open(&config.state_file), extractor)
            .with_delay(delay)
            .stop_after(config.stop_after),
    )
}

fn finish_walk(config: &Config, outcome: WalkOutcome, out: Option<PathBuf>) -> Result<()> {
    for chapter in &outcome.chapters {
        println!("  Chapter {}: {}", chapter.id, chapter.title);
    }

    if outcome.termination == TerminationReason::NavigatedAway {
        println!(
            "Suspended after {} page(s) with {} chapter(s); run `resume` to continue",
            outcome.pages_processed,
            outcome.chapters.len()
        );
        return Ok(());
    }

    println!(
        "Walk finished ({:?}) after {} page(s)",
        outcome.termination, outcome.pages_processed
    );
    if outcome.chapters.is_empty() {
        log_warn!("[main] No chapters extracted, nothing to export");
        return Ok(());
    }
    let dir = out.unwrap_or_else(|| PathBuf::from(&config.output_dir));
    let path = export::write_export(&dir, &outcome.chapters)?;
    println!("Saved {} chapter(s) to {}", outcome.chapters.len(), path.display());
    Ok(())
}

fn show_progress(
    config: &Config,
    book: &str,
    chapter: Option<u32>,
    scroll: Option<f64>,
    index: &Path,
) -> Result<()> {
    let tracker = ProgressTracker::new(FileStore::open(&config.state_file), book);
    match (chapter, scroll) {
        (Some(id), scroll) => tracker.save(id, scroll.unwrap_or(0.0))?,
        (None, Some(scroll)) => tracker.save_scroll(scroll)?,
        (None, None) => {}
    }

    let progress = tracker.progress();
    match progress.last_chapter {
        Some(id) => println!("Last read chapter {} ({:.0}% scrolled)", id, progress.scroll_percent),
        None => println!("No reading progress for {}", book),
    }

    let index = match read_index(index) {
        Ok(index) => index,
        Err(e) => {
            log_warn!("[main] Ignoring unreadable index {}: {}", index.display(), e);
            None
        }
    };
    if let Some(index) = index {
        let nav = Navigator::new(&index);
        if let Some(target) = nav.continue_target(progress.last_chapter) {
            println!("Continue with chapter {}: {}", target.id, target.title);
        }
        if let Some(id) = progress.last_chapter {
            if let Some(previous) = nav.previous(id) {
                println!("Previous: chapter {}: {}", previous.id, previous.title);
            }
            if let Some(next) = nav.next(id) {
                println!("Next up: chapter {}: {}", next.id, next.title);
            }
        }
    }
    Ok(())
}

fn print_page(page: &ExtractedPage) {
    println!("{} ({})", page.snapshot.title, page.snapshot.url);
    for chapter in &page.chapters {
        println!(
            "  Chapter {}: {} ({} chars)",
            chapter.id,
            chapter.title,
            chapter.content.chars().count()
        );
    }
    if let Some(next) = &page.snapshot.next_chapter_url {
        println!("Next chapter: {}", next);
    }
}
