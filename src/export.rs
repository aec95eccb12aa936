//! The tagged chapter format consumed by the library builder:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <chapters>
//!   <chapter number="137" volume="9">
//!     <title>...</title>
//!     <text>...</text>
//!   </chapter>
//! </chapters>
//! ```

use crate::error::{ExportError, Result};
use crate::extract::Chapter;
pub use crate::log_info;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Extension shared by every exported chapter file.
pub const EXPORT_EXTENSION: &str = "vn.txt";

pub fn export_xml(chapters: &[Chapter]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<chapters>\n");

    for chapter in chapters {
        // Writing into a String cannot fail.
        let _ = write!(
            xml,
            "  <chapter number=\"{}\" volume=\"{}\">\n    <title>{}</title>\n    <text>{}</text>\n  </chapter>\n",
            chapter.id,
            chapter.volume,
            escape_xml(&chapter.title),
            escape_xml(&chapter.content),
        );
    }

    xml.push_str("</chapters>");
    xml
}

pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `ch<min>.vn.txt`, or `ch<min>_<max>.vn.txt` when the chapters span several ids.
pub fn export_filename(chapters: &[Chapter]) -> Option<String> {
    let min = chapters.iter().map(|c| c.id).min()?;
    let max = chapters.iter().map(|c| c.id).max()?;

    Some(if min == max {
        format!("ch{}.{}", min, EXPORT_EXTENSION)
    } else {
        format!("ch{}_{}.{}", min, max, EXPORT_EXTENSION)
    })
}

/// Writes `chapters` into `dir` under their derived file name.
pub fn write_export<P: AsRef<Path>>(dir: P, chapters: &[Chapter]) -> Result<PathBuf> {
    let filename = export_filename(chapters).ok_or(ExportError::Empty)?;
    fs::create_dir_all(dir.as_ref())?;

    let path = dir.as_ref().join(filename);
    fs::write(&path, export_xml(chapters))?;
    log_info!(
        "[export] Wrote {} chapter(s) to {}",
        chapters.len(),
        path.display()
    );
    Ok(path)
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Text,
}

#[derive(Default)]
struct PendingChapter {
    id: u32,
    volume: u32,
    title: String,
    content: String,
}

/// Parses an exported document back into chapters, in document order.
pub fn import_xml(xml: &str) -> Result<Vec<Chapter>> {
    let mut reader = Reader::from_str(xml);
    let mut chapters = Vec::new();
    let mut pending: Option<PendingChapter> = None;
    let mut field: Option<Field> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(&reader, e))?;

        match event {
            Event::Start(start) => match start.name().as_ref() {
                b"chapter" => pending = Some(chapter_attributes(&start)?),
                b"title" if pending.is_some() => field = Some(Field::Title),
                b"text" if pending.is_some() => field = Some(Field::Text),
                _ => {}
            },
            Event::Empty(start) if start.name().as_ref() == b"chapter" => {
                let empty = chapter_attributes(&start)?;
                chapters.push(Chapter {
                    id: empty.id,
                    volume: empty.volume,
                    title: String::new(),
                    content: String::new(),
                });
            }
            Event::Text(text) => {
                if let (Some(chapter), Some(field)) = (pending.as_mut(), field) {
                    let value = text.unescape().map_err(|e| malformed(&reader, e))?;
                    match field {
                        Field::Title => chapter.title.push_str(&value),
                        Field::Text => chapter.content.push_str(&value),
                    }
                }
            }
            Event::CData(data) => {
                if let (Some(chapter), Some(field)) = (pending.as_mut(), field) {
                    let value = String::from_utf8_lossy(&data);
                    match field {
                        Field::Title => chapter.title.push_str(&value),
                        Field::Text => chapter.content.push_str(&value),
                    }
                }
            }
            Event::End(end) => match end.name().as_ref() {
                b"title" | b"text" => field = None,
                b"chapter" => {
                    if let Some(done) = pending.take() {
                        chapters.push(Chapter {
                            id: done.id,
                            volume: done.volume,
                            title: done.title,
                            content: done.content,
                        });
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if pending.is_some() {
        return Err(ExportError::Malformed("unterminated <chapter>".to_string()).into());
    }
    Ok(chapters)
}

fn chapter_attributes(start: &BytesStart) -> Result<PendingChapter> {
    let mut id = None;
    let mut volume = None;

    for attr in start.attributes() {
        let attr = attr.map_err(|e| ExportError::Malformed(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| ExportError::Malformed(e.to_string()))?;
        match attr.key.as_ref() {
            b"number" => id = Some(parse_attribute("number", &value)?),
            b"volume" => volume = Some(parse_attribute("volume", &value)?),
            _ => {}
        }
    }

    Ok(PendingChapter {
        id: id.ok_or_else(|| ExportError::Malformed("<chapter> without number".to_string()))?,
        volume: volume.unwrap_or(1),
        ..Default::default()
    })
}

fn parse_attribute(name: &str, value: &str) -> Result<u32> {
    value.trim().parse().map_err(|_| {
        ExportError::InvalidAttribute {
            name: name.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

fn malformed(reader: &Reader<&[u8]>, e: impl std::fmt::Display) -> crate::error::AppError {
    ExportError::Malformed(format!("at byte {}: {}", reader.buffer_position(), e)).into()
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
    fn exports_documented_layout() {
        let xml = export_xml(&[chapter(137, 9, "Loot & <More>", "He said \"hi\" and 'bye'")]);
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<chapters>\n\
             \x20 <chapter number=\"137\" volume=\"9\">\n\
             \x20   <title>Loot &amp; &lt;More&gt;</title>\n\
             \x20   <text>He said &quot;hi&quot; and &apos;bye&apos;</text>\n\
             \x20 </chapter>\n</chapters>"
        );
    }

    #[test]
    fn empty_export_is_just_the_root() {
        assert_eq!(
            export_xml(&[]),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<chapters>\n</chapters>"
        );
    }

    #[test]
    fn import_recovers_exported_chapters() {
        let chapters = vec![
            chapter(5, 1, "A & B", "Line one.\n\n<Line> \"two\" 'quoted'"),
            chapter(3, 2, "Out of order", ""),
            chapter(6, 1, "Tiếng Việt", "Chương mới & cũ"),
        ];
        let imported = import_xml(&export_xml(&chapters)).unwrap();
        assert_eq!(imported, chapters);
    }

    #[test]
    fn import_accepts_hand_written_files() {
        let xml = r#"<chapters>
            <chapter number="12" volume="3"><title>T</title><text><![CDATA[raw <b>]]></text></chapter>
            <chapter number="13"/>
        </chapters>"#;
        let imported = import_xml(xml).unwrap();
        assert_eq!(
            imported,
            vec![chapter(12, 3, "T", "raw <b>"), chapter(13, 1, "", "")]
        );
    }

    #[test]
    fn import_rejects_bad_numbers_and_truncation() {
        assert!(import_xml(r#"<chapters><chapter number="x" volume="1"></chapter></chapters>"#).is_err());
        assert!(import_xml(r#"<chapters><chapter volume="1"></chapter></chapters>"#).is_err());
        assert!(import_xml(r#"<chapters><chapter number="1"><title>cut"#).is_err());
    }

    #[test]
    fn filename_covers_id_range() {
        let range = [chapter(5, 1, "", ""), chapter(6, 1, "", ""), chapter(7, 1, "", "")];
        assert_eq!(export_filename(&range).as_deref(), Some("ch5_7.vn.txt"));
        assert_eq!(
            export_filename(&[chapter(5, 1, "", "")]).as_deref(),
            Some("ch5.vn.txt")
        );
        assert_eq!(
            export_filename(&[chapter(9, 1, "", ""), chapter(2, 1, "", "")]).as_deref(),
            Some("ch2_9.vn.txt")
        );
        assert_eq!(export_filename(&[]), None);
    }

    #[test]
    fn write_export_creates_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let chapters = [chapter(10, 1, "Ten", "x"), chapter(11, 1, "Eleven", "y")];
        let path = write_export(dir.path().join("out"), &chapters).unwrap();

        assert_eq!(path.file_name().unwrap(), "ch10_11.vn.txt");
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(import_xml(&written).unwrap(), chapters);
        assert!(write_export(dir.path(), &[]).is_err());
    }
}
