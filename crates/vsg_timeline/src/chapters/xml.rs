//! Matroska chapter XML reading.
//!
//! Handles the format written by mkvextract:
//! ```xml
//! <Chapters>
//!   <EditionEntry>
//!     <ChapterAtom>
//!       <ChapterTimeStart>00:00:00.000000000</ChapterTimeStart>
//!       <ChapterTimeEnd>00:05:00.000000000</ChapterTimeEnd>
//!       <ChapterDisplay>
//!         <ChapterString>Chapter 1</ChapterString>
//!         <ChapterLanguage>eng</ChapterLanguage>
//!       </ChapterDisplay>
//!     </ChapterAtom>
//!   </EditionEntry>
//! </Chapters>
//! ```
//! Only the first edition is read.

use std::path::Path;

use super::types::Chapter;
use crate::error::ChapterError;

/// Parse `HH:MM:SS[.fraction]` into milliseconds.
pub fn parse_timestamp_ms(text: &str) -> Result<f64, ChapterError> {
    let invalid = || ChapterError::InvalidTimestamp(text.to_string());
    let mut parts = text.trim().split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let hours: u64 = h.parse().map_err(|_| invalid())?;
    let minutes: u64 = m.parse().map_err(|_| invalid())?;
    let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
    let seconds: u64 = whole.parse().map_err(|_| invalid())?;
    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    // Nanosecond precision; extra digits are dropped.
    let nanos: u64 = format!("{fraction:0<9}")[..9].parse().map_err(|_| invalid())?;

    let total_ns = hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(seconds))
        .and_then(|secs| secs.checked_mul(1_000_000_000))
        .and_then(|ns| ns.checked_add(nanos))
        .ok_or_else(invalid)?;
    Ok(total_ns as f64 / 1_000_000.0)
}

fn child_text<'a>(node: &roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .and_then(|n| n.text())
}

fn parse_atom(atom: &roxmltree::Node) -> Result<Option<Chapter>, ChapterError> {
    let Some(start) = child_text(atom, "ChapterTimeStart") else {
        tracing::warn!("[ChapterXml] ChapterAtom without ChapterTimeStart skipped");
        return Ok(None);
    };
    let start_ms = parse_timestamp_ms(start)?;
    let end_ms = child_text(atom, "ChapterTimeEnd")
        .map(parse_timestamp_ms)
        .transpose()?;
    let title = atom
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "ChapterDisplay")
        .and_then(|display| child_text(&display, "ChapterString"))
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok(Some(Chapter {
        start_ms,
        end_ms,
        title,
    }))
}

/// Parse chapter XML into chapters sorted by start time.
pub fn parse_chapter_xml(xml: &str) -> Result<Vec<Chapter>, ChapterError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| ChapterError::MalformedXml(format!("XML parse error: {e}")))?;

    let root = doc.root_element();
    if root.tag_name().name() != "Chapters" {
        return Err(ChapterError::MalformedXml(
            "Root element must be <Chapters>".to_string(),
        ));
    }

    let mut chapters = Vec::new();
    if let Some(edition) = root
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "EditionEntry")
    {
        for atom in edition
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "ChapterAtom")
        {
            if let Some(chapter) = parse_atom(&atom)? {
                chapters.push(chapter);
            }
        }
    }

    chapters.sort_by(|a, b| a.start_ms.total_cmp(&b.start_ms));
    tracing::debug!("[ChapterXml] Parsed {} chapters", chapters.len());
    Ok(chapters)
}

/// Read and parse a chapter XML file.
pub fn parse_chapter_file(path: &Path) -> Result<Vec<Chapter>, ChapterError> {
    let xml = std::fs::read_to_string(path).map_err(|source| ChapterError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_chapter_xml(&xml)
}
