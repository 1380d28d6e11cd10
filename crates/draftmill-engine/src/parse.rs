//! Response parsing: raw model text → ordered sections.
//!
//! A line opening with a level-1 or level-2 heading marker starts a new
//! section titled by the trimmed remainder of that line. Level 3+ headings
//! are body content — downstream selection operates on top-level sections
//! only. Text before the first heading belongs to no section; the caller
//! keeps the full text in `raw` for direct display.

use draftmill_core::Section;

/// Title of a section-opening heading, or `None` when the line is body.
fn heading_title(line: &str) -> Option<&str> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 2 {
        return None;
    }
    Some(line[hashes..].trim())
}

/// Split raw text into sections by heading detection. Ordering follows
/// appearance in the source; bodies are newline-joined and trimmed.
pub fn parse_sections(raw: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in raw.lines() {
        if let Some(title) = heading_title(line) {
            if let Some((title, body)) = current.take() {
                sections.push(Section::new(title, body.join("\n").trim().to_string()));
            }
            current = Some((title.to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
        // Pre-heading text falls through: not part of any section.
    }

    if let Some((title, body)) = current.take() {
        sections.push(Section::new(title, body.join("\n").trim().to_string()));
    }

    sections
}
