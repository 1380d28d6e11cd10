//! Document assembly: markdown-shaped text → structured rich document.
//!
//! A pure, synchronous transform with no state machine. Preserves heading
//! levels 1–4, nested bullet levels, inline bold/italic/code spans, and
//! pipe tables with a separator row. Tested in isolation from the async
//! engine.

use serde::{Deserialize, Serialize};

use draftmill_core::Section;

/// An inline run of styled text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Span {
    Text { text: String },
    Bold { text: String },
    Italic { text: String },
    Code { text: String },
}

/// One bullet entry; `depth` 0 is the outermost level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub depth: u8,
    pub spans: Vec<Span>,
}

/// A block-level element of the assembled document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    Paragraph { spans: Vec<Span> },
    List { items: Vec<ListItem> },
    Table { header: Vec<String>, rows: Vec<Vec<String>> },
}

/// The assembled user-facing document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RichDocument {
    pub blocks: Vec<Block>,
}

// ---------------------------------------------------------------------------
// Inline span parsing
// ---------------------------------------------------------------------------

/// Parse inline emphasis: `**bold**`, `*italic*`, `` `code` ``.
/// Unterminated markers are literal text.
pub fn parse_spans(text: &str) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    // kind: 0 = bold, 1 = italic, 2 = code
    while !rest.is_empty() {
        let bold_at = rest.find("**");
        let star_at = rest.find('*');
        let tick_at = rest.find('`');

        let mut best: Option<(usize, u8)> = None;
        let mut consider = |at: Option<usize>, kind: u8| {
            if let Some(i) = at {
                if best.map_or(true, |(j, _)| i < j) {
                    best = Some((i, kind));
                }
            }
        };
        consider(bold_at, 0);
        // A lone star at the bold marker's position is the bold marker.
        consider(star_at.filter(|i| Some(*i) != bold_at), 1);
        consider(tick_at, 2);

        let Some((at, kind)) = best else {
            literal.push_str(rest);
            break;
        };

        literal.push_str(&rest[..at]);
        let (open_len, close) = match kind {
            0 => (2, "**"),
            1 => (1, "*"),
            _ => (1, "`"),
        };
        let after = &rest[at + open_len..];

        match after.find(close) {
            Some(end) if end > 0 => {
                if !literal.is_empty() {
                    spans.push(Span::Text {
                        text: std::mem::take(&mut literal),
                    });
                }
                let inner = after[..end].to_string();
                spans.push(match kind {
                    0 => Span::Bold { text: inner },
                    1 => Span::Italic { text: inner },
                    _ => Span::Code { text: inner },
                });
                rest = &after[end + close.len()..];
            }
            _ => {
                // No closing marker (or empty emphasis) — keep it literal.
                literal.push_str(&rest[at..at + open_len]);
                rest = after;
            }
        }
    }

    if !literal.is_empty() {
        spans.push(Span::Text { text: literal });
    }
    spans
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

fn heading_line(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if (1..=4).contains(&hashes) {
        Some((hashes as u8, line[hashes..].trim()))
    } else {
        None
    }
}

fn bullet_line(line: &str) -> Option<(u8, &str)> {
    let indent = line.len() - line.trim_start().len();
    let trimmed = line.trim_start();
    let text = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))?;
    Some(((indent / 2) as u8, text.trim()))
}

/// A row made only of dashes, colons, pipes, and spaces is the table
/// header/body separator; it produces no row of its own.
fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| matches!(c, '-' | ':' | '|' | ' '))
}

/// A line containing a pipe that is not a heading or bullet is tentatively
/// a table row.
fn table_cells(line: &str) -> Option<Vec<String>> {
    if !line.contains('|') {
        return None;
    }
    let mut cells: Vec<&str> = line.split('|').map(str::trim).collect();
    // Outer pipes produce empty first/last cells; drop them.
    if cells.first() == Some(&"") {
        cells.remove(0);
    }
    if cells.last() == Some(&"") {
        cells.pop();
    }
    Some(cells.into_iter().map(String::from).collect())
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Assembler {
    blocks: Vec<Block>,
    table_rows: Vec<Vec<String>>,
    list_items: Vec<ListItem>,
    paragraph: Vec<String>,
}

impl Assembler {
    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.paragraph).join(" ");
        self.blocks.push(Block::Paragraph {
            spans: parse_spans(&text),
        });
    }

    fn flush_list(&mut self) {
        if self.list_items.is_empty() {
            return;
        }
        self.blocks.push(Block::List {
            items: std::mem::take(&mut self.list_items),
        });
    }

    fn flush_table(&mut self) {
        if self.table_rows.is_empty() {
            return;
        }
        let mut rows = std::mem::take(&mut self.table_rows);
        let header = rows.remove(0);
        self.blocks.push(Block::Table { header, rows });
    }

    fn flush_all(&mut self) {
        self.flush_paragraph();
        self.flush_list();
        self.flush_table();
    }
}

/// Assemble markdown-shaped text into a structured document.
pub fn assemble(text: &str) -> RichDocument {
    let mut asm = Assembler::default();

    for line in text.lines() {
        if line.trim().is_empty() {
            asm.flush_all();
            continue;
        }

        if is_separator_row(line) {
            // Separator between table header and body; no row emitted.
            // Checked before the bullet rule: "- | -" is a separator, not
            // a bullet.
            continue;
        }

        if let Some((level, title)) = heading_line(line) {
            asm.flush_all();
            asm.blocks.push(Block::Heading {
                level,
                spans: parse_spans(title),
            });
            continue;
        }

        if let Some((depth, item)) = bullet_line(line) {
            asm.flush_paragraph();
            asm.flush_table();
            asm.list_items.push(ListItem {
                depth,
                spans: parse_spans(item),
            });
            continue;
        }

        if let Some(cells) = table_cells(line) {
            asm.flush_paragraph();
            asm.flush_list();
            asm.table_rows.push(cells);
            continue;
        }

        // A non-table line ends any accumulated table before paragraph
        // processing continues.
        asm.flush_table();
        asm.flush_list();
        asm.paragraph.push(line.trim().to_string());
    }

    asm.flush_all();
    RichDocument { blocks: asm.blocks }
}

/// Assemble a completed stage's sections: each section title becomes a
/// level-2 heading followed by its assembled body.
pub fn assemble_sections(sections: &[Section]) -> RichDocument {
    let mut blocks = Vec::new();
    for section in sections {
        blocks.push(Block::Heading {
            level: 2,
            spans: parse_spans(&section.title),
        });
        blocks.extend(assemble(&section.body).blocks);
    }
    RichDocument { blocks }
}
