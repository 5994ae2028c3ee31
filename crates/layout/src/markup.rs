use std::fmt::{self, Write as _};

use cardgen_core::Card;

use crate::page::{message_font_pt, paginate, PageSpec, CARDS_PER_PAGE};

/// Escape text for a Typst string literal.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' => {}
            '\t' => out.push(' '),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Cell body: each line as a string literal, separated by hard line breaks.
fn lines_markup(text: &str) -> String {
    text.lines()
        .map(|l| format!("#{}", quote(l)))
        .collect::<Vec<_>>()
        .join(" #linebreak() ")
}

fn write_preamble(doc: &mut String, spec: &PageSpec) -> fmt::Result {
    writeln!(
        doc,
        "#set page(width: {}cm, height: {}cm, margin: {}cm)",
        spec.page_width_cm, spec.page_height_cm, spec.margin_cm
    )?;
    writeln!(doc, "#set text(font: {})", quote(&spec.font))?;
    writeln!(doc)
}

fn write_page(doc: &mut String, cards: &[Card], spec: &PageSpec) -> fmt::Result {
    writeln!(doc, "#table(")?;
    writeln!(doc, "  columns: ({0}cm, {0}cm),", spec.column_width_cm)?;
    writeln!(doc, "  rows: {}cm,", spec.row_height_cm)?;
    writeln!(doc, "  stroke: none,")?;
    writeln!(
        doc,
        "  align: (x, y) => if x == 0 {{ left + horizon }} else {{ center + horizon }},"
    )?;
    for card in cards {
        writeln!(
            doc,
            "  text(size: {}pt)[{}],",
            spec.address_font_pt,
            lines_markup(&card.address)
        )?;
        writeln!(
            doc,
            "  text(size: {}pt)[{}],",
            message_font_pt(&card.message),
            lines_markup(&card.message)
        )?;
    }
    // Short last page keeps the same row grid.
    for _ in cards.len()..CARDS_PER_PAGE {
        writeln!(doc, "  [], [],")?;
    }
    writeln!(doc, ")")
}

fn write_document(doc: &mut String, cards: &[Card], spec: &PageSpec) -> fmt::Result {
    write_preamble(doc, spec)?;
    for (idx, page) in paginate(cards).into_iter().enumerate() {
        if idx > 0 {
            writeln!(doc, "#pagebreak()")?;
        }
        write_page(doc, page, spec)?;
    }
    Ok(())
}

/// Render cards as a Typst document: one two-column table per page, address on
/// the left, message centred on the right. Returns `None` for an empty list so
/// callers never write an empty document.
pub fn render_typst(cards: &[Card], spec: &PageSpec) -> Option<String> {
    if cards.is_empty() {
        return None;
    }
    let mut doc = String::new();
    write_document(&mut doc, cards, spec).ok()?;
    Some(doc)
}
