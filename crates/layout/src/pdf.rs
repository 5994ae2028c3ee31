use cardgen_core::Card;
use thiserror::Error;
use typst::layout::PagedDocument;
use typst_as_lib::typst_kit_options::TypstKitFontOptions;
use typst_as_lib::TypstEngine;
use typst_pdf::PdfOptions;

use crate::markup::render_typst;
use crate::page::PageSpec;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Typst compilation failed: {0}")]
    Compile(String),
    #[error("PDF export failed: {0}")]
    Export(String),
}

/// Compile a Typst document to PDF bytes. Fonts come from the system, with
/// Typst's bundled fonts as fallback when the requested family is missing.
pub fn compile_pdf(markup: &str) -> Result<Vec<u8>, LayoutError> {
    let engine = TypstEngine::builder()
        .main_file(markup.to_string())
        .search_fonts_with(TypstKitFontOptions::default())
        .build();

    let compiled: Result<PagedDocument, _> = engine.compile().output;
    let doc = compiled.map_err(|e| LayoutError::Compile(e.to_string()))?;

    typst_pdf::pdf(&doc, &PdfOptions::default()).map_err(|diagnostics| {
        let messages: Vec<String> = diagnostics.iter().map(|d| d.message.to_string()).collect();
        LayoutError::Export(messages.join("; "))
    })
}

/// Lay out the cards and compile them to PDF. `Ok(None)` when there are no cards.
pub fn render_pdf(cards: &[Card], spec: &PageSpec) -> Result<Option<Vec<u8>>, LayoutError> {
    render_typst(cards, spec)
        .map(|markup| compile_pdf(&markup))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cards_no_pdf() {
        assert!(render_pdf(&[], &PageSpec::default()).unwrap().is_none());
    }

    #[test]
    fn cards_compile_to_pdf() {
        let cards: Vec<Card> = (1..=5)
            .map(|i| Card::new(format!("{i} Elm St\n555-000{i}"), "Happy \"Birthday\" #1!"))
            .collect();
        let pdf = render_pdf(&cards, &PageSpec::default()).unwrap().unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn broken_markup_is_a_compile_error() {
        let err = compile_pdf("#table(").unwrap_err();
        assert!(matches!(err, LayoutError::Compile(_)));
    }
}
