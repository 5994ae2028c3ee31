use cardgen_core::Card;
use serde::{Deserialize, Serialize};

/// Cards printed on each sheet of paper, one per table row.
pub const CARDS_PER_PAGE: usize = 4;

/// Physical page geometry, in centimetres and points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    pub page_width_cm: f32,
    pub page_height_cm: f32,
    pub margin_cm: f32,
    pub column_width_cm: f32,
    /// Fixed row height; keeps long messages from pushing a row onto the next page.
    pub row_height_cm: f32,
    pub font: String,
    pub address_font_pt: f32,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            page_width_cm: 21.0,
            page_height_cm: 29.7,
            margin_cm: 1.0,
            column_width_cm: 9.5,
            row_height_cm: 6.75,
            font: "Arial".to_string(),
            address_font_pt: 10.5,
        }
    }
}

/// Message size steps down as the text gets longer.
pub fn message_font_pt(message: &str) -> f32 {
    match message.chars().count() {
        0..=29 => 16.0,
        30..=79 => 13.0,
        _ => 10.0,
    }
}

/// Split cards into pages of [`CARDS_PER_PAGE`], keeping order. The last page
/// may be short; no page is ever empty.
pub fn paginate(cards: &[Card]) -> Vec<&[Card]> {
    cards.chunks(CARDS_PER_PAGE).collect()
}
