pub mod markup;
pub mod page;
pub mod pdf;

pub use markup::render_typst;
pub use page::{message_font_pt, paginate, PageSpec, CARDS_PER_PAGE};
pub use pdf::{compile_pdf, render_pdf, LayoutError};
