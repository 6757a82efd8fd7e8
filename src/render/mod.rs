//! Document rendering
//!
//! Pure functions turning a complete [`TravelPlan`](crate::models::TravelPlan)
//! into Markdown and HTML documents.

pub mod glyph;
pub mod html;
pub mod markdown;

pub use glyph::{step_glyph, visual_bar};
pub use html::{escape_html, render_html};
pub use markdown::render_markdown;
