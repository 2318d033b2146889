//! PDF emission: content streams, embedded fonts and images.

mod content;
mod document;
mod fonts;
mod images;
mod resources;

pub use document::write_page;
pub use fonts::FontSet;
pub use images::ImageAsset;
pub use resources::PageResources;
