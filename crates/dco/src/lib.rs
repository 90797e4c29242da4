//! Creative assembly for campaign assets: aspect-ratio variants, hero
//! post-processing, text/logo composition and local compliance checks.

pub mod aspect;
pub mod bitmap_font;
pub mod compositor;
pub mod font;
pub mod governance;
pub mod post_process;

pub use aspect::{crop_region, AspectRatioTransformer, CropRegion};
pub use compositor::{place_text_block, Compositor, TextLayout, TextPlacement};
pub use font::TextFont;
pub use governance::ComplianceChecker;
pub use post_process::PostProcessor;
