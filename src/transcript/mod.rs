//! Transcript rendering and synchronization between a chat session
//! and a line-addressable text surface.
pub mod surface;
pub mod sync;

pub use surface::{ConsoleSurface, SharedSurface, Surface, TextSurface};
pub use sync::{
    SEPARATOR, drive, extract_pending_prompt, header_block, opening_block, parse_transcript,
    render_transcript,
};
