pub mod braille;
pub mod overlay;
pub mod render;

pub use overlay::{connection_overlay, OverlayMessage, OverlayStyle};
pub use render::{render, Hud};
