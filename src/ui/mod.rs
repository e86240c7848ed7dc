//! Terminal UI: rendering and keyboard input.

pub mod input;
pub mod render;
pub mod styles;
