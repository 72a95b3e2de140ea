//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout; protected pages go through the `AccessGate`
//! - `input`: keyboard and mouse handling
//! - `styles`: color scheme and text styling

pub mod input;
pub mod render;
pub mod styles;
