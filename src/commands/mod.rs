//! Command-line command handlers for adaptive-lighting.
//!
//! Each command is implemented in its own submodule.

pub mod preview;
