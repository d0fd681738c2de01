//! Replays a prepared text one keystroke at a time, whatever keys are
//! actually pressed.

pub mod codegen;
pub mod command;
pub mod config;
pub mod llm;
pub mod render;
pub mod source;
pub mod state;
pub mod status_bar;
pub mod tui;
pub mod typing;
