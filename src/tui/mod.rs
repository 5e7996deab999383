//! TUI debugger for the Quack VM.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register and flag visualization
//! - Memory hex view
//! - Disassembly view with breakpoints
//! - The program's screen output in its own pane
//! - A key-forwarding mode for programs that read the keyboard

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
