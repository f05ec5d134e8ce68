//! Observer TUI - Terminal view of a two-agent conversation
//!
//! A thin client over `observer-core`: the core decides what changes, this
//! crate keeps a copy of it and paints it.
//!
//! # Architecture
//!
//! - **Display**: Retained state built from render instructions
//! - **View**: Layout of panels, chat and history
//! - **Widgets**: Bottom-anchored scrolling chat
//! - **App**: Input, replay and reveal loop

pub mod app;
pub mod display;
pub mod theme;
pub mod view;
pub mod widgets;

pub use app::App;
pub use display::{DisplayState, TerminalSurface};
