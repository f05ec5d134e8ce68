//! Theme and Colors
//!
//! One accent per seat so a glance at the chat log tells who spoke.

use observer_core::{AgentId, MessageCategory};
use ratatui::style::{Color, Modifier, Style};

// ============================================================================
// Seat Colors
// ============================================================================

/// Left agent - teal
pub const AGENT_LEFT: Color = Color::Rgb(94, 200, 190);

/// Right agent - amber
pub const AGENT_RIGHT: Color = Color::Rgb(240, 180, 90);

/// Any further seat
pub const AGENT_OTHER: Color = Color::Rgb(180, 160, 230);

// ============================================================================
// UI Colors
// ============================================================================

/// System/dim text
pub const DIM_GRAY: Color = Color::Rgb(100, 100, 100);

/// Labels
pub const LABEL_GRAY: Color = Color::Rgb(150, 150, 150);

/// Error red
pub const ERROR_RED: Color = Color::Rgb(255, 80, 80);

/// Success green
pub const SUCCESS_GREEN: Color = Color::Rgb(120, 230, 120);

/// Active stage marker
pub const ACTIVE_YELLOW: Color = Color::Rgb(255, 223, 128);

/// Accent color of a seat
pub fn seat_color(id: AgentId) -> Color {
    match id.0 {
        0 => AGENT_LEFT,
        1 => AGENT_RIGHT,
        _ => AGENT_OTHER,
    }
}

/// Style of a chat line
pub fn category_style(category: MessageCategory) -> Style {
    match category {
        MessageCategory::AgentLeft => Style::default().fg(AGENT_LEFT),
        MessageCategory::AgentRight => Style::default().fg(AGENT_RIGHT),
        MessageCategory::Error => Style::default().fg(ERROR_RED).add_modifier(Modifier::BOLD),
        MessageCategory::System => Style::default().fg(LABEL_GRAY),
    }
}
