//! ChatBlock Widget
//!
//! A borderless chat region anchored at the bottom, scrolled in lines from
//! the newest message.

use observer_core::ChatLine;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::StatefulWidget;
use textwrap::wrap;

use crate::theme::{category_style, DIM_GRAY};

/// Scroll state of a chat block
#[derive(Clone, Copy, Debug, Default)]
pub struct ChatScroll {
    /// Lines scrolled up from the bottom (0 = newest visible)
    pub offset: usize,
    /// Total wrapped lines at the last render
    pub total_lines: usize,
}

impl ChatScroll {
    /// Scroll towards older lines
    pub fn up(&mut self, lines: usize) {
        self.offset = (self.offset + lines).min(self.total_lines.saturating_sub(1));
    }

    /// Scroll towards newer lines
    pub fn down(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
    }

    /// Follow the newest line
    pub fn to_bottom(&mut self) {
        self.offset = 0;
    }
}

/// Chat lines, wrapped and colored by category
pub struct ChatBlock<'a> {
    lines: &'a [ChatLine],
}

impl<'a> ChatBlock<'a> {
    pub fn new(lines: &'a [ChatLine]) -> Self {
        Self { lines }
    }

    fn wrapped(&self, width: usize) -> Vec<(String, Style)> {
        let mut out = Vec::new();
        for line in self.lines {
            let style = category_style(line.category);
            let text = format!("{}: {}", line.sender, line.body);
            out.extend(wrap(&text, width).into_iter().map(|l| (l.into_owned(), style)));
            if let Some(hover) = &line.hover {
                let detail = format!("\u{21b3} \u{201c}{hover}\u{201d}");
                let dim = Style::default().fg(DIM_GRAY).add_modifier(Modifier::ITALIC);
                out.extend(wrap(&detail, width).into_iter().map(|l| (l.into_owned(), dim)));
            }
        }
        out
    }
}

impl StatefulWidget for ChatBlock<'_> {
    type State = ChatScroll;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let wrapped = self.wrapped(area.width as usize);
        let height = area.height as usize;

        state.total_lines = wrapped.len();
        let max_scroll = state.total_lines.saturating_sub(height);
        state.offset = state.offset.min(max_scroll);

        let end = state.total_lines - state.offset;
        let start = end.saturating_sub(height);

        for (i, (line, style)) in wrapped[start..end].iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let y = area.y + i as u16;
            buf.set_stringn(area.x, y, line, area.width as usize, *style);
        }
    }
}
