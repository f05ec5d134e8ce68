//! Widgets

pub mod chat_block;

pub use chat_block::{ChatBlock, ChatScroll};

use unicode_width::UnicodeWidthChar;

/// Cut `text` to at most `width` terminal cells
pub fn fit_width(text: &str, width: usize) -> String {
    let mut used = 0;
    text.chars()
        .take_while(|c| {
            used += c.width().unwrap_or(0);
            used <= width
        })
        .collect()
}
