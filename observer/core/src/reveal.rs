//! Text Reveal
//!
//! Typewriter-style reveal for a dialogue surface. Each surface owns exactly
//! one [`TextReveal`]; starting a new reveal invalidates the previous handle
//! before the new text begins, so at most one reveal runs per surface.
//!
//! The reveal does not own a clock. The surface driving it calls
//! [`TextReveal::advance`] on every tick.

/// Identifies one started reveal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealHandle {
    generation: u64,
}

/// Reveal progress of a single dialogue surface
#[derive(Clone, Debug, Default)]
pub struct TextReveal {
    text: String,
    total: usize,
    shown: usize,
    generation: u64,
    active: bool,
}

impl TextReveal {
    /// Create an idle reveal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin revealing `text`, cancelling whatever was running
    pub fn start(&mut self, text: impl Into<String>) -> RevealHandle {
        self.cancel();
        self.text = text.into();
        self.total = self.text.chars().count();
        self.shown = 0;
        self.active = true;
        self.handle()
    }

    /// Stop the running reveal; its handle goes stale
    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.active = false;
    }

    /// Handle of the current reveal
    #[must_use]
    pub fn handle(&self) -> RevealHandle {
        RevealHandle {
            generation: self.generation,
        }
    }

    /// Whether a reveal is running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Reveal `chars` more characters
    ///
    /// Returns the visible prefix, or `None` when `handle` is stale or the
    /// reveal already finished.
    pub fn advance(&mut self, handle: RevealHandle, chars: usize) -> Option<String> {
        if !self.active || handle != self.handle() {
            return None;
        }
        self.shown = (self.shown + chars).min(self.total);
        if self.shown == self.total {
            self.active = false;
        }
        Some(self.visible())
    }

    /// Characters revealed so far
    #[must_use]
    pub fn visible(&self) -> String {
        self.text.chars().take(self.shown).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reveal_runs_to_completion() {
        let mut reveal = TextReveal::new();
        let handle = reveal.start("hello");
        assert_eq!(reveal.advance(handle, 2).as_deref(), Some("he"));
        assert_eq!(reveal.advance(handle, 2).as_deref(), Some("hell"));
        assert_eq!(reveal.advance(handle, 2).as_deref(), Some("hello"));
        assert!(!reveal.is_active());
        assert_eq!(reveal.advance(handle, 2), None);
    }

    #[test]
    fn test_restart_invalidates_old_handle() {
        let mut reveal = TextReveal::new();
        let old = reveal.start("first line");
        reveal.advance(old, 3);
        let new = reveal.start("second");
        assert_ne!(old, new);
        assert_eq!(reveal.advance(old, 3), None);
        assert_eq!(reveal.advance(new, 3).as_deref(), Some("sec"));
    }

    #[test]
    fn test_cancel() {
        let mut reveal = TextReveal::new();
        let handle = reveal.start("abc");
        reveal.cancel();
        assert!(!reveal.is_active());
        assert_eq!(reveal.advance(handle, 1), None);
    }

    #[test]
    fn test_multibyte_text() {
        let mut reveal = TextReveal::new();
        let handle = reveal.start("¡Hola!");
        assert_eq!(reveal.advance(handle, 2).as_deref(), Some("¡H"));
    }
}
