//! Headless Render Surfaces
//!
//! - [`RecordingSurface`]: keeps every instruction, for tests and tooling
//! - [`LogSurface`]: reports every instruction through `tracing`

use crate::binder::{RenderOp, RenderSurface, Slot, TargetId};

/// Surface that records what it was told to draw
#[derive(Debug, Default)]
pub struct RecordingSurface {
    slots: Vec<Slot>,
    missing: Vec<Slot>,
    ops: Vec<(Slot, RenderOp)>,
    frames: usize,
}

impl RecordingSurface {
    /// A surface that resolves every slot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface lacking the given slots
    #[must_use]
    pub fn without(missing: &[Slot]) -> Self {
        Self {
            missing: missing.to_vec(),
            ..Self::default()
        }
    }

    /// Every instruction drawn so far, with its slot
    #[must_use]
    pub fn ops(&self) -> &[(Slot, RenderOp)] {
        &self.ops
    }

    /// Instructions drawn on one slot
    pub fn ops_for(&self, slot: Slot) -> impl Iterator<Item = &RenderOp> {
        self.ops
            .iter()
            .filter(move |(s, _)| *s == slot)
            .map(|(_, op)| op)
    }

    /// Frames presented so far
    #[must_use]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Forget recorded instructions and frames
    pub fn clear(&mut self) {
        self.ops.clear();
        self.frames = 0;
    }
}

impl RenderSurface for RecordingSurface {
    fn resolve(&mut self, slot: Slot) -> Option<TargetId> {
        if self.missing.contains(&slot) {
            return None;
        }
        let id = u32::try_from(self.slots.len()).ok()?;
        self.slots.push(slot);
        Some(TargetId(id))
    }

    fn draw(&mut self, target: TargetId, op: RenderOp) {
        if let Some(&slot) = self.slots.get(target.0 as usize) {
            self.ops.push((slot, op));
        }
    }

    fn present(&mut self) {
        self.frames += 1;
    }
}

/// Surface that logs instructions at debug level
#[derive(Debug, Default)]
pub struct LogSurface {
    slots: Vec<Slot>,
    drawn: usize,
    frames: usize,
}

impl LogSurface {
    /// Create a log surface
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instructions drawn so far
    #[must_use]
    pub fn drawn(&self) -> usize {
        self.drawn
    }

    /// Frames presented so far
    #[must_use]
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl RenderSurface for LogSurface {
    fn resolve(&mut self, slot: Slot) -> Option<TargetId> {
        let id = u32::try_from(self.slots.len()).ok()?;
        self.slots.push(slot);
        Some(TargetId(id))
    }

    fn draw(&mut self, target: TargetId, op: RenderOp) {
        let slot = self.slots.get(target.0 as usize);
        tracing::debug!(slot = ?slot, op = ?op, "render");
        self.drawn += 1;
    }

    fn present(&mut self) {
        self.frames += 1;
        tracing::trace!(frame = self.frames, "present");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;

    #[test]
    fn test_recording_resolves_in_order() {
        let mut surface = RecordingSurface::new();
        assert_eq!(surface.resolve(Slot::ChatLog), Some(TargetId(0)));
        assert_eq!(surface.resolve(Slot::Status), Some(TargetId(1)));
        surface.draw(TargetId(1), RenderOp::ChatClear);
        assert_eq!(surface.ops_for(Slot::Status).count(), 1);
    }

    #[test]
    fn test_recording_without() {
        let mut surface = RecordingSurface::without(&[Slot::Dialogue(AgentId(0))]);
        assert_eq!(surface.resolve(Slot::Dialogue(AgentId(0))), None);
        assert!(surface.resolve(Slot::Dialogue(AgentId(1))).is_some());
    }

    #[test]
    fn test_log_surface_counts() {
        let mut surface = LogSurface::new();
        let target = surface.resolve(Slot::ChatLog).unwrap();
        surface.draw(target, RenderOp::ChatClear);
        surface.present();
        assert_eq!(surface.drawn(), 1);
        assert_eq!(surface.frames(), 1);
    }
}
