//! Display State
//!
//! The terminal's retained copy of what the core told it to draw.
//!
//! # Design Philosophy
//!
//! The TUI is a thin client. It never looks at agent records or pipelines
//! directly; it only applies [`RenderOp`]s to this state and paints the
//! result. Anything the core did not send is not on screen.

use std::collections::BTreeMap;

use observer_core::{
    AgentField, AgentId, ChatLine, HistoryCard, RenderOp, RenderSurface, Slot, TargetId,
    HISTORY_CAPACITY,
};

/// Session status line
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusDisplay {
    /// Whether a conversation is running
    pub active: bool,
    /// Status word
    pub label: String,
}

/// Pipeline indicator of one agent
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineDisplay {
    /// Stage names in order
    pub stages: Vec<String>,
    /// Index carrying the active marker
    pub active: Option<usize>,
    /// Summaries by stage index
    pub summaries: BTreeMap<usize, String>,
    /// Completion indicator
    pub completed: bool,
}

impl PipelineDisplay {
    /// Every stored summary in stage order, as `(index, stage, summary)`
    pub fn summary_lines(&self) -> impl Iterator<Item = (usize, &str, &str)> {
        self.summaries.iter().map(|(&index, summary)| {
            let stage = self.stages.get(index).map_or("", String::as_str);
            (index, stage, summary.as_str())
        })
    }
}

/// Dialogue bubble of one agent
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DialogueDisplay {
    /// Visible (possibly partial) text
    pub text: String,
    /// Emotion tag
    pub emotion: Option<String>,
}

/// Everything currently on screen
#[derive(Clone, Debug, Default)]
pub struct DisplayState {
    /// Status line
    pub status: StatusDisplay,
    /// Chat lines in order
    pub chat: Vec<ChatLine>,
    /// Panel field texts per agent
    pub panels: BTreeMap<AgentId, BTreeMap<AgentField, String>>,
    /// Pipeline indicators per agent
    pub pipelines: BTreeMap<AgentId, PipelineDisplay>,
    /// Dialogue bubbles per agent
    pub dialogues: BTreeMap<AgentId, DialogueDisplay>,
    /// History cards, newest first
    pub history: [Option<HistoryCard>; HISTORY_CAPACITY],
}

impl DisplayState {
    /// Create an empty display
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one render instruction addressed to `slot`
    pub fn apply(&mut self, slot: Slot, op: RenderOp) {
        match (slot, op) {
            (Slot::ChatLog, RenderOp::ChatAppend(line)) => self.chat.push(line),
            (Slot::ChatLog, RenderOp::ChatClear) => self.chat.clear(),

            (Slot::Status, RenderOp::SessionStatus { active, label }) => {
                self.status = StatusDisplay { active, label };
            }

            (Slot::AgentPanel(id), RenderOp::AgentField { field, text }) => {
                self.panels.entry(id).or_default().insert(field, text);
            }

            (Slot::Pipeline(id), RenderOp::PipelineRebuild { stages }) => {
                self.pipelines.insert(
                    id,
                    PipelineDisplay {
                        stages,
                        ..PipelineDisplay::default()
                    },
                );
            }
            (Slot::Pipeline(id), RenderOp::PipelineActive { index }) => {
                self.pipelines.entry(id).or_default().active = Some(index);
            }
            (Slot::Pipeline(id), RenderOp::PipelineSummary { index, summary }) => {
                self.pipelines
                    .entry(id)
                    .or_default()
                    .summaries
                    .insert(index, summary);
            }
            (Slot::Pipeline(id), RenderOp::PipelineCompleted(done)) => {
                self.pipelines.entry(id).or_default().completed = done;
            }

            (Slot::Dialogue(id), RenderOp::DialogueText { text, emotion }) => {
                self.dialogues.insert(id, DialogueDisplay { text, emotion });
            }

            (Slot::History(i), RenderOp::HistoryCard(card)) => {
                if let Some(entry) = self.history.get_mut(i) {
                    *entry = Some(card);
                }
            }

            (slot, op) => {
                tracing::debug!(slot = %slot, op = ?op, "Instruction has no meaning for slot");
            }
        }
    }

    /// Text of one panel field
    pub fn field(&self, id: AgentId, field: AgentField) -> Option<&str> {
        self.panels
            .get(&id)
            .and_then(|fields| fields.get(&field))
            .map(String::as_str)
    }
}

/// Render surface backed by [`DisplayState`]
#[derive(Debug, Default)]
pub struct TerminalSurface {
    slots: Vec<Slot>,
    state: DisplayState,
    dirty: bool,
    frames: u64,
}

impl TerminalSurface {
    /// Create an empty surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Current display state
    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// Whether a frame was presented since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Frames presented so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl RenderSurface for TerminalSurface {
    fn resolve(&mut self, slot: Slot) -> Option<TargetId> {
        let id = u32::try_from(self.slots.len()).ok()?;
        self.slots.push(slot);
        Some(TargetId(id))
    }

    fn draw(&mut self, target: TargetId, op: RenderOp) {
        match self.slots.get(target.0 as usize) {
            Some(&slot) => self.state.apply(slot, op),
            None => tracing::warn!(target = target.0, "Draw on unknown target"),
        }
    }

    fn present(&mut self) {
        self.dirty = true;
        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use observer_core::MessageCategory;
    use pretty_assertions::assert_eq;

    const LEFT: AgentId = AgentId(0);

    #[test]
    fn test_rebuild_discards_progress() {
        let mut state = DisplayState::new();
        state.apply(
            Slot::Pipeline(LEFT),
            RenderOp::PipelineRebuild {
                stages: vec!["a".into(), "b".into()],
            },
        );
        state.apply(Slot::Pipeline(LEFT), RenderOp::PipelineActive { index: 1 });
        state.apply(
            Slot::Pipeline(LEFT),
            RenderOp::PipelineSummary {
                index: 1,
                summary: "done".into(),
            },
        );
        assert_eq!(
            state.pipelines[&LEFT].summary_lines().collect::<Vec<_>>(),
            vec![(1, "b", "done")]
        );

        state.apply(
            Slot::Pipeline(LEFT),
            RenderOp::PipelineRebuild {
                stages: vec!["x".into()],
            },
        );
        assert_eq!(
            state.pipelines[&LEFT],
            PipelineDisplay {
                stages: vec!["x".into()],
                ..PipelineDisplay::default()
            }
        );
    }

    #[test]
    fn test_chat_append_and_clear() {
        let mut state = DisplayState::new();
        let line = ChatLine {
            category: MessageCategory::AgentLeft,
            sender: "Ada".into(),
            body: "hi".into(),
            hover: None,
        };
        state.apply(Slot::ChatLog, RenderOp::ChatAppend(line.clone()));
        assert_eq!(state.chat, vec![line]);
        state.apply(Slot::ChatLog, RenderOp::ChatClear);
        assert!(state.chat.is_empty());
    }

    #[test]
    fn test_mismatched_slot_is_ignored() {
        let mut state = DisplayState::new();
        state.apply(Slot::Status, RenderOp::ChatClear);
        state.apply(
            Slot::History(HISTORY_CAPACITY),
            RenderOp::HistoryCard(HistoryCard {
                prompt: String::new(),
                step: String::new(),
                response: String::new(),
                elapsed: String::new(),
            }),
        );
        assert!(state.history.iter().all(Option::is_none));
    }

    #[test]
    fn test_surface_marks_dirty_on_present() {
        let mut surface = TerminalSurface::new();
        let target = surface.resolve(Slot::AgentPanel(LEFT)).unwrap();
        surface.draw(
            target,
            RenderOp::AgentField {
                field: AgentField::Name,
                text: "Ada".into(),
            },
        );
        assert!(!surface.take_dirty());
        surface.present();
        assert!(surface.take_dirty());
        assert!(!surface.take_dirty());
        assert_eq!(surface.state().field(LEFT, AgentField::Name), Some("Ada"));
    }
}
