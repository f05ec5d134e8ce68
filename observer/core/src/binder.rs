//! Display Binder
//!
//! The core never draws. It addresses named [`Slot`]s and describes what
//! should change there as [`RenderOp`]s; the binder maps slots to the
//! concrete targets of a [`RenderSurface`] once, at startup, and forwards the
//! instructions.
//!
//! # Frames
//!
//! Instructions are queued while an event is being applied and drawn by
//! [`DisplayBinder::flush`] once the event is done, followed by a single
//! `present`. A surface therefore never sees a half-applied event, which is
//! what makes restoration atomic from its point of view.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::agent::{AgentField, AgentId};
use crate::chat::ChatLine;
use crate::error::ReconcileError;
use crate::history::{HistoryCard, HISTORY_CAPACITY};

/// Abstract UI surface identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Slot {
    /// The chat log
    ChatLog,
    /// Session status line
    Status,
    /// Agent status panel
    AgentPanel(AgentId),
    /// Agent pipeline indicator
    Pipeline(AgentId),
    /// Agent dialogue bubble (reveal target)
    Dialogue(AgentId),
    /// History card, 0 = newest
    History(usize),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChatLog => write!(f, "chat-log"),
            Self::Status => write!(f, "status"),
            Self::AgentPanel(id) => write!(f, "agent-panel-{id}"),
            Self::Pipeline(id) => write!(f, "pipeline-{id}"),
            Self::Dialogue(id) => write!(f, "dialogue-{id}"),
            Self::History(i) => write!(f, "history-{i}"),
        }
    }
}

impl Slot {
    /// Every slot a standard page has for `agents` agent seats
    #[must_use]
    pub fn standard_layout(agents: u8) -> Vec<Slot> {
        let mut slots = vec![Slot::ChatLog, Slot::Status];
        for id in (0..agents).map(AgentId) {
            slots.extend([Slot::AgentPanel(id), Slot::Pipeline(id), Slot::Dialogue(id)]);
        }
        slots.extend((0..HISTORY_CAPACITY).map(Slot::History));
        slots
    }
}

/// Concrete target handle handed out by a surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId(pub u32);

/// A single render instruction
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum RenderOp {
    /// Append a line to the chat log
    ChatAppend(ChatLine),
    /// Remove every chat line
    ChatClear,
    /// Replace one agent panel field
    AgentField {
        /// Which field
        field: AgentField,
        /// New text
        text: String,
    },
    /// Discard the pipeline rendering and draw these stages
    PipelineRebuild {
        /// Stage names in order
        stages: Vec<String>,
    },
    /// Move the single active marker to `index`
    PipelineActive {
        /// Stage index
        index: usize,
    },
    /// Show a summary under a stage
    PipelineSummary {
        /// Stage index
        index: usize,
        /// Summary text
        summary: String,
    },
    /// Set the completion indicator
    PipelineCompleted(bool),
    /// Replace a history card
    HistoryCard(HistoryCard),
    /// Session status line
    SessionStatus {
        /// Whether a conversation is running
        active: bool,
        /// Status label
        label: String,
    },
    /// Dialogue bubble text (possibly a partial reveal)
    DialogueText {
        /// Visible text
        text: String,
        /// Emotion driving avatar selection
        emotion: Option<String>,
    },
}

/// A concrete rendering backend (terminal, log, test recorder)
pub trait RenderSurface {
    /// Resolve a slot to a target, or `None` if this surface lacks it
    fn resolve(&mut self, slot: Slot) -> Option<TargetId>;

    /// Apply one instruction to a resolved target
    fn draw(&mut self, target: TargetId, op: RenderOp);

    /// Called once after the instructions of an event were drawn
    fn present(&mut self) {}
}

/// Slot-to-target indirection with per-event batching
pub struct DisplayBinder<S> {
    surface: S,
    targets: HashMap<Slot, TargetId>,
    pending: Vec<(TargetId, RenderOp)>,
}

impl<S: RenderSurface> DisplayBinder<S> {
    /// Resolve `slots` against `surface`, once
    pub fn bind(mut surface: S, slots: &[Slot]) -> Self {
        let mut targets = HashMap::with_capacity(slots.len());
        for &slot in slots {
            match surface.resolve(slot) {
                Some(target) => {
                    targets.insert(slot, target);
                }
                None => tracing::warn!(slot = %slot, "Surface has no target for slot"),
            }
        }
        tracing::debug!(bound = targets.len(), requested = slots.len(), "Display bound");

        Self {
            surface,
            targets,
            pending: Vec::new(),
        }
    }

    /// Whether a slot resolved at bind time
    #[must_use]
    pub fn is_bound(&self, slot: Slot) -> bool {
        self.targets.contains_key(&slot)
    }

    /// Queue an instruction for the current frame
    pub fn queue(&mut self, slot: Slot, op: RenderOp) -> Result<(), ReconcileError> {
        let target = self
            .targets
            .get(&slot)
            .copied()
            .ok_or(ReconcileError::MissingTarget(slot))?;
        self.pending.push((target, op));
        Ok(())
    }

    /// Number of queued instructions
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Draw everything queued and present one frame
    ///
    /// Returns the number of instructions drawn. Nothing is presented when
    /// nothing was queued.
    pub fn flush(&mut self) -> usize {
        let count = self.pending.len();
        if count == 0 {
            return 0;
        }
        for (target, op) in self.pending.drain(..) {
            self.surface.draw(target, op);
        }
        self.surface.present();
        count
    }

    /// The bound surface
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// The bound surface, mutably
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}
