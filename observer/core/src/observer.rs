//! Observer
//!
//! The single owner of all reconciled state for one page session. Each
//! [`InboundEvent`] is applied by a reducer that mutates the state and queues
//! render instructions; the binder is flushed once the reducer returns, so a
//! surface sees exactly one frame per event.
//!
//! # Errors
//!
//! Reducers fail before mutating anything wherever the failure can be
//! detected up front. Render instructions for unbound slots are skipped with
//! a warning and never abort an event.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::agent::{AgentField, AgentId, AgentPatch, AgentRecord, AgentRoster};
use crate::binder::{DisplayBinder, RenderOp, RenderSurface, Slot};
use crate::chat::{ChatLog, ChatMessage, MessageExtra, ERROR_SENDER, SYSTEM_SENDER};
use crate::config::ObserverConfig;
use crate::error::ReconcileError;
use crate::events::{
    ChatPayload, ConfigAgent, InboundEvent, OutboundEvent, PipelineUpdate, RestorePayload,
    StatusPayload,
};
use crate::history::{ConversationRing, HistoryEntry, HISTORY_CAPACITY};
use crate::pipeline::{PipelineBoard, PipelinePhase, PipelineState};
use crate::reveal::{RevealHandle, TextReveal};

/// Connection and conversation status
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// Transport is connected
    pub connected: bool,
    /// A conversation is running upstream
    pub active: bool,
    /// Upstream conversation id
    pub conversation_id: Option<String>,
    /// Last upstream status word
    pub status: Option<String>,
}

impl SessionState {
    /// Text for the status line
    #[must_use]
    pub fn label(&self) -> String {
        if !self.connected {
            return "disconnected".to_string();
        }
        match &self.status {
            Some(status) => status.clone(),
            None if self.active => "active".to_string(),
            None => "waiting".to_string(),
        }
    }
}

/// Dialogue surface of one agent
#[derive(Debug, Default)]
struct Dialogue {
    reveal: TextReveal,
    handle: Option<RevealHandle>,
    emotion: Option<String>,
}

/// Pipeline of one agent, as reported in snapshots
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineView {
    /// Owning agent
    pub agent: AgentId,
    /// Lifecycle phase
    pub phase: PipelinePhase,
    /// Full state
    #[serde(flatten)]
    pub state: PipelineState,
}

/// Read-only view of everything the observer knows
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObserverSnapshot {
    /// Connection and conversation status
    pub session: SessionState,
    /// Agent records in id order
    pub agents: Vec<AgentRecord>,
    /// Pipelines in agent order
    pub pipelines: Vec<PipelineView>,
    /// History slots, newest first
    pub history: Vec<Option<HistoryEntry>>,
    /// Every stored chat message, hidden ones included
    pub chat: Vec<ChatMessage>,
}

/// Reconciliation core for one page session
pub struct Observer<S> {
    config: ObserverConfig,
    binder: DisplayBinder<S>,
    agents: AgentRoster,
    pipelines: PipelineBoard,
    chat: ChatLog,
    history: ConversationRing,
    dialogues: BTreeMap<AgentId, Dialogue>,
    session: SessionState,
    autostart_requested: bool,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
}

impl<S: RenderSurface> Observer<S> {
    /// Bind `surface` and draw the initial page
    pub fn new(
        surface: S,
        config: ObserverConfig,
        outbound: mpsc::UnboundedSender<OutboundEvent>,
    ) -> Self {
        let binder = DisplayBinder::bind(surface, &Slot::standard_layout(config.display.agent_slots));
        let mut observer = Self {
            config,
            binder,
            agents: AgentRoster::new(),
            pipelines: PipelineBoard::new(),
            chat: ChatLog::new(),
            history: ConversationRing::new(),
            dialogues: BTreeMap::new(),
            session: SessionState::default(),
            autostart_requested: false,
            outbound,
        };
        observer.render_page();
        observer.binder.flush();
        observer
    }

    /// Apply one event and present its frame
    ///
    /// # Errors
    ///
    /// Returns the reason the event was (partly) rejected. State that was
    /// already valid to change stays changed and is still presented.
    pub fn apply(&mut self, event: InboundEvent) -> Result<(), ReconcileError> {
        let name = event.name();
        let result = match event {
            InboundEvent::Connect => {
                self.connect();
                Ok(())
            }
            InboundEvent::Disconnect => {
                self.disconnect();
                Ok(())
            }
            InboundEvent::Restore(payload) => {
                self.restore(payload);
                Ok(())
            }
            InboundEvent::Initialize(agents) => {
                self.initialize(agents);
                Ok(())
            }
            InboundEvent::Config(agents) => {
                self.configure(&agents);
                Ok(())
            }
            InboundEvent::LlmInteraction(entry) => {
                self.history.push(entry);
                self.render_history();
                Ok(())
            }
            InboundEvent::Message(payload) => {
                self.message(payload, true);
                Ok(())
            }
            InboundEvent::ConversationStatus(status) => {
                self.conversation_status(status);
                Ok(())
            }
            InboundEvent::AgentUpdate { agent, patch } => {
                self.agent_update(agent, &patch);
                Ok(())
            }
            InboundEvent::PipelineUpdate(update) => self.pipeline_update(&update),
        };
        let drawn = self.binder.flush();
        tracing::debug!(event = name, drawn, "Event applied");
        result
    }

    /// User asked to start a conversation
    ///
    /// Returns whether the request was sent.
    pub fn start_conversation(&mut self) -> bool {
        if self.session.active {
            tracing::debug!("Conversation already active, start ignored");
            return false;
        }
        tracing::info!("Starting conversation");
        self.send(OutboundEvent::StartConversation);
        true
    }

    /// Explicit completion switch for an agent's pipeline
    ///
    /// # Errors
    ///
    /// [`ReconcileError::NoPipeline`] when the agent has no pipeline.
    pub fn toggle_completion(&mut self, agent: AgentId) -> Result<bool, ReconcileError> {
        let completed = self.pipelines.toggle_completion(agent)?;
        self.render(Slot::Pipeline(agent), RenderOp::PipelineCompleted(completed));
        self.binder.flush();
        Ok(completed)
    }

    /// Advance every running dialogue reveal by one tick
    ///
    /// Returns whether any reveal is still running.
    pub fn tick(&mut self) -> bool {
        let chars = self.config.reveal.chars_per_tick;
        let mut frames = Vec::new();
        for (&id, dialogue) in &mut self.dialogues {
            let Some(handle) = dialogue.handle else {
                continue;
            };
            if let Some(text) = dialogue.reveal.advance(handle, chars) {
                frames.push((id, text, dialogue.emotion.clone()));
            }
        }
        for (id, text, emotion) in frames {
            self.render(Slot::Dialogue(id), RenderOp::DialogueText { text, emotion });
        }
        self.binder.flush();
        self.is_revealing()
    }

    /// Whether any dialogue reveal is running
    #[must_use]
    pub fn is_revealing(&self) -> bool {
        self.dialogues.values().any(|d| d.reveal.is_active())
    }

    /// Serializable view of the whole state
    #[must_use]
    pub fn snapshot(&self) -> ObserverSnapshot {
        ObserverSnapshot {
            session: self.session.clone(),
            agents: self.agents.iter().cloned().collect(),
            pipelines: self
                .pipelines
                .iter()
                .map(|(&agent, state)| PipelineView {
                    agent,
                    phase: state.phase(),
                    state: state.clone(),
                })
                .collect(),
            history: (0..HISTORY_CAPACITY)
                .map(|i| self.history.get(i).cloned())
                .collect(),
            chat: self.chat.messages().to_vec(),
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// Session status
    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Agent records
    #[must_use]
    pub fn agents(&self) -> &AgentRoster {
        &self.agents
    }

    /// Agent pipelines
    #[must_use]
    pub fn pipelines(&self) -> &PipelineBoard {
        &self.pipelines
    }

    /// Chat log
    #[must_use]
    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    /// History ring
    #[must_use]
    pub fn history(&self) -> &ConversationRing {
        &self.history
    }

    /// Display binder and its surface
    #[must_use]
    pub fn binder(&self) -> &DisplayBinder<S> {
        &self.binder
    }

    /// Display binder, mutably
    pub fn binder_mut(&mut self) -> &mut DisplayBinder<S> {
        &mut self.binder
    }

    // ============================================
    // Reducers
    // ============================================

    fn connect(&mut self) {
        self.session.connected = true;
        tracing::info!(active = self.session.active, "Connected");

        if self.session.active {
            tracing::debug!("Conversation already active, no autostart");
        } else if !self.config.auto_start {
            tracing::debug!("Autostart disabled");
        } else if !self.autostart_requested {
            self.autostart_requested = true;
            tracing::info!("Requesting autostart");
            self.send(OutboundEvent::RequestAutostart);
        }
        self.render_status();
    }

    fn disconnect(&mut self) {
        self.session.connected = false;
        self.autostart_requested = false;
        tracing::info!("Disconnected, keeping last known state");
        self.render_status();
    }

    fn restore(&mut self, payload: RestorePayload) {
        tracing::info!(
            agents = payload.agents.len(),
            history = payload.history.len(),
            messages = payload.messages.len(),
            "Restoring state"
        );

        self.chat.clear();
        for dialogue in self.dialogues.values_mut() {
            dialogue.reveal.cancel();
            dialogue.handle = None;
            dialogue.emotion = None;
        }

        self.agents.clear();
        self.pipelines.clear();
        for (id, patch) in &payload.agents {
            self.agents.apply_update(*id, patch);
            let Some(stages) = declared_stages(patch) else {
                continue;
            };
            if let Err(err) = self.pipelines.create(*id, stages) {
                tracing::warn!(agent = %id, error = %err, "Restored pipeline dropped");
                continue;
            }
            let stage = patch
                .pipeline
                .as_ref()
                .and_then(|p| p.stage.as_deref())
                .filter(|s| !s.is_empty() && !s.ends_with("_start"));
            if let Some(stage) = stage {
                if let Err(err) = self.pipelines.set_active_stage(*id, stage, None) {
                    tracing::warn!(agent = %id, error = %err, "Restored stage dropped");
                }
            }
        }

        self.history.restore_bulk(payload.history);

        self.render(Slot::ChatLog, RenderOp::ChatClear);
        self.render_page();
        for message in payload.messages {
            self.message(message, false);
        }
    }

    fn initialize(&mut self, agents: Vec<(AgentId, AgentPatch)>) {
        tracing::info!(agents = agents.len(), "Initializing agents");
        for (id, patch) in agents {
            let touched = self.agents.apply_update(id, &patch);
            self.render_agent(id, &touched);

            if let Some(stages) = declared_stages(&patch) {
                match self.pipelines.create(id, stages) {
                    Ok(_) => self.render_pipeline(id),
                    Err(err) => tracing::warn!(agent = %id, error = %err, "Pipeline not created"),
                }
            }
        }
    }

    fn configure(&mut self, agents: &[ConfigAgent]) {
        for (position, agent) in agents.iter().enumerate() {
            let Ok(id) = u8::try_from(position).map(AgentId) else {
                tracing::warn!(position, "Config agent out of range");
                break;
            };
            let touched = self.agents.apply_update(id, &agent.patch());
            self.render_agent(id, &touched);
        }
    }

    fn message(&mut self, payload: ChatPayload, live: bool) {
        let message = self
            .chat
            .append(
                payload.sender(),
                payload.content(),
                payload.sender_id,
                payload.extra.clone(),
            )
            .clone();
        if !message.is_rendered() {
            return;
        }
        self.render(Slot::ChatLog, RenderOp::ChatAppend(message.line()));

        let Some(id) = message.sender_id else {
            return;
        };
        if live && message.sender != ERROR_SENDER && self.binder.is_bound(Slot::Dialogue(id)) {
            let dialogue = self.dialogues.entry(id).or_default();
            dialogue.handle = Some(dialogue.reveal.start(message.content));
            dialogue.emotion = message.extra.emotion_tag().map(str::to_owned);
            let emotion = dialogue.emotion.clone();
            self.render(
                Slot::Dialogue(id),
                RenderOp::DialogueText {
                    text: String::new(),
                    emotion,
                },
            );
        }
    }

    fn conversation_status(&mut self, status: StatusPayload) {
        if let Some(active) = status.active {
            self.session.active = active;
        }
        if let Some(id) = &status.conversation_id {
            self.session.conversation_id = Some(id.clone());
        }
        if let Some(word) = &status.status {
            self.session.status = Some(word.clone());
        }
        tracing::info!(
            active = self.session.active,
            status = ?self.session.status,
            "Conversation status"
        );

        let placeholder = &self.config.display.placeholder;
        let mut note = format!(
            "Conversation {} {}",
            status.conversation_id.as_deref().unwrap_or(placeholder),
            status.status.as_deref().unwrap_or(placeholder),
        );
        if let Some(detail) = &status.message {
            note.push_str(": ");
            note.push_str(detail);
        }
        self.chat
            .append(SYSTEM_SENDER, note, None, MessageExtra::default());
        self.render_status();
    }

    fn agent_update(&mut self, agent: AgentId, patch: &AgentPatch) {
        let touched = self.agents.apply_update(agent, patch);
        tracing::debug!(agent = %agent, fields = touched.len(), "Agent updated");
        self.render_agent(agent, &touched);
    }

    fn pipeline_update(&mut self, update: &PipelineUpdate) -> Result<(), ReconcileError> {
        let agent = update.agent();
        match update.components() {
            Some([]) => tracing::warn!(agent = %agent, "Empty component list, pipeline kept"),
            Some(components) => {
                self.pipelines.create(agent, components.to_vec())?;
                self.render_pipeline(agent);
            }
            None => {}
        }

        let Some(stage) = update.announced_stage() else {
            return Ok(());
        };
        let advance = self
            .pipelines
            .set_active_stage(agent, stage, update.summary())?;
        tracing::debug!(
            agent = %agent,
            stage = %stage,
            index = advance.index,
            previous = ?advance.previous,
            "Stage active"
        );

        let slot = Slot::Pipeline(agent);
        self.render(slot, RenderOp::PipelineActive { index: advance.index });
        if let Some(summary) = advance.summary {
            self.render(
                slot,
                RenderOp::PipelineSummary {
                    index: advance.index,
                    summary,
                },
            );
        }
        if let Some(completed) = advance.completed {
            self.render(slot, RenderOp::PipelineCompleted(completed));
        }
        Ok(())
    }

    // ============================================
    // Rendering
    // ============================================

    fn send(&self, event: OutboundEvent) {
        if self.outbound.send(event).is_err() {
            tracing::debug!(event = event.name(), "Outbound channel closed");
        }
    }

    fn render(&mut self, slot: Slot, op: RenderOp) {
        if let Err(err) = self.binder.queue(slot, op) {
            tracing::warn!(error = %err, "Render instruction skipped");
        }
    }

    /// Agent ids with a bound panel or known state
    fn seats(&self) -> Vec<AgentId> {
        let mut ids: BTreeSet<AgentId> = (0..self.config.display.agent_slots)
            .map(AgentId)
            .collect();
        ids.extend(self.agents.iter().map(|r| r.id));
        ids.extend(self.pipelines.iter().map(|(id, _)| *id));
        ids.into_iter().collect()
    }

    /// Redraw everything but the chat log
    fn render_page(&mut self) {
        self.render_status();
        for id in self.seats() {
            if self.binder.is_bound(Slot::AgentPanel(id)) {
                self.render_agent(id, &AgentField::ALL);
            }
            if self.binder.is_bound(Slot::Pipeline(id)) {
                self.render_pipeline(id);
            }
            if self.binder.is_bound(Slot::Dialogue(id)) {
                self.render(
                    Slot::Dialogue(id),
                    RenderOp::DialogueText {
                        text: String::new(),
                        emotion: None,
                    },
                );
            }
        }
        self.render_history();
    }

    fn render_status(&mut self) {
        let op = RenderOp::SessionStatus {
            active: self.session.active,
            label: self.session.label(),
        };
        self.render(Slot::Status, op);
    }

    fn render_agent(&mut self, id: AgentId, fields: &[AgentField]) {
        let fresh;
        let record = match self.agents.get(id) {
            Some(record) => record,
            None => {
                fresh = AgentRecord::new(id);
                &fresh
            }
        };
        let ops: Vec<RenderOp> = fields
            .iter()
            .map(|&field| RenderOp::AgentField {
                field,
                text: record.display(field, &self.config.display),
            })
            .collect();
        for op in ops {
            self.render(Slot::AgentPanel(id), op);
        }
    }

    fn render_pipeline(&mut self, id: AgentId) {
        let mut ops = Vec::new();
        match self.pipelines.get(id) {
            Some(pipeline) => {
                ops.push(RenderOp::PipelineRebuild {
                    stages: pipeline.stages().to_vec(),
                });
                for (index, stage) in pipeline.stages().iter().enumerate() {
                    if let Some(summary) = pipeline.summary(stage) {
                        ops.push(RenderOp::PipelineSummary {
                            index,
                            summary: summary.to_string(),
                        });
                    }
                }
                if let Some(index) = pipeline.active_index() {
                    ops.push(RenderOp::PipelineActive { index });
                }
                ops.push(RenderOp::PipelineCompleted(pipeline.is_completed()));
            }
            None => {
                ops.push(RenderOp::PipelineRebuild { stages: Vec::new() });
                ops.push(RenderOp::PipelineCompleted(false));
            }
        }
        for op in ops {
            self.render(Slot::Pipeline(id), op);
        }
    }

    fn render_history(&mut self) {
        let cards = self.history.cards(&self.config.display.placeholder);
        for (slot, card) in cards.into_iter().enumerate() {
            self.render(Slot::History(slot), RenderOp::HistoryCard(card));
        }
    }
}

/// Stage list an agent snapshot declares, nested pipeline first
fn declared_stages(patch: &AgentPatch) -> Option<Vec<String>> {
    patch
        .pipeline
        .as_ref()
        .map(|p| &p.components)
        .filter(|c| !c.is_empty())
        .or(patch.components.as_ref())
        .cloned()
}
