//! Wire Events
//!
//! The transport delivers named events with JSON payloads. On the wire every
//! event is one line of JSON:
//!
//! ```text
//! {"event": "pipeline_update", "data": {"agent_id": 0, "stage": "plan"}}
//! ```
//!
//! [`InboundEvent::from_wire`] turns a name and payload into a typed event.
//! This is the only place that knows about event-name aliases and payload
//! quirks of the upstream server; the reducers only ever see typed values.
//!
//! Payloads are parsed completely before any state is touched, so a malformed
//! event is always dropped as a whole.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{AgentId, AgentPatch};
use crate::chat::{MessageExtra, SYSTEM_SENDER};
use crate::error::ReconcileError;
use crate::history::{lenient_text, HistoryEntry, HistorySnapshot};

/// One line of the wire format
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    /// Event name
    pub event: String,
    /// Payload, `null` when omitted
    #[serde(default)]
    pub data: Value,
}

impl EventFrame {
    /// Decode one line; blank lines yield `None`
    pub fn decode(line: &str) -> Result<Option<Self>, serde_json::Error> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(line).map(Some)
    }
}

// ============================================
// Payloads
// ============================================

/// `message` payload
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ChatPayload {
    /// Sender label, `System` when absent
    #[serde(default)]
    pub sender: Option<String>,
    /// Message text
    #[serde(default)]
    pub message: Option<String>,
    /// Literal speech, used when `message` is absent
    #[serde(default)]
    pub speech: Option<String>,
    /// Speaking agent
    #[serde(default, alias = "senderId")]
    pub sender_id: Option<AgentId>,
    /// Emotion and original speech
    #[serde(flatten)]
    pub extra: MessageExtra,
}

impl ChatPayload {
    /// Sender, defaulting to `System`
    #[must_use]
    pub fn sender(&self) -> &str {
        self.sender.as_deref().unwrap_or(SYSTEM_SENDER)
    }

    /// Content: `message`, else `speech`, else empty
    #[must_use]
    pub fn content(&self) -> &str {
        self.message
            .as_deref()
            .or(self.speech.as_deref())
            .unwrap_or_default()
    }
}

/// `conversation_status` payload
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct StatusPayload {
    /// Whether a conversation is running
    #[serde(default)]
    pub active: Option<bool>,
    /// Upstream conversation id
    #[serde(default, alias = "conversationId", deserialize_with = "lenient_text")]
    pub conversation_id: Option<String>,
    /// Upstream status word (`running`, `completed`, `waiting`, ...)
    #[serde(default)]
    pub status: Option<String>,
    /// Error detail on failure statuses
    #[serde(default)]
    pub message: Option<String>,
}

/// `pipeline_update` payload
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PipelineUpdate {
    /// Target agent, 0 when absent
    #[serde(default, alias = "agentId")]
    pub agent_id: Option<AgentId>,
    /// Announced stage
    #[serde(default)]
    pub stage: Option<String>,
    /// Stage data
    #[serde(default)]
    pub data: Option<PipelineData>,
}

impl PipelineUpdate {
    /// Target agent
    #[must_use]
    pub fn agent(&self) -> AgentId {
        self.agent_id.unwrap_or(AgentId(0))
    }

    /// Stage to announce, ignoring `*_start` markers
    #[must_use]
    pub fn announced_stage(&self) -> Option<&str> {
        self.stage.as_deref().filter(|s| !s.ends_with("_start"))
    }

    /// Summary text, if any
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.summary.as_deref())
    }

    /// Replacement stage list, if any
    #[must_use]
    pub fn components(&self) -> Option<&[String]> {
        self.data.as_ref().and_then(|d| d.components.as_deref())
    }
}

/// `data` of a pipeline update
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PipelineData {
    /// Stage summary
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: Option<String>,
    /// Replacement stage list
    #[serde(default, alias = "stages")]
    pub components: Option<Vec<String>>,
}

/// A name/personality pair from a `config` event
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ConfigAgent {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Personality blurb
    #[serde(default)]
    pub personality: Option<String>,
}

impl ConfigAgent {
    /// Patch carrying only name and personality
    #[must_use]
    pub fn patch(&self) -> AgentPatch {
        AgentPatch {
            name: self.name.clone(),
            personality: self.personality.clone(),
            ..AgentPatch::default()
        }
    }
}

/// Fully parsed restore payload
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RestorePayload {
    /// Present agent slots
    pub agents: Vec<(AgentId, AgentPatch)>,
    /// History, newest first
    pub history: Vec<HistoryEntry>,
    /// Messages in log order
    pub messages: Vec<ChatPayload>,
}

#[derive(Deserialize)]
struct RawRestore {
    #[serde(default, alias = "agentStates")]
    agent_states: Option<RawAgentStates>,
    #[serde(default, alias = "conversationHistory")]
    conversation_history: Option<HistorySnapshot>,
    #[serde(default)]
    messages: Option<Vec<ChatPayload>>,
}

/// Agent slots: a list with holes, or an object keyed by agent id
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAgentStates {
    List(Vec<Value>),
    Keyed(BTreeMap<String, Value>),
}

impl RawAgentStates {
    fn into_patches(self, event: &str) -> Result<Vec<(AgentId, AgentPatch)>, ReconcileError> {
        let slots: Vec<(Option<AgentId>, Value)> = match self {
            Self::List(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (u8::try_from(i).ok().map(AgentId), v))
                .collect(),
            Self::Keyed(map) => map
                .into_iter()
                .map(|(key, v)| {
                    key.parse::<u8>()
                        .map(|id| (Some(AgentId(id)), v))
                        .map_err(|_| ReconcileError::malformed(event, format!("agent key {key:?}")))
                })
                .collect::<Result<_, _>>()?,
        };

        let mut patches = Vec::with_capacity(slots.len());
        for (position, value) in slots {
            if value.is_null() {
                continue;
            }
            let patch = AgentPatch::from_value(event, value)?;
            let id = patch
                .agent_id
                .or(position)
                .ok_or_else(|| ReconcileError::malformed(event, "agent slot without id"))?;
            patches.push((id, patch));
        }
        Ok(patches)
    }
}

// ============================================
// Inbound events
// ============================================

/// A typed inbound event
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    /// Transport connected
    Connect,
    /// Transport dropped
    Disconnect,
    /// Full state restoration
    Restore(RestorePayload),
    /// Seed agents and their pipelines
    Initialize(Vec<(AgentId, AgentPatch)>),
    /// Names and personalities by position
    Config(Vec<ConfigAgent>),
    /// A prompt/response exchange
    LlmInteraction(HistoryEntry),
    /// A chat message
    Message(ChatPayload),
    /// Session status change
    ConversationStatus(StatusPayload),
    /// Partial agent update
    AgentUpdate {
        /// Target agent
        agent: AgentId,
        /// Fields to merge
        patch: AgentPatch,
    },
    /// Pipeline progress
    PipelineUpdate(PipelineUpdate),
}

impl InboundEvent {
    /// Parse a named event
    ///
    /// # Errors
    ///
    /// [`ReconcileError::UnknownEvent`] for names without a handler and
    /// [`ReconcileError::MalformedPayload`] for payloads of the wrong shape.
    pub fn from_wire(name: &str, data: Value) -> Result<Self, ReconcileError> {
        match name {
            "connect" => Ok(Self::Connect),
            "disconnect" => Ok(Self::Disconnect),
            "restore" | "restore_state" => parse_restore(name, data).map(Self::Restore),
            "initialize" | "initialize_agents" => parse_initialize(name, data).map(Self::Initialize),
            "config" => parse_config(name, data).map(Self::Config),
            "llm_interaction" => parse_object(name, data).map(Self::LlmInteraction),
            "message" | "add_message" => parse_object(name, data).map(Self::Message),
            "conversation_status" => parse_object(name, data).map(Self::ConversationStatus),
            "pipeline_update" => parse_object(name, data).map(Self::PipelineUpdate),
            "agent_update" => {
                let patch = AgentPatch::from_value(name, data)?;
                let agent = patch.agent_id.unwrap_or(AgentId(0));
                Ok(Self::AgentUpdate { agent, patch })
            }
            other => match numbered_agent(other) {
                Some(agent) => {
                    let patch = AgentPatch::from_value(name, data)?;
                    Ok(Self::AgentUpdate { agent, patch })
                }
                None => Err(ReconcileError::UnknownEvent(other.to_string())),
            },
        }
    }

    /// Wire name (canonical spelling)
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Restore(_) => "restore",
            Self::Initialize(_) => "initialize",
            Self::Config(_) => "config",
            Self::LlmInteraction(_) => "llm_interaction",
            Self::Message(_) => "message",
            Self::ConversationStatus(_) => "conversation_status",
            Self::AgentUpdate { .. } => "agent_update",
            Self::PipelineUpdate(_) => "pipeline_update",
        }
    }
}

/// `update_agent<N>` with 1-based `N`
fn numbered_agent(name: &str) -> Option<AgentId> {
    let n: u8 = name.strip_prefix("update_agent")?.parse().ok()?;
    n.checked_sub(1).map(AgentId)
}

fn parse_object<T: for<'de> Deserialize<'de>>(event: &str, data: Value) -> Result<T, ReconcileError> {
    if !data.is_object() {
        return Err(ReconcileError::malformed(event, "payload is not an object"));
    }
    serde_json::from_value(data).map_err(|e| ReconcileError::malformed(event, e))
}

fn parse_restore(event: &str, data: Value) -> Result<RestorePayload, ReconcileError> {
    let raw: RawRestore = parse_object(event, data)?;
    let agents = match raw.agent_states {
        Some(states) => states.into_patches(event)?,
        None => Vec::new(),
    };
    Ok(RestorePayload {
        agents,
        history: raw
            .conversation_history
            .map(HistorySnapshot::into_entries)
            .unwrap_or_default(),
        messages: raw.messages.unwrap_or_default(),
    })
}

/// `{agents: [...]}` or a bare list
fn agent_list(event: &str, data: Value) -> Result<Vec<Value>, ReconcileError> {
    match data {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("agents") {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(ReconcileError::malformed(event, "`agents` is not a list")),
        },
        _ => Err(ReconcileError::malformed(event, "payload is not an object")),
    }
}

fn parse_initialize(event: &str, data: Value) -> Result<Vec<(AgentId, AgentPatch)>, ReconcileError> {
    agent_list(event, data)?
        .into_iter()
        .enumerate()
        .map(|(position, value)| {
            let patch = AgentPatch::from_value(event, value)?;
            let id = match patch.agent_id {
                Some(id) => id,
                None => u8::try_from(position)
                    .map(AgentId)
                    .map_err(|_| ReconcileError::malformed(event, "too many agents"))?,
            };
            Ok((id, patch))
        })
        .collect()
}

fn parse_config(event: &str, data: Value) -> Result<Vec<ConfigAgent>, ReconcileError> {
    let inner = match data {
        Value::Object(mut map) if map.contains_key("config") => {
            map.remove("config").unwrap_or_default()
        }
        other => other,
    };
    agent_list(event, inner)?
        .into_iter()
        .map(|value| parse_object(event, value))
        .collect()
}

// ============================================
// Outbound events
// ============================================

/// Events the observer sends upstream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Ask the server to start a conversation if it is configured to
    RequestAutostart,
    /// User asked for a conversation
    StartConversation,
}

impl OutboundEvent {
    /// Wire name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RequestAutostart => "request_autostart",
            Self::StartConversation => "start_conversation",
        }
    }
}
