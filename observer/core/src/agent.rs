//! Agent State Reconciler
//!
//! Merges partial update events into a durable per-agent record.
//!
//! # Patch Semantics
//!
//! A field is overwritten only when the incoming patch carries it. Absence is
//! a no-op, never a clear, so a tension of `0` applies while a missing tension
//! leaves the previous value alone. JSON `null` counts as absent.
//!
//! Goal, active tactic and tactic list are resolved "direct field first, then
//! the same field nested under `plan`".
//!
//! Every recognized field is decoded on its own. A field of the wrong type is
//! treated as absent, so one bad value never costs the rest of the patch.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::DisplayConfig;
use crate::error::ReconcileError;
use crate::pipeline::PipelineSnapshot;

/// Name shown on a panel before any agent data arrived
pub const DEFAULT_AGENT_NAME: &str = "Waiting for agent...";

/// Agent identifier (0 = left seat, 1 = right seat)
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AgentId(pub u8);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fields of an agent panel that can be rendered independently
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentField {
    /// Display name
    Name,
    /// Personality blurb
    Personality,
    /// Tension level
    Tension,
    /// Current goal
    Goal,
    /// Tactic currently in play
    ActiveTactic,
    /// All planned tactics
    Tactics,
    /// Interior principles
    Interior,
}

impl AgentField {
    /// Every field, in panel order
    pub const ALL: [AgentField; 7] = [
        AgentField::Name,
        AgentField::Personality,
        AgentField::Tension,
        AgentField::Goal,
        AgentField::ActiveTactic,
        AgentField::Tactics,
        AgentField::Interior,
    ];

    /// Label used by text surfaces
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Personality => "Personality",
            Self::Tension => "Tension",
            Self::Goal => "Goal",
            Self::ActiveTactic => "Active tactic",
            Self::Tactics => "Tactics",
            Self::Interior => "Principles",
        }
    }
}

/// Interior state: either a structured object or a plain string
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InteriorState {
    /// Shown verbatim
    Text(String),
    /// Only `principles` is shown
    Structured {
        /// Guiding principles, if the upstream produced any
        #[serde(default)]
        principles: Option<String>,
    },
}

/// Decode a field, turning a type mismatch into absence
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Plan fields nested under `plan`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PlanPatch {
    /// Goal carried by the plan
    #[serde(default, deserialize_with = "lenient")]
    pub goal: Option<String>,
    /// Tactic in play
    #[serde(default, deserialize_with = "lenient", alias = "activeTactic")]
    pub active_tactic: Option<String>,
    /// Ordered tactics
    #[serde(default, deserialize_with = "lenient")]
    pub tactics: Option<Vec<String>>,
}

/// A partial agent update; every field is optional
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct AgentPatch {
    /// Target agent (not every event carries it in the payload)
    #[serde(default, deserialize_with = "lenient", alias = "agentId")]
    pub agent_id: Option<AgentId>,
    /// Display name
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    /// Personality blurb
    #[serde(default, deserialize_with = "lenient")]
    pub personality: Option<String>,
    /// Tension level
    #[serde(
        default,
        deserialize_with = "lenient",
        alias = "tensionLevel",
        alias = "tension_level"
    )]
    pub tension: Option<f64>,
    /// Goal (wins over `plan.goal`)
    #[serde(default, deserialize_with = "lenient")]
    pub goal: Option<String>,
    /// Active tactic (wins over `plan.active_tactic`)
    #[serde(default, deserialize_with = "lenient", alias = "activeTactic")]
    pub active_tactic: Option<String>,
    /// Tactic list (wins over `plan.tactics`)
    #[serde(default, deserialize_with = "lenient", alias = "tacticList")]
    pub tactics: Option<Vec<String>>,
    /// Nested plan
    #[serde(default, deserialize_with = "lenient")]
    pub plan: Option<PlanPatch>,
    /// Interior state
    #[serde(
        default,
        deserialize_with = "lenient",
        alias = "interiorPrinciples",
        alias = "interior_principles",
        alias = "interior_state"
    )]
    pub interior: Option<InteriorState>,
    /// Pipeline stage names (initialize events)
    #[serde(default, deserialize_with = "lenient")]
    pub components: Option<Vec<String>>,
    /// Pipeline description (restore snapshots)
    #[serde(default, deserialize_with = "lenient")]
    pub pipeline: Option<PipelineSnapshot>,
}

impl AgentPatch {
    /// Parse a patch, rejecting anything that is not a JSON object
    pub fn from_value(event: &str, value: Value) -> Result<Self, ReconcileError> {
        if !value.is_object() {
            return Err(ReconcileError::malformed(event, "agent patch is not an object"));
        }
        serde_json::from_value(value).map_err(|e| ReconcileError::malformed(event, e))
    }

    fn resolved_goal(&self) -> Option<&String> {
        self.goal
            .as_ref()
            .or_else(|| self.plan.as_ref().and_then(|p| p.goal.as_ref()))
    }

    fn resolved_active_tactic(&self) -> Option<&String> {
        self.active_tactic
            .as_ref()
            .or_else(|| self.plan.as_ref().and_then(|p| p.active_tactic.as_ref()))
    }

    fn resolved_tactics(&self) -> Option<&Vec<String>> {
        self.tactics
            .as_ref()
            .or_else(|| self.plan.as_ref().and_then(|p| p.tactics.as_ref()))
    }
}

/// The durable record behind one agent panel
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentRecord {
    /// Agent identity
    pub id: AgentId,
    /// Display name
    pub name: String,
    /// Personality blurb
    pub personality: Option<String>,
    /// Tension level
    pub tension: Option<f64>,
    /// Current goal
    pub goal: Option<String>,
    /// Tactic in play
    pub active_tactic: Option<String>,
    /// Planned tactics
    pub tactics: Option<Vec<String>>,
    /// Interior state
    pub interior: Option<InteriorState>,
}

impl AgentRecord {
    /// A fresh record as shown before the agent is known
    #[must_use]
    pub fn new(id: AgentId) -> Self {
        Self {
            id,
            name: DEFAULT_AGENT_NAME.to_string(),
            personality: None,
            tension: None,
            goal: None,
            active_tactic: None,
            tactics: None,
            interior: None,
        }
    }

    /// Apply a patch, returning the fields it touched
    pub fn apply(&mut self, patch: &AgentPatch) -> Vec<AgentField> {
        let mut touched = Vec::new();

        if let Some(name) = &patch.name {
            self.name.clone_from(name);
            touched.push(AgentField::Name);
        }
        if let Some(personality) = &patch.personality {
            self.personality = Some(personality.clone());
            touched.push(AgentField::Personality);
        }
        if let Some(tension) = patch.tension {
            self.tension = Some(tension);
            touched.push(AgentField::Tension);
        }
        if let Some(goal) = patch.resolved_goal() {
            self.goal = Some(goal.clone());
            touched.push(AgentField::Goal);
        }
        if let Some(tactic) = patch.resolved_active_tactic() {
            self.active_tactic = Some(tactic.clone());
            touched.push(AgentField::ActiveTactic);
        }
        if let Some(tactics) = patch.resolved_tactics() {
            self.tactics = Some(tactics.clone());
            touched.push(AgentField::Tactics);
        }
        if let Some(interior) = &patch.interior {
            self.interior = Some(interior.clone());
            touched.push(AgentField::Interior);
        }

        touched
    }

    /// Text for one panel field
    #[must_use]
    pub fn display(&self, field: AgentField, style: &DisplayConfig) -> String {
        let placeholder = || style.placeholder.clone();
        match field {
            AgentField::Name => self.name.clone(),
            AgentField::Personality => self.personality.clone().unwrap_or_else(placeholder),
            AgentField::Tension => self.tension.map_or_else(placeholder, format_number),
            AgentField::Goal => self.goal.clone().unwrap_or_else(placeholder),
            AgentField::ActiveTactic => self.active_tactic.clone().unwrap_or_else(placeholder),
            AgentField::Tactics => match &self.tactics {
                Some(tactics) if !tactics.is_empty() => tactics.join(&style.tactic_separator),
                _ => placeholder(),
            },
            AgentField::Interior => match &self.interior {
                Some(InteriorState::Text(text)) => text.clone(),
                Some(InteriorState::Structured {
                    principles: Some(principles),
                }) => principles.clone(),
                Some(InteriorState::Structured { principles: None }) | None => placeholder(),
            },
        }
    }
}

/// Render a number without a trailing `.0` when it is integral
pub(crate) fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = value as i64;
        whole.to_string()
    } else {
        value.to_string()
    }
}

/// All agent records of the session, created on first sight
#[derive(Debug, Default)]
pub struct AgentRoster {
    records: BTreeMap<AgentId, AgentRecord>,
}

impl AgentRoster {
    /// Create an empty roster
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `applyUpdate`: merge a patch into the agent's record
    pub fn apply_update(&mut self, id: AgentId, patch: &AgentPatch) -> Vec<AgentField> {
        self.records
            .entry(id)
            .or_insert_with(|| AgentRecord::new(id))
            .apply(patch)
    }

    /// Forget every record (restoration only)
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Look up a record
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&AgentRecord> {
        self.records.get(&id)
    }

    /// Iterate records in id order
    pub fn iter(&self) -> impl Iterator<Item = &AgentRecord> {
        self.records.values()
    }
}
