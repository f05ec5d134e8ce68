//! Conversation History Ring
//!
//! The three most recent prompt/response exchanges, newest first.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::agent::format_number;

/// Number of slots in the ring
pub const HISTORY_CAPACITY: usize = 3;

/// One prompt/response exchange
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Prompt sent upstream
    #[serde(default, deserialize_with = "lenient_text")]
    pub prompt: Option<String>,
    /// Title of the pipeline step that issued the prompt
    #[serde(default, alias = "stepTitle", alias = "title", deserialize_with = "lenient_text")]
    pub step_title: Option<String>,
    /// Response received
    #[serde(default, deserialize_with = "lenient_text")]
    pub response: Option<String>,
    /// Elapsed time, already formatted upstream
    #[serde(
        default,
        alias = "elapsedTime",
        alias = "time",
        deserialize_with = "lenient_text"
    )]
    pub elapsed_time: Option<String>,
}

/// Display text for one history card
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryCard {
    /// Prompt, empty when missing
    pub prompt: String,
    /// `Step: <title>` line
    pub step: String,
    /// Response, empty when missing
    pub response: String,
    /// `Time elapsed: <t>` line
    pub elapsed: String,
}

impl HistoryEntry {
    /// Render the card text for this entry
    #[must_use]
    pub fn card(&self, placeholder: &str) -> HistoryCard {
        let titled = |v: &Option<String>| {
            v.as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(placeholder)
                .to_string()
        };
        HistoryCard {
            prompt: self.prompt.clone().unwrap_or_default(),
            step: format!("Step: {}", titled(&self.step_title)),
            response: self.response.clone().unwrap_or_default(),
            elapsed: format!("Time elapsed: {}", titled(&self.elapsed_time)),
        }
    }
}

/// Card for a slot with no entry
#[must_use]
pub fn empty_card(placeholder: &str) -> HistoryCard {
    HistoryEntry::default().card(placeholder)
}

/// Bulk history as found in restore snapshots
///
/// Either a plain list of entries or the columnar layout the upstream server
/// keeps (`prompts`, `responses`, `titles`, `times`).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HistorySnapshot {
    /// Entries, newest first
    Entries(Vec<HistoryEntry>),
    /// Parallel columns, newest first
    Columns {
        /// Prompts
        #[serde(default)]
        prompts: Vec<Value>,
        /// Responses
        #[serde(default)]
        responses: Vec<Value>,
        /// Step titles
        #[serde(default)]
        titles: Vec<Value>,
        /// Elapsed times
        #[serde(default)]
        times: Vec<Value>,
    },
}

impl Default for HistorySnapshot {
    fn default() -> Self {
        Self::Entries(Vec::new())
    }
}

impl HistorySnapshot {
    /// Flatten into entries, newest first
    #[must_use]
    pub fn into_entries(self) -> Vec<HistoryEntry> {
        match self {
            Self::Entries(entries) => entries,
            Self::Columns {
                prompts,
                responses,
                titles,
                times,
            } => {
                let len = prompts
                    .len()
                    .max(responses.len())
                    .max(titles.len())
                    .max(times.len());
                (0..len)
                    .map(|i| HistoryEntry {
                        prompt: prompts.get(i).and_then(value_text),
                        step_title: titles.get(i).and_then(value_text),
                        response: responses.get(i).and_then(value_text),
                        elapsed_time: times.get(i).and_then(value_text),
                    })
                    .collect()
            }
        }
    }
}

/// Fixed-capacity ring, slot 0 newest
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversationRing {
    slots: [Option<HistoryEntry>; HISTORY_CAPACITY],
}

impl ConversationRing {
    /// Create an empty ring
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at slot 0, shifting the rest down and dropping the oldest
    pub fn push(&mut self, entry: HistoryEntry) {
        self.slots.rotate_right(1);
        self.slots[0] = Some(entry);
    }

    /// Replace the contents with up to three entries, left-aligned
    pub fn restore_bulk(&mut self, entries: impl IntoIterator<Item = HistoryEntry>) {
        let mut entries = entries.into_iter();
        for slot in &mut self.slots {
            *slot = entries.next();
        }
    }

    /// Entry in a slot
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&HistoryEntry> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Number of occupied slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether no slot is occupied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Card text for every slot, placeholders where empty
    #[must_use]
    pub fn cards(&self, placeholder: &str) -> [HistoryCard; HISTORY_CAPACITY] {
        std::array::from_fn(|i| {
            self.get(i)
                .map_or_else(|| empty_card(placeholder), |e| e.card(placeholder))
        })
    }
}

/// Strings pass through, numbers are printed, null and other shapes are absent
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_f64().map(format_number),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_text(&value))
}
