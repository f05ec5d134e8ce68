//! Pipeline State Machine
//!
//! Each agent runs its turns through an ordered sequence of processing stages
//! (trigger, intent, plan, action, ...). The upstream process announces each
//! stage as it runs; this module tracks which one is active, the last summary
//! seen for every stage, and a completion flag.
//!
//! # Phases
//!
//! ```text
//! Empty ──create──▶ Built ──set_active──▶ Running ──last stage──▶ Completed
//!                     ▲                                              │
//!                     └──────────────────create──────────────────────┘
//! ```
//!
//! The completion flag is toggled, not set, whenever the last stage is
//! announced. Two consecutive last-stage announcements therefore leave the
//! flag off again. This mirrors the observed upstream behaviour and is most
//! likely a defect there.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::error::ReconcileError;

/// Pipeline description nested in an agent snapshot
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PipelineSnapshot {
    /// Stage names in order
    #[serde(default, alias = "stages")]
    pub components: Vec<String>,
    /// Last announced stage (may be empty)
    #[serde(default)]
    pub stage: Option<String>,
}

/// Where a pipeline is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PipelinePhase {
    /// No stages defined
    Empty,
    /// Stages assigned, nothing announced yet
    Built,
    /// Some stage is active
    Running,
    /// Last stage active with the completion flag set
    Completed,
}

/// Outcome of a successful stage announcement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageAdvance {
    /// New active index
    pub index: usize,
    /// Index that lost the active marker
    pub previous: Option<usize>,
    /// Summary stored for the stage, if one came with the announcement
    pub summary: Option<String>,
    /// New value of the completion flag, if it was toggled
    pub completed: Option<bool>,
}

/// Stage sequence and progress of one agent
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PipelineState {
    stages: Vec<String>,
    active_index: Option<usize>,
    summaries: BTreeMap<String, String>,
    completed: bool,
}

impl PipelineState {
    /// Build a pipeline from a non-empty stage list
    pub fn new(agent: AgentId, stages: Vec<String>) -> Result<Self, ReconcileError> {
        if stages.is_empty() {
            return Err(ReconcileError::MalformedPayload {
                event: "pipeline".to_string(),
                reason: format!("empty stage list for agent {agent}"),
            });
        }
        Ok(Self {
            stages,
            ..Self::default()
        })
    }

    /// Stage names in order
    #[must_use]
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Index of the active stage
    #[must_use]
    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    /// Name of the active stage
    #[must_use]
    pub fn active_stage(&self) -> Option<&str> {
        self.active_index
            .and_then(|i| self.stages.get(i))
            .map(String::as_str)
    }

    /// Last summary seen for a stage
    #[must_use]
    pub fn summary(&self, stage: &str) -> Option<&str> {
        self.summaries.get(stage).map(String::as_str)
    }

    /// All stored summaries
    #[must_use]
    pub fn summaries(&self) -> &BTreeMap<String, String> {
        &self.summaries
    }

    /// Completion flag
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> PipelinePhase {
        match self.active_index {
            _ if self.stages.is_empty() => PipelinePhase::Empty,
            None => PipelinePhase::Built,
            Some(i) if i + 1 == self.stages.len() && self.completed => PipelinePhase::Completed,
            Some(_) => PipelinePhase::Running,
        }
    }

    /// Mark `stage` active, storing its summary
    pub fn set_active(
        &mut self,
        agent: AgentId,
        stage: &str,
        summary: Option<&str>,
    ) -> Result<StageAdvance, ReconcileError> {
        if stage.is_empty() {
            return Err(ReconcileError::EmptyStage(agent));
        }
        let index = self
            .stages
            .iter()
            .position(|s| s == stage)
            .ok_or_else(|| ReconcileError::UnknownStage {
                agent,
                stage: stage.to_string(),
            })?;

        let previous = self.active_index.replace(index);
        let summary = summary.map(|text| {
            self.summaries.insert(stage.to_string(), text.to_string());
            text.to_string()
        });
        let completed = (index + 1 == self.stages.len()).then(|| self.toggle_completion());

        Ok(StageAdvance {
            index,
            previous,
            summary,
            completed,
        })
    }

    /// Flip the completion flag, returning the new value
    pub fn toggle_completion(&mut self) -> bool {
        self.completed = !self.completed;
        self.completed
    }
}

/// The pipelines of every agent
#[derive(Debug, Default)]
pub struct PipelineBoard {
    pipelines: BTreeMap<AgentId, PipelineState>,
}

impl PipelineBoard {
    /// Create an empty board
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `createPipeline`: replace the agent's pipeline wholesale
    pub fn create(
        &mut self,
        agent: AgentId,
        stages: Vec<String>,
    ) -> Result<&PipelineState, ReconcileError> {
        let state = PipelineState::new(agent, stages)?;
        self.pipelines.insert(agent, state);
        Ok(&self.pipelines[&agent])
    }

    /// `setActiveStage`: announce a stage on the agent's pipeline
    pub fn set_active_stage(
        &mut self,
        agent: AgentId,
        stage: &str,
        summary: Option<&str>,
    ) -> Result<StageAdvance, ReconcileError> {
        self.pipelines
            .get_mut(&agent)
            .ok_or(ReconcileError::NoPipeline(agent))?
            .set_active(agent, stage, summary)
    }

    /// Explicit completion switch
    pub fn toggle_completion(&mut self, agent: AgentId) -> Result<bool, ReconcileError> {
        self.pipelines
            .get_mut(&agent)
            .map(PipelineState::toggle_completion)
            .ok_or(ReconcileError::NoPipeline(agent))
    }

    /// Drop every pipeline (restoration only)
    pub fn clear(&mut self) {
        self.pipelines.clear();
    }

    /// Look up a pipeline
    #[must_use]
    pub fn get(&self, agent: AgentId) -> Option<&PipelineState> {
        self.pipelines.get(&agent)
    }

    /// Iterate pipelines in agent order
    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &PipelineState)> {
        self.pipelines.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const A: AgentId = AgentId(0);

    fn stages(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn board() -> PipelineBoard {
        let mut board = PipelineBoard::new();
        board.create(A, stages(&["a", "b", "c"])).unwrap();
        board
    }

    #[test]
    fn test_create_is_built() {
        let board = board();
        let p = board.get(A).unwrap();
        assert_eq!(p.phase(), PipelinePhase::Built);
        assert_eq!(p.active_index(), None);
        assert!(!p.is_completed());
    }

    #[test]
    fn test_progression_to_completed() {
        let mut board = board();
        let step = board.set_active_stage(A, "b", None).unwrap();
        assert_eq!(step.index, 1);
        assert_eq!(step.completed, None);
        assert_eq!(board.get(A).unwrap().phase(), PipelinePhase::Running);

        let step = board.set_active_stage(A, "c", None).unwrap();
        assert_eq!(step.previous, Some(1));
        assert_eq!(step.completed, Some(true));
        let p = board.get(A).unwrap();
        assert_eq!(p.phase(), PipelinePhase::Completed);
        assert!(p.is_completed());
    }

    #[test]
    fn test_repeated_last_stage_toggles_back() {
        let mut board = board();
        board.set_active_stage(A, "c", None).unwrap();
        let step = board.set_active_stage(A, "c", None).unwrap();
        assert_eq!(step.completed, Some(false));
        assert_eq!(board.get(A).unwrap().phase(), PipelinePhase::Running);
    }

    #[test]
    fn test_unknown_stage_keeps_state() {
        let mut board = board();
        board.set_active_stage(A, "a", None).unwrap();
        let err = board.set_active_stage(A, "zzz", Some("lost")).unwrap_err();
        assert!(matches!(err, ReconcileError::UnknownStage { .. }));
        let p = board.get(A).unwrap();
        assert_eq!(p.active_index(), Some(0));
        assert_eq!(p.summary("zzz"), None);
    }

    #[test]
    fn test_empty_stage_rejected() {
        let mut board = board();
        assert!(matches!(
            board.set_active_stage(A, "", None),
            Err(ReconcileError::EmptyStage(_))
        ));
    }

    #[test]
    fn test_summaries_accumulate() {
        let mut board = board();
        board.set_active_stage(A, "a", Some("first")).unwrap();
        board.set_active_stage(A, "b", Some("second")).unwrap();
        board.set_active_stage(A, "a", Some("again")).unwrap();
        let p = board.get(A).unwrap();
        assert_eq!(p.summary("a"), Some("again"));
        assert_eq!(p.summary("b"), Some("second"));
        assert_eq!(p.active_stage(), Some("a"));
    }

    #[test]
    fn test_recreate_clears_progress() {
        let mut board = board();
        board.set_active_stage(A, "c", Some("done")).unwrap();
        board.create(A, stages(&["x", "y"])).unwrap();
        let p = board.get(A).unwrap();
        assert_eq!(p.phase(), PipelinePhase::Built);
        assert!(p.summaries().is_empty());
        assert!(!p.is_completed());
    }

    #[test]
    fn test_empty_create_keeps_prior_pipeline() {
        let mut board = board();
        assert!(board.create(A, Vec::new()).is_err());
        assert_eq!(board.get(A).unwrap().stages().len(), 3);
    }

    #[test]
    fn test_missing_pipeline() {
        let mut board = PipelineBoard::new();
        assert!(matches!(
            board.set_active_stage(AgentId(1), "a", None),
            Err(ReconcileError::NoPipeline(AgentId(1)))
        ));
        assert!(board.toggle_completion(AgentId(1)).is_err());
    }

    #[test]
    fn test_explicit_toggle() {
        let mut board = board();
        assert!(board.toggle_completion(A).unwrap());
        assert!(!board.toggle_completion(A).unwrap());
    }
}
