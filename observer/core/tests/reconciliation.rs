//! End-to-end reconciliation tests
//!
//! Drive the observer through the router with wire-shaped events and check
//! both the reconciled state and what reached the render surface.

use observer_core::{
    AgentField, AgentId, Dispatch, EventRouter, Observer, ObserverConfig, OutboundEvent,
    PipelinePhase, RecordingSurface, RenderOp, Slot,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::mpsc;

struct Harness {
    router: EventRouter<RecordingSurface>,
    outbound: mpsc::UnboundedReceiver<OutboundEvent>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(ObserverConfig::default())
    }

    fn with_config(config: ObserverConfig) -> Self {
        let (tx, outbound) = mpsc::unbounded_channel();
        let router = EventRouter::new(Observer::new(RecordingSurface::new(), config, tx));
        Self { router, outbound }
    }

    fn send(&mut self, name: &str, data: Value) -> Dispatch {
        self.router.dispatch(name, data)
    }

    fn surface(&self) -> &RecordingSurface {
        self.router.observer().binder().surface()
    }

    fn reset_surface(&mut self) {
        self.router.observer_mut().binder_mut().surface_mut().clear();
    }

    fn outbound(&mut self) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.outbound.try_recv() {
            events.push(event);
        }
        events
    }
}

fn initialize_two_agents(h: &mut Harness) {
    let stages = json!(["trigger", "intent", "plan", "action"]);
    let outcome = h.send(
        "initialize",
        json!({"agents": [
            {"agent_id": 0, "name": "Ada", "components": stages},
            {"agent_id": 1, "name": "Bo", "components": stages},
        ]}),
    );
    assert_eq!(outcome, Dispatch::Applied);
}

#[test]
fn test_end_to_end_scenario() {
    let mut h = Harness::new();
    initialize_two_agents(&mut h);

    h.send(
        "pipeline_update",
        json!({"agent_id": 0, "stage": "action", "data": {"summary": "said hi"}}),
    );

    let observer = h.router.observer();
    let pipeline = observer.pipelines().get(AgentId(0)).unwrap();
    assert_eq!(pipeline.active_index(), Some(3));
    assert!(pipeline.is_completed());
    assert_eq!(pipeline.summary("action"), Some("said hi"));
    assert_eq!(pipeline.phase(), PipelinePhase::Completed);

    let other = observer.pipelines().get(AgentId(1)).unwrap();
    assert_eq!(other.phase(), PipelinePhase::Built);
}

#[test]
fn test_stage_start_markers_are_ignored() {
    let mut h = Harness::new();
    initialize_two_agents(&mut h);
    h.send("pipeline_update", json!({"agent_id": 1, "stage": "plan"}));
    h.send("pipeline_update", json!({"agent_id": 1, "stage": "action_start"}));

    let pipeline = h.router.observer().pipelines().get(AgentId(1)).unwrap();
    assert_eq!(pipeline.active_stage(), Some("plan"));
}

#[test]
fn test_unknown_stage_is_dropped() {
    let mut h = Harness::new();
    initialize_two_agents(&mut h);
    h.send("pipeline_update", json!({"agent_id": 0, "stage": "intent"}));
    h.reset_surface();

    let outcome = h.send("pipeline_update", json!({"agent_id": 0, "stage": "zzz"}));
    assert_eq!(outcome, Dispatch::Dropped);

    let pipeline = h.router.observer().pipelines().get(AgentId(0)).unwrap();
    assert_eq!(pipeline.active_index(), Some(1));
    assert!(h.surface().ops().is_empty());
    assert_eq!(h.surface().frames(), 0);
}

#[test]
fn test_system_message_is_stored_without_rendering() {
    let mut h = Harness::new();
    h.reset_surface();
    let before = h.router.observer().chat().len();

    h.send("message", json!({"sender": "System", "message": "hello"}));

    assert_eq!(h.router.observer().chat().len(), before + 1);
    assert!(h.surface().ops().is_empty());
    assert_eq!(h.surface().frames(), 0);
}

#[test]
fn test_patches_accumulate_across_events() {
    let mut h = Harness::new();
    h.send("update_agent1", json!({"tension": 5}));
    h.send("agent_update", json!({"agentId": 0, "goal": "x"}));
    h.send("update_agent2", json!({"plan": {"tactics": ["a", "b"]}}));

    let observer = h.router.observer();
    let ada = observer.agents().get(AgentId(0)).unwrap();
    assert_eq!(ada.tension, Some(5.0));
    assert_eq!(ada.goal.as_deref(), Some("x"));

    let bo = observer.agents().get(AgentId(1)).unwrap();
    assert_eq!(bo.tactics, Some(vec!["a".to_string(), "b".to_string()]));
    assert_eq!(
        h.surface()
            .ops_for(Slot::AgentPanel(AgentId(1)))
            .last()
            .cloned(),
        Some(RenderOp::AgentField {
            field: AgentField::Tactics,
            text: "a, b".to_string()
        })
    );
}

#[test]
fn test_wrong_typed_fields_do_not_drop_update() {
    let mut h = Harness::new();
    let outcome = h.send(
        "update_agent1",
        json!({"name": "Ada", "tension": 7, "goal": "win", "plan": {"tactics": [{"t": "x"}]}}),
    );
    assert_eq!(outcome, Dispatch::Applied);

    let outcome = h.send("update_agent1", json!({"tension": "high", "personality": "dry"}));
    assert_eq!(outcome, Dispatch::Applied);

    let ada = h.router.observer().agents().get(AgentId(0)).unwrap();
    assert_eq!(ada.name, "Ada");
    assert_eq!(ada.tension, Some(7.0));
    assert_eq!(ada.goal.as_deref(), Some("win"));
    assert_eq!(ada.personality.as_deref(), Some("dry"));
    assert_eq!(ada.tactics, None);
}

#[test]
fn test_empty_components_keep_pipeline_and_apply_stage() {
    let mut h = Harness::new();
    initialize_two_agents(&mut h);

    let outcome = h.send(
        "pipeline_update",
        json!({"agent_id": 0, "stage": "intent", "data": {"components": [], "summary": "s"}}),
    );
    assert_eq!(outcome, Dispatch::Applied);

    let pipeline = h.router.observer().pipelines().get(AgentId(0)).unwrap();
    assert_eq!(pipeline.stages().len(), 4);
    assert_eq!(pipeline.active_index(), Some(1));
    assert_eq!(pipeline.summary("intent"), Some("s"));
}

#[test]
fn test_config_event_sets_names_by_position() {
    let mut h = Harness::new();
    h.send("update_agent1", json!({"goal": "keep"}));
    h.send(
        "config",
        json!({"config": {"agents": [
            {"name": "Ada", "personality": "dry", "goal": "ignored"},
            {"name": "Bo", "personality": "warm"},
        ]}}),
    );

    let observer = h.router.observer();
    let ada = observer.agents().get(AgentId(0)).unwrap();
    assert_eq!(ada.name, "Ada");
    assert_eq!(ada.personality.as_deref(), Some("dry"));
    assert_eq!(ada.goal.as_deref(), Some("keep"));
    assert_eq!(observer.agents().get(AgentId(1)).unwrap().name, "Bo");
}

#[test]
fn test_history_ring_through_events() {
    let mut h = Harness::new();
    for n in 1..=4 {
        h.send(
            "llm_interaction",
            json!({"prompt": format!("p{n}"), "response": format!("r{n}"), "step_title": "Plan", "elapsed_time": n}),
        );
    }
    let history = h.router.observer().history();
    assert_eq!(history.len(), 3);
    assert_eq!(history.get(0).unwrap().prompt.as_deref(), Some("p4"));
    assert_eq!(history.get(2).unwrap().prompt.as_deref(), Some("p2"));

    let card = h
        .surface()
        .ops_for(Slot::History(0))
        .last()
        .cloned();
    let Some(RenderOp::HistoryCard(card)) = card else {
        panic!("no history card drawn");
    };
    assert_eq!(card.step, "Step: Plan");
    assert_eq!(card.elapsed, "Time elapsed: 4");
}

#[test]
fn test_restore_depends_only_on_payload() {
    let payload = json!({
        "agent_states": {
            "0": {"name": "Ada", "tension": 3, "pipeline": {"components": ["a", "b", "c"], "stage": "b"}},
            "1": {"name": "Bo", "plan": {"goal": "win"}}
        },
        "conversation_history": [{"prompt": "p", "response": "r"}],
        "messages": [
            {"sender": "Ada", "sender_id": 0, "message": "hi"},
            {"sender": "System", "message": "note"}
        ]
    });

    let mut dirty = Harness::new();
    dirty.send("connect", Value::Null);
    initialize_two_agents(&mut dirty);
    dirty.send("update_agent1", json!({"goal": "stale", "interior": "old"}));
    dirty.send("pipeline_update", json!({"agent_id": 1, "stage": "action", "data": {"summary": "x"}}));
    dirty.send("message", json!({"sender": "Bo", "sender_id": 1, "message": "stale"}));
    for n in 0..3 {
        dirty.send("llm_interaction", json!({"prompt": n}));
    }
    dirty.send("restore_state", payload.clone());

    let mut clean = Harness::new();
    clean.send("connect", Value::Null);
    clean.send("restore_state", payload);

    let restored = dirty.router.observer().snapshot();
    assert_eq!(restored, clean.router.observer().snapshot());

    assert_eq!(restored.agents.len(), 2);
    assert_eq!(restored.agents[0].goal, None);
    assert_eq!(restored.agents[1].goal.as_deref(), Some("win"));
    assert_eq!(restored.pipelines.len(), 1);
    assert_eq!(restored.pipelines[0].state.active_index(), Some(1));
    assert_eq!(restored.history.iter().flatten().count(), 1);
    assert_eq!(restored.chat.len(), 2);
    assert!(!dirty.router.observer().is_revealing());
}

#[test]
fn test_restore_presents_one_frame() {
    let mut h = Harness::new();
    initialize_two_agents(&mut h);
    h.reset_surface();

    h.send(
        "restore",
        json!({
            "agentStates": [{"name": "Ada", "pipeline": {"components": ["a"]}}, null],
            "conversationHistory": {"prompts": ["p"], "responses": ["r"], "titles": [""], "times": [""]},
            "messages": [{"sender": "Ada", "sender_id": 0, "message": "hi"}]
        }),
    );

    let surface = h.surface();
    assert_eq!(surface.frames(), 1);
    assert_eq!(surface.ops()[0], (Slot::ChatLog, RenderOp::ChatClear));
    assert_eq!(
        surface.ops().last().map(|(slot, _)| *slot),
        Some(Slot::ChatLog)
    );
    assert_eq!(
        surface.ops_for(Slot::Pipeline(AgentId(1))).next(),
        Some(&RenderOp::PipelineRebuild { stages: Vec::new() })
    );
}

#[test]
fn test_malformed_restore_changes_nothing() {
    let mut h = Harness::new();
    initialize_two_agents(&mut h);
    let before = h.router.observer().snapshot();
    h.reset_surface();

    let outcome = h.send("restore", json!({"agent_states": {"left": {"name": "X"}}}));

    assert_eq!(outcome, Dispatch::Dropped);
    assert_eq!(h.router.observer().snapshot(), before);
    assert_eq!(h.surface().frames(), 0);
}

#[test]
fn test_autostart_once_per_connection() {
    let mut h = Harness::new();
    h.send("connect", Value::Null);
    h.send("connect", Value::Null);
    assert_eq!(h.outbound(), vec![OutboundEvent::RequestAutostart]);

    h.send("disconnect", Value::Null);
    h.send("connect", Value::Null);
    assert_eq!(h.outbound(), vec![OutboundEvent::RequestAutostart]);
}

#[test]
fn test_no_autostart_when_active_or_disabled() {
    let mut h = Harness::new();
    h.send("conversation_status", json!({"active": true, "status": "running"}));
    h.send("connect", Value::Null);
    assert!(h.outbound().is_empty());

    let mut config = ObserverConfig::default();
    config.auto_start = false;
    let mut h = Harness::with_config(config);
    h.send("connect", Value::Null);
    assert!(h.outbound().is_empty());
}

#[test]
fn test_start_conversation_is_noop_when_active() {
    let mut h = Harness::new();
    assert!(h.router.observer_mut().start_conversation());
    assert_eq!(h.outbound(), vec![OutboundEvent::StartConversation]);

    h.send("conversation_status", json!({"active": true}));
    assert!(!h.router.observer_mut().start_conversation());
    assert!(h.outbound().is_empty());
}

#[test]
fn test_disconnect_keeps_state() {
    let mut h = Harness::new();
    h.send("connect", Value::Null);
    initialize_two_agents(&mut h);
    h.send("message", json!({"sender": "Ada", "sender_id": 0, "message": "hi"}));
    let before = h.router.observer().snapshot();

    h.send("disconnect", Value::Null);

    let after = h.router.observer().snapshot();
    assert!(!after.session.connected);
    assert_eq!(after.agents, before.agents);
    assert_eq!(after.pipelines, before.pipelines);
    assert_eq!(after.chat, before.chat);
}

#[test]
fn test_missing_surface_slot_is_not_fatal() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let surface = RecordingSurface::without(&[Slot::Pipeline(AgentId(0))]);
    let mut router = EventRouter::new(Observer::new(surface, ObserverConfig::default(), tx));

    let outcome = router.dispatch(
        "pipeline_update",
        json!({"agent_id": 0, "stage": "a", "data": {"components": ["a", "b"]}}),
    );

    assert_eq!(outcome, Dispatch::Applied);
    let pipeline = router.observer().pipelines().get(AgentId(0)).unwrap();
    assert_eq!(pipeline.active_index(), Some(0));
}
