//! Observer Core - State Reconciliation for a Two-Agent Conversation View
//!
//! This crate keeps the state of a page that watches two agents talk:
//! their panels, their processing pipelines, the chat log and a short
//! history of prompt/response exchanges. It consumes the named events an
//! upstream server pushes and turns them into render instructions for
//! whatever surface is attached. It never draws anything itself.
//!
//! # Architecture
//!
//! ```text
//!  transport ──▶ EventRouter ──▶ Observer ─┬─▶ AgentRoster
//!   (lines)        (parse,        (reduce)  ├─▶ PipelineBoard
//!                   log, drop)              ├─▶ ChatLog
//!                                           ├─▶ ConversationRing
//!                                           └─▶ TextReveal (per dialogue)
//!                                                    │
//!                                              DisplayBinder
//!                                             (slot ▶ target,
//!                                             one frame/event)
//!                                                    │
//!                                              RenderSurface
//!                                          (terminal, log, recorder)
//! ```
//!
//! # Key Types
//!
//! - [`Observer`]: owns all state, applies one [`InboundEvent`] at a time
//! - [`EventRouter`]: entry point for named events and wire lines
//! - [`DisplayBinder`] / [`RenderSurface`]: the only path to the screen
//! - [`ObserverConfig`]: TOML + environment configuration
//!
//! # Quick Start
//!
//! ```
//! use observer_core::{EventRouter, Observer, ObserverConfig, RecordingSurface};
//! use tokio::sync::mpsc;
//!
//! let (tx, _rx) = mpsc::unbounded_channel();
//! let observer = Observer::new(RecordingSurface::new(), ObserverConfig::default(), tx);
//! let mut router = EventRouter::new(observer);
//!
//! router.handle_line(r#"{"event": "connect"}"#);
//! router.handle_line(r#"{"event": "initialize", "data": {"agents": [{"name": "Ada"}]}}"#);
//!
//! let agent = router.observer().agents().iter().next().unwrap();
//! assert_eq!(agent.name, "Ada");
//! ```
//!
//! # No UI Dependencies
//!
//! Nothing here depends on a terminal or GUI toolkit. Surfaces implement
//! [`RenderSurface`] in their own crates.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod binder;
pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod observer;
pub mod pipeline;
pub mod reveal;
pub mod router;
pub mod surface;

// Re-exports for convenience
pub use agent::{AgentField, AgentId, AgentPatch, AgentRecord, AgentRoster, InteriorState};
pub use binder::{DisplayBinder, RenderOp, RenderSurface, Slot, TargetId};
pub use chat::{ChatLine, ChatLog, ChatMessage, MessageCategory, MessageExtra};
pub use error::ReconcileError;
pub use events::{EventFrame, InboundEvent, OutboundEvent};
pub use history::{ConversationRing, HistoryCard, HistoryEntry, HISTORY_CAPACITY};
pub use observer::{Observer, ObserverSnapshot, PipelineView, SessionState};
pub use pipeline::{PipelineBoard, PipelinePhase, PipelineState, StageAdvance};
pub use reveal::{RevealHandle, TextReveal};
pub use router::{Dispatch, EventRouter};
pub use surface::{LogSurface, RecordingSurface};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, DisplayConfig, ObserverConfig, ObserverToml, RevealConfig,
};
