//! Event Router
//!
//! Entry point for the transport: takes named events (or raw wire lines),
//! parses them and hands them to the [`Observer`]. Failures never propagate
//! past this point; they are logged and the event is dropped.

use serde_json::Value;

use crate::binder::RenderSurface;
use crate::events::{EventFrame, InboundEvent};
use crate::observer::Observer;

/// What happened to a dispatched event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Applied to the state
    Applied,
    /// Nobody handles this event name
    Ignored,
    /// Dropped with a warning
    Dropped,
}

/// Routes transport events to the observer
pub struct EventRouter<S> {
    observer: Observer<S>,
}

impl<S: RenderSurface> EventRouter<S> {
    /// Wrap an observer
    pub fn new(observer: Observer<S>) -> Self {
        Self { observer }
    }

    /// Dispatch a named event
    pub fn dispatch(&mut self, name: &str, data: Value) -> Dispatch {
        let event = match InboundEvent::from_wire(name, data) {
            Ok(event) => event,
            Err(err) if err.is_unknown_event() => {
                tracing::debug!(event = name, "Ignoring unknown event");
                return Dispatch::Ignored;
            }
            Err(err) => {
                tracing::warn!(event = name, error = %err, "Dropping event");
                return Dispatch::Dropped;
            }
        };

        match self.observer.apply(event) {
            Ok(()) => Dispatch::Applied,
            Err(err) => {
                tracing::warn!(event = name, error = %err, "Event rejected");
                Dispatch::Dropped
            }
        }
    }

    /// Dispatch a decoded frame
    pub fn dispatch_frame(&mut self, frame: EventFrame) -> Dispatch {
        self.dispatch(&frame.event, frame.data)
    }

    /// Decode and dispatch one wire line; blank lines yield `None`
    pub fn handle_line(&mut self, line: &str) -> Option<Dispatch> {
        match EventFrame::decode(line) {
            Ok(Some(frame)) => Some(self.dispatch_frame(frame)),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "Undecodable frame");
                Some(Dispatch::Dropped)
            }
        }
    }

    /// The routed observer
    #[must_use]
    pub fn observer(&self) -> &Observer<S> {
        &self.observer
    }

    /// The routed observer, mutably
    pub fn observer_mut(&mut self) -> &mut Observer<S> {
        &mut self.observer
    }
}
