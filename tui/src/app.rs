//! Main Application
//!
//! The App owns the observer core and drives it from a single
//! `tokio::select!` loop:
//! - keyboard input (quit, start conversation, scroll)
//! - recorded frames, replayed at the configured interval
//! - the dialogue reveal tick, armed only while a reveal runs
//!
//! Only one branch runs at a time, so events reach the core strictly in order
//! and the core itself needs no locking.

use std::collections::VecDeque;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::backend::Backend;
use ratatui::Terminal;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use observer_core::{AgentId, Dispatch, EventRouter, Observer, ObserverConfig, OutboundEvent};

use crate::display::TerminalSurface;
use crate::view;
use crate::widgets::ChatScroll;

/// Lines moved per scroll key press
const SCROLL_STEP: usize = 1;

/// Lines moved per page key press
const PAGE_STEP: usize = 10;

/// Main application state
pub struct App {
    /// Is the app still running?
    running: bool,
    /// Core with its terminal surface
    router: EventRouter<TerminalSurface>,
    /// Events the core sends upstream
    outbound: mpsc::UnboundedReceiver<OutboundEvent>,
    /// Recorded frames not yet replayed
    pending: VecDeque<String>,
    /// Chat scroll position
    chat_scroll: ChatScroll,
    /// Redraw even if the core presented nothing
    redraw: bool,
    /// Delay between replayed frames
    replay_interval: Duration,
    /// Reveal tick period
    reveal_tick: Duration,
}

impl App {
    /// Create an app that will replay `frames`
    pub fn new(config: ObserverConfig, frames: impl IntoIterator<Item = String>) -> Self {
        let (tx, outbound) = mpsc::unbounded_channel();
        let replay_interval = config.replay_interval;
        let reveal_tick = config.reveal.tick;
        let router = EventRouter::new(Observer::new(TerminalSurface::new(), config, tx));

        Self {
            running: true,
            router,
            outbound,
            pending: frames.into_iter().collect(),
            chat_scroll: ChatScroll::default(),
            redraw: true,
            replay_interval,
            reveal_tick,
        }
    }

    /// Main event loop
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        let mut input = EventStream::new();

        let mut replay = tokio::time::interval(self.replay_interval.max(Duration::from_millis(1)));
        replay.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reveal = tokio::time::interval(self.reveal_tick);
        reveal.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.router.dispatch("connect", Value::Null);
        self.render(terminal)?;

        while self.running {
            let revealing = self.router.observer().is_revealing();
            let replaying = !self.pending.is_empty();

            tokio::select! {
                biased;

                maybe_event = input.next() => match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => self.handle_key(key),
                    Some(Ok(Event::Resize(..))) => self.redraw = true,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Terminal input failed");
                        self.running = false;
                    }
                    None => self.running = false,
                },

                Some(event) = self.outbound.recv() => {
                    tracing::info!(event = event.name(), "Outbound event");
                }

                _ = reveal.tick(), if revealing => {
                    self.router.observer_mut().tick();
                }

                _ = replay.tick(), if replaying => {
                    self.replay_next();
                }
            }

            self.render(terminal)?;
        }

        Ok(())
    }

    /// Dispatch the next recorded frame, skipping blank lines
    pub fn replay_next(&mut self) -> Option<Dispatch> {
        while let Some(line) = self.pending.pop_front() {
            if let Some(outcome) = self.router.handle_line(&line) {
                return Some(outcome);
            }
        }
        None
    }

    /// Handle keyboard input
    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.running = false;
            }

            KeyCode::Char('s') => {
                self.router.observer_mut().start_conversation();
            }

            KeyCode::Up => self.scroll(|s| s.up(SCROLL_STEP)),
            KeyCode::Down => self.scroll(|s| s.down(SCROLL_STEP)),
            KeyCode::PageUp => self.scroll(|s| s.up(PAGE_STEP)),
            KeyCode::PageDown => self.scroll(|s| s.down(PAGE_STEP)),
            KeyCode::End => self.scroll(ChatScroll::to_bottom),

            _ => {}
        }
    }

    fn scroll(&mut self, f: impl FnOnce(&mut ChatScroll)) {
        f(&mut self.chat_scroll);
        self.redraw = true;
    }

    /// Paint if the core presented a frame or the view changed
    pub fn render<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        let presented = self
            .router
            .observer_mut()
            .binder_mut()
            .surface_mut()
            .take_dirty();
        if !presented && !std::mem::take(&mut self.redraw) {
            return Ok(());
        }
        self.redraw = false;

        let seats: Vec<AgentId> = (0..self.router.observer().config().display.agent_slots)
            .map(AgentId)
            .collect();
        let state = self.router.observer().binder().surface().state();
        let scroll = &mut self.chat_scroll;
        terminal.draw(|frame| view::draw(frame, state, &seats, scroll))?;
        Ok(())
    }

    /// Is the app still running?
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Recorded frames not yet replayed
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The routed core
    pub fn router(&self) -> &EventRouter<TerminalSurface> {
        &self.router
    }
}
