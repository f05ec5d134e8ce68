//! View
//!
//! Paints a [`DisplayState`] into a ratatui frame.
//!
//! ```text
//!  status ───────────────────────────────────────────────
//!  ┌ Agent 0 ──────────────┐┌ Agent 1 ──────────────┐
//!  │ fields                ││ fields                │
//!  │ pipeline              ││ pipeline              │
//!  │ dialogue              ││ dialogue              │
//!  └───────────────────────┘└───────────────────────┘
//!  ┌ Chat ─────────────────────┐┌ History ───────────┐
//!  └───────────────────────────┘└────────────────────┘
//!  keys ─────────────────────────────────────────────
//! ```

use observer_core::{AgentField, AgentId, HistoryCard};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::display::{DialogueDisplay, DisplayState, PipelineDisplay};
use crate::theme::{
    seat_color, ACTIVE_YELLOW, DIM_GRAY, LABEL_GRAY, SUCCESS_GREEN,
};
use crate::widgets::{fit_width, ChatBlock, ChatScroll};

/// Key help shown in the footer
const KEY_HELP: &str = " q quit | s start conversation | \u{2191}/\u{2193} scroll chat";

/// Panel fields below the title, in order
const PANEL_FIELDS: [AgentField; 6] = [
    AgentField::Personality,
    AgentField::Tension,
    AgentField::Goal,
    AgentField::ActiveTactic,
    AgentField::Tactics,
    AgentField::Interior,
];

/// Paint the whole screen
pub fn draw(frame: &mut Frame, state: &DisplayState, seats: &[AgentId], chat: &mut ChatScroll) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Percentage(55),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_status(frame, rows[0], state);
    draw_agents(frame, rows[1], state, seats);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[2]);
    draw_chat(frame, bottom[0], state, chat);
    draw_history(frame, bottom[1], state);

    frame.render_widget(
        Paragraph::new(KEY_HELP).style(Style::default().fg(DIM_GRAY)),
        rows[3],
    );
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let (dot, color) = if state.status.active {
        ("\u{25cf}", SUCCESS_GREEN)
    } else {
        ("\u{25cb}", LABEL_GRAY)
    };
    let line = Line::from(vec![
        Span::styled(format!(" {dot} "), Style::default().fg(color)),
        Span::styled(state.status.label.clone(), Style::default().fg(color)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_agents(frame: &mut Frame, area: Rect, state: &DisplayState, seats: &[AgentId]) {
    if seats.is_empty() {
        return;
    }
    #[allow(clippy::cast_possible_truncation)]
    let share = (100 / seats.len()) as u16;
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(seats.iter().map(|_| Constraint::Percentage(share)))
        .split(area);

    for (&id, &column) in seats.iter().zip(columns.iter()) {
        draw_agent(frame, column, state, id);
    }
}

fn draw_agent(frame: &mut Frame, area: Rect, state: &DisplayState, id: AgentId) {
    let accent = seat_color(id);
    let name = state.field(id, AgentField::Name).unwrap_or_default();
    let title = fit_width(&format!(" {name} "), area.width.saturating_sub(2) as usize);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent))
        .title(Span::styled(title, Style::default().fg(accent).add_modifier(Modifier::BOLD)));

    let mut lines: Vec<Line> = PANEL_FIELDS
        .iter()
        .map(|&field| {
            Line::from(vec![
                Span::styled(format!("{}: ", field.label()), Style::default().fg(LABEL_GRAY)),
                Span::raw(state.field(id, field).unwrap_or_default().to_string()),
            ])
        })
        .collect();

    lines.push(Line::default());
    if let Some(pipeline) = state.pipelines.get(&id) {
        lines.extend(pipeline_lines(pipeline));
    }
    lines.push(Line::default());
    if let Some(dialogue) = state.dialogues.get(&id) {
        lines.push(dialogue_line(dialogue, accent));
    }

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn pipeline_lines(pipeline: &PipelineDisplay) -> Vec<Line<'static>> {
    let mut spans = Vec::new();
    for (index, stage) in pipeline.stages.iter().enumerate() {
        if index > 0 {
            spans.push(Span::styled(" \u{203a} ", Style::default().fg(DIM_GRAY)));
        }
        let style = if pipeline.active == Some(index) {
            Style::default()
                .fg(ACTIVE_YELLOW)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else if pipeline.summaries.contains_key(&index) {
            Style::default().fg(LABEL_GRAY)
        } else {
            Style::default().fg(DIM_GRAY)
        };
        spans.push(Span::styled(stage.clone(), style));
    }
    if pipeline.completed {
        spans.push(Span::styled(" \u{2713}", Style::default().fg(SUCCESS_GREEN)));
    }

    let mut lines = vec![Line::from(spans)];
    for (index, stage, summary) in pipeline.summary_lines() {
        let color = if pipeline.active == Some(index) {
            ACTIVE_YELLOW
        } else {
            LABEL_GRAY
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{stage}: "), Style::default().fg(DIM_GRAY)),
            Span::styled(
                summary.to_string(),
                Style::default().fg(color).add_modifier(Modifier::ITALIC),
            ),
        ]));
    }
    lines
}

fn dialogue_line(dialogue: &DialogueDisplay, accent: ratatui::style::Color) -> Line<'static> {
    let mut spans = Vec::new();
    if let Some(emotion) = &dialogue.emotion {
        spans.push(Span::styled(
            format!("[{emotion}] "),
            Style::default().fg(LABEL_GRAY),
        ));
    }
    spans.push(Span::styled(dialogue.text.clone(), Style::default().fg(accent)));
    Line::from(spans)
}

fn draw_chat(frame: &mut Frame, area: Rect, state: &DisplayState, scroll: &mut ChatScroll) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(DIM_GRAY))
        .title(" Chat ");
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_stateful_widget(ChatBlock::new(&state.chat), inner, scroll);
}

fn draw_history(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(DIM_GRAY))
        .title(" History ");

    let mut lines = Vec::new();
    for card in state.history.iter().flatten() {
        lines.extend(card_lines(card));
    }
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn card_lines(card: &HistoryCard) -> Vec<Line<'static>> {
    vec![
        Line::from(Span::styled(
            card.step.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("> {}", card.prompt),
            Style::default().fg(LABEL_GRAY),
        )),
        Line::from(format!("< {}", card.response)),
        Line::from(Span::styled(card.elapsed.clone(), Style::default().fg(DIM_GRAY))),
        Line::default(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use observer_core::{RenderOp, Slot};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buf = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buf.area.height {
            for x in 0..buf.area.width {
                text.push_str(buf[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_draws_panels_pipeline_and_status() {
        let mut state = DisplayState::new();
        let ada = AgentId(0);
        state.apply(
            Slot::AgentPanel(ada),
            RenderOp::AgentField {
                field: AgentField::Name,
                text: "Ada".into(),
            },
        );
        state.apply(
            Slot::Pipeline(ada),
            RenderOp::PipelineRebuild {
                stages: vec!["trigger".into(), "plan".into()],
            },
        );
        state.apply(
            Slot::Status,
            RenderOp::SessionStatus {
                active: true,
                label: "running".into(),
            },
        );

        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        let mut scroll = ChatScroll::default();
        terminal
            .draw(|frame| draw(frame, &state, &[ada, AgentId(1)], &mut scroll))
            .unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("Ada"));
        assert!(text.contains("trigger"));
        assert!(text.contains("running"));
        assert!(text.contains("History"));
    }

    #[test]
    fn test_earlier_summaries_stay_visible() {
        let mut state = DisplayState::new();
        let ada = AgentId(0);
        let pipeline = Slot::Pipeline(ada);
        state.apply(
            pipeline,
            RenderOp::PipelineRebuild {
                stages: vec!["trigger".into(), "plan".into(), "action".into()],
            },
        );
        state.apply(pipeline, RenderOp::PipelineActive { index: 0 });
        state.apply(
            pipeline,
            RenderOp::PipelineSummary {
                index: 0,
                summary: "heard a greeting".into(),
            },
        );
        state.apply(pipeline, RenderOp::PipelineActive { index: 1 });
        state.apply(
            pipeline,
            RenderOp::PipelineSummary {
                index: 1,
                summary: "reply politely".into(),
            },
        );

        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        let mut scroll = ChatScroll::default();
        terminal
            .draw(|frame| draw(frame, &state, &[ada, AgentId(1)], &mut scroll))
            .unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("trigger: heard a greeting"));
        assert!(text.contains("plan: reply politely"));
    }

    #[test]
    fn test_tiny_terminal_does_not_panic() {
        let state = DisplayState::new();
        let mut terminal = Terminal::new(TestBackend::new(8, 4)).unwrap();
        let mut scroll = ChatScroll::default();
        terminal
            .draw(|frame| draw(frame, &state, &[AgentId(0), AgentId(1)], &mut scroll))
            .unwrap();
    }
}
