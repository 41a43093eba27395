//! Full-screen live view drawn with ratatui.

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs, Wrap};
use tracing::debug;

use crate::error::{Result, SkillViewError};
use crate::execution::StepStatus;
use crate::monitor::{Monitor, NoticeLevel};
use crate::trigger::RunTrigger;

use super::presence::Tone;
use super::surface::{DisplayMode, ProjectionSurface, StepNode, SurfaceTab};

const UI_POLL_INTERVAL: Duration = Duration::from_millis(60);
const HELP: &str = "q quit  ↑↓ select  ⏎ expand  m mode  tab view  \
                    PgUp/PgDn scroll  n/p skill  r run  s show run";

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Up,
    Down,
    ToggleExpand,
    ToggleMode,
    NextTab,
    PageUp,
    PageDown,
    NextSkill,
    PreviousSkill,
    RequestRun,
    ShowRun,
}

pub fn key_action(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(KeyAction::Quit);
    }
    Some(match key.code {
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Up | KeyCode::Char('k') => KeyAction::Up,
        KeyCode::Down | KeyCode::Char('j') => KeyAction::Down,
        KeyCode::Enter | KeyCode::Char(' ') => KeyAction::ToggleExpand,
        KeyCode::Char('m') => KeyAction::ToggleMode,
        KeyCode::Tab => KeyAction::NextTab,
        KeyCode::PageUp => KeyAction::PageUp,
        KeyCode::PageDown => KeyAction::PageDown,
        KeyCode::Char('n') => KeyAction::NextSkill,
        KeyCode::Char('p') => KeyAction::PreviousSkill,
        KeyCode::Char('r') => KeyAction::RequestRun,
        KeyCode::Char('s') => KeyAction::ShowRun,
        _ => return None,
    })
}

/// Skill cycling state for the `n`/`p` keys.
#[derive(Debug, Clone, Default)]
pub struct SkillCursor {
    names: Vec<String>,
    position: Option<usize>,
}

impl SkillCursor {
    pub fn new(names: Vec<String>, current: Option<&str>) -> Self {
        let position = current.and_then(|name| names.iter().position(|n| n == name));
        Self { names, position }
    }

    pub fn step(&mut self, forward: bool) -> Option<&str> {
        if self.names.is_empty() {
            return None;
        }
        let len = self.names.len();
        let next = match (self.position, forward) {
            (None, true) => 0,
            (None, false) => len - 1,
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
        };
        self.position = Some(next);
        self.names.get(next).map(String::as_str)
    }
}

/// Apply `action`; returns false when the loop should stop.
pub fn apply_action(
    monitor: &mut Monitor,
    skills: &mut SkillCursor,
    trigger: &dyn RunTrigger,
    action: KeyAction,
) -> bool {
    if action == KeyAction::Quit {
        return false;
    }
    let result = match action {
        KeyAction::NextSkill | KeyAction::PreviousSkill => {
            match skills.step(action == KeyAction::NextSkill).map(str::to_string) {
                Some(name) => monitor.load_skill(&name),
                None => Ok(()),
            }
        }
        KeyAction::RequestRun => monitor.request_run(trigger),
        KeyAction::ShowRun => monitor.activate_presence(),
        view_action => {
            if let Some(surface) = monitor.surface_mut() {
                apply_view_action(surface, view_action);
            }
            Ok(())
        }
    };
    if let Err(err) = result {
        // Trigger and surface failures already produced a notification.
        if !matches!(err, SkillViewError::Trigger(_) | SkillViewError::SurfaceUnavailable(_)) {
            monitor.notify(NoticeLevel::Error, err.to_string());
        }
    }
    true
}

fn apply_view_action(surface: &mut ProjectionSurface, action: KeyAction) {
    match action {
        KeyAction::Up => surface.select_previous(),
        KeyAction::Down => surface.select_next(),
        KeyAction::ToggleExpand => surface.toggle_expanded(),
        KeyAction::ToggleMode => surface.toggle_mode(),
        KeyAction::NextTab => surface.next_tab(),
        KeyAction::PageUp => surface.page_up(),
        KeyAction::PageDown => surface.page_down(),
        _ => {}
    }
}

/// Run the live view until the user quits.
pub fn run_watch_tui(
    monitor: &mut Monitor,
    trigger: &dyn RunTrigger,
    mut skills: SkillCursor,
) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, monitor, trigger, &mut skills);
    teardown_terminal(&mut terminal)?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    monitor: &mut Monitor,
    trigger: &dyn RunTrigger,
    skills: &mut SkillCursor,
) -> Result<()> {
    loop {
        monitor.tick(Duration::ZERO);
        let body_rows = draw(terminal, monitor)?;
        if let Some(surface) = monitor.surface_mut() {
            surface.set_viewport_rows(body_rows);
        }

        let ready = event::poll(UI_POLL_INTERVAL)
            .map_err(|e| SkillViewError::Terminal(format!("poll events: {e}")))?;
        if !ready {
            continue;
        }
        let Event::Key(key) =
            event::read().map_err(|e| SkillViewError::Terminal(format!("read event: {e}")))?
        else {
            continue;
        };
        let Some(action) = key_action(&key) else {
            continue;
        };
        debug!(target: "surface", ?action, "key");
        if !apply_action(monitor, skills, trigger, action) {
            return Ok(());
        }
    }
}

fn draw(terminal: &mut Terminal<CrosstermBackend<Stdout>>, monitor: &Monitor) -> Result<usize> {
    let mut body_rows = 0usize;
    terminal
        .draw(|frame| {
            let sections = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Length(1),
                    Constraint::Min(5),
                    Constraint::Length(4),
                ])
                .split(frame.area());

            frame.render_widget(header(monitor), sections[0]);

            let surface = monitor.surface();
            let tab = surface.map_or(SurfaceTab::Execution, |s| s.view().tab);
            let tabs = Tabs::new(vec!["Execution", "Definition"])
                .select(match tab {
                    SurfaceTab::Execution => 0,
                    SurfaceTab::Definition => 1,
                })
                .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
            frame.render_widget(tabs, sections[1]);

            body_rows = usize::from(sections[2].height.saturating_sub(2));
            let steps = match surface {
                Some(surface) => body(surface),
                None => Paragraph::new(vec![
                    Line::raw("Waiting for a run."),
                    Line::raw("Press n to browse skills or s to open the current run."),
                ])
                .block(Block::default().title("Steps").borders(Borders::ALL)),
            };
            frame.render_widget(steps, sections[2]);

            frame.render_widget(footer(monitor), sections[3]);
        })
        .map_err(|e| SkillViewError::Terminal(format!("draw: {e}")))?;
    Ok(body_rows)
}

fn header(monitor: &Monitor) -> Paragraph<'static> {
    let (text, style) = match monitor.presence().label() {
        Some(label) => (
            label.text.clone(),
            match label.tone {
                Tone::Attention => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                Tone::Success => Style::default().fg(Color::Green),
                Tone::Failure => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            },
        ),
        None => ("idle".to_string(), Style::default().fg(Color::Gray)),
    };
    let state = monitor.state();
    let detail = if state.skill_name.is_empty() {
        format!("watching {}", monitor.detector().path().display())
    } else {
        format!("{}  status={}", state.skill_name, state.status)
    };
    Paragraph::new(vec![Line::styled(text, style), Line::raw(detail)]).block(
        Block::default()
            .title("skillview")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
}

fn body(surface: &ProjectionSurface) -> Paragraph<'static> {
    let view = surface.view();
    let mut lines = Vec::new();
    if view.tab == SurfaceTab::Definition {
        lines.extend(definition_lines(surface));
    }
    for (index, node) in surface.nodes().iter().enumerate() {
        let selected = index == view.selected;
        lines.push(node_line(node, selected));
        if view.expanded == Some(index) {
            lines.extend(
                node.detail_lines()
                    .into_iter()
                    .map(|detail| {
                        Line::styled(format!("      {detail}"), Style::default().fg(Color::Gray))
                    }),
            );
        }
        if view.mode == DisplayMode::Flow {
            let connector = if index + 1 < surface.nodes().len() { "   │" } else { "" };
            lines.push(Line::styled(connector, Style::default().fg(Color::DarkGray)));
        }
    }
    let scroll = if view.tab == SurfaceTab::Execution {
        u16::try_from(view.scroll_offset).unwrap_or(u16::MAX)
    } else {
        0
    };
    let title = format!("{}  [{}]", surface.skill_name(), view.mode);
    Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
}

fn definition_lines(surface: &ProjectionSurface) -> Vec<Line<'static>> {
    let Some(definition) = surface.definition() else {
        return Vec::new();
    };
    let mut lines = vec![Line::styled(
        definition.description.clone(),
        Style::default().add_modifier(Modifier::ITALIC),
    )];
    for input in &definition.inputs {
        let required = if input.required { " (required)" } else { "" };
        lines.push(Line::raw(format!("  in  {}: {}{required}", input.name, input.input_type)));
    }
    for output in &definition.outputs {
        lines.push(Line::raw(format!("  out {}", output.name)));
    }
    for diagnostic in surface.diagnostics() {
        lines.push(Line::styled(format!("  ! {diagnostic}"), Style::default().fg(Color::Yellow)));
    }
    lines.push(Line::raw(""));
    lines
}

fn node_line(node: &StepNode, selected: bool) -> Line<'static> {
    let color = match node.runtime.status {
        StepStatus::Pending => Color::Gray,
        StepStatus::Running => Color::Yellow,
        StepStatus::Success => Color::Green,
        StepStatus::Failed => Color::Red,
        StepStatus::Skipped => Color::DarkGray,
    };
    let mut style = Style::default().fg(color);
    if selected {
        style = style.add_modifier(Modifier::REVERSED);
    }
    if node.runtime.status == StepStatus::Running {
        style = style.add_modifier(Modifier::BOLD);
    }
    let marker = if selected { "▸ " } else { "  " };
    Line::from(vec![Span::raw(marker), Span::styled(node.summary_line(), style)])
}

fn footer(monitor: &Monitor) -> Paragraph<'static> {
    let mut lines: Vec<Line<'static>> = monitor
        .notifications()
        .iter()
        .rev()
        .take(2)
        .map(|n| {
            let color = match n.level {
                NoticeLevel::Info => Color::Cyan,
                NoticeLevel::Warning => Color::Yellow,
                NoticeLevel::Error => Color::Red,
            };
            Line::styled(
                format!("{} {}", n.at.format("%H:%M:%S"), n.message),
                Style::default().fg(color),
            )
        })
        .collect();
    lines.reverse();
    lines.push(Line::styled(HELP, Style::default().fg(Color::DarkGray)));
    Paragraph::new(lines).block(Block::default().borders(Borders::TOP))
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().map_err(|e| SkillViewError::Terminal(format!("enable raw mode: {e}")))?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)
        .map_err(|e| SkillViewError::Terminal(format!("enter alternate screen: {e}")))?;
    Terminal::new(CrosstermBackend::new(stdout))
        .map_err(|e| SkillViewError::Terminal(format!("initialize terminal: {e}")))
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().map_err(|e| SkillViewError::Terminal(format!("disable raw mode: {e}")))?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)
        .map_err(|e| SkillViewError::Terminal(format!("leave alternate screen: {e}")))?;
    terminal
        .show_cursor()
        .map_err(|e| SkillViewError::Terminal(format!("restore cursor: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(key_action(&press(KeyCode::Char('q'))), Some(KeyAction::Quit));
        assert_eq!(key_action(&press(KeyCode::Down)), Some(KeyAction::Down));
        assert_eq!(key_action(&press(KeyCode::Char('j'))), Some(KeyAction::Down));
        assert_eq!(key_action(&press(KeyCode::Tab)), Some(KeyAction::NextTab));
        assert_eq!(key_action(&press(KeyCode::Char('z'))), None);
        assert_eq!(
            key_action(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyAction::Quit)
        );
    }

    #[test]
    fn skill_cursor_wraps() {
        let mut cursor = SkillCursor::new(vec!["a".into(), "b".into()], Some("b"));
        assert_eq!(cursor.step(true), Some("a"));
        assert_eq!(cursor.step(false), Some("b"));
        let mut empty = SkillCursor::default();
        assert_eq!(empty.step(true), None);
    }

    #[test]
    fn view_actions_drive_the_surface() {
        let mut surface = ProjectionSurface::new(DisplayMode::Flow);
        surface.apply(
            &crate::execution::ExecutionState::begin(
                "demo",
                Some(1),
                vec![
                    crate::execution::StepRuntime::pending("a"),
                    crate::execution::StepRuntime::pending("b"),
                ],
            ),
            true,
        );
        apply_view_action(&mut surface, KeyAction::Down);
        apply_view_action(&mut surface, KeyAction::ToggleExpand);
        apply_view_action(&mut surface, KeyAction::ToggleMode);
        assert_eq!(surface.view().selected, 1);
        assert_eq!(surface.view().expanded, Some(1));
        assert_eq!(surface.view().mode, DisplayMode::Compact);
    }
}
