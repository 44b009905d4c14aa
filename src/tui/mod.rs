mod help;

use crate::cli::{build_config, Cli};
use crate::controller::{self, UiCommand};
use crate::model::{
    AppEvent, ScriptDefinition, StatusReport, TIMEOUT_MAX, TIMEOUT_MIN,
};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Terminal,
};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Field order in the add-script form.
const FORM_FIELDS: [&str; 5] = ["Name", "Path", "Interpreter", "Args", "Timeout (s)"];

#[derive(Default)]
struct AddForm {
    active: bool,
    field: usize,
    values: [String; 5],
}

impl AddForm {
    fn open() -> Self {
        let mut form = Self {
            active: true,
            ..Default::default()
        };
        form.values[4] = "60".into();
        form
    }

    fn current_mut(&mut self) -> &mut String {
        &mut self.values[self.field]
    }

    fn next_field(&mut self) {
        self.field = (self.field + 1) % FORM_FIELDS.len();
    }

    fn prev_field(&mut self) {
        self.field = (self.field + FORM_FIELDS.len() - 1) % FORM_FIELDS.len();
    }

    /// Turn the entered values into a definition. Mirrors the registry's
    /// required-field check so the form can stay open on bad input.
    fn to_definition(&self) -> std::result::Result<ScriptDefinition, String> {
        if self.values[0].is_empty() {
            return Err("script name must not be empty".into());
        }
        if self.values[1].is_empty() {
            return Err("script path must not be empty".into());
        }
        let timeout_secs: u32 = self.values[4]
            .trim()
            .parse()
            .map_err(|_| "timeout must be a number of seconds".to_string())?;
        if !(TIMEOUT_MIN..=TIMEOUT_MAX).contains(&timeout_secs) {
            return Err(format!(
                "timeout must be between {TIMEOUT_MIN} and {TIMEOUT_MAX} seconds"
            ));
        }
        Ok(ScriptDefinition {
            name: self.values[0].clone(),
            path: self.values[1].clone(),
            interpreter: self.values[2].clone(),
            args: self.values[3].clone(),
            timeout_secs,
        })
    }
}

struct UiState {
    tab: usize,
    scripts: Vec<ScriptDefinition>,
    selected: Option<usize>,
    scroll_offset: usize,
    report: StatusReport,
    info: String,
    form: AddForm,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            scripts: Vec::new(),
            selected: None,
            scroll_offset: 0,
            report: StatusReport::NotSelected,
            info: String::new(),
            form: AddForm::default(),
        }
    }
}

impl UiState {
    fn selected_name(&self) -> Option<String> {
        self.selected
            .and_then(|i| self.scripts.get(i))
            .map(|s| s.name.clone())
    }
}

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure between UI thread and controller.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let cfg = build_config(&args);

    // TUI runs in a dedicated thread to keep all blocking terminal I/O
    // out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(event_rx, cmd_tx));

    let res = controller::run_controller(&cfg, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut event_rx: UnboundedReceiver<AppEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::default();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if state.form.active {
                    // Ctrl-C still quits; everything else edits the form.
                    if k.modifiers == KeyModifiers::CONTROL && k.code == KeyCode::Char('c') {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    handle_form_key(k.code, &mut state, &cmd_tx);
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % 2;
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = 1;
                    }
                    (_, KeyCode::Char('a')) => {
                        state.form = AddForm::open();
                    }
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) => {
                        move_selection(&mut state, &cmd_tx, -1);
                    }
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) => {
                        move_selection(&mut state, &cmd_tx, 1);
                    }
                    (_, KeyCode::Enter) | (_, KeyCode::Char('r')) => {
                        match state.selected_name() {
                            Some(name) => {
                                let _ = cmd_tx.send(UiCommand::Run(name));
                            }
                            None => {
                                state.info = "Select a script from the list first".into();
                            }
                        }
                    }
                    (_, KeyCode::Char('s')) => match state.selected_name() {
                        Some(name) => {
                            let _ = cmd_tx.send(UiCommand::Stop(name));
                        }
                        None => {
                            state.info = "Select a script from the list first".into();
                        }
                    },
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn apply_event(state: &mut UiState, ev: AppEvent) {
    match ev {
        AppEvent::Scripts { scripts } => {
            state.scripts = scripts;
            if let Some(sel) = state.selected {
                if sel >= state.scripts.len() {
                    state.selected = state.scripts.len().checked_sub(1);
                }
            }
        }
        AppEvent::Status(report) => {
            state.report = report;
        }
        AppEvent::Info(info) => {
            state.info = info.to_message();
        }
    }
}

fn move_selection(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>, delta: i64) {
    if state.scripts.is_empty() {
        return;
    }
    let next = match state.selected {
        None => 0,
        Some(i) => {
            let len = state.scripts.len() as i64;
            (i as i64 + delta).clamp(0, len - 1) as usize
        }
    };
    state.selected = Some(next);

    // Keep the selection in view; the list height is only known at draw
    // time, so use the same estimate as the draw pass.
    let estimated_max_items = 30;
    if next < state.scroll_offset {
        state.scroll_offset = next;
    } else if next >= state.scroll_offset + estimated_max_items {
        state.scroll_offset = next.saturating_sub(estimated_max_items - 1);
    }

    let _ = cmd_tx.send(UiCommand::Select(Some(state.scripts[next].name.clone())));
}

fn handle_form_key(code: KeyCode, state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    match code {
        KeyCode::Esc => {
            state.form.active = false;
        }
        KeyCode::Enter => match state.form.to_definition() {
            Ok(def) => {
                let _ = cmd_tx.send(UiCommand::Add(def));
                state.form.active = false;
            }
            Err(msg) => {
                // Bad input keeps the form open for correction.
                state.info = msg;
            }
        },
        KeyCode::Tab | KeyCode::Down => state.form.next_field(),
        KeyCode::BackTab | KeyCode::Up => state.form.prev_field(),
        KeyCode::Backspace => {
            state.form.current_mut().pop();
        }
        KeyCode::Char(c) => {
            state.form.current_mut().push(c);
        }
        _ => {}
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Scripts"), Line::from("Help")])
        .select(state.tab)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("script-runner"),
        )
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_scripts(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn draw_scripts(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Min(0),    // list + details
                Constraint::Length(3), // status line
                Constraint::Length(3), // info line
            ]
            .as_ref(),
        )
        .split(area);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
        .split(rows[0]);

    draw_script_list(cols[0], f, state);
    if state.form.active {
        draw_add_form(cols[1], f, state);
    } else {
        draw_details(cols[1], f, state);
    }

    // Status line colored by state, wording fixed by the refresh loop.
    let status_style = match state.report {
        StatusReport::Running { .. } => Style::default().fg(Color::Green),
        StatusReport::Finished { .. } => Style::default().fg(Color::Yellow),
        _ => Style::default().fg(Color::Gray),
    };
    let status = Paragraph::new(Line::from(Span::styled(
        state.report.to_message(),
        status_style,
    )))
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, rows[1]);

    let info = Paragraph::new(state.info.as_str())
        .block(Block::default().borders(Borders::ALL).title("Info"));
    f.render_widget(info, rows[2]);
}

fn draw_script_list(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let visible = area.height.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = Vec::new();

    for (i, script) in state
        .scripts
        .iter()
        .enumerate()
        .skip(state.scroll_offset)
        .take(visible.max(1))
    {
        let marker = if Some(i) == state.selected { "> " } else { "  " };
        let style = if Some(i) == state.selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!("{marker}{}", script.name),
            style,
        )));
    }
    if state.scripts.is_empty() {
        lines.push(Line::from(Span::styled(
            "No scripts yet. Press 'a' to add one.",
            Style::default().fg(Color::Gray),
        )));
    }

    let title = format!("Scripts ({})", state.scripts.len());
    let list = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, area);
}

fn kv_line(label: &str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(Color::Gray)),
        Span::raw(value.to_string()),
    ])
}

fn draw_details(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines: Vec<Line> = Vec::new();

    match state.selected.and_then(|i| state.scripts.get(i)) {
        Some(script) => {
            lines.push(kv_line("Name", &script.name));
            lines.push(kv_line("Path", &script.path));
            let interpreter = if script.interpreter.is_empty() {
                "(default)"
            } else {
                &script.interpreter
            };
            lines.push(kv_line("Interpreter", interpreter));
            lines.push(kv_line("Args", &script.args));
            lines.push(kv_line("Timeout", &format!("{}s", script.timeout_secs)));
            if let StatusReport::Running {
                since: Some(since), ..
            } = &state.report
            {
                lines.push(kv_line("Started", since));
            }
        }
        None => {
            lines.push(Line::from(Span::styled(
                "Select a script to see its details.",
                Style::default().fg(Color::Gray),
            )));
        }
    }

    let details =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Details"));
    f.render_widget(details, area);
}

fn draw_add_form(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines: Vec<Line> = Vec::new();
    for (i, label) in FORM_FIELDS.iter().enumerate() {
        let value = &state.form.values[i];
        if i == state.form.field {
            lines.push(Line::from(vec![
                Span::styled(format!("{label}: "), Style::default().fg(Color::Yellow)),
                Span::raw(value.clone()),
                Span::styled("_", Style::default().fg(Color::Yellow)),
            ]));
        } else {
            lines.push(kv_line(label, value));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter to save, Esc to cancel, Tab to switch fields",
        Style::default().fg(Color::Gray),
    )));

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Add script"),
    );
    f.render_widget(form, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_requires_name_and_path() {
        let mut form = AddForm::open();
        assert!(form.to_definition().is_err());
        form.values[0] = "demo".into();
        assert!(form.to_definition().is_err());
        form.values[1] = "/scripts/demo.py".into();
        let def = form.to_definition().unwrap();
        assert_eq!(def.name, "demo");
        assert_eq!(def.timeout_secs, 60);
    }

    #[test]
    fn form_rejects_unparseable_or_out_of_range_timeout() {
        let mut form = AddForm::open();
        form.values[0] = "demo".into();
        form.values[1] = "/scripts/demo.py".into();
        form.values[4] = "soon".into();
        assert!(form.to_definition().is_err());
        form.values[4] = "0".into();
        assert!(form.to_definition().is_err());
        form.values[4] = "3600".into();
        assert!(form.to_definition().is_ok());
    }

    #[test]
    fn form_field_cycling_wraps() {
        let mut form = AddForm::open();
        assert_eq!(form.field, 0);
        form.prev_field();
        assert_eq!(form.field, FORM_FIELDS.len() - 1);
        form.next_field();
        assert_eq!(form.field, 0);
    }
}
