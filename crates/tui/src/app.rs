use std::{future::Future, io, path::PathBuf, thread, time::Duration};

use anyhow::{anyhow, Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::{spawn, sync::mpsc};
use tracing::{error, info};

use brickwise_core::{
    catalog::{InputField, INPUT_FIELDS, OUTPUT_FIELDS},
    format, FormSnapshot, FormSync, HttpRemote, ScenarioStore, SyncError, SyncResult,
};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_PROMPT_LEN: usize = 256;
const OUTPUT_COLUMNS: usize = 3;

struct Theme {
    accent: Color,
    primary_fg: Color,
    muted_fg: Color,
    error_fg: Color,
    highlight_bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Cyan,
            primary_fg: Color::White,
            muted_fg: Color::DarkGray,
            error_fg: Color::LightRed,
            highlight_bg: Color::Rgb(40, 44, 52),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemoteAction {
    Load,
    Calculate,
    Upload,
}

impl RemoteAction {
    fn pending_label(self) -> &'static str {
        match self {
            RemoteAction::Load => "Loading sheet…",
            RemoteAction::Calculate => "Calculating…",
            RemoteAction::Upload => "Uploading workbook…",
        }
    }

    fn done_label(self) -> &'static str {
        match self {
            RemoteAction::Load => "Sheet values loaded",
            RemoteAction::Calculate => "Outputs updated",
            RemoteAction::Upload => "Workbook uploaded",
        }
    }

    fn failed_label(self) -> &'static str {
        match self {
            RemoteAction::Load => "Load failed",
            RemoteAction::Calculate => "Calculation failed",
            RemoteAction::Upload => "Upload failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    UploadPath,
    ScenarioName,
}

impl PromptKind {
    fn title(self) -> &'static str {
        match self {
            PromptKind::UploadPath => "Upload workbook",
            PromptKind::ScenarioName => "Save scenario",
        }
    }

    fn hint(self) -> &'static str {
        match self {
            PromptKind::UploadPath => "Path to an .xlsx file",
            PromptKind::ScenarioName => "Leave empty for a dated name",
        }
    }
}

/// Single-line text buffer with a byte cursor kept on char boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TextInput {
    input: String,
    cursor: usize,
}

impl TextInput {
    fn with_value(value: impl Into<String>) -> Self {
        let input = value.into();
        let cursor = input.len();
        Self { input, cursor }
    }

    fn move_left(&mut self) {
        if let Some(ch) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
        }
    }

    fn move_right(&mut self) {
        if let Some(ch) = self.input[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.input.len();
    }

    fn insert(&mut self, ch: char) {
        if self.input.len() >= MAX_PROMPT_LEN || ch.is_control() {
            return;
        }
        self.input.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn backspace(&mut self) {
        if let Some(ch) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
            self.input.remove(self.cursor);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.input.len() {
            self.input.remove(self.cursor);
        }
    }

    /// Apply an editing key. Returns false for keys it does not handle.
    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.move_home(),
            KeyCode::End => self.move_end(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.insert(ch),
            _ => return false,
        }
        true
    }

    fn value(&self) -> &str {
        self.input.trim()
    }

    /// Text with a bar marking the cursor position.
    fn display(&self) -> String {
        let mut text = self.input.clone();
        text.insert(self.cursor, '▏');
        text
    }
}

struct PromptModal {
    kind: PromptKind,
    text: TextInput,
}

struct EditState {
    key: &'static str,
    text: TextInput,
}

enum AppEvent {
    Input(Event),
    Tick,
    RemoteFinished {
        action: RemoteAction,
        result: SyncResult<()>,
    },
}

/// Terminal dashboard over a [`FormSync`] handle.
pub struct DashboardApp {
    sync: FormSync<HttpRemote>,
    scenarios: ScenarioStore,
    load_on_start: bool,
    state: UiState,
    snapshot: FormSnapshot,
    editing: Option<EditState>,
    prompt: Option<PromptModal>,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    theme: Theme,
}

impl DashboardApp {
    pub fn new(sync: FormSync<HttpRemote>, scenarios: ScenarioStore, load_on_start: bool) -> Self {
        let snapshot = sync.snapshot();
        Self {
            sync,
            scenarios,
            load_on_start,
            state: UiState::default(),
            snapshot,
            editing: None,
            prompt: None,
            event_tx: None,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        if self.load_on_start {
            self.start_remote(RemoteAction::Load);
        }

        loop {
            self.refresh_snapshot();
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }

            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn refresh_snapshot(&mut self) {
        self.snapshot = self.sync.snapshot();
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(Event::Key(key))) => {
                if key.kind != KeyEventKind::Press {
                    return true;
                }
                let result = if self.prompt.is_some() {
                    self.handle_prompt_key(key)
                } else if self.editing.is_some() {
                    self.handle_edit_key(key)
                } else {
                    self.handle_key(key)
                };
                if let Err(err) = result {
                    error!(?err, "Key handling failed");
                    self.state.set_status(format!("Error: {err}"));
                }
                true
            }
            Some(AppEvent::Input(_)) | Some(AppEvent::Tick) => true,
            Some(AppEvent::RemoteFinished { action, result }) => {
                self.handle_remote_finished(action, result);
                true
            }
            None => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.state.should_quit = true;
            }
            KeyCode::Char('q') => self.state.should_quit = true,
            KeyCode::Down | KeyCode::Char('j') => self.state.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.state.move_cursor(-1),
            KeyCode::Home => self.state.cursor = 0,
            KeyCode::End => self.state.cursor = INPUT_FIELDS.len() - 1,
            KeyCode::Enter => self.begin_edit(),
            KeyCode::Char('c') => self.start_remote(RemoteAction::Calculate),
            KeyCode::Char('r') => self.start_remote(RemoteAction::Load),
            KeyCode::Char('u') => self.start_remote(RemoteAction::Upload),
            KeyCode::Char('s') => {
                self.prompt = Some(PromptModal {
                    kind: PromptKind::ScenarioName,
                    text: TextInput::default(),
                });
            }
            KeyCode::Char('l') => self.load_latest_scenario()?,
            _ => {}
        }
        Ok(())
    }

    fn begin_edit(&mut self) {
        let field = self.state.current_field();
        let current = self.snapshot.inputs.get(field.key).unwrap_or_default();
        self.editing = Some(EditState {
            key: field.key,
            text: edit_buffer(current),
        });
    }

    fn handle_edit_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(edit) = self.editing.as_mut() else {
            return Ok(());
        };
        match key.code {
            KeyCode::Esc => {
                self.editing = None;
                self.state.set_status("Edit cancelled".to_string());
            }
            KeyCode::Enter | KeyCode::Tab => {
                let key_name = edit.key;
                let raw = edit.text.value().to_string();
                self.editing = None;
                let value = self.sync.set_input(key_name, &raw)?;
                info!(field = key_name, value, "Input edited");
                if key.code == KeyCode::Tab {
                    self.state.move_cursor(1);
                }
                self.state
                    .set_status(format!("{key_name} = {}", format::format_number(value)));
            }
            _ => {
                edit.text.handle_key(&key);
            }
        }
        Ok(())
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(prompt) = self.prompt.as_mut() else {
            return Ok(());
        };
        match key.code {
            KeyCode::Esc => {
                self.prompt = None;
            }
            KeyCode::Enter => {
                let kind = prompt.kind;
                let value = prompt.text.value().to_string();
                self.prompt = None;
                match kind {
                    PromptKind::UploadPath => {
                        if value.is_empty() {
                            return Err(anyhow!("no workbook path given"));
                        }
                        self.start_upload(PathBuf::from(value));
                    }
                    PromptKind::ScenarioName => self.save_scenario(&value)?,
                }
            }
            _ => {
                prompt.text.handle_key(&key);
            }
        }
        Ok(())
    }

    fn start_remote(&mut self, action: RemoteAction) {
        match action {
            RemoteAction::Load => {
                self.launch(action, |sync| async move { sync.initialize_from_remote().await })
            }
            RemoteAction::Calculate => {
                self.launch(action, |sync| async move { sync.submit_and_recalculate().await })
            }
            RemoteAction::Upload => self.prompt = Some(PromptModal {
                kind: PromptKind::UploadPath,
                text: TextInput::default(),
            }),
        }
    }

    fn start_upload(&mut self, path: PathBuf) {
        info!(path = %path.display(), "Starting workbook upload");
        self.launch(RemoteAction::Upload, move |sync| async move {
            sync.upload_workbook(&path).await
        });
    }

    /// Run `task` on the runtime and report back through the event channel.
    fn launch<F, Fut>(&mut self, action: RemoteAction, task: F)
    where
        F: FnOnce(FormSync<HttpRemote>) -> Fut,
        Fut: Future<Output = SyncResult<()>> + Send + 'static,
    {
        let Some(sender) = self.event_tx.clone() else {
            self.state
                .set_status("Internal error: event channel unavailable".to_string());
            error!("event_channel_missing");
            return;
        };
        if self.sync.is_loading() {
            self.state
                .set_status("A request is already in progress".to_string());
            return;
        }

        info!(?action, "Starting remote operation");
        self.state.set_status(action.pending_label().to_string());
        let job = task(self.sync.clone());
        spawn(async move {
            let result = job.await;
            let _ = sender
                .send(AppEvent::RemoteFinished { action, result })
                .await;
        });
    }

    fn handle_remote_finished(&mut self, action: RemoteAction, result: SyncResult<()>) {
        match result {
            Ok(()) => self.state.set_status(action.done_label().to_string()),
            Err(SyncError::Busy) => self
                .state
                .set_status("A request is already in progress".to_string()),
            Err(err) => {
                error!(?action, %err, "Remote operation failed");
                self.state.set_status(action.failed_label().to_string());
            }
        }
    }

    fn save_scenario(&mut self, name: &str) -> Result<()> {
        let snapshot = self.sync.snapshot();
        let name = (!name.is_empty()).then_some(name);
        let entry = self
            .scenarios
            .save(name, &snapshot.inputs, &snapshot.outputs)?;
        info!(path = %entry.path.display(), name = %entry.name, "Scenario saved");
        self.state.set_status(format!("Saved scenario: {}", entry.name));
        Ok(())
    }

    fn load_latest_scenario(&mut self) -> Result<()> {
        let Some(entry) = self.scenarios.latest()? else {
            self.state.set_status(format!(
                "No scenarios in {}",
                self.scenarios.root().display()
            ));
            return Ok(());
        };
        let scenario = self.scenarios.load(&entry)?;
        self.sync
            .apply_snapshot(scenario.inputs, scenario.outputs)
            .context("cannot load a scenario while a request is running")?;
        info!(name = %entry.name, "Scenario loaded");
        self.state.set_status(format!("Loaded scenario: {}", entry.name));
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let error_height = if self.snapshot.status.error.is_some() { 3 } else { 0 };
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(INPUT_FIELDS.len() as u16 + 2),
                Constraint::Min((OUTPUT_FIELDS.len() / OUTPUT_COLUMNS) as u16 * 3),
                Constraint::Length(error_height),
                Constraint::Length(1),
            ])
            .split(area);

        let title = Paragraph::new(Line::from(vec![
            Span::styled(
                "Brickwise",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "  plano de negócios",
                Style::default().fg(self.theme.muted_fg),
            ),
        ]));
        frame.render_widget(title, layout[0]);

        let form_columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
            .split(layout[1]);
        self.draw_inputs(frame, form_columns[0]);
        self.draw_tooltip(frame, form_columns[1]);
        self.draw_outputs(frame, layout[2]);

        if let Some(message) = self.snapshot.status.error.as_deref() {
            let banner = Paragraph::new(message.to_string())
                .style(Style::default().fg(self.theme.error_fg))
                .wrap(Wrap { trim: true })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title("Erro")
                        .border_style(Style::default().fg(self.theme.error_fg)),
                );
            frame.render_widget(banner, layout[3]);
        }

        self.draw_status(frame, layout[4]);

        if let Some(prompt) = &self.prompt {
            self.render_prompt(frame, prompt);
        }
    }

    fn draw_inputs(&self, frame: &mut Frame, area: Rect) {
        let label_width = INPUT_FIELDS
            .iter()
            .map(|field| field.label.chars().count())
            .max()
            .unwrap_or(0);
        let items: Vec<ListItem> = INPUT_FIELDS
            .iter()
            .map(|field| {
                let value = match &self.editing {
                    Some(edit) if edit.key == field.key => edit.text.display(),
                    _ => input_value_text(field, &self.snapshot),
                };
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<width$}  ", field.label, width = label_width),
                        Style::default().fg(self.theme.primary_fg),
                    ),
                    Span::styled(value, Style::default().fg(self.theme.accent)),
                ]))
            })
            .collect();

        let mut list_state = ListState::default();
        list_state.select(Some(self.state.cursor));
        let title = if self.editing.is_some() {
            "Parâmetros (editando)"
        } else {
            "Parâmetros"
        };
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(
                Style::default()
                    .bg(self.theme.highlight_bg)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_tooltip(&self, frame: &mut Frame, area: Rect) {
        let field = self.state.current_field();
        let mut lines = vec![
            Line::from(Span::styled(
                field.label,
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(field.tooltip),
            Line::from(""),
            Line::from(Span::styled(
                format!("Célula: {}", field.cell_ref()),
                Style::default().fg(self.theme.muted_fg),
            )),
        ];
        if let Some(max) = field.max_value() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("Máximo: {}", format::format_number(max)),
                Style::default().fg(self.theme.muted_fg),
            )));
        }
        let tooltip = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Ajuda"));
        frame.render_widget(tooltip, area);
    }

    fn draw_outputs(&self, frame: &mut Frame, area: Rect) {
        let rows = output_rows();
        let row_areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Ratio(1, rows.len() as u32); rows.len()])
            .split(area);

        for (row, row_area) in rows.iter().zip(row_areas.iter()) {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![
                    Constraint::Ratio(1, OUTPUT_COLUMNS as u32);
                    OUTPUT_COLUMNS
                ])
                .split(*row_area);
            for (field, cell) in row.iter().zip(cells.iter()) {
                let value = self.snapshot.outputs.get(field.key).unwrap_or_default();
                let card = Paragraph::new(Line::from(Span::styled(
                    format::format_output(field, value),
                    Style::default()
                        .fg(self.theme.primary_fg)
                        .add_modifier(Modifier::BOLD),
                )))
                .alignment(Alignment::Center)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(field.label)
                        .border_style(Style::default().fg(self.theme.muted_fg)),
                );
                frame.render_widget(card, *cell);
            }
        }
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let button = calculate_label(self.snapshot.status.loading);
        let line = Line::from(vec![
            Span::styled(
                format!("[c] {button}"),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "  Enter edit • r reload • u upload • s save • l load • q quit  ",
                Style::default().fg(self.theme.muted_fg),
            ),
            Span::styled(
                self.state.status.clone(),
                Style::default().fg(self.theme.primary_fg),
            ),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_prompt(&self, frame: &mut Frame, prompt: &PromptModal) {
        let area = centered_rect(60, 6, frame.size());
        frame.render_widget(Clear, area);
        let lines = vec![
            Line::from(Span::styled(
                prompt.kind.hint(),
                Style::default().fg(self.theme.muted_fg),
            )),
            Line::from(""),
            Line::from(Span::styled(
                prompt.text.display(),
                Style::default().fg(self.theme.primary_fg),
            )),
        ];
        let modal = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(prompt.kind.title())
                .border_style(Style::default().fg(self.theme.accent)),
        );
        frame.render_widget(modal, area);
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    cursor: usize,
    status: String,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            cursor: 0,
            status: "Ready".to_string(),
            should_quit: false,
        }
    }
}

impl UiState {
    fn set_status(&mut self, status: String) {
        self.status = status;
    }

    fn move_cursor(&mut self, delta: isize) {
        let last = INPUT_FIELDS.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
    }

    fn current_field(&self) -> &'static InputField {
        &INPUT_FIELDS[self.cursor.min(INPUT_FIELDS.len() - 1)]
    }
}

/// Prefill for the edit box. Must parse back to exactly `value`.
fn edit_buffer(value: f64) -> TextInput {
    TextInput::with_value(format::format_editable(value))
}

fn input_value_text(field: &InputField, snapshot: &FormSnapshot) -> String {
    let value = snapshot.inputs.get(field.key).unwrap_or_default();
    format::format_input(field, value)
}

fn output_rows() -> Vec<&'static [brickwise_core::catalog::OutputField]> {
    OUTPUT_FIELDS.chunks(OUTPUT_COLUMNS).collect()
}

fn calculate_label(loading: bool) -> &'static str {
    if loading {
        "Calculating…"
    } else {
        "Calculate"
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
