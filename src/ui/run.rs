use crate::config::AppConfig;
use crate::editor::{ListView, LoadTicket, Notice, NoticeKind};
use crate::error::AppError;
use crate::models::{Category, ConfigFieldSet, MoveDirection, ProviderOrder, ProviderRecord};
use crate::modal::{FormRules, InputKind, ModalBody, OpenTicket, SaveRequest};
use crate::store::http::HttpSourceStore;
use crate::store::SourceStore;
use crate::ui::app::{ActivityEntry, AppState, ConfirmAction, LogLevel, Screen};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use ratatui::Terminal;
use std::io;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

const POLL_INTERVAL: StdDuration = StdDuration::from_millis(100);

const COLOR_ACCENT: Color = Color::Cyan;
const COLOR_INFO: Color = Color::Green;
const COLOR_MUTED: Color = Color::DarkGray;
const COLOR_HEADER: Color = Color::White;

/// Network work requested by a key press or by a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    LoadSources(LoadTicket),
    SaveSources(Vec<ProviderOrder>),
    FetchConfig {
        ticket: OpenTicket,
        provider: String,
    },
    SaveConfig(SaveRequest),
}

struct Job<T, R> {
    tag: T,
    started_at: Instant,
    handle: JoinHandle<Result<R, AppError>>,
}

impl<T, R> Job<T, R> {
    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[derive(Default)]
struct Jobs {
    load: Option<Job<LoadTicket, Vec<ProviderRecord>>>,
    save: Option<Job<(), ()>>,
    config_fetch: Option<Job<OpenTicket, ConfigFieldSet>>,
    config_save: Option<Job<SaveRequest, ()>>,
}

pub async fn run_tui(cfg: &AppConfig) -> Result<(), AppError> {
    let store: Arc<dyn SourceStore> = Arc::new(HttpSourceStore::new(cfg)?);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let state = AppState::new(FormRules::from_config(cfg));
    let loop_result = run_loop(&mut terminal, state, store, &cfg.api_base_url).await;

    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    loop_result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut state: AppState,
    store: Arc<dyn SourceStore>,
    endpoint: &str,
) -> Result<(), AppError> {
    let mut jobs = Jobs::default();

    if let Some(ticket) = state.danmaku.begin_load() {
        dispatch(Command::LoadSources(ticket), &store, &mut jobs);
    }

    while state.running {
        for command in process_jobs(&mut state, &mut jobs).await {
            dispatch(command, &store, &mut jobs);
        }

        terminal.draw(|f| render(f, &state, endpoint))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(command) = handle_key(key.code, key.modifiers, &mut state) {
                    dispatch(command, &store, &mut jobs);
                }
            }
        }
    }

    Ok(())
}

fn dispatch(command: Command, store: &Arc<dyn SourceStore>, jobs: &mut Jobs) {
    let started_at = Instant::now();
    match command {
        Command::LoadSources(ticket) => {
            if let Some(old) = jobs.load.take() {
                old.handle.abort();
            }
            let store = Arc::clone(store);
            jobs.load = Some(Job {
                tag: ticket,
                started_at,
                handle: tokio::spawn(async move { store.list(Category::Danmaku).await }),
            });
        }
        Command::SaveSources(entries) => {
            let store = Arc::clone(store);
            jobs.save = Some(Job {
                tag: (),
                started_at,
                handle: tokio::spawn(async move { store.save(Category::Danmaku, &entries).await }),
            });
        }
        Command::FetchConfig { ticket, provider } => {
            if let Some(old) = jobs.config_fetch.take() {
                old.handle.abort();
            }
            let store = Arc::clone(store);
            jobs.config_fetch = Some(Job {
                tag: ticket,
                started_at,
                handle: tokio::spawn(async move { store.get_config(&provider).await }),
            });
        }
        Command::SaveConfig(request) => {
            let store = Arc::clone(store);
            let provider = request.provider.clone();
            let payload = request.payload.clone();
            jobs.config_save = Some(Job {
                tag: request,
                started_at,
                handle: tokio::spawn(async move { store.set_config(&provider, &payload).await }),
            });
        }
    }
}

fn flatten<R>(joined: Result<Result<R, AppError>, JoinError>) -> Result<R, AppError> {
    joined?
}

async fn process_jobs(state: &mut AppState, jobs: &mut Jobs) -> Vec<Command> {
    let mut follow_up = Vec::new();

    if jobs.load.as_ref().is_some_and(Job::is_finished) {
        if let Some(job) = jobs.load.take() {
            let elapsed = job.started_at.elapsed();
            let result = flatten(job.handle.await);
            info!(elapsed_ms = elapsed.as_millis() as u64, "source list request finished");
            apply_load_result(state, job.tag, result);
        }
    }

    if jobs.save.as_ref().is_some_and(Job::is_finished) {
        if let Some(job) = jobs.save.take() {
            let result = flatten(job.handle.await);
            follow_up.extend(apply_save_result(state, result));
        }
    }

    if jobs.config_fetch.as_ref().is_some_and(Job::is_finished) {
        if let Some(job) = jobs.config_fetch.take() {
            let result = flatten(job.handle.await);
            apply_config_fetch(state, job.tag, result);
        }
    }

    if jobs.config_save.as_ref().is_some_and(Job::is_finished) {
        if let Some(job) = jobs.config_save.take() {
            let result = flatten(job.handle.await);
            apply_config_save(state, &job.tag, result);
        }
    }

    follow_up
}

fn apply_load_result(
    state: &mut AppState,
    ticket: LoadTicket,
    result: Result<Vec<ProviderRecord>, AppError>,
) {
    let failure = result.as_ref().err().map(ToString::to_string);
    let count = result.as_ref().map_or(0, Vec::len);
    if !state.danmaku.finish_load(ticket, result) {
        return;
    }
    match failure {
        Some(message) => {
            state.status = "load failed".into();
            append_activity(state, LogLevel::Error, "load_failed", &message);
        }
        None => {
            state.status = format!("{count} danmaku sources loaded");
            append_activity(
                state,
                LogLevel::Info,
                "loaded",
                &format!("{count} danmaku sources"),
            );
        }
    }
}

fn apply_save_result(state: &mut AppState, result: Result<(), AppError>) -> Option<Command> {
    let succeeded = result.is_ok();
    let notice = state.danmaku.finish_save(result);
    state.status = if succeeded {
        "saved".into()
    } else {
        "save failed".into()
    };
    show_notice(state, notice);
    if !succeeded {
        return None;
    }
    state.danmaku.begin_load().map(Command::LoadSources)
}

fn apply_config_fetch(
    state: &mut AppState,
    ticket: OpenTicket,
    result: Result<ConfigFieldSet, AppError>,
) {
    let provider = state.modal.open_for().unwrap_or_default().to_string();
    let failure = result.as_ref().err().map(ToString::to_string);
    if !state.modal.finish_open(ticket, result) {
        return;
    }
    match failure {
        Some(message) => append_activity(state, LogLevel::Error, "config_load_failed", &message),
        None => append_activity(state, LogLevel::Info, "config_loaded", &provider),
    }
}

fn apply_config_save(state: &mut AppState, request: &SaveRequest, result: Result<(), AppError>) {
    match state.modal.finish_save(request, result) {
        Ok(notice) => {
            if state.screen == Screen::ConfigModal && !state.modal.is_open() {
                state.screen = Screen::Sources;
            }
            append_activity(state, LogLevel::Info, "config_saved", &request.provider);
            show_notice(state, notice);
        }
        Err(err) => {
            warn!(provider = %request.provider, error = %err, "saving provider configuration failed");
            show_notice(state, Notice::error(format!("Save failed: {err}")));
        }
    }
}

fn handle_key(code: KeyCode, modifiers: KeyModifiers, state: &mut AppState) -> Option<Command> {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        open_quit_confirm(state);
        return None;
    }

    match state.screen.clone() {
        Screen::Sources => handle_sources_key(code, modifiers, state),
        Screen::ConfigModal => handle_modal_key(code, modifiers, state),
        Screen::Confirm(action) => {
            match code {
                KeyCode::Esc => state.screen = state.previous_screen.clone(),
                KeyCode::Left => {
                    if state.confirm_selected > 0 {
                        state.confirm_selected -= 1;
                    }
                }
                KeyCode::Right => {
                    if state.confirm_selected < 1 {
                        state.confirm_selected += 1;
                    }
                }
                KeyCode::Enter => {
                    if state.confirm_selected == 0 {
                        state.screen = state.previous_screen.clone();
                        return None;
                    }
                    match action {
                        ConfirmAction::Quit => state.running = false,
                    }
                }
                _ => {}
            }
            None
        }
        Screen::NoticeDialog => {
            if matches!(code, KeyCode::Enter | KeyCode::Esc) {
                state.notice = None;
                state.screen = if state.previous_screen == Screen::ConfigModal
                    && !state.modal.is_open()
                {
                    Screen::Sources
                } else {
                    state.previous_screen.clone()
                };
            }
            None
        }
    }
}

fn open_quit_confirm(state: &mut AppState) {
    if matches!(state.screen, Screen::Confirm(_)) {
        return;
    }
    state.previous_screen = state.screen.clone();
    state.screen = Screen::Confirm(ConfirmAction::Quit);
    state.confirm_selected = 0;
}

fn handle_sources_key(
    code: KeyCode,
    modifiers: KeyModifiers,
    state: &mut AppState,
) -> Option<Command> {
    let shifted = modifiers.contains(KeyModifiers::SHIFT);
    match code {
        KeyCode::Char('q') => {
            open_quit_confirm(state);
            None
        }
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right => {
            let target = match state.tab {
                Category::Danmaku => Category::Metadata,
                Category::Metadata => Category::Danmaku,
            };
            switch_tab(state, target)
        }
        KeyCode::Char('1') => switch_tab(state, Category::Danmaku),
        KeyCode::Char('2') => switch_tab(state, Category::Metadata),
        KeyCode::Up if shifted => move_selected(state, MoveDirection::Up),
        KeyCode::Down if shifted => move_selected(state, MoveDirection::Down),
        KeyCode::Char('u') | KeyCode::Char('K') => move_selected(state, MoveDirection::Up),
        KeyCode::Char('d') | KeyCode::Char('J') => move_selected(state, MoveDirection::Down),
        KeyCode::Up | KeyCode::Char('k') => {
            match state.tab {
                Category::Danmaku => state.danmaku.select_previous(),
                Category::Metadata => state.metadata.select_previous(),
            }
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            match state.tab {
                Category::Danmaku => state.danmaku.select_next(),
                Category::Metadata => state.metadata.select_next(),
            }
            None
        }
        KeyCode::Char(' ') | KeyCode::Char('e') => {
            if state.tab == Category::Danmaku && state.danmaku.toggle_enabled() {
                if let Some(record) = state.danmaku.selected_record() {
                    state.status = format!(
                        "'{}' {} (unsaved)",
                        record.name,
                        if record.enabled { "enabled" } else { "disabled" }
                    );
                }
            }
            None
        }
        KeyCode::Char('s') => save_sources(state),
        KeyCode::Char('c') | KeyCode::Enter => configure_selected(state),
        KeyCode::Char('r') => reload(state),
        _ => None,
    }
}

fn switch_tab(state: &mut AppState, target: Category) -> Option<Command> {
    if state.tab == target {
        return None;
    }
    if state.tab == Category::Danmaku {
        state.danmaku.detach();
    }
    state.tab = target;
    reload(state)
}

fn reload(state: &mut AppState) -> Option<Command> {
    match state.tab {
        Category::Danmaku => match state.danmaku.begin_load() {
            Some(ticket) => {
                state.status = "loading...".into();
                Some(Command::LoadSources(ticket))
            }
            None => {
                state.status = "A load is already in progress.".into();
                None
            }
        },
        Category::Metadata => {
            state.metadata.load();
            state.status = "metadata sources ready".into();
            None
        }
    }
}

fn move_selected(state: &mut AppState, direction: MoveDirection) -> Option<Command> {
    let moved = match state.tab {
        Category::Danmaku => state.danmaku.move_selected(direction),
        Category::Metadata => state.metadata.move_selected(direction),
    };
    if moved {
        state.status = "order changed (unsaved)".into();
    }
    None
}

fn save_sources(state: &mut AppState) -> Option<Command> {
    match state.tab {
        Category::Danmaku => {
            if state.danmaku.is_saving() {
                state.status = "A save is already in progress.".into();
                return None;
            }
            match state.danmaku.begin_save() {
                Some(entries) => {
                    state.status = "saving...".into();
                    append_activity(
                        state,
                        LogLevel::Info,
                        "save_started",
                        &format!("{} sources", entries.len()),
                    );
                    Some(Command::SaveSources(entries))
                }
                None => {
                    state.status = "Nothing loaded to save.".into();
                    None
                }
            }
        }
        Category::Metadata => {
            let notice = state.metadata.save();
            show_notice(state, notice);
            None
        }
    }
}

fn configure_selected(state: &mut AppState) -> Option<Command> {
    if state.tab != Category::Danmaku {
        state.status = "Metadata sources have no configuration.".into();
        return None;
    }
    let Some(record) = state.danmaku.selected_record() else {
        state.status = "Select a source first.".into();
        return None;
    };
    let name = record.name.clone();
    let Some(fields) = state.danmaku.configure(&name) else {
        state.status = format!("'{name}' has no configurable fields.");
        return None;
    };
    let ticket = state.modal.open(&name, fields);
    state.screen = Screen::ConfigModal;
    state.status = format!("configuring '{name}'");
    Some(Command::FetchConfig {
        ticket,
        provider: name,
    })
}

fn handle_modal_key(code: KeyCode, modifiers: KeyModifiers, state: &mut AppState) -> Option<Command> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        if code == KeyCode::Char('s') {
            return match state.modal.begin_save() {
                Some(request) => {
                    state.status = format!("saving '{}' configuration...", request.provider);
                    Some(Command::SaveConfig(request))
                }
                None => {
                    state.status = if state.modal.is_saving() {
                        "A save is already in progress.".into()
                    } else {
                        "Nothing to save yet.".into()
                    };
                    None
                }
            };
        }
        return None;
    }

    match code {
        KeyCode::Esc => {
            state.modal.close();
            state.screen = Screen::Sources;
            state.status = "configuration discarded".into();
        }
        KeyCode::Tab | KeyCode::Down => state.modal.focus_next(),
        KeyCode::BackTab | KeyCode::Up => state.modal.focus_previous(),
        KeyCode::Enter => {
            if !state.modal.insert_newline() {
                state.modal.focus_next();
            }
        }
        KeyCode::Backspace => state.modal.backspace(),
        KeyCode::Char(c) => state.modal.insert_char(c),
        _ => {}
    }
    None
}

fn show_notice(state: &mut AppState, notice: Notice) {
    let level = match notice.kind {
        NoticeKind::Error => LogLevel::Error,
        NoticeKind::Success | NoticeKind::Info => LogLevel::Info,
    };
    append_activity(state, level, "notice", &notice.message);
    if state.screen != Screen::NoticeDialog {
        state.previous_screen = state.screen.clone();
    }
    state.notice = Some(notice);
    state.screen = Screen::NoticeDialog;
}

fn append_activity(state: &mut AppState, level: LogLevel, event: &str, detail: &str) {
    let ts = chrono::Local::now().format("%H:%M:%S").to_string();
    state.activity.push(ActivityEntry {
        ts,
        level,
        event: event.to_string(),
        detail: detail.to_string(),
    });
    if state.activity.len() > state.max_activity {
        let trim = state.activity.len() - state.max_activity;
        state.activity.drain(0..trim);
    }
}

fn render(f: &mut ratatui::Frame, state: &AppState, endpoint: &str) {
    let size = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
        ])
        .split(size);

    let header = Paragraph::new(format!(
        " sources-admin  ·  {}  ·  {} ",
        endpoint, state.status
    ))
    .block(Block::default().borders(Borders::ALL).title(" Session "))
    .style(Style::default().fg(COLOR_HEADER));
    f.render_widget(header, root[0]);

    let selected_tab = Category::ALL
        .iter()
        .position(|c| *c == state.tab)
        .unwrap_or(0);
    let tabs = Tabs::new(Category::ALL.iter().map(|c| c.title()))
        .select(selected_tab)
        .block(Block::default().borders(Borders::ALL).title(" Sources "))
        .highlight_style(
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, root[1]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(root[2]);

    match state.tab {
        Category::Danmaku => render_danmaku_list(f, body[0], state),
        Category::Metadata => render_metadata_list(f, body[0], state),
    }
    render_activity(f, body[1], state);

    let footer = Paragraph::new(footer_text(state))
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(COLOR_MUTED));
    f.render_widget(footer, root[3]);

    match &state.screen {
        Screen::Sources => {}
        Screen::ConfigModal => render_config_modal(f, state),
        Screen::Confirm(action) => render_confirm(f, state, action),
        Screen::NoticeDialog => {
            if state.previous_screen == Screen::ConfigModal && state.modal.is_open() {
                render_config_modal(f, state);
            }
            render_notice(f, state);
        }
    }
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Sources => match state.tab {
            Category::Danmaku => {
                let save = if state.danmaku.is_saving() {
                    "saving..."
                } else {
                    "s save"
                };
                format!(
                    "Up/Down select | u/d move | Space toggle | c configure | {save} | r reload | Tab switch list | q quit"
                )
            }
            Category::Metadata => {
                "Up/Down select | u/d move | s save | r reload | Tab switch list | q quit".into()
            }
        },
        Screen::ConfigModal => {
            "Tab/Shift+Tab field | Enter newline/next | Ctrl+S save | Esc cancel".into()
        }
        Screen::Confirm(_) => "Left/Right choose | Enter confirm | Esc cancel".into(),
        Screen::NoticeDialog => "Enter/Esc close".into(),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn selected_row_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn render_danmaku_list(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let title = if state.danmaku.is_saving() {
        " Danmaku Sources (saving...) "
    } else {
        " Danmaku Sources "
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    let placeholder = match state.danmaku.view() {
        ListView::NotLoaded => Some(("Not loaded. Press 'r' to load.".to_string(), COLOR_MUTED)),
        ListView::Loading => Some(("Loading...".to_string(), COLOR_MUTED)),
        ListView::Failed(message) => Some((message.clone(), Color::Red)),
        ListView::Ready if state.danmaku.items().is_empty() => {
            Some(("The server reported no sources.".to_string(), COLOR_MUTED))
        }
        ListView::Ready => None,
    };
    if let Some((text, color)) = placeholder {
        let content = Paragraph::new(text)
            .block(block)
            .style(Style::default().fg(color))
            .wrap(Wrap { trim: true });
        f.render_widget(content, area);
        return;
    }

    let selected = state.danmaku.selected();
    let rows = state
        .danmaku
        .items()
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            let is_selected = selected == Some(idx);
            let status_color = if record.enabled { COLOR_INFO } else { Color::Red };
            Row::new(vec![
                Cell::from(format!(
                    "{} {}",
                    if is_selected { ">" } else { " " },
                    idx + 1
                )),
                Cell::from(record.name.clone()),
                Cell::from(if record.is_configurable() { "[cfg]" } else { "" }),
                Cell::from(record.status_glyph()).style(Style::default().fg(status_color)),
            ])
            .style(selected_row_style(is_selected))
        })
        .collect::<Vec<_>>();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Percentage(50),
            Constraint::Length(7),
            Constraint::Length(6),
        ],
    )
    .header(
        Row::new(vec!["#", "Source", "Config", "State"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(block);
    f.render_widget(table, area);
}

fn render_metadata_list(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let selected = state.metadata.selected();
    let rows = state
        .metadata
        .items()
        .iter()
        .enumerate()
        .map(|(idx, source)| {
            let is_selected = selected == Some(idx);
            Row::new(vec![
                Cell::from(format!(
                    "{} {}",
                    if is_selected { ">" } else { " " },
                    idx + 1
                )),
                Cell::from(source.name.clone()),
                Cell::from(source.status_label.clone()),
            ])
            .style(selected_row_style(is_selected))
        })
        .collect::<Vec<_>>();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Percentage(50),
            Constraint::Percentage(40),
        ],
    )
    .header(
        Row::new(vec!["#", "Source", "Status"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Metadata Sources "),
    );
    f.render_widget(table, area);
}

fn render_activity(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let visible_lines = (area.height.saturating_sub(2) as usize).max(1);
    let start = state.activity.len().saturating_sub(visible_lines);
    let mut lines: Vec<Line<'static>> = state.activity[start..]
        .iter()
        .map(format_activity_line)
        .collect();
    if lines.is_empty() {
        lines.push(Line::from("No activity yet."));
    }

    let panel = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Activity "))
        .style(Style::default().fg(COLOR_HEADER))
        .wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}

fn format_activity_line(entry: &ActivityEntry) -> Line<'static> {
    let (level, color) = match entry.level {
        LogLevel::Info => ("INFO", COLOR_HEADER),
        LogLevel::Error => ("ERROR", Color::Red),
    };
    Line::from(Span::styled(
        format!("[{}] {} {} - {}", entry.ts, level, entry.event, entry.detail),
        Style::default().fg(color),
    ))
}

fn modal_lines(state: &AppState) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match state.modal.body() {
        ModalBody::Closed => {}
        ModalBody::Loading => lines.push(Line::from(Span::styled(
            "Loading...",
            Style::default().fg(COLOR_MUTED),
        ))),
        ModalBody::Failed(message) => lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        ))),
        ModalBody::Form { note, inputs } => {
            if let Some(note) = note {
                lines.push(Line::from(Span::styled(
                    note.clone(),
                    Style::default().fg(Color::Yellow),
                )));
                lines.push(Line::from(""));
            }
            for (idx, input) in inputs.iter().enumerate() {
                let active = idx == state.modal.focused();
                let style = if active {
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                let prefix = if active { "> " } else { "  " };
                match input.kind {
                    InputKind::SingleLine => lines.push(Line::from(vec![
                        Span::styled(prefix.to_string(), style),
                        Span::styled(format!("{}: {}", input.label, input.value), style),
                    ])),
                    InputKind::MultiLine { rows } => {
                        lines.push(Line::from(vec![
                            Span::styled(prefix.to_string(), style),
                            Span::styled(format!("{}:", input.label), style),
                        ]));
                        let value_lines: Vec<&str> = input.value.split('\n').collect();
                        let skip = value_lines.len().saturating_sub(rows as usize);
                        for row in 0..rows as usize {
                            let text = value_lines.get(skip + row).copied().unwrap_or("");
                            lines.push(Line::from(Span::styled(
                                format!("    | {text}"),
                                style,
                            )));
                        }
                    }
                }
            }
        }
    }
    if state.modal.is_saving() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Saving...",
            Style::default().fg(COLOR_MUTED),
        )));
    }
    lines
}

fn render_config_modal(f: &mut ratatui::Frame, state: &AppState) {
    let area = centered_rect(76, 72, f.area());
    f.render_widget(Clear, area);
    let title = format!(" Configure: {} ", state.modal.open_for().unwrap_or_default());
    let content = Paragraph::new(modal_lines(state))
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(COLOR_HEADER))
        .wrap(Wrap { trim: false });
    f.render_widget(content, area);
}

fn render_confirm(f: &mut ratatui::Frame, state: &AppState, action: &ConfirmAction) {
    let area = centered_rect(56, 34, f.area());
    f.render_widget(Clear, area);

    let (title, message) = match action {
        ConfirmAction::Quit => ("Confirm Quit", "Exit sources-admin? Unsaved changes are lost."),
    };

    let cancel_style = if state.confirm_selected == 0 {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let confirm_style = if state.confirm_selected == 1 {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Red)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let content = Paragraph::new(vec![
        Line::from(message),
        Line::from(""),
        Line::from(vec![
            Span::styled("[Cancel (Esc)]", cancel_style),
            Span::raw("   "),
            Span::styled("[Confirm (Enter)]", confirm_style),
        ]),
        Line::from("Use Left/Right to choose"),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", title)),
    )
    .alignment(Alignment::Center);

    f.render_widget(content, area);
}

fn render_notice(f: &mut ratatui::Frame, state: &AppState) {
    let Some(notice) = &state.notice else {
        return;
    };
    let (title, color) = match notice.kind {
        NoticeKind::Success => (" Saved ", COLOR_INFO),
        NoticeKind::Info => (" Notice ", Color::Yellow),
        NoticeKind::Error => (" Error ", Color::Red),
    };
    let area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, area);
    let content = Paragraph::new(vec![
        Line::from(notice.message.clone()),
        Line::from(""),
        Line::from("Press Enter or Esc"),
    ])
    .block(Block::default().borders(Borders::ALL).title(title))
    .style(Style::default().fg(color))
    .wrap(Wrap { trim: true });
    f.render_widget(content, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldDefs;

    fn record(name: &str, enabled: bool, fields: &[(&str, &str)]) -> ProviderRecord {
        let configurable_fields = if fields.is_empty() {
            None
        } else {
            Some(
                fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<FieldDefs>(),
            )
        };
        ProviderRecord {
            name: name.into(),
            enabled,
            order: 0,
            configurable_fields,
        }
    }

    fn loaded_state() -> AppState {
        let mut state = AppState::default();
        let ticket = state.danmaku.begin_load().expect("load starts");
        apply_load_result(
            &mut state,
            ticket,
            Ok(vec![
                record("A", true, &[]),
                record("gamer", false, &[("cookie", "Cookie")]),
            ]),
        );
        state
    }

    fn press(state: &mut AppState, code: KeyCode) -> Option<Command> {
        handle_key(code, KeyModifiers::NONE, state)
    }

    #[test]
    fn save_key_submits_positions_and_blocks_a_second_save() {
        let mut state = loaded_state();
        press(&mut state, KeyCode::Down);
        press(&mut state, KeyCode::Down);
        press(&mut state, KeyCode::Char('u'));

        let Some(Command::SaveSources(entries)) = press(&mut state, KeyCode::Char('s')) else {
            panic!("expected a save command");
        };
        let names: Vec<(&str, u32)> = entries
            .iter()
            .map(|e| (e.provider_name.as_str(), e.display_order))
            .collect();
        assert_eq!(names, vec![("gamer", 1), ("A", 2)]);
        assert!(footer_text(&state).contains("saving..."));

        assert_eq!(press(&mut state, KeyCode::Char('s')), None);
        assert_eq!(state.status, "A save is already in progress.");
    }

    #[test]
    fn save_success_reports_and_reloads() {
        let mut state = loaded_state();
        press(&mut state, KeyCode::Char('s'));

        let follow_up = apply_save_result(&mut state, Ok(()));
        assert!(matches!(follow_up, Some(Command::LoadSources(_))));
        assert!(!state.danmaku.is_saving());
        assert_eq!(state.screen, Screen::NoticeDialog);
        assert_eq!(
            state.notice.as_ref().map(|n| n.kind),
            Some(NoticeKind::Success)
        );
    }

    #[test]
    fn save_failure_reports_and_restores_the_control() {
        let mut state = loaded_state();
        press(&mut state, KeyCode::Char('s'));

        let follow_up = apply_save_result(
            &mut state,
            Err(AppError::Api {
                status: 500,
                message: "database locked".into(),
            }),
        );
        assert_eq!(follow_up, None);
        assert!(!state.danmaku.is_saving());
        let notice = state.notice.clone().expect("notice shown");
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.message.contains("database locked"));

        press(&mut state, KeyCode::Enter);
        assert_eq!(state.screen, Screen::Sources);
        assert!(footer_text(&state).contains("s save"));
    }

    #[test]
    fn configure_opens_modal_only_for_configurable_sources() {
        let mut state = loaded_state();
        press(&mut state, KeyCode::Down);
        assert_eq!(press(&mut state, KeyCode::Char('c')), None);
        assert_eq!(state.screen, Screen::Sources);
        assert!(state.status.contains("no configurable fields"));

        press(&mut state, KeyCode::Down);
        let Some(Command::FetchConfig { provider, .. }) = press(&mut state, KeyCode::Char('c'))
        else {
            panic!("expected a config fetch");
        };
        assert_eq!(provider, "gamer");
        assert_eq!(state.screen, Screen::ConfigModal);
        assert_eq!(state.modal.body(), &ModalBody::Loading);
    }

    #[test]
    fn modal_typing_then_ctrl_s_sends_trimmed_payload() {
        let mut state = loaded_state();
        press(&mut state, KeyCode::Down);
        press(&mut state, KeyCode::Down);
        let Some(Command::FetchConfig { ticket, .. }) = press(&mut state, KeyCode::Enter) else {
            panic!("expected a config fetch");
        };
        let mut current = ConfigFieldSet::new();
        current.insert("cookie".into(), "abc".into());
        apply_config_fetch(&mut state, ticket, Ok(current));

        for _ in 0..3 {
            press(&mut state, KeyCode::Backspace);
        }
        for ch in "xyz ".chars() {
            press(&mut state, KeyCode::Char(ch));
        }
        let Some(Command::SaveConfig(request)) =
            handle_key(KeyCode::Char('s'), KeyModifiers::CONTROL, &mut state)
        else {
            panic!("expected a config save");
        };
        assert_eq!(request.provider, "gamer");
        assert_eq!(
            request.payload.get("cookie").map(String::as_str),
            Some("xyz")
        );

        apply_config_save(&mut state, &request, Ok(()));
        assert!(!state.modal.is_open());
        assert_eq!(state.screen, Screen::NoticeDialog);
        press(&mut state, KeyCode::Esc);
        assert_eq!(state.screen, Screen::Sources);
    }

    #[test]
    fn modal_save_failure_keeps_the_form_open() {
        let mut state = loaded_state();
        state.danmaku.select(1);
        let Some(Command::FetchConfig { ticket, .. }) = press(&mut state, KeyCode::Char('c'))
        else {
            panic!("expected a config fetch");
        };
        apply_config_fetch(&mut state, ticket, Ok(ConfigFieldSet::new()));
        let Some(Command::SaveConfig(request)) =
            handle_key(KeyCode::Char('s'), KeyModifiers::CONTROL, &mut state)
        else {
            panic!("expected a config save");
        };

        apply_config_save(
            &mut state,
            &request,
            Err(AppError::Api {
                status: 422,
                message: "cookie rejected".into(),
            }),
        );
        assert!(state.modal.is_open());
        assert_eq!(state.previous_screen, Screen::ConfigModal);
        press(&mut state, KeyCode::Enter);
        assert_eq!(state.screen, Screen::ConfigModal);
    }

    #[test]
    fn leaving_the_danmaku_tab_discards_the_pending_load() {
        let mut state = AppState::default();
        let Some(Command::LoadSources(stale)) = press(&mut state, KeyCode::Char('r')) else {
            panic!("expected a load");
        };
        assert_eq!(press(&mut state, KeyCode::Char('2')), None);
        assert_eq!(state.tab, Category::Metadata);

        apply_load_result(&mut state, stale, Ok(vec![record("late", true, &[])]));
        assert!(state.danmaku.items().is_empty());
        assert!(state.activity.is_empty());

        let Some(Command::LoadSources(fresh)) = press(&mut state, KeyCode::Char('1')) else {
            panic!("expected a reload on return");
        };
        apply_load_result(&mut state, fresh, Ok(vec![record("fresh", true, &[])]));
        assert_eq!(state.danmaku.items()[0].name, "fresh");
    }

    #[test]
    fn load_failure_is_shown_inline() {
        let mut state = AppState::default();
        let ticket = state.danmaku.begin_load().expect("load starts");
        apply_load_result(
            &mut state,
            ticket,
            Err(AppError::Config("connection refused".into())),
        );
        assert!(matches!(state.danmaku.view(), ListView::Failed(m) if m.contains("connection refused")));
        assert_eq!(state.screen, Screen::Sources);
        assert!(matches!(state.activity[0].level, LogLevel::Error));
    }

    #[test]
    fn metadata_save_reports_not_implemented() {
        let mut state = AppState::default();
        press(&mut state, KeyCode::Tab);
        press(&mut state, KeyCode::Down);
        press(&mut state, KeyCode::Char('d'));
        assert_eq!(state.metadata.items()[1].name, "TMDB");

        assert_eq!(press(&mut state, KeyCode::Char('s')), None);
        let notice = state.notice.clone().expect("notice shown");
        assert_eq!(notice.kind, NoticeKind::Info);
        assert!(notice.message.contains("not implemented"));
    }

    #[test]
    fn toggle_key_flips_only_the_selected_source() {
        let mut state = loaded_state();
        press(&mut state, KeyCode::Down);
        press(&mut state, KeyCode::Char(' '));
        assert!(!state.danmaku.items()[0].enabled);
        assert!(!state.danmaku.items()[1].enabled);
        assert!(state.status.contains("(unsaved)"));
    }

    #[test]
    fn activity_log_is_truncated_to_max_size() {
        let mut state = AppState {
            max_activity: 2,
            ..AppState::default()
        };
        append_activity(&mut state, LogLevel::Info, "first", "one");
        append_activity(&mut state, LogLevel::Info, "second", "two");
        append_activity(&mut state, LogLevel::Error, "third", "three");
        assert_eq!(state.activity.len(), 2);
        assert_eq!(state.activity[0].event, "second");
        assert_eq!(state.activity[1].event, "third");
    }

    #[test]
    fn quit_requires_confirmation() {
        let mut state = AppState::default();
        press(&mut state, KeyCode::Char('q'));
        assert_eq!(state.screen, Screen::Confirm(ConfirmAction::Quit));
        press(&mut state, KeyCode::Enter);
        assert!(state.running);
        assert_eq!(state.screen, Screen::Sources);

        press(&mut state, KeyCode::Char('q'));
        press(&mut state, KeyCode::Right);
        press(&mut state, KeyCode::Enter);
        assert!(!state.running);
    }
}
