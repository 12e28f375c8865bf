use anyhow::Result;
use std::{
    cell::Cell,
    io::stdout,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use crate::{
    app::{Action, App, Selection, UiState},
    command::{CommandResult, CommandRunner, ComposerCommand},
    log::{LineKind, LogSink},
    picker::FileBrowser,
};
use crossterm::{
    cursor,
    execute,
    terminal,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
};
use ratatui::{
    Frame,
    Terminal,
    backend::Backend,
    backend::CrosstermBackend,
    style::{Color as RatatuiColor, Modifier, Style},
    text::{Line, Span},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;
use tui_popup::Popup;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SCROLL_STEP: usize = 10;

type Finished = (ComposerCommand, CommandResult);

enum Overlay {
    None,
    Help,
    ConfirmReset,
}

pub struct InteractiveUI {
    app: App,
    runner: Arc<dyn CommandRunner>,
    browser: Option<FileBrowser>,
    overlay: Overlay,
    scroll_back: usize,
    // first log line shown when scrolled fully down, as of the last draw
    log_bottom: Cell<usize>,
    tick: usize,
    finished_tx: UnboundedSender<Finished>,
    finished_rx: UnboundedReceiver<Finished>,
}

impl InteractiveUI {
    pub fn new(app: App, runner: Arc<dyn CommandRunner>) -> Self {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        Self {
            app,
            runner,
            browser: None,
            overlay: Overlay::None,
            scroll_back: 0,
            log_bottom: Cell::new(0),
            tick: 0,
            finished_tx,
            finished_rx,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;

        let result = self.run_on_alternate_screen().await;

        // restore the terminal whichever way the UI ended
        let left = execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show);
        let disabled = terminal::disable_raw_mode();

        result?;
        left?;
        disabled?;
        Ok(())
    }

    async fn run_on_alternate_screen(&mut self) -> Result<()> {
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let backend = CrosstermBackend::new(stdout());
        let mut terminal = Terminal::new(backend)?;

        self.run_interactive_loop(&mut terminal).await
    }

    async fn run_interactive_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        if self.app.state() == UiState::NeedsSelection {
            self.open_browser();
        }

        loop {
            while let Ok((command, result)) = self.finished_rx.try_recv() {
                self.app.finish_command(command, &result);
            }

            terminal.draw(|f| self.draw_ui(f))?;
            self.tick = self.tick.wrapping_add(1);

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key_event) = event::read()? {
                    if key_event.kind != KeyEventKind::Press {
                        continue;
                    }
                    match self.handle_key_event(key_event) {
                        ControlFlow::Exit => break,
                        ControlFlow::Continue => continue,
                    }
                }
            }
        }
        Ok(())
    }

    fn draw_ui(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(4),
                Constraint::Min(5),
                Constraint::Length(3),
            ])
            .split(f.area());

        self.draw_header(f, chunks[0]);
        self.draw_project(f, chunks[1]);
        self.draw_log(f, chunks[2]);
        self.draw_footer(f, chunks[3]);

        if let Some(browser) = &self.browser {
            draw_browser(f, browser);
        }

        match self.overlay {
            Overlay::None => {}
            Overlay::Help => {
                let popup = Popup::new(HELP)
                    .title("keys")
                    .style(Style::default().fg(RatatuiColor::White).bg(RatatuiColor::Blue));
                f.render_widget(&popup, f.area());
            }
            Overlay::ConfirmReset => {
                let popup = Popup::new("Remove the saved settings? (y/n)")
                    .title("remove settings")
                    .style(Style::default().fg(RatatuiColor::White).bg(RatatuiColor::Red));
                f.render_widget(&popup, f.area());
            }
        }
    }

    fn draw_header(&self, f: &mut Frame, area: Rect) {
        let header = Paragraph::new("RCOMPOSER - composer for the terminal")
            .style(Style::default().fg(RatatuiColor::Cyan).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn draw_project(&self, f: &mut Frame, area: Rect) {
        let manifest = self
            .app
            .settings()
            .map(|s| s.file_name.display().to_string())
            .unwrap_or_else(|| "none selected".to_string());

        let (kind, color) = match self.app.state() {
            UiState::NeedsSelection => ("waiting for a composer.json", RatatuiColor::Yellow),
            UiState::Plain => ("composer project", RatatuiColor::Green),
            UiState::FrameworkConsumer => ("drupal project", RatatuiColor::Green),
            UiState::FrameworkCore => ("drupal core", RatatuiColor::Green),
            UiState::Invalid => ("composer.json could not be parsed", RatatuiColor::Red),
        };

        let text = vec![
            Line::from(vec![Span::raw("manifest: "), Span::styled(manifest, Style::default().add_modifier(Modifier::BOLD))]),
            Line::from(vec![Span::raw("project:  "), Span::styled(kind, Style::default().fg(color))]),
        ];

        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Project"));
        f.render_widget(paragraph, area);
    }

    fn draw_log(&self, f: &mut Frame, area: Rect) {
        let lines = log_lines(self.app.log());

        // keep the newest line in view unless the user scrolled back
        let height = area.height.saturating_sub(2) as usize;
        let bottom = lines.len().saturating_sub(height);
        let offset = bottom.saturating_sub(self.scroll_back);
        self.log_bottom.set(bottom);

        let title = if self.scroll_back > 0 {
            format!("Log (scrolled back {})", bottom - offset)
        } else {
            "Log".to_string()
        };

        let paragraph = Paragraph::new(lines)
            .scroll((offset.min(u16::MAX as usize) as u16, 0))
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(paragraph, area);
    }

    fn draw_footer(&self, f: &mut Frame, area: Rect) {
        let mut keys: Vec<String> = self
            .app
            .state()
            .actions()
            .iter()
            .map(|action| format!("{}: {}", key_for(*action), action.label()))
            .collect();
        keys.push("?: help".to_string());
        keys.push("q: quit".to_string());

        let status = if self.app.is_busy() {
            format!(
                "{} {} running | {}",
                SPINNER[self.tick % SPINNER.len()],
                self.app.running(),
                keys.join(" | ")
            )
        } else {
            keys.join(" | ")
        };

        let paragraph = Paragraph::new(status)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Actions"));

        f.render_widget(paragraph, area);
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) -> ControlFlow {
        if self.browser.is_some() {
            self.handle_browser_key(key_event);
            return ControlFlow::Continue;
        }

        match self.overlay {
            Overlay::None => {}
            Overlay::Help => {
                self.overlay = Overlay::None;
                return ControlFlow::Continue;
            }
            Overlay::ConfirmReset => {
                if key_event.code == KeyCode::Char('y') {
                    self.app.remove_settings();
                }
                self.overlay = Overlay::None;
                return ControlFlow::Continue;
            }
        }

        match key_event.code {
            KeyCode::Char('q') | KeyCode::Esc => return ControlFlow::Exit,
            KeyCode::Char('?') => self.overlay = Overlay::Help,
            KeyCode::PageUp => {
                self.scroll_back = (self.scroll_back + SCROLL_STEP).min(self.log_bottom.get());
            }
            KeyCode::PageDown => self.scroll_back = self.scroll_back.saturating_sub(SCROLL_STEP),
            KeyCode::End => self.scroll_back = 0,
            KeyCode::Char(c) => {
                if let Some(action) = action_for(c).filter(|a| self.app.state().allows(*a)) {
                    self.trigger(action);
                }
            }
            _ => {}
        }

        ControlFlow::Continue
    }

    fn handle_browser_key(&mut self, key_event: KeyEvent) {
        let Some(browser) = self.browser.as_mut() else {
            return;
        };

        match key_event.code {
            KeyCode::Up | KeyCode::Char('k') => browser.up(),
            KeyCode::Down | KeyCode::Char('j') => browser.down(),
            KeyCode::Backspace | KeyCode::Left | KeyCode::Char('h') => browser.parent(),
            KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
                if let Some(path) = browser.activate() {
                    self.pick(&path);
                }
            }
            KeyCode::Esc | KeyCode::Char('q') => {
                self.browser = None;
                self.app.select_manifest(None);
            }
            _ => {}
        }
    }

    /// Hand a picked file to the app. The browser stays open when the file
    /// is rejected so the user can pick again.
    fn pick(&mut self, path: &Path) {
        self.scroll_back = 0;
        match self.app.select_manifest(Some(path)) {
            Selection::Selected(_) => self.browser = None,
            Selection::Cancelled => {}
        }
    }

    fn trigger(&mut self, action: Action) {
        match action {
            Action::Select => self.open_browser(),
            Action::RemoveSettings => self.overlay = Overlay::ConfirmReset,
            Action::Install | Action::Update | Action::UpdateDrupal => {
                let Some((command, dir)) = self.app.begin_command(action) else {
                    return;
                };
                self.scroll_back = 0;

                let runner = Arc::clone(&self.runner);
                let finished_tx = self.finished_tx.clone();
                tokio::spawn(async move {
                    let result = runner.run(command, &dir).await;
                    if finished_tx.send((command, result)).is_err() {
                        debug!(%command, "ui closed before command finished");
                    }
                });
            }
        }
    }

    fn open_browser(&mut self) {
        let start = self
            .app
            .settings()
            .map(|s| s.dir.clone())
            .filter(|dir| dir.is_dir())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        self.browser = Some(FileBrowser::open(&start));
    }
}

const HELP: &str = "s  select composer.json
i  composer install
u  composer update
d  update drupal core
x  remove settings
PgUp/PgDn  scroll log
q  quit";

fn key_for(action: Action) -> char {
    match action {
        Action::Select => 's',
        Action::Install => 'i',
        Action::Update => 'u',
        Action::UpdateDrupal => 'd',
        Action::RemoveSettings => 'x',
    }
}

fn action_for(key: char) -> Option<Action> {
    [
        Action::Select,
        Action::Install,
        Action::Update,
        Action::UpdateDrupal,
        Action::RemoveSettings,
    ]
    .into_iter()
    .find(|action| key_for(*action) == key)
}

fn log_lines(log: &LogSink) -> Vec<Line<'_>> {
    let mut lines = Vec::new();

    for entry in log.lines() {
        let style = match entry.kind {
            LineKind::Message => Style::default(),
            LineKind::Announce => Style::default().fg(RatatuiColor::Cyan).add_modifier(Modifier::BOLD),
            LineKind::Error => Style::default().fg(RatatuiColor::Red),
        };
        let stamp = entry.time.format("%H:%M:%S ").to_string();

        let mut text_lines = entry.text.lines();
        let first = text_lines.next().unwrap_or_default();
        lines.push(Line::from(vec![
            Span::styled(stamp, Style::default().fg(RatatuiColor::DarkGray)),
            Span::styled(first, style),
        ]));
        for rest in text_lines {
            lines.push(Line::from(vec![Span::raw("         "), Span::styled(rest, style)]));
        }
    }

    lines
}

fn draw_browser(f: &mut Frame, browser: &FileBrowser) {
    let area = centered(f.area(), 80, 80);

    let items: Vec<ListItem> = browser
        .entries()
        .iter()
        .map(|entry| {
            let name = if entry.is_dir {
                format!("{}/", entry.name)
            } else {
                entry.name.clone()
            };
            let style = if entry.is_manifest() {
                Style::default().fg(RatatuiColor::Green).add_modifier(Modifier::BOLD)
            } else if entry.is_dir {
                Style::default().fg(RatatuiColor::Blue)
            } else {
                Style::default()
            };
            ListItem::new(format!("{:<40} {:>10}", name, entry.display_size())).style(style)
        })
        .collect();

    let mut block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Select composer.json - {}", browser.dir().display()))
        .title_bottom("enter: open | backspace: up | esc: cancel");
    if let Some(err) = browser.error() {
        block = block.title_bottom(Line::styled(err.to_string(), Style::default().fg(RatatuiColor::Red)));
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(RatatuiColor::Black).bg(RatatuiColor::Cyan))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(browser.selected()));

    f.render_widget(Clear, area);
    f.render_stateful_widget(list, area, &mut state);
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(percent_x) / 100) as u16;
    let height = (u32::from(area.height) * u32::from(percent_y) / 100) as u16;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

enum ControlFlow {
    Continue,
    Exit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{command::ProcessRunner, settings::SettingsStore};
    use crossterm::event::KeyModifiers;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, InteractiveUI) {
        let temp_dir = tempdir().unwrap();
        let app = App::new(SettingsStore::new(temp_dir.path().join("settings.json")));
        let ui = InteractiveUI::new(app, Arc::new(ProcessRunner::new("composer")));
        (temp_dir, ui)
    }

    fn press(ui: &mut InteractiveUI, code: KeyCode) -> ControlFlow {
        ui.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_rejected_pick_keeps_browser_open() {
        let (temp_dir, mut ui) = setup();
        let readme = temp_dir.path().join("readme.txt");
        fs::write(&readme, "hello").unwrap();
        ui.browser = Some(FileBrowser::open(temp_dir.path()));

        ui.pick(&readme);
        assert!(ui.browser.is_some());
        assert_eq!(ui.app.state(), UiState::NeedsSelection);
        assert!(ui.app.log().contains("not a composer file"));
    }

    #[test]
    fn test_accepted_pick_closes_browser() {
        let (temp_dir, mut ui) = setup();
        let manifest = temp_dir.path().join("composer.json");
        fs::write(&manifest, r#"{"name": "acme/lib"}"#).unwrap();
        ui.browser = Some(FileBrowser::open(temp_dir.path()));

        // the browser lands on composer.json
        press(&mut ui, KeyCode::Enter);
        assert!(ui.browser.is_none());
        assert_eq!(ui.app.state(), UiState::Plain);
    }

    #[test]
    fn test_escape_closes_browser() {
        let (temp_dir, mut ui) = setup();
        ui.browser = Some(FileBrowser::open(temp_dir.path()));

        press(&mut ui, KeyCode::Esc);
        assert!(ui.browser.is_none());
        assert!(ui.app.log().contains("No file selected"));
    }

    #[test]
    fn test_scroll_back_stops_at_top() {
        let (_temp_dir, mut ui) = setup();
        ui.log_bottom.set(3);

        press(&mut ui, KeyCode::PageUp);
        press(&mut ui, KeyCode::PageUp);
        assert_eq!(ui.scroll_back, 3);

        press(&mut ui, KeyCode::PageDown);
        assert_eq!(ui.scroll_back, 0);
    }

    #[test]
    fn test_every_action_has_a_key() {
        for action in [
            Action::Select,
            Action::Install,
            Action::Update,
            Action::UpdateDrupal,
            Action::RemoveSettings,
        ] {
            assert_eq!(action_for(key_for(action)), Some(action));
        }
        assert_eq!(action_for('z'), None);
    }

    #[test]
    fn test_multiline_log_entries_are_split() {
        let mut log = LogSink::new();
        log.message("stdout: Loading composer repositories\nNothing to install");
        log.announce("Running composer install in /proj/");

        let lines = log_lines(&log);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].spans[1].content, "Nothing to install");
    }

    #[test]
    fn test_centered() {
        let rect = centered(Rect::new(0, 0, 100, 50), 80, 80);
        assert_eq!(rect, Rect::new(10, 5, 80, 40));
    }
}
