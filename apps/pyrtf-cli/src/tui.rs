//! Interactive configuration form and artifact viewer.
//!
//! The left pane edits the [`Configuration`] held by a [`GenerationSession`];
//! the right pane shows the generated artifacts in tabs. Generation runs on a
//! background task and is drained from a [`GenerationStream`] between frames.

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use pyrtf_core::{
    Artifact, ConfigField, ConfigUpdate, Configuration, Engine, GenerationEvent,
    GenerationSession, GenerationStatus, GenerationStream,
};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::{DefaultTerminal, Frame};
use tracing::{info, warn};

/// How long to wait for input before checking on the background task.
const TICK: Duration = Duration::from_millis(100);

/// Lines scrolled per PageUp/PageDown.
const SCROLL_STEP: u16 = 10;

const TITLE: &str = "PyRTF2PDF Generator";
const SUBTITLE: &str = "Windows Utility Builder";

const EMPTY_STATE: &str = "Configure your RTF-to-PDF tool settings on the left and press g to \
                           generate your custom Python application code.";

const HELP_TEXT: [&str; 9] = [
    "1. Configure Your Logic",
    "   Describe how the Windows utility should behave. Merge everything into one PDF or",
    "   split Tables/Figures into separate files. Enable the MS Word engine for",
    "   high-fidelity conversion if Word is installed.",
    "2. Generate the Source Code",
    "   Press g. Gemini writes a complete Python script for your configuration.",
    "3. Build & Run",
    "   Use Tab to switch between the artifacts. The Instructions tab explains how to",
    "   install the dependencies and build a standalone .exe.",
];

/// Main TUI application state.
pub struct App {
    engine: Engine,
    session: GenerationSession,
    /// Index into [`ConfigField::ALL`].
    selected: usize,
    /// Text buffer while a free-text field is being edited.
    editing: Option<String>,
    tab: Artifact,
    scroll: u16,
    show_help: bool,
    stream: Option<GenerationStream>,
    /// One-line message shown under the header.
    notice: Option<String>,
    running: bool,
}

impl App {
    pub fn new(engine: Engine) -> Self {
        let session = GenerationSession::new(engine.default_configuration());
        Self {
            engine,
            session,
            selected: 0,
            editing: None,
            tab: Artifact::Code,
            scroll: 0,
            show_help: false,
            stream: None,
            notice: None,
            running: true,
        }
    }

    /// Run the TUI event loop.
    pub fn run(mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        while self.running {
            self.poll_generation();
            terminal.draw(|frame| self.draw(frame))?;

            if event::poll(TICK)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key);
            }
        }
        Ok(())
    }

    fn configuration(&self) -> &Configuration {
        self.session.configuration()
    }

    fn selected_field(&self) -> ConfigField {
        ConfigField::ALL[self.selected]
    }

    /// Feed ready events from the background task into the session.
    fn poll_generation(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        while let Some(event) = stream.try_next() {
            match event {
                GenerationEvent::Started { provider, model } => {
                    self.notice = Some(format!("Generating with {provider} ({model})..."));
                }
                GenerationEvent::Completed(result) => {
                    self.session.finish(Ok(result));
                    self.tab = Artifact::Code;
                    self.scroll = 0;
                    self.notice = None;
                }
                GenerationEvent::Failed(failure) => {
                    self.session.finish(Err(failure));
                    self.notice = None;
                }
            }
        }

        if stream.is_finished() {
            self.stream = None;
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.running = false;
            return;
        }

        if self.editing.is_some() {
            self.handle_edit_key(key.code);
            return;
        }

        if self.show_help {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q' | '?')
            ) {
                self.show_help = false;
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Up | KeyCode::Char('k') => self.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Enter | KeyCode::Char(' ') => self.activate(),
            KeyCode::Left | KeyCode::Char('h') => self.adjust(false),
            KeyCode::Right | KeyCode::Char('l') => self.adjust(true),
            KeyCode::Char('g') => self.start_generation(),
            KeyCode::Tab => {
                self.tab = self.tab.next();
                self.scroll = 0;
            }
            KeyCode::PageDown => self.scroll = self.scroll.saturating_add(SCROLL_STEP),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(SCROLL_STEP),
            KeyCode::Char('s') => self.save(),
            _ => {}
        }
    }

    fn handle_edit_key(&mut self, code: KeyCode) {
        let Some(buffer) = self.editing.as_mut() else {
            return;
        };

        match code {
            KeyCode::Char(c) => buffer.push(c),
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Enter => {
                let value = std::mem::take(buffer);
                self.editing = None;
                if let Some(update) = self.selected_field().text_update(value) {
                    self.session.update(update);
                }
            }
            KeyCode::Esc => self.editing = None,
            _ => {}
        }
    }

    fn select_previous(&mut self) {
        self.selected = match self.selected {
            0 => ConfigField::ALL.len() - 1,
            i => i - 1,
        };
    }

    fn select_next(&mut self) {
        self.selected = (self.selected + 1) % ConfigField::ALL.len();
    }

    /// Enter/Space on the selected field: edit text, toggle a flag, or step
    /// a choice forward.
    fn activate(&mut self) {
        let field = self.selected_field();
        let config = self.session.configuration();
        if field.is_text() {
            self.editing = Some(field.display_value(config));
            return;
        }

        let update = match field {
            ConfigField::AppName | ConfigField::SourceExtension => return,
            ConfigField::HandleTables => ConfigUpdate::HandleTables(!config.handle_tables),
            ConfigField::HandleFigures => ConfigUpdate::HandleFigures(!config.handle_figures),
            ConfigField::HandleListings => ConfigUpdate::HandleListings(!config.handle_listings),
            ConfigField::SortingStrategy => {
                ConfigUpdate::SortingStrategy(config.sorting_strategy.next())
            }
            ConfigField::IncludeToc => ConfigUpdate::IncludeToc(!config.include_toc),
            ConfigField::TocDepth => {
                let depth = if config.toc_depth >= Configuration::MAX_TOC_DEPTH {
                    Configuration::MIN_TOC_DEPTH
                } else {
                    config.toc_depth + 1
                };
                ConfigUpdate::TocDepth(depth)
            }
            ConfigField::UseWin32Com => ConfigUpdate::UseWin32Com(!config.use_win32_com),
        };
        self.session.update(update);
    }

    /// Left/Right on the selected field. Only choices respond.
    fn adjust(&mut self, forward: bool) {
        let config = self.configuration();
        let update = match self.selected_field() {
            ConfigField::SortingStrategy => {
                let strategy = config.sorting_strategy;
                ConfigUpdate::SortingStrategy(if forward {
                    strategy.next()
                } else {
                    strategy.previous()
                })
            }
            ConfigField::TocDepth => {
                let depth = config
                    .toc_depth
                    .clamp(Configuration::MIN_TOC_DEPTH, Configuration::MAX_TOC_DEPTH);
                ConfigUpdate::TocDepth(if forward {
                    (depth + 1).min(Configuration::MAX_TOC_DEPTH)
                } else {
                    (depth - 1).max(Configuration::MIN_TOC_DEPTH)
                })
            }
            _ => return,
        };
        self.session.update(update);
    }

    fn start_generation(&mut self) {
        match self.session.begin() {
            Ok(config) => {
                info!(app_name = %config.app_name, "starting generation");
                self.stream = Some(self.engine.spawn_generation(config));
                self.notice = None;
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    /// Write the current artifacts to the output directory.
    fn save(&mut self) {
        let Some(result) = self.session.result() else {
            self.notice = Some("Nothing to save yet. Press g to generate.".to_owned());
            return;
        };

        let dir = self.engine.config().output_dir();
        self.notice = Some(match result.write_to_dir(&dir) {
            Ok(paths) => format!("Saved {} files to {}", paths.len(), dir.display()),
            Err(e) => {
                warn!(error = %e, dir = %dir.display(), "failed to save artifacts");
                format!("Save failed: {e}")
            }
        });
    }

    fn draw(&self, frame: &mut Frame) {
        let [header, body, footer] = Layout::vertical([
            Constraint::Length(4),
            Constraint::Min(10),
            Constraint::Length(1),
        ])
        .areas(frame.area());
        let full = frame.area();

        self.render_header(frame, header);

        let [form, viewer] =
            Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(body);
        self.render_form(frame, form);
        self.render_viewer(frame, viewer);
        self.render_footer(frame, footer);

        if self.show_help {
            render_help(frame, full);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let status = self.session.status();
        let status_style = match status {
            GenerationStatus::Idle => Style::default().fg(Color::DarkGray),
            GenerationStatus::Generating => Style::default().fg(Color::Yellow),
            GenerationStatus::Completed => Style::default().fg(Color::Green),
            GenerationStatus::Error => Style::default().fg(Color::Red),
        };

        let title = Line::from(vec![
            Span::styled(
                TITLE,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" | {SUBTITLE}"), Style::default().fg(Color::Gray)),
            Span::raw("    Status: "),
            Span::styled(status.label(), status_style.add_modifier(Modifier::BOLD)),
        ]);

        let detail = match (self.session.error(), &self.notice) {
            (Some(error), _) => Line::styled(error, Style::default().fg(Color::Red)),
            (None, Some(notice)) => Line::styled(notice.as_str(), Style::default().fg(Color::Yellow)),
            (None, None) => Line::default(),
        };

        let header =
            Paragraph::new(vec![title, detail]).block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, area);
    }

    fn render_form(&self, frame: &mut Frame, area: Rect) {
        let config = self.configuration();
        let items: Vec<ListItem> = ConfigField::ALL
            .iter()
            .enumerate()
            .map(|(i, &field)| {
                let value = match &self.editing {
                    Some(buffer) if i == self.selected => format!("{buffer}_"),
                    _ => field.display_value(config),
                };
                let dimmed = field == ConfigField::TocDepth && !config.include_toc;
                let value_style = if dimmed {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default().fg(Color::Yellow)
                };
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{}: ", field.label()),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(value, value_style),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Configuration "),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        let mut state = ListState::default().with_selected(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_viewer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title(" Output ");

        if self.session.is_generating() {
            let waiting = Paragraph::new("Generating your application code...")
                .style(Style::default().fg(Color::Yellow))
                .block(block);
            frame.render_widget(waiting, area);
            return;
        }

        let Some(result) = self.session.result() else {
            let empty = Paragraph::new(EMPTY_STATE)
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true })
                .block(block);
            frame.render_widget(empty, area);
            return;
        };

        let [tabs_area, content_area] =
            Layout::vertical([Constraint::Length(3), Constraint::Min(1)]).areas(area);

        let tabs = Tabs::new(Artifact::ALL.iter().map(|a| a.title()))
            .select(self.tab.index())
            .block(Block::default().borders(Borders::ALL))
            .highlight_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, tabs_area);

        let content = Paragraph::new(result.artifact(self.tab))
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0))
            .block(Block::default().borders(Borders::ALL).title(format!(" {} ", self.tab.file_name())));
        frame.render_widget(content, content_area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let hints = if self.editing.is_some() {
            "Type to edit | Enter save | Esc cancel"
        } else if self.show_help {
            "Esc close help"
        } else {
            "↑↓ select | Enter toggle/edit | ←→ adjust | g generate | Tab artifact | PgUp/PgDn scroll | s save | ? help | q quit"
        };
        frame.render_widget(
            Paragraph::new(hints).style(Style::default().fg(Color::DarkGray)),
            area,
        );
    }
}

fn render_help(frame: &mut Frame, area: Rect) {
    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(HELP_TEXT.len() as u16 + 2),
        Constraint::Fill(1),
    ])
    .areas(area);
    let [_, popup, _] = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Percentage(80),
        Constraint::Fill(1),
    ])
    .areas(middle);

    let lines: Vec<Line> = HELP_TEXT
        .iter()
        .map(|&text| {
            if text.starts_with(' ') {
                Line::raw(text)
            } else {
                Line::styled(text, Style::default().add_modifier(Modifier::BOLD))
            }
        })
        .collect();

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" How to use "),
        ),
        popup,
    );
}
