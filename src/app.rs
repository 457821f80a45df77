use std::fmt::Debug;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::*;
use ratatui::{DefaultTerminal, buffer::Buffer, layout::Rect, macros::*, prelude::*, widgets::*};
use tokio::{select, sync::mpsc};
use tui_logger::*;

use crate::{
    config::MonitorConfig,
    event::{AppEvent, Event, EventHandler},
    monitor::{Monitor, Sampler, Snapshot, SortKey, SystemSource, WorkerUpdate, control, shape},
    ui::{
        table::{ProcessTable, SearchBar, StatusBar},
        theme::Theme,
    },
};

/// One turn of the main loop: terminal/app event or worker update.
enum Step {
    Event(Event),
    Update(Option<WorkerUpdate>),
}

pub struct App {
    pub running: bool,
    pub events: EventHandler,
    monitor: Monitor,
    updates: mpsc::Receiver<WorkerUpdate>,
    pub ui_state: UiState,
}

pub struct UiState {
    pub snapshot: Option<Snapshot>,
    pub query: String,
    /// True while the search bar has the keyboard.
    pub searching: bool,
    pub sort_key: SortKey,
    pub selected: usize,
    pub status: String,
    pub title: String,
    pub show_logs: bool,
    pub theme: Theme,
    pub logger_state: TuiWidgetState,
}

impl Debug for UiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiState")
            .field("records", &self.snapshot.as_ref().map(Snapshot::count))
            .field("query", &self.query)
            .field("searching", &self.searching)
            .field("sort_key", &self.sort_key)
            .field("selected", &self.selected)
            .field("status", &self.status)
            .finish()
    }
}

impl App {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let events = EventHandler::new();
        let sampler = Sampler::new(Box::new(SystemSource::new()));
        let (monitor, updates) = Monitor::spawn(
            sampler,
            config.refresh_interval,
            config.show_system_processes,
        );
        Ok(Self {
            running: true,
            events,
            monitor,
            updates,
            ui_state: UiState {
                snapshot: None,
                query: String::new(),
                searching: false,
                sort_key: config.sort_by,
                selected: 0,
                status: "Sampling...".to_string(),
                title: config.window_title,
                show_logs: false,
                theme: Theme::dark(),
                logger_state: TuiWidgetState::new(),
            },
        })
    }

    /// Run the application's main loop.
    pub async fn run(&mut self, mut terminal: DefaultTerminal) -> Result<()> {
        while self.running {
            terminal.draw(|frame| self.render(frame.area(), frame.buffer_mut()))?;
            // Bind before acting: the handlers below mutate state the
            // branch futures borrow.
            let step = select! {
                event = self.events.next() => Step::Event(event?),
                update = self.updates.recv() => Step::Update(update),
            };
            match step {
                Step::Event(Event::Tick) => {}
                Step::Event(Event::Crossterm(event)) => match event {
                    crossterm::event::Event::Key(key_event)
                        if key_event.kind == KeyEventKind::Press =>
                    {
                        self.handle_key_events(key_event)?
                    }
                    _ => {}
                },
                Step::Event(Event::App(app_event)) => match app_event {
                    AppEvent::Quit => self.quit(),
                    AppEvent::RefreshNow => self.monitor.refresh_now(),
                    AppEvent::ControlResult(pid, message) => {
                        self.ui_state.status = format!("PID {pid}: {message}");
                        self.monitor.refresh_now();
                    }
                },
                Step::Update(Some(WorkerUpdate::Snapshot(snapshot))) => self.publish(snapshot),
                Step::Update(Some(WorkerUpdate::Status(message))) => {
                    warn!(target: "App", "{message}");
                    self.ui_state.status = message;
                }
                Step::Update(None) => self.quit(),
            }
        }
        self.monitor.stop();
        Ok(())
    }

    /// Handles the key events and updates the state of [`App`].
    pub fn handle_key_events(&mut self, key_event: KeyEvent) -> Result<()> {
        if self.ui_state.searching {
            match key_event.code {
                KeyCode::Esc => self.ui_state.searching = false,
                KeyCode::Enter => {
                    self.ui_state.searching = false;
                    self.events.send(AppEvent::RefreshNow);
                }
                KeyCode::Backspace => {
                    self.ui_state.query.pop();
                }
                KeyCode::Char(c) => self.ui_state.query.push(c),
                _ => {}
            }
            return Ok(());
        }
        match key_event.code {
            KeyCode::Esc | KeyCode::Char('q') => self.events.send(AppEvent::Quit),
            KeyCode::Char('c' | 'C') if key_event.modifiers == KeyModifiers::CONTROL => {
                self.events.send(AppEvent::Quit)
            }
            KeyCode::Char('/') => self.ui_state.searching = true,
            KeyCode::Char('r') => self.events.send(AppEvent::RefreshNow),
            KeyCode::Char('s') => self.ui_state.sort_key = self.ui_state.sort_key.next(),
            KeyCode::Char('a') => {
                let shown = self.monitor.toggle_show_system();
                self.ui_state.status = if shown {
                    "Showing system processes".to_string()
                } else {
                    "Hiding system processes".to_string()
                };
                self.events.send(AppEvent::RefreshNow);
            }
            KeyCode::Char('t') => self.terminate_selected(),
            KeyCode::Char('k') => self.kill_selected(),
            KeyCode::Char('L') => self.ui_state.show_logs = !self.ui_state.show_logs,
            KeyCode::Up => self.ui_state.selected = self.ui_state.selected.saturating_sub(1),
            KeyCode::Down => {
                let last = self.shaped().len().saturating_sub(1);
                self.ui_state.selected = (self.ui_state.selected + 1).min(last);
            }
            _ => {}
        }
        Ok(())
    }

    /// The latest snapshot through the search/sort stage, in display order.
    fn shaped(&self) -> Vec<crate::monitor::ProcessRecord> {
        match &self.ui_state.snapshot {
            Some(snapshot) => shape(&snapshot.records, &self.ui_state.query, self.ui_state.sort_key),
            None => Vec::new(),
        }
    }

    fn selected_pid(&self) -> Option<u32> {
        self.shaped().get(self.ui_state.selected).map(|r| r.pid)
    }

    fn publish(&mut self, snapshot: Snapshot) {
        self.ui_state.status = format!(
            "Last refresh {} - {} processes",
            snapshot.taken_at.format("%H:%M:%S"),
            snapshot.count()
        );
        self.ui_state.snapshot = Some(snapshot);
        let last = self.shaped().len().saturating_sub(1);
        self.ui_state.selected = self.ui_state.selected.min(last);
    }

    /// Ask the selected process to exit, off the render loop, and report the
    /// outcome back through the event channel.
    fn terminate_selected(&mut self) {
        let Some(pid) = self.selected_pid() else {
            return;
        };
        self.ui_state.status = format!("Sent SIGTERM to PID {pid}, waiting...");
        let sender = self.events.clone_sender();
        tokio::spawn(async move {
            let outcome = control::request_terminate(pid).await;
            info!(target: "control", "terminate {pid}: {outcome}");
            let _ = sender.send(Event::App(AppEvent::ControlResult(pid, outcome.to_string())));
        });
    }

    fn kill_selected(&mut self) {
        let Some(pid) = self.selected_pid() else {
            return;
        };
        let sender = self.events.clone_sender();
        tokio::spawn(async move {
            let outcome = control::force_kill(pid);
            info!(target: "control", "kill {pid}: {outcome}");
            let _ = sender.send(Event::App(AppEvent::ControlResult(pid, outcome.to_string())));
        });
    }

    /// Set running to false to quit the application.
    fn quit(&mut self) {
        self.running = false;
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let records = self.shaped();
        let theme = &self.ui_state.theme;

        let (search_rect, table_rect, status_rect, log_rect) = if self.ui_state.show_logs {
            let [search, table, status, logs] = vertical![==3, >=5, ==1, ==10].areas(area);
            (search, table, status, Some(logs))
        } else {
            let [search, table, status] = vertical![==3, >=5, ==1].areas(area);
            (search, table, status, None)
        };

        SearchBar {
            query: &self.ui_state.query,
            searching: self.ui_state.searching,
            title: &self.ui_state.title,
            theme,
        }
        .render(search_rect, buf);

        ProcessTable {
            records: &records,
            selected: (!records.is_empty()).then_some(self.ui_state.selected),
            sort_key: self.ui_state.sort_key,
            theme,
        }
        .render(table_rect, buf);

        StatusBar {
            status: &self.ui_state.status,
            theme,
        }
        .render(status_rect, buf);

        if let Some(log_rect) = log_rect {
            let panel_style = Style::default().bg(theme.surface).fg(theme.foreground);
            TuiLoggerSmartWidget::default()
                .style_error(panel_style.fg(theme.error))
                .style_warn(panel_style.fg(theme.warning))
                .style_info(panel_style)
                .style_debug(panel_style)
                .style_trace(panel_style)
                .style(panel_style)
                .output_separator(':')
                .output_timestamp(Some("%H:%M:%S".to_string()))
                .output_level(Some(TuiLoggerLevelOutput::Abbreviated))
                .output_target(true)
                .output_file(false)
                .output_line(false)
                .state(&self.ui_state.logger_state)
                .render(log_rect, buf);
        }
    }
}
