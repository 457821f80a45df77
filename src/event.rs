use std::time::Duration;

use color_eyre::eyre::OptionExt;
use crossterm::event::{Event as CrosstermEvent, EventStream};
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;

/// Frames per second for the render tick.
pub const TICK_FPS: f64 = 30.0;

/// Events routed through the application's main loop.
#[derive(Clone, Debug)]
pub enum Event {
    /// Render tick, emitted at [`TICK_FPS`].
    Tick,
    /// Terminal input.
    Crossterm(CrosstermEvent),
    /// Application-level events.
    App(AppEvent),
}

#[derive(Clone, Debug)]
pub enum AppEvent {
    Quit,
    /// Run a sampling cycle now instead of waiting for the cadence.
    RefreshNow,
    /// A terminate/kill task finished; message is already human-readable.
    ControlResult(u32, String),
}

/// Terminal event handler: one task multiplexing crossterm input, the render
/// tick and app events onto a single channel.
#[derive(Debug)]
pub struct EventHandler {
    sender: mpsc::UnboundedSender<Event>,
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let actor = EventTask::new(sender.clone());
        tokio::spawn(async { actor.run().await });
        Self { sender, receiver }
    }

    /// Receive the next event, waiting until one is available.
    pub async fn next(&mut self) -> color_eyre::Result<Event> {
        self.receiver
            .recv()
            .await
            .ok_or_eyre("Failed to receive event")
    }

    pub fn send(&mut self, app_event: AppEvent) {
        // Ignore the result: failing to send means the app is shutting down.
        let _ = self.sender.send(Event::App(app_event));
    }

    /// A sender for background tasks that report back to the main loop.
    pub fn clone_sender(&self) -> mpsc::UnboundedSender<Event> {
        self.sender.clone()
    }
}

struct EventTask {
    sender: mpsc::UnboundedSender<Event>,
}

impl EventTask {
    fn new(sender: mpsc::UnboundedSender<Event>) -> Self {
        Self { sender }
    }

    async fn run(self) {
        let tick_rate = Duration::from_secs_f64(1.0 / TICK_FPS);
        let mut reader = EventStream::new();
        let mut tick = tokio::time::interval(tick_rate);
        loop {
            let tick_delay = tick.tick();
            let crossterm_event = reader.next().fuse();
            tokio::select! {
                _ = self.sender.closed() => {
                    break;
                }
                _ = tick_delay => {
                    self.send(Event::Tick);
                }
                Some(Ok(event)) = crossterm_event => {
                    self.send(Event::Crossterm(event));
                }
            }
        }
    }

    fn send(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}
