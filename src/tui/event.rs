use crossbeam_channel::{Receiver, Sender, unbounded};
use crossterm::event::{self, KeyEvent};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::IkamonError;
use crate::state::StatusNotice;

/// Events produced by the TUI event loop.
#[derive(Debug)]
pub enum Event {
    /// A keyboard event from crossterm.
    Key(KeyEvent),
    /// Terminal window was resized to (columns, rows).
    Resize(u16, u16),
    /// Periodic tick for UI refresh.
    Tick,
    /// Connection status changed.
    Notice(StatusNotice),
}

/// Terminal input and notice multiplexer.
///
/// A background thread polls crossterm for keyboard/resize events and emits
/// `Event::Tick` at `tick_rate`. Status notices from the poller are merged in
/// by `next()`.
pub struct EventHandler {
    rx: Receiver<Event>,
    notices: Receiver<StatusNotice>,
    _handle: thread::JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration, notices: Receiver<StatusNotice>) -> Result<Self, IkamonError> {
        let (tx, rx) = unbounded();

        let handle = thread::Builder::new()
            .name("ikamon-event".into())
            .spawn(move || input_loop(tick_rate, &tx))
            .map_err(|e| IkamonError::Fatal(format!("spawn event thread: {e}")))?;

        Ok(Self {
            rx,
            notices,
            _handle: handle,
        })
    }

    /// Blocks until the next event is available.
    pub fn next(&self) -> Result<Event, crossbeam_channel::RecvError> {
        crossbeam_channel::select! {
            recv(self.rx) -> ev => ev,
            recv(self.notices) -> notice => match notice {
                Ok(n) => Ok(Event::Notice(n)),
                // Poller gone; keep serving terminal input.
                Err(_) => self.rx.recv(),
            },
        }
    }
}

fn input_loop(tick_rate: Duration, tx: &Sender<Event>) {
    let mut last_tick = Instant::now();
    loop {
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout).unwrap_or(false) {
            let sent = match event::read() {
                Ok(event::Event::Key(key)) => tx.send(Event::Key(key)),
                Ok(event::Event::Resize(w, h)) => tx.send(Event::Resize(w, h)),
                // Ignore mouse, focus, and paste events
                Ok(_) | Err(_) => Ok(()),
            };
            if sent.is_err() {
                return;
            }
        }

        if last_tick.elapsed() >= tick_rate {
            if tx.send(Event::Tick).is_err() {
                return;
            }
            last_tick = Instant::now();
        }
    }
}
