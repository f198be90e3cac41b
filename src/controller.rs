use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

use crate::domain::{Message, RESIZE_QUIET_PERIOD, SVError};
use crate::model::Model;

/// Coalesces bursts of values into the last one, released after a quiet period.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiet_period: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Takes the latest value once nothing was pushed for the quiet period.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if now.saturating_duration_since(*at) >= self.quiet_period => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

pub struct Controller {
    event_poll_time: u64,
    resize: Debouncer<(usize, usize)>,
    notifications: Receiver<Message>,
}

impl Controller {
    /// `notifications` carries messages from background sheet loads.
    pub fn new(event_poll_time: u64, notifications: Receiver<Message>) -> Self {
        Self {
            event_poll_time,
            resize: Debouncer::new(RESIZE_QUIET_PERIOD),
            notifications,
        }
    }

    pub fn handle_event(&mut self, model: &Model) -> Result<Option<Message>, SVError> {
        if let Ok(message) = self.notifications.try_recv() {
            return Ok(Some(message));
        }
        if let Some((width, height)) = self.resize.poll(Instant::now()) {
            return Ok(Some(Message::Resize(width, height)));
        }

        // Wake up in time to release a pending resize.
        let poll_time = if self.resize.is_pending() {
            self.event_poll_time.min(RESIZE_QUIET_PERIOD.as_millis() as u64 / 5)
        } else {
            self.event_poll_time
        };
        if event::poll(Duration::from_millis(poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    return Ok(Self::handle_key(key, model.raw_keyevents()));
                }
                Event::Resize(width, height) => {
                    trace!("Resize event {width}x{height}");
                    self.resize
                        .push((width as usize, height as usize), Instant::now());
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(key: KeyEvent, raw: bool) -> Option<Message> {
        if raw {
            return Some(Message::RawKey(key));
        }
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
            (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::MoveEnd),
            (KeyCode::Tab | KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::NextTab),
            (KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h'), _) => {
                Some(Message::PreviousTab)
            }
            (KeyCode::Char(d @ '1'..='9'), _) => {
                d.to_digit(10).map(|n| Message::SelectTab(n as usize - 1))
            }
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('c'), _) => Some(Message::CopyCell),
            (KeyCode::Char('r'), _) => Some(Message::CopyRow),
            (KeyCode::Char('o'), _) => Some(Message::CopyLink),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
