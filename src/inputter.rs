use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// What a key press did to the search line.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Text changed, filter again.
    Changed(String),
    /// Editing finished, text kept.
    Finished,
    /// Editing aborted, text cleared.
    Canceled,
    Unchanged,
}

/// Single line editor for the search query of one sheet.
#[derive(Debug, Default, Clone)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize, // in chars
}

impl Inputter {
    pub fn read(&mut self, key: KeyEvent) -> InputEvent {
        let event = match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => InputEvent::Finished,
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => self.home(),
            (KeyCode::End, _) => self.end(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => self.kill_line(),
            (KeyCode::Char(chr), m) if !m.contains(KeyModifiers::CONTROL) => self.insert(chr),
            _ => InputEvent::Unchanged,
        };
        trace!("Input {key:?} => {event:?}");
        event
    }

    /// Replaces the text, cursor at its end.
    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.curser_pos = self.current_input.chars().count();
    }

    pub fn text(&self) -> &str {
        &self.current_input
    }

    pub fn cursor(&self) -> usize {
        self.curser_pos
    }

    fn changed(&self) -> InputEvent {
        InputEvent::Changed(self.current_input.clone())
    }

    fn escape(&mut self) -> InputEvent {
        self.current_input.clear();
        self.curser_pos = 0;
        InputEvent::Canceled
    }

    fn backspace(&mut self) -> InputEvent {
        if self.curser_pos == 0 {
            return InputEvent::Unchanged;
        }
        self.curser_pos -= 1;
        let idx = self.byte_pos();
        self.current_input.remove(idx);
        self.changed()
    }

    fn delete(&mut self) -> InputEvent {
        if self.curser_pos >= self.current_input.chars().count() {
            return InputEvent::Unchanged;
        }
        let idx = self.byte_pos();
        self.current_input.remove(idx);
        self.changed()
    }

    fn kill_line(&mut self) -> InputEvent {
        if self.current_input.is_empty() {
            return InputEvent::Unchanged;
        }
        self.current_input.clear();
        self.curser_pos = 0;
        self.changed()
    }

    fn left(&mut self) -> InputEvent {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        InputEvent::Unchanged
    }

    fn right(&mut self) -> InputEvent {
        if self.curser_pos < self.current_input.chars().count() {
            self.curser_pos += 1;
        }
        InputEvent::Unchanged
    }

    fn home(&mut self) -> InputEvent {
        self.curser_pos = 0;
        InputEvent::Unchanged
    }

    fn end(&mut self) -> InputEvent {
        self.curser_pos = self.current_input.chars().count();
        InputEvent::Unchanged
    }

    fn insert(&mut self, chr: char) -> InputEvent {
        let idx = self.byte_pos();
        self.current_input.insert(idx, chr);
        self.curser_pos += 1;
        self.changed()
    }

    fn byte_pos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}
