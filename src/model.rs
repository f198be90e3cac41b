use std::sync::mpsc::Sender;
use std::time::Instant;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{HELP_TEXT, Message};
use crate::inputter::{InputEvent, Inputter};
use crate::sheets::SheetState;
use crate::tabs::TabController;
use crate::ui::{SEARCH_HEIGHT, STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT, TABS_HEIGHT};
use crate::view::ViewModel;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    CMDINPUT,
    POPUP,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        // Table block has a border on top and bottom.
        let chrome = TABS_HEIGHT + SEARCH_HEIGHT + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT + 2;
        UILayout {
            width: ui_width,
            height: ui_height,
            table_height: ui_height.saturating_sub(chrome).max(1),
        }
    }
}

/// Selected row and scroll offset within the visible rows of a sheet.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Selection {
    pub curser_row: usize, // index into the filtered rows
    pub offset_row: usize,
}

impl Selection {
    pub fn down(&mut self, size: usize, nrows: usize, height: usize) {
        if nrows == 0 {
            return;
        }
        self.curser_row = (self.curser_row + size).min(nrows - 1);
        self.scroll_into_view(height);
    }

    pub fn up(&mut self, size: usize, height: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
        self.scroll_into_view(height);
    }

    pub fn beginning(&mut self) {
        *self = Selection::default();
    }

    pub fn end(&mut self, nrows: usize, height: usize) {
        self.curser_row = nrows.saturating_sub(1);
        self.scroll_into_view(height);
    }

    /// Keeps the selection valid after the row count or height changed.
    pub fn clamp(&mut self, nrows: usize, height: usize) {
        self.curser_row = self.curser_row.min(nrows.saturating_sub(1));
        self.offset_row = self.offset_row.min(nrows.saturating_sub(height));
        self.scroll_into_view(height);
    }

    fn scroll_into_view(&mut self, height: usize) {
        let height = height.max(1);
        if self.curser_row < self.offset_row {
            self.offset_row = self.curser_row;
        } else if self.curser_row >= self.offset_row + height {
            self.offset_row = self.curser_row + 1 - height;
        }
    }
}

pub struct Model {
    pub status: Status,
    tabs: TabController,
    views: watch::Receiver<ViewModel>,
    runtime: Handle,
    notifier: Sender<Message>,
    width_scale: usize,
    modus: Modus,
    uilayout: UILayout,
    selection: Selection,
    input: Inputter,
    clipboard: Option<Clipboard>,
    popup_message: String,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    /// `width_scale` converts terminal columns into viewport width units.
    pub fn init(
        mut tabs: TabController,
        runtime: Handle,
        notifier: Sender<Message>,
        width_scale: usize,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        tabs.on_viewport_resize(ui_width * width_scale);
        let views = tabs.subscribe();
        let clipboard = match Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(e) => {
                warn!("Clipboard not available: {e}");
                None
            }
        };
        let mut model = Self {
            status: Status::READY,
            tabs,
            views,
            runtime,
            notifier,
            width_scale,
            modus: Modus::TABLE,
            uilayout: UILayout::from_values(ui_width, ui_height),
            selection: Selection::default(),
            input: Inputter::default(),
            clipboard,
            popup_message: String::new(),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.set_status_message("Press ? for help");
        model
    }

    // -------------------- Accessors used by the ui ---------------------- //

    pub fn view(&self) -> watch::Ref<'_, ViewModel> {
        self.views.borrow()
    }

    pub fn tabs(&self) -> &TabController {
        &self.tabs
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn layout(&self) -> &UILayout {
        &self.uilayout
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn input(&self) -> Option<&Inputter> {
        (self.modus == Modus::CMDINPUT).then_some(&self.input)
    }

    pub fn popup(&self) -> Option<&str> {
        (self.modus == Modus::POPUP).then_some(self.popup_message.as_str())
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn status_message_age(&self) -> std::time::Duration {
        self.last_status_message_update.elapsed()
    }

    // -------------------- Message handling ---------------------- //

    pub fn update(&mut self, message: Option<Message>) {
        let Some(msg) = message else {
            return;
        };
        match msg {
            Message::Quit => self.quit(),
            Message::Resize(width, height) => self.ui_resize(width, height),
            Message::SheetLoaded(name) => self.sheet_loaded(&name),
            msg => match self.modus {
                Modus::TABLE => match msg {
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MovePageDown => self.move_selection_down(self.uilayout.table_height),
                    Message::MovePageUp => self.move_selection_up(self.uilayout.table_height),
                    Message::MoveBeginning => self.selection.beginning(),
                    Message::MoveEnd => self.move_selection_end(),
                    Message::NextTab => self.step_tab(1),
                    Message::PreviousTab => self.step_tab(-1),
                    Message::SelectTab(idx) => self.select_tab(idx),
                    Message::Search => self.enter_search(),
                    Message::Help => self.show_help(),
                    Message::CopyCell => self.copy_cell(),
                    Message::CopyRow => self.copy_row(),
                    Message::CopyLink => self.copy_link(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Exit | Message::Enter | Message::Help => self.modus = Modus::TABLE,
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            },
        }
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn visible_rows(&self) -> usize {
        self.views.borrow().rows.len()
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.tabs.on_viewport_resize(width * self.width_scale);
        let nrows = self.visible_rows();
        self.selection.clamp(nrows, self.uilayout.table_height);
    }

    // -------------------- Tabs ---------------------- //

    fn step_tab(&mut self, step: isize) {
        let names = self.tabs.sheet_names();
        let current = names
            .iter()
            .position(|n| n == self.tabs.active())
            .unwrap_or(0) as isize;
        let next = (current + step).rem_euclid(names.len() as isize) as usize;
        self.activate(&names[next]);
    }

    fn select_tab(&mut self, idx: usize) {
        let names = self.tabs.sheet_names();
        match names.get(idx) {
            Some(name) => self.activate(name),
            None => trace!("No sheet number {}", idx + 1),
        }
    }

    /// Switches tabs right away; rows that are not cached yet are loaded in
    /// the background and announced with `Message::SheetLoaded`.
    fn activate(&mut self, name: &str) {
        match self.tabs.select(name, false) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                error!("Cannot activate {name}: {e}");
                return;
            }
        }
        self.selection = Selection::default();
        self.input.set(self.tabs.query(name));

        if matches!(
            self.tabs.state(name),
            SheetState::NotLoaded | SheetState::Loading
        ) {
            self.set_status_message(format!("Loading {name} ..."));
            let cache = self.tabs.cache();
            let notifier = self.notifier.clone();
            let name = name.to_string();
            self.runtime.spawn(async move {
                cache.ensure_loaded(&name).await;
                if notifier.send(Message::SheetLoaded(name)).is_err() {
                    debug!("Sheet finished loading after shutdown");
                }
            });
        }
    }

    fn sheet_loaded(&mut self, name: &str) {
        self.tabs.render();
        match self.tabs.state(name) {
            SheetState::Failed => {
                let reason = self
                    .tabs
                    .failure(name)
                    .map(|f| f.message)
                    .unwrap_or_default();
                self.set_status_message(format!("Loading {name} failed: {reason}"));
            }
            SheetState::Loaded(n) => {
                info!("Sheet {name} ready with {n} rows");
                if self.tabs.active() == name {
                    self.set_status_message(format!("Loaded {n} rows"));
                }
            }
            _ => {}
        }
        let nrows = self.visible_rows();
        self.selection.clamp(nrows, self.uilayout.table_height);
    }

    // -------------------- Search ---------------------- //

    fn enter_search(&mut self) {
        self.input.set(self.tabs.query(self.tabs.active()));
        self.modus = Modus::CMDINPUT;
    }

    fn raw_input(&mut self, key: KeyEvent) {
        match self.input.read(key) {
            InputEvent::Changed(query) => self.search(&query),
            InputEvent::Finished => self.modus = Modus::TABLE,
            InputEvent::Canceled => {
                self.search("");
                self.modus = Modus::TABLE;
            }
            InputEvent::Unchanged => {}
        }
    }

    fn search(&mut self, query: &str) {
        let active = self.tabs.active().to_string();
        if let Err(e) = self.tabs.on_search_input(&active, query) {
            error!("Search failed: {e}");
            return;
        }
        self.selection = Selection::default();
        let view = self.views.borrow();
        let message = format!("{}/{} rows", view.rows.len(), view.total_rows);
        drop(view);
        self.set_status_message(message);
    }

    // -------------------- Navigation ---------------------- //

    fn move_selection_down(&mut self, size: usize) {
        let nrows = self.visible_rows();
        self.selection.down(size, nrows, self.uilayout.table_height);
    }

    fn move_selection_up(&mut self, size: usize) {
        self.selection.up(size, self.uilayout.table_height);
    }

    fn move_selection_end(&mut self) {
        let nrows = self.visible_rows();
        self.selection.end(nrows, self.uilayout.table_height);
    }

    fn show_help(&mut self) {
        self.popup_message = HELP_TEXT.to_string();
        self.modus = Modus::POPUP;
    }

    // -------------------- Clipboard ---------------------- //

    fn selected_cells(&self) -> Option<Vec<String>> {
        let view = self.views.borrow();
        view.rows
            .get(self.selection.curser_row)
            .map(|row| row.cells.iter().map(|c| c.text.clone()).collect())
    }

    fn copy_cell(&mut self) {
        // The first projected column identifies a row best.
        let cell = self
            .selected_cells()
            .and_then(|cells| cells.into_iter().find(|c| !c.is_empty()));
        match cell {
            Some(cell) => self.copy_to_clipboard(cell),
            None => self.set_status_message("Nothing to copy"),
        }
    }

    fn copy_row(&mut self) {
        match self.selected_cells() {
            Some(cells) => {
                let content = cells
                    .iter()
                    .map(|c| Model::wrap_cell_content(c))
                    .collect::<Vec<String>>()
                    .join(",");
                self.copy_to_clipboard(content)
            }
            None => self.set_status_message("Nothing to copy"),
        }
    }

    fn copy_link(&mut self) {
        let link = {
            let view = self.views.borrow();
            view.rows
                .get(self.selection.curser_row)
                .and_then(|row| row.link().map(str::to_string))
        };
        match link {
            Some(link) => self.copy_to_clipboard(link),
            None => self.set_status_message("Row has no link"),
        }
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = needs_escaping || c.chars().any(|c| c == ',' || c == '\n');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn copy_to_clipboard(&mut self, content: String) {
        let Some(clipboard) = self.clipboard.as_mut() else {
            self.set_status_message("Clipboard not available");
            return;
        };
        trace!("Copy: {content}");
        match clipboard.set_text(content) {
            Ok(_) => self.set_status_message("Copied to clipboard"),
            Err(e) => {
                warn!("Error copying to clipboard: {e:?}");
                self.set_status_message("Copy failed");
            }
        }
    }
}
