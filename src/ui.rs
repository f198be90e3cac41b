use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap},
};

use crate::domain::NO_RECORDS_TEXT;
use crate::model::Model;
use crate::sheets::SheetState;
use crate::view::ViewModel;

pub const TABS_HEIGHT: usize = 1;
pub const SEARCH_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
const COLUMN_WIDTH_MARGIN: u16 = 1;
const MAX_COLUMN_WIDTH: u16 = 60;
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Default)]
pub struct TableUI;

impl TableUI {
    pub fn new() -> Self {
        Self
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let [tabs_area, search_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(TABS_HEIGHT as u16),
            Constraint::Length(SEARCH_HEIGHT as u16),
            Constraint::Min(TABLE_HEADER_HEIGHT as u16 + 2),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        let view = model.view();
        self.draw_tabs(model, frame, tabs_area);
        self.draw_search(model, &view, frame, search_area);
        self.draw_table(model, &view, frame, table_area);
        self.draw_statusline(model, &view, frame, status_area);

        if let Some(message) = model.popup() {
            self.draw_popup(message, frame);
        }
    }

    fn draw_tabs(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let tabs = model.tabs();
        let names = tabs.sheet_names();
        let selected = names.iter().position(|n| n == tabs.active()).unwrap_or(0);
        let titles: Vec<Line> = names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let marker = match tabs.state(name) {
                    SheetState::Loading => " …",
                    SheetState::Failed => " !",
                    _ => "",
                };
                Line::from(format!("{} {name}{marker}", idx + 1))
            })
            .collect();
        let widget = Tabs::new(titles)
            .select(selected)
            .style(Style::default().fg(Color::Gray))
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .divider("|");
        frame.render_widget(widget, area);
    }

    fn draw_search(&self, model: &Model, view: &ViewModel, frame: &mut Frame, area: Rect) {
        let label = "Search: ".bold();
        let line = match model.input() {
            Some(input) => {
                let prefix = "Search: ".chars().count() as u16;
                let cursor = input.text().chars().take(input.cursor()).count() as u16;
                frame.set_cursor_position((area.x + prefix + cursor, area.y));
                Line::from(vec![label, Span::raw(input.text().to_string())])
            }
            None if view.query.is_empty() => {
                Line::from(vec![label, "press / to search".dark_gray()])
            }
            None => Line::from(vec![label, Span::raw(view.query.clone())]),
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn column_widths(view: &ViewModel, rows: usize) -> Vec<Constraint> {
        let count = view.columns.len();
        view.columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                if idx + 1 == count {
                    return Constraint::Fill(1);
                }
                let content = view
                    .rows
                    .iter()
                    .take(rows)
                    .map(|r| r.cells[idx].text.chars().count())
                    .max()
                    .unwrap_or(0);
                let width = content.max(name.chars().count()) as u16 + COLUMN_WIDTH_MARGIN;
                Constraint::Length(width.min(MAX_COLUMN_WIDTH))
            })
            .collect()
    }

    fn draw_table(&self, model: &Model, view: &ViewModel, frame: &mut Frame, area: Rect) {
        let block = Block::bordered()
            .title(Line::from(format!(" {} ", view.sheet).bold()).centered())
            .border_set(border::PLAIN);

        if view.is_loading() || view.shows_no_records() {
            let text = if view.is_loading() {
                "Loading data ..."
            } else {
                NO_RECORDS_TEXT
            };
            let inner = block.inner(area);
            frame.render_widget(block, area);
            let [middle] = Layout::vertical([Constraint::Length(1)])
                .flex(ratatui::layout::Flex::Center)
                .areas(inner);
            frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), middle);
            return;
        }

        let layout = model.layout();
        let selection = model.selection();
        let begin = selection.offset_row.min(view.rows.len());
        let end = (begin + layout.table_height).min(view.rows.len());

        let header = Row::new(view.columns.iter().map(|c| c.clone().bold()))
            .style(Style::default().fg(Color::Yellow));
        let rows = view.rows[begin..end].iter().map(|row| {
            let style = if row.link().is_some() {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED)
            } else {
                Style::default()
            };
            Row::new(row.cells.iter().map(|c| c.text.clone())).style(style)
        });

        let table = Table::new(rows, Self::column_widths(view, end))
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state =
            TableState::default().with_selected(Some(selection.curser_row.saturating_sub(begin)));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_statusline(&self, model: &Model, view: &ViewModel, frame: &mut Frame, area: Rect) {
        let last_update = model.tabs().metadata().last_update().unwrap_or("unknown");
        let right = format!(
            "{}/{} rows | Last update: {last_update} ",
            view.rows.len(),
            view.total_rows
        );
        let [left_area, right_area] = Layout::horizontal([
            Constraint::Fill(1),
            Constraint::Length(right.chars().count() as u16),
        ])
        .areas(area);
        if model.status_message_age() < STATUS_MESSAGE_TIMEOUT {
            frame.render_widget(Paragraph::new(format!(" {}", model.status_message())), left_area);
        }
        frame.render_widget(Paragraph::new(right.blue()).alignment(Alignment::Right), right_area);
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame) {
        let area = centered_rect(frame.area(), 60, 80);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(message.to_string())
                .block(block)
                .wrap(Wrap { trim: false }),
            area,
        );
    }
}

/// Rectangle of the given percentage size centered in `area`.
fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(percent_x) / 100) as u16;
    let height = (u32::from(area.height) * u32::from(percent_y) / 100) as u16;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{ViewCell, ViewRow};
    use pretty_assertions::assert_eq;

    fn view(columns: &[&str], rows: &[&[&str]]) -> ViewModel {
        let mut view = ViewModel::empty("S");
        view.columns = columns.iter().map(|c| c.to_string()).collect();
        view.rows = rows
            .iter()
            .map(|cells| ViewRow {
                cells: cells
                    .iter()
                    .map(|c| ViewCell {
                        text: c.to_string(),
                        link: None,
                    })
                    .collect(),
            })
            .collect();
        view.state = SheetState::Loaded(rows.len());
        view
    }

    #[test]
    fn columns_fit_content_and_last_fills() {
        let view = view(&["#", "TEMA", "PALESTRA"], &[&["10", "Ética", "x"], &["9", "Lógica formal", "y"]]);
        assert_eq!(
            TableUI::column_widths(&view, 2),
            vec![
                Constraint::Length(3),
                Constraint::Length(14),
                Constraint::Fill(1)
            ]
        );
    }

    #[test]
    fn long_columns_are_capped() {
        let long = "x".repeat(200);
        let view = view(&["A", "B"], &[&[long.as_str(), "b"]]);
        assert_eq!(TableUI::column_widths(&view, 1)[0], Constraint::Length(MAX_COLUMN_WIDTH));
    }

    #[test]
    fn centers_popups() {
        let area = Rect::new(0, 0, 100, 50);
        assert_eq!(centered_rect(area, 60, 80), Rect::new(20, 5, 60, 40));

        let wide = Rect::new(0, 0, 2000, 1500);
        assert_eq!(centered_rect(wide, 60, 80), Rect::new(400, 150, 1200, 1200));
    }
}
