use std::time::Duration;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

/// Viewport width (in width units) from which the wide column set is shown.
pub const WIDE_LAYOUT_MIN_WIDTH: usize = 900;
/// Quiet period after the last resize event before the view is re-projected.
pub const RESIZE_QUIET_PERIOD: Duration = Duration::from_millis(250);
/// Column holding the numeric sort key of every sheet.
pub const ORDER_COLUMN: &str = "#";
/// Column holding an optional link for the whole row.
pub const URL_COLUMN: &str = "URL";
/// Metadata key carrying the date of the last dataset update.
pub const LAST_UPDATE_KEY: &str = "last_update";
/// Separator between the search column values inside a search index.
pub const SEARCH_INDEX_SEPARATOR: &str = "|";

pub const NO_RECORDS_TEXT: &str = "No records found";

pub const HELP_TEXT: &str = "
 sheetview - key bindings

 Tabs
   Tab / l      next sheet
   BackTab / h  previous sheet
   1 .. 9       jump to sheet N

 Table
   j / Down     move down
   k / Up       move up
   PageDown     page down
   PageUp       page up
   g / Home     first row
   G / End      last row

 Search
   /            edit the search of the current sheet
   Enter        finish editing
   Esc          clear the search

 Clipboard
   c            copy selected cell
   r            copy selected row
   o            copy the link of the selected row

 ?  help    q  quit
";

#[derive(Debug, Error)]
pub enum SVError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    PolarsError(#[from] PolarsError),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Config file is invalid: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Fetching '{locator}' failed: {reason}")]
    Transport { locator: String, reason: String },

    #[error("Unknown sheet '{0}'")]
    UnknownSheet(String),

    #[error("No sheets configured")]
    NoSheets,

    #[error("Sheet '{name}' is invalid: {reason}")]
    InvalidSheet { name: String, reason: String },
}

#[derive(Debug, Clone)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    NextTab,
    PreviousTab,
    SelectTab(usize),
    Search,
    Enter,
    Exit,
    Help,
    CopyCell,
    CopyRow,
    CopyLink,
    RawKey(KeyEvent),
    Resize(usize, usize),
    SheetLoaded(String),
}
