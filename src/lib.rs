//! Lazy, tabbed viewer for a spreadsheet published as independent CSV sheets.
//!
//! The core (`sheets`, `filter`, `projector`, `view`, `tabs`) is independent
//! of the terminal; `model`, `controller` and `ui` host it in a ratatui app.

pub mod config;
pub mod controller;
pub mod domain;
pub mod fetch;
pub mod filter;
pub mod inputter;
pub mod metadata;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod projector;
pub mod sheets;
pub mod tabs;
pub mod ui;
pub mod view;
