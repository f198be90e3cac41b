use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, trace};

use crate::config::ViewerConfig;
use crate::domain::SVError;
use crate::fetch::Fetch;
use crate::metadata::{self, Metadata};
use crate::parser::RecordParser;
use crate::sheets::{SheetCache, SheetFailure, SheetState};
use crate::view::{self, ViewModel};
use crate::{filter, projector};

/// Owns the active sheet selection, the per-sheet search queries and the
/// viewport width, and publishes a fresh [`ViewModel`] on every change.
pub struct TabController {
    config: Arc<ViewerConfig>,
    fetcher: Arc<dyn Fetch>,
    cache: SheetCache,
    active: String,
    queries: HashMap<String, String>,
    viewport_width: usize,
    metadata: Metadata,
    views: watch::Sender<ViewModel>,
}

impl TabController {
    pub fn new(
        config: Arc<ViewerConfig>,
        fetcher: Arc<dyn Fetch>,
        parser: Arc<dyn RecordParser>,
        viewport_width: usize,
    ) -> Result<Self, SVError> {
        config.validate()?;
        let active = config.sheets.keys().next().cloned().ok_or(SVError::NoSheets)?;
        let cache = SheetCache::new(Arc::clone(&config), Arc::clone(&fetcher), parser);
        let (views, _) = watch::channel(ViewModel::empty(&active));
        Ok(Self {
            config,
            fetcher,
            cache,
            active,
            queries: HashMap::new(),
            viewport_width,
            metadata: Metadata::default(),
            views,
        })
    }

    /// Loads the metadata sheet, then activates the first sheet.
    pub async fn initialize(&mut self) -> Result<(), SVError> {
        self.load_metadata().await;
        let first = self.active.clone();
        self.show(&first).await
    }

    pub async fn load_metadata(&mut self) {
        if let Some(locator) = self.config.metadata_locator() {
            self.metadata = metadata::load(self.fetcher.as_ref(), &locator).await;
        }
    }

    /// Activates `name` even if it already is the active sheet.
    pub async fn show(&mut self, name: &str) -> Result<(), SVError> {
        self.select(name, true)?;
        self.load_and_render(name).await;
        Ok(())
    }

    /// Makes `name` the active sheet and waits for its rows.
    pub async fn activate_tab(&mut self, name: &str) -> Result<(), SVError> {
        if self.select(name, false)? {
            self.load_and_render(name).await;
        }
        Ok(())
    }

    /// Switches the selection without waiting for the sheet to load.
    /// Returns false when `name` already was active and `force` is not set.
    pub fn select(&mut self, name: &str, force: bool) -> Result<bool, SVError> {
        if !self.config.sheets.contains_key(name) {
            return Err(SVError::UnknownSheet(name.to_string()));
        }
        if self.active == name && !force {
            trace!("Sheet {name} is already active");
            return Ok(false);
        }
        info!("Activating sheet {name}");
        self.active = name.to_string();
        self.render();
        Ok(true)
    }

    async fn load_and_render(&mut self, name: &str) {
        self.cache.ensure_loaded(name).await;
        if self.active == name {
            self.render();
        } else {
            debug!("Sheet {name} finished loading in the background");
        }
    }

    pub fn on_search_input(&mut self, name: &str, query: &str) -> Result<(), SVError> {
        if !self.config.sheets.contains_key(name) {
            return Err(SVError::UnknownSheet(name.to_string()));
        }
        self.queries.insert(name.to_string(), query.to_string());
        if self.active == name {
            self.render();
        }
        Ok(())
    }

    pub fn on_viewport_resize(&mut self, viewport_width: usize) {
        trace!("Viewport width {} -> {viewport_width}", self.viewport_width);
        self.viewport_width = viewport_width;
        self.render();
    }

    /// Publishes the view of the active sheet.
    pub fn render(&self) {
        self.views.send_replace(self.view());
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.views.subscribe()
    }

    pub fn view(&self) -> ViewModel {
        self.view_of(&self.active)
    }

    pub fn view_of(&self, name: &str) -> ViewModel {
        let Some(sheet) = self.config.sheets.get(name) else {
            return ViewModel::empty(name);
        };
        let query = self.query(name).to_string();
        let columns = projector::project(sheet, self.viewport_width).to_vec();
        let rows = self.cache.peek(name).unwrap_or_default();
        let visible = filter::apply(&rows, &query);
        ViewModel {
            sheet: name.to_string(),
            rows: view::build_rows(&columns, &visible),
            columns,
            total_rows: rows.len(),
            query,
            state: self.cache.state(name),
        }
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.config.sheet_names()
    }

    pub fn query(&self, name: &str) -> &str {
        self.queries.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn state(&self, name: &str) -> SheetState {
        self.cache.state(name)
    }

    pub fn failure(&self, name: &str) -> Option<SheetFailure> {
        self.cache.failure(name)
    }

    /// Handle for loading sheets outside of `&mut self`, e.g. in spawned tasks.
    pub fn cache(&self) -> SheetCache {
        self.cache.clone()
    }

    pub fn viewport_width(&self) -> usize {
        self.viewport_width
    }
}
