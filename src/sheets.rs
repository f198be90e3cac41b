use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use rayon::prelude::*;
use tracing::{debug, error, info, instrument, trace};
use tracing_error::SpanTrace;

use crate::config::ViewerConfig;
use crate::domain::{ORDER_COLUMN, SEARCH_INDEX_SEPARATOR, SVError, URL_COLUMN};
use crate::fetch::Fetch;
use crate::normalize::normalize;
use crate::parser::{Record, RecordParser};

/// A parsed sheet line plus its precomputed search index. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Record,
    search_index: String,
}

impl Row {
    pub fn new(fields: Record, search_columns: &[String]) -> Self {
        let joined = search_columns
            .iter()
            .map(|c| fields.get(c).map(String::as_str).unwrap_or(""))
            .collect::<Vec<&str>>()
            .join(SEARCH_INDEX_SEPARATOR);
        Self {
            search_index: normalize(&joined),
            fields,
        }
    }

    /// Value of `column`, empty when the row has no such column.
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn search_index(&self) -> &str {
        &self.search_index
    }

    /// Target of the row when its URL column is non-empty.
    pub fn link(&self) -> Option<&str> {
        let url = self.get(URL_COLUMN).trim();
        if url.is_empty() { None } else { Some(url) }
    }

    pub fn order_key(&self) -> i64 {
        leading_integer(self.get(ORDER_COLUMN))
    }
}

/// Rows of one sheet, ordered by descending order key.
pub type RowCollection = Vec<Row>;

/// Integer prefix of `value` (after leading whitespace), 0 when there is none.
fn leading_integer(value: &str) -> i64 {
    let value = value.trim_start();
    let (sign, digits) = match value.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, value.strip_prefix('+').unwrap_or(value)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];
    if digits.is_empty() {
        return 0;
    }
    // Out of range values saturate instead of collapsing to 0.
    digits.parse::<i64>().map(|n| sign * n).unwrap_or(if sign < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Augments parsed records with their search index and orders them.
pub fn build_rows(records: Vec<Record>, search_columns: &[String]) -> RowCollection {
    let mut rows: RowCollection = records
        .into_par_iter()
        .map(|record| Row::new(record, search_columns))
        .collect();
    // Stable, rows with equal keys keep their parse order.
    rows.sort_by_key(|row| Reverse(row.order_key()));
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub enum SheetState {
    NotLoaded,
    Loading,
    Loaded(usize),
    Failed,
}

/// Last load failure of a sheet, kept for display and logging.
#[derive(Debug, Clone)]
pub struct SheetFailure {
    pub message: String,
    pub span_trace: SpanTrace,
}

type PendingLoad = Shared<BoxFuture<'static, Arc<RowCollection>>>;

enum CacheEntry {
    Pending(PendingLoad),
    Ready(Arc<RowCollection>),
}

struct CacheInner {
    config: Arc<ViewerConfig>,
    fetcher: Arc<dyn Fetch>,
    parser: Arc<dyn RecordParser>,
    entries: Mutex<HashMap<String, CacheEntry>>,
    failures: Mutex<HashMap<String, SheetFailure>>,
}

/// Lazily loads every sheet at most once and keeps the result for the
/// lifetime of the cache. Failed loads are stored as empty collections.
#[derive(Clone)]
pub struct SheetCache {
    inner: Arc<CacheInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SheetCache {
    pub fn new(
        config: Arc<ViewerConfig>,
        fetcher: Arc<dyn Fetch>,
        parser: Arc<dyn RecordParser>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                config,
                fetcher,
                parser,
                entries: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Rows of `name`, fetching them on first use. Concurrent callers join
    /// the load already in flight.
    pub async fn ensure_loaded(&self, name: &str) -> Arc<RowCollection> {
        let pending = {
            let mut entries = lock(&self.inner.entries);
            match entries.get(name) {
                Some(CacheEntry::Ready(rows)) => return Arc::clone(rows),
                Some(CacheEntry::Pending(load)) => {
                    trace!("Joining pending load of {name}");
                    load.clone()
                }
                None => {
                    let load = self.start_load(name);
                    entries.insert(name.to_string(), CacheEntry::Pending(load.clone()));
                    load
                }
            }
        };

        let rows = pending.await;
        lock(&self.inner.entries).insert(name.to_string(), CacheEntry::Ready(Arc::clone(&rows)));
        rows
    }

    /// Rows of `name` if its load has completed.
    pub fn peek(&self, name: &str) -> Option<Arc<RowCollection>> {
        match lock(&self.inner.entries).get(name) {
            Some(CacheEntry::Ready(rows)) => Some(Arc::clone(rows)),
            Some(CacheEntry::Pending(load)) => load.peek().cloned(),
            None => None,
        }
    }

    pub fn state(&self, name: &str) -> SheetState {
        let rows = {
            let entries = lock(&self.inner.entries);
            match entries.get(name) {
                None => return SheetState::NotLoaded,
                Some(CacheEntry::Ready(rows)) => Arc::clone(rows),
                Some(CacheEntry::Pending(load)) => match load.peek() {
                    Some(rows) => Arc::clone(rows),
                    None => return SheetState::Loading,
                },
            }
        };
        if self.failure(name).is_some() {
            SheetState::Failed
        } else {
            SheetState::Loaded(rows.len())
        }
    }

    pub fn failure(&self, name: &str) -> Option<SheetFailure> {
        lock(&self.inner.failures).get(name).cloned()
    }

    fn start_load(&self, name: &str) -> PendingLoad {
        let cache = self.clone();
        let name = name.to_string();
        async move { cache.load(&name).await }.boxed().shared()
    }

    #[instrument(skip(self))]
    async fn load(&self, name: &str) -> Arc<RowCollection> {
        let start_time = Instant::now();
        match self.fetch_rows(name).await {
            Ok(rows) => {
                info!(
                    "Loaded {} rows of {name} in {}ms",
                    rows.len(),
                    start_time.elapsed().as_millis()
                );
                Arc::new(rows)
            }
            Err(e) => {
                error!("Loading {name} failed: {e}");
                let failure = SheetFailure {
                    message: e.to_string(),
                    span_trace: SpanTrace::capture(),
                };
                debug!("{}", failure.span_trace);
                lock(&self.inner.failures).insert(name.to_string(), failure);
                Arc::new(RowCollection::new())
            }
        }
    }

    async fn fetch_rows(&self, name: &str) -> Result<RowCollection, SVError> {
        let config = &self.inner.config;
        let sheet = config
            .sheets
            .get(name)
            .ok_or_else(|| SVError::UnknownSheet(name.to_string()))?;
        let locator = config.sheet_locator(name)?;
        let text = self.inner.fetcher.fetch(&locator).await?;
        let records = self.inner.parser.parse(&text)?;
        Ok(build_rows(records, &sheet.search_columns))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SheetConfig;
    use crate::parser::PolarsCsvParser;
    use async_trait::async_trait;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    /// In-memory transport counting calls per locator. Unknown locators fail.
    #[derive(Default)]
    pub(crate) struct MockFetcher {
        bodies: HashMap<String, String>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl MockFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with(mut self, locator: &str, body: &str) -> Self {
            self.bodies.insert(locator.to_string(), body.to_string());
            self
        }

        pub(crate) fn calls(&self, locator: &str) -> usize {
            lock(&self.calls).get(locator).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Fetch for MockFetcher {
        async fn fetch(&self, locator: &str) -> Result<String, SVError> {
            *lock(&self.calls).entry(locator.to_string()).or_insert(0) += 1;
            // Suspend once like a real transport would.
            tokio::task::yield_now().await;
            self.bodies
                .get(locator)
                .cloned()
                .ok_or_else(|| SVError::Transport {
                    locator: locator.to_string(),
                    reason: "HTTP status 404 Not Found".into(),
                })
        }
    }

    pub(crate) fn config(sheets: &[(&str, SheetConfig)]) -> Arc<ViewerConfig> {
        let sheets: IndexMap<String, SheetConfig> = sheets
            .iter()
            .map(|(name, sheet)| (name.to_string(), sheet.clone()))
            .collect();
        Arc::new(ViewerConfig {
            base_url: None,
            metadata: None,
            sheets,
        })
    }

    pub(crate) fn cache_with(fetcher: Arc<MockFetcher>, sheets: &[(&str, SheetConfig)]) -> SheetCache {
        SheetCache::new(config(sheets), fetcher, Arc::new(PolarsCsvParser))
    }

    fn column(rows: &RowCollection, name: &str) -> Vec<String> {
        rows.iter().map(|r| r.get(name).to_string()).collect()
    }

    #[test]
    fn parses_leading_integers() {
        assert_eq!(leading_integer("12"), 12);
        assert_eq!(leading_integer(" 7"), 7);
        assert_eq!(leading_integer("12abc"), 12);
        assert_eq!(leading_integer("3.9"), 3);
        assert_eq!(leading_integer("-4"), -4);
        assert_eq!(leading_integer("+5"), 5);
        assert_eq!(leading_integer("abc"), 0);
        assert_eq!(leading_integer(""), 0);
        assert_eq!(leading_integer("-"), 0);
        assert_eq!(leading_integer("99999999999999999999999"), i64::MAX);
        assert_eq!(leading_integer("-99999999999999999999999x"), i64::MIN);
    }

    #[test]
    fn search_index_joins_normalized_columns() {
        let record: Record = [("#", "1"), ("A", "Café"), ("B", "Ignored")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let search = vec!["#".to_string(), "A".to_string(), "Missing".to_string()];
        let row = Row::new(record, &search);
        assert_eq!(row.search_index(), "1|cafe|");
        assert_eq!(row.get("Missing"), "");
        assert_eq!(row.link(), None);
    }

    #[test]
    fn orders_descending_and_stable() {
        let records = PolarsCsvParser
            .parse("#,A\n1,a\n3,b\nx,c\n3,d\n,e\n10,f\n")
            .unwrap();
        let rows = build_rows(records, &["A".to_string()]);
        assert_eq!(column(&rows, "A"), vec!["f", "b", "d", "a", "c", "e"]);
        for pair in rows.windows(2) {
            assert!(pair[0].order_key() >= pair[1].order_key());
        }
    }

    #[tokio::test]
    async fn missing_order_column_keeps_parse_order() {
        let fetcher = Arc::new(MockFetcher::new().with("s", "A,B\n5,x\n1,y\n10,z\n"));
        let sheet = SheetConfig::new("s", &["A"]).wide_columns(vec!["A".to_string(), "B".to_string()]);
        let cache = cache_with(fetcher, &[("S", sheet)]);
        let rows = cache.ensure_loaded("S").await;
        assert_eq!(column(&rows, "A"), vec!["5", "1", "10"]);
        assert_eq!(column(&rows, "B"), vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn fetches_each_sheet_once() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .with("talks", "#,A\n1,a\n2,b\n")
                .with("maps", "#,A\n1,m\n"),
        );
        let cache = cache_with(
            Arc::clone(&fetcher),
            &[
                ("Talks", SheetConfig::new("talks", &["A"])),
                ("Maps", SheetConfig::new("maps", &["A"])),
            ],
        );

        assert_eq!(cache.state("Talks"), SheetState::NotLoaded);
        let first = cache.ensure_loaded("Talks").await;
        let second = cache.ensure_loaded("Talks").await;
        let third = cache.ensure_loaded("Talks").await;
        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(fetcher.calls("talks"), 1);
        assert_eq!(fetcher.calls("maps"), 0);
        assert_eq!(cache.state("Talks"), SheetState::Loaded(2));
        assert_eq!(cache.state("Maps"), SheetState::NotLoaded);
        assert_eq!(column(&first, "A"), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let fetcher = Arc::new(MockFetcher::new().with("talks", "#,A\n1,a\n"));
        let cache = cache_with(Arc::clone(&fetcher), &[("Talks", SheetConfig::new("talks", &["A"]))]);

        let (a, b, c) = tokio::join!(
            cache.ensure_loaded("Talks"),
            cache.ensure_loaded("Talks"),
            cache.ensure_loaded("Talks"),
        );
        assert_eq!(fetcher.calls("talks"), 1);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.len(), 1);
    }

    #[tokio::test]
    async fn pending_load_is_visible_as_loading() {
        let fetcher = Arc::new(MockFetcher::new().with("talks", "#,A\n1,a\n"));
        let cache = cache_with(fetcher, &[("Talks", SheetConfig::new("talks", &["A"]))]);

        let background = cache.clone();
        let handle = tokio::spawn(async move { background.ensure_loaded("Talks").await });
        // Not yet polled or still in flight.
        assert!(matches!(
            cache.state("Talks"),
            SheetState::NotLoaded | SheetState::Loading
        ));
        let rows = handle.await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(cache.peek("Talks").map(|r| r.len()), Some(1));
    }

    #[tokio::test]
    async fn failed_load_is_remembered_as_empty() {
        let fetcher = Arc::new(MockFetcher::new());
        let cache = cache_with(Arc::clone(&fetcher), &[("X", SheetConfig::new("x", &["A"]))]);

        let rows = cache.ensure_loaded("X").await;
        assert!(rows.is_empty());
        let again = cache.ensure_loaded("X").await;
        assert!(again.is_empty());
        assert_eq!(fetcher.calls("x"), 1);
        assert_eq!(cache.state("X"), SheetState::Failed);
        let failure = cache.failure("X").unwrap();
        assert!(failure.message.contains("404"));
    }

    #[tokio::test]
    async fn unknown_sheet_loads_as_empty() {
        let fetcher = Arc::new(MockFetcher::new());
        let cache = cache_with(Arc::clone(&fetcher), &[("X", SheetConfig::new("x", &["A"]))]);
        let rows = cache.ensure_loaded("Nope").await;
        assert!(rows.is_empty());
        assert_eq!(cache.state("Nope"), SheetState::Failed);
        assert_eq!(fetcher.calls("x"), 0);
    }
}
