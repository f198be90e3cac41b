use std::io::Cursor;
use std::time::Instant;

use indexmap::IndexMap;
use polars::prelude::*;
use tracing::{debug, trace};

use crate::domain::SVError;

/// One parsed CSV line keyed by header, in header order.
pub type Record = IndexMap<String, String>;

pub trait RecordParser: Send + Sync {
    /// Parses CSV text whose first line is the header. Blank lines are skipped.
    fn parse(&self, text: &str) -> Result<Vec<Record>, SVError>;
}

/// CSV parser backed by the polars reader, all cells read as text.
#[derive(Debug, Clone, Default)]
pub struct PolarsCsvParser;

impl PolarsCsvParser {
    fn without_blank_lines(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    fn column_values(df: &DataFrame, name: &str) -> Result<Vec<String>, PolarsError> {
        let column = df.column(name)?.cast(&DataType::String)?;
        let values = column
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect();
        Ok(values)
    }
}

impl RecordParser for PolarsCsvParser {
    fn parse(&self, text: &str) -> Result<Vec<Record>, SVError> {
        let content = Self::without_blank_lines(text);
        if content.is_empty() {
            return Ok(Vec::new());
        }

        let start_time = Instant::now();
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_parse_options(CsvParseOptions::default().with_truncate_ragged_lines(true))
            .into_reader_with_file_handle(Cursor::new(content.into_bytes()))
            .finish()?;

        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        let columns = names
            .iter()
            .map(|name| Self::column_values(&df, name))
            .collect::<Result<Vec<_>, _>>()?;

        let records: Vec<Record> = (0..df.height())
            .map(|row| {
                names
                    .iter()
                    .zip(columns.iter())
                    .map(|(name, values)| (name.clone(), values[row].clone()))
                    .collect()
            })
            .collect();

        debug!(
            "Parsed {} records with {} columns in {}ms",
            records.len(),
            names.len(),
            start_time.elapsed().as_millis()
        );
        trace!("Columns {names:?}");
        Ok(records)
    }
}
