use std::fs;
use std::path::Path;

use derive_setters::Setters;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::SVError;

const BUILTIN_BASE_URL: &str = "https://docs.google.com/spreadsheets/d/1J863KkwBSfCvh8cfnNCoK9XO82gS8_0LneSFWJFYuyM/export?format=csv";
const BUILTIN_METADATA_SHEET: &str = "947089910";

/// One dataset partition, fetched and cached independently.
#[derive(Debug, Clone, PartialEq, Deserialize, Setters)]
#[setters(into)]
pub struct SheetConfig {
    /// Opaque locator handed to the transport (sheet id, URL or path).
    pub source: String,
    pub search_columns: Vec<String>,
    pub wide_columns: Vec<String>,
    pub narrow_columns: Vec<String>,
}

impl SheetConfig {
    pub fn new(source: impl Into<String>, columns: &[&str]) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        Self {
            source: source.into(),
            search_columns: columns.clone(),
            wide_columns: columns.clone(),
            narrow_columns: columns,
        }
    }

    fn validate(&self, name: &str) -> Result<(), SVError> {
        let lists = [
            ("search_columns", &self.search_columns),
            ("wide_columns", &self.wide_columns),
            ("narrow_columns", &self.narrow_columns),
        ];
        for (field, list) in lists {
            if list.is_empty() {
                return Err(SVError::InvalidSheet {
                    name: name.to_string(),
                    reason: format!("{field} must not be empty"),
                });
            }
        }
        if self.source.trim().is_empty() {
            return Err(SVError::InvalidSheet {
                name: name.to_string(),
                reason: "source must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Setters)]
#[setters(into)]
pub struct ViewerConfig {
    /// Export URL that bare sheet ids are appended to.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Locator of the key/value metadata sheet.
    #[serde(default)]
    pub metadata: Option<String>,
    /// Sheets in tab order.
    pub sheets: IndexMap<String, SheetConfig>,
}

impl ViewerConfig {
    pub fn load(path: &str) -> Result<Self, SVError> {
        let path = shellexpand::full(path)
            .map_err(|e| SVError::IoError(std::io::Error::other(e.to_string())))?;
        info!("Loading config from {path}");
        let content = fs::read_to_string(Path::new(&*path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SVError> {
        let config: ViewerConfig = toml::from_str(content)?;
        config.validate()?;
        debug!("Config with {} sheets", config.sheets.len());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SVError> {
        if self.sheets.is_empty() {
            return Err(SVError::NoSheets);
        }
        for (name, sheet) in self.sheets.iter() {
            sheet.validate(name)?;
        }
        Ok(())
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }

    /// Full locator of the given sheet.
    pub fn sheet_locator(&self, name: &str) -> Result<String, SVError> {
        let sheet = self
            .sheets
            .get(name)
            .ok_or_else(|| SVError::UnknownSheet(name.to_string()))?;
        Ok(resolve_locator(self.base_url.as_deref(), &sheet.source))
    }

    pub fn metadata_locator(&self) -> Option<String> {
        self.metadata
            .as_deref()
            .map(|m| resolve_locator(self.base_url.as_deref(), m))
    }

    /// The published study spreadsheet this viewer was written for.
    pub fn builtin() -> Self {
        let mut sheets = IndexMap::new();
        sheets.insert(
            "Palestras".to_string(),
            SheetConfig::new("0", &[])
                .search_columns(strings(&[
                    "#", "ÁREA", "DATA", "LOCAL", "CLASSE", "TEMA", "PALESTRA", "ÁREA",
                ]))
                .wide_columns(strings(&["#", "DATA", "LOCAL", "TEMA", "PALESTRA"]))
                .narrow_columns(strings(&["#", "PALESTRA"])),
        );
        sheets.insert(
            "Mapas Mentais".to_string(),
            SheetConfig::new("1154666289", &["#", "SÉRIE", "AUTORES", "NOME"])
                .narrow_columns(strings(&["#", "NOME"])),
        );
        sheets.insert(
            "Minutagem de Lives".to_string(),
            SheetConfig::new("1351222720", &["#", "ÁREA", "TEMA", "ENFOQUE"])
                .narrow_columns(strings(&["#", "ENFOQUE"])),
        );
        sheets.insert(
            "Referências Bibliográficas".to_string(),
            SheetConfig::new("180889834", &["TEMA", "TITULO", "LOCAL", "IDEIA"])
                .narrow_columns(strings(&["TITULO", "LOCAL", "IDEIA"])),
        );
        Self {
            base_url: Some(BUILTIN_BASE_URL.to_string()),
            metadata: Some(BUILTIN_METADATA_SHEET.to_string()),
            sheets,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn is_direct_locator(source: &str) -> bool {
    source.starts_with("http://")
        || source.starts_with("https://")
        || source.starts_with("file://")
        || source.contains('/')
        || source.ends_with(".csv")
}

/// Turns a sheet source into something the transport can fetch.
///
/// URLs and paths are used unchanged; bare ids are appended to `base_url`
/// as a `gid` query parameter.
pub fn resolve_locator(base_url: Option<&str>, source: &str) -> String {
    match base_url {
        Some(base) if !is_direct_locator(source) => {
            let separator = if base.contains('?') { '&' } else { '?' };
            format!("{base}{separator}gid={source}")
        }
        _ => source.to_string(),
    }
}
