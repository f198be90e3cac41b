use crate::sheets::{Row, SheetState};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewCell {
    pub text: String,
    /// Every cell of a row with a URL links to it.
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub cells: Vec<ViewCell>,
}

impl ViewRow {
    pub fn link(&self) -> Option<&str> {
        self.cells.first().and_then(|c| c.link.as_deref())
    }
}

/// Everything a presentation layer needs to draw one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub sheet: String,
    pub columns: Vec<String>,
    pub rows: Vec<ViewRow>,
    /// Row count before filtering.
    pub total_rows: usize,
    pub query: String,
    pub state: SheetState,
}

impl ViewModel {
    pub fn empty(sheet: &str) -> Self {
        Self {
            sheet: sheet.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            total_rows: 0,
            query: String::new(),
            state: SheetState::NotLoaded,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SheetState::NotLoaded | SheetState::Loading)
    }

    /// True when the "no records" placeholder should be shown.
    pub fn shows_no_records(&self) -> bool {
        !self.is_loading() && self.rows.is_empty()
    }
}

/// Projects `rows` onto `columns`; missing cells render as empty text.
pub fn build_rows(columns: &[String], rows: &[&Row]) -> Vec<ViewRow> {
    rows.iter()
        .map(|row| {
            let link = row.link().map(str::to_string);
            ViewRow {
                cells: columns
                    .iter()
                    .map(|column| ViewCell {
                        text: row.get(column).to_string(),
                        link: link.clone(),
                    })
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{PolarsCsvParser, RecordParser};
    use crate::sheets;
    use pretty_assertions::assert_eq;

    fn cell(text: &str, link: Option<&str>) -> ViewCell {
        ViewCell {
            text: text.to_string(),
            link: link.map(str::to_string),
        }
    }

    #[test]
    fn rows_with_url_link_every_cell() {
        let data = sheets::build_rows(
            PolarsCsvParser
                .parse("#,A,URL\n2,linked, https://x.org/a \n1,plain,\n")
                .unwrap(),
            &["A".to_string()],
        );
        let refs: Vec<&Row> = data.iter().collect();
        let columns = vec!["#".to_string(), "A".to_string(), "Missing".to_string()];
        let rows = build_rows(&columns, &refs);
        assert_eq!(
            rows,
            vec![
                ViewRow {
                    cells: vec![
                        cell("2", Some("https://x.org/a")),
                        cell("linked", Some("https://x.org/a")),
                        cell("", Some("https://x.org/a")),
                    ]
                },
                ViewRow {
                    cells: vec![cell("1", None), cell("plain", None), cell("", None)]
                },
            ]
        );
        assert_eq!(rows[0].link(), Some("https://x.org/a"));
        assert_eq!(rows[1].link(), None);
    }

    #[test]
    fn placeholder_only_after_loading() {
        let mut view = ViewModel::empty("S");
        assert!(view.is_loading());
        assert!(!view.shows_no_records());
        view.state = SheetState::Loaded(0);
        assert!(view.shows_no_records());
        view.state = SheetState::Failed;
        assert!(view.shows_no_records());
    }
}
