use tracing::trace;

use crate::normalize::normalize;
use crate::sheets::Row;

/// Rows whose search index contains the normalized query, in their original
/// order. A blank query keeps every row.
pub fn apply<'a>(rows: &'a [Row], raw_query: &str) -> Vec<&'a Row> {
    let query = raw_query.trim();
    if query.is_empty() {
        return rows.iter().collect();
    }

    let term = normalize(query);
    let matches: Vec<&Row> = rows
        .iter()
        .filter(|row| row.search_index().contains(term.as_str()))
        .collect();
    trace!("Filter '{term}' kept {}/{} rows", matches.len(), rows.len());
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{PolarsCsvParser, RecordParser};
    use crate::sheets::build_rows;
    use pretty_assertions::assert_eq;

    fn rows(csv: &str, search: &[&str]) -> Vec<Row> {
        let search: Vec<String> = search.iter().map(|s| s.to_string()).collect();
        build_rows(PolarsCsvParser.parse(csv).unwrap(), &search)
    }

    fn ids(rows: &[&Row]) -> Vec<String> {
        rows.iter().map(|r| r.get("#").to_string()).collect()
    }

    #[test]
    fn blank_query_keeps_everything_in_order() {
        let data = rows("#,A\n1,x\n3,y\n2,z\n", &["A"]);
        let all = apply(&data, "");
        assert_eq!(all.len(), data.len());
        assert_eq!(ids(&all), vec!["3", "2", "1"]);
        assert_eq!(ids(&apply(&data, "   ")), vec!["3", "2", "1"]);
    }

    #[test]
    fn matches_are_accent_and_case_insensitive() {
        let data = rows("#,A\n1,café\n2,cafe\n3,chá\n", &["A"]);
        assert_eq!(ids(&apply(&data, "cafe")), vec!["2", "1"]);
        assert_eq!(ids(&apply(&data, "CAFÉ")), vec!["2", "1"]);
        assert_eq!(ids(&apply(&data, " Cha ")), vec!["3"]);
    }

    #[test]
    fn result_is_exactly_the_matching_rows() {
        let data = rows(
            "#,TEMA,LOCAL\n4,Ética,São Paulo\n3,Lógica,Rio\n2,Estética,Paulínia\n1,Moral,Recife\n",
            &["TEMA", "LOCAL"],
        );
        let query = "PAUL";
        let kept = apply(&data, query);
        assert_eq!(ids(&kept), vec!["4", "2"]);
        let term = normalize(query);
        for row in data.iter() {
            let included = kept.iter().any(|k| std::ptr::eq(*k, row));
            assert_eq!(included, row.search_index().contains(term.as_str()));
        }
    }

    #[test]
    fn only_search_columns_are_searched() {
        let data = rows("#,A,B\n1,visible,hidden\n", &["A"]);
        assert!(apply(&data, "hidden").is_empty());
        assert_eq!(apply(&data, "visible").len(), 1);
    }

    #[test]
    fn separator_is_part_of_the_index() {
        let data = rows("#,A,B\n1,foo,bar\n", &["A", "B"]);
        assert_eq!(apply(&data, "foo|bar").len(), 1);
        assert!(apply(&data, "foobar").is_empty());
    }
}
