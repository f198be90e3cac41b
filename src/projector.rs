use crate::config::SheetConfig;
use crate::domain::WIDE_LAYOUT_MIN_WIDTH;

/// Columns to display for the given viewport width.
pub fn project(config: &SheetConfig, viewport_width: usize) -> &[String] {
    if viewport_width >= WIDE_LAYOUT_MIN_WIDTH {
        &config.wide_columns
    } else {
        &config.narrow_columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn switches_at_the_threshold() {
        let config = SheetConfig::new("0", &["A"])
            .wide_columns(vec!["A".to_string(), "B".to_string()]);
        assert_eq!(project(&config, 899), config.narrow_columns.as_slice());
        assert_eq!(project(&config, 900), config.wide_columns.as_slice());
        assert_eq!(project(&config, 0), config.narrow_columns.as_slice());
        assert_eq!(project(&config, 4000), config.wide_columns.as_slice());
    }
}
