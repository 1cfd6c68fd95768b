// CSV export of the rows currently on screen
use crate::domain::tag::TagRegistry;
use crate::domain::telemetry::{format_timestamp, NormalizedRow};
use std::borrow::Cow;

/// Quote a field containing a separator, quote or line break; inner quotes are doubled
fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Render rows as CSV, one column per selected tag. Absent values are empty cells.
pub fn export_csv(rows: &[NormalizedRow], selected_tags: &[String], registry: &TagRegistry) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut header = vec!["Timestamp".to_string()];
    header.extend(selected_tags.iter().map(|tag_id| match registry.get(tag_id) {
        Some(tag) => format!("{}: {} ({})", tag.tag_id, tag.tag_label, tag.unit),
        None => tag_id.clone(),
    }));

    let header: Vec<Cow<'_, str>> = header.iter().map(|h| csv_field(h)).collect();
    let mut lines = vec![header.join(",")];
    for row in rows {
        let mut cells = vec![
            format_timestamp(row.timestamp_ms).unwrap_or_else(|| row.timestamp_ms.to_string()),
        ];
        cells.extend(
            selected_tags
                .iter()
                .map(|tag_id| row.value(tag_id).map(|v| v.to_string()).unwrap_or_default()),
        );
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tag::Tag;

    #[test]
    fn test_export_csv() {
        let registry = TagRegistry::from_tags(vec![Tag::new("T1", "Flow", "m3/h", 0.0, 10.0, None)]);
        let mut first = NormalizedRow::new(0);
        first.values.insert("T1".to_string(), 12.5);
        first.values.insert("T9".to_string(), 3.0);
        let second = NormalizedRow::new(1_500);
        let selected = vec!["T1".to_string(), "T9".to_string()];

        let csv = export_csv(&[first, second], &selected, &registry);
        assert_eq!(
            csv,
            "Timestamp,T1: Flow (m3/h),T9\n\
             1970-01-01T00:00:00.000Z,12.5,3\n\
             1970-01-01T00:00:01.500Z,,"
        );
    }

    #[test]
    fn test_export_quotes_labels_with_separators() {
        let registry = TagRegistry::from_tags(vec![Tag::new(
            "T1",
            "Flow, inlet",
            "\"std\" m3/h",
            0.0,
            10.0,
            None,
        )]);
        let mut row = NormalizedRow::new(0);
        row.values.insert("T1".to_string(), 40.0);

        let csv = export_csv(&[row], &["T1".to_string()], &registry);
        assert_eq!(
            csv,
            "Timestamp,\"T1: Flow, inlet (\"\"std\"\" m3/h)\"\n\
             1970-01-01T00:00:00.000Z,40"
        );
        assert_eq!(csv.lines().next().map(|l| l.matches(',').count()), Some(2));
    }

    #[test]
    fn test_empty_export() {
        assert_eq!(export_csv(&[], &["T1".to_string()], &TagRegistry::default()), "");
    }
}
