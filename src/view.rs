use crate::models::ScanRecord;
use crate::payload::NormalizedRecord;

/// Render the presenter surface: the current record (or a placeholder when
/// none exists yet) plus the last error, if any. Display only; a failed
/// decode shows its error next to whatever record is still current.
pub fn render(record: Option<&NormalizedRecord>, last_error: Option<&str>) -> String {
    let mut out = String::new();

    match record {
        Some(record) => {
            for field in record.fields() {
                out.push_str(&field.key);
                out.push_str(": ");
                out.push_str(&field.value);
                out.push('\n');
            }
        }
        None => out.push_str("(no scan yet)\n"),
    }

    if let Some(err) = last_error {
        out.push_str("last error: ");
        out.push_str(err);
        out.push('\n');
    }

    out
}

/// One-line summary for history listings.
pub fn render_history_line(scan: &ScanRecord) -> String {
    let summary = scan
        .record
        .fields()
        .first()
        .map(|field| format!("{}={}", field.key, field.value))
        .unwrap_or_else(|| scan.raw_payload.clone());

    format!(
        "{}  {:<6}  {} field(s)  {}",
        scan.scanned_at.to_rfc3339(),
        scan.source.as_str(),
        scan.record.len(),
        summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScanSource;
    use crate::payload::parse_payload;

    #[test]
    fn renders_record_fields_in_order() {
        let record = parse_payload("Model: X100\nSerial: 99182");
        let rendered = render(Some(&record), None);
        assert_eq!(rendered, "Model: X100\nSerial: 99182\n");
    }

    #[test]
    fn absent_record_with_error_keeps_both_visible() {
        let rendered = render(None, Some("no decodable code found"));
        assert!(rendered.contains("(no scan yet)"));
        assert!(rendered.contains("last error: no decodable code found"));
    }

    #[test]
    fn error_does_not_erase_current_record() {
        let record = parse_payload("EMP004");
        let rendered = render(Some(&record), Some("image could not be read"));
        assert!(rendered.contains("serialNumber: EMP004"));
        assert!(rendered.contains("last error: image could not be read"));
    }

    #[test]
    fn history_line_prefers_first_field() {
        let scan = ScanRecord::new(
            ScanSource::Live,
            "Model: X100\nSerial: 99182".to_string(),
            parse_payload("Model: X100\nSerial: 99182"),
        );
        let line = render_history_line(&scan);
        assert!(line.contains("Live"));
        assert!(line.contains("Model=X100"));
        assert!(line.contains("2 field(s)"));
    }
}
