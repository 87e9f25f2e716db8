use serde::{Deserialize, Serialize};

/// Field name used when a payload carries no structured key/value pairs.
pub const FALLBACK_KEY: &str = "serialNumber";

const DELIMITER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub key: String,
    pub value: String,
}

/// Key/value record extracted from a decoded payload. Keys are unique and
/// keep the order of their first appearance, so re-keyed lines update in
/// place and display order stays stable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRecord {
    fields: Vec<Field>,
}

impl NormalizedRecord {
    pub fn insert(&mut self, key: &str, value: &str) {
        if let Some(field) = self.fields.iter_mut().find(|field| field.key == key) {
            field.value = value.to_string();
        } else {
            self.fields.push(Field {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.key == key)
            .map(|field| field.value.as_str())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Normalize raw decoded text into a `NormalizedRecord`.
///
/// Total and pure: any input yields a record. Payloads without a `:` become a
/// single entry under [`FALLBACK_KEY`] holding the trimmed raw text. Otherwise
/// each non-blank line is split on its first `:`; lines whose key or value
/// trims to empty contribute nothing. A structured payload that yields zero
/// usable pairs falls back to the single-entry form so both branches agree.
pub fn parse_payload(raw: &str) -> NormalizedRecord {
    let mut record = NormalizedRecord::default();

    if !raw.contains(DELIMITER) {
        record.insert(FALLBACK_KEY, raw.trim());
        return record;
    }

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(DELIMITER) else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        record.insert(key, value);
    }

    if record.is_empty() {
        record.insert(FALLBACK_KEY, raw.trim());
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_payload_maps_to_serial_number() {
        let record = parse_payload("EMP004");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get(FALLBACK_KEY), Some("EMP004"));
    }

    #[test]
    fn bare_payload_is_trimmed() {
        let record = parse_payload("  EMP004 \n");
        assert_eq!(record.get(FALLBACK_KEY), Some("EMP004"));
    }

    #[test]
    fn structured_payload_splits_on_first_delimiter() {
        let record = parse_payload("Model: X100\nSerial: 99182\n");
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("Model"), Some("X100"));
        assert_eq!(record.get("Serial"), Some("99182"));
    }

    #[test]
    fn value_keeps_later_delimiters() {
        let record = parse_payload("url: https://example.com/machines/4");
        assert_eq!(record.get("url"), Some("https://example.com/machines/4"));
    }

    #[test]
    fn blank_and_delimiterless_lines_are_dropped() {
        let record = parse_payload("Model: X100\n\nBadLineNoDelimiter\nSerial: 99182");
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("Model"), Some("X100"));
        assert_eq!(record.get("Serial"), Some("99182"));
    }

    #[test]
    fn half_empty_lines_contribute_nothing() {
        let record = parse_payload("Model: X100\n: orphanValue\norphanKey:  \n");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("Model"), Some("X100"));
    }

    #[test]
    fn duplicate_keys_last_write_wins_in_place() {
        let record = parse_payload("A:1\nA:2");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("A"), Some("2"));
    }

    #[test]
    fn duplicate_key_keeps_first_position() {
        let record = parse_payload("A:1\nB:9\nA:2");
        let keys: Vec<&str> = record.fields().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(record.get("A"), Some("2"));
    }

    #[test]
    fn structured_payload_with_no_usable_pairs_falls_back() {
        let record = parse_payload(" : \n:\n");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get(FALLBACK_KEY), Some(": \n:"));
    }

    #[test]
    fn crlf_lines_are_handled() {
        let record = parse_payload("Model: X100\r\nSerial: 99182\r\n");
        assert_eq!(record.get("Model"), Some("X100"));
        assert_eq!(record.get("Serial"), Some("99182"));
    }

    #[test]
    fn parse_is_idempotent_for_identical_input() {
        let raw = "Model: X100\nSerial: 99182";
        assert_eq!(parse_payload(raw), parse_payload(raw));
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = parse_payload("Model: X100\nSerial: 99182");
        let json = serde_json::to_string(&record).expect("serialize");
        let back: NormalizedRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(record, back);
    }
}
