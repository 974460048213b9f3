//! Loading the labeled corpus
//!
//! The corpus is a JSON array of objects (a CSV export converted to JSON),
//! or JSON Lines when the file ends in `.jsonl`. Only the text and label
//! fields become records; [`RecordStore::load_objects`] keeps every column
//! for corpus statistics.

use crate::config::DatasetConfig;
use misinfo_core::{Error, RawLabel, RawRecord, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Default name of the free-text field
pub const DEFAULT_TEXT_FIELD: &str = "Content_Text";

/// Default name of the categorical label field
pub const DEFAULT_LABEL_FIELD: &str = "Misinformation_Flag";

/// Reads raw labeled records from a structured source
#[derive(Debug, Clone)]
pub struct RecordStore {
    text_field: String,
    label_field: String,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_FIELD, DEFAULT_LABEL_FIELD)
    }
}

impl RecordStore {
    pub fn new(text_field: impl Into<String>, label_field: impl Into<String>) -> Self {
        Self {
            text_field: text_field.into(),
            label_field: label_field.into(),
        }
    }

    pub fn from_config(config: &DatasetConfig) -> Self {
        Self::new(config.text_field.clone(), config.label_field.clone())
    }

    /// Load every record from `path`, preserving file order
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
        let path = path.as_ref();
        let records = self
            .load_objects(path)?
            .iter()
            .enumerate()
            .map(|(index, item)| self.parse_record(index, item))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Loaded {} records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Load the raw JSON objects from `path` with every column intact
    pub fn load_objects(&self, path: impl AsRef<Path>) -> Result<Vec<Value>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::data_source(format!("cannot open {}: {}", path.display(), e))
        })?;

        let is_jsonl = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));

        if is_jsonl {
            return read_jsonl(BufReader::new(file));
        }

        let value: Value = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            Error::data_source(format!("{} is not valid JSON: {}", path.display(), e))
        })?;
        into_items(value)
    }

    /// Load records from a JSON array held in memory
    pub fn load_json_str(&self, json: &str) -> Result<Vec<RawRecord>> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::data_source(format!("invalid JSON: {}", e)))?;
        self.parse_collection(&value)
    }

    /// Load records from JSON Lines, skipping blank lines
    pub fn load_jsonl<R: BufRead>(&self, reader: R) -> Result<Vec<RawRecord>> {
        read_jsonl(reader)?
            .iter()
            .enumerate()
            .map(|(index, item)| self.parse_record(index, item))
            .collect()
    }

    /// Name of the misinformation flag column
    pub fn label_field(&self) -> &str {
        &self.label_field
    }

    fn parse_collection(&self, value: &Value) -> Result<Vec<RawRecord>> {
        let items = value.as_array().ok_or_else(|| {
            Error::data_source("expected a JSON array of records at the top level")
        })?;

        items
            .iter()
            .enumerate()
            .map(|(index, item)| self.parse_record(index, item))
            .collect()
    }

    fn parse_record(&self, index: usize, value: &Value) -> Result<RawRecord> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::data_source(format!("record {} is not an object", index)))?;

        let text = match object.get(&self.text_field) {
            Some(Value::String(text)) => text.clone(),
            Some(other) => {
                return Err(Error::data_source(format!(
                    "record {}: field '{}' must be a string, found {}",
                    index, self.text_field, other
                )))
            }
            None => {
                return Err(Error::data_source(format!(
                    "record {}: missing field '{}'",
                    index, self.text_field
                )))
            }
        };

        let raw_label = match object.get(&self.label_field) {
            Some(value) => raw_label(value),
            None => {
                return Err(Error::data_source(format!(
                    "record {}: missing field '{}'",
                    index, self.label_field
                )))
            }
        };

        Ok(RawRecord { text, raw_label })
    }
}

/// Read a label cell; JSON booleans count as their string form
pub(crate) fn raw_label(value: &Value) -> RawLabel {
    match value {
        Value::String(label) => RawLabel::parse(label),
        Value::Bool(true) => RawLabel::True,
        Value::Bool(false) => RawLabel::False,
        other => RawLabel::Other(other.to_string()),
    }
}

fn into_items(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(Error::data_source(
            "expected a JSON array of records at the top level",
        )),
    }
}

fn read_jsonl<R: BufRead>(reader: R) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            Error::data_source(format!("read failed at line {}: {}", line_no + 1, e))
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| {
            Error::data_source(format!("invalid JSON at line {}: {}", line_no + 1, e))
        })?;
        items.push(value);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_json_array() {
        let json = r#"[
            {"Post_ID": 1, "Content_Text": "A", "Misinformation_Flag": "True", "Like_Count": 3},
            {"Post_ID": 2, "Content_Text": "B", "Misinformation_Flag": "False"},
            {"Post_ID": 3, "Content_Text": "C", "Misinformation_Flag": "Uncertain"}
        ]"#;

        let records = RecordStore::default().load_json_str(json).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], RawRecord::new("A", RawLabel::True));
        assert_eq!(records[1].raw_label, RawLabel::False);
        assert_eq!(records[2].raw_label, RawLabel::Uncertain);
    }

    #[test]
    fn test_non_string_labels() {
        let json = r#"[
            {"Content_Text": "A", "Misinformation_Flag": true},
            {"Content_Text": "B", "Misinformation_Flag": null},
            {"Content_Text": "C", "Misinformation_Flag": 1}
        ]"#;

        let records = RecordStore::default().load_json_str(json).unwrap();
        assert_eq!(records[0].raw_label, RawLabel::True);
        assert_eq!(records[1].raw_label, RawLabel::Other("null".into()));
        assert_eq!(records[2].raw_label, RawLabel::Other("1".into()));
    }

    #[test]
    fn test_missing_field_is_data_source_error() {
        let json = r#"[{"Content_Text": "A"}]"#;
        let err = RecordStore::default().load_json_str(json).unwrap_err();
        assert!(matches!(err, Error::DataSource(_)));
        assert!(err.to_string().contains("Misinformation_Flag"));
    }

    #[test]
    fn test_non_array_is_data_source_error() {
        let err = RecordStore::default()
            .load_json_str(r#"{"Content_Text": "A"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::DataSource(_)));
    }

    #[test]
    fn test_custom_field_names() {
        let json = r#"[{"body": "hello", "flag": "False"}]"#;
        let records = RecordStore::new("body", "flag").load_json_str(json).unwrap();
        assert_eq!(records[0].text, "hello");
    }

    #[test]
    fn test_load_jsonl_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"Content_Text": "one", "Misinformation_Flag": "True"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"Content_Text": "two", "Misinformation_Flag": "False"}}"#).unwrap();

        let records = RecordStore::default().load(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text, "two");
    }

    #[test]
    fn test_load_objects_keeps_every_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        std::fs::write(
            &path,
            r#"[{"Content_Text": "A", "Misinformation_Flag": "True", "Platform": "Reddit"}]"#,
        )
        .unwrap();

        let objects = RecordStore::default().load_objects(&path).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["Platform"], "Reddit");
    }

    #[test]
    fn test_unreadable_source() {
        let err = RecordStore::default()
            .load("/nonexistent/csvjson.json")
            .unwrap_err();
        assert!(matches!(err, Error::DataSource(_)));
    }
}
