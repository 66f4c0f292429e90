use super::{error::ParseError, types::VideoInfo};
use crate::utils::format_duration;
use serde_json::{Map, Value};

/// One `--dump-json` line decoded into a JSON object, not yet validated.
#[derive(Debug, Clone)]
pub struct RawMetadataRecord {
    fields: Map<String, Value>,
}

pub fn parse_record(line: &str) -> Result<RawMetadataRecord, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    match serde_json::from_str::<Value>(line)? {
        Value::Object(fields) => Ok(RawMetadataRecord { fields }),
        Value::Array(_) => Err(ParseError::NotAnObject("array")),
        Value::String(_) => Err(ParseError::NotAnObject("string")),
        Value::Number(_) => Err(ParseError::NotAnObject("number")),
        Value::Bool(_) => Err(ParseError::NotAnObject("boolean")),
        Value::Null => Err(ParseError::NotAnObject("null")),
    }
}

impl RawMetadataRecord {
    fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    /// Whole seconds; fractional durations are truncated.
    pub fn duration_seconds(&self) -> Option<u64> {
        let duration = self.fields.get("duration")?;
        duration.as_u64().or_else(|| {
            duration
                .as_f64()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(|secs| secs as u64)
        })
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.str_field("thumbnail")
    }

    pub fn webpage_url(&self) -> Option<&str> {
        self.str_field("webpage_url")
    }

    /// Distinct `format_note` values in first-seen order, empties skipped.
    pub fn extract_qualities(&self) -> Vec<String> {
        let Some(formats) = self.fields.get("formats").and_then(Value::as_array) else {
            return Vec::new();
        };

        let mut qualities: Vec<String> = Vec::new();
        for note in formats
            .iter()
            .filter_map(|format| format.get("format_note").and_then(Value::as_str))
        {
            if !note.is_empty() && !qualities.iter().any(|q| q == note) {
                qualities.push(note.to_string());
            }
        }
        qualities
    }
}

impl VideoInfo {
    /// Projects a record; records without a title or duration are rejected.
    pub fn from_record(record: &RawMetadataRecord, fallback_url: &str) -> Result<Self, ParseError> {
        let title = record.title().ok_or(ParseError::MissingField("title"))?;
        let duration = record
            .duration_seconds()
            .ok_or(ParseError::MissingField("duration"))?;

        Ok(Self {
            title: title.to_string(),
            url: record.webpage_url().unwrap_or(fallback_url).to_string(),
            duration: format_duration(duration),
            thumbnail: record.thumbnail().unwrap_or_default().to_string(),
            available_qualities: record.extract_qualities(),
        })
    }
}
