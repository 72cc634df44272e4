use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity assigned by the persistence endpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Retrieval URL returned by the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactUrl(pub String);

impl fmt::Display for ArtifactUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file the user selected but which has not been uploaded yet.
///
/// The bytes are never serialized; views only expose name, type, and size.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub file_name: String,
    pub mime_type: String,
    pub size: usize,
    #[serde(skip)]
    bytes: Arc<Vec<u8>>,
}

impl FileHandle {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size: bytes.len(),
            bytes: Arc::new(bytes),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .finish()
    }
}

/// Stored outcome of a document verification, recorded when the file is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub verified: bool,
    pub message: String,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SectionValue {
    Record(Map<String, Value>),
    List(Vec<Map<String, Value>>),
    File(FileHandle),
    /// Artifact persisted by an earlier submission (edit flows).
    Stored(ArtifactUrl),
}

impl SectionValue {
    pub fn is_artifact(&self) -> bool {
        matches!(self, SectionValue::File(_) | SectionValue::Stored(_))
    }
}

/// Accumulated, in-progress wizard data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
    #[serde(default)]
    sections: BTreeMap<String, SectionValue>,
    #[serde(default)]
    verdicts: BTreeMap<String, VerificationVerdict>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, name: &str) -> Option<&SectionValue> {
        self.sections.get(name)
    }

    pub fn sections(&self) -> &BTreeMap<String, SectionValue> {
        &self.sections
    }

    /// Merge a value into the form.
    ///
    /// A record merges field by field into an existing record (a `null` field removes it);
    /// every other combination replaces the section. Replacing an artifact section drops
    /// its verification verdict.
    pub fn update_section(&mut self, name: &str, value: SectionValue) {
        if self.sections.get(name).is_some_and(SectionValue::is_artifact) || value.is_artifact() {
            self.verdicts.remove(name);
        }

        let value = match (self.sections.get_mut(name), value) {
            (Some(SectionValue::Record(existing)), SectionValue::Record(incoming)) => {
                for (field, value) in incoming {
                    if value.is_null() {
                        existing.remove(&field);
                    } else {
                        existing.insert(field, value);
                    }
                }
                return;
            }
            (_, SectionValue::Record(incoming)) => SectionValue::Record(
                incoming
                    .into_iter()
                    .filter(|(_, value)| !value.is_null())
                    .collect(),
            ),
            (_, value) => value,
        };

        self.sections.insert(name.to_string(), value);
    }

    /// Replace a section wholesale without record merging.
    pub(crate) fn replace_section(&mut self, name: &str, value: SectionValue) {
        if value.is_artifact() {
            self.verdicts.remove(name);
        }
        self.sections.insert(name.to_string(), value);
    }

    pub fn field(&self, section: &str, field: &str) -> Option<&Value> {
        match self.sections.get(section) {
            Some(SectionValue::Record(record)) => record.get(field),
            _ => None,
        }
    }

    /// Trimmed string value, `None` when missing or blank.
    pub fn text(&self, section: &str, field: &str) -> Option<&str> {
        self.field(section, field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn list(&self, section: &str) -> &[Map<String, Value>] {
        match self.sections.get(section) {
            Some(SectionValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn file(&self, section: &str) -> Option<&FileHandle> {
        match self.sections.get(section) {
            Some(SectionValue::File(handle)) => Some(handle),
            _ => None,
        }
    }

    pub fn stored_artifact(&self, section: &str) -> Option<&ArtifactUrl> {
        match self.sections.get(section) {
            Some(SectionValue::Stored(url)) => Some(url),
            _ => None,
        }
    }

    pub fn verdict(&self, section: &str) -> Option<&VerificationVerdict> {
        self.verdicts.get(section)
    }

    pub fn record_verdict(&mut self, section: &str, verdict: VerificationVerdict) {
        self.verdicts.insert(section.to_string(), verdict);
    }

    /// True when the section holds a verified selection or an artifact persisted earlier.
    pub fn is_verified(&self, section: &str) -> bool {
        match self.sections.get(section) {
            Some(SectionValue::Stored(_)) => true,
            Some(SectionValue::File(_)) => self
                .verdicts
                .get(section)
                .is_some_and(|verdict| verdict.verified),
            _ => false,
        }
    }

    /// Drop every selected, not yet uploaded file together with its verdict.
    pub fn clear_selected_files(&mut self) -> Vec<String> {
        let cleared: Vec<String> = self
            .sections
            .iter()
            .filter(|(_, value)| matches!(value, SectionValue::File(_)))
            .map(|(name, _)| name.clone())
            .collect();

        for name in &cleared {
            self.sections.remove(name);
            self.verdicts.remove(name);
        }

        cleared
    }
}

/// Whether an untrusted value carries data: not null, not blank, not an empty collection.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> SectionValue {
        match value {
            Value::Object(map) => SectionValue::Record(map),
            other => panic!("expected object, got {other}"),
        }
    }

    fn verdict(verified: bool) -> VerificationVerdict {
        VerificationVerdict {
            verified,
            message: "checked".to_string(),
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn record_updates_merge_fields_and_null_removes() {
        let mut form = FormState::new();
        form.update_section(
            "companyInfo",
            record(json!({ "companyName": "Acme", "industry": "retail" })),
        );
        form.update_section(
            "companyInfo",
            record(json!({ "industry": null, "businessRegistrationNo": "BR-1" })),
        );

        assert_eq!(form.text("companyInfo", "companyName"), Some("Acme"));
        assert_eq!(form.text("companyInfo", "businessRegistrationNo"), Some("BR-1"));
        assert!(form.field("companyInfo", "industry").is_none());
    }

    #[test]
    fn replacing_a_file_drops_its_verdict() {
        let mut form = FormState::new();
        let file = FileHandle::new("br.pdf", "application/pdf", b"BR-1".to_vec());
        form.update_section("brCertificateFile", SectionValue::File(file.clone()));
        form.record_verdict("brCertificateFile", verdict(true));
        assert!(form.is_verified("brCertificateFile"));

        form.update_section("brCertificateFile", SectionValue::File(file));
        assert!(form.verdict("brCertificateFile").is_none());
        assert!(!form.is_verified("brCertificateFile"));
    }

    #[test]
    fn stored_artifacts_count_as_verified() {
        let mut form = FormState::new();
        form.update_section(
            "brCertificateFile",
            SectionValue::Stored(ArtifactUrl("memory://certs/br.pdf".to_string())),
        );
        assert!(form.is_verified("brCertificateFile"));
    }

    #[test]
    fn clearing_selected_files_keeps_stored_artifacts() {
        let mut form = FormState::new();
        form.update_section(
            "companyLogoFile",
            SectionValue::File(FileHandle::new("logo.png", "image/png", vec![1, 2, 3])),
        );
        form.update_section(
            "profileImageFile",
            SectionValue::Stored(ArtifactUrl("memory://images/me.png".to_string())),
        );

        let cleared = form.clear_selected_files();

        assert_eq!(cleared, vec!["companyLogoFile".to_string()]);
        assert!(form.file("companyLogoFile").is_none());
        assert!(form.stored_artifact("profileImageFile").is_some());
    }

    #[test]
    fn file_handles_serialize_without_bytes() {
        let handle = FileHandle::new("cv.pdf", "application/pdf", vec![0; 42]);
        let value = serde_json::to_value(&handle).expect("serializes");
        assert_eq!(
            value,
            json!({ "file_name": "cv.pdf", "mime_type": "application/pdf", "size": 42 })
        );
    }

    #[test]
    fn presence_rejects_blank_and_empty_values() {
        assert!(!is_present(&json!(null)));
        assert!(!is_present(&json!("   ")));
        assert!(!is_present(&json!([])));
        assert!(!is_present(&json!({})));
        assert!(is_present(&json!(0)));
        assert!(is_present(&json!(false)));
        assert!(is_present(&json!("Jane")));
    }
}
