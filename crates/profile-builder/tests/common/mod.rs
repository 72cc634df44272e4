//! Fakes shared by the wizard workflow tests.

#![allow(dead_code)]

use std::sync::Mutex;

use serde_json::Value;

use profile_builder::workflows::submission::{
    ArtifactStore, PersistOutcome, PersistenceEndpoint, PersistenceError, ProfileRecord,
    StorageError,
};
use profile_builder::workflows::wizard::{
    ArtifactUrl, FieldErrors, FileHandle, RecordId, SectionValue, WizardState,
};

/// Mints `memory://<bucket>/<file>` URLs and records every delete.
#[derive(Default)]
pub struct RecordingStore {
    uploads: Mutex<Vec<ArtifactUrl>>,
    deletes: Mutex<Vec<ArtifactUrl>>,
    fail_from: Option<usize>,
}

impl RecordingStore {
    /// Uploads with this 1-based call number and later fail.
    pub fn failing_from(call: usize) -> Self {
        Self {
            fail_from: Some(call),
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<ArtifactUrl> {
        self.uploads.lock().expect("store mutex poisoned").clone()
    }

    pub fn deletes(&self) -> Vec<ArtifactUrl> {
        self.deletes.lock().expect("store mutex poisoned").clone()
    }
}

impl ArtifactStore for RecordingStore {
    fn upload(
        &self,
        artifact: &FileHandle,
        bucket: &str,
        _folder: Option<&str>,
    ) -> Result<ArtifactUrl, StorageError> {
        let mut uploads = self.uploads.lock().expect("store mutex poisoned");
        if self.fail_from.is_some_and(|call| uploads.len() + 1 >= call) {
            return Err(StorageError::Unavailable("connection reset".to_string()));
        }
        let url = ArtifactUrl(format!("memory://{bucket}/{}", artifact.file_name));
        uploads.push(url.clone());
        Ok(url)
    }

    fn delete(&self, url: &ArtifactUrl) -> Result<(), StorageError> {
        self.deletes
            .lock()
            .expect("store mutex poisoned")
            .push(url.clone());
        Ok(())
    }
}

/// Persists records as `<prefix>-<n>`, or rejects every record with fixed field errors.
pub struct RecordingEndpoint {
    records: Mutex<Vec<ProfileRecord>>,
    calls: Mutex<usize>,
    id_prefix: &'static str,
    rejection: Option<FieldErrors>,
}

impl RecordingEndpoint {
    pub fn persisting(id_prefix: &'static str) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
            id_prefix,
            rejection: None,
        }
    }

    pub fn rejecting(field: &str, message: &str) -> Self {
        let mut field_errors = FieldErrors::new();
        field_errors.insert(field.to_string(), message.to_string());
        Self {
            rejection: Some(field_errors),
            ..Self::persisting("rejected")
        }
    }

    pub fn records(&self) -> Vec<ProfileRecord> {
        self.records.lock().expect("endpoint mutex poisoned").clone()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().expect("endpoint mutex poisoned")
    }
}

impl PersistenceEndpoint for RecordingEndpoint {
    fn submit(&self, record: ProfileRecord) -> Result<PersistOutcome, PersistenceError> {
        *self.calls.lock().expect("endpoint mutex poisoned") += 1;
        if let Some(field_errors) = &self.rejection {
            return Ok(PersistOutcome::Rejected {
                field_errors: field_errors.clone(),
            });
        }

        let mut records = self.records.lock().expect("endpoint mutex poisoned");
        records.push(record);
        Ok(PersistOutcome::Persisted {
            id: RecordId(format!("{}-{}", self.id_prefix, records.len())),
        })
    }
}

pub fn record(value: Value) -> SectionValue {
    match value {
        Value::Object(fields) => SectionValue::Record(fields),
        other => panic!("expected object, got {other}"),
    }
}

pub fn list(value: Value) -> SectionValue {
    match value {
        Value::Array(items) => SectionValue::List(
            items
                .into_iter()
                .filter_map(|item| item.as_object().cloned())
                .collect(),
        ),
        other => panic!("expected array, got {other}"),
    }
}

pub fn image(name: &str) -> SectionValue {
    SectionValue::File(FileHandle::new(name, "image/png", vec![0x89, 0x50]))
}

pub fn step_ids(state: &WizardState) -> Vec<&'static str> {
    state
        .effective_steps()
        .into_iter()
        .map(|step| step.id.0)
        .collect()
}
