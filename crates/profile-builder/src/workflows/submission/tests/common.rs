use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;

use crate::workflows::submission::{
    AbortSignal, ArtifactStore, PersistOutcome, PersistenceEndpoint, PersistenceError,
    ProfileRecord, StorageError, SubmissionSaga, UploadRule,
};
use crate::workflows::wizard::{
    ArtifactUrl, ComparisonField, FieldRule, FileHandle, FormState, RecordId, SectionValue,
    StepId, StepKind, StepSpec, VerificationRequirement, VerificationVerdict, Visibility,
    WizardDefinition, WizardKind,
};

pub(super) const DETAILS: &str = "details";
pub(super) const LICENCE: &str = "licenceFile";
pub(super) const PORTFOLIO: &str = "portfolioFile";
pub(super) const BROCHURE: &str = "brochureFile";

/// Four steps: details, a verified licence, an optional portfolio, and a brochure only
/// shown on the premium plan.
pub(super) fn definition() -> Arc<WizardDefinition> {
    let steps = vec![
        step(
            "details",
            StepKind::DataEntry,
            vec![DETAILS],
            vec!["companyName", "plan"],
            Visibility::Always,
        ),
        StepSpec {
            verification: Some(VerificationRequirement {
                section: LICENCE,
                comparison: vec![ComparisonField {
                    label: "company_name",
                    section: DETAILS,
                    field: "companyName",
                }],
            }),
            rules: vec![FieldRule::FileVerified { section: LICENCE }],
            ..step("licence", StepKind::Upload, vec![LICENCE], Vec::new(), Visibility::Always)
        },
        step("portfolio", StepKind::Upload, vec![PORTFOLIO], Vec::new(), Visibility::Always),
        step(
            "brochure",
            StepKind::Upload,
            vec![BROCHURE],
            Vec::new(),
            Visibility::FieldEquals {
                section: DETAILS,
                field: "plan",
                value: "premium",
            },
        ),
        step("review", StepKind::Review, Vec::new(), Vec::new(), Visibility::Always),
    ];
    let uploads = vec![
        UploadRule {
            section: LICENCE,
            bucket: "licences",
            folder: None,
            required: true,
        },
        UploadRule {
            section: PORTFOLIO,
            bucket: "portfolios",
            folder: Some("work"),
            required: false,
        },
        UploadRule {
            section: BROCHURE,
            bucket: "brochures",
            folder: None,
            required: true,
        },
    ];

    Arc::new(WizardDefinition::new(WizardKind::EmployerSignup, steps, uploads).expect("valid definition"))
}

fn step(
    id: &'static str,
    kind: StepKind,
    sections: Vec<&'static str>,
    fields: Vec<&'static str>,
    visibility: Visibility,
) -> StepSpec {
    StepSpec {
        id: StepId(id),
        title: id,
        kind,
        sections,
        fields,
        visibility,
        rules: Vec::new(),
        verification: None,
    }
}

pub(super) fn record(value: Value) -> SectionValue {
    match value {
        Value::Object(fields) => SectionValue::Record(fields),
        other => panic!("expected an object, got {other}"),
    }
}

pub(super) fn file(name: &str) -> SectionValue {
    SectionValue::File(FileHandle::new(name, "application/pdf", name.as_bytes().to_vec()))
}

pub(super) fn verdict(verified: bool, message: &str) -> VerificationVerdict {
    VerificationVerdict {
        verified,
        message: message.to_string(),
        checked_at: Utc::now(),
    }
}

/// Details filled in, licence selected and verified, portfolio selected.
pub(super) fn ready_form() -> FormState {
    let mut form = FormState::new();
    form.update_section(
        DETAILS,
        record(serde_json::json!({ "companyName": "Acme Pte Ltd", "plan": "basic" })),
    );
    form.update_section(LICENCE, file("licence.pdf"));
    form.record_verdict(LICENCE, verdict(true, "registration number matches"));
    form.update_section(PORTFOLIO, file("portfolio.pdf"));
    form
}

pub(super) fn saga(store: &Arc<RecordingStore>, endpoint: &Arc<ScriptedEndpoint>) -> SubmissionSaga {
    SubmissionSaga::new(definition(), store.clone(), endpoint.clone())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum StoreEvent {
    Upload { file_name: String, bucket: String, folder: Option<String> },
    Delete(ArtifactUrl),
}

/// In-memory store recording every call; uploads and deletes can be scripted to fail.
#[derive(Default)]
pub(super) struct RecordingStore {
    events: Mutex<Vec<StoreEvent>>,
    fail_upload_at: Option<usize>,
    failing_deletes: bool,
    abort_on_upload: Option<AbortSignal>,
}

impl RecordingStore {
    /// Fail the upload with this 1-based call number.
    pub(super) fn failing_upload(call: usize) -> Self {
        Self {
            fail_upload_at: Some(call),
            ..Self::default()
        }
    }

    pub(super) fn failing_deletes() -> Self {
        Self {
            failing_deletes: true,
            ..Self::default()
        }
    }

    /// Raise the signal while the first upload is in flight.
    pub(super) fn aborting(signal: AbortSignal) -> Self {
        Self {
            abort_on_upload: Some(signal),
            ..Self::default()
        }
    }

    pub(super) fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().expect("store mutex poisoned").clone()
    }

    pub(super) fn uploads(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                StoreEvent::Upload { file_name, .. } => Some(file_name),
                StoreEvent::Delete(_) => None,
            })
            .collect()
    }

    pub(super) fn deletes(&self) -> Vec<ArtifactUrl> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                StoreEvent::Delete(url) => Some(url),
                StoreEvent::Upload { .. } => None,
            })
            .collect()
    }
}

impl ArtifactStore for RecordingStore {
    fn upload(
        &self,
        artifact: &FileHandle,
        bucket: &str,
        folder: Option<&str>,
    ) -> Result<ArtifactUrl, StorageError> {
        let mut events = self.events.lock().expect("store mutex poisoned");
        let call = events
            .iter()
            .filter(|event| matches!(event, StoreEvent::Upload { .. }))
            .count()
            + 1;
        events.push(StoreEvent::Upload {
            file_name: artifact.file_name.clone(),
            bucket: bucket.to_string(),
            folder: folder.map(str::to_string),
        });

        if let Some(signal) = &self.abort_on_upload {
            signal.abort();
        }
        if self.fail_upload_at == Some(call) {
            return Err(StorageError::Unavailable("bucket timed out".to_string()));
        }
        Ok(ArtifactUrl(format!("memory://{bucket}/{}", artifact.file_name)))
    }

    fn delete(&self, url: &ArtifactUrl) -> Result<(), StorageError> {
        self.events
            .lock()
            .expect("store mutex poisoned")
            .push(StoreEvent::Delete(url.clone()));
        if self.failing_deletes {
            return Err(StorageError::Unavailable("delete refused".to_string()));
        }
        Ok(())
    }
}

/// Endpoint replaying scripted responses; persists `rec-1` once the script runs out.
#[derive(Default)]
pub(super) struct ScriptedEndpoint {
    responses: Mutex<VecDeque<Result<PersistOutcome, PersistenceError>>>,
    received: Mutex<Vec<ProfileRecord>>,
}

impl ScriptedEndpoint {
    pub(super) fn replying(response: Result<PersistOutcome, PersistenceError>) -> Self {
        let endpoint = Self::default();
        endpoint
            .responses
            .lock()
            .expect("endpoint mutex poisoned")
            .push_back(response);
        endpoint
    }

    pub(super) fn received(&self) -> Vec<ProfileRecord> {
        self.received.lock().expect("endpoint mutex poisoned").clone()
    }
}

impl PersistenceEndpoint for ScriptedEndpoint {
    fn submit(&self, record: ProfileRecord) -> Result<PersistOutcome, PersistenceError> {
        self.received
            .lock()
            .expect("endpoint mutex poisoned")
            .push(record);
        self.responses
            .lock()
            .expect("endpoint mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Ok(PersistOutcome::Persisted {
                    id: RecordId("rec-1".to_string()),
                })
            })
    }
}
