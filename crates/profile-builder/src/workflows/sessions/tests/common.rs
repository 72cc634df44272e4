use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use axum::response::Response;
use serde_json::{json, Value};

use crate::workflows::extraction::{ExtractionError, ExtractionService, PartialRecord};
use crate::workflows::profiles::WizardCatalog;
use crate::workflows::sessions::{
    Collaborators, SessionId, SessionRepository, SessionRepositoryError, WizardSession,
    WizardSessionService,
};
use crate::workflows::submission::{
    ArtifactStore, ComparisonFields, PersistOutcome, PersistenceEndpoint, PersistenceError,
    ProfileRecord, StorageError, VerificationError, VerificationReport, VerificationService,
};
use crate::workflows::wizard::{ArtifactUrl, FileHandle, RecordId};

#[derive(Default)]
pub(super) struct MemorySessions {
    sessions: Mutex<HashMap<SessionId, WizardSession>>,
}

impl MemorySessions {
    pub(super) fn len(&self) -> usize {
        self.sessions.lock().expect("session mutex poisoned").len()
    }
}

impl SessionRepository for MemorySessions {
    fn insert(&self, session: WizardSession) -> Result<WizardSession, SessionRepositoryError> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        if guard.contains_key(&session.id) {
            return Err(SessionRepositoryError::Conflict);
        }
        guard.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn update(&self, session: WizardSession) -> Result<(), SessionRepositoryError> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.insert(session.id.clone(), session);
        Ok(())
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<WizardSession>, SessionRepositoryError> {
        let guard = self.sessions.lock().expect("session mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &SessionId) -> Result<Option<WizardSession>, SessionRepositoryError> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        Ok(guard.remove(id))
    }
}

/// Store that counts live objects so tests can check nothing leaks.
#[derive(Default)]
pub(super) struct CountingStore {
    live: Mutex<Vec<ArtifactUrl>>,
    fail_bucket: Option<&'static str>,
}

impl CountingStore {
    pub(super) fn failing_bucket(bucket: &'static str) -> Self {
        Self {
            fail_bucket: Some(bucket),
            ..Self::default()
        }
    }

    pub(super) fn live(&self) -> Vec<ArtifactUrl> {
        self.live.lock().expect("store mutex poisoned").clone()
    }
}

impl ArtifactStore for CountingStore {
    fn upload(
        &self,
        artifact: &FileHandle,
        bucket: &str,
        _folder: Option<&str>,
    ) -> Result<ArtifactUrl, StorageError> {
        if self.fail_bucket == Some(bucket) {
            return Err(StorageError::Unavailable(format!("{bucket} offline")));
        }
        let url = ArtifactUrl(format!("memory://{bucket}/{}", artifact.file_name));
        self.live
            .lock()
            .expect("store mutex poisoned")
            .push(url.clone());
        Ok(url)
    }

    fn delete(&self, url: &ArtifactUrl) -> Result<(), StorageError> {
        let mut live = self.live.lock().expect("store mutex poisoned");
        let before = live.len();
        live.retain(|existing| existing != url);
        if live.len() == before {
            return Err(StorageError::NotFound(url.0.clone()));
        }
        Ok(())
    }
}

type UploadHook = Box<dyn Fn() + Send + Sync>;

/// Store that runs a hook once, right after its first successful upload.
#[derive(Default)]
pub(super) struct InterruptingStore {
    inner: CountingStore,
    after_first_upload: Mutex<Option<UploadHook>>,
    uploads: Mutex<usize>,
}

impl InterruptingStore {
    pub(super) fn after_first_upload(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.after_first_upload.lock().expect("hook mutex poisoned") = Some(Box::new(hook));
    }

    pub(super) fn live(&self) -> Vec<ArtifactUrl> {
        self.inner.live()
    }

    pub(super) fn uploads(&self) -> usize {
        *self.uploads.lock().expect("upload counter poisoned")
    }
}

impl ArtifactStore for InterruptingStore {
    fn upload(
        &self,
        artifact: &FileHandle,
        bucket: &str,
        folder: Option<&str>,
    ) -> Result<ArtifactUrl, StorageError> {
        let url = self.inner.upload(artifact, bucket, folder)?;
        *self.uploads.lock().expect("upload counter poisoned") += 1;
        let hook = self.after_first_upload.lock().expect("hook mutex poisoned").take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(url)
    }

    fn delete(&self, url: &ArtifactUrl) -> Result<(), StorageError> {
        self.inner.delete(url)
    }
}

/// Persists everything unless a registration number was already taken.
#[derive(Default)]
pub(super) struct MemoryProfiles {
    records: Mutex<Vec<ProfileRecord>>,
    taken_registration: Option<&'static str>,
}

impl MemoryProfiles {
    pub(super) fn with_taken_registration(number: &'static str) -> Self {
        Self {
            taken_registration: Some(number),
            ..Self::default()
        }
    }

    pub(super) fn records(&self) -> Vec<ProfileRecord> {
        self.records.lock().expect("profile mutex poisoned").clone()
    }
}

impl PersistenceEndpoint for MemoryProfiles {
    fn submit(&self, record: ProfileRecord) -> Result<PersistOutcome, PersistenceError> {
        let registration = record
            .sections
            .get("companyInfo")
            .and_then(|info| info.get("businessRegistrationNo"))
            .and_then(Value::as_str);
        if registration.is_some() && registration == self.taken_registration {
            let mut field_errors = std::collections::BTreeMap::new();
            field_errors.insert("businessRegistrationNo".to_string(), "duplicate".to_string());
            return Ok(PersistOutcome::Rejected { field_errors });
        }

        let mut records = self.records.lock().expect("profile mutex poisoned");
        records.push(record);
        Ok(PersistOutcome::Persisted {
            id: RecordId(format!("rec-{}", records.len())),
        })
    }
}

/// Passes a document when its text mentions every comparison value.
pub(super) struct KeywordVerifier {
    pub(super) available: bool,
}

impl VerificationService for KeywordVerifier {
    fn verify(
        &self,
        artifact: &FileHandle,
        comparison: &ComparisonFields,
    ) -> Result<VerificationReport, VerificationError> {
        if !self.available {
            return Err(VerificationError::Unavailable("model endpoint down".to_string()));
        }
        let text = String::from_utf8_lossy(artifact.bytes()).to_lowercase();
        let missing: Vec<&String> = comparison
            .iter()
            .filter(|(_, value)| !text.contains(&value.to_lowercase()))
            .map(|(label, _)| label)
            .collect();
        Ok(VerificationReport {
            verified: missing.is_empty() && !comparison.is_empty(),
            message: if missing.is_empty() {
                "all details match".to_string()
            } else {
                format!("not found in document: {missing:?}")
            },
        })
    }
}

pub(super) struct ScriptedExtractor {
    pub(super) document: Option<Value>,
}

impl ExtractionService for ScriptedExtractor {
    fn extract(&self, _artifact: &FileHandle) -> Result<PartialRecord, ExtractionError> {
        self.document
            .as_ref()
            .map(PartialRecord::from_json)
            .ok_or_else(|| ExtractionError::Unavailable("extractor offline".to_string()))
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<WizardSessionService<MemorySessions>>,
    pub(super) sessions: Arc<MemorySessions>,
    pub(super) store: Arc<CountingStore>,
    pub(super) profiles: Arc<MemoryProfiles>,
}

pub(super) fn harness_with(
    store: CountingStore,
    profiles: MemoryProfiles,
    verifier_available: bool,
    extraction: Option<Value>,
) -> Harness {
    let sessions = Arc::new(MemorySessions::default());
    let store = Arc::new(store);
    let profiles = Arc::new(profiles);
    let collaborators = Collaborators {
        store: store.clone(),
        endpoint: profiles.clone(),
        verifier: Arc::new(KeywordVerifier {
            available: verifier_available,
        }),
        extractor: Arc::new(ScriptedExtractor {
            document: extraction,
        }),
    };
    let service = Arc::new(WizardSessionService::new(
        sessions.clone(),
        WizardCatalog::standard(),
        collaborators,
    ));
    Harness {
        service,
        sessions,
        store,
        profiles,
    }
}

/// Harness whose store abandons `session` from inside the first upload.
pub(super) struct AbandonHarness {
    pub(super) service: Arc<WizardSessionService<MemorySessions>>,
    pub(super) sessions: Arc<MemorySessions>,
    pub(super) store: Arc<InterruptingStore>,
    pub(super) profiles: Arc<MemoryProfiles>,
}

impl AbandonHarness {
    pub(super) fn abandon_during_upload(&self, session: SessionId) {
        let service: Weak<WizardSessionService<MemorySessions>> = Arc::downgrade(&self.service);
        self.store.after_first_upload(move || {
            if let Some(service) = service.upgrade() {
                service.abandon(&session).expect("session abandoned mid-upload");
            }
        });
    }
}

pub(super) fn abandon_harness() -> AbandonHarness {
    let sessions = Arc::new(MemorySessions::default());
    let store = Arc::new(InterruptingStore::default());
    let profiles = Arc::new(MemoryProfiles::default());
    let collaborators = Collaborators {
        store: store.clone(),
        endpoint: profiles.clone(),
        verifier: Arc::new(KeywordVerifier { available: true }),
        extractor: Arc::new(ScriptedExtractor { document: None }),
    };
    let service = Arc::new(WizardSessionService::new(
        sessions.clone(),
        WizardCatalog::standard(),
        collaborators,
    ));
    AbandonHarness {
        service,
        sessions,
        store,
        profiles,
    }
}

pub(super) fn harness() -> Harness {
    harness_with(CountingStore::default(), MemoryProfiles::default(), true, None)
}

pub(super) fn certificate(text: &str) -> FileHandle {
    FileHandle::new("br-certificate.pdf", "application/pdf", text.as_bytes().to_vec())
}

pub(super) fn image(name: &str) -> FileHandle {
    FileHandle::new(name, "image/png", vec![0x89, 0x50, 0x4e, 0x47])
}

pub(super) fn contact() -> Value {
    json!({ "contactName": "Lim Wei", "email": "wei@acme.sg", "phone": "+65 6123 4567" })
}

pub(super) fn company_info() -> Value {
    json!({
        "companyName": "Acme Pte Ltd",
        "businessRegistrationNo": "201912345K",
        "industry": "hospitality"
    })
}

pub(super) fn hotel_overview(industry: &str) -> Value {
    json!({
        "description": "Boutique hotel group operating four heritage properties in Singapore.",
        "industry": industry
    })
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
