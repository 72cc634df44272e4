use metrics_exporter_prometheus::PrometheusHandle;
use profile_builder::config::{ConfigError, StorageConfig};
use profile_builder::error::AppError;
use profile_builder::workflows::extraction::{ExtractionError, ExtractionService, PartialRecord};
use profile_builder::workflows::sessions::{
    Collaborators, SessionId, SessionRepository, SessionRepositoryError, WizardSession,
};
use profile_builder::workflows::submission::{
    ArtifactStore, ComparisonFields, GoogleDriveArtifactStore, PersistOutcome, PersistenceEndpoint, PersistenceError,
    ProfileRecord, StorageError, VerificationError, VerificationReport, VerificationService,
};
use profile_builder::workflows::wizard::{ArtifactUrl, FileHandle, RecordId, WizardKind};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySessionRepository {
    sessions: Arc<Mutex<HashMap<SessionId, WizardSession>>>,
}

impl SessionRepository for InMemorySessionRepository {
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
        if guard.contains_key(&session.id) {
            guard.insert(session.id.clone(), session);
            Ok(())
        } else {
            Err(SessionRepositoryError::NotFound)
        }
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

/// Object store keeping artifact sizes by URL.
pub(crate) struct InMemoryArtifactStore {
    base_url: String,
    sequence: AtomicU64,
    objects: Mutex<BTreeMap<String, usize>>,
}

impl InMemoryArtifactStore {
    pub(crate) fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            sequence: AtomicU64::new(1),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn object_count(&self) -> usize {
        self.objects.lock().expect("store mutex poisoned").len()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn upload(
        &self,
        artifact: &FileHandle,
        bucket: &str,
        folder: Option<&str>,
    ) -> Result<ArtifactUrl, StorageError> {
        if artifact.size == 0 {
            return Err(StorageError::Rejected(format!(
                "{} is empty",
                artifact.file_name
            )));
        }
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let prefix = folder.map(|folder| format!("{folder}/")).unwrap_or_default();
        let url = format!(
            "{}/{bucket}/{prefix}{id:04}-{}",
            self.base_url, artifact.file_name
        );
        self.objects
            .lock()
            .expect("store mutex poisoned")
            .insert(url.clone(), artifact.size);
        Ok(ArtifactUrl(url))
    }

    fn delete(&self, url: &ArtifactUrl) -> Result<(), StorageError> {
        self.objects
            .lock()
            .expect("store mutex poisoned")
            .remove(&url.0)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(url.0.clone()))
    }
}

/// Passes a document when its text mentions every comparison value, ignoring case.
#[derive(Default)]
pub(crate) struct KeywordVerificationService;

impl VerificationService for KeywordVerificationService {
    fn verify(
        &self,
        artifact: &FileHandle,
        comparison: &ComparisonFields,
    ) -> Result<VerificationReport, VerificationError> {
        let readable = artifact.mime_type.starts_with("text/")
            || artifact.mime_type == "application/pdf";
        if !readable {
            return Err(VerificationError::UnsupportedDocument(
                artifact.mime_type.clone(),
            ));
        }

        let text = String::from_utf8_lossy(artifact.bytes()).to_lowercase();
        let missing: Vec<&str> = comparison
            .iter()
            .filter(|(_, value)| !text.contains(&value.to_lowercase()))
            .map(|(label, _)| label.as_str())
            .collect();

        let report = if comparison.is_empty() {
            VerificationReport {
                verified: false,
                message: "no business details to compare against".to_string(),
            }
        } else if missing.is_empty() {
            VerificationReport {
                verified: true,
                message: "document matches the declared business details".to_string(),
            }
        } else {
            VerificationReport {
                verified: false,
                message: format!("document does not mention {}", missing.join(", ")),
            }
        };
        Ok(report)
    }
}

/// Reads `Label: value` lines from a plain-text CV.
#[derive(Default)]
pub(crate) struct LineExtractionService;

impl ExtractionService for LineExtractionService {
    fn extract(&self, artifact: &FileHandle) -> Result<PartialRecord, ExtractionError> {
        let text = std::str::from_utf8(artifact.bytes())
            .map_err(|err| ExtractionError::Unreadable(err.to_string()))?;

        let mut basic_info = Map::new();
        let mut work = Vec::new();
        let mut educations = Vec::new();
        let mut certificates = Vec::new();

        for line in text.lines() {
            let Some((label, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match label.trim().to_ascii_lowercase().as_str() {
                "name" => {
                    basic_info.insert("fullName".to_string(), json!(value));
                }
                "email" => {
                    basic_info.insert("email".to_string(), json!(value));
                }
                "phone" => {
                    basic_info.insert("phone".to_string(), json!(value));
                }
                "experience" => {
                    let (title, company) = value.split_once(" at ").unwrap_or((value, ""));
                    work.push(json!({ "jobTitle": title.trim(), "company": company.trim() }));
                }
                "education" => {
                    let (institution, qualification) =
                        value.split_once(" - ").unwrap_or((value, ""));
                    educations.push(json!({
                        "institution": institution.trim(),
                        "qualification": qualification.trim()
                    }));
                }
                "certificate" => certificates.push(json!({ "name": value })),
                _ => {}
            }
        }

        Ok(PartialRecord::from_json(&json!({
            "basicInfo": Value::Object(basic_info),
            "workExperiences": work,
            "educations": educations,
            "certificates": certificates,
        })))
    }
}

/// Profile store rejecting a business registration number already used by another record.
#[derive(Default)]
pub(crate) struct InMemoryProfileStore {
    sequence: AtomicU64,
    records: Mutex<BTreeMap<RecordId, ProfileRecord>>,
}

impl InMemoryProfileStore {
    pub(crate) fn records(&self) -> Vec<ProfileRecord> {
        self.records
            .lock()
            .expect("profile mutex poisoned")
            .values()
            .cloned()
            .collect()
    }
}

fn registration_number(record: &ProfileRecord) -> Option<&str> {
    record
        .sections
        .get("companyInfo")?
        .get("businessRegistrationNo")?
        .as_str()
        .map(str::trim)
        .filter(|number| !number.is_empty())
}

fn record_prefix(kind: WizardKind) -> &'static str {
    match kind {
        WizardKind::EmployerSignup | WizardKind::EmployerProfile => "emp",
        WizardKind::CandidateProfile => "cand",
    }
}

impl PersistenceEndpoint for InMemoryProfileStore {
    fn submit(&self, mut record: ProfileRecord) -> Result<PersistOutcome, PersistenceError> {
        let mut guard = self.records.lock().expect("profile mutex poisoned");

        if let Some(number) = registration_number(&record) {
            let taken = guard.iter().any(|(id, existing)| {
                Some(id) != record.id.as_ref()
                    && registration_number(existing)
                        .is_some_and(|other| other.eq_ignore_ascii_case(number))
            });
            if taken {
                let mut field_errors = BTreeMap::new();
                field_errors.insert(
                    "businessRegistrationNo".to_string(),
                    "this business is already registered".to_string(),
                );
                return Ok(PersistOutcome::Rejected { field_errors });
            }
        }

        let id = match record.id.clone() {
            Some(id) => id,
            None => {
                let next = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
                RecordId(format!("{}-{next:06}", record_prefix(record.kind)))
            }
        };
        record.id = Some(id.clone());
        guard.insert(id.clone(), record);
        Ok(PersistOutcome::Persisted { id })
    }
}

/// Concrete handles kept alongside the trait objects so callers can inspect them.
pub(crate) struct InMemoryBackends {
    pub(crate) collaborators: Collaborators,
    pub(crate) store: Arc<InMemoryArtifactStore>,
    pub(crate) profiles: Arc<InMemoryProfileStore>,
}

pub(crate) fn in_memory_collaborators(storage: &StorageConfig) -> InMemoryBackends {
    let store = Arc::new(InMemoryArtifactStore::new(storage.artifact_base_url.clone()));
    let profiles = Arc::new(InMemoryProfileStore::default());
    let collaborators = Collaborators {
        store: store.clone(),
        endpoint: profiles.clone(),
        verifier: Arc::new(KeywordVerificationService),
        extractor: Arc::new(LineExtractionService),
    };
    InMemoryBackends {
        collaborators,
        store,
        profiles,
    }
}

/// Collaborators for the HTTP service: Google Drive holds artifacts when buckets are mapped.
pub(crate) async fn service_collaborators(
    storage: &StorageConfig,
) -> Result<Collaborators, AppError> {
    let mut collaborators = in_memory_collaborators(storage).collaborators;
    if !storage.uses_drive() {
        return Ok(collaborators);
    }

    let key_path = storage
        .drive_service_account_key
        .as_deref()
        .ok_or(ConfigError::MissingDriveCredentials)?;
    let store =
        GoogleDriveArtifactStore::from_service_account(key_path, storage.bucket_folders.clone())
            .await?;
    collaborators.store = Arc::new(store);
    Ok(collaborators)
}
