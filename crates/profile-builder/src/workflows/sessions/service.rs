use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::repository::{
    SessionId, SessionRepository, SessionRepositoryError, WizardSession, WizardSessionView,
};
use crate::workflows::extraction::{merge_extraction, ExtractionService};
use crate::workflows::profiles::WizardCatalog;
use crate::workflows::submission::{
    AbortSignal, ArtifactStore, PersistenceEndpoint, ProfileRecord, SagaOutcome, SagaResult,
    SubmissionSaga, VerificationError, VerificationService,
};
use crate::workflows::wizard::{
    FileHandle, SectionValue, SequencerError, VerificationVerdict, WizardKind, WizardState,
};

/// External services the hosted wizards talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ArtifactStore>,
    pub endpoint: Arc<dyn PersistenceEndpoint>,
    pub verifier: Arc<dyn VerificationService>,
    pub extractor: Arc<dyn ExtractionService>,
}

/// Result of a submission attempt. The session is gone after a success or an abandon.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReport {
    pub result: SagaResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<WizardSessionView>,
}

/// Hosts in-progress wizards and drives them through the sequencer and the saga.
pub struct WizardSessionService<R> {
    repository: Arc<R>,
    catalog: WizardCatalog,
    collaborators: Collaborators,
    in_flight: Mutex<HashMap<SessionId, AbortSignal>>,
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("wiz-{id:06}"))
}

impl<R> WizardSessionService<R>
where
    R: SessionRepository + 'static,
{
    pub fn new(repository: Arc<R>, catalog: WizardCatalog, collaborators: Collaborators) -> Self {
        Self {
            repository,
            catalog,
            collaborators,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &WizardCatalog {
        &self.catalog
    }

    /// Start a fresh wizard.
    pub fn start(&self, kind: WizardKind) -> Result<WizardSession, SessionServiceError> {
        let definition = self
            .catalog
            .get(kind)
            .ok_or(SessionServiceError::UnknownWizard(kind))?;
        let state = WizardState::new(definition)?;
        self.open(state)
    }

    /// Start a wizard that edits an existing record.
    pub fn start_editing(
        &self,
        kind: WizardKind,
        record: ProfileRecord,
    ) -> Result<WizardSession, SessionServiceError> {
        if record.kind != kind {
            return Err(SessionServiceError::KindMismatch {
                expected: kind,
                found: record.kind,
            });
        }
        let definition = self
            .catalog
            .get(kind)
            .ok_or(SessionServiceError::UnknownWizard(kind))?;
        let state = WizardState::from_record(definition, &record)?;
        self.open(state)
    }

    pub fn get(&self, id: &SessionId) -> Result<WizardSession, SessionServiceError> {
        self.load(id)
    }

    /// Merge JSON data into a section. Objects become records and arrays of objects lists.
    pub fn update_section(
        &self,
        id: &SessionId,
        section: &str,
        value: Value,
    ) -> Result<WizardSession, SessionServiceError> {
        let mut session = self.load(id)?;
        let definition = session.state.definition().clone();

        if definition.step_for_section(section).is_none() {
            return Err(SessionServiceError::UnknownSection(section.to_string()));
        }
        if definition.is_file_section(section) {
            return Err(SessionServiceError::FileSectionRequiresUpload(
                section.to_string(),
            ));
        }

        let value = section_value(section, value)?;
        session.state.update_section(section, value);
        self.repository.update(session.clone())?;
        Ok(session)
    }

    /// Validate the current step and advance. Validation errors are kept on the session.
    pub fn next(&self, id: &SessionId) -> Result<WizardSession, SessionServiceError> {
        let mut session = self.load(id)?;
        let moved = session.state.go_next();
        self.repository.update(session.clone())?;
        moved?;
        Ok(session)
    }

    pub fn previous(&self, id: &SessionId) -> Result<WizardSession, SessionServiceError> {
        let mut session = self.load(id)?;
        session.state.go_previous();
        self.repository.update(session.clone())?;
        Ok(session)
    }

    /// Select a file for a section.
    ///
    /// Sections with a verification requirement are checked immediately; the wizard's
    /// extraction source pre-fills the form. Extraction failures never block the user.
    pub fn attach_file(
        &self,
        id: &SessionId,
        section: &str,
        file: FileHandle,
    ) -> Result<WizardSession, SessionServiceError> {
        let mut session = self.load(id)?;
        let definition = session.state.definition().clone();

        if !definition.is_file_section(section) {
            return Err(SessionServiceError::NotAFileSection(section.to_string()));
        }

        session
            .state
            .update_section(section, SectionValue::File(file.clone()));

        let requirement = definition
            .step_for_section(section)
            .and_then(|step| step.verification.as_ref())
            .filter(|requirement| requirement.section == section);

        if let Some(requirement) = requirement {
            let comparison = requirement.comparison_values(session.state.form());
            match self.collaborators.verifier.verify(&file, &comparison) {
                Ok(report) => {
                    info!(session = %id, %section, verified = report.verified, "document verification completed");
                    session.state.record_verdict(
                        section,
                        VerificationVerdict {
                            verified: report.verified,
                            message: report.message,
                            checked_at: Utc::now(),
                        },
                    );
                }
                Err(err) => {
                    warn!(session = %id, %section, error = %err, "document verification unavailable");
                    self.repository.update(session)?;
                    return Err(err.into());
                }
            }
        }

        if definition.extraction_source() == Some(section) {
            match self.collaborators.extractor.extract(&file) {
                Ok(partial) => {
                    let patch = merge_extraction(session.state.form(), &partial);
                    let applied = session.state.apply_extraction(patch);
                    info!(session = %id, sections = applied.len(), "document extraction applied");
                }
                Err(err) => {
                    warn!(session = %id, %section, error = %err, "document extraction failed; continuing without it");
                }
            }
        }

        self.repository.update(session.clone())?;
        Ok(session)
    }

    /// Run the submission saga outside the repository lock.
    ///
    /// Only the last step submits, and every visible step is validated again first.
    /// Abandoning the session while the saga runs aborts it at the next stage boundary.
    pub fn submit(&self, id: &SessionId) -> Result<SubmissionReport, SessionServiceError> {
        let mut session = self.load(id)?;
        if let Err(err) = session.state.ready_for_submission() {
            warn!(session = %id, error = %err, "submission refused");
            self.repository.update(session)?;
            return Err(err.into());
        }

        let abort = self.begin_submission(id)?;
        let saga = SubmissionSaga::new(
            session.state.definition().clone(),
            self.collaborators.store.clone(),
            self.collaborators.endpoint.clone(),
        )
        .with_abort_signal(abort.clone());

        let result = saga.submit(session.state.form());
        self.finish_submission(id);

        if let SagaOutcome::Success { record_id } = &result.outcome {
            info!(session = %id, %record_id, "wizard submitted");
            self.repository.remove(id)?;
            return Ok(SubmissionReport {
                result,
                session: None,
            });
        }

        if abort.is_aborted() {
            info!(session = %id, outcome = result.outcome.label(), "submission of abandoned wizard stopped");
            return Ok(SubmissionReport {
                result,
                session: None,
            });
        }

        session.state.apply_saga_result(&result);
        session.last_outcome = Some(result.clone());
        self.repository.update(session.clone())?;

        Ok(SubmissionReport {
            result,
            session: Some(session.view()),
        })
    }

    /// Drop a session. A submission still running for it is aborted.
    pub fn abandon(&self, id: &SessionId) -> Result<(), SessionServiceError> {
        if let Some(abort) = self.in_flight().get(id) {
            abort.abort();
        }
        match self.repository.remove(id)? {
            Some(_) => {
                info!(session = %id, "wizard abandoned");
                Ok(())
            }
            None => Err(SessionServiceError::NotFound(id.clone())),
        }
    }

    fn begin_submission(&self, id: &SessionId) -> Result<AbortSignal, SessionServiceError> {
        let mut in_flight = self.in_flight();
        if in_flight.contains_key(id) {
            return Err(SessionServiceError::SubmissionInProgress(id.clone()));
        }
        let abort = AbortSignal::default();
        in_flight.insert(id.clone(), abort.clone());
        Ok(abort)
    }

    fn finish_submission(&self, id: &SessionId) {
        self.in_flight().remove(id);
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, AbortSignal>> {
        self.in_flight.lock().expect("in-flight mutex poisoned")
    }

    fn open(&self, state: WizardState) -> Result<WizardSession, SessionServiceError> {
        let session = WizardSession {
            id: next_session_id(),
            state,
            started_at: Utc::now(),
            last_outcome: None,
        };
        let stored = self.repository.insert(session)?;
        info!(session = %stored.id, wizard = stored.kind().slug(), "wizard session started");
        Ok(stored)
    }

    fn load(&self, id: &SessionId) -> Result<WizardSession, SessionServiceError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| SessionServiceError::NotFound(id.clone()))
    }
}

fn section_value(section: &str, value: Value) -> Result<SectionValue, SessionServiceError> {
    match value {
        Value::Object(fields) => Ok(SectionValue::Record(fields)),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(fields) => Ok(fields),
                _ => Err(SessionServiceError::InvalidSectionValue {
                    section: section.to_string(),
                    reason: "list items must be objects".to_string(),
                }),
            })
            .collect::<Result<Vec<Map<String, Value>>, _>>()
            .map(SectionValue::List),
        _ => Err(SessionServiceError::InvalidSectionValue {
            section: section.to_string(),
            reason: "expected an object or a list of objects".to_string(),
        }),
    }
}

/// Error raised by the session service.
#[derive(Debug, thiserror::Error)]
pub enum SessionServiceError {
    #[error("wizard '{}' is not registered", .0.slug())]
    UnknownWizard(WizardKind),
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("record belongs to '{}', not '{}'", .found.slug(), .expected.slug())]
    KindMismatch {
        expected: WizardKind,
        found: WizardKind,
    },
    #[error("section '{0}' is not part of this wizard")]
    UnknownSection(String),
    #[error("section '{0}' holds a file; attach it instead")]
    FileSectionRequiresUpload(String),
    #[error("section '{0}' does not accept files")]
    NotAFileSection(String),
    #[error("invalid value for section '{section}': {reason}")]
    InvalidSectionValue { section: String, reason: String },
    #[error("session {0} is already being submitted")]
    SubmissionInProgress(SessionId),
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Repository(#[from] SessionRepositoryError),
}

impl SessionServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionServiceError::UnknownWizard(_)
            | SessionServiceError::NotFound(_)
            | SessionServiceError::Repository(SessionRepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            SessionServiceError::KindMismatch { .. }
            | SessionServiceError::UnknownSection(_)
            | SessionServiceError::FileSectionRequiresUpload(_)
            | SessionServiceError::NotAFileSection(_)
            | SessionServiceError::InvalidSectionValue { .. } => StatusCode::BAD_REQUEST,
            SessionServiceError::Sequencer(SequencerError::Validation { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SessionServiceError::Sequencer(
                SequencerError::OutOfRange(_)
                | SequencerError::NotOnFinalStep(_)
                | SequencerError::StepNotVisible(_),
            )
            | SessionServiceError::SubmissionInProgress(_)
            | SessionServiceError::Repository(SessionRepositoryError::Conflict) => {
                StatusCode::CONFLICT
            }
            SessionServiceError::Verification(_) => StatusCode::BAD_GATEWAY,
            SessionServiceError::Sequencer(SequencerError::Definition(_))
            | SessionServiceError::Repository(SessionRepositoryError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
