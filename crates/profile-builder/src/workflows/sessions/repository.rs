use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::submission::SagaResult;
use crate::workflows::wizard::{FieldErrors, FormState, StepId, StepKind, WizardKind, WizardState};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One in-progress wizard plus the outcome of its latest submission attempt.
#[derive(Debug, Clone)]
pub struct WizardSession {
    pub id: SessionId,
    pub state: WizardState,
    pub started_at: DateTime<Utc>,
    pub last_outcome: Option<SagaResult>,
}

impl WizardSession {
    pub fn kind(&self) -> WizardKind {
        self.state.definition().kind()
    }

    pub fn view(&self) -> WizardSessionView {
        let current = self.state.current_step();
        WizardSessionView {
            session_id: self.id.clone(),
            wizard: self.kind(),
            wizard_label: self.kind().label(),
            started_at: self.started_at,
            current_index: self.state.current_index(),
            current_step: StepView::from_parts(current.id, current.title, current.kind),
            steps: self
                .state
                .effective_steps()
                .into_iter()
                .map(|step| StepView::from_parts(step.id, step.title, step.kind))
                .collect(),
            progress: self.state.progress_fraction(),
            is_last_step: self.state.is_last_step(),
            form: self.state.form().clone(),
            validation_errors: self.state.validation_errors().clone(),
            last_outcome: self.last_outcome.clone(),
        }
    }
}

/// Storage abstraction for hosted sessions.
pub trait SessionRepository: Send + Sync {
    fn insert(&self, session: WizardSession) -> Result<WizardSession, SessionRepositoryError>;
    fn update(&self, session: WizardSession) -> Result<(), SessionRepositoryError>;
    fn fetch(&self, id: &SessionId) -> Result<Option<WizardSession>, SessionRepositoryError>;
    fn remove(&self, id: &SessionId) -> Result<Option<WizardSession>, SessionRepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionRepositoryError {
    #[error("session already exists")]
    Conflict,
    #[error("session not found")]
    NotFound,
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub id: StepId,
    pub title: &'static str,
    pub kind: StepKind,
}

impl StepView {
    fn from_parts(id: StepId, title: &'static str, kind: StepKind) -> Self {
        Self { id, title, kind }
    }
}

/// What the HTTP layer exposes for a session. File bytes are never included.
#[derive(Debug, Clone, Serialize)]
pub struct WizardSessionView {
    pub session_id: SessionId,
    pub wizard: WizardKind,
    pub wizard_label: &'static str,
    pub started_at: DateTime<Utc>,
    pub current_index: usize,
    pub current_step: StepView,
    pub steps: Vec<StepView>,
    pub progress: f32,
    pub is_last_step: bool,
    pub form: FormState,
    #[serde(skip_serializing_if = "FieldErrors::is_empty")]
    pub validation_errors: FieldErrors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<SagaResult>,
}
