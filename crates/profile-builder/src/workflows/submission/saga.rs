use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::compensation::{CompensatingAction, CompensationReport, CompensationStack};
use super::gateway::{ArtifactStore, PersistOutcome, PersistenceEndpoint, ProfileRecord};
use super::plan::UploadPlan;
use crate::workflows::wizard::{
    ArtifactUrl, FieldErrors, FormState, RecordId, SectionValue, StepId, WizardDefinition,
};

/// Terminal state of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SagaOutcome {
    Success {
        record_id: RecordId,
    },
    /// Verification missing or a required artifact absent; nothing external was called.
    PreconditionFailed {
        step: Option<StepId>,
        section: Option<String>,
        reason: String,
    },
    /// `stage` is the 1-based position in the upload plan.
    UploadFailed {
        stage: usize,
        section: String,
        reason: String,
    },
    /// Server-side field errors, with the earliest visible step owning one of them.
    ValidationFailed {
        step: Option<StepId>,
        field_errors: FieldErrors,
    },
    PersistenceFailed {
        reason: String,
    },
    Aborted,
}

impl SagaOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            SagaOutcome::Success { .. } => "success",
            SagaOutcome::PreconditionFailed { .. } => "precondition_failed",
            SagaOutcome::UploadFailed { .. } => "upload_failed",
            SagaOutcome::ValidationFailed { .. } => "validation_failed",
            SagaOutcome::PersistenceFailed { .. } => "persistence_failed",
            SagaOutcome::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedArtifact {
    pub section: String,
    pub url: ArtifactUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SagaResult {
    #[serde(flatten)]
    pub outcome: SagaOutcome,
    pub uploaded: Vec<UploadedArtifact>,
    pub compensation: CompensationReport,
}

impl SagaResult {
    fn before_side_effects(outcome: SagaOutcome) -> Self {
        Self {
            outcome,
            uploaded: Vec::new(),
            compensation: CompensationReport::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SagaOutcome::Success { .. })
    }

    /// Uploads matched by neither a successful persist nor an attempted delete.
    pub fn orphaned_uploads(&self) -> Vec<&ArtifactUrl> {
        if self.is_success() {
            return Vec::new();
        }
        self.uploaded
            .iter()
            .map(|artifact| &artifact.url)
            .filter(|url| !self.compensation.attempted.contains(url))
            .collect()
    }
}

/// Cooperative cancellation checked between saga stages.
///
/// A call already in flight is not interrupted; its upload is compensated once it returns.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    raised: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn abort(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

/// Upload, verify-gate, persist, and compensate for one wizard definition.
pub struct SubmissionSaga {
    definition: Arc<WizardDefinition>,
    store: Arc<dyn ArtifactStore>,
    endpoint: Arc<dyn PersistenceEndpoint>,
    abort: AbortSignal,
}

impl SubmissionSaga {
    pub fn new(
        definition: Arc<WizardDefinition>,
        store: Arc<dyn ArtifactStore>,
        endpoint: Arc<dyn PersistenceEndpoint>,
    ) -> Self {
        Self {
            definition,
            store,
            endpoint,
            abort: AbortSignal::default(),
        }
    }

    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn submit(&self, form: &FormState) -> SagaResult {
        let wizard = self.definition.kind().slug();

        if self.abort.is_aborted() {
            info!(wizard, "submission aborted before it started");
            return SagaResult::before_side_effects(SagaOutcome::Aborted);
        }

        if let Some(outcome) = self.check_verification(form) {
            warn!(wizard, outcome = outcome.label(), "submission blocked before upload");
            return SagaResult::before_side_effects(outcome);
        }

        let plan = match UploadPlan::build(&self.definition, form) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(wizard, error = %err, "submission blocked before upload");
                return SagaResult::before_side_effects(SagaOutcome::PreconditionFailed {
                    step: Some(err.step()),
                    section: Some(err.section().to_string()),
                    reason: err.to_string(),
                });
            }
        };

        info!(wizard, uploads = plan.len(), "starting profile submission");

        let mut stack = CompensationStack::default();
        let mut uploaded = Vec::with_capacity(plan.len());

        for (position, step) in plan.steps().iter().enumerate() {
            if self.abort.is_aborted() {
                return self.fail(SagaOutcome::Aborted, stack, uploaded);
            }

            let stage = position + 1;
            match self
                .store
                .upload(&step.artifact, &step.bucket, step.folder.as_deref())
            {
                Ok(url) => {
                    info!(wizard, stage, section = %step.section, %url, "artifact uploaded");
                    stack.push(CompensatingAction::DeleteArtifact {
                        section: step.section.clone(),
                        url: url.clone(),
                    });
                    uploaded.push(UploadedArtifact {
                        section: step.section.clone(),
                        url,
                    });
                }
                Err(err) => {
                    warn!(wizard, stage, section = %step.section, error = %err, "artifact upload failed");
                    let outcome = SagaOutcome::UploadFailed {
                        stage,
                        section: step.section.clone(),
                        reason: err.to_string(),
                    };
                    return self.fail(outcome, stack, uploaded);
                }
            }
        }

        if self.abort.is_aborted() {
            return self.fail(SagaOutcome::Aborted, stack, uploaded);
        }

        let record = assemble_record(&self.definition, form, &uploaded);
        match self.endpoint.submit(record) {
            Ok(PersistOutcome::Persisted { id }) => {
                stack.commit();
                info!(wizard, record_id = %id, "profile persisted");
                SagaResult {
                    outcome: SagaOutcome::Success { record_id: id },
                    uploaded,
                    compensation: CompensationReport::default(),
                }
            }
            Ok(PersistOutcome::Rejected { field_errors }) => {
                warn!(wizard, fields = field_errors.len(), "profile rejected by persistence endpoint");
                let step = self.owning_step(form, &field_errors);
                self.fail(
                    SagaOutcome::ValidationFailed { step, field_errors },
                    stack,
                    uploaded,
                )
            }
            Err(err) => {
                warn!(wizard, error = %err, "profile persistence failed");
                self.fail(
                    SagaOutcome::PersistenceFailed {
                        reason: err.to_string(),
                    },
                    stack,
                    uploaded,
                )
            }
        }
    }

    fn check_verification(&self, form: &FormState) -> Option<SagaOutcome> {
        self.definition
            .effective_steps(form)
            .into_iter()
            .find_map(|step| {
                let requirement = step.verification.as_ref()?;
                if form.is_verified(requirement.section) {
                    return None;
                }
                let reason = match form.verdict(requirement.section) {
                    Some(verdict) => format!("document failed verification: {}", verdict.message),
                    None => "document must be verified before submission".to_string(),
                };
                Some(SagaOutcome::PreconditionFailed {
                    step: Some(step.id),
                    section: Some(requirement.section.to_string()),
                    reason,
                })
            })
    }

    fn owning_step(&self, form: &FormState, field_errors: &FieldErrors) -> Option<StepId> {
        self.definition
            .effective_steps(form)
            .into_iter()
            .find(|step| field_errors.keys().any(|key| step.owns_field(key)))
            .map(|step| step.id)
    }

    fn fail(
        &self,
        outcome: SagaOutcome,
        stack: CompensationStack,
        uploaded: Vec<UploadedArtifact>,
    ) -> SagaResult {
        let compensation = if stack.is_empty() {
            CompensationReport::default()
        } else {
            stack.unwind(self.store.as_ref())
        };

        info!(
            wizard = self.definition.kind().slug(),
            outcome = outcome.label(),
            compensated = compensation.attempted.len(),
            compensation_failures = compensation.failed.len(),
            "profile submission finished without persisting"
        );

        SagaResult {
            outcome,
            uploaded,
            compensation,
        }
    }
}

/// Sections owned by visible steps, with each selected file replaced by its upload URL.
fn assemble_record(
    definition: &WizardDefinition,
    form: &FormState,
    uploaded: &[UploadedArtifact],
) -> ProfileRecord {
    let mut sections = BTreeMap::new();

    for name in definition.effective_sections(form) {
        let value = match form.section(name) {
            Some(SectionValue::Record(fields)) => Value::Object(fields.clone()),
            Some(SectionValue::List(items)) => {
                Value::Array(items.iter().cloned().map(Value::Object).collect())
            }
            Some(SectionValue::File(_)) => match uploaded.iter().find(|item| item.section == name) {
                Some(artifact) => Value::String(artifact.url.0.clone()),
                None => continue,
            },
            Some(SectionValue::Stored(url)) => Value::String(url.0.clone()),
            None => continue,
        };
        sections.insert(name.to_string(), value);
    }

    ProfileRecord {
        kind: definition.kind(),
        id: form.record_id.clone(),
        sections,
    }
}
