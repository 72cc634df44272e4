use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::blueprint::WizardDefinition;
use super::domain::{DefinitionError, FieldErrors, StepId, StepKind, StepSpec};
use super::form::{ArtifactUrl, FormState, SectionValue, VerificationVerdict};
use super::validation::validate_step;
use crate::workflows::extraction::FormPatch;
use crate::workflows::submission::{ProfileRecord, SagaOutcome, SagaResult};

/// Errors raised by wizard navigation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    #[error("step '{step}' has {} invalid field(s)", .errors.len())]
    Validation { step: StepId, errors: FieldErrors },
    #[error("step '{0}' is the last step; submit the wizard instead")]
    OutOfRange(StepId),
    #[error("step '{0}' is not the last step; finish the wizard before submitting")]
    NotOnFinalStep(StepId),
    #[error("step '{0}' is not currently visible")]
    StepNotVisible(String),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// Position and data of one in-progress wizard.
///
/// The effective step list is derived from the form after every mutation and is never
/// edited directly.
#[derive(Debug, Clone)]
pub struct WizardState {
    definition: Arc<WizardDefinition>,
    effective: Vec<usize>,
    current_index: usize,
    form: FormState,
    validation_errors: FieldErrors,
}

impl WizardState {
    pub fn new(definition: Arc<WizardDefinition>) -> Result<Self, SequencerError> {
        Self::with_form(definition, FormState::new())
    }

    pub fn with_form(
        definition: Arc<WizardDefinition>,
        form: FormState,
    ) -> Result<Self, SequencerError> {
        definition.validate()?;
        let mut state = Self {
            definition,
            effective: Vec::new(),
            current_index: 0,
            form,
            validation_errors: FieldErrors::new(),
        };
        state.recompute();
        Ok(state)
    }

    /// Seed an edit session from a persisted record.
    pub fn from_record(
        definition: Arc<WizardDefinition>,
        record: &ProfileRecord,
    ) -> Result<Self, SequencerError> {
        let mut form = FormState::new();
        form.record_id = record.id.clone();

        for (name, value) in &record.sections {
            let section = match value {
                Value::String(url) if definition.is_file_section(name) => {
                    SectionValue::Stored(ArtifactUrl(url.clone()))
                }
                Value::Object(fields) => SectionValue::Record(fields.clone()),
                Value::Array(items) => SectionValue::List(
                    items
                        .iter()
                        .filter_map(|item| item.as_object().cloned())
                        .collect(),
                ),
                other => {
                    debug!(section = %name, value = %other, "skipping unrecognised record section");
                    continue;
                }
            };
            form.replace_section(name, section);
        }

        Self::with_form(definition, form)
    }

    pub fn definition(&self) -> &Arc<WizardDefinition> {
        &self.definition
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn validation_errors(&self) -> &FieldErrors {
        &self.validation_errors
    }

    pub fn effective_steps(&self) -> Vec<&StepSpec> {
        self.effective
            .iter()
            .map(|index| &self.definition.steps()[*index])
            .collect()
    }

    pub fn current_step(&self) -> &StepSpec {
        &self.definition.steps()[self.effective[self.current_index]]
    }

    pub fn is_last_step(&self) -> bool {
        self.current_index + 1 == self.effective.len()
    }

    /// Display-only progress in `(0, 1]`.
    pub fn progress_fraction(&self) -> f32 {
        (self.current_index + 1) as f32 / self.effective.len() as f32
    }

    /// Validate the current step and advance by one.
    pub fn go_next(&mut self) -> Result<(), SequencerError> {
        self.recompute();
        let step = self.current_step();
        let step_id = step.id;

        if self.is_last_step() {
            return Err(SequencerError::OutOfRange(step_id));
        }

        let errors = validate_step(step, &self.form);
        if !errors.is_empty() {
            self.validation_errors = errors.clone();
            return Err(SequencerError::Validation {
                step: step_id,
                errors,
            });
        }

        self.validation_errors.clear();
        self.current_index += 1;
        Ok(())
    }

    /// Re-check every visible step before the form is handed to submission.
    ///
    /// Only allowed from the last step. Steps can appear after they were passed (a
    /// visibility field changed on the review screen), so the first visible step with
    /// failing rules takes focus and keeps its errors.
    pub fn ready_for_submission(&mut self) -> Result<(), SequencerError> {
        self.recompute();
        if !self.is_last_step() {
            return Err(SequencerError::NotOnFinalStep(self.current_step().id));
        }

        let failing = self.effective_steps().into_iter().find_map(|step| {
            let errors = validate_step(step, &self.form);
            (!errors.is_empty()).then_some((step.id, errors))
        });

        if let Some((step, errors)) = failing {
            self.jump_to(step)?;
            self.validation_errors = errors.clone();
            return Err(SequencerError::Validation { step, errors });
        }

        self.validation_errors.clear();
        Ok(())
    }

    /// Step back without validating. A no-op on the first step.
    pub fn go_previous(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    pub fn update_section(&mut self, name: &str, value: SectionValue) {
        self.form.update_section(name, value);
        self.recompute();
    }

    pub fn record_verdict(&mut self, section: &str, verdict: VerificationVerdict) {
        self.form.record_verdict(section, verdict);
    }

    pub fn jump_to(&mut self, id: StepId) -> Result<(), SequencerError> {
        let position = self
            .effective
            .iter()
            .position(|index| self.definition.steps()[*index].id == id)
            .ok_or_else(|| SequencerError::StepNotVisible(id.0.to_string()))?;
        self.current_index = position;
        Ok(())
    }

    /// Apply an extraction patch and move to the first data-entry step.
    ///
    /// Sections no step owns are ignored. Returns the sections that were written.
    pub fn apply_extraction(&mut self, patch: FormPatch) -> Vec<String> {
        let mut applied = Vec::new();
        for (name, value) in patch.into_sections() {
            if self.definition.step_for_section(&name).is_none() {
                debug!(section = %name, "ignoring extracted section outside the wizard");
                continue;
            }
            self.form.replace_section(&name, value);
            applied.push(name);
        }
        self.recompute();

        if let Some(position) = self
            .effective
            .iter()
            .position(|index| self.definition.steps()[*index].kind == StepKind::DataEntry)
        {
            self.current_index = position;
        }

        applied
    }

    /// Fold a failed submission back into the wizard so the user can retry in place.
    pub fn apply_saga_result(&mut self, result: &SagaResult) {
        match &result.outcome {
            SagaOutcome::Success { record_id } => {
                self.form.record_id = Some(record_id.clone());
                self.validation_errors.clear();
            }
            SagaOutcome::ValidationFailed { step, field_errors } => {
                self.validation_errors = field_errors.clone();
                if let Some(step) = step {
                    let _ = self.jump_to(*step);
                }
            }
            SagaOutcome::PreconditionFailed {
                step,
                section,
                reason,
            } => {
                self.validation_errors.clear();
                if let Some(section) = section {
                    self.validation_errors
                        .insert(section.clone(), reason.clone());
                }
                if let Some(step) = step {
                    let _ = self.jump_to(*step);
                }
            }
            SagaOutcome::UploadFailed { section, .. } => {
                let cleared = self.form.clear_selected_files();
                self.recompute();
                self.validation_errors = cleared
                    .into_iter()
                    .map(|name| (name, "upload failed; select the file again".to_string()))
                    .collect();
                if let Some(step) = self.definition.step_for_section(section).map(|step| step.id) {
                    let _ = self.jump_to(step);
                }
            }
            SagaOutcome::PersistenceFailed { .. } | SagaOutcome::Aborted => {}
        }
    }

    /// Re-derive the effective steps. The current step keeps focus while it stays visible;
    /// otherwise the index is clamped to the new list.
    fn recompute(&mut self) {
        let focused = self.effective.get(self.current_index).copied();
        self.effective = self.definition.effective_indices(&self.form);

        if let Some(position) =
            focused.and_then(|focused| self.effective.iter().position(|index| *index == focused))
        {
            self.current_index = position;
        } else if self.current_index >= self.effective.len() {
            self.current_index = self.effective.len().saturating_sub(1);
        }
    }
}
