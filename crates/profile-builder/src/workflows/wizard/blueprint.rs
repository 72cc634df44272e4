use std::collections::BTreeSet;

use super::domain::{DefinitionError, StepId, StepSpec, WizardKind};
use super::form::FormState;
use crate::workflows::submission::UploadRule;

/// Ordered steps plus the upload rules used to build a submission plan.
#[derive(Debug, Clone)]
pub struct WizardDefinition {
    kind: WizardKind,
    steps: Vec<StepSpec>,
    uploads: Vec<UploadRule>,
    extraction_source: Option<&'static str>,
}

impl WizardDefinition {
    pub fn new(
        kind: WizardKind,
        steps: Vec<StepSpec>,
        uploads: Vec<UploadRule>,
    ) -> Result<Self, DefinitionError> {
        let definition = Self::assemble(kind, steps, uploads);
        definition.validate()?;
        Ok(definition)
    }

    /// Build without validation; catalogue entries are checked by their tests.
    pub(crate) fn assemble(kind: WizardKind, steps: Vec<StepSpec>, uploads: Vec<UploadRule>) -> Self {
        Self {
            kind,
            steps,
            uploads,
            extraction_source: None,
        }
    }

    /// Mark a file section whose attachment triggers document extraction.
    pub fn with_extraction_source(mut self, section: &'static str) -> Self {
        self.extraction_source = Some(section);
        self
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::Empty);
        }

        if !self
            .steps
            .iter()
            .any(|step| step.visibility.is_unconditional())
        {
            return Err(DefinitionError::NoAlwaysVisibleStep);
        }

        let mut seen = BTreeSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.0) {
                return Err(DefinitionError::DuplicateStep(step.id));
            }
        }

        for rule in &self.uploads {
            if self.step_for_section(rule.section).is_none() {
                return Err(DefinitionError::UnownedUploadSection(rule.section));
            }
        }

        if let Some(source) = self.extraction_source {
            if self.upload_rule(source).is_none() {
                return Err(DefinitionError::UnknownExtractionSource(source));
            }
        }

        Ok(())
    }

    pub fn kind(&self) -> WizardKind {
        self.kind
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    pub fn uploads(&self) -> &[UploadRule] {
        &self.uploads
    }

    pub fn extraction_source(&self) -> Option<&'static str> {
        self.extraction_source
    }

    pub fn step(&self, id: StepId) -> Option<&StepSpec> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// Positions of the visible steps, in definition order.
    pub(crate) fn effective_indices(&self, form: &FormState) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.visibility.resolve(form))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn effective_steps(&self, form: &FormState) -> Vec<&StepSpec> {
        self.steps
            .iter()
            .filter(|step| step.visibility.resolve(form))
            .collect()
    }

    pub fn step_for_section(&self, section: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|step| step.owns_section(section))
    }

    pub fn step_for_field(&self, key: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|step| step.owns_field(key))
    }

    pub fn upload_rule(&self, section: &str) -> Option<&UploadRule> {
        self.uploads.iter().find(|rule| rule.section == section)
    }

    pub fn is_file_section(&self, section: &str) -> bool {
        self.upload_rule(section).is_some()
    }

    /// Sections owned by steps visible under `form`, in step order.
    pub fn effective_sections(&self, form: &FormState) -> Vec<&'static str> {
        self.effective_steps(form)
            .into_iter()
            .flat_map(|step| step.sections.iter().copied())
            .collect()
    }
}
