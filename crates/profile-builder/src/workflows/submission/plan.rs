use serde::Serialize;

use crate::workflows::wizard::{FileHandle, FormState, SectionValue, StepId, WizardDefinition};

/// Where a file section is uploaded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRule {
    pub section: &'static str,
    pub bucket: &'static str,
    pub folder: Option<&'static str>,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadStep {
    pub section: String,
    pub artifact: FileHandle,
    pub bucket: String,
    pub folder: Option<String>,
    pub required: bool,
}

/// Ordered uploads for one submission, built once and never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadPlan {
    steps: Vec<UploadStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("step '{step}' requires a file for '{section}'")]
    MissingRequiredArtifact { step: StepId, section: String },
    #[error("file in '{section}' has no upload destination")]
    UnplannedFile { step: StepId, section: String },
}

impl PlanError {
    pub fn step(&self) -> StepId {
        match self {
            PlanError::MissingRequiredArtifact { step, .. } | PlanError::UnplannedFile { step, .. } => {
                *step
            }
        }
    }

    pub fn section(&self) -> &str {
        match self {
            PlanError::MissingRequiredArtifact { section, .. }
            | PlanError::UnplannedFile { section, .. } => section,
        }
    }
}

impl UploadPlan {
    /// Collect selected files from visible steps, in step and section order.
    ///
    /// Sections that already hold a stored artifact need no upload, even when required.
    pub fn build(definition: &WizardDefinition, form: &FormState) -> Result<Self, PlanError> {
        let mut steps = Vec::new();

        for step in definition.effective_steps(form) {
            for section in &step.sections {
                let rule = definition.upload_rule(section);
                match (form.section(section), rule) {
                    (Some(SectionValue::File(artifact)), Some(rule)) => steps.push(UploadStep {
                        section: section.to_string(),
                        artifact: artifact.clone(),
                        bucket: rule.bucket.to_string(),
                        folder: rule.folder.map(str::to_string),
                        required: rule.required,
                    }),
                    (Some(SectionValue::File(_)), None) => {
                        return Err(PlanError::UnplannedFile {
                            step: step.id,
                            section: section.to_string(),
                        })
                    }
                    (Some(SectionValue::Stored(_)), _) => {}
                    (_, Some(rule)) if rule.required => {
                        return Err(PlanError::MissingRequiredArtifact {
                            step: step.id,
                            section: section.to_string(),
                        })
                    }
                    _ => {}
                }
            }
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[UploadStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
