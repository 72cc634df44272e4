//! Step sequencing for the profile wizards.
//!
//! A `WizardDefinition` lists every screen with its visibility predicate and local rules;
//! `WizardState` projects the visible subset from the current form data and owns navigation.

mod blueprint;
pub mod domain;
pub mod form;
mod instance;
pub mod validation;

#[cfg(test)]
mod tests;

pub use blueprint::WizardDefinition;
pub use domain::{
    ComparisonField, DefinitionError, FieldErrors, FieldRule, StepId, StepKind, StepSpec,
    VerificationRequirement, Visibility, WizardKind,
};
pub use form::{
    is_present, ArtifactUrl, FileHandle, FormState, RecordId, SectionValue, VerificationVerdict,
};
pub use instance::{SequencerError, WizardState};
