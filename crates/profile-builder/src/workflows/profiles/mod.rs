//! The three wizard definitions hosted by the platform.

pub mod candidate_profile;
pub mod employer_profile;
pub mod employer_signup;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::workflows::wizard::{StepId, StepKind, StepSpec, Visibility, WizardDefinition, WizardKind};

/// Shared, immutable wizard definitions keyed by kind.
#[derive(Debug, Clone)]
pub struct WizardCatalog {
    definitions: BTreeMap<WizardKind, Arc<WizardDefinition>>,
}

impl WizardCatalog {
    pub fn standard() -> Self {
        Self::from_definitions([
            employer_signup::definition(),
            employer_profile::definition(),
            candidate_profile::definition(),
        ])
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = WizardDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|definition| (definition.kind(), Arc::new(definition)))
                .collect(),
        }
    }

    pub fn get(&self, kind: WizardKind) -> Option<Arc<WizardDefinition>> {
        self.definitions.get(&kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = WizardKind> + '_ {
        self.definitions.keys().copied()
    }
}

impl Default for WizardCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Step with no rules or verification; callers fill those in with struct update syntax.
pub(crate) fn step(
    id: &'static str,
    title: &'static str,
    kind: StepKind,
    sections: Vec<&'static str>,
) -> StepSpec {
    StepSpec {
        id: StepId(id),
        title,
        kind,
        sections,
        fields: Vec::new(),
        visibility: Visibility::Always,
        rules: Vec::new(),
        verification: None,
    }
}
