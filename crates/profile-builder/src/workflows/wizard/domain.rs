use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::form::FormState;

/// Field key to human readable message. Keys are field names (`businessRegistrationNo`),
/// list item paths (`workExperiences[0].jobTitle`), or section names.
pub type FieldErrors = BTreeMap<String, String>;

/// The three wizards hosted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardKind {
    EmployerSignup,
    EmployerProfile,
    CandidateProfile,
}

impl WizardKind {
    pub const fn ordered() -> [Self; 3] {
        [
            Self::EmployerSignup,
            Self::EmployerProfile,
            Self::CandidateProfile,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::EmployerSignup => "Employer Signup",
            Self::EmployerProfile => "Employer Profile Completion",
            Self::CandidateProfile => "Candidate Profile",
        }
    }

    /// Path segment used by the HTTP surface.
    pub const fn slug(self) -> &'static str {
        match self {
            Self::EmployerSignup => "employer-signup",
            Self::EmployerProfile => "employer-profile",
            Self::CandidateProfile => "candidate-profile",
        }
    }

    pub fn from_slug(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ordered()
            .into_iter()
            .find(|kind| kind.slug() == normalized)
    }
}

/// Stable identifier of a wizard screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StepId(pub &'static str);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Document intake screen, typically the extraction source.
    Upload,
    DataEntry,
    Review,
}

impl StepKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Upload => "Upload",
            Self::DataEntry => "Data Entry",
            Self::Review => "Review",
        }
    }
}

/// Predicate deciding whether a step belongs to the effective step list.
///
/// Values are compared as trimmed, case-insensitive strings.
#[derive(Debug, Clone, Copy)]
pub enum Visibility {
    Always,
    FieldEquals {
        section: &'static str,
        field: &'static str,
        value: &'static str,
    },
    /// Visible while the field is absent or holds a different value.
    FieldNotEquals {
        section: &'static str,
        field: &'static str,
        value: &'static str,
    },
    FieldIn {
        section: &'static str,
        field: &'static str,
        values: &'static [&'static str],
    },
}

impl Visibility {
    pub(crate) fn resolve(&self, form: &FormState) -> bool {
        match self {
            Visibility::Always => true,
            Visibility::FieldEquals {
                section,
                field,
                value,
            } => form
                .text(section, field)
                .is_some_and(|current| current.eq_ignore_ascii_case(value)),
            Visibility::FieldNotEquals {
                section,
                field,
                value,
            } => !form
                .text(section, field)
                .is_some_and(|current| current.eq_ignore_ascii_case(value)),
            Visibility::FieldIn {
                section,
                field,
                values,
            } => form.text(section, field).is_some_and(|current| {
                values
                    .iter()
                    .any(|candidate| current.eq_ignore_ascii_case(candidate))
            }),
        }
    }

    pub const fn is_unconditional(&self) -> bool {
        matches!(self, Visibility::Always)
    }
}

/// Local, per-step validation rule evaluated by `go_next`.
#[derive(Debug, Clone, Copy)]
pub enum FieldRule {
    Required {
        section: &'static str,
        field: &'static str,
    },
    MinLength {
        section: &'static str,
        field: &'static str,
        min: usize,
    },
    Email {
        section: &'static str,
        field: &'static str,
    },
    OneOf {
        section: &'static str,
        field: &'static str,
        values: &'static [&'static str],
    },
    ListItemsRequire {
        section: &'static str,
        fields: &'static [&'static str],
    },
    MinItems {
        section: &'static str,
        min: usize,
    },
    FileRequired {
        section: &'static str,
    },
    FileVerified {
        section: &'static str,
    },
}

/// Business data a document is compared against by the verification service.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonField {
    pub label: &'static str,
    pub section: &'static str,
    pub field: &'static str,
}

/// Marks a step whose file must carry a passing verdict before submission.
#[derive(Debug, Clone)]
pub struct VerificationRequirement {
    pub section: &'static str,
    pub comparison: Vec<ComparisonField>,
}

impl VerificationRequirement {
    /// Resolve comparison labels to the values currently held by the form.
    pub fn comparison_values(&self, form: &FormState) -> BTreeMap<String, String> {
        self.comparison
            .iter()
            .filter_map(|field| {
                form.text(field.section, field.field)
                    .map(|value| (field.label.to_string(), value.to_string()))
            })
            .collect()
    }
}

/// One screen of a wizard.
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub id: StepId,
    pub title: &'static str,
    pub kind: StepKind,
    /// Form sections owned by this step.
    pub sections: Vec<&'static str>,
    /// Field keys owned by this step, used to route server-side errors.
    pub fields: Vec<&'static str>,
    pub visibility: Visibility,
    pub rules: Vec<FieldRule>,
    pub verification: Option<VerificationRequirement>,
}

impl StepSpec {
    pub fn owns_section(&self, section: &str) -> bool {
        self.sections.iter().any(|owned| *owned == section)
    }

    /// True when the key names one of this step's fields, or a path rooted in one of its sections.
    pub fn owns_field(&self, key: &str) -> bool {
        if self.fields.iter().any(|field| *field == key) {
            return true;
        }
        let head = key
            .split(|c| c == '[' || c == '.')
            .next()
            .unwrap_or(key);
        self.owns_section(head)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("wizard definition has no steps")]
    Empty,
    #[error("wizard definition needs at least one always-visible step")]
    NoAlwaysVisibleStep,
    #[error("step id '{0}' appears more than once")]
    DuplicateStep(StepId),
    #[error("upload rule targets section '{0}' which no step owns")]
    UnownedUploadSection(&'static str),
    #[error("extraction source '{0}' has no upload rule")]
    UnknownExtractionSource(&'static str),
}
