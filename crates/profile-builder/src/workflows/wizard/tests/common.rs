use std::sync::Arc;

use serde_json::Value;

use crate::workflows::submission::UploadRule;
use crate::workflows::wizard::{
    FieldRule, SectionValue, StepId, StepKind, StepSpec, Visibility, WizardDefinition,
    WizardKind, WizardState,
};

pub(super) const PROFILE: &str = "profile";
pub(super) const HISTORY: &str = "history";
pub(super) const PORTFOLIO: &str = "portfolio";
pub(super) const AVATAR: &str = "avatarFile";

/// profile -> history (hidden for students) -> portfolio (students only) -> review
pub(super) fn definition() -> Arc<WizardDefinition> {
    let steps = vec![
        StepSpec {
            fields: vec!["name", "track"],
            rules: vec![
                FieldRule::Required {
                    section: PROFILE,
                    field: "name",
                },
                FieldRule::Required {
                    section: PROFILE,
                    field: "track",
                },
            ],
            ..step("profile", StepKind::DataEntry, vec![PROFILE, AVATAR], Visibility::Always)
        },
        StepSpec {
            rules: vec![FieldRule::MinItems {
                section: HISTORY,
                min: 1,
            }],
            ..step(
                "history",
                StepKind::DataEntry,
                vec![HISTORY],
                Visibility::FieldNotEquals {
                    section: PROFILE,
                    field: "track",
                    value: "student",
                },
            )
        },
        step(
            "portfolio",
            StepKind::DataEntry,
            vec![PORTFOLIO],
            Visibility::FieldEquals {
                section: PROFILE,
                field: "track",
                value: "student",
            },
        ),
        step("review", StepKind::Review, Vec::new(), Visibility::Always),
    ];
    let uploads = vec![UploadRule {
        section: AVATAR,
        bucket: "avatars",
        folder: None,
        required: false,
    }];

    Arc::new(
        WizardDefinition::new(WizardKind::CandidateProfile, steps, uploads)
            .expect("valid definition"),
    )
}

pub(super) fn step(
    id: &'static str,
    kind: StepKind,
    sections: Vec<&'static str>,
    visibility: Visibility,
) -> StepSpec {
    StepSpec {
        id: StepId(id),
        title: id,
        kind,
        sections,
        fields: Vec::new(),
        visibility,
        rules: Vec::new(),
        verification: None,
    }
}

pub(super) fn record(value: Value) -> SectionValue {
    match value {
        Value::Object(fields) => SectionValue::Record(fields),
        other => panic!("expected object, got {other}"),
    }
}

pub(super) fn list(value: Value) -> SectionValue {
    match value {
        Value::Array(items) => SectionValue::List(
            items
                .into_iter()
                .map(|item| match item {
                    Value::Object(fields) => fields,
                    other => panic!("expected object item, got {other}"),
                })
                .collect(),
        ),
        other => panic!("expected array, got {other}"),
    }
}

pub(super) fn step_ids(state: &WizardState) -> Vec<&'static str> {
    state
        .effective_steps()
        .into_iter()
        .map(|step| step.id.0)
        .collect()
}
