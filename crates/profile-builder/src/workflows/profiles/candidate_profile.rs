use crate::workflows::submission::UploadRule;
use crate::workflows::wizard::{
    FieldRule, StepKind, StepSpec, Visibility, WizardDefinition, WizardKind,
};

use super::step;

pub const CV: &str = "cvFile";
pub const BASIC_INFO: &str = "basicInfo";
pub const PROFILE_PHOTO: &str = "profilePhotoFile";
pub const WORK_EXPERIENCES: &str = "workExperiences";
pub const EDUCATIONS: &str = "educations";
pub const LICENSES: &str = "licenses";
pub const CERTIFICATES: &str = "certificates";
pub const PROJECTS: &str = "projects";

pub const CANDIDATE_TYPES: &[&str] = &["student", "graduate", "professional", "career_changer"];

pub fn definition() -> WizardDefinition {
    let steps = vec![
        step("cv_upload", "Upload your CV", StepKind::Upload, vec![CV]),
        StepSpec {
            fields: vec!["fullName", "email", "phone", "candidateType"],
            rules: vec![
                FieldRule::Required {
                    section: BASIC_INFO,
                    field: "fullName",
                },
                FieldRule::Required {
                    section: BASIC_INFO,
                    field: "email",
                },
                FieldRule::Email {
                    section: BASIC_INFO,
                    field: "email",
                },
                FieldRule::Required {
                    section: BASIC_INFO,
                    field: "candidateType",
                },
                FieldRule::OneOf {
                    section: BASIC_INFO,
                    field: "candidateType",
                    values: CANDIDATE_TYPES,
                },
            ],
            ..step(
                "basic_info",
                "About you",
                StepKind::DataEntry,
                vec![BASIC_INFO, PROFILE_PHOTO],
            )
        },
        StepSpec {
            visibility: Visibility::FieldNotEquals {
                section: BASIC_INFO,
                field: "candidateType",
                value: "student",
            },
            rules: vec![FieldRule::ListItemsRequire {
                section: WORK_EXPERIENCES,
                fields: &["jobTitle", "company"],
            }],
            ..step(
                "work_experiences",
                "Work experience",
                StepKind::DataEntry,
                vec![WORK_EXPERIENCES],
            )
        },
        StepSpec {
            rules: vec![
                FieldRule::MinItems {
                    section: EDUCATIONS,
                    min: 1,
                },
                FieldRule::ListItemsRequire {
                    section: EDUCATIONS,
                    fields: &["institution"],
                },
            ],
            ..step("educations", "Education", StepKind::DataEntry, vec![EDUCATIONS])
        },
        StepSpec {
            visibility: Visibility::FieldEquals {
                section: BASIC_INFO,
                field: "candidateType",
                value: "professional",
            },
            rules: vec![FieldRule::ListItemsRequire {
                section: LICENSES,
                fields: &["name", "licenseNumber"],
            }],
            ..step("licenses", "Professional licenses", StepKind::DataEntry, vec![LICENSES])
        },
        StepSpec {
            rules: vec![FieldRule::ListItemsRequire {
                section: CERTIFICATES,
                fields: &["name"],
            }],
            ..step("certificates", "Certificates", StepKind::DataEntry, vec![CERTIFICATES])
        },
        StepSpec {
            visibility: Visibility::FieldIn {
                section: BASIC_INFO,
                field: "candidateType",
                values: &["student", "graduate"],
            },
            rules: vec![FieldRule::ListItemsRequire {
                section: PROJECTS,
                fields: &["title"],
            }],
            ..step("projects", "Projects", StepKind::DataEntry, vec![PROJECTS])
        },
        step("review", "Review your profile", StepKind::Review, Vec::new()),
    ];

    let uploads = vec![
        UploadRule {
            section: CV,
            bucket: "candidate-cvs",
            folder: None,
            required: false,
        },
        UploadRule {
            section: PROFILE_PHOTO,
            bucket: "profile-images",
            folder: Some("candidates"),
            required: false,
        },
    ];

    WizardDefinition::assemble(WizardKind::CandidateProfile, steps, uploads).with_extraction_source(CV)
}
