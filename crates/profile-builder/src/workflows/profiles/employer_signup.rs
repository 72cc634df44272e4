use crate::workflows::submission::UploadRule;
use crate::workflows::wizard::{
    ComparisonField, FieldRule, StepKind, StepSpec, VerificationRequirement, WizardDefinition,
    WizardKind,
};

use super::step;

pub const CONTACT: &str = "contact";
pub const COMPANY_INFO: &str = "companyInfo";
pub const BR_CERTIFICATE: &str = "brCertificateFile";

pub const BR_BUCKET: &str = "business-certificates";

pub fn definition() -> WizardDefinition {
    let steps = vec![
        StepSpec {
            fields: vec!["contactName", "email", "phone"],
            rules: vec![
                FieldRule::Required {
                    section: CONTACT,
                    field: "contactName",
                },
                FieldRule::Required {
                    section: CONTACT,
                    field: "email",
                },
                FieldRule::Email {
                    section: CONTACT,
                    field: "email",
                },
            ],
            ..step("contact", "Contact person", StepKind::DataEntry, vec![CONTACT])
        },
        StepSpec {
            fields: vec!["companyName", "businessRegistrationNo", "industry"],
            rules: vec![
                FieldRule::Required {
                    section: COMPANY_INFO,
                    field: "companyName",
                },
                FieldRule::Required {
                    section: COMPANY_INFO,
                    field: "businessRegistrationNo",
                },
                FieldRule::MinLength {
                    section: COMPANY_INFO,
                    field: "businessRegistrationNo",
                    min: 8,
                },
                FieldRule::Required {
                    section: COMPANY_INFO,
                    field: "industry",
                },
            ],
            ..step(
                "company_info",
                "Company information",
                StepKind::DataEntry,
                vec![COMPANY_INFO],
            )
        },
        StepSpec {
            rules: vec![
                FieldRule::FileRequired {
                    section: BR_CERTIFICATE,
                },
                FieldRule::FileVerified {
                    section: BR_CERTIFICATE,
                },
            ],
            verification: Some(VerificationRequirement {
                section: BR_CERTIFICATE,
                comparison: vec![
                    ComparisonField {
                        label: "company_name",
                        section: COMPANY_INFO,
                        field: "companyName",
                    },
                    ComparisonField {
                        label: "business_registration_no",
                        section: COMPANY_INFO,
                        field: "businessRegistrationNo",
                    },
                ],
            }),
            ..step(
                "br_certificate",
                "Business registration certificate",
                StepKind::Upload,
                vec![BR_CERTIFICATE],
            )
        },
        step("review", "Review and submit", StepKind::Review, Vec::new()),
    ];

    let uploads = vec![UploadRule {
        section: BR_CERTIFICATE,
        bucket: BR_BUCKET,
        folder: Some("signup"),
        required: true,
    }];

    WizardDefinition::assemble(WizardKind::EmployerSignup, steps, uploads)
}
