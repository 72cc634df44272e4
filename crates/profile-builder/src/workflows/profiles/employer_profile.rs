use crate::workflows::submission::UploadRule;
use crate::workflows::wizard::{
    FieldRule, StepKind, StepSpec, Visibility, WizardDefinition, WizardKind,
};

use super::step;

pub const COMPANY_PROFILE: &str = "companyProfile";
pub const COMPANY_LOGO: &str = "companyLogoFile";
pub const PROFILE_IMAGE: &str = "profileImageFile";
pub const HOSPITALITY_DETAILS: &str = "hospitalityDetails";
pub const HEALTHCARE_DETAILS: &str = "healthcareDetails";
pub const BENEFITS: &str = "benefits";

pub const INDUSTRIES: &[&str] = &["hospitality", "healthcare", "retail", "logistics", "technology"];

pub fn definition() -> WizardDefinition {
    let steps = vec![
        StepSpec {
            fields: vec!["description", "industry", "website", "headcount"],
            rules: vec![
                FieldRule::Required {
                    section: COMPANY_PROFILE,
                    field: "description",
                },
                FieldRule::MinLength {
                    section: COMPANY_PROFILE,
                    field: "description",
                    min: 50,
                },
                FieldRule::Required {
                    section: COMPANY_PROFILE,
                    field: "industry",
                },
                FieldRule::OneOf {
                    section: COMPANY_PROFILE,
                    field: "industry",
                    values: INDUSTRIES,
                },
            ],
            ..step(
                "company_overview",
                "Company overview",
                StepKind::DataEntry,
                vec![COMPANY_PROFILE],
            )
        },
        step(
            "branding",
            "Logo and imagery",
            StepKind::Upload,
            vec![COMPANY_LOGO, PROFILE_IMAGE],
        ),
        StepSpec {
            visibility: Visibility::FieldEquals {
                section: COMPANY_PROFILE,
                field: "industry",
                value: "hospitality",
            },
            rules: vec![FieldRule::Required {
                section: HOSPITALITY_DETAILS,
                field: "venueType",
            }],
            ..step(
                "hospitality_details",
                "Hospitality details",
                StepKind::DataEntry,
                vec![HOSPITALITY_DETAILS],
            )
        },
        StepSpec {
            visibility: Visibility::FieldEquals {
                section: COMPANY_PROFILE,
                field: "industry",
                value: "healthcare",
            },
            rules: vec![FieldRule::Required {
                section: HEALTHCARE_DETAILS,
                field: "facilityType",
            }],
            ..step(
                "healthcare_details",
                "Healthcare details",
                StepKind::DataEntry,
                vec![HEALTHCARE_DETAILS],
            )
        },
        step("benefits", "Benefits", StepKind::DataEntry, vec![BENEFITS]),
        step("review", "Review and publish", StepKind::Review, Vec::new()),
    ];

    let uploads = vec![
        UploadRule {
            section: COMPANY_LOGO,
            bucket: "company-logos",
            folder: None,
            required: false,
        },
        UploadRule {
            section: PROFILE_IMAGE,
            bucket: "profile-images",
            folder: None,
            required: false,
        },
    ];

    WizardDefinition::assemble(WizardKind::EmployerProfile, steps, uploads)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::workflows::wizard::{FormState, SectionValue, StepId};

    fn ids(definition: &WizardDefinition, form: &FormState) -> Vec<&'static str> {
        definition
            .effective_steps(form)
            .into_iter()
            .map(|step| step.id.0)
            .collect()
    }

    #[test]
    fn definition_is_valid() {
        definition().validate().expect("profile definition is valid");
    }

    #[test]
    fn industry_selects_the_detail_step() {
        let definition = definition();
        let mut form = FormState::new();
        assert_eq!(
            ids(&definition, &form),
            vec!["company_overview", "branding", "benefits", "review"]
        );

        let Value::Object(fields) = json!({ "industry": "Healthcare" }) else {
            panic!("object literal");
        };
        form.update_section(COMPANY_PROFILE, SectionValue::Record(fields));
        assert_eq!(
            ids(&definition, &form),
            vec!["company_overview", "branding", "healthcare_details", "benefits", "review"]
        );
        assert!(definition
            .effective_steps(&form)
            .iter()
            .all(|step| step.id != StepId("hospitality_details")));
    }

    #[test]
    fn logo_uploads_before_profile_image() {
        let definition = definition();
        let buckets: Vec<_> = definition.uploads().iter().map(|rule| rule.bucket).collect();
        assert_eq!(buckets, vec!["company-logos", "profile-images"]);
        assert!(definition.uploads().iter().all(|rule| !rule.required));
    }
}
