use super::domain::{FieldErrors, FieldRule, StepSpec};
use super::form::{is_present, FormState};

/// Evaluate a step's local rules. The first failing rule per key wins.
pub fn validate_step(step: &StepSpec, form: &FormState) -> FieldErrors {
    let mut errors = FieldErrors::new();

    for rule in &step.rules {
        for (key, message) in check_rule(rule, form) {
            errors.entry(key).or_insert(message);
        }
    }

    errors
}

fn check_rule(rule: &FieldRule, form: &FormState) -> Vec<(String, String)> {
    match *rule {
        FieldRule::Required { section, field } => {
            if form.field(section, field).is_some_and(is_present) {
                Vec::new()
            } else {
                vec![(field.to_string(), "is required".to_string())]
            }
        }
        FieldRule::MinLength {
            section,
            field,
            min,
        } => match form.text(section, field) {
            Some(value) if value.chars().count() < min => vec![(
                field.to_string(),
                format!("must be at least {min} characters"),
            )],
            _ => Vec::new(),
        },
        FieldRule::Email { section, field } => match form.text(section, field) {
            Some(value) if !looks_like_email(value) => vec![(
                field.to_string(),
                "must be a valid e-mail address".to_string(),
            )],
            _ => Vec::new(),
        },
        FieldRule::OneOf {
            section,
            field,
            values,
        } => match form.text(section, field) {
            Some(value)
                if !values
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(value)) =>
            {
                vec![(
                    field.to_string(),
                    format!("must be one of: {}", values.join(", ")),
                )]
            }
            _ => Vec::new(),
        },
        FieldRule::ListItemsRequire { section, fields } => form
            .list(section)
            .iter()
            .enumerate()
            .flat_map(|(index, item)| {
                fields
                    .iter()
                    .filter(move |field| !item.get(**field).is_some_and(is_present))
                    .map(move |field| {
                        (
                            format!("{section}[{index}].{field}"),
                            "is required".to_string(),
                        )
                    })
            })
            .collect(),
        FieldRule::MinItems { section, min } => {
            if form.list(section).len() < min {
                vec![(
                    section.to_string(),
                    format!("at least {min} entries required"),
                )]
            } else {
                Vec::new()
            }
        }
        FieldRule::FileRequired { section } => {
            if form.section(section).is_some_and(|value| value.is_artifact()) {
                Vec::new()
            } else {
                vec![(section.to_string(), "a file must be attached".to_string())]
            }
        }
        FieldRule::FileVerified { section } => {
            if form.section(section).is_none() || form.is_verified(section) {
                Vec::new()
            } else {
                let message = form
                    .verdict(section)
                    .map(|verdict| format!("document failed verification: {}", verdict.message))
                    .unwrap_or_else(|| "document has not been verified yet".to_string());
                vec![(section.to_string(), message)]
            }
        }
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !value.chars().any(char::is_whitespace)
}
