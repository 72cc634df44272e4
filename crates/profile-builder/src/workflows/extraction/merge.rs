use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::PartialRecord;
use crate::workflows::wizard::{is_present, FormState, SectionValue};

/// Sections to write into the form after an extraction. Each entry replaces its section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormPatch {
    sections: BTreeMap<String, SectionValue>,
}

impl FormPatch {
    pub fn section(&self, name: &str) -> Option<&SectionValue> {
        self.sections.get(name)
    }

    pub fn into_sections(self) -> BTreeMap<String, SectionValue> {
        self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }
}

/// Fold an untrusted extraction result over the current form.
///
/// Scalar fields overwrite only when the extracted value is present; a list section is
/// replaced wholesale when at least one usable item came back and left alone otherwise.
pub fn merge_extraction(form: &FormState, partial: &PartialRecord) -> FormPatch {
    let mut sections = BTreeMap::new();

    for (name, extracted) in &partial.fields {
        let present: Vec<(&String, &Value)> = extracted
            .iter()
            .filter(|(_, value)| is_present(value))
            .collect();
        if present.is_empty() {
            continue;
        }

        let mut merged = match form.section(name) {
            Some(SectionValue::Record(existing)) => existing.clone(),
            _ => Map::new(),
        };
        for (field, value) in present {
            merged.insert(field.clone(), value.clone());
        }
        sections.insert(name.clone(), SectionValue::Record(merged));
    }

    for (name, items) in &partial.lists {
        let items: Vec<Map<String, Value>> = items.iter().filter_map(present_fields).collect();
        if items.is_empty() {
            continue;
        }
        sections.insert(name.clone(), SectionValue::List(items));
    }

    FormPatch { sections }
}

/// Keep only the present fields of a list item; `None` when nothing usable is left.
fn present_fields(item: &Map<String, Value>) -> Option<Map<String, Value>> {
    let fields: Map<String, Value> = item
        .iter()
        .filter(|(_, value)| is_present(value))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect();
    (!fields.is_empty()).then_some(fields)
}
