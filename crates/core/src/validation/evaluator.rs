//! Schema evaluator -- pure logic, no database access.
//!
//! Snapshots are laid out as `{ page: { section: { field: value } } }`. List
//! fields hold arrays of objects keyed by their item field ids.

use serde_json::{Map, Value};

use super::rules::{
    FieldViolation, ValidationResult, RULE_MAX_ITEMS, RULE_MAX_LENGTH, RULE_MIN_LENGTH,
    RULE_REQUIRED, RULE_TYPE_CHECK, RULE_UNKNOWN_FIELD, RULE_URL_FORMAT,
};
use crate::content::{self, FieldPath};
use crate::theme::{FieldKind, FieldSchema, ThemeSchema};

/// Validate `snapshot` against `schema`, collecting every violation.
///
/// Image fields are only shape-checked here (a URL string or a list of URL
/// strings); their pixel/mime constraints are enforced at upload time.
/// Keys the schema does not declare are reported as warnings.
pub fn validate_snapshot(schema: &ThemeSchema, snapshot: &Value) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !snapshot.is_object() {
        errors.push(FieldViolation {
            field: String::new(),
            rule_type: RULE_TYPE_CHECK.to_string(),
            message: "Content must be a JSON object keyed by page".to_string(),
            value: None,
        });
        return ValidationResult {
            is_valid: false,
            errors,
            warnings,
        };
    }

    for page in &schema.pages {
        for section in &page.sections {
            let base = FieldPath::root().key(page.id.as_str()).key(section.id.as_str());
            for field in &section.fields {
                let path = base.key(field.id.as_str());
                check_field(field, &path, content::get(snapshot, &path), &mut errors);
            }
        }
    }

    collect_unknown_keys(schema, snapshot, &mut warnings);

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Fill in declared defaults for fields that are missing or blank.
///
/// Intermediate page/section objects are created as needed. List item
/// defaults are not expanded.
pub fn apply_defaults(schema: &ThemeSchema, snapshot: &mut Value) {
    let Some(root) = snapshot.as_object_mut() else {
        return;
    };

    for page in &schema.pages {
        for section in &page.sections {
            for field in &section.fields {
                let Some(default) = &field.default else {
                    continue;
                };
                let Some(section_map) = object_entry(root, &page.id)
                    .and_then(|page_map| object_entry(page_map, &section.id))
                else {
                    continue;
                };
                if content::is_blank(section_map.get(&field.id)) {
                    section_map.insert(field.id.clone(), default.clone());
                }
            }
        }
    }
}

/// Get or create the object stored under `key`. Returns `None` if a
/// non-object value already occupies it.
fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Map<String, Value>> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if entry.is_null() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut()
}

fn violation(path: &FieldPath, rule: &str, message: String, value: Option<&Value>) -> FieldViolation {
    FieldViolation {
        field: path.to_string(),
        rule_type: rule.to_string(),
        message,
        value: value.cloned(),
    }
}

fn check_field(
    field: &FieldSchema,
    path: &FieldPath,
    value: Option<&Value>,
    errors: &mut Vec<FieldViolation>,
) {
    if content::is_blank(value) {
        if field.required && field.default.is_none() {
            errors.push(violation(
                path,
                RULE_REQUIRED,
                format!("{} is required", field.label()),
                None,
            ));
        }
        return;
    }
    let Some(value) = value else {
        return;
    };

    match field.kind {
        kind if kind.is_scalar() => check_scalar(field, path, value, errors),
        FieldKind::ImageSet => check_image_set(field, path, value, errors),
        FieldKind::List => check_list(field, path, value, errors),
        _ => {}
    }
}

fn check_scalar(field: &FieldSchema, path: &FieldPath, value: &Value, errors: &mut Vec<FieldViolation>) {
    let Some(text) = value.as_str() else {
        errors.push(violation(
            path,
            RULE_TYPE_CHECK,
            format!("{} must be a string", field.label()),
            Some(value),
        ));
        return;
    };

    let length = text.chars().count();
    if let Some(min) = field.min_length {
        if length < min {
            errors.push(violation(
                path,
                RULE_MIN_LENGTH,
                format!("{} must be at least {min} characters", field.label()),
                Some(value),
            ));
        }
    }
    if let Some(max) = field.max_length {
        if length > max {
            errors.push(violation(
                path,
                RULE_MAX_LENGTH,
                format!("{} must be at most {max} characters", field.label()),
                Some(value),
            ));
        }
    }
    if field.kind == FieldKind::Url && !looks_like_url(text) {
        errors.push(violation(
            path,
            RULE_URL_FORMAT,
            format!("{} must be an absolute or site-relative URL", field.label()),
            Some(value),
        ));
    }
}

fn check_image_set(field: &FieldSchema, path: &FieldPath, value: &Value, errors: &mut Vec<FieldViolation>) {
    let Some(items) = value.as_array() else {
        errors.push(violation(
            path,
            RULE_TYPE_CHECK,
            format!("{} must be a list of image URLs", field.label()),
            Some(value),
        ));
        return;
    };

    for (index, item) in items.iter().enumerate() {
        if !item.is_string() {
            errors.push(violation(
                &path.index(index),
                RULE_TYPE_CHECK,
                format!("{} entries must be image URLs", field.label()),
                Some(item),
            ));
        }
    }
    check_max_items(field, path, items.len(), errors);
}

fn check_list(field: &FieldSchema, path: &FieldPath, value: &Value, errors: &mut Vec<FieldViolation>) {
    let Some(items) = value.as_array() else {
        errors.push(violation(
            path,
            RULE_TYPE_CHECK,
            format!("{} must be a list", field.label()),
            Some(value),
        ));
        return;
    };

    for (index, item) in items.iter().enumerate() {
        let item_path = path.index(index);
        if !item.is_object() {
            errors.push(violation(
                &item_path,
                RULE_TYPE_CHECK,
                format!("{} entries must be objects", field.label()),
                Some(item),
            ));
            continue;
        }
        for sub in &field.fields {
            let sub_path = item_path.key(sub.id.as_str());
            check_field(sub, &sub_path, item.get(&sub.id), errors);
        }
    }
    check_max_items(field, path, items.len(), errors);
}

fn check_max_items(field: &FieldSchema, path: &FieldPath, count: usize, errors: &mut Vec<FieldViolation>) {
    if let Some(max) = field.max_items {
        if count > max {
            errors.push(violation(
                path,
                RULE_MAX_ITEMS,
                format!("{} accepts at most {max} entries", field.label()),
                None,
            ));
        }
    }
}

fn looks_like_url(text: &str) -> bool {
    ["http://", "https://", "mailto:", "tel:", "/", "#"]
        .iter()
        .any(|prefix| text.starts_with(prefix))
}

fn collect_unknown_keys(schema: &ThemeSchema, snapshot: &Value, warnings: &mut Vec<FieldViolation>) {
    let Some(pages) = snapshot.as_object() else {
        return;
    };

    for (page_id, sections) in pages {
        let page_path = FieldPath::root().key(page_id.as_str());
        let Some(page) = schema.page(page_id) else {
            warnings.push(unknown(&page_path));
            continue;
        };
        let Some(sections) = sections.as_object() else {
            continue;
        };
        for (section_id, fields) in sections {
            let section_path = page_path.key(section_id.as_str());
            let Some(section) = page.sections.iter().find(|s| &s.id == section_id) else {
                warnings.push(unknown(&section_path));
                continue;
            };
            let Some(fields) = fields.as_object() else {
                continue;
            };
            for field_id in fields.keys() {
                if !section.fields.iter().any(|f| &f.id == field_id) {
                    warnings.push(unknown(&section_path.key(field_id.as_str())));
                }
            }
        }
    }
}

fn unknown(path: &FieldPath) -> FieldViolation {
    violation(
        path,
        RULE_UNKNOWN_FIELD,
        format!("'{path}' is not declared by the theme and will be ignored by its templates"),
        None,
    )
}
