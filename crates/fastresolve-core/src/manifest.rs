//! Package manifest (`package.json`) interpretation.

use crate::config::MAIN_FIELD;
use serde_json::Value;

/// Rewrite the manifest's `main` to the first preferred field it defines.
///
/// Walks `main_fields` in order; the first one holding a string value is
/// copied into `main`. Returns `true` ("disregard") when no preferred field
/// matched and `main` itself is not among the preferences: the package has
/// no entry under the requested fields, so anything found through its
/// default entry point must be dropped.
pub fn select_main_field(manifest: &mut Value, main_fields: &[String]) -> bool {
    let Some(object) = manifest.as_object_mut() else {
        return !main_fields.iter().any(|field| field == MAIN_FIELD);
    };

    let selected = main_fields
        .iter()
        .find_map(|field| object.get(field).and_then(Value::as_str).map(str::to_owned));

    match selected {
        Some(entry) => {
            object.insert(MAIN_FIELD.to_string(), Value::String(entry));
            false
        }
        None => !main_fields.iter().any(|field| field == MAIN_FIELD),
    }
}
