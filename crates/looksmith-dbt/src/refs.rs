//! `ref(...)` extraction from exposure metadata
//!
//! Exposure `main_model` values and join `sql_on` conditions name models with
//! dbt's reference syntax, e.g. `${ref('orders').id} = ${ref('customers').id}`.

use regex::Regex;
use std::sync::OnceLock;

/// `ref('model')` or `ref('package', 'model')`, either quote style
fn ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"ref\(\s*(?:['"]\w+['"]\s*,\s*)?['"](\w+)['"]\s*\)"#)
            .expect("ref pattern is a valid regex")
    })
}

/// Extract referenced model names in order of appearance
///
/// The package argument of the two-argument form is dropped. Returns `None`
/// when the text holds no reference at all.
pub fn extract_refs(text: &str) -> Option<Vec<String>> {
    let refs: Vec<String> = ref_pattern()
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
        .collect();

    if refs.is_empty() {
        None
    } else {
        Some(refs)
    }
}
