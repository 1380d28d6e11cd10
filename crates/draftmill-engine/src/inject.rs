//! Placeholder injection with tolerant spelling.
//!
//! Hand-written templates spell the same placeholder three ways:
//! `{[KEY NAME]}`, `{[key_name]}`, and `{{key_name}}`. All three are
//! accepted simultaneously; whichever spellings appear in the template are
//! replaced for every context key. Unmatched placeholders stay verbatim in
//! the final prompt (logged, never fatal).

use std::collections::BTreeMap;

use tracing::debug;

/// Substitute context values into a template, trying all accepted
/// placeholder spellings for each key.
pub fn inject_placeholders(template: &str, context: &BTreeMap<String, String>) -> String {
    let mut out = template.to_string();

    for (key, value) in context {
        let spellings = [
            // Bracketed upper-snake with spaces: {[KEY NAME]}
            format!("{{[{}]}}", key.to_uppercase().replace('_', " ")),
            // Bracketed original-case: {[key_name]}
            format!("{{[{}]}}", key),
            // Double-brace: {{key_name}}
            format!("{{{{{}}}}}", key),
        ];
        for spelling in &spellings {
            if out.contains(spelling.as_str()) {
                out = out.replace(spelling.as_str(), value);
            }
        }
    }

    let leftover = unresolved_placeholders(&out);
    if !leftover.is_empty() {
        debug!(placeholders = ?leftover, "Unmatched placeholders left verbatim");
    }

    out
}

/// Placeholder names still present in a template, in either bracketed or
/// double-brace form. Used for logging and template linting.
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = text;

    loop {
        let bracketed = rest.find("{[");
        let braced = rest.find("{{");

        let (at, open, close) = match (bracketed, braced) {
            (Some(a), Some(b)) if a <= b => (a, "{[", "]}"),
            (Some(a), None) => (a, "{[", "]}"),
            (_, Some(b)) => (b, "{{", "}}"),
            (None, None) => break,
        };

        let after = &rest[at + open.len()..];
        match after.find(close) {
            Some(end) => {
                found.push(after[..end].to_string());
                rest = &after[end + close.len()..];
            }
            None => break,
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_all_three_spellings_replaced_for_one_key() {
        let context = ctx(&[("x", "value")]);
        let out = inject_placeholders("a={{x}} b={[x]} c={[X]}", &context);
        assert_eq!(out, "a=value b=value c=value");
    }

    #[test]
    fn test_upper_snake_spelling_with_spaces() {
        let context = ctx(&[("selected_sections", "A, B")]);
        let out = inject_placeholders("Context: {[SELECTED SECTIONS]}", &context);
        assert_eq!(out, "Context: A, B");
    }

    #[test]
    fn test_replaces_all_occurrences() {
        let context = ctx(&[("name", "draft")]);
        let out = inject_placeholders("{{name}} and {{name}} again", &context);
        assert_eq!(out, "draft and draft again");
    }

    #[test]
    fn test_key_without_placeholder_leaves_template_unchanged() {
        let context = ctx(&[("unused_key", "value")]);
        let template = "no placeholders here";
        assert_eq!(inject_placeholders(template, &context), template);
    }

    #[test]
    fn test_unmatched_placeholder_stays_verbatim() {
        let context = ctx(&[("x", "1")]);
        let out = inject_placeholders("{{x}} {[MISSING KEY]} {{also_missing}}", &context);
        assert_eq!(out, "1 {[MISSING KEY]} {{also_missing}}");
    }

    #[test]
    fn test_mixed_spellings_in_one_template() {
        let context = ctx(&[("source_analysis", "S"), ("user_comments", "C")]);
        let out = inject_placeholders(
            "Prior: {[SOURCE ANALYSIS]}\nNotes: {{user_comments}}",
            &context,
        );
        assert_eq!(out, "Prior: S\nNotes: C");
    }

    #[test]
    fn test_empty_context_is_a_no_op() {
        let template = "Context: {[SELECTED SECTIONS]}";
        assert_eq!(inject_placeholders(template, &BTreeMap::new()), template);
    }

    #[test]
    fn test_unresolved_placeholders_lists_both_forms() {
        let names = unresolved_placeholders("a {[ONE]} b {{two}} c {[three_3]}");
        assert_eq!(names, vec!["ONE", "two", "three_3"]);
    }

    #[test]
    fn test_unresolved_placeholders_ignores_unterminated() {
        assert!(unresolved_placeholders("dangling {[open").is_empty());
        assert!(unresolved_placeholders("dangling {{open").is_empty());
    }

    #[test]
    fn test_unresolved_placeholders_empty_when_clean() {
        assert!(unresolved_placeholders("plain text, no markers").is_empty());
    }
}
