//! Context building for one stage execution.
//!
//! A Context is an ephemeral key→value mapping assembled fresh for every
//! run: prior completed stages' sections filtered to the user's selection,
//! the user's free-text annotations, and any stage-specific payload fields.
//! It exists only for the duration of one placeholder-injection call and is
//! never persisted.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use draftmill_core::{Section, Stage, StageResult, TriggerPayload};

/// Filter a stage result's sections to the selected titles, preserving
/// order of appearance. A selected title with no matching section is
/// silently absent from the output — never an error.
pub fn filter_sections<'a>(result: &'a StageResult, selected: &[String]) -> Vec<&'a Section> {
    result
        .sections
        .iter()
        .filter(|s| selected.iter().any(|id| id == &s.title))
        .collect()
}

/// Serialize a payload value to stable text for injection. Strings pass
/// through untouched; lists and maps become pretty-printed JSON.
pub fn serialize_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

/// Render selected sections back to markdown-shaped text, appending the
/// user's annotation under each section it targets.
fn render_sections(
    sections: &[&Section],
    comments: &std::collections::HashMap<String, String>,
) -> String {
    sections
        .iter()
        .map(|s| {
            let mut block = format!("## {}\n{}", s.title, s.body);
            if let Some(comment) = comments.get(&s.title) {
                block.push_str("\n\nAnnotation: ");
                block.push_str(comment);
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Assemble the substitution values for one stage run.
///
/// Keys produced:
/// - one per prior stage with selected content, named after the stage
///   (`source_analysis`, ...), holding its filtered sections
/// - `selected_sections`: all selected titles, comma-joined
/// - `user_comments`: every annotation as an `- id: text` list
/// - one per stage-specific payload field, serialized to stable text
pub fn build_context(
    prior: &BTreeMap<Stage, StageResult>,
    payload: &TriggerPayload,
) -> BTreeMap<String, String> {
    let mut context = BTreeMap::new();
    let mut selected_titles: Vec<String> = Vec::new();

    for (stage, result) in prior {
        let picked = filter_sections(result, &payload.selected_ids);
        if picked.is_empty() {
            continue;
        }
        selected_titles.extend(picked.iter().map(|s| s.title.clone()));
        context.insert(
            stage.context_key(),
            render_sections(&picked, &payload.user_comments),
        );
    }

    if !selected_titles.is_empty() {
        context.insert("selected_sections".to_string(), selected_titles.join(", "));
    }

    if !payload.user_comments.is_empty() {
        let mut entries: Vec<(&String, &String)> = payload.user_comments.iter().collect();
        entries.sort_by_key(|(id, _)| id.as_str());
        let rendered = entries
            .iter()
            .map(|(id, text)| format!("- {}: {}", id, text))
            .collect::<Vec<_>>()
            .join("\n");
        context.insert("user_comments".to_string(), rendered);
    }

    for (key, value) in &payload.extra {
        context.insert(key.clone(), serialize_value(value));
    }

    context
}
