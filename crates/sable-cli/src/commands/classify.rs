//! The `classify` command: intent classification with structured-output
//! recovery and keyword fallback.

use anyhow::Result;
use sable_core::extract::{classify_keywords, extract_with_keys};
use sable_interaction::InteractionManager;
use std::path::Path;

/// Keyword rules applied when the model output yields no JSON. Scanned
/// in order; first hit wins.
const FALLBACK_RULES: &[(&str, &[&str])] = &[
    ("bug_fix", &["fix", "bug", "broken", "crash", "error"]),
    ("feature", &["add", "implement", "create", "support", "new"]),
    ("refactor", &["refactor", "clean", "simplify", "restructure"]),
    ("question", &["how", "what", "why", "explain"]),
];

pub async fn run(manager: &InteractionManager, text: &str) -> Result<()> {
    let prompt = format!(
        "Classify the following request into one of: bug_fix, feature, \
         refactor, question, other. Respond with JSON only: \
         {{\"category\": \"...\", \"confidence\": 0.0}}\n\nRequest: {}",
        text
    );

    let outcome = manager.one_shot(&prompt, Path::new(".")).await;

    match extract_with_keys(&outcome.text, &["category"]) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => {
            let category = classify_keywords(text, FALLBACK_RULES).unwrap_or("other");
            println!("{}", serde_json::json!({ "category": category, "fallback": true }));
        }
    }
    Ok(())
}
