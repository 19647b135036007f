use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single stored answer, tagged by the question kind it was captured for.
///
/// Answers are persisted as JSON; the tag keeps free-text and single-choice
/// values distinguishable after the fact, which an untyped string cannot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Text(String),
    Single(String),
    Multiple(Vec<String>),
}

/// Per-response answer store, keyed by question id.
pub type AnswerMap = BTreeMap<String, Answer>;
