//! Builds a typed field list from a survey's questions and validates
//! submitted payloads against it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Answer, AnswerMap, Question, QuestionKind};

/// What a respondent-facing form renders for one question.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDescriptor {
    pub question_id: String,
    pub kind: QuestionKind,
    pub label: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtitle: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub media_url: String,
}

/// A submitted value before resolution: choice answers arrive as indices
/// into the question's option list, free text as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SubmittedAnswer {
    Index(usize),
    Indices(Vec<usize>),
    Text(String),
}

impl SubmittedAnswer {
    /// Whether this value counts as answered for required-field checks.
    /// Presence is checked here; whether the value resolves is a separate
    /// concern (out-of-range indices are dropped at resolution time).
    fn is_present(&self) -> bool {
        match self {
            SubmittedAnswer::Index(_) => true,
            SubmittedAnswer::Indices(indices) => !indices.is_empty(),
            SubmittedAnswer::Text(text) => !text.trim().is_empty(),
        }
    }
}

pub fn build_form(questions: &[Question]) -> Vec<FieldDescriptor> {
    questions
        .iter()
        .map(|q| FieldDescriptor {
            question_id: q.id.clone(),
            kind: q.kind,
            label: q.text.clone(),
            subtitle: q.subtitle.clone(),
            required: q.is_required && q.kind.is_answerable(),
            options: q.options.clone(),
            media_url: q.media_url.clone(),
        })
        .collect()
}

/// Checks required questions and resolves submitted values into an answer
/// map. All violations are collected and returned together rather than
/// short-circuiting on the first.
///
/// Choice answers resolve by position against the question's option list at
/// submission time; indices that fall outside the current list are silently
/// omitted (a concurrent edit can shrink the list under the respondent).
pub fn resolve_submission(
    questions: &[Question],
    submitted: &BTreeMap<String, SubmittedAnswer>,
) -> Result<AnswerMap, Vec<String>> {
    let mut errors = Vec::new();

    for question in questions {
        if !question.kind.is_answerable() || !question.is_required {
            continue;
        }
        let answered = submitted
            .get(&question.id)
            .is_some_and(SubmittedAnswer::is_present);
        if !answered {
            errors.push(format!(
                "Please answer the required question: {}",
                question.text
            ));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut answers = AnswerMap::new();
    for question in questions {
        let Some(value) = submitted.get(&question.id) else {
            continue;
        };

        match (question.kind, value) {
            (QuestionKind::Text, SubmittedAnswer::Text(text)) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    answers.insert(question.id.clone(), Answer::Text(trimmed.to_string()));
                }
            }
            (QuestionKind::Single, value) => {
                let index = match value {
                    SubmittedAnswer::Index(i) => Some(*i),
                    SubmittedAnswer::Text(s) => s.trim().parse().ok(),
                    SubmittedAnswer::Indices(_) => None,
                };
                if let Some(option) = index.and_then(|i| question.options.get(i)) {
                    answers.insert(question.id.clone(), Answer::Single(option.clone()));
                }
            }
            (QuestionKind::Multiple, value) => {
                let indices: Vec<usize> = match value {
                    SubmittedAnswer::Indices(indices) => indices.clone(),
                    SubmittedAnswer::Index(i) => vec![*i],
                    SubmittedAnswer::Text(_) => Vec::new(),
                };
                let selected: Vec<String> = indices
                    .iter()
                    .filter_map(|&i| question.options.get(i).cloned())
                    .collect();
                if !selected.is_empty() {
                    answers.insert(question.id.clone(), Answer::Multiple(selected));
                }
            }
            // Mismatched shapes and display-only kinds contribute nothing
            _ => {}
        }
    }

    Ok(answers)
}
