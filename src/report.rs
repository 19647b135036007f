//! Read-only aggregation over a survey's accumulated responses: per-question
//! summaries for the results page and CSV rendering for export.

use serde::Serialize;

use crate::types::{Answer, Question, QuestionKind, Response};

/// How many free-text answers the results page previews per question.
const TEXT_PREVIEW_LIMIT: usize = 10;

/// Delimiter between multi-choice values in a CSV cell.
const MULTI_VALUE_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Serialize)]
pub struct OptionCount {
    pub option: String,
    pub index: usize,
    pub count: usize,
    /// Share of all responses, rounded to one decimal. 0 when there are no
    /// responses at all.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QuestionSummary {
    Text {
        answers: Vec<String>,
        total: usize,
    },
    Choices {
        choices: Vec<OptionCount>,
        total: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionStats {
    pub question_id: String,
    pub text: String,
    pub kind: QuestionKind,
    #[serde(flatten)]
    pub summary: QuestionSummary,
}

fn round_percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = count as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

/// Tallies answers per question. Display-only questions are excluded.
/// Recomputed from the stored responses on every call; nothing is cached.
#[must_use]
pub fn compute_stats(questions: &[Question], responses: &[Response]) -> Vec<QuestionStats> {
    let total_responses = responses.len();
    let mut stats = Vec::new();

    for question in questions {
        let summary = match question.kind {
            QuestionKind::Text => {
                let all: Vec<&str> = responses
                    .iter()
                    .filter_map(|r| match r.answers.get(&question.id) {
                        Some(Answer::Text(text)) if !text.trim().is_empty() => {
                            Some(text.as_str())
                        }
                        _ => None,
                    })
                    .collect();
                QuestionSummary::Text {
                    total: all.len(),
                    answers: all
                        .iter()
                        .take(TEXT_PREVIEW_LIMIT)
                        .map(|s| s.to_string())
                        .collect(),
                }
            }
            QuestionKind::Single | QuestionKind::Multiple => {
                let choices = question
                    .options
                    .iter()
                    .enumerate()
                    .map(|(index, option)| {
                        let count = responses
                            .iter()
                            .filter(|r| match r.answers.get(&question.id) {
                                Some(Answer::Single(value)) => value == option,
                                Some(Answer::Multiple(values)) => values.contains(option),
                                _ => false,
                            })
                            .count();
                        OptionCount {
                            option: option.clone(),
                            index,
                            count,
                            percentage: round_percentage(count, total_responses),
                        }
                    })
                    .collect();
                QuestionSummary::Choices {
                    choices,
                    total: total_responses,
                }
            }
            _ => continue,
        };

        stats.push(QuestionStats {
            question_id: question.id.clone(),
            text: question.text.clone(),
            kind: question.kind,
            summary,
        });
    }

    stats
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn answer_cell(answer: Option<&Answer>) -> String {
    match answer {
        Some(Answer::Text(text)) | Some(Answer::Single(text)) => text.clone(),
        Some(Answer::Multiple(values)) => values.join(MULTI_VALUE_SEPARATOR),
        None => String::new(),
    }
}

/// Renders a survey's responses as CSV: a timestamp column plus one column
/// per answerable question in display order, one row per response in
/// submission order.
#[must_use]
pub fn render_csv(questions: &[Question], responses: &[Response]) -> String {
    let answerable: Vec<&Question> = questions.iter().filter(|q| q.kind.is_answerable()).collect();

    let mut out = String::new();
    let header: Vec<String> = std::iter::once("Submitted at".to_string())
        .chain(answerable.iter().map(|q| csv_escape(&q.text)))
        .collect();
    out.push_str(&header.join(","));
    out.push_str("\r\n");

    for response in responses {
        let mut row = vec![response.submitted_at.format("%Y-%m-%d %H:%M:%S").to_string()];
        for question in &answerable {
            row.push(csv_escape(&answer_cell(response.answers.get(&question.id))));
        }
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnswerMap;
    use chrono::{TimeZone, Utc};

    fn question(id: &str, kind: QuestionKind, options: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            survey_id: "s1".to_string(),
            text: format!("Q {id}"),
            kind,
            order: 0,
            is_required: false,
            subtitle: String::new(),
            media_url: String::new(),
            options: options.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    fn response(answers: AnswerMap) -> Response {
        Response {
            id: uuid::Uuid::new_v4().to_string(),
            survey_id: "s1".to_string(),
            respondent_id: None,
            ip_address: None,
            answers,
            submitted_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_single_choice_percentages() {
        let questions = vec![question("q1", QuestionKind::Single, &["A", "B", "C"])];
        let responses: Vec<Response> = ["A", "A", "B"]
            .iter()
            .map(|choice| {
                let mut answers = AnswerMap::new();
                answers.insert("q1".to_string(), Answer::Single(choice.to_string()));
                response(answers)
            })
            .collect();

        let stats = compute_stats(&questions, &responses);
        let QuestionSummary::Choices { choices, total } = &stats[0].summary else {
            panic!("expected choice summary");
        };
        assert_eq!(*total, 3);
        assert_eq!(choices[0].count, 2);
        assert_eq!(choices[0].percentage, 66.7);
        assert_eq!(choices[1].percentage, 33.3);
        assert_eq!(choices[2].count, 0);
        assert_eq!(choices[2].percentage, 0.0);
    }

    #[test]
    fn test_zero_responses_yield_zero_percent() {
        let questions = vec![question("q1", QuestionKind::Multiple, &["A", "B"])];
        let stats = compute_stats(&questions, &[]);
        let QuestionSummary::Choices { choices, total } = &stats[0].summary else {
            panic!("expected choice summary");
        };
        assert_eq!(*total, 0);
        assert!(choices.iter().all(|c| c.percentage == 0.0 && c.count == 0));
    }

    #[test]
    fn test_multiple_choice_counts_membership() {
        let questions = vec![question("q1", QuestionKind::Multiple, &["A", "B", "C"])];
        let mut answers = AnswerMap::new();
        answers.insert(
            "q1".to_string(),
            Answer::Multiple(vec!["A".to_string(), "C".to_string()]),
        );
        let responses = vec![response(answers)];

        let stats = compute_stats(&questions, &responses);
        let QuestionSummary::Choices { choices, .. } = &stats[0].summary else {
            panic!("expected choice summary");
        };
        assert_eq!(choices[0].count, 1);
        assert_eq!(choices[1].count, 0);
        assert_eq!(choices[2].count, 1);
    }

    #[test]
    fn test_text_preview_is_bounded() {
        let questions = vec![question("q1", QuestionKind::Text, &[])];
        let responses: Vec<Response> = (0..15)
            .map(|i| {
                let mut answers = AnswerMap::new();
                answers.insert("q1".to_string(), Answer::Text(format!("answer {i}")));
                response(answers)
            })
            .collect();

        let stats = compute_stats(&questions, &responses);
        let QuestionSummary::Text { answers, total } = &stats[0].summary else {
            panic!("expected text summary");
        };
        assert_eq!(*total, 15);
        assert_eq!(answers.len(), 10);
    }

    #[test]
    fn test_display_only_questions_excluded() {
        let questions = vec![
            question("q1", QuestionKind::Section, &[]),
            question("q2", QuestionKind::Image, &[]),
            question("q3", QuestionKind::Text, &[]),
        ];
        let stats = compute_stats(&questions, &[]);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].question_id, "q3");
    }

    #[test]
    fn test_csv_shape_and_escaping() {
        let questions = vec![
            question("q1", QuestionKind::Text, &[]),
            question("q2", QuestionKind::Section, &[]),
            question("q3", QuestionKind::Multiple, &["A, plus", "B"]),
        ];
        let mut answers = AnswerMap::new();
        answers.insert("q1".to_string(), Answer::Text("hello, \"world\"".to_string()));
        answers.insert(
            "q3".to_string(),
            Answer::Multiple(vec!["A, plus".to_string(), "B".to_string()]),
        );
        let responses = vec![response(answers)];

        let csv = render_csv(&questions, &responses);
        let lines: Vec<&str> = csv.lines().collect();
        // Section header is not a column
        assert_eq!(lines[0], "Submitted at,Q q1,Q q3");
        assert!(lines[1].starts_with("2025-03-01 12:00:00,"));
        assert!(lines[1].contains("\"hello, \"\"world\"\"\""));
        assert!(lines[1].contains("\"A, plus | B\""));
    }
}
