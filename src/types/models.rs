use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AnswerMap, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-browser state carried across requests via an opaque session id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    /// Logged-in account, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Surveys this session has unlocked with the survey password.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub password_grants: BTreeSet<String>,
    /// Surveys this session has completed, mapped to the created response id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub completed: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub data: SessionData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn fresh() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            data: SessionData::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    pub creator_id: String,
    pub title: String,
    pub description: String,
    /// Published flag; drafts and unpublished surveys do not accept responses.
    pub is_active: bool,
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_responses: Option<i64>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    /// Newline-delimited emails allowed to respond; empty disables the gate.
    pub whitelist_emails: String,
    pub allow_review: bool,
    pub send_confirmation_email: bool,
    pub one_response_only: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Survey {
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    /// Whitelist entries, lowercased and trimmed. Empty set when disabled.
    #[must_use]
    pub fn whitelist(&self) -> BTreeSet<String> {
        self.whitelist_emails
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect()
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires < now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    Single,
    Multiple,
    Section,
    Description,
    Image,
    Video,
}

impl QuestionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            QuestionKind::Text => "text",
            QuestionKind::Single => "single",
            QuestionKind::Multiple => "multiple",
            QuestionKind::Section => "section",
            QuestionKind::Description => "description",
            QuestionKind::Image => "image",
            QuestionKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<QuestionKind> {
        match s {
            "text" => Some(QuestionKind::Text),
            "single" => Some(QuestionKind::Single),
            "multiple" => Some(QuestionKind::Multiple),
            "section" => Some(QuestionKind::Section),
            "description" => Some(QuestionKind::Description),
            "image" => Some(QuestionKind::Image),
            "video" => Some(QuestionKind::Video),
            _ => None,
        }
    }

    /// Whether a respondent can answer this question at all. Section
    /// headers, descriptions, and media blocks are display-only.
    #[must_use]
    pub const fn is_answerable(self) -> bool {
        matches!(
            self,
            QuestionKind::Text | QuestionKind::Single | QuestionKind::Multiple
        )
    }

    #[must_use]
    pub const fn has_options(self) -> bool {
        matches!(self, QuestionKind::Single | QuestionKind::Multiple)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub survey_id: String,
    pub text: String,
    pub kind: QuestionKind,
    pub order: i64,
    pub is_required: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtitle: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub media_url: String,
    /// Ordered option strings for choice kinds; empty otherwise.
    pub options: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub survey_id: String,
    pub user_id: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub survey_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respondent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub answers: AnswerMap,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey() -> Survey {
        let now = Utc::now();
        Survey {
            id: "s1".into(),
            creator_id: "u1".into(),
            title: "Test".into(),
            description: String::new(),
            is_active: true,
            is_deleted: false,
            deleted_at: None,
            starts_at: None,
            expires_at: None,
            max_responses: None,
            password_hash: None,
            whitelist_emails: String::new(),
            allow_review: true,
            send_confirmation_email: false,
            one_response_only: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_whitelist_normalizes_entries() {
        let mut s = survey();
        s.whitelist_emails = "  Alice@Example.com \n\nbob@example.com\n".into();
        let whitelist = s.whitelist();
        assert_eq!(whitelist.len(), 2);
        assert!(whitelist.contains("alice@example.com"));
        assert!(whitelist.contains("bob@example.com"));
    }

    #[test]
    fn test_empty_whitelist_is_disabled() {
        assert!(survey().whitelist().is_empty());
    }

    #[test]
    fn test_expiry_window() {
        let mut s = survey();
        let now = Utc::now();
        assert!(!s.is_expired(now));
        s.expires_at = Some(now - chrono::Duration::minutes(1));
        assert!(s.is_expired(now));
    }
}
