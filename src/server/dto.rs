use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::form::{FieldDescriptor, SubmittedAnswer};
use crate::report::QuestionStats;
use crate::types::{Question, Role, User};

// Accounts

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

// Surveys

#[derive(Debug, Deserialize)]
pub struct CreateSurveyRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_responses: Option<i64>,
    /// Hashed before persistence; the raw value is never stored.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub whitelist_emails: Option<String>,
    #[serde(default = "default_true")]
    pub allow_review: bool,
    #[serde(default)]
    pub send_confirmation_email: bool,
    #[serde(default = "default_true")]
    pub one_response_only: bool,
}

fn default_true() -> bool {
    true
}

/// Distinguishes "field absent" (outer None, keep current value) from
/// "field null" (inner None, clear the value) on PATCH bodies.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSurveyRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub starts_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_responses: Option<Option<i64>>,
    /// Omitted = keep the current password; empty string = remove it;
    /// anything else is re-hashed.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub whitelist_emails: Option<String>,
    #[serde(default)]
    pub allow_review: Option<bool>,
    #[serde(default)]
    pub send_confirmation_email: Option<bool>,
    #[serde(default)]
    pub one_response_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SurveyListItem {
    pub id: String,
    pub title: String,
    pub is_active: bool,
    pub response_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SurveyDetail {
    pub id: String,
    pub title: String,
    pub description: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_responses: Option<i64>,
    pub has_password: bool,
    pub allow_review: bool,
    pub send_confirmation_email: bool,
    pub one_response_only: bool,
    pub is_expired: bool,
    pub response_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_slots: Option<i64>,
    pub questions: Vec<Question>,
    pub can_edit: bool,
    /// Creator-only fields, absent for everyone else.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelist_emails: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ShareLinkResponse {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolvedShareResponse {
    pub survey_id: String,
}

// Questions

#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub text: String,
    pub kind: crate::types::QuestionKind,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default = "default_true")]
    pub is_required: bool,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateQuestionRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub kind: Option<crate::types::QuestionKind>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub is_required: Option<bool>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderQuestionsRequest {
    pub question_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddOptionRequest {
    pub text: String,
}

// Collaborators

#[derive(Debug, Deserialize)]
pub struct AddCollaboratorRequest {
    /// Username or email of the user to add.
    pub user: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCollaboratorRequest {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct CollaboratorResponse {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// Response collection

#[derive(Debug, Deserialize)]
pub struct SurveyPasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub captcha_token: Option<String>,
    #[serde(default)]
    pub answers: BTreeMap<String, SubmittedAnswer>,
}

/// Where the client should go after a submission (or after hitting the
/// duplicate-submission gate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    Review,
    ThankYou,
    Survey,
    Results,
}

#[derive(Debug, Serialize)]
pub struct SubmissionReceipt {
    pub response_id: String,
    pub next: NextStep,
}

/// Outcome of evaluating the gate chain for a caller.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TakeView {
    Open {
        survey_id: String,
        title: String,
        #[serde(skip_serializing_if = "String::is_empty")]
        description: String,
        fields: Vec<FieldDescriptor>,
        /// Anonymous submitters must present a CAPTCHA token.
        captcha_required: bool,
    },
    Closed,
    NotYetOpen {
        starts_at: DateTime<Utc>,
    },
    LoginRequired,
    NotWhitelisted,
    CapacityReached,
    PasswordRequired,
    Expired,
    AlreadySubmitted {
        next: NextStep,
        #[serde(skip_serializing_if = "Option::is_none")]
        response_id: Option<String>,
    },
}

// Review & results

#[derive(Debug, Serialize)]
pub struct ReviewItem {
    pub question_id: String,
    pub text: String,
    pub kind: crate::types::QuestionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<crate::types::Answer>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub response_id: String,
    pub survey_id: String,
    pub survey_title: String,
    pub submitted_at: DateTime<Utc>,
    pub items: Vec<ReviewItem>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub survey_id: String,
    pub total_responses: usize,
    pub questions: Vec<QuestionStats>,
}
