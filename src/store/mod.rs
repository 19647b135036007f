mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn update_user(&self, user: &User) -> Result<()>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session(&self, id: &str) -> Result<Option<Session>>;
    fn save_session(&self, session: &Session) -> Result<()>;
    fn delete_session(&self, id: &str) -> Result<bool>;

    // Survey operations
    fn create_survey(&self, survey: &Survey) -> Result<()>;
    /// Fetches a survey regardless of soft-delete state; callers filter.
    fn get_survey(&self, id: &str) -> Result<Option<Survey>>;
    /// Surveys created by a user (soft-deleted excluded), newest first,
    /// paired with their response counts.
    fn list_creator_surveys(&self, creator_id: &str) -> Result<Vec<(Survey, i64)>>;
    fn update_survey(&self, survey: &Survey) -> Result<()>;

    // Question operations
    fn create_question(&self, question: &Question) -> Result<()>;
    fn get_question(&self, id: &str) -> Result<Option<Question>>;
    fn list_questions(&self, survey_id: &str) -> Result<Vec<Question>>;
    fn update_question(&self, question: &Question) -> Result<()>;
    fn delete_question(&self, id: &str) -> Result<bool>;
    fn next_question_order(&self, survey_id: &str) -> Result<i64>;
    fn reorder_questions(&self, survey_id: &str, ordered_ids: &[String]) -> Result<()>;

    // Collaborator operations
    fn upsert_collaborator(&self, collab: &Collaborator) -> Result<()>;
    fn get_collaborator(&self, survey_id: &str, user_id: &str) -> Result<Option<Collaborator>>;
    fn list_collaborators(&self, survey_id: &str) -> Result<Vec<(Collaborator, User)>>;
    fn delete_collaborator(&self, survey_id: &str, user_id: &str) -> Result<bool>;
    fn count_owner_rows(&self, survey_id: &str) -> Result<i64>;
    /// Materializes owner rows for creators that predate the collaborator
    /// table. Returns how many rows were inserted.
    fn backfill_creator_owner_rows(&self) -> Result<usize>;

    // Response operations
    fn create_response(&self, response: &Response) -> Result<()>;
    fn get_response(&self, id: &str) -> Result<Option<Response>>;
    /// Responses for a survey, oldest first.
    fn list_responses(&self, survey_id: &str) -> Result<Vec<Response>>;
    fn count_responses(&self, survey_id: &str) -> Result<i64>;
    fn find_user_response(&self, survey_id: &str, user_id: &str) -> Result<Option<Response>>;
    fn find_anonymous_response_by_ip(&self, survey_id: &str, ip: &str)
    -> Result<Option<Response>>;

    fn close(&self) -> Result<()>;
}
