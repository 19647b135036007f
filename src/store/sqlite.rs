use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::de::DeserializeOwned;

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_json<T: DeserializeOwned + Default>(s: &str) -> T {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::error!("Invalid JSON in database: {}", e);
        T::default()
    })
}

fn parse_kind(s: &str) -> QuestionKind {
    QuestionKind::parse(s).unwrap_or_else(|| {
        tracing::error!("Unknown question kind in database: '{}'", s);
        QuestionKind::Text
    })
}

fn parse_role(s: &str) -> Role {
    Role::parse(s).unwrap_or_else(|| {
        tracing::error!("Unknown role in database: '{}'", s);
        Role::Viewer
    })
}

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, created_at, updated_at";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_active: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

const SURVEY_COLUMNS: &str = "id, creator_id, title, description, is_active, is_deleted, \
     deleted_at, starts_at, expires_at, max_responses, password_hash, whitelist_emails, \
     allow_review, send_confirmation_email, one_response_only, created_at, updated_at";

fn survey_from_row(row: &Row) -> rusqlite::Result<Survey> {
    Ok(Survey {
        id: row.get(0)?,
        creator_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        is_active: row.get(4)?,
        is_deleted: row.get(5)?,
        deleted_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
        starts_at: row.get::<_, Option<String>>(7)?.map(|s| parse_datetime(&s)),
        expires_at: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
        max_responses: row.get(9)?,
        password_hash: row.get(10)?,
        whitelist_emails: row.get(11)?,
        allow_review: row.get(12)?,
        send_confirmation_email: row.get(13)?,
        one_response_only: row.get(14)?,
        created_at: parse_datetime(&row.get::<_, String>(15)?),
        updated_at: parse_datetime(&row.get::<_, String>(16)?),
    })
}

const QUESTION_COLUMNS: &str =
    "id, survey_id, text, kind, ord, is_required, subtitle, media_url, options, created_at";

fn question_from_row(row: &Row) -> rusqlite::Result<Question> {
    Ok(Question {
        id: row.get(0)?,
        survey_id: row.get(1)?,
        text: row.get(2)?,
        kind: parse_kind(&row.get::<_, String>(3)?),
        order: row.get(4)?,
        is_required: row.get(5)?,
        subtitle: row.get(6)?,
        media_url: row.get(7)?,
        options: parse_json(&row.get::<_, String>(8)?),
        created_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

const RESPONSE_COLUMNS: &str = "id, survey_id, respondent_id, ip_address, answers, submitted_at";

fn response_from_row(row: &Row) -> rusqlite::Result<Response> {
    Ok(Response {
        id: row.get(0)?,
        survey_id: row.get(1)?,
        respondent_id: row.get(2)?,
        ip_address: row.get(3)?,
        answers: parse_json(&row.get::<_, String>(4)?),
        submitted_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, username, email, password_hash, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.username,
                user.email,
                user.password_hash,
                user.is_active,
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
            params![email],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET username = ?1, email = ?2, password_hash = ?3, is_active = ?4,
             updated_at = ?5 WHERE id = ?6",
            params![
                user.username,
                user.email,
                user.password_hash,
                user.is_active,
                format_datetime(&Utc::now()),
                user.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sessions (id, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id,
                serde_json::to_string(&session.data)?,
                format_datetime(&session.created_at),
                format_datetime(&session.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, data, created_at, updated_at FROM sessions WHERE id = ?1",
            params![id],
            |row| {
                Ok(Session {
                    id: row.get(0)?,
                    data: parse_json(&row.get::<_, String>(1)?),
                    created_at: parse_datetime(&row.get::<_, String>(2)?),
                    updated_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sessions (id, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![
                session.id,
                serde_json::to_string(&session.data)?,
                format_datetime(&session.created_at),
                format_datetime(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Survey operations

    fn create_survey(&self, survey: &Survey) -> Result<()> {
        self.conn().execute(
            "INSERT INTO surveys (id, creator_id, title, description, is_active, is_deleted,
             deleted_at, starts_at, expires_at, max_responses, password_hash, whitelist_emails,
             allow_review, send_confirmation_email, one_response_only, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                survey.id,
                survey.creator_id,
                survey.title,
                survey.description,
                survey.is_active,
                survey.is_deleted,
                survey.deleted_at.as_ref().map(format_datetime),
                survey.starts_at.as_ref().map(format_datetime),
                survey.expires_at.as_ref().map(format_datetime),
                survey.max_responses,
                survey.password_hash,
                survey.whitelist_emails,
                survey.allow_review,
                survey.send_confirmation_email,
                survey.one_response_only,
                format_datetime(&survey.created_at),
                format_datetime(&survey.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_survey(&self, id: &str) -> Result<Option<Survey>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE id = ?1"),
            params![id],
            survey_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_creator_surveys(&self, creator_id: &str) -> Result<Vec<(Survey, i64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SURVEY_COLUMNS},
             (SELECT COUNT(*) FROM responses r WHERE r.survey_id = surveys.id)
             FROM surveys WHERE creator_id = ?1 AND is_deleted = 0
             ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![creator_id], |row| {
            Ok((survey_from_row(row)?, row.get::<_, i64>(17)?))
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_survey(&self, survey: &Survey) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE surveys SET title = ?1, description = ?2, is_active = ?3, is_deleted = ?4,
             deleted_at = ?5, starts_at = ?6, expires_at = ?7, max_responses = ?8,
             password_hash = ?9, whitelist_emails = ?10, allow_review = ?11,
             send_confirmation_email = ?12, one_response_only = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                survey.title,
                survey.description,
                survey.is_active,
                survey.is_deleted,
                survey.deleted_at.as_ref().map(format_datetime),
                survey.starts_at.as_ref().map(format_datetime),
                survey.expires_at.as_ref().map(format_datetime),
                survey.max_responses,
                survey.password_hash,
                survey.whitelist_emails,
                survey.allow_review,
                survey.send_confirmation_email,
                survey.one_response_only,
                format_datetime(&Utc::now()),
                survey.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Question operations

    fn create_question(&self, question: &Question) -> Result<()> {
        self.conn().execute(
            "INSERT INTO questions (id, survey_id, text, kind, ord, is_required, subtitle,
             media_url, options, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                question.id,
                question.survey_id,
                question.text,
                question.kind.as_str(),
                question.order,
                question.is_required,
                question.subtitle,
                question.media_url,
                serde_json::to_string(&question.options)?,
                format_datetime(&question.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_question(&self, id: &str) -> Result<Option<Question>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1"),
            params![id],
            question_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_questions(&self, survey_id: &str) -> Result<Vec<Question>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE survey_id = ?1
             ORDER BY ord, created_at"
        ))?;

        let rows = stmt.query_map(params![survey_id], question_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_question(&self, question: &Question) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE questions SET text = ?1, kind = ?2, ord = ?3, is_required = ?4,
             subtitle = ?5, media_url = ?6, options = ?7 WHERE id = ?8",
            params![
                question.text,
                question.kind.as_str(),
                question.order,
                question.is_required,
                question.subtitle,
                question.media_url,
                serde_json::to_string(&question.options)?,
                question.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_question(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM questions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn next_question_order(&self, survey_id: &str) -> Result<i64> {
        let conn = self.conn();
        conn.query_row(
            "SELECT COALESCE(MAX(ord), 0) + 1 FROM questions WHERE survey_id = ?1",
            params![survey_id],
            |row| row.get(0),
        )
        .map_err(Error::from)
    }

    fn reorder_questions(&self, survey_id: &str, ordered_ids: &[String]) -> Result<()> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("UPDATE questions SET ord = ?1 WHERE id = ?2 AND survey_id = ?3")?;
        for (position, id) in ordered_ids.iter().enumerate() {
            stmt.execute(params![(position + 1) as i64, id, survey_id])?;
        }
        Ok(())
    }

    // Collaborator operations

    fn upsert_collaborator(&self, collab: &Collaborator) -> Result<()> {
        self.conn().execute(
            "INSERT INTO collaborators (survey_id, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(survey_id, user_id) DO UPDATE SET role = excluded.role",
            params![
                collab.survey_id,
                collab.user_id,
                collab.role.as_str(),
                format_datetime(&collab.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_collaborator(&self, survey_id: &str, user_id: &str) -> Result<Option<Collaborator>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT survey_id, user_id, role, created_at FROM collaborators
             WHERE survey_id = ?1 AND user_id = ?2",
            params![survey_id, user_id],
            |row| {
                Ok(Collaborator {
                    survey_id: row.get(0)?,
                    user_id: row.get(1)?,
                    role: parse_role(&row.get::<_, String>(2)?),
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_collaborators(&self, survey_id: &str) -> Result<Vec<(Collaborator, User)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT c.survey_id, c.user_id, c.role, c.created_at,
             u.id, u.username, u.email, u.password_hash, u.is_active, u.created_at, u.updated_at
             FROM collaborators c JOIN users u ON u.id = c.user_id
             WHERE c.survey_id = ?1 ORDER BY c.role, u.username",
        )?;

        let rows = stmt.query_map(params![survey_id], |row| {
            let collab = Collaborator {
                survey_id: row.get(0)?,
                user_id: row.get(1)?,
                role: parse_role(&row.get::<_, String>(2)?),
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            };
            let user = User {
                id: row.get(4)?,
                username: row.get(5)?,
                email: row.get(6)?,
                password_hash: row.get(7)?,
                is_active: row.get(8)?,
                created_at: parse_datetime(&row.get::<_, String>(9)?),
                updated_at: parse_datetime(&row.get::<_, String>(10)?),
            };
            Ok((collab, user))
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_collaborator(&self, survey_id: &str, user_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM collaborators WHERE survey_id = ?1 AND user_id = ?2",
            params![survey_id, user_id],
        )?;
        Ok(rows > 0)
    }

    fn count_owner_rows(&self, survey_id: &str) -> Result<i64> {
        let conn = self.conn();
        conn.query_row(
            "SELECT COUNT(*) FROM collaborators WHERE survey_id = ?1 AND role = 'owner'",
            params![survey_id],
            |row| row.get(0),
        )
        .map_err(Error::from)
    }

    fn backfill_creator_owner_rows(&self) -> Result<usize> {
        let rows = self.conn().execute(
            "INSERT INTO collaborators (survey_id, user_id, role, created_at)
             SELECT s.id, s.creator_id, 'owner', datetime('now') FROM surveys s
             WHERE NOT EXISTS (SELECT 1 FROM collaborators c
                               WHERE c.survey_id = s.id AND c.user_id = s.creator_id)",
            [],
        )?;
        Ok(rows)
    }

    // Response operations

    fn create_response(&self, response: &Response) -> Result<()> {
        self.conn().execute(
            "INSERT INTO responses (id, survey_id, respondent_id, ip_address, answers, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                response.id,
                response.survey_id,
                response.respondent_id,
                response.ip_address,
                serde_json::to_string(&response.answers)?,
                format_datetime(&response.submitted_at),
            ],
        )?;
        Ok(())
    }

    fn get_response(&self, id: &str) -> Result<Option<Response>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {RESPONSE_COLUMNS} FROM responses WHERE id = ?1"),
            params![id],
            response_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_responses(&self, survey_id: &str) -> Result<Vec<Response>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESPONSE_COLUMNS} FROM responses WHERE survey_id = ?1 ORDER BY submitted_at"
        ))?;

        let rows = stmt.query_map(params![survey_id], response_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_responses(&self, survey_id: &str) -> Result<i64> {
        let conn = self.conn();
        conn.query_row(
            "SELECT COUNT(*) FROM responses WHERE survey_id = ?1",
            params![survey_id],
            |row| row.get(0),
        )
        .map_err(Error::from)
    }

    fn find_user_response(&self, survey_id: &str, user_id: &str) -> Result<Option<Response>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {RESPONSE_COLUMNS} FROM responses
                 WHERE survey_id = ?1 AND respondent_id = ?2
                 ORDER BY submitted_at LIMIT 1"
            ),
            params![survey_id, user_id],
            response_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_anonymous_response_by_ip(
        &self,
        survey_id: &str,
        ip: &str,
    ) -> Result<Option<Response>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {RESPONSE_COLUMNS} FROM responses
                 WHERE survey_id = ?1 AND respondent_id IS NULL AND ip_address = ?2
                 ORDER BY submitted_at LIMIT 1"
            ),
            params![survey_id, ip],
            response_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
