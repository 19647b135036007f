pub const SCHEMA: &str = r#"
-- Accounts; survey passwords are separate and live on the survey row
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,       -- argon2id hash with embedded salt
    is_active INTEGER NOT NULL DEFAULT 0,  -- activated via emailed token
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Per-browser sessions; data is a JSON blob (login binding, password
-- grants, completed-survey markers)
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL DEFAULT '{}',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Surveys are soft-deleted only; rows are never removed
CREATE TABLE IF NOT EXISTS surveys (
    id TEXT PRIMARY KEY,
    creator_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',

    -- Publication lifecycle
    is_active INTEGER NOT NULL DEFAULT 0,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    deleted_at TEXT,

    -- Collection window and limits
    starts_at TEXT,            -- NULL = open immediately
    expires_at TEXT,           -- NULL = never expires
    max_responses INTEGER,     -- NULL = unlimited

    -- Access gates
    password_hash TEXT,        -- NULL = no password gate
    whitelist_emails TEXT NOT NULL DEFAULT '',  -- newline-delimited, '' = disabled

    -- Response behavior
    allow_review INTEGER NOT NULL DEFAULT 1,
    send_confirmation_email INTEGER NOT NULL DEFAULT 0,
    one_response_only INTEGER NOT NULL DEFAULT 1,

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY,
    survey_id TEXT NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'single',
    ord INTEGER NOT NULL DEFAULT 0,
    is_required INTEGER NOT NULL DEFAULT 1,
    subtitle TEXT NOT NULL DEFAULT '',
    media_url TEXT NOT NULL DEFAULT '',
    options TEXT NOT NULL DEFAULT '[]',  -- JSON array of option strings
    created_at TEXT DEFAULT (datetime('now'))
);

-- Roles granted on a survey; the creator is an implicit owner even
-- without a row here
CREATE TABLE IF NOT EXISTS collaborators (
    survey_id TEXT NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role TEXT NOT NULL DEFAULT 'viewer',
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (survey_id, user_id)
);

CREATE TABLE IF NOT EXISTS responses (
    id TEXT PRIMARY KEY,
    survey_id TEXT NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
    respondent_id TEXT REFERENCES users(id) ON DELETE SET NULL,  -- NULL = anonymous
    ip_address TEXT,
    answers TEXT NOT NULL DEFAULT '{}',  -- JSON map: question id -> tagged answer
    submitted_at TEXT DEFAULT (datetime('now'))
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_surveys_creator ON surveys(creator_id);
CREATE INDEX IF NOT EXISTS idx_questions_survey ON questions(survey_id, ord);
CREATE INDEX IF NOT EXISTS idx_collaborators_user ON collaborators(user_id);
CREATE INDEX IF NOT EXISTS idx_responses_survey ON responses(survey_id);
CREATE INDEX IF NOT EXISTS idx_responses_respondent ON responses(survey_id, respondent_id);
CREATE INDEX IF NOT EXISTS idx_responses_ip ON responses(survey_id, ip_address);
"#;
