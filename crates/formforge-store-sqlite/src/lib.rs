use std::path::Path;

use anyhow::{anyhow, Context, Result};
use formforge_core::{
    Form, NormalizedSubmission, Submission, SubmissionAnswer, SubmissionFile, User, UserRole,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const LATEST_SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

// Forms are stored as JSON documents; status and created_at are mirrored into
// columns for filtering without deserializing every row. Submissions are
// relational so file payloads can be fetched independently of their answers.
// There is deliberately no uniqueness constraint on (form_id, user_id): forms
// may allow multiple submissions per user.
const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS forms (
  form_id TEXT PRIMARY KEY,
  status TEXT NOT NULL,
  created_at TEXT NOT NULL,
  form_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  username TEXT NOT NULL,
  email TEXT NOT NULL UNIQUE,
  password_hash TEXT NOT NULL,
  role TEXT NOT NULL CHECK (role IN ('learner','admin')),
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS submissions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  form_id TEXT NOT NULL,
  user_id INTEGER NOT NULL,
  submitted_at TEXT NOT NULL,
  FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS submission_answers (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  submission_id INTEGER NOT NULL,
  question_id TEXT NOT NULL,
  answer_type TEXT NOT NULL,
  answer_text TEXT NOT NULL,
  FOREIGN KEY (submission_id) REFERENCES submissions(id)
);

CREATE TABLE IF NOT EXISTS submission_files (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  submission_id INTEGER NOT NULL,
  question_id TEXT NOT NULL,
  file_name TEXT NOT NULL,
  file_data TEXT NOT NULL,
  mime_type TEXT NOT NULL,
  uploaded_at TEXT NOT NULL,
  FOREIGN KEY (submission_id) REFERENCES submissions(id)
);

CREATE INDEX IF NOT EXISTS idx_forms_status ON forms(status);
CREATE INDEX IF NOT EXISTS idx_forms_created_at ON forms(created_at);
CREATE INDEX IF NOT EXISTS idx_submissions_form ON submissions(form_id);
CREATE INDEX IF NOT EXISTS idx_submissions_user ON submissions(user_id);
CREATE INDEX IF NOT EXISTS idx_submission_answers_submission ON submission_answers(submission_id);
CREATE INDEX IF NOT EXISTS idx_submission_files_submission ON submission_files(submission_id);
";

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
}

impl SqliteStore {
    /// Open a SQLite-backed form store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let current_version = current_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
        })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when migration bootstrapping or any migration step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;

        if version == 0 {
            let tx = self.conn.transaction().context("failed to start migration transaction")?;
            tx.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
            tx.execute(
                "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
                params![1_i64, now_rfc3339()?],
            )
            .context("failed to record migration v1")?;
            tx.commit().context("failed to commit migration v1")?;
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    /// Persist a new form document.
    ///
    /// # Errors
    /// Returns an error when serialization or the insert fails.
    pub fn create_form(&self, form: &Form) -> Result<()> {
        let form_json =
            serde_json::to_string(form).context("failed to serialize form document")?;
        self.conn
            .execute(
                "INSERT INTO forms(form_id, status, created_at, form_json) VALUES (?1, ?2, ?3, ?4)",
                params![form.id, form.status, rfc3339(form.created_at)?, form_json],
            )
            .with_context(|| format!("failed to insert form {}", form.id))?;
        Ok(())
    }

    /// Fetch one form document by id.
    ///
    /// # Errors
    /// Returns an error when the query or deserialization fails.
    pub fn get_form_by_id(&self, form_id: &str) -> Result<Option<Form>> {
        let form_json: Option<String> = self
            .conn
            .query_row("SELECT form_json FROM forms WHERE form_id = ?1", params![form_id], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("failed to query form {form_id}"))?;

        match form_json {
            Some(form_json) => {
                let form = serde_json::from_str(&form_json)
                    .with_context(|| format!("failed to deserialize form {form_id}"))?;
                Ok(Some(form))
            }
            None => Ok(None),
        }
    }

    /// List every form document, newest first.
    ///
    /// # Errors
    /// Returns an error when the query or deserialization fails.
    pub fn get_all_forms(&self) -> Result<Vec<Form>> {
        let mut stmt = self
            .conn
            .prepare("SELECT form_json FROM forms ORDER BY created_at DESC, form_id DESC")
            .context("failed to prepare form listing")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("failed to list forms")?;

        let mut forms = Vec::new();
        for row in rows {
            let form_json = row.context("failed to read form row")?;
            forms.push(
                serde_json::from_str(&form_json).context("failed to deserialize form document")?,
            );
        }
        Ok(forms)
    }

    /// Replace a form document in full, keeping the status column in sync.
    ///
    /// # Errors
    /// Returns an error when the form does not exist or the update fails.
    pub fn update_form(&self, form: &Form) -> Result<()> {
        let form_json =
            serde_json::to_string(form).context("failed to serialize form document")?;
        let updated = self
            .conn
            .execute(
                "UPDATE forms SET status = ?2, form_json = ?3 WHERE form_id = ?1",
                params![form.id, form.status, form_json],
            )
            .with_context(|| format!("failed to update form {}", form.id))?;
        if updated == 0 {
            return Err(anyhow!("form {} does not exist", form.id));
        }
        Ok(())
    }

    /// Delete one form document; returns whether a row was removed.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn delete_form(&self, form_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM forms WHERE form_id = ?1", params![form_id])
            .with_context(|| format!("failed to delete form {form_id}"))?;
        Ok(deleted > 0)
    }

    /// Create one user row and return it with its assigned id.
    ///
    /// # Errors
    /// Returns an error when the insert fails, including on a duplicate email.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
        created_at: OffsetDateTime,
    ) -> Result<User> {
        self.conn
            .execute(
                "INSERT INTO users(username, email, password_hash, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![username, email, password_hash, role.as_str(), rfc3339(created_at)?],
            )
            .with_context(|| format!("failed to insert user {email}"))?;

        Ok(User {
            id: self.conn.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at,
        })
    }

    /// # Errors
    /// Returns an error when the query fails or the row is malformed.
    pub fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, username, email, password_hash, role, created_at
                 FROM users WHERE id = ?1",
                params![user_id],
                user_row,
            )
            .optional()
            .with_context(|| format!("failed to query user {user_id}"))?
            .map(decode_user)
            .transpose()
    }

    /// # Errors
    /// Returns an error when the query fails or the row is malformed.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, username, email, password_hash, role, created_at
                 FROM users WHERE email = ?1",
                params![email],
                user_row,
            )
            .optional()
            .with_context(|| format!("failed to query user {email}"))?
            .map(decode_user)
            .transpose()
    }

    /// Persist a validated submission aggregate in one transaction.
    ///
    /// # Errors
    /// Returns an error when any insert fails; nothing is kept on failure.
    pub fn create_submission(
        &mut self,
        form_id: &str,
        user_id: i64,
        submitted_at: OffsetDateTime,
        normalized: &NormalizedSubmission,
    ) -> Result<Submission> {
        let submitted_at_text = rfc3339(submitted_at)?;
        let tx = self.conn.transaction().context("failed to start submission transaction")?;

        tx.execute(
            "INSERT INTO submissions(form_id, user_id, submitted_at) VALUES (?1, ?2, ?3)",
            params![form_id, user_id, submitted_at_text],
        )
        .context("failed to insert submission")?;
        let submission_id = tx.last_insert_rowid();

        for answer in &normalized.answers {
            tx.execute(
                "INSERT INTO submission_answers(submission_id, question_id, answer_type, answer_text)
                 VALUES (?1, ?2, ?3, ?4)",
                params![submission_id, answer.question_id, answer.answer_type, answer.answer_text],
            )
            .context("failed to insert submission answer")?;
        }

        let mut files = Vec::with_capacity(normalized.files.len());
        for file in &normalized.files {
            tx.execute(
                "INSERT INTO submission_files(submission_id, question_id, file_name, file_data, mime_type, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    submission_id,
                    file.question_id,
                    file.file_name,
                    file.file_data,
                    file.mime_type,
                    submitted_at_text,
                ],
            )
            .context("failed to insert submission file")?;
            files.push(SubmissionFile {
                id: tx.last_insert_rowid(),
                submission_id,
                question_id: file.question_id.clone(),
                file_name: file.file_name.clone(),
                file_data: file.file_data.clone(),
                mime_type: file.mime_type.clone(),
                uploaded_at: submitted_at,
            });
        }

        tx.commit().context("failed to commit submission")?;

        Ok(Submission {
            id: submission_id,
            form_id: form_id.to_string(),
            user_id,
            submitted_at,
            answers: normalized.answers.clone(),
            files,
        })
    }

    /// Fetch one submission with its answers and files.
    ///
    /// # Errors
    /// Returns an error when any query fails or a row is malformed.
    pub fn get_submission_by_id(&self, submission_id: i64) -> Result<Option<Submission>> {
        let header = self
            .conn
            .query_row(
                "SELECT id, form_id, user_id, submitted_at FROM submissions WHERE id = ?1",
                params![submission_id],
                submission_row,
            )
            .optional()
            .with_context(|| format!("failed to query submission {submission_id}"))?;

        match header {
            Some(header) => Ok(Some(self.hydrate_submission(header)?)),
            None => Ok(None),
        }
    }

    /// List a user's submissions, newest first.
    ///
    /// # Errors
    /// Returns an error when any query fails or a row is malformed.
    pub fn get_submissions_by_user_id(&self, user_id: i64) -> Result<Vec<Submission>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, form_id, user_id, submitted_at FROM submissions
                 WHERE user_id = ?1 ORDER BY submitted_at DESC, id DESC",
            )
            .context("failed to prepare submission listing")?;
        let headers = stmt
            .query_map(params![user_id], submission_row)
            .with_context(|| format!("failed to list submissions for user {user_id}"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read submission rows")?;
        drop(stmt);

        headers.into_iter().map(|header| self.hydrate_submission(header)).collect()
    }

    /// List a form's submissions, newest first.
    ///
    /// # Errors
    /// Returns an error when any query fails or a row is malformed.
    pub fn get_submissions_by_form_id(&self, form_id: &str) -> Result<Vec<Submission>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, form_id, user_id, submitted_at FROM submissions
                 WHERE form_id = ?1 ORDER BY submitted_at DESC, id DESC",
            )
            .context("failed to prepare submission listing")?;
        let headers = stmt
            .query_map(params![form_id], submission_row)
            .with_context(|| format!("failed to list submissions for form {form_id}"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read submission rows")?;
        drop(stmt);

        headers.into_iter().map(|header| self.hydrate_submission(header)).collect()
    }

    /// # Errors
    /// Returns an error when the query fails.
    pub fn has_user_submitted_form(&self, form_id: &str, user_id: i64) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM submissions WHERE form_id = ?1 AND user_id = ?2",
                params![form_id, user_id],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to count submissions for form {form_id}"))?;
        Ok(count > 0)
    }

    /// # Errors
    /// Returns an error when the query fails.
    pub fn get_submission_count_by_form_id(&self, form_id: &str) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM submissions WHERE form_id = ?1",
                params![form_id],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to count submissions for form {form_id}"))
    }

    /// List every file uploaded against a form, newest first.
    ///
    /// # Errors
    /// Returns an error when the query fails or a row is malformed.
    pub fn get_files_by_form_id(&self, form_id: &str) -> Result<Vec<SubmissionFile>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT f.id, f.submission_id, f.question_id, f.file_name, f.file_data, f.mime_type, f.uploaded_at
                 FROM submission_files f
                 JOIN submissions s ON s.id = f.submission_id
                 WHERE s.form_id = ?1
                 ORDER BY f.uploaded_at DESC, f.id DESC",
            )
            .context("failed to prepare file listing")?;
        let rows = stmt
            .query_map(params![form_id], file_row)
            .with_context(|| format!("failed to list files for form {form_id}"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read file rows")?;

        rows.into_iter().map(decode_file).collect()
    }

    /// # Errors
    /// Returns an error when the query fails or the row is malformed.
    pub fn get_file_by_id(&self, file_id: i64) -> Result<Option<SubmissionFile>> {
        self.conn
            .query_row(
                "SELECT id, submission_id, question_id, file_name, file_data, mime_type, uploaded_at
                 FROM submission_files WHERE id = ?1",
                params![file_id],
                file_row,
            )
            .optional()
            .with_context(|| format!("failed to query file {file_id}"))?
            .map(decode_file)
            .transpose()
    }

    /// # Errors
    /// Returns an error when the query fails or a row is malformed.
    pub fn get_files_by_submission_id(&self, submission_id: i64) -> Result<Vec<SubmissionFile>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, submission_id, question_id, file_name, file_data, mime_type, uploaded_at
                 FROM submission_files WHERE submission_id = ?1 ORDER BY id ASC",
            )
            .context("failed to prepare file listing")?;
        let rows = stmt
            .query_map(params![submission_id], file_row)
            .with_context(|| format!("failed to list files for submission {submission_id}"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read file rows")?;

        rows.into_iter().map(decode_file).collect()
    }

    fn hydrate_submission(&self, header: SubmissionRow) -> Result<Submission> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT question_id, answer_type, answer_text FROM submission_answers
                 WHERE submission_id = ?1 ORDER BY id ASC",
            )
            .context("failed to prepare answer listing")?;
        let answers = stmt
            .query_map(params![header.id], |row| {
                Ok(SubmissionAnswer {
                    question_id: row.get(0)?,
                    answer_type: row.get(1)?,
                    answer_text: row.get(2)?,
                })
            })
            .with_context(|| format!("failed to list answers for submission {}", header.id))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read answer rows")?;
        drop(stmt);

        let files = self.get_files_by_submission_id(header.id)?;

        Ok(Submission {
            id: header.id,
            form_id: header.form_id,
            user_id: header.user_id,
            submitted_at: parse_rfc3339(&header.submitted_at)?,
            answers,
            files,
        })
    }
}

struct SubmissionRow {
    id: i64,
    form_id: String,
    user_id: i64,
    submitted_at: String,
}

fn submission_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubmissionRow> {
    Ok(SubmissionRow {
        id: row.get(0)?,
        form_id: row.get(1)?,
        user_id: row.get(2)?,
        submitted_at: row.get(3)?,
    })
}

struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: String,
}

fn user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn decode_user(row: UserRow) -> Result<User> {
    let role = UserRole::parse(&row.role)
        .ok_or_else(|| anyhow!("user {} has unknown role {}", row.id, row.role))?;
    Ok(User {
        id: row.id,
        username: row.username,
        email: row.email,
        password_hash: row.password_hash,
        role,
        created_at: parse_rfc3339(&row.created_at)?,
    })
}

struct FileRow {
    id: i64,
    submission_id: i64,
    question_id: String,
    file_name: String,
    file_data: String,
    mime_type: String,
    uploaded_at: String,
}

fn file_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        submission_id: row.get(1)?,
        question_id: row.get(2)?,
        file_name: row.get(3)?,
        file_data: row.get(4)?,
        mime_type: row.get(5)?,
        uploaded_at: row.get(6)?,
    })
}

fn decode_file(row: FileRow) -> Result<SubmissionFile> {
    Ok(SubmissionFile {
        id: row.id,
        submission_id: row.submission_id,
        question_id: row.question_id,
        file_name: row.file_name,
        file_data: row.file_data,
        mime_type: row.mime_type,
        uploaded_at: parse_rfc3339(&row.uploaded_at)?,
    })
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
        row.get(0)
    })
    .context("failed to read schema version")
}

fn rfc3339(timestamp: OffsetDateTime) -> Result<String> {
    timestamp.format(&Rfc3339).context("failed to format RFC3339 timestamp")
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339)
        .with_context(|| format!("failed to parse RFC3339 timestamp {value}"))
}

fn now_rfc3339() -> Result<String> {
    rfc3339(OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use formforge_core::{build_form, normalize_answers, AnswerInput, FileInput, FormInput, QuestionInput};
    use time::Duration;

    use super::*;

    fn fixture_time() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(1_700_000_000)
    }

    fn open_store() -> SqliteStore {
        let mut store = match SqliteStore::open(Path::new(":memory:")) {
            Ok(store) => store,
            Err(err) => panic!("failed to open in-memory store: {err}"),
        };
        match store.migrate() {
            Ok(()) => store,
            Err(err) => panic!("failed to migrate store: {err}"),
        }
    }

    fn fixture_form(question_type: &str, labels: Option<Vec<&str>>) -> Form {
        build_form(
            FormInput {
                title: "Survey".to_string(),
                description: "desc".to_string(),
                header: String::new(),
                header_description: String::new(),
                config: None,
                questions: Some(vec![QuestionInput {
                    id: Some("q1".to_string()),
                    question_type: question_type.to_string(),
                    label: "Question".to_string(),
                    is_required: true,
                    is_description: false,
                    is_multi_select: false,
                    date_format: None,
                    order: 0,
                    options: labels.map(|labels| labels.into_iter().map(str::to_string).collect()),
                    allowed_file_types: None,
                }]),
            },
            "admin@example.com",
            fixture_time(),
        )
    }

    fn fixture_user(store: &SqliteStore, email: &str) -> User {
        match store.create_user("learner", email, "hash", UserRole::Learner, fixture_time()) {
            Ok(user) => user,
            Err(err) => panic!("failed to create user: {err}"),
        }
    }

    // Test IDs: TSTR-001
    #[test]
    fn migrate_reaches_latest_schema_version() -> Result<()> {
        let store = open_store();
        let status = store.schema_status()?;
        assert_eq!(status.current_version, LATEST_SCHEMA_VERSION);
        assert!(status.pending_versions.is_empty());
        Ok(())
    }

    // Test IDs: TSTR-002
    #[test]
    fn form_document_round_trip_and_delete() -> Result<()> {
        let store = open_store();
        let form = fixture_form("dropdown", Some(vec!["Yes", "No"]));

        store.create_form(&form)?;
        let loaded = store.get_form_by_id(&form.id)?;
        assert_eq!(loaded, Some(form.clone()));

        let mut updated = form.clone();
        updated.title = "Survey v2".to_string();
        updated.status = "published".to_string();
        store.update_form(&updated)?;
        let reloaded = store.get_form_by_id(&form.id)?;
        assert_eq!(reloaded.as_ref().map(|form| form.title.as_str()), Some("Survey v2"));
        assert_eq!(reloaded.as_ref().map(|form| form.status.as_str()), Some("published"));

        assert!(store.delete_form(&form.id)?);
        assert!(!store.delete_form(&form.id)?);
        assert_eq!(store.get_form_by_id(&form.id)?, None);
        Ok(())
    }

    // Test IDs: TSTR-003
    #[test]
    fn update_missing_form_is_an_error() {
        let store = open_store();
        let form = fixture_form("text", None);
        match store.update_form(&form) {
            Ok(()) => panic!("expected update of missing form to fail"),
            Err(err) => assert!(err.to_string().contains("does not exist")),
        }
    }

    // Test IDs: TSTR-004
    #[test]
    fn user_lookup_by_id_and_email() -> Result<()> {
        let store = open_store();
        let user = fixture_user(&store, "learner@example.com");

        assert_eq!(store.get_user_by_id(user.id)?, Some(user.clone()));
        assert_eq!(store.get_user_by_email("learner@example.com")?, Some(user));
        assert_eq!(store.get_user_by_id(999)?, None);
        assert_eq!(store.get_user_by_email("missing@example.com")?, None);
        Ok(())
    }

    // Test IDs: TSTR-005
    #[test]
    fn submission_aggregate_round_trip() -> Result<()> {
        let mut store = open_store();
        let mut form = fixture_form("dropdown", Some(vec!["Yes", "No"]));
        form.questions.push(formforge_core::Question {
            id: "q-file".to_string(),
            question_type: "file".to_string(),
            label: "Upload".to_string(),
            is_required: false,
            is_description: false,
            is_multi_select: false,
            date_format: None,
            order: 1,
            options: Vec::new(),
            allowed_file_types: vec!["pdf".to_string()],
        });
        store.create_form(&form)?;
        let user = fixture_user(&store, "learner@example.com");

        let option_id = form.questions[0].options[0].id.clone();
        let normalized = match normalize_answers(
            &form,
            vec![
                AnswerInput {
                    question_id: "q1".to_string(),
                    answer_type: "dropdown".to_string(),
                    answer_text: None,
                    selected_option_ids: vec![option_id.clone()],
                    file: None,
                },
                AnswerInput {
                    question_id: "q-file".to_string(),
                    answer_type: "file".to_string(),
                    answer_text: None,
                    selected_option_ids: Vec::new(),
                    file: Some(FileInput {
                        file_name: "cv.pdf".to_string(),
                        file_data: "YmFzZTY0ZGF0YQ==".to_string(),
                        mime_type: "application/pdf".to_string(),
                    }),
                },
            ],
        ) {
            Ok(normalized) => normalized,
            Err(err) => panic!("normalize failed: {err}"),
        };

        let submission =
            store.create_submission(&form.id, user.id, fixture_time(), &normalized)?;
        assert!(submission.id > 0);

        let loaded = match store.get_submission_by_id(submission.id)? {
            Some(loaded) => loaded,
            None => panic!("submission not found after insert"),
        };
        assert_eq!(loaded.answers.len(), 1);
        assert_eq!(loaded.answers[0].answer_text, format!("[\"{option_id}\"]"));
        assert_eq!(loaded.files.len(), 1);
        assert_eq!(loaded.files[0].file_name, "cv.pdf");

        assert!(store.has_user_submitted_form(&form.id, user.id)?);
        assert!(!store.has_user_submitted_form(&form.id, user.id + 1)?);
        assert_eq!(store.get_submission_count_by_form_id(&form.id)?, 1);
        assert_eq!(store.get_submissions_by_user_id(user.id)?.len(), 1);
        assert_eq!(store.get_submissions_by_form_id(&form.id)?.len(), 1);
        Ok(())
    }

    // Test IDs: TSTR-006
    #[test]
    fn file_lookups_by_form_submission_and_id() -> Result<()> {
        let mut store = open_store();
        let form = fixture_form("file", None);
        store.create_form(&form)?;
        let user = fixture_user(&store, "learner@example.com");

        let normalized = match normalize_answers(
            &form,
            vec![AnswerInput {
                question_id: "q1".to_string(),
                answer_type: "file".to_string(),
                answer_text: None,
                selected_option_ids: Vec::new(),
                file: Some(FileInput {
                    file_name: "notes.txt".to_string(),
                    file_data: "aGVsbG8=".to_string(),
                    mime_type: "text/plain".to_string(),
                }),
            }],
        ) {
            Ok(normalized) => normalized,
            Err(err) => panic!("normalize failed: {err}"),
        };
        let submission =
            store.create_submission(&form.id, user.id, fixture_time(), &normalized)?;

        let by_form = store.get_files_by_form_id(&form.id)?;
        assert_eq!(by_form.len(), 1);
        let by_submission = store.get_files_by_submission_id(submission.id)?;
        assert_eq!(by_submission, by_form);
        let by_id = store.get_file_by_id(by_form[0].id)?;
        assert_eq!(by_id.as_ref(), Some(&by_form[0]));
        assert_eq!(store.get_file_by_id(999)?, None);
        Ok(())
    }
}
