use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use formforge_core::{
    base64_size_bytes, build_form, can_delete, edit_form, ensure_published, map_form,
    map_submission, normalize_answers, publish_form, summarize_submission, AnswerInput,
    DomainError, FileResponse, Form, FormInput, FormResponse, Submission, SubmissionFile,
    SubmissionResponse, SubmissionSummary, User, UserRole,
};
use formforge_store_sqlite::{SchemaStatus, SqliteStore};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const API_CONTRACT_VERSION: &str = "api.v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateFormRequest {
    pub created_by: String,
    #[serde(flatten)]
    pub form: FormInput,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateFormRequest {
    pub mode: Option<String>,
    pub editor: String,
    #[serde(flatten)]
    pub form: FormInput,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitFormRequest {
    pub form_id: String,
    pub user_id: i64,
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteFormResult {
    pub form_id: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MySubmissionsResponse {
    pub total_submissions: usize,
    pub submissions: Vec<SubmissionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormFileEntry {
    pub file_id: i64,
    pub file_name: String,
    pub mime_type: String,
    pub file_size_bytes: u64,
    pub submitted_by: String,
    pub question_label: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormFilesResponse {
    pub form_id: String,
    pub form_title: String,
    pub total_files: usize,
    pub files: Vec<FormFileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDownload {
    pub file_name: String,
    pub mime_type: String,
    pub file_bytes: Vec<u8>,
}

/// Authorization context for read paths, passed as plain values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Option<i64>,
    pub is_admin: bool,
}

impl Requester {
    #[must_use]
    pub fn owns(self, owner_id: i64) -> bool {
        self.is_admin || self.user_id == Some(owner_id)
    }
}

#[derive(Debug, Clone)]
pub struct FormsApi {
    db_path: PathBuf,
}

impl FormsApi {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn open_store(&self) -> Result<SqliteStore> {
        let mut store = SqliteStore::open(&self.db_path)?;
        store.migrate()?;
        Ok(store)
    }

    /// Inspect schema status without mutating data.
    ///
    /// # Errors
    /// Returns an error when the `SQLite` database cannot be opened or queried.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let store = SqliteStore::open(&self.db_path)?;
        store.schema_status()
    }

    /// Create a draft form from an authoring payload.
    ///
    /// # Errors
    /// Returns an error when persistence fails.
    pub fn create_form(&self, input: CreateFormRequest) -> Result<FormResponse> {
        let store = self.open_store()?;
        let form = build_form(input.form, &input.created_by, OffsetDateTime::now_utc());
        store.create_form(&form)?;
        Ok(map_form(&form))
    }

    /// Fetch one form projected for display.
    ///
    /// # Errors
    /// Returns [`DomainError::NotFound`] when the form does not exist.
    pub fn get_form(&self, form_id: &str) -> Result<FormResponse> {
        let store = self.open_store()?;
        let form = require_form(&store, form_id)?;
        Ok(map_form(&form))
    }

    /// List every form projected for display, newest first.
    ///
    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn list_forms(&self) -> Result<Vec<FormResponse>> {
        let store = self.open_store()?;
        Ok(store.get_all_forms()?.iter().map(map_form).collect())
    }

    /// Publish a draft form.
    ///
    /// # Errors
    /// Returns [`DomainError::NotFound`] when the form does not exist and
    /// [`DomainError::InvalidState`] when it is already published.
    pub fn publish_form(&self, form_id: &str, published_by: &str) -> Result<FormResponse> {
        let store = self.open_store()?;
        let mut form = require_form(&store, form_id)?;
        publish_form(&mut form, published_by, OffsetDateTime::now_utc())?;
        store.update_form(&form)?;
        Ok(map_form(&form))
    }

    /// Apply an authoring edit under the requested mode (draft or publish).
    ///
    /// # Errors
    /// Returns [`DomainError::NotFound`] when the form does not exist,
    /// [`DomainError::InvalidArgument`] for an unknown mode, and
    /// [`DomainError::InvalidState`] for a draft edit of a published form.
    pub fn update_form(&self, form_id: &str, input: UpdateFormRequest) -> Result<FormResponse> {
        let store = self.open_store()?;
        let existing = require_form(&store, form_id)?;
        let updated = edit_form(
            &existing,
            input.form,
            input.mode.as_deref(),
            &input.editor,
            OffsetDateTime::now_utc(),
        )?;
        store.update_form(&updated)?;
        Ok(map_form(&updated))
    }

    /// Delete a form unless it is published; reports whether a delete happened.
    ///
    /// # Errors
    /// Returns an error when the store cannot be read or written.
    pub fn delete_form(&self, form_id: &str) -> Result<DeleteFormResult> {
        let store = self.open_store()?;
        let Some(form) = store.get_form_by_id(form_id)? else {
            return Ok(DeleteFormResult { form_id: form_id.to_string(), deleted: false });
        };
        if !can_delete(&form) {
            return Ok(DeleteFormResult { form_id: form_id.to_string(), deleted: false });
        }
        let deleted = store.delete_form(form_id)?;
        Ok(DeleteFormResult { form_id: form_id.to_string(), deleted })
    }

    /// Register one user; password hashing happens upstream.
    ///
    /// # Errors
    /// Returns an error when persistence fails, including on a duplicate email.
    pub fn create_user(&self, input: CreateUserRequest) -> Result<User> {
        let store = self.open_store()?;
        store.create_user(
            &input.username,
            &input.email,
            &input.password_hash,
            input.role,
            OffsetDateTime::now_utc(),
        )
    }

    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let store = self.open_store()?;
        store.get_user_by_email(email)
    }

    /// Validate and record one submission.
    ///
    /// Preconditions run in order: the form must exist, be published, not
    /// already have a submission from the user (unless the form allows
    /// multiples), the user must exist, and every answer must reference a
    /// question on the form. Nothing is persisted when any step fails.
    ///
    /// # Errors
    /// Returns the corresponding [`DomainError`] for each failed precondition.
    pub fn submit_form(&self, input: SubmitFormRequest) -> Result<SubmissionResponse> {
        let mut store = self.open_store()?;

        let form = require_form(&store, &input.form_id)?;
        ensure_published(&form)?;

        if !form.config.allow_multiple_submissions
            && store.has_user_submitted_form(&form.id, input.user_id)?
        {
            return Err(DomainError::InvalidState(
                "You have already submitted this form. Multiple submissions are not allowed."
                    .to_string(),
            )
            .into());
        }

        let user = store
            .get_user_by_id(input.user_id)?
            .ok_or_else(|| DomainError::NotFound("User not found".to_string()))?;

        let normalized = normalize_answers(&form, input.answers)?;
        let submission = store.create_submission(
            &form.id,
            user.id,
            OffsetDateTime::now_utc(),
            &normalized,
        )?;

        Ok(map_submission(&submission, Some(&form), Some(&user)))
    }

    /// A user's submission history; submissions whose form was deleted are skipped.
    ///
    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn my_submissions(&self, user_id: i64) -> Result<MySubmissionsResponse> {
        let store = self.open_store()?;
        let mut summaries = Vec::new();
        for submission in store.get_submissions_by_user_id(user_id)? {
            if let Some(form) = store.get_form_by_id(&submission.form_id)? {
                summaries.push(summarize_submission(&submission, &form));
            }
        }
        Ok(MySubmissionsResponse { total_submissions: summaries.len(), submissions: summaries })
    }

    /// Full detail of one submission, visible to its owner or an admin.
    ///
    /// # Errors
    /// Returns [`DomainError::NotFound`] when the submission does not exist and
    /// [`DomainError::Unauthorized`] when the requester may not view it.
    pub fn submission_details(
        &self,
        submission_id: i64,
        requester: Requester,
    ) -> Result<SubmissionResponse> {
        let store = self.open_store()?;
        let submission = require_submission(&store, submission_id)?;
        if !requester.owns(submission.user_id) {
            return Err(DomainError::Unauthorized(
                "You don't have permission to view this submission".to_string(),
            )
            .into());
        }

        let form = store.get_form_by_id(&submission.form_id)?;
        let user = store.get_user_by_id(submission.user_id)?;
        Ok(map_submission(&submission, form.as_ref(), user.as_ref()))
    }

    /// Every submission recorded against one form.
    ///
    /// # Errors
    /// Returns [`DomainError::NotFound`] when the form does not exist.
    pub fn form_submissions(&self, form_id: &str) -> Result<Vec<SubmissionResponse>> {
        let store = self.open_store()?;
        let form = require_form(&store, form_id)?;

        let mut responses = Vec::new();
        for submission in store.get_submissions_by_form_id(form_id)? {
            let user = store.get_user_by_id(submission.user_id)?;
            responses.push(map_submission(&submission, Some(&form), user.as_ref()));
        }
        Ok(responses)
    }

    /// Inventory of every file uploaded against one form.
    ///
    /// # Errors
    /// Returns [`DomainError::NotFound`] when the form does not exist.
    pub fn form_files(&self, form_id: &str) -> Result<FormFilesResponse> {
        let store = self.open_store()?;
        let form = require_form(&store, form_id)?;

        let mut entries = Vec::new();
        for file in store.get_files_by_form_id(form_id)? {
            entries.push(form_file_entry(&store, &form, &file)?);
        }

        Ok(FormFilesResponse {
            form_id: form.id.clone(),
            form_title: form.title.clone(),
            total_files: entries.len(),
            files: entries,
        })
    }

    /// Files of one submission, visible to its owner or an admin.
    ///
    /// # Errors
    /// Returns [`DomainError::NotFound`] when the submission does not exist and
    /// [`DomainError::Unauthorized`] when the requester may not view them.
    pub fn submission_files(
        &self,
        submission_id: i64,
        requester: Requester,
    ) -> Result<Vec<FileResponse>> {
        let store = self.open_store()?;
        let submission = require_submission(&store, submission_id)?;
        if !requester.owns(submission.user_id) {
            return Err(DomainError::Unauthorized(
                "You don't have permission to view these files".to_string(),
            )
            .into());
        }

        Ok(submission
            .files
            .iter()
            .map(|file| FileResponse {
                id: file.id,
                file_name: file.file_name.clone(),
                mime_type: file.mime_type.clone(),
                file_size_bytes: base64_size_bytes(&file.file_data),
            })
            .collect())
    }

    /// Decode one stored file for download, for its owner or an admin.
    ///
    /// # Errors
    /// Returns [`DomainError::NotFound`] when the file does not exist,
    /// [`DomainError::Unauthorized`] when the requester may not download it,
    /// and an error when the stored payload is not valid base64.
    pub fn file_download(&self, file_id: i64, requester: Requester) -> Result<FileDownload> {
        let store = self.open_store()?;
        let file = store
            .get_file_by_id(file_id)?
            .ok_or_else(|| DomainError::NotFound("File not found".to_string()))?;
        let submission = require_submission(&store, file.submission_id)?;
        if !requester.owns(submission.user_id) {
            return Err(DomainError::Unauthorized(
                "You don't have permission to download this file".to_string(),
            )
            .into());
        }

        let file_bytes = BASE64
            .decode(file.file_data.as_bytes())
            .with_context(|| format!("failed to decode stored payload of file {file_id}"))?;

        Ok(FileDownload { file_name: file.file_name, mime_type: file.mime_type, file_bytes })
    }
}

fn require_form(store: &SqliteStore, form_id: &str) -> Result<Form> {
    store
        .get_form_by_id(form_id)?
        .ok_or_else(|| DomainError::NotFound("Form not found".to_string()).into())
}

fn require_submission(store: &SqliteStore, submission_id: i64) -> Result<Submission> {
    store
        .get_submission_by_id(submission_id)?
        .ok_or_else(|| DomainError::NotFound("Submission not found".to_string()).into())
}

fn form_file_entry(store: &SqliteStore, form: &Form, file: &SubmissionFile) -> Result<FormFileEntry> {
    let submitted_by = match store.get_submission_by_id(file.submission_id)? {
        Some(submission) => store
            .get_user_by_id(submission.user_id)?
            .map_or_else(|| "Unknown User".to_string(), |user| user.username),
        None => "Unknown User".to_string(),
    };
    let question_label = form
        .question(&file.question_id)
        .map_or_else(|| "Unknown Question".to_string(), |question| question.label.clone());

    Ok(FormFileEntry {
        file_id: file.id,
        file_name: file.file_name.clone(),
        mime_type: file.mime_type.clone(),
        file_size_bytes: base64_size_bytes(&file.file_data),
        submitted_by,
        question_label,
        uploaded_at: file.uploaded_at,
    })
}

#[cfg(test)]
mod tests {
    use formforge_core::{FormConfig, QuestionInput};

    use super::*;

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("formforge-api-{}.sqlite3", ulid::Ulid::new()))
    }

    fn admin() -> Requester {
        Requester { user_id: None, is_admin: true }
    }

    fn learner(user_id: i64) -> Requester {
        Requester { user_id: Some(user_id), is_admin: false }
    }

    fn dropdown_form_input(allow_multiple: bool) -> FormInput {
        FormInput {
            title: "Onboarding Survey".to_string(),
            description: "intro".to_string(),
            header: String::new(),
            header_description: String::new(),
            config: Some(FormConfig { allow_multiple_submissions: allow_multiple }),
            questions: Some(vec![QuestionInput {
                id: None,
                question_type: "dropdown".to_string(),
                label: "Ready?".to_string(),
                is_required: true,
                is_description: false,
                is_multi_select: false,
                date_format: None,
                order: 0,
                options: Some(vec!["Yes".to_string(), "No".to_string()]),
                allowed_file_types: None,
            }]),
        }
    }

    fn create_learner(api: &FormsApi, email: &str) -> User {
        let request = CreateUserRequest {
            username: "learner".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: UserRole::Learner,
        };
        match api.create_user(request) {
            Ok(user) => user,
            Err(err) => panic!("failed to create user: {err}"),
        }
    }

    fn domain_error(err: &anyhow::Error) -> &DomainError {
        match err.downcast_ref::<DomainError>() {
            Some(domain) => domain,
            None => panic!("expected a domain error, got: {err}"),
        }
    }

    // Test IDs: TAPI-001
    #[test]
    fn create_publish_submit_and_read_back_round_trip() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = FormsApi::new(db_path.clone());

        let created = api.create_form(CreateFormRequest {
            created_by: "admin@example.com".to_string(),
            form: dropdown_form_input(false),
        })?;
        assert_eq!(created.status, "draft");

        let published = api.publish_form(&created.id, "admin@example.com")?;
        assert_eq!(published.status, "published");
        assert_eq!(published.published_by.as_deref(), Some("admin@example.com"));

        let user = create_learner(&api, "learner@example.com");
        let options = match &published.questions[0].options {
            Some(options) => options,
            None => panic!("expected options on published dropdown"),
        };
        let yes_id = options[0].id.clone();

        let submitted = api.submit_form(SubmitFormRequest {
            form_id: created.id.clone(),
            user_id: user.id,
            answers: vec![AnswerInput {
                question_id: published.questions[0].id.clone(),
                answer_type: "dropdown".to_string(),
                answer_text: None,
                selected_option_ids: vec![yes_id.clone()],
                file: None,
            }],
        })?;

        let details = api.submission_details(submitted.submission_id, learner(user.id))?;
        assert_eq!(details.form_title, "Onboarding Survey");
        assert_eq!(details.answers[0].question_label, "Ready?");
        assert_eq!(details.answers[0].selected_options_ids, Some(vec![yes_id]));

        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }

    // Test IDs: TAPI-002
    #[test]
    fn submit_rejects_draft_forms_and_duplicates() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = FormsApi::new(db_path.clone());

        let form = api.create_form(CreateFormRequest {
            created_by: "admin@example.com".to_string(),
            form: dropdown_form_input(false),
        })?;
        let user = create_learner(&api, "learner@example.com");

        let request = SubmitFormRequest {
            form_id: form.id.clone(),
            user_id: user.id,
            answers: Vec::new(),
        };

        let err = match api.submit_form(request.clone()) {
            Ok(_) => panic!("expected draft submission to fail"),
            Err(err) => err,
        };
        assert_eq!(
            domain_error(&err),
            &DomainError::InvalidState(
                "Form is not published. Only published forms can be submitted.".to_string()
            )
        );

        api.publish_form(&form.id, "admin@example.com")?;
        api.submit_form(request.clone())?;

        let err = match api.submit_form(request) {
            Ok(_) => panic!("expected duplicate submission to fail"),
            Err(err) => err,
        };
        assert_eq!(
            domain_error(&err),
            &DomainError::InvalidState(
                "You have already submitted this form. Multiple submissions are not allowed."
                    .to_string()
            )
        );

        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }

    // Test IDs: TAPI-003
    #[test]
    fn submit_rejects_missing_form_user_and_unknown_question() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = FormsApi::new(db_path.clone());

        let err = match api.submit_form(SubmitFormRequest {
            form_id: "missing".to_string(),
            user_id: 1,
            answers: Vec::new(),
        }) {
            Ok(_) => panic!("expected missing form to fail"),
            Err(err) => err,
        };
        assert_eq!(domain_error(&err), &DomainError::NotFound("Form not found".to_string()));

        let form = api.create_form(CreateFormRequest {
            created_by: "admin@example.com".to_string(),
            form: dropdown_form_input(true),
        })?;
        api.publish_form(&form.id, "admin@example.com")?;

        let err = match api.submit_form(SubmitFormRequest {
            form_id: form.id.clone(),
            user_id: 404,
            answers: Vec::new(),
        }) {
            Ok(_) => panic!("expected missing user to fail"),
            Err(err) => err,
        };
        assert_eq!(domain_error(&err), &DomainError::NotFound("User not found".to_string()));

        let user = create_learner(&api, "learner@example.com");
        let err = match api.submit_form(SubmitFormRequest {
            form_id: form.id.clone(),
            user_id: user.id,
            answers: vec![AnswerInput {
                question_id: "q-ghost".to_string(),
                answer_type: "text".to_string(),
                answer_text: Some("hi".to_string()),
                selected_option_ids: Vec::new(),
                file: None,
            }],
        }) {
            Ok(_) => panic!("expected unknown question to fail"),
            Err(err) => err,
        };
        assert_eq!(
            domain_error(&err),
            &DomainError::InvalidArgument("Question q-ghost not found in form".to_string())
        );

        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }

    // Test IDs: TAPI-004
    #[test]
    fn update_preserves_option_ids_and_guards_published_forms() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = FormsApi::new(db_path.clone());

        let form = api.create_form(CreateFormRequest {
            created_by: "admin@example.com".to_string(),
            form: dropdown_form_input(false),
        })?;
        let question = &form.questions[0];
        let original_options = match &question.options {
            Some(options) => options.clone(),
            None => panic!("expected options on dropdown"),
        };

        let mut edit = dropdown_form_input(false);
        if let Some(questions) = edit.questions.as_mut() {
            questions[0].id = Some(question.id.clone());
            questions[0].options =
                Some(vec!["Yes!".to_string(), "No!".to_string(), "Maybe".to_string()]);
        }
        let updated = api.update_form(
            &form.id,
            UpdateFormRequest { mode: None, editor: "admin@example.com".to_string(), form: edit },
        )?;
        let updated_options = match &updated.questions[0].options {
            Some(options) => options.clone(),
            None => panic!("expected options after edit"),
        };
        assert_eq!(updated_options[0].id, original_options[0].id);
        assert_eq!(updated_options[1].id, original_options[1].id);
        assert_eq!(updated_options.len(), 3);

        api.publish_form(&form.id, "admin@example.com")?;
        let err = match api.update_form(
            &form.id,
            UpdateFormRequest {
                mode: Some("draft".to_string()),
                editor: "admin@example.com".to_string(),
                form: dropdown_form_input(false),
            },
        ) {
            Ok(_) => panic!("expected draft edit of published form to fail"),
            Err(err) => err,
        };
        assert_eq!(
            domain_error(&err),
            &DomainError::InvalidState(
                "Cannot edit a published form. Published forms are read-only.".to_string()
            )
        );

        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }

    // Test IDs: TAPI-005
    #[test]
    fn delete_only_removes_draft_forms() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = FormsApi::new(db_path.clone());

        let missing = api.delete_form("missing")?;
        assert!(!missing.deleted);

        let draft = api.create_form(CreateFormRequest {
            created_by: "admin@example.com".to_string(),
            form: dropdown_form_input(false),
        })?;
        assert!(api.delete_form(&draft.id)?.deleted);

        let published = api.create_form(CreateFormRequest {
            created_by: "admin@example.com".to_string(),
            form: dropdown_form_input(false),
        })?;
        api.publish_form(&published.id, "admin@example.com")?;
        assert!(!api.delete_form(&published.id)?.deleted);
        assert!(api.get_form(&published.id).is_ok());

        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }

    // Test IDs: TAPI-006
    #[test]
    fn submission_reads_enforce_owner_or_admin() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = FormsApi::new(db_path.clone());

        let form = api.create_form(CreateFormRequest {
            created_by: "admin@example.com".to_string(),
            form: dropdown_form_input(false),
        })?;
        api.publish_form(&form.id, "admin@example.com")?;
        let owner = create_learner(&api, "owner@example.com");
        let other = create_learner(&api, "other@example.com");

        let submitted = api.submit_form(SubmitFormRequest {
            form_id: form.id.clone(),
            user_id: owner.id,
            answers: Vec::new(),
        })?;

        assert!(api.submission_details(submitted.submission_id, learner(owner.id)).is_ok());
        assert!(api.submission_details(submitted.submission_id, admin()).is_ok());

        let err = match api.submission_details(submitted.submission_id, learner(other.id)) {
            Ok(_) => panic!("expected foreign read to fail"),
            Err(err) => err,
        };
        assert_eq!(
            domain_error(&err),
            &DomainError::Unauthorized(
                "You don't have permission to view this submission".to_string()
            )
        );

        let err = match api.submission_files(submitted.submission_id, learner(other.id)) {
            Ok(_) => panic!("expected foreign file read to fail"),
            Err(err) => err,
        };
        assert_eq!(
            domain_error(&err),
            &DomainError::Unauthorized(
                "You don't have permission to view these files".to_string()
            )
        );

        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }

    // Test IDs: TAPI-007
    #[test]
    fn file_inventory_and_download_round_trip() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = FormsApi::new(db_path.clone());

        let form = api.create_form(CreateFormRequest {
            created_by: "admin@example.com".to_string(),
            form: FormInput {
                title: "Upload Form".to_string(),
                description: String::new(),
                header: String::new(),
                header_description: String::new(),
                config: None,
                questions: Some(vec![QuestionInput {
                    id: None,
                    question_type: "file".to_string(),
                    label: "CV".to_string(),
                    is_required: true,
                    is_description: false,
                    is_multi_select: false,
                    date_format: None,
                    order: 0,
                    options: None,
                    allowed_file_types: Some(vec!["pdf".to_string()]),
                }]),
            },
        })?;
        api.publish_form(&form.id, "admin@example.com")?;
        let owner = create_learner(&api, "owner@example.com");
        let other = create_learner(&api, "other@example.com");

        api.submit_form(SubmitFormRequest {
            form_id: form.id.clone(),
            user_id: owner.id,
            answers: vec![AnswerInput {
                question_id: form.questions[0].id.clone(),
                answer_type: "file".to_string(),
                answer_text: None,
                selected_option_ids: Vec::new(),
                file: Some(formforge_core::FileInput {
                    file_name: "greeting.txt".to_string(),
                    file_data: "aGVsbG8=".to_string(),
                    mime_type: "text/plain".to_string(),
                }),
            }],
        })?;

        let inventory = api.form_files(&form.id)?;
        assert_eq!(inventory.total_files, 1);
        assert_eq!(inventory.form_title, "Upload Form");
        assert_eq!(inventory.files[0].question_label, "CV");
        assert_eq!(inventory.files[0].submitted_by, "learner");
        assert_eq!(inventory.files[0].file_size_bytes, 5);

        let file_id = inventory.files[0].file_id;
        let download = api.file_download(file_id, learner(owner.id))?;
        assert_eq!(download.file_bytes, b"hello");

        let by_admin = api.file_download(file_id, admin())?;
        assert_eq!(by_admin.file_name, "greeting.txt");

        let err = match api.file_download(file_id, learner(other.id)) {
            Ok(_) => panic!("expected foreign download to fail"),
            Err(err) => err,
        };
        assert_eq!(
            domain_error(&err),
            &DomainError::Unauthorized(
                "You don't have permission to download this file".to_string()
            )
        );

        let err = match api.file_download(999, admin()) {
            Ok(_) => panic!("expected missing file to fail"),
            Err(err) => err,
        };
        assert_eq!(domain_error(&err), &DomainError::NotFound("File not found".to_string()));

        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }

    // Test IDs: TAPI-008
    #[test]
    fn my_submissions_counts_answers_and_form_listing_names_submitter() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = FormsApi::new(db_path.clone());

        let kept = api.create_form(CreateFormRequest {
            created_by: "admin@example.com".to_string(),
            form: dropdown_form_input(true),
        })?;
        api.publish_form(&kept.id, "admin@example.com")?;
        let user = create_learner(&api, "learner@example.com");

        let yes_id = match &api.get_form(&kept.id)?.questions[0].options {
            Some(options) => options[0].id.clone(),
            None => panic!("expected options"),
        };
        api.submit_form(SubmitFormRequest {
            form_id: kept.id.clone(),
            user_id: user.id,
            answers: vec![AnswerInput {
                question_id: kept.questions[0].id.clone(),
                answer_type: "dropdown".to_string(),
                answer_text: None,
                selected_option_ids: vec![yes_id],
                file: None,
            }],
        })?;

        let history = api.my_submissions(user.id)?;
        assert_eq!(history.total_submissions, 1);
        assert_eq!(history.submissions[0].total_questions, 1);
        assert_eq!(history.submissions[0].answered_questions, 1);
        assert_eq!(history.submissions[0].form_title, "Onboarding Survey");

        let listing = api.form_submissions(&kept.id)?;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].submitted_by, "learner");

        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }
}
