use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use ulid::Ulid;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum DomainError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Unauthorized(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    Draft,
    Published,
    Archived,
}

impl FormStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    /// Stored status strings are compared case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    Draft,
    Publish,
}

impl EditMode {
    /// Resolve the requested edit mode; an absent or empty mode means draft.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidArgument`] for any mode other than
    /// `draft` or `publish` (case-insensitive).
    pub fn parse(value: Option<&str>) -> Result<Self, DomainError> {
        let Some(value) = value else {
            return Ok(Self::Draft);
        };
        if value.trim().is_empty() {
            return Ok(Self::Draft);
        }
        match value.to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "publish" => Ok(Self::Publish),
            _ => Err(DomainError::InvalidArgument(
                "Mode must be either 'draft' or 'publish'".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    Dropdown,
    Radio,
    Checkbox,
    File,
    Date,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Dropdown => "dropdown",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::File => "file",
            Self::Date => "date",
        }
    }

    /// Question types are free-form strings; unrecognized types behave like text.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "dropdown" => Some(Self::Dropdown),
            "radio" => Some(Self::Radio),
            "checkbox" => Some(Self::Checkbox),
            "file" => Some(Self::File),
            "date" => Some(Self::Date),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_choice(self) -> bool {
        matches!(self, Self::Dropdown | Self::Radio | Self::Checkbox)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Learner,
    Admin,
}

impl UserRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Learner => "learner",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "learner" => Some(Self::Learner),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct FormConfig {
    #[serde(default)]
    pub allow_multiple_submissions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct QuestionOption {
    pub id: String,
    pub value: String,
    pub order: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Question {
    pub id: String,
    pub question_type: String,
    pub label: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_description: bool,
    #[serde(default)]
    pub is_multi_select: bool,
    pub date_format: Option<String>,
    pub order: u32,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub allowed_file_types: Vec<String>,
}

impl Question {
    #[must_use]
    pub fn kind(&self) -> Option<QuestionKind> {
        QuestionKind::parse(&self.question_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Form {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub header_description: String,
    pub status: String,
    #[serde(default)]
    pub config: FormConfig,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    pub published_by: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Form {
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status.eq_ignore_ascii_case(FormStatus::Published.as_str())
    }

    #[must_use]
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == question_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SubmissionAnswer {
    pub question_id: String,
    pub answer_type: String,
    pub answer_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SubmissionFile {
    pub id: i64,
    pub submission_id: i64,
    pub question_id: String,
    pub file_name: String,
    pub file_data: String,
    pub mime_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    pub id: i64,
    pub form_id: String,
    pub user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    #[serde(default)]
    pub answers: Vec<SubmissionAnswer>,
    #[serde(default)]
    pub files: Vec<SubmissionFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionInput {
    pub id: Option<String>,
    pub question_type: String,
    pub label: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_description: bool,
    #[serde(default)]
    pub is_multi_select: bool,
    pub date_format: Option<String>,
    #[serde(default)]
    pub order: u32,
    pub options: Option<Vec<String>>,
    pub allowed_file_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub header_description: String,
    pub config: Option<FormConfig>,
    pub questions: Option<Vec<QuestionInput>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileInput {
    pub file_name: String,
    pub file_data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerInput {
    pub question_id: String,
    #[serde(default)]
    pub answer_type: String,
    pub answer_text: Option<String>,
    #[serde(default)]
    pub selected_option_ids: Vec<String>,
    pub file: Option<FileInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedFile {
    pub question_id: String,
    pub file_name: String,
    pub file_data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedSubmission {
    pub answers: Vec<SubmissionAnswer>,
    pub files: Vec<NormalizedFile>,
}

/// Rebuild a question's option list from submitted labels, reusing ids by position.
///
/// Labels at positions that existed in the prior list keep the prior option's id;
/// positions past the end mint fresh ids. Reuse is purely positional, never by
/// label equality. An empty label list drops every prior option.
#[must_use]
pub fn reconcile_options(existing: &[QuestionOption], labels: &[String]) -> Vec<QuestionOption> {
    labels
        .iter()
        .enumerate()
        .map(|(index, label)| QuestionOption {
            id: existing
                .get(index)
                .map_or_else(|| Ulid::new().to_string(), |option| option.id.clone()),
            value: label.clone(),
            order: u32::try_from(index).unwrap_or(u32::MAX),
            is_active: true,
        })
        .collect()
}

fn build_question(input: QuestionInput, prior: Option<&Question>) -> Question {
    let kind = QuestionKind::parse(&input.question_type);
    let options = if kind.is_some_and(QuestionKind::is_choice) {
        let labels = input.options.unwrap_or_default();
        let existing = prior.map_or(&[][..], |question| question.options.as_slice());
        reconcile_options(existing, &labels)
    } else {
        // Non-choice questions never carry options, even when labels were supplied.
        Vec::new()
    };

    let id = match input.id {
        Some(id) if !id.trim().is_empty() => id,
        _ => Ulid::new().to_string(),
    };

    Question {
        id,
        question_type: input.question_type,
        label: input.label,
        is_required: input.is_required,
        is_description: input.is_description,
        is_multi_select: input.is_multi_select,
        date_format: input.date_format,
        order: input.order,
        options,
        allowed_file_types: input.allowed_file_types.unwrap_or_default(),
    }
}

/// Build a fresh draft form aggregate; the caller persists it.
#[must_use]
pub fn build_form(input: FormInput, created_by: &str, now: OffsetDateTime) -> Form {
    let questions = input
        .questions
        .unwrap_or_default()
        .into_iter()
        .map(|question| build_question(question, None))
        .collect();

    Form {
        id: Ulid::new().to_string(),
        title: input.title,
        description: input.description,
        header: input.header,
        header_description: input.header_description,
        status: FormStatus::Draft.as_str().to_string(),
        config: input.config.unwrap_or_default(),
        created_at: now,
        created_by: created_by.to_string(),
        published_at: None,
        published_by: None,
        questions,
    }
}

/// Apply an authoring edit as a full replacement of the form's content.
///
/// Identity, creation metadata, status, and publish metadata are carried over
/// from the existing aggregate. Question ids present in the edit are matched
/// against the existing form so their option ids survive reconciliation.
#[must_use]
pub fn apply_edits(existing: &Form, input: FormInput) -> Form {
    let questions = input
        .questions
        .unwrap_or_default()
        .into_iter()
        .map(|question| {
            let prior = question.id.as_deref().and_then(|id| existing.question(id));
            build_question(question, prior)
        })
        .collect();

    Form {
        id: existing.id.clone(),
        title: input.title,
        description: input.description,
        header: input.header,
        header_description: input.header_description,
        status: existing.status.clone(),
        config: input.config.unwrap_or_default(),
        created_at: existing.created_at,
        created_by: existing.created_by.clone(),
        published_at: existing.published_at,
        published_by: existing.published_by.clone(),
        questions,
    }
}

/// Transition a draft form to published.
///
/// # Errors
/// Returns [`DomainError::InvalidState`] when the form is already published,
/// regardless of the stored status casing.
pub fn publish_form(form: &mut Form, published_by: &str, now: OffsetDateTime) -> Result<(), DomainError> {
    if form.is_published() {
        return Err(DomainError::InvalidState("Form is already published".to_string()));
    }
    form.status = FormStatus::Published.as_str().to_string();
    form.published_at = Some(now);
    form.published_by = Some(published_by.to_string());
    Ok(())
}

/// Apply an authoring edit under the requested mode.
///
/// Draft mode rejects edits to published forms; publish mode applies the edit
/// and refreshes publish metadata even when the form is already published.
///
/// # Errors
/// Returns [`DomainError::InvalidArgument`] for an unrecognized mode and
/// [`DomainError::InvalidState`] for a draft-mode edit of a published form.
pub fn edit_form(
    existing: &Form,
    input: FormInput,
    mode: Option<&str>,
    editor: &str,
    now: OffsetDateTime,
) -> Result<Form, DomainError> {
    match EditMode::parse(mode)? {
        EditMode::Draft => {
            if existing.is_published() {
                return Err(DomainError::InvalidState(
                    "Cannot edit a published form. Published forms are read-only.".to_string(),
                ));
            }
            Ok(apply_edits(existing, input))
        }
        EditMode::Publish => {
            let mut updated = apply_edits(existing, input);
            updated.status = FormStatus::Published.as_str().to_string();
            updated.published_at = Some(now);
            updated.published_by = Some(editor.to_string());
            Ok(updated)
        }
    }
}

/// Whether the form may be deleted; published forms are immutable.
#[must_use]
pub fn can_delete(form: &Form) -> bool {
    !form.is_published()
}

/// Gate submissions on the published state.
///
/// # Errors
/// Returns [`DomainError::InvalidState`] when the form is not published.
pub fn ensure_published(form: &Form) -> Result<(), DomainError> {
    if form.is_published() {
        Ok(())
    } else {
        Err(DomainError::InvalidState(
            "Form is not published. Only published forms can be submitted.".to_string(),
        ))
    }
}

/// Validate submitted answers against the form and normalize them for storage.
///
/// Every answer must reference a question on the form; the first unknown id
/// aborts before anything is produced. Normalization dispatches on the form's
/// question type, not the answer's self-reported type: choice answers store the
/// JSON-array encoding of the selected option ids (radio is a one-element
/// array), file answers become file rows with no answer text, and everything
/// else passes the text through with an absent text treated as empty.
///
/// # Errors
/// Returns [`DomainError::InvalidArgument`] when an answer references a
/// question id that does not exist on the form.
pub fn normalize_answers(
    form: &Form,
    answers: Vec<AnswerInput>,
) -> Result<NormalizedSubmission, DomainError> {
    for answer in &answers {
        if form.question(&answer.question_id).is_none() {
            return Err(DomainError::InvalidArgument(format!(
                "Question {} not found in form",
                answer.question_id
            )));
        }
    }

    let mut normalized = NormalizedSubmission::default();
    for answer in answers {
        let Some(question) = form.question(&answer.question_id) else {
            continue;
        };

        match question.kind() {
            Some(kind) if kind.is_choice() => {
                let encoded = serde_json::to_string(&answer.selected_option_ids).map_err(|err| {
                    DomainError::InvalidArgument(format!(
                        "Question {} has unencodable selected options: {err}",
                        answer.question_id
                    ))
                })?;
                normalized.answers.push(SubmissionAnswer {
                    question_id: answer.question_id,
                    answer_type: question.question_type.clone(),
                    answer_text: encoded,
                });
            }
            Some(QuestionKind::File) => {
                if let Some(file) = answer.file {
                    normalized.files.push(NormalizedFile {
                        question_id: answer.question_id,
                        file_name: file.file_name,
                        file_data: file.file_data,
                        mime_type: file.mime_type,
                    });
                }
            }
            _ => {
                normalized.answers.push(SubmissionAnswer {
                    question_id: answer.question_id,
                    answer_type: question.question_type.clone(),
                    answer_text: answer.answer_text.unwrap_or_default(),
                });
            }
        }
    }

    Ok(normalized)
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct OptionResponse {
    pub id: String,
    pub value: String,
    pub order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct QuestionResponse {
    pub id: String,
    pub question_type: String,
    pub label: String,
    pub is_required: bool,
    pub is_description: bool,
    pub is_multi_select: bool,
    pub date_format: Option<String>,
    pub order: u32,
    pub options: Option<Vec<OptionResponse>>,
    pub allowed_file_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub header: String,
    pub header_description: String,
    pub status: String,
    pub config: FormConfig,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    pub published_by: Option<String>,
    pub questions: Vec<QuestionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct FileResponse {
    pub id: i64,
    pub file_name: String,
    pub mime_type: String,
    pub file_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AnswerResponse {
    pub question_id: String,
    pub question_label: String,
    pub answer_type: String,
    pub answer_text: Option<String>,
    pub selected_options_ids: Option<Vec<String>>,
    pub file: Option<FileResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionResponse {
    pub submission_id: i64,
    pub form_id: String,
    pub form_title: String,
    pub submitted_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub answers: Vec<AnswerResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub submission_id: i64,
    pub form_id: String,
    pub form_title: String,
    pub form_status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub total_questions: usize,
    pub answered_questions: usize,
}

fn map_question(question: &Question) -> QuestionResponse {
    let options = if question.kind().is_some_and(QuestionKind::is_choice) {
        let active = question
            .options
            .iter()
            .filter(|option| option.is_active)
            .map(|option| OptionResponse {
                id: option.id.clone(),
                value: option.value.clone(),
                order: option.order,
            })
            .collect::<Vec<_>>();
        if active.is_empty() {
            None
        } else {
            Some(active)
        }
    } else {
        None
    };

    QuestionResponse {
        id: question.id.clone(),
        question_type: question.question_type.clone(),
        label: question.label.clone(),
        is_required: question.is_required,
        is_description: question.is_description,
        is_multi_select: question.is_multi_select,
        date_format: question.date_format.clone(),
        order: question.order,
        options,
        allowed_file_types: question.allowed_file_types.clone(),
    }
}

/// Project a form for display: only active options, and only on choice questions.
#[must_use]
pub fn map_form(form: &Form) -> FormResponse {
    FormResponse {
        id: form.id.clone(),
        title: form.title.clone(),
        description: form.description.clone(),
        header: form.header.clone(),
        header_description: form.header_description.clone(),
        status: form.status.clone(),
        config: form.config,
        created_at: form.created_at,
        created_by: form.created_by.clone(),
        published_at: form.published_at,
        published_by: form.published_by.clone(),
        questions: form.questions.iter().map(map_question).collect(),
    }
}

/// Decoded byte size of a base64 payload: `floor(len * 3 / 4)` minus padding.
#[must_use]
pub fn base64_size_bytes(data: &str) -> u64 {
    if data.is_empty() {
        return 0;
    }
    let padding = data.chars().rev().take_while(|ch| *ch == '=').count().min(2);
    let len = u64::try_from(data.len()).unwrap_or(u64::MAX);
    (len * 3 / 4).saturating_sub(u64::try_from(padding).unwrap_or(0))
}

fn question_label(form: Option<&Form>, question_id: &str) -> String {
    form.and_then(|form| form.question(question_id))
        .map_or_else(|| "Unknown Question".to_string(), |question| question.label.clone())
}

fn decode_selected_options(answer: &SubmissionAnswer) -> Option<Vec<String>> {
    if !QuestionKind::parse(&answer.answer_type).is_some_and(QuestionKind::is_choice) {
        return None;
    }
    serde_json::from_str::<Vec<String>>(&answer.answer_text).ok()
}

/// Project a stored submission for display.
///
/// Lookups degrade softly: a question removed after submission renders as
/// "Unknown Question", a deleted form as "Unknown Form", a missing user as
/// "Unknown User". Choice answers whose text no longer parses as a JSON string
/// array fall back to plain answer text. File rows are surfaced as synthetic
/// answers of type `file` carrying name, mime type, and decoded size.
#[must_use]
pub fn map_submission(
    submission: &Submission,
    form: Option<&Form>,
    user: Option<&User>,
) -> SubmissionResponse {
    let mut answers = Vec::with_capacity(submission.answers.len() + submission.files.len());

    for answer in &submission.answers {
        let selected = decode_selected_options(answer);
        answers.push(AnswerResponse {
            question_id: answer.question_id.clone(),
            question_label: question_label(form, &answer.question_id),
            answer_type: answer.answer_type.clone(),
            answer_text: if selected.is_some() {
                None
            } else {
                Some(answer.answer_text.clone())
            },
            selected_options_ids: selected,
            file: None,
        });
    }

    for file in &submission.files {
        answers.push(AnswerResponse {
            question_id: file.question_id.clone(),
            question_label: question_label(form, &file.question_id),
            answer_type: QuestionKind::File.as_str().to_string(),
            answer_text: None,
            selected_options_ids: None,
            file: Some(FileResponse {
                id: file.id,
                file_name: file.file_name.clone(),
                mime_type: file.mime_type.clone(),
                file_size_bytes: base64_size_bytes(&file.file_data),
            }),
        });
    }

    SubmissionResponse {
        submission_id: submission.id,
        form_id: submission.form_id.clone(),
        form_title: form.map_or_else(|| "Unknown Form".to_string(), |form| form.title.clone()),
        submitted_by: user.map_or_else(|| "Unknown User".to_string(), |user| user.username.clone()),
        submitted_at: submission.submitted_at,
        answers,
    }
}

/// Per-submission line item for a user's submission history.
#[must_use]
pub fn summarize_submission(submission: &Submission, form: &Form) -> SubmissionSummary {
    SubmissionSummary {
        submission_id: submission.id,
        form_id: submission.form_id.clone(),
        form_title: form.title.clone(),
        form_status: form.status.clone(),
        submitted_at: submission.submitted_at,
        total_questions: form.questions.len(),
        answered_questions: submission.answers.len() + submission.files.len(),
    }
}
