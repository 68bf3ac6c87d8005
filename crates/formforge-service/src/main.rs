use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use formforge_api::{
    CreateFormRequest, CreateUserRequest, DeleteFormResult, FormFilesResponse, FormsApi,
    MySubmissionsResponse, Requester, SubmitFormRequest, UpdateFormRequest, API_CONTRACT_VERSION,
};
use formforge_core::{DomainError, FileResponse, FormResponse, SubmissionResponse, UserRole};
use serde::{Deserialize, Serialize};

const SERVICE_CONTRACT_VERSION: &str = "service.v1";

#[derive(Debug, Clone)]
struct ServiceState {
    api: FormsApi,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    service_contract_version: &'static str,
    error: String,
    #[serde(skip)]
    status: StatusCode,
}

#[derive(Debug, Clone, Deserialize)]
struct PublishRequest {
    published_by: String,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Parser)]
#[command(name = "formforge-service")]
#[command(about = "Local HTTP service for FormForge")]
struct Args {
    #[arg(long, default_value = "./formforge.sqlite3")]
    db: PathBuf,
    #[arg(long, default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl ServiceError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            service_contract_version: SERVICE_CONTRACT_VERSION,
            error: message.into(),
            status,
        }
    }

    /// Map domain failures onto HTTP status codes; anything else is a 500.
    fn from_api(err: &anyhow::Error) -> Self {
        let status = match err.downcast_ref::<DomainError>() {
            Some(DomainError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(DomainError::InvalidState(_)) => StatusCode::CONFLICT,
            Some(DomainError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            Some(DomainError::Unauthorized(_)) => StatusCode::FORBIDDEN,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

/// Authorization context arrives as plain header values, never as a session.
fn requester(headers: &HeaderMap) -> Requester {
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok());
    let is_admin = headers
        .get("x-user-role")
        .and_then(|value| value.to_str().ok())
        .and_then(UserRole::parse)
        == Some(UserRole::Admin);
    Requester { user_id, is_admin }
}

fn require_user_id(headers: &HeaderMap) -> Result<i64, ServiceError> {
    requester(headers)
        .user_id
        .ok_or_else(|| ServiceError::new(StatusCode::BAD_REQUEST, "x-user-id header is required"))
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/db/schema-version", get(db_schema_version))
        .route("/v1/forms", post(form_create).get(form_list))
        .route("/v1/forms/:form_id", get(form_show).put(form_update).delete(form_delete))
        .route("/v1/forms/:form_id/publish", post(form_publish))
        .route("/v1/forms/:form_id/submissions", get(form_submissions))
        .route("/v1/forms/:form_id/files", get(form_files))
        .route("/v1/users", post(user_create))
        .route("/v1/submissions", post(submission_create))
        .route("/v1/submissions/mine", get(submission_mine))
        .route("/v1/submissions/:submission_id", get(submission_show))
        .route("/v1/submissions/:submission_id/files", get(submission_files))
        .route("/v1/files/:file_id", get(file_download))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(db = %args.db.display(), bind = %args.bind, "starting formforge service");
    let state = ServiceState { api: FormsApi::new(args.db) };
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn db_schema_version(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<formforge_store_sqlite::SchemaStatus>>, ServiceError> {
    let status = state.api.schema_status().map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(status)))
}

async fn form_create(
    State(state): State<ServiceState>,
    Json(request): Json<CreateFormRequest>,
) -> Result<Json<ServiceEnvelope<FormResponse>>, ServiceError> {
    let form = state.api.create_form(request).map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(form)))
}

async fn form_list(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<Vec<FormResponse>>>, ServiceError> {
    let forms = state.api.list_forms().map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(forms)))
}

async fn form_show(
    State(state): State<ServiceState>,
    Path(form_id): Path<String>,
) -> Result<Json<ServiceEnvelope<FormResponse>>, ServiceError> {
    let form = state.api.get_form(&form_id).map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(form)))
}

async fn form_update(
    State(state): State<ServiceState>,
    Path(form_id): Path<String>,
    Json(request): Json<UpdateFormRequest>,
) -> Result<Json<ServiceEnvelope<FormResponse>>, ServiceError> {
    let form =
        state.api.update_form(&form_id, request).map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(form)))
}

async fn form_delete(
    State(state): State<ServiceState>,
    Path(form_id): Path<String>,
) -> Result<Json<ServiceEnvelope<DeleteFormResult>>, ServiceError> {
    let result = state.api.delete_form(&form_id).map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(result)))
}

async fn form_publish(
    State(state): State<ServiceState>,
    Path(form_id): Path<String>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<ServiceEnvelope<FormResponse>>, ServiceError> {
    let form = state
        .api
        .publish_form(&form_id, &request.published_by)
        .map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(form)))
}

async fn form_submissions(
    State(state): State<ServiceState>,
    Path(form_id): Path<String>,
) -> Result<Json<ServiceEnvelope<Vec<SubmissionResponse>>>, ServiceError> {
    let submissions =
        state.api.form_submissions(&form_id).map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(submissions)))
}

async fn form_files(
    State(state): State<ServiceState>,
    Path(form_id): Path<String>,
) -> Result<Json<ServiceEnvelope<FormFilesResponse>>, ServiceError> {
    let files = state.api.form_files(&form_id).map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(files)))
}

async fn user_create(
    State(state): State<ServiceState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<ServiceEnvelope<formforge_core::User>>, ServiceError> {
    let user = state.api.create_user(request).map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(user)))
}

async fn submission_create(
    State(state): State<ServiceState>,
    Json(request): Json<SubmitFormRequest>,
) -> Result<Json<ServiceEnvelope<SubmissionResponse>>, ServiceError> {
    let submission =
        state.api.submit_form(request).map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(submission)))
}

async fn submission_mine(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<ServiceEnvelope<MySubmissionsResponse>>, ServiceError> {
    let user_id = require_user_id(&headers)?;
    let history = state.api.my_submissions(user_id).map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(history)))
}

async fn submission_show(
    State(state): State<ServiceState>,
    Path(submission_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<ServiceEnvelope<SubmissionResponse>>, ServiceError> {
    let submission = state
        .api
        .submission_details(submission_id, requester(&headers))
        .map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(submission)))
}

async fn submission_files(
    State(state): State<ServiceState>,
    Path(submission_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<ServiceEnvelope<Vec<FileResponse>>>, ServiceError> {
    let files = state
        .api
        .submission_files(submission_id, requester(&headers))
        .map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(envelope(files)))
}

async fn file_download(
    State(state): State<ServiceState>,
    Path(file_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let download = state
        .api
        .file_download(file_id, requester(&headers))
        .map_err(|err| ServiceError::from_api(&err))?;

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, download.mime_type),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", download.file_name),
            ),
        ],
        download.file_bytes,
    )
        .into_response())
}
