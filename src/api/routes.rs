//! REST handlers.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::core::{ProjectId, RunStatus, Task, TaskSnapshot};

/// Brief formats accepted at submission.
const BRIEF_TYPES: [&str; 3] = ["text/plain", "text/markdown", "application/pdf"];

/// Default number of matches returned by the query endpoint.
const DEFAULT_QUERY_K: usize = 3;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub project_id: ProjectId,
    pub tasks: Vec<TaskSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub project_id: ProjectId,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub tasks: Vec<TaskSnapshot>,
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub q: String,
    pub k: Option<usize>,
}

/// `POST /projects`
pub async fn submit_project(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = brief_type(field.content_type(), field.file_name())?;
        let bytes = field.bytes().await?;
        let brief = decode_brief(&bytes);
        if brief.trim().is_empty() {
            return Err(ApiError::BadRequest("brief is empty".to_string()));
        }

        tracing::debug!(content_type, bytes = bytes.len(), "Brief upload received");
        let project_id = state.intake.submit(brief);
        return Ok((StatusCode::ACCEPTED, Json(SubmitResponse { project_id, tasks: Vec::new() })));
    }

    Err(ApiError::BadRequest("missing multipart field `file`".to_string()))
}

/// Decode an uploaded brief, dropping bytes that are not valid UTF-8.
fn decode_brief(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).chars().filter(|&c| c != char::REPLACEMENT_CHARACTER).collect()
}

/// Resolve the brief media type, falling back to the file extension when the
/// client sent none or a generic one.
fn brief_type(
    content_type: Option<&str>,
    file_name: Option<&str>,
) -> Result<&'static str, ApiError> {
    let essence = content_type
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

    let resolved = match essence {
        Some(ct) => ct,
        None => {
            let ext = file_name
                .and_then(|name| FsPath::new(name).extension())
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase);
            match ext.as_deref() {
                Some("txt") => "text/plain".to_string(),
                Some("md" | "markdown") => "text/markdown".to_string(),
                Some("pdf") => "application/pdf".to_string(),
                _ => content_type.unwrap_or("none").to_string(),
            }
        }
    };

    BRIEF_TYPES
        .into_iter()
        .find(|allowed| *allowed == resolved)
        .ok_or(ApiError::MalformedBriefInput(resolved))
}

fn parse_project_id(raw: &str) -> Result<ProjectId, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("project {raw}")))
}

/// `GET /projects/{id}`
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let project_id = parse_project_id(&id)?;
    let run = state
        .registry
        .run(project_id)
        .ok_or_else(|| ApiError::NotFound(format!("project {project_id}")))?;

    let tasks = state.registry.project_tasks(project_id).iter().map(Task::snapshot).collect();
    Ok(Json(ProjectResponse {
        project_id,
        status: run.status,
        created_at: run.created_at,
        tasks,
    }))
}

/// `GET /projects/{id}/raw`
pub async fn get_raw(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let project_id = parse_project_id(&id)?;
    state
        .artifacts
        .load_raw(project_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("raw decomposition for {project_id}")))
}

/// `GET /projects/{id}/query`
pub async fn query_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Value>, ApiError> {
    let project_id = parse_project_id(&id)?;
    let k = params.k.unwrap_or(DEFAULT_QUERY_K);

    let matches = state.retriever.query_records(project_id, &params.q, k).await?;
    Ok(Json(json!({ "matches": matches })))
}

/// `GET /tasks`
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskSnapshot>> {
    Json(state.registry.list().iter().map(Task::snapshot).collect())
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_brief_drops_invalid_bytes() {
        assert_eq!(decode_brief(b"Build a login page"), "Build a login page");
        assert_eq!(decode_brief(b"%PDF-1.7\n\xe2\x80\xff\xfe login \xc3"), "%PDF-1.7\n login ");
        assert_eq!(decode_brief("caf\u{e9}".as_bytes()), "caf\u{e9}");
    }

    #[test]
    fn test_brief_type_accepts_known_types() {
        assert_eq!(brief_type(Some("text/plain"), None).unwrap(), "text/plain");
        assert_eq!(
            brief_type(Some("text/markdown; charset=utf-8"), None).unwrap(),
            "text/markdown"
        );
        assert_eq!(brief_type(Some("Application/PDF"), None).unwrap(), "application/pdf");
    }

    #[test]
    fn test_brief_type_falls_back_to_extension() {
        assert_eq!(
            brief_type(Some("application/octet-stream"), Some("brief.md")).unwrap(),
            "text/markdown"
        );
        assert_eq!(brief_type(None, Some("brief.TXT")).unwrap(), "text/plain");
    }

    #[test]
    fn test_brief_type_rejects_others() {
        assert!(matches!(
            brief_type(Some("image/png"), Some("brief.md")),
            Err(ApiError::MalformedBriefInput(ct)) if ct == "image/png"
        ));
        assert!(matches!(
            brief_type(None, Some("brief.docx")),
            Err(ApiError::MalformedBriefInput(_))
        ));
    }

    #[test]
    fn test_parse_project_id() {
        assert!(parse_project_id("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_project_id(&id.to_string()).unwrap(), id);
    }
}
