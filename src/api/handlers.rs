//! API request handlers
//!
//! Handlers for all REST API endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, State},
    Json,
};
use serde::Serialize;

use super::error::ApiError;
use super::server::AppState;
use crate::error::FormError;
use crate::org::{OrgCatalog, OrgCombination};
use crate::service::{parse_keys_field, BulkTemplateInput, TemplateInput, Upload};
use crate::types::{ParsedTable, Template, TemplateKey};

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct ItemsResponse<T: Serialize> {
    pub items: Vec<T>,
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub uptime_seconds: u64,
}

/// GET /health - Health check
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        storage: state.service.backend().to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// Version response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub version: String,
    pub input_policy: String,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.version.clone(),
        input_policy: state.service.input_policy().to_string(),
    })
}

/// GET /api/templates - All templates, newest first
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> ApiResult<ItemsResponse<Template>> {
    let items = state.service.list().await?;
    Ok(Json(ItemsResponse { items }))
}

/// GET /api/templates/:key
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<Template> {
    Ok(Json(state.service.get(&key).await?))
}

/// POST /api/templates - Insert or overwrite one template
pub async fn upsert_template(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TemplateInput>, JsonRejection>,
) -> ApiResult<Template> {
    let Json(input) = payload?;
    Ok(Json(state.service.upsert(input).await?))
}

/// POST /api/templates/bulk - Same table under many keys
pub async fn bulk_upsert(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BulkTemplateInput>, JsonRejection>,
) -> ApiResult<OkResponse> {
    let Json(input) = payload?;
    let count = state.service.bulk_upsert(input).await?;
    Ok(Json(OkResponse {
        ok: true,
        count: Some(count),
    }))
}

/// DELETE /api/templates/:key
pub async fn remove_template(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<OkResponse> {
    state.service.remove(&key).await?;
    Ok(Json(OkResponse {
        ok: true,
        count: None,
    }))
}

/// Multipart body: the `file` part plus text fields.
struct UploadForm {
    upload: Option<Upload>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, ApiError> {
        let mut multipart = multipart.map_err(|r| ApiError::new(r.status(), r.body_text()))?;
        let mut form = UploadForm {
            upload: None,
            fields: HashMap::new(),
        };
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                form.upload = Some(Upload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else {
                let text = field.text().await?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    fn take_upload(&mut self) -> Result<Upload, FormError> {
        self.upload.take().ok_or(FormError::MissingFile)
    }

    fn field(&self, name: &str) -> Result<&str, FormError> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| FormError::MissingRequiredField(name.to_string()))
    }
}

/// POST /api/templates/import - Parse a spreadsheet and store it under one key
pub async fn import_one(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Template> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.take_upload()?;
    let key = TemplateKey::new(
        form.field("branchId")?,
        form.field("departmentId")?,
        form.field("positionId")?,
    )?;
    Ok(Json(state.service.import_one(key, upload).await?))
}

/// POST /api/templates/import-bulk - Parse once, store under every key in `keys`
pub async fn import_bulk(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<OkResponse> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.take_upload()?;
    let keys = parse_keys_field(form.field("keys")?)?;
    let count = state.service.import_bulk(keys, upload).await?;
    Ok(Json(OkResponse {
        ok: true,
        count: Some(count),
    }))
}

/// POST /api/templates/preview - Parse only
pub async fn preview(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ParsedTable> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.take_upload()?;
    Ok(Json(state.service.preview(upload).await?))
}

/// GET /api/org - The org catalog (empty when none is configured)
pub async fn org_catalog(State(state): State<Arc<AppState>>) -> Json<OrgCatalog> {
    Json(state.service.org().cloned().unwrap_or_default())
}

/// GET /api/org/combinations - Every branch/department/position key with its label
pub async fn org_combinations(
    State(state): State<Arc<AppState>>,
) -> Json<ItemsResponse<OrgCombination>> {
    let items = state
        .service
        .org()
        .map(OrgCatalog::combinations)
        .unwrap_or_default();
    Json(ItemsResponse { items })
}
