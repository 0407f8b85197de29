//! Template service: upload checks, parse-once imports and CRUD over a store.

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{FormError, FormResult};
use crate::ingest::{InputPolicy, TemplateParser};
use crate::org::OrgCatalog;
use crate::store::TemplateStore;
use crate::types::{ParsedTable, TableCell, Template, TemplateDraft, TemplateKey};

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_MIME: &str = "application/vnd.ms-excel";
pub const OCTET_STREAM_MIME: &str = "application/octet-stream";

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// An uploaded spreadsheet.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Read a file from disk, taking its name from the path.
    pub fn from_path(path: impl AsRef<Path>) -> FormResult<Self> {
        let path = path.as_ref();
        Ok(Self {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            content_type: None,
            bytes: std::fs::read(path)?,
        })
    }

    fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadPolicy {
    /// Size limit first, then MIME type. `application/octet-stream` and a
    /// missing MIME type are accepted only with an `.xlsx`/`.xls` name.
    pub fn check(&self, upload: &Upload) -> FormResult<()> {
        if upload.bytes.len() > self.max_bytes {
            return Err(FormError::FileTooLarge {
                size: upload.bytes.len(),
                limit: self.max_bytes,
            });
        }

        let mime = upload
            .content_type
            .as_deref()
            .map(|m| m.split(';').next().unwrap_or(m).trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty());

        match mime.as_deref() {
            Some(XLSX_MIME) | Some(XLS_MIME) => Ok(()),
            Some(OCTET_STREAM_MIME) | None => match upload.extension().as_deref() {
                Some("xlsx") | Some("xls") => Ok(()),
                Some(ext) => Err(FormError::UnsupportedFileType(format!(
                    "invalid extension .{}",
                    ext
                ))),
                None => Err(FormError::UnsupportedFileType(
                    "file name has no extension".to_string(),
                )),
            },
            Some(other) => Err(FormError::UnsupportedFileType(format!(
                "received {}",
                other
            ))),
        }
    }
}

/// Body of a single upsert. Every field is optional here so a missing one is
/// reported by name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInput {
    pub branch_id: Option<String>,
    pub department_id: Option<String>,
    pub position_id: Option<String>,
    pub headers: Option<Vec<String>>,
    pub rows: Option<Vec<Vec<TableCell>>>,
    pub source_file: Option<String>,
}

/// Body of a bulk upsert: one table, many keys.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTemplateInput {
    pub keys: Option<Vec<String>>,
    pub headers: Option<Vec<String>>,
    pub rows: Option<Vec<Vec<TableCell>>>,
    pub source_file: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> FormResult<T> {
    value.ok_or_else(|| FormError::MissingRequiredField(field.to_string()))
}

/// Decode the multipart `keys` field: a non-empty JSON array of
/// `branchId|departmentId|positionId` strings. Duplicates are dropped.
pub fn parse_keys_field(raw: &str) -> FormResult<Vec<TemplateKey>> {
    let keys: Vec<String> = serde_json::from_str(raw).map_err(|e| {
        FormError::InvalidKeysPayload(format!("expected a JSON array of strings: {}", e))
    })?;
    parse_key_list(&keys)
}

fn parse_key_list(keys: &[String]) -> FormResult<Vec<TemplateKey>> {
    if keys.is_empty() {
        return Err(FormError::InvalidKeysPayload("keys must not be empty".to_string()));
    }
    let mut parsed: Vec<TemplateKey> = Vec::with_capacity(keys.len());
    for raw in keys {
        let key = TemplateKey::parse(raw)?;
        if !parsed.contains(&key) {
            parsed.push(key);
        }
    }
    Ok(parsed)
}

pub struct TemplateService {
    store: Arc<dyn TemplateStore>,
    parser: Arc<TemplateParser>,
    org: Option<Arc<OrgCatalog>>,
    upload_policy: UploadPolicy,
}

impl TemplateService {
    pub fn new(store: Arc<dyn TemplateStore>, parser: TemplateParser) -> Self {
        Self {
            store,
            parser: Arc::new(parser),
            org: None,
            upload_policy: UploadPolicy::default(),
        }
    }

    pub fn with_org(mut self, org: OrgCatalog) -> Self {
        self.org = Some(Arc::new(org));
        self
    }

    pub fn with_upload_policy(mut self, policy: UploadPolicy) -> Self {
        self.upload_policy = policy;
        self
    }

    pub fn org(&self) -> Option<&OrgCatalog> {
        self.org.as_deref()
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub fn input_policy(&self) -> InputPolicy {
        self.parser.policy()
    }

    /// Syntactic check always; catalog membership when a catalog is loaded.
    pub fn validate_key(&self, key: &TemplateKey) -> FormResult<()> {
        match &self.org {
            Some(org) => org.validate(key),
            None => Ok(()),
        }
    }

    /// Check and parse an upload without storing anything.
    pub async fn preview(&self, upload: Upload) -> FormResult<ParsedTable> {
        self.upload_policy.check(&upload)?;
        let parser = Arc::clone(&self.parser);
        tokio::task::spawn_blocking(move || parser.parse_bytes(&upload.bytes))
            .await
            .map_err(|e| FormError::ParseFailure(format!("parser task failed: {}", e)))?
    }

    /// Parse an upload that is about to be stored; empty results are rejected.
    async fn parse_for_import(&self, upload: Upload) -> FormResult<(ParsedTable, Option<String>)> {
        let file_name = upload.file_name.clone();
        let table = self.preview(upload).await?;
        if table.is_empty() {
            return Err(FormError::EmptyParseResult);
        }
        Ok((table, file_name))
    }

    pub async fn import_one(&self, key: TemplateKey, upload: Upload) -> FormResult<Template> {
        self.validate_key(&key)?;
        let (table, source_file) = self.parse_for_import(upload).await?;
        let template = self
            .store
            .upsert(TemplateDraft::from_table(key, &table, source_file))
            .await?;
        info!(
            key = %template.key,
            mode = %table.meta.mode,
            rows = template.rows.len(),
            "template imported"
        );
        Ok(template)
    }

    /// Parse once and upsert the same table under every key in one store
    /// batch. Returns the number of keys written.
    pub async fn import_bulk(&self, keys: Vec<TemplateKey>, upload: Upload) -> FormResult<usize> {
        let keys = self.checked_keys(keys)?;
        let (table, source_file) = self.parse_for_import(upload).await?;
        let drafts = keys
            .iter()
            .map(|key| TemplateDraft::from_table(key.clone(), &table, source_file.clone()))
            .collect();
        self.store.upsert_many(drafts).await?;
        info!(
            count = keys.len(),
            mode = %table.meta.mode,
            rows = table.rows.len(),
            "template imported for multiple keys"
        );
        Ok(keys.len())
    }

    pub async fn upsert(&self, input: TemplateInput) -> FormResult<Template> {
        let key = TemplateKey::new(
            required(input.branch_id, "branchId")?,
            required(input.department_id, "departmentId")?,
            required(input.position_id, "positionId")?,
        )?;
        self.validate_key(&key)?;
        let draft = TemplateDraft {
            key,
            headers: required(input.headers, "headers")?,
            rows: required(input.rows, "rows")?,
            source_file: input.source_file,
        };
        self.store.upsert(draft).await
    }

    pub async fn bulk_upsert(&self, input: BulkTemplateInput) -> FormResult<usize> {
        let keys = parse_key_list(&required(input.keys, "keys")?)?;
        let keys = self.checked_keys(keys)?;
        let headers = required(input.headers, "headers")?;
        let rows = required(input.rows, "rows")?;
        let drafts = keys
            .iter()
            .map(|key| TemplateDraft {
                key: key.clone(),
                headers: headers.clone(),
                rows: rows.clone(),
                source_file: input.source_file.clone(),
            })
            .collect();
        Ok(self.store.upsert_many(drafts).await?.len())
    }

    pub async fn list(&self) -> FormResult<Vec<Template>> {
        self.store.list().await
    }

    pub async fn get(&self, key: &str) -> FormResult<Template> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| FormError::NotFound(key.to_string()))
    }

    pub async fn remove(&self, key: &str) -> FormResult<()> {
        if self.store.remove(key).await? {
            info!(key, "template removed");
            Ok(())
        } else {
            Err(FormError::NotFound(key.to_string()))
        }
    }

    fn checked_keys(&self, keys: Vec<TemplateKey>) -> FormResult<Vec<TemplateKey>> {
        if keys.is_empty() {
            return Err(FormError::InvalidKeysPayload("keys must not be empty".to_string()));
        }
        for key in &keys {
            self.validate_key(key)?;
        }
        Ok(keys)
    }
}
