//! Runtime configuration for the server and the store-backed CLI commands.

use clap::Args;
use std::path::PathBuf;

use crate::error::FormResult;
use crate::ingest::{
    FlexibleRole, HeaderVocabulary, IngestOptions, InputPolicy, TemplateParser, DEFAULT_MAX_CELLS,
};
use crate::org::OrgCatalog;
use crate::service::{TemplateService, UploadPolicy, DEFAULT_MAX_UPLOAD_BYTES};
use crate::store::{open_store, StorageConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageConfig,
    pub org_catalog: Option<PathBuf>,
    /// YAML header vocabulary replacing `ingest.vocabulary` when set.
    pub vocabulary: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub ingest: IngestOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            storage: StorageConfig::default(),
            org_catalog: None,
            vocabulary: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ingest: IngestOptions::default(),
        }
    }
}

impl AppConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Ingest options with the vocabulary file (if any) loaded.
    pub fn ingest_options(&self) -> FormResult<IngestOptions> {
        let mut options = self.ingest.clone();
        if let Some(path) = &self.vocabulary {
            options.vocabulary = HeaderVocabulary::load(path)?;
        }
        Ok(options)
    }

    /// Open the store, load the org catalog (if any) and wire the service.
    pub fn build_service(&self) -> FormResult<TemplateService> {
        let parser = TemplateParser::new(&self.ingest_options()?);
        let store = open_store(&self.storage);
        let mut service = TemplateService::new(store, parser)
            .with_upload_policy(UploadPolicy {
                max_bytes: self.max_upload_bytes,
            });
        if let Some(path) = &self.org_catalog {
            service = service.with_org(OrgCatalog::load(path)?);
        }
        Ok(service)
    }
}

/// Server flags, shared by `formreview serve` and `formreview-server`.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "FORMREVIEW_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "FORMREVIEW_PORT")]
    pub port: u16,

    /// SQLite database file (templates are kept in memory when omitted)
    #[arg(long, env = "FORMREVIEW_DB")]
    pub db: Option<PathBuf>,

    /// YAML org catalog used to validate branch/department/position ids
    #[arg(long, env = "FORMREVIEW_ORG_CATALOG")]
    pub org_catalog: Option<PathBuf>,

    /// YAML header vocabulary (sequence, label, planned, actual, referenceScore)
    #[arg(long, env = "FORMREVIEW_VOCABULARY")]
    pub vocabulary: Option<PathBuf>,

    /// Maximum upload size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "FORMREVIEW_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    /// Largest sheet used range accepted, in cells (rows x columns)
    #[arg(long, default_value_t = DEFAULT_MAX_CELLS, env = "FORMREVIEW_MAX_CELLS")]
    pub max_cells: usize,

    /// Input-cell policy: italic-label, fill-color or fill-color-restricted
    #[arg(long, default_value = "italic-label", env = "FORMREVIEW_INPUT_POLICY")]
    pub input_policy: InputPolicy,

    /// Third column the flexible header strategy requires
    #[arg(long, value_enum, default_value_t = FlexibleRole::ReferenceScore, env = "FORMREVIEW_FLEXIBLE_ROLE")]
    pub flexible_role: FlexibleRole,
}

impl ServeArgs {
    pub fn into_config(self) -> AppConfig {
        AppConfig {
            host: self.host,
            port: self.port,
            storage: StorageConfig { database: self.db },
            org_catalog: self.org_catalog,
            vocabulary: self.vocabulary,
            max_upload_bytes: self.max_upload_bytes,
            ingest: IngestOptions {
                flexible_role: self.flexible_role,
                input_policy: self.input_policy,
                max_cells: self.max_cells,
                ..IngestOptions::default()
            },
        }
    }
}
