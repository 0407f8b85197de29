use thiserror::Error;

pub type FormResult<T> = Result<T, FormError>;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("file is required")]
    MissingFile,

    #[error("{0} is required")]
    MissingRequiredField(String),

    #[error("invalid keys payload: {0}")]
    InvalidKeysPayload(String),

    #[error("invalid template key: {0}")]
    InvalidKey(String),

    #[error("unknown organization unit: {0}")]
    UnknownOrgUnit(String),

    #[error("only Excel files (.xlsx, .xls) are allowed: {0}")]
    UnsupportedFileType(String),

    #[error("file too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: usize, limit: usize },

    #[error("spreadsheet produced no headers or no rows")]
    EmptyParseResult,

    #[error("failed to parse Excel file: {0}")]
    ParseFailure(String),

    #[error("template not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl FormError {
    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            FormError::Io(_) | FormError::Storage(_) | FormError::Yaml(_)
        )
    }
}

impl From<rusqlite::Error> for FormError {
    fn from(e: rusqlite::Error) -> Self {
        FormError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_human_readable() {
        assert_eq!(FormError::MissingFile.to_string(), "file is required");
        assert_eq!(
            FormError::MissingRequiredField("branchId".to_string()).to_string(),
            "branchId is required"
        );
        assert_eq!(
            FormError::FileTooLarge {
                size: 20,
                limit: 10
            }
            .to_string(),
            "file too large: 20 bytes (limit 10 bytes)"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(FormError::EmptyParseResult.is_client_error());
        assert!(FormError::NotFound("b|d|p".to_string()).is_client_error());
        assert!(!FormError::Storage("disk full".to_string()).is_client_error());
    }
}
