use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlSpyError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Formatting error: {0}")]
    FormatError(String),

    #[error("Report error at line {line}: {message}")]
    ReportError { line: u64, message: String },
}

impl From<std::fmt::Error> for SqlSpyError {
    fn from(err: std::fmt::Error) -> Self {
        SqlSpyError::FormatError(err.to_string())
    }
}
