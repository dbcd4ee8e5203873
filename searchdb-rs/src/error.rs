//! Error types and exit codes for searchdb.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Process exit codes used by the CLI.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const DOCUMENT_NOT_FOUND: i32 = 2;
    pub const INVALID_QUERY: i32 = 3;
    pub const IO_ERROR: i32 = 4;
}

/// Kind of failure raised while tokenizing, building or evaluating a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    UnexpectedGroupEnd,
    UnexpectedQuoteEnd,
    MissingOrRightOperand,
    MissingAndRightOperand,
    MissingNotRightOperand,
    MissingPropertyValue,
    MissingFunctionGroup,
    UnexpectedOperator,
    MissingLeftOperand,
    MissingRightOperand,
    UnexpectedOperand,
    UnexpectedToken,
    InvalidLeafNode,
    InvalidOperator,
    InvalidPropertyDeclaration,
}

impl QueryErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryErrorKind::UnexpectedGroupEnd => "UnexpectedGroupEnd",
            QueryErrorKind::UnexpectedQuoteEnd => "UnexpectedQuoteEnd",
            QueryErrorKind::MissingOrRightOperand => "MissingOrRightOperand",
            QueryErrorKind::MissingAndRightOperand => "MissingAndRightOperand",
            QueryErrorKind::MissingNotRightOperand => "MissingNotRightOperand",
            QueryErrorKind::MissingPropertyValue => "MissingPropertyValue",
            QueryErrorKind::MissingFunctionGroup => "MissingFunctionGroup",
            QueryErrorKind::UnexpectedOperator => "UnexpectedOperator",
            QueryErrorKind::MissingLeftOperand => "MissingLeftOperand",
            QueryErrorKind::MissingRightOperand => "MissingRightOperand",
            QueryErrorKind::UnexpectedOperand => "UnexpectedOperand",
            QueryErrorKind::UnexpectedToken => "UnexpectedToken",
            QueryErrorKind::InvalidLeafNode => "InvalidLeafNode",
            QueryErrorKind::InvalidOperator => "InvalidOperator",
            QueryErrorKind::InvalidPropertyDeclaration => "InvalidPropertyDeclaration",
        }
    }
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query parse or evaluation failure.
///
/// `token` is the substring of the query text the failure was detected at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at `{token}`)")]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub token: String,
    pub message: String,
}

impl QueryError {
    pub fn new(kind: QueryErrorKind, token: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            token: token.into(),
            message: message.into(),
        }
    }
}

/// Main error type for searchdb operations.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    Query(#[from] QueryError),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid database file: {0}")]
    InvalidDatabase(String),

    #[error("Database file not found at: {0}")]
    DatabaseNotFound(PathBuf),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("{0}")]
    Other(String),
}

impl SearchError {
    /// Returns the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SearchError::DocumentNotFound(_) | SearchError::DatabaseNotFound(_) => {
                exit_code::DOCUMENT_NOT_FOUND
            }
            SearchError::Query(_) => exit_code::INVALID_QUERY,
            SearchError::Io(_) => exit_code::IO_ERROR,
            _ => exit_code::GENERAL_ERROR,
        }
    }
}

/// Result type alias for searchdb operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    GeneralError,
    DocumentNotFound,
}

impl ExitCode {
    /// Convert to exit code integer.
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Success => exit_code::SUCCESS,
            ExitCode::GeneralError => exit_code::GENERAL_ERROR,
            ExitCode::DocumentNotFound => exit_code::DOCUMENT_NOT_FOUND,
        }
    }
}
