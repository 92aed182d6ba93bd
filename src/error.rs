use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CladeError {
    #[error("invalid as-of date: {0}")]
    InvalidDate(String),

    #[error("no version of {key} found as of {as_of}")]
    NoVersionFound { key: String, as_of: String },

    #[error("object store request failed: {0}")]
    S3Http(String),

    #[error("object store returned status {status}: {message}")]
    S3Status { status: u16, message: String },

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("download failed: {0}")]
    TransferHttp(String),

    #[error("download returned status {status}: {message}")]
    TransferStatus { status: u16, message: String },

    #[error("genome data package is missing expected members")]
    PackageIncomplete { members: Vec<String> },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("clade assignment data contains duplicate sequence")]
    DuplicateSequence,

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("failed to read delimited data: {0}")]
    Csv(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("nextclade invocation failed: {0}")]
    Nextclade(String),
}
