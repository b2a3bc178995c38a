use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CuratorError {
    #[error("invalid study accession: {0}")]
    InvalidStudyAccession(String),

    #[error("invalid run accession: {0}")]
    InvalidRunAccession(String),

    #[error("unknown database: {0} (expected sra or gds)")]
    InvalidDatabase(String),

    #[error("{0}")]
    Validation(String),

    #[error("curator backend request failed: {0}")]
    ApiHttp(String),

    #[error("curator backend returned status {status}: {message}")]
    ApiStatus { status: u16, message: String },

    #[error("unexpected response shape: {0}")]
    ApiDecode(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("terminal error: {0}")]
    Terminal(String),
}
