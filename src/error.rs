//! Typed error kinds surfaced by every component of the core (C1-C7).
//!
//! Call sites that merely propagate-and-annotate (the `demos` shim, external
//! collaborator glue) may keep using `anyhow`; the core itself always returns
//! `Result<_, BgtError>` so callers can match on the kind.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BgtError {
    #[error("truncated payload at offset {offset}: expected {expected} more byte(s)")]
    Truncated { offset: usize, expected: usize },

    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("invalid CIGAR: {0}")]
    InvalidCigar(String),

    #[error("too many sample groups (max {max})")]
    TooManyGroups { max: u8 },

    #[error("header mismatch between files: {0}")]
    HeaderMismatch(String),

    #[error("bad allele syntax in {0:?}")]
    BadAlleleSyntax(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("external collaborator failed: {0}")]
    Collaborator(String),
}

pub type Result<T> = std::result::Result<T, BgtError>;
