//! Error handling for the gazetteer system
//!
//! This module provides idiomatic Rust error types using thiserror for
//! better error messages and proper error chain handling.

use thiserror::Error;

/// Main error type for the gazetteer system
#[derive(Error, Debug)]
pub enum GazetteerError {
    #[error("Identifier error: {0}")]
    Id(#[from] IdError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Vocabulary error: {0}")]
    Vocabulary(#[from] VocabularyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while deriving or repairing identifiers
#[derive(Error, Debug)]
pub enum IdError {
    #[error(
        "Identifiers cannot be zero-length strings, following normalization. \
         Original value \"{original}\" normalizes to \"\""
    )]
    Degenerate { original: String },

    #[error("No repair strategy produced a valid identifier from \"{original}\"")]
    Unrepairable { original: String },
}

/// Construction-time validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("At least one romanized form must be provided to initialize a cited string")]
    NoRomanizedForms,

    #[error("A record must carry at least one of \"attested\" or \"romanized\"")]
    EmptyRecord,

    #[error("No entity with identifier \"{0}\" is present in the collection")]
    UnknownId(String),
}

/// Merge precondition failures; a failed merge leaves the collection untouched
#[derive(Error, Debug)]
pub enum MergeError {
    #[error(
        "Cannot merge records with differing attested forms (\"{left}\" vs. \"{right}\")"
    )]
    AttestedConflict { left: String, right: String },

    #[error("Merging requires at least two identifiers, got {0}")]
    TooFewInputs(usize),

    #[error("\"{0}\" is already a place and cannot be promoted")]
    AlreadyPlace(String),
}

/// Errors from text-command and record parsing
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unknown lookup criterion \"{0}\" (expected \"id\" or \"text\")")]
    UnknownCriterion(String),

    #[error("Unknown boolean operator \"{0}\" (expected \"and\" or \"or\")")]
    UnknownOperator(String),

    #[error("Unknown facet \"{0}\" (expected \"value\", \"word\", \"phrase\", or \"substring\")")]
    UnknownFacet(String),

    #[error("Unknown object type \"{0}\"")]
    UnknownObjectType(String),

    #[error("Unsupported file format \"{0}\" (expected \"json\" or \"txt\")")]
    UnknownFormat(String),

    #[error("Unknown alignment criterion \"{0}\"")]
    UnknownAlignmentCriterion(String),

    #[error("Expected \"field:value\" but got \"{0}\"")]
    BadFieldPair(String),
}

/// Report a controlled-vocabulary constraint failure
#[derive(Error, Debug)]
#[error("Term \"{term}\" not found in vocabulary. Valid values: [{}]", .valid.join(", "))]
pub struct VocabularyError {
    pub term: String,
    pub valid: Vec<String>,
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, GazetteerError>;
