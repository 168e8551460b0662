//! Translation errors

use thiserror::Error;

use crate::sql::ConversionError;

/// Broad class of a translation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A selector does not match a supported structural pattern
    Shape,
    /// An expression cannot be traced to a column or fragment
    Resolution,
    /// A required argument is malformed or a configured limit is hit
    Precondition,
}

/// Errors that abort the translation of a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    #[error("Explicit construction of entity type '{0}' in join is not allowed")]
    ExplicitConstruction(String),

    #[error("List of member inits does not match for entity type '{0}'")]
    MemberInitMismatch(String),

    #[error("Key selectors '{outer}' and '{inner}' do not have the same shape")]
    KeyShapeMismatch { outer: String, inner: String },

    #[error("Member '{member}' of '{outer}' has no counterpart in '{inner}'")]
    KeyMemberMismatch {
        member: String,
        outer: String,
        inner: String,
    },

    #[error("Materializing a whole group-join group is not implemented")]
    GroupMaterializationUnsupported,

    #[error("Unknown entity type: {0}")]
    UnknownEntity(String),

    #[error("Unknown member '{member}' on entity type '{entity}'")]
    UnknownMember { entity: String, member: String },

    #[error("Parameter '{0}' is not bound in this scope")]
    UnboundParameter(String),

    #[error("Expression '{0}' cannot be converted to SQL")]
    UnresolvedExpression(String),

    #[error("Expression '{expression}' maps to {count} columns where one was expected")]
    NotScalar { expression: String, count: usize },

    #[error("Key columns of '{outer}' and '{inner}' do not match")]
    KeyColumnMismatch { outer: String, inner: String },

    #[error("'{0}' is not a group-join group")]
    NotAGroup(String),

    #[error("Query nesting depth exceeded (max: {max})")]
    DepthExceeded { max: usize },

    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Expected a lambda with {expected} parameter(s) for {argument}, found '{found}'")]
    InvalidLambda {
        argument: &'static str,
        expected: usize,
        found: String,
    },

    #[error("Expression '{0}' is not a query sequence")]
    NotASequence(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl TranslateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslateError::ExplicitConstruction(_)
            | TranslateError::MemberInitMismatch(_)
            | TranslateError::KeyShapeMismatch { .. }
            | TranslateError::KeyMemberMismatch { .. }
            | TranslateError::GroupMaterializationUnsupported => ErrorKind::Shape,
            TranslateError::UnknownEntity(_)
            | TranslateError::UnknownMember { .. }
            | TranslateError::UnboundParameter(_)
            | TranslateError::UnresolvedExpression(_)
            | TranslateError::NotScalar { .. }
            | TranslateError::KeyColumnMismatch { .. }
            | TranslateError::NotAGroup(_)
            | TranslateError::Conversion(_) => ErrorKind::Resolution,
            TranslateError::MissingArgument(_)
            | TranslateError::DepthExceeded { .. }
            | TranslateError::InvalidLambda { .. }
            | TranslateError::NotASequence(_) => ErrorKind::Precondition,
        }
    }
}

/// Result type for translation operations
pub type TranslateResult<T> = Result<T, TranslateError>;
