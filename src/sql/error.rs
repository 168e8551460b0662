//! Error types for value conversion

use thiserror::Error;

use super::schema::ScalarType;

/// Errors raised while normalizing literal values against column types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Cannot convert {value} to {target:?}")]
    Incompatible { value: String, target: ScalarType },

    #[error("Value {value} is out of range for {target:?}")]
    OutOfRange { value: String, target: ScalarType },

    #[error("Cannot convert {value} to {target:?} without losing precision")]
    LossOfPrecision { value: String, target: ScalarType },
}

/// Result type for conversion operations
pub type ConversionResult<T> = Result<T, ConversionError>;
