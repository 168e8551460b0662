//! Value conversion service
//!
//! The translator consults a [`ValueConverter`] whenever a literal is compared
//! against a mapped column, so that the literal matches the stored
//! representation: numeric widths are coerced, text is trimmed for
//! fixed-width columns and application nulls are mapped to null sentinels.

use std::cmp::Ordering;

use crate::ast::Value;

use super::error::{ConversionError, ConversionResult};
use super::schema::{FieldDescribe, ScalarType};

/// Storage description of a column a literal is compared against
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ColumnType {
    pub scalar: ScalarType,
    pub nullable: bool,
    /// Value stored in place of null
    pub null_value: Option<Value>,
    pub trimmable: bool,
}

impl ColumnType {
    pub fn new(scalar: ScalarType) -> Self {
        Self {
            scalar,
            nullable: true,
            null_value: None,
            trimmable: false,
        }
    }
}

impl From<&FieldDescribe> for ColumnType {
    fn from(field: &FieldDescribe) -> Self {
        Self {
            scalar: field.field_type,
            nullable: field.nullable,
            null_value: field.null_value.clone(),
            trimmable: field.trimmable,
        }
    }
}

/// Converts application-level literals into stored column values
pub trait ValueConverter {
    /// Normalize `value` before it is compared with a column of type `target`
    fn convert_for_comparison(&self, value: &Value, target: &ColumnType)
        -> ConversionResult<Value>;

    /// Stored representation of an application null for `target`
    fn convert_null(&self, target: &ColumnType) -> Value {
        match (&target.null_value, target.nullable) {
            (Some(sentinel), false) => sentinel.clone(),
            _ => Value::Null,
        }
    }

    /// Whether `value` is the null sentinel of `target`.
    ///
    /// Incomparable values never match.
    fn is_null_value(&self, target: &ColumnType, value: &Value) -> bool {
        let Some(sentinel) = &target.null_value else {
            return false;
        };
        match value.try_compare(sentinel) {
            Some(ordering) => ordering == Ordering::Equal,
            None => {
                log::warn!(
                    "cannot compare {} with null sentinel {} of {:?} column",
                    value,
                    sentinel,
                    target.scalar
                );
                false
            }
        }
    }
}

/// Configuration for [`DefaultValueConverter`]
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Trim trailing whitespace from text literals for every text column,
    /// not only the ones marked trimmable
    pub trim_text: bool,
    /// Allow integer literals against double columns and integral doubles
    /// against integer columns
    pub coerce_numeric: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            trim_text: false,
            coerce_numeric: true,
        }
    }
}

/// Converter used when the caller supplies none
#[derive(Debug, Clone, Default)]
pub struct DefaultValueConverter {
    config: ConverterConfig,
}

impl DefaultValueConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    fn incompatible(value: &Value, target: ScalarType) -> ConversionError {
        ConversionError::Incompatible {
            value: value.to_string(),
            target,
        }
    }
}

impl ValueConverter for DefaultValueConverter {
    fn convert_for_comparison(
        &self,
        value: &Value,
        target: &ColumnType,
    ) -> ConversionResult<Value> {
        if value.is_null() {
            return Ok(self.convert_null(target));
        }
        // A nullable column stores the application sentinel as NULL
        if target.nullable && self.is_null_value(target, value) {
            log::trace!("literal {} is the null sentinel of {:?}", value, target.scalar);
            return Ok(Value::Null);
        }

        let scalar = target.scalar;
        match (value, scalar) {
            (Value::Bool(_), ScalarType::Bool) => Ok(value.clone()),
            (Value::Int(i), ScalarType::Bool) if *i == 0 || *i == 1 => Ok(Value::Bool(*i == 1)),
            (Value::Int(i), ScalarType::Int) => {
                if i32::try_from(*i).is_ok() {
                    Ok(Value::Int(*i))
                } else {
                    Err(ConversionError::OutOfRange {
                        value: value.to_string(),
                        target: scalar,
                    })
                }
            }
            (Value::Int(_), ScalarType::Long) => Ok(value.clone()),
            (Value::Int(i), ScalarType::Double) if self.config.coerce_numeric => {
                Ok(Value::Double(*i as f64))
            }
            (Value::Double(_), ScalarType::Double) => Ok(value.clone()),
            (Value::Double(d), ScalarType::Int | ScalarType::Long) if self.config.coerce_numeric => {
                if d.fract() == 0.0 {
                    let converted = Value::Int(*d as i64);
                    self.convert_for_comparison(&converted, target)
                } else {
                    Err(ConversionError::LossOfPrecision {
                        value: value.to_string(),
                        target: scalar,
                    })
                }
            }
            (Value::Text(s), ScalarType::Text) => {
                if target.trimmable || self.config.trim_text {
                    Ok(Value::Text(s.trim_end().to_string()))
                } else {
                    Ok(value.clone())
                }
            }
            _ => Err(Self::incompatible(value, scalar)),
        }
    }
}
