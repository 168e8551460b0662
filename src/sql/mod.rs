//! Relational query model, mapping schema and value conversion
//!
//! This module holds everything the translator writes into or reads from
//! while building a query:
//!
//! 1. A [`MappingSchema`] describing entity types, their tables, fields,
//!    primary keys and object-valued associations
//! 2. The [`SqlModel`] arena of query fragments the translator produces
//! 3. The [`ValueConverter`] service used to normalize literals before they
//!    are compared with mapped columns
//!
//! # Example
//!
//! ```rust
//! use relquery::sql::{EntityDescribe, FieldDescribe, MappingSchema, ScalarType};
//!
//! let mut schema = MappingSchema::new();
//! schema.add_entity(
//!     EntityDescribe::new("Customer")
//!         .with_field(FieldDescribe::new("Id", ScalarType::Int).with_primary_key(0))
//!         .with_field(FieldDescribe::new("Name", ScalarType::Text)),
//! );
//!
//! let customer = schema.get_entity("customer").unwrap();
//! assert_eq!(customer.table_name, "customer");
//! assert_eq!(customer.primary_key().len(), 1);
//! ```

pub mod convert;
pub mod error;
pub mod query;
pub mod schema;

pub use convert::{ColumnType, ConverterConfig, DefaultValueConverter, ValueConverter};
pub use error::{ConversionError, ConversionResult};
pub use query::{
    Alias, CompareOp, Condition, JoinKind, JoinRef, JoinedTable, Predicate, QueryId,
    SearchCondition, SelectColumn, Source, SqlExpr, SqlModel, SqlQuery, TableSource,
};
pub use schema::{
    AssociationDescribe, EntityDescribe, FieldDescribe, MappingSchema, ScalarType, SchemaBuilder,
};
