//! Expression to relational-query translation
//!
//! Turns a query expression ([`crate::ast::Expr`]) into fragments of a
//! [`SqlModel`] plus a [`Shape`] describing how rows of the root fragment
//! rebuild the selected objects.
//!
//! # Example
//!
//! ```rust
//! use relquery::ast::Expr;
//! use relquery::sql::{EntityDescribe, FieldDescribe, MappingSchema, ScalarType};
//! use relquery::translate::{translate_query, TranslatorConfig};
//!
//! let mut schema = MappingSchema::new();
//! schema.add_entity(
//!     EntityDescribe::new("Outer").with_field(FieldDescribe::new("Id", ScalarType::Int)),
//! );
//! schema.add_entity(
//!     EntityDescribe::new("Inner")
//!         .with_field(FieldDescribe::new("OuterId", ScalarType::Int))
//!         .with_field(FieldDescribe::new("Val", ScalarType::Text)),
//! );
//!
//! let query = Expr::join(
//!     Expr::table("Outer"),
//!     Expr::table("Inner"),
//!     Expr::lambda(["o"], Expr::field("o", "Id")),
//!     Expr::lambda(["i"], Expr::field("i", "OuterId")),
//!     Expr::lambda(["o", "i"], Expr::anonymous([("Val", Expr::field("i", "Val"))])),
//! );
//!
//! let translated = translate_query(&query, &schema, TranslatorConfig::default()).unwrap();
//! let root = translated.model.query(translated.root);
//! assert_eq!(root.joins().count(), 1);
//! assert_eq!(translated.shape.columns(), vec![0]);
//! ```

mod context;
mod error;
mod expression;
mod join;
mod scope;
mod sequence;
mod shape;

pub use context::{
    ContextId, ContextKind, ContextTree, ConvertFlags, CounterHandle, GroupJoinSubQueryContext,
    ParseContext, SelectContext, SqlInfo, SubQueryContext, TableContext,
};
pub use error::{ErrorKind, TranslateError, TranslateResult};
pub use join::{check_result_selector, decompose_keys};
pub use scope::{Binding, Scope};
pub use shape::Shape;

use crate::ast::Expr;
use crate::sql::{DefaultValueConverter, MappingSchema, QueryId, SqlModel, ValueConverter};

/// Translator settings
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    /// Prefix of generated fragment aliases
    pub alias_prefix: String,
    /// Give every unaliased fragment a generated alias when finishing
    pub assign_default_aliases: bool,
    /// Build the counter copy of the inner sequence for plain joins too
    pub build_counter_for_joins: bool,
    /// Maximum nesting of query operations
    pub max_depth: usize,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            alias_prefix: "t".to_string(),
            assign_default_aliases: true,
            build_counter_for_joins: false,
            max_depth: 64,
        }
    }
}

/// Output of a completed translation
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TranslatedQuery {
    pub model: SqlModel,
    /// Fragment producing the result rows
    pub root: QueryId,
    /// How a root row is materialized
    pub shape: Shape,
}

/// State of one translation: the context arena and the model being built
pub struct Translation<'a> {
    schema: &'a MappingSchema,
    converter: Box<dyn ValueConverter + Send + 'a>,
    config: TranslatorConfig,
    contexts: ContextTree,
    model: SqlModel,
    depth: usize,
}

impl<'a> Translation<'a> {
    pub fn new(schema: &'a MappingSchema, config: TranslatorConfig) -> Self {
        Self::with_converter(schema, Box::new(DefaultValueConverter::default()), config)
    }

    pub fn with_converter(
        schema: &'a MappingSchema,
        converter: Box<dyn ValueConverter + Send + 'a>,
        config: TranslatorConfig,
    ) -> Self {
        Self {
            schema,
            converter,
            config,
            contexts: ContextTree::new(),
            model: SqlModel::new(),
            depth: 0,
        }
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn model(&self) -> &SqlModel {
        &self.model
    }

    pub fn contexts(&self) -> &ContextTree {
        &self.contexts
    }

    /// Translate a top-level sequence expression
    pub fn translate(&mut self, expr: &Expr) -> TranslateResult<ContextId> {
        self.translate_sequence(expr, &Scope::root())
    }

    /// Materialize the root context and hand over the model
    pub fn finish(mut self, root: ContextId) -> TranslateResult<TranslatedQuery> {
        let shape = self.build_expression(root, None, 0)?;
        let root = self.contexts.query_of(root);
        if self.config.assign_default_aliases {
            self.model.assign_default_aliases(&self.config.alias_prefix);
        }
        log::debug!("translated query: {}", self.model.display(root));
        Ok(TranslatedQuery {
            model: self.model,
            root,
            shape,
        })
    }
}

/// Translate `expr` against `schema` with the default value converter
pub fn translate_query(
    expr: &Expr,
    schema: &MappingSchema,
    config: TranslatorConfig,
) -> TranslateResult<TranslatedQuery> {
    let mut translation = Translation::new(schema, config);
    let root = translation.translate(expr)?;
    translation.finish(root)
}
