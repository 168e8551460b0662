//! Query-operation chains
//!
//! Walks a chain of `Table`/`Where`/`Select`/`Join`/`GroupJoin` calls from the
//! outermost call inwards, producing one context per operation.

use crate::ast::{Expr, QueryCall, Value};

use super::context::{ContextId, ContextKind, TableContext};
use super::error::{TranslateError, TranslateResult};
use super::join::lambda_arg;
use super::scope::Scope;
use super::Translation;

impl Translation<'_> {
    /// Translate a sequence expression into a context
    pub fn translate_sequence(&mut self, expr: &Expr, scope: &Scope) -> TranslateResult<ContextId> {
        if self.depth >= self.config.max_depth {
            return Err(TranslateError::DepthExceeded {
                max: self.config.max_depth,
            });
        }
        self.depth += 1;
        let result = self.translate_call(expr, scope);
        self.depth -= 1;
        result
    }

    fn translate_call(&mut self, expr: &Expr, scope: &Scope) -> TranslateResult<ContextId> {
        let call = match expr.unwrap() {
            Expr::Query(call) => call,
            Expr::Constant(Value::Null) => return Err(TranslateError::MissingArgument("sequence")),
            other => return Err(TranslateError::NotASequence(other.to_string())),
        };
        log::trace!("translating {} at depth {}", call.name(), self.depth);

        match call.as_ref() {
            QueryCall::Table { entity } => self.translate_table(entity),
            QueryCall::Where { source, predicate } => {
                let lambda = lambda_arg(predicate, "predicate", 1)?;
                let source = self.translate_sequence(source, scope)?;
                let query = self.contexts.query_of(source);
                let filter_scope = scope.child().bind(&lambda.parameters[0], source, query);
                let conditions = self.translate_predicate(&filter_scope, &lambda.body)?;
                self.model.add_where(query, conditions);
                Ok(source)
            }
            QueryCall::Select { source, selector } => {
                let lambda = lambda_arg(selector, "selector", 1)?;
                let source = self.translate_sequence(source, scope)?;
                Ok(self.add_select(ContextKind::Select, lambda.clone(), vec![source]))
            }
            QueryCall::Join(join) => self.translate_join(join, false, scope),
            QueryCall::GroupJoin(join) => self.translate_join(join, true, scope),
        }
    }

    fn translate_table(&mut self, entity: &str) -> TranslateResult<ContextId> {
        let describe = self
            .schema
            .get_entity(entity)
            .ok_or_else(|| TranslateError::UnknownEntity(entity.to_string()))?;
        let query = self.model.new_query();
        self.model
            .add_table(query, &describe.name, &describe.table_name);
        let entity = describe.name.clone();
        Ok(self
            .contexts
            .add(ContextKind::Table(TableContext { query, entity })))
    }
}
