//! Scalar expressions and predicates
//!
//! Converts expressions appearing inside lambdas (key selectors, filters,
//! result selectors) into [`SqlExpr`] columns and search conditions. Member
//! chains are resolved through the [`Scope`]: when the bound context reads
//! from the scope's target fragment the SQL is used as is, otherwise the
//! column is projected out of the context's fragment and referenced by
//! ordinal.

use crate::ast::{BinaryOp, Expr, MemberBinding, Value};
use crate::sql::{ColumnType, CompareOp, Condition, Predicate, ScalarType, SearchCondition, SqlExpr};

use super::context::{nested_object, ConvertFlags, SqlInfo};
use super::error::{TranslateError, TranslateResult};
use super::scope::{Binding, Scope};
use super::Translation;

impl Translation<'_> {
    /// Convert an expression to the columns it denotes
    pub(crate) fn convert_expr(
        &mut self,
        scope: &Scope,
        expr: &Expr,
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        let expr = expr.unwrap();

        if let Some((root, path)) = expr.member_path() {
            let binding = scope
                .lookup(root)
                .ok_or_else(|| TranslateError::UnboundParameter(root.to_string()))?
                .clone();
            let path: Vec<String> = path.into_iter().map(str::to_string).collect();
            return self.resolve_binding(&binding, &path, flags);
        }

        match expr {
            Expr::Constant(value) => Ok(vec![SqlInfo::new(SqlExpr::Value(value.clone()), None)]),
            Expr::New {
                arguments, members, ..
            } if members.len() == arguments.len() => {
                let mut infos = Vec::new();
                for (member, argument) in members.iter().zip(arguments) {
                    let converted = self.convert_expr(scope, argument, flags)?;
                    infos.extend(converted.into_iter().map(|info| info.prefixed(member)));
                }
                Ok(infos)
            }
            Expr::MemberInit { bindings, .. } => {
                let mut infos = Vec::new();
                for binding in bindings {
                    let value = match binding {
                        MemberBinding::Assignment { expr, .. } => expr.clone(),
                        MemberBinding::Nested { bindings, .. } => nested_object(bindings)
                            .ok_or_else(|| TranslateError::UnresolvedExpression(binding.to_string()))?,
                        MemberBinding::List { .. } => {
                            return Err(TranslateError::UnresolvedExpression(binding.to_string()))
                        }
                    };
                    let converted = self.convert_expr(scope, &value, flags)?;
                    infos.extend(
                        converted
                            .into_iter()
                            .map(|info| info.prefixed(binding.member())),
                    );
                }
                Ok(infos)
            }
            Expr::Count(group) => Ok(vec![self.count_info(scope, group)?]),
            _ => Err(TranslateError::UnresolvedExpression(expr.to_string())),
        }
    }

    /// Resolve a member path of a bound parameter in the binding's target
    /// fragment
    fn resolve_binding(
        &mut self,
        binding: &Binding,
        path: &[String],
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        let source = self.contexts.query_of(binding.context);
        if source == binding.target {
            return self.sql_path(binding.context, path, flags);
        }
        let infos = self.sql_path(binding.context, path, flags)?;
        Ok(infos
            .into_iter()
            .map(|info| {
                let index = self.model.add_projection_column(source, info.sql.clone());
                SqlInfo {
                    sql: SqlExpr::Column {
                        query: source,
                        index,
                    },
                    ..info
                }
            })
            .collect())
    }

    /// The per-group count of `group` as seen from the scope
    fn count_info(&mut self, scope: &Scope, group: &Expr) -> TranslateResult<SqlInfo> {
        let not_a_group = || TranslateError::NotAGroup(group.to_string());
        let (root, path) = group.member_path().ok_or_else(not_a_group)?;
        if !path.is_empty() {
            return Err(not_a_group());
        }
        let binding = scope
            .lookup(root)
            .ok_or_else(|| TranslateError::UnboundParameter(root.to_string()))?
            .clone();

        let handle = self.request_cardinality(binding.context, group)?;
        let sql = if binding.target == handle.query {
            SqlExpr::SubQuery(handle.counter)
        } else {
            SqlExpr::Column {
                query: handle.query,
                index: handle.index,
            }
        };
        Ok(SqlInfo::new(sql, Some(ColumnType::new(ScalarType::Long))))
    }

    /// Convert an expression that must denote exactly one column
    pub(crate) fn convert_scalar(&mut self, scope: &Scope, expr: &Expr) -> TranslateResult<SqlInfo> {
        let mut infos = self.convert_expr(scope, expr, ConvertFlags::Field)?;
        if infos.len() != 1 {
            return Err(TranslateError::NotScalar {
                expression: expr.to_string(),
                count: infos.len(),
            });
        }
        Ok(infos.remove(0))
    }

    /// Translate a boolean lambda body into AND-combined conditions
    pub(crate) fn translate_predicate(
        &mut self,
        scope: &Scope,
        expr: &Expr,
    ) -> TranslateResult<Vec<Condition>> {
        match expr.unwrap() {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let mut conditions = self.translate_predicate(scope, left)?;
                conditions.extend(self.translate_predicate(scope, right)?);
                Ok(conditions)
            }
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let left = SearchCondition {
                    conditions: self.translate_predicate(scope, left)?,
                };
                let right = SearchCondition {
                    conditions: self.translate_predicate(scope, right)?,
                };
                let mut either = Condition::new(Predicate::Group(left));
                either.is_or = true;
                let group = SearchCondition {
                    conditions: vec![either, Condition::new(Predicate::Group(right))],
                };
                Ok(vec![Condition::new(Predicate::Group(group))])
            }
            Expr::Binary { op, left, right } => {
                if matches!(op, BinaryOp::Equal | BinaryOp::NotEqual) {
                    if let Some(conditions) = self.object_comparison(scope, left, scope, right)? {
                        if *op == BinaryOp::Equal {
                            return Ok(conditions);
                        }
                        return Ok(vec![Condition::negated(Predicate::Group(SearchCondition {
                            conditions,
                        }))]);
                    }
                }
                Ok(vec![self.scalar_comparison(scope, left, *op, scope, right)?])
            }
            other if other.member_path().is_some() => Ok(vec![self.scalar_comparison(
                scope,
                other,
                BinaryOp::Equal,
                scope,
                &Expr::Constant(Value::Bool(true)),
            )?]),
            other => Err(TranslateError::UnresolvedExpression(other.to_string())),
        }
    }

    /// Equality of two key expressions resolved in different scopes.
    ///
    /// Object-valued keys are compared member by member; the resulting
    /// conditions are flattened into one list.
    pub(crate) fn build_equality(
        &mut self,
        left_scope: &Scope,
        left: &Expr,
        right_scope: &Scope,
        right: &Expr,
    ) -> TranslateResult<Vec<Condition>> {
        if let Some(conditions) = self.object_comparison(left_scope, left, right_scope, right)? {
            return Ok(conditions);
        }
        Ok(vec![self.scalar_comparison(
            left_scope,
            left,
            BinaryOp::Equal,
            right_scope,
            right,
        )?])
    }

    /// Member-wise comparison of constructed objects or entity-typed keys.
    ///
    /// Returns `None` when either side is a plain scalar.
    fn object_comparison(
        &mut self,
        left_scope: &Scope,
        left: &Expr,
        right_scope: &Scope,
        right: &Expr,
    ) -> TranslateResult<Option<Vec<Condition>>> {
        let (left, right) = (left.unwrap(), right.unwrap());

        match (constructed_members(left)?, constructed_members(right)?) {
            (Some(left_members), Some(right_members)) => {
                let mut conditions = Vec::new();
                for (name, left_expr) in &left_members {
                    let right_expr = right_members
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, e)| e)
                        .ok_or_else(|| TranslateError::KeyMemberMismatch {
                            member: name.clone(),
                            outer: left.to_string(),
                            inner: right.to_string(),
                        })?;
                    conditions.extend(self.build_equality(
                        left_scope,
                        left_expr,
                        right_scope,
                        right_expr,
                    )?);
                }
                return Ok(Some(conditions));
            }
            (Some(_), None) | (None, Some(_)) => return Ok(None),
            (None, None) => {}
        }

        if !(self.is_composite(left_scope, left)? && self.is_composite(right_scope, right)?) {
            return Ok(None);
        }

        let mismatch = || TranslateError::KeyColumnMismatch {
            outer: left.to_string(),
            inner: right.to_string(),
        };
        let left_columns = self.convert_expr(left_scope, left, ConvertFlags::Key)?;
        let right_columns = self.convert_expr(right_scope, right, ConvertFlags::Key)?;
        if left_columns.len() != right_columns.len() {
            return Err(mismatch());
        }

        let mut conditions = Vec::with_capacity(left_columns.len());
        for l in &left_columns {
            let r = right_columns
                .iter()
                .find(|r| r.members == l.members)
                .ok_or_else(mismatch)?;
            conditions.push(Condition::new(Predicate::equal(l.sql.clone(), r.sql.clone())));
        }
        log::trace!(
            "compared {} and {} on {} key column(s)",
            left,
            right,
            conditions.len()
        );
        Ok(Some(conditions))
    }

    fn is_composite(&self, scope: &Scope, expr: &Expr) -> TranslateResult<bool> {
        let Some((root, path)) = expr.member_path() else {
            return Ok(false);
        };
        let binding = scope
            .lookup(root)
            .ok_or_else(|| TranslateError::UnboundParameter(root.to_string()))?;
        let path: Vec<String> = path.into_iter().map(str::to_string).collect();
        Ok(self.is_composite_path(binding.context, &path))
    }

    /// A single comparison, with literals normalized against the column
    /// they are compared with
    fn scalar_comparison(
        &mut self,
        left_scope: &Scope,
        left: &Expr,
        op: BinaryOp,
        right_scope: &Scope,
        right: &Expr,
    ) -> TranslateResult<Condition> {
        let compare = CompareOp::from_binary(op)
            .ok_or_else(|| TranslateError::UnresolvedExpression(op.as_str().to_string()))?;
        let left = self.convert_scalar(left_scope, left)?;
        let right = self.convert_scalar(right_scope, right)?;
        let left_sql = self.normalize_operand(left.sql, right.ty.as_ref())?;
        let right_sql = self.normalize_operand(right.sql, left.ty.as_ref())?;

        let predicate = match (&left_sql, compare, &right_sql) {
            (SqlExpr::Value(Value::Null), CompareOp::Equal | CompareOp::NotEqual, other)
            | (other, CompareOp::Equal | CompareOp::NotEqual, SqlExpr::Value(Value::Null)) => {
                Predicate::IsNull {
                    expr: other.clone(),
                    negated: compare == CompareOp::NotEqual,
                }
            }
            _ => Predicate::Compare {
                left: left_sql,
                op: compare,
                right: right_sql,
            },
        };
        Ok(Condition::new(predicate))
    }

    fn normalize_operand(
        &self,
        sql: SqlExpr,
        against: Option<&ColumnType>,
    ) -> TranslateResult<SqlExpr> {
        match (sql, against) {
            (SqlExpr::Value(value), Some(column)) => {
                let converted = self.converter.convert_for_comparison(&value, column)?;
                if converted != value {
                    log::trace!("normalized literal {} to {}", value, converted);
                }
                Ok(SqlExpr::Value(converted))
            }
            (sql, _) => Ok(sql),
        }
    }
}

/// Named members of a constructed object key.
///
/// Typed constructors without member names are paired positionally.
fn constructed_members(expr: &Expr) -> TranslateResult<Option<Vec<(String, Expr)>>> {
    match expr {
        Expr::New {
            arguments, members, ..
        } => {
            let names: Vec<String> = if members.len() == arguments.len() {
                members.clone()
            } else {
                (0..arguments.len()).map(|i| format!("#{}", i)).collect()
            };
            Ok(Some(names.into_iter().zip(arguments.iter().cloned()).collect()))
        }
        Expr::MemberInit { bindings, .. } => {
            let mut members = Vec::with_capacity(bindings.len());
            for binding in bindings {
                let value = match binding {
                    MemberBinding::Assignment { expr, .. } => expr.clone(),
                    MemberBinding::Nested { bindings, .. } => nested_object(bindings)
                        .ok_or_else(|| TranslateError::UnresolvedExpression(binding.to_string()))?,
                    MemberBinding::List { .. } => {
                        return Err(TranslateError::UnresolvedExpression(binding.to_string()))
                    }
                };
                members.push((binding.member().to_string(), value));
            }
            Ok(Some(members))
        }
        _ => Ok(None),
    }
}
