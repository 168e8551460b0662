//! Join and group-join translation
//!
//! A `Join`/`GroupJoin` call becomes:
//!
//! ```text
//! W_o = SELECT .. FROM (outer) o INNER JOIN (W_i) i ON <key equalities>
//! W_c = SELECT COUNT(*) FROM (inner copy) WHERE <key equalities>   -- group joins
//! ```
//!
//! The outer and inner sequences are each wrapped in a fragment of their own.
//! Key selectors are decomposed into pairs and each pair contributes its
//! equality conditions to the join. For group joins every pair also
//! contributes a duplicate, against a second copy of the inner sequence, to
//! the `WHERE` of the counter fragment. The counter is correlated to the
//! outer wrapper and stays out of the projection until a per-group count is
//! requested.

use crate::ast::{Expr, JoinCall, Lambda, MemberBinding, Value};
use crate::sql::{JoinKind, SqlExpr};

use super::context::{ContextId, ContextKind, CounterHandle};
use super::error::{TranslateError, TranslateResult};
use super::scope::Scope;
use super::Translation;

/// Extract a lambda argument, checking its arity
pub(crate) fn lambda_arg<'e>(
    expr: &'e Expr,
    argument: &'static str,
    arity: usize,
) -> TranslateResult<&'e Lambda> {
    if matches!(expr.unwrap(), Expr::Constant(Value::Null)) {
        return Err(TranslateError::MissingArgument(argument));
    }
    match expr.as_lambda() {
        Some(lambda) if lambda.parameters.len() == arity => Ok(lambda),
        _ => Err(TranslateError::InvalidLambda {
            argument,
            expected: arity,
            found: expr.to_string(),
        }),
    }
}

/// Reject result selectors that construct an entity explicitly
pub fn check_result_selector(selector: &Lambda) -> TranslateResult<()> {
    match selector.body.unwrap() {
        Expr::MemberInit {
            type_name,
            arguments,
            bindings,
        } => {
            let explicit = !arguments.is_empty()
                || bindings.is_empty()
                || bindings.iter().any(|b| !b.is_assignment());
            if explicit {
                return Err(TranslateError::ExplicitConstruction(type_name.clone()));
            }
            Ok(())
        }
        Expr::New {
            type_name: Some(type_name),
            arguments,
            ..
        } if !arguments.is_empty() => Err(TranslateError::ExplicitConstruction(type_name.clone())),
        _ => Ok(()),
    }
}

/// Pair up the components of an outer and an inner key selector.
///
/// Tuples pair positionally, member initializations pair in declaration
/// order and must bind the same members, anything else is a single pair.
pub fn decompose_keys<'e>(outer: &'e Expr, inner: &'e Expr) -> TranslateResult<Vec<(&'e Expr, &'e Expr)>> {
    let shape_mismatch = || TranslateError::KeyShapeMismatch {
        outer: outer.to_string(),
        inner: inner.to_string(),
    };

    match (outer.unwrap(), inner.unwrap()) {
        (Expr::New { arguments: o, .. }, Expr::New { arguments: i, .. }) => {
            if o.len() != i.len() {
                return Err(shape_mismatch());
            }
            Ok(o.iter().zip(i).collect())
        }
        (
            Expr::MemberInit {
                type_name,
                bindings: o,
                ..
            },
            Expr::MemberInit { bindings: i, .. },
        ) => {
            if o.len() != i.len() {
                return Err(TranslateError::MemberInitMismatch(type_name.clone()));
            }
            o.iter()
                .zip(i)
                .map(|pair| match pair {
                    (
                        MemberBinding::Assignment { member: a, expr: x },
                        MemberBinding::Assignment { member: b, expr: y },
                    ) if a == b => Ok((x, y)),
                    _ => Err(TranslateError::MemberInitMismatch(type_name.clone())),
                })
                .collect()
        }
        (Expr::New { .. } | Expr::MemberInit { .. }, _) | (_, Expr::New { .. } | Expr::MemberInit { .. }) => {
            Err(shape_mismatch())
        }
        (o, i) => Ok(vec![(o, i)]),
    }
}

impl Translation<'_> {
    /// Translate a `Join` (or, with `is_group_join`, a `GroupJoin`) call,
    /// returning the result context
    pub fn translate_join(
        &mut self,
        call: &JoinCall,
        is_group_join: bool,
        scope: &Scope,
    ) -> TranslateResult<ContextId> {
        let result = lambda_arg(&call.result, "result selector", 2)?;
        check_result_selector(result)?;
        let outer_key = lambda_arg(&call.outer_key, "outer key selector", 1)?;
        let inner_key = lambda_arg(&call.inner_key, "inner key selector", 1)?;
        let pairs = decompose_keys(&outer_key.body, &inner_key.body)?;
        if pairs.is_empty() {
            return Err(TranslateError::KeyShapeMismatch {
                outer: outer_key.body.to_string(),
                inner: inner_key.body.to_string(),
            });
        }

        let outer = self.translate_sequence(&call.outer, scope)?;
        let inner = self.translate_sequence(&call.inner, scope)?;
        let counter = if is_group_join || self.config.build_counter_for_joins {
            Some(self.translate_sequence(&call.inner, scope)?)
        } else {
            None
        };

        let outer = self.wrap_sub_query(outer, false);
        let inner = self.wrap_sub_query(inner, is_group_join);
        let counter = counter.map(|c| self.wrap_sub_query(c, false));

        let sql = self.contexts.query_of(outer);
        let join = self
            .model
            .add_join(sql, JoinKind::Inner, self.contexts.query_of(inner), Vec::new());

        self.set_alias(outer, &result.parameters[0]);
        self.set_alias(inner, &result.parameters[1]);

        let outer_scope = scope.child().bind(&outer_key.parameters[0], outer, sql);
        let inner_scope = scope.child().bind(&inner_key.parameters[0], inner, sql);
        let counter_scope = counter.map(|c| {
            let counter_sql = self.contexts.query_of(c);
            (
                counter_sql,
                scope.child().bind(&inner_key.parameters[0], c, counter_sql),
            )
        });

        for (outer_expr, inner_expr) in pairs {
            let conditions = self.build_equality(&outer_scope, outer_expr, &inner_scope, inner_expr)?;
            self.model.add_join_conditions(join, conditions);

            if let Some((counter_sql, counter_scope)) = &counter_scope {
                let conditions =
                    self.build_equality(&outer_scope, outer_expr, counter_scope, inner_expr)?;
                self.model.add_where(*counter_sql, conditions);
            }
        }
        log::debug!(
            "{}: {} on {} condition(s)",
            sql,
            if is_group_join { "group join" } else { "join" },
            self.model.join(join).condition.len()
        );

        let sequences = vec![outer, inner];
        if !is_group_join {
            return Ok(self.add_select(ContextKind::Join, result.clone(), sequences));
        }

        let Some((counter_sql, _)) = counter_scope else {
            return Err(TranslateError::MissingArgument("inner sequence"));
        };
        self.model.clear_projection(counter_sql);
        self.model.set_parent(counter_sql, sql);

        let group_join = self.add_select(ContextKind::GroupJoin, result.clone(), sequences);
        if let Some(state) = self.contexts.group_join_state_mut(inner) {
            state.join = Some(join);
            state.counter = Some(counter_sql);
            state.group_join = Some(group_join);
        }
        log::debug!("{}: counter sub-query {} for group join", sql, counter_sql);
        Ok(group_join)
    }

    /// Register the per-group count of `group` for the group-join inner
    /// context `ctx`.
    ///
    /// The first request marks the join weak, gives the counter its
    /// `COUNT(*)` column and projects it into the enclosing fragment. Later
    /// requests for the same expression return the same handle.
    pub fn request_cardinality(
        &mut self,
        ctx: ContextId,
        group: &Expr,
    ) -> TranslateResult<CounterHandle> {
        let not_a_group = || TranslateError::NotAGroup(group.to_string());
        let state = self.contexts.group_join_state(ctx).ok_or_else(not_a_group)?;
        if let Some(handle) = state.counter_request(group) {
            return Ok(handle);
        }
        let (join, counter) = match (state.join, state.counter) {
            (Some(join), Some(counter)) => (join, counter),
            _ => return Err(not_a_group()),
        };

        let parent = self.model.query(counter).parent.ok_or_else(not_a_group)?;

        let joined = self.model.join_mut(join);
        if !joined.is_weak {
            joined.is_weak = true;
            log::debug!("{}: join marked weak for counting", join.query);
        }

        if self.model.query(counter).select.is_empty() {
            self.model.add_projection_column(counter, SqlExpr::CountAll);
        }
        let index = self
            .model
            .add_projection_column(parent, SqlExpr::SubQuery(counter));

        let handle = CounterHandle {
            query: parent,
            counter,
            index,
        };
        if let Some(state) = self.contexts.group_join_state_mut(ctx) {
            state.remember_counter(group, handle);
        }
        log::trace!("{}: count of {} at column {}", parent, group, index);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_tuple_keys() {
        let outer = Expr::tuple(vec![Expr::field("o", "A"), Expr::field("o", "B")]);
        let inner = Expr::tuple(vec![Expr::field("i", "X"), Expr::field("i", "Y")]);
        let pairs = decompose_keys(&outer, &inner).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], (&Expr::field("o", "B"), &Expr::field("i", "Y")));
    }

    #[test]
    fn test_decompose_tuple_arity_mismatch() {
        let outer = Expr::tuple(vec![Expr::field("o", "A"), Expr::field("o", "B")]);
        let inner = Expr::tuple(vec![Expr::field("i", "X")]);
        let err = decompose_keys(&outer, &inner).unwrap_err();
        assert!(matches!(err, TranslateError::KeyShapeMismatch { .. }));
    }

    #[test]
    fn test_decompose_member_init_order() {
        let key = |a: &str, b: &str, p: &str| {
            Expr::member_init(
                "Key",
                vec![],
                vec![
                    MemberBinding::assign(a, Expr::field(p, a)),
                    MemberBinding::assign(b, Expr::field(p, b)),
                ],
            )
        };
        assert_eq!(decompose_keys(&key("A", "B", "o"), &key("A", "B", "i")).unwrap().len(), 2);
        assert_eq!(
            decompose_keys(&key("A", "B", "o"), &key("B", "A", "i")).unwrap_err(),
            TranslateError::MemberInitMismatch("Key".into())
        );
    }

    #[test]
    fn test_decompose_scalar_and_mixed() {
        let scalar = Expr::field("o", "Id");
        assert_eq!(decompose_keys(&scalar, &Expr::field("i", "Id")).unwrap().len(), 1);

        let tuple = Expr::tuple(vec![Expr::field("i", "Id")]);
        assert!(matches!(
            decompose_keys(&scalar, &tuple),
            Err(TranslateError::KeyShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_result_selector_checks() {
        let ctor = Lambda::new(
            ["o", "i"],
            Expr::construct("Pair", vec![Expr::param("o"), Expr::param("i")]),
        );
        assert_eq!(
            check_result_selector(&ctor),
            Err(TranslateError::ExplicitConstruction("Pair".into()))
        );

        let no_bindings = Lambda::new(["o", "i"], Expr::member_init("Pair", vec![], vec![]));
        assert!(check_result_selector(&no_bindings).is_err());

        let nested = Lambda::new(
            ["o", "i"],
            Expr::member_init(
                "Pair",
                vec![],
                vec![MemberBinding::Nested {
                    member: "Inner".into(),
                    bindings: vec![MemberBinding::assign("Id", Expr::field("i", "Id"))],
                }],
            ),
        );
        assert!(check_result_selector(&nested).is_err());

        let accepted = Lambda::new(
            ["o", "i"],
            Expr::member_init(
                "Pair",
                vec![],
                vec![MemberBinding::assign("Id", Expr::field("o", "Id"))],
            ),
        );
        assert_eq!(check_result_selector(&accepted), Ok(()));

        let anonymous = Lambda::new(["o", "i"], Expr::anonymous([("Id", Expr::field("o", "Id"))]));
        assert_eq!(check_result_selector(&anonymous), Ok(()));
    }

    #[test]
    fn test_lambda_arg() {
        assert_eq!(
            lambda_arg(&Expr::Constant(Value::Null), "outer key selector", 1),
            Err(TranslateError::MissingArgument("outer key selector"))
        );
        let two = Expr::lambda(["a", "b"], Expr::param("a"));
        assert!(matches!(
            lambda_arg(&two, "outer key selector", 1),
            Err(TranslateError::InvalidLambda { expected: 1, .. })
        ));
        assert!(lambda_arg(&Expr::quote(two), "result selector", 2).is_ok());
    }

    #[test]
    fn test_request_cardinality_detached_counter() {
        use crate::sql::{EntityDescribe, FieldDescribe, MappingSchema, ScalarType, SchemaBuilder};
        use crate::translate::TranslatorConfig;

        let schema: MappingSchema = SchemaBuilder::new()
            .with_entity(
                EntityDescribe::new("Customer")
                    .with_field(FieldDescribe::new("Id", ScalarType::Int).with_primary_key(0)),
            )
            .with_entity(
                EntityDescribe::new("Order")
                    .with_field(FieldDescribe::new("CustomerId", ScalarType::Int)),
            )
            .build();
        let query = Expr::group_join(
            Expr::table("Customer"),
            Expr::table("Order"),
            Expr::lambda(["c"], Expr::field("c", "Id")),
            Expr::lambda(["o"], Expr::field("o", "CustomerId")),
            Expr::lambda(["c", "g"], Expr::param("c")),
        );
        let mut translation = Translation::new(&schema, TranslatorConfig::default());
        let group_join = translation.translate(&query).unwrap();
        let inner = match &translation.contexts.get(group_join).kind {
            ContextKind::GroupJoin(select) => select.sequences[1],
            other => panic!("expected a group join context, got {}", other.name()),
        };
        let state = translation.contexts.group_join_state(inner).unwrap();
        let (join, counter) = (state.join.unwrap(), state.counter.unwrap());
        translation.model.query_mut(counter).parent = None;

        let group = Expr::param("g");
        let err = translation.request_cardinality(inner, &group).unwrap_err();
        assert_eq!(err, TranslateError::NotAGroup("g".into()));
        assert!(!translation.model.join(join).is_weak);
        assert!(translation.model.query(counter).select.is_empty());
        assert_eq!(
            translation.contexts.group_join_state(inner).unwrap().counter_request(&group),
            None
        );
    }
}
