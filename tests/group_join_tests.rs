//! Tests for group joins and the per-group counter sub-query

use pretty_assertions::assert_eq;
use relquery::sql::{
    EntityDescribe, FieldDescribe, MappingSchema, Predicate, ScalarType, SchemaBuilder,
    SelectColumn, SqlExpr,
};
use relquery::translate::{ContextId, ContextKind, ErrorKind, Shape};
use relquery::{
    translate_query, BinaryOp, Expr, TranslateError, Translation, TranslatorConfig, Value,
};

fn create_test_schema() -> MappingSchema {
    SchemaBuilder::new()
        .with_entity(
            EntityDescribe::new("Customer")
                .with_field(FieldDescribe::new("Id", ScalarType::Int).with_primary_key(0))
                .with_field(FieldDescribe::new("Name", ScalarType::Text)),
        )
        .with_entity(
            EntityDescribe::new("Order")
                .with_table_name("orders")
                .with_field(FieldDescribe::new("Id", ScalarType::Int).with_primary_key(0))
                .with_field(FieldDescribe::new("CustomerId", ScalarType::Int))
                .with_field(FieldDescribe::new("Total", ScalarType::Double)),
        )
        .build()
}

fn customer_orders(inner: Expr, result: Expr) -> Expr {
    Expr::group_join(
        Expr::table("Customer"),
        inner,
        Expr::lambda(["c"], Expr::field("c", "Id")),
        Expr::lambda(["o"], Expr::field("o", "CustomerId")),
        result,
    )
}

fn order_counts() -> Expr {
    customer_orders(
        Expr::table("Order"),
        Expr::lambda(
            ["c", "g"],
            Expr::anonymous([
                ("Name", Expr::field("c", "Name")),
                ("Orders", Expr::count(Expr::param("g"))),
            ]),
        ),
    )
}

/// The inner (group) side of a group-join result context
fn group_side(translation: &Translation, group_join: ContextId) -> ContextId {
    match &translation.contexts().get(group_join).kind {
        ContextKind::GroupJoin(select) => select.sequences[1],
        other => panic!("expected a group join context, got {}", other.name()),
    }
}

#[test]
fn test_counter_duplicates_join_condition() {
    let schema = create_test_schema();
    let mut translation = Translation::new(&schema, TranslatorConfig::default());
    let group_join = translation.translate(&order_counts()).unwrap();
    let inner = group_side(&translation, group_join);

    let state = translation.contexts().group_join_state(inner).unwrap();
    let counter = state.counter.unwrap();
    let join = state.join.unwrap();
    assert_eq!(state.group_join, Some(group_join));

    let model = translation.model();
    let outer = translation.contexts().query_of(group_join);
    assert_eq!(model.query(counter).parent, Some(outer));
    assert_eq!(model.join(join).condition.len(), 1);

    let where_clause = &model.query(counter).where_clause;
    assert_eq!(where_clause.len(), 1);
    match &where_clause.conditions[0].predicate {
        Predicate::Compare { left, right, .. } => {
            assert_eq!(model.underlying_field(left), Some("Id"));
            assert_eq!(model.underlying_field(right), Some("CustomerId"));
        }
        other => panic!("expected a comparison, got {:?}", other),
    }

    // the counter reads its own copy of the inner sequence, not the joined one
    let joined = match &model.join(join).condition.conditions[0].predicate {
        Predicate::Compare { right, .. } => model.resolve_column(right).clone(),
        other => panic!("expected a comparison, got {:?}", other),
    };
    let counted = match &where_clause.conditions[0].predicate {
        Predicate::Compare { right, .. } => model.resolve_column(right).clone(),
        other => panic!("expected a comparison, got {:?}", other),
    };
    assert!(matches!((&joined, &counted), (
        SqlExpr::Field { query: a, .. },
        SqlExpr::Field { query: b, .. },
    ) if a != b));
}

#[test]
fn test_counter_is_inactive_until_requested() {
    let schema = create_test_schema();
    let mut translation = Translation::new(&schema, TranslatorConfig::default());
    let group_join = translation.translate(&order_counts()).unwrap();
    let inner = group_side(&translation, group_join);
    let state = translation.contexts().group_join_state(inner).unwrap();
    let (counter, join) = (state.counter.unwrap(), state.join.unwrap());
    let outer = translation.contexts().query_of(group_join);

    let model = translation.model();
    assert!(model.query(counter).select.is_empty());
    assert!(model.query(outer).select.is_empty());
    assert!(!model.join(join).is_weak);
}

#[test]
fn test_request_cardinality() {
    let schema = create_test_schema();
    let mut translation = Translation::new(&schema, TranslatorConfig::default());
    let group_join = translation.translate(&order_counts()).unwrap();
    let inner = group_side(&translation, group_join);
    let state = translation.contexts().group_join_state(inner).unwrap();
    let (counter, join) = (state.counter.unwrap(), state.join.unwrap());
    let outer = translation.contexts().query_of(group_join);

    let group = Expr::param("g");
    let handle = translation.request_cardinality(inner, &group).unwrap();
    assert_eq!(handle.query, outer);
    assert_eq!(handle.counter, counter);
    assert_eq!(handle.index, 0);

    let model = translation.model();
    assert!(model.join(join).is_weak);
    assert_eq!(
        model.query(counter).select,
        vec![SelectColumn {
            expr: SqlExpr::CountAll
        }]
    );
    assert_eq!(
        model.query(outer).select,
        vec![SelectColumn {
            expr: SqlExpr::SubQuery(counter)
        }]
    );

    // a repeated request is memoized and changes nothing
    let again = translation.request_cardinality(inner, &group).unwrap();
    assert_eq!(again, handle);
    let model = translation.model();
    assert_eq!(model.query(counter).select.len(), 1);
    assert_eq!(model.query(outer).select.len(), 1);

    let state = translation.contexts().group_join_state(inner).unwrap();
    assert_eq!(state.counter_request(&group), Some(handle));
}

#[test]
fn test_request_cardinality_on_plain_context() {
    let schema = create_test_schema();
    let mut translation = Translation::new(&schema, TranslatorConfig::default());
    let table = translation.translate(&Expr::table("Customer")).unwrap();

    let err = translation
        .request_cardinality(table, &Expr::param("c"))
        .unwrap_err();
    assert_eq!(err, TranslateError::NotAGroup("c".into()));
}

#[test]
fn test_group_count_in_result() {
    let schema = create_test_schema();
    let translated = translate_query(&order_counts(), &schema, TranslatorConfig::default()).unwrap();

    assert_eq!(
        translated.shape,
        Shape::Object {
            type_name: None,
            members: vec![
                (
                    "Name".into(),
                    Shape::Column {
                        index: 0,
                        ty: Some(ScalarType::Text)
                    }
                ),
                (
                    "Orders".into(),
                    Shape::Column {
                        index: 1,
                        ty: Some(ScalarType::Long)
                    }
                ),
            ],
        }
    );

    let root = translated.model.query(translated.root);
    let join = root.joins().next().unwrap();
    assert!(join.is_weak);

    let counter = match &root.select[1].expr {
        SqlExpr::SubQuery(counter) => *counter,
        other => panic!("expected the counter sub-query, got {:?}", other),
    };
    let counter = translated.model.query(counter);
    assert_eq!(counter.parent, Some(translated.root));
    assert_eq!(
        counter.select,
        vec![SelectColumn {
            expr: SqlExpr::CountAll
        }]
    );
}

#[test]
fn test_group_count_requested_twice_shares_column() {
    let schema = create_test_schema();
    let query = customer_orders(
        Expr::table("Order"),
        Expr::lambda(
            ["c", "g"],
            Expr::anonymous([
                ("First", Expr::count(Expr::param("g"))),
                ("Second", Expr::count(Expr::param("g"))),
            ]),
        ),
    );

    let translated = translate_query(&query, &schema, TranslatorConfig::default()).unwrap();
    assert_eq!(translated.shape.columns(), vec![0, 0]);
    assert_eq!(translated.model.query(translated.root).select.len(), 1);
}

#[test]
fn test_inner_filter_is_copied_to_counter() {
    let schema = create_test_schema();
    let filtered = Expr::filter(
        Expr::table("Order"),
        Expr::lambda(
            ["o"],
            Expr::binary(
                BinaryOp::GreaterThan,
                Expr::field("o", "Total"),
                Expr::constant(Value::Int(100)),
            ),
        ),
    );
    let query = customer_orders(
        filtered,
        Expr::lambda(
            ["c", "g"],
            Expr::anonymous([("Orders", Expr::count(Expr::param("g")))]),
        ),
    );

    let translated = translate_query(&query, &schema, TranslatorConfig::default()).unwrap();
    let filters: Vec<_> = translated
        .model
        .queries()
        .filter(|q| {
            q.where_clause.conditions.iter().any(|c| {
                matches!(
                    &c.predicate,
                    Predicate::Compare {
                        right: SqlExpr::Value(Value::Double(d)),
                        ..
                    } if *d == 100.0
                )
            })
        })
        .map(|q| q.id)
        .collect();
    // the joined inner table and the counter's copy
    assert_eq!(filters.len(), 2);
}

#[test]
fn test_whole_group_cannot_be_materialized() {
    let schema = create_test_schema();
    let query = customer_orders(
        Expr::table("Order"),
        Expr::lambda(
            ["c", "g"],
            Expr::anonymous([
                ("Name", Expr::field("c", "Name")),
                ("Items", Expr::param("g")),
            ]),
        ),
    );

    let err = translate_query(&query, &schema, TranslatorConfig::default()).unwrap_err();
    assert_eq!(err, TranslateError::GroupMaterializationUnsupported);
    assert_eq!(err.kind(), ErrorKind::Shape);
}

#[test]
fn test_count_of_non_group() {
    let schema = create_test_schema();
    let query = Expr::select(
        Expr::table("Customer"),
        Expr::lambda(
            ["c"],
            Expr::anonymous([("N", Expr::count(Expr::param("c")))]),
        ),
    );

    let err = translate_query(&query, &schema, TranslatorConfig::default()).unwrap_err();
    assert_eq!(err, TranslateError::NotAGroup("c".into()));
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_context_tree_after_group_join() {
    let schema = create_test_schema();
    let mut translation = Translation::new(&schema, TranslatorConfig::default());
    let group_join = translation.translate(&order_counts()).unwrap();
    let contexts = translation.contexts();

    let kinds: Vec<_> = contexts.ids().map(|id| contexts.get(id).kind.name()).collect();
    assert_eq!(
        kinds,
        vec![
            "Table",
            "Table",
            "Table",
            "SubQuery",
            "GroupJoinSubQuery",
            "SubQuery",
            "GroupJoin",
        ]
    );
    let parents: Vec<_> = contexts
        .ids()
        .map(|id| contexts.parent(id).map(|p| p.index()))
        .collect();
    // the counter wrapper hangs off no context
    assert_eq!(
        parents,
        vec![Some(3), Some(4), Some(5), Some(6), Some(6), None, None]
    );
    assert_eq!(group_join.index(), 6);
}
