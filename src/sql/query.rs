//! Relational query model
//!
//! An arena of query fragments (`SqlQuery`) addressed by [`QueryId`]. Each
//! fragment has ordered source tables (mapped tables or nested fragments),
//! joins hanging off a source table, an AND-combined `WHERE` condition, a
//! projection list and an optional parent link used by correlated
//! sub-queries. The model is an intermediate representation only; the
//! [`fmt::Display`] output is a dialect-neutral rendering meant for logs.

use std::fmt;

use crate::ast::{BinaryOp, Value};

/// Identity of a query fragment inside a [`SqlModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QueryId(pub(crate) usize);

impl QueryId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// A scalar SQL expression
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SqlExpr {
    /// A mapped column of source table `source` of fragment `query`
    Field {
        query: QueryId,
        source: usize,
        member: String,
        column: String,
    },
    /// Projection column `index` of fragment `query`
    Column { query: QueryId, index: usize },
    Value(Value),
    /// A scalar sub-query
    SubQuery(QueryId),
    /// `COUNT(*)` of the enclosing fragment
    CountAll,
}

/// Comparison operators usable in predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareOp {
    pub fn from_binary(op: BinaryOp) -> Option<CompareOp> {
        match op {
            BinaryOp::Equal => Some(CompareOp::Equal),
            BinaryOp::NotEqual => Some(CompareOp::NotEqual),
            BinaryOp::LessThan => Some(CompareOp::Less),
            BinaryOp::LessOrEqual => Some(CompareOp::LessOrEqual),
            BinaryOp::GreaterThan => Some(CompareOp::Greater),
            BinaryOp::GreaterOrEqual => Some(CompareOp::GreaterOrEqual),
            BinaryOp::And | BinaryOp::Or => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "<>",
            CompareOp::Less => "<",
            CompareOp::LessOrEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterOrEqual => ">=",
        }
    }
}

/// A predicate inside a search condition
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Predicate {
    Compare {
        left: SqlExpr,
        op: CompareOp,
        right: SqlExpr,
    },
    IsNull { expr: SqlExpr, negated: bool },
    /// A parenthesized nested condition
    Group(SearchCondition),
}

impl Predicate {
    pub fn equal(left: SqlExpr, right: SqlExpr) -> Self {
        Predicate::Compare {
            left,
            op: CompareOp::Equal,
            right,
        }
    }
}

/// One entry of a search condition
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Condition {
    pub is_not: bool,
    pub predicate: Predicate,
    /// Combine with the next condition using OR instead of AND
    pub is_or: bool,
}

impl Condition {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            is_not: false,
            predicate,
            is_or: false,
        }
    }

    pub fn negated(predicate: Predicate) -> Self {
        Self {
            is_not: true,
            predicate,
            is_or: false,
        }
    }
}

/// An ordered list of conditions, AND-combined unless flagged otherwise
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SearchCondition {
    pub conditions: Vec<Condition>,
}

impl SearchCondition {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }
}

/// Join kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum JoinKind {
    Inner,
    /// Only built by callers rendering the model; translation emits `Inner`
    LeftOuter,
}

/// What a table source reads from
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Source {
    /// A mapped table
    Table { entity: String, table_name: String },
    /// A nested fragment
    Query(QueryId),
}

/// A source table with the joins attached to it
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TableSource {
    pub source: Source,
    pub joins: Vec<JoinedTable>,
}

/// A table joined onto a source table
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct JoinedTable {
    pub kind: JoinKind,
    pub table: TableSource,
    pub condition: SearchCondition,
    /// Kept for nested materialization and counting only; the main row set
    /// does not depend on it.
    pub is_weak: bool,
}

/// Address of a join inside the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct JoinRef {
    pub query: QueryId,
    pub source: usize,
    pub join: usize,
}

/// A projected column
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SelectColumn {
    pub expr: SqlExpr,
}

/// Fragment alias
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Alias {
    pub name: String,
    /// Set by the caller rather than generated
    pub explicit: bool,
}

/// A query fragment
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SqlQuery {
    pub id: QueryId,
    pub from: Vec<TableSource>,
    pub where_clause: SearchCondition,
    pub select: Vec<SelectColumn>,
    /// Enclosing fragment of a correlated sub-query
    pub parent: Option<QueryId>,
    pub alias: Option<Alias>,
}

impl SqlQuery {
    fn new(id: QueryId) -> Self {
        Self {
            id,
            from: Vec::new(),
            where_clause: SearchCondition::default(),
            select: Vec::new(),
            parent: None,
            alias: None,
        }
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_ref().map(|a| a.name.as_str())
    }

    /// All joins of all source tables, in order
    pub fn joins(&self) -> impl Iterator<Item = &JoinedTable> {
        self.from.iter().flat_map(|t| t.joins.iter())
    }
}

/// Arena owning every fragment produced by one translation
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SqlModel {
    queries: Vec<SqlQuery>,
}

impl SqlModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty fragment
    pub fn new_query(&mut self) -> QueryId {
        let id = QueryId(self.queries.len());
        self.queries.push(SqlQuery::new(id));
        id
    }

    pub fn query(&self, id: QueryId) -> &SqlQuery {
        &self.queries[id.0]
    }

    pub fn query_mut(&mut self, id: QueryId) -> &mut SqlQuery {
        &mut self.queries[id.0]
    }

    pub fn queries(&self) -> impl Iterator<Item = &SqlQuery> {
        self.queries.iter()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Add a mapped table as a source of `query`, returning the source index
    pub fn add_table(&mut self, query: QueryId, entity: &str, table_name: &str) -> usize {
        self.add_source(
            query,
            Source::Table {
                entity: entity.to_string(),
                table_name: table_name.to_string(),
            },
        )
    }

    /// Add a nested fragment as a source of `query`, returning the source index
    pub fn add_sub_query(&mut self, query: QueryId, sub_query: QueryId) -> usize {
        self.add_source(query, Source::Query(sub_query))
    }

    fn add_source(&mut self, query: QueryId, source: Source) -> usize {
        let from = &mut self.query_mut(query).from;
        from.push(TableSource {
            source,
            joins: Vec::new(),
        });
        from.len() - 1
    }

    /// Join fragment `joined` onto the first source table of `query`
    pub fn add_join(
        &mut self,
        query: QueryId,
        kind: JoinKind,
        joined: QueryId,
        conditions: Vec<Condition>,
    ) -> JoinRef {
        let target = self.query_mut(query);
        if target.from.is_empty() {
            target.from.push(TableSource {
                source: Source::Query(joined),
                joins: Vec::new(),
            });
        }
        let joins = &mut target.from[0].joins;
        joins.push(JoinedTable {
            kind,
            table: TableSource {
                source: Source::Query(joined),
                joins: Vec::new(),
            },
            condition: SearchCondition { conditions },
            is_weak: false,
        });
        let join = JoinRef {
            query,
            source: 0,
            join: joins.len() - 1,
        };
        log::trace!("{}: joined {} as {:?}", query, joined, kind);
        join
    }

    pub fn join(&self, join: JoinRef) -> &JoinedTable {
        &self.query(join.query).from[join.source].joins[join.join]
    }

    pub fn join_mut(&mut self, join: JoinRef) -> &mut JoinedTable {
        &mut self.query_mut(join.query).from[join.source].joins[join.join]
    }

    pub fn add_join_conditions(&mut self, join: JoinRef, conditions: Vec<Condition>) {
        self.join_mut(join).condition.conditions.extend(conditions);
    }

    /// AND a comparison onto the condition list of a join
    pub fn add_join_condition(&mut self, join: JoinRef, left: SqlExpr, op: CompareOp, right: SqlExpr) {
        self.add_join_conditions(
            join,
            vec![Condition::new(Predicate::Compare { left, op, right })],
        );
    }

    /// AND a comparison onto the `WHERE` clause of `query`
    pub fn add_condition(&mut self, query: QueryId, left: SqlExpr, op: CompareOp, right: SqlExpr) {
        self.add_where(
            query,
            vec![Condition::new(Predicate::Compare { left, op, right })],
        );
    }

    pub fn add_where(&mut self, query: QueryId, conditions: Vec<Condition>) {
        self.query_mut(query)
            .where_clause
            .conditions
            .extend(conditions);
    }

    /// Project `expr` from `query`, returning its stable ordinal.
    ///
    /// An expression already projected returns the existing ordinal.
    pub fn add_projection_column(&mut self, query: QueryId, expr: SqlExpr) -> usize {
        let select = &mut self.query_mut(query).select;
        if let Some(index) = select.iter().position(|c| c.expr == expr) {
            return index;
        }
        log::trace!("{}: projecting column {} = {:?}", query, select.len(), expr);
        select.push(SelectColumn { expr });
        select.len() - 1
    }

    pub fn clear_projection(&mut self, query: QueryId) {
        self.query_mut(query).select.clear();
    }

    /// Link a correlated sub-query to its enclosing fragment
    pub fn set_parent(&mut self, query: QueryId, parent: QueryId) {
        self.query_mut(query).parent = Some(parent);
    }

    /// Set an explicit alias; the last explicit alias wins
    pub fn set_alias(&mut self, query: QueryId, name: &str) {
        let q = self.query_mut(query);
        if q.alias_name() == Some(name) {
            return;
        }
        q.alias = Some(Alias {
            name: name.to_string(),
            explicit: true,
        });
    }

    /// Generate `{prefix}{n}` aliases for fragments that have none.
    ///
    /// Existing aliases, explicit or generated, are left alone and generated
    /// names skip any name already in use.
    pub fn assign_default_aliases(&mut self, prefix: &str) {
        let mut counter = 0;
        for i in 0..self.queries.len() {
            if self.queries[i].alias.is_some() {
                continue;
            }
            let name = loop {
                counter += 1;
                let candidate = format!("{}{}", prefix, counter);
                if !self.queries.iter().any(|q| q.alias_name() == Some(&candidate)) {
                    break candidate;
                }
            };
            self.queries[i].alias = Some(Alias {
                name,
                explicit: false,
            });
        }
    }

    /// Follow projection references down to the expression they stand for
    pub fn resolve_column<'a>(&'a self, expr: &'a SqlExpr) -> &'a SqlExpr {
        match expr {
            SqlExpr::Column { query, index } => match self.query(*query).select.get(*index) {
                Some(column) => self.resolve_column(&column.expr),
                None => expr,
            },
            _ => expr,
        }
    }

    /// Member name of the mapped field an expression ultimately reads
    pub fn underlying_field<'a>(&'a self, expr: &'a SqlExpr) -> Option<&'a str> {
        match self.resolve_column(expr) {
            SqlExpr::Field { member, .. } => Some(member),
            _ => None,
        }
    }

    /// Dialect-neutral rendering of one fragment, for logs
    pub fn display(&self, query: QueryId) -> QueryDisplay<'_> {
        QueryDisplay { model: self, query }
    }

    fn alias_or_id(&self, query: QueryId) -> String {
        match self.query(query).alias_name() {
            Some(name) => name.to_string(),
            None => query.to_string(),
        }
    }
}

/// [`fmt::Display`] adapter returned by [`SqlModel::display`]
pub struct QueryDisplay<'a> {
    model: &'a SqlModel,
    query: QueryId,
}

impl QueryDisplay<'_> {
    fn write_expr(&self, f: &mut fmt::Formatter<'_>, expr: &SqlExpr) -> fmt::Result {
        match expr {
            SqlExpr::Field { query, column, .. } => {
                write!(f, "{}.{}", self.model.alias_or_id(*query), column)
            }
            SqlExpr::Column { query, index } => {
                write!(f, "{}.c{}", self.model.alias_or_id(*query), index)
            }
            SqlExpr::Value(value) => write!(f, "{}", value),
            SqlExpr::SubQuery(query) => write!(f, "({})", self.model.display(*query)),
            SqlExpr::CountAll => write!(f, "COUNT(*)"),
        }
    }

    fn write_condition(&self, f: &mut fmt::Formatter<'_>, cond: &SearchCondition) -> fmt::Result {
        for (i, c) in cond.conditions.iter().enumerate() {
            if i > 0 {
                let op = if cond.conditions[i - 1].is_or { "OR" } else { "AND" };
                write!(f, " {} ", op)?;
            }
            if c.is_not {
                write!(f, "NOT ")?;
            }
            match &c.predicate {
                Predicate::Compare { left, op, right } => {
                    self.write_expr(f, left)?;
                    write!(f, " {} ", op.as_str())?;
                    self.write_expr(f, right)?;
                }
                Predicate::IsNull { expr, negated } => {
                    self.write_expr(f, expr)?;
                    write!(f, " IS {}NULL", if *negated { "NOT " } else { "" })?;
                }
                Predicate::Group(inner) => {
                    write!(f, "(")?;
                    self.write_condition(f, inner)?;
                    write!(f, ")")?;
                }
            }
        }
        Ok(())
    }

    fn write_source(&self, f: &mut fmt::Formatter<'_>, source: &Source) -> fmt::Result {
        match source {
            Source::Table { table_name, .. } => write!(
                f,
                "{} {}",
                table_name,
                self.model.alias_or_id(self.query)
            ),
            Source::Query(query) => write!(
                f,
                "({}) {}",
                self.model.display(*query),
                self.model.alias_or_id(*query)
            ),
        }
    }
}

impl fmt::Display for QueryDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let query = self.model.query(self.query);

        write!(f, "SELECT ")?;
        if query.select.is_empty() {
            write!(f, "*")?;
        }
        for (i, column) in query.select.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.write_expr(f, &column.expr)?;
        }

        if !query.from.is_empty() {
            write!(f, " FROM ")?;
        }
        for (i, table) in query.from.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.write_source(f, &table.source)?;
            for join in &table.joins {
                let kind = match join.kind {
                    JoinKind::Inner => "INNER JOIN",
                    JoinKind::LeftOuter => "LEFT JOIN",
                };
                write!(f, " {}{} ", if join.is_weak { "WEAK " } else { "" }, kind)?;
                self.write_source(f, &join.table.source)?;
                write!(f, " ON ")?;
                self.write_condition(f, &join.condition)?;
            }
        }

        if !query.where_clause.is_empty() {
            write!(f, " WHERE ")?;
            self.write_condition(f, &query.where_clause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(query: QueryId, member: &str) -> SqlExpr {
        SqlExpr::Field {
            query,
            source: 0,
            member: member.to_string(),
            column: member.to_lowercase(),
        }
    }

    #[test]
    fn test_projection_is_memoized() {
        let mut model = SqlModel::new();
        let q = model.new_query();
        model.add_table(q, "Customer", "customer");

        let a = model.add_projection_column(q, field(q, "Id"));
        let b = model.add_projection_column(q, field(q, "Name"));
        let c = model.add_projection_column(q, field(q, "Id"));

        assert_eq!((a, b, c), (0, 1, 0));
        assert_eq!(model.query(q).select.len(), 2);
    }

    #[test]
    fn test_sub_query_projection_memoized_per_fragment() {
        let mut model = SqlModel::new();
        let parent = model.new_query();
        let counter = model.new_query();

        let first = model.add_projection_column(parent, SqlExpr::SubQuery(counter));
        let second = model.add_projection_column(parent, SqlExpr::SubQuery(counter));
        assert_eq!(first, second);
    }

    #[test]
    fn test_add_join_and_conditions() {
        let mut model = SqlModel::new();
        let outer = model.new_query();
        let inner = model.new_query();
        model.add_table(outer, "Customer", "customer");

        let join = model.add_join(outer, JoinKind::Inner, inner, Vec::new());
        model.add_join_conditions(
            join,
            vec![Condition::new(Predicate::equal(
                field(outer, "Id"),
                SqlExpr::Column {
                    query: inner,
                    index: 0,
                },
            ))],
        );

        model.add_join_condition(
            join,
            field(outer, "Region"),
            CompareOp::NotEqual,
            SqlExpr::Value(Value::Null),
        );

        assert_eq!(model.join(join).condition.len(), 2);
        assert!(!model.join(join).is_weak);
        assert_eq!(model.query(outer).joins().count(), 1);
    }

    #[test]
    fn test_explicit_alias_survives_default_aliases() {
        let mut model = SqlModel::new();
        let a = model.new_query();
        let b = model.new_query();
        model.set_alias(b, "t1");
        model.assign_default_aliases("t");

        assert_eq!(model.query(b).alias_name(), Some("t1"));
        assert_eq!(model.query(a).alias_name(), Some("t2"));
        assert!(!model.query(a).alias.as_ref().unwrap().explicit);
    }

    #[test]
    fn test_set_alias_is_idempotent() {
        let mut model = SqlModel::new();
        let q = model.new_query();
        model.set_alias(q, "c");
        model.set_alias(q, "c");
        assert_eq!(model.query(q).alias_name(), Some("c"));

        model.set_alias(q, "d");
        assert_eq!(model.query(q).alias_name(), Some("d"));
    }

    #[test]
    fn test_resolve_column_follows_references() {
        let mut model = SqlModel::new();
        let inner = model.new_query();
        model.add_table(inner, "Customer", "customer");
        let outer = model.new_query();
        model.add_sub_query(outer, inner);

        let idx = model.add_projection_column(inner, field(inner, "Name"));
        let top = model.add_projection_column(outer, SqlExpr::Column { query: inner, index: idx });

        let expr = SqlExpr::Column {
            query: outer,
            index: top,
        };
        assert_eq!(model.underlying_field(&expr), Some("Name"));

        let direct = field(inner, "Name");
        assert_eq!(model.underlying_field(&direct), Some("Name"));
        assert_eq!(model.underlying_field(&SqlExpr::CountAll), None);
    }

    #[test]
    fn test_display() {
        let mut model = SqlModel::new();
        let q = model.new_query();
        model.add_table(q, "Customer", "customer");
        model.set_alias(q, "c");
        model.add_projection_column(q, field(q, "Id"));
        model.add_condition(
            q,
            field(q, "Name"),
            CompareOp::Equal,
            SqlExpr::Value(Value::Text("x".into())),
        );

        assert_eq!(
            model.display(q).to_string(),
            "SELECT c.id FROM customer c WHERE c.name = \"x\""
        );
    }

    #[test]
    fn test_display_join_kinds() {
        let mut model = SqlModel::new();
        let outer = model.new_query();
        let inner = model.new_query();
        model.add_table(outer, "Customer", "customer");
        model.add_table(inner, "Order", "orders");
        let condition = || {
            vec![Condition::new(Predicate::equal(
                field(outer, "Id"),
                field(inner, "CustomerId"),
            ))]
        };

        let join = model.add_join(outer, JoinKind::LeftOuter, inner, condition());
        assert_eq!(model.join(join).kind, JoinKind::LeftOuter);
        let rendered = model.display(outer).to_string();
        assert!(rendered.contains(" LEFT JOIN "), "{}", rendered);

        model.join_mut(join).is_weak = true;
        let rendered = model.display(outer).to_string();
        assert!(rendered.contains(" WEAK LEFT JOIN "), "{}", rendered);
    }
}
