//! Parse contexts
//!
//! Every query operation the translator walks produces a context in the
//! [`ContextTree`] arena. A context knows which fragment of the
//! [`SqlModel`](crate::sql::SqlModel) its rows come from and how to turn a
//! member chain rooted at its element into SQL:
//!
//! - `Table` reads mapped fields of one entity table
//! - `SubQuery` wraps another context in a fragment of its own and exposes the
//!   wrapped context's columns through that fragment's projection
//! - `Select`, `Join` and `GroupJoin` hold a result lambda and resolve member
//!   chains by descending into the lambda body
//! - `GroupJoinSubQuery` is the inner side of a group join; on top of the
//!   sub-query behaviour it owns the join reference, the counter fragment and
//!   the per-expression counter cache
//!
//! Parent links are navigational only. Name resolution never goes through
//! them; see [`Scope`].

use std::collections::HashMap;

use crate::ast::{Expr, Lambda, MemberBinding};
use crate::sql::{ColumnType, FieldDescribe, JoinRef, QueryId, ScalarType, SqlExpr};

use super::error::{TranslateError, TranslateResult};
use super::scope::Scope;
use super::shape::Shape;
use super::Translation;

/// Identity of a context inside a [`ContextTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContextId(pub(crate) usize);

impl ContextId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What a conversion should produce for a whole object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertFlags {
    /// A single scalar column
    Field,
    /// The identifying columns: primary key of an entity, key columns of an
    /// association, every member of a constructed object
    Key,
    /// Every column
    All,
}

/// One resolved column
#[derive(Debug, Clone, PartialEq)]
pub struct SqlInfo {
    /// Member path of the column relative to the converted expression; empty
    /// for a scalar
    pub members: Vec<String>,
    pub sql: SqlExpr,
    pub ty: Option<ColumnType>,
    /// Fragment the column was projected into, if projected
    pub query: Option<QueryId>,
    /// Projection ordinal inside `query`
    pub index: Option<usize>,
}

impl SqlInfo {
    pub fn new(sql: SqlExpr, ty: Option<ColumnType>) -> Self {
        Self {
            members: Vec::new(),
            sql,
            ty,
            query: None,
            index: None,
        }
    }

    fn with_member(mut self, member: impl Into<String>) -> Self {
        self.members.push(member.into());
        self
    }

    pub(crate) fn prefixed(mut self, member: &str) -> Self {
        self.members.insert(0, member.to_string());
        self
    }

    /// Dotted member path, used as a shape member name
    pub fn member_name(&self) -> String {
        self.members.join(".")
    }
}

/// A registered per-group count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterHandle {
    /// Fragment the count is projected into
    pub query: QueryId,
    /// The counter sub-query
    pub counter: QueryId,
    /// Projection ordinal of the count inside `query`
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableContext {
    pub query: QueryId,
    pub entity: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubQueryContext {
    /// The wrapping fragment; its first source is the wrapped context's
    pub query: QueryId,
    pub sub_query: ContextId,
}

/// Result lambda over one or more sequences.
///
/// Parameter `n` of the lambda ranges over `sequences[n]`; the rows come
/// from the fragment of `sequences[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectContext {
    pub lambda: Lambda,
    pub sequences: Vec<ContextId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupJoinSubQueryContext {
    pub sub: SubQueryContext,
    pub join: Option<JoinRef>,
    pub counter: Option<QueryId>,
    /// The group-join result context this is the inner side of
    pub group_join: Option<ContextId>,
    counter_requests: HashMap<Expr, CounterHandle>,
}

impl GroupJoinSubQueryContext {
    fn new(sub: SubQueryContext) -> Self {
        Self {
            sub,
            join: None,
            counter: None,
            group_join: None,
            counter_requests: HashMap::new(),
        }
    }

    pub fn counter_request(&self, expr: &Expr) -> Option<CounterHandle> {
        self.counter_requests.get(expr.unwrap()).copied()
    }

    pub(crate) fn remember_counter(&mut self, expr: &Expr, handle: CounterHandle) {
        self.counter_requests.insert(expr.unwrap().clone(), handle);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContextKind {
    Table(TableContext),
    SubQuery(SubQueryContext),
    Select(SelectContext),
    Join(SelectContext),
    GroupJoin(SelectContext),
    GroupJoinSubQuery(GroupJoinSubQueryContext),
}

impl ContextKind {
    pub fn name(&self) -> &'static str {
        match self {
            ContextKind::Table(_) => "Table",
            ContextKind::SubQuery(_) => "SubQuery",
            ContextKind::Select(_) => "Select",
            ContextKind::Join(_) => "Join",
            ContextKind::GroupJoin(_) => "GroupJoin",
            ContextKind::GroupJoinSubQuery(_) => "GroupJoinSubQuery",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseContext {
    pub parent: Option<ContextId>,
    pub kind: ContextKind,
}

/// Arena owning every context of one translation
#[derive(Debug, Clone, Default)]
pub struct ContextTree {
    nodes: Vec<ParseContext>,
}

impl ContextTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, kind: ContextKind) -> ContextId {
        let id = ContextId(self.nodes.len());
        self.nodes.push(ParseContext { parent: None, kind });
        id
    }

    pub(crate) fn set_parent(&mut self, child: ContextId, parent: ContextId) {
        self.nodes[child.0].parent = Some(parent);
    }

    pub fn get(&self, id: ContextId) -> &ParseContext {
        &self.nodes[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: ContextId) -> &mut ParseContext {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: ContextId) -> Option<ContextId> {
        self.nodes[id.0].parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every context id, in creation order
    pub fn ids(&self) -> impl Iterator<Item = ContextId> {
        (0..self.nodes.len()).map(ContextId)
    }

    /// Fragment the rows of `id` are read from
    pub fn query_of(&self, id: ContextId) -> QueryId {
        match &self.get(id).kind {
            ContextKind::Table(t) => t.query,
            ContextKind::SubQuery(s) => s.query,
            ContextKind::GroupJoinSubQuery(g) => g.sub.query,
            ContextKind::Select(s) | ContextKind::Join(s) | ContextKind::GroupJoin(s) => {
                self.query_of(s.sequences[0])
            }
        }
    }

    pub fn group_join_state(&self, id: ContextId) -> Option<&GroupJoinSubQueryContext> {
        match &self.get(id).kind {
            ContextKind::GroupJoinSubQuery(g) => Some(g),
            _ => None,
        }
    }

    pub(crate) fn group_join_state_mut(
        &mut self,
        id: ContextId,
    ) -> Option<&mut GroupJoinSubQueryContext> {
        match &mut self.get_mut(id).kind {
            ContextKind::GroupJoinSubQuery(g) => Some(g),
            _ => None,
        }
    }
}

/// Owned view of the parts of a context needed while the translation is
/// mutably borrowed
enum Node {
    Table {
        query: QueryId,
        entity: String,
    },
    SubQuery {
        query: QueryId,
        sub: ContextId,
        group: bool,
    },
    Select(SelectContext),
}

fn field_expr(query: QueryId, field: &FieldDescribe) -> SqlExpr {
    SqlExpr::Field {
        query,
        source: 0,
        member: field.name.clone(),
        column: field.column_name.clone(),
    }
}

fn field_info(query: QueryId, field: &FieldDescribe) -> SqlInfo {
    SqlInfo::new(field_expr(query, field), Some(ColumnType::from(field)))
}

/// Member path below the element of the context, `None` meaning the element
pub(crate) fn expression_path(expression: Option<&Expr>) -> TranslateResult<Vec<String>> {
    match expression {
        None => Ok(Vec::new()),
        Some(expr) => match expr.member_path() {
            Some((_, path)) => Ok(path.into_iter().map(str::to_string).collect()),
            None => Err(TranslateError::UnresolvedExpression(expr.to_string())),
        },
    }
}

/// Find the expression a member path selects from a lambda body.
///
/// Constructed objects are entered member by member; whatever part of the
/// path is left is applied to the expression found.
pub(crate) fn descend(body: &Expr, path: &[String]) -> Option<Expr> {
    let body = body.unwrap();
    let Some((first, rest)) = path.split_first() else {
        return Some(body.clone());
    };
    match body {
        Expr::New {
            arguments, members, ..
        } if members.len() == arguments.len() => {
            let i = members.iter().position(|m| m == first)?;
            descend(&arguments[i], rest)
        }
        Expr::New { .. } => None,
        Expr::MemberInit { bindings, .. } => {
            match bindings.iter().find(|b| b.member() == first.as_str())? {
                MemberBinding::Assignment { expr, .. } => descend(expr, rest),
                MemberBinding::Nested { bindings, .. } => descend(&nested_object(bindings)?, rest),
                MemberBinding::List { .. } => None,
            }
        }
        _ => Some(
            path.iter()
                .fold(body.clone(), |target, m| Expr::member(target, m.clone())),
        ),
    }
}

/// View nested member bindings as an anonymous object
pub(crate) fn nested_object(bindings: &[MemberBinding]) -> Option<Expr> {
    let mut members = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let expr = match binding {
            MemberBinding::Assignment { expr, .. } => expr.clone(),
            MemberBinding::Nested { bindings, .. } => nested_object(bindings)?,
            MemberBinding::List { .. } => return None,
        };
        members.push((binding.member().to_string(), expr));
    }
    Some(Expr::anonymous(members))
}

impl Translation<'_> {
    fn node(&self, ctx: ContextId) -> Node {
        match &self.contexts.get(ctx).kind {
            ContextKind::Table(t) => Node::Table {
                query: t.query,
                entity: t.entity.clone(),
            },
            ContextKind::SubQuery(s) => Node::SubQuery {
                query: s.query,
                sub: s.sub_query,
                group: false,
            },
            ContextKind::GroupJoinSubQuery(g) => Node::SubQuery {
                query: g.sub.query,
                sub: g.sub.sub_query,
                group: true,
            },
            ContextKind::Select(s) | ContextKind::Join(s) | ContextKind::GroupJoin(s) => {
                Node::Select(s.clone())
            }
        }
    }

    /// Scope binding the parameters of a select lambda, evaluated in the
    /// select's own fragment
    pub(crate) fn select_scope(&self, ctx: ContextId, select: &SelectContext) -> Scope<'static> {
        let target = self.contexts.query_of(ctx);
        select
            .lambda
            .parameters
            .iter()
            .zip(&select.sequences)
            .fold(Scope::root(), |scope, (name, seq)| {
                scope.bind(name, *seq, target)
            })
    }

    /// Resolve `expression` to columns of the context's own fragment,
    /// projecting each into it (`ConvertToIndex`)
    pub fn convert_to_index(
        &mut self,
        ctx: ContextId,
        expression: Option<&Expr>,
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        if let Some(handle) = expression.and_then(|e| self.cached_counter(ctx, e)) {
            let mut info = SqlInfo::new(
                SqlExpr::SubQuery(handle.counter),
                Some(ColumnType::new(ScalarType::Long)),
            );
            info.query = Some(handle.query);
            info.index = Some(handle.index);
            return Ok(vec![info]);
        }
        let path = expression_path(expression)?;
        self.index_path(ctx, &path, flags)
    }

    /// Resolve `expression` to SQL readable from the context's own fragment
    /// without projecting it there
    pub fn convert_to_sql(
        &mut self,
        ctx: ContextId,
        expression: Option<&Expr>,
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        let path = expression_path(expression)?;
        self.sql_path(ctx, &path, flags)
    }

    pub(crate) fn index_path(
        &mut self,
        ctx: ContextId,
        path: &[String],
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        let query = self.contexts.query_of(ctx);
        let infos = self.sql_path(ctx, path, flags)?;
        Ok(infos
            .into_iter()
            .map(|mut info| {
                let index = self.model.add_projection_column(query, info.sql.clone());
                info.query = Some(query);
                info.index = Some(index);
                info
            })
            .collect())
    }

    pub(crate) fn sql_path(
        &mut self,
        ctx: ContextId,
        path: &[String],
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        match self.node(ctx) {
            Node::Table { query, entity } => self.table_sql(query, &entity, path, flags),
            Node::SubQuery { group: true, .. } if path.is_empty() && flags == ConvertFlags::All => {
                Err(TranslateError::GroupMaterializationUnsupported)
            }
            Node::SubQuery { sub, .. } => {
                let source = self.contexts.query_of(sub);
                let infos = self.sql_path(sub, path, flags)?;
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
            Node::Select(select) => {
                let target = descend(&select.lambda.body, path)
                    .ok_or_else(|| unresolved_path(&select.lambda, path))?;
                let scope = self.select_scope(ctx, &select);
                self.convert_expr(&scope, &target, flags)
            }
        }
    }

    fn table_sql(
        &self,
        query: QueryId,
        entity_name: &str,
        path: &[String],
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        let entity = self
            .schema
            .get_entity(entity_name)
            .ok_or_else(|| TranslateError::UnknownEntity(entity_name.to_string()))?;
        let unknown = |member: &str| TranslateError::UnknownMember {
            entity: entity.name.clone(),
            member: member.to_string(),
        };

        match path {
            [] => {
                let mut fields = match flags {
                    ConvertFlags::Key => entity.primary_key(),
                    _ => Vec::new(),
                };
                if fields.is_empty() {
                    fields = entity.fields().collect();
                }
                Ok(fields
                    .into_iter()
                    .map(|f| field_info(query, f).with_member(f.name.clone()))
                    .collect())
            }
            [member] => {
                if let Some(field) = entity.get_field(member) {
                    return Ok(vec![field_info(query, field)]);
                }
                let association = entity.get_association(member).ok_or_else(|| unknown(member))?;
                if flags == ConvertFlags::All {
                    return Err(TranslateError::UnresolvedExpression(format!(
                        "{}.{}",
                        entity.name, member
                    )));
                }
                association
                    .this_keys
                    .iter()
                    .zip(&association.other_keys)
                    .map(|(this, other)| {
                        let field = entity.get_field(this).ok_or_else(|| unknown(this))?;
                        Ok(field_info(query, field).with_member(other.clone()))
                    })
                    .collect()
            }
            [member, key] => {
                // Reading a key of an associated entity needs no join
                let association = entity.get_association(member).ok_or_else(|| unknown(member))?;
                let position = association
                    .other_keys
                    .iter()
                    .position(|k| k.eq_ignore_ascii_case(key))
                    .ok_or_else(|| {
                        TranslateError::UnresolvedExpression(format!(
                            "{}.{}.{}",
                            entity.name, member, key
                        ))
                    })?;
                let this = &association.this_keys[position];
                let field = entity.get_field(this).ok_or_else(|| unknown(this))?;
                Ok(vec![field_info(query, field)])
            }
            _ => Err(TranslateError::UnresolvedExpression(format!(
                "{}.{}",
                entity.name,
                path.join(".")
            ))),
        }
    }

    /// Whether the member path of `ctx` denotes an object rather than a
    /// scalar: an entity, an association or a constructed object
    pub(crate) fn is_composite_path(&self, ctx: ContextId, path: &[String]) -> bool {
        match self.node(ctx) {
            Node::Table { entity, .. } => match (self.schema.get_entity(&entity), path) {
                (Some(_), []) => true,
                (Some(e), [member]) => e.get_association(member).is_some(),
                _ => false,
            },
            Node::SubQuery { sub, .. } => self.is_composite_path(sub, path),
            Node::Select(select) => match descend(&select.lambda.body, path) {
                Some(expr) => self.is_composite_expr(&select, &expr),
                None => false,
            },
        }
    }

    fn is_composite_expr(&self, select: &SelectContext, expr: &Expr) -> bool {
        let expr = expr.unwrap();
        if let Some((root, path)) = expr.member_path() {
            let Some(k) = select.lambda.parameters.iter().position(|p| p == root) else {
                return false;
            };
            let path: Vec<String> = path.into_iter().map(str::to_string).collect();
            return self.is_composite_path(select.sequences[k], &path);
        }
        matches!(expr, Expr::New { .. } | Expr::MemberInit { .. })
    }

    pub(crate) fn cached_counter(&self, ctx: ContextId, expr: &Expr) -> Option<CounterHandle> {
        self.contexts
            .group_join_state(ctx)
            .and_then(|g| g.counter_request(expr))
    }

    /// Rebuild the materialization shape of `expression`, projecting every
    /// column it reads into the context's fragment (`BuildExpression`).
    ///
    /// `level` skips that many leading members of the expression's path.
    pub fn build_expression(
        &mut self,
        ctx: ContextId,
        expression: Option<&Expr>,
        level: usize,
    ) -> TranslateResult<Shape> {
        if let Some(handle) = expression.and_then(|e| self.cached_counter(ctx, e)) {
            return Ok(Shape::Column {
                index: handle.index,
                ty: Some(ScalarType::Long),
            });
        }
        let path = expression_path(expression)?;
        let level = level.min(path.len());
        self.build_path(ctx, &path[level..])
    }

    fn build_path(&mut self, ctx: ContextId, path: &[String]) -> TranslateResult<Shape> {
        match self.node(ctx) {
            Node::Table { query, entity } => {
                let infos = self.table_sql(query, &entity, path, ConvertFlags::All)?;
                if path.is_empty() {
                    let members = infos
                        .into_iter()
                        .map(|info| {
                            let index = self.model.add_projection_column(query, info.sql.clone());
                            (info.member_name(), column_shape(index, &info))
                        })
                        .collect();
                    return Ok(Shape::Entity { entity, members });
                }
                self.project_infos(query, infos, &path.join("."))
            }
            Node::SubQuery { group: true, .. } if path.is_empty() => {
                Err(TranslateError::GroupMaterializationUnsupported)
            }
            Node::SubQuery { query, sub, .. } => {
                let shape = self.build_path(sub, path)?;
                let source = self.contexts.query_of(sub);
                self.lift_shape(shape, source, query)
            }
            Node::Select(select) => {
                let target = descend(&select.lambda.body, path)
                    .ok_or_else(|| unresolved_path(&select.lambda, path))?;
                self.build_select_expr(ctx, &select, &target)
            }
        }
    }

    fn build_select_expr(
        &mut self,
        ctx: ContextId,
        select: &SelectContext,
        expr: &Expr,
    ) -> TranslateResult<Shape> {
        let target = self.contexts.query_of(ctx);
        let expr = expr.unwrap();

        if let Some((root, path)) = expr.member_path() {
            let k = select
                .lambda
                .parameters
                .iter()
                .position(|p| p == root)
                .ok_or_else(|| TranslateError::UnboundParameter(root.to_string()))?;
            let sequence = select.sequences[k];
            let path: Vec<String> = path.into_iter().map(str::to_string).collect();
            let shape = self.build_path(sequence, &path)?;
            let source = self.contexts.query_of(sequence);
            return self.lift_shape(shape, source, target);
        }

        match expr {
            Expr::Constant(value) => Ok(Shape::Constant(value.clone())),
            Expr::New {
                type_name,
                arguments,
                members,
            } if members.len() == arguments.len() => {
                let mut shapes = Vec::with_capacity(members.len());
                for (name, argument) in members.iter().zip(arguments) {
                    shapes.push((name.clone(), self.build_select_expr(ctx, select, argument)?));
                }
                Ok(Shape::Object {
                    type_name: type_name.clone(),
                    members: shapes,
                })
            }
            Expr::MemberInit {
                type_name,
                bindings,
                ..
            } => {
                let mut shapes = Vec::with_capacity(bindings.len());
                for binding in bindings {
                    let value = match binding {
                        MemberBinding::Assignment { expr, .. } => expr.clone(),
                        MemberBinding::Nested { bindings, .. } => nested_object(bindings)
                            .ok_or_else(|| TranslateError::UnresolvedExpression(binding.to_string()))?,
                        MemberBinding::List { .. } => {
                            return Err(TranslateError::UnresolvedExpression(binding.to_string()))
                        }
                    };
                    shapes.push((
                        binding.member().to_string(),
                        self.build_select_expr(ctx, select, &value)?,
                    ));
                }
                Ok(Shape::Object {
                    type_name: Some(type_name.clone()),
                    members: shapes,
                })
            }
            _ => {
                let scope = self.select_scope(ctx, select);
                let infos = self.convert_expr(&scope, expr, ConvertFlags::Field)?;
                self.project_infos(target, infos, &expr.to_string())
            }
        }
    }

    /// Project resolved columns into `query` as a scalar or an object shape
    fn project_infos(
        &mut self,
        query: QueryId,
        infos: Vec<SqlInfo>,
        expression: &str,
    ) -> TranslateResult<Shape> {
        match infos.as_slice() {
            [] => Err(TranslateError::UnresolvedExpression(expression.to_string())),
            [info] if info.members.is_empty() => {
                let index = self.model.add_projection_column(query, info.sql.clone());
                Ok(column_shape(index, info))
            }
            _ => {
                let members = infos
                    .into_iter()
                    .map(|info| {
                        let index = self.model.add_projection_column(query, info.sql.clone());
                        (info.member_name(), column_shape(index, &info))
                    })
                    .collect();
                Ok(Shape::Object {
                    type_name: None,
                    members,
                })
            }
        }
    }

    /// Re-express a shape built against `source` in terms of `target`
    fn lift_shape(&mut self, shape: Shape, source: QueryId, target: QueryId) -> TranslateResult<Shape> {
        if source == target {
            return Ok(shape);
        }
        let model = &mut self.model;
        shape.try_remap(&mut |index| {
            Ok::<_, TranslateError>(
                model.add_projection_column(target, SqlExpr::Column { query: source, index }),
            )
        })
    }

    /// Give the fragment owned by `ctx` an explicit alias (`SetAlias`).
    ///
    /// Compiler-generated names (containing `<`) are ignored, as are select
    /// contexts, which own no fragment.
    pub fn set_alias(&mut self, ctx: ContextId, name: &str) {
        if name.contains('<') {
            return;
        }
        let query = match &self.contexts.get(ctx).kind {
            ContextKind::Table(t) => t.query,
            ContextKind::SubQuery(s) => s.query,
            ContextKind::GroupJoinSubQuery(g) => g.sub.query,
            ContextKind::Select(_) | ContextKind::Join(_) | ContextKind::GroupJoin(_) => return,
        };
        self.model.set_alias(query, name);
    }

    /// Wrap `ctx` in a fresh fragment reading from it
    pub(crate) fn wrap_sub_query(&mut self, ctx: ContextId, group: bool) -> ContextId {
        let query = self.model.new_query();
        self.model.add_sub_query(query, self.contexts.query_of(ctx));
        let sub = SubQueryContext {
            query,
            sub_query: ctx,
        };
        let kind = if group {
            ContextKind::GroupJoinSubQuery(GroupJoinSubQueryContext::new(sub))
        } else {
            ContextKind::SubQuery(sub)
        };
        let wrapper = self.contexts.add(kind);
        self.contexts.set_parent(ctx, wrapper);
        wrapper
    }

    /// Add a select-like context over `sequences`
    pub(crate) fn add_select(
        &mut self,
        kind: fn(SelectContext) -> ContextKind,
        lambda: Lambda,
        sequences: Vec<ContextId>,
    ) -> ContextId {
        let id = self.contexts.add(kind(SelectContext {
            lambda,
            sequences: sequences.clone(),
        }));
        for sequence in sequences {
            self.contexts.set_parent(sequence, id);
        }
        id
    }
}

fn column_shape(index: usize, info: &SqlInfo) -> Shape {
    Shape::Column {
        index,
        ty: info.ty.as_ref().map(|t| t.scalar),
    }
}

fn unresolved_path(lambda: &Lambda, path: &[String]) -> TranslateError {
    TranslateError::UnresolvedExpression(format!("{}: {}", lambda, path.join(".")))
}
