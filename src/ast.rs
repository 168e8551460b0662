//! Query expression tree
//!
//! These are the shapes a calling application builds to describe a query
//! against in-memory objects: lambdas, member access, constructions and the
//! chained query operations (`Table`, `Where`, `Select`, `Join`, `GroupJoin`).
//! The tree is either built directly with the helper constructors below or
//! parsed from text with [`crate::parser::parse_query`].

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A literal value appearing in an expression
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl Value {
    /// Compare two values of compatible types.
    ///
    /// Returns `None` when the values cannot be compared (for example text
    /// against a number). Callers matching literals treat `None` as "no match".
    pub fn try_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
        }
    }
}

// Doubles compare by bit pattern so expressions can key the counter cache.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Double(d) => d.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{:?}", d),
            Value::Text(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BinaryOp {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_comparison(&self) -> bool {
        !matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// A lambda expression (`(o, i) => body`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Lambda {
    pub parameters: Vec<String>,
    pub body: Expr,
}

impl Lambda {
    pub fn new<S: Into<String>>(parameters: impl IntoIterator<Item = S>, body: Expr) -> Self {
        Self {
            parameters: parameters.into_iter().map(Into::into).collect(),
            body,
        }
    }
}

/// A binding inside a member-initialization expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum MemberBinding {
    /// `Member = expr`
    Assignment { member: String, expr: Expr },
    /// `Member = { Inner = expr, ... }`
    Nested {
        member: String,
        bindings: Vec<MemberBinding>,
    },
    /// `Member = [expr, ...]`
    List { member: String, items: Vec<Expr> },
}

impl MemberBinding {
    pub fn assign(member: impl Into<String>, expr: Expr) -> Self {
        MemberBinding::Assignment {
            member: member.into(),
            expr,
        }
    }

    pub fn member(&self) -> &str {
        match self {
            MemberBinding::Assignment { member, .. }
            | MemberBinding::Nested { member, .. }
            | MemberBinding::List { member, .. } => member,
        }
    }

    pub fn is_assignment(&self) -> bool {
        matches!(self, MemberBinding::Assignment { .. })
    }
}

/// Arguments of a `Join` or `GroupJoin` call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct JoinCall {
    pub outer: Expr,
    pub inner: Expr,
    pub outer_key: Expr,
    pub inner_key: Expr,
    pub result: Expr,
}

/// A query operation in a chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum QueryCall {
    /// A mapped entity table
    Table { entity: String },
    Where { source: Expr, predicate: Expr },
    Select { source: Expr, selector: Expr },
    Join(JoinCall),
    GroupJoin(JoinCall),
}

impl QueryCall {
    pub fn name(&self) -> &'static str {
        match self {
            QueryCall::Table { .. } => "Table",
            QueryCall::Where { .. } => "Where",
            QueryCall::Select { .. } => "Select",
            QueryCall::Join(_) => "Join",
            QueryCall::GroupJoin(_) => "GroupJoin",
        }
    }
}

/// An expression node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Expr {
    /// A lambda parameter reference
    Parameter(String),
    /// Member access (`target.member`)
    Member { target: Box<Expr>, member: String },
    Constant(Value),
    /// Object construction without bindings.
    ///
    /// `type_name == None` is an anonymous object or tuple; `members` then
    /// names each argument positionally.
    New {
        type_name: Option<String>,
        arguments: Vec<Expr>,
        members: Vec<String>,
    },
    /// Typed construction followed by member bindings (`new T(args) { A = x }`)
    MemberInit {
        type_name: String,
        arguments: Vec<Expr>,
        bindings: Vec<MemberBinding>,
    },
    Lambda(Box<Lambda>),
    /// Type conversion, stripped by [`Expr::unwrap`]
    Convert { operand: Box<Expr>, type_name: String },
    /// Quotation, stripped by [`Expr::unwrap`]
    Quote(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Number of elements in a group (`g.count()`)
    Count(Box<Expr>),
    Query(Box<QueryCall>),
}

impl Expr {
    pub fn param(name: impl Into<String>) -> Self {
        Expr::Parameter(name.into())
    }

    pub fn member(target: Expr, member: impl Into<String>) -> Self {
        Expr::Member {
            target: Box::new(target),
            member: member.into(),
        }
    }

    /// Shorthand for `param.member`
    pub fn field(param: &str, member: &str) -> Self {
        Expr::member(Expr::param(param), member)
    }

    pub fn constant(value: Value) -> Self {
        Expr::Constant(value)
    }

    pub fn lambda<S: Into<String>>(parameters: impl IntoIterator<Item = S>, body: Expr) -> Self {
        Expr::Lambda(Box::new(Lambda::new(parameters, body)))
    }

    pub fn quote(expr: Expr) -> Self {
        Expr::Quote(Box::new(expr))
    }

    pub fn convert(operand: Expr, type_name: impl Into<String>) -> Self {
        Expr::Convert {
            operand: Box::new(operand),
            type_name: type_name.into(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equal(left: Expr, right: Expr) -> Self {
        Expr::binary(BinaryOp::Equal, left, right)
    }

    pub fn count(group: Expr) -> Self {
        Expr::Count(Box::new(group))
    }

    /// Anonymous object construction with named members
    pub fn anonymous<S: Into<String>>(members: impl IntoIterator<Item = (S, Expr)>) -> Self {
        let (members, arguments): (Vec<String>, Vec<Expr>) = members
            .into_iter()
            .map(|(name, expr)| (name.into(), expr))
            .unzip();
        Expr::New {
            type_name: None,
            arguments,
            members,
        }
    }

    /// Positional tuple construction (`Item1`, `Item2`, ...)
    pub fn tuple(arguments: Vec<Expr>) -> Self {
        let members = (1..=arguments.len()).map(|i| format!("Item{}", i)).collect();
        Expr::New {
            type_name: None,
            arguments,
            members,
        }
    }

    /// Typed constructor call without bindings
    pub fn construct(type_name: impl Into<String>, arguments: Vec<Expr>) -> Self {
        Expr::New {
            type_name: Some(type_name.into()),
            arguments,
            members: Vec::new(),
        }
    }

    pub fn member_init(
        type_name: impl Into<String>,
        arguments: Vec<Expr>,
        bindings: Vec<MemberBinding>,
    ) -> Self {
        Expr::MemberInit {
            type_name: type_name.into(),
            arguments,
            bindings,
        }
    }

    pub fn table(entity: impl Into<String>) -> Self {
        Expr::Query(Box::new(QueryCall::Table {
            entity: entity.into(),
        }))
    }

    pub fn filter(source: Expr, predicate: Expr) -> Self {
        Expr::Query(Box::new(QueryCall::Where { source, predicate }))
    }

    pub fn select(source: Expr, selector: Expr) -> Self {
        Expr::Query(Box::new(QueryCall::Select { source, selector }))
    }

    pub fn join(outer: Expr, inner: Expr, outer_key: Expr, inner_key: Expr, result: Expr) -> Self {
        Expr::Query(Box::new(QueryCall::Join(JoinCall {
            outer,
            inner,
            outer_key,
            inner_key,
            result,
        })))
    }

    pub fn group_join(
        outer: Expr,
        inner: Expr,
        outer_key: Expr,
        inner_key: Expr,
        result: Expr,
    ) -> Self {
        Expr::Query(Box::new(QueryCall::GroupJoin(JoinCall {
            outer,
            inner,
            outer_key,
            inner_key,
            result,
        })))
    }

    /// Strip conversions and quotations wrapping this expression
    pub fn unwrap(&self) -> &Expr {
        match self {
            Expr::Convert { operand, .. } => operand.unwrap(),
            Expr::Quote(inner) => inner.unwrap(),
            other => other,
        }
    }

    /// View this expression as a lambda, looking through quotations
    pub fn as_lambda(&self) -> Option<&Lambda> {
        match self.unwrap() {
            Expr::Lambda(lambda) => Some(lambda),
            _ => None,
        }
    }

    /// Decompose a member chain into its root parameter and the member path.
    ///
    /// `o.Address.City` yields `("o", ["Address", "City"])`.
    pub fn member_path(&self) -> Option<(&str, Vec<&str>)> {
        match self.unwrap() {
            Expr::Parameter(name) => Some((name.as_str(), Vec::new())),
            Expr::Member { target, member } => {
                let (root, mut path) = target.member_path()?;
                path.push(member.as_str());
                Some((root, path))
            }
            _ => None,
        }
    }

    /// Name of the type this expression constructs, if any
    pub fn constructed_type(&self) -> Option<&str> {
        match self {
            Expr::New { type_name, .. } => type_name.as_deref(),
            Expr::MemberInit { type_name, .. } => Some(type_name),
            _ => None,
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for MemberBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberBinding::Assignment { member, expr } => write!(f, "{} = {}", member, expr),
            MemberBinding::Nested { member, bindings } => {
                write!(f, "{} = {{ ", member)?;
                write_list(f, bindings)?;
                write!(f, " }}")
            }
            MemberBinding::List { member, items } => {
                write!(f, "{} = [", member)?;
                write_list(f, items)?;
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parameters.len() == 1 {
            write!(f, "{} => {}", self.parameters[0], self.body)
        } else {
            write!(f, "({}) => {}", self.parameters.join(", "), self.body)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Parameter(name) => write!(f, "{}", name),
            Expr::Member { target, member } => write!(f, "{}.{}", target, member),
            Expr::Constant(value) => write!(f, "{}", value),
            Expr::New {
                type_name: Some(ty),
                arguments,
                ..
            } => {
                write!(f, "new {}(", ty)?;
                write_list(f, arguments)?;
                write!(f, ")")
            }
            Expr::New {
                type_name: None,
                arguments,
                members,
            } => {
                write!(f, "new {{ ")?;
                for (i, (name, arg)) in members.iter().zip(arguments).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, arg)?;
                }
                write!(f, " }}")
            }
            Expr::MemberInit {
                type_name,
                arguments,
                bindings,
            } => {
                write!(f, "new {}", type_name)?;
                if !arguments.is_empty() {
                    write!(f, "(")?;
                    write_list(f, arguments)?;
                    write!(f, ")")?;
                }
                write!(f, " {{ ")?;
                write_list(f, bindings)?;
                write!(f, " }}")
            }
            Expr::Lambda(lambda) => write!(f, "{}", lambda),
            Expr::Convert { operand, type_name } => write!(f, "({}){}", type_name, operand),
            Expr::Quote(inner) => write!(f, "{}", inner),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.as_str(), right),
            Expr::Count(group) => write!(f, "{}.count()", group),
            Expr::Query(call) => match call.as_ref() {
                QueryCall::Table { entity } => write!(f, "{}", entity),
                QueryCall::Where { source, predicate } => {
                    write!(f, "{}.where({})", source, predicate)
                }
                QueryCall::Select { source, selector } => {
                    write!(f, "{}.select({})", source, selector)
                }
                QueryCall::Join(call) => write_join(f, "join", call),
                QueryCall::GroupJoin(call) => write_join(f, "group_join", call),
            },
        }
    }
}

fn write_join(f: &mut fmt::Formatter<'_>, name: &str, call: &JoinCall) -> fmt::Result {
    write!(
        f,
        "{}.{}({}, {}, {}, {})",
        call.outer, name, call.inner, call.outer_key, call.inner_key, call.result
    )
}
