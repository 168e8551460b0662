//! Materialization shapes
//!
//! A [`Shape`] describes how a row of the root fragment is turned back into
//! the object the query selects: which projection ordinals feed which
//! members, and what kind of object holds them.

use crate::ast::Value;
use crate::sql::ScalarType;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Shape {
    /// Value read from a projection ordinal
    Column {
        index: usize,
        ty: Option<ScalarType>,
    },
    /// A literal carried into the result unchanged
    Constant(Value),
    /// A mapped entity rebuilt from its field columns
    Entity {
        entity: String,
        members: Vec<(String, Shape)>,
    },
    /// An anonymous, tuple or member-initialized object
    Object {
        type_name: Option<String>,
        members: Vec<(String, Shape)>,
    },
}

impl Shape {
    /// Projection ordinals read by this shape, depth first
    pub fn columns(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<usize>) {
        match self {
            Shape::Column { index, .. } => out.push(*index),
            Shape::Constant(_) => {}
            Shape::Entity { members, .. } | Shape::Object { members, .. } => {
                for (_, member) in members {
                    member.collect_columns(out);
                }
            }
        }
    }

    /// Look up a direct member by name
    pub fn member(&self, name: &str) -> Option<&Shape> {
        match self {
            Shape::Entity { members, .. } | Shape::Object { members, .. } => members
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, s)| s),
            _ => None,
        }
    }

    /// Rewrite every ordinal through `f`.
    ///
    /// Used when a shape built against an inner fragment is lifted into the
    /// fragment that wraps it.
    pub(crate) fn try_remap<E>(
        self,
        f: &mut impl FnMut(usize) -> Result<usize, E>,
    ) -> Result<Shape, E> {
        Ok(match self {
            Shape::Column { index, ty } => Shape::Column { index: f(index)?, ty },
            Shape::Constant(value) => Shape::Constant(value),
            Shape::Entity { entity, members } => Shape::Entity {
                entity,
                members: remap_members(members, f)?,
            },
            Shape::Object { type_name, members } => Shape::Object {
                type_name,
                members: remap_members(members, f)?,
            },
        })
    }
}

fn remap_members<E>(
    members: Vec<(String, Shape)>,
    f: &mut impl FnMut(usize) -> Result<usize, E>,
) -> Result<Vec<(String, Shape)>, E> {
    members
        .into_iter()
        .map(|(name, shape)| Ok((name, shape.try_remap(f)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(index: usize) -> Shape {
        Shape::Column { index, ty: None }
    }

    #[test]
    fn test_columns_depth_first() {
        let shape = Shape::Object {
            type_name: None,
            members: vec![
                ("A".into(), column(2)),
                (
                    "B".into(),
                    Shape::Entity {
                        entity: "Customer".into(),
                        members: vec![("Id".into(), column(0)), ("Name".into(), column(1))],
                    },
                ),
                ("C".into(), Shape::Constant(Value::Int(1))),
            ],
        };
        assert_eq!(shape.columns(), vec![2, 0, 1]);
        assert_eq!(shape.member("a"), Some(&column(2)));
    }

    #[test]
    fn test_remap() {
        let shape = Shape::Object {
            type_name: None,
            members: vec![("A".into(), column(0)), ("B".into(), column(1))],
        };
        let remapped: Result<Shape, ()> = shape.try_remap(&mut |i| Ok(i + 10));
        assert_eq!(remapped.unwrap().columns(), vec![10, 11]);
    }
}
