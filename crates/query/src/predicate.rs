use std::{fmt, str::FromStr};

use serde_json::Value;

use crate::Error;

/// Separator between the segments of a qualified field path
/// (`author__country__name`).
pub const PATH_SEPARATOR: &str = "__";

/// Comparison operator of a predicate leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Contains,
    IContains,
    Exact,
    /// Case-insensitive equality; the default for bare `{field: value}`.
    IExact,
    /// Inclusive `[low, high]` range.
    Range,
}

impl Op {
    pub const ALL: [Op; 10] = [
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::In,
        Self::Contains,
        Self::IContains,
        Self::Exact,
        Self::IExact,
        Self::Range,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::Exact => "exact",
            Self::IExact => "iexact",
            Self::Range => "range",
        }
    }

    /// Parse a sigil-prefixed operator key such as `$gte`.
    pub fn from_sigil(key: &str) -> Option<Self> {
        key.strip_prefix('$').and_then(|name| name.parse().ok())
    }
}

impl FromStr for Op {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::UnsupportedComparison(s.to_string()))
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled boolean filter. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every record; the identity element of folding.
    True,
    Comparison { field: String, op: Op, value: Value },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn comparison(field: impl Into<String>, op: Op, value: Value) -> Self {
        Self::Comparison {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Conjunction of `children`, dropping identity children. An empty
    /// result is `True`; a single survivor is returned unwrapped.
    pub fn and(children: impl IntoIterator<Item = Predicate>) -> Self {
        Self::fold(children, Self::And)
    }

    /// Disjunction of `children`, dropping identity children the same way
    /// [`Predicate::and`] does.
    pub fn or(children: impl IntoIterator<Item = Predicate>) -> Self {
        Self::fold(children, Self::Or)
    }

    /// Negation. Negating the identity yields the identity.
    pub fn negate(child: Predicate) -> Self {
        if child.is_true() {
            Self::True
        } else {
            Self::Not(Box::new(child))
        }
    }

    fn fold(
        children: impl IntoIterator<Item = Predicate>,
        combine: fn(Vec<Predicate>) -> Predicate,
    ) -> Self {
        let mut kept: Vec<Predicate> = children.into_iter().filter(|p| !p.is_true()).collect();
        match kept.len() {
            0 => Self::True,
            1 => kept.remove(0),
            _ => combine(kept),
        }
    }

    /// Field paths referenced by the tree, in traversal order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::True => {},
            Self::Comparison { field, .. } => out.push(field),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_fields(out);
                }
            },
            Self::Not(child) => child.collect_fields(out),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => f.write_str("TRUE"),
            Self::Comparison { field, op, value } => write!(f, "{field}__{op}={value}"),
            Self::And(children) | Self::Or(children) => {
                let joiner = if matches!(self, Self::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(joiner)?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            },
            Self::Not(child) => write!(f, "NOT {child}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn op_parses_with_and_without_sigil() {
        assert_eq!(Op::from_sigil("$icontains"), Some(Op::IContains));
        assert_eq!("lte".parse::<Op>().ok(), Some(Op::Lte));
        assert_eq!(Op::from_sigil("gte"), None);
        assert_eq!(Op::from_sigil("$regex"), None);
    }

    #[test]
    fn folding_drops_identity_children() {
        let leaf = Predicate::comparison("a", Op::Exact, json!(1));
        assert_eq!(Predicate::and([Predicate::True, leaf.clone()]), leaf);
        assert_eq!(Predicate::or(Vec::new()), Predicate::True);
        assert_eq!(Predicate::and([Predicate::True, Predicate::True]), Predicate::True);
    }

    #[test]
    fn folding_preserves_order() {
        let a = Predicate::comparison("a", Op::Exact, json!(1));
        let b = Predicate::comparison("b", Op::Exact, json!(2));
        assert_eq!(
            Predicate::or([a.clone(), b.clone()]),
            Predicate::Or(vec![a, b])
        );
    }

    #[test]
    fn negating_identity_is_identity() {
        assert_eq!(Predicate::negate(Predicate::True), Predicate::True);
    }

    #[test]
    fn display_renders_tree() {
        let p = Predicate::and([
            Predicate::comparison("a", Op::Gt, json!(1)),
            Predicate::negate(Predicate::comparison("b", Op::IExact, json!("x"))),
        ]);
        assert_eq!(p.to_string(), r#"(a__gt=1 AND NOT b__iexact="x")"#);
        assert_eq!(p.fields(), vec!["a", "b"]);
    }
}
