//! Boolean filter expressions over a table's output arguments.

use serde::{Deserialize, Serialize};

use crate::value::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

/// Comparison operator in an atomic filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Exact equality.
    Eq,
    /// Greater than or equal.
    Ge,
    /// Less than or equal.
    Le,
    /// Array argument contains the value.
    Contains,
    /// Argument is a member of the value array.
    InArray,
    /// Argument text contains the value text.
    Substr,
}

impl FilterOp {
    /// Surface syntax for the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Contains => "contains",
            Self::InArray => "in_array",
            Self::Substr => "=~",
        }
    }

    /// Operators that pin an argument to specific values. A second filter on
    /// the same argument is redundant once one of these is present.
    pub fn is_equality(&self) -> bool {
        matches!(self, Self::Eq | Self::Contains | Self::InArray | Self::Substr)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────────────

/// A boolean expression over output arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterExpr {
    /// Always true; the identity under conjunction.
    True,
    /// Always false.
    False,
    /// A single comparison.
    Atom {
        name: String,
        op: FilterOp,
        #[serde(rename = "operand")]
        value: Value,
    },
    Not(Box<FilterExpr>),
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
}

impl FilterExpr {
    /// Atomic comparison constructor.
    pub fn atom(name: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self::Atom {
            name: name.into(),
            op,
            value,
        }
    }

    /// Conjunction, flattening single-element and empty cases.
    pub fn and(mut operands: Vec<FilterExpr>) -> Self {
        match operands.len() {
            0 => Self::True,
            1 => operands.remove(0),
            _ => Self::And(operands),
        }
    }

    /// Disjunction, flattening single-element and empty cases.
    pub fn or(mut operands: Vec<FilterExpr>) -> Self {
        match operands.len() {
            0 => Self::False,
            1 => operands.remove(0),
            _ => Self::Or(operands),
        }
    }

    /// Negation.
    pub fn not(inner: FilterExpr) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Simplify the expression: flatten nested conjunctions and disjunctions
    /// and drop neutral elements.
    pub fn optimize(self) -> Self {
        match self {
            Self::And(operands) => {
                let mut flat = Vec::new();
                for op in operands {
                    match op.optimize() {
                        Self::True => {}
                        Self::And(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                Self::and(flat)
            }
            Self::Or(operands) => {
                let mut flat = Vec::new();
                for op in operands {
                    match op.optimize() {
                        Self::False => {}
                        Self::Or(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                Self::or(flat)
            }
            Self::Not(inner) => Self::not(inner.optimize()),
            other => other,
        }
    }

    /// All atomic comparisons in the expression, in syntactic order.
    pub fn atoms(&self) -> Vec<(&str, FilterOp, &Value)> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<(&'a str, FilterOp, &'a Value)>) {
        match self {
            Self::Atom { name, op, value } => out.push((name, *op, value)),
            Self::Not(inner) => inner.collect_atoms(out),
            Self::And(operands) | Self::Or(operands) => {
                for op in operands {
                    op.collect_atoms(out);
                }
            }
            Self::True | Self::False => {}
        }
    }

    /// Whether any atom compares the named argument.
    pub fn uses_arg(&self, name: &str) -> bool {
        self.atoms().iter().any(|(n, _, _)| *n == name)
    }

    /// True for the trivial filter.
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn food_eq(v: &str) -> FilterExpr {
        FilterExpr::atom("food", FilterOp::Eq, Value::string(v))
    }

    #[test]
    fn test_and_flattens_trivial_cases() {
        assert_eq!(FilterExpr::and(vec![]), FilterExpr::True);
        assert_eq!(FilterExpr::and(vec![food_eq("thai")]), food_eq("thai"));
        assert!(matches!(
            FilterExpr::and(vec![food_eq("thai"), food_eq("sushi")]),
            FilterExpr::And(_)
        ));
    }

    #[test]
    fn test_or_flattens_trivial_cases() {
        assert_eq!(FilterExpr::or(vec![]), FilterExpr::False);
        assert_eq!(FilterExpr::or(vec![food_eq("thai")]), food_eq("thai"));
    }

    #[test]
    fn test_optimize_flattens_nesting() {
        let nested = FilterExpr::And(vec![
            food_eq("thai"),
            FilterExpr::And(vec![
                FilterExpr::atom("rating", FilterOp::Ge, Value::Number(4.0)),
                FilterExpr::True,
            ]),
        ]);
        let flat = nested.optimize();
        match flat {
            FilterExpr::And(operands) => assert_eq!(operands.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_optimize_collapses_to_single_atom() {
        let wrapped = FilterExpr::And(vec![FilterExpr::True, food_eq("thai")]);
        assert_eq!(wrapped.optimize(), food_eq("thai"));
    }

    #[test]
    fn test_atoms_walks_all_branches() {
        let filter = FilterExpr::And(vec![
            food_eq("thai"),
            FilterExpr::not(FilterExpr::Or(vec![
                FilterExpr::atom("rating", FilterOp::Le, Value::Number(2.0)),
                FilterExpr::atom("price", FilterOp::Eq, Value::Enum("expensive".to_string())),
            ])),
        ]);
        let atoms = filter.atoms();
        assert_eq!(atoms.len(), 3);
        assert!(filter.uses_arg("price"));
        assert!(!filter.uses_arg("cuisine"));
    }

    #[test]
    fn test_equality_operators() {
        assert!(FilterOp::Eq.is_equality());
        assert!(FilterOp::Contains.is_equality());
        assert!(FilterOp::Substr.is_equality());
        assert!(!FilterOp::Ge.is_equality());
        assert!(!FilterOp::Le.is_equality());
    }
}
