//! Table expressions: invocations and the operators layered on top of them.
//!
//! A table is a tree. The leaves are function invocations; filters,
//! projections, joins, sorts, and index selections wrap them. Compound nodes
//! that change the visible signature (filter, projection, join) carry their
//! own schema; sort and index are signature-preserving and defer to the node
//! below.

use serde::{Deserialize, Serialize};

use crate::filter::FilterExpr;
use crate::schema::Schema;
use crate::value::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Invocations
// ─────────────────────────────────────────────────────────────────────────────

/// Fully-qualified function name: a device kind plus a function within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId {
    pub kind: String,
    pub name: String,
}

impl FunctionId {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// The `@kind.name` surface form.
    pub fn full_name(&self) -> String {
        format!("@{}.{}", self.kind, self.name)
    }
}

/// A bound input parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InParam {
    pub name: String,
    pub value: Value,
}

impl InParam {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A call to a query or action function with its bound inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub function: FunctionId,
    pub in_params: Vec<InParam>,
    pub schema: Schema,
}

impl Invocation {
    pub fn new(function: FunctionId, schema: Schema) -> Self {
        Self {
            function,
            in_params: Vec::new(),
            schema,
        }
    }

    /// Builder-style parameter binding.
    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set_param(name, value);
        self
    }

    /// The bound value of a parameter, if any.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.in_params
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// Bind or rebind an input parameter.
    pub fn set_param(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.in_params.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.in_params.push(InParam::new(name, value)),
        }
    }

    /// Required input arguments that are still unbound or explicitly `$?`.
    pub fn missing_params(&self) -> Vec<&str> {
        self.schema
            .iter_in()
            .filter(|a| a.is_required())
            .filter(|a| match self.param(&a.name) {
                None => true,
                Some(v) => v.is_undefined(),
            })
            .map(|a| a.name.as_str())
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tables
// ─────────────────────────────────────────────────────────────────────────────

/// Sort order for [`Table::Sorted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A composable query expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Table {
    /// A bare function call.
    Invocation(Invocation),
    /// A boolean filter over the inner table's outputs.
    Filtered {
        inner: Box<Table>,
        filter: FilterExpr,
        schema: Schema,
    },
    /// Restrict the visible outputs to the named arguments.
    Projection {
        inner: Box<Table>,
        args: Vec<String>,
        schema: Schema,
    },
    /// Parameter-passing join: each left result feeds the right invocation.
    Join {
        lhs: Box<Table>,
        rhs: Box<Table>,
        in_params: Vec<InParam>,
        schema: Schema,
    },
    /// Order results by an output argument.
    Sorted {
        inner: Box<Table>,
        arg: String,
        direction: SortDirection,
    },
    /// Select the n-th result (1-based).
    Index { inner: Box<Table>, index: usize },
}

impl Table {
    pub fn invocation(inv: Invocation) -> Self {
        Self::Invocation(inv)
    }

    /// Wrap a table in a filter, inheriting the inner schema.
    pub fn filtered(inner: Table, filter: FilterExpr) -> Self {
        let schema = inner.schema().clone();
        Self::Filtered {
            inner: Box::new(inner),
            filter,
            schema,
        }
    }

    /// The visible signature at this node.
    pub fn schema(&self) -> &Schema {
        match self {
            Self::Invocation(inv) => &inv.schema,
            Self::Filtered { schema, .. }
            | Self::Projection { schema, .. }
            | Self::Join { schema, .. } => schema,
            Self::Sorted { inner, .. } | Self::Index { inner, .. } => inner.schema(),
        }
    }

    /// Every function invoked anywhere in the tree, left to right.
    pub fn primitives(&self) -> Vec<&Invocation> {
        let mut out = Vec::new();
        self.collect_primitives(&mut out);
        out
    }

    fn collect_primitives<'a>(&'a self, out: &mut Vec<&'a Invocation>) {
        match self {
            Self::Invocation(inv) => out.push(inv),
            Self::Filtered { inner, .. }
            | Self::Projection { inner, .. }
            | Self::Sorted { inner, .. }
            | Self::Index { inner, .. } => inner.collect_primitives(out),
            Self::Join { lhs, rhs, .. } => {
                lhs.collect_primitives(out);
                rhs.collect_primitives(out);
            }
        }
    }

    /// The conjunction of every filter applied anywhere in the tree.
    pub fn collected_filter(&self) -> FilterExpr {
        match self {
            Self::Invocation(_) => FilterExpr::True,
            Self::Filtered { inner, filter, .. } => {
                FilterExpr::and(vec![inner.collected_filter(), filter.clone()]).optimize()
            }
            Self::Projection { inner, .. }
            | Self::Sorted { inner, .. }
            | Self::Index { inner, .. } => inner.collected_filter(),
            Self::Join { lhs, rhs, .. } => {
                FilterExpr::and(vec![lhs.collected_filter(), rhs.collected_filter()]).optimize()
            }
        }
    }

    /// Whether the tree already contains a sort or index selection.
    pub fn is_index_limited(&self) -> bool {
        match self {
            Self::Sorted { .. } | Self::Index { .. } => true,
            Self::Invocation(_) => false,
            Self::Filtered { inner, .. } | Self::Projection { inner, .. } => {
                inner.is_index_limited()
            }
            Self::Join { lhs, rhs, .. } => lhs.is_index_limited() || rhs.is_index_limited(),
        }
    }

    /// Whether the tree contains a projection.
    pub fn has_projection(&self) -> bool {
        match self {
            Self::Projection { .. } => true,
            Self::Invocation(_) => false,
            Self::Filtered { inner, .. }
            | Self::Sorted { inner, .. }
            | Self::Index { inner, .. } => inner.has_projection(),
            Self::Join { lhs, rhs, .. } => lhs.has_projection() || rhs.has_projection(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
