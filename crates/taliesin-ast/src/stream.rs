//! Streams, actions, and the statements that tie them together.

use serde::{Deserialize, Serialize};

use crate::filter::FilterExpr;
use crate::schema::Schema;
use crate::table::{Invocation, Table};
use crate::value::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Streams
// ─────────────────────────────────────────────────────────────────────────────

/// A source of asynchronous results, built by monitoring a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stream {
    /// Emit whenever the monitored table's results change.
    Monitor { table: Table },
    /// Keep only emissions matching the filter.
    Filtered {
        inner: Box<Stream>,
        filter: FilterExpr,
    },
}

impl Stream {
    /// Monitor a table. Returns `None` when the table is not monitorable.
    pub fn monitor(table: Table) -> Option<Self> {
        if !table.schema().is_monitorable {
            return None;
        }
        Some(Self::Monitor { table })
    }

    /// The signature of the emitted results.
    pub fn schema(&self) -> &Schema {
        match self {
            Self::Monitor { table } => table.schema(),
            Self::Filtered { inner, .. } => inner.schema(),
        }
    }

    /// Every function invoked anywhere under the stream.
    pub fn primitives(&self) -> Vec<&Invocation> {
        match self {
            Self::Monitor { table } => table.primitives(),
            Self::Filtered { inner, .. } => inner.primitives(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────────────────────────

/// A side-effecting function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub invocation: Invocation,
}

impl Action {
    pub fn new(invocation: Invocation) -> Self {
        Self { invocation }
    }

    /// Required inputs still awaiting a value.
    pub fn missing_params(&self) -> Vec<&str> {
        self.invocation.missing_params()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Statements and programs
// ─────────────────────────────────────────────────────────────────────────────

/// One executable unit of a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Statement {
    /// Retrieve and show results.
    Query(Table),
    /// Perform actions, optionally feeding them from a query.
    Command {
        table: Option<Table>,
        actions: Vec<Action>,
    },
    /// Run actions whenever the stream emits.
    Rule { stream: Stream, actions: Vec<Action> },
}

impl Statement {
    /// The query part of the statement, if any.
    pub fn table(&self) -> Option<&Table> {
        match self {
            Self::Query(table) => Some(table),
            Self::Command { table, .. } => table.as_ref(),
            Self::Rule { .. } => None,
        }
    }

    /// The action part of the statement.
    pub fn actions(&self) -> &[Action] {
        match self {
            Self::Query(_) => &[],
            Self::Command { actions, .. } | Self::Rule { actions, .. } => actions,
        }
    }

    /// Every function invoked anywhere in the statement.
    pub fn primitives(&self) -> Vec<&Invocation> {
        let mut out = Vec::new();
        match self {
            Self::Query(table) => out.extend(table.primitives()),
            Self::Command { table, actions } => {
                if let Some(table) = table {
                    out.extend(table.primitives());
                }
                out.extend(actions.iter().map(|a| &a.invocation));
            }
            Self::Rule { stream, actions } => {
                out.extend(stream.primitives());
                out.extend(actions.iter().map(|a| &a.invocation));
            }
        }
        out
    }

    /// Required inputs still awaiting a value, across all invocations.
    pub fn missing_params(&self) -> Vec<&str> {
        self.primitives()
            .into_iter()
            .flat_map(|inv| inv.missing_params())
            .collect()
    }

    /// Whether every required input is bound to a concrete value.
    pub fn is_executable(&self) -> bool {
        self.missing_params().is_empty()
    }

    /// Bind a value into the first invocation that has an unfilled input
    /// argument with this name. Returns false if no such slot exists.
    pub fn bind_param(&mut self, name: &str, value: Value) -> bool {
        let mut bound = false;
        self.for_each_invocation_mut(&mut |inv| {
            if bound {
                return;
            }
            let open = inv.schema.in_arg(name).is_some()
                && inv.param(name).is_none_or(Value::is_undefined);
            if open {
                inv.set_param(name, value.clone());
                bound = true;
            }
        });
        bound
    }

    fn for_each_invocation_mut(&mut self, f: &mut impl FnMut(&mut Invocation)) {
        fn walk_table(table: &mut Table, f: &mut impl FnMut(&mut Invocation)) {
            match table {
                Table::Invocation(inv) => f(inv),
                Table::Filtered { inner, .. }
                | Table::Projection { inner, .. }
                | Table::Sorted { inner, .. }
                | Table::Index { inner, .. } => walk_table(inner, f),
                Table::Join { lhs, rhs, .. } => {
                    walk_table(lhs, f);
                    walk_table(rhs, f);
                }
            }
        }
        fn walk_stream(stream: &mut Stream, f: &mut impl FnMut(&mut Invocation)) {
            match stream {
                Stream::Monitor { table } => walk_table(table, f),
                Stream::Filtered { inner, .. } => walk_stream(inner, f),
            }
        }
        match self {
            Self::Query(table) => walk_table(table, f),
            Self::Command { table, actions } => {
                if let Some(table) = table {
                    walk_table(table, f);
                }
                for action in actions {
                    f(&mut action.invocation);
                }
            }
            Self::Rule { stream, actions } => {
                walk_stream(stream, f);
                for action in actions {
                    f(&mut action.invocation);
                }
            }
        }
    }
}

/// A complete semantic program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// A program with a single statement.
    pub fn single(statement: Statement) -> Self {
        Self {
            statements: vec![statement],
        }
    }

    /// The sole statement of a single-statement program.
    pub fn only_statement(&self) -> Option<&Statement> {
        match self.statements.as_slice() {
            [stmt] => Some(stmt),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
