//! Function schemas: the argument signatures that every transform checks
//! against before touching a program.
//!
//! Schemas travel with the AST nodes that use them. A transform that narrows
//! what a node accepts (e.g. filtering on a unique argument) clones the schema
//! and patches the copy, so sibling nodes sharing the original are unaffected.

use serde::{Deserialize, Serialize};

use crate::value::ParamType;

// ─────────────────────────────────────────────────────────────────────────────
// Arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Whether an argument is an input to the function or an output from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArgDirection {
    /// Supplied by the caller. Required inputs must be bound before execution.
    In { required: bool },
    /// Produced by the function; filters and projections range over these.
    Out,
}

/// A single argument in a function signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgDef {
    pub name: String,
    pub ty: ParamType,
    pub direction: ArgDirection,
    /// Unique arguments identify at most one result; an equality filter on
    /// one makes further filtering pointless.
    #[serde(default)]
    pub unique: bool,
}

impl ArgDef {
    /// An output argument.
    pub fn out(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            direction: ArgDirection::Out,
            unique: false,
        }
    }

    /// An input argument.
    pub fn input(name: impl Into<String>, ty: ParamType, required: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            direction: ArgDirection::In { required },
            unique: false,
        }
    }

    /// Mark the argument as unique.
    pub fn with_unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// True for output arguments.
    pub fn is_out(&self) -> bool {
        matches!(self.direction, ArgDirection::Out)
    }

    /// True for input arguments.
    pub fn is_in(&self) -> bool {
        matches!(self.direction, ArgDirection::In { .. })
    }

    /// True for required input arguments.
    pub fn is_required(&self) -> bool {
        matches!(self.direction, ArgDirection::In { required: true })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Schemas
// ─────────────────────────────────────────────────────────────────────────────

/// The signature of a queryable function or action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub args: Vec<ArgDef>,
    /// Whether the function returns a list of results or a single one.
    #[serde(default)]
    pub is_list: bool,
    /// Whether the function's results can be monitored for changes.
    #[serde(default)]
    pub is_monitorable: bool,
    /// Set once a unique argument has been pinned by an equality filter;
    /// no further filters may be added.
    #[serde(default)]
    pub no_filter: bool,
}

impl Schema {
    /// A schema with the given arguments, returning a list of results.
    pub fn list(args: Vec<ArgDef>) -> Self {
        Self {
            args,
            is_list: true,
            is_monitorable: false,
            no_filter: false,
        }
    }

    /// A schema with the given arguments, returning a single result.
    pub fn single(args: Vec<ArgDef>) -> Self {
        Self {
            args,
            is_list: false,
            is_monitorable: false,
            no_filter: false,
        }
    }

    /// Mark the function as monitorable.
    pub fn with_monitorable(mut self) -> Self {
        self.is_monitorable = true;
        self
    }

    /// Look up an argument by name.
    pub fn arg(&self, name: &str) -> Option<&ArgDef> {
        self.args.iter().find(|a| a.name == name)
    }

    /// Look up an output argument by name.
    pub fn out_arg(&self, name: &str) -> Option<&ArgDef> {
        self.arg(name).filter(|a| a.is_out())
    }

    /// Look up an input argument by name.
    pub fn in_arg(&self, name: &str) -> Option<&ArgDef> {
        self.arg(name).filter(|a| a.is_in())
    }

    /// Iterate over the output arguments.
    pub fn iter_out(&self) -> impl Iterator<Item = &ArgDef> {
        self.args.iter().filter(|a| a.is_out())
    }

    /// Iterate over the input arguments.
    pub fn iter_in(&self) -> impl Iterator<Item = &ArgDef> {
        self.args.iter().filter(|a| a.is_in())
    }

    /// Whether the schema has an argument with this name.
    pub fn has_arg(&self, name: &str) -> bool {
        self.arg(name).is_some()
    }

    /// A copy of this schema with filtering disabled.
    pub fn with_no_filter(&self) -> Self {
        let mut patched = self.clone();
        patched.no_filter = true;
        patched
    }

    /// A copy of this schema without the named argument.
    pub fn without_arg(&self, name: &str) -> Self {
        let mut patched = self.clone();
        patched.args.retain(|a| a.name != name);
        patched
    }
}

/// Combine the schemas of two joined tables.
///
/// Right-hand arguments win name collisions. The argument consumed by the
/// join's parameter passing is dropped from both sides. The join returns a
/// list if either side does, and is monitorable only if both sides are.
pub fn merge_schemas(lhs: &Schema, rhs: &Schema, passed_arg: Option<&str>) -> Schema {
    let mut args: Vec<ArgDef> = lhs
        .args
        .iter()
        .filter(|a| !rhs.has_arg(&a.name))
        .filter(|a| passed_arg != Some(a.name.as_str()))
        .cloned()
        .collect();
    args.extend(
        rhs.args
            .iter()
            .filter(|a| passed_arg != Some(a.name.as_str()))
            .cloned(),
    );
    Schema {
        args,
        is_list: lhs.is_list || rhs.is_list,
        is_monitorable: lhs.is_monitorable && rhs.is_monitorable,
        no_filter: false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
