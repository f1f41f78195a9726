//! Semantic programs and the transform library that rewrites them.
//!
//! This crate is the vocabulary of the whole system. A user request becomes a
//! [`Program`] of [`Statement`]s over [`Table`]s, [`Stream`]s, and
//! [`Action`]s, each carrying the [`Schema`] of the function it invokes. The
//! [`transform`] module rewrites those trees: adding filters, projecting,
//! joining, and lifting queries into rules, all as pure `Option`-returning
//! functions that refuse ill-formed combinations instead of producing them.
//!
//! Nothing here does I/O. Analysis, policy, and execution live in the crates
//! built on top.

pub mod control;
pub mod filter;
pub mod schema;
pub mod stream;
pub mod table;
pub mod transform;
pub mod value;

mod print;

pub use control::{ControlIntent, SpecialCommand};
pub use filter::{FilterExpr, FilterOp};
pub use schema::{ArgDef, ArgDirection, Schema, merge_schemas};
pub use stream::{Action, Program, Statement, Stream};
pub use table::{FunctionId, InParam, Invocation, SortDirection, Table};
pub use transform::TransformConfig;
pub use value::{ParamType, Value};
