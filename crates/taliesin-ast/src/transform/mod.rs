//! The program transform library.
//!
//! Every function here is a total, pure function from program fragments to
//! `Option<_>`: `Some` carries the rewritten fragment, `None` means the
//! transform does not apply. Callers chain them and treat `None` as "this
//! candidate interpretation is ill-formed", so the functions never panic and
//! never mutate their inputs.
//!
//! ```text
//!   make_filter ──► add_filter ──► Table          (refine a query)
//!   make_projection / make_arg_max_min_table      (shape the results)
//!   table_join_replace_placeholder                (chain two queries)
//!   action_replace_param_with_table               (query feeds action)
//!   when_do_rule                                  (stream feeds action)
//! ```

mod filters;
mod joins;
mod tables;

pub use filters::{
    add_filter, check_filter, make_and_filter, make_but_filter, make_filter, make_or_filter,
};
pub use joins::{
    action_replace_param_with_table, beta_reduce_invocation, check_not_self_join_stream,
    projection_arg, table_join_replace_placeholder, when_do_rule,
};
pub use tables::{make_arg_max_min_table, make_projection};

use std::collections::HashSet;

/// Knobs for the filter constructors.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Arguments users may not filter on directly. Identity arguments are
    /// blacklisted because picking a result by id goes through the
    /// acceptance flow, not through a spoken filter.
    pub filter_blacklist: HashSet<String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            filter_blacklist: HashSet::from(["id".to_string()]),
        }
    }
}

impl TransformConfig {
    /// Allow filtering on every argument, identity included.
    pub fn unrestricted() -> Self {
        Self {
            filter_blacklist: HashSet::new(),
        }
    }
}
