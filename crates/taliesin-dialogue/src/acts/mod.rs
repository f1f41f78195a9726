//! Dialogue-act builders: validated transitions the policy offers the user.
//!
//! Builders come in pairs. A `check_*` function validates an agent proposal
//! against the current results and names the dialogue act it would perform;
//! a `make_*_reply` function builds the agent state for it. The matching
//! `accept_*` functions build the user state that endorses the proposal.
//! Everything is a pure function returning `Option`: `None` means the
//! transition does not apply and the conversation state is untouched.

mod list_proposal;
mod recommendation;

pub use list_proposal::{
    ListProposal, accept_list_proposal_by_name, check_list_proposal, make_list_proposal_reply,
};
pub use recommendation::{
    Recommendation, accept_recommendation, check_recommendation, make_recommendation_reply,
};

use std::cmp::Ordering;

use taliesin_ast::transform::beta_reduce_invocation;
use taliesin_ast::{Action, FilterExpr, FilterOp, Statement, Value};

use crate::state::{
    DialogueAct, DialogueResult, DialogueState, HistoryItem, ResultList, query_refinement,
};

/// Which surface form the generated reply should take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTemplate {
    ListSimple,
    ListWithInfo,
    ListWithAction,
    RecommendOne,
    RecommendOneWithInfo,
    RecommendOneWithAction,
}

// ─────────────────────────────────────────────────────────────────────────────
// Filter evaluation over results
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a result satisfies a filter.
///
/// Atoms over outputs the result does not carry are false, so a proposal
/// can never claim a property the data does not show.
pub fn result_matches_filter(result: &DialogueResult, filter: &FilterExpr) -> bool {
    match filter {
        FilterExpr::True => true,
        FilterExpr::False => false,
        FilterExpr::Atom { name, op, value } => match result.value(name) {
            Some(have) => atom_matches(have, *op, value),
            None => false,
        },
        FilterExpr::Not(inner) => !result_matches_filter(result, inner),
        FilterExpr::And(operands) => operands.iter().all(|op| result_matches_filter(result, op)),
        FilterExpr::Or(operands) => operands.iter().any(|op| result_matches_filter(result, op)),
    }
}

fn atom_matches(have: &Value, op: FilterOp, want: &Value) -> bool {
    match op {
        FilterOp::Eq => values_equal(have, want),
        FilterOp::Ge => compare(have, want).is_some_and(|ord| ord != Ordering::Less),
        FilterOp::Le => compare(have, want).is_some_and(|ord| ord != Ordering::Greater),
        FilterOp::Contains => match have {
            Value::Array(items) => items.iter().any(|item| values_equal(item, want)),
            _ => false,
        },
        FilterOp::InArray => match want {
            Value::Array(items) => items.iter().any(|item| values_equal(have, item)),
            _ => false,
        },
        FilterOp::Substr => match (have, want) {
            (Value::String(have), Value::String(want)) => {
                have.to_lowercase().contains(&want.to_lowercase())
            }
            _ => false,
        },
    }
}

/// Value equality for matching results against proposals.
///
/// Entities compare by value and type, ignoring the display name, and an
/// entity matches a bare string equal to either its value or its display.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (
            Value::Entity {
                value: av, ty: at, ..
            },
            Value::Entity {
                value: bv, ty: bt, ..
            },
        ) => av == bv && at == bt,
        (
            Value::Entity { value, display, .. },
            Value::String(s),
        )
        | (
            Value::String(s),
            Value::Entity { value, display, .. },
        ) => value == s || display.as_deref() == Some(s.as_str()),
        (a, b) => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (
            Value::Measure { value: x, unit: ux },
            Value::Measure { value: y, unit: uy },
        ) if ux == uy => x.partial_cmp(y),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared validation and acceptance
// ─────────────────────────────────────────────────────────────────────────────

fn id_type(result: &DialogueResult) -> Option<&str> {
    match result.id()? {
        Value::Entity { ty, .. } => Some(ty),
        _ => None,
    }
}

/// Whether every result appears in the context list and all their ids share
/// a single entity type.
fn in_context_with_one_id_type(ctx: &ResultList, results: &[DialogueResult]) -> bool {
    let mut shared_ty: Option<&str> = None;
    for result in results {
        let Some(id) = result.id() else {
            return false;
        };
        let in_ctx = ctx
            .results
            .iter()
            .any(|c| c.id().is_some_and(|cid| values_equal(cid, id)));
        if !in_ctx {
            return false;
        }
        let Some(ty) = id_type(result) else {
            return false;
        };
        match shared_ty {
            None => shared_ty = Some(ty),
            Some(prev) if prev != ty => return false,
            _ => {}
        }
    }
    true
}

fn proposed_action(state: &DialogueState) -> Option<&Action> {
    state.proposed_item()?.statement.actions().first()
}

/// Build the user state that accepts the result with this id: either narrow
/// the current query down to it, or bind it into an action.
///
/// A supplied action may refine the proposed one with extra parameters, but
/// switching to a different function is not an acceptance. The id must fit
/// an open input slot of the action.
pub fn accept_result(
    state: &DialogueState,
    id: &Value,
    supplied: Option<&Action>,
) -> Option<DialogueState> {
    let chosen = match (proposed_action(state), supplied) {
        (Some(proposed), Some(supplied)) => {
            if proposed.invocation.function != supplied.invocation.function {
                return None;
            }
            Some(supplied.clone())
        }
        (Some(proposed), None) => Some(proposed.clone()),
        (None, Some(supplied)) => Some(supplied.clone()),
        (None, None) => None,
    };

    match chosen {
        None => {
            let filter = FilterExpr::atom("id", FilterOp::Eq, id.clone());
            query_refinement(state, filter)
        }
        Some(action) => {
            let id_ty = id.ty()?;
            let slot = action.invocation.schema.iter_in().find(|arg| {
                id_ty.assignable_to(&arg.ty)
                    && action
                        .invocation
                        .param(&arg.name)
                        .is_none_or(Value::is_undefined)
            })?;
            let bound = beta_reduce_invocation(&action.invocation, &slot.name, id)?;

            let mut history: Vec<HistoryItem> = state
                .history
                .iter()
                .filter(|item| item.is_executed())
                .cloned()
                .collect();
            history.push(HistoryItem::accepted(Statement::Command {
                table: None,
                actions: vec![Action::new(bound)],
            }));
            Some(DialogueState {
                policy: state.policy.clone(),
                dialogue_act: DialogueAct::Execute,
                act_param: None,
                history,
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
