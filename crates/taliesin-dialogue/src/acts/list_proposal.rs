//! The list proposal act: offer a short list of results to choose from.

use taliesin_ast::{Action, FilterExpr, Statement, Value};

use crate::state::{DialogueAct, DialogueResult, DialogueState, HistoryItem, ResultList};

use super::{
    ReplyTemplate, accept_result, in_context_with_one_id_type, result_matches_filter, values_equal,
};

/// An agent proposal to present some of the current results as a list.
#[derive(Debug, Clone)]
pub struct ListProposal {
    /// The results being offered, a subset of the current result set.
    pub results: Vec<DialogueResult>,
    /// A property shared by all offered results, to mention in the reply.
    pub info: Option<FilterExpr>,
    /// An action to propose performing on the chosen result.
    pub action: Option<Action>,
    /// Whether the reply should offer to say more.
    pub has_learn_more: bool,
}

impl ListProposal {
    pub fn new(results: Vec<DialogueResult>) -> Self {
        Self {
            results,
            info: None,
            action: None,
            has_learn_more: false,
        }
    }

    pub fn with_info(mut self, info: FilterExpr) -> Self {
        self.info = Some(info);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_learn_more(mut self) -> Self {
        self.has_learn_more = true;
        self
    }
}

/// Validate a list proposal against the current results.
///
/// At least two results are required (one result is a recommendation, not a
/// list), every offered result must be present in the context with a shared
/// id type, and the info constraint must hold for all of them. Returns the
/// dialogue act the proposal would perform.
pub fn check_list_proposal(
    ctx_results: &ResultList,
    proposal: &ListProposal,
) -> Option<DialogueAct> {
    if proposal.results.len() < 2 {
        return None;
    }
    if !in_context_with_one_id_type(ctx_results, &proposal.results) {
        return None;
    }
    if let Some(info) = &proposal.info {
        if !proposal
            .results
            .iter()
            .all(|result| result_matches_filter(result, info))
        {
            return None;
        }
    }
    Some(DialogueAct::SysRecommendMany)
}

/// Build the agent state that utters a validated list proposal.
///
/// The proposed action, if any, joins the history as a proposed item so a
/// later acceptance can find it.
pub fn make_list_proposal_reply(
    state: &DialogueState,
    proposal: &ListProposal,
) -> Option<(DialogueState, ReplyTemplate)> {
    let ctx_results = state.current_results()?;
    let act = check_list_proposal(ctx_results, proposal)?;

    let mut new_state = state.clone();
    new_state.dialogue_act = act;
    new_state.act_param = None;
    if let Some(action) = &proposal.action {
        new_state.history.push(HistoryItem::proposed(Statement::Command {
            table: None,
            actions: vec![action.clone()],
        }));
    }

    let template = if proposal.action.is_some() {
        ReplyTemplate::ListWithAction
    } else if proposal.info.is_some() {
        ReplyTemplate::ListWithInfo
    } else {
        ReplyTemplate::ListSimple
    };
    Some((new_state, template))
}

/// Build the user state that picks one offered result by name.
///
/// The name may be the result's id, its raw value, or its display name.
/// Without an action in play the pick narrows the current query down to the
/// chosen id; with one, the id is bound into the action's matching input.
/// An unknown name returns `None` and the conversation state is untouched.
pub fn accept_list_proposal_by_name(
    state: &DialogueState,
    name: &Value,
    action: Option<&Action>,
) -> Option<DialogueState> {
    let results = state.current_results()?;
    let found = results
        .results
        .iter()
        .find(|result| result.id().is_some_and(|id| values_equal(id, name)))?;
    let id = found.id()?.clone();
    accept_result(state, &id, action)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
