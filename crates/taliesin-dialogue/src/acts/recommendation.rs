//! The recommendation act: single out one result.

use taliesin_ast::{Action, FilterExpr, Statement};

use crate::state::{DialogueAct, DialogueResult, DialogueState, HistoryItem, ResultList};

use super::{ReplyTemplate, accept_result, result_matches_filter, values_equal};

/// An agent proposal to recommend a single result.
#[derive(Debug, Clone)]
pub struct Recommendation {
    /// The recommended result, drawn from the current result set.
    pub top: DialogueResult,
    /// A property of the result worth mentioning.
    pub info: Option<FilterExpr>,
    /// An action to propose performing on it.
    pub action: Option<Action>,
    /// Whether the reply should offer to say more.
    pub has_learn_more: bool,
}

impl Recommendation {
    pub fn new(top: DialogueResult) -> Self {
        Self {
            top,
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

/// Validate a recommendation against the current results.
///
/// The recommended result must come from the context (matched by id when it
/// has one, by full equality otherwise), and the info constraint must hold
/// for it.
pub fn check_recommendation(
    ctx_results: &ResultList,
    recommendation: &Recommendation,
) -> Option<DialogueAct> {
    let top = &recommendation.top;
    let in_ctx = match top.id() {
        Some(id) => ctx_results
            .results
            .iter()
            .any(|c| c.id().is_some_and(|cid| values_equal(cid, id))),
        None => ctx_results.results.iter().any(|c| c == top),
    };
    if !in_ctx {
        return None;
    }
    if let Some(info) = &recommendation.info {
        if !result_matches_filter(top, info) {
            return None;
        }
    }
    Some(DialogueAct::SysRecommendOne)
}

/// Build the agent state that utters a validated recommendation.
pub fn make_recommendation_reply(
    state: &DialogueState,
    recommendation: &Recommendation,
) -> Option<(DialogueState, ReplyTemplate)> {
    let ctx_results = state.current_results()?;
    let act = check_recommendation(ctx_results, recommendation)?;

    let mut new_state = state.clone();
    new_state.dialogue_act = act;
    new_state.act_param = None;
    if let Some(action) = &recommendation.action {
        new_state.history.push(HistoryItem::proposed(Statement::Command {
            table: None,
            actions: vec![action.clone()],
        }));
    }

    let template = if recommendation.action.is_some() {
        ReplyTemplate::RecommendOneWithAction
    } else if recommendation.info.is_some() {
        ReplyTemplate::RecommendOneWithInfo
    } else {
        ReplyTemplate::RecommendOne
    };
    Some((new_state, template))
}

/// Build the user state that takes the recommendation.
///
/// The top of the current results is the recommended result; accepting
/// either narrows the query to it or binds it into the action in play.
pub fn accept_recommendation(
    state: &DialogueState,
    action: Option<&Action>,
) -> Option<DialogueState> {
    let top = state.current_results()?.results.first()?;
    let id = top.id()?.clone();
    accept_result(state, &id, action)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ConfirmStatus, add_query};
    use std::collections::BTreeMap;
    use taliesin_ast::{
        ArgDef, FilterOp, FunctionId, Invocation, ParamType, Schema, Table, Value,
    };

    fn restaurant_table() -> Table {
        let schema = Schema::list(vec![
            ArgDef::out("id", ParamType::entity("com.yelp:restaurant")).with_unique(),
            ArgDef::out("food", ParamType::String),
            ArgDef::out("rating", ParamType::Number),
        ]);
        Table::invocation(Invocation::new(
            FunctionId::new("com.yelp", "restaurant"),
            schema,
        ))
    }

    fn reserve_action() -> Action {
        let schema = Schema::single(vec![ArgDef::input(
            "restaurant",
            ParamType::entity("com.yelp:restaurant"),
            true,
        )]);
        Action::new(Invocation::new(
            FunctionId::new("com.opentable", "reserve"),
            schema,
        ))
    }

    fn result(id: &str, rating: f64) -> DialogueResult {
        let mut values = BTreeMap::new();
        values.insert(
            "id".to_string(),
            Value::entity_with_display(id, "com.yelp:restaurant", id),
        );
        values.insert("rating".to_string(), Value::Number(rating));
        DialogueResult::new(values)
    }

    fn searched_state(results: Vec<DialogueResult>) -> DialogueState {
        let mut state = add_query(
            &DialogueState::initial(),
            restaurant_table(),
            DialogueAct::Execute,
        );
        let item = state.next_unexecuted_mut().unwrap();
        item.results = Some(ResultList::new(results));
        item.confirm = ConfirmStatus::Confirmed;
        state
    }

    #[test]
    fn test_check_requires_result_from_context() {
        let state = searched_state(vec![result("R1", 4.5)]);
        let ctx = state.current_results().unwrap();

        let ok = Recommendation::new(result("R1", 4.5));
        assert_eq!(
            check_recommendation(ctx, &ok),
            Some(DialogueAct::SysRecommendOne)
        );

        let foreign = Recommendation::new(result("R9", 3.0));
        assert!(check_recommendation(ctx, &foreign).is_none());
    }

    #[test]
    fn test_check_info_must_hold() {
        let state = searched_state(vec![result("R1", 4.5)]);
        let ctx = state.current_results().unwrap();

        let high = FilterExpr::atom("rating", FilterOp::Ge, Value::Number(4.0));
        let rec = Recommendation::new(result("R1", 4.5)).with_info(high);
        assert!(check_recommendation(ctx, &rec).is_some());

        let too_high = FilterExpr::atom("rating", FilterOp::Ge, Value::Number(4.9));
        let rec = Recommendation::new(result("R1", 4.5)).with_info(too_high);
        assert!(check_recommendation(ctx, &rec).is_none());
    }

    #[test]
    fn test_reply_proposes_action() {
        let state = searched_state(vec![result("R1", 4.5)]);
        let rec = Recommendation::new(result("R1", 4.5)).with_action(reserve_action());
        let (new_state, template) = make_recommendation_reply(&state, &rec).unwrap();

        assert_eq!(template, ReplyTemplate::RecommendOneWithAction);
        assert_eq!(new_state.dialogue_act, DialogueAct::SysRecommendOne);
        assert!(new_state.proposed_item().is_some());
    }

    #[test]
    fn test_accept_binds_top_result() {
        let state = searched_state(vec![result("R1", 4.5), result("R2", 4.0)]);
        let rec = Recommendation::new(result("R1", 4.5)).with_action(reserve_action());
        let (state, _) = make_recommendation_reply(&state, &rec).unwrap();

        let accepted = accept_recommendation(&state, None).unwrap();
        let pending = accepted.next_unexecuted().unwrap();
        let bound = pending.statement.actions()[0]
            .invocation
            .param("restaurant")
            .unwrap();
        assert!(values_equal(
            bound,
            &Value::entity("R1", "com.yelp:restaurant")
        ));
    }

    #[test]
    fn test_accept_without_action_refines() {
        let state = searched_state(vec![result("R1", 4.5), result("R2", 4.0)]);
        let accepted = accept_recommendation(&state, None).unwrap();

        assert_eq!(accepted.dialogue_act, DialogueAct::Execute);
        let filter = accepted
            .next_unexecuted()
            .unwrap()
            .statement
            .table()
            .unwrap()
            .collected_filter();
        assert!(filter.atoms().iter().any(|(name, _, _)| *name == "id"));
    }

    #[test]
    fn test_accept_needs_results() {
        let state = searched_state(vec![]);
        assert!(accept_recommendation(&state, None).is_none());
    }
}
