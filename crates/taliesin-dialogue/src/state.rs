//! Dialogue state: the formal record of a conversation.
//!
//! A [`DialogueState`] is a value. Nothing in this module mutates a state in
//! place; every operation takes the old state (or a delta produced by the
//! analyzer) and returns a fresh one. [`compute_new_state`] is the single
//! merging rule: executed history is carried forward, unexecuted proposals
//! are superseded by the incoming delta, and user turns implicitly accept
//! what the agent proposed.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use taliesin_ast::transform::add_filter;
use taliesin_ast::{FilterExpr, Statement, Table, Value};

/// The dialogue policy shipped with this crate.
pub const TRANSACTION_POLICY: &str = "taliesin.transaction";

// ─────────────────────────────────────────────────────────────────────────────
// Dialogue acts
// ─────────────────────────────────────────────────────────────────────────────

/// What the last speaker was doing, in dialogue-act terms.
///
/// `Execute` and `Cancel` are user acts; the `Sys*` variants are agent acts
/// chosen by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueAct {
    /// The user asked for a statement to run.
    Execute,
    /// The user dismissed the current task.
    Cancel,
    /// The agent recommends a single result.
    SysRecommendOne,
    /// The agent proposes a short list of results to choose from.
    SysRecommendMany,
    /// The agent proposes narrowing the current query.
    SysProposeRefinedQuery,
    /// The agent asks a question to refine the search.
    SysSearchQuestion,
    /// The agent asks for a missing required parameter.
    SysSlotFill,
    /// The agent offers details about the current topic.
    SysLearnMore,
    /// The query returned nothing.
    SysEmpty,
    /// The action completed.
    SysActionSuccess,
    /// The action failed.
    SysActionError,
    /// The agent asks whether it can help with anything else.
    SysAnythingElse,
    /// The conversation is over.
    SysEnd,
    /// The agent greets the user.
    SysGreet,
}

impl DialogueAct {
    /// The surface token used when linearizing a state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Cancel => "cancel",
            Self::SysRecommendOne => "sys_recommend_one",
            Self::SysRecommendMany => "sys_recommend_many",
            Self::SysProposeRefinedQuery => "sys_propose_refined_query",
            Self::SysSearchQuestion => "sys_search_question",
            Self::SysSlotFill => "sys_slot_fill",
            Self::SysLearnMore => "sys_learn_more",
            Self::SysEmpty => "sys_empty",
            Self::SysActionSuccess => "sys_action_success",
            Self::SysActionError => "sys_action_error",
            Self::SysAnythingElse => "sys_anything_else",
            Self::SysEnd => "sys_end",
            Self::SysGreet => "sys_greet",
        }
    }

    /// Whether this act closes the dialogue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SysEnd)
    }
}

/// How far a history item has progressed toward execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmStatus {
    /// Suggested by the agent, not yet endorsed by the user.
    Proposed,
    /// Endorsed by the user, ready to run once complete.
    Accepted,
    /// Explicitly confirmed; the executor may perform side effects.
    Confirmed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// One row produced by executing a statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DialogueResult {
    pub values: BTreeMap<String, Value>,
}

impl DialogueResult {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// The value of a named output, if present.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The identifier of this result, if it has one.
    pub fn id(&self) -> Option<&Value> {
        self.values.get("id")
    }

    /// A human-readable name: the id's display name when available,
    /// otherwise a `name` output.
    pub fn name(&self) -> Option<String> {
        if let Some(Value::Entity {
            display: Some(display),
            ..
        }) = self.id()
        {
            return Some(display.clone());
        }
        self.values.get("name").map(Value::human_readable)
    }
}

/// The full outcome of executing one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultList {
    pub results: Vec<DialogueResult>,
    /// Total number of results, which may exceed `results.len()` when the
    /// executor truncated the page.
    pub count: usize,
    /// Whether more results are available past `count`.
    pub more: bool,
    /// The error the executor reported, if the statement failed.
    pub error: Option<Value>,
}

impl ResultList {
    pub fn new(results: Vec<DialogueResult>) -> Self {
        let count = results.len();
        Self {
            results,
            count,
            more: false,
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_more(mut self) -> Self {
        self.more = true;
        self
    }

    pub fn with_error(mut self, error: Value) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// History
// ─────────────────────────────────────────────────────────────────────────────

/// One statement in the conversation, with its execution outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub statement: Statement,
    /// Present exactly when the statement has been executed.
    pub results: Option<ResultList>,
    pub confirm: ConfirmStatus,
}

impl HistoryItem {
    pub fn new(statement: Statement, confirm: ConfirmStatus) -> Self {
        Self {
            statement,
            results: None,
            confirm,
        }
    }

    /// An agent suggestion awaiting user endorsement.
    pub fn proposed(statement: Statement) -> Self {
        Self::new(statement, ConfirmStatus::Proposed)
    }

    /// A statement the user has endorsed.
    pub fn accepted(statement: Statement) -> Self {
        Self::new(statement, ConfirmStatus::Accepted)
    }

    /// A statement the user has explicitly confirmed.
    pub fn confirmed(statement: Statement) -> Self {
        Self::new(statement, ConfirmStatus::Confirmed)
    }

    pub fn is_executed(&self) -> bool {
        self.results.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dialogue state
// ─────────────────────────────────────────────────────────────────────────────

/// The complete formal state of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueState {
    /// Name of the policy that owns this dialogue.
    pub policy: String,
    /// The last speaker's dialogue act.
    pub dialogue_act: DialogueAct,
    /// The argument the act refers to, for acts like `sys_search_question`.
    pub act_param: Option<String>,
    /// Every statement of the conversation, oldest first. Executed items
    /// come before unexecuted ones.
    pub history: Vec<HistoryItem>,
}

impl DialogueState {
    pub fn new(policy: impl Into<String>, dialogue_act: DialogueAct) -> Self {
        Self {
            policy: policy.into(),
            dialogue_act,
            act_param: None,
            history: Vec::new(),
        }
    }

    /// An empty user-side state under the built-in policy.
    pub fn initial() -> Self {
        Self::new(TRANSACTION_POLICY, DialogueAct::Execute)
    }

    pub fn with_act_param(mut self, param: impl Into<String>) -> Self {
        self.act_param = Some(param.into());
        self
    }

    pub fn with_history(mut self, history: Vec<HistoryItem>) -> Self {
        self.history = history;
        self
    }

    /// The most recently executed item: the current topic of conversation.
    pub fn current(&self) -> Option<&HistoryItem> {
        self.history.iter().rev().find(|item| item.is_executed())
    }

    /// The first unexecuted item that the user has endorsed.
    pub fn next_unexecuted(&self) -> Option<&HistoryItem> {
        self.history
            .iter()
            .find(|item| !item.is_executed() && item.confirm != ConfirmStatus::Proposed)
    }

    pub fn next_unexecuted_mut(&mut self) -> Option<&mut HistoryItem> {
        self.history
            .iter_mut()
            .find(|item| !item.is_executed() && item.confirm != ConfirmStatus::Proposed)
    }

    /// The agent's still-pending proposal, if any.
    pub fn proposed_item(&self) -> Option<&HistoryItem> {
        self.history
            .iter()
            .rev()
            .find(|item| !item.is_executed() && item.confirm == ConfirmStatus::Proposed)
    }

    /// The results of the current topic.
    pub fn current_results(&self) -> Option<&ResultList> {
        self.current().and_then(|item| item.results.as_ref())
    }

    /// The query of the current topic.
    pub fn current_table(&self) -> Option<&Table> {
        self.current().and_then(|item| item.statement.table())
    }

    /// Whether the dialogue act closes the conversation.
    pub fn is_terminal(&self) -> bool {
        self.dialogue_act.is_terminal()
    }
}

impl fmt::Display for DialogueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$dialogue @{}.{}", self.policy, self.dialogue_act.as_str())?;
        if let Some(param) = &self.act_param {
            write!(f, "({param})")?;
        }
        writeln!(f, ";")?;
        for item in &self.history {
            let status = match item.confirm {
                ConfirmStatus::Proposed => "proposed",
                ConfirmStatus::Accepted => "accepted",
                ConfirmStatus::Confirmed => "confirmed",
            };
            match &item.results {
                Some(list) => writeln!(
                    f,
                    "  [{status}, {} results] {}",
                    list.count, item.statement
                )?,
                None => writeln!(f, "  [{status}] {}", item.statement)?,
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State merging
// ─────────────────────────────────────────────────────────────────────────────

/// Which side of the conversation produced a state delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    User,
    Agent,
}

/// Merge a state delta into the conversation.
///
/// The delta's policy, act, and act parameter win outright. Executed items
/// of the old state are carried forward in order; its unexecuted items are
/// dropped, superseded by whatever the delta says next. When the delta comes
/// from the user, proposals inside it are implicitly accepted: acting on a
/// proposal is how the user endorses it.
pub fn compute_new_state(
    old: Option<&DialogueState>,
    delta: &DialogueState,
    side: Side,
) -> DialogueState {
    let mut history: Vec<HistoryItem> = old
        .map(|state| {
            state
                .history
                .iter()
                .filter(|item| item.is_executed())
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    for item in &delta.history {
        let mut item = item.clone();
        if side == Side::User && !item.is_executed() && item.confirm == ConfirmStatus::Proposed {
            item.confirm = ConfirmStatus::Accepted;
        }
        history.push(item);
    }

    DialogueState {
        policy: delta.policy.clone(),
        dialogue_act: delta.dialogue_act,
        act_param: delta.act_param.clone(),
        history,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State builders
// ─────────────────────────────────────────────────────────────────────────────

/// A new state that runs the given query next.
///
/// Executed history is preserved; pending proposals are superseded.
pub fn add_query(state: &DialogueState, table: Table, dialogue_act: DialogueAct) -> DialogueState {
    let mut history = executed_history(state);
    history.push(HistoryItem::accepted(Statement::Query(table)));
    DialogueState {
        policy: state.policy.clone(),
        dialogue_act,
        act_param: None,
        history,
    }
}

/// A new state that runs the given action next.
pub fn add_action(state: &DialogueState, action: taliesin_ast::Action) -> DialogueState {
    let mut history = executed_history(state);
    history.push(HistoryItem::accepted(Statement::Command {
        table: None,
        actions: vec![action],
    }));
    DialogueState {
        policy: state.policy.clone(),
        dialogue_act: DialogueAct::Execute,
        act_param: None,
        history,
    }
}

/// Fill one input parameter of the pending statement.
///
/// The last unexecuted item must have an open slot with this name; the
/// resulting item is accepted, whatever its previous status. Returns `None`
/// when there is nothing pending or no such slot.
pub fn add_action_param(
    state: &DialogueState,
    param: &str,
    value: Value,
) -> Option<DialogueState> {
    let pending = state
        .history
        .iter()
        .rev()
        .find(|item| !item.is_executed())?;
    let mut statement = pending.statement.clone();
    if !statement.bind_param(param, value) {
        return None;
    }
    let mut history = executed_history(state);
    history.push(HistoryItem::accepted(statement));
    Some(DialogueState {
        policy: state.policy.clone(),
        dialogue_act: DialogueAct::Execute,
        act_param: None,
        history,
    })
}

/// Narrow the current query with a new filter and run it again.
///
/// Filters already present on the refined arguments are removed first, so a
/// refinement replaces an earlier constraint instead of contradicting it.
/// The new item starts with no results; the dialogue act becomes `execute`.
/// Returns `None` when there is no current query or the refined filter does
/// not type-check against it.
pub fn query_refinement(state: &DialogueState, new_filter: FilterExpr) -> Option<DialogueState> {
    let table = state.current_table()?;
    let refined: HashSet<&str> = new_filter
        .atoms()
        .iter()
        .map(|(name, _, _)| *name)
        .collect();

    let (core, existing) = peel_filters(table);
    let kept = prune_filters_on(&existing, &refined);
    let base = if kept.is_true() {
        core.clone()
    } else {
        Table::filtered(core.clone(), kept)
    };
    let refined_table = add_filter(&base, new_filter)?;

    let mut history = executed_history(state);
    history.push(HistoryItem::accepted(Statement::Query(refined_table)));
    Some(DialogueState {
        policy: state.policy.clone(),
        dialogue_act: DialogueAct::Execute,
        act_param: None,
        history,
    })
}

fn executed_history(state: &DialogueState) -> Vec<HistoryItem> {
    state
        .history
        .iter()
        .filter(|item| item.is_executed())
        .cloned()
        .collect()
}

/// Split a table into its unfiltered core and the conjunction of the filter
/// nodes stacked on top of it.
fn peel_filters(table: &Table) -> (&Table, FilterExpr) {
    match table {
        Table::Filtered { inner, filter, .. } => {
            let (core, below) = peel_filters(inner);
            (
                core,
                FilterExpr::and(vec![below, filter.clone()]).optimize(),
            )
        }
        other => (other, FilterExpr::True),
    }
}

/// Remove every constraint that touches one of the named arguments.
///
/// Conjunctions are pruned element-wise; any other subtree mentioning a
/// refined argument is dropped whole.
fn prune_filters_on(filter: &FilterExpr, args: &HashSet<&str>) -> FilterExpr {
    match filter {
        FilterExpr::And(operands) => FilterExpr::and(
            operands
                .iter()
                .map(|op| prune_filters_on(op, args))
                .collect::<Vec<_>>(),
        )
        .optimize(),
        other => {
            let touches = other.atoms().iter().any(|(name, _, _)| args.contains(name));
            if touches {
                FilterExpr::True
            } else {
                other.clone()
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use taliesin_ast::{ArgDef, FilterOp, FunctionId, Invocation, ParamType, Schema};

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

    fn result(id: &str, food: &str) -> DialogueResult {
        let mut values = BTreeMap::new();
        values.insert(
            "id".to_string(),
            Value::entity_with_display(id, "com.yelp:restaurant", id),
        );
        values.insert("food".to_string(), Value::string(food));
        DialogueResult::new(values)
    }

    fn executed_query(table: Table, results: Vec<DialogueResult>) -> HistoryItem {
        let mut item = HistoryItem::confirmed(Statement::Query(table));
        item.results = Some(ResultList::new(results));
        item
    }

    #[test]
    fn test_merge_keeps_executed_drops_unexecuted() {
        let mut old = DialogueState::initial();
        old.history.push(executed_query(restaurant_table(), vec![result("R1", "thai")]));
        old.history.push(HistoryItem::proposed(Statement::Query(restaurant_table())));

        let mut delta = DialogueState::new(TRANSACTION_POLICY, DialogueAct::Execute);
        delta
            .history
            .push(HistoryItem::accepted(Statement::Query(restaurant_table())));

        let merged = compute_new_state(Some(&old), &delta, Side::User);
        assert_eq!(merged.history.len(), 2);
        assert!(merged.history[0].is_executed());
        assert_eq!(merged.history[1].confirm, ConfirmStatus::Accepted);
    }

    #[test]
    fn test_merge_user_side_accepts_proposals() {
        let mut delta = DialogueState::new(TRANSACTION_POLICY, DialogueAct::Execute);
        delta
            .history
            .push(HistoryItem::proposed(Statement::Query(restaurant_table())));

        let user = compute_new_state(None, &delta, Side::User);
        assert_eq!(user.history[0].confirm, ConfirmStatus::Accepted);

        let agent = compute_new_state(None, &delta, Side::Agent);
        assert_eq!(agent.history[0].confirm, ConfirmStatus::Proposed);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let mut old = DialogueState::initial();
        old.history.push(executed_query(restaurant_table(), vec![]));
        let mut delta = DialogueState::new(TRANSACTION_POLICY, DialogueAct::SysEmpty);
        delta
            .history
            .push(HistoryItem::accepted(Statement::Query(restaurant_table())));

        let a = compute_new_state(Some(&old), &delta, Side::Agent);
        let b = compute_new_state(Some(&old), &delta, Side::Agent);
        assert_eq!(a, b);
    }

    #[test]
    fn test_merge_takes_act_from_delta() {
        let old = DialogueState::new(TRANSACTION_POLICY, DialogueAct::SysRecommendMany);
        let delta = DialogueState::new(TRANSACTION_POLICY, DialogueAct::Cancel)
            .with_act_param("food");

        let merged = compute_new_state(Some(&old), &delta, Side::User);
        assert_eq!(merged.dialogue_act, DialogueAct::Cancel);
        assert_eq!(merged.act_param.as_deref(), Some("food"));
    }

    #[test]
    fn test_current_skips_unexecuted() {
        let mut state = DialogueState::initial();
        state.history.push(executed_query(restaurant_table(), vec![result("R1", "thai")]));
        state.history.push(HistoryItem::accepted(Statement::Query(restaurant_table())));

        let current = state.current().unwrap();
        assert!(current.is_executed());
        let next = state.next_unexecuted().unwrap();
        assert!(!next.is_executed());
    }

    #[test]
    fn test_next_unexecuted_ignores_proposals() {
        let mut state = DialogueState::initial();
        state.history.push(HistoryItem::proposed(Statement::Query(restaurant_table())));
        assert!(state.next_unexecuted().is_none());
        assert!(state.proposed_item().is_some());
    }

    #[test]
    fn test_add_query_supersedes_proposal() {
        let mut state = DialogueState::initial();
        state.history.push(executed_query(restaurant_table(), vec![]));
        state.history.push(HistoryItem::proposed(Statement::Query(restaurant_table())));

        let new_state = add_query(&state, restaurant_table(), DialogueAct::Execute);
        assert_eq!(new_state.history.len(), 2);
        assert_eq!(new_state.history[1].confirm, ConfirmStatus::Accepted);
        assert!(!new_state.history[1].is_executed());
    }

    #[test]
    fn test_add_action_param_fills_slot() {
        let schema = Schema::single(vec![ArgDef::input(
            "message",
            ParamType::String,
            true,
        )]);
        let action = taliesin_ast::Action::new(Invocation::new(
            FunctionId::new("org.mail", "send"),
            schema,
        ));
        let state = add_action(&DialogueState::initial(), action);
        assert!(!state.history[0].statement.is_executable());

        let filled = add_action_param(&state, "message", Value::string("hi")).unwrap();
        assert!(filled.history[0].statement.is_executable());
        assert!(add_action_param(&state, "nonexistent", Value::string("x")).is_none());
    }

    #[test]
    fn test_query_refinement_replaces_same_arg_filter() {
        let thai = FilterExpr::atom("food", FilterOp::Eq, Value::string("thai"));
        let rated = FilterExpr::atom("rating", FilterOp::Ge, Value::Number(4.0));
        let table = Table::filtered(restaurant_table(), FilterExpr::and(vec![thai, rated]));

        let mut state = DialogueState::initial();
        state.history.push(executed_query(table, vec![result("R1", "thai")]));

        let mexican = FilterExpr::atom("food", FilterOp::Eq, Value::string("mexican"));
        let refined = query_refinement(&state, mexican).unwrap();

        assert_eq!(refined.dialogue_act, DialogueAct::Execute);
        let item = &refined.history[1];
        assert!(!item.is_executed());
        let collected = item.statement.table().unwrap().collected_filter();
        let atoms = collected.atoms();
        assert!(atoms.iter().any(|(n, _, v)| *n == "food" && **v == Value::string("mexican")));
        assert!(atoms.iter().any(|(n, _, _)| *n == "rating"));
        assert!(!atoms.iter().any(|(_, _, v)| **v == Value::string("thai")));
    }

    #[test]
    fn test_query_refinement_needs_a_current_query() {
        let state = DialogueState::initial();
        let filter = FilterExpr::atom("food", FilterOp::Eq, Value::string("thai"));
        assert!(query_refinement(&state, filter).is_none());
    }

    #[test]
    fn test_display_shows_act_and_items() {
        let mut state = DialogueState::initial();
        state.dialogue_act = DialogueAct::SysRecommendOne;
        state.history.push(executed_query(restaurant_table(), vec![result("R1", "thai")]));

        let rendered = state.to_string();
        assert!(rendered.contains("sys_recommend_one"));
        assert!(rendered.contains("1 results"));
    }

    #[test]
    fn test_terminal_act() {
        assert!(DialogueAct::SysEnd.is_terminal());
        assert!(!DialogueAct::SysGreet.is_terminal());
        let state = DialogueState::new(TRANSACTION_POLICY, DialogueAct::SysEnd);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_result_name_prefers_display() {
        let r = result("R1", "thai");
        assert_eq!(r.name().as_deref(), Some("R1"));

        let mut values = BTreeMap::new();
        values.insert("name".to_string(), Value::string("The Alembic"));
        let named = DialogueResult::new(values);
        assert_eq!(named.name().as_deref(), Some("The Alembic"));
        assert!(named.id().is_none());
    }

    #[test]
    fn test_state_serde_round_trip() {
        let mut state = DialogueState::initial();
        state.history.push(executed_query(restaurant_table(), vec![result("R1", "thai")]));
        let json = serde_json::to_string(&state).unwrap();
        let back: DialogueState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
