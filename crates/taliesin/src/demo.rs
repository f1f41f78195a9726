//! Offline demo collaborators.
//!
//! `taliesin converse` without `--nlu-url` wires these in: a keyword
//! analyzer standing in for the translation model, a grammar that knows a
//! two-skill catalog (cat pictures and restaurants), a fixed-table executor,
//! and a rule-based policy. Together they exercise every path of the
//! dialogue loop from a terminal, with no server in sight.

use std::collections::BTreeMap;

use async_trait::async_trait;
use taliesin_ast::{
    Action, ArgDef, ControlIntent, FunctionId, Invocation, ParamType, Schema, Statement, Table,
    Value,
};
use taliesin_dialogue::{
    ConfirmStatus, DialogueAct, DialogueError, DialogueExecutor, DialoguePolicy, DialogueResult,
    DialogueState, ExecutionResult, GrammarError, GrammarService, MockGrammar, ParsedInput,
    PolicyAction, RawResult, Recommendation, ResultList, ValueCategory, add_query,
    make_recommendation_reply, result_matches_filter,
};
use taliesin_nlu::{
    CandidateParse, CandidateScore, EntityMap, GeneratedUtterance, NlgClient, NluClient,
    NluError, NluOptions, NluResult,
};

const CAT_CODE: &str = "@com.thecatapi.get";
const RESTAURANT_CODE: &str = "@org.example.restaurant.search";
const RESTAURANT_ENTITY: &str = "org.example.restaurant:restaurant";

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

fn cat_table() -> Table {
    let schema = Schema::list(vec![ArgDef::out("picture_url", ParamType::String)]);
    Table::invocation(Invocation::new(FunctionId::new("com.thecatapi", "get"), schema))
}

fn restaurant_table() -> Table {
    let schema = Schema::list(vec![
        ArgDef::out("id", ParamType::entity(RESTAURANT_ENTITY)).with_unique(),
        ArgDef::out("food", ParamType::String),
        ArgDef::out("price", ParamType::Number),
    ]);
    Table::invocation(Invocation::new(
        FunctionId::new("org.example.restaurant", "search"),
        schema,
    ))
}

fn reservation_for(restaurant: Value) -> Action {
    let schema = Schema::single(vec![ArgDef::input(
        "restaurant",
        ParamType::entity(RESTAURANT_ENTITY),
        true,
    )]);
    Action::new(
        Invocation::new(
            FunctionId::new("org.example.restaurant", "make_reservation"),
            schema,
        )
        .with_param("restaurant", restaurant),
    )
}

fn cat_rows() -> Vec<DialogueResult> {
    ["https://cataas.com/cat/1", "https://cataas.com/cat/2"]
        .iter()
        .map(|url| {
            let mut values = BTreeMap::new();
            values.insert("picture_url".to_string(), Value::string(*url));
            DialogueResult::new(values)
        })
        .collect()
}

fn restaurant_rows() -> Vec<DialogueResult> {
    [
        ("r1", "The Alembic", "burgers", 10.0),
        ("r2", "Nopa", "californian", 20.0),
        ("r3", "Zuni Cafe", "mediterranean", 30.0),
    ]
    .iter()
    .map(|(id, name, food, price)| {
        let mut values = BTreeMap::new();
        values.insert(
            "id".to_string(),
            Value::entity_with_display(*id, RESTAURANT_ENTITY, *name),
        );
        values.insert("food".to_string(), Value::string(*food));
        values.insert("price".to_string(), Value::Number(*price));
        DialogueResult::new(values)
    })
    .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Analyzer
// ─────────────────────────────────────────────────────────────────────────────

/// Keyword analyzer: maps utterances to code sequences the way the hosted
/// model would, entity placeholders included.
#[derive(Default)]
pub struct DemoAnalyzer;

impl DemoAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NluClient for DemoAnalyzer {
    async fn send_utterance(
        &self,
        utterance: &str,
        _context: Option<(&[String], &EntityMap)>,
        options: &NluOptions,
    ) -> Result<NluResult, NluError> {
        let trimmed = utterance.trim().to_lowercase();

        let special = match trimmed.as_str() {
            "yes" | "yeah" | "sure" | "ok" | "okay" => Some("special:yes"),
            "no" | "nope" => Some("special:no"),
            "stop" => Some("special:stop"),
            "never mind" | "nevermind" | "cancel" => Some("special:nevermind"),
            "debug" => Some("special:debug"),
            _ => None,
        };
        if let Some(token) = special {
            return Ok(NluResult::new(vec![CandidateParse::exact(&[
                "bookkeeping",
                "special",
                token,
            ])]));
        }

        // A bare number while choices are on screen is a pick. Users count
        // from one; the wire format counts from zero.
        if !options.choices.is_empty() {
            if let Ok(pick) = trimmed.parse::<usize>() {
                if (1..=options.choices.len()).contains(&pick) {
                    return Ok(NluResult::new(vec![CandidateParse::exact(&[
                        "bookkeeping",
                        "choice",
                        &(pick - 1).to_string(),
                    ])]));
                }
            }
        }

        // Numeric answers travel as an entity placeholder, like the real
        // tokenizer produces.
        if let Ok(number) = trimmed.parse::<f64>() {
            let mut result = NluResult::new(vec![CandidateParse::new(
                vec![
                    "bookkeeping".to_string(),
                    "answer".to_string(),
                    "NUMBER_0".to_string(),
                ],
                CandidateScore::Model(0.98),
            )]);
            result.tokens = vec!["NUMBER_0".to_string()];
            result.entities.insert("NUMBER_0".to_string(), number.into());
            return Ok(result);
        }

        if trimmed.contains("cat") {
            return Ok(NluResult::new(vec![CandidateParse::new(
                vec![CAT_CODE.to_string()],
                CandidateScore::Model(0.95),
            )]));
        }
        if trimmed.contains("restaurant") || trimmed.contains("food") || trimmed.contains("eat") {
            return Ok(NluResult::new(vec![CandidateParse::new(
                vec![RESTAURANT_CODE.to_string()],
                CandidateScore::Model(0.9),
            )]));
        }

        Ok(NluResult::default())
    }

    fn name(&self) -> &str {
        "demo-analyzer"
    }
}

/// Fallback generator for the rare state the demo policy has no line for.
#[derive(Default)]
pub struct DemoGenerator;

impl DemoGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NlgClient for DemoGenerator {
    async fn generate_utterance(
        &self,
        _context: &[String],
        _entities: &EntityMap,
        _target: &[String],
    ) -> Result<Vec<GeneratedUtterance>, NluError> {
        Ok(vec![GeneratedUtterance {
            answer: "Okay.".to_string(),
        }])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grammar
// ─────────────────────────────────────────────────────────────────────────────

/// Grammar over the demo catalog.
///
/// Function codes resolve through registrations; bookkeeping codes fall
/// through to the standard handling, with entity placeholders resolved from
/// the analyzer's entity map.
pub struct DemoGrammar {
    inner: MockGrammar,
}

impl DemoGrammar {
    pub fn new() -> Self {
        let inner = MockGrammar::new();
        inner.register(
            &[CAT_CODE],
            ParsedInput::Dialogue(add_query(
                &DialogueState::initial(),
                cat_table(),
                DialogueAct::Execute,
            )),
        );
        inner.register(
            &[RESTAURANT_CODE],
            ParsedInput::Dialogue(add_query(
                &DialogueState::initial(),
                restaurant_table(),
                DialogueAct::Execute,
            )),
        );
        Self { inner }
    }
}

impl Default for DemoGrammar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GrammarService for DemoGrammar {
    async fn parse_prediction(
        &self,
        code: &[String],
        entities: &EntityMap,
    ) -> Result<ParsedInput, GrammarError> {
        if let [kw, kind, token] = code {
            if kw == "bookkeeping" && kind == "answer" {
                let value = match entities.get(token) {
                    Some(serde_json::Value::Number(n)) => {
                        Value::Number(n.as_f64().unwrap_or_default())
                    }
                    Some(serde_json::Value::String(s)) => Value::string(s.clone()),
                    _ => Value::string(token.clone()),
                };
                return Ok(ParsedInput::Control(ControlIntent::Answer(value)));
            }
        }
        self.inner.parse_prediction(code, entities).await
    }

    async fn prepare_context(
        &self,
        state: Option<&DialogueState>,
    ) -> Result<(Vec<String>, EntityMap), GrammarError> {
        self.inner.prepare_context(state).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Executor
// ─────────────────────────────────────────────────────────────────────────────

/// Executor over the fixed catalog. Query rows are filtered by whatever
/// constraints the statement carries, so refinements visibly narrow the
/// list.
#[derive(Default)]
pub struct DemoExecutor;

impl DemoExecutor {
    pub fn new() -> Self {
        Self
    }

    fn rows_for(statement: &Statement) -> Vec<DialogueResult> {
        let Some(invocation) = statement.primitives().first().copied() else {
            return Vec::new();
        };
        let rows = match invocation.function.full_name().as_str() {
            CAT_CODE => cat_rows(),
            RESTAURANT_CODE => restaurant_rows(),
            _ => Vec::new(),
        };
        match statement.table() {
            Some(table) => {
                let filter = table.collected_filter();
                rows.into_iter()
                    .filter(|row| result_matches_filter(row, &filter))
                    .collect()
            }
            None => rows,
        }
    }

    fn output_type(statement: &Statement) -> String {
        statement
            .primitives()
            .last()
            .map(|inv| format!("{}:{}", inv.function.kind, inv.function.name))
            .unwrap_or_default()
    }
}

#[async_trait]
impl DialogueExecutor for DemoExecutor {
    async fn execute(
        &self,
        mut state: DialogueState,
        executor_state: Option<serde_json::Value>,
    ) -> Result<ExecutionResult, DialogueError> {
        let mut new_results = Vec::new();
        loop {
            let Some(item) = state.next_unexecuted_mut() else {
                break;
            };
            if !item.statement.is_executable() {
                break;
            }
            let output_type = Self::output_type(&item.statement);
            let rows = match &item.statement {
                Statement::Query(_) => Self::rows_for(&item.statement),
                // Actions in the demo always succeed and produce no rows.
                _ => Vec::new(),
            };
            new_results.extend(
                rows.iter()
                    .map(|row| RawResult::new(output_type.clone(), row.values.clone())),
            );
            item.results = Some(ResultList::new(rows));
            item.confirm = ConfirmStatus::Confirmed;
        }
        Ok(ExecutionResult {
            state,
            executor_state,
            new_results,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Rule-based policy over the demo catalog.
///
/// Restaurants get the full transaction arc: ask for a price if none is
/// set, then recommend the top hit with a reservation attached. Cats just
/// get shown.
#[derive(Default)]
pub struct DemoPolicy;

impl DemoPolicy {
    pub fn new() -> Self {
        Self
    }

    fn greet(state: &DialogueState) -> PolicyAction {
        PolicyAction::new(state.clone()).with_utterance(
            "Hello! I can find you a restaurant or show you cat pictures. \
             What can I do for you?",
        )
    }

    fn after_cancel(state: &DialogueState) -> PolicyAction {
        let mut next = state.clone();
        next.dialogue_act = DialogueAct::SysAnythingElse;
        PolicyAction::new(next).with_utterance("Alright. Anything else I can help with?")
    }

    fn action_success(state: &DialogueState) -> PolicyAction {
        let booked = state
            .current()
            .and_then(|item| item.statement.primitives().last().cloned())
            .and_then(|inv| inv.param("restaurant").cloned())
            .map(|value| match value {
                Value::Entity { display, value, .. } => display.unwrap_or(value),
                other => other.human_readable(),
            });
        let mut next = state.clone();
        next.dialogue_act = DialogueAct::SysActionSuccess;
        next.act_param = None;
        let line = match booked {
            Some(name) => format!("Done! Your table at {name} is booked."),
            None => "Done!".to_string(),
        };
        PolicyAction::new(next).with_utterance(line)
    }

    fn empty_search(state: &DialogueState) -> PolicyAction {
        let mut next = state.clone();
        next.dialogue_act = DialogueAct::SysEmpty;
        next.act_param = None;
        PolicyAction::new(next)
            .with_utterance("I could not find anything matching your request.")
    }

    fn show_cats(state: &DialogueState, count: usize) -> PolicyAction {
        let mut next = state.clone();
        next.dialogue_act = DialogueAct::SysRecommendMany;
        next.act_param = None;
        PolicyAction::new(next)
            .with_utterance("Here you go.")
            .with_num_results(count)
    }

    fn price_question(state: &DialogueState, count: usize) -> PolicyAction {
        let mut next = state.clone();
        next.dialogue_act = DialogueAct::SysSearchQuestion;
        next.act_param = Some("price".to_string());
        PolicyAction::new(next)
            .with_utterance(format!(
                "I found {count} restaurants. What price are you looking for?"
            ))
            .with_expect(ValueCategory::Number)
            .with_num_results(count)
    }

    fn recommend_restaurant(state: &DialogueState) -> Option<PolicyAction> {
        let results = state.current_results()?;
        let top = results.results.first()?;
        let id = top.id()?.clone();
        let name = top.name().unwrap_or_else(|| "this one".to_string());

        let recommendation = Recommendation::new(top.clone()).with_action(reservation_for(id));
        let (next, _template) = make_recommendation_reply(state, &recommendation)?;
        Some(
            PolicyAction::new(next)
                .with_utterance(format!(
                    "How about {name}? Would you like to reserve a table there?"
                ))
                .with_expect(ValueCategory::YesNo)
                .with_num_results(1),
        )
    }
}

#[async_trait]
impl DialoguePolicy for DemoPolicy {
    async fn choose_action(
        &self,
        state: &DialogueState,
    ) -> Result<Option<PolicyAction>, DialogueError> {
        if state.dialogue_act == DialogueAct::SysGreet {
            return Ok(Some(Self::greet(state)));
        }
        if state.dialogue_act == DialogueAct::Cancel {
            return Ok(Some(Self::after_cancel(state)));
        }

        let Some(current) = state.current() else {
            return Ok(Some(Self::after_cancel(state)));
        };

        if matches!(current.statement, Statement::Command { .. }) {
            return Ok(Some(Self::action_success(state)));
        }

        let results = match &current.results {
            Some(results) => results,
            None => return Ok(Some(Self::after_cancel(state))),
        };
        if results.is_empty() {
            return Ok(Some(Self::empty_search(state)));
        }

        let function = current
            .statement
            .primitives()
            .first()
            .map(|inv| inv.function.full_name())
            .unwrap_or_default();
        if function == CAT_CODE {
            return Ok(Some(Self::show_cats(state, results.results.len())));
        }

        // Restaurant arc: narrow by price first, then propose a booking.
        let price_known = state
            .current_table()
            .map(|table| table.collected_filter().uses_arg("price"))
            .unwrap_or(false);
        if !price_known && results.results.len() >= 2 {
            return Ok(Some(Self::price_question(state, results.results.len())));
        }
        Ok(Self::recommend_restaurant(state).or_else(|| Some(Self::after_cancel(state))))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
