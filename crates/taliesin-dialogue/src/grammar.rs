//! The grammar collaborator: between code tokens and typed inputs.
//!
//! The analyzer traffics in opaque token sequences. A [`GrammarService`]
//! owns both directions of the boundary: parsing a candidate sequence into a
//! typed [`ParsedInput`], and linearizing a dialogue state into the context
//! tokens the analyzer and generator condition on. The dialogue loop never
//! inspects tokens itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use taliesin_ast::{ControlIntent, SpecialCommand};
use taliesin_nlu::EntityMap;

use crate::command::ParsedInput;
use crate::error::GrammarError;
use crate::state::DialogueState;

#[async_trait]
pub trait GrammarService: Send + Sync {
    /// Parse and type-check one candidate token sequence.
    async fn parse_prediction(
        &self,
        code: &[String],
        entities: &EntityMap,
    ) -> Result<ParsedInput, GrammarError>;

    /// Linearize a dialogue state into context tokens and entities for the
    /// analyzer and generator. `None` is the start-of-conversation context.
    async fn prepare_context(
        &self,
        state: Option<&DialogueState>,
    ) -> Result<(Vec<String>, EntityMap), GrammarError>;
}

pub type SharedGrammar = Arc<dyn GrammarService>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock grammar
// ─────────────────────────────────────────────────────────────────────────────

/// Table-driven grammar for tests and the demo frontend.
///
/// Special keyword triples (`bookkeeping special special:<name>`) and choice
/// picks (`bookkeeping choice <n>`) parse out of the box; anything else must
/// be registered ahead of time.
#[derive(Default)]
pub struct MockGrammar {
    registered: Mutex<HashMap<String, ParsedInput>>,
}

impl MockGrammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a code sequence to a parsed input.
    pub fn register(&self, code: &[&str], parsed: ParsedInput) {
        self.registered
            .lock()
            .unwrap()
            .insert(code.join(" "), parsed);
    }
}

#[async_trait]
impl GrammarService for MockGrammar {
    async fn parse_prediction(
        &self,
        code: &[String],
        _entities: &EntityMap,
    ) -> Result<ParsedInput, GrammarError> {
        if let Some(parsed) = self.registered.lock().unwrap().get(&code.join(" ")) {
            return Ok(parsed.clone());
        }

        if let [kw, kind, token] = code {
            if kw == "bookkeeping" && kind == "special" {
                if let Some(cmd) = SpecialCommand::from_token(token) {
                    return Ok(ParsedInput::Control(ControlIntent::Special(cmd)));
                }
            }
            if kw == "bookkeeping" && kind == "choice" {
                if let Ok(index) = token.parse::<usize>() {
                    return Ok(ParsedInput::Control(ControlIntent::Choice(index)));
                }
            }
        }

        Err(GrammarError::parse(format!(
            "unrecognized code sequence: {}",
            code.join(" ")
        )))
    }

    async fn prepare_context(
        &self,
        state: Option<&DialogueState>,
    ) -> Result<(Vec<String>, EntityMap), GrammarError> {
        let tokens = match state {
            None => vec!["null".to_string()],
            Some(state) => {
                let mut tokens = vec![
                    "$dialogue".to_string(),
                    format!("@{}.{};", state.policy, state.dialogue_act.as_str()),
                ];
                // One opaque token per history item is enough for a mock:
                // the analyzer treats context tokens as an uninterpreted
                // conditioning sequence anyway.
                tokens.extend(
                    state
                        .history
                        .iter()
                        .map(|item| item.statement.to_string()),
                );
                tokens
            }
        };
        Ok((tokens, EntityMap::new()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
