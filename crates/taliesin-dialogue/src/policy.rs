//! The dialogue policy collaborator: decides the agent's next move.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::command::ValueCategory;
use crate::error::DialogueError;
use crate::state::{DialogueAct, DialogueState};

// ─────────────────────────────────────────────────────────────────────────────
// Policy actions
// ─────────────────────────────────────────────────────────────────────────────

/// The agent's chosen next move.
#[derive(Debug, Clone)]
pub struct PolicyAction {
    /// The complete dialogue state after the agent speaks. This replaces the
    /// loop's state outright; the policy is responsible for carrying the
    /// executed history forward.
    pub state: DialogueState,
    /// What the agent now expects from the user. `None` resolves the turn.
    pub expect: Option<ValueCategory>,
    /// Canned reply text. `None` asks the generator to phrase the reply
    /// from the new state.
    pub utterance: Option<String>,
    /// Labels for a multiple-choice question.
    pub choices: Vec<String>,
    /// How many result rows to show alongside the reply.
    pub num_results: usize,
}

impl PolicyAction {
    pub fn new(state: DialogueState) -> Self {
        Self {
            state,
            expect: None,
            utterance: None,
            choices: Vec::new(),
            num_results: 0,
        }
    }

    pub fn with_utterance(mut self, text: impl Into<String>) -> Self {
        self.utterance = Some(text.into());
        self
    }

    pub fn with_expect(mut self, expect: ValueCategory) -> Self {
        self.expect = Some(expect);
        self
    }

    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.choices = choices;
        self
    }

    pub fn with_num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// The collaborator
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait DialoguePolicy: Send + Sync {
    /// Choose the agent's next move for this state.
    ///
    /// `Ok(None)` means the policy has no move, which is turn-fatal: the
    /// loop apologizes and cancels the turn.
    async fn choose_action(
        &self,
        state: &DialogueState,
    ) -> Result<Option<PolicyAction>, DialogueError>;
}

pub type SharedPolicy = Arc<dyn DialoguePolicy>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock policy
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum CannedMove {
    Action(Box<PolicyAction>),
    NoMove,
    Fail(String),
}

/// Scriptable policy for tests and the demo frontend.
///
/// Canned moves are consumed in order. When the queue runs dry the policy
/// falls back to asking whether it can help with anything else.
#[derive(Default)]
pub struct MockPolicy {
    canned: Mutex<VecDeque<CannedMove>>,
    seen: Mutex<Vec<DialogueState>>,
}

impl MockPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(action: PolicyAction) -> Self {
        let policy = Self::new();
        policy.push_action(action);
        policy
    }

    pub fn push_action(&self, action: PolicyAction) {
        self.canned
            .lock()
            .unwrap()
            .push_back(CannedMove::Action(Box::new(action)));
    }

    /// Queue a "no move" answer, the turn-fatal case.
    pub fn push_no_move(&self) {
        self.canned.lock().unwrap().push_back(CannedMove::NoMove);
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.canned
            .lock()
            .unwrap()
            .push_back(CannedMove::Fail(message.into()));
    }

    /// Every state the policy was asked about.
    pub fn seen(&self) -> Vec<DialogueState> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DialoguePolicy for MockPolicy {
    async fn choose_action(
        &self,
        state: &DialogueState,
    ) -> Result<Option<PolicyAction>, DialogueError> {
        self.seen.lock().unwrap().push(state.clone());
        match self.canned.lock().unwrap().pop_front() {
            Some(CannedMove::Action(action)) => Ok(Some(*action)),
            Some(CannedMove::NoMove) => Ok(None),
            Some(CannedMove::Fail(message)) => Err(DialogueError::policy(message)),
            None => {
                let mut next = state.clone();
                next.dialogue_act = DialogueAct::SysAnythingElse;
                next.act_param = None;
                Ok(Some(PolicyAction::new(next).with_utterance(
                    "Is there anything else I can help you with?",
                )))
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

    #[tokio::test]
    async fn canned_moves_in_order() {
        let policy = MockPolicy::new();
        let state = DialogueState::initial();
        policy.push_action(
            PolicyAction::new(state.clone())
                .with_utterance("first")
                .with_expect(ValueCategory::YesNo),
        );
        policy.push_no_move();

        let first = policy.choose_action(&state).await.unwrap().unwrap();
        assert_eq!(first.utterance.as_deref(), Some("first"));
        assert_eq!(first.expect, Some(ValueCategory::YesNo));

        assert!(policy.choose_action(&state).await.unwrap().is_none());
        assert_eq!(policy.seen().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_queue_asks_anything_else() {
        let policy = MockPolicy::new();
        let state = DialogueState::initial();
        let action = policy.choose_action(&state).await.unwrap().unwrap();
        assert_eq!(action.state.dialogue_act, DialogueAct::SysAnythingElse);
        assert!(action.utterance.is_some());
        assert!(action.expect.is_none());
    }

    #[tokio::test]
    async fn failures_propagate() {
        let policy = MockPolicy::new();
        policy.push_failure("no policy loaded");
        let err = policy
            .choose_action(&DialogueState::initial())
            .await
            .unwrap_err();
        assert!(matches!(err, DialogueError::Policy(_)));
    }
}
