//! The execution collaborator: runs accepted statements for real.
//!
//! The dialogue loop never talks to devices directly. It hands the whole
//! dialogue state to a [`DialogueExecutor`], which runs every accepted,
//! unexecuted item and returns the state with results filled in, plus the
//! raw rows for display. Executor-internal bookkeeping rides along as an
//! opaque JSON value the loop stores and passes back unchanged.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taliesin_ast::{Statement, Value};

use crate::error::DialogueError;
use crate::state::{ConfirmStatus, DialogueResult, DialogueState, ResultList};

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// One untyped row as produced by a device, used for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    /// The `kind:function` pair that produced the row.
    pub output_type: String,
    pub values: BTreeMap<String, Value>,
}

impl RawResult {
    pub fn new(output_type: impl Into<String>, values: BTreeMap<String, Value>) -> Self {
        Self {
            output_type: output_type.into(),
            values,
        }
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// Everything one round of execution produced.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// The input state with results attached to the items that ran.
    pub state: DialogueState,
    /// Opaque executor bookkeeping, returned to the executor next round.
    pub executor_state: Option<serde_json::Value>,
    /// Raw rows for display, in execution order.
    pub new_results: Vec<RawResult>,
}

// ─────────────────────────────────────────────────────────────────────────────
// The collaborator
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait DialogueExecutor: Send + Sync {
    /// Run every accepted, unexecuted item of the state.
    async fn execute(
        &self,
        state: DialogueState,
        executor_state: Option<serde_json::Value>,
    ) -> Result<ExecutionResult, DialogueError>;
}

pub type SharedExecutor = Arc<dyn DialogueExecutor>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock executor
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum CannedExecution {
    Results(Vec<DialogueResult>),
    ItemError(Value),
    Fail(String),
}

/// Scriptable executor for tests and the demo frontend.
///
/// Canned outcomes are consumed one per executed item, in order. When the
/// queue runs dry, items execute with an empty result list.
#[derive(Default)]
pub struct MockExecutor {
    canned: Mutex<VecDeque<CannedExecution>>,
    executed: Mutex<Vec<Statement>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(results: Vec<DialogueResult>) -> Self {
        let executor = Self::new();
        executor.push_results(results);
        executor
    }

    /// Queue a successful execution producing these rows.
    pub fn push_results(&self, results: Vec<DialogueResult>) {
        self.canned
            .lock()
            .unwrap()
            .push_back(CannedExecution::Results(results));
    }

    /// Queue an execution that fails at the item level: the item completes
    /// with an error recorded in its result list.
    pub fn push_item_error(&self, error: Value) {
        self.canned
            .lock()
            .unwrap()
            .push_back(CannedExecution::ItemError(error));
    }

    /// Queue a failure of the executor itself.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.canned
            .lock()
            .unwrap()
            .push_back(CannedExecution::Fail(message.into()));
    }

    /// Every statement executed so far.
    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DialogueExecutor for MockExecutor {
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
            // Statements with unbound required parameters stay pending until
            // slot filling completes them.
            if !item.statement.is_executable() {
                break;
            }
            let output_type = item
                .statement
                .primitives()
                .first()
                .map(|inv| format!("{}:{}", inv.function.kind, inv.function.name))
                .unwrap_or_default();

            let canned = self
                .canned
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(CannedExecution::Results(Vec::new()));

            match canned {
                CannedExecution::Fail(message) => {
                    return Err(DialogueError::executor(message));
                }
                CannedExecution::ItemError(error) => {
                    self.executed.lock().unwrap().push(item.statement.clone());
                    item.results = Some(ResultList::empty().with_error(error));
                    item.confirm = ConfirmStatus::Confirmed;
                }
                CannedExecution::Results(results) => {
                    self.executed.lock().unwrap().push(item.statement.clone());
                    for row in &results {
                        new_results.push(RawResult::new(output_type.clone(), row.values.clone()));
                    }
                    item.results = Some(ResultList::new(results));
                    item.confirm = ConfirmStatus::Confirmed;
                }
            }
        }

        Ok(ExecutionResult {
            state,
            executor_state,
            new_results,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
