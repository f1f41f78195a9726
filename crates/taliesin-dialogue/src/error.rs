//! Error types for the dialogue engine.
//!
//! [`DialogueError::Cancelled`] is special: it is not a failure but the
//! signal that the current turn should unwind. It is raised when the user
//! stops or dismisses the dialogue, when a terminal dialogue act is
//! reached, or when `stop()`/`reset()` interrupt an in-flight turn. The
//! dialogue loop catches it exactly once, at the turn boundary, and it is
//! never surfaced to the user.

use taliesin_nlu::NluError;
use thiserror::Error;

/// Errors produced while parsing or type-checking candidate code.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// The token sequence is not a well-formed program.
    #[error("parse error: {0}")]
    Parse(String),

    /// The program parsed but does not type-check.
    #[error("type error: {0}")]
    TypeCheck(String),
}

impl GrammarError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn type_check(message: impl Into<String>) -> Self {
        Self::TypeCheck(message.into())
    }
}

/// Errors produced by the dialogue loop and its collaborators.
#[derive(Debug, Error)]
pub enum DialogueError {
    /// The current turn was cancelled. Caught at the turn boundary,
    /// never shown to the user.
    #[error("turn cancelled")]
    Cancelled,

    /// The analyzer or generator service failed.
    #[error("analyzer error: {0}")]
    Nlu(#[from] NluError),

    /// A candidate or context failed to parse or type-check.
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),

    /// The executor failed to run the current program.
    #[error("execution error: {0}")]
    Executor(String),

    /// The dialogue policy failed to choose the next move.
    #[error("policy error: {0}")]
    Policy(String),

    /// The output sink rejected a message.
    #[error("output error: {0}")]
    Output(String),

    /// An invariant of the dialogue engine was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DialogueError {
    pub fn executor(message: impl Into<String>) -> Self {
        Self::Executor(message.into())
    }

    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy(message.into())
    }

    pub fn output(message: impl Into<String>) -> Self {
        Self::Output(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this is the cooperative cancellation signal rather than a
    /// real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
