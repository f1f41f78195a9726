//! Dialogue core for Taliesin.
//!
//! This crate provides the dialogue loop, the formal dialogue state, and the
//! dialogue-act builders that power Taliesin's conversational features.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  DialogueLoop                                               │
//! │  - Drains the notification and command queues               │
//! │  - Runs one user turn at a time                             │
//! │  - Owns the formal DialogueState                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌──────────┬──────────┼──────────┬──────────┐
//!        ▼          ▼          ▼          ▼          ▼
//!  ┌──────────┐ ┌─────────┐ ┌────────┐ ┌────────┐ ┌────────┐
//!  │ NluClient│ │ Grammar │ │Executor│ │ Policy │ │ Output │
//!  │(taliesin-│ │ Service │ │        │ │        │ │        │
//!  │   nlu)   │ │         │ │        │ │        │ │        │
//!  └──────────┘ └─────────┘ └────────┘ └────────┘ └────────┘
//! ```
//!
//! # Core Components
//!
//! - [`DialogueLoop`]: The conversation state machine, one task per user
//! - [`DialogueHandle`]: Clonable handle for pushing commands and control
//! - [`DialogueState`]: The formal state, a history of executable statements
//! - [`PolicyAction`]: One agent move chosen by the [`DialoguePolicy`]

pub mod acts;
pub mod command;
pub mod error;
pub mod executor;
pub mod grammar;
pub mod output;
pub mod policy;
pub mod queue;
pub mod state;

mod dialogue_loop;

// Re-export loop types
pub use dialogue_loop::{Collaborators, DialogueLoop, LoopConfig};
pub use queue::{DialogueHandle, ErrorNotification, Notification, QueueItem};

// Re-export state types
pub use state::{
    ConfirmStatus, DialogueAct, DialogueResult, DialogueState, HistoryItem, ResultList, Side,
    TRANSACTION_POLICY, add_action, add_action_param, add_query, compute_new_state,
    query_refinement,
};

// Re-export command analysis types
pub use command::{
    AnalyzedCommand, CommandAnalysisType, ParsedInput, UserInput, ValueCategory, analyze_candidate,
    choose_candidate, classify_control, is_parse_failure,
};

// Re-export dialogue-act builders
pub use acts::{
    ListProposal, Recommendation, ReplyTemplate, accept_list_proposal_by_name,
    accept_recommendation, accept_result, check_list_proposal, check_recommendation,
    make_list_proposal_reply, make_recommendation_reply, result_matches_filter,
};

// Re-export collaborator interfaces
pub use error::{DialogueError, GrammarError};
pub use executor::{DialogueExecutor, ExecutionResult, MockExecutor, RawResult, SharedExecutor};
pub use grammar::{GrammarService, MockGrammar, SharedGrammar};
pub use output::{ConversationOutput, MockOutput, OutputEvent, Rdl, SharedOutput};
pub use policy::{DialoguePolicy, MockPolicy, PolicyAction, SharedPolicy};
