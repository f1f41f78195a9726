//! The dialogue loop.
//!
//! A single task owns the conversation: it drains the notification queue
//! while idle, runs one user turn at a time, and consults the collaborators
//! (analyzer, generator, grammar, executor, policy, output) at fixed points.
//! Turn-fatal conditions surface as [`DialogueError::Cancelled`], which
//! unwinds to [`DialogueLoop::run`] and is swallowed there; the user only
//! ever sees the apology sent before the unwind.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use taliesin_ast::{ControlIntent, FilterExpr, FilterOp, SpecialCommand, Value};
use taliesin_nlu::{CandidateScore, NluOptions, SharedNlg, SharedNlu};

use crate::command::{
    analyze_candidate, choose_candidate, AnalyzedCommand, CommandAnalysisType, ParsedInput,
    UserInput, ValueCategory,
};
use crate::error::DialogueError;
use crate::executor::{RawResult, SharedExecutor};
use crate::grammar::SharedGrammar;
use crate::output::{Rdl, SharedOutput};
use crate::policy::SharedPolicy;
use crate::queue::{ControlRequest, DialogueHandle, ErrorNotification, Notification, QueueItem};
use crate::state::{
    add_action_param, compute_new_state, query_refinement, ConfirmStatus, DialogueAct,
    DialogueState, Side, TRANSACTION_POLICY,
};

const MSG_NEVERMIND: &str = "Sorry I couldn't help on that.";
const MSG_PARSE_FAILURE: &str = "Sorry, I did not understand that. Can you rephrase it?";
const MSG_OUT_OF_DOMAIN: &str = "I'm sorry, I don't know how to do that yet.";
const MSG_UNEXPECTED_ANSWER: &str = "Sorry, but that is not what I asked.";
const MSG_GENERIC_FAILURE: &str = "Sorry, I had an error processing your command.";
const MSG_ANALYZER_DOWN: &str = "Sorry, I cannot contact the parsing service at this time. \
     Please check your Internet connection and try again later.";

/// Everything the loop delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub nlu: SharedNlu,
    pub nlg: SharedNlg,
    pub grammar: SharedGrammar,
    pub executor: SharedExecutor,
    pub policy: SharedPolicy,
    pub output: SharedOutput,
}

/// Tunables for a dialogue loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Greet the user when the loop starts.
    pub show_welcome: bool,
    /// Answer debug commands with the linearized dialogue state.
    pub debug: bool,
    /// How many analyzer candidates to consider per utterance.
    pub max_candidates: usize,
    /// Upper bound on commands consumed within a single turn.
    pub iteration_limit: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            show_welcome: false,
            debug: false,
            max_candidates: 5,
            iteration_limit: 20,
        }
    }
}

impl LoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_welcome(mut self, show_welcome: bool) -> Self {
        self.show_welcome = show_welcome;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    pub fn with_iteration_limit(mut self, iteration_limit: usize) -> Self {
        self.iteration_limit = iteration_limit;
        self
    }
}

/// How a resolved command left the turn.
enum TurnStatus {
    /// The turn is over; go back to the queues.
    Resolved,
    /// The agent asked a question; wait for the next command.
    WaitingInput,
    /// Re-run analysis on a synthesized command without waiting.
    Reanalyze(UserInput),
}

/// The conversation state machine.
///
/// Constructed together with its [`DialogueHandle`]; `run` consumes the
/// loop and should be spawned on its own task.
pub struct DialogueLoop {
    collaborators: Collaborators,
    config: LoopConfig,
    conversation_id: Uuid,
    state: Option<DialogueState>,
    executor_state: Option<serde_json::Value>,
    expecting: Option<ValueCategory>,
    choices: Vec<String>,
    pending_results: Vec<RawResult>,
    last_notify_app: Option<String>,
    user_rx: mpsc::UnboundedReceiver<QueueItem>,
    notify_rx: mpsc::UnboundedReceiver<QueueItem>,
    control_rx: mpsc::UnboundedReceiver<ControlRequest>,
    shutdown: CancellationToken,
    pending_reset: Option<tokio::sync::oneshot::Sender<()>>,
}

impl DialogueLoop {
    pub fn new(collaborators: Collaborators, config: LoopConfig) -> (Self, DialogueHandle) {
        let (user_tx, user_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let handle = DialogueHandle {
            user_tx,
            notify_tx,
            control_tx,
            shutdown: shutdown.clone(),
        };
        let dialogue = Self {
            collaborators,
            config,
            conversation_id: Uuid::new_v4(),
            state: None,
            executor_state: None,
            expecting: None,
            choices: Vec::new(),
            pending_results: Vec::new(),
            last_notify_app: None,
            user_rx,
            notify_rx,
            control_rx,
            shutdown,
            pending_reset: None,
        };
        (dialogue, handle)
    }

    /// Run until stopped or until every handle has been dropped.
    pub async fn run(mut self) {
        tracing::info!(conversation = %self.conversation_id, "Dialogue loop starting");
        if let Err(error) = self.collaborators.nlu.start().await {
            tracing::warn!(%error, "Analyzer failed to start");
        }
        if self.config.show_welcome {
            self.send_welcome().await;
        }

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                Some(request) = self.control_rx.recv() => {
                    self.stash_control(request);
                    self.finish_turn().await;
                }

                item = self.notify_rx.recv() => match item {
                    Some(QueueItem::Notification(notification)) => {
                        self.handle_notification(notification).await;
                    }
                    Some(QueueItem::Error(error)) => {
                        self.handle_error_notification(error).await;
                    }
                    Some(QueueItem::UserInput(input)) => self.handle_turn(input).await,
                    None => break,
                },

                item = self.user_rx.recv() => match item {
                    Some(QueueItem::UserInput(input)) => self.handle_turn(input).await,
                    Some(_) => tracing::warn!("Ignoring notification on the command queue"),
                    None => break,
                },
            }
        }

        if let Err(error) = self.collaborators.nlu.stop().await {
            tracing::warn!(%error, "Analyzer failed to stop");
        }
        tracing::info!(conversation = %self.conversation_id, "Dialogue loop stopped");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Turn handling
    // ─────────────────────────────────────────────────────────────────────

    async fn handle_turn(&mut self, input: UserInput) {
        match self.handle_user_input(input).await {
            Ok(()) => {}
            Err(error) if error.is_cancelled() => {
                tracing::debug!("Turn cancelled");
            }
            Err(error) => {
                tracing::error!(%error, "Turn failed");
                self.reply(MSG_GENERIC_FAILURE).await;
            }
        }
        self.finish_turn().await;
    }

    /// Settle the loop back into its idle shape after a turn or a control
    /// request.
    async fn finish_turn(&mut self) {
        if let Some(done) = self.pending_reset.take() {
            tracing::debug!(conversation = %self.conversation_id, "Dialogue state reset");
            self.state = None;
            self.executor_state = None;
            let _ = done.send(());
        }
        if self.expecting.is_some() {
            self.expecting = None;
            log_sink(self.collaborators.output.set_expected(None).await);
            log_sink(self.collaborators.output.send_ask_special(None).await);
        }
        self.choices.clear();
        self.pending_results.clear();
    }

    /// One user turn. May consume several commands from the queue when the
    /// agent asks follow-up questions.
    async fn handle_user_input(&mut self, first: UserInput) -> Result<(), DialogueError> {
        let mut input = first;
        for _ in 0..self.config.iteration_limit {
            let command = self.analyze_command(input).await?;
            match command.analysis {
                CommandAnalysisType::Stop => {
                    // Stop is silent: drop the dialogue, reply with nothing.
                    self.state = None;
                    return Err(DialogueError::Cancelled);
                }
                CommandAnalysisType::Nevermind => {
                    self.reply(MSG_NEVERMIND).await;
                    self.state = None;
                    return Err(DialogueError::Cancelled);
                }
                CommandAnalysisType::Debug => {
                    if !self.config.debug {
                        return Ok(());
                    }
                    let dump = match &self.state {
                        Some(state) => state.to_string(),
                        None => "no dialogue state".to_string(),
                    };
                    self.reply(&dump).await;
                    input = self.next_command().await?;
                }
                CommandAnalysisType::Wakeup => {
                    if self.state.is_none() {
                        self.send_welcome().await;
                    }
                    return Ok(());
                }
                CommandAnalysisType::Ignore => return Ok(()),
                CommandAnalysisType::ParseFailure => {
                    self.reply(MSG_PARSE_FAILURE).await;
                    input = self.next_command().await?;
                }
                CommandAnalysisType::OutOfDomainCommand => {
                    self.reply(MSG_OUT_OF_DOMAIN).await;
                    input = self.next_command().await?;
                }
                CommandAnalysisType::InDomainCommand => {
                    match self.dispatch_in_domain(command).await? {
                        TurnStatus::Resolved => return Ok(()),
                        TurnStatus::WaitingInput => input = self.next_command().await?,
                        TurnStatus::Reanalyze(next) => input = next,
                    }
                }
            }
        }
        tracing::warn!(
            limit = self.config.iteration_limit,
            "Turn exceeded the iteration limit"
        );
        self.reply(MSG_GENERIC_FAILURE).await;
        Err(DialogueError::Cancelled)
    }

    async fn dispatch_in_domain(
        &mut self,
        command: AnalyzedCommand,
    ) -> Result<TurnStatus, DialogueError> {
        match command.parsed {
            Some(ParsedInput::Dialogue(delta)) => {
                let merged = compute_new_state(self.state.as_ref(), &delta, Side::User);
                self.state = Some(merged);
                self.execute_current().await?;
                self.agent_reply().await
            }
            Some(ParsedInput::Control(_)) | None => self.handle_answer(command.answer).await,
        }
    }

    /// An answer to whatever the agent last asked.
    async fn handle_answer(
        &mut self,
        answer: Option<Value>,
    ) -> Result<TurnStatus, DialogueError> {
        let (Some(answer), Some(expecting)) = (answer, self.expecting) else {
            self.reply(MSG_UNEXPECTED_ANSWER).await;
            return Ok(TurnStatus::WaitingInput);
        };
        if !expecting.accepts(&answer) {
            self.reply(MSG_UNEXPECTED_ANSWER).await;
            return Ok(TurnStatus::WaitingInput);
        }

        match expecting {
            ValueCategory::YesNo => self.handle_yes_no(matches!(answer, Value::Boolean(true))).await,
            ValueCategory::MultipleChoice => {
                let index = match &answer {
                    // The cast saturates: a negative would silently land on
                    // the first choice.
                    Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => *n as usize,
                    _ => {
                        self.reply(MSG_UNEXPECTED_ANSWER).await;
                        return Ok(TurnStatus::WaitingInput);
                    }
                };
                match self.choices.get(index) {
                    // The chosen label re-enters the turn as a fresh command.
                    Some(label) => Ok(TurnStatus::Reanalyze(UserInput::text(label.clone()))),
                    None => {
                        self.reply(MSG_UNEXPECTED_ANSWER).await;
                        Ok(TurnStatus::WaitingInput)
                    }
                }
            }
            _ => self.handle_slot_answer(answer).await,
        }
    }

    async fn handle_yes_no(&mut self, yes: bool) -> Result<TurnStatus, DialogueError> {
        if yes {
            if let Some(state) = self.state.as_mut() {
                // Both accepted and still-proposed items are fair game: a
                // "yes" to a proposal is the acceptance.
                if let Some(item) = state.history.iter_mut().rev().find(|i| !i.is_executed()) {
                    item.confirm = ConfirmStatus::Confirmed;
                }
            }
            self.execute_current().await?;
        } else if let Some(state) = self.state.as_mut() {
            state.history.retain(|item| item.is_executed());
            state.dialogue_act = DialogueAct::Cancel;
            state.act_param = None;
        }
        self.agent_reply().await
    }

    /// A scalar answer fills the slot named by `act_param`: search questions
    /// narrow the current query, everything else binds an input parameter.
    async fn handle_slot_answer(&mut self, answer: Value) -> Result<TurnStatus, DialogueError> {
        let Some(state) = self.state.clone() else {
            self.reply(MSG_UNEXPECTED_ANSWER).await;
            return Ok(TurnStatus::WaitingInput);
        };
        let Some(param) = state.act_param.clone() else {
            self.reply(MSG_UNEXPECTED_ANSWER).await;
            return Ok(TurnStatus::WaitingInput);
        };
        let filled = match state.dialogue_act {
            DialogueAct::SysSearchQuestion => {
                query_refinement(&state, FilterExpr::atom(&param, FilterOp::Eq, answer))
            }
            _ => add_action_param(&state, &param, answer),
        };
        match filled {
            Some(new_state) => {
                self.state = Some(new_state);
                self.execute_current().await?;
                self.agent_reply().await
            }
            None => {
                self.reply(MSG_UNEXPECTED_ANSWER).await;
                Ok(TurnStatus::WaitingInput)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Analysis
    // ─────────────────────────────────────────────────────────────────────

    async fn analyze_command(
        &mut self,
        input: UserInput,
    ) -> Result<AnalyzedCommand, DialogueError> {
        match input {
            UserInput::Parsed { intent } => Ok(analyze_candidate(
                intent,
                CandidateScore::Exact,
                String::new(),
                self.expecting,
                self.state.is_some(),
            )),
            UserInput::Text { utterance } => {
                if self.expecting.is_some_and(|category| category.is_raw()) {
                    // Raw mode: the utterance is the answer, never parsed.
                    let answer = Value::string(utterance.clone());
                    return Ok(AnalyzedCommand {
                        analysis: CommandAnalysisType::InDomainCommand,
                        utterance,
                        parsed: Some(ParsedInput::Control(ControlIntent::Answer(answer.clone()))),
                        answer: Some(answer),
                    });
                }
                self.analyze_utterance(utterance).await
            }
        }
    }

    async fn analyze_utterance(
        &mut self,
        utterance: String,
    ) -> Result<AnalyzedCommand, DialogueError> {
        let prepared = self
            .collaborators
            .grammar
            .prepare_context(self.state.as_ref())
            .await;
        let (context_tokens, entities) = match prepared {
            Ok(prepared) => prepared,
            Err(error) => {
                tracing::error!(%error, "Failed to linearize the dialogue context");
                return Err(self.fail_turn().await);
            }
        };

        let options = NluOptions {
            expect: self
                .expecting
                .map(|category| category.ask_special_token().to_string()),
            choices: self.choices.clone(),
        };
        let analyzed = self
            .collaborators
            .nlu
            .send_utterance(&utterance, Some((&context_tokens, &entities)), &options)
            .await;
        let analyzed = match analyzed {
            Ok(result) => result,
            Err(error) if error.is_transport() => {
                tracing::error!(%error, "Cannot reach the analyzer");
                self.reply(MSG_ANALYZER_DOWN).await;
                return Err(DialogueError::Cancelled);
            }
            Err(error) => return Err(error.into()),
        };

        let mut candidates: Vec<(ParsedInput, CandidateScore)> = Vec::new();
        for candidate in analyzed.candidates.iter().take(self.config.max_candidates) {
            match self
                .collaborators
                .grammar
                .parse_prediction(&candidate.code, &analyzed.entities)
                .await
            {
                Ok(parsed) => candidates.push((parsed, candidate.score)),
                Err(error) => {
                    tracing::debug!(%error, code = ?candidate.code, "Discarding candidate");
                }
            }
        }
        // The give-up marker is always appended, so selection always has a
        // fallback even when the analyzer returned nothing usable.
        candidates.push((
            ParsedInput::Control(ControlIntent::Special(SpecialCommand::Failed)),
            CandidateScore::Unsupported,
        ));

        let Some((parsed, score)) = choose_candidate(&candidates) else {
            return Err(DialogueError::internal("no candidates after analysis"));
        };
        Ok(analyze_candidate(
            parsed.clone(),
            *score,
            utterance,
            self.expecting,
            self.state.is_some(),
        ))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Execution and agent moves
    // ─────────────────────────────────────────────────────────────────────

    async fn execute_current(&mut self) -> Result<(), DialogueError> {
        let Some(state) = self.state.clone() else {
            return Ok(());
        };
        if state.next_unexecuted().is_none() {
            return Ok(());
        }
        let outcome = self
            .collaborators
            .executor
            .execute(state, self.executor_state.clone())
            .await;
        match outcome {
            Ok(outcome) => {
                self.state = Some(outcome.state);
                self.executor_state = outcome.executor_state;
                self.pending_results = outcome.new_results;
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, "Execution failed");
                Err(self.fail_turn().await)
            }
        }
    }

    /// Ask the policy for the next agent move and deliver it.
    async fn agent_reply(&mut self) -> Result<TurnStatus, DialogueError> {
        let Some(current) = self.state.clone() else {
            return Ok(TurnStatus::Resolved);
        };

        let action = match self.collaborators.policy.choose_action(&current).await {
            Ok(Some(action)) => action,
            Ok(None) => {
                tracing::warn!("Policy has no move for the current state");
                return Err(self.fail_turn().await);
            }
            Err(error) => {
                tracing::error!(%error, "Policy failed");
                return Err(self.fail_turn().await);
            }
        };

        let text = match &action.utterance {
            Some(text) => text.clone(),
            None => self.generate_utterance(&current, &action.state).await?,
        };

        // The policy hands back a complete state; it replaces ours outright.
        self.state = Some(action.state);
        self.reply(&text).await;
        self.show_results(action.num_results).await;

        for (index, label) in action.choices.iter().enumerate() {
            log_sink(self.collaborators.output.send_choice(index, label).await);
        }
        self.choices = action.choices;

        self.expecting = action.expect;
        log_sink(self.collaborators.output.set_expected(action.expect).await);
        log_sink(self.collaborators.output.send_ask_special(action.expect).await);

        if self.state.as_ref().is_some_and(DialogueState::is_terminal) {
            self.state = None;
            return Err(DialogueError::Cancelled);
        }
        match self.expecting {
            Some(_) => Ok(TurnStatus::WaitingInput),
            None => Ok(TurnStatus::Resolved),
        }
    }

    /// Neural generation fallback for moves the policy did not phrase.
    async fn generate_utterance(
        &mut self,
        context: &DialogueState,
        target: &DialogueState,
    ) -> Result<String, DialogueError> {
        let context_prepared = self
            .collaborators
            .grammar
            .prepare_context(Some(context))
            .await;
        let (context_tokens, entities) = match context_prepared {
            Ok(prepared) => prepared,
            Err(error) => {
                tracing::error!(%error, "Failed to linearize the generation context");
                return Err(self.fail_turn().await);
            }
        };
        let target_tokens = match self.collaborators.grammar.prepare_context(Some(target)).await {
            Ok((tokens, _)) => tokens,
            Err(error) => {
                tracing::error!(%error, "Failed to linearize the generation target");
                return Err(self.fail_turn().await);
            }
        };
        let answers = self
            .collaborators
            .nlg
            .generate_utterance(&context_tokens, &entities, &target_tokens)
            .await;
        match answers {
            Ok(answers) => match answers.into_iter().next() {
                Some(answer) => Ok(answer.answer),
                None => {
                    tracing::warn!("Generator produced no answers");
                    Err(self.fail_turn().await)
                }
            },
            Err(error) => {
                tracing::error!(%error, "Generator failed");
                Err(self.fail_turn().await)
            }
        }
    }

    async fn show_results(&mut self, limit: usize) {
        let results: Vec<RawResult> = self.pending_results.drain(..).collect();
        for result in results.iter().take(limit) {
            self.show_result_card(result, None).await;
        }
    }

    async fn show_result_card(&self, result: &RawResult, icon: Option<&str>) {
        match result_card(result) {
            Card::Picture { url } => {
                log_sink(self.collaborators.output.send_picture(&url, icon).await);
            }
            Card::Rdl(rdl) => log_sink(self.collaborators.output.send_rdl(&rdl, icon).await),
            Card::Raw => log_sink(self.collaborators.output.send_result(result).await),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queues and interrupts
    // ─────────────────────────────────────────────────────────────────────

    /// Wait for the next user command mid-turn. A shutdown or control
    /// request arriving here cancels the turn instead.
    async fn next_command(&mut self) -> Result<UserInput, DialogueError> {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => return Err(DialogueError::Cancelled),

                Some(request) = self.control_rx.recv() => {
                    self.stash_control(request);
                    return Err(DialogueError::Cancelled);
                }

                item = self.user_rx.recv() => match item {
                    Some(QueueItem::UserInput(input)) => return Ok(input),
                    Some(_) => tracing::warn!("Ignoring notification on the command queue"),
                    None => return Err(DialogueError::Cancelled),
                },
            }
        }
    }

    fn stash_control(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::Reset { done } => self.pending_reset = Some(done),
        }
    }

    async fn handle_notification(&mut self, notification: Notification) {
        tracing::debug!(app = %notification.app_id, "App notification");
        let icon = notification.icon.as_deref();
        if self.last_notify_app.as_deref() != Some(notification.app_id.as_str()) {
            self.reply_with_icon(&format!("Notification from {}", notification.app_id), icon)
                .await;
            self.last_notify_app = Some(notification.app_id.clone());
        }
        self.show_result_card(&notification.result, icon).await;
        // Out-of-band output does not extend a dialogue.
        self.state = None;
    }

    async fn handle_error_notification(&mut self, error: ErrorNotification) {
        tracing::debug!(app = %error.app_id, message = %error.message, "App error");
        let icon = error.icon.as_deref();
        if self.last_notify_app.as_deref() != Some(error.app_id.as_str()) {
            self.reply_with_icon(&format!("Notification from {}", error.app_id), icon)
                .await;
            self.last_notify_app = Some(error.app_id.clone());
        }
        self.reply_with_icon(&format!("Sorry, that command failed: {}", error.message), icon)
            .await;
        self.state = None;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    async fn send_welcome(&mut self) {
        let greeting = DialogueState::new(TRANSACTION_POLICY, DialogueAct::SysGreet);
        match self.collaborators.policy.choose_action(&greeting).await {
            Ok(Some(action)) => {
                if let Some(text) = action.utterance {
                    self.reply(&text).await;
                }
            }
            Ok(None) => {}
            Err(error) => tracing::warn!(%error, "Policy failed to greet"),
        }
    }

    /// Apologize, drop the dialogue, and hand back the cancellation that
    /// unwinds the turn.
    async fn fail_turn(&mut self) -> DialogueError {
        self.reply(MSG_GENERIC_FAILURE).await;
        self.state = None;
        DialogueError::Cancelled
    }

    async fn reply(&self, text: &str) {
        self.reply_with_icon(text, None).await;
    }

    async fn reply_with_icon(&self, text: &str, icon: Option<&str>) {
        log_sink(self.collaborators.output.send_reply(text, icon).await);
    }
}

fn log_sink(result: Result<(), DialogueError>) {
    if let Err(error) = result {
        tracing::warn!(%error, "Output sink failed");
    }
}

/// How to render one result row.
enum Card {
    Picture { url: String },
    Rdl(Rdl),
    Raw,
}

fn result_card(result: &RawResult) -> Card {
    fn text(value: Option<&Value>) -> Option<String> {
        match value {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Entity { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }

    let picture = text(result.value("picture_url"));
    if let (Some(title), Some(link)) = (text(result.value("title")), text(result.value("link"))) {
        return Card::Rdl(Rdl {
            display_title: title,
            display_text: text(result.value("description")),
            web_callback: link,
            picture_url: picture,
        });
    }
    if let Some(url) = picture {
        return Card::Picture { url };
    }
    Card::Raw
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn row(pairs: &[(&str, Value)]) -> RawResult {
        let values: BTreeMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        RawResult::new("org.test:source", values)
    }

    #[test]
    fn config_defaults() {
        let config = LoopConfig::default();
        assert!(!config.show_welcome);
        assert!(!config.debug);
        assert_eq!(config.max_candidates, 5);
        assert_eq!(config.iteration_limit, 20);
    }

    #[test]
    fn rdl_card_wins_over_picture() {
        let result = row(&[
            ("title", Value::string("A headline")),
            ("link", Value::string("https://example.com/story")),
            ("picture_url", Value::string("https://example.com/img.png")),
        ]);
        match result_card(&result) {
            Card::Rdl(rdl) => {
                assert_eq!(rdl.display_title, "A headline");
                assert_eq!(rdl.web_callback, "https://example.com/story");
                assert_eq!(rdl.picture_url.as_deref(), Some("https://example.com/img.png"));
            }
            _ => panic!("expected an RDL card"),
        }
    }

    #[test]
    fn picture_card_without_link() {
        let result = row(&[("picture_url", Value::string("https://example.com/cat.jpg"))]);
        match result_card(&result) {
            Card::Picture { url } => assert_eq!(url, "https://example.com/cat.jpg"),
            _ => panic!("expected a picture card"),
        }
    }

    #[test]
    fn plain_rows_fall_back_to_raw() {
        let result = row(&[("temperature", Value::Number(21.0))]);
        assert!(matches!(result_card(&result), Card::Raw));
    }
}
