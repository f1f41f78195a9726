//! Command analysis: turning a user input into something the loop can act on.
//!
//! Classification is deliberately a pure function. The dialogue loop gathers
//! the inputs (the parsed intent, the current expectation, whether a dialogue
//! is active) and everything from there to a [`CommandAnalysisType`] is
//! deterministic and unit-testable without any collaborator.

use serde::{Deserialize, Serialize};
use taliesin_ast::{ControlIntent, SpecialCommand, Value};
use taliesin_nlu::CandidateScore;

use crate::state::DialogueState;

// ─────────────────────────────────────────────────────────────────────────────
// Expectations
// ─────────────────────────────────────────────────────────────────────────────

/// What kind of input the agent is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCategory {
    YesNo,
    MultipleChoice,
    Number,
    Measure,
    RawString,
    Password,
    Date,
    Time,
    Location,
    Picture,
    Command,
    More,
    Generic,
}

impl ValueCategory {
    /// The wire token telling clients which input affordance to show.
    pub fn ask_special_token(&self) -> &'static str {
        match self {
            Self::YesNo => "yesno",
            Self::MultipleChoice => "choice",
            Self::Number => "number",
            Self::Measure => "measure",
            Self::RawString => "raw_string",
            Self::Password => "password",
            Self::Date => "date",
            Self::Time => "time",
            Self::Location => "location",
            Self::Picture => "picture",
            Self::Command => "command",
            Self::More => "more",
            Self::Generic => "generic",
        }
    }

    /// Raw categories bypass the analyzer entirely: the utterance itself is
    /// the answer.
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::RawString | Self::Password)
    }

    /// Whether a scalar answer satisfies this expectation.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::YesNo => matches!(value, Value::Boolean(_)),
            Self::Number | Self::MultipleChoice => matches!(value, Value::Number(_)),
            Self::Measure => matches!(value, Value::Measure { .. }),
            Self::RawString | Self::Password => matches!(value, Value::String(_)),
            Self::Date | Self::Time => matches!(value, Value::Date(_)),
            Self::Location | Self::Picture => {
                matches!(value, Value::String(_) | Value::Entity { .. })
            }
            Self::Command | Self::More | Self::Generic => true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

/// One item pushed onto the user-input queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum UserInput {
    /// Natural language that must go through the analyzer.
    Text { utterance: String },
    /// An already-parsed intent, e.g. from a button press.
    Parsed { intent: ParsedInput },
}

impl UserInput {
    pub fn text(utterance: impl Into<String>) -> Self {
        Self::Text {
            utterance: utterance.into(),
        }
    }

    pub fn parsed(intent: ParsedInput) -> Self {
        Self::Parsed { intent }
    }
}

/// A typed interpretation of one candidate code sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParsedInput {
    /// A control intent: special keywords, bare answers, choice picks.
    Control(ControlIntent),
    /// A dialogue-state delta extending the current conversation.
    Dialogue(DialogueState),
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// What the loop should do with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAnalysisType {
    /// Halt immediately, no reply.
    Stop,
    /// Abandon the task with a short apology.
    Nevermind,
    /// Attention word outside a dialogue.
    Wakeup,
    /// Dump the dialogue state.
    Debug,
    /// A command or answer the current policy can consume.
    InDomainCommand,
    /// A command for a skill this assistant does not have.
    OutOfDomainCommand,
    /// The analyzer gave up on the utterance.
    ParseFailure,
    /// Drop the command without reacting.
    Ignore,
}

/// A fully analyzed command, ready for dispatch.
#[derive(Debug, Clone)]
pub struct AnalyzedCommand {
    pub analysis: CommandAnalysisType,
    /// The raw utterance, empty for pre-parsed inputs.
    pub utterance: String,
    pub parsed: Option<ParsedInput>,
    /// The scalar answer extracted from the command, when the command is an
    /// answer to a question.
    pub answer: Option<Value>,
}

/// Classify a control intent against the current expectation.
///
/// Yes/no only count as answers when a yes/no question is pending; a bare
/// "yes" with nothing asked stays an in-domain command with no answer, and
/// the loop decides what to do with it. Wakeup mid-dialogue is noise.
pub fn classify_control(
    intent: &ControlIntent,
    expecting: Option<ValueCategory>,
    dialogue_active: bool,
) -> (CommandAnalysisType, Option<Value>) {
    use CommandAnalysisType::*;

    match intent {
        ControlIntent::Special(special) => match special {
            SpecialCommand::Stop => (Stop, None),
            SpecialCommand::Nevermind => (Nevermind, None),
            SpecialCommand::Wakeup => {
                if dialogue_active {
                    (Ignore, None)
                } else {
                    (Wakeup, None)
                }
            }
            SpecialCommand::Debug => (Debug, None),
            SpecialCommand::Failed => (ParseFailure, None),
            SpecialCommand::Train => (Ignore, None),
            SpecialCommand::Yes | SpecialCommand::No => {
                let value = matches!(special, SpecialCommand::Yes);
                if expecting == Some(ValueCategory::YesNo) {
                    (InDomainCommand, Some(Value::Boolean(value)))
                } else {
                    (InDomainCommand, None)
                }
            }
        },
        ControlIntent::Answer(value) => (InDomainCommand, Some(value.clone())),
        ControlIntent::Choice(index) => (InDomainCommand, Some(Value::Number(*index as f64))),
    }
}

/// Analyze one scored candidate interpretation.
pub fn analyze_candidate(
    parsed: ParsedInput,
    score: CandidateScore,
    utterance: impl Into<String>,
    expecting: Option<ValueCategory>,
    dialogue_active: bool,
) -> AnalyzedCommand {
    let (mut analysis, answer) = match &parsed {
        ParsedInput::Control(intent) => classify_control(intent, expecting, dialogue_active),
        ParsedInput::Dialogue(_) => (CommandAnalysisType::InDomainCommand, None),
    };
    // A candidate the analyzer flagged as unsupported is a real command for
    // a skill we do not have, not a parse failure.
    if score.is_unsupported() && analysis == CommandAnalysisType::InDomainCommand {
        analysis = CommandAnalysisType::OutOfDomainCommand;
    }
    AnalyzedCommand {
        analysis,
        utterance: utterance.into(),
        parsed: Some(parsed),
        answer,
    }
}

/// Whether the parse is the analyzer's explicit give-up marker.
pub fn is_parse_failure(parsed: &ParsedInput) -> bool {
    matches!(
        parsed,
        ParsedInput::Control(ControlIntent::Special(SpecialCommand::Failed))
    )
}

/// Pick the candidate interpretation to act on.
///
/// Leading candidates that are both unsupported and the give-up marker are
/// skipped; the last candidate is the fallback when nothing better exists,
/// so a non-empty list always yields a choice.
pub fn choose_candidate(
    candidates: &[(ParsedInput, CandidateScore)],
) -> Option<&(ParsedInput, CandidateScore)> {
    candidates
        .iter()
        .find(|(parsed, score)| !(score.is_unsupported() && is_parse_failure(parsed)))
        .or_else(|| candidates.last())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DialogueAct;
    use CommandAnalysisType::*;

    fn special(cmd: SpecialCommand) -> ControlIntent {
        ControlIntent::Special(cmd)
    }

    #[test]
    fn test_special_keywords_classify_directly() {
        let cases = [
            (SpecialCommand::Stop, Stop),
            (SpecialCommand::Nevermind, Nevermind),
            (SpecialCommand::Debug, Debug),
            (SpecialCommand::Failed, ParseFailure),
            (SpecialCommand::Train, Ignore),
        ];
        for (cmd, want) in cases {
            let (got, answer) = classify_control(&special(cmd), None, false);
            assert_eq!(got, want, "{cmd:?}");
            assert!(answer.is_none());
        }
    }

    #[test]
    fn test_wakeup_ignored_mid_dialogue() {
        let (idle, _) = classify_control(&special(SpecialCommand::Wakeup), None, false);
        assert_eq!(idle, Wakeup);
        let (active, _) = classify_control(&special(SpecialCommand::Wakeup), None, true);
        assert_eq!(active, Ignore);
    }

    #[test]
    fn test_yes_no_answer_only_when_asked() {
        let (analysis, answer) =
            classify_control(&special(SpecialCommand::Yes), Some(ValueCategory::YesNo), true);
        assert_eq!(analysis, InDomainCommand);
        assert_eq!(answer, Some(Value::Boolean(true)));

        let (analysis, answer) =
            classify_control(&special(SpecialCommand::No), Some(ValueCategory::YesNo), true);
        assert_eq!(analysis, InDomainCommand);
        assert_eq!(answer, Some(Value::Boolean(false)));

        // Nothing asked: still in-domain, but no answer is extracted.
        let (analysis, answer) = classify_control(&special(SpecialCommand::Yes), None, true);
        assert_eq!(analysis, InDomainCommand);
        assert!(answer.is_none());
    }

    #[test]
    fn test_answers_and_choices_extract_values() {
        let (analysis, answer) = classify_control(
            &ControlIntent::Answer(Value::Number(7.0)),
            Some(ValueCategory::Number),
            true,
        );
        assert_eq!(analysis, InDomainCommand);
        assert_eq!(answer, Some(Value::Number(7.0)));

        let (analysis, answer) = classify_control(&ControlIntent::Choice(2), None, true);
        assert_eq!(analysis, InDomainCommand);
        assert_eq!(answer, Some(Value::Number(2.0)));
    }

    #[test]
    fn test_unsupported_command_is_out_of_domain() {
        let delta = DialogueState::new("taliesin.transaction", DialogueAct::Execute);
        let analyzed = analyze_candidate(
            ParsedInput::Dialogue(delta.clone()),
            CandidateScore::Unsupported,
            "play some jazz",
            None,
            false,
        );
        assert_eq!(analyzed.analysis, OutOfDomainCommand);

        let analyzed = analyze_candidate(
            ParsedInput::Dialogue(delta),
            CandidateScore::Model(0.9),
            "play some jazz",
            None,
            false,
        );
        assert_eq!(analyzed.analysis, InDomainCommand);
    }

    #[test]
    fn test_choose_candidate_skips_unsupported_failures() {
        let failure = ParsedInput::Control(special(SpecialCommand::Failed));
        let real = ParsedInput::Dialogue(DialogueState::new(
            "taliesin.transaction",
            DialogueAct::Execute,
        ));

        let candidates = vec![
            (failure.clone(), CandidateScore::Unsupported),
            (real.clone(), CandidateScore::Model(0.4)),
        ];
        let (chosen, _) = choose_candidate(&candidates).unwrap();
        assert_eq!(*chosen, real);
    }

    #[test]
    fn test_choose_candidate_falls_back_to_last() {
        let failure = ParsedInput::Control(special(SpecialCommand::Failed));
        let candidates = vec![(failure.clone(), CandidateScore::Unsupported)];
        let (chosen, score) = choose_candidate(&candidates).unwrap();
        assert!(is_parse_failure(chosen));
        assert!(score.is_unsupported());

        assert!(choose_candidate(&[]).is_none());
    }

    #[test]
    fn test_choose_candidate_keeps_exact_first() {
        let real = ParsedInput::Control(ControlIntent::Choice(1));
        let other = ParsedInput::Control(special(SpecialCommand::Yes));
        let candidates = vec![
            (real.clone(), CandidateScore::Exact),
            (other, CandidateScore::Model(0.9)),
        ];
        let (chosen, _) = choose_candidate(&candidates).unwrap();
        assert_eq!(*chosen, real);
    }

    #[test]
    fn test_raw_categories() {
        assert!(ValueCategory::RawString.is_raw());
        assert!(ValueCategory::Password.is_raw());
        assert!(!ValueCategory::YesNo.is_raw());
    }

    #[test]
    fn test_expectation_accepts() {
        assert!(ValueCategory::YesNo.accepts(&Value::Boolean(true)));
        assert!(!ValueCategory::YesNo.accepts(&Value::Number(1.0)));
        assert!(ValueCategory::Number.accepts(&Value::Number(4.0)));
        assert!(ValueCategory::Generic.accepts(&Value::string("anything")));
    }

    #[test]
    fn test_ask_special_tokens() {
        assert_eq!(ValueCategory::YesNo.ask_special_token(), "yesno");
        assert_eq!(ValueCategory::MultipleChoice.ask_special_token(), "choice");
        assert_eq!(ValueCategory::RawString.ask_special_token(), "raw_string");
    }
}
