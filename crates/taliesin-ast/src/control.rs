//! Control intents: the non-program utterances a user can issue.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Bare control keywords with fixed meanings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialCommand {
    /// Affirm the pending proposal or confirmation.
    Yes,
    /// Reject the pending proposal or confirmation.
    No,
    /// Halt whatever is executing.
    Stop,
    /// Abandon the current task.
    Nevermind,
    /// Attention word with no task content.
    Wakeup,
    /// Dump internal state for debugging.
    Debug,
    /// The analyzer could not produce any parse.
    Failed,
    /// Enter the correction flow for the previous utterance.
    Train,
}

impl SpecialCommand {
    /// The wire token for this command.
    pub fn as_token(&self) -> &'static str {
        match self {
            Self::Yes => "special:yes",
            Self::No => "special:no",
            Self::Stop => "special:stop",
            Self::Nevermind => "special:nevermind",
            Self::Wakeup => "special:wakeup",
            Self::Debug => "special:debug",
            Self::Failed => "special:failed",
            Self::Train => "special:train",
        }
    }

    /// Parse a wire token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "special:yes" => Some(Self::Yes),
            "special:no" => Some(Self::No),
            "special:stop" => Some(Self::Stop),
            "special:nevermind" => Some(Self::Nevermind),
            "special:wakeup" => Some(Self::Wakeup),
            "special:debug" => Some(Self::Debug),
            "special:failed" => Some(Self::Failed),
            "special:train" => Some(Self::Train),
            _ => None,
        }
    }
}

/// A parsed utterance that is not a full program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ControlIntent {
    /// A fixed keyword.
    Special(SpecialCommand),
    /// A bare value answering a slot-filling question.
    Answer(Value),
    /// A zero-based pick from the most recent list of options.
    Choice(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        for cmd in [
            SpecialCommand::Yes,
            SpecialCommand::No,
            SpecialCommand::Stop,
            SpecialCommand::Nevermind,
            SpecialCommand::Wakeup,
            SpecialCommand::Debug,
            SpecialCommand::Failed,
            SpecialCommand::Train,
        ] {
            assert_eq!(SpecialCommand::from_token(cmd.as_token()), Some(cmd));
        }
        assert_eq!(SpecialCommand::from_token("special:unknown"), None);
        assert_eq!(SpecialCommand::from_token("yes"), None);
    }

    #[test]
    fn test_control_intent_serde() {
        let intent = ControlIntent::Choice(2);
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["type"], "choice");
        assert_eq!(json["value"], 2);

        let special = ControlIntent::Special(SpecialCommand::Nevermind);
        let json = serde_json::to_value(&special).unwrap();
        assert_eq!(json["value"], "nevermind");
    }
}
