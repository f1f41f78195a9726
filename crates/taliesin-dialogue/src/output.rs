//! The conversation output sink.
//!
//! Output is fire-and-forget from the loop's perspective: a sink that fails
//! gets its error logged and the turn carries on. The loop therefore treats
//! every method here as best-effort and never lets a sink error unwind a
//! turn.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::command::ValueCategory;
use crate::error::DialogueError;
use crate::executor::RawResult;

/// A rich deep link: a titled card pointing at a web resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rdl {
    pub display_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
    pub web_callback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
}

#[async_trait]
pub trait ConversationOutput: Send + Sync {
    /// Plain text from the agent.
    async fn send_reply(&self, text: &str, icon: Option<&str>) -> Result<(), DialogueError>;

    /// A raw result row, for clients that format results themselves.
    async fn send_result(&self, result: &RawResult) -> Result<(), DialogueError>;

    async fn send_picture(&self, url: &str, icon: Option<&str>) -> Result<(), DialogueError>;

    async fn send_rdl(&self, rdl: &Rdl, icon: Option<&str>) -> Result<(), DialogueError>;

    /// One option of a multiple-choice question.
    async fn send_choice(&self, index: usize, title: &str) -> Result<(), DialogueError>;

    /// A button that feeds a pre-parsed input back when pressed.
    async fn send_button(&self, title: &str, json: &str) -> Result<(), DialogueError>;

    /// Tell the client which input affordance to show.
    async fn send_ask_special(&self, what: Option<ValueCategory>) -> Result<(), DialogueError>;

    /// Record what the agent now expects, `None` for nothing.
    async fn set_expected(&self, expecting: Option<ValueCategory>) -> Result<(), DialogueError>;
}

pub type SharedOutput = Arc<dyn ConversationOutput>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock output
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a sink can receive, recorded for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Reply { text: String, icon: Option<String> },
    Result(RawResult),
    Picture { url: String },
    Rdl(Rdl),
    Choice { index: usize, title: String },
    Button { title: String, json: String },
    AskSpecial(Option<ValueCategory>),
    Expected(Option<ValueCategory>),
}

/// Recording sink for tests.
#[derive(Default)]
pub struct MockOutput {
    events: Mutex<Vec<OutputEvent>>,
    failing: Mutex<bool>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, to exercise the best-effort path.
    pub fn start_failing(&self) {
        *self.failing.lock().unwrap() = true;
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Just the reply texts, in order.
    pub fn replies(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                OutputEvent::Reply { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// The most recent expectation the loop recorded.
    pub fn last_expected(&self) -> Option<ValueCategory> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|event| match event {
                OutputEvent::Expected(expecting) => Some(*expecting),
                _ => None,
            })
            .flatten()
    }

    fn record(&self, event: OutputEvent) -> Result<(), DialogueError> {
        if *self.failing.lock().unwrap() {
            return Err(DialogueError::output("sink closed"));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[async_trait]
impl ConversationOutput for MockOutput {
    async fn send_reply(&self, text: &str, icon: Option<&str>) -> Result<(), DialogueError> {
        self.record(OutputEvent::Reply {
            text: text.to_string(),
            icon: icon.map(str::to_string),
        })
    }

    async fn send_result(&self, result: &RawResult) -> Result<(), DialogueError> {
        self.record(OutputEvent::Result(result.clone()))
    }

    async fn send_picture(&self, url: &str, _icon: Option<&str>) -> Result<(), DialogueError> {
        self.record(OutputEvent::Picture {
            url: url.to_string(),
        })
    }

    async fn send_rdl(&self, rdl: &Rdl, _icon: Option<&str>) -> Result<(), DialogueError> {
        self.record(OutputEvent::Rdl(rdl.clone()))
    }

    async fn send_choice(&self, index: usize, title: &str) -> Result<(), DialogueError> {
        self.record(OutputEvent::Choice {
            index,
            title: title.to_string(),
        })
    }

    async fn send_button(&self, title: &str, json: &str) -> Result<(), DialogueError> {
        self.record(OutputEvent::Button {
            title: title.to_string(),
            json: json.to_string(),
        })
    }

    async fn send_ask_special(&self, what: Option<ValueCategory>) -> Result<(), DialogueError> {
        self.record(OutputEvent::AskSpecial(what))
    }

    async fn set_expected(&self, expecting: Option<ValueCategory>) -> Result<(), DialogueError> {
        self.record(OutputEvent::Expected(expecting))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_events_in_order() {
        let output = MockOutput::new();
        output.send_reply("hello", None).await.unwrap();
        output
            .send_ask_special(Some(ValueCategory::YesNo))
            .await
            .unwrap();
        output
            .set_expected(Some(ValueCategory::YesNo))
            .await
            .unwrap();

        assert_eq!(output.replies(), vec!["hello"]);
        assert_eq!(output.last_expected(), Some(ValueCategory::YesNo));
        assert_eq!(output.events().len(), 3);
    }

    #[tokio::test]
    async fn failing_sink_errors() {
        let output = MockOutput::new();
        output.start_failing();
        assert!(output.send_reply("hello", None).await.is_err());
        assert!(output.events().is_empty());
    }
}
