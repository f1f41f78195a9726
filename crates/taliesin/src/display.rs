//! Terminal rendering of conversation output.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use console::{Style, style};
use taliesin_ast::Value;
use taliesin_dialogue::{ConversationOutput, DialogueError, RawResult, Rdl, ValueCategory};

/// Prints the agent's side of the conversation to stdout.
///
/// The dialogue loop runs in its own task, so replies arrive while the REPL
/// waits on the prompt. Every delivery bumps an event counter the REPL polls
/// to decide when the turn has settled.
#[derive(Default)]
pub struct ConsoleOutput {
    events: AtomicU64,
}

impl ConsoleOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotone count of everything printed so far.
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.events.fetch_add(1, Ordering::SeqCst);
    }
}

fn agent() -> console::StyledObject<&'static str> {
    style("taliesin>").green().bold()
}

fn row_summary(result: &RawResult) -> String {
    result
        .values
        .iter()
        .filter(|(name, _)| *name != "id")
        .map(|(name, value)| format!("{}: {}", name, value.human_readable()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl ConversationOutput for ConsoleOutput {
    async fn send_reply(&self, text: &str, _icon: Option<&str>) -> Result<(), DialogueError> {
        println!("{} {}", agent(), text);
        self.bump();
        Ok(())
    }

    async fn send_result(&self, result: &RawResult) -> Result<(), DialogueError> {
        let dim = Style::new().dim();
        let title = result.value("id").and_then(|id| match id {
            Value::Entity { display, value, .. } => {
                Some(display.clone().unwrap_or_else(|| value.clone()))
            }
            _ => None,
        });
        match title {
            Some(title) => println!(
                "  {} {}",
                style(title).bold(),
                dim.apply_to(row_summary(result))
            ),
            None => println!("  {}", row_summary(result)),
        }
        self.bump();
        Ok(())
    }

    async fn send_picture(&self, url: &str, _icon: Option<&str>) -> Result<(), DialogueError> {
        let dim = Style::new().dim();
        println!("  {}", dim.apply_to(format!("[picture] {}", url)));
        self.bump();
        Ok(())
    }

    async fn send_rdl(&self, rdl: &Rdl, _icon: Option<&str>) -> Result<(), DialogueError> {
        let dim = Style::new().dim();
        println!(
            "  {} {}",
            style(&rdl.display_title).bold(),
            dim.apply_to(&rdl.web_callback)
        );
        if let Some(text) = &rdl.display_text {
            println!("    {}", dim.apply_to(text));
        }
        self.bump();
        Ok(())
    }

    async fn send_choice(&self, index: usize, title: &str) -> Result<(), DialogueError> {
        // Choices are zero-based on the wire, one-based on screen.
        println!("  {} {}", style(format!("[{}]", index + 1)).cyan(), title);
        self.bump();
        Ok(())
    }

    async fn send_button(&self, title: &str, _json: &str) -> Result<(), DialogueError> {
        let dim = Style::new().dim();
        println!("  {}", dim.apply_to(format!("[{}]", title)));
        self.bump();
        Ok(())
    }

    async fn send_ask_special(&self, what: Option<ValueCategory>) -> Result<(), DialogueError> {
        let dim = Style::new().dim();
        match what {
            Some(ValueCategory::YesNo) => println!("{}", dim.apply_to("(yes or no)")),
            Some(ValueCategory::MultipleChoice) => println!("{}", dim.apply_to("(pick a number)")),
            _ => {}
        }
        self.bump();
        Ok(())
    }

    async fn set_expected(&self, _expecting: Option<ValueCategory>) -> Result<(), DialogueError> {
        self.bump();
        Ok(())
    }
}
