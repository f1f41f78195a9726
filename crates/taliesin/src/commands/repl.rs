//! REPL (Read-Eval-Print Loop) implementation for talking to the agent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use console::{Style, Term, style};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use taliesin_dialogue::{DialogueHandle, UserInput};

use crate::display::ConsoleOutput;

/// Result of handling a slash command.
pub enum ControlFlow {
    Continue,
    Exit,
}

/// REPL state and configuration.
pub struct Repl {
    handle: DialogueHandle,
    output: Arc<ConsoleOutput>,
    editor: Editor<(), DefaultHistory>,
    term: Term,
}

impl Repl {
    /// Create a new REPL instance.
    pub fn new(handle: DialogueHandle, output: Arc<ConsoleOutput>) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        let editor = Editor::with_config(config)?;

        Ok(Self {
            handle,
            output,
            editor,
            term: Term::stdout(),
        })
    }

    /// Run the REPL loop.
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();
        // Let the greeting land before the first prompt.
        self.settle().await;

        loop {
            if self.handle.is_closed() {
                self.print_dim("(dialogue stopped)");
                break;
            }

            let prompt = format!("{} ", style("you>").cyan().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    // Handle slash commands
                    if line.starts_with('/') {
                        match self.handle_slash_command(line).await {
                            Ok(ControlFlow::Continue) => continue,
                            Ok(ControlFlow::Exit) => break,
                            Err(e) => {
                                self.print_error(&format!("Command error: {}", e));
                                continue;
                            }
                        }
                    }

                    self.handle.push_command(UserInput::text(line));
                    self.settle().await;
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - drop the line but don't exit
                    println!();
                    self.print_dim("(Interrupted - type /quit to exit)");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!();
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Prompt read failed");
                    self.print_error(&format!("Input error: {}", e));
                    break;
                }
            }
        }

        self.print_dim("Goodbye!");
        Ok(())
    }

    /// Wait for the agent's turn to settle.
    ///
    /// The dialogue loop prints from its own task; holding the prompt until
    /// output has been quiet for a moment keeps the two from interleaving.
    async fn settle(&self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen = self.output.events();
        let mut quiet = 0u32;

        while Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(40)).await;
            if self.handle.is_closed() {
                return;
            }
            let now = self.output.events();
            if now == seen {
                quiet += 1;
                if quiet >= 4 {
                    return;
                }
            } else {
                seen = now;
                quiet = 0;
            }
        }
    }

    /// Handle a slash command.
    async fn handle_slash_command(&mut self, input: &str) -> Result<ControlFlow> {
        let parts: Vec<&str> = input[1..].split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");

        match cmd {
            "quit" | "q" | "exit" => {
                return Ok(ControlFlow::Exit);
            }
            "help" | "h" | "?" => {
                self.print_help();
            }
            "clear" | "cls" => {
                self.term.clear_screen()?;
            }
            "reset" => {
                self.handle.reset().await;
                self.print_dim("Dialogue reset");
            }
            "" => {
                self.print_dim("Type /help for available commands");
            }
            _ => {
                self.print_error(&format!("Unknown command: /{}", cmd));
                self.print_dim("Type /help for available commands");
            }
        }

        Ok(ControlFlow::Continue)
    }

    fn print_welcome(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Taliesin").bold().cyan());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!(
            "{}",
            dim.apply_to("Type what you want and press Enter to talk.")
        );
        println!(
            "{}",
            dim.apply_to("Use /help for commands, Ctrl+D to exit.")
        );
        println!();
    }

    fn print_help(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Available Commands").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {}  - Exit the REPL", style("/quit, /q").cyan());
        println!("  {}  - Show this help", style("/help, /h, /?").cyan());
        println!("  {}  - Clear the screen", style("/clear").cyan());
        println!("  {}  - Forget the current dialogue", style("/reset").cyan());
        println!();
        println!("{}", dim.apply_to("Keyboard shortcuts:"));
        println!("  {} - Drop the current line", dim.apply_to("Ctrl+C"));
        println!("  {} - Exit the REPL", dim.apply_to("Ctrl+D"));
        println!();
    }

    fn print_dim(&self, msg: &str) {
        let dim = Style::new().dim();
        println!("{}", dim.apply_to(msg));
    }

    fn print_error(&self, msg: &str) {
        let red = Style::new().red();
        println!("{} {}", red.apply_to("Error:"), msg);
    }
}
