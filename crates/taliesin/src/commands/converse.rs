//! Converse command - interactive dialogue mode.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use taliesin_dialogue::{Collaborators, DialogueLoop, LoopConfig};
use taliesin_nlu::{HttpNluClient, NluConfig, SharedNlg, SharedNlu};

use super::repl::Repl;
use crate::demo::{DemoAnalyzer, DemoExecutor, DemoGenerator, DemoGrammar, DemoPolicy};
use crate::display::ConsoleOutput;

/// Arguments for the converse command.
#[derive(Args, Debug)]
pub struct ConverseArgs {
    /// Base URL of the parsing service; a built-in keyword analyzer is used
    /// when unset
    #[arg(long, env = "TALIESIN_NLU_URL")]
    pub nlu_url: Option<String>,

    /// Locale sent to the parsing service
    #[arg(long, default_value = "en-US")]
    pub locale: String,

    /// Answer `debug` with a dump of the dialogue state
    #[arg(long)]
    pub debug: bool,

    /// Skip the greeting
    #[arg(long)]
    pub no_welcome: bool,
}

/// Run the converse command (REPL).
pub async fn run(args: ConverseArgs) -> Result<()> {
    let output = Arc::new(ConsoleOutput::new());

    let (nlu, nlg): (SharedNlu, SharedNlg) = match args.nlu_url.clone() {
        Some(url) => {
            tracing::info!(%url, locale = %args.locale, "Using the remote analyzer");
            let config = NluConfig::new(url).with_locale(args.locale.clone());
            let client = Arc::new(HttpNluClient::new(config)?);
            (client.clone(), client)
        }
        None => {
            tracing::info!("Using the built-in demo analyzer");
            (
                Arc::new(DemoAnalyzer::new()),
                Arc::new(DemoGenerator::new()),
            )
        }
    };

    let collaborators = Collaborators {
        nlu,
        nlg,
        grammar: Arc::new(DemoGrammar::new()),
        executor: Arc::new(DemoExecutor::new()),
        policy: Arc::new(DemoPolicy::new()),
        output: output.clone(),
    };
    let config = LoopConfig::default()
        .with_welcome(!args.no_welcome)
        .with_debug(args.debug);

    let (dialogue, handle) = DialogueLoop::new(collaborators, config);
    let task = tokio::spawn(dialogue.run());

    let mut repl = Repl::new(handle.clone(), output)?;
    let result = repl.run().await;

    handle.stop().await;
    let _ = task.await;
    tracing::debug!("Dialogue task joined");
    result
}
