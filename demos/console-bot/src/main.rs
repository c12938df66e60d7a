//! Console Bot
//!
//! Runs hangbot against the terminal: type lines to talk to it, `@name text`
//! to speak as someone else, `:join name` / `:leave name` to change the
//! membership of the conversation. Ctrl+D or Ctrl+C exits.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --debug
//! ```

mod console;
mod greeter;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use hangbot::prelude::*;
use hangbot::runtime::LoggingBuilder;
use tokio::sync::mpsc;
use tracing::Level;

use console::{ConsoleClient, ConsoleReader};

const SELF_ID: &str = "hangbot";

#[derive(Debug, Parser)]
#[command(name = "console-bot", about = "Chat with hangbot from the terminal")]
struct Args {
    /// Settings file (defaults to hangbot.toml in the usual places)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    debug: bool,

    /// Conversation id for everything typed
    #[arg(long, default_value = "console")]
    conversation: String,

    /// Default speaker
    #[arg(long, default_value = "you")]
    user: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Installed before the runtime so the settings-based logger becomes a no-op.
    if args.debug {
        LoggingBuilder::new().with_level(Level::DEBUG).init();
    }

    let mut builder = BotRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let runtime = builder.build(Arc::new(ConsoleClient::new(SELF_ID)))?;
    runtime.register_plugin(greeter::GREETER);

    let (tx, rx) = mpsc::channel(64);
    let reader = ConsoleReader::new(args.conversation, args.user);

    // Someone adds the bot to the conversation.
    tx.send(reader.join(vec![SELF_ID.to_string()])).await?;
    tokio::spawn(reader.run(tx));

    runtime.run(rx).await?;
    Ok(())
}
