use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

use super::ParsedCommand;
use crate::context::{Bot, CommandContext, HandlerContext};
use crate::dispatcher::panic_message;
use crate::error::BoxError;
use crate::registry::{CommandEntry, CommandScope, DEFAULT_PRIORITY, Flow, Registry};
use hangbot_core::{ConversationEvent, EventCategory};

/// Priority of the built-in resolver handler.
///
/// It is registered before any plugin, so it runs first among the handlers
/// that share its priority.
pub const COMMAND_PRIORITY: i32 = DEFAULT_PRIORITY;

/// Plugin identity of the resolver's handler entry.
pub const RESOLVER_PLUGIN: &str = "hangbot.commands";

/// Config key: reply to unknown commands (default `true`).
pub const UNKNOWN_REPLY_KEY: &str = "commands_unknown_reply";

/// Config key: notice sent when a command fails. `{command}` is replaced by
/// the command name.
pub const FAILURE_REPLY_KEY: &str = "commands_failure_reply";

const DEFAULT_FAILURE_REPLY: &str = "Sorry, the command {command} failed.";

/// Outcome of resolving one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The callback ran and returned normally.
    Executed,
    /// No command of that name is visible to the sender.
    Unknown,
    /// The callback returned an error or panicked.
    Failed,
}

/// Resolves parsed commands against the command tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandResolver;

impl CommandResolver {
    /// Registers the resolver as a `message` handler.
    ///
    /// A failed command ends the event: no later handler sees it.
    pub fn install(registry: &Registry) {
        registry.register_handler(
            RESOLVER_PLUGIN,
            EventCategory::Message,
            COMMAND_PRIORITY,
            |ctx: HandlerContext| async move {
                let Some(command) = ctx.command() else {
                    return Ok::<_, BoxError>(Flow::Continue);
                };
                match Self::resolve(ctx.bot(), ctx.event_arc(), command).await {
                    Resolution::Failed => Ok(Flow::SuppressEventHandling),
                    Resolution::Executed | Resolution::Unknown => Ok(Flow::Continue),
                }
            },
        );
    }

    /// Finds the command visible to the sender.
    ///
    /// Admins see the admin table first and then the user table; everyone
    /// else sees the user table only.
    pub fn lookup(bot: &Bot, event: &ConversationEvent, name: &str) -> Option<CommandEntry> {
        let registry = bot.registry();
        if bot.is_admin(&event.conversation_id, &event.user_id) {
            registry
                .command(CommandScope::Admin, name)
                .or_else(|| registry.command(CommandScope::User, name))
        } else {
            registry.command(CommandScope::User, name)
        }
    }

    /// Looks up and runs one command.
    pub async fn resolve(
        bot: &Bot,
        event: &Arc<ConversationEvent>,
        command: &ParsedCommand,
    ) -> Resolution {
        let Some(entry) = Self::lookup(bot, event, &command.name) else {
            info!(
                command = %command.name,
                user = %event.user_id,
                conversation = %event.conversation_id,
                "Unknown command"
            );
            if bot.config().get::<bool>(UNKNOWN_REPLY_KEY).unwrap_or(true) {
                notify(bot, event, format!("Unknown command: {}", command.name)).await;
            }
            return Resolution::Unknown;
        };

        debug!(
            command = %command.name,
            plugin = %entry.plugin(),
            args = ?command.args,
            "Running command"
        );

        let ctx = CommandContext::new(bot.clone(), Arc::clone(event), command.args.clone());
        let outcome = AssertUnwindSafe(entry.service().oneshot(ctx))
            .catch_unwind()
            .await;

        let reason = match outcome {
            Ok(Ok(())) => return Resolution::Executed,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
        };

        error!(
            command  = %command.name,
            plugin   = %entry.plugin(),
            event_id = %event.id,
            error    = %reason,
            "Command failed"
        );
        let template = bot
            .config()
            .get::<String>(FAILURE_REPLY_KEY)
            .unwrap_or_else(|| DEFAULT_FAILURE_REPLY.to_string());
        notify(bot, event, template.replace("{command}", &command.name)).await;
        Resolution::Failed
    }
}

async fn notify(bot: &Bot, event: &ConversationEvent, text: String) {
    if let Err(e) = bot.send_message(&event.conversation_id, text).await {
        warn!(conversation = %event.conversation_id, error = %e, "Failed to send command notice");
    }
}
