//! Core commands every bot answers.

use linkme::distributed_slice;

use crate::context::CommandContext;
use crate::error::BoxError;
use crate::plugin::{BUILTIN_PLUGINS, PluginDescriptor, PluginScope};
use crate::registry::CommandScope;

#[distributed_slice(BUILTIN_PLUGINS)]
pub static CORE_PLUGIN: PluginDescriptor = PluginDescriptor {
    name: "core",
    desc: "help, ping, echo and alias management",
    init,
};

fn init(scope: &PluginScope<'_>) -> Result<(), BoxError> {
    scope.register_user_command(["help"], help);
    scope.register_user_command(["ping"], ping);
    scope.register_user_command(["echo"], echo);
    scope.register_admin_command(["botalias"], botalias);
    Ok(())
}

/// `help [command]`
async fn help(ctx: CommandContext) -> Result<(), BoxError> {
    let registry = ctx.bot().registry();
    let is_admin = ctx.sender_is_admin();

    if let Some(name) = ctx.args().first() {
        let name = name.to_lowercase();
        let entry = is_admin
            .then(|| registry.command(CommandScope::Admin, &name))
            .flatten()
            .or_else(|| registry.command(CommandScope::User, &name));
        let text = match entry {
            Some(entry) => format!("{} (plugin {})", entry.name(), entry.plugin()),
            None => format!("No such command: {name}"),
        };
        ctx.reply(text).await?;
        return Ok(());
    }

    let mut lines = vec![format!(
        "Commands: {}",
        registry.command_names(CommandScope::User).join(", ")
    )];
    if is_admin {
        lines.push(format!(
            "Admin commands: {}",
            registry.command_names(CommandScope::Admin).join(", ")
        ));
    }
    lines.push(format!(
        "Invoke with: {}",
        ctx.bot().command_aliases().join(" | ")
    ));
    ctx.reply(lines.join("\n")).await?;
    Ok(())
}

async fn ping(ctx: CommandContext) -> Result<(), BoxError> {
    ctx.reply("pong").await?;
    Ok(())
}

async fn echo(ctx: CommandContext) -> Result<(), BoxError> {
    if ctx.args().is_empty() {
        return Ok(());
    }
    ctx.reply(ctx.args().join(" ")).await?;
    Ok(())
}

/// `botalias [list | add <alias> | remove <alias>]`
async fn botalias(ctx: CommandContext) -> Result<(), BoxError> {
    let bot = ctx.bot();
    let mut aliases = bot.command_aliases();

    let reply = match ctx.args() {
        [] => format!("Aliases: {}", aliases.join(", ")),
        [action] if action == "list" => format!("Aliases: {}", aliases.join(", ")),
        [action, alias] if action == "add" => {
            if aliases.iter().any(|a| a.eq_ignore_ascii_case(alias)) {
                format!("{alias} is already an alias")
            } else {
                aliases.push(alias.clone());
                bot.set_command_aliases(aliases)?;
                format!("Added alias {alias}")
            }
        }
        [action, alias] if action == "remove" => {
            let before = aliases.len();
            aliases.retain(|a| !a.eq_ignore_ascii_case(alias));
            if aliases.len() == before {
                format!("{alias} is not an alias")
            } else if aliases.is_empty() {
                "Refusing to remove the last alias".to_string()
            } else {
                bot.set_command_aliases(aliases)?;
                format!("Removed alias {alias}")
            }
        }
        _ => "Usage: botalias [list | add <alias> | remove <alias>]".to_string(),
    };

    ctx.reply(reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::test_support::test_bot;
    use hangbot_core::ConversationEvent;
    use serde_json::json;

    fn msg(user: &str, text: &str) -> ConversationEvent {
        ConversationEvent::message("e1", "c1", user, text)
    }

    #[tokio::test]
    async fn test_ping_and_echo() {
        let (bot, client) = test_bot(json!({}));
        bot.plugins().load(&bot, "core").unwrap();

        bot.handle_event(msg("guest", "/bot ping")).await;
        bot.handle_event(msg("guest", "/bot echo \"a  b\" c")).await;

        assert_eq!(client.texts(), vec!["pong", "a  b c"]);
    }

    #[tokio::test]
    async fn test_bare_alias_lists_commands() {
        let (bot, client) = test_bot(json!({ "admins": ["root"] }));
        bot.plugins().load(&bot, "core").unwrap();

        bot.handle_event(msg("guest", "/bot")).await;
        bot.handle_event(msg("root", "/bot help")).await;

        let texts = client.texts();
        assert!(texts[0].starts_with("Commands: echo, help, ping"));
        assert!(!texts[0].contains("Admin commands"));
        assert!(texts[1].contains("Admin commands: botalias"));
    }

    #[tokio::test]
    async fn test_botalias_add_and_remove() {
        let (bot, client) = test_bot(json!({ "admins": ["root"] }));
        bot.plugins().load(&bot, "core").unwrap();

        bot.handle_event(msg("root", "/bot botalias add !b")).await;
        assert_eq!(bot.command_aliases(), vec!["/bot", "!b"]);

        bot.handle_event(msg("guest", "!b ping")).await;
        bot.handle_event(msg("root", "!b botalias remove /bot")).await;
        bot.handle_event(msg("root", "!b botalias remove !b")).await;

        assert_eq!(bot.command_aliases(), vec!["!b"]);
        assert_eq!(
            client.texts(),
            vec![
                "Added alias !b",
                "pong",
                "Removed alias /bot",
                "Refusing to remove the last alias",
            ]
        );
        assert_eq!(bot.memory().get::<Vec<String>>("command_aliases"), Some(vec!["!b".to_string()]));
    }

    #[tokio::test]
    async fn test_botalias_hidden_from_guests() {
        let (bot, client) = test_bot(json!({ "admins": ["root"] }));
        bot.plugins().load(&bot, "core").unwrap();

        bot.handle_event(msg("guest", "/bot botalias add !b")).await;

        assert_eq!(bot.command_aliases(), vec!["/bot"]);
        assert_eq!(client.texts(), vec!["Unknown command: botalias"]);
    }
}
