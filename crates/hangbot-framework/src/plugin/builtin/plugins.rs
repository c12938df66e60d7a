//! Runtime plugin administration.

use linkme::distributed_slice;

use crate::context::CommandContext;
use crate::error::BoxError;
use crate::plugin::{BUILTIN_PLUGINS, PluginDescriptor, PluginScope};

const SELF_NAME: &str = "plugins";

#[distributed_slice(BUILTIN_PLUGINS)]
pub static PLUGINS_PLUGIN: PluginDescriptor = PluginDescriptor {
    name: SELF_NAME,
    desc: "list, unload and reload plugins",
    init,
};

fn init(scope: &PluginScope<'_>) -> Result<(), BoxError> {
    scope.register_admin_command(["plugins"], list);
    scope.register_admin_command(["unload"], unload);
    scope.register_admin_command(["reload"], reload);
    Ok(())
}

async fn list(ctx: CommandContext) -> Result<(), BoxError> {
    let lines: Vec<String> = ctx
        .bot()
        .plugins()
        .descriptors()
        .into_iter()
        .map(|(desc, state)| format!("{} [{state}] {}", desc.name, desc.desc))
        .collect();
    ctx.reply(lines.join("\n")).await?;
    Ok(())
}

async fn unload(ctx: CommandContext) -> Result<(), BoxError> {
    let [name] = ctx.args() else {
        ctx.reply("Usage: unload <plugin>").await?;
        return Ok(());
    };
    if name == SELF_NAME {
        ctx.reply("Refusing to unload the plugin manager").await?;
        return Ok(());
    }

    let bot = ctx.bot();
    let text = match bot.plugins().unload(bot, name) {
        Ok(removed) => format!("Unloaded {name} ({removed} entries removed)"),
        Err(e) => e.to_string(),
    };
    ctx.reply(text).await?;
    Ok(())
}

async fn reload(ctx: CommandContext) -> Result<(), BoxError> {
    let [name] = ctx.args() else {
        ctx.reply("Usage: reload <plugin>").await?;
        return Ok(());
    };

    let bot = ctx.bot();
    let text = match bot.plugins().reload(bot, name) {
        Ok(()) => format!("Reloaded {name}"),
        Err(e) => e.to_string(),
    };
    ctx.reply(text).await?;
    Ok(())
}
