//! Welcomes people added to the conversation.
//!
//! ```json
//! { "plugin_config": { "greeter": { "greeting": "Welcome, {names}!" } } }
//! ```

use hangbot::prelude::*;
use serde::Deserialize;

pub const GREETER: PluginDescriptor = PluginDescriptor {
    name: "greeter",
    desc: "welcomes new participants",
    init,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct GreeterConfig {
    greeting: String,
    introduction: String,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            greeting: "Welcome, {names}!".to_string(),
            introduction: "Hi all, I'm a bot. Say \"{alias} help\" to see what I can do."
                .to_string(),
        }
    }
}

fn init(scope: &PluginScope<'_>) -> Result<(), BoxError> {
    let config: GreeterConfig = scope.config().unwrap_or_default();
    scope.on(EventCategory::Membership, move |ctx: HandlerContext| {
        let config = config.clone();
        async move { greet(ctx, &config).await }
    });
    Ok(())
}

async fn greet(ctx: HandlerContext, config: &GreeterConfig) -> Result<Flow, BoxError> {
    let EventKind::Membership {
        change: MembershipChange::Join,
        participant_ids,
    } = &ctx.event().kind
    else {
        return Ok(Flow::Continue);
    };

    let self_id = ctx.bot().self_id();
    if ctx.event().involves(self_id) {
        let alias = ctx
            .bot()
            .command_aliases()
            .into_iter()
            .next()
            .unwrap_or_default();
        ctx.reply(config.introduction.replace("{alias}", &alias))
            .await?;
        return Ok(Flow::Continue);
    }

    let names: Vec<&str> = participant_ids
        .iter()
        .map(String::as_str)
        .filter(|id| *id != self_id)
        .collect();
    if !names.is_empty() {
        ctx.reply(config.greeting.replace("{names}", &names.join(", ")))
            .await?;
    }
    Ok(Flow::Continue)
}
