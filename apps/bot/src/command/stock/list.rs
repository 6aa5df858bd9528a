use poise::CreateReply;
use serenity::all::CreateEmbed;

use super::INFO_COLOR;
use crate::{Context, Error};

/// List all tracked stocks
#[poise::command(slash_command)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let symbols = ctx.data().symbol_store.list().await;

    if symbols.is_empty() {
        ctx.say("📋 No stocks are currently being tracked.").await?;
        return Ok(());
    }

    let embed = CreateEmbed::default()
        .title("📋 Tracked Stocks")
        .description(format!("Currently tracking {} stocks:", symbols.len()))
        .color(INFO_COLOR)
        .field("Symbols", symbols.join(", "), false);

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
