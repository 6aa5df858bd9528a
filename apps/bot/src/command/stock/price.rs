use poise::CreateReply;
use serenity::all::{CreateAttachment, CreateEmbed, Timestamp};
use stock::{Period, SymbolStore};
use tracing::{debug, info, warn};

use super::{INFO_COLOR, quote_fields};
use crate::{Context, Error};

/// Current quote with a candlestick chart of the last month
#[poise::command(slash_command)]
pub async fn price(
    ctx: Context<'_>,
    #[description = "Ticker symbol (e.g., AAPL)"] symbol: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    let symbol = SymbolStore::normalize(&symbol);
    let data = ctx.data();
    info!(symbol = %symbol, user_id = ctx.author().id.get(), "price requested");

    let quote = match data.market.get_quote(&symbol).await {
        Ok(q) => q,
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "quote unavailable");
            ctx.say(format!("❌ Could not fetch data for {symbol}"))
                .await?;
            return Ok(());
        }
    };

    let mut embed = quote_fields(
        CreateEmbed::default()
            .title(format!("📈 {symbol} Stock Price"))
            .color(INFO_COLOR),
        &quote,
    )
    .field("Open", format!("${:.2}", quote.open()), true)
    .field("High", format!("${:.2}", quote.high()), true)
    .field("Low", format!("${:.2}", quote.low()), true)
    .timestamp(Timestamp::now());

    let mut reply = CreateReply::default();

    match data.market.get_series(&symbol, Period::Month1).await {
        Ok(series) => match data.charts.render_to_file(series).await {
            Ok(path) => {
                let attachment = CreateAttachment::path(&path).await?;
                embed = embed.image(format!("attachment://{}", attachment.filename));
                reply = reply.attachment(attachment);
            }
            Err(e) => warn!(symbol = %symbol, error = %e, "chart rendering failed"),
        },
        Err(e) => debug!(symbol = %symbol, error = %e, "no history for chart"),
    }

    ctx.send(reply.embed(embed)).await?;
    Ok(())
}
