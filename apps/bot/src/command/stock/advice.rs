use poise::CreateReply;
use serenity::all::{CreateEmbed, Timestamp};
use stock::{Period, SymbolStore, indicators};
use tracing::{debug, info, warn};

use super::ADVICE_COLOR;
use crate::{Context, Error};

const EMBED_LIMIT: usize = 4000;
const MESSAGE_LIMIT: usize = 2000;
const FENCE: &str = "```";
const CHUNK_LIMIT: usize = MESSAGE_LIMIT - 2 * FENCE.len();

/// AI-powered trading advice with technical signals
#[poise::command(slash_command)]
pub async fn advice(
    ctx: Context<'_>,
    #[description = "Ticker symbol (e.g., NVDA)"] symbol: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    let symbol = SymbolStore::normalize(&symbol);
    let data = ctx.data();
    info!(symbol = %symbol, user_id = ctx.author().id.get(), "advice requested");

    let quote = match data.market.get_quote(&symbol).await {
        Ok(q) => q,
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "quote unavailable");
            ctx.say(format!("❌ Could not fetch data for {symbol}"))
                .await?;
            return Ok(());
        }
    };

    let indicators = match data.market.get_series(&symbol, Period::Month1).await {
        Ok(series) => Some(indicators::compute(&series)),
        Err(e) => {
            debug!(symbol = %symbol, error = %e, "advising without history");
            None
        }
    };

    let text = match data.advisor.advise(&quote, indicators.as_ref()).await {
        Ok(t) => t,
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "advisor failed");
            ctx.say(format!("❌ Could not generate advice for {symbol}"))
                .await?;
            return Ok(());
        }
    };

    let (head, rest) = split_advice(&text);

    let embed = CreateEmbed::default()
        .title(format!("🤖 AI Stock Advice: {symbol}"))
        .description(head)
        .color(ADVICE_COLOR)
        .field(
            "Current Price",
            format!("${:.2}", quote.current_price()),
            true,
        )
        .field("Change", format!("{:+.2}%", quote.change_percent()), true)
        .timestamp(Timestamp::now());

    ctx.send(CreateReply::default().embed(embed)).await?;

    for message in rest {
        ctx.say(message).await?;
    }

    Ok(())
}

/// First [`EMBED_LIMIT`] characters for the embed, the remainder as fenced
/// follow-up messages of at most [`MESSAGE_LIMIT`] characters each.
fn split_advice(text: &str) -> (String, Vec<String>) {
    let chars: Vec<char> = text.chars().collect();
    let split = chars.len().min(EMBED_LIMIT);

    let head = chars[..split].iter().collect();
    let rest = chars[split..]
        .chunks(CHUNK_LIMIT)
        .map(|c| format!("{FENCE}{}{FENCE}", c.iter().collect::<String>()))
        .collect();

    (head, rest)
}
