use poise::CreateReply;
use serenity::all::CreateEmbed;
use stock::{MarketData, Quote, SymbolStore};
use tracing::{debug, info, warn};

use super::{UP_COLOR, parse_symbols, quote_fields};
use crate::{Context, Error};

// Discord rejects messages with more embeds than this.
const MAX_EMBEDS: usize = 10;

/// Outcome of one track request, per symbol.
#[derive(Debug, Default)]
pub(crate) struct TrackSummary {
    pub added: Vec<Quote>,
    pub already: Vec<String>,
    pub unknown: Vec<String>,
    /// Added to memory but the tracked list could not be written.
    pub unsaved: Vec<String>,
}

/// Verifies each symbol with a quote and adds it to the store. A failed save
/// never aborts the rest of the batch.
pub(crate) async fn track_symbols(
    market: &MarketData,
    store: &SymbolStore,
    symbols: Vec<String>,
) -> TrackSummary {
    let mut summary = TrackSummary::default();

    for sym in symbols {
        if store.contains(&sym).await {
            debug!(symbol = %sym, "track: already tracked");
            summary.already.push(sym);
            continue;
        }

        let quote = match market.get_quote(&sym).await {
            Ok(q) => q,
            Err(e) => {
                debug!(symbol = %sym, error = %e, "track: symbol not verified");
                summary.unknown.push(sym);
                continue;
            }
        };

        // the symbol stays tracked in memory either way
        if let Err(e) = store.add(&sym).await {
            warn!(symbol = %sym, error = %e, "track: save failed");
            summary.unsaved.push(sym);
        }
        summary.added.push(quote);
    }

    summary
}

/// Add stocks to the tracking list
#[poise::command(slash_command)]
pub async fn track(
    ctx: Context<'_>,
    #[description = "Ticker symbol(s), comma-separated (e.g., TSLA,MSFT)"] symbol: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    let user_id = ctx.author().id.get();
    let data = ctx.data();

    let symbols = parse_symbols(&symbol);
    if symbols.is_empty() {
        warn!(user_id, raw_input = %symbol, "track: no valid symbols");
        ctx.say("No valid symbols provided.").await?;
        return Ok(());
    }

    info!(user_id, symbols = %symbols.join(", "), "track: parsed symbols");

    let summary = track_symbols(&data.market, &data.symbol_store, symbols).await;

    info!(
        user_id,
        added = summary.added.len(),
        already = summary.already.len(),
        unknown = summary.unknown.len(),
        unsaved = summary.unsaved.len(),
        "track: completed"
    );

    let mut added: Vec<CreateEmbed> = summary
        .added
        .iter()
        .map(|quote| {
            let sym = quote.symbol();
            quote_fields(
                CreateEmbed::default()
                    .title(format!("✅ Added {sym} to Tracking"))
                    .description(format!("Now tracking {sym} with real-time alerts"))
                    .color(UP_COLOR),
                quote,
            )
        })
        .collect();

    while !added.is_empty() {
        let n = added.len().min(MAX_EMBEDS);
        let reply = added
            .drain(..n)
            .fold(CreateReply::default(), |reply, embed| reply.embed(embed));
        ctx.send(reply).await?;
    }
    if !summary.unsaved.is_empty() {
        ctx.say(format!(
            "⚠️ Tracking {} for now, but the list could not be saved to disk.",
            summary.unsaved.join(", ")
        ))
        .await?;
    }
    if !summary.already.is_empty() {
        ctx.say(format!("📊 Already tracking: {}", summary.already.join(", ")))
            .await?;
    }
    if !summary.unknown.is_empty() {
        ctx.say(format!(
            "❌ Could not find stock data for {}",
            summary.unknown.join(", ")
        ))
        .await?;
    }

    Ok(())
}
