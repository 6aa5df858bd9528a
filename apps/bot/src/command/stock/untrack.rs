use anyhow::bail;
use chrono::Utc;
use ::serenity::all::{
    CreateActionRow, CreateEmbed, CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption,
};
use poise::{CreateReply, serenity_prelude as serenity};
use stock::{PriceMonitor, SymbolStore};
use tracing::{debug, error, info, warn};

use super::REMOVED_COLOR;
use crate::{Context, Data, Error};

const SELECT_UNTRACK_ID: &str = "select_untrack";
const CONFIRM_PREFIX: &str = "confirm_untrack_";
const CANCEL_ID: &str = "cancel_untrack";
const MAX_OPTIONS: usize = 25;

/// Drops `symbol` from the store and the monitor's baselines. The monitor
/// forgets it whenever the store no longer holds it, including when only the
/// save failed.
pub(crate) async fn untrack_symbol(
    store: &SymbolStore,
    monitor: &PriceMonitor,
    symbol: &str,
) -> stock::Result<bool> {
    let res = store.remove(symbol).await;
    if !matches!(res, Ok(false)) {
        monitor.forget(symbol);
    }
    res
}

/// Remove stocks from the tracking list
#[poise::command(slash_command)]
pub async fn untrack(
    ctx: Context<'_>,
    #[description = "Ticker symbol; leave empty to pick from the list"] symbol: Option<String>,
) -> Result<(), Error> {
    ctx.defer().await?;

    let data = ctx.data();
    let user_id = ctx.author().id.get();

    if let Some(symbol) = symbol {
        let symbol = symbol.trim().to_uppercase();
        info!(user_id, symbol = %symbol, "untrack: invoked");

        let saved = match untrack_symbol(&data.symbol_store, &data.monitor, &symbol).await {
            Ok(true) => true,
            Ok(false) => {
                ctx.say(format!("❌ {symbol} is not being tracked")).await?;
                return Ok(());
            }
            Err(e) => {
                error!(user_id, symbol = %symbol, error = %e, "untrack: save failed");
                false
            }
        };

        let embed = CreateEmbed::default()
            .title(format!("✅ Removed {symbol} from Tracking"))
            .description(format!("Stopped tracking {symbol}"))
            .color(REMOVED_COLOR);
        let mut reply = CreateReply::default().embed(embed);
        if !saved {
            reply = reply.content("⚠️ The tracking list could not be saved to disk.");
        }
        ctx.send(reply).await?;
        return Ok(());
    }

    let symbols = data.symbol_store.list().await;
    if symbols.is_empty() {
        info!(user_id, "untrack: tracking list empty");
        bail!("No stocks are currently being tracked.");
    }

    let limit = symbols.len().min(MAX_OPTIONS);
    let opts: Vec<CreateSelectMenuOption> = symbols
        .into_iter()
        .take(limit)
        .map(|sym| CreateSelectMenuOption::new(sym.clone(), sym))
        .collect();

    let menu = CreateSelectMenu::new(
        SELECT_UNTRACK_ID,
        CreateSelectMenuKind::String { options: opts },
    )
    .placeholder("Choose symbols...")
    .min_values(1)
    .max_values(limit as u8);

    info!(user_id, count = limit, "untrack: presenting options");

    ctx.send(
        CreateReply::default()
            .content("Select symbols to stop tracking (you can pick multiple):")
            .components(vec![CreateActionRow::SelectMenu(menu)]),
    )
    .await?;

    Ok(())
}

pub async fn handle_component(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &serenity::ComponentInteraction,
) -> Result<(), Error> {
    let id = interaction.data.custom_id.as_str();
    let user_id = interaction.user.id.get();

    debug!(user_id, custom_id = id, "untrack: component received");

    if id == SELECT_UNTRACK_ID {
        let values = match &interaction.data.kind {
            serenity::ComponentInteractionDataKind::StringSelect { values } => values.clone(),
            _ => vec![],
        };

        if values.is_empty() {
            debug!(user_id, "untrack: empty selection");
            return Ok(());
        }

        let req_id = format!("{user_id}-{}", Utc::now().timestamp_millis());
        let count = data
            .symbol_store
            .set_pending_delete(req_id.clone(), values.clone());

        info!(user_id, req_id = %req_id, symbols = %values.join(", "), "untrack: confirmation created");

        let msg = format!(
            "Are you sure you want to stop tracking **{count}** symbols?\n> {}",
            values.join(", ")
        );

        let row = serenity::CreateActionRow::Buttons(vec![
            serenity::CreateButton::new(format!("{CONFIRM_PREFIX}{req_id}"))
                .label("Confirm")
                .style(serenity::ButtonStyle::Danger),
            serenity::CreateButton::new(CANCEL_ID)
                .label("Cancel")
                .style(serenity::ButtonStyle::Secondary),
        ]);

        interaction
            .create_response(
                ctx,
                serenity::CreateInteractionResponse::UpdateMessage(
                    serenity::CreateInteractionResponseMessage::new()
                        .content(msg)
                        .components(vec![row]),
                ),
            )
            .await?;

        return Ok(());
    }

    if id == CANCEL_ID {
        info!(user_id, "untrack: cancelled");

        interaction
            .create_response(
                ctx,
                serenity::CreateInteractionResponse::UpdateMessage(
                    serenity::CreateInteractionResponseMessage::new()
                        .content("Cancelled.")
                        .components(vec![]),
                ),
            )
            .await?;

        return Ok(());
    }

    if let Some(req_id) = id.strip_prefix(CONFIRM_PREFIX) {
        let owner = req_id.split('-').next().unwrap_or_default();

        if owner != user_id.to_string() {
            warn!(user_id, req_id, owner, "untrack: confirm denied");

            interaction
                .create_response(
                    ctx,
                    serenity::CreateInteractionResponse::Message(
                        serenity::CreateInteractionResponseMessage::new()
                            .content("You can’t confirm someone else’s request.")
                            .ephemeral(true),
                    ),
                )
                .await?;

            return Ok(());
        }

        let Some(symbols) = data.symbol_store.take_pending_delete(req_id) else {
            warn!(user_id, req_id, "untrack: confirm expired");

            interaction
                .create_response(
                    ctx,
                    serenity::CreateInteractionResponse::Message(
                        serenity::CreateInteractionResponseMessage::new()
                            .content("Session expired. Run /stock untrack again.")
                            .ephemeral(true),
                    ),
                )
                .await?;

            return Ok(());
        };

        let mut removed: Vec<String> = Vec::new();
        let mut failed = 0usize;

        for sym in &symbols {
            match untrack_symbol(&data.symbol_store, &data.monitor, sym).await {
                Ok(_) => removed.push(sym.clone()),
                Err(e) => {
                    // memory already dropped the symbol; only the save failed
                    removed.push(sym.clone());
                    failed += 1;
                    error!(user_id, symbol = %sym, error = %e, "untrack: save failed");
                }
            }
        }

        info!(user_id, req_id, removed = removed.len(), failed, "untrack: completed");

        let mut content = format!("Stopped tracking {}.", removed.join(", "));
        if failed > 0 {
            content.push_str("\n⚠️ The tracking list could not be saved to disk.");
        }

        interaction
            .create_response(
                ctx,
                serenity::CreateInteractionResponse::UpdateMessage(
                    serenity::CreateInteractionResponseMessage::new()
                        .content(content)
                        .components(vec![]),
                ),
            )
            .await?;

        return Ok(());
    }

    debug!(user_id, custom_id = id, "untrack: ignored component");
    Ok(())
}
