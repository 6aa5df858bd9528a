use serde_json::json;
use stock::NOTIFICATIONS_ENABLED;
use tracing::{info, warn};

use crate::{Context, Error};

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum Toggle {
    #[name = "on"]
    On,
    #[name = "off"]
    Off,
}

/// Turn price alert notifications on or off
#[poise::command(slash_command)]
pub async fn alerts(
    ctx: Context<'_>,
    #[description = "on or off"] state: Toggle,
) -> Result<(), Error> {
    let enabled = matches!(state, Toggle::On);

    if let Err(e) = ctx
        .data()
        .preferences
        .set(NOTIFICATIONS_ENABLED, json!(enabled))
        .await
    {
        warn!(error = %e, "alerts: preference not saved");
        ctx.say("⚠️ Preference changed for this session but could not be saved.")
            .await?;
        return Ok(());
    }

    info!(user_id = ctx.author().id.get(), enabled, "alerts: toggled");
    ctx.say(if enabled {
        "🔔 Price alerts are on."
    } else {
        "🔕 Price alerts are off."
    })
    .await?;

    Ok(())
}
