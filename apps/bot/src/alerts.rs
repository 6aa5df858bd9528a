use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::America::New_York;
use serenity::all::{ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, Http, Timestamp};
use stock::{AlertSink, PreferenceStore, PriceAlert};
use tracing::{debug, info};

use crate::command::stock::{DOWN_COLOR, UP_COLOR, format_volume};

/// Posts price alerts to the configured alert channel.
pub struct DiscordAlertSink {
    http: Arc<Http>,
    channel: ChannelId,
    preferences: Arc<PreferenceStore>,
}

impl DiscordAlertSink {
    pub fn new(http: Arc<Http>, channel: ChannelId, preferences: Arc<PreferenceStore>) -> Self {
        Self {
            http,
            channel,
            preferences,
        }
    }
}

#[async_trait]
impl AlertSink for DiscordAlertSink {
    async fn deliver(&self, alert: &PriceAlert) -> anyhow::Result<()> {
        if !self.preferences.notifications_enabled().await {
            debug!(symbol = %alert.symbol, "notifications disabled, alert dropped");
            return Ok(());
        }

        let msg = CreateMessage::new().embed(alert_embed(alert));
        self.channel.send_message(&self.http, msg).await?;

        info!(symbol = %alert.symbol, channel_id = %self.channel, "alert sent");
        Ok(())
    }
}

pub fn alert_embed(alert: &PriceAlert) -> CreateEmbed {
    let color = if alert.pct_change < 0.0 {
        DOWN_COLOR
    } else {
        UP_COLOR
    };
    let new_york = Utc::now().with_timezone(&New_York);

    CreateEmbed::default()
        .title(format!("🚨 Price Alert: {}", alert.symbol))
        .color(color)
        .field(
            "Current Price",
            format!("${:.2}", alert.quote.current_price()),
            true,
        )
        .field("Change", format!("{:+.2}%", alert.pct_change), true)
        .field("Volume", format_volume(alert.quote.volume()), true)
        .footer(CreateEmbedFooter::new(format!(
            "{} New York",
            new_york.format("%Y-%m-%d %H:%M %Z")
        )))
        .timestamp(Timestamp::now())
}

#[cfg(test)]
mod tests {
    use stock::{Quote, QuoteFields, QuoteOrigin};

    use super::*;

    fn alert(pct_change: f64) -> PriceAlert {
        let quote = Quote::new(
            "AAPL",
            QuoteFields {
                current_price: 103.0,
                previous_close: 100.0,
                open: 100.0,
                high: 104.0,
                low: 99.0,
                volume: Some(1_500_000),
            },
            QuoteOrigin::Primary,
        );
        PriceAlert {
            symbol: "AAPL".into(),
            quote,
            pct_change,
        }
    }

    #[test]
    fn embed_carries_price_change_and_volume() {
        let json = serde_json::to_value(alert_embed(&alert(3.0))).unwrap();

        assert_eq!(json["title"], "🚨 Price Alert: AAPL");
        assert_eq!(json["color"], UP_COLOR);
        let fields = json["fields"].as_array().unwrap();
        assert_eq!(fields[0]["value"], "$103.00");
        assert_eq!(fields[1]["value"], "+3.00%");
        assert_eq!(fields[2]["value"], "1,500,000");
        assert!(json["footer"]["text"].as_str().unwrap().ends_with("New York"));
    }

    #[test]
    fn drop_uses_down_color() {
        let json = serde_json::to_value(alert_embed(&alert(-2.5))).unwrap();
        assert_eq!(json["color"], DOWN_COLOR);
        assert_eq!(json["fields"][1]["value"], "-2.50%");
    }
}
