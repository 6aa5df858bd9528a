use poise::CreateReply;
use serenity::all::{CreateEmbed, Timestamp};

use crate::{Context, Error, command::stock::INFO_COLOR};

const COMMANDS: [(&str, &str); 7] = [
    ("/stock price <symbol>", "Get current stock price with candlestick chart"),
    ("/stock list", "List all tracked stocks"),
    ("/stock track <symbols>", "Add stocks to the tracking list (comma-separated)"),
    ("/stock untrack [symbol]", "Remove a stock, or pick several from a menu"),
    ("/stock advice <symbol>", "Get AI-powered stock advice with detailed signals"),
    ("/stock alerts <on|off>", "Turn price alert notifications on or off"),
    ("/help", "Show this help message"),
];

/// Show bot commands and usage
#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let embed = COMMANDS
        .iter()
        .fold(
            CreateEmbed::default()
                .title("📚 Stock Bot Help")
                .description("Real-time stock tracking with AI-powered advice")
                .color(INFO_COLOR),
            |embed, (cmd, desc)| embed.field(*cmd, *desc, false),
        )
        .field(
            "📊 Features",
            "• Real-time price monitoring\n• Automatic price alerts\n• OHLC candlestick charts\n• AI-powered trading signals\n• Persistent stock tracking",
            false,
        )
        .timestamp(Timestamp::now());

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
