mod advice;
mod alerts;
mod list;
mod price;
mod track;
mod untrack;

use serenity::all::CreateEmbed;
use stock::Quote;

use crate::{Context, Error};
use advice::advice;
use alerts::alerts;
use list::list;
use price::price;
use track::track;
use untrack::untrack;

pub use untrack::handle_component;

pub const INFO_COLOR: u32 = 0x3498db;
pub const UP_COLOR: u32 = 0x2ecc71;
pub const DOWN_COLOR: u32 = 0xe74c3c;
pub const REMOVED_COLOR: u32 = 0xe67e22;
pub const ADVICE_COLOR: u32 = 0xf1c40f;

#[poise::command(
    slash_command,
    rename = "stock",
    subcommands("price", "list", "track", "untrack", "advice", "alerts")
)]
pub async fn stock_command(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Splits comma separated user input into normalized, unique symbols.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for sym in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !sym.is_empty() && !out.contains(&sym) {
            out.push(sym);
        }
    }
    out
}

pub fn format_volume(volume: Option<u64>) -> String {
    let Some(v) = volume else {
        return "N/A".to_string();
    };

    let digits = v.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Price, change and volume fields shared by the quote embeds.
pub fn quote_fields(embed: CreateEmbed, quote: &Quote) -> CreateEmbed {
    embed
        .field(
            "Current Price",
            format!("${:.2}", quote.current_price()),
            true,
        )
        .field(
            "Change",
            format!("{:+.2} ({:+.2}%)", quote.change(), quote.change_percent()),
            true,
        )
        .field("Volume", format_volume(quote.volume()), true)
}
