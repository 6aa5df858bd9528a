use std::{fmt::Write as _, time::Duration};

use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{Result, StockError},
    indicators::IndicatorSet,
    quote::Quote,
};

const DEFAULT_BASE_API: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are an expert financial analyst and trading advisor with deep \
knowledge of technical analysis, market trends, and risk management. Provide detailed, actionable \
trading advice based on real-time market data and technical indicators.";

/// Chat-completions client producing free-text trading commentary.
#[derive(Clone)]
pub struct Advisor {
    client: Client,
    base_api: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl Advisor {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Result<Self> {
        Self::with_base_api(DEFAULT_BASE_API, api_key, model, max_tokens)
    }

    pub fn with_base_api(
        base_api: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StockError::Advisor(e.to_string()))?;

        Ok(Self {
            client,
            base_api: base_api.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn advise(&self, quote: &Quote, indicators: Option<&IndicatorSet>) -> Result<String> {
        let prompt = build_prompt(quote, indicators);
        debug!(symbol = quote.symbol(), chars = prompt.len(), "sending advisor prompt");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: 0.3,
            top_p: 0.9,
        };

        let res: ChatResponse = self
            .client
            .post(format!("{}/chat/completions", self.base_api.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StockError::Advisor(e.to_string()))?
            .json()
            .await
            .map_err(|e| StockError::Advisor(e.to_string()))?;

        let content = res
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| StockError::Advisor("empty completion".into()))?;

        info!(symbol = quote.symbol(), chars = content.len(), "advice received");
        Ok(content)
    }
}

/// Prompt with the quote, whichever indicators are known, and the fixed
/// analysis brief. Missing indicators are left out rather than guessed.
pub fn build_prompt(quote: &Quote, indicators: Option<&IndicatorSet>) -> String {
    let symbol = quote.symbol();
    let volume = quote
        .volume()
        .map_or_else(|| "N/A".to_string(), |v| v.to_string());

    let mut p = String::new();
    let _ = writeln!(
        p,
        "You are an expert financial analyst and trading advisor. Provide a comprehensive \
         analysis and trading recommendation for {symbol} stock.\n"
    );
    let _ = writeln!(p, "CURRENT MARKET DATA:");
    let _ = writeln!(p, "- Symbol: {symbol}");
    let _ = writeln!(p, "- Current Price: ${:.2}", quote.current_price());
    let _ = writeln!(
        p,
        "- Daily Change: {:+.2} ({:+.2}%)",
        quote.change(),
        quote.change_percent()
    );
    let _ = writeln!(p, "- Volume: {volume}");
    let _ = writeln!(p, "- Open: ${:.2}", quote.open());
    let _ = writeln!(p, "- High: ${:.2}", quote.high());
    let _ = writeln!(p, "- Low: ${:.2}", quote.low());
    let _ = writeln!(p, "\nTECHNICAL INDICATORS:");

    if let Some(ind) = indicators {
        for (label, ma) in [("20-day", ind.ma20), ("10-day", ind.ma10), ("5-day", ind.ma5)] {
            if let Some(ma) = ma {
                let _ = writeln!(p, "- {label} MA: ${:.2} (Trend: {:?})", ma.value, ma.trend);
            }
        }
        if let Some(rsi) = ind.rsi {
            let _ = writeln!(p, "- RSI: {:.2} (Signal: {:?})", rsi.value, rsi.signal);
        }
        if let Some(vol) = ind.volume {
            let _ = writeln!(p, "- Volume Ratio: {:.2}x (Signal: {:?})", vol.ratio, vol.signal);
        }
        if let Some(m) = ind.momentum_5d {
            let _ = writeln!(p, "- 5-day Momentum: {m:+.2}%");
        }
        if let Some(v) = ind.volatility {
            let _ = writeln!(p, "- Volatility: {v:.2}%");
        }
        if let Some(range) = ind.range {
            let _ = writeln!(p, "- Support Level: ${:.2}", range.support);
            let _ = writeln!(p, "- Resistance Level: ${:.2}", range.resistance);
        }
    }

    p.push_str(ANALYSIS_BRIEF);
    let _ = writeln!(p, "\nCurrent timestamp: {}", Utc::now().to_rfc3339());
    p
}

const ANALYSIS_BRIEF: &str = "
ANALYSIS REQUIREMENTS:
Please provide a detailed analysis including:

1. **IMMEDIATE RECOMMENDATION**: Clear BUY/SELL/HOLD recommendation with confidence level (1-10)

2. **TECHNICAL ANALYSIS**:
   - Moving average analysis and trend direction
   - RSI interpretation and momentum signals
   - Volume analysis and institutional activity
   - Support and resistance levels
   - Chart patterns if identifiable

3. **RISK ASSESSMENT**:
   - Current volatility analysis
   - Risk factors to consider
   - Position sizing recommendations
   - Stop-loss and take-profit levels

4. **MARKET CONTEXT**:
   - Overall market sentiment impact
   - Sector performance comparison
   - Recent news or events affecting the stock

5. **TRADING STRATEGY**:
   - Entry points and timing
   - Short-term vs long-term outlook
   - Alternative scenarios (bullish/bearish cases)

6. **SPECIFIC PRICE TARGETS**:
   - Next resistance/support levels
   - 1-week, 1-month price projections
   - Risk-reward ratio

Provide actionable, specific advice based on current market conditions and technical analysis. \
Be detailed in your reasoning and include specific price levels, percentages, and timeframes. \
Focus on practical trading signals that can be acted upon immediately.
";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compute;
    use crate::quote::{QuoteFields, QuoteOrigin};
    use crate::series::{HistoricalSeries, fixtures::bars_from_closes};

    fn quote() -> Quote {
        Quote::new(
            "nvda",
            QuoteFields {
                current_price: 120.5,
                previous_close: 118.0,
                open: 118.2,
                high: 121.0,
                low: 117.9,
                volume: Some(1_234),
            },
            QuoteOrigin::Primary,
        )
    }

    #[test]
    fn prompt_without_history_skips_indicators() {
        let p = build_prompt(&quote(), None);
        assert!(p.contains("- Symbol: NVDA"));
        assert!(p.contains("- Current Price: $120.50"));
        assert!(p.contains("- Daily Change: +2.50 (+2.12%)"));
        assert!(p.contains("- Volume: 1234"));
        assert!(!p.contains("RSI:"));
        assert!(p.contains("IMMEDIATE RECOMMENDATION"));
    }

    #[test]
    fn prompt_includes_only_present_indicators() {
        let closes: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        let set = compute(&HistoricalSeries::new("NVDA", bars_from_closes(&closes)));

        let p = build_prompt(&quote(), Some(&set));
        assert!(p.contains("- 5-day MA:"));
        assert!(p.contains("- 10-day MA:"));
        assert!(!p.contains("- 20-day MA:"));
        assert!(!p.contains("RSI:"));
        assert!(!p.contains("Support Level"));
        assert!(p.contains("- 5-day Momentum:"));
    }

    #[test]
    fn parses_completion_content() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"HOLD"}}]}"#;
        let res: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(res.choices[0].message.content.as_deref(), Some("HOLD"));
    }
}
