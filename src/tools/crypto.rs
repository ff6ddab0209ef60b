//! Market data from CoinGecko, offered to the model as a tool.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{Tool, ToolError};

pub const TOOL_NAME: &str = "get_top_cryptocurrencies";
const DEFAULT_ENDPOINT: &str = "https://api.coingecko.com/api/v3/coins/markets";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RULE_WIDTH: usize = 80;

#[derive(Debug, Deserialize)]
struct MarketEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    current_price: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    total_volume: Option<f64>,
}

pub struct TopCryptocurrencies {
    http: reqwest::Client,
    endpoint: String,
}

impl Default for TopCryptocurrencies {
    fn default() -> Self {
        Self::new()
    }
}

impl TopCryptocurrencies {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    async fn fetch(&self) -> Result<Vec<MarketEntry>, ToolError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("vs_currency", "usd"),
                ("order", "market_cap_desc"),
                ("per_page", "10"),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Vec<MarketEntry>>().await?)
    }
}

#[async_trait::async_trait]
impl Tool for TopCryptocurrencies {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get the top 10 cryptocurrencies by market cap with current prices and 24h change"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn invoke(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        // Upstream failures are part of the result so the model can explain
        // them instead of seeing a bare error.
        match self.fetch().await {
            Ok(entries) => Ok(reshape_markets(&entries)),
            Err(err) => Ok(json!({
                "success": false,
                "error": format!("Failed to fetch cryptocurrency data: {err}"),
            })),
        }
    }

    fn render(&self, result: &Value) -> Option<String> {
        Some(format_crypto_display(result))
    }
}

fn reshape_markets(entries: &[MarketEntry]) -> Value {
    let data: Vec<Value> = entries
        .iter()
        .enumerate()
        .map(|(index, coin)| {
            json!({
                "rank": index + 1,
                "name": coin.name.as_deref().unwrap_or("N/A"),
                "symbol": coin.symbol.as_deref().unwrap_or("N/A").to_uppercase(),
                "current_price": format!("${}", group_thousands(coin.current_price.unwrap_or(0.0), 2)),
                "market_cap": format!("${}", group_thousands(coin.market_cap.unwrap_or(0.0), 0)),
                "24h_change": format!("{:.2}%", coin.price_change_percentage_24h.unwrap_or(0.0)),
                "24h_volume": format!("${}", group_thousands(coin.total_volume.unwrap_or(0.0), 0)),
            })
        })
        .collect();

    json!({
        "success": true,
        "data": data,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

/// `1234567.891` with 2 decimals becomes `1,234,567.89`.
fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

pub fn format_crypto_display(result: &Value) -> String {
    if result.get("success").and_then(Value::as_bool) != Some(true) {
        let error = result
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        return format!("Error: {error}");
    }

    let field = |entry: &Value, key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![
        "Top 10 Cryptocurrencies by Market Cap:\n".to_string(),
        rule.clone(),
    ];
    let entries = result
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for entry in entries {
        let rank = entry.get("rank").and_then(Value::as_u64).unwrap_or_default();
        lines.push(format!(
            "{rank:2}. {:<15} ({:<6}) | Price: {:>12} | 24h: {:>8} | MCap: {}",
            field(entry, "name"),
            field(entry, "symbol"),
            field(entry, "current_price"),
            field(entry, "24h_change"),
            field(entry, "market_cap"),
        ));
    }
    lines.push(rule);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{serve_once, unused_base_url, CannedResponse};

    #[test]
    fn thousands_are_grouped() {
        assert_eq!(group_thousands(0.0, 2), "0.00");
        assert_eq!(group_thousands(999.0, 0), "999");
        assert_eq!(group_thousands(1234.5, 2), "1,234.50");
        assert_eq!(group_thousands(1_234_567_890.0, 0), "1,234,567,890");
        assert_eq!(group_thousands(-98765.4321, 2), "-98,765.43");
    }

    #[test]
    fn markets_are_reshaped_with_ranks_and_currency_strings() {
        let entries: Vec<MarketEntry> = serde_json::from_value(json!([
            {
                "name": "Bitcoin",
                "symbol": "btc",
                "current_price": 67234.12,
                "market_cap": 1324000000000.0,
                "price_change_percentage_24h": -1.234,
                "total_volume": 28000000000.0
            },
            {"name": "Mystery", "symbol": null, "current_price": null}
        ]))
        .expect("entries");

        let reshaped = reshape_markets(&entries);
        assert_eq!(reshaped["success"], true);
        assert_eq!(
            reshaped["data"][0],
            json!({
                "rank": 1,
                "name": "Bitcoin",
                "symbol": "BTC",
                "current_price": "$67,234.12",
                "market_cap": "$1,324,000,000,000",
                "24h_change": "-1.23%",
                "24h_volume": "$28,000,000,000"
            })
        );
        assert_eq!(reshaped["data"][1]["symbol"], "N/A");
        assert_eq!(reshaped["data"][1]["current_price"], "$0.00");
    }

    #[test]
    fn display_renders_a_fixed_width_table() {
        let result = json!({
            "success": true,
            "data": [{
                "rank": 1,
                "name": "Bitcoin",
                "symbol": "BTC",
                "current_price": "$67,234.12",
                "market_cap": "$1,324,000,000,000",
                "24h_change": "-1.23%",
                "24h_volume": "$28,000,000,000"
            }]
        });
        let rendered = format_crypto_display(&result);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Top 10 Cryptocurrencies by Market Cap:");
        assert_eq!(lines[2], "=".repeat(80));
        assert_eq!(
            lines[3],
            " 1. Bitcoin         (BTC   ) | Price:   $67,234.12 | 24h:   -1.23% | MCap: $1,324,000,000,000"
        );
        assert_eq!(lines[4], "=".repeat(80));

        assert_eq!(
            format_crypto_display(&json!({"success": false, "error": "rate limited"})),
            "Error: rate limited"
        );
    }

    #[tokio::test]
    async fn invoke_queries_the_markets_endpoint() {
        let server = serve_once(CannedResponse::json(
            200,
            r#"[{"name":"Ethereum","symbol":"eth","current_price":3100.5,"market_cap":372000000000,"price_change_percentage_24h":2.5,"total_volume":15000000000}]"#,
        ))
        .await;
        let tool = TopCryptocurrencies::with_endpoint(format!("{}/coins/markets", server.base_url));

        let result = tool.invoke(Map::new()).await.expect("invoke");
        assert_eq!(result["data"][0]["symbol"], "ETH");
        assert_eq!(result["data"][0]["24h_change"], "2.50%");

        let request = server.request().await;
        assert!(request.path.starts_with("/coins/markets?"));
        assert!(request.path.contains("vs_currency=usd"));
        assert!(request.path.contains("per_page=10"));
    }

    #[tokio::test]
    async fn upstream_failures_are_reported_in_the_result() {
        let tool = TopCryptocurrencies::with_endpoint(format!("{}/markets", unused_base_url().await));
        let result = tool.invoke(Map::new()).await.expect("invoke");
        assert_eq!(result["success"], false);
        assert!(result["error"]
            .as_str()
            .expect("error text")
            .starts_with("Failed to fetch cryptocurrency data: "));
    }
}
