use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use common::{CandleFeed, Error, ExchangeClient, MarketStats, OrderReceipt, OrderSide, Result};

const RECV_WINDOW_MS: u64 = 5_000;
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// REST API client for Binance USDⓈ-M futures. Used for balance and price
/// reads, market orders and kline history.
pub struct BinanceFuturesClient {
    api_key: String,
    secret: String,
    base_url: String,
    http: Client,
}

impl BinanceFuturesClient {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn sign(&self, query: &str) -> String {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_query(&self, params: &str) -> String {
        let ts = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("recvWindow={RECV_WINDOW_MS}&timestamp={ts}")
        } else {
            format!("{params}&recvWindow={RECV_WINDOW_MS}&timestamp={ts}")
        };
        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    async fn public_get(&self, path: &str, params: &str) -> Result<String> {
        let url = format!("{}{path}?{params}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn signed_get(&self, path: &str, params: &str) -> Result<String> {
        let url = format!("{}{path}?{}", self.base_url, self.signed_query(params));
        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    /// Signed POST. Returns status and body so order placement can tell a
    /// rejection apart from a transport failure.
    async fn signed_post(&self, path: &str, params: &str) -> Result<(StatusCode, String)> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(self.signed_query(params))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        Ok((status, text))
    }
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
    if !status.is_success() {
        return Err(Error::Gateway(format!("HTTP {status}: {body}")));
    }
    Ok(body)
}

#[async_trait]
impl ExchangeClient for BinanceFuturesClient {
    async fn balance(&self) -> Result<Decimal> {
        let body = self.signed_get("/fapi/v2/balance", "").await?;
        parse_usdt_balance(&body)
    }

    async fn current_price(&self, symbol: &str) -> Result<Decimal> {
        let body = self
            .public_get("/fapi/v1/ticker/price", &format!("symbol={symbol}"))
            .await?;
        let ticker: PriceTicker = serde_json::from_str(&body)?;
        parse_decimal("price", &ticker.price)
    }

    async fn market_stats(&self, symbol: &str) -> Result<Option<MarketStats>> {
        let body = self
            .public_get("/fapi/v1/ticker/24hr", &format!("symbol={symbol}"))
            .await?;
        parse_24h_stats(&body).map(Some)
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<OrderReceipt> {
        let params = format!(
            "symbol={symbol}&side={side}&type=MARKET&quantity={quantity}&newOrderRespType=RESULT"
        );

        debug!(symbol = %symbol, side = %side, qty = %quantity, "Submitting market order to Binance");
        let (status, body) = self.signed_post("/fapi/v1/order", &params).await?;

        if !status.is_success() {
            return Err(classify_order_error(status, &body));
        }
        parse_order_receipt(&body)
    }
}

#[async_trait]
impl CandleFeed for BinanceFuturesClient {
    async fn closes(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<f64>> {
        let body = self
            .public_get(
                "/fapi/v1/klines",
                &format!("symbol={symbol}&interval={interval}&limit={limit}"),
            )
            .await?;
        parse_kline_closes(&body)
    }
}

// ─── Response parsing ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PriceTicker {
    price: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    price_change_percent: String,
    volume: String,
}

#[derive(Deserialize)]
struct BalanceEntry {
    asset: String,
    balance: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    status: String,
    #[serde(default)]
    avg_price: Option<String>,
    #[serde(default)]
    executed_qty: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal> {
    raw.parse::<Decimal>()
        .map_err(|e| Error::Gateway(format!("invalid {field} '{raw}': {e}")))
}

fn parse_usdt_balance(body: &str) -> Result<Decimal> {
    let entries: Vec<BalanceEntry> = serde_json::from_str(body)?;
    let usdt = entries
        .into_iter()
        .find(|b| b.asset == "USDT")
        .ok_or_else(|| Error::Gateway("no USDT balance in account".into()))?;
    parse_decimal("balance", &usdt.balance)
}

fn parse_24h_stats(body: &str) -> Result<MarketStats> {
    let ticker: Ticker24h = serde_json::from_str(body)?;
    Ok(MarketStats {
        volume: parse_decimal("volume", &ticker.volume)?,
        change_24h_pct: parse_decimal("priceChangePercent", &ticker.price_change_percent)?,
    })
}

fn parse_order_receipt(body: &str) -> Result<OrderReceipt> {
    let resp: OrderResponse = serde_json::from_str(body)?;

    let avg_price = resp
        .avg_price
        .as_deref()
        .map(|p| parse_decimal("avgPrice", p))
        .transpose()?
        .filter(|p| *p > Decimal::ZERO);
    let executed_qty = resp
        .executed_qty
        .as_deref()
        .map(|q| parse_decimal("executedQty", q))
        .transpose()?
        .unwrap_or(Decimal::ZERO);

    Ok(OrderReceipt {
        order_id: resp.order_id.to_string(),
        status: resp.status,
        avg_price,
        executed_qty,
    })
}

/// 4xx answers carrying a Binance `{code, msg}` body are refusals of the
/// order itself; anything else is a gateway failure.
fn classify_order_error(status: StatusCode, body: &str) -> Error {
    match serde_json::from_str::<ApiError>(body) {
        Ok(api) if status.is_client_error() => Error::OrderRejected {
            reason: format!("{} (code {})", api.msg, api.code),
        },
        _ => Error::Gateway(format!("HTTP {status}: {body}")),
    }
}

fn parse_kline_closes(body: &str) -> Result<Vec<f64>> {
    let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(body)?;
    rows.iter()
        .map(|row| {
            row.get(4)
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| Error::Gateway(format!("malformed kline row: {row:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn usdt_balance_is_picked_from_account() {
        let body = r#"[
            {"accountAlias":"x","asset":"BNB","balance":"0.5","availableBalance":"0.5"},
            {"accountAlias":"x","asset":"USDT","balance":"1234.56780000","availableBalance":"1000"}
        ]"#;
        assert_eq!(parse_usdt_balance(body).unwrap(), dec!(1234.5678));
    }

    #[test]
    fn missing_usdt_is_a_gateway_error() {
        let body = r#"[{"asset":"BNB","balance":"0.5"}]"#;
        assert!(matches!(parse_usdt_balance(body), Err(Error::Gateway(_))));
    }

    #[test]
    fn ticker_24h_yields_volume_and_change() {
        let body = r#"{
            "symbol": "BTCUSDT", "priceChange": "-94.99999800", "priceChangePercent": "-0.211",
            "weightedAvgPrice": "44950.1", "lastPrice": "44900.00", "volume": "182345.123",
            "quoteVolume": "8196532345.11", "openTime": 1499783499040, "closeTime": 1499869899040
        }"#;
        let stats = parse_24h_stats(body).unwrap();
        assert_eq!(stats.volume, dec!(182345.123));
        assert_eq!(stats.change_24h_pct, dec!(-0.211));
    }

    #[test]
    fn order_receipt_parses_result_response() {
        let body = r#"{
            "orderId": 22542179, "symbol": "BTCUSDT", "status": "FILLED",
            "clientOrderId": "abc", "avgPrice": "45012.30", "executedQty": "0.002",
            "side": "BUY", "type": "MARKET"
        }"#;
        let receipt = parse_order_receipt(body).unwrap();
        assert_eq!(receipt.order_id, "22542179");
        assert_eq!(receipt.status, "FILLED");
        assert_eq!(receipt.avg_price, Some(dec!(45012.30)));
        assert_eq!(receipt.executed_qty, dec!(0.002));
    }

    #[test]
    fn zero_avg_price_means_unknown() {
        let body = r#"{"orderId": 1, "status": "NEW", "avgPrice": "0.00000", "executedQty": "0"}"#;
        assert_eq!(parse_order_receipt(body).unwrap().avg_price, None);
    }

    #[test]
    fn client_error_with_api_body_is_rejection() {
        let err = classify_order_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":-2019,"msg":"Margin is insufficient."}"#,
        );
        match err {
            Error::OrderRejected { reason } => assert!(reason.contains("Margin is insufficient")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn server_error_is_gateway_error() {
        let err = classify_order_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, Error::Gateway(_)));
    }

    #[test]
    fn kline_closes_are_extracted_in_order() {
        let body = r#"[
            [1499040000000,"0.0100","0.0200","0.0050","0.0150","148976",1499644799999,"2434",308,"1756","28","0"],
            [1499040060000,"0.0150","0.0300","0.0100","0.0250","100",1499644859999,"2434",308,"1756","28","0"]
        ]"#;
        assert_eq!(parse_kline_closes(body).unwrap(), vec![0.015, 0.025]);
    }

    #[test]
    fn signed_query_appends_signature() {
        let client = BinanceFuturesClient::new("key", "secret", "https://example.test/").unwrap();
        let query = client.signed_query("symbol=BTCUSDT");
        assert!(query.starts_with("symbol=BTCUSDT&recvWindow=5000&timestamp="));
        let (unsigned, signature) = query.rsplit_once("&signature=").unwrap();
        assert_eq!(signature, client.sign(unsigned));
        assert_eq!(client.base_url, "https://example.test");
    }
}
