use crate::kline::Kline;
use crate::source::KlineSource;
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Binance spot kline endpoint; override with the `KLINE_URL` env var
/// (useful for mirrors, or a stub server in integration tests).
const KLINE_URL: &str = "https://api.binance.com/api/v3/klines";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Transient-failure budget per page. The pipeline treats an exhausted
/// budget the same as an empty response, so this stays small.
const RETRIES: usize = 2;
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// REST client for the Binance spot kline endpoint.
pub struct Binance {
    client: reqwest::Client,
    url: String,
}

impl Binance {
    pub fn new() -> anyhow::Result<Self> {
        let timeout = dotenv::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("failed to build Binance HTTP client")?;

        let url = dotenv::var("KLINE_URL").unwrap_or_else(|_| KLINE_URL.to_string());

        Ok(Binance { client, url })
    }

    async fn fetch_page(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        end_time: Option<i64>,
    ) -> anyhow::Result<Vec<Kline>> {
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(end) = end_time {
            params.push(("endTime", end.to_string()));
        }

        let klines: Vec<Kline> = self
            .client
            .get(&self.url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(klines)
    }
}

#[async_trait]
impl KlineSource for Binance {
    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        end_time: Option<i64>,
    ) -> anyhow::Result<Vec<Kline>> {
        let mut last_err = None;

        for attempt in 0..=RETRIES {
            if attempt > 0 {
                sleep(RETRY_DELAY).await;
            }
            match self.fetch_page(symbol, interval, limit, end_time).await {
                Ok(batch) => {
                    debug!(
                        "{symbol} {interval} x{limit}: {} candles fetched",
                        batch.len()
                    );
                    return Ok(batch);
                }
                Err(e) => {
                    warn!(
                        "{symbol} {interval} kline fetch failed (attempt {}/{}) | {e}",
                        attempt + 1,
                        RETRIES + 1
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{symbol} kline fetch failed")))
    }
}
