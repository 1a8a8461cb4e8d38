use crate::kline::Kline;
use async_trait::async_trait;
use std::sync::Arc;

/// Seam between the normalization pipeline and whichever exchange endpoint
/// supplies candles. Production uses [`crate::Binance`]; tests script one
/// in memory.
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// Fetch up to `limit` candles of `interval` for `symbol`.
    ///
    /// `end_time` (epoch ms, inclusive) bounds the page from the right;
    /// `None` asks for the most recent candles. Implementations return
    /// candles in ascending `open_time` order, as the exchange does.
    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        end_time: Option<i64>,
    ) -> anyhow::Result<Vec<Kline>>;
}

#[async_trait]
impl<S: KlineSource + ?Sized> KlineSource for Arc<S> {
    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        end_time: Option<i64>,
    ) -> anyhow::Result<Vec<Kline>> {
        (**self).klines(symbol, interval, limit, end_time).await
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    type Key = (String, String);

    /// One recorded `klines()` call: (symbol, interval, limit, end_time).
    pub type Call = (String, String, usize, Option<i64>);

    /// In-memory exchange with a fixed candle history per (symbol, interval).
    ///
    /// `klines()` answers the way the real endpoint does: the last `limit`
    /// candles at or before `end_time`. Unregistered pairs answer with an
    /// empty page; pairs marked failing answer with an error.
    pub struct MockSource {
        history: Mutex<HashMap<Key, Vec<Kline>>>,
        failing: Mutex<HashSet<Key>>,
        remaining_ok: Mutex<HashMap<Key, usize>>,
        calls: Mutex<Vec<Call>>,
    }

    impl MockSource {
        pub fn new() -> Self {
            MockSource {
                history: Mutex::new(HashMap::new()),
                failing: Mutex::new(HashSet::new()),
                remaining_ok: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_history(self, symbol: &str, interval: &str, klines: Vec<Kline>) -> Self {
            self.set_history(symbol, interval, klines);
            self
        }

        pub fn set_history(&self, symbol: &str, interval: &str, klines: Vec<Kline>) {
            self.history
                .lock()
                .unwrap()
                .insert(key(symbol, interval), klines);
            self.failing.lock().unwrap().remove(&key(symbol, interval));
        }

        /// Make every subsequent call for (symbol, interval) error.
        pub fn set_failing(&self, symbol: &str, interval: &str) {
            self.failing.lock().unwrap().insert(key(symbol, interval));
        }

        /// Answer the next `n` calls for (symbol, interval) normally, then
        /// error on every call after that.
        pub fn fail_after(&self, symbol: &str, interval: &str, n: usize) {
            self.remaining_ok
                .lock()
                .unwrap()
                .insert(key(symbol, interval), n);
        }

        /// Make every subsequent call error, regardless of pair.
        pub fn fail_everything(&self) {
            let keys: Vec<Key> = self.history.lock().unwrap().keys().cloned().collect();
            let mut failing = self.failing.lock().unwrap();
            for k in keys {
                failing.insert(k);
            }
            failing.insert(key("*", "*"));
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn key(symbol: &str, interval: &str) -> Key {
        (symbol.to_string(), interval.to_string())
    }

    #[async_trait]
    impl KlineSource for MockSource {
        async fn klines(
            &self,
            symbol: &str,
            interval: &str,
            limit: usize,
            end_time: Option<i64>,
        ) -> anyhow::Result<Vec<Kline>> {
            self.calls.lock().unwrap().push((
                symbol.to_string(),
                interval.to_string(),
                limit,
                end_time,
            ));

            let failing = self.failing.lock().unwrap();
            if failing.contains(&key(symbol, interval)) || failing.contains(&key("*", "*")) {
                anyhow::bail!("scripted network failure for {symbol} {interval}");
            }
            drop(failing);

            if let Some(remaining) = self
                .remaining_ok
                .lock()
                .unwrap()
                .get_mut(&key(symbol, interval))
            {
                if *remaining == 0 {
                    anyhow::bail!("scripted network failure for {symbol} {interval}");
                }
                *remaining -= 1;
            }

            let history = self.history.lock().unwrap();
            let Some(all) = history.get(&key(symbol, interval)) else {
                return Ok(Vec::new());
            };

            let mut page: Vec<Kline> = all
                .iter()
                .filter(|k| end_time.map_or(true, |end| k.open_time <= end))
                .cloned()
                .collect();
            if page.len() > limit {
                page.drain(..page.len() - limit);
            }
            Ok(page)
        }
    }

    /// Candle with only the fields the pipeline reads filled meaningfully.
    pub fn kline(open_time: i64, close: f64) -> Kline {
        Kline {
            open_time,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    /// `count` ascending 1-second candles ending at `end_ms`, closing at
    /// `first_close + i`.
    pub fn second_candles(end_ms: i64, count: usize, first_close: f64) -> Vec<Kline> {
        (0..count)
            .map(|i| {
                let offset = (count - 1 - i) as i64 * 1_000;
                kline(end_ms - offset, first_close + i as f64)
            })
            .collect()
    }
}
