use crate::fetch::{collect_klines, PAGE_LIMIT};
use crate::kline::Kline;
use crate::range::Range;
use crate::series::{linspace, percent_change, time_label};
use crate::source::KlineSource;
use futures::future::join_all;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Interval used to synthesize a series when the 1s history is too sparse
/// to chart.
const COARSE_INTERVAL: &str = "1m";

////////////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Output and cache shapes
//
////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Equal-length, percentage-normalized chart series for one request.
///
/// `series` holds one entry per requested symbol, in the configured order;
/// every value vector has the same length as `time`.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSeries {
    pub time: Vec<String>,
    pub series: Vec<(String, Vec<f64>)>,
}

impl LiveSeries {
    /// JSON key for a trading pair: the lowercased base asset,
    /// `BTCUSDT` -> `btc`.
    pub fn display_key(symbol: &str) -> String {
        match symbol.strip_suffix("USDT") {
            Some(base) if !base.is_empty() => base.to_lowercase(),
            _ => symbol.to_lowercase(),
        }
    }
}

// Serialized as one flat object, `{"time": [..], "btc": [..], "eth": [..]}`,
// which is the shape the chart page consumes.
impl Serialize for LiveSeries {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.series.len() + 1))?;
        map.serialize_entry("time", &self.time)?;
        for (symbol, values) in &self.series {
            map.serialize_entry(&Self::display_key(symbol), values)?;
        }
        map.end()
    }
}

/// Last successfully computed short-range result: the time labels plus the
/// normalized series per symbol. Served verbatim when a fetch delivers
/// nothing, and mined for its time axis when one under-delivers.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub time: Vec<String>,
    pub series: Vec<(String, Vec<f64>)>,
}

impl Snapshot {
    fn get(&self, symbol: &str) -> Option<&[f64]> {
        self.series
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, values)| values.as_slice())
    }
}

/// Per-symbol intermediate: fetched timestamps (epoch seconds) and closing
/// prices, plus how many leading entries the shape correction borrowed from
/// the cached time axis.
struct RawSeries {
    times: Vec<f64>,
    prices: Vec<f64>,
    padded: usize,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////
//
// The normalizer
//
////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Fetches candles per symbol, reshapes them into equal-length series and
/// normalizes each to percentage change from its first sample.
///
/// Holds the one piece of carried state, the fallback [`Snapshot`], behind a
/// mutex spanning the whole read-compute-write section so overlapping
/// requests can never observe a half-updated cache.
pub struct LiveFeed<S> {
    source: S,
    symbols: Vec<String>,
    priority: String,
    cache: Mutex<Snapshot>,
}

impl<S: KlineSource> LiveFeed<S> {
    /// `symbols` fixes the output order; `priority` names the symbol whose
    /// time axis everything else aligns to (falling back to the first
    /// symbol that delivered data).
    pub fn new<I, T>(source: S, symbols: I, priority: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        LiveFeed {
            source,
            symbols: symbols.into_iter().map(Into::into).collect(),
            priority: priority.into(),
            cache: Mutex::new(Snapshot::default()),
        }
    }

    /// Compute the chart series for `range`.
    ///
    /// Never fails: transport errors, malformed payloads and thin history
    /// all degrade to shorter, emptier or cached results.
    pub async fn series(&self, range: Range) -> LiveSeries {
        let mut cache = self.cache.lock().await;
        let snapshot: &Snapshot = &cache;

        // independent read-only fetches; fan out, keep configured order
        let fetched: Vec<Option<RawSeries>> = join_all(
            self.symbols
                .iter()
                .map(|symbol| fetch_symbol(&self.source, range, symbol, snapshot)),
        )
        .await;

        let Some(axis) = self.pick_axis(&fetched) else {
            debug!("no symbol delivered data for {range}; serving cached snapshot");
            return from_snapshot(&cache, &self.symbols);
        };

        let target = axis.padded + axis.times.len();

        let mut time = Vec::with_capacity(target);
        time.extend_from_slice(&cache.time[..axis.padded]);
        time.extend(axis.times.iter().map(|&t| time_label(t)));

        let series: Vec<(String, Vec<f64>)> = self
            .symbols
            .iter()
            .zip(&fetched)
            .map(|(symbol, raw)| {
                let prices = match raw {
                    // absent symbols chart flat; zero first price means
                    // normalization passes the zeros through untouched
                    None => vec![0.0; target],
                    Some(raw) => fit_length(raw, target),
                };
                (symbol.clone(), percent_change(&prices))
            })
            .collect();

        if range.pads_from_cache() {
            // whole-snapshot swap; no observer sees a torn update
            *cache = Snapshot {
                time: time.clone(),
                series: series.clone(),
            };
        }

        LiveSeries { time, series }
    }

    /// The series whose time axis the output aligns to: the priority symbol
    /// when it delivered, otherwise the first symbol that did.
    fn pick_axis<'a>(&self, fetched: &'a [Option<RawSeries>]) -> Option<&'a RawSeries> {
        self.symbols
            .iter()
            .position(|s| *s == self.priority)
            .and_then(|i| fetched.get(i))
            .and_then(Option::as_ref)
            .or_else(|| fetched.iter().flatten().next())
    }
}

/// Fetch and shape-correct one symbol. `None` means the symbol delivered
/// nothing usable this pass.
async fn fetch_symbol<S>(
    source: &S,
    range: Range,
    symbol: &str,
    cache: &Snapshot,
) -> Option<RawSeries>
where
    S: KlineSource,
{
    let points = range.points();
    let interval = range.interval();

    let klines = if points <= PAGE_LIMIT {
        match source.klines(symbol, interval, points, None).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!("{symbol} {interval} fetch failed | {e}");
                Vec::new()
            }
        }
    } else {
        collect_klines(source, symbol, interval, points).await
    };

    // the 1s stream goes quiet on illiquid pairs; two coarse candles still
    // give the short window a line to draw
    if range.pads_from_cache() && klines.len() < 2 {
        return interpolate_coarse(source, symbol, points).await;
    }

    if klines.is_empty() {
        return None;
    }

    let mut times: Vec<f64> = klines.iter().map(Kline::open_secs).collect();
    let mut prices: Vec<f64> = klines.iter().map(|k| k.close).collect();

    // most recent window wins when over-delivered
    if times.len() > points {
        times.drain(..times.len() - points);
        prices.drain(..prices.len() - points);
    }

    // under-delivery borrows the missing prefix from the cached axis, but
    // only where the padding policy allows and the cache can cover it
    let padded = if range.pads_from_cache() && times.len() < points && cache.time.len() >= points {
        points - times.len()
    } else {
        0
    };

    Some(RawSeries {
        times,
        prices,
        padded,
    })
}

/// Sparse-data fallback: linearly interpolate `points` samples between the
/// last two coarse candles.
async fn interpolate_coarse<S>(source: &S, symbol: &str, points: usize) -> Option<RawSeries>
where
    S: KlineSource,
{
    let coarse = match source.klines(symbol, COARSE_INTERVAL, 2, None).await {
        Ok(batch) => batch,
        Err(e) => {
            warn!("{symbol} {COARSE_INTERVAL} fallback fetch failed | {e}");
            return None;
        }
    };
    if coarse.len() < 2 {
        return None;
    }

    let prev = &coarse[coarse.len() - 2];
    let last = &coarse[coarse.len() - 1];
    debug!("{symbol}: 1s history too sparse; interpolating {points} points from {COARSE_INTERVAL}");

    Some(RawSeries {
        times: linspace(prev.open_secs(), last.open_secs(), points),
        prices: linspace(prev.close, last.close, points),
        padded: 0,
    })
}

/// Correct one symbol's prices to the axis length: materialize its cache
/// padding, then truncate to the most recent `target` entries or left-pad
/// with its own first price.
fn fit_length(raw: &RawSeries, target: usize) -> Vec<f64> {
    let first = raw.prices.first().copied().unwrap_or(0.0);

    let mut prices = Vec::with_capacity(raw.padded + raw.prices.len());
    prices.extend(std::iter::repeat(first).take(raw.padded));
    prices.extend_from_slice(&raw.prices);

    if prices.len() > target {
        prices.drain(..prices.len() - target);
    } else if prices.len() < target {
        let mut fitted = Vec::with_capacity(target);
        fitted.extend(std::iter::repeat(first).take(target - prices.len()));
        fitted.append(&mut prices);
        prices = fitted;
    }
    prices
}

/// The cached snapshot viewed through the configured symbol list; symbols
/// the cache never saw come back empty.
fn from_snapshot(cache: &Snapshot, symbols: &[String]) -> LiveSeries {
    LiveSeries {
        time: cache.time.clone(),
        series: symbols
            .iter()
            .map(|s| (s.clone(), cache.get(s).map(<[f64]>::to_vec).unwrap_or_default()))
            .collect(),
    }
}
