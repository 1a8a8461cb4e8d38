use crate::kline::Kline;
use crate::source::KlineSource;
use tracing::{trace, warn};

/// Largest page the kline endpoint serves in one call.
pub const PAGE_LIMIT: usize = 1000;

/// Safety bound on accumulation: never hold more than 10 full pages.
const MAX_KLINES: usize = PAGE_LIMIT * 10;

/// Collect up to `total` candles by walking pages backward in time.
///
/// The first page asks for the most recent candles; each following page is
/// bounded by the previous page's earliest `open_time` minus one tick. The
/// walk stops once `total` candles are held, a page comes back short or
/// empty (exhausted history), or a page fails mid-walk; whatever was
/// accumulated so far is returned in ascending order.
pub async fn collect_klines<S>(
    source: &S,
    symbol: &str,
    interval: &str,
    total: usize,
) -> Vec<Kline>
where
    S: KlineSource + ?Sized,
{
    let mut klines: Vec<Kline> = Vec::new();
    let mut remaining = total;
    let mut end_time: Option<i64> = None;

    while remaining > 0 {
        let page_size = remaining.min(PAGE_LIMIT);

        let batch = match source.klines(symbol, interval, page_size, end_time).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(
                    "{symbol} {interval} page failed after {} candles | {e}",
                    klines.len()
                );
                break;
            }
        };

        if batch.is_empty() {
            break;
        }

        let short_page = batch.len() < page_size;
        end_time = Some(batch[0].open_time - 1);
        remaining = remaining.saturating_sub(batch.len());

        // prepend: pages arrive newest-window-first, candles ascend within
        let mut merged = batch;
        merged.append(&mut klines);
        klines = merged;

        trace!(
            "{symbol} {interval}: {} candles accumulated, {remaining} remaining",
            klines.len()
        );

        if short_page {
            break;
        }
    }

    if klines.len() > MAX_KLINES {
        klines.drain(..klines.len() - MAX_KLINES);
    }

    klines
}
