use chrono::{Local, TimeZone, Utc};

/// `n` evenly spaced values from `start` to `end`, both ends included.
/// Used to synthesize a smooth series between two coarse candles when the
/// fine-grained history is too sparse to chart.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Percentage change of each price relative to the first:
/// `100 * (p - p[0]) / p[0]`.
///
/// A first price of exactly zero passes the raw values through unchanged
/// rather than dividing by it; absent symbols arrive here as all zeros.
pub fn percent_change(prices: &[f64]) -> Vec<f64> {
    match prices.first() {
        None => Vec::new(),
        Some(&first) if first == 0.0 => prices.to_vec(),
        Some(&first) => prices
            .iter()
            .map(|p| 100.0 * (p - first) / first)
            .collect(),
    }
}

/// Wall-clock label for a chart tick: epoch seconds to local `HH:MM:SS`.
/// Sub-second precision (interpolated points) truncates.
pub fn time_label(epoch_secs: f64) -> String {
    let secs = epoch_secs as i64;
    match Local.timestamp_opt(secs, 0).single() {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        // ambiguous local time (DST fold); fall back to UTC
        None => Utc
            .timestamp_opt(secs, 0)
            .single()
            .map(|dt| dt.format("%H:%M:%S").to_string())
            .unwrap_or_default(),
    }
}
