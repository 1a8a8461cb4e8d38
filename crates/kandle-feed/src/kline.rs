use serde::de::{self, Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::Deserialize;

////////////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Deserialization of the exchange's kline rows
//
// Each row is an array mixing integers and stringified decimals:
//
// [
//      open_time,          // ms timestamp (int)
//      open,               // "0.01634790"
//      high,               // "0.80000000"
//      low,                // "0.01575800"
//      close,              // "0.01577100"
//      volume,             // "148976.11427815"
//      close_time,         // ms timestamp (int)     \
//      quote_volume,       //                         | ignored
//      trades,             //                         |
//      ...                 //                        /
// ]
//
////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A single candle as returned by the kline endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    /// Candle open time, epoch milliseconds.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Kline {
    /// Open time in epoch seconds, the unit the chart axis works in.
    pub fn open_secs(&self) -> f64 {
        self.open_time as f64 / 1000.0
    }
}

impl<'de> Deserialize<'de> for Kline {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(KlineVisitor)
    }
}

struct KlineVisitor;

impl<'de> Visitor<'de> for KlineVisitor {
    type Value = Kline;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a kline array of [open_time, open, high, low, close, volume, ..]")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let open_time: i64 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let open = next_f64(&mut seq, 1, &self)?;
        let high = next_f64(&mut seq, 2, &self)?;
        let low = next_f64(&mut seq, 3, &self)?;
        let close = next_f64(&mut seq, 4, &self)?;
        let volume = next_f64(&mut seq, 5, &self)?;

        // drain the trailing fields the endpoint appends (close time,
        // quote volume, trade count, taker volumes, ..)
        while seq.next_element::<IgnoredAny>()?.is_some() {}

        Ok(Kline {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Prices arrive as strings ("16578.50") but the occasional mirror serves
/// plain numbers; accept both, as with any numeric field of uncertain type.
fn next_f64<'de, A>(seq: &mut A, index: usize, exp: &KlineVisitor) -> Result<f64, A::Error>
where
    A: SeqAccess<'de>,
{
    let value: serde_json::Value = seq
        .next_element()?
        .ok_or_else(|| de::Error::invalid_length(index, exp))?;

    match value {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("unparseable decimal string: {s:?}"))),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom("numeric field out of f64 range")),
        other => Err(de::Error::custom(format!(
            "expected decimal string or number, found {other}"
        ))),
    }
}
