/// Look-back windows selectable from the chart page.
///
/// Each variant carries its sampling interval, target point count, and
/// padding policy as data, so the rest of the pipeline never re-inspects
/// the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    /// Last 60 seconds at 1s candles; under-delivery is padded from the
    /// fallback cache to keep the chart window visually full.
    ShortLive,
    /// Last 30 minutes at 1s candles; never padded.
    MediumLive,
    /// Last 3 hours at 1s candles; never padded.
    LongLive,
}

impl Range {
    /// Parse the `range` query parameter. Unknown values fall back to the
    /// short window, matching the chart page's default selection.
    pub fn parse(s: &str) -> Self {
        match s {
            "30m" => Self::MediumLive,
            "3h" => Self::LongLive,
            _ => Self::ShortLive,
        }
    }

    /// Candle interval requested from the exchange.
    pub const fn interval(self) -> &'static str {
        "1s"
    }

    /// Number of points a fully-delivered series holds.
    pub const fn points(self) -> usize {
        match self {
            Self::ShortLive => 60,
            Self::MediumLive => 1800,
            Self::LongLive => 10800,
        }
    }

    /// Whether an under-delivered series may borrow its missing prefix from
    /// the fallback cache. Only the short window does; the longer windows
    /// prefer truthful sparsity over stale smoothness.
    pub const fn pads_from_cache(self) -> bool {
        matches!(self, Self::ShortLive)
    }

    /// The query-string form, as the chart page sends it.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShortLive => "60s",
            Self::MediumLive => "30m",
            Self::LongLive => "3h",
        }
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_ranges() {
        assert_eq!(Range::parse("60s"), Range::ShortLive);
        assert_eq!(Range::parse("30m"), Range::MediumLive);
        assert_eq!(Range::parse("3h"), Range::LongLive);
    }

    #[test]
    fn parse_unknown_falls_back_to_short() {
        assert_eq!(Range::parse(""), Range::ShortLive);
        assert_eq!(Range::parse("1d"), Range::ShortLive);
        assert_eq!(Range::parse("nonsense"), Range::ShortLive);
    }

    #[test]
    fn points_match_window_lengths() {
        assert_eq!(Range::ShortLive.points(), 60);
        assert_eq!(Range::MediumLive.points(), 30 * 60);
        assert_eq!(Range::LongLive.points(), 3 * 60 * 60);
    }

    #[test]
    fn only_short_pads() {
        assert!(Range::ShortLive.pads_from_cache());
        assert!(!Range::MediumLive.pads_from_cache());
        assert!(!Range::LongLive.pads_from_cache());
    }
}
