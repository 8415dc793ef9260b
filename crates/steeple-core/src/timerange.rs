//! Time-range tokens, aggregation windows, and bucket plans.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// A recognized relative time-range token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    /// `1h` - the trailing hour.
    LastHour,
    /// `24h` - the trailing day.
    LastDay,
    /// `7d` - the trailing week.
    LastWeek,
    /// `30d` - the trailing thirty days.
    LastMonth,
    /// `90d` - the trailing ninety days.
    LastQuarter,
    /// `12m` - the trailing twelve months.
    LastYear,
    /// `24m` - the trailing twenty-four months.
    LastTwoYears,
}

impl TimeRange {
    /// Parse a wire token.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "1h" => Some(TimeRange::LastHour),
            "24h" => Some(TimeRange::LastDay),
            "7d" => Some(TimeRange::LastWeek),
            "30d" => Some(TimeRange::LastMonth),
            "90d" => Some(TimeRange::LastQuarter),
            "12m" => Some(TimeRange::LastYear),
            "24m" => Some(TimeRange::LastTwoYears),
            _ => None,
        }
    }

    /// The wire token for this range.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::LastHour => "1h",
            TimeRange::LastDay => "24h",
            TimeRange::LastWeek => "7d",
            TimeRange::LastMonth => "30d",
            TimeRange::LastQuarter => "90d",
            TimeRange::LastYear => "12m",
            TimeRange::LastTwoYears => "24m",
        }
    }

    /// Resolve the half-open window `[start, now)` ending at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> Window {
        let start = match self {
            TimeRange::LastHour => now - Duration::hours(1),
            TimeRange::LastDay => now - Duration::hours(24),
            TimeRange::LastWeek => now - Duration::days(7),
            TimeRange::LastMonth => now - Duration::days(30),
            TimeRange::LastQuarter => now - Duration::days(90),
            TimeRange::LastYear => sub_months(now, 12),
            TimeRange::LastTwoYears => sub_months(now, 24),
        };
        Window { start, end: now }
    }

    /// Default bucket plan for this range.
    pub fn buckets(&self, now: DateTime<Utc>) -> Vec<Bucket> {
        let window = self.window(now);
        match self {
            TimeRange::LastHour => fixed_buckets(window.start, 12, Duration::minutes(5)),
            TimeRange::LastDay => fixed_buckets(window.start, 24, Duration::hours(1)),
            TimeRange::LastWeek => fixed_buckets(window.start, 7, Duration::days(1)),
            TimeRange::LastMonth => fixed_buckets(window.start, 30, Duration::days(1)),
            TimeRange::LastQuarter => fixed_buckets(window.start, 90, Duration::days(1)),
            TimeRange::LastYear => month_buckets(window.start, 12),
            TimeRange::LastTwoYears => month_buckets(window.start, 24),
        }
    }

    /// Cost-view bucket plan.
    ///
    /// Identical to the default plan except the week view slices into 28
    /// six-hour buckets for a finer cost curve.
    pub fn cost_buckets(&self, now: DateTime<Utc>) -> Vec<Bucket> {
        match self {
            TimeRange::LastWeek => {
                let window = self.window(now);
                fixed_buckets(window.start, 28, Duration::hours(6))
            }
            _ => self.buckets(now),
        }
    }
}

/// A half-open aggregation window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// Window length.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// The immediately preceding window of equal length.
    pub fn previous(&self) -> Window {
        Window {
            start: self.start - self.duration(),
            end: self.start,
        }
    }
}

/// One aggregation bucket `[start, end)` inside a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Bucket {
    /// True when `at` falls inside this bucket.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Bucket plan for an explicit window: daily up to 90 days, monthly beyond.
pub fn custom_buckets(window: &Window) -> Vec<Bucket> {
    let days = window.duration().num_days();
    if days < 1 {
        return vec![Bucket {
            start: window.start,
            end: window.end,
        }];
    }
    if days <= 90 {
        return clamped_buckets(window, Duration::days(1));
    }

    // Monthly buckets, last one clamped to the window end.
    let mut buckets = Vec::new();
    let mut start = window.start;
    while start < window.end {
        let next = add_months(start, 1);
        buckets.push(Bucket {
            start,
            end: next.min(window.end),
        });
        start = next;
    }
    buckets
}

fn fixed_buckets(start: DateTime<Utc>, count: usize, width: Duration) -> Vec<Bucket> {
    (0..count as i32)
        .map(|i| Bucket {
            start: start + width * i,
            end: start + width * (i + 1),
        })
        .collect()
}

fn clamped_buckets(window: &Window, width: Duration) -> Vec<Bucket> {
    let mut buckets = Vec::new();
    let mut start = window.start;
    while start < window.end {
        let end = (start + width).min(window.end);
        buckets.push(Bucket { start, end });
        start = end;
    }
    buckets
}

fn month_buckets(start: DateTime<Utc>, count: u32) -> Vec<Bucket> {
    (0..count)
        .map(|i| Bucket {
            start: add_months(start, i),
            end: add_months(start, i + 1),
        })
        .collect()
}

fn add_months(at: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    at.checked_add_months(Months::new(months))
        .unwrap_or_else(|| at + Duration::days(30 * i64::from(months)))
}

fn sub_months(at: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    at.checked_sub_months(Months::new(months))
        .unwrap_or_else(|| at - Duration::days(30 * i64::from(months)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn tokens_round_trip() {
        for token in ["1h", "24h", "7d", "30d", "90d", "12m", "24m"] {
            let range = TimeRange::parse(token).unwrap();
            assert_eq!(range.as_str(), token);
        }
        assert_eq!(TimeRange::parse("6h"), None);
    }

    #[test]
    fn bucket_counts_match_plan() {
        let now = at(2024, 3, 10, 12);
        assert_eq!(TimeRange::LastHour.buckets(now).len(), 12);
        assert_eq!(TimeRange::LastDay.buckets(now).len(), 24);
        assert_eq!(TimeRange::LastWeek.buckets(now).len(), 7);
        assert_eq!(TimeRange::LastMonth.buckets(now).len(), 30);
        assert_eq!(TimeRange::LastQuarter.buckets(now).len(), 90);
        assert_eq!(TimeRange::LastYear.buckets(now).len(), 12);
        assert_eq!(TimeRange::LastTwoYears.buckets(now).len(), 24);
    }

    #[test]
    fn cost_plan_refines_only_the_week_view() {
        let now = at(2024, 3, 10, 12);
        assert_eq!(TimeRange::LastWeek.cost_buckets(now).len(), 28);
        assert_eq!(TimeRange::LastDay.cost_buckets(now).len(), 24);
    }

    #[test]
    fn buckets_tile_the_window() {
        let now = at(2024, 3, 10, 12);
        let window = TimeRange::LastWeek.window(now);
        let buckets = TimeRange::LastWeek.buckets(now);

        assert_eq!(buckets.first().unwrap().start, window.start);
        assert_eq!(buckets.last().unwrap().end, window.end);
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn month_buckets_follow_the_calendar() {
        let now = at(2024, 3, 1, 0);
        let buckets = TimeRange::LastYear.buckets(now);
        assert_eq!(buckets[0].start, at(2023, 3, 1, 0));
        assert_eq!(buckets[0].end, at(2023, 4, 1, 0));
        assert_eq!(buckets.last().unwrap().end, now);
    }

    #[test]
    fn previous_window_abuts_the_current_one() {
        let window = Window {
            start: at(2024, 3, 3, 0),
            end: at(2024, 3, 10, 0),
        };
        let prev = window.previous();
        assert_eq!(prev.end, window.start);
        assert_eq!(prev.duration(), window.duration());
    }

    #[test]
    fn custom_buckets_daily_then_monthly() {
        let short = Window {
            start: at(2024, 3, 1, 0),
            end: at(2024, 3, 8, 0),
        };
        assert_eq!(custom_buckets(&short).len(), 7);

        let long = Window {
            start: at(2023, 1, 1, 0),
            end: at(2024, 1, 1, 0),
        };
        let buckets = custom_buckets(&long);
        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets.last().unwrap().end, long.end);
    }

    #[test]
    fn sub_day_custom_window_is_a_single_bucket() {
        let window = Window {
            start: at(2024, 3, 1, 0),
            end: at(2024, 3, 1, 5),
        };
        assert_eq!(custom_buckets(&window).len(), 1);
    }
}
