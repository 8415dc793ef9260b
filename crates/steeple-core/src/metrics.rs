//! Usage and cost aggregation over time-bucketed samples.
//!
//! The aggregator is stateless per call: it pulls raw samples from a
//! [`UsageSource`], tiles them into the bucket plan for the requested
//! window, and derives summary scalars, trends, and the cost breakdown.
//! Forecasting is a pluggable [`ForecastStrategy`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::timerange::{custom_buckets, Bucket, TimeRange, Window};

/// Failure reading from the underlying sample source.
#[derive(Debug, Error)]
#[error("usage source error: {0}")]
pub struct SourceError(pub String);

/// One raw observation emitted by the telemetry collaborator.
///
/// Immutable once recorded; the aggregator only ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub proxy_id: String,
    pub church_branch_id: String,
    pub region: String,
    pub category: String,
    pub recorded_at: DateTime<Utc>,
    pub streams: i64,
    pub completed_streams: i64,
    pub viewers: i64,
    pub bandwidth_gb: f64,
    pub cost: f64,
    pub errors: i64,
}

/// Filters applied to the sample source before bucketing.
///
/// They reduce the cardinality of the source; bucket boundaries are never
/// affected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleFilter {
    pub proxy_id: Option<String>,
    pub church_branch_id: Option<String>,
    pub region: Option<String>,
    pub category: Option<String>,
}

/// Capability interface over the session/usage store.
///
/// Production backs this with a time-series query; tests substitute a fixed
/// fixture.
pub trait UsageSource {
    /// All samples with `start <= recorded_at < end` matching the filter.
    fn sample_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &SampleFilter,
    ) -> Result<Vec<RawSample>, SourceError>;
}

/// Which report shape the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportView {
    Detailed,
    Usage,
    Cost,
}

/// How the aggregation window was specified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeSpec {
    Token(TimeRange),
    Custom(Window),
}

impl RangeSpec {
    /// Resolve the concrete window.
    pub fn window(&self, now: DateTime<Utc>) -> Window {
        match self {
            RangeSpec::Token(range) => range.window(now),
            RangeSpec::Custom(window) => *window,
        }
    }

    fn buckets(&self, now: DateTime<Utc>, view: ReportView) -> Vec<Bucket> {
        match self {
            RangeSpec::Token(range) if view == ReportView::Cost => range.cost_buckets(now),
            RangeSpec::Token(range) => range.buckets(now),
            RangeSpec::Custom(window) => custom_buckets(window),
        }
    }
}

/// A validated analytics query.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsQuery {
    pub range: RangeSpec,
    pub category: Option<String>,
    pub region: Option<String>,
    pub church_branch_id: Option<String>,
    pub forecasting: bool,
}

impl MetricsQuery {
    /// Query for a plain relative range with no filters.
    pub fn for_range(range: TimeRange) -> Self {
        Self {
            range: RangeSpec::Token(range),
            category: None,
            region: None,
            church_branch_id: None,
            forecasting: false,
        }
    }

    fn sample_filter(&self) -> SampleFilter {
        SampleFilter {
            proxy_id: None,
            church_branch_id: self.church_branch_id.clone(),
            region: self.region.clone(),
            category: self.category.clone(),
        }
    }
}

/// One point of the bucketed trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub bucket_start: DateTime<Utc>,
    pub streams: i64,
    pub viewers: i64,
    pub bandwidth_gb: f64,
    pub cost: f64,
    /// Errors over streams for the bucket, 0 when the bucket saw no streams.
    pub error_rate: f64,
}

/// Stream performance scalars for the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_streams: i64,
    pub completed_streams: i64,
    pub failed_streams: i64,
    /// `completed / total`, 0 for an empty window.
    pub success_rate: f64,
    pub average_viewers: f64,
    pub peak_viewers: i64,
    pub average_error_rate: f64,
}

/// Bandwidth/viewer usage scalars for the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub total_viewers: i64,
    pub total_bandwidth_gb: f64,
    pub average_bucket_bandwidth_gb: f64,
    pub peak_bucket_bandwidth_gb: f64,
    pub bandwidth_per_stream_gb: f64,
}

/// Cost scalars for the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    /// Total cost inside the queried window.
    pub current_period: f64,
    /// Total cost of the immediately preceding window of equal length.
    pub previous_period: f64,
    /// Window total; equals `current_period` for relative ranges.
    pub year_to_date: f64,
    pub cost_per_stream: f64,
    pub cost_per_gb: f64,
    /// Always present; zeroed when forecasting was not requested.
    pub forecast: CostForecast,
}

/// Direction of a cost category relative to the previous period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// A named slice of the window's total cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdownEntry {
    pub category: String,
    pub amount: f64,
    /// Share of the window total, in percent; 0 when the total is 0.
    pub percentage: f64,
    pub trend: TrendDirection,
    /// Percent change versus the previous period; 0 without a baseline.
    pub trend_pct: f64,
}

/// Projection block attached to every cost summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostForecast {
    pub enabled: bool,
    pub projected_next_period: f64,
    pub growth_factor: f64,
    pub confidence: f64,
    pub factors: Vec<String>,
}

impl CostForecast {
    /// The zeroed block returned when forecasting was not requested.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            projected_next_period: 0.0,
            growth_factor: 0.0,
            confidence: 0.0,
            factors: Vec::new(),
        }
    }
}

/// The full aggregation result.
///
/// `breakdown` and `recommendations` are populated for the cost view and
/// empty otherwise; the forecast block is always present inside `costs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub window: Window,
    pub performance: PerformanceSummary,
    pub usage: UsageSummary,
    pub costs: CostSummary,
    pub trends: Vec<TrendPoint>,
    pub breakdown: Vec<CostBreakdownEntry>,
    pub recommendations: Vec<String>,
}

/// Fixed category weights used to partition the window's total cost.
#[derive(Debug, Clone)]
pub struct CostModel {
    pub weights: Vec<(String, f64)>,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            weights: vec![
                ("infrastructure".to_string(), 0.45),
                ("bandwidth".to_string(), 0.30),
                ("storage".to_string(), 0.15),
                ("support".to_string(), 0.10),
            ],
        }
    }
}

/// Strategy hook for cost projection.
pub trait ForecastStrategy: Send + Sync {
    fn forecast(&self, current_period: f64, trends: &[TrendPoint]) -> CostForecast;
}

/// Default strategy: multiplicative extrapolation of the window.
///
/// The growth factor is the cost of the second half of the window over the
/// first half, clamped to `[min_factor, max_factor]`.
#[derive(Debug, Clone)]
pub struct GrowthForecast {
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for GrowthForecast {
    fn default() -> Self {
        Self {
            min_factor: 0.5,
            max_factor: 2.0,
        }
    }
}

impl ForecastStrategy for GrowthForecast {
    fn forecast(&self, current_period: f64, trends: &[TrendPoint]) -> CostForecast {
        let mid = trends.len() / 2;
        let first: f64 = trends[..mid].iter().map(|t| t.cost).sum();
        let second: f64 = trends[mid..].iter().map(|t| t.cost).sum();

        let growth_factor = if first > f64::EPSILON {
            (second / first).clamp(self.min_factor, self.max_factor)
        } else {
            1.0
        };
        let confidence = if trends.len() >= 4 { 0.7 } else { 0.3 };

        CostForecast {
            enabled: true,
            projected_next_period: current_period * growth_factor,
            growth_factor,
            confidence,
            factors: vec![
                "observed cost trajectory over the window".to_string(),
                "bandwidth volume trend".to_string(),
                "assumes fleet size unchanged".to_string(),
            ],
        }
    }
}

/// Computes metrics reports from a [`UsageSource`].
pub struct MetricsAggregator {
    cost_model: CostModel,
    forecast: Box<dyn ForecastStrategy>,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            cost_model: CostModel::default(),
            forecast: Box::new(GrowthForecast::default()),
        }
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn with_forecast(mut self, forecast: Box<dyn ForecastStrategy>) -> Self {
        self.forecast = forecast;
        self
    }

    /// Aggregate the window described by `query` into a [`MetricsReport`].
    pub fn aggregate(
        &self,
        source: &dyn UsageSource,
        query: &MetricsQuery,
        view: ReportView,
        now: DateTime<Utc>,
    ) -> Result<MetricsReport, SourceError> {
        let window = query.range.window(now);
        let buckets = query.range.buckets(now, view);
        let filter = query.sample_filter();

        let samples = source.sample_window(window.start, window.end, &filter)?;
        debug!(
            samples = samples.len(),
            buckets = buckets.len(),
            "aggregating usage window"
        );

        let trends = bucketize(&buckets, &samples);
        let performance = summarize_performance(&samples, &trends);
        let usage = summarize_usage(&samples, &trends, performance.total_streams);

        let previous = window.previous();
        let previous_samples = source.sample_window(previous.start, previous.end, &filter)?;
        let previous_cost: f64 = previous_samples.iter().map(|s| s.cost).sum();
        let current_cost: f64 = samples.iter().map(|s| s.cost).sum();

        let forecast = if query.forecasting {
            self.forecast.forecast(current_cost, &trends)
        } else {
            CostForecast::disabled()
        };

        let costs = CostSummary {
            current_period: current_cost,
            previous_period: previous_cost,
            year_to_date: current_cost,
            cost_per_stream: ratio(current_cost, performance.total_streams as f64),
            cost_per_gb: ratio(current_cost, usage.total_bandwidth_gb),
            forecast,
        };

        let (breakdown, recommendations) = if view == ReportView::Cost {
            let breakdown = self.breakdown(current_cost, previous_cost);
            let recommendations = recommend(&performance, &costs);
            (breakdown, recommendations)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(MetricsReport {
            window,
            performance,
            usage,
            costs,
            trends,
            breakdown,
            recommendations,
        })
    }

    /// Per-bucket bandwidth series for a single proxy.
    pub fn bandwidth_series(
        &self,
        source: &dyn UsageSource,
        proxy_id: &str,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrendPoint>, SourceError> {
        let window = range.window(now);
        let filter = SampleFilter {
            proxy_id: Some(proxy_id.to_string()),
            ..Default::default()
        };
        let samples = source.sample_window(window.start, window.end, &filter)?;
        Ok(bucketize(&range.buckets(now), &samples))
    }

    fn breakdown(&self, current: f64, previous: f64) -> Vec<CostBreakdownEntry> {
        self.cost_model
            .weights
            .iter()
            .map(|(category, weight)| {
                let amount = current * weight;
                let previous_amount = previous * weight;
                let (trend, trend_pct) = if previous_amount > f64::EPSILON {
                    let change = (amount - previous_amount) / previous_amount * 100.0;
                    let direction = if change > 2.0 {
                        TrendDirection::Up
                    } else if change < -2.0 {
                        TrendDirection::Down
                    } else {
                        TrendDirection::Stable
                    };
                    (direction, change)
                } else {
                    (TrendDirection::Stable, 0.0)
                };

                CostBreakdownEntry {
                    category: category.clone(),
                    amount,
                    percentage: if current > f64::EPSILON {
                        weight * 100.0
                    } else {
                        0.0
                    },
                    trend,
                    trend_pct,
                }
            })
            .collect()
    }
}

fn bucketize(buckets: &[Bucket], samples: &[RawSample]) -> Vec<TrendPoint> {
    buckets
        .iter()
        .map(|bucket| {
            let mut streams = 0;
            let mut viewers = 0;
            let mut bandwidth_gb = 0.0;
            let mut cost = 0.0;
            let mut errors = 0;
            for sample in samples.iter().filter(|s| bucket.contains(s.recorded_at)) {
                streams += sample.streams;
                viewers += sample.viewers;
                bandwidth_gb += sample.bandwidth_gb;
                cost += sample.cost;
                errors += sample.errors;
            }
            TrendPoint {
                bucket_start: bucket.start,
                streams,
                viewers,
                bandwidth_gb,
                cost,
                error_rate: ratio(errors as f64, streams as f64),
            }
        })
        .collect()
}

fn summarize_performance(samples: &[RawSample], trends: &[TrendPoint]) -> PerformanceSummary {
    let total_streams: i64 = samples.iter().map(|s| s.streams).sum();
    let completed_streams: i64 = samples.iter().map(|s| s.completed_streams).sum();
    let total_errors: i64 = samples.iter().map(|s| s.errors).sum();
    let total_viewers: i64 = samples.iter().map(|s| s.viewers).sum();

    PerformanceSummary {
        total_streams,
        completed_streams,
        failed_streams: (total_streams - completed_streams).max(0),
        success_rate: ratio(completed_streams as f64, total_streams as f64),
        average_viewers: ratio(total_viewers as f64, trends.len() as f64),
        peak_viewers: trends.iter().map(|t| t.viewers).max().unwrap_or(0),
        average_error_rate: ratio(total_errors as f64, total_streams as f64),
    }
}

fn summarize_usage(samples: &[RawSample], trends: &[TrendPoint], total_streams: i64) -> UsageSummary {
    let total_viewers: i64 = samples.iter().map(|s| s.viewers).sum();
    let total_bandwidth_gb: f64 = samples.iter().map(|s| s.bandwidth_gb).sum();

    UsageSummary {
        total_viewers,
        total_bandwidth_gb,
        average_bucket_bandwidth_gb: ratio(total_bandwidth_gb, trends.len() as f64),
        peak_bucket_bandwidth_gb: trends.iter().map(|t| t.bandwidth_gb).fold(0.0, f64::max),
        bandwidth_per_stream_gb: ratio(total_bandwidth_gb, total_streams as f64),
    }
}

fn recommend(performance: &PerformanceSummary, costs: &CostSummary) -> Vec<String> {
    let mut out = Vec::new();

    if costs.previous_period > f64::EPSILON && costs.current_period > costs.previous_period * 1.1 {
        let growth = (costs.current_period / costs.previous_period - 1.0) * 100.0;
        out.push(format!(
            "Costs grew {growth:.0}% over the previous period; review relay fleet sizing"
        ));
    }
    if performance.total_streams > 0 && performance.success_rate < 0.9 {
        out.push(
            "Stream success rate is below 90%; investigate unhealthy relays before scaling"
                .to_string(),
        );
    }
    if costs.cost_per_stream > 25.0 {
        out.push("Per-stream cost is high; consider consolidating onto fewer relays".to_string());
    }
    if out.is_empty() {
        out.push("No cost anomalies detected for this window".to_string());
    }
    out
}

/// `numerator / denominator` with 0/0 treated as 0.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator.abs() > f64::EPSILON {
        numerator / denominator
    } else {
        0.0
    }
}
