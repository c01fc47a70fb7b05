use std::collections::BTreeSet;

use chrono::{Duration, Local, NaiveDate};
use tracing::{error, info};

use crate::{
    api::InsightsApi,
    error::ApiResult,
    schema::{DateRange, MetricsFilter, MetricsResponse, Source},
};

/// Series colors, assigned to categories in first-seen order and reused
/// once exhausted.
pub const CHART_PALETTE: [&str; 7] = [
    "#2563EB", "#10B981", "#F59E0B", "#8B5CF6", "#EC4899", "#06B6D4", "#F97316",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePreset {
    Last7Days,
    Last30Days,
}

impl DatePreset {
    pub fn days(&self) -> i64 {
        match self {
            DatePreset::Last7Days => 7,
            DatePreset::Last30Days => 30,
        }
    }

    pub fn range_ending(&self, today: NaiveDate) -> DateRange {
        DateRange::new(today - Duration::days(self.days()), today)
    }
}

fn default_range() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid calendar date"),
        NaiveDate::from_ymd_opt(2025, 1, 30).expect("valid calendar date"),
    )
}

/// Filter controls of the reports view. Every control is independent; the
/// filter is only assembled when [`filters`](Self::filters) is called.
#[derive(Debug, Clone)]
pub struct FilterPanel {
    available: Vec<String>,
    selected: BTreeSet<String>,
    source: Source,
    date_range: DateRange,
}

impl Default for FilterPanel {
    fn default() -> Self {
        Self {
            available: Vec::new(),
            selected: BTreeSet::new(),
            source: Source::Any,
            date_range: default_range(),
        }
    }
}

impl FilterPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the category picker from the backend. On failure the current
    /// list stays as it is.
    pub async fn load_categories<A: InsightsApi + ?Sized>(&mut self, api: &A) {
        match api.list_categories().await {
            Ok(categories) => self.available = categories,
            Err(err) => error!("Error fetching categories: {err}"),
        }
    }

    pub fn available_categories(&self) -> &[String] {
        &self.available
    }

    pub fn selected_categories(&self) -> &BTreeSet<String> {
        &self.selected
    }

    pub fn set_categories<I, S>(&mut self, categories: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected = categories.into_iter().map(Into::into).collect();
    }

    /// Returns whether the category is selected afterwards.
    pub fn toggle_category(&mut self, category: &str) -> bool {
        if self.selected.remove(category) {
            false
        } else {
            self.selected.insert(category.to_string());
            true
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn set_source(&mut self, source: Source) {
        self.source = source;
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn set_date_range(&mut self, range: DateRange) {
        self.date_range = range;
    }

    /// Apply a preset relative to the local date at the moment of the call.
    pub fn apply_preset(&mut self, preset: DatePreset) {
        self.apply_preset_on(preset, Local::now().date_naive());
    }

    pub fn apply_preset_on(&mut self, preset: DatePreset, today: NaiveDate) {
        self.date_range = preset.range_ending(today);
    }

    pub fn filters(&self) -> MetricsFilter {
        MetricsFilter {
            categories: self.selected.clone(),
            source: self.source,
            date_range: self.date_range,
        }
    }
}

/// Metrics shown by the reports view. A failed fetch drops back to the zero
/// baseline instead of keeping the previous figures.
#[derive(Debug, Default)]
pub struct ReportsPanel {
    loading: bool,
    metrics: MetricsResponse,
}

impl ReportsPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn metrics(&self) -> &MetricsResponse {
        &self.metrics
    }

    pub fn begin(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        true
    }

    pub fn finish(&mut self, result: ApiResult<MetricsResponse>) {
        self.loading = false;
        match result {
            Ok(metrics) => self.metrics = metrics,
            Err(err) => {
                error!("Error fetching metrics: {err}");
                self.metrics = MetricsResponse::default();
            }
        }
    }

    /// Returns whether a request was issued.
    pub async fn run<A: InsightsApi + ?Sized>(&mut self, api: &A, filter: &MetricsFilter) -> bool {
        if !self.begin() {
            return false;
        }

        info!(
            categories = filter.categories.len(),
            source = ?filter.source,
            start = %filter.date_range.start_param(),
            end = %filter.date_range.end_param(),
            "Fetching metrics"
        );
        let result = api.fetch_metrics(filter).await;
        self.finish(result);
        true
    }
}

/// One stacked-bar row; `values` line up with `MetricsResponse::category_names`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackedRow {
    pub date: String,
    pub values: Vec<u64>,
}

impl MetricsResponse {
    pub fn daily_series(&self) -> Vec<(&str, u64)> {
        self.daily_counts
            .iter()
            .map(|day| (day.date.as_str(), day.count))
            .collect()
    }

    /// Every category seen in the daily breakdown, in first-seen order.
    pub fn category_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for day in &self.daily_counts {
            for name in day.categories.iter().flat_map(|c| c.keys()) {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    pub fn stacked_rows(&self) -> Vec<StackedRow> {
        let names = self.category_names();
        self.daily_counts
            .iter()
            .map(|day| StackedRow {
                date: day.date.clone(),
                values: names
                    .iter()
                    .map(|name| {
                        day.categories
                            .as_ref()
                            .and_then(|c| c.get(name))
                            .copied()
                            .unwrap_or(0)
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn category_colors(&self) -> Vec<(String, &'static str)> {
        self.category_names()
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, CHART_PALETTE[i % CHART_PALETTE.len()]))
            .collect()
    }
}

/// Thousands-separated count for the summary cards.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
