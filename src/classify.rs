use std::cmp::Ordering;

use tracing::{error, info};

use crate::{
    api::InsightsApi,
    error::ApiResult,
    schema::{ClassifyRequest, ClassifyResponse},
};

/// One row of the probability breakdown, already scaled to percent.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCategory {
    pub category: String,
    pub percent: f64,
}

/// One decimal place, no sign: `0.7 * 100.0` renders as `70.0`.
pub fn format_percent(percent: f64) -> String {
    format!("{percent:.1}")
}

/// Badge class for a predicted category. Unknown categories get the
/// `Other` gray.
pub fn category_color(category: &str) -> &'static str {
    match category {
        "Account" => "bg-blue-500",
        "Deposit" => "bg-green-500",
        "Withdrawal" => "bg-amber-500",
        "Technical" => "bg-purple-500",
        "Security" => "bg-red-500",
        "Compliance" => "bg-indigo-500",
        _ => "bg-gray-500",
    }
}

impl ClassifyResponse {
    /// Probabilities ordered from most to least likely. Ties fall back to
    /// category name so the order is stable.
    pub fn ranked_probabilities(&self) -> Vec<RankedCategory> {
        let Some(probabilities) = &self.probabilities else {
            return Vec::new();
        };

        let mut ranked: Vec<RankedCategory> = probabilities
            .iter()
            .map(|(category, p)| RankedCategory {
                category: category.clone(),
                percent: p * 100.0,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.percent
                .partial_cmp(&a.percent)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.category.cmp(&b.category))
        });
        ranked
    }

    pub fn confidence_label(&self) -> Option<String> {
        self.confidence
            .map(|c| format!("Confidence: {}%", format_percent(c * 100.0)))
    }

    pub fn badge_color(&self) -> &'static str {
        category_color(&self.category)
    }

    /// Pretty JSON of the result, as offered by the copy action.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Single-message classifier panel. A failed request keeps whatever result
/// was shown before it.
#[derive(Debug, Default)]
pub struct ClassifyForm {
    input: String,
    loading: bool,
    result: Option<ClassifyResponse>,
}

impl ClassifyForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn result(&self) -> Option<&ClassifyResponse> {
        self.result.as_ref()
    }

    pub fn can_submit(&self) -> bool {
        !self.loading && !self.input.trim().is_empty()
    }

    pub fn begin(&mut self) -> Option<ClassifyRequest> {
        if !self.can_submit() {
            return None;
        }
        self.loading = true;
        Some(ClassifyRequest { message: self.input.clone() })
    }

    pub fn finish(&mut self, result: ApiResult<ClassifyResponse>) {
        self.loading = false;
        match result {
            Ok(response) => self.result = Some(response),
            Err(err) => error!("Classification error: {err}"),
        }
    }

    /// Returns whether a request was issued.
    pub async fn submit<A: InsightsApi + ?Sized>(&mut self, api: &A) -> bool {
        let Some(request) = self.begin() else {
            return false;
        };

        info!(len = request.message.len(), "Classifying message");
        let result = api.classify(&request).await;
        self.finish(result);
        true
    }
}
