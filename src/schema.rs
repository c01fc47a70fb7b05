use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Wire format for every date exchanged with the backend.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    pub message: String,
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurnResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Any,
    LiveChat,
    Telegram,
}

impl Source {
    /// Value sent as the `source` query parameter; `Any` means no filter at all.
    pub fn as_query(&self) -> Option<&'static str> {
        match self {
            Source::Any => None,
            Source::LiveChat => Some("livechat"),
            Source::Telegram => Some("telegram"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Source::Any => "Any",
            Source::LiveChat => "LiveChat",
            Source::Telegram => "Telegram",
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Source::Any),
            "livechat" => Ok(Source::LiveChat),
            "telegram" => Ok(Source::Telegram),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn start_param(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsFilter {
    pub categories: BTreeSet<String>,
    pub source: Source,
    pub date_range: DateRange,
}

impl MetricsFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);

        if !self.categories.is_empty() {
            let joined = self.categories.iter().map(String::as_str).collect::<Vec<_>>().join(",");
            pairs.push(("category", joined));
        }

        if let Some(source) = self.source.as_query() {
            pairs.push(("source", source.to_string()));
        }

        pairs.push(("start", self.date_range.start_param()));
        pairs.push(("end", self.date_range.end_param()));
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpikeAlert {
    pub date: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: String,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeMap<String, u64>>,
}

/// Aggregate report data. `Default` is the zero baseline shown before any
/// data arrives and after a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricsResponse {
    #[serde(default)]
    pub total_messages: u64,
    #[serde(default)]
    pub unique_users: u64,
    #[serde(default)]
    pub spike_alerts: Vec<SpikeAlert>,
    #[serde(default)]
    pub daily_counts: Vec<DailyCount>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        )
    }

    #[test]
    fn chat_request_serializes_lowercase_roles() {
        let req = ChatTurnRequest {
            message: "and withdrawals?".into(),
            history: vec![ChatMessage::user("deposits?"), ChatMessage::assistant("fine")],
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "message": "and withdrawals?",
                "history": [
                    {"role": "user", "content": "deposits?"},
                    {"role": "assistant", "content": "fine"}
                ]
            })
        );
    }

    #[test]
    fn chat_response_context_is_optional() {
        let resp: ChatTurnResponse = serde_json::from_str(r#"{"response":"hi"}"#).unwrap();
        assert_eq!(resp.context, None);
    }

    #[test]
    fn any_source_is_omitted_from_query() {
        let filter = MetricsFilter {
            categories: BTreeSet::new(),
            source: Source::Any,
            date_range: range(),
        };
        let pairs = filter.query_pairs();
        assert!(pairs.iter().all(|(k, _)| *k != "source" && *k != "category"));
        assert!(pairs.contains(&("start", "2024-03-01".to_string())));
        assert!(pairs.contains(&("end", "2024-03-09".to_string())));
    }

    #[test]
    fn categories_are_comma_joined() {
        let filter = MetricsFilter {
            categories: ["Deposit", "Account"].into_iter().map(String::from).collect(),
            source: Source::LiveChat,
            date_range: range(),
        };
        let pairs = filter.query_pairs();
        assert!(pairs.contains(&("category", "Account,Deposit".to_string())));
        assert!(pairs.contains(&("source", "livechat".to_string())));
    }

    #[test]
    fn metrics_response_tolerates_missing_arrays() {
        let resp: MetricsResponse =
            serde_json::from_str(r#"{"total_messages":4,"unique_users":2}"#).unwrap();
        assert_eq!(resp.total_messages, 4);
        assert!(resp.spike_alerts.is_empty());
        assert!(resp.daily_counts.is_empty());
    }

    #[test]
    fn source_parses_case_insensitively() {
        assert_eq!("LiveChat".parse::<Source>(), Ok(Source::LiveChat));
        assert!("discord".parse::<Source>().is_err());
    }
}
