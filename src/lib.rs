//! Client for the support insights backend: chat, classification and
//! message reports, plus the panel state that drives them.

pub mod api;
pub mod chat;
pub mod classify;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod notify;
pub mod reports;
pub mod schema;
pub mod stream;

pub use api::{ApiClient, InsightsApi};
pub use error::{ApiError, ApiResult};
pub use notify::{LogNotifier, Notifier};
