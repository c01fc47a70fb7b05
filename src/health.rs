use std::time::Instant;

use tracing::{info, warn};

use crate::api::ApiClient;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub backend: ServiceHealth,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceHealth {
    pub status: String,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Diagnostic check of the backend. Unlike the panel operations it never
/// notifies the user; the result is the report.
pub async fn check_backend(api: &ApiClient) -> ServiceHealth {
    let start = Instant::now();

    match api.http().get(api.url("/health")).timeout(api.timeout()).send().await {
        Ok(response) => {
            let response_time = start.elapsed().as_millis() as u64;
            if response.status().is_success() {
                info!(response_time, "Backend healthy");
                ServiceHealth {
                    status: "healthy".to_string(),
                    message: Some("Backend reachable".to_string()),
                    response_time_ms: Some(response_time),
                }
            } else {
                warn!(status = %response.status(), "Backend unhealthy");
                ServiceHealth {
                    status: "unhealthy".to_string(),
                    message: Some(format!("Backend returned status: {}", response.status())),
                    response_time_ms: Some(response_time),
                }
            }
        }
        Err(e) => {
            warn!("Backend connection error: {e}");
            ServiceHealth {
                status: "unhealthy".to_string(),
                message: Some(format!("Backend connection error: {}", e)),
                response_time_ms: Some(start.elapsed().as_millis() as u64),
            }
        }
    }
}

pub async fn overall_health(api: &ApiClient) -> HealthStatus {
    let backend = check_backend(api).await;
    let status = if backend.is_healthy() { "healthy" } else { "degraded" };

    HealthStatus {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        backend,
    }
}
