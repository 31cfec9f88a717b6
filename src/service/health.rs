//! Health checks for the matchmaking service
//!
//! This module provides health check functionality for the pairwise-lobby
//! service, including readiness and liveness probes.

use crate::service::app::{MatchmakingService, ServiceStats};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Numeric form used by the health status gauge
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
    /// Seconds since the service started
    pub uptime_seconds: u64,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
}

impl HealthCheck {
    /// Perform a full health check of the service
    pub fn check(service: &MatchmakingService) -> Result<Self> {
        let service_check = Self::check_service_running(service);
        let stats_check = Self::check_stats(service);

        let status = [&service_check, &stats_check]
            .iter()
            .map(|check| check.status)
            .fold(HealthStatus::Healthy, |overall, status| {
                match (overall, status) {
                    (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => {
                        HealthStatus::Unhealthy
                    }
                    (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => {
                        HealthStatus::Degraded
                    }
                    _ => HealthStatus::Healthy,
                }
            });

        Ok(HealthCheck {
            status,
            service: service.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks: vec![service_check, stats_check],
            stats: service.get_stats().unwrap_or_default(),
            uptime_seconds: service.uptime().as_secs(),
        })
    }

    /// Simple liveness check - just verify service is running
    pub fn liveness_check(service: &MatchmakingService) -> HealthStatus {
        if service.is_running() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    /// Readiness check - verify service can handle requests
    pub fn readiness_check(service: &MatchmakingService) -> HealthStatus {
        if !service.is_running() {
            return HealthStatus::Unhealthy;
        }
        Self::check_stats(service).status
    }

    fn check_service_running(service: &MatchmakingService) -> ComponentCheck {
        let (status, message) = if service.is_running() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is shutting down".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
        }
    }

    fn check_stats(service: &MatchmakingService) -> ComponentCheck {
        let (status, message) = match service.get_stats() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Stats check failed: {}", e);
                (
                    HealthStatus::Degraded,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "stats".to_string(),
            status,
            message,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
