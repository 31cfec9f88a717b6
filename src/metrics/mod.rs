//! Metrics and monitoring for the pairwise-lobby service
//!
//! This module provides Prometheus metrics collection and the HTTP server
//! exposing health probes and metrics.

pub mod collector;
pub mod health;

pub use collector::{MetricsCollector, PairingMetrics, ServiceMetrics};
pub use health::{HealthServer, HealthServerConfig};
