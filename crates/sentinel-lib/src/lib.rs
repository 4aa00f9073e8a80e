//! Core library for the host sentinel agent
//!
//! This crate provides the core functionality for:
//! - Host telemetry sampling from procfs
//! - Rate-of-change computation over a circular snapshot buffer
//! - Statistical pattern detection (spikes, leaks, periodicity)
//! - Rule-driven routing of prompts to LLM providers with fallback
//! - Falsifiable, time-boxed predictions validated against telemetry
//! - Health checks and observability

pub mod collector;
pub mod dashboard;
pub mod health;
pub mod llm;
pub mod models;
pub mod observability;
pub mod patterns;
pub mod predictor;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{SentinelMetrics, StructuredLogger};
