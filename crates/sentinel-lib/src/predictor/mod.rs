//! LLM-backed prediction engine
//!
//! Produces single, structured, time-boxed predictions from detected
//! patterns and validates them against real telemetry once their horizon
//! has passed.

mod engine;

pub use engine::{
    KindAccuracy, PredictionAccuracy, PredictionEngine, PredictionError, PredictionKind,
    SimplePrediction, TimeHorizon,
};
