//! Archive schema for the switch telemetry agent.
//!
//! Defines the per-interval delta samples and the documents that are written
//! to JSONL archives on every flush.

pub mod interval;

pub use interval::{IntervalBatch, IntervalDocument, Sample, SchemaError};
