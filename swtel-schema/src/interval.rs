//! Sample, IntervalDocument and IntervalBatch types.

use serde::{Deserialize, Serialize};

/// One per-interval delta for a single counter.
///
/// `timestamp` is the logical start of the sampling cycle and is identical for
/// every sample produced by that cycle. `collect_start` / `collect_end` bound
/// the protocol round trip in Unix nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: u64,
    #[serde(rename = "collectstart")]
    pub collect_start: u64,
    #[serde(rename = "collectend")]
    pub collect_end: u64,
    pub value: u64,
}

/// The delta series accumulated for one counter between two flushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalDocument {
    /// Name of the switch the counters were polled from.
    pub experiment: String,
    /// FQDN of the node running the agent.
    pub hostname: String,
    /// Role-specific output metric name.
    pub metric: String,
    #[serde(rename = "sample")]
    pub samples: Vec<Sample>,
}

impl IntervalDocument {
    /// Serialize to a single JSON line (no trailing newline).
    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Everything drained by one flush: the archival unit handed to the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalBatch {
    /// Interval start, Unix seconds.
    pub start: u64,
    /// Interval end, Unix seconds.
    pub end: u64,
    pub hostname: String,
    pub documents: Vec<IntervalDocument>,
}

impl IntervalBatch {
    /// Total number of samples across all documents.
    pub fn sample_count(&self) -> usize {
        self.documents.iter().map(|d| d.samples.len()).sum()
    }

    /// Render the batch as JSONL, one document per line.
    pub fn to_jsonl(&self) -> Result<String, SchemaError> {
        let mut out = String::new();
        for document in &self.documents {
            out.push_str(&document.to_json()?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Parse the documents of a JSONL archive. Blank lines are skipped.
    pub fn documents_from_jsonl(content: &str) -> Result<Vec<IntervalDocument>, SchemaError> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                IntervalDocument::from_json(line).map_err(|e| SchemaError::Line {
                    line: idx + 1,
                    source: Box::new(e),
                })
            })
            .collect()
    }
}

/// Errors that can occur when encoding or decoding archive documents.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid document on line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<SchemaError>,
    },
}
